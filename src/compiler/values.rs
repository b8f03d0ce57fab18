//! Compile-time values: storage bindings, constants, initial state

use crate::analyzer::Analysis;
use crate::builder::Value;
use crate::error::{Diagnostic, Error, Result, SemanticErrorKind};
use crate::ir::{encode_int, Node};
use crate::parser::{BinaryOp, Expr, ExprKind, Literal, Program, TypeName, UnaryOp};
use crate::repository::AddressResolver;
use crate::state::{StateValue, StateValues};
use num_bigint::{BigInt, Sign};
use num_traits::Zero;
use std::collections::BTreeMap;

/// Everything bound before generation
#[derive(Debug, Clone, Default)]
pub struct ResolvedValues {
    /// One value per storage variable, in curry order
    pub storage: Vec<Node>,
    /// Generated constant name → value, in declaration order
    pub constants: Vec<(String, Node)>,
    /// State fields that have an initializer
    pub initial_state: StateValues,
}

#[derive(Debug, Clone, PartialEq)]
enum Folded {
    Int(BigInt),
    Bool(bool),
    Bytes(Vec<u8>),
    Str(String),
}

impl Folded {
    fn describe(&self) -> String {
        match self {
            Folded::Int(v) => v.to_string(),
            Folded::Bool(b) => b.to_string(),
            Folded::Bytes(b) => format!("0x{}", hex::encode(b)),
            Folded::Str(s) => format!("{:?}", s),
        }
    }

    /// Atom bytes, used for equality
    fn atom(&self) -> Vec<u8> {
        match self {
            Folded::Int(v) => encode_int(v),
            Folded::Bool(true) => vec![1],
            Folded::Bool(false) => Vec::new(),
            Folded::Bytes(b) => b.clone(),
            Folded::Str(s) => s.as_bytes().to_vec(),
        }
    }
}

fn invalid(expected: impl Into<String>, got: impl Into<String>) -> Error {
    Error::InvalidValue {
        expected: expected.into(),
        got: got.into(),
    }
}

/// Bind storage overrides and initializers, fold constants and state initializers
pub fn resolve(
    program: &Program,
    analysis: &Analysis,
    overrides: &[(&str, Value)],
    resolver: &dyn AddressResolver,
) -> Result<ResolvedValues> {
    for (name, _) in overrides {
        if !analysis.storage.iter().any(|var| var.name == *name) {
            return Err(Error::Config(format!("'{}' is not a storage variable", name)));
        }
    }

    let mut folder = Folder::default();
    let mut constants = Vec::with_capacity(program.coin.constants.len());
    for constant in &program.coin.constants {
        let value = folder.fold(&constant.value)?;
        let node = coerce(&constant.name, &constant.ty, &value, resolver)?;
        if let Some(target) = analysis.coin_names.get(&constant.name) {
            constants.push((target.clone(), node));
        }
        folder.known.insert(constant.name.clone(), value);
    }

    let mut storage = Vec::with_capacity(analysis.storage.len());
    let mut missing = Vec::new();
    for var in &analysis.storage {
        let supplied = overrides.iter().rev().find(|(name, _)| *name == var.name);
        let node = match (supplied, &var.init) {
            (Some((_, value)), _) => coerce_value(&var.name, &var.ty, value, resolver)?,
            (None, Some(init)) => coerce(&var.name, &var.ty, &folder.fold(init)?, resolver)?,
            (None, None) => {
                missing.push(Diagnostic::new(
                    var.span.line,
                    var.span.column,
                    SemanticErrorKind::MissingValue,
                    format!("storage variable '{}' has no value", var.name),
                ));
                continue;
            }
        };
        storage.push(node);
    }
    if !missing.is_empty() {
        return Err(Error::Semantic(missing));
    }

    let mut initial_state = StateValues::new();
    for var in &program.coin.state {
        if let Some(init) = &var.init {
            let value = folder.fold(init)?;
            initial_state.insert(var.name.clone(), state_value(&var.name, &var.ty, value, resolver)?);
        }
    }

    tracing::debug!(
        storage = storage.len(),
        constants = constants.len(),
        initialized_state = initial_state.len(),
        "resolved compile-time values"
    );
    Ok(ResolvedValues {
        storage,
        constants,
        initial_state,
    })
}

fn coerce(name: &str, ty: &TypeName, value: &Folded, resolver: &dyn AddressResolver) -> Result<Node> {
    let expected = || format!("{} for '{}'", ty, name);
    match (ty, value) {
        (TypeName::Uint256, Folded::Int(v)) if v.sign() == Sign::Minus => {
            Err(invalid(expected(), v.to_string()))
        }
        (TypeName::Uint256 | TypeName::Int, Folded::Int(v)) => Ok(Node::int(v.clone())),
        (TypeName::Bool, Folded::Bool(b)) => Ok(if *b { Node::int(1) } else { Node::nil() }),
        (TypeName::Address | TypeName::Bytes32, Folded::Bytes(b)) if b.len() == 32 => {
            Ok(Node::bytes(b.clone()))
        }
        (TypeName::Address | TypeName::Bytes32, Folded::Str(s)) => {
            Ok(resolver.resolve(s)?.to_node())
        }
        (TypeName::Bytes | TypeName::String, Folded::Bytes(b)) => Ok(Node::bytes(b.clone())),
        (TypeName::Bytes | TypeName::String, Folded::Str(s)) => Ok(Node::string(s)),
        _ => Err(invalid(expected(), value.describe())),
    }
}

fn coerce_value(name: &str, ty: &TypeName, value: &Value, resolver: &dyn AddressResolver) -> Result<Node> {
    let expected = || format!("{} for '{}'", ty, name);
    match (ty, value) {
        (TypeName::Address | TypeName::Bytes32, Value::Str(text)) => {
            return Ok(resolver.resolve(text)?.to_node())
        }
        (TypeName::Uint256 | TypeName::Int, Value::Int(v)) => {
            return coerce(name, ty, &Folded::Int(v.clone()), resolver)
        }
        (TypeName::Bool, Value::Bool(b)) => return coerce(name, ty, &Folded::Bool(*b), resolver),
        (TypeName::Mapping(_, _), _) => return Err(invalid(expected(), "a value")),
        _ => {}
    }

    let node = value.to_node()?;
    let atom = node
        .as_bytes()
        .ok_or_else(|| invalid(expected(), "a list"))?;
    match ty {
        TypeName::Address | TypeName::Bytes32 if atom.len() != 32 => {
            Err(invalid(expected(), format!("{} bytes", atom.len())))
        }
        TypeName::Uint256 if node.as_int().map_or(false, |v| v.sign() == Sign::Minus) => {
            Err(invalid(expected(), "a negative integer"))
        }
        TypeName::Bool if !matches!(atom, [] | [1]) => Err(invalid(expected(), "a non-boolean atom")),
        _ => Ok(node),
    }
}

fn state_value(name: &str, ty: &TypeName, value: Folded, resolver: &dyn AddressResolver) -> Result<StateValue> {
    match (ty, value) {
        (TypeName::Bool, Folded::Bool(b)) => Ok(StateValue::Bool(b)),
        (TypeName::Uint256 | TypeName::Int, Folded::Int(v)) => {
            if *ty == TypeName::Uint256 && v.sign() == Sign::Minus {
                return Err(invalid(format!("{} for '{}'", ty, name), v.to_string()));
            }
            Ok(StateValue::Int(v))
        }
        (_, value) => {
            let node = coerce(name, ty, &value, resolver)?;
            let bytes = node.as_bytes().map(<[u8]>::to_vec).unwrap_or_default();
            Ok(StateValue::Bytes(bytes))
        }
    }
}

/// Constant folding over literals and earlier constants
#[derive(Debug, Default)]
struct Folder {
    known: BTreeMap<String, Folded>,
}

impl Folder {
    fn fold(&self, expr: &Expr) -> Result<Folded> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(match literal {
                Literal::Int(v) => Folded::Int(v.clone()),
                Literal::Bool(b) => Folded::Bool(*b),
                Literal::Bytes(b) => Folded::Bytes(b.clone()),
                Literal::Str(s) => Folded::Str(s.clone()),
            }),
            ExprKind::Identifier(name) => self.known.get(name).cloned().ok_or_else(|| {
                Error::Semantic(vec![Diagnostic::new(
                    expr.span.line,
                    expr.span.column,
                    SemanticErrorKind::MissingValue,
                    format!("'{}' has no compile-time value here", name),
                )])
            }),
            ExprKind::Unary { op, operand } => match (op, self.fold(operand)?) {
                (UnaryOp::Neg, Folded::Int(v)) => Ok(Folded::Int(-v)),
                (UnaryOp::Not, Folded::Bool(b)) => Ok(Folded::Bool(!b)),
                (_, other) => Err(invalid("an operand the operator accepts", other.describe())),
            },
            ExprKind::Binary { op, left, right } => {
                fold_binary(*op, self.fold(left)?, self.fold(right)?)
            }
            ExprKind::Call { callee, .. } => Err(invalid(
                "a compile-time constant",
                format!("call to '{}'", callee),
            )),
            ExprKind::Member { field, .. } => Err(invalid(
                "a compile-time constant",
                format!("member '.{}'", field),
            )),
        }
    }
}

fn fold_binary(op: BinaryOp, left: Folded, right: Folded) -> Result<Folded> {
    match op {
        BinaryOp::Eq => return Ok(Folded::Bool(left.atom() == right.atom())),
        BinaryOp::NotEq => return Ok(Folded::Bool(left.atom() != right.atom())),
        _ => {}
    }
    match (left, right) {
        (Folded::Int(a), Folded::Int(b)) => match op {
            BinaryOp::Add => Ok(Folded::Int(a + b)),
            BinaryOp::Sub => Ok(Folded::Int(a - b)),
            BinaryOp::Mul => Ok(Folded::Int(a * b)),
            BinaryOp::Div | BinaryOp::Mod => {
                if b.is_zero() {
                    return Err(invalid("a non-zero divisor", "0"));
                }
                let (quotient, remainder) = floor_divmod(&a, &b);
                Ok(Folded::Int(if op == BinaryOp::Div { quotient } else { remainder }))
            }
            BinaryOp::Lt => Ok(Folded::Bool(a < b)),
            BinaryOp::Gt => Ok(Folded::Bool(a > b)),
            BinaryOp::LtEq => Ok(Folded::Bool(a <= b)),
            BinaryOp::GtEq => Ok(Folded::Bool(a >= b)),
            _ => Err(invalid(format!("booleans for '{}'", op), "integers")),
        },
        (Folded::Bool(a), Folded::Bool(b)) => match op {
            BinaryOp::And => Ok(Folded::Bool(a && b)),
            BinaryOp::Or => Ok(Folded::Bool(a || b)),
            _ => Err(invalid(format!("integers for '{}'", op), "booleans")),
        },
        (left, right) => Err(invalid(
            format!("matching operands for '{}'", op),
            format!("{} and {}", left.describe(), right.describe()),
        )),
    }
}

/// Quotient rounded toward negative infinity, as the VM divides
fn floor_divmod(a: &BigInt, b: &BigInt) -> (BigInt, BigInt) {
    let mut quotient = a / b;
    let mut remainder = a % b;
    if !remainder.is_zero() && (remainder.sign() == Sign::Minus) != (b.sign() == Sign::Minus) {
        quotient -= 1;
        remainder += b;
    }
    (quotient, remainder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::parser::parse_coinscript;
    use crate::repository::HexAddressResolver;

    fn resolve_source(source: &str, overrides: &[(&str, Value)]) -> Result<ResolvedValues> {
        let program = parse_coinscript(source).unwrap();
        let analysis = analyze(&program).unwrap();
        resolve(&program, &analysis, overrides, &HexAddressResolver)
    }

    #[test]
    fn test_constants_fold_in_order() {
        let values = resolve_source(
            r#"coin C {
                const uint256 FEE = 10;
                const uint256 DOUBLE = FEE * 2 + 1;
                action spend(address to) { send(to, DOUBLE); }
            }"#,
            &[],
        )
        .unwrap();
        assert_eq!(values.constants.len(), 2);
        assert_eq!(values.constants[1].1, Node::int(21));
    }

    #[test]
    fn test_floor_division_matches_vm() {
        let (q, r) = floor_divmod(&BigInt::from(-7), &BigInt::from(2));
        assert_eq!(q, BigInt::from(-4));
        assert_eq!(r, BigInt::from(1));
        assert!(fold_binary(BinaryOp::Div, Folded::Int(1.into()), Folded::Int(0.into())).is_err());
    }

    #[test]
    fn test_missing_storage_value_is_reported() {
        let err = resolve_source(
            "coin C { storage { address owner; } action spend() { send(owner, 1); } }",
            &[],
        )
        .unwrap_err();
        assert_eq!(err.diagnostics()[0].kind, SemanticErrorKind::MissingValue);
    }

    #[test]
    fn test_override_must_name_storage() {
        let err = resolve_source(
            "coin C { storage { uint256 limit = 5; } action spend(address to) { send(to, limit); } }",
            &[("nope", Value::Int(1.into()))],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_address_length_is_checked() {
        let err = resolve_source(
            "coin C { storage { address owner; } action spend() { send(owner, 1); } }",
            &[("owner", Value::hex("0xabcd"))],
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
    }
}
