//! Threaded state payloads
//!
//! A coin with a `state` block carries its mutable fields in the solution and
//! writes them into the memo of the coin it recreates. The payload layout is
//! `(version f1 f2 ... fn)` in schema order; mappings are lists of
//! `(key . value)` pairs in insertion order.

use crate::error::{Error, Result};
use crate::ir::Node;
use crate::parser::{TypeName, VarDecl};
use num_bigint::{BigInt, Sign};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field type of a state schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateType {
    /// Non-negative integer
    Uint,
    /// Signed integer
    Int,
    /// `1` or nil
    Bool,
    /// 32-byte hash (`address`, `bytes32`)
    Address,
    /// Any atom (`bytes`, `string`)
    Bytes,
    /// Key/value pairs
    Mapping(Box<StateType>, Box<StateType>),
}

impl StateType {
    /// State type of a declared CoinScript type
    pub fn from_type_name(ty: &TypeName) -> StateType {
        match ty {
            TypeName::Uint256 => StateType::Uint,
            TypeName::Int => StateType::Int,
            TypeName::Bool => StateType::Bool,
            TypeName::Address | TypeName::Bytes32 => StateType::Address,
            TypeName::Bytes | TypeName::String => StateType::Bytes,
            TypeName::Mapping(key, value) => StateType::Mapping(
                Box::new(StateType::from_type_name(key)),
                Box::new(StateType::from_type_name(value)),
            ),
        }
    }

    /// Value a missing field takes under [`MissingFieldPolicy::ZeroDefault`]
    pub fn zero(&self) -> StateValue {
        match self {
            StateType::Uint | StateType::Int => StateValue::Int(BigInt::from(0)),
            StateType::Bool => StateValue::Bool(false),
            StateType::Address => StateValue::Bytes(vec![0u8; 32]),
            StateType::Bytes => StateValue::Bytes(Vec::new()),
            StateType::Mapping(_, _) => StateValue::Mapping(Vec::new()),
        }
    }

    /// True when `value` conforms to this type
    pub fn accepts(&self, value: &StateValue) -> bool {
        match (self, value) {
            (StateType::Uint, StateValue::Int(v)) => v.sign() != Sign::Minus,
            (StateType::Int, StateValue::Int(_)) => true,
            (StateType::Bool, StateValue::Bool(_)) => true,
            (StateType::Address, StateValue::Bytes(b)) => b.len() == 32,
            (StateType::Bytes, StateValue::Bytes(_)) => true,
            (StateType::Mapping(key, val), StateValue::Mapping(entries)) => entries
                .iter()
                .all(|(k, v)| key.accepts(k) && val.accepts(v)),
            _ => false,
        }
    }

    fn encode(&self, value: &StateValue) -> Node {
        match value {
            StateValue::Int(v) => Node::int(v.clone()),
            StateValue::Bool(true) => Node::int(1),
            StateValue::Bool(false) => Node::nil(),
            StateValue::Bytes(b) => Node::bytes(b.clone()),
            StateValue::Mapping(entries) => {
                let (key_type, value_type) = match self {
                    StateType::Mapping(k, v) => (k.as_ref(), v.as_ref()),
                    other => (other, other),
                };
                Node::list(
                    entries
                        .iter()
                        .map(|(k, v)| Node::cons(key_type.encode(k), value_type.encode(v))),
                )
            }
        }
    }

    fn decode(&self, node: &Node, field: &str) -> Result<StateValue> {
        let mismatch = || Error::StateError(format!("field '{}' is not a valid {}", field, self));
        match self {
            StateType::Uint | StateType::Int => {
                let value = node.as_int().ok_or_else(mismatch)?;
                if *self == StateType::Uint && value.sign() == Sign::Minus {
                    return Err(mismatch());
                }
                Ok(StateValue::Int(value))
            }
            StateType::Bool => match node.as_bytes() {
                Some([]) => Ok(StateValue::Bool(false)),
                Some([1]) => Ok(StateValue::Bool(true)),
                _ => Err(mismatch()),
            },
            StateType::Address => match node.as_bytes() {
                Some(bytes) if bytes.len() == 32 => Ok(StateValue::Bytes(bytes.to_vec())),
                _ => Err(mismatch()),
            },
            StateType::Bytes => node
                .as_bytes()
                .map(|b| StateValue::Bytes(b.to_vec()))
                .ok_or_else(mismatch),
            StateType::Mapping(key, value) => {
                let items = node.as_list().ok_or_else(mismatch)?;
                let entries = items
                    .into_iter()
                    .map(|item| {
                        let (k, v) = item.pair().ok_or_else(mismatch)?;
                        Ok((key.decode(k, field)?, value.decode(v, field)?))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(StateValue::Mapping(entries))
            }
        }
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StateType::Uint => write!(f, "uint"),
            StateType::Int => write!(f, "int"),
            StateType::Bool => write!(f, "bool"),
            StateType::Address => write!(f, "address"),
            StateType::Bytes => write!(f, "bytes"),
            StateType::Mapping(k, v) => write!(f, "mapping({} => {})", k, v),
        }
    }
}

/// A decoded state field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateValue {
    /// `uint` / `int`
    Int(BigInt),
    /// `bool`
    Bool(bool),
    /// `address` / `bytes`
    Bytes(Vec<u8>),
    /// `mapping`, in insertion order
    Mapping(Vec<(StateValue, StateValue)>),
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        StateValue::Int(BigInt::from(value))
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        StateValue::Bool(value)
    }
}

/// One named field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateField {
    /// Field name
    pub name: String,
    /// Field type
    #[serde(rename = "type")]
    pub ty: StateType,
}

/// Ordered field list plus the layout version written at the head of the payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSchema {
    version: u32,
    fields: Vec<StateField>,
}

impl StateSchema {
    /// Schema with no fields
    pub fn new(version: u32) -> Self {
        StateSchema {
            version,
            fields: Vec::new(),
        }
    }

    /// Append a field
    pub fn field(mut self, name: impl Into<String>, ty: StateType) -> Self {
        self.fields.push(StateField {
            name: name.into(),
            ty,
        });
        self
    }

    /// Schema of a coin's `state` block
    pub fn from_decls(decls: &[VarDecl], version: u32) -> Self {
        decls.iter().fold(StateSchema::new(version), |schema, decl| {
            schema.field(decl.name.clone(), StateType::from_type_name(&decl.ty))
        })
    }

    /// Layout version
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Fields in payload order
    pub fn fields(&self) -> &[StateField] {
        &self.fields
    }

    /// Position of a field in the payload (after the version)
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// What [`StateManager::encode`] does with a schema field absent from its input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFieldPolicy {
    /// Fill with the type's zero value and log a warning
    #[default]
    ZeroDefault,
    /// Fail with a state error
    Reject,
}

/// Named field values
pub type StateValues = BTreeMap<String, StateValue>;

/// Encoder/decoder for one schema
#[derive(Debug, Clone)]
pub struct StateManager {
    schema: StateSchema,
    policy: MissingFieldPolicy,
}

impl StateManager {
    /// Manager with the zero-default policy
    pub fn new(schema: StateSchema) -> Self {
        Self::with_policy(schema, MissingFieldPolicy::default())
    }

    /// Manager with an explicit missing-field policy
    pub fn with_policy(schema: StateSchema, policy: MissingFieldPolicy) -> Self {
        StateManager { schema, policy }
    }

    /// The schema
    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    /// Payload `(version f1 ... fn)` for `values`
    pub fn encode(&self, values: &StateValues) -> Result<Node> {
        if let Some(unknown) = values.keys().find(|k| self.schema.index_of(k).is_none()) {
            return Err(Error::StateError(format!("unknown state field '{}'", unknown)));
        }

        let mut items = Vec::with_capacity(self.schema.fields.len() + 1);
        items.push(Node::int(self.schema.version));
        for field in &self.schema.fields {
            let value = match values.get(&field.name) {
                Some(value) => value.clone(),
                None => match self.policy {
                    MissingFieldPolicy::ZeroDefault => {
                        tracing::warn!(field = %field.name, ty = %field.ty, "state field missing, using zero value");
                        field.ty.zero()
                    }
                    MissingFieldPolicy::Reject => {
                        return Err(Error::StateError(format!(
                            "missing state field '{}'",
                            field.name
                        )))
                    }
                },
            };
            if !field.ty.accepts(&value) {
                return Err(Error::StateError(format!(
                    "value for '{}' is not a valid {}",
                    field.name, field.ty
                )));
            }
            items.push(field.ty.encode(&value));
        }
        Ok(Node::list(items))
    }

    /// Field values of a payload
    pub fn decode(&self, payload: &Node) -> Result<StateValues> {
        let items = payload
            .as_list()
            .ok_or_else(|| Error::StateError("state payload must be a list".to_string()))?;
        let (version, fields) = items
            .split_first()
            .ok_or_else(|| Error::StateError("state payload is empty".to_string()))?;

        let found = version.as_int();
        if found != Some(BigInt::from(self.schema.version)) {
            return Err(Error::StateError(format!(
                "state version mismatch: expected {}, found {}",
                self.schema.version,
                found.map_or_else(|| "a pair".to_string(), |v| v.to_string())
            )));
        }
        if fields.len() != self.schema.fields.len() {
            return Err(Error::StateError(format!(
                "state payload has {} fields, schema declares {}",
                fields.len(),
                self.schema.fields.len()
            )));
        }

        self.schema
            .fields
            .iter()
            .zip(fields)
            .map(|(field, node)| Ok((field.name.clone(), field.ty.decode(node, &field.name)?)))
            .collect()
    }

    /// Names of fields whose value differs, in schema order
    ///
    /// A field absent from one side compares against its zero value.
    pub fn diff(&self, old: &StateValues, new: &StateValues) -> Vec<String> {
        self.schema
            .fields
            .iter()
            .filter(|field| {
                let zero = field.ty.zero();
                old.get(&field.name).unwrap_or(&zero) != new.get(&field.name).unwrap_or(&zero)
            })
            .map(|field| field.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> StateSchema {
        StateSchema::new(1)
            .field("count", StateType::Uint)
            .field("paused", StateType::Bool)
            .field("owner", StateType::Address)
            .field(
                "balances",
                StateType::Mapping(Box::new(StateType::Address), Box::new(StateType::Uint)),
            )
    }

    fn values() -> StateValues {
        let mut values = StateValues::new();
        values.insert("count".into(), StateValue::from(7));
        values.insert("paused".into(), StateValue::from(true));
        values.insert("owner".into(), StateValue::Bytes(vec![3; 32]));
        values.insert(
            "balances".into(),
            StateValue::Mapping(vec![
                (StateValue::Bytes(vec![9; 32]), StateValue::from(100)),
                (StateValue::Bytes(vec![1; 32]), StateValue::from(5)),
            ]),
        );
        values
    }

    #[test]
    fn test_encode_layout_and_round_trip() {
        let manager = StateManager::new(schema());
        let payload = manager.encode(&values()).unwrap();
        let items = payload.as_list().unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].as_int(), Some(BigInt::from(1)));
        assert_eq!(items[1].as_int(), Some(BigInt::from(7)));
        assert_eq!(manager.decode(&payload).unwrap(), values());
    }

    #[test]
    fn test_missing_field_policies() {
        let mut partial = values();
        partial.remove("paused");

        let lenient = StateManager::new(schema());
        let decoded = lenient.decode(&lenient.encode(&partial).unwrap()).unwrap();
        assert_eq!(decoded["paused"], StateValue::Bool(false));

        let strict = StateManager::with_policy(schema(), MissingFieldPolicy::Reject);
        assert!(matches!(strict.encode(&partial), Err(Error::StateError(_))));
    }

    #[test]
    fn test_rejections() {
        let manager = StateManager::new(schema());
        let mut bad = values();
        bad.insert("extra".into(), StateValue::from(1));
        assert!(manager.encode(&bad).is_err());

        let mut negative = values();
        negative.insert("count".into(), StateValue::from(-1));
        assert!(manager.encode(&negative).is_err());

        let wrong_version = Node::list([Node::int(2), Node::nil(), Node::nil(), Node::nil(), Node::nil()]);
        assert!(manager.decode(&wrong_version).is_err());
        let short = Node::list([Node::int(1)]);
        assert!(manager.decode(&short).is_err());
    }

    #[test]
    fn test_diff_reports_changed_fields() {
        let manager = StateManager::new(schema());
        let old = values();
        let mut new = values();
        new.insert("count".into(), StateValue::from(8));
        assert_eq!(manager.diff(&old, &new), vec!["count".to_string()]);
        assert!(manager.diff(&old, &old).is_empty());
    }
}
