use num_bigint::BigInt;
use std::fmt;

/// Source position (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Line number
    pub line: usize,
    /// Column number
    pub column: usize,
}

impl Span {
    /// Creates a span
    pub fn new(line: usize, column: usize) -> Self {
        Span { line, column }
    }
}

/// A parsed CoinScript compilation unit
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// `include "name";` directives, in source order
    pub includes: Vec<Include>,
    /// The coin declaration
    pub coin: CoinDecl,
}

/// Explicit library dependency
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    /// Library file name, e.g. `sha256tree.clib`
    pub name: String,
    /// Where the directive appears
    pub span: Span,
}

/// `coin Name { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct CoinDecl {
    /// Coin name
    pub name: String,
    /// Immutable, curried variables in declaration order
    pub storage: Vec<VarDecl>,
    /// Mutable, threaded variables in declaration order
    pub state: Vec<VarDecl>,
    /// Named compile-time constants
    pub constants: Vec<ConstDecl>,
    /// Entry points
    pub actions: Vec<Action>,
    /// Declared events
    pub events: Vec<EventDecl>,
    /// Decorators on the coin itself
    pub decorators: Vec<Decorator>,
    /// Where the declaration starts
    pub span: Span,
}

impl CoinDecl {
    /// Looks up an action by name
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Looks up an event by name
    pub fn event(&self, name: &str) -> Option<&EventDecl> {
        self.events.iter().find(|e| e.name == name)
    }

    /// True when the coin declares a decorator with this name
    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorators.iter().any(|d| d.name == name)
    }
}

/// `T name [= expr];` inside `storage` or `state`
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    /// Variable name
    pub name: String,
    /// Declared type
    pub ty: TypeName,
    /// Optional initializer
    pub init: Option<Expr>,
    /// Where the declaration starts
    pub span: Span,
}

/// `const T NAME = expr;`
#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    /// Constant name
    pub name: String,
    /// Declared type
    pub ty: TypeName,
    /// Value expression
    pub value: Expr,
    /// Where the declaration starts
    pub span: Span,
}

/// `event Name(T a, T b);`
#[derive(Debug, Clone, PartialEq)]
pub struct EventDecl {
    /// Event name
    pub name: String,
    /// Typed fields
    pub params: Vec<Param>,
    /// Where the declaration starts
    pub span: Span,
}

/// `@name(args)`
#[derive(Debug, Clone, PartialEq)]
pub struct Decorator {
    /// Decorator name without `@`
    pub name: String,
    /// Arguments, empty when written without parentheses
    pub args: Vec<Expr>,
    /// Where the decorator starts
    pub span: Span,
}

/// Typed parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub ty: TypeName,
    /// Where the parameter starts
    pub span: Span,
}

/// `action name(params) { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// Action name
    pub name: String,
    /// Typed parameters, in solution order
    pub params: Vec<Param>,
    /// Statements
    pub body: Vec<Stmt>,
    /// Decorators on the action
    pub decorators: Vec<Decorator>,
    /// Where the action starts
    pub span: Span,
}

impl Action {
    /// True when the action carries a decorator with this name
    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorators.iter().any(|d| d.name == name)
    }
}

/// Declared types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeName {
    /// `uint256` / `uint`
    Uint256,
    /// `int`
    Int,
    /// `address`
    Address,
    /// `bytes32`
    Bytes32,
    /// `bytes`
    Bytes,
    /// `string`
    String,
    /// `bool`
    Bool,
    /// `mapping(K => V)`
    Mapping(Box<TypeName>, Box<TypeName>),
}

impl TypeName {
    /// Parses a scalar type name
    pub fn from_name(name: &str) -> Option<TypeName> {
        let ty = match name {
            "uint256" | "uint" => TypeName::Uint256,
            "int" => TypeName::Int,
            "address" => TypeName::Address,
            "bytes32" => TypeName::Bytes32,
            "bytes" => TypeName::Bytes,
            "string" => TypeName::String,
            "bool" => TypeName::Bool,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeName::Uint256 => write!(f, "uint256"),
            TypeName::Int => write!(f, "int"),
            TypeName::Address => write!(f, "address"),
            TypeName::Bytes32 => write!(f, "bytes32"),
            TypeName::Bytes => write!(f, "bytes"),
            TypeName::String => write!(f, "string"),
            TypeName::Bool => write!(f, "bool"),
            TypeName::Mapping(k, v) => write!(f, "mapping({} => {})", k, v),
        }
    }
}

/// Statement with position
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// Statement variant
    pub kind: StmtKind,
    /// Where the statement starts
    pub span: Span,
}

/// Statements
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `require(cond[, "message"]);`
    Require {
        /// Condition that must hold
        condition: Expr,
        /// Failure message
        message: Option<String>,
    },
    /// `send(to, amount[, memo]);`
    Send {
        /// Recipient puzzle hash
        to: Expr,
        /// Amount
        amount: Expr,
        /// Optional memo
        memo: Option<Expr>,
    },
    /// `emit Event(args);`
    Emit {
        /// Event name
        event: String,
        /// Event arguments
        args: Vec<Expr>,
    },
    /// `if (cond) { ... } else { ... }`
    If {
        /// Condition expression
        condition: Expr,
        /// Statements when true
        then_branch: Vec<Stmt>,
        /// Statements when false
        else_branch: Option<Vec<Stmt>>,
    },
    /// `target op value;`, or `T name = value;` when `declared` is set
    Assign {
        /// Assigned place
        target: Expr,
        /// Plain or compound operator
        op: AssignOp,
        /// Right-hand side
        value: Expr,
        /// Type of a new local
        declared: Option<TypeName>,
    },
    /// Expression statement
    Expr(Expr),
    /// `return [expr];`
    Return(Option<Expr>),
}

/// Assignment operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Set,
    /// `+=`
    Add,
    /// `-=`
    Sub,
    /// `*=`
    Mul,
    /// `/=`
    Div,
}

impl AssignOp {
    /// Arithmetic operator a compound assignment expands to
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Set => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
        }
    }
}

/// Expression with position
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// Expression variant
    pub kind: ExprKind,
    /// Where the expression starts
    pub span: Span,
}

impl Expr {
    /// Creates an expression
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    /// True for `msg.sender`
    pub fn is_msg_sender(&self) -> bool {
        matches!(
            &self.kind,
            ExprKind::Member { object, field }
                if field == "sender" && matches!(&object.kind, ExprKind::Identifier(n) if n == "msg")
        )
    }
}

/// Expressions
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal value
    Literal(Literal),
    /// Variable reference
    Identifier(String),
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Function call
    Call {
        /// Called function name
        callee: String,
        /// Arguments
        args: Vec<Expr>,
    },
    /// `object.field`
    Member {
        /// Object expression
        object: Box<Expr>,
        /// Field name
        field: String,
    },
}

/// Literal values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// Decimal integer
    Int(BigInt),
    /// `0x...` bytes
    Bytes(Vec<u8>),
    /// Quoted string
    Str(String),
    /// `true` / `false`
    Bool(bool),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Addition (+)
    Add,
    /// Subtraction (-)
    Sub,
    /// Multiplication (*)
    Mul,
    /// Division (/)
    Div,
    /// Modulo (%)
    Mod,
    /// Equality (==)
    Eq,
    /// Inequality (!=)
    NotEq,
    /// Less than (<)
    Lt,
    /// Greater than (>)
    Gt,
    /// Less than or equal (<=)
    LtEq,
    /// Greater than or equal (>=)
    GtEq,
    /// Logical AND (&&)
    And,
    /// Logical OR (||)
    Or,
}

impl BinaryOp {
    /// True for `+ - * / %`
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    /// True for `< > <= >=`
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq
        )
    }

    /// True for `&& ||`
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::LtEq => "<=",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        f.write_str(text)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical NOT (!)
    Not,
    /// Negation (-)
    Neg,
}
