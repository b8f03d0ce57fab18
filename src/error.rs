//! Error types for the CoinScript toolchain

use std::fmt;
use thiserror::Error;

/// CoinScript compiler and IR errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Front-end errors
    /// Character the scanner cannot start a token with
    ///
    /// **Triggered by:** stray characters such as `#` or `$`, unterminated strings or block comments
    #[error("Lex error at line {line}, column {col}: {message}")]
    LexError {
        /// Line number where error occurred
        line: usize,
        /// Column number where error occurred
        col: usize,
        /// Error description
        message: String,
    },

    /// Token that the current grammar production cannot accept
    ///
    /// **Triggered by:** `coin Foo { action }` (missing action name), `(a b` (missing `)`)
    #[error("Parse error at line {line}, column {col}: {message}")]
    ParseError {
        /// Line number where error occurred
        line: usize,
        /// Column number where error occurred
        col: usize,
        /// Error description
        message: String,
    },

    /// Input ended in the middle of a production
    #[error("Unexpected end of input: expected {expected}")]
    UnexpectedEof {
        /// What the parser was waiting for
        expected: String,
    },

    /// Every semantic problem found by the analyzer, in source order
    #[error("{}", render_diagnostics(.0))]
    Semantic(Vec<Diagnostic>),

    /// Internal invariant violated while lowering to IR
    ///
    /// Always fatal: an earlier pass let something through that it should have rejected.
    #[error("Generation error: {0}")]
    GenerationError(String),

    /// Expression or tree nesting exceeded the configured bound
    #[error("Nesting too deep (limit: {limit})")]
    NestingTooDeep {
        /// Maximum allowed depth
        limit: usize,
    },

    /// Merkle proof does not lead to the claimed root
    ///
    /// A spend-time condition, not a compile-time one.
    #[error("Merkle proof verification failed for action '{action}'")]
    MerkleProofError {
        /// Action whose proof failed
        action: String,
    },

    /// Atom bytes that violate the canonical encoding
    #[error("Invalid atom: {0}")]
    InvalidAtom(String),

    /// Value could not be coerced to the requested shape
    #[error("Invalid value: expected {expected}, got {got}")]
    InvalidValue {
        /// Expected shape
        expected: String,
        /// Actual value description
        got: String,
    },

    /// State payload does not match its schema
    #[error("State error: {0}")]
    StateError(String),

    /// Action name inserted twice into an action tree
    #[error("Duplicate action: {0}")]
    DuplicateAction(String),

    /// Action name not present in an action tree
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Reference program could not be loaded
    #[error("Reference program not found: {id}")]
    ProgramNotFound {
        /// Program identifier
        id: String,
    },

    /// Address string could not be turned into a 32-byte hash
    #[error("Cannot decode address {address}: {reason}")]
    AddressError {
        /// Address as supplied
        address: String,
        /// Failure reason
        reason: String,
    },

    /// Invalid compiler configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Fatal error that cannot be recovered from
    Fatal,
    /// Recoverable error that may be retried with different input
    Recoverable,
    /// Warning that doesn't prevent execution
    Warning,
}

impl Error {
    /// Create a generation error with a message
    pub fn generation(msg: impl Into<String>) -> Self {
        Error::GenerationError(msg.into())
    }

    /// Create a parse error at a position
    pub fn parse(line: usize, col: usize, message: impl Into<String>) -> Self {
        Error::ParseError {
            line,
            col,
            message: message.into(),
        }
    }

    /// Classify error severity
    pub fn classify(&self) -> ErrorSeverity {
        match self {
            Error::GenerationError(_) => ErrorSeverity::Fatal,
            Error::NestingTooDeep { .. } => ErrorSeverity::Fatal,
            Error::LexError { .. } => ErrorSeverity::Fatal,
            Error::ParseError { .. } => ErrorSeverity::Fatal,
            Error::UnexpectedEof { .. } => ErrorSeverity::Fatal,
            Error::Semantic(_) => ErrorSeverity::Fatal,

            Error::MerkleProofError { .. } => ErrorSeverity::Recoverable,
            Error::ProgramNotFound { .. } => ErrorSeverity::Recoverable,
            Error::AddressError { .. } => ErrorSeverity::Recoverable,

            _ => ErrorSeverity::Recoverable,
        }
    }

    /// True only for failures that happen when a spend is checked, not when a program is built
    pub fn is_spend_time(&self) -> bool {
        matches!(self, Error::MerkleProofError { .. })
    }

    /// Semantic diagnostics carried by this error, empty for every other kind
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Error::Semantic(diags) => diags,
            _ => &[],
        }
    }
}

/// Kind of a semantic problem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticErrorKind {
    /// Identifier with no declaration in scope
    UnresolvedIdentifier,
    /// Name declared as both storage and state
    StorageStateConflict,
    /// Coin offers no way to be spent
    MissingSpendPath,
    /// Decorator unknown, misplaced, or pointing at an invalid target
    InvalidDecorator,
    /// Operand or argument of the wrong type
    TypeMismatch,
    /// Name declared twice in the same scope
    DuplicateDeclaration,
    /// Assignment to something that cannot change
    InvalidAssignment,
    /// `emit` of an undeclared event
    UnknownEvent,
    /// Wrong number of arguments
    ArityMismatch,
    /// Two author names collapse to the same generated name
    NamingConflict,
    /// Storage variable without a compile-time value
    MissingValue,
    /// Expression statement with no effect
    UnusedExpression,
}

/// One semantic problem with its source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
    /// Problem category
    pub kind: SemanticErrorKind,
    /// Human-readable description
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic
    pub fn new(
        line: usize,
        column: usize,
        kind: SemanticErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            line,
            column,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

fn render_diagnostics(diags: &[Diagnostic]) -> String {
    let lines: Vec<String> = diags.iter().map(|d| d.to_string()).collect();
    format!(
        "Semantic errors ({}):\n  {}",
        diags.len(),
        lines.join("\n  ")
    )
}

/// Result type for CoinScript operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_errors_render_every_diagnostic() {
        let err = Error::Semantic(vec![
            Diagnostic::new(1, 2, SemanticErrorKind::TypeMismatch, "bad type"),
            Diagnostic::new(3, 4, SemanticErrorKind::UnknownEvent, "no event"),
        ]);
        let text = err.to_string();
        assert!(text.contains("line 1, column 2: bad type"));
        assert!(text.contains("line 3, column 4: no event"));
        assert_eq!(err.diagnostics().len(), 2);
    }

    #[test]
    fn test_only_proof_failures_are_spend_time() {
        let proof = Error::MerkleProofError {
            action: "transfer".into(),
        };
        assert!(proof.is_spend_time());
        assert!(!Error::InvalidAtom("x".into()).is_spend_time());
        assert_eq!(Error::generation("x").classify(), ErrorSeverity::Fatal);
    }
}
