use num_bigint::BigInt;

/// A single token from the source code
#[derive(Debug, Clone, PartialEq)]
pub struct Token<K = TokenKind> {
    /// The type of token
    pub kind: K,
    /// Original text of the token
    pub lexeme: String,
    /// Line number where token appears (1-indexed)
    pub line: usize,
    /// Column number where token starts (1-indexed)
    pub column: usize,
}

impl<K> Token<K> {
    /// Creates a new token with the given properties
    pub fn new(kind: K, lexeme: String, line: usize, column: usize) -> Self {
        Token {
            kind,
            lexeme,
            line,
            column,
        }
    }
}

/// All possible token types in CoinScript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    /// Decimal integer literal
    Integer(BigInt),
    /// `0x...` byte literal
    Hex(Vec<u8>),
    /// String literal
    String(String),
    /// Boolean true literal
    True,
    /// Boolean false literal
    False,

    // Identifiers
    /// Identifier (also type names such as `uint256`)
    Identifier(String),

    // Keywords
    /// COIN keyword
    Coin,
    /// STORAGE keyword
    Storage,
    /// STATE keyword
    State,
    /// CONST keyword
    Const,
    /// ACTION keyword
    Action,
    /// EVENT keyword
    Event,
    /// EMIT keyword
    Emit,
    /// REQUIRE keyword
    Require,
    /// SEND keyword
    Send,
    /// IF keyword
    If,
    /// ELSE keyword
    Else,
    /// RETURN keyword
    Return,
    /// INCLUDE keyword
    Include,
    /// MAPPING keyword
    Mapping,

    // Operators
    /// Plus operator (+)
    Plus,
    /// Minus operator (-)
    Minus,
    /// Star operator (*)
    Star,
    /// Slash operator (/)
    Slash,
    /// Percent operator (%)
    Percent,
    /// Equality operator (==)
    Eq,
    /// Inequality operator (!=)
    NotEq,
    /// Less than operator (<)
    Lt,
    /// Greater than operator (>)
    Gt,
    /// Less than or equal operator (<=)
    LtEq,
    /// Greater than or equal operator (>=)
    GtEq,
    /// Logical AND operator (&&)
    AndAnd,
    /// Logical OR operator (||)
    OrOr,
    /// Logical NOT operator (!)
    Bang,
    /// Assignment operator (=)
    Assign,
    /// Plus-assign operator (+=)
    PlusAssign,
    /// Minus-assign operator (-=)
    MinusAssign,
    /// Star-assign operator (*=)
    StarAssign,
    /// Slash-assign operator (/=)
    SlashAssign,
    /// Fat arrow operator (=>)
    FatArrow,

    // Delimiters
    /// Left parenthesis (
    LeftParen,
    /// Right parenthesis )
    RightParen,
    /// Left brace {
    LeftBrace,
    /// Right brace }
    RightBrace,
    /// Comma delimiter
    Comma,
    /// Dot operator
    Dot,
    /// Semicolon delimiter
    Semicolon,
    /// Decorator marker (@)
    At,

    // Special
    /// End of file marker
    Eof,
}

impl TokenKind {
    /// Check if token is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Coin
                | TokenKind::Storage
                | TokenKind::State
                | TokenKind::Const
                | TokenKind::Action
                | TokenKind::Event
                | TokenKind::Emit
                | TokenKind::Require
                | TokenKind::Send
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::Return
                | TokenKind::Include
                | TokenKind::Mapping
        )
    }

    /// Get keyword from string
    pub fn keyword(s: &str) -> Option<TokenKind> {
        let kind = match s {
            "coin" => TokenKind::Coin,
            "storage" => TokenKind::Storage,
            "state" => TokenKind::State,
            "const" => TokenKind::Const,
            "action" => TokenKind::Action,
            "event" => TokenKind::Event,
            "emit" => TokenKind::Emit,
            "require" => TokenKind::Require,
            "send" => TokenKind::Send,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "return" => TokenKind::Return,
            "include" => TokenKind::Include,
            "mapping" => TokenKind::Mapping,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => return None,
        };
        Some(kind)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Hex(bytes) => write!(f, "0x{}", hex::encode(bytes)),
            TokenKind::String(s) => write!(f, "\"{}\"", s),
            TokenKind::Identifier(id) => write!(f, "{}", id),
            TokenKind::Eof => write!(f, "end of input"),
            _ => write!(f, "{:?}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_detection() {
        assert_eq!(TokenKind::keyword("coin"), Some(TokenKind::Coin));
        assert_eq!(TokenKind::keyword("storage"), Some(TokenKind::Storage));
        assert_eq!(TokenKind::keyword("true"), Some(TokenKind::True));
        assert_eq!(TokenKind::keyword("uint256"), None);
        assert_eq!(TokenKind::keyword("msg"), None);
    }

    #[test]
    fn test_is_keyword() {
        assert!(TokenKind::Action.is_keyword());
        assert!(TokenKind::Mapping.is_keyword());
        assert!(!TokenKind::Integer(42.into()).is_keyword());
        assert!(!TokenKind::Identifier("test".to_string()).is_keyword());
    }
}
