use super::token::Token;
use crate::error::{Error, Result};
use crate::ir::looks_like_integer;
use num_bigint::BigInt;

/// Token types of the target S-expression language
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SExprTokenKind {
    /// Left parenthesis (
    LeftParen,
    /// Right parenthesis )
    RightParen,
    /// Lone `.` marking a dotted tail
    Dot,
    /// Decimal integer, possibly negative
    Integer(BigInt),
    /// `0x...` bytes
    Hex(Vec<u8>),
    /// Double-quoted string
    String(String),
    /// Any other word
    Symbol(String),
    /// `;` comment, text after the semicolon
    Comment(String),
    /// End of file marker
    Eof,
}

/// Scanner for S-expression (LISP-style) program text
pub struct SExprScanner {
    /// Source code as character vector
    source: Vec<char>,
    /// Accumulated tokens
    tokens: Vec<Token<SExprTokenKind>>,
    /// Start position of current token
    start: usize,
    /// Current position in source
    current: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
    /// Column where the current token starts
    start_column: usize,
}

impl SExprScanner {
    /// Creates a new S-expression scanner from source code
    pub fn new(source: &str) -> Self {
        SExprScanner {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_column: 1,
        }
    }

    /// Scans all tokens from source code and returns them as a vector
    pub fn scan_tokens(&mut self) -> Result<Vec<Token<SExprTokenKind>>> {
        while !self.is_at_end() {
            self.start = self.current;
            self.start_column = self.column;
            self.scan_token()?;
        }

        self.tokens.push(Token::new(
            SExprTokenKind::Eof,
            String::new(),
            self.line,
            self.column,
        ));

        Ok(std::mem::take(&mut self.tokens))
    }

    fn scan_token(&mut self) -> Result<()> {
        let c = self.advance();

        match c {
            ' ' | '\r' | '\t' => {}
            '\n' => {
                self.line += 1;
                self.column = 1;
            }

            ';' => self.scan_comment(),

            '(' => self.add_token(SExprTokenKind::LeftParen),
            ')' => self.add_token(SExprTokenKind::RightParen),

            '"' => self.scan_string()?,

            c if c.is_control() => {
                return Err(self.error(format!("Unexpected character {:?}", c)));
            }

            _ => self.scan_word()?,
        }

        Ok(())
    }

    fn scan_comment(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
        let text: String = self.source[self.start + 1..self.current].iter().collect();
        self.add_token(SExprTokenKind::Comment(text.trim_end().to_string()));
    }

    fn scan_string(&mut self) -> Result<()> {
        let mut value = String::new();

        while !self.is_at_end() && self.peek() != '"' {
            if self.peek() == '\\' {
                self.advance();
                let escaped = self.advance();
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '\\' => value.push('\\'),
                    '"' => value.push('"'),
                    _ => {
                        return Err(self.error(format!("Invalid escape sequence \\{}", escaped)));
                    }
                }
            } else {
                if self.peek() == '\n' {
                    self.line += 1;
                    self.column = 0;
                }
                value.push(self.advance());
            }
        }

        if self.is_at_end() {
            return Err(self.error("Unterminated string"));
        }

        self.advance(); // Closing "

        self.add_token(SExprTokenKind::String(value));
        Ok(())
    }

    fn scan_word(&mut self) -> Result<()> {
        while !self.is_at_end() && !is_delimiter(self.peek()) {
            if self.peek().is_control() {
                let c = self.peek();
                return Err(self.error(format!("Unexpected character {:?}", c)));
            }
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let kind = if text == "." {
            SExprTokenKind::Dot
        } else if looks_like_integer(&text) {
            let value: BigInt = text
                .parse()
                .map_err(|_| self.error(format!("Invalid integer: {}", text)))?;
            SExprTokenKind::Integer(value)
        } else if let Some(digits) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            let padded = if digits.len() % 2 == 1 {
                format!("0{}", digits)
            } else {
                digits.to_string()
            };
            let bytes = hex::decode(&padded)
                .map_err(|e| self.error(format!("Invalid hex literal {}: {}", text, e)))?;
            SExprTokenKind::Hex(bytes)
        } else {
            SExprTokenKind::Symbol(text)
        };
        self.add_token(kind);
        Ok(())
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::LexError {
            line: self.line,
            col: self.start_column,
            message: message.into(),
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        self.column += 1;
        c
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source[self.current]
        }
    }

    fn add_token(&mut self, kind: SExprTokenKind) {
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        self.tokens
            .push(Token::new(kind, lexeme, self.line, self.start_column));
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';')
}
