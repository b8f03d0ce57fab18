use super::token::{Token, TokenKind};
use crate::error::{Error, Result};
use num_bigint::BigInt;

/// Scanner for CoinScript source
pub struct CoinScanner {
    /// Source code as character vector
    source: Vec<char>,
    /// Accumulated tokens
    tokens: Vec<Token>,
    /// Start position of current token
    start: usize,
    /// Current position in source
    current: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
    /// Line where the current token starts
    start_line: usize,
    /// Column where the current token starts
    start_column: usize,
}

impl CoinScanner {
    /// Creates a new scanner from source code
    pub fn new(source: &str) -> Self {
        CoinScanner {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Scans all tokens from source code and returns them as a vector
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>> {
        while !self.is_at_end() {
            self.start = self.current;
            self.start_line = self.line;
            self.start_column = self.column;
            self.scan_token()?;
        }

        self.tokens.push(Token::new(
            TokenKind::Eof,
            String::new(),
            self.line,
            self.column,
        ));

        Ok(std::mem::take(&mut self.tokens))
    }

    fn scan_token(&mut self) -> Result<()> {
        let c = self.advance();

        match c {
            ' ' | '\r' | '\t' | '\n' => {}

            '/' => {
                if self.match_char('/') {
                    self.skip_line_comment();
                } else if self.match_char('*') {
                    self.skip_block_comment()?;
                } else if self.match_char('=') {
                    self.add_token(TokenKind::SlashAssign);
                } else {
                    self.add_token(TokenKind::Slash);
                }
            }

            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            '{' => self.add_token(TokenKind::LeftBrace),
            '}' => self.add_token(TokenKind::RightBrace),
            ',' => self.add_token(TokenKind::Comma),
            '.' => self.add_token(TokenKind::Dot),
            ';' => self.add_token(TokenKind::Semicolon),
            '@' => self.add_token(TokenKind::At),
            '%' => self.add_token(TokenKind::Percent),

            '+' => {
                let kind = if self.match_char('=') {
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                };
                self.add_token(kind);
            }
            '-' => {
                let kind = if self.match_char('=') {
                    TokenKind::MinusAssign
                } else {
                    TokenKind::Minus
                };
                self.add_token(kind);
            }
            '*' => {
                let kind = if self.match_char('=') {
                    TokenKind::StarAssign
                } else {
                    TokenKind::Star
                };
                self.add_token(kind);
            }
            '=' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::Eq);
                } else if self.match_char('>') {
                    self.add_token(TokenKind::FatArrow);
                } else {
                    self.add_token(TokenKind::Assign);
                }
            }
            '!' => {
                let kind = if self.match_char('=') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.match_char('=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.match_char('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                };
                self.add_token(kind);
            }
            '&' if self.match_char('&') => self.add_token(TokenKind::AndAnd),
            '|' if self.match_char('|') => self.add_token(TokenKind::OrOr),

            '"' => self.scan_string()?,

            '0' if matches!(self.peek(), 'x' | 'X') => self.scan_hex()?,
            c if c.is_ascii_digit() => self.scan_number()?,

            c if c.is_alphabetic() || c == '_' => self.scan_identifier_or_keyword(),

            _ => return Err(self.error(format!("Unexpected character '{}'", c))),
        }

        Ok(())
    }

    fn skip_line_comment(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        while !self.is_at_end() {
            if self.peek() == '*' && self.peek_next() == '/' {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }
        Err(self.error("Unterminated block comment"))
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
                value.push(self.advance());
            }
        }

        if self.is_at_end() {
            return Err(self.error("Unterminated string"));
        }

        self.advance(); // Closing "

        self.add_token(TokenKind::String(value));
        Ok(())
    }

    fn scan_hex(&mut self) -> Result<()> {
        self.advance(); // x
        let mut digits = String::new();
        while self.peek().is_ascii_hexdigit() || self.peek() == '_' {
            let c = self.advance();
            if c != '_' {
                digits.push(c);
            }
        }
        if digits.is_empty() {
            return Err(self.error("Hex literal needs at least one digit"));
        }
        if digits.len() % 2 == 1 {
            digits.insert(0, '0');
        }
        let bytes = hex::decode(&digits)
            .map_err(|e| self.error(format!("Invalid hex literal: {}", e)))?;
        self.add_token(TokenKind::Hex(bytes));
        Ok(())
    }

    fn scan_number(&mut self) -> Result<()> {
        while self.peek().is_ascii_digit() || self.peek() == '_' {
            self.advance();
        }

        let text: String = self.source[self.start..self.current]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        let value: BigInt = text
            .parse()
            .map_err(|_| self.error(format!("Invalid integer: {}", text)))?;
        self.add_token(TokenKind::Integer(value));
        Ok(())
    }

    fn scan_identifier_or_keyword(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let kind = TokenKind::keyword(&text).unwrap_or(TokenKind::Identifier(text));
        self.add_token(kind);
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::LexError {
            line: self.start_line,
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
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source[self.current]
        }
    }

    fn peek_next(&self) -> char {
        if self.current + 1 >= self.source.len() {
            '\0'
        } else {
            self.source[self.current + 1]
        }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            false
        } else {
            self.advance();
            true
        }
    }

    fn add_token(&mut self, kind: TokenKind) {
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(
            kind,
            lexeme,
            self.start_line,
            self.start_column,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        CoinScanner::new(source)
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_declaration_tokens() {
        let tokens = kinds("storage address owner = 0xABCD;");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Storage,
                TokenKind::Identifier("address".into()),
                TokenKind::Identifier("owner".into()),
                TokenKind::Assign,
                TokenKind::Hex(vec![0xab, 0xcd]),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("a += b && c || !d >= e => f != g");
        assert!(tokens.contains(&TokenKind::PlusAssign));
        assert!(tokens.contains(&TokenKind::AndAnd));
        assert!(tokens.contains(&TokenKind::OrOr));
        assert!(tokens.contains(&TokenKind::Bang));
        assert!(tokens.contains(&TokenKind::GtEq));
        assert!(tokens.contains(&TokenKind::FatArrow));
        assert!(tokens.contains(&TokenKind::NotEq));
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = kinds("// line\n/* block\n comment */ coin");
        assert_eq!(tokens, vec![TokenKind::Coin, TokenKind::Eof]);
    }

    #[test]
    fn test_positions_are_token_starts() {
        let tokens = CoinScanner::new("coin\n  Foo").scan_tokens().unwrap();
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
    }

    #[test]
    fn test_numbers_and_odd_hex() {
        let tokens = kinds("1_000 0xabc");
        assert_eq!(tokens[0], TokenKind::Integer(1000.into()));
        assert_eq!(tokens[1], TokenKind::Hex(vec![0x0a, 0xbc]));
    }

    #[test]
    fn test_lex_errors_carry_position() {
        let err = CoinScanner::new("coin #").scan_tokens().unwrap_err();
        assert!(matches!(err, Error::LexError { line: 1, col: 6, .. }));
        assert!(CoinScanner::new("\"open").scan_tokens().is_err());
        assert!(CoinScanner::new("/* never closed").scan_tokens().is_err());
        assert!(CoinScanner::new("a & b").scan_tokens().is_err());
    }
}
