use crate::error::{Error, Result};
use crate::ir::{CommentMap, Node};
use crate::lexer::{SExprTokenKind, Token};

/// Deepest list nesting accepted by default
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Recursive descent parser for the target S-expression language
///
/// Produces IR trees. Comments are collected into a [`CommentMap`] keyed by
/// the list-index path of the element that follows them.
pub struct SExprParser {
    tokens: Vec<Token<SExprTokenKind>>,
    current: usize,
    max_depth: usize,
    path: Vec<usize>,
    comments: CommentMap,
    recording: bool,
}

impl SExprParser {
    /// Creates a new S-expression parser
    pub fn new(tokens: Vec<Token<SExprTokenKind>>) -> Self {
        SExprParser {
            tokens,
            current: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            path: Vec::new(),
            comments: CommentMap::new(),
            recording: true,
        }
    }

    /// Overrides the list nesting limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parses exactly one expression
    pub fn parse(&mut self) -> Result<Node> {
        self.parse_with_comments().map(|(node, _)| node)
    }

    /// Parses exactly one expression, keeping its comments
    pub fn parse_with_comments(&mut self) -> Result<(Node, CommentMap)> {
        let leading = self.take_comments();
        if !leading.is_empty() {
            self.comments.insert(Vec::new(), leading);
        }

        let node = self.parse_expression(0)?;

        // Comments after the last expression have nothing to attach to
        self.take_comments();
        if !self.is_at_end() {
            return Err(self.syntax_error(format!(
                "Expected end of input after expression, found {}",
                describe(&self.peek().kind)
            )));
        }

        Ok((node, std::mem::take(&mut self.comments)))
    }

    /// Parses every top-level expression, discarding comments
    pub fn parse_all(&mut self) -> Result<Vec<Node>> {
        self.recording = false;
        let mut nodes = Vec::new();
        loop {
            self.take_comments();
            if self.is_at_end() {
                break;
            }
            nodes.push(self.parse_expression(0)?);
        }
        Ok(nodes)
    }

    fn parse_expression(&mut self, depth: usize) -> Result<Node> {
        let token = self.peek().clone();
        let node = match token.kind {
            SExprTokenKind::LeftParen => return self.parse_list(depth + 1),
            SExprTokenKind::Integer(value) => Node::int(value),
            SExprTokenKind::Hex(bytes) => Node::bytes(bytes),
            SExprTokenKind::String(text) => Node::string(&text),
            SExprTokenKind::Symbol(name) => Node::symbol(&name),
            SExprTokenKind::Eof => {
                return Err(Error::UnexpectedEof {
                    expected: "expression".to_string(),
                })
            }
            other => {
                return Err(self.syntax_error(format!(
                    "Unexpected {} in expression",
                    describe(&other)
                )))
            }
        };
        self.advance();
        Ok(node)
    }

    fn parse_list(&mut self, depth: usize) -> Result<Node> {
        if depth > self.max_depth {
            return Err(Error::NestingTooDeep {
                limit: self.max_depth,
            });
        }
        self.advance(); // (

        let mut items = Vec::new();
        let mut tail = Node::nil();
        loop {
            let lines = self.take_comments();
            if !lines.is_empty() && self.recording {
                let mut key = self.path.clone();
                key.push(items.len());
                self.comments.insert(key, lines);
            }

            match self.peek().kind {
                SExprTokenKind::RightParen => {
                    self.advance();
                    break;
                }
                SExprTokenKind::Dot => {
                    if items.is_empty() {
                        return Err(self.syntax_error("Dotted pair needs a head before '.'"));
                    }
                    self.advance();
                    self.take_comments();

                    let recording = std::mem::replace(&mut self.recording, false);
                    let parsed = self.parse_expression(depth);
                    self.recording = recording;
                    tail = parsed?;

                    self.take_comments();
                    self.consume_right_paren("after dotted tail")?;
                    break;
                }
                SExprTokenKind::Eof => {
                    return Err(Error::UnexpectedEof {
                        expected: "')'".to_string(),
                    })
                }
                _ => {
                    self.path.push(items.len());
                    let item = self.parse_expression(depth);
                    self.path.pop();
                    items.push(item?);
                }
            }
        }

        Ok(Node::list_with_tail(items, tail))
    }

    fn take_comments(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let SExprTokenKind::Comment(text) = &self.peek().kind {
            lines.push(text.clone());
            self.advance();
        }
        lines
    }

    fn consume_right_paren(&mut self, context: &str) -> Result<()> {
        match self.peek().kind {
            SExprTokenKind::RightParen => {
                self.advance();
                Ok(())
            }
            SExprTokenKind::Eof => Err(Error::UnexpectedEof {
                expected: format!("')' {}", context),
            }),
            ref other => Err(self.syntax_error(format!(
                "Expected ')' {}, found {}",
                context,
                describe(other)
            ))),
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, SExprTokenKind::Eof)
    }

    fn peek(&self) -> &Token<SExprTokenKind> {
        // The scanner always terminates the stream with Eof
        let index = self.current.min(self.tokens.len().saturating_sub(1));
        &self.tokens[index]
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.current += 1;
        }
    }

    fn syntax_error(&self, message: impl Into<String>) -> Error {
        let token = self.peek();
        Error::parse(token.line, token.column, message)
    }
}

fn describe(kind: &SExprTokenKind) -> String {
    match kind {
        SExprTokenKind::LeftParen => "'('".to_string(),
        SExprTokenKind::RightParen => "')'".to_string(),
        SExprTokenKind::Dot => "'.'".to_string(),
        SExprTokenKind::Integer(n) => format!("integer {}", n),
        SExprTokenKind::Hex(bytes) => format!("hex 0x{}", hex::encode(bytes)),
        SExprTokenKind::String(s) => format!("string \"{}\"", s),
        SExprTokenKind::Symbol(s) => format!("symbol '{}'", s),
        SExprTokenKind::Comment(_) => "comment".to_string(),
        SExprTokenKind::Eof => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Serializer;
    use crate::lexer::SExprScanner;

    fn parser(source: &str) -> SExprParser {
        SExprParser::new(SExprScanner::new(source).scan_tokens().unwrap())
    }

    #[test]
    fn test_parse_list_and_dotted_pair() {
        let node = parser("(a (q . 5) \"s\" 0xff -3)").parse().unwrap();
        let items = node.as_list().unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[1].first(), Some(&Node::symbol("q")));
        assert_eq!(items[1].rest(), Some(&Node::int(5)));
        assert_eq!(items[3], &Node::bytes(vec![0xff]));
        assert_eq!(items[4].as_int(), Some((-3).into()));
    }

    #[test]
    fn test_dotted_list_tail_normalizes() {
        let dotted = parser("(a . (b c))").parse().unwrap();
        let plain = parser("(a b c)").parse().unwrap();
        assert_eq!(dotted, plain);
    }

    #[test]
    fn test_comment_paths() {
        let source = "; header\n(mod (A)\n  ; body\n  (f A)\n  ; end\n)";
        let (node, comments) = parser(source).parse_with_comments().unwrap();
        assert_eq!(comments.get(&vec![]), Some(&vec![" header".to_string()]));
        assert_eq!(comments.get(&vec![2]), Some(&vec![" body".to_string()]));
        assert_eq!(comments.get(&vec![3]), Some(&vec![" end".to_string()]));

        let text = Serializer::formatted().render_with_comments(&node, &comments);
        let (again, comments_again) = parser(&text).parse_with_comments().unwrap();
        assert_eq!(again, node);
        assert_eq!(comments_again, comments);
    }

    #[test]
    fn test_parse_all() {
        let nodes = parser("(a) ; x\n b (c d)").parse_all().unwrap();
        assert_eq!(nodes.len(), 3);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parser("(a b").parse(),
            Err(Error::UnexpectedEof { .. })
        ));
        assert!(matches!(parser(")").parse(), Err(Error::ParseError { .. })));
        assert!(matches!(parser("(. a)").parse(), Err(Error::ParseError { .. })));
        assert!(matches!(parser("(a . b c)").parse(), Err(Error::ParseError { .. })));
        assert!(matches!(parser("a b").parse(), Err(Error::ParseError { .. })));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}{}", "(".repeat(20), ")".repeat(20));
        let result = parser(&deep).with_max_depth(10).parse();
        assert!(matches!(result, Err(Error::NestingTooDeep { limit: 10 })));
        assert!(parser(&deep).parse().is_ok());
    }
}
