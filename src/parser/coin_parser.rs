use super::ast::*;
use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind};

/// Deepest expression/block nesting accepted
const MAX_NESTING: usize = 128;

/// Recursive descent parser for CoinScript
pub struct CoinParser {
    tokens: Vec<Token>,
    current: usize,
    nesting: usize,
}

impl CoinParser {
    /// Creates a new parser over scanned tokens
    pub fn new(tokens: Vec<Token>) -> Self {
        CoinParser {
            tokens,
            current: 0,
            nesting: 0,
        }
    }

    /// Parses a whole compilation unit
    pub fn parse(&mut self) -> Result<Program> {
        let mut includes = Vec::new();
        while self.check(&TokenKind::Include) {
            includes.push(self.parse_include()?);
        }

        let decorators = self.parse_decorators()?;
        let coin = self.parse_coin(decorators)?;

        if !self.is_at_end() {
            return Err(self.expected_error("end of input after coin declaration"));
        }

        Ok(Program { includes, coin })
    }

    fn parse_include(&mut self) -> Result<Include> {
        let span = self.span();
        self.advance(); // include
        let name = match &self.peek().kind {
            TokenKind::String(name) => name.clone(),
            _ => return Err(self.expected_error("library name string after 'include'")),
        };
        self.advance();
        self.consume(TokenKind::Semicolon, "';' after include")?;
        Ok(Include { name, span })
    }

    fn parse_decorators(&mut self) -> Result<Vec<Decorator>> {
        let mut decorators = Vec::new();
        while self.check(&TokenKind::At) {
            let span = self.span();
            self.advance();
            let name = self.expect_identifier("decorator name after '@'")?;
            let mut args = Vec::new();
            if self.match_kind(&TokenKind::LeftParen) {
                args = self.parse_arguments()?;
            }
            decorators.push(Decorator { name, args, span });
        }
        Ok(decorators)
    }

    fn parse_coin(&mut self, decorators: Vec<Decorator>) -> Result<CoinDecl> {
        let span = self.span();
        self.consume(TokenKind::Coin, "'coin' declaration")?;
        let name = self.expect_identifier("coin name")?;
        self.consume(TokenKind::LeftBrace, "'{' after coin name")?;

        let mut coin = CoinDecl {
            name,
            storage: Vec::new(),
            state: Vec::new(),
            constants: Vec::new(),
            actions: Vec::new(),
            events: Vec::new(),
            decorators,
            span,
        };

        while !self.check(&TokenKind::RightBrace) {
            if self.is_at_end() {
                return Err(Error::UnexpectedEof {
                    expected: "'}' closing the coin declaration".to_string(),
                });
            }
            match self.peek().kind {
                TokenKind::Storage => {
                    self.advance();
                    let vars = self.parse_var_block()?;
                    coin.storage.extend(vars);
                }
                TokenKind::State => {
                    self.advance();
                    let vars = self.parse_var_block()?;
                    coin.state.extend(vars);
                }
                TokenKind::Const => coin.constants.push(self.parse_const()?),
                TokenKind::Event => coin.events.push(self.parse_event()?),
                TokenKind::At | TokenKind::Action => {
                    let decorators = self.parse_decorators()?;
                    coin.actions.push(self.parse_action(decorators)?);
                }
                _ => {
                    return Err(self.expected_error(
                        "'storage', 'state', 'const', 'event' or 'action' inside coin body",
                    ))
                }
            }
        }
        self.advance(); // }

        Ok(coin)
    }

    /// `{ T a; T b = 1; }` or a single `T a;`
    fn parse_var_block(&mut self) -> Result<Vec<VarDecl>> {
        if !self.match_kind(&TokenKind::LeftBrace) {
            return Ok(vec![self.parse_var_decl()?]);
        }
        let mut vars = Vec::new();
        while !self.match_kind(&TokenKind::RightBrace) {
            if self.is_at_end() {
                return Err(Error::UnexpectedEof {
                    expected: "'}' closing variable block".to_string(),
                });
            }
            vars.push(self.parse_var_decl()?);
        }
        Ok(vars)
    }

    fn parse_var_decl(&mut self) -> Result<VarDecl> {
        let span = self.span();
        let ty = self.parse_type()?;
        let name = self.expect_identifier("variable name")?;
        let init = if self.match_kind(&TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "';' after variable declaration")?;
        Ok(VarDecl {
            name,
            ty,
            init,
            span,
        })
    }

    fn parse_const(&mut self) -> Result<ConstDecl> {
        let span = self.span();
        self.advance(); // const
        let ty = self.parse_type()?;
        let name = self.expect_identifier("constant name")?;
        self.consume(TokenKind::Assign, "'=' in constant declaration")?;
        let value = self.parse_expression()?;
        self.consume(TokenKind::Semicolon, "';' after constant declaration")?;
        Ok(ConstDecl {
            name,
            ty,
            value,
            span,
        })
    }

    fn parse_event(&mut self) -> Result<EventDecl> {
        let span = self.span();
        self.advance(); // event
        let name = self.expect_identifier("event name")?;
        self.consume(TokenKind::LeftParen, "'(' after event name")?;
        let params = self.parse_params()?;
        self.consume(TokenKind::Semicolon, "';' after event declaration")?;
        Ok(EventDecl { name, params, span })
    }

    fn parse_action(&mut self, decorators: Vec<Decorator>) -> Result<Action> {
        let span = decorators.first().map(|d| d.span).unwrap_or_else(|| self.span());
        self.consume(TokenKind::Action, "'action' after decorators")?;
        let name = self.expect_identifier("action name")?;
        self.consume(TokenKind::LeftParen, "'(' after action name")?;
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        Ok(Action {
            name,
            params,
            body,
            decorators,
            span,
        })
    }

    /// Typed parameter list after the opening `(`, through the closing `)`
    fn parse_params(&mut self) -> Result<Vec<Param>> {
        let mut params = Vec::new();
        if self.match_kind(&TokenKind::RightParen) {
            return Ok(params);
        }
        loop {
            let span = self.span();
            let ty = self.parse_type()?;
            let name = self.expect_identifier("parameter name")?;
            params.push(Param { name, ty, span });
            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RightParen, "')' after parameters")?;
        Ok(params)
    }

    fn parse_type(&mut self) -> Result<TypeName> {
        if self.match_kind(&TokenKind::Mapping) {
            self.consume(TokenKind::LeftParen, "'(' after 'mapping'")?;
            let key = self.parse_type()?;
            self.consume(TokenKind::FatArrow, "'=>' in mapping type")?;
            let value = self.parse_type()?;
            self.consume(TokenKind::RightParen, "')' closing mapping type")?;
            return Ok(TypeName::Mapping(Box::new(key), Box::new(value)));
        }
        let ty = match &self.peek().kind {
            TokenKind::Identifier(name) => TypeName::from_name(name),
            _ => None,
        };
        match ty {
            Some(ty) => {
                self.advance();
                Ok(ty)
            }
            None => Err(self.expected_error(
                "type (uint256, int, address, bytes32, bytes, string, bool or mapping)",
            )),
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.consume(TokenKind::LeftBrace, "'{' to open a block")?;
        self.enter()?;
        let mut stmts = Vec::new();
        while !self.match_kind(&TokenKind::RightBrace) {
            if self.is_at_end() {
                return Err(Error::UnexpectedEof {
                    expected: "'}' closing block".to_string(),
                });
            }
            stmts.push(self.parse_statement()?);
        }
        self.leave();
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        let span = self.span();
        let kind = match self.peek().kind {
            TokenKind::Require => self.parse_require()?,
            TokenKind::Send => self.parse_send()?,
            TokenKind::Emit => self.parse_emit()?,
            TokenKind::If => self.parse_if()?,
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume(TokenKind::Semicolon, "';' after return")?;
                StmtKind::Return(value)
            }
            _ if self.at_local_declaration() => {
                let ty = self.parse_type()?;
                let name_span = self.span();
                let name = self.expect_identifier("local variable name")?;
                self.consume(TokenKind::Assign, "'=' initializing local variable")?;
                let value = self.parse_expression()?;
                self.consume(TokenKind::Semicolon, "';' after local declaration")?;
                StmtKind::Assign {
                    target: Expr::new(ExprKind::Identifier(name), name_span),
                    op: AssignOp::Set,
                    value,
                    declared: Some(ty),
                }
            }
            _ => self.parse_expression_statement()?,
        };
        Ok(Stmt { kind, span })
    }

    /// `uint256 x = ...` starts with a type name followed by a name
    fn at_local_declaration(&self) -> bool {
        let is_type = match &self.peek().kind {
            TokenKind::Identifier(name) => TypeName::from_name(name).is_some(),
            TokenKind::Mapping => true,
            _ => false,
        };
        is_type && matches!(self.peek_next().kind, TokenKind::Identifier(_))
    }

    fn parse_require(&mut self) -> Result<StmtKind> {
        self.advance(); // require
        self.consume(TokenKind::LeftParen, "'(' after 'require'")?;
        let condition = self.parse_expression()?;
        let message = if self.match_kind(&TokenKind::Comma) {
            match &self.peek().kind {
                TokenKind::String(text) => {
                    let text = text.clone();
                    self.advance();
                    Some(text)
                }
                _ => return Err(self.expected_error("message string in require")),
            }
        } else {
            None
        };
        self.consume(TokenKind::RightParen, "')' closing require")?;
        self.consume(TokenKind::Semicolon, "';' after require")?;
        Ok(StmtKind::Require { condition, message })
    }

    fn parse_send(&mut self) -> Result<StmtKind> {
        let span = self.span();
        self.advance(); // send
        self.consume(TokenKind::LeftParen, "'(' after 'send'")?;
        let mut args = self.parse_arguments()?;
        self.consume(TokenKind::Semicolon, "';' after send")?;
        if args.len() < 2 || args.len() > 3 {
            return Err(Error::parse(
                span.line,
                span.column,
                format!(
                    "send takes (recipient, amount[, memo]), found {} arguments",
                    args.len()
                ),
            ));
        }
        let memo = if args.len() == 3 { args.pop() } else { None };
        let amount = args.pop();
        let to = args.pop();
        match (to, amount) {
            (Some(to), Some(amount)) => Ok(StmtKind::Send { to, amount, memo }),
            _ => Err(Error::parse(span.line, span.column, "send is missing arguments")),
        }
    }

    fn parse_emit(&mut self) -> Result<StmtKind> {
        self.advance(); // emit
        let event = self.expect_identifier("event name after 'emit'")?;
        self.consume(TokenKind::LeftParen, "'(' after event name")?;
        let args = self.parse_arguments()?;
        self.consume(TokenKind::Semicolon, "';' after emit")?;
        Ok(StmtKind::Emit { event, args })
    }

    fn parse_if(&mut self) -> Result<StmtKind> {
        self.advance(); // if
        self.consume(TokenKind::LeftParen, "'(' after 'if'")?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "')' after if condition")?;
        let then_branch = self.parse_block()?;

        let else_branch = if self.match_kind(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                let span = self.span();
                self.enter()?;
                let nested = self.parse_if()?;
                self.leave();
                Some(vec![Stmt { kind: nested, span }])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(StmtKind::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_expression_statement(&mut self) -> Result<StmtKind> {
        let target = self.parse_expression()?;
        let op = match self.peek().kind {
            TokenKind::Assign => Some(AssignOp::Set),
            TokenKind::PlusAssign => Some(AssignOp::Add),
            TokenKind::MinusAssign => Some(AssignOp::Sub),
            TokenKind::StarAssign => Some(AssignOp::Mul),
            TokenKind::SlashAssign => Some(AssignOp::Div),
            _ => None,
        };

        let kind = match op {
            Some(op) => {
                self.advance();
                let value = self.parse_expression()?;
                StmtKind::Assign {
                    target,
                    op,
                    value,
                    declared: None,
                }
            }
            None => StmtKind::Expr(target),
        };
        self.consume(TokenKind::Semicolon, "';' after statement")?;
        Ok(kind)
    }

    /// Comma-separated expressions after `(`, through the closing `)`
    fn parse_arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.match_kind(&TokenKind::RightParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RightParen, "')' after arguments")?;
        Ok(args)
    }

    // Expression grammar, lowest precedence first:
    //   || → && → == != → < > <= >= → + - → * / % → ! - → call/member → primary

    fn parse_expression(&mut self) -> Result<Expr> {
        self.enter()?;
        let expr = self.parse_or();
        self.leave();
        expr
    }

    fn parse_or(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_and, |kind| match kind {
            TokenKind::OrOr => Some(BinaryOp::Or),
            _ => None,
        })
    }

    fn parse_and(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_equality, |kind| match kind {
            TokenKind::AndAnd => Some(BinaryOp::And),
            _ => None,
        })
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_comparison, |kind| match kind {
            TokenKind::Eq => Some(BinaryOp::Eq),
            TokenKind::NotEq => Some(BinaryOp::NotEq),
            _ => None,
        })
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_term, |kind| match kind {
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::LtEq => Some(BinaryOp::LtEq),
            TokenKind::GtEq => Some(BinaryOp::GtEq),
            _ => None,
        })
    }

    fn parse_term(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_factor, |kind| match kind {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        self.parse_binary(Self::parse_unary, |kind| match kind {
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Mod),
            _ => None,
        })
    }

    /// One left-associative precedence level. Every folded operator deepens
    /// the tree, so each one counts toward the nesting limit.
    fn parse_binary(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr>,
        operator: fn(&TokenKind) -> Option<BinaryOp>,
    ) -> Result<Expr> {
        let mut left = operand(self)?;
        let mut folded = 0;
        let result = loop {
            let op = match operator(&self.peek().kind) {
                Some(op) => op,
                None => break Ok(left),
            };
            if let Err(err) = self.enter() {
                break Err(err);
            }
            folded += 1;
            self.advance();
            match operand(self) {
                Ok(right) => left = binary(op, left, right),
                Err(err) => break Err(err),
            }
        };
        for _ in 0..folded {
            self.leave();
        }
        result
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let span = self.span();
        let op = match self.peek().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_postfix(),
        };
        self.advance();
        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand?),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        let mut chained = 0;
        let result = loop {
            let is_member = self.check(&TokenKind::Dot);
            if !is_member && !self.check(&TokenKind::LeftParen) {
                break Ok(expr);
            }
            if let Err(err) = self.enter() {
                break Err(err);
            }
            chained += 1;
            let span = expr.span;
            if is_member {
                self.advance();
                match self.expect_identifier("field name after '.'") {
                    Ok(field) => {
                        expr = Expr::new(
                            ExprKind::Member {
                                object: Box::new(expr),
                                field,
                            },
                            span,
                        )
                    }
                    Err(err) => break Err(err),
                }
            } else {
                let callee = match &expr.kind {
                    ExprKind::Identifier(name) => name.clone(),
                    _ => break Err(self.syntax_error("Only named functions can be called")),
                };
                self.advance();
                match self.parse_arguments() {
                    Ok(args) => expr = Expr::new(ExprKind::Call { callee, args }, span),
                    Err(err) => break Err(err),
                }
            }
        };
        for _ in 0..chained {
            self.leave();
        }
        result
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let span = self.span();
        let kind = match self.peek().kind.clone() {
            TokenKind::Integer(value) => ExprKind::Literal(Literal::Int(value)),
            TokenKind::Hex(bytes) => ExprKind::Literal(Literal::Bytes(bytes)),
            TokenKind::String(text) => ExprKind::Literal(Literal::Str(text)),
            TokenKind::True => ExprKind::Literal(Literal::Bool(true)),
            TokenKind::False => ExprKind::Literal(Literal::Bool(false)),
            TokenKind::Identifier(name) => ExprKind::Identifier(name),
            // `state.field` reads a state variable explicitly
            TokenKind::State if matches!(self.peek_next().kind, TokenKind::Dot) => {
                ExprKind::Identifier("state".to_string())
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RightParen, "')' after expression")?;
                return Ok(inner);
            }
            TokenKind::Eof => {
                return Err(Error::UnexpectedEof {
                    expected: "expression".to_string(),
                })
            }
            _ => return Err(self.expected_error("expression")),
        };
        self.advance();
        Ok(Expr::new(kind, span))
    }

    fn enter(&mut self) -> Result<()> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(Error::NestingTooDeep { limit: MAX_NESTING });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
    }

    fn span(&self) -> Span {
        let token = self.peek();
        Span::new(token.line, token.column)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        let index = self.current.min(self.tokens.len().saturating_sub(1));
        &self.tokens[index]
    }

    fn peek_next(&self) -> &Token {
        let index = (self.current + 1).min(self.tokens.len().saturating_sub(1));
        &self.tokens[index]
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.current += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, expected: &str) -> Result<()> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.expected_error(expected))
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> Result<String> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.expected_error(expected)),
        }
    }

    fn syntax_error(&self, message: impl Into<String>) -> Error {
        let token = self.peek();
        Error::parse(token.line, token.column, message)
    }

    /// Helper to create an error with expected/found pattern
    fn expected_error(&self, expected: &str) -> Error {
        let token = self.peek();
        if matches!(token.kind, TokenKind::Eof) {
            return Error::UnexpectedEof {
                expected: expected.to_string(),
            };
        }
        self.syntax_error(format!("Expected {}, found '{}'", expected, token.lexeme))
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let span = left.span;
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::CoinScanner;

    fn parse(source: &str) -> Result<Program> {
        let tokens = CoinScanner::new(source).scan_tokens()?;
        CoinParser::new(tokens).parse()
    }

    const WALLET: &str = r#"
        include "sha256tree.clib";

        coin Wallet {
            storage address owner = 0xaaaa;
            state {
                uint256 balance;
                mapping(address => uint256) allowances;
            }
            const uint256 FEE = 10;
            event Paid(address to, uint256 amount);

            @onlyAddress(owner)
            action pay(address to, uint256 amount) {
                require(amount > FEE, "too small");
                balance -= amount;
                send(to, amount - FEE);
                emit Paid(to, amount);
            }
        }
    "#;

    #[test]
    fn test_parse_full_coin() {
        let program = parse(WALLET).unwrap();
        assert_eq!(program.includes[0].name, "sha256tree.clib");
        let coin = program.coin;
        assert_eq!(coin.name, "Wallet");
        assert_eq!(coin.storage.len(), 1);
        assert_eq!(coin.state.len(), 2);
        assert!(matches!(coin.state[1].ty, TypeName::Mapping(_, _)));
        assert_eq!(coin.constants[0].name, "FEE");
        assert_eq!(coin.events[0].params.len(), 2);

        let pay = coin.action("pay").unwrap();
        assert_eq!(pay.decorators[0].name, "onlyAddress");
        assert_eq!(pay.params.len(), 2);
        assert_eq!(pay.body.len(), 4);
        assert!(matches!(
            pay.body[1].kind,
            StmtKind::Assign {
                op: AssignOp::Sub,
                ..
            }
        ));
    }

    #[test]
    fn test_precedence() {
        let program = parse(
            "coin C { action spend() { require(1 + 2 * 3 == 7 && !false || x < 2); } }",
        )
        .unwrap();
        let StmtKind::Require { condition, .. } = &program.coin.actions[0].body[0].kind else {
            panic!("expected require");
        };
        let ExprKind::Binary { op, left, .. } = &condition.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Or);
        let ExprKind::Binary { op, left, .. } = &left.kind else {
            panic!("expected and");
        };
        assert_eq!(*op, BinaryOp::And);
        let ExprKind::Binary { op, left, .. } = &left.kind else {
            panic!("expected eq");
        };
        assert_eq!(*op, BinaryOp::Eq);
        let ExprKind::Binary { op, right, .. } = &left.kind else {
            panic!("expected add");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            right.kind,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_member_access_and_locals() {
        let program = parse(
            r#"coin C {
                state uint256 count;
                action spend(uint256 n) {
                    uint256 next = state.count + n;
                    require(msg.sender == 0x01);
                    if (next > 3) { count = next; } else if (next > 1) { return; } else { count += 1; }
                }
            }"#,
        )
        .unwrap();
        let body = &program.coin.actions[0].body;
        assert!(matches!(
            &body[0].kind,
            StmtKind::Assign { declared: Some(TypeName::Uint256), .. }
        ));
        let StmtKind::Require { condition, .. } = &body[1].kind else {
            panic!("expected require");
        };
        let ExprKind::Binary { left, .. } = &condition.kind else {
            panic!("expected binary");
        };
        assert!(left.is_msg_sender());
        let StmtKind::If { else_branch, .. } = &body[2].kind else {
            panic!("expected if");
        };
        assert!(matches!(
            else_branch.as_ref().unwrap()[0].kind,
            StmtKind::If { .. }
        ));
    }

    #[test]
    fn test_storage_block_and_singleton() {
        let program = parse(
            "@singleton coin S { storage { address a; bytes32 b = 0x01; } action spend() {} }",
        )
        .unwrap();
        assert!(program.coin.has_decorator("singleton"));
        assert_eq!(program.coin.storage.len(), 2);
        assert!(program.coin.storage[1].init.is_some());
    }

    #[test]
    fn test_parse_errors_report_position() {
        let err = parse("coin C {\n  action spend( { }\n}").unwrap_err();
        assert!(matches!(err, Error::ParseError { line: 2, .. }));

        assert!(matches!(
            parse("coin C { action spend() { require(true) } }"),
            Err(Error::ParseError { .. })
        ));
        assert!(matches!(
            parse("coin C { action spend() {"),
            Err(Error::UnexpectedEof { .. })
        ));
        assert!(matches!(
            parse("coin C { storage foo x; }"),
            Err(Error::ParseError { .. })
        ));
        assert!(parse("coin C { action spend() { send(a); } }").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!(
            "coin C {{ action spend() {{ require({}true{}); }} }}",
            "(".repeat(200),
            ")".repeat(200)
        );
        assert!(matches!(
            parse(&deep),
            Err(Error::NestingTooDeep { .. })
        ));
    }

    #[test]
    fn test_operator_chains_count_toward_nesting() {
        let chain = |terms: usize| {
            format!(
                "coin C {{ action spend() {{ require({} > 0); }} }}",
                vec!["1"; terms].join(" + ")
            )
        };
        assert!(parse(&chain(50)).is_ok());
        assert!(matches!(
            parse(&chain(5_000)),
            Err(Error::NestingTooDeep { limit: MAX_NESTING })
        ));

        let members = format!(
            "coin C {{ action spend() {{ require(msg{} == 1); }} }}",
            ".sender".repeat(5_000)
        );
        assert!(matches!(
            parse(&members),
            Err(Error::NestingTooDeep { .. })
        ));
    }
}
