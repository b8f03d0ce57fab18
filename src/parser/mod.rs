//! Parsers for both grammars
//!
//! - [`CoinParser`] turns CoinScript tokens into the [`Program`] AST.
//! - [`SExprParser`] turns target-language tokens into IR [`Node`] trees,
//!   optionally keeping comments for formatted re-serialization.

pub mod ast;
mod coin_parser;
mod sexpr_parser;

pub use ast::{
    Action, AssignOp, BinaryOp, CoinDecl, ConstDecl, Decorator, EventDecl, Expr, ExprKind,
    Include, Literal, Param, Program, Span, Stmt, StmtKind, TypeName, UnaryOp, VarDecl,
};
pub use coin_parser::CoinParser;
pub use sexpr_parser::{SExprParser, DEFAULT_MAX_DEPTH};

use crate::error::Result;
use crate::ir::{CommentMap, Node};
use crate::lexer::{CoinScanner, SExprScanner};

/// Parse exactly one S-expression
pub fn parse_sexpr(source: &str) -> Result<Node> {
    let tokens = SExprScanner::new(source).scan_tokens()?;
    SExprParser::new(tokens).parse()
}

/// Parse every top-level S-expression in `source`
pub fn parse_sexpr_all(source: &str) -> Result<Vec<Node>> {
    let tokens = SExprScanner::new(source).scan_tokens()?;
    SExprParser::new(tokens).parse_all()
}

/// Parse one S-expression and the comments attached inside it
pub fn parse_sexpr_with_comments(source: &str) -> Result<(Node, CommentMap)> {
    let tokens = SExprScanner::new(source).scan_tokens()?;
    SExprParser::new(tokens).parse_with_comments()
}

/// Parse a CoinScript compilation unit
pub fn parse_coinscript(source: &str) -> Result<Program> {
    let tokens = CoinScanner::new(source).scan_tokens()?;
    tracing::trace!(tokens = tokens.len(), "scanned CoinScript source");
    CoinParser::new(tokens).parse()
}
