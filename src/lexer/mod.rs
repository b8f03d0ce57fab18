//! Lexical analysis
//!
//! Two scanners share the [`Token`] shape: [`CoinScanner`] for CoinScript
//! source and [`SExprScanner`] for the target S-expression language.

mod coin_scanner;
mod sexpr_scanner;
mod token;

pub use coin_scanner::CoinScanner;
pub use sexpr_scanner::{SExprScanner, SExprTokenKind};
pub use token::{Token, TokenKind};
