//! # CoinScript - A Typed Language for Smart Coins
//!
//! CoinScript compiles a Solidity-flavoured coin declaration into a curried
//! S-expression module for a coin-set blockchain VM, together with the
//! identity hashes, solution layouts and state encoding a wallet needs to
//! spend it.
//!
//! ## Quick Start
//!
//! ```rust
//! use coinscript::builder::Value;
//! use coinscript::{CompileOptions, Compiler};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = r#"
//!     coin Wallet {
//!         storage address owner;
//!
//!         action spend(address to, uint256 amount) {
//!             require(msg.sender == owner, "only the owner may spend");
//!             send(to, amount);
//!         }
//!     }
//! "#;
//!
//! let owner = Value::hex(format!("0x{}", "ab".repeat(32)));
//! let compiler = Compiler::new(CompileOptions::default());
//! let result = compiler.compile_with_storage(source, &[("owner", owner)])?;
//!
//! // `owner` is curried: it is part of the puzzle hash, not the solution
//! assert_eq!(result.curried_params[0].name, "OWNER");
//! let template = result.solution_template.action("spend").unwrap();
//! assert_eq!(template.parameters, vec!["to", "amount"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Source → CoinScanner → CoinParser → AST → Analyzer → CodeGenerator → Puzzle
//!                                                                     ↓
//!                                              tree hash, curry, merkle root
//! ```
//!
//! ### Main Components
//!
//! - [`ir`] - the S-expression tree every other layer reads or writes
//! - [`hash`] - tree hashing and curry hashing
//! - [`parser`] - CoinScript and S-expression parsers
//! - [`analyzer`] - scoping, typing and decorator checks
//! - [`builder`] - order-preserving module and solution construction
//! - [`compiler`] - the pipeline and its [`CompileResult`]
//! - [`merkle`] - action merkle tree for large coins
//! - [`state`] - threaded state payloads
//! - [`repository`] - reference programs and address decoding
//!
//! ## Error Handling
//!
//! Every fallible call returns [`Result`]. Semantic problems are collected
//! and reported together:
//!
//! ```rust
//! use coinscript::{CompileOptions, Compiler, Error};
//!
//! let err = Compiler::new(CompileOptions::default())
//!     .compile("coin Empty { storage uint256 x = 1; }")
//!     .unwrap_err();
//! assert!(matches!(err, Error::Semantic(_)));
//! assert_eq!(err.diagnostics().len(), 1);
//! ```

#![allow(clippy::result_large_err)] // Error carries full diagnostics by value
#![allow(clippy::needless_range_loop)] // Index needed for error messages

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod analyzer;
pub mod builder;
pub mod compiler;
pub mod conditions;
pub mod error;
pub mod hash;
pub mod ir;
pub mod lexer;
pub mod merkle;
pub mod parser;
pub mod repository;
pub mod state;

// Re-export main types
pub use compiler::{CompileOptions, CompileResult, Compiler, DispatchMode};
pub use error::{Error, Result};
pub use hash::{curry_tree_hash, tree_hash, Bytes32};
pub use ir::{Node, OutputMode};
pub use merkle::{ActionMerkleTree, MerkleProof};
pub use parser::{parse_coinscript, parse_sexpr, Program};
pub use state::{StateManager, StateSchema};
