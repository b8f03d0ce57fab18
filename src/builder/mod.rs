//! # Puzzle / Solution Builder
//!
//! Order-preserving construction over the IR tree, used by the code
//! generator and usable directly for hand-written puzzles.
//!
//! ```text
//! builder/
//! ├── mod.rs       # This file - re-exports
//! ├── term.rs      # Term: tagged expression IR with an explicit If
//! ├── puzzle.rs    # PuzzleBuilder → Puzzle (hashing, currying, text)
//! └── solution.rs  # SolutionBuilder, Value coercion
//! ```
//!
//! ## Example
//!
//! ```
//! use coinscript::builder::{PuzzleBuilder, Term};
//! use coinscript::ir::{FormatOptions, OutputMode};
//!
//! let puzzle = PuzzleBuilder::new()
//!     .curried_param("OWNER")
//!     .param("amount")
//!     .body(Term::list(vec![Term::list(vec![
//!         Term::int(51),
//!         Term::symbol("OWNER"),
//!         Term::symbol("amount"),
//!     ])]))
//!     .build()
//!     .unwrap();
//!
//! let text = puzzle.serialize(OutputMode::Compact, &FormatOptions::default());
//! assert_eq!(text, "(mod (OWNER amount) (list (list 51 OWNER amount)))");
//! ```

mod puzzle;
mod solution;
mod term;

pub use puzzle::{Puzzle, PuzzleBuilder};
pub use solution::{decode_hex, SolutionBuilder, Value};
pub use term::Term;
