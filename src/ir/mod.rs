//! # IR Tree Model
//!
//! The S-expression value type that the parser produces, the code generator
//! writes, and the hash engine reads.
//!
//! ```text
//! ir/
//! ├── mod.rs        # This file - re-exports
//! ├── node.rs       # Atom, Node, integer codec
//! └── serialize.rs  # compact / formatted text output, comment map
//! ```

mod node;
mod serialize;

pub use node::{decode_int, encode_int, is_canonical_int, Atom, AtomHint, Node};
pub use serialize::{
    atom_text, is_bare_symbol, looks_like_integer, render_flat, CommentMap, FormatOptions,
    OutputMode, Serializer,
};
