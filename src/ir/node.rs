use crate::error::{Error, Result};
use num_bigint::BigInt;
use num_traits::Zero;
use once_cell::sync::Lazy;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// How an atom was written, used only when rendering it back to text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomHint {
    /// Raw bytes, rendered `0x...` (or `()` when empty)
    Bytes,
    /// Signed integer, rendered in decimal
    Int,
    /// Bare word such as `mod` or `sha256tree`
    Symbol,
    /// Double-quoted text
    Str,
}

/// Leaf of the IR tree: an untyped byte string
///
/// Equality and hashing look at the bytes only. Two atoms written differently
/// (`0x01`, `1`, `"\x01"`) are the same atom.
#[derive(Debug, Clone)]
pub struct Atom {
    bytes: Vec<u8>,
    hint: AtomHint,
}

impl Atom {
    /// Atom holding raw bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Atom {
            bytes: bytes.into(),
            hint: AtomHint::Bytes,
        }
    }

    /// Atom holding the canonical encoding of an integer
    pub fn from_int(value: &BigInt) -> Self {
        Atom {
            bytes: encode_int(value),
            hint: AtomHint::Int,
        }
    }

    /// Integer atom from already-encoded bytes, rejecting non-canonical encodings
    pub fn int_from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if !is_canonical_int(&bytes) {
            return Err(Error::InvalidAtom(format!(
                "non-canonical integer encoding 0x{}",
                hex::encode(&bytes)
            )));
        }
        Ok(Atom {
            bytes,
            hint: AtomHint::Int,
        })
    }

    /// Symbol atom (UTF-8 bytes of the name)
    pub fn symbol(name: &str) -> Self {
        Atom {
            bytes: name.as_bytes().to_vec(),
            hint: AtomHint::Symbol,
        }
    }

    /// Quoted string atom (UTF-8 bytes of the text)
    pub fn string(text: &str) -> Self {
        Atom {
            bytes: text.as_bytes().to_vec(),
            hint: AtomHint::Str,
        }
    }

    /// Underlying bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Rendering hint
    pub fn hint(&self) -> AtomHint {
        self.hint
    }

    /// Same bytes, rendered differently. An `Int` hint on bytes that are not
    /// a minimal encoding still renders as `0x` hex.
    pub fn with_hint(mut self, hint: AtomHint) -> Self {
        self.hint = hint;
        self
    }

    /// Atom length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for the empty atom (nil)
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Interpret the bytes as a two's complement integer
    pub fn to_int(&self) -> BigInt {
        decode_int(&self.bytes)
    }

    /// Interpret the bytes as UTF-8 text
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Atom {}

impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

/// S-expression tree: an atom or an ordered pair
///
/// Trees are immutable values; transformations build new trees and share
/// unchanged subtrees through `Arc`.
#[derive(Debug, Clone)]
pub enum Node {
    /// Leaf
    Atom(Atom),
    /// `(first . rest)`
    Pair(Arc<Node>, Arc<Node>),
}

impl Node {
    /// The empty atom, which also terminates lists
    pub fn nil() -> Self {
        Node::Atom(Atom::from_bytes(Vec::new()))
    }

    /// Raw-bytes atom
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Node::Atom(Atom::from_bytes(bytes))
    }

    /// Integer atom with minimal-width encoding
    pub fn int(value: impl Into<BigInt>) -> Self {
        Node::Atom(Atom::from_int(&value.into()))
    }

    /// Symbol atom
    pub fn symbol(name: &str) -> Self {
        Node::Atom(Atom::symbol(name))
    }

    /// Quoted string atom
    pub fn string(text: &str) -> Self {
        Node::Atom(Atom::string(text))
    }

    /// Pair constructor
    pub fn cons(first: Node, rest: Node) -> Self {
        Node::Pair(Arc::new(first), Arc::new(rest))
    }

    /// Proper list of the given items
    pub fn list(items: impl IntoIterator<Item = Node>) -> Self {
        Self::list_with_tail(items, Node::nil())
    }

    /// List whose final `rest` is `tail` instead of nil
    pub fn list_with_tail(items: impl IntoIterator<Item = Node>, tail: Node) -> Self {
        let items: Vec<Node> = items.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(tail, |rest, item| Node::cons(item, rest))
    }

    /// True for atoms
    pub fn is_atom(&self) -> bool {
        matches!(self, Node::Atom(_))
    }

    /// True for pairs
    pub fn is_pair(&self) -> bool {
        matches!(self, Node::Pair(_, _))
    }

    /// True for the empty atom
    pub fn is_nil(&self) -> bool {
        matches!(self, Node::Atom(a) if a.is_empty())
    }

    /// The atom, if this is a leaf
    pub fn atom(&self) -> Option<&Atom> {
        match self {
            Node::Atom(a) => Some(a),
            Node::Pair(_, _) => None,
        }
    }

    /// Both halves, if this is a pair
    pub fn pair(&self) -> Option<(&Node, &Node)> {
        match self {
            Node::Pair(first, rest) => Some((first, rest)),
            Node::Atom(_) => None,
        }
    }

    /// `first` of a pair
    pub fn first(&self) -> Option<&Node> {
        self.pair().map(|(f, _)| f)
    }

    /// `rest` of a pair
    pub fn rest(&self) -> Option<&Node> {
        self.pair().map(|(_, r)| r)
    }

    /// Elements of a proper (nil-terminated) list
    pub fn as_list(&self) -> Option<Vec<&Node>> {
        let mut items = Vec::new();
        let mut cursor = self;
        loop {
            match cursor {
                Node::Pair(first, rest) => {
                    items.push(first.as_ref());
                    cursor = rest;
                }
                Node::Atom(a) if a.is_empty() => return Some(items),
                Node::Atom(_) => return None,
            }
        }
    }

    /// Integer value of an atom
    pub fn as_int(&self) -> Option<BigInt> {
        self.atom().map(Atom::to_int)
    }

    /// Text of an atom, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        self.atom().and_then(Atom::as_str)
    }

    /// Bytes of an atom
    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.atom().map(Atom::as_bytes)
    }

    /// Depth of list nesting (atoms are 0)
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            if let Node::Pair(first, rest) = node {
                max = max.max(depth + 1);
                stack.push((first, depth + 1));
                // the rest of a list stays at the same nesting level
                stack.push((rest, depth));
            }
        }
        max
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        let mut stack = vec![(self, other)];
        while let Some((a, b)) = stack.pop() {
            match (a, b) {
                (Node::Atom(x), Node::Atom(y)) => {
                    if x != y {
                        return false;
                    }
                }
                (Node::Pair(af, ar), Node::Pair(bf, br)) => {
                    if Arc::ptr_eq(af, bf) && Arc::ptr_eq(ar, br) {
                        continue;
                    }
                    stack.push((ar, br));
                    stack.push((af, bf));
                }
                _ => return false,
            }
        }
        true
    }
}

impl Eq for Node {}

static SHARED_NIL: Lazy<Arc<Node>> = Lazy::new(|| Arc::new(Node::nil()));

impl Drop for Node {
    // Long lists are long `rest` chains; unlink them iteratively.
    fn drop(&mut self) {
        let Node::Pair(first, rest) = self else {
            return;
        };
        let mut pending = vec![
            std::mem::replace(first, SHARED_NIL.clone()),
            std::mem::replace(rest, SHARED_NIL.clone()),
        ];
        while let Some(child) = pending.pop() {
            if let Ok(mut node) = Arc::try_unwrap(child) {
                if let Node::Pair(first, rest) = &mut node {
                    pending.push(std::mem::replace(first, SHARED_NIL.clone()));
                    pending.push(std::mem::replace(rest, SHARED_NIL.clone()));
                }
            }
        }
    }
}

impl From<Atom> for Node {
    fn from(atom: Atom) -> Self {
        Node::Atom(atom)
    }
}

/// Minimal big-endian two's complement encoding; zero is the empty string
pub fn encode_int(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        Vec::new()
    } else {
        value.to_signed_bytes_be()
    }
}

/// Inverse of [`encode_int`]
pub fn decode_int(bytes: &[u8]) -> BigInt {
    if bytes.is_empty() {
        BigInt::zero()
    } else {
        BigInt::from_signed_bytes_be(bytes)
    }
}

/// True when `bytes` is the encoding [`encode_int`] would produce
pub fn is_canonical_int(bytes: &[u8]) -> bool {
    match bytes {
        [] => true,
        [0x00] => false,
        [0x00, next, ..] => next & 0x80 != 0,
        [0xff, next, ..] => next & 0x80 == 0,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_encoding_is_minimal() {
        assert_eq!(encode_int(&BigInt::from(0)), Vec::<u8>::new());
        assert_eq!(encode_int(&BigInt::from(1)), vec![0x01]);
        assert_eq!(encode_int(&BigInt::from(127)), vec![0x7f]);
        assert_eq!(encode_int(&BigInt::from(128)), vec![0x00, 0x80]);
        assert_eq!(encode_int(&BigInt::from(-1)), vec![0xff]);
        assert_eq!(encode_int(&BigInt::from(-128)), vec![0x80]);
        assert_eq!(encode_int(&BigInt::from(-129)), vec![0xff, 0x7f]);
        assert_eq!(decode_int(&[0x00, 0x80]), BigInt::from(128));
    }

    #[test]
    fn test_non_canonical_integers_are_rejected() {
        assert!(Atom::int_from_bytes(vec![0x00]).is_err());
        assert!(Atom::int_from_bytes(vec![0x00, 0x01]).is_err());
        assert!(Atom::int_from_bytes(vec![0xff, 0x80]).is_err());
        assert!(Atom::int_from_bytes(vec![0x00, 0x80]).is_ok());
        assert!(Atom::int_from_bytes(Vec::new()).is_ok());
    }

    #[test]
    fn test_equality_ignores_rendering_hint() {
        assert_eq!(Node::int(0), Node::nil());
        assert_eq!(Node::int(97), Node::symbol("a"));
        assert_eq!(Node::string("abc"), Node::symbol("abc"));
        assert_ne!(Node::list([Node::nil()]), Node::nil());
    }

    #[test]
    fn test_list_construction_and_access() {
        let list = Node::list([Node::int(1), Node::int(2), Node::int(3)]);
        let items = list.as_list().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].as_int(), Some(BigInt::from(3)));
        assert_eq!(list.depth(), 1);

        let dotted = Node::cons(Node::int(1), Node::int(2));
        assert!(dotted.as_list().is_none());
        assert_eq!(dotted.rest().unwrap().as_int(), Some(BigInt::from(2)));
    }

    #[test]
    fn test_depth_counts_nested_lists() {
        let nested = Node::list([
            Node::symbol("if"),
            Node::list([Node::symbol("="), Node::int(1), Node::int(1)]),
            Node::int(2),
        ]);
        assert_eq!(nested.depth(), 2);
        assert_eq!(Node::symbol("x").depth(), 0);
    }
}
