use super::Bytes32;
use crate::ir::Node;
use sha2::{Digest, Sha256};

/// `sha256(0x01 ∥ bytes)`
pub fn hash_atom(bytes: &[u8]) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update([1u8]);
    hasher.update(bytes);
    Bytes32(hasher.finalize().into())
}

/// `sha256(0x02 ∥ first ∥ rest)`
pub fn hash_pair(first: &Bytes32, rest: &Bytes32) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update([2u8]);
    hasher.update(first.0);
    hasher.update(rest.0);
    Bytes32(hasher.finalize().into())
}

enum Step<'a> {
    Visit(&'a Node),
    Combine,
}

/// Structural hash of a tree
///
/// Walks with an explicit stack so list length and nesting depth never touch
/// the call stack.
pub fn tree_hash(node: &Node) -> Bytes32 {
    let mut steps = vec![Step::Visit(node)];
    let mut hashes: Vec<Bytes32> = Vec::new();

    while let Some(step) = steps.pop() {
        match step {
            Step::Visit(Node::Atom(atom)) => hashes.push(hash_atom(atom.as_bytes())),
            Step::Visit(Node::Pair(first, rest)) => {
                steps.push(Step::Combine);
                steps.push(Step::Visit(rest));
                steps.push(Step::Visit(first));
            }
            Step::Combine => {
                debug_assert!(hashes.len() >= 2);
                let rest = hashes.pop().unwrap_or_default();
                let first = hashes.pop().unwrap_or_default();
                hashes.push(hash_pair(&first, &rest));
            }
        }
    }

    hashes.pop().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nil_hash_matches_known_value() {
        // sha256(0x01)
        assert_eq!(
            tree_hash(&Node::nil()).to_string(),
            "0x4bf5122f344554c53bde2ebb8cd2b7e3d1600ad631c385a5d7cce23c7785459a"
        );
    }

    #[test]
    fn test_pair_hash_composes_child_hashes() {
        let pair = Node::cons(Node::int(1), Node::nil());
        let expected = hash_pair(&hash_atom(&[1]), &hash_atom(&[]));
        assert_eq!(tree_hash(&pair), expected);
    }

    #[test]
    fn test_hash_ignores_atom_spelling() {
        assert_eq!(tree_hash(&Node::symbol("a")), tree_hash(&Node::int(97)));
        assert_ne!(
            tree_hash(&Node::list([Node::int(1), Node::int(2)])),
            tree_hash(&Node::list([Node::int(2), Node::int(1)]))
        );
    }

    #[test]
    fn test_long_lists_do_not_overflow() {
        let long = Node::list((0..50_000).map(Node::int));
        let hash = tree_hash(&long);
        assert_eq!(hash, tree_hash(&long.clone()));
    }
}
