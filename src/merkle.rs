//! Action merkle tree
//!
//! Commits to an ordered set of `(action name, program hash)` leaves so one
//! program can expose many actions behind a single root.
//!
//! - leaf: `sha256(0x01 ∥ sha256(name) ∥ program_hash)`
//! - node: `sha256(0x02 ∥ min(a, b) ∥ max(a, b))`
//! - an unpaired node at the end of a level moves up unchanged
//! - the empty tree's root is the tree hash of nil
//!
//! Sorting each pair means a proof is just the list of sibling hashes; the
//! verifier never needs left/right flags.

use crate::error::{Error, Result};
use crate::hash::{tree_hash, Bytes32};
use crate::ir::Node;
use once_cell::unsync::OnceCell;
use sha2::{Digest, Sha256};

/// Leaf commitment for one action
pub fn leaf_hash(name: &str, program_hash: &Bytes32) -> Bytes32 {
    let name_hash = Sha256::digest(name.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update([1u8]);
    hasher.update(name_hash);
    hasher.update(program_hash.0);
    Bytes32(hasher.finalize().into())
}

/// Parent of two sibling hashes, independent of their order
pub fn node_hash(a: &Bytes32, b: &Bytes32) -> Bytes32 {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Sha256::new();
    hasher.update([2u8]);
    hasher.update(low.0);
    hasher.update(high.0);
    Bytes32(hasher.finalize().into())
}

/// Sibling hashes from a leaf up to the root
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MerkleProof {
    siblings: Vec<Bytes32>,
}

impl MerkleProof {
    /// Proof from sibling hashes, leaf level first
    pub fn new(siblings: Vec<Bytes32>) -> Self {
        MerkleProof { siblings }
    }

    /// Sibling hashes, leaf level first
    pub fn siblings(&self) -> &[Bytes32] {
        &self.siblings
    }

    /// Number of hashing steps
    pub fn len(&self) -> usize {
        self.siblings.len()
    }

    /// True for a single-leaf tree's proof
    pub fn is_empty(&self) -> bool {
        self.siblings.is_empty()
    }

    /// Root reached from `leaf`
    pub fn root_from(&self, leaf: Bytes32) -> Bytes32 {
        self.siblings
            .iter()
            .fold(leaf, |acc, sibling| node_hash(&acc, sibling))
    }

    /// List of 32-byte atoms, as a spend supplies it
    pub fn to_node(&self) -> Node {
        Node::list(self.siblings.iter().map(Bytes32::to_node))
    }

    /// Inverse of [`MerkleProof::to_node`]
    pub fn from_node(node: &Node) -> Result<Self> {
        let items = node
            .as_list()
            .ok_or_else(|| Error::InvalidAtom("merkle proof must be a proper list".to_string()))?;
        let siblings = items
            .into_iter()
            .map(|item| {
                let bytes = item.as_bytes().ok_or_else(|| {
                    Error::InvalidAtom("merkle proof element must be an atom".to_string())
                })?;
                Bytes32::from_slice(bytes).map_err(|_| {
                    Error::InvalidAtom(format!(
                        "merkle proof element must be 32 bytes, found {}",
                        bytes.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(MerkleProof { siblings })
    }
}

/// Insertion-ordered action set with a lazily computed, memoized root
#[derive(Debug, Clone, Default)]
pub struct ActionMerkleTree {
    actions: Vec<(String, Bytes32)>,
    levels: OnceCell<Vec<Vec<Bytes32>>>,
}

impl ActionMerkleTree {
    /// Empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action; names are unique
    pub fn add(&mut self, name: impl Into<String>, program_hash: Bytes32) -> Result<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(Error::DuplicateAction(name));
        }
        self.actions.push((name, program_hash));
        self.levels = OnceCell::new();
        Ok(())
    }

    /// True when an action of that name is present
    pub fn contains(&self, name: &str) -> bool {
        self.actions.iter().any(|(n, _)| n == name)
    }

    /// Number of actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True with no actions
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Action names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|(n, _)| n.as_str())
    }

    /// Program hash registered for an action
    pub fn program_hash(&self, name: &str) -> Option<Bytes32> {
        self.actions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, h)| *h)
    }

    /// Commitment to the whole action set
    pub fn root(&self) -> Bytes32 {
        self.levels()
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or_else(|| tree_hash(&Node::nil()))
    }

    /// Sibling path for one action
    pub fn proof(&self, name: &str) -> Result<MerkleProof> {
        let mut index = self
            .actions
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| Error::UnknownAction(name.to_string()))?;

        let mut siblings = Vec::new();
        let levels = self.levels();
        for level in &levels[..levels.len().saturating_sub(1)] {
            let sibling = index ^ 1;
            if let Some(hash) = level.get(sibling) {
                siblings.push(*hash);
            }
            index /= 2;
        }
        Ok(MerkleProof { siblings })
    }

    /// Check a leaf against a root using only the proof
    pub fn verify(name: &str, program_hash: &Bytes32, proof: &MerkleProof, root: &Bytes32) -> bool {
        proof.root_from(leaf_hash(name, program_hash)) == *root
    }

    /// [`ActionMerkleTree::verify`] as a spend-time error
    pub fn check(
        name: &str,
        program_hash: &Bytes32,
        proof: &MerkleProof,
        root: &Bytes32,
    ) -> Result<()> {
        if Self::verify(name, program_hash, proof, root) {
            Ok(())
        } else {
            Err(Error::MerkleProofError {
                action: name.to_string(),
            })
        }
    }

    fn levels(&self) -> &Vec<Vec<Bytes32>> {
        self.levels.get_or_init(|| {
            tracing::trace!(actions = self.actions.len(), "rebuilding action merkle tree");
            let leaves: Vec<Bytes32> = self
                .actions
                .iter()
                .map(|(name, hash)| leaf_hash(name, hash))
                .collect();
            build_levels(leaves)
        })
    }
}

fn build_levels(leaves: Vec<Bytes32>) -> Vec<Vec<Bytes32>> {
    if leaves.is_empty() {
        return Vec::new();
    }
    let mut levels = vec![leaves];
    while let Some(current) = levels.last().filter(|level| level.len() > 1) {
        let next = current
            .chunks(2)
            .map(|pair| match pair.get(1) {
                Some(right) => node_hash(&pair[0], right),
                None => pair[0],
            })
            .collect();
        levels.push(next);
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: u8) -> Bytes32 {
        Bytes32([byte; 32])
    }

    fn tree(names: &[&str]) -> ActionMerkleTree {
        let mut tree = ActionMerkleTree::new();
        for (i, name) in names.iter().enumerate() {
            tree.add(*name, hash(i as u8)).unwrap();
        }
        tree
    }

    #[test]
    fn test_empty_and_single_leaf() {
        let empty = ActionMerkleTree::new();
        assert_eq!(empty.root(), tree_hash(&Node::nil()));

        let single = tree(&["spend"]);
        assert_eq!(single.root(), leaf_hash("spend", &hash(0)));
        assert!(single.proof("spend").unwrap().is_empty());
    }

    #[test]
    fn test_every_leaf_verifies_with_odd_count() {
        let tree = tree(&["a", "b", "c", "d", "e"]);
        let root = tree.root();
        for (i, name) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            let proof = tree.proof(name).unwrap();
            assert!(ActionMerkleTree::verify(name, &hash(i as u8), &proof, &root));
        }
        // the promoted fifth leaf needs only one sibling
        assert_eq!(tree.proof("e").unwrap().len(), 1);
        assert_eq!(tree.proof("a").unwrap().len(), 3);
    }

    #[test]
    fn test_root_is_memoized_until_insert() {
        let mut tree = tree(&["a", "b"]);
        let before = tree.root();
        assert_eq!(tree.root(), before);
        tree.add("c", hash(9)).unwrap();
        assert_ne!(tree.root(), before);
    }

    #[test]
    fn test_duplicate_and_unknown_actions() {
        let mut tree = tree(&["a"]);
        assert_eq!(
            tree.add("a", hash(1)),
            Err(Error::DuplicateAction("a".to_string()))
        );
        assert_eq!(
            tree.proof("zzz"),
            Err(Error::UnknownAction("zzz".to_string()))
        );
    }

    #[test]
    fn test_check_reports_spend_time_error() {
        let tree = tree(&["a", "b"]);
        let proof = tree.proof("a").unwrap();
        let err = ActionMerkleTree::check("a", &hash(7), &proof, &tree.root()).unwrap_err();
        assert!(err.is_spend_time());
    }

    #[test]
    fn test_proof_node_round_trip_and_rejection() {
        let tree = tree(&["a", "b", "c"]);
        let proof = tree.proof("b").unwrap();
        assert_eq!(MerkleProof::from_node(&proof.to_node()).unwrap(), proof);
        let bad = Node::list([Node::bytes(vec![1, 2, 3])]);
        assert!(matches!(MerkleProof::from_node(&bad), Err(Error::InvalidAtom(_))));
    }
}
