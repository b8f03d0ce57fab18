//! Property-based tests for hashing, currying, serialization and the action tree
//!
//! These tests use proptest to generate random inputs and verify that:
//! 1. Curry hashing agrees with hashing the materialized curried program
//! 2. Compact and formatted text, comments included, read back to the same tree
//! 3. Integer atoms round-trip through their minimal encoding
//! 4. Every action proof verifies and no proof survives a changed action set
//! 5. State payloads decode to the values they were encoded from
//! 6. The CoinScript front end never panics on arbitrary input

use coinscript::hash::{curry, curry_tree_hash, uncurry};
use coinscript::ir::{decode_int, encode_int, is_canonical_int, CommentMap, Serializer};
use coinscript::parser::parse_sexpr_with_comments;
use coinscript::state::{StateType, StateValue, StateValues};
use coinscript::{
    parse_coinscript, parse_sexpr, tree_hash, ActionMerkleTree, Bytes32, MerkleProof, Node,
    StateManager, StateSchema,
};
use num_bigint::BigInt;
use proptest::prelude::*;

// =============================================================================
// STRATEGY GENERATORS
// =============================================================================

/// Atoms of every rendering kind, including text that could be misread
fn arbitrary_atom() -> impl Strategy<Value = Node> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..6).prop_map(Node::bytes),
        any::<i64>().prop_map(Node::int),
        "[a-zA-Z0-9_+*/<>=!.-]{1,8}".prop_map(|name| Node::symbol(&name)),
        r"[\x20-\x7E\n\t]{0,12}".prop_map(|text| Node::string(&text)),
        prop::sample::select(vec!["42", "-", "-0", "0x", ".", "", "a;b"])
            .prop_map(Node::symbol),
    ]
}

/// Random trees mixing every atom kind
fn arbitrary_node() -> impl Strategy<Value = Node> {
    arbitrary_atom().prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(first, rest)| Node::cons(first, rest)),
            prop::collection::vec(inner, 0..4).prop_map(Node::list),
        ]
    })
}

/// A list with comment lines before some elements and before its `)`
fn commented_list() -> impl Strategy<Value = (Node, CommentMap)> {
    prop::collection::vec(arbitrary_node(), 1..5).prop_flat_map(|items| {
        let slots = items.len() + 1;
        (
            Just(items),
            prop::collection::vec(
                prop::option::of(prop::collection::vec(" ?[a-z0-9;]{1,10}", 1..3)),
                slots,
            ),
        )
            .prop_map(|(items, lines)| {
                let comments: CommentMap = lines
                    .into_iter()
                    .enumerate()
                    .filter_map(|(index, lines)| lines.map(|lines| (vec![index], lines)))
                    .collect();
                (Node::list(items), comments)
            })
    })
}

fn digest() -> impl Strategy<Value = Bytes32> {
    any::<[u8; 32]>().prop_map(Bytes32)
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn curry_hash_matches_materialized(
        program in arbitrary_node(),
        args in prop::collection::vec(arbitrary_node(), 0..5),
    ) {
        let hashes: Vec<Bytes32> = args.iter().map(tree_hash).collect();
        let curried = curry(&program, &args);
        prop_assert_eq!(curry_tree_hash(&tree_hash(&program), &hashes), tree_hash(&curried));
        prop_assert_eq!(uncurry(&curried), Some((program, args)));
    }

    #[test]
    fn compact_text_reads_back(node in arbitrary_node()) {
        let text = Serializer::compact().render(&node);
        let parsed = parse_sexpr(&text).unwrap();
        prop_assert_eq!(tree_hash(&parsed), tree_hash(&node));
        prop_assert_eq!(parsed, node);
    }

    #[test]
    fn formatted_text_reads_back(node in arbitrary_node()) {
        let text = Serializer::formatted().render(&node);
        let parsed = parse_sexpr(&text).unwrap();
        prop_assert_eq!(parsed, node);
    }

    #[test]
    fn formatted_comments_read_back((node, comments) in commented_list()) {
        let text = Serializer::formatted().render_with_comments(&node, &comments);
        let (parsed, parsed_comments) = parse_sexpr_with_comments(&text).unwrap();
        prop_assert_eq!(parsed, node);
        prop_assert_eq!(parsed_comments, comments);
    }

    #[test]
    fn integers_round_trip_canonically(value in any::<i64>()) {
        let value = BigInt::from(value);
        let bytes = encode_int(&value);
        prop_assert!(is_canonical_int(&bytes));
        prop_assert_eq!(decode_int(&bytes), value);
    }

    #[test]
    fn distinct_atoms_hash_apart(
        a in prop::collection::vec(any::<u8>(), 0..8),
        b in prop::collection::vec(any::<u8>(), 0..8),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(tree_hash(&Node::bytes(a)), tree_hash(&Node::bytes(b)));
    }

    #[test]
    fn every_action_proof_verifies(hashes in prop::collection::vec(digest(), 1..12)) {
        let mut tree = ActionMerkleTree::new();
        for (i, hash) in hashes.iter().enumerate() {
            tree.add(format!("action{}", i), *hash).unwrap();
        }
        let root = tree.root();
        for (i, hash) in hashes.iter().enumerate() {
            let name = format!("action{}", i);
            let proof = tree.proof(&name).unwrap();
            prop_assert!(ActionMerkleTree::verify(&name, hash, &proof, &root));
        }
    }

    #[test]
    fn flipped_proof_bit_is_rejected(
        hashes in prop::collection::vec(digest(), 2..12),
        pick in any::<prop::sample::Index>(),
        bit in 0usize..256,
    ) {
        let mut tree = ActionMerkleTree::new();
        for (i, hash) in hashes.iter().enumerate() {
            tree.add(format!("action{}", i), *hash).unwrap();
        }
        let proof = tree.proof("action0").unwrap();
        prop_assume!(!proof.siblings().is_empty());
        let mut siblings = proof.siblings().to_vec();
        let at = pick.index(siblings.len());
        siblings[at] = siblings[at].with_bit_flipped(bit);
        let forged = MerkleProof::new(siblings);
        let root = tree.root();
        prop_assert!(!ActionMerkleTree::verify("action0", &hashes[0], &forged, &root));
        let leaf = hashes[0].with_bit_flipped(bit);
        prop_assert!(!ActionMerkleTree::verify("action0", &leaf, &proof, &root));
    }

    #[test]
    fn state_round_trips(
        count in any::<u32>(),
        paused in any::<bool>(),
        owner in any::<[u8; 32]>(),
        balances in prop::collection::vec((any::<[u8; 32]>(), any::<u32>()), 0..4),
    ) {
        let schema = StateSchema::new(1)
            .field("count", StateType::Uint)
            .field("paused", StateType::Bool)
            .field("owner", StateType::Address)
            .field(
                "balances",
                StateType::Mapping(Box::new(StateType::Address), Box::new(StateType::Uint)),
            );
        let mut values = StateValues::new();
        values.insert("count".to_string(), StateValue::from(i64::from(count)));
        values.insert("paused".to_string(), StateValue::from(paused));
        values.insert("owner".to_string(), StateValue::Bytes(owner.to_vec()));
        values.insert(
            "balances".to_string(),
            StateValue::Mapping(
                balances
                    .iter()
                    .map(|(k, v)| (StateValue::Bytes(k.to_vec()), StateValue::from(i64::from(*v))))
                    .collect(),
            ),
        );
        let manager = StateManager::new(schema);
        let payload = manager.encode(&values).unwrap();
        prop_assert_eq!(manager.decode(&payload).unwrap(), values);
    }

    #[test]
    fn adding_an_action_invalidates_old_proofs(
        hashes in prop::collection::vec(digest(), 1..10),
        extra in digest(),
    ) {
        let mut tree = ActionMerkleTree::new();
        for (i, hash) in hashes.iter().enumerate() {
            tree.add(format!("action{}", i), *hash).unwrap();
        }
        let proof = tree.proof("action0").unwrap();
        let old_root = tree.root();
        tree.add("extra", extra).unwrap();
        prop_assert_ne!(tree.root(), old_root);
        prop_assert!(!ActionMerkleTree::verify("action0", &hashes[0], &proof, &tree.root()));
    }

    #[test]
    fn front_end_never_panics(source in prop::string::string_regex(r"[\x20-\x7E\n]{0,200}").unwrap()) {
        let _ = parse_coinscript(&source);
        let _ = parse_sexpr(&source);
    }
}
