//! Tests for the action merkle tree and threaded state payloads

use coinscript::builder::SolutionBuilder;
use coinscript::merkle::{leaf_hash, node_hash};
use coinscript::parser::parse_coinscript;
use coinscript::state::{MissingFieldPolicy, StateType, StateValue, StateValues};
use coinscript::{
    tree_hash, ActionMerkleTree, Bytes32, Error, MerkleProof, Node, StateManager, StateSchema,
};

fn program_hash(name: &str) -> Bytes32 {
    tree_hash(&Node::string(name))
}

fn tree_of(count: usize) -> (ActionMerkleTree, Vec<String>) {
    let names: Vec<String> = (0..count).map(|i| format!("action{}", i)).collect();
    let mut tree = ActionMerkleTree::new();
    for name in &names {
        tree.add(name.clone(), program_hash(name)).unwrap();
    }
    (tree, names)
}

// ====================
// Merkle tree
// ====================

#[test]
fn test_every_size_up_to_nine_verifies() {
    for count in 1..=9 {
        let (tree, names) = tree_of(count);
        let root = tree.root();
        for name in &names {
            let proof = tree.proof(name).unwrap();
            assert!(
                ActionMerkleTree::verify(name, &program_hash(name), &proof, &root),
                "{} of {} failed",
                name,
                count
            );
        }
    }
}

#[test]
fn test_two_leaf_root_is_sorted_pair() {
    let (tree, _) = tree_of(2);
    let a = leaf_hash("action0", &program_hash("action0"));
    let b = leaf_hash("action1", &program_hash("action1"));
    assert_eq!(tree.root(), node_hash(&a, &b));
    assert_eq!(node_hash(&a, &b), node_hash(&b, &a));
}

#[test]
fn test_wrong_program_hash_fails() {
    let (tree, _) = tree_of(4);
    let proof = tree.proof("action2").unwrap();
    let forged = program_hash("action2").with_bit_flipped(3);
    assert!(!ActionMerkleTree::verify("action2", &forged, &proof, &tree.root()));
    assert_eq!(
        ActionMerkleTree::check("action2", &forged, &proof, &tree.root()),
        Err(Error::MerkleProofError {
            action: "action2".to_string()
        })
    );
}

#[test]
fn test_proof_travels_in_solution() {
    let (tree, _) = tree_of(5);
    let proof = tree.proof("action1").unwrap();
    let solution = SolutionBuilder::new().arg(7i64).merkle_proof(&proof).build().unwrap();
    let items = solution.as_list().unwrap();
    let carried = MerkleProof::from_node(items[1]).unwrap();
    assert_eq!(carried, proof);
    assert!(ActionMerkleTree::verify(
        "action1",
        &program_hash("action1"),
        &carried,
        &tree.root()
    ));
}

#[test]
fn test_insertion_order_matters() {
    let mut forward = ActionMerkleTree::new();
    let mut backward = ActionMerkleTree::new();
    for name in ["a", "b", "c"] {
        forward.add(name, program_hash(name)).unwrap();
    }
    for name in ["c", "b", "a"] {
        backward.add(name, program_hash(name)).unwrap();
    }
    assert_ne!(forward.root(), backward.root());
    assert_eq!(forward.names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
}

// ====================
// State
// ====================

fn schema() -> StateSchema {
    StateSchema::new(2)
        .field("count", StateType::Uint)
        .field("owner", StateType::Address)
        .field("paused", StateType::Bool)
        .field(
            "balances",
            StateType::Mapping(Box::new(StateType::Address), Box::new(StateType::Uint)),
        )
}

fn values() -> StateValues {
    let mut values = StateValues::new();
    values.insert("count".to_string(), StateValue::from(3));
    values.insert("owner".to_string(), StateValue::Bytes(vec![1; 32]));
    values.insert("paused".to_string(), StateValue::from(false));
    values.insert(
        "balances".to_string(),
        StateValue::Mapping(vec![
            (StateValue::Bytes(vec![2; 32]), StateValue::from(10)),
            (StateValue::Bytes(vec![3; 32]), StateValue::from(0)),
        ]),
    );
    values
}

#[test]
fn test_state_payload_layout() {
    let manager = StateManager::new(schema());
    let payload = manager.encode(&values()).unwrap();
    let items = payload.as_list().unwrap();
    assert_eq!(items.len(), 5);
    assert_eq!(items[0].as_int(), Some(2.into()));
    assert_eq!(items[1].as_int(), Some(3.into()));
    assert!(items[3].is_nil());
    assert_eq!(items[4].as_list().unwrap().len(), 2);
    assert_eq!(manager.decode(&payload).unwrap(), values());
}

#[test]
fn test_state_version_mismatch() {
    let payload = StateManager::new(schema()).encode(&values()).unwrap();
    let newer = StateManager::new(StateSchema::new(3).field("count", StateType::Uint));
    assert!(matches!(newer.decode(&payload), Err(Error::StateError(_))));
}

#[test]
fn test_state_rejects_bad_values() {
    let manager = StateManager::new(schema());
    let mut bad = values();
    bad.insert("owner".to_string(), StateValue::Bytes(vec![1; 20]));
    assert!(matches!(manager.encode(&bad), Err(Error::StateError(_))));

    let mut unknown = values();
    unknown.insert("ghost".to_string(), StateValue::from(1));
    assert!(matches!(manager.encode(&unknown), Err(Error::StateError(_))));
}

#[test]
fn test_missing_field_policies() {
    let mut partial = values();
    partial.remove("count");

    let lenient = StateManager::new(schema());
    let decoded = lenient.decode(&lenient.encode(&partial).unwrap()).unwrap();
    assert_eq!(decoded["count"], StateValue::from(0));

    let strict = StateManager::with_policy(schema(), MissingFieldPolicy::Reject);
    assert!(matches!(strict.encode(&partial), Err(Error::StateError(_))));
}

#[test]
fn test_diff_names_changed_fields() {
    let manager = StateManager::new(schema());
    let old = values();
    let mut new = values();
    new.insert("count".to_string(), StateValue::from(4));
    new.insert("paused".to_string(), StateValue::from(true));
    assert_eq!(manager.diff(&old, &new), vec!["count", "paused"]);
}

#[test]
fn test_schema_from_declarations() {
    let program = parse_coinscript(
        r#"coin C {
            state {
                uint256 total;
                mapping(address => uint256) shares;
            }
            action spend() { total += 1; }
        }"#,
    )
    .unwrap();
    let schema = StateSchema::from_decls(&program.coin.state, 1);
    assert_eq!(schema.fields().len(), 2);
    assert_eq!(schema.index_of("shares"), Some(1));
    assert_eq!(
        schema.fields()[1].ty,
        StateType::Mapping(Box::new(StateType::Address), Box::new(StateType::Uint))
    );
}
