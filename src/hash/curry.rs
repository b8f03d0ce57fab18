use super::tree::{hash_atom, hash_pair};
use super::Bytes32;
use crate::ir::Node;

const OP_QUOTE: u8 = 1;
const OP_APPLY: u8 = 2;
const OP_CONS: u8 = 4;

fn op(code: u8) -> Node {
    Node::int(code)
}

/// `(q . value)`
fn quoted(value: Node) -> Node {
    Node::cons(op(OP_QUOTE), value)
}

/// Materialize `program` with `args` partially applied:
/// `(a (q . program) (c (q . arg1) (c (q . arg2) ... 1)))`
pub fn curry(program: &Node, args: &[Node]) -> Node {
    let environment = args.iter().rev().fold(op(OP_QUOTE), |rest, arg| {
        Node::list([op(OP_CONS), quoted(arg.clone()), rest])
    });
    Node::list([op(OP_APPLY), quoted(program.clone()), environment])
}

/// Split a curried program back into the program and its curried arguments
pub fn uncurry(node: &Node) -> Option<(Node, Vec<Node>)> {
    let items = node.as_list()?;
    if items.len() != 3 || !is_op(items[0], OP_APPLY) {
        return None;
    }
    let (quote, program) = items[1].pair()?;
    if !is_op(quote, OP_QUOTE) {
        return None;
    }

    let mut args = Vec::new();
    let mut cursor = items[2];
    while !is_op(cursor, OP_QUOTE) {
        let cons = cursor.as_list()?;
        if cons.len() != 3 || !is_op(cons[0], OP_CONS) {
            return None;
        }
        let (quote, value) = cons[1].pair()?;
        if !is_op(quote, OP_QUOTE) {
            return None;
        }
        args.push(value.clone());
        cursor = cons[2];
    }
    Some((program.clone(), args))
}

fn is_op(node: &Node, code: u8) -> bool {
    node.as_bytes() == Some(&[code][..])
}

/// Tree hash of the argument environment `(c (q . v1) (c (q . v2) ... 1))`
pub fn curried_values_tree_hash(arg_hashes: &[Bytes32]) -> Bytes32 {
    let quote_hash = hash_atom(&[OP_QUOTE]);
    let cons_hash = hash_atom(&[OP_CONS]);
    let nil_hash = hash_atom(&[]);

    arg_hashes.iter().rev().fold(quote_hash, |rest, arg| {
        let quoted_arg = hash_pair(&quote_hash, arg);
        hash_pair(
            &cons_hash,
            &hash_pair(&quoted_arg, &hash_pair(&rest, &nil_hash)),
        )
    })
}

/// Tree hash of `curry(P, args)` given only `H(P)` and the `H(arg)`s
pub fn curry_tree_hash(program_hash: &Bytes32, arg_hashes: &[Bytes32]) -> Bytes32 {
    let quote_hash = hash_atom(&[OP_QUOTE]);
    let apply_hash = hash_atom(&[OP_APPLY]);
    let nil_hash = hash_atom(&[]);

    let quoted_program = hash_pair(&quote_hash, program_hash);
    let environment = curried_values_tree_hash(arg_hashes);
    hash_pair(
        &apply_hash,
        &hash_pair(&quoted_program, &hash_pair(&environment, &nil_hash)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::tree_hash;

    fn program() -> Node {
        Node::list([
            Node::symbol("mod"),
            Node::list([Node::symbol("OWNER"), Node::symbol("to")]),
            Node::list([Node::int(51), Node::symbol("to"), Node::int(1)]),
        ])
    }

    #[test]
    fn test_curry_shape() {
        let curried = curry(&Node::symbol("P"), &[Node::int(5)]);
        assert_eq!(curried.to_string(), "(2 (1 . P) (4 (1 . 5) 1))");
        assert_eq!(curry(&Node::symbol("P"), &[]).to_string(), "(2 (1 . P) 1)");
    }

    #[test]
    fn test_shortcut_matches_materialized_hash() {
        let args = vec![
            Node::bytes(vec![0xaa; 32]),
            Node::int(1000),
            Node::list([Node::int(1), Node::int(2)]),
        ];
        let hashes: Vec<Bytes32> = args.iter().map(tree_hash).collect();
        for n in 0..=args.len() {
            let materialized = tree_hash(&curry(&program(), &args[..n]));
            let shortcut = curry_tree_hash(&tree_hash(&program()), &hashes[..n]);
            assert_eq!(materialized, shortcut, "mismatch with {} args", n);
        }
    }

    #[test]
    fn test_uncurry_inverts_curry() {
        let args = vec![Node::int(7), Node::nil(), Node::symbol("abc")];
        let (inner, recovered) = uncurry(&curry(&program(), &args)).unwrap();
        assert_eq!(inner, program());
        assert_eq!(recovered, args);
        assert!(uncurry(&program()).is_none());
    }
}
