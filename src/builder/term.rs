//! Expression terms of generated programs
//!
//! A [`Term`] is the tagged form of a generated expression. Constants,
//! variable references, operator calls, the two-armed conditional and the
//! abort form are distinct variants, so a conditional is never confused with
//! an ordinary call when lowering or simplifying.

use crate::error::{Error, Result};
use crate::ir::{Atom, AtomHint, Node};
use num_bigint::BigInt;

/// One generated expression
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Constant value
    Atom(Node),
    /// Reference to a parameter, constant or function name
    Symbol(String),
    /// `(op args...)`
    Call {
        /// Operator, macro or function name
        op: String,
        /// Arguments in order
        args: Vec<Term>,
    },
    /// `(if cond then otherwise)`; only the selected arm is evaluated
    If {
        /// Condition
        cond: Box<Term>,
        /// Value when `cond` is non-nil
        then: Box<Term>,
        /// Value when `cond` is nil
        otherwise: Box<Term>,
    },
    /// `(x "message")`
    Raise(String),
}

impl Term {
    /// Nil
    pub fn nil() -> Self {
        Term::Atom(Node::nil())
    }

    /// Integer constant
    pub fn int(value: impl Into<BigInt>) -> Self {
        Term::Atom(Node::int(value))
    }

    /// Byte-string constant
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Term::Atom(Node::bytes(bytes))
    }

    /// Quoted string constant
    pub fn string(text: &str) -> Self {
        Term::Atom(Node::string(text))
    }

    /// Canonical truth value `1`
    pub fn truth() -> Self {
        Term::int(1)
    }

    /// Named reference
    pub fn symbol(name: impl Into<String>) -> Self {
        Term::Symbol(name.into())
    }

    /// `(op args...)`
    pub fn call(op: impl Into<String>, args: Vec<Term>) -> Self {
        Term::Call {
            op: op.into(),
            args,
        }
    }

    /// `(list items...)`, nil when empty
    pub fn list(items: Vec<Term>) -> Self {
        if items.is_empty() {
            Term::nil()
        } else {
            Term::call("list", items)
        }
    }

    /// `(c first rest)`
    pub fn cons(first: Term, rest: Term) -> Self {
        Term::call("c", vec![first, rest])
    }

    /// `(f term)`
    pub fn first(term: Term) -> Self {
        Term::call("f", vec![term])
    }

    /// `(r term)`
    pub fn rest(term: Term) -> Self {
        Term::call("r", vec![term])
    }

    /// Element `index` of a list term: `(f (r (r ... list)))`
    pub fn nth(list: Term, index: usize) -> Self {
        let mut cursor = list;
        for _ in 0..index {
            cursor = Term::rest(cursor);
        }
        Term::first(cursor)
    }

    /// `(not term)`
    pub fn not(term: Term) -> Self {
        Term::call("not", vec![term])
    }

    /// Two-armed conditional, collapsed when both arms agree
    pub fn if_then_else(cond: Term, then: Term, otherwise: Term) -> Self {
        if then == otherwise {
            return then;
        }
        Term::If {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Abort with a message
    pub fn raise(message: impl Into<String>) -> Self {
        Term::Raise(message.into())
    }

    /// True for the nil constant
    pub fn is_nil(&self) -> bool {
        matches!(self, Term::Atom(node) if node.is_nil())
    }

    /// Number of term nodes
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(term) = pending.pop() {
            count += 1;
            match term {
                Term::Call { args, .. } => pending.extend(args.iter()),
                Term::If {
                    cond,
                    then,
                    otherwise,
                } => pending.extend([cond.as_ref(), then.as_ref(), otherwise.as_ref()]),
                Term::Atom(_) | Term::Symbol(_) | Term::Raise(_) => {}
            }
        }
        count
    }

    /// Lower to an IR tree, failing past `max_nesting` levels
    pub fn into_node(&self, max_nesting: usize) -> Result<Node> {
        self.lower(0, max_nesting)
    }

    fn lower(&self, depth: usize, limit: usize) -> Result<Node> {
        if depth > limit {
            return Err(Error::NestingTooDeep { limit });
        }
        let node = match self {
            Term::Atom(node) => constant(node),
            Term::Symbol(name) => Node::symbol(name),
            Term::Call { op, args } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Node::symbol(op));
                for arg in args {
                    items.push(arg.lower(depth + 1, limit)?);
                }
                Node::list(items)
            }
            Term::If {
                cond,
                then,
                otherwise,
            } => Node::list([
                Node::symbol("if"),
                cond.lower(depth + 1, limit)?,
                then.lower(depth + 1, limit)?,
                otherwise.lower(depth + 1, limit)?,
            ]),
            Term::Raise(message) => Node::list([Node::symbol("x"), Node::string(message)]),
        };
        Ok(node)
    }
}

/// A constant as it must appear in source: atoms that would read back as a
/// variable name are written as strings, pairs are quoted
fn constant(node: &Node) -> Node {
    match node {
        Node::Atom(atom) if atom.hint() == AtomHint::Symbol => {
            Node::from(Atom::clone(atom).with_hint(AtomHint::Str))
        }
        Node::Atom(_) => node.clone(),
        Node::Pair(_, _) => Node::cons(Node::symbol("q"), node.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::render_flat;

    fn render(term: &Term) -> String {
        render_flat(&term.into_node(64).unwrap())
    }

    #[test]
    fn test_lowering_shapes() {
        let term = Term::if_then_else(
            Term::call("=", vec![Term::symbol("action"), Term::string("pay")]),
            Term::list(vec![Term::int(51), Term::symbol("to"), Term::symbol("amount")]),
            Term::raise("unknown action"),
        );
        assert_eq!(
            render(&term),
            r#"(if (= action "pay") (list 51 to amount) (x "unknown action"))"#
        );
    }

    #[test]
    fn test_constants_never_read_as_variables() {
        assert_eq!(render(&Term::Atom(Node::symbol("owner"))), "\"owner\"");
        assert_eq!(render(&Term::nil()), "()");
        assert_eq!(render(&Term::bytes(vec![0xab, 0xcd])), "0xabcd");
        let pair = Term::Atom(Node::list([Node::int(1), Node::int(2)]));
        assert_eq!(render(&pair), "(q 1 2)");
    }

    #[test]
    fn test_nth_and_collapsing_if() {
        assert_eq!(render(&Term::nth(Term::symbol("s"), 2)), "(f (r (r s)))");
        let same = Term::if_then_else(Term::symbol("c"), Term::int(3), Term::int(3));
        assert_eq!(same, Term::int(3));
    }

    #[test]
    fn test_size_counts_every_node() {
        let term = Term::if_then_else(
            Term::symbol("c"),
            Term::call("+", vec![Term::symbol("x"), Term::int(1)]),
            Term::raise("no"),
        );
        assert_eq!(term.size(), 6);
        assert_eq!(Term::symbol("x").size(), 1);
    }

    #[test]
    fn test_nesting_limit() {
        let mut term = Term::symbol("x");
        for _ in 0..10 {
            term = Term::not(term);
        }
        assert!(term.into_node(20).is_ok());
        assert_eq!(term.into_node(5), Err(Error::NestingTooDeep { limit: 5 }));
    }
}
