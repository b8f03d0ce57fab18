use crate::error::{Error, Result};
use crate::hash::Bytes32;
use crate::ir::Node;
use crate::merkle::MerkleProof;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// A caller-supplied value before atom coercion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// `true` → `1`, `false` → nil
    Bool(bool),
    /// Minimal-width signed integer
    Int(BigInt),
    /// Hex text, with or without `0x`; odd length gets a leading zero nibble
    Hex(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// UTF-8 text
    Str(String),
    /// Proper list
    List(Vec<Value>),
    /// Already-built tree
    #[serde(skip)]
    Node(Node),
}

impl Value {
    /// Hex value
    pub fn hex(text: impl Into<String>) -> Self {
        Value::Hex(text.into())
    }

    /// Coerce to an IR tree
    pub fn to_node(&self) -> Result<Node> {
        match self {
            Value::Bool(true) => Ok(Node::int(1)),
            Value::Bool(false) => Ok(Node::nil()),
            Value::Int(value) => Ok(Node::int(value.clone())),
            Value::Hex(text) => decode_hex(text).map(Node::bytes),
            Value::Bytes(bytes) => Ok(Node::bytes(bytes.clone())),
            Value::Str(text) => Ok(Node::string(text)),
            Value::List(items) => {
                let nodes = items.iter().map(Value::to_node).collect::<Result<Vec<_>>>()?;
                Ok(Node::list(nodes))
            }
            Value::Node(node) => Ok(node.clone()),
        }
    }
}

/// Decode `0x`-optional hex, padding odd lengths on the left
pub fn decode_hex(text: &str) -> Result<Vec<u8>> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let padded;
    let digits = if digits.len() % 2 == 1 {
        padded = format!("0{}", digits);
        padded.as_str()
    } else {
        digits
    };
    hex::decode(digits).map_err(|e| Error::InvalidValue {
        expected: "hex string".to_string(),
        got: format!("{:?} ({})", text, e),
    })
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(BigInt::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Int(BigInt::from(value))
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<Bytes32> for Value {
    fn from(value: Bytes32) -> Self {
        Value::Bytes(value.0.to_vec())
    }
}

impl From<Node> for Value {
    fn from(value: Node) -> Self {
        Value::Node(value)
    }
}

/// Builder for the spend-time argument list
///
/// Layout: `[selector] args... [state] [proof]`. The selector is only present
/// after [`SolutionBuilder::action`] or [`SolutionBuilder::default_action`].
/// Arguments keep the order they were added in.
#[derive(Debug, Clone, Default)]
pub struct SolutionBuilder {
    selector: Option<Node>,
    args: Vec<Value>,
    state: Option<Node>,
    proof: Option<MerkleProof>,
}

impl SolutionBuilder {
    /// Empty solution
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a named action
    pub fn action(mut self, name: &str) -> Self {
        self.selector = Some(Node::string(name));
        self
    }

    /// Select the default action with a nil selector
    pub fn default_action(mut self) -> Self {
        self.selector = Some(Node::nil());
        self
    }

    /// Append one argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Append one argument that is itself a list
    pub fn list(mut self, values: Vec<Value>) -> Self {
        self.args.push(Value::List(values));
        self
    }

    /// State payload, placed after the arguments
    pub fn state(mut self, payload: Node) -> Self {
        self.state = Some(payload);
        self
    }

    /// Merkle proof, placed last
    pub fn merkle_proof(mut self, proof: &MerkleProof) -> Self {
        self.proof = Some(proof.clone());
        self
    }

    /// Coerce and assemble the solution list
    pub fn build(self) -> Result<Node> {
        let mut items = Vec::with_capacity(self.args.len() + 3);
        if let Some(selector) = self.selector {
            items.push(selector);
        }
        for arg in &self.args {
            items.push(arg.to_node()?);
        }
        if let Some(state) = self.state {
            items.push(state);
        }
        if let Some(proof) = &self.proof {
            items.push(proof.to_node());
        }
        Ok(Node::list(items))
    }

    /// Solution for a merkle dispatcher: `(name proof action_puzzle action_solution)`
    pub fn merkle_spend(
        name: &str,
        proof: &MerkleProof,
        action_puzzle: Node,
        action_solution: Node,
    ) -> Node {
        Node::list([
            Node::string(name),
            proof.to_node(),
            action_puzzle,
            action_solution,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::render_flat;

    #[test]
    fn test_value_coercion() {
        assert_eq!(Value::Bool(true).to_node().unwrap(), Node::int(1));
        assert!(Value::Bool(false).to_node().unwrap().is_nil());
        assert!(Value::from(0i64).to_node().unwrap().is_nil());
        assert_eq!(Value::from(128i64).to_node().unwrap().as_bytes(), Some(&[0x00, 0x80][..]));
        assert_eq!(Value::hex("0xabc").to_node().unwrap().as_bytes(), Some(&[0x0a, 0xbc][..]));
        assert!(Value::hex("0xzz").to_node().is_err());
    }

    #[test]
    fn test_order_is_preserved() {
        let solution = SolutionBuilder::new()
            .action("pay")
            .arg(Value::hex("0x01"))
            .arg(5i64)
            .list(vec![Value::from(1i64), Value::from(2i64)])
            .state(Node::list([Node::int(1), Node::int(9)]))
            .build()
            .unwrap();
        assert_eq!(render_flat(&solution), r#"("pay" 0x01 5 (1 2) (1 9))"#);
    }

    #[test]
    fn test_default_selector_is_nil() {
        let solution = SolutionBuilder::new().default_action().arg(3i64).build().unwrap();
        let items = solution.as_list().unwrap();
        assert!(items[0].is_nil());
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_merkle_spend_shape() {
        let proof = MerkleProof::new(vec![Bytes32([1; 32])]);
        let spend = SolutionBuilder::merkle_spend("transfer", &proof, Node::int(1), Node::nil());
        let items = spend.as_list().unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].as_str(), Some("transfer"));
        assert_eq!(MerkleProof::from_node(items[1]).unwrap(), proof);
    }
}
