use super::term::Term;
use crate::error::{Error, Result};
use crate::hash::{curry, curry_tree_hash, tree_hash, Bytes32};
use crate::ir::{CommentMap, FormatOptions, Node, OutputMode, Serializer};

const DEFAULT_MAX_NESTING: usize = 512;

#[derive(Debug, Clone)]
enum Definition {
    Constant { name: String, value: Term },
    Function { name: String, params: Vec<String>, body: Term },
}

/// Fluent builder for a `(mod PARAMS ...)` module
///
/// Every method consumes the builder and returns the updated one, so two
/// builders never share state. Elements are emitted in the order
/// `mod`, parameters, includes, definitions, body.
#[derive(Debug, Clone)]
pub struct PuzzleBuilder {
    curried: Vec<String>,
    params: Vec<String>,
    rest: Option<String>,
    includes: Vec<(String, Vec<String>)>,
    definitions: Vec<(Definition, Vec<String>)>,
    body: Option<(Term, Vec<String>)>,
    pending: Vec<String>,
    max_nesting: usize,
}

impl Default for PuzzleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PuzzleBuilder {
    /// Empty module
    pub fn new() -> Self {
        PuzzleBuilder {
            curried: Vec::new(),
            params: Vec::new(),
            rest: None,
            includes: Vec::new(),
            definitions: Vec::new(),
            body: None,
            pending: Vec::new(),
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }

    /// Bound on generated expression depth
    pub fn max_nesting(mut self, limit: usize) -> Self {
        self.max_nesting = limit;
        self
    }

    /// Parameter whose value is baked in by currying; precedes every solution parameter
    pub fn curried_param(mut self, name: impl Into<String>) -> Self {
        self.curried.push(name.into());
        self
    }

    /// Solution parameter
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(name.into());
        self
    }

    /// Name bound to the remaining solution list
    pub fn rest_param(mut self, name: impl Into<String>) -> Self {
        self.rest = Some(name.into());
        self
    }

    /// `(include name)`; repeated names are ignored
    pub fn include(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.includes.iter().any(|(existing, _)| *existing == name) {
            let comments = std::mem::take(&mut self.pending);
            self.includes.push((name, comments));
        }
        self
    }

    /// `(defconstant NAME value)`
    pub fn defconstant(mut self, name: impl Into<String>, value: Term) -> Self {
        let comments = std::mem::take(&mut self.pending);
        self.definitions.push((
            Definition::Constant {
                name: name.into(),
                value,
            },
            comments,
        ));
        self
    }

    /// `(defun name (params...) body)`
    pub fn defun(mut self, name: impl Into<String>, params: Vec<String>, body: Term) -> Self {
        let comments = std::mem::take(&mut self.pending);
        self.definitions.push((
            Definition::Function {
                name: name.into(),
                params,
                body,
            },
            comments,
        ));
        self
    }

    /// Comment line attached to the next element added
    pub fn comment(mut self, text: impl Into<String>) -> Self {
        self.pending.push(format!(" {}", text.into()));
        self
    }

    /// Module body; a later call replaces an earlier one
    pub fn body(mut self, body: Term) -> Self {
        let comments = std::mem::take(&mut self.pending);
        self.body = Some((body, comments));
        self
    }

    /// Lower everything into a module tree
    pub fn build(self) -> Result<Puzzle> {
        let (body, body_comments) = self
            .body
            .ok_or_else(|| Error::generation("module has no body"))?;

        let mut comments = CommentMap::new();
        let mut items = vec![Node::symbol("mod")];

        let names = self
            .curried
            .iter()
            .chain(self.params.iter())
            .map(|name| Node::symbol(name));
        let tail = match &self.rest {
            Some(rest) => Node::symbol(rest),
            None => Node::nil(),
        };
        items.push(Node::list_with_tail(names, tail));

        for (name, attached) in self.includes {
            attach(&mut comments, items.len(), attached);
            items.push(Node::list([Node::symbol("include"), Node::symbol(&name)]));
        }

        for (definition, attached) in self.definitions {
            attach(&mut comments, items.len(), attached);
            let node = match definition {
                Definition::Constant { name, value } => Node::list([
                    Node::symbol("defconstant"),
                    Node::symbol(&name),
                    value.into_node(self.max_nesting)?,
                ]),
                Definition::Function { name, params, body } => Node::list([
                    Node::symbol("defun"),
                    Node::symbol(&name),
                    Node::list(params.iter().map(|p| Node::symbol(p))),
                    body.into_node(self.max_nesting)?,
                ]),
            };
            items.push(node);
        }

        attach(&mut comments, items.len(), body_comments);
        items.push(body.into_node(self.max_nesting)?);

        Ok(Puzzle {
            module: Node::list(items),
            curried_params: self.curried,
            comments,
        })
    }
}

fn attach(comments: &mut CommentMap, index: usize, lines: Vec<String>) {
    if !lines.is_empty() {
        comments.insert(vec![index], lines);
    }
}

/// A built module with its curried parameter names
#[derive(Debug, Clone, PartialEq)]
pub struct Puzzle {
    module: Node,
    curried_params: Vec<String>,
    comments: CommentMap,
}

impl Puzzle {
    /// The uncurried `(mod ...)` tree
    pub fn module(&self) -> &Node {
        &self.module
    }

    /// Names of curried parameters, in curry order
    pub fn curried_params(&self) -> &[String] {
        &self.curried_params
    }

    /// Comments attached during building
    pub fn comments(&self) -> &CommentMap {
        &self.comments
    }

    /// Structural hash of the uncurried module
    pub fn mod_hash(&self) -> Bytes32 {
        tree_hash(&self.module)
    }

    /// The module with its curried parameters bound to `values`
    pub fn curry(&self, values: &[Node]) -> Result<Node> {
        self.check_arity(values)?;
        Ok(curry(&self.module, values))
    }

    /// Hash of [`Puzzle::curry`] without building it
    pub fn curried_hash(&self, values: &[Node]) -> Result<Bytes32> {
        self.check_arity(values)?;
        let hashes: Vec<Bytes32> = values.iter().map(tree_hash).collect();
        Ok(curry_tree_hash(&self.mod_hash(), &hashes))
    }

    /// Source text of the module
    pub fn serialize(&self, mode: OutputMode, options: &FormatOptions) -> String {
        Serializer::new(mode, options.clone()).render_with_comments(&self.module, &self.comments)
    }

    fn check_arity(&self, values: &[Node]) -> Result<()> {
        if values.len() != self.curried_params.len() {
            return Err(Error::InvalidValue {
                expected: format!("{} curried values", self.curried_params.len()),
                got: format!("{}", values.len()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::uncurry;
    use crate::parser::parse_sexpr;

    fn sample() -> Puzzle {
        PuzzleBuilder::new()
            .curried_param("OWNER")
            .param("to")
            .param("amount")
            .include("sha256tree.clib")
            .include("sha256tree.clib")
            .defconstant("FEE", Term::int(10))
            .comment("action pay(to, amount)")
            .body(Term::list(vec![Term::list(vec![
                Term::int(51),
                Term::symbol("to"),
                Term::symbol("amount"),
            ])]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_element_order_and_dedup() {
        let puzzle = sample();
        let text = puzzle.serialize(OutputMode::Compact, &FormatOptions::default());
        assert_eq!(
            text,
            "(mod (OWNER to amount) (include sha256tree.clib) (defconstant FEE 10) (list (list 51 to amount)))"
        );
        assert_eq!(puzzle.curried_params(), ["OWNER".to_string()]);
        assert_eq!(puzzle.comments().get(&vec![4]).map(Vec::len), Some(1));
    }

    #[test]
    fn test_formatted_output_parses_back() {
        let puzzle = sample();
        let text = puzzle.serialize(OutputMode::Formatted, &FormatOptions::default());
        assert!(text.contains("; action pay(to, amount)"));
        assert_eq!(&parse_sexpr(&text).unwrap(), puzzle.module());
    }

    #[test]
    fn test_curry_matches_curried_hash() {
        let puzzle = sample();
        let owner = Node::bytes(vec![7u8; 32]);
        let curried = puzzle.curry(&[owner.clone()]).unwrap();
        assert_eq!(
            tree_hash(&curried),
            puzzle.curried_hash(&[owner.clone()]).unwrap()
        );
        let (module, args) = uncurry(&curried).unwrap();
        assert_eq!(&module, puzzle.module());
        assert_eq!(args, vec![owner]);
        assert!(puzzle.curry(&[]).is_err());
    }

    #[test]
    fn test_rest_param_and_missing_body() {
        let puzzle = PuzzleBuilder::new()
            .curried_param("A")
            .param("action")
            .rest_param("args")
            .body(Term::symbol("args"))
            .build()
            .unwrap();
        let text = puzzle.serialize(OutputMode::Compact, &FormatOptions::default());
        assert_eq!(text, "(mod (A action . args) args)");
        assert!(PuzzleBuilder::new().param("x").build().is_err());
    }
}
