//! # CoinScript Compiler
//!
//! Compiles a CoinScript coin declaration to a curried S-expression module
//! together with everything a wallet needs to spend it.
//!
//! ## Architecture
//!
//! ```text
//! Source → AST → Analysis → Values → Modules → Hashes (→ singleton, action tree)
//! ```
//!
//! ## Usage
//!
//! ```
//! use coinscript::builder::Value;
//! use coinscript::compiler::{CompileOptions, Compiler};
//!
//! let source = r#"
//!     coin Wallet {
//!         storage address owner;
//!         action spend(address to, uint256 amount) {
//!             require(msg.sender == owner);
//!             send(to, amount);
//!         }
//!     }
//! "#;
//! let owner = Value::hex(format!("0x{}", "11".repeat(32)));
//! let compiler = Compiler::new(CompileOptions::default());
//! let result = compiler.compile_with_storage(source, &[("owner", owner)]).unwrap();
//! assert_eq!(result.curried_params[0].name, "OWNER");
//! ```

mod codegen;
mod values;

pub use codegen::{
    solution_params, CodeGenerator, Lowered, ACTION_ROOT, CURRENT_STATE,
    DEFAULT_REQUIRE_MESSAGE, MOD_HASH, SIGNER,
};
pub use values::{resolve, ResolvedValues};

use crate::analyzer::library::SHA256TREE_LIB;
use crate::analyzer::{Analysis, Analyzer, LauncherSource, SpendPath};
use crate::builder::{Puzzle, SolutionBuilder, Value};
use crate::error::{Error, Result};
use crate::hash::{curry_tree_hash, tree_hash, Bytes32};
use crate::ir::{render_flat, FormatOptions, Node, OutputMode};
use crate::merkle::ActionMerkleTree;
use crate::parser::{parse_coinscript, Program};
use crate::repository::{
    AddressResolver, HexAddressResolver, ReferenceLibrary, SINGLETON_LAUNCHER,
    SINGLETON_TOP_LAYER,
};
use crate::state::{MissingFieldPolicy, StateManager, StateSchema};
use serde::{Deserialize, Serialize};

/// How a coin with several actions selects one at spend time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Every action lives in one module behind a name comparison chain
    #[default]
    Inline,
    /// Each action is its own module, committed to by a merkle root
    Merkle,
}

/// Compilation options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Inline or merkle action dispatch
    pub dispatch: DispatchMode,
    /// Layout of the emitted source text
    pub output: OutputMode,
    /// Indentation and line width for formatted output
    pub format: FormatOptions,
    /// Amount of the coin recreated by stateful spends
    pub successor_amount: u64,
    /// Version tag written at the head of every state payload
    pub state_version: u32,
    /// What happens to state fields without an initializer
    pub missing_state_fields: MissingFieldPolicy,
    /// Deepest expression nesting generated code may reach
    pub max_nesting: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::Inline,
            output: OutputMode::Formatted,
            format: FormatOptions::default(),
            successor_amount: 1,
            state_version: 1,
            missing_state_fields: MissingFieldPolicy::ZeroDefault,
            max_nesting: 512,
        }
    }
}

impl CompileOptions {
    /// Options from JSON; absent keys keep their defaults
    pub fn from_json(text: &str) -> Result<Self> {
        let options: CompileOptions =
            serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Reject values no compilation could use
    pub fn validate(&self) -> Result<()> {
        if self.max_nesting == 0 {
            return Err(Error::Config("max_nesting must be at least 1".to_string()));
        }
        if self.format.indent == 0 && self.output == OutputMode::Formatted {
            return Err(Error::Config(
                "formatted output needs an indent of at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A curried parameter and its bound value
#[derive(Debug, Clone, PartialEq)]
pub struct CurriedParam {
    /// Generated parameter name
    pub name: String,
    /// Bound value
    pub value: Node,
}

/// How a solution for one action starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Selector {
    /// No selector: a single-action coin, or a merkle action's own solution
    Absent,
    /// Nil selector reaching the `default` action
    Default,
    /// The action name as a string atom
    Named(String),
}

/// Solution layout of one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTemplate {
    /// Action name
    pub name: String,
    /// Leading selector
    pub selector: Selector,
    /// Solution parameter names after the selector, in order
    pub parameters: Vec<String>,
    /// Ends with the `signer` parameter
    pub needs_signer: bool,
    /// Carries the state payload last
    pub needs_state: bool,
}

/// Solution layouts of every action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionTemplate {
    /// Dispatch mode the layouts assume
    pub dispatch: DispatchMode,
    /// One entry per action, in declaration order
    pub actions: Vec<ActionTemplate>,
}

impl SolutionTemplate {
    /// Layout of one action
    pub fn action(&self, name: &str) -> Option<&ActionTemplate> {
        self.actions.iter().find(|a| a.name == name)
    }
}

/// One action module under merkle dispatch
#[derive(Debug, Clone)]
pub struct ActionProgram {
    /// Action name
    pub name: String,
    /// Uncurried action module
    pub puzzle: Puzzle,
    /// Leaf program hash
    pub hash: Bytes32,
    /// Emitted source text
    pub source: String,
}

/// Compilation result with metadata
#[derive(Debug, Clone)]
pub struct CompileResult {
    /// Coin name
    pub coin_name: String,
    /// Dispatch mode used
    pub dispatch: DispatchMode,
    /// Main module: the coin, or the merkle dispatcher
    pub module: Puzzle,
    /// Tree hash of the uncurried main module
    pub mod_hash: Bytes32,
    /// Curried parameters with their values, in curry order
    pub curried_params: Vec<CurriedParam>,
    /// Tree hash of the curried main module
    pub puzzle_hash: Bytes32,
    /// Emitted source text of the main module
    pub source: String,
    /// Library files the main module includes
    pub includes: Vec<String>,
    /// How to build solutions
    pub solution_template: SolutionTemplate,
    /// Action modules under merkle dispatch
    pub actions: Vec<ActionProgram>,
    /// Action tree under merkle dispatch
    pub action_tree: Option<ActionMerkleTree>,
    /// Schema of the threaded state
    pub state_schema: Option<StateSchema>,
    /// Payload for the first coin
    pub initial_state: Option<Node>,
    /// Puzzle hash of the singleton wrapper around this coin
    pub singleton_puzzle_hash: Option<Bytes32>,
}

impl CompileResult {
    /// The main module with its curried values bound
    pub fn curried_puzzle(&self) -> Result<Node> {
        let values: Vec<Node> = self.curried_params.iter().map(|p| p.value.clone()).collect();
        self.module.curry(&values)
    }

    /// Solution builder preloaded with the action's selector
    pub fn solution_builder(&self, action: &str) -> Result<SolutionBuilder> {
        let template = self
            .solution_template
            .action(action)
            .ok_or_else(|| Error::UnknownAction(action.to_string()))?;
        Ok(match &template.selector {
            Selector::Absent => SolutionBuilder::new(),
            Selector::Default => SolutionBuilder::new().default_action(),
            Selector::Named(name) => SolutionBuilder::new().action(name),
        })
    }

    /// Dispatcher solution running `action` with `action_solution`
    pub fn merkle_spend(&self, action: &str, action_solution: Node) -> Result<Node> {
        let tree = self.action_tree.as_ref().ok_or_else(|| {
            Error::Config(format!(
                "coin '{}' was not compiled with merkle dispatch",
                self.coin_name
            ))
        })?;
        let program = self
            .actions
            .iter()
            .find(|p| p.name == action)
            .ok_or_else(|| Error::UnknownAction(action.to_string()))?;
        let proof = tree.proof(action)?;
        Ok(SolutionBuilder::merkle_spend(
            action,
            &proof,
            program.puzzle.module().clone(),
            action_solution,
        ))
    }

    /// Artifact summary
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "coin": self.coin_name,
            "dispatch": self.dispatch,
            "mod_hash": self.mod_hash,
            "puzzle_hash": self.puzzle_hash,
            "curried_params": self
                .curried_params
                .iter()
                .map(|p| serde_json::json!({ "name": p.name, "value": render_flat(&p.value) }))
                .collect::<Vec<_>>(),
            "includes": self.includes,
            "source": self.source,
            "solution_template": self.solution_template,
            "actions": self
                .actions
                .iter()
                .map(|a| serde_json::json!({ "name": a.name, "hash": a.hash, "source": a.source }))
                .collect::<Vec<_>>(),
            "action_root": self.action_tree.as_ref().map(ActionMerkleTree::root),
            "state_schema": self.state_schema,
            "initial_state": self.initial_state.as_ref().map(render_flat),
            "singleton_puzzle_hash": self.singleton_puzzle_hash,
        })
    }
}

/// CoinScript compiler
///
/// Reference programs and address decoding are services borrowed from the
/// caller; without a resolver only `0x` hex addresses are accepted.
pub struct Compiler<'a> {
    options: CompileOptions,
    library: Option<&'a dyn ReferenceLibrary>,
    resolver: Option<&'a dyn AddressResolver>,
}

impl<'a> Compiler<'a> {
    /// Create a new compiler with options
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            library: None,
            resolver: None,
        }
    }

    /// Reference programs for singleton wrapping
    pub fn with_library(mut self, library: &'a dyn ReferenceLibrary) -> Self {
        self.library = Some(library);
        self
    }

    /// Address decoding for string storage values
    pub fn with_resolver(mut self, resolver: &'a dyn AddressResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Options in use
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile with storage values taken from initializers
    pub fn compile(&self, source: &str) -> Result<CompileResult> {
        self.compile_with_storage(source, &[])
    }

    /// Compile with storage values supplied by the caller
    ///
    /// Supplied values take precedence over initializers. Naming a variable
    /// the coin does not declare in storage is a configuration error.
    pub fn compile_with_storage(
        &self,
        source: &str,
        storage: &[(&str, Value)],
    ) -> Result<CompileResult> {
        self.options.validate()?;
        let resolver: &dyn AddressResolver = self.resolver.unwrap_or(&HexAddressResolver);

        // Phase 1: Parse
        let program = parse_coinscript(source)?;
        tracing::debug!(coin = %program.coin.name, actions = program.coin.actions.len(), "parsed");

        // Phase 2: Analyze
        let analysis = Analyzer::new(&program).analyze()?;

        // Phase 3: Bind values
        let values = values::resolve(&program, &analysis, storage, resolver)?;

        // Phase 4: Generate
        let generator = CodeGenerator::new(&program, &analysis, &values.constants, &self.options);
        let curried_names = generator.curried_names();
        let lowered = generator.generate()?;

        // Phase 5: Hash
        let mut actions = Vec::with_capacity(lowered.actions.len());
        let mut action_tree = None;
        if self.options.dispatch == DispatchMode::Merkle {
            let mut tree = ActionMerkleTree::new();
            for (name, puzzle) in lowered.actions {
                let hash = puzzle.mod_hash();
                tree.add(name.clone(), hash)?;
                actions.push(ActionProgram {
                    source: puzzle.serialize(self.options.output, &self.options.format),
                    name,
                    puzzle,
                    hash,
                });
            }
            tracing::debug!(actions = tree.len(), root = %tree.root(), "built action tree");
            action_tree = Some(tree);
        }

        let module = lowered.module;
        let mod_hash = module.mod_hash();
        let mut bound = Vec::with_capacity(curried_names.len());
        if analysis.has_state() {
            bound.push(mod_hash.to_node());
        }
        if let Some(tree) = &action_tree {
            bound.push(tree.root().to_node());
        }
        bound.extend(values.storage.iter().cloned());
        let puzzle_hash = module.curried_hash(&bound)?;
        let curried_params = curried_names
            .into_iter()
            .zip(bound)
            .map(|(name, value)| CurriedParam { name, value })
            .collect();

        // Phase 6: State
        let (state_schema, initial_state) = if analysis.has_state() {
            let schema = StateSchema::from_decls(&program.coin.state, self.options.state_version);
            let manager = StateManager::with_policy(schema, self.options.missing_state_fields);
            let payload = manager.encode(&values.initial_state)?;
            (Some(manager.schema().clone()), Some(payload))
        } else {
            (None, None)
        };

        // Phase 7: Singleton
        let singleton_puzzle_hash =
            self.singleton_puzzle_hash(&program, &analysis, &values.storage, &puzzle_hash)?;

        tracing::info!(
            coin = %program.coin.name,
            %mod_hash,
            %puzzle_hash,
            "compiled"
        );

        Ok(CompileResult {
            coin_name: program.coin.name.clone(),
            dispatch: self.options.dispatch,
            source: module.serialize(self.options.output, &self.options.format),
            module,
            mod_hash,
            curried_params,
            puzzle_hash,
            includes: match self.options.dispatch {
                DispatchMode::Inline => analysis.includes.clone(),
                DispatchMode::Merkle => vec![SHA256TREE_LIB.to_string()],
            },
            solution_template: self.solution_template(&analysis),
            actions,
            action_tree,
            state_schema,
            initial_state,
            singleton_puzzle_hash,
        })
    }

    fn solution_template(&self, analysis: &Analysis) -> SolutionTemplate {
        let has_state = analysis.has_state();
        let actions = analysis
            .actions
            .iter()
            .map(|info| {
                let selector = match (self.options.dispatch, analysis.spend_path) {
                    (DispatchMode::Merkle, _) | (DispatchMode::Inline, SpendPath::Single) => {
                        Selector::Absent
                    }
                    (DispatchMode::Inline, SpendPath::Dispatch) if info.name == "default" => {
                        Selector::Default
                    }
                    (DispatchMode::Inline, SpendPath::Dispatch) => Selector::Named(info.name.clone()),
                };
                ActionTemplate {
                    name: info.name.clone(),
                    selector,
                    parameters: solution_params(info, has_state),
                    needs_signer: info.needs_signer,
                    needs_state: has_state,
                }
            })
            .collect();
        SolutionTemplate {
            dispatch: self.options.dispatch,
            actions,
        }
    }

    fn singleton_puzzle_hash(
        &self,
        program: &Program,
        analysis: &Analysis,
        storage: &[Node],
        inner_puzzle_hash: &Bytes32,
    ) -> Result<Option<Bytes32>> {
        let Some(launcher) = &analysis.launcher else {
            return Ok(None);
        };
        if self.options.successor_amount % 2 == 0 {
            return Err(Error::Config(format!(
                "singleton '{}' needs an odd successor amount, got {}",
                program.coin.name, self.options.successor_amount
            )));
        }
        let library = self.library.ok_or_else(|| {
            Error::generation("singleton coins need a reference program library")
        })?;

        let launcher_id = match launcher {
            LauncherSource::Literal(bytes) => Bytes32::from_slice(bytes)?,
            LauncherSource::Storage(name) => {
                let node = analysis
                    .storage
                    .iter()
                    .position(|var| &var.name == name)
                    .and_then(|index| storage.get(index))
                    .ok_or_else(|| Error::generation(format!("launcher id '{}' has no value", name)))?;
                let bytes = node.as_bytes().ok_or_else(|| Error::InvalidValue {
                    expected: "32-byte launcher id".to_string(),
                    got: render_flat(node),
                })?;
                Bytes32::from_slice(bytes)?
            }
        };

        let top = library.program(SINGLETON_TOP_LAYER)?;
        let launcher_program = library.program(SINGLETON_LAUNCHER)?;
        let singleton_struct = Node::cons(
            top.hash.to_node(),
            Node::cons(launcher_id.to_node(), launcher_program.hash.to_node()),
        );
        let outer = curry_tree_hash(&top.hash, &[tree_hash(&singleton_struct), *inner_puzzle_hash]);
        tracing::debug!(%launcher_id, %outer, "wrapped in singleton");
        Ok(Some(outer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::library::CURRY_LIB;
    use crate::ir::Serializer;

    fn owner() -> Value {
        Value::hex(format!("0x{}", "aa".repeat(32)))
    }

    const COUNTER: &str = r#"
        coin Counter {
            state { uint256 count = 0; }
            action increment(uint256 by) {
                count += by;
            }
        }
    "#;

    #[test]
    fn test_options_from_json() {
        let options = CompileOptions::from_json(r#"{"dispatch": "merkle", "successor_amount": 3}"#)
            .unwrap();
        assert_eq!(options.dispatch, DispatchMode::Merkle);
        assert_eq!(options.successor_amount, 3);
        assert_eq!(options.state_version, 1);

        assert!(matches!(
            CompileOptions::from_json(r#"{"max_nesting": 0}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            CompileOptions::from_json(r#"{"dispatch": 7}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_stateful_coin_curries_mod_hash_and_threads_state() {
        let result = Compiler::new(CompileOptions::default()).compile(COUNTER).unwrap();
        assert_eq!(result.curried_params.len(), 1);
        assert_eq!(result.curried_params[0].name, MOD_HASH);
        assert_eq!(result.curried_params[0].value, result.mod_hash.to_node());
        assert!(result.includes.contains(&CURRY_LIB.to_string()));

        let text = Serializer::compact().render(result.module.module());
        assert!(text.contains("puzzle-hash-of-curried-function"));
        assert!(text.contains("state version mismatch"));

        let initial = result.initial_state.unwrap();
        assert_eq!(render_flat(&initial), "(1 0)");

        let template = result.solution_template.action("increment").unwrap();
        assert_eq!(template.parameters, vec!["by".to_string(), CURRENT_STATE.to_string()]);
        assert_eq!(template.selector, Selector::Absent);
    }

    #[test]
    fn test_storage_override_changes_puzzle_hash_only() {
        let source = r#"
            coin Vault {
                storage address owner;
                action spend(uint256 amount) {
                    require(msg.sender == owner);
                    send(owner, amount);
                }
            }
        "#;
        let compiler = Compiler::new(CompileOptions::default());
        let first = compiler.compile_with_storage(source, &[("owner", owner())]).unwrap();
        let second = compiler
            .compile_with_storage(source, &[("owner", Value::hex(format!("0x{}", "bb".repeat(32))))])
            .unwrap();
        assert_eq!(first.mod_hash, second.mod_hash);
        assert_ne!(first.puzzle_hash, second.puzzle_hash);
        assert_eq!(
            first.puzzle_hash,
            first.module.curried_hash(&[first.curried_params[0].value.clone()]).unwrap()
        );
        assert_eq!(
            tree_hash(&first.curried_puzzle().unwrap()),
            first.puzzle_hash
        );
    }

    #[test]
    fn test_default_action_uses_nil_selector() {
        let source = r#"
            coin Box {
                action open(address to) { send(to, 1); }
                action default() { reserveFee(1); }
            }
        "#;
        let result = Compiler::new(CompileOptions::default()).compile(source).unwrap();
        assert_eq!(
            result.solution_template.action("default").unwrap().selector,
            Selector::Default
        );
        let solution = result.solution_builder("default").unwrap().build().unwrap();
        assert!(solution.as_list().unwrap()[0].is_nil());

        let text = Serializer::compact().render(result.module.module());
        assert!(text.contains("unknown action"));
        assert!(text.contains("(defun action_open"));
    }

    #[test]
    fn test_singleton_requires_library() {
        let source = r#"
            @singleton
            coin Unique {
                storage bytes32 launcherId = 0x0101010101010101010101010101010101010101010101010101010101010101;
                action spend(address to) { send(to, 1); }
            }
        "#;
        let err = Compiler::new(CompileOptions::default()).compile(source).unwrap_err();
        assert!(matches!(err, Error::GenerationError(_)));
    }

    #[test]
    fn test_merkle_spend_requires_merkle_dispatch() {
        let result = Compiler::new(CompileOptions::default()).compile(COUNTER).unwrap();
        assert!(matches!(
            result.merkle_spend("increment", Node::nil()),
            Err(Error::Config(_))
        ));
        let summary = result.to_json();
        assert_eq!(summary["coin"], "Counter");
        assert!(summary["action_root"].is_null());
    }
}
