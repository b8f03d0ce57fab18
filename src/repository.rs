//! Reference programs and address resolution
//!
//! The compiler consumes reference programs (the singleton top layer and
//! launcher, shared libraries) and address decoding as services handed to
//! it by the caller. Nothing here is process-global: a [`ProgramRepository`]
//! is an ordinary value the caller owns and shares by reference.

use crate::analyzer::Classification;
use crate::error::{Error, Result};
use crate::hash::{tree_hash, Bytes32};
use crate::ir::Node;
use crate::parser::parse_sexpr;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Singleton top layer program id
pub const SINGLETON_TOP_LAYER: &str = "singleton_top_layer_v1_1";
/// Singleton launcher program id
pub const SINGLETON_LAUNCHER: &str = "singleton_launcher";

/// Where reference program source text comes from
pub trait ProgramSource: Send + Sync {
    /// Source text for a program id
    fn load(&self, id: &str) -> Result<String>;
}

/// Programs held in memory, keyed by id
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    programs: HashMap<String, String>,
}

impl InMemorySource {
    /// Empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a program and return the source
    pub fn with_program(mut self, id: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(id, source);
        self
    }

    /// Add or replace a program
    pub fn insert(&mut self, id: impl Into<String>, source: impl Into<String>) {
        self.programs.insert(id.into(), source.into());
    }
}

impl ProgramSource for InMemorySource {
    fn load(&self, id: &str) -> Result<String> {
        self.programs
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ProgramNotFound { id: id.to_string() })
    }
}

/// Programs read from `<root>/<id>.clsp`, then `.clvm`, then `.clib`
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Source rooted at a directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectorySource { root: root.into() }
    }
}

impl ProgramSource for DirectorySource {
    fn load(&self, id: &str) -> Result<String> {
        for extension in ["clsp", "clvm", "clib"] {
            let path = self.root.join(format!("{}.{}", id, extension));
            match std::fs::read_to_string(&path) {
                Ok(text) => return Ok(text),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot read reference program");
                    return Err(Error::ProgramNotFound { id: id.to_string() });
                }
            }
        }
        Err(Error::ProgramNotFound { id: id.to_string() })
    }
}

/// A declared parameter of a reference program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceParam {
    /// Parameter name
    pub name: String,
    /// Curried or supplied at spend time
    pub classification: Classification,
}

/// A parsed reference program with its identity
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceProgram {
    /// Program id
    pub id: String,
    /// Parsed tree
    pub module: Node,
    /// Structural hash of `module`
    pub hash: Bytes32,
    /// Declared parameters when the program is a `(mod PARAMS ...)` form
    pub params: Vec<ReferenceParam>,
}

impl ReferenceProgram {
    /// Parse source text and classify its parameters
    ///
    /// Upper-case parameter names are curried; everything else is a
    /// solution parameter. The decision is made once, here.
    pub fn parse(id: &str, source: &str) -> Result<Self> {
        let module = parse_sexpr(source)?;
        let params = declared_params(&module)
            .into_iter()
            .map(|name| {
                let classification = if is_curried_name(&name) {
                    Classification::Curried
                } else {
                    Classification::Threaded
                };
                ReferenceParam {
                    name,
                    classification,
                }
            })
            .collect();
        Ok(ReferenceProgram {
            id: id.to_string(),
            hash: tree_hash(&module),
            module,
            params,
        })
    }

    /// Names of the curried parameters, in order
    pub fn curried_params(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.classification == Classification::Curried)
            .map(|p| p.name.as_str())
    }
}

fn declared_params(module: &Node) -> Vec<String> {
    let is_mod = module
        .first()
        .and_then(Node::as_str)
        .map_or(false, |head| head == "mod");
    if !is_mod {
        return Vec::new();
    }
    let mut names = Vec::new();
    let mut cursor = module.rest().and_then(Node::first);
    while let Some(node) = cursor {
        match node.pair() {
            Some((first, rest)) => {
                if let Some(name) = first.as_str() {
                    names.push(name.to_string());
                }
                cursor = Some(rest);
            }
            None => {
                if let Some(name) = node.as_str().filter(|n| !n.is_empty()) {
                    names.push(name.to_string());
                }
                cursor = None;
            }
        }
    }
    names
}

fn is_curried_name(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Lookup of reference programs by id
pub trait ReferenceLibrary: Send + Sync {
    /// The parsed program, loading it on first use
    fn program(&self, id: &str) -> Result<Arc<ReferenceProgram>>;
}

/// Read-through cache of parsed reference programs
///
/// Concurrent misses for the same id may both load and parse; the last
/// insert wins and readers only ever see complete entries.
pub struct ProgramRepository<S: ProgramSource> {
    source: S,
    cache: DashMap<String, Arc<ReferenceProgram>>,
}

impl<S: ProgramSource> ProgramRepository<S> {
    /// Repository over a source
    pub fn new(source: S) -> Self {
        ProgramRepository {
            source,
            cache: DashMap::new(),
        }
    }

    /// Number of cached programs
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl<S: ProgramSource> ReferenceLibrary for ProgramRepository<S> {
    fn program(&self, id: &str) -> Result<Arc<ReferenceProgram>> {
        if let Some(entry) = self.cache.get(id) {
            tracing::trace!(id, "reference program cache hit");
            return Ok(Arc::clone(entry.value()));
        }
        tracing::debug!(id, "reference program cache miss");
        let source = self.source.load(id)?;
        let program = Arc::new(ReferenceProgram::parse(id, &source)?);
        self.cache.insert(id.to_string(), Arc::clone(&program));
        Ok(program)
    }
}

/// Address string → 32-byte puzzle hash
pub trait AddressResolver: Send + Sync {
    /// Decode an address
    fn resolve(&self, address: &str) -> Result<Bytes32>;
}

/// Accepts `0x`-prefixed 32-byte hex; other encodings need another resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct HexAddressResolver;

impl AddressResolver for HexAddressResolver {
    fn resolve(&self, address: &str) -> Result<Bytes32> {
        let error = |reason: &str| Error::AddressError {
            address: address.to_string(),
            reason: reason.to_string(),
        };
        let digits = address
            .strip_prefix("0x")
            .ok_or_else(|| error("only 0x-prefixed hex addresses are supported"))?;
        let bytes = hex::decode(digits).map_err(|e| error(&e.to_string()))?;
        Bytes32::from_slice(&bytes).map_err(|_| error("expected 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAUNCHER: &str = "(mod (launcher_arg) (list (list 51 launcher_arg 1)))";
    const TOP: &str = "(mod (SINGLETON_STRUCT INNER_PUZZLE lineage_proof my_amount inner_solution) (a INNER_PUZZLE inner_solution))";

    #[test]
    fn test_parameters_are_classified_at_load() {
        let program = ReferenceProgram::parse(SINGLETON_TOP_LAYER, TOP).unwrap();
        let curried: Vec<&str> = program.curried_params().collect();
        assert_eq!(curried, vec!["SINGLETON_STRUCT", "INNER_PUZZLE"]);
        assert_eq!(program.params[2].classification, Classification::Threaded);
        assert_eq!(program.hash, tree_hash(&program.module));
    }

    #[test]
    fn test_repository_caches() {
        let repository = ProgramRepository::new(
            InMemorySource::new()
                .with_program(SINGLETON_LAUNCHER, LAUNCHER)
                .with_program(SINGLETON_TOP_LAYER, TOP),
        );
        let first = repository.program(SINGLETON_LAUNCHER).unwrap();
        let second = repository.program(SINGLETON_LAUNCHER).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(repository.cached(), 1);
        assert_eq!(
            repository.program("missing").unwrap_err(),
            Error::ProgramNotFound {
                id: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_rest_parameter_is_declared() {
        let program = ReferenceProgram::parse("p", "(mod (A . rest) rest)").unwrap();
        let names: Vec<&str> = program.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "rest"]);
    }

    #[test]
    fn test_hex_address_resolver() {
        let resolver = HexAddressResolver;
        let address = format!("0x{}", "ab".repeat(32));
        assert_eq!(resolver.resolve(&address).unwrap(), Bytes32([0xab; 32]));
        assert!(matches!(
            resolver.resolve("xch1qqqq"),
            Err(Error::AddressError { .. })
        ));
        assert!(resolver.resolve("0xabcd").is_err());
    }
}
