use crate::parser::{Span, TypeName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value categories the checker distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// `uint256` / `int`
    Int,
    /// `address`, `bytes32`, `bytes`
    Bytes,
    /// `string`
    Str,
    /// `bool`
    Bool,
    /// `mapping(K => V)`
    Mapping,
    /// Result of an effect-only builtin
    Unit,
    /// Unknown, suppresses follow-up errors
    Any,
}

impl Type {
    /// Category of a declared type
    pub fn of(ty: &TypeName) -> Type {
        match ty {
            TypeName::Uint256 | TypeName::Int => Type::Int,
            TypeName::Address | TypeName::Bytes32 | TypeName::Bytes => Type::Bytes,
            TypeName::String => Type::Str,
            TypeName::Bool => Type::Bool,
            TypeName::Mapping(_, _) => Type::Mapping,
        }
    }

    /// True when a value of type `other` may be used where `self` is expected
    pub fn accepts(self, other: Type) -> bool {
        if self == other || self == Type::Any || other == Type::Any {
            return true;
        }
        // Strings and byte strings are both plain atoms
        matches!(
            (self, other),
            (Type::Bytes, Type::Str) | (Type::Str, Type::Bytes)
        )
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            Type::Int => "integer",
            Type::Bytes => "bytes",
            Type::Str => "string",
            Type::Bool => "bool",
            Type::Mapping => "mapping",
            Type::Unit => "condition",
            Type::Any => "any",
        };
        f.write_str(text)
    }
}

/// What a name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Curried, immutable
    Storage,
    /// Threaded through spends, mutable
    State,
    /// Action parameter
    Parameter,
    /// Local declared inside an action body
    Local,
    /// `const` declaration
    Constant,
    /// `event` declaration
    Event,
}

/// How a coin-level value reaches the program at spend time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Baked into the program, part of its puzzle hash
    Curried,
    /// Carried in the solution, rewritten into the successor coin
    Threaded,
}

/// Index of a scope in the [`SymbolTable`]
pub type ScopeId = usize;

/// One declared name
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    /// Author-facing name
    pub name: String,
    /// Declaration category
    pub kind: SymbolKind,
    /// Declared type
    pub ty: TypeName,
    /// Scope that owns the declaration
    pub scope: ScopeId,
    /// Curried or threaded, for storage and state only
    pub classification: Option<Classification>,
    /// Position in its declaration list (storage order, state field index)
    pub index: usize,
    /// Where it was declared
    pub span: Span,
}

impl Symbol {
    /// Checker category of the declared type
    pub fn value_type(&self) -> Type {
        Type::of(&self.ty)
    }

    /// True for storage, constants and parameters
    pub fn is_immutable(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Storage | SymbolKind::Constant | SymbolKind::Parameter | SymbolKind::Event
        )
    }
}

#[derive(Debug, Clone, Default)]
struct Scope {
    parent: Option<ScopeId>,
    symbols: BTreeMap<String, Symbol>,
}

/// Lexically scoped symbol table
///
/// Scope `0` is the coin scope holding storage, state, constants and events.
/// Each action and each block inside it opens a child scope.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    /// Coin scope id
    pub const COIN_SCOPE: ScopeId = 0;

    /// Table holding only the empty coin scope
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope::default()],
        }
    }

    /// Open a child scope
    pub fn push_scope(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.push(Scope {
            parent: Some(parent),
            symbols: BTreeMap::new(),
        });
        self.scopes.len() - 1
    }

    /// Declare a symbol in its scope, handing back the earlier declaration on a clash
    pub fn define(&mut self, symbol: Symbol) -> std::result::Result<(), Symbol> {
        let scope = &mut self.scopes[symbol.scope];
        if let Some(existing) = scope.symbols.get(&symbol.name) {
            return Err(existing.clone());
        }
        scope.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Resolve a name from `scope` outwards
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.scopes.get(id)?;
            if let Some(symbol) = scope.symbols.get(name) {
                return Some(symbol);
            }
            current = scope.parent;
        }
        None
    }

    /// Resolve a name in `scope` only
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.scopes.get(scope)?.symbols.get(name)
    }

    /// Coin-scope symbols of one kind, ordered by declaration index
    pub fn coin_symbols(&self, kind: SymbolKind) -> Vec<&Symbol> {
        let mut symbols: Vec<&Symbol> = self.scopes[Self::COIN_SCOPE]
            .symbols
            .values()
            .filter(|s| s.kind == kind)
            .collect();
        symbols.sort_by_key(|s| s.index);
        symbols
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(name: &str, kind: SymbolKind, scope: ScopeId, index: usize) -> Symbol {
        Symbol {
            name: name.to_string(),
            kind,
            ty: TypeName::Uint256,
            scope,
            classification: None,
            index,
            span: Span::default(),
        }
    }

    #[test]
    fn test_scoped_lookup_and_shadowing() {
        let mut table = SymbolTable::new();
        table
            .define(symbol("x", SymbolKind::Storage, 0, 0))
            .unwrap();
        let action = table.push_scope(SymbolTable::COIN_SCOPE);
        table
            .define(symbol("x", SymbolKind::Parameter, action, 0))
            .unwrap();

        assert_eq!(table.lookup(action, "x").unwrap().kind, SymbolKind::Parameter);
        assert_eq!(table.lookup(0, "x").unwrap().kind, SymbolKind::Storage);
        assert!(table.lookup(action, "y").is_none());
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let mut table = SymbolTable::new();
        table.define(symbol("a", SymbolKind::State, 0, 0)).unwrap();
        let clash = table.define(symbol("a", SymbolKind::Storage, 0, 1));
        assert_eq!(clash.unwrap_err().kind, SymbolKind::State);
    }

    #[test]
    fn test_coin_symbols_keep_declaration_order() {
        let mut table = SymbolTable::new();
        table.define(symbol("zeta", SymbolKind::Storage, 0, 0)).unwrap();
        table.define(symbol("alpha", SymbolKind::Storage, 0, 1)).unwrap();
        let names: Vec<&str> = table
            .coin_symbols(SymbolKind::Storage)
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_type_compatibility() {
        assert!(Type::Bytes.accepts(Type::Str));
        assert!(Type::Int.accepts(Type::Any));
        assert!(!Type::Int.accepts(Type::Bool));
        assert_eq!(Type::of(&TypeName::Address), Type::Bytes);
    }
}
