//! # Semantic Analyzer
//!
//! Validation passes over a parsed [`Program`]. Results attach to an
//! [`Analysis`] side table; the AST is never modified.
//!
//! ```text
//! analyzer/
//! ├── mod.rs      # This file - passes and the Analysis table
//! ├── symbols.rs  # scoped symbol table, Classification
//! └── library.rs  # callable names, includes, naming convention
//! ```
//!
//! Diagnostics accumulate across every pass and are reported together as
//! [`Error::Semantic`].

pub mod library;
mod symbols;

pub use library::{curried_name, solution_name, FunctionKind, LibraryFunction};
pub use symbols::{Classification, ScopeId, Symbol, SymbolKind, SymbolTable, Type};

use crate::error::{Diagnostic, Error, Result, SemanticErrorKind};
use crate::parser::{
    Action, BinaryOp, CoinDecl, Decorator, Expr, ExprKind, Literal, Program, Span, Stmt,
    StmtKind, TypeName, UnaryOp, VarDecl,
};
use std::collections::BTreeMap;

/// Author name of the storage variable `@singleton` adds when given no argument
pub const LAUNCHER_ID: &str = "launcherId";

/// How the coin is entered at spend time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendPath {
    /// One action; its parameters are the whole solution
    Single,
    /// Several actions selected by name
    Dispatch,
}

/// Where a singleton's launcher id comes from
#[derive(Debug, Clone, PartialEq)]
pub enum LauncherSource {
    /// Storage variable holding the id (implicit `launcherId` or the named one)
    Storage(String),
    /// Literal given to `@singleton(0x...)`
    Literal(Vec<u8>),
}

/// Solution parameter of one action
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    /// Author-facing name
    pub name: String,
    /// Generated name
    pub target: String,
    /// Declared type
    pub ty: TypeName,
}

/// Per-action analysis results
#[derive(Debug, Clone, PartialEq)]
pub struct ActionInfo {
    /// Action name
    pub name: String,
    /// Generated helper function name for inline dispatch
    pub function: String,
    /// Scope of the action's parameters
    pub scope: ScopeId,
    /// Declared parameters in solution order
    pub params: Vec<ParamInfo>,
    /// Takes an extra `signer` parameter
    pub needs_signer: bool,
    /// Addresses from `@onlyAddress`, any of which may authorize the spend
    pub only_addresses: Vec<Expr>,
    /// Marked `@stateful`
    pub stateful: bool,
    /// Author name → generated name for locals
    pub locals: BTreeMap<String, String>,
}

/// Everything generation needs beyond the AST
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Scoped declarations
    pub symbols: SymbolTable,
    /// Library files to include, in emission order
    pub includes: Vec<String>,
    /// Storage declarations including implicit ones, in curry order
    pub storage: Vec<VarDecl>,
    /// Author name → generated name for storage and constants
    pub coin_names: BTreeMap<String, String>,
    /// One entry per action, in declaration order
    pub actions: Vec<ActionInfo>,
    /// Single action or dispatch
    pub spend_path: SpendPath,
    /// Launcher id source when the coin is a singleton
    pub launcher: Option<LauncherSource>,
}

impl Analysis {
    /// Results for one action
    pub fn action(&self, name: &str) -> Option<&ActionInfo> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// True when the coin threads state between spends
    pub fn has_state(&self) -> bool {
        !self
            .symbols
            .coin_symbols(SymbolKind::State)
            .is_empty()
    }

    /// Storage or constant symbol by author name
    pub fn coin_symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols
            .lookup_local(SymbolTable::COIN_SCOPE, name)
    }
}

/// The `X` in `require(msg.sender == X)`, either operand order
pub fn sender_check_target(condition: &Expr) -> Option<&Expr> {
    match &condition.kind {
        ExprKind::Binary {
            op: BinaryOp::Eq,
            left,
            right,
        } => {
            if left.is_msg_sender() && !right.is_msg_sender() {
                Some(right)
            } else if right.is_msg_sender() && !left.is_msg_sender() {
                Some(left)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Semantic analyzer for one compilation unit
pub struct Analyzer<'a> {
    program: &'a Program,
    symbols: SymbolTable,
    diagnostics: Vec<Diagnostic>,
    includes: Vec<String>,
    storage: Vec<VarDecl>,
    actions: Vec<ActionInfo>,
    launcher: Option<LauncherSource>,
    /// Action being checked
    current: Option<ActionInfo>,
    emits_signatures: bool,
}

impl<'a> Analyzer<'a> {
    /// Creates an analyzer over a parsed program
    pub fn new(program: &'a Program) -> Self {
        Analyzer {
            program,
            symbols: SymbolTable::new(),
            diagnostics: Vec::new(),
            includes: Vec::new(),
            storage: Vec::new(),
            actions: Vec::new(),
            launcher: None,
            current: None,
            emits_signatures: false,
        }
    }

    /// Runs every pass, failing with all diagnostics found
    pub fn analyze(mut self) -> Result<Analysis> {
        let coin = &self.program.coin;

        for include in &self.program.includes {
            self.note_include(&include.name);
        }

        self.declare_coin_scope(coin);
        self.check_spend_path(coin);
        self.check_coin_decorators(coin);
        self.check_initializers(coin);
        for action in &coin.actions {
            self.check_action(coin, action);
        }

        let has_state = !coin.state.is_empty();
        let has_events = coin.actions.iter().any(|a| body_emits(&a.body));
        if self.emits_signatures || has_events || has_state {
            self.note_include(library::SHA256TREE_LIB);
        }
        if has_state {
            self.note_include(library::CURRY_LIB);
        }

        let coin_names = self.build_coin_names(coin);
        self.check_action_names();

        if !self.diagnostics.is_empty() {
            tracing::debug!(count = self.diagnostics.len(), "semantic analysis failed");
            return Err(Error::Semantic(self.diagnostics));
        }

        let spend_path = if coin.actions.len() == 1 {
            SpendPath::Single
        } else {
            SpendPath::Dispatch
        };

        tracing::debug!(
            coin = %coin.name,
            actions = self.actions.len(),
            includes = ?self.includes,
            "semantic analysis complete"
        );

        Ok(Analysis {
            symbols: self.symbols,
            includes: self.includes,
            storage: self.storage,
            coin_names,
            actions: self.actions,
            spend_path,
            launcher: self.launcher,
        })
    }

    fn report(&mut self, span: Span, kind: SemanticErrorKind, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::new(span.line, span.column, kind, message));
    }

    fn note_include(&mut self, name: &str) {
        if !self.includes.iter().any(|i| i == name) {
            self.includes.push(name.to_string());
        }
    }

    // ---- coin scope ----

    fn declare_coin_scope(&mut self, coin: &CoinDecl) {
        for (index, var) in coin.storage.iter().enumerate() {
            if matches!(var.ty, TypeName::Mapping(_, _)) {
                self.report(
                    var.span,
                    SemanticErrorKind::TypeMismatch,
                    format!("storage variable '{}' cannot be a mapping; mappings live in state", var.name),
                );
            }
            self.declare(var, SymbolKind::Storage, Some(Classification::Curried), index);
            self.storage.push(var.clone());
        }

        // @singleton without an argument carries its launcher id in storage
        let singleton = coin.decorators.iter().find(|d| d.name == "singleton");
        if let Some(decorator) = singleton {
            if decorator.args.is_empty() {
                if coin.storage.iter().all(|v| v.name != LAUNCHER_ID) {
                    let implicit = VarDecl {
                        name: LAUNCHER_ID.to_string(),
                        ty: TypeName::Bytes32,
                        init: None,
                        span: decorator.span,
                    };
                    let index = self.storage.len();
                    self.declare(&implicit, SymbolKind::Storage, Some(Classification::Curried), index);
                    self.storage.push(implicit);
                }
                self.launcher = Some(LauncherSource::Storage(LAUNCHER_ID.to_string()));
            }
        }

        for (index, var) in coin.state.iter().enumerate() {
            self.declare(var, SymbolKind::State, Some(Classification::Threaded), index);
        }

        for (index, constant) in coin.constants.iter().enumerate() {
            let symbol = Symbol {
                name: constant.name.clone(),
                kind: SymbolKind::Constant,
                ty: constant.ty.clone(),
                scope: SymbolTable::COIN_SCOPE,
                classification: None,
                index,
                span: constant.span,
            };
            self.define(symbol);
        }

        for (index, event) in coin.events.iter().enumerate() {
            let symbol = Symbol {
                name: event.name.clone(),
                kind: SymbolKind::Event,
                ty: TypeName::Bytes,
                scope: SymbolTable::COIN_SCOPE,
                classification: None,
                index,
                span: event.span,
            };
            self.define(symbol);
        }
    }

    fn declare(
        &mut self,
        var: &VarDecl,
        kind: SymbolKind,
        classification: Option<Classification>,
        index: usize,
    ) {
        let symbol = Symbol {
            name: var.name.clone(),
            kind,
            ty: var.ty.clone(),
            scope: SymbolTable::COIN_SCOPE,
            classification,
            index,
            span: var.span,
        };
        self.define(symbol);
    }

    fn define(&mut self, symbol: Symbol) {
        if matches!(symbol.name.as_str(), "msg" | "state") {
            self.report(
                symbol.span,
                SemanticErrorKind::NamingConflict,
                format!("'{}' is reserved", symbol.name),
            );
            return;
        }
        let span = symbol.span;
        let name = symbol.name.clone();
        let kind = symbol.kind;
        if let Err(existing) = self.symbols.define(symbol) {
            let storage_state = matches!(
                (existing.kind, kind),
                (SymbolKind::Storage, SymbolKind::State) | (SymbolKind::State, SymbolKind::Storage)
            );
            if storage_state {
                self.report(
                    span,
                    SemanticErrorKind::StorageStateConflict,
                    format!(
                        "'{}' is declared as both storage and state; a variable is either curried or threaded",
                        name
                    ),
                );
            } else {
                self.report(
                    span,
                    SemanticErrorKind::DuplicateDeclaration,
                    format!(
                        "'{}' is already declared at line {}, column {}",
                        name, existing.span.line, existing.span.column
                    ),
                );
            }
        }
    }

    fn check_spend_path(&mut self, coin: &CoinDecl) {
        if coin.actions.is_empty() {
            self.report(
                coin.span,
                SemanticErrorKind::MissingSpendPath,
                format!(
                    "coin '{}' has no way to be spent: declare a 'spend' action, a 'default' action, or named actions",
                    coin.name
                ),
            );
        }

        let mut seen: BTreeMap<&str, Span> = BTreeMap::new();
        for action in &coin.actions {
            if let Some(first) = seen.get(action.name.as_str()) {
                let message = format!(
                    "action '{}' is already declared at line {}",
                    action.name, first.line
                );
                self.report(action.span, SemanticErrorKind::DuplicateDeclaration, message);
            } else {
                seen.insert(&action.name, action.span);
            }
        }
    }

    fn check_coin_decorators(&mut self, coin: &CoinDecl) {
        let mut singleton_seen = false;
        for decorator in &coin.decorators {
            match decorator.name.as_str() {
                "singleton" => {
                    if singleton_seen {
                        self.report(
                            decorator.span,
                            SemanticErrorKind::InvalidDecorator,
                            "@singleton given twice",
                        );
                        continue;
                    }
                    singleton_seen = true;
                    match decorator.args.as_slice() {
                        [] => {}
                        [arg] => {
                            if let Some(source) = self.launcher_argument(arg) {
                                self.launcher = Some(source);
                            }
                        }
                        _ => self.report(
                            decorator.span,
                            SemanticErrorKind::InvalidDecorator,
                            "@singleton takes at most one launcher id",
                        ),
                    }
                }
                "onlyAddress" | "stateful" => self.report(
                    decorator.span,
                    SemanticErrorKind::InvalidDecorator,
                    format!("@{} applies to actions, not to the coin", decorator.name),
                ),
                other => self.report(
                    decorator.span,
                    SemanticErrorKind::InvalidDecorator,
                    format!("unknown decorator @{}", other),
                ),
            }
        }
    }

    fn launcher_argument(&mut self, arg: &Expr) -> Option<LauncherSource> {
        match &arg.kind {
            ExprKind::Literal(Literal::Bytes(bytes)) => Some(LauncherSource::Literal(bytes.clone())),
            ExprKind::Identifier(name) => {
                let symbol = self.symbols.lookup(SymbolTable::COIN_SCOPE, name).cloned();
                match symbol {
                    Some(s) if s.kind == SymbolKind::Storage && s.value_type() == Type::Bytes => {
                        Some(LauncherSource::Storage(name.clone()))
                    }
                    _ => {
                        self.report(
                            arg.span,
                            SemanticErrorKind::InvalidDecorator,
                            format!("@singleton launcher '{}' must be a bytes32 storage variable", name),
                        );
                        None
                    }
                }
            }
            _ => {
                self.report(
                    arg.span,
                    SemanticErrorKind::InvalidDecorator,
                    "@singleton launcher must be a hex literal or a storage variable",
                );
                None
            }
        }
    }

    fn check_initializers(&mut self, coin: &CoinDecl) {
        for var in coin.storage.iter().chain(coin.state.iter()) {
            if let Some(init) = &var.init {
                self.check_constant_value(init, &var.ty, &var.name);
            }
        }
        for constant in &coin.constants {
            self.check_constant_value(&constant.value, &constant.ty, &constant.name);
        }
    }

    fn check_constant_value(&mut self, value: &Expr, ty: &TypeName, name: &str) {
        let found = self.check_expr(value, SymbolTable::COIN_SCOPE);
        self.expect_type(value.span, Type::of(ty), found, &format!("value of '{}'", name));
        if !self.is_constant_expr(value) {
            self.report(
                value.span,
                SemanticErrorKind::TypeMismatch,
                format!("value of '{}' must be computable at compile time", name),
            );
        }
    }

    fn is_constant_expr(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Literal(_) => true,
            ExprKind::Identifier(name) => matches!(
                self.symbols.lookup(SymbolTable::COIN_SCOPE, name),
                Some(s) if s.kind == SymbolKind::Constant
            ),
            ExprKind::Unary { operand, .. } => self.is_constant_expr(operand),
            ExprKind::Binary { left, right, .. } => {
                self.is_constant_expr(left) && self.is_constant_expr(right)
            }
            _ => false,
        }
    }

    // ---- actions ----

    fn check_action(&mut self, coin: &CoinDecl, action: &Action) {
        let scope = self.symbols.push_scope(SymbolTable::COIN_SCOPE);
        let mut params = Vec::new();
        for (index, param) in action.params.iter().enumerate() {
            if self.symbols.lookup(scope, &param.name).is_some() {
                self.report(
                    param.span,
                    SemanticErrorKind::DuplicateDeclaration,
                    format!("parameter '{}' shadows an existing declaration", param.name),
                );
                continue;
            }
            let symbol = Symbol {
                name: param.name.clone(),
                kind: SymbolKind::Parameter,
                ty: param.ty.clone(),
                scope,
                classification: None,
                index,
                span: param.span,
            };
            self.define(symbol);
            params.push(ParamInfo {
                name: param.name.clone(),
                target: solution_name(&param.name),
                ty: param.ty.clone(),
            });
        }

        self.current = Some(ActionInfo {
            name: action.name.clone(),
            function: format!("action_{}", library::to_snake_case(&action.name)),
            scope,
            params,
            needs_signer: false,
            only_addresses: Vec::new(),
            stateful: false,
            locals: BTreeMap::new(),
        });

        self.check_action_decorators(coin, action, scope);
        self.check_block(&action.body, scope);

        if let Some(info) = self.current.take() {
            if info.needs_signer {
                self.emits_signatures = true;
            }
            self.actions.push(info);
        }
    }

    fn check_action_decorators(&mut self, coin: &CoinDecl, action: &Action, scope: ScopeId) {
        for decorator in &action.decorators {
            match decorator.name.as_str() {
                "onlyAddress" => self.check_only_address(decorator, scope),
                "stateful" => {
                    if coin.state.is_empty() {
                        self.report(
                            decorator.span,
                            SemanticErrorKind::InvalidDecorator,
                            format!(
                                "@stateful on '{}' requires the coin to declare a state block",
                                action.name
                            ),
                        );
                    }
                    if !decorator.args.is_empty() {
                        self.report(
                            decorator.span,
                            SemanticErrorKind::InvalidDecorator,
                            "@stateful takes no arguments",
                        );
                    }
                    if let Some(info) = self.current.as_mut() {
                        info.stateful = true;
                    }
                }
                "singleton" => self.report(
                    decorator.span,
                    SemanticErrorKind::InvalidDecorator,
                    "@singleton applies to the coin, not to an action",
                ),
                other => self.report(
                    decorator.span,
                    SemanticErrorKind::InvalidDecorator,
                    format!("unknown decorator @{}", other),
                ),
            }
        }
    }

    fn check_only_address(&mut self, decorator: &Decorator, scope: ScopeId) {
        if decorator.args.is_empty() {
            self.report(
                decorator.span,
                SemanticErrorKind::InvalidDecorator,
                "@onlyAddress needs at least one address",
            );
            return;
        }
        let mut addresses = Vec::new();
        for arg in &decorator.args {
            let valid = match &arg.kind {
                ExprKind::Literal(Literal::Bytes(_)) => true,
                ExprKind::Identifier(name) => matches!(
                    self.symbols.lookup(scope, name),
                    Some(s) if matches!(s.kind, SymbolKind::Storage | SymbolKind::Constant)
                        && s.value_type() == Type::Bytes
                ),
                _ => false,
            };
            if valid {
                addresses.push(arg.clone());
            } else {
                self.report(
                    arg.span,
                    SemanticErrorKind::InvalidDecorator,
                    "@onlyAddress arguments must be address storage variables, constants or hex literals",
                );
            }
        }
        self.emits_signatures = true;
        if let Some(info) = self.current.as_mut() {
            info.only_addresses.extend(addresses);
            if info.only_addresses.len() > 1 {
                info.needs_signer = true;
            }
        }
    }

    fn check_block(&mut self, stmts: &[Stmt], scope: ScopeId) {
        for stmt in stmts {
            self.check_stmt(stmt, scope);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt, scope: ScopeId) {
        match &stmt.kind {
            StmtKind::Require { condition, .. } => {
                if let Some(target) = sender_check_target(condition) {
                    let found = self.check_expr(target, scope);
                    self.expect_type(target.span, Type::Bytes, found, "msg.sender comparison");
                    self.emits_signatures = true;
                } else {
                    let found = self.check_expr(condition, scope);
                    self.expect_type(condition.span, Type::Bool, found, "require condition");
                }
            }
            StmtKind::Send { to, amount, memo } => {
                let found = self.check_expr(to, scope);
                self.expect_type(to.span, Type::Bytes, found, "send recipient");
                let found = self.check_expr(amount, scope);
                self.expect_type(amount.span, Type::Int, found, "send amount");
                if let Some(memo) = memo {
                    self.check_expr(memo, scope);
                }
            }
            StmtKind::Emit { event, args } => self.check_emit(stmt.span, event, args, scope),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let found = self.check_expr(condition, scope);
                self.expect_type(condition.span, Type::Bool, found, "if condition");
                let then_scope = self.symbols.push_scope(scope);
                self.check_block(then_branch, then_scope);
                if let Some(else_branch) = else_branch {
                    let else_scope = self.symbols.push_scope(scope);
                    self.check_block(else_branch, else_scope);
                }
            }
            StmtKind::Assign {
                target,
                op,
                value,
                declared,
            } => self.check_assign(stmt.span, target, *op, value, declared.as_ref(), scope),
            StmtKind::Expr(expr) => match &expr.kind {
                ExprKind::Call { callee, args }
                    if library::lookup(callee).map_or(false, |f| f.opcode().is_some()) =>
                {
                    self.check_call(expr.span, callee, args, scope, true);
                }
                _ => {
                    self.check_expr(expr, scope);
                    self.report(
                        expr.span,
                        SemanticErrorKind::UnusedExpression,
                        "expression has no effect; only condition builtins may stand alone",
                    );
                }
            },
            StmtKind::Return(Some(value)) => self.report(
                value.span,
                SemanticErrorKind::TypeMismatch,
                "actions do not return values; use 'return;'",
            ),
            StmtKind::Return(None) => {}
        }
    }

    fn check_emit(&mut self, span: Span, event: &str, args: &[Expr], scope: ScopeId) {
        let declared = self.program.coin.event(event).cloned();
        let arg_types: Vec<Type> = args.iter().map(|a| self.check_expr(a, scope)).collect();
        let Some(declared) = declared else {
            self.report(
                span,
                SemanticErrorKind::UnknownEvent,
                format!("event '{}' is not declared", event),
            );
            return;
        };
        if declared.params.len() != args.len() {
            self.report(
                span,
                SemanticErrorKind::ArityMismatch,
                format!(
                    "event '{}' takes {} arguments, found {}",
                    event,
                    declared.params.len(),
                    args.len()
                ),
            );
            return;
        }
        for ((param, arg), found) in declared.params.iter().zip(args).zip(arg_types) {
            self.expect_type(
                arg.span,
                Type::of(&param.ty),
                found,
                &format!("field '{}' of event '{}'", param.name, event),
            );
        }
    }

    fn check_assign(
        &mut self,
        span: Span,
        target: &Expr,
        op: crate::parser::AssignOp,
        value: &Expr,
        declared: Option<&TypeName>,
        scope: ScopeId,
    ) {
        let value_type = self.check_expr(value, scope);

        if let Some(ty) = declared {
            let ExprKind::Identifier(name) = &target.kind else {
                return;
            };
            self.expect_type(value.span, Type::of(ty), value_type, &format!("initializer of '{}'", name));
            if self.symbols.lookup(scope, name).is_some() {
                self.report(
                    target.span,
                    SemanticErrorKind::DuplicateDeclaration,
                    format!("local '{}' shadows an existing declaration", name),
                );
                return;
            }
            let symbol = Symbol {
                name: name.clone(),
                kind: SymbolKind::Local,
                ty: ty.clone(),
                scope,
                classification: None,
                index: 0,
                span,
            };
            self.define(symbol);
            if let Some(info) = self.current.as_mut() {
                info.locals.insert(name.clone(), solution_name(name));
            }
            return;
        }

        let symbol = match &target.kind {
            ExprKind::Identifier(name) => match self.symbols.lookup(scope, name) {
                Some(symbol) => symbol.clone(),
                None => {
                    self.report(
                        target.span,
                        SemanticErrorKind::UnresolvedIdentifier,
                        format!("cannot assign to undeclared '{}'", name),
                    );
                    return;
                }
            },
            ExprKind::Member { .. } => match self.state_member(target) {
                Some(symbol) => symbol,
                None => {
                    self.report(
                        target.span,
                        SemanticErrorKind::InvalidAssignment,
                        "only state fields ('state.x') can be assigned through member access",
                    );
                    return;
                }
            },
            _ => {
                self.report(
                    target.span,
                    SemanticErrorKind::InvalidAssignment,
                    "left side of assignment must be a state field or local variable",
                );
                return;
            }
        };

        if !matches!(symbol.kind, SymbolKind::State | SymbolKind::Local) {
            let what = match symbol.kind {
                SymbolKind::Storage => "storage variables are curried and immutable",
                SymbolKind::Constant => "constants are immutable",
                SymbolKind::Parameter => "parameters are immutable",
                _ => "events cannot be assigned",
            };
            self.report(
                target.span,
                SemanticErrorKind::InvalidAssignment,
                format!("cannot assign to '{}': {}", symbol.name, what),
            );
            return;
        }

        let target_type = symbol.value_type();
        if op.binary_op().is_some() {
            self.expect_type(target.span, Type::Int, target_type, "compound assignment target");
            self.expect_type(value.span, Type::Int, value_type, "compound assignment value");
        } else {
            self.expect_type(value.span, target_type, value_type, &format!("assignment to '{}'", symbol.name));
        }
    }

    /// Symbol for `state.x`
    fn state_member(&self, expr: &Expr) -> Option<Symbol> {
        let ExprKind::Member { object, field } = &expr.kind else {
            return None;
        };
        if !matches!(&object.kind, ExprKind::Identifier(n) if n == "state") {
            return None;
        }
        self.symbols
            .lookup_local(SymbolTable::COIN_SCOPE, field)
            .filter(|s| s.kind == SymbolKind::State)
            .cloned()
    }

    // ---- expressions ----

    fn check_expr(&mut self, expr: &Expr, scope: ScopeId) -> Type {
        match &expr.kind {
            ExprKind::Literal(literal) => match literal {
                Literal::Int(_) => Type::Int,
                Literal::Bytes(_) => Type::Bytes,
                Literal::Str(_) => Type::Str,
                Literal::Bool(_) => Type::Bool,
            },
            ExprKind::Identifier(name) => match self.symbols.lookup(scope, name) {
                Some(symbol) if symbol.kind == SymbolKind::Event => {
                    let message = format!("event '{}' cannot be used as a value", name);
                    self.report(expr.span, SemanticErrorKind::TypeMismatch, message);
                    Type::Any
                }
                Some(symbol) => symbol.value_type(),
                None => {
                    self.report(
                        expr.span,
                        SemanticErrorKind::UnresolvedIdentifier,
                        format!("unresolved identifier '{}'", name),
                    );
                    Type::Any
                }
            },
            ExprKind::Member { field, .. } => {
                if expr.is_msg_sender() {
                    if let Some(info) = self.current.as_mut() {
                        info.needs_signer = true;
                    } else {
                        self.report(
                            expr.span,
                            SemanticErrorKind::UnresolvedIdentifier,
                            "msg.sender is only available inside actions",
                        );
                    }
                    return Type::Bytes;
                }
                match self.state_member(expr) {
                    Some(symbol) => symbol.value_type(),
                    None => {
                        self.report(
                            expr.span,
                            SemanticErrorKind::UnresolvedIdentifier,
                            format!("unknown member '.{}'", field),
                        );
                        Type::Any
                    }
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left_type = self.check_expr(left, scope);
                let right_type = self.check_expr(right, scope);
                self.check_binary(expr.span, *op, left_type, right_type)
            }
            ExprKind::Unary { op, operand } => {
                let found = self.check_expr(operand, scope);
                match op {
                    UnaryOp::Not => {
                        self.expect_type(operand.span, Type::Bool, found, "operand of '!'");
                        Type::Bool
                    }
                    UnaryOp::Neg => {
                        self.expect_type(operand.span, Type::Int, found, "operand of unary '-'");
                        Type::Int
                    }
                }
            }
            ExprKind::Call { callee, args } => self.check_call(expr.span, callee, args, scope, false),
        }
    }

    fn check_binary(&mut self, span: Span, op: BinaryOp, left: Type, right: Type) -> Type {
        if op.is_arithmetic() {
            self.expect_type(span, Type::Int, left, &format!("left operand of '{}'", op));
            self.expect_type(span, Type::Int, right, &format!("right operand of '{}'", op));
            Type::Int
        } else if op.is_ordering() {
            self.expect_type(span, Type::Int, left, &format!("left operand of '{}'", op));
            self.expect_type(span, Type::Int, right, &format!("right operand of '{}'", op));
            Type::Bool
        } else if op.is_logical() {
            self.expect_type(span, Type::Bool, left, &format!("left operand of '{}'", op));
            self.expect_type(span, Type::Bool, right, &format!("right operand of '{}'", op));
            Type::Bool
        } else {
            if !left.accepts(right) || left == Type::Mapping || left == Type::Unit {
                self.report(
                    span,
                    SemanticErrorKind::TypeMismatch,
                    format!("cannot compare {} with {} using '{}'", left, right, op),
                );
            }
            Type::Bool
        }
    }

    fn check_call(
        &mut self,
        span: Span,
        callee: &str,
        args: &[Expr],
        scope: ScopeId,
        statement: bool,
    ) -> Type {
        let arg_types: Vec<Type> = args.iter().map(|a| self.check_expr(a, scope)).collect();

        let Some(function) = library::lookup(callee) else {
            self.report(
                span,
                SemanticErrorKind::UnresolvedIdentifier,
                format!("unknown function '{}'", callee),
            );
            return Type::Any;
        };

        if function.opcode().is_some() && !statement {
            self.report(
                span,
                SemanticErrorKind::TypeMismatch,
                format!("'{}' produces a condition and must be used as a statement", callee),
            );
        }

        if let Some(include) = function.include() {
            self.note_include(include);
        }

        if !function.accepts_arity(args.len()) {
            self.report(
                span,
                SemanticErrorKind::ArityMismatch,
                format!("'{}' cannot take {} arguments", callee, args.len()),
            );
            return function.returns;
        }

        for (index, (arg, found)) in args.iter().zip(arg_types).enumerate() {
            if let Some(expected) = function.param_type(index) {
                self.expect_type(
                    arg.span,
                    expected,
                    found,
                    &format!("argument {} of '{}'", index + 1, callee),
                );
            }
        }
        function.returns
    }

    fn expect_type(&mut self, span: Span, expected: Type, found: Type, what: &str) {
        if !expected.accepts(found) || (found == Type::Unit && expected != Type::Any) {
            self.report(
                span,
                SemanticErrorKind::TypeMismatch,
                format!("{} expects {}, found {}", what, expected, found),
            );
        }
    }

    // ---- naming ----

    fn build_coin_names(&mut self, coin: &CoinDecl) -> BTreeMap<String, String> {
        let mut names = BTreeMap::new();
        let mut owners: BTreeMap<String, String> = BTreeMap::new();
        let declared = self
            .storage
            .iter()
            .map(|v| (v.name.clone(), v.span))
            .chain(coin.constants.iter().map(|c| (c.name.clone(), c.span)))
            .collect::<Vec<_>>();

        for (name, span) in declared {
            let target = curried_name(&name);
            if let Some(owner) = owners.get(&target) {
                if owner != &name {
                    let message = format!(
                        "'{}' and '{}' both become '{}' in generated code",
                        owner, name, target
                    );
                    self.report(span, SemanticErrorKind::NamingConflict, message);
                }
                continue;
            }
            owners.insert(target.clone(), name.clone());
            names.insert(name, target);
        }
        names
    }

    fn check_action_names(&mut self) {
        let mut functions: BTreeMap<String, String> = BTreeMap::new();
        let mut conflicts = Vec::new();
        for info in &self.actions {
            if let Some(owner) = functions.get(&info.function) {
                if owner != &info.name {
                    conflicts.push(format!(
                        "actions '{}' and '{}' both become '{}'",
                        owner, info.name, info.function
                    ));
                }
            } else {
                functions.insert(info.function.clone(), info.name.clone());
            }

            let mut params: BTreeMap<&str, &str> = BTreeMap::new();
            for param in &info.params {
                if let Some(owner) = params.get(param.target.as_str()) {
                    conflicts.push(format!(
                        "parameters '{}' and '{}' of '{}' both become '{}'",
                        owner, param.name, info.name, param.target
                    ));
                } else {
                    params.insert(&param.target, &param.name);
                }
            }
        }

        let span = self.program.coin.span;
        for message in conflicts {
            self.report(span, SemanticErrorKind::NamingConflict, message);
        }
    }
}

fn body_emits(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::Emit { .. } => true,
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => body_emits(then_branch) || else_branch.as_deref().map_or(false, body_emits),
        _ => false,
    })
}

/// Parse-and-analyze convenience for tooling and tests
pub fn analyze(program: &Program) -> Result<Analysis> {
    Analyzer::new(program).analyze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_coinscript;

    fn analyze_source(source: &str) -> Result<Analysis> {
        let program = parse_coinscript(source)?;
        analyze(&program)
    }

    fn kinds(source: &str) -> Vec<SemanticErrorKind> {
        match analyze_source(source) {
            Err(Error::Semantic(diags)) => diags.into_iter().map(|d| d.kind).collect(),
            other => panic!("expected semantic errors, got {:?}", other.map(|a| a.includes)),
        }
    }

    #[test]
    fn test_classification_is_explicit() {
        let analysis = analyze_source(
            "coin C { storage address owner; state { uint256 count; } action spend() { count += 1; } }",
        )
        .unwrap();
        let owner = analysis.coin_symbol("owner").unwrap();
        assert_eq!(owner.classification, Some(Classification::Curried));
        let count = analysis.coin_symbol("count").unwrap();
        assert_eq!(count.classification, Some(Classification::Threaded));
        assert!(analysis.has_state());
        assert_eq!(analysis.spend_path, SpendPath::Single);
    }

    #[test]
    fn test_storage_state_conflict() {
        let found = kinds(
            "coin C { storage uint256 x; state { uint256 x; } action spend() {} }",
        );
        assert_eq!(found, vec![SemanticErrorKind::StorageStateConflict]);
    }

    #[test]
    fn test_missing_spend_path() {
        let found = kinds("coin C { storage uint256 x = 1; }");
        assert_eq!(found, vec![SemanticErrorKind::MissingSpendPath]);
    }

    #[test]
    fn test_errors_accumulate() {
        let found = kinds(
            r#"coin C {
                storage address owner;
                action spend(uint256 n) {
                    owner = 0x01;
                    require(n + true > 1);
                    emit Missing(n);
                    n;
                    undefined(1);
                }
            }"#,
        );
        assert!(found.contains(&SemanticErrorKind::InvalidAssignment));
        assert!(found.contains(&SemanticErrorKind::TypeMismatch));
        assert!(found.contains(&SemanticErrorKind::UnknownEvent));
        assert!(found.contains(&SemanticErrorKind::UnusedExpression));
        assert!(found.contains(&SemanticErrorKind::UnresolvedIdentifier));
    }

    #[test]
    fn test_decorator_validation() {
        let found = kinds(
            r#"coin C {
                storage uint256 limit = 1;
                @stateful
                action a() {}
                @onlyAddress(limit)
                action b() {}
                @bogus
                action c() {}
            }"#,
        );
        assert_eq!(
            found,
            vec![
                SemanticErrorKind::InvalidDecorator,
                SemanticErrorKind::InvalidDecorator,
                SemanticErrorKind::InvalidDecorator,
            ]
        );
    }

    #[test]
    fn test_only_address_or_semantics_needs_signer() {
        let analysis = analyze_source(
            r#"coin C {
                storage address alice;
                storage address bob;
                @onlyAddress(alice, bob)
                action spend() {}
            }"#,
        )
        .unwrap();
        let spend = analysis.action("spend").unwrap();
        assert_eq!(spend.only_addresses.len(), 2);
        assert!(spend.needs_signer);
        assert_eq!(analysis.includes, vec!["sha256tree.clib".to_string()]);
    }

    #[test]
    fn test_sender_require_does_not_need_signer() {
        let analysis = analyze_source(
            r#"coin C {
                storage address owner;
                action pay(address to, uint256 amount) {
                    require(msg.sender == owner, "not owner");
                    send(to, amount);
                }
            }"#,
        )
        .unwrap();
        assert!(!analysis.action("pay").unwrap().needs_signer);

        let analysis = analyze_source(
            r#"coin C {
                event Who(address a);
                action spend() { emit Who(msg.sender); }
            }"#,
        )
        .unwrap();
        assert!(analysis.action("spend").unwrap().needs_signer);
    }

    #[test]
    fn test_dependency_detection_order() {
        let analysis = analyze_source(
            r#"include "utility_macros.clib";
            coin C {
                state { uint256 n; }
                action spend(bytes32 a) {
                    require(myIdTruth(a) == sha256tree(a));
                    require(assert(true));
                }
            }"#,
        )
        .unwrap();
        assert_eq!(
            analysis.includes,
            vec![
                "utility_macros.clib",
                "singleton_truths.clib",
                "sha256tree.clib",
                "curry-and-treehash.clinc",
            ]
        );
    }

    #[test]
    fn test_singleton_adds_launcher_storage() {
        let analysis = analyze_source(
            "@singleton coin S { storage address owner; action spend() {} }",
        )
        .unwrap();
        let names: Vec<&str> = analysis.storage.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["owner", LAUNCHER_ID]);
        assert_eq!(analysis.coin_names[LAUNCHER_ID], "LAUNCHER_ID");
        assert_eq!(
            analysis.launcher,
            Some(LauncherSource::Storage(LAUNCHER_ID.to_string()))
        );
    }

    #[test]
    fn test_naming_conflict() {
        let found = kinds(
            "coin C { storage uint256 maxValue = 1; const uint256 MAX_VALUE = 2; action spend() {} }",
        );
        assert_eq!(found, vec![SemanticErrorKind::NamingConflict]);

        let found = kinds("coin C { action spend(uint256 toAddr, uint256 to_addr) {} }");
        assert_eq!(found, vec![SemanticErrorKind::NamingConflict]);
    }

    #[test]
    fn test_emit_arity() {
        let found = kinds(
            "coin C { event E(uint256 a); action spend() { emit E(1, 2); } }",
        );
        assert_eq!(found, vec![SemanticErrorKind::ArityMismatch]);
    }
}
