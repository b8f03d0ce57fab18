//! Lowering from the checked AST to modules
//!
//! Statements are lowered symbolically. Walking an action body keeps a
//! [`Frame`]: the current term of every local and state field, the
//! conditions emitted so far, and the `require` guards seen so far. At every
//! exit the frame is assembled into one expression:
//!
//! ```text
//! (if guard1 (if guard2 (c cond1 (c cond2 TAIL)) (x "msg2")) (x "msg1"))
//! ```
//!
//! where `TAIL` is the successor coin for coins with state and nil
//! otherwise. Branches that only emit conditions merge back into the frame.
//! An `if` whose branches assign or may return splits the sequence: each
//! arm is lowered on its own and the statements after the `if` are lowered
//! once, as a continuation function both arms call with their bindings:
//!
//! ```text
//! (defun action_reset-rest-1 (MOD_HASH current_state state-0) ...)
//! ```
//!
//! The same rebinding happens whenever the symbolic bindings outgrow
//! [`REBIND_BUDGET`] term nodes, so output grows linearly with the body.

use super::{CompileOptions, DispatchMode};
use crate::analyzer::{
    library, sender_check_target, ActionInfo, Analysis, SpendPath, SymbolKind,
};
use crate::builder::{Puzzle, PuzzleBuilder, Term};
use crate::conditions::ConditionOpcode;
use crate::error::{Error, Result};
use crate::ir::Node;
use crate::parser::{
    Action, AssignOp, BinaryOp, Expr, ExprKind, Literal, Program, Stmt, StmtKind, UnaryOp,
};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

/// Curried parameter holding the tree hash of the uncurried module
pub const MOD_HASH: &str = "MOD_HASH";
/// Curried parameter holding the action merkle root
pub const ACTION_ROOT: &str = "ACTION_ROOT";
/// Solution parameter carrying the state payload
pub const CURRENT_STATE: &str = "current_state";
/// Solution parameter naming the spender's key
pub const SIGNER: &str = "signer";
/// Message used by `require` without one
pub const DEFAULT_REQUIRE_MESSAGE: &str = "requirement failed";

const SELECTOR: &str = "action";
const ARGS: &str = "args";
const MERGE_LIST: &str = "merge_list";

/// Term nodes the locals and state of a frame may hold before the rest of
/// the sequence is moved into a continuation
pub const REBIND_BUDGET: usize = 256;

/// Modules produced for one coin
#[derive(Debug)]
pub struct Lowered {
    /// Main module: the whole coin, or the merkle dispatcher
    pub module: Puzzle,
    /// One module per action under merkle dispatch, in declaration order
    pub actions: Vec<(String, Puzzle)>,
}

#[derive(Debug, Clone)]
enum Piece {
    /// One condition
    Item(Term),
    /// A term producing a list of conditions
    Splice(Term),
}

#[derive(Debug, Clone)]
struct Frame {
    locals: BTreeMap<String, Term>,
    state: Vec<Term>,
    pieces: Vec<Piece>,
    guards: Vec<(Term, String)>,
}

impl Frame {
    fn new(state: Vec<Term>) -> Self {
        Frame {
            locals: BTreeMap::new(),
            state,
            pieces: Vec::new(),
            guards: Vec::new(),
        }
    }

    /// Same bindings, nothing emitted yet
    fn branch(&self) -> Self {
        Frame {
            locals: self.locals.clone(),
            state: self.state.clone(),
            pieces: Vec::new(),
            guards: Vec::new(),
        }
    }

    fn binding_size(&self) -> usize {
        self.locals.values().chain(self.state.iter()).map(Term::size).sum()
    }

    fn guard(&mut self, cond: Term, message: String) {
        if cond != Term::truth() {
            self.guards.push((cond, message));
        }
    }

    fn assemble(self, tail: Term) -> Term {
        let conditions = fold_pieces(self.pieces, tail);
        self.guards
            .into_iter()
            .rev()
            .fold(conditions, |acc, (cond, message)| {
                Term::if_then_else(cond, acc, Term::raise(message))
            })
    }
}

/// Prepend pieces onto `tail`, keeping plain runs as one `(list ...)`
fn fold_pieces(pieces: Vec<Piece>, tail: Term) -> Term {
    pieces.into_iter().rev().fold(tail, |acc, piece| match piece {
        Piece::Item(item) => match acc {
            Term::Call { op, mut args } if op == "list" => {
                args.insert(0, item);
                Term::Call { op, args }
            }
            acc if acc.is_nil() => Term::list(vec![item]),
            acc => Term::cons(item, acc),
        },
        Piece::Splice(list) => Term::call(MERGE_LIST, vec![list, acc]),
    })
}

/// Where a statement sequence goes once it runs out
#[derive(Debug, Clone)]
enum Exit {
    /// End of the action: recreate the coin if it has state
    Finish,
    /// Call a continuation with the named locals and every state field
    Continue { function: String, locals: Vec<String> },
}

fn local_param(name: &str) -> String {
    format!("local-{}", name)
}

fn state_param(index: usize) -> String {
    format!("state-{}", index)
}

fn assigns(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::Assign { .. } => true,
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => assigns(then_branch) || else_branch.as_deref().map_or(false, assigns),
        _ => false,
    })
}

/// Branches that only emit merge in place; anything that rebinds or returns
/// splits the sequence
fn splits(then_branch: &[Stmt], else_branch: Option<&[Stmt]>) -> bool {
    [Some(then_branch), else_branch]
        .into_iter()
        .flatten()
        .any(|branch| returns(branch) || assigns(branch))
}

fn returns(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::Return(_) => true,
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => returns(then_branch) || else_branch.as_deref().map_or(false, returns),
        _ => false,
    })
}

fn condition(op: ConditionOpcode, mut args: Vec<Term>) -> Term {
    args.insert(0, Term::int(op.code()));
    Term::list(args)
}

/// Solution parameter names of one action, after any curried ones
pub fn solution_params(info: &ActionInfo, has_state: bool) -> Vec<String> {
    let mut names: Vec<String> = info.params.iter().map(|p| p.target.clone()).collect();
    if info.needs_signer {
        names.push(SIGNER.to_string());
    }
    if has_state {
        names.push(CURRENT_STATE.to_string());
    }
    names
}

/// Lowers one analyzed coin
pub struct CodeGenerator<'a> {
    program: &'a Program,
    analysis: &'a Analysis,
    constants: &'a [(String, Node)],
    options: &'a CompileOptions,
    uses_merge: Cell<bool>,
    continuations: RefCell<Vec<(String, Vec<String>, Term)>>,
    next_continuation: Cell<usize>,
}

impl<'a> CodeGenerator<'a> {
    /// Generator over a program, its analysis and folded constant values
    pub fn new(
        program: &'a Program,
        analysis: &'a Analysis,
        constants: &'a [(String, Node)],
        options: &'a CompileOptions,
    ) -> Self {
        CodeGenerator {
            program,
            analysis,
            constants,
            options,
            uses_merge: Cell::new(false),
            continuations: RefCell::new(Vec::new()),
            next_continuation: Cell::new(0),
        }
    }

    /// Curried parameter names in curry order
    pub fn curried_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.analysis.has_state() {
            names.push(MOD_HASH.to_string());
        }
        if self.options.dispatch == DispatchMode::Merkle {
            names.push(ACTION_ROOT.to_string());
        }
        for var in &self.analysis.storage {
            if let Some(target) = self.analysis.coin_names.get(&var.name) {
                names.push(target.clone());
            }
        }
        names
    }

    /// Build every module
    pub fn generate(&self) -> Result<Lowered> {
        match self.options.dispatch {
            DispatchMode::Inline => Ok(Lowered {
                module: self.inline_module()?,
                actions: Vec::new(),
            }),
            DispatchMode::Merkle => {
                let mut actions = Vec::with_capacity(self.program.coin.actions.len());
                for action in &self.program.coin.actions {
                    actions.push((action.name.clone(), self.action_module(action)?));
                }
                Ok(Lowered {
                    module: self.dispatcher_module()?,
                    actions,
                })
            }
        }
    }

    fn info(&self, action: &Action) -> Result<&ActionInfo> {
        self.analysis
            .action(&action.name)
            .ok_or_else(|| Error::generation(format!("action '{}' was not analyzed", action.name)))
    }

    fn builder(&self) -> PuzzleBuilder {
        self.curried_names()
            .into_iter()
            .fold(PuzzleBuilder::new().max_nesting(self.options.max_nesting), |b, name| {
                b.curried_param(name)
            })
    }

    /// Includes, constants and `merge_list` when needed
    fn with_definitions(&self, mut builder: PuzzleBuilder) -> PuzzleBuilder {
        for include in &self.analysis.includes {
            builder = builder.include(include.clone());
        }
        for (name, value) in self.constants {
            builder = builder.defconstant(name.clone(), Term::Atom(value.clone()));
        }
        if self.uses_merge.get() {
            builder = builder.defun(MERGE_LIST, vec!["a_list".into(), "b_list".into()], merge_list_body());
        }
        for (name, params, body) in self.continuations.take() {
            builder = builder.defun(name, params, body);
        }
        builder
    }

    fn reset(&self) {
        self.uses_merge.set(false);
        self.continuations.borrow_mut().clear();
        self.next_continuation.set(0);
    }

    fn inline_module(&self) -> Result<Puzzle> {
        self.reset();
        let has_state = self.analysis.has_state();

        if self.analysis.spend_path == SpendPath::Single {
            let action = self
                .program
                .coin
                .actions
                .first()
                .ok_or_else(|| Error::generation("coin has no actions"))?;
            let info = self.info(action)?;
            let body = self.lower_action(action, info)?;
            let builder = solution_params(info, has_state)
                .into_iter()
                .fold(self.builder(), |b, name| b.param(name));
            let builder = self.with_definitions(builder);
            tracing::debug!(action = %action.name, "lowered single-action module");
            return builder.comment(action_signature(action)).body(body).build();
        }

        let mut functions = Vec::new();
        for action in &self.program.coin.actions {
            let info = self.info(action)?;
            let body = self.lower_action(action, info)?;
            let mut params = self.curried_names();
            params.extend(solution_params(info, has_state));
            functions.push((action_signature(action), info.function.clone(), params, body));
        }

        let mut builder = self.with_definitions(self.builder().param(SELECTOR).rest_param(ARGS));
        for (signature, name, params, body) in functions {
            builder = builder.comment(signature).defun(name, params, body);
        }
        tracing::debug!(
            actions = self.program.coin.actions.len(),
            "lowered inline dispatch module"
        );
        builder.body(self.dispatch_body()?).build()
    }

    fn dispatch_body(&self) -> Result<Term> {
        let mut fallback = Term::raise("unknown action");
        if let Some(default) = self.analysis.action("default") {
            fallback = Term::if_then_else(
                Term::not(Term::symbol(SELECTOR)),
                self.call_action(default),
                fallback,
            );
        }
        let body = self
            .analysis
            .actions
            .iter()
            .filter(|info| info.name != "default")
            .rev()
            .fold(fallback, |acc, info| {
                Term::if_then_else(
                    Term::call("=", vec![Term::symbol(SELECTOR), Term::string(&info.name)]),
                    self.call_action(info),
                    acc,
                )
            });
        Ok(body)
    }

    fn call_action(&self, info: &ActionInfo) -> Term {
        let mut args: Vec<Term> = self.curried_names().into_iter().map(Term::symbol).collect();
        let count = solution_params(info, self.analysis.has_state()).len();
        args.extend((0..count).map(|k| Term::nth(Term::symbol(ARGS), k)));
        Term::call(info.function.clone(), args)
    }

    fn action_module(&self, action: &Action) -> Result<Puzzle> {
        self.reset();
        let info = self.info(action)?;
        let body = self.lower_action(action, info)?;
        let builder = solution_params(info, self.analysis.has_state())
            .into_iter()
            .fold(self.builder(), |b, name| b.param(name));
        self.with_definitions(builder)
            .comment(action_signature(action))
            .body(body)
            .build()
    }

    fn dispatcher_module(&self) -> Result<Puzzle> {
        let leaf = Term::call(
            "merkle_leaf",
            vec![
                Term::symbol("action_name"),
                Term::call("sha256tree", vec![Term::symbol("action_puzzle")]),
            ],
        );
        let root = Term::call("merkle_root", vec![leaf, Term::symbol("proof")]);
        let environment = self
            .curried_names()
            .into_iter()
            .rev()
            .fold(Term::symbol("action_solution"), |acc, name| {
                Term::cons(Term::symbol(name), acc)
            });
        let body = Term::if_then_else(
            Term::call("=", vec![root, Term::symbol(ACTION_ROOT)]),
            Term::call("a", vec![Term::symbol("action_puzzle"), environment]),
            Term::raise("invalid action proof"),
        );

        self.builder()
            .param("action_name")
            .param("proof")
            .param("action_puzzle")
            .param("action_solution")
            .include(library::SHA256TREE_LIB)
            .defun(
                "merkle_leaf",
                vec!["name".into(), "program_hash".into()],
                Term::call(
                    "sha256",
                    vec![
                        Term::int(1),
                        Term::call("sha256", vec![Term::symbol("name")]),
                        Term::symbol("program_hash"),
                    ],
                ),
            )
            .defun(
                "hash_sorted",
                vec!["left".into(), "right".into()],
                Term::if_then_else(
                    Term::call(">s", vec![Term::symbol("left"), Term::symbol("right")]),
                    Term::call(
                        "sha256",
                        vec![Term::int(2), Term::symbol("right"), Term::symbol("left")],
                    ),
                    Term::call(
                        "sha256",
                        vec![Term::int(2), Term::symbol("left"), Term::symbol("right")],
                    ),
                ),
            )
            .defun(
                "merkle_root",
                vec!["leaf".into(), "proof".into()],
                Term::if_then_else(
                    Term::symbol("proof"),
                    Term::call(
                        "merkle_root",
                        vec![
                            Term::call(
                                "hash_sorted",
                                vec![Term::symbol("leaf"), Term::first(Term::symbol("proof"))],
                            ),
                            Term::rest(Term::symbol("proof")),
                        ],
                    ),
                    Term::symbol("leaf"),
                ),
            )
            .comment("verify the action proof, then run the action with the curried values")
            .body(body)
            .build()
    }

    // ---- actions ----

    fn lower_action(&self, action: &Action, info: &ActionInfo) -> Result<Term> {
        let state = (0..self.program.coin.state.len())
            .map(|i| Term::nth(Term::symbol(CURRENT_STATE), i + 1))
            .collect();
        let mut frame = Frame::new(state);

        if self.analysis.has_state() {
            frame.guard(
                Term::call(
                    "=",
                    vec![
                        Term::first(Term::symbol(CURRENT_STATE)),
                        Term::int(self.options.state_version),
                    ],
                ),
                "state version mismatch".to_string(),
            );
        }

        match info.only_addresses.as_slice() {
            [] => {}
            [address] => {
                let key = self.lower_expr(address, &frame, info)?;
                frame.pieces.push(Piece::Item(condition(
                    ConditionOpcode::AggSigMe,
                    vec![key, self.signed_message(info)],
                )));
            }
            addresses => {
                let mut checks = Vec::with_capacity(addresses.len());
                for address in addresses {
                    let key = self.lower_expr(address, &frame, info)?;
                    checks.push(Term::call("=", vec![Term::symbol(SIGNER), key]));
                }
                frame.guard(Term::call("any", checks), "unauthorized".to_string());
            }
        }

        if info.needs_signer {
            frame.pieces.push(Piece::Item(condition(
                ConditionOpcode::AggSigMe,
                vec![Term::symbol(SIGNER), self.signed_message(info)],
            )));
        }

        let body: Vec<&Stmt> = action.body.iter().collect();
        self.lower_seq(&body, frame, &Exit::Finish, info)
    }

    /// `(sha256tree (list params...))`
    fn signed_message(&self, info: &ActionInfo) -> Term {
        let params = info
            .params
            .iter()
            .map(|p| Term::symbol(p.target.clone()))
            .collect();
        Term::call("sha256tree", vec![Term::list(params)])
    }

    fn finish(&self, frame: Frame) -> Term {
        let tail = if self.analysis.has_state() {
            Term::list(vec![self.successor(&frame.state)])
        } else {
            Term::nil()
        };
        frame.assemble(tail)
    }

    fn successor(&self, state: &[Term]) -> Term {
        let mut hash_args = vec![Term::symbol(MOD_HASH)];
        hash_args.extend(
            self.curried_names()
                .into_iter()
                .rev()
                .map(|name| Term::call("sha256tree", vec![Term::symbol(name)])),
        );
        let puzzle_hash = Term::call("puzzle-hash-of-curried-function", hash_args);

        let mut new_state = vec![Term::int(self.options.state_version)];
        new_state.extend(state.iter().cloned());

        condition(
            ConditionOpcode::CreateCoin,
            vec![
                puzzle_hash,
                Term::int(self.options.successor_amount),
                Term::list(vec![Term::list(new_state)]),
            ],
        )
    }

    fn lower_seq(
        &self,
        stmts: &[&Stmt],
        mut frame: Frame,
        exit: &Exit,
        info: &ActionInfo,
    ) -> Result<Term> {
        for (index, stmt) in stmts.iter().enumerate() {
            let rest = &stmts[index + 1..];
            match &stmt.kind {
                StmtKind::Return(_) => return Ok(self.finish(frame)),
                StmtKind::If {
                    condition,
                    then_branch,
                    else_branch,
                } if splits(then_branch, else_branch.as_deref()) => {
                    let cond = self.lower_expr(condition, &frame, info)?;
                    let after = if rest.is_empty() {
                        exit.clone()
                    } else {
                        self.continuation(rest, &frame, exit, info)?
                    };
                    let then_seq: Vec<&Stmt> = then_branch.iter().collect();
                    let else_seq: Vec<&Stmt> = else_branch.iter().flatten().collect();
                    let then_term = self.lower_seq(&then_seq, frame.branch(), &after, info)?;
                    let else_term = self.lower_seq(&else_seq, frame.branch(), &after, info)?;
                    return Ok(frame.assemble(Term::if_then_else(cond, then_term, else_term)));
                }
                _ => self.lower_stmt(stmt, &mut frame, info)?,
            }
            if !rest.is_empty() && frame.binding_size() > REBIND_BUDGET {
                let after = self.continuation(rest, &frame, exit, info)?;
                return self.leave(frame, &after, info);
            }
        }
        self.leave(frame, exit, info)
    }

    /// Lower `rest` once as a function of the frame's bindings
    fn continuation(
        &self,
        rest: &[&Stmt],
        frame: &Frame,
        exit: &Exit,
        info: &ActionInfo,
    ) -> Result<Exit> {
        let number = self.next_continuation.get() + 1;
        self.next_continuation.set(number);
        let function = format!("{}-rest-{}", info.function, number);
        let locals: Vec<String> = frame.locals.keys().cloned().collect();

        let mut params = self.curried_names();
        params.extend(solution_params(info, self.analysis.has_state()));
        params.extend(locals.iter().map(|name| local_param(name)));
        params.extend((0..frame.state.len()).map(state_param));

        let mut entry = Frame::new(
            (0..frame.state.len())
                .map(|index| Term::symbol(state_param(index)))
                .collect(),
        );
        for name in &locals {
            entry.locals.insert(name.clone(), Term::symbol(local_param(name)));
        }
        let body = self.lower_seq(rest, entry, exit, info)?;
        tracing::trace!(function = %function, "lowered continuation");
        self.continuations
            .borrow_mut()
            .push((function.clone(), params, body));
        Ok(Exit::Continue { function, locals })
    }

    fn leave(&self, frame: Frame, exit: &Exit, info: &ActionInfo) -> Result<Term> {
        let (function, locals) = match exit {
            Exit::Finish => return Ok(self.finish(frame)),
            Exit::Continue { function, locals } => (function, locals),
        };
        let mut args: Vec<Term> = self.curried_names().into_iter().map(Term::symbol).collect();
        args.extend(
            solution_params(info, self.analysis.has_state())
                .into_iter()
                .map(Term::symbol),
        );
        for name in locals {
            let value = frame.locals.get(name).cloned().ok_or_else(|| {
                Error::generation(format!("local '{}' is not bound at a continuation", name))
            })?;
            args.push(value);
        }
        args.extend(frame.state.iter().cloned());
        Ok(frame.assemble(Term::call(function.clone(), args)))
    }

    fn lower_stmt(&self, stmt: &Stmt, frame: &mut Frame, info: &ActionInfo) -> Result<()> {
        match &stmt.kind {
            StmtKind::Require { condition: cond, message } => {
                if let Some(target) = sender_check_target(cond) {
                    let key = self.lower_expr(target, frame, info)?;
                    frame.pieces.push(Piece::Item(condition(
                        ConditionOpcode::AggSigMe,
                        vec![key, self.signed_message(info)],
                    )));
                } else {
                    let test = self.lower_expr(cond, frame, info)?;
                    let message = message
                        .clone()
                        .unwrap_or_else(|| DEFAULT_REQUIRE_MESSAGE.to_string());
                    frame.guard(test, message);
                }
            }
            StmtKind::Send { to, amount, memo } => {
                let mut args = vec![
                    self.lower_expr(to, frame, info)?,
                    self.lower_expr(amount, frame, info)?,
                ];
                if let Some(memo) = memo {
                    args.push(Term::list(vec![self.lower_expr(memo, frame, info)?]));
                }
                frame
                    .pieces
                    .push(Piece::Item(condition(ConditionOpcode::CreateCoin, args)));
            }
            StmtKind::Emit { event, args } => {
                let mut payload = vec![Term::string(event)];
                for arg in args {
                    payload.push(self.lower_expr(arg, frame, info)?);
                }
                let message = Term::call("sha256tree", vec![Term::list(payload)]);
                frame.pieces.push(Piece::Item(condition(
                    ConditionOpcode::CreateCoinAnnouncement,
                    vec![message],
                )));
            }
            StmtKind::If {
                condition: cond,
                then_branch,
                else_branch,
            } => self.merge_if(cond, then_branch, else_branch.as_deref(), frame, info)?,
            StmtKind::Assign {
                target,
                op,
                value,
                declared,
            } => self.assign(target, *op, value, declared.is_some(), frame, info)?,
            StmtKind::Expr(expr) => {
                let ExprKind::Call { callee, args } = &expr.kind else {
                    return Err(Error::generation("expression statement is not a call"));
                };
                let op = library::lookup(callee)
                    .and_then(|f| f.opcode())
                    .ok_or_else(|| {
                        Error::generation(format!("'{}' is not a condition builtin", callee))
                    })?;
                let mut terms = Vec::with_capacity(args.len());
                for arg in args {
                    terms.push(self.lower_expr(arg, frame, info)?);
                }
                frame.pieces.push(Piece::Item(condition(op, terms)));
            }
            StmtKind::Return(_) => {
                return Err(Error::generation("return inside a merged branch"));
            }
        }
        Ok(())
    }

    /// Effect-only branches: bindings are unchanged, so only guards and
    /// conditions merge
    fn merge_if(
        &self,
        cond: &Expr,
        then_branch: &[Stmt],
        else_branch: Option<&[Stmt]>,
        frame: &mut Frame,
        info: &ActionInfo,
    ) -> Result<()> {
        let test = self.lower_expr(cond, frame, info)?;

        let mut then_frame = frame.branch();
        for stmt in then_branch {
            self.lower_stmt(stmt, &mut then_frame, info)?;
        }
        let mut else_frame = frame.branch();
        for stmt in else_branch.unwrap_or_default() {
            self.lower_stmt(stmt, &mut else_frame, info)?;
        }

        for (guard, message) in then_frame.guards {
            frame.guard(Term::if_then_else(test.clone(), guard, Term::truth()), message);
        }
        for (guard, message) in else_frame.guards {
            frame.guard(Term::if_then_else(test.clone(), Term::truth(), guard), message);
        }

        if !then_frame.pieces.is_empty() || !else_frame.pieces.is_empty() {
            self.uses_merge.set(true);
            let then_list = fold_pieces(then_frame.pieces, Term::nil());
            let else_list = fold_pieces(else_frame.pieces, Term::nil());
            frame.pieces.push(Piece::Splice(Term::if_then_else(test, then_list, else_list)));
        }
        Ok(())
    }

    fn assign(
        &self,
        target: &Expr,
        op: AssignOp,
        value: &Expr,
        declares: bool,
        frame: &mut Frame,
        info: &ActionInfo,
    ) -> Result<()> {
        let value = self.lower_expr(value, frame, info)?;

        if declares {
            let ExprKind::Identifier(name) = &target.kind else {
                return Err(Error::generation("local declaration without a name"));
            };
            frame.locals.insert(name.clone(), value);
            return Ok(());
        }

        let slot = match &target.kind {
            ExprKind::Identifier(name) if frame.locals.contains_key(name) => {
                frame.locals.get_mut(name)
            }
            ExprKind::Identifier(name) => self
                .state_index(name)
                .and_then(|index| frame.state.get_mut(index)),
            ExprKind::Member { object, field }
                if matches!(&object.kind, ExprKind::Identifier(o) if o == "state") =>
            {
                self.state_index(field)
                    .and_then(|index| frame.state.get_mut(index))
            }
            _ => None,
        }
        .ok_or_else(|| Error::generation("assignment target is neither a local nor a state field"))?;

        *slot = match op.binary_op() {
            Some(binary) => lower_binary(binary, slot.clone(), value),
            None => value,
        };
        Ok(())
    }

    fn state_index(&self, name: &str) -> Option<usize> {
        self.analysis
            .coin_symbol(name)
            .filter(|s| s.kind == SymbolKind::State)
            .map(|s| s.index)
    }

    // ---- expressions ----

    fn lower_expr(&self, expr: &Expr, frame: &Frame, info: &ActionInfo) -> Result<Term> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(match literal {
                Literal::Int(value) => Term::int(value.clone()),
                Literal::Bytes(bytes) => Term::bytes(bytes.clone()),
                Literal::Str(text) => Term::string(text),
                Literal::Bool(true) => Term::truth(),
                Literal::Bool(false) => Term::nil(),
            }),
            ExprKind::Identifier(name) => self.resolve(name, frame, info),
            ExprKind::Member { object, field } => {
                if expr.is_msg_sender() {
                    return Ok(Term::symbol(SIGNER));
                }
                match &object.kind {
                    ExprKind::Identifier(o) if o == "state" => self
                        .state_index(field)
                        .and_then(|index| frame.state.get(index).cloned())
                        .ok_or_else(|| Error::generation(format!("unknown state field '{}'", field))),
                    _ => Err(Error::generation(format!("unsupported member access '.{}'", field))),
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.lower_expr(left, frame, info)?;
                let right = self.lower_expr(right, frame, info)?;
                Ok(lower_binary(*op, left, right))
            }
            ExprKind::Unary { op, operand } => match (op, &operand.kind) {
                (UnaryOp::Neg, ExprKind::Literal(Literal::Int(value))) => Ok(Term::int(-value.clone())),
                (UnaryOp::Neg, _) => Ok(Term::call(
                    "-",
                    vec![Term::nil(), self.lower_expr(operand, frame, info)?],
                )),
                (UnaryOp::Not, _) => Ok(Term::not(self.lower_expr(operand, frame, info)?)),
            },
            ExprKind::Call { callee, args } => {
                let function = library::lookup(callee)
                    .ok_or_else(|| Error::generation(format!("unknown function '{}'", callee)))?;
                if function.opcode().is_some() {
                    return Err(Error::generation(format!(
                        "condition builtin '{}' used as a value",
                        callee
                    )));
                }
                let mut terms = Vec::with_capacity(args.len());
                for arg in args {
                    terms.push(self.lower_expr(arg, frame, info)?);
                }
                Ok(Term::call(function.target, terms))
            }
        }
    }

    fn resolve(&self, name: &str, frame: &Frame, info: &ActionInfo) -> Result<Term> {
        if let Some(term) = frame.locals.get(name) {
            return Ok(term.clone());
        }
        if let Some(param) = info.params.iter().find(|p| p.name == name) {
            return Ok(Term::symbol(param.target.clone()));
        }
        let symbol = self
            .analysis
            .coin_symbol(name)
            .ok_or_else(|| Error::generation(format!("unresolved identifier '{}'", name)))?;
        match symbol.kind {
            SymbolKind::State => frame
                .state
                .get(symbol.index)
                .cloned()
                .ok_or_else(|| Error::generation(format!("unknown state field '{}'", name))),
            SymbolKind::Storage | SymbolKind::Constant => self
                .analysis
                .coin_names
                .get(name)
                .map(|target| Term::symbol(target.clone()))
                .ok_or_else(|| Error::generation(format!("no generated name for '{}'", name))),
            _ => Err(Error::generation(format!("'{}' cannot be used as a value", name))),
        }
    }
}

fn lower_binary(op: BinaryOp, left: Term, right: Term) -> Term {
    let call = |name: &str, a: Term, b: Term| Term::call(name, vec![a, b]);
    match op {
        BinaryOp::Add => call("+", left, right),
        BinaryOp::Sub => call("-", left, right),
        BinaryOp::Mul => call("*", left, right),
        BinaryOp::Div => call("/", left, right),
        BinaryOp::Mod => Term::rest(call("divmod", left, right)),
        BinaryOp::Eq => call("=", left, right),
        BinaryOp::NotEq => Term::not(call("=", left, right)),
        BinaryOp::Gt => call(">", left, right),
        BinaryOp::Lt => call(">", right, left),
        BinaryOp::LtEq => Term::not(call(">", left, right)),
        BinaryOp::GtEq => Term::not(call(">", right, left)),
        BinaryOp::And => call("all", left, right),
        BinaryOp::Or => call("any", left, right),
    }
}

/// `(if a_list (c (f a_list) (merge_list (r a_list) b_list)) b_list)`
fn merge_list_body() -> Term {
    Term::if_then_else(
        Term::symbol("a_list"),
        Term::cons(
            Term::first(Term::symbol("a_list")),
            Term::call(
                MERGE_LIST,
                vec![Term::rest(Term::symbol("a_list")), Term::symbol("b_list")],
            ),
        ),
        Term::symbol("b_list"),
    )
}

fn action_signature(action: &Action) -> String {
    let params: Vec<&str> = action.params.iter().map(|p| p.name.as_str()).collect();
    format!("action {}({})", action.name, params.join(", "))
}
