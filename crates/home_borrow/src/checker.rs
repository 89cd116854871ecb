//! Flow-sensitive ownership/borrow checker: `Typed AST -> Verified AST`.
//! A clone-state-then-merge walk over the AST against the full lattice in
//! [`crate::state::VarState`], adding borrow-region release at block exit
//! and intra-procedural escape checking for returned references.

use crate::error::OwnershipError;
use crate::state::{Scope, VarState};
use home_base::{Span, Symbol};
use home_diag::{Diagnostic, DiagnosticBag};
use home_parser::ast::*;
use home_types::checker::key_of;
use home_types::ty::TypeInterner;
use home_types::TypedAst;
use std::collections::{HashMap, HashSet};

/// Annotation codegen consumes: the exact statement at which a binding's
/// owning move occurs, so destructor calls are scheduled at the right
/// point rather than unconditionally at scope exit.
#[derive(Debug, Clone, Default)]
pub struct DropPlan {
    /// Bindings that are still `Owned` (never moved) when their
    /// declaring block ends, in declaration order — these get an
    /// end-of-scope destructor call.
    pub end_of_scope_drops: Vec<(Symbol, Span)>,
    /// The exact span at which an owning move out of a binding occurred.
    pub move_sites: HashMap<Symbol, Span>,
}

pub struct BorrowChecker<'a> {
    strings: &'a home_base::Interner,
    typed: &'a TypedAst,
    interner: &'a TypeInterner,
    diagnostics: &'a mut DiagnosticBag,
    state: HashMap<Symbol, VarState>,
    scopes: Vec<Scope>,
    /// Bindings introduced via `let` anywhere in the current function body
    /// (not parameters) — used for the escape-of-local-reference check.
    locals: HashSet<Symbol>,
    plan: DropPlan,
}

impl<'a> BorrowChecker<'a> {
    pub fn new(
        strings: &'a home_base::Interner,
        typed: &'a TypedAst,
        interner: &'a TypeInterner,
        diagnostics: &'a mut DiagnosticBag,
    ) -> Self {
        Self { strings, typed, interner, diagnostics, state: HashMap::new(), scopes: Vec::new(), locals: HashSet::new(), plan: DropPlan::default() }
    }

    pub fn check_module(mut self, module: &Module<'_>) -> DropPlan {
        self.check_items(module.items);
        self.plan
    }

    fn check_items(&mut self, items: &[Item<'_>]) {
        for item in items {
            match &item.kind {
                ItemKind::Fn(def) => self.check_fn(def),
                ItemKind::Impl(def) => {
                    for m in def.methods {
                        self.check_fn(m);
                    }
                }
                ItemKind::Mod { items, .. } => self.check_items(items),
                _ => {}
            }
        }
    }

    fn check_fn(&mut self, def: &FnDef<'_>) {
        let Some(body) = def.body else { return };
        self.state.clear();
        self.locals.clear();
        self.scopes.clear();
        for param in def.params.iter() {
            if param.name != Symbol::EMPTY {
                self.state.insert(param.name, VarState::Owned);
            }
        }
        self.check_block(body);
    }

    fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    fn pop_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else { return };
        for sym in scope.shared_taken {
            if let Some(VarState::Shared(n)) = self.state.get_mut(&sym) {
                *n -= 1;
                if *n == 0 {
                    self.state.insert(sym, VarState::Owned);
                }
            }
        }
        for sym in scope.mut_taken {
            if matches!(self.state.get(&sym), Some(VarState::BorrowedMut)) {
                self.state.insert(sym, VarState::Owned);
            }
        }
        for sym in scope.declared {
            if let Some(state) = self.state.get(&sym) {
                if matches!(state, VarState::Owned) {
                    self.plan.end_of_scope_drops.push((sym, Span::default()));
                }
            }
            self.state.remove(&sym);
        }
    }

    fn name_of(&self, sym: Symbol) -> String {
        self.strings.resolve(sym).to_string()
    }

    fn report(&mut self, err: OwnershipError, span: Span) {
        self.diagnostics.push(Diagnostic::error(err.code(), err.to_string(), span, "borrow-check"));
    }

    fn report_conflict(&mut self, err: OwnershipError, span: Span, conflict: Span) {
        let d = Diagnostic::error(err.code(), err.to_string(), span, "borrow-check")
            .with_secondary(conflict, "conflicting borrow originates here");
        self.diagnostics.push(d);
    }

    // ---- state transitions ----

    fn do_move(&mut self, sym: Symbol, span: Span) {
        match self.state.get(&sym).copied().unwrap_or(VarState::Owned) {
            VarState::Moved => self.report(OwnershipError::DoubleMove { name: self.name_of(sym) }, span),
            VarState::Shared(_) | VarState::BorrowedMut => {
                self.report(OwnershipError::MoveWhileBorrowed { name: self.name_of(sym) }, span)
            }
            VarState::Owned => {
                self.state.insert(sym, VarState::Moved);
                self.plan.move_sites.insert(sym, span);
            }
        }
    }

    fn take_shared(&mut self, sym: Symbol, span: Span) {
        match self.state.get(&sym).copied().unwrap_or(VarState::Owned) {
            VarState::Moved => self.report(OwnershipError::UseAfterMove { name: self.name_of(sym) }, span),
            VarState::BorrowedMut => self.report(OwnershipError::ConflictingBorrow { name: self.name_of(sym) }, span),
            VarState::Shared(n) => {
                self.state.insert(sym, VarState::Shared(n + 1));
                self.record_shared(sym);
            }
            VarState::Owned => {
                self.state.insert(sym, VarState::Shared(1));
                self.record_shared(sym);
            }
        }
    }

    fn take_mutable(&mut self, sym: Symbol, span: Span) {
        match self.state.get(&sym).copied().unwrap_or(VarState::Owned) {
            VarState::Moved => self.report(OwnershipError::BorrowAfterMove { name: self.name_of(sym) }, span),
            VarState::Shared(_) | VarState::BorrowedMut => {
                self.report(OwnershipError::ConflictingBorrow { name: self.name_of(sym) }, span)
            }
            VarState::Owned => {
                self.state.insert(sym, VarState::BorrowedMut);
                self.record_mutable(sym);
            }
        }
    }

    fn record_shared(&mut self, sym: Symbol) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.shared_taken.push(sym);
        }
    }

    fn record_mutable(&mut self, sym: Symbol) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.mut_taken.push(sym);
        }
    }

    fn check_use(&mut self, sym: Symbol, span: Span) {
        if let Some(VarState::Moved) = self.state.get(&sym) {
            self.report(OwnershipError::UseAfterMove { name: self.name_of(sym) }, span);
        }
    }

    fn is_copy_expr(&self, expr: &Expr<'_>) -> bool {
        match self.typed.expr_types.get(&key_of(expr)) {
            Some(ty) => self.interner.is_copy(*ty),
            None => true,
        }
    }

    fn declare(&mut self, sym: Symbol) {
        if sym == Symbol::EMPTY {
            return;
        }
        self.state.insert(sym, VarState::Owned);
        self.locals.insert(sym);
        if let Some(scope) = self.scopes.last_mut() {
            scope.declared.push(sym);
        }
    }

    fn assign_to(&mut self, sym: Symbol, span: Span) {
        match self.state.get(&sym).copied().unwrap_or(VarState::Owned) {
            VarState::Shared(_) | VarState::BorrowedMut => {
                self.report(OwnershipError::AssignWhileBorrowed { name: self.name_of(sym) }, span)
            }
            _ => {
                self.state.insert(sym, VarState::Owned);
            }
        }
    }

    // ---- statements ----

    fn check_block(&mut self, block: &Block<'_>) {
        self.push_scope();
        for stmt in block.stmts {
            self.check_stmt(stmt);
        }
        if let Some(tail) = block.tail {
            self.check_expr_used(tail, false);
        }
        self.pop_scope();
    }

    fn check_stmt(&mut self, stmt: &Stmt<'_>) {
        match &stmt.kind {
            StmtKind::Let { pattern, init, .. } => {
                if let Some(init) = init {
                    self.check_expr_used(init, true);
                }
                self.declare_pattern(pattern);
            }
            StmtKind::Expr(expr) => {
                self.check_expr_used(expr, false);
            }
            StmtKind::Item(item) => {
                if let ItemKind::Fn(def) = &item.kind {
                    self.check_fn(def);
                }
            }
        }
    }

    fn declare_pattern(&mut self, pattern: &Pattern<'_>) {
        match pattern {
            Pattern::Binding { name, .. } => self.declare(*name),
            Pattern::Tuple(pats) | Pattern::Or(pats) => {
                for p in pats.iter() {
                    self.declare_pattern(p);
                }
            }
            Pattern::Struct { fields, .. } => {
                for (_, p) in fields.iter() {
                    self.declare_pattern(p);
                }
            }
            Pattern::EnumVariant { fields, .. } => {
                for p in fields.iter() {
                    self.declare_pattern(p);
                }
            }
            Pattern::Wildcard | Pattern::Literal(_) => {}
        }
    }

    /// Checks an expression, performing any move/borrow state transitions
    /// its position implies. `consumes` marks a "value position" (let
    /// initializer, call argument, return value, struct field) where a
    /// bare `Path` to a non-`Copy` binding is moved.
    fn check_expr_used(&mut self, expr: &Expr<'_>, consumes: bool) {
        match &expr.kind {
            ExprKind::Path(name) => {
                self.check_use(*name, expr.span);
                if consumes && !self.is_copy_expr(expr) {
                    self.do_move(*name, expr.span);
                }
            }
            ExprKind::Unary(UnOp::Ref, inner) => {
                if let ExprKind::Path(name) = &inner.kind {
                    self.take_shared(*name, expr.span);
                } else {
                    self.check_expr_used(inner, false);
                }
            }
            ExprKind::Unary(UnOp::RefMut, inner) => {
                if let ExprKind::Path(name) = &inner.kind {
                    self.take_mutable(*name, expr.span);
                } else {
                    self.check_expr_used(inner, false);
                }
            }
            ExprKind::Unary(_, inner) => self.check_expr_used(inner, false),
            ExprKind::Binary(_, lhs, rhs) => {
                self.check_expr_used(lhs, false);
                self.check_expr_used(rhs, false);
            }
            ExprKind::Assign(lhs, rhs) => {
                self.check_expr_used(rhs, true);
                if let ExprKind::Path(name) = &lhs.kind {
                    self.assign_to(*name, expr.span);
                } else {
                    self.check_expr_used(lhs, false);
                }
            }
            ExprKind::Call { callee, args } => {
                self.check_expr_used(callee, false);
                for arg in args.iter() {
                    self.check_expr_used(arg, true);
                }
            }
            ExprKind::MethodCall { receiver, args, .. } => {
                self.check_expr_used(receiver, false);
                for arg in args.iter() {
                    self.check_expr_used(arg, true);
                }
            }
            ExprKind::Field { base, .. } => self.check_expr_used(base, false),
            ExprKind::Index { base, index } => {
                self.check_expr_used(base, false);
                self.check_expr_used(index, false);
            }
            ExprKind::Tuple(elems) | ExprKind::Array(elems) => {
                for e in elems.iter() {
                    self.check_expr_used(e, true);
                }
            }
            ExprKind::StructLit { fields, .. } => {
                for (_, value) in fields.iter() {
                    self.check_expr_used(value, true);
                }
            }
            ExprKind::If { cond, then_branch, else_branch } => {
                self.check_expr_used(cond, false);
                let before = self.state.clone();
                self.check_expr_used(then_branch, false);
                let after_then = self.state.clone();
                let after_else = match else_branch {
                    Some(e) => {
                        self.state = before;
                        self.check_expr_used(e, false);
                        self.state.clone()
                    }
                    None => after_then.clone(),
                };
                self.state = merge_states(&after_then, &after_else);
            }
            ExprKind::Match { scrutinee, arms } => {
                self.check_expr_used(scrutinee, false);
                let before = self.state.clone();
                let mut merged: Option<HashMap<Symbol, VarState>> = None;
                for arm in arms.iter() {
                    self.state = before.clone();
                    self.push_scope();
                    self.declare_pattern(&arm.pattern);
                    if let Some(guard) = arm.guard {
                        self.check_expr_used(guard, false);
                    }
                    self.check_expr_used(arm.body, false);
                    self.pop_scope();
                    merged = Some(match merged {
                        Some(m) => merge_states(&m, &self.state),
                        None => self.state.clone(),
                    });
                }
                if let Some(m) = merged {
                    self.state = m;
                }
            }
            ExprKind::Block(block) => self.check_block(block),
            ExprKind::While { cond, body } => {
                self.check_expr_used(cond, false);
                let before = self.state.clone();
                self.check_block(body);
                self.state = merge_states(&before, &self.state);
            }
            ExprKind::Loop { body } => self.check_block(body),
            ExprKind::For { pattern, iter, body } => {
                self.check_expr_used(iter, false);
                self.push_scope();
                self.declare_pattern(pattern);
                self.check_block(body);
                self.pop_scope();
            }
            ExprKind::Return(value) => {
                if let Some(v) = value {
                    self.check_return_escape(v);
                    self.check_expr_used(v, true);
                }
            }
            ExprKind::Break(value) | ExprKind::Await(value) | ExprKind::Try(value) | ExprKind::Comptime(value) => {
                self.check_expr_used(value, false);
            }
            ExprKind::Range { start, end, .. } => {
                if let Some(s) = start {
                    self.check_expr_used(s, false);
                }
                if let Some(e) = end {
                    self.check_expr_used(e, false);
                }
            }
            ExprKind::Cast { expr: inner, .. } => self.check_expr_used(inner, false),
            ExprKind::Closure { body, .. } => self.check_expr_used(body, false),
            ExprKind::InterpolatedStr(parts) => {
                for part in parts.iter() {
                    if let Some(hole) = part.hole {
                        self.check_expr_used(hole, false);
                    }
                }
            }
            ExprKind::Literal(_) | ExprKind::Str(_) | ExprKind::Continue => {}
        }
    }

    /// Returning a reference with a region that does not outlive the
    /// function is rejected: a `return &local`/`&mut local`
    /// where `local` was declared by `let` inside this function (not a
    /// parameter) escapes its stack frame.
    fn check_return_escape(&mut self, value: &Expr<'_>) {
        if let ExprKind::Unary(UnOp::Ref | UnOp::RefMut, inner) = &value.kind {
            if let ExprKind::Path(name) = &inner.kind {
                if self.locals.contains(name) {
                    self.report(OwnershipError::EscapingReference { name: self.name_of(*name) }, value.span);
                }
            }
        }
    }
}

/// Control-flow join rule: `Moved` on any incoming edge wins
/// outright (no intermediate "maybe moved" state); otherwise a live borrow
/// on either edge is conservatively retained.
fn merge_states(a: &HashMap<Symbol, VarState>, b: &HashMap<Symbol, VarState>) -> HashMap<Symbol, VarState> {
    let mut merged = a.clone();
    for (sym, &b_state) in b.iter() {
        let a_state = a.get(sym).copied().unwrap_or(VarState::Owned);
        let result = match (a_state, b_state) {
            (VarState::Moved, _) | (_, VarState::Moved) => VarState::Moved,
            (VarState::BorrowedMut, _) | (_, VarState::BorrowedMut) => VarState::BorrowedMut,
            (VarState::Shared(x), VarState::Shared(y)) => VarState::Shared(x.max(y)),
            (VarState::Shared(x), VarState::Owned) | (VarState::Owned, VarState::Shared(x)) => VarState::Shared(x),
            (VarState::Owned, VarState::Owned) => VarState::Owned,
        };
        merged.insert(*sym, result);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use home_base::Interner;
    use home_diag::DiagnosticBag;
    use home_lexer::Lexer;
    use home_parser::{Arena, Parser};
    use home_types::TypeChecker;

    fn check_source(src: &str) -> Vec<home_diag::Diagnostic> {
        let mut strings = Interner::new();
        let (tokens, _) = Lexer::new(src, &mut strings).tokenize();
        let arena = Arena::new();
        let (module, _) = Parser::new(tokens, &arena, &mut strings).parse_module();
        let mut type_bag = DiagnosticBag::new();
        let typed = TypeChecker::new(&mut strings, &mut type_bag).check_module(&module);
        let mut borrow_bag = DiagnosticBag::new();
        BorrowChecker::new(&strings, &typed, &typed.interner, &mut borrow_bag).check_module(&module);
        borrow_bag.finish()
    }

    #[test]
    fn plain_arithmetic_has_no_ownership_errors() {
        let diags = check_source("fn main() -> i32 { let x: i32 = 10; let y: i32 = 32; return x + y; }");
        assert!(diags.iter().all(|d| !d.is_fatal()), "{diags:?}");
    }

    #[test]
    fn conflicting_mutable_borrows_are_rejected() {
        // Two simultaneous `&mut` borrows of the same binding.
        let diags = check_source(
            "fn main() { let mut x: i32 = 1; let r = &mut x; let s = &mut x; *r = 2; }",
        );
        assert!(diags.iter().any(|d| d.code == "H0403"), "{diags:?}");
    }

    #[test]
    fn shared_borrow_then_mutable_borrow_conflicts() {
        let diags = check_source("fn main() { let x: i32 = 1; let r = &x; let s = &mut x; }");
        assert!(diags.iter().any(|d| d.code == "H0403"), "{diags:?}");
    }

    #[test]
    fn two_shared_borrows_are_fine() {
        let diags = check_source("fn main() { let x: i32 = 1; let r = &x; let s = &x; }");
        assert!(diags.iter().all(|d| !d.is_fatal()), "{diags:?}");
    }

    #[test]
    fn borrow_released_at_end_of_block_allows_later_mutable_borrow() {
        let diags = check_source(
            "fn main() { let mut x: i32 = 1; { let r = &x; } let s = &mut x; }",
        );
        assert!(diags.iter().all(|d| !d.is_fatal()), "{diags:?}");
    }

    #[test]
    fn merge_at_join_makes_moved_dominant() {
        let diags = check_source(
            "struct Pt { x: i32 } fn take(p: Pt) -> i32 { return p.x; } fn main() -> i32 { let p = Pt { x: 1 }; if true { take(p); } return 0; }",
        );
        // `p` is moved on the `then` edge only; a merge that discards the
        // move would miss a later use-after-move, so this asserts the
        // pass at least runs clean when there is no later use.
        assert!(diags.iter().all(|d| !d.is_fatal()), "{diags:?}");
    }
}
