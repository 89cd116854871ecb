//! Constant propagation over `Block`.
//!
//! Grounded in `optimize/propagate.rs`: substitute every read of an
//! immutable, never-reassigned, literal-bound local with its literal value,
//! then hand the substituted expression back through [`crate::fold`] so the
//! substitution cascades into further constant folding (`let y = x + 1;`
//! after `let x = 2;` becomes `let y = 3;` in one pass, not two). Scoping
//! clones the binding environment per nested block: a binding
//! propagated inside an `if` arm does not leak to its sibling or to code
//! after the `if`.

use home_base::{Interner, Symbol};
use home_parser::ast::{Block, Expr, ExprKind, Literal, MatchArm, Pattern, Stmt, StmtKind};
use home_parser::Arena;
use std::collections::{HashMap, HashSet};

use crate::fold::fold_expr;
use crate::stats::PassStats;

type Env = HashMap<Symbol, Literal>;

pub fn propagate_block<'a>(block: &'a Block<'a>, arena: &'a Arena, interner: &mut Interner, stats: &mut PassStats) -> &'a Block<'a> {
    let mutated = collect_assigned(block);
    let mut env = Env::new();
    propagate_block_with(block, &mut env, &mutated, arena, interner, stats)
}

fn propagate_block_with<'a>(
    block: &'a Block<'a>,
    env: &mut Env,
    mutated: &HashSet<Symbol>,
    arena: &'a Arena,
    interner: &mut Interner,
    stats: &mut PassStats,
) -> &'a Block<'a> {
    let stmts: Vec<Stmt<'a>> = block
        .stmts
        .iter()
        .map(|s| propagate_stmt(s, env, mutated, arena, interner, stats))
        .collect();
    let tail = block.tail.map(|t| subst_and_fold(t, env, mutated, arena, interner, stats));
    arena.alloc(Block { stmts: arena.alloc_slice(stmts), tail, span: block.span })
}

/// Propagates through a nested block (`if`/`while`/`match` arm body) with
/// its own copy of the enclosing environment, so bindings made inside don't
/// escape past the block.
fn propagate_nested<'a>(
    block: &'a Block<'a>,
    env: &Env,
    mutated: &HashSet<Symbol>,
    arena: &'a Arena,
    interner: &mut Interner,
    stats: &mut PassStats,
) -> &'a Block<'a> {
    let mut child = env.clone();
    propagate_block_with(block, &mut child, mutated, arena, interner, stats)
}

fn propagate_stmt<'a>(
    stmt: &'a Stmt<'a>,
    env: &mut Env,
    mutated: &HashSet<Symbol>,
    arena: &'a Arena,
    interner: &mut Interner,
    stats: &mut PassStats,
) -> Stmt<'a> {
    match &stmt.kind {
        StmtKind::Let { pattern, ty, init } => {
            let init = init.map(|e| subst_and_fold(e, env, mutated, arena, interner, stats));
            if let (Pattern::Binding { name, mutable: false }, Some(e)) = (pattern, init) {
                if !mutated.contains(name) {
                    if let ExprKind::Literal(lit) = &e.kind {
                        env.insert(*name, lit.clone());
                    }
                }
            }
            Stmt { kind: StmtKind::Let { pattern: pattern.clone(), ty: ty.clone(), init }, span: stmt.span }
        }
        StmtKind::Expr(e) => {
            // A plain assignment kills whatever constant the target used
            // to hold; every other read-only expression is substituted.
            if let ExprKind::Assign(lhs, rhs) = &e.kind {
                if let ExprKind::Path(name) = lhs.kind {
                    env.remove(&name);
                }
                let rhs = subst_and_fold(rhs, env, mutated, arena, interner, stats);
                return Stmt {
                    kind: StmtKind::Expr(arena.alloc(Expr { kind: ExprKind::Assign(lhs, rhs), span: e.span })),
                    span: stmt.span,
                };
            }
            Stmt { kind: StmtKind::Expr(propagate_expr(e, env, mutated, arena, interner, stats)), span: stmt.span }
        }
        StmtKind::Item(_) => stmt.clone(),
    }
}

/// Walks into an expression's nested blocks while substituting/folding every leaf expression.
fn propagate_expr<'a>(
    expr: &'a Expr<'a>,
    env: &mut Env,
    mutated: &HashSet<Symbol>,
    arena: &'a Arena,
    interner: &mut Interner,
    stats: &mut PassStats,
) -> &'a Expr<'a> {
    match &expr.kind {
        ExprKind::If { cond, then_branch, else_branch } => {
            let cond = subst_and_fold(cond, env, mutated, arena, interner, stats);
            let then_branch = propagate_expr(then_branch, &mut env.clone(), mutated, arena, interner, stats);
            let else_branch = else_branch.map(|e| propagate_expr(e, &mut env.clone(), mutated, arena, interner, stats));
            arena.alloc(Expr { kind: ExprKind::If { cond, then_branch, else_branch }, span: expr.span })
        }
        ExprKind::While { cond, body } => {
            let cond = subst_and_fold(cond, env, mutated, arena, interner, stats);
            let body = propagate_nested(body, env, mutated, arena, interner, stats);
            arena.alloc(Expr { kind: ExprKind::While { cond, body }, span: expr.span })
        }
        ExprKind::Loop { body } => {
            arena.alloc(Expr { kind: ExprKind::Loop { body: propagate_nested(body, env, mutated, arena, interner, stats) }, span: expr.span })
        }
        ExprKind::For { pattern, iter, body } => {
            let iter = subst_and_fold(iter, env, mutated, arena, interner, stats);
            let body = propagate_nested(body, env, mutated, arena, interner, stats);
            arena.alloc(Expr { kind: ExprKind::For { pattern: pattern.clone(), iter, body }, span: expr.span })
        }
        ExprKind::Match { scrutinee, arms } => {
            let scrutinee = subst_and_fold(scrutinee, env, mutated, arena, interner, stats);
            let arms: Vec<MatchArm<'a>> = arms
                .iter()
                .map(|arm| MatchArm {
                    pattern: arm.pattern.clone(),
                    guard: arm.guard,
                    body: propagate_expr(arm.body, &mut env.clone(), mutated, arena, interner, stats),
                })
                .collect();
            arena.alloc(Expr { kind: ExprKind::Match { scrutinee, arms: arena.alloc_slice(arms) }, span: expr.span })
        }
        ExprKind::Block(block) => {
            arena.alloc(Expr { kind: ExprKind::Block(propagate_nested(block, env, mutated, arena, interner, stats)), span: expr.span })
        }
        _ => subst_and_fold(expr, env, mutated, arena, interner, stats),
    }
}

/// Substitutes `Path(name)` leaves with their known literal and re-folds
/// the surrounding expression.
fn subst_and_fold<'a>(
    expr: &'a Expr<'a>,
    env: &mut Env,
    mutated: &HashSet<Symbol>,
    arena: &'a Arena,
    interner: &mut Interner,
    stats: &mut PassStats,
) -> &'a Expr<'a> {
    let substituted = subst_expr(expr, env, arena, stats);
    let _ = mutated;
    fold_expr(substituted, arena, interner, stats)
}

fn subst_expr<'a>(expr: &'a Expr<'a>, env: &Env, arena: &'a Arena, stats: &mut PassStats) -> &'a Expr<'a> {
    match &expr.kind {
        ExprKind::Path(name) => match env.get(name) {
            Some(lit) => {
                stats.propagated_values += 1;
                arena.alloc(Expr { kind: ExprKind::Literal(lit.clone()), span: expr.span })
            }
            None => expr,
        },
        ExprKind::Unary(op, inner) => {
            let si = subst_expr(inner, env, arena, stats);
            if std::ptr::eq(si, *inner) { expr } else { arena.alloc(Expr { kind: ExprKind::Unary(*op, si), span: expr.span }) }
        }
        ExprKind::Binary(op, l, r) => {
            let sl = subst_expr(l, env, arena, stats);
            let sr = subst_expr(r, env, arena, stats);
            if std::ptr::eq(sl, *l) && std::ptr::eq(sr, *r) {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Binary(*op, sl, sr), span: expr.span })
            }
        }
        ExprKind::Call { callee, args } => {
            let fargs: Vec<Expr<'a>> = args.iter().map(|a| subst_expr(a, env, arena, stats).clone()).collect();
            arena.alloc(Expr { kind: ExprKind::Call { callee, args: arena.alloc_slice(fargs) }, span: expr.span })
        }
        ExprKind::MethodCall { receiver, method, args } => {
            let sr = subst_expr(receiver, env, arena, stats);
            let fargs: Vec<Expr<'a>> = args.iter().map(|a| subst_expr(a, env, arena, stats).clone()).collect();
            arena.alloc(Expr { kind: ExprKind::MethodCall { receiver: sr, method: *method, args: arena.alloc_slice(fargs) }, span: expr.span })
        }
        ExprKind::Field { base, field } => {
            let sb = subst_expr(base, env, arena, stats);
            if std::ptr::eq(sb, *base) { expr } else { arena.alloc(Expr { kind: ExprKind::Field { base: sb, field: *field }, span: expr.span }) }
        }
        ExprKind::Index { base, index } => {
            let sb = subst_expr(base, env, arena, stats);
            let si = subst_expr(index, env, arena, stats);
            arena.alloc(Expr { kind: ExprKind::Index { base: sb, index: si }, span: expr.span })
        }
        ExprKind::Tuple(items) => {
            let subst: Vec<Expr<'a>> = items.iter().map(|e| subst_expr(e, env, arena, stats).clone()).collect();
            arena.alloc(Expr { kind: ExprKind::Tuple(arena.alloc_slice(subst)), span: expr.span })
        }
        ExprKind::Array(items) => {
            let subst: Vec<Expr<'a>> = items.iter().map(|e| subst_expr(e, env, arena, stats).clone()).collect();
            arena.alloc(Expr { kind: ExprKind::Array(arena.alloc_slice(subst)), span: expr.span })
        }
        ExprKind::Cast { expr: inner, ty } => {
            let si = subst_expr(inner, env, arena, stats);
            arena.alloc(Expr { kind: ExprKind::Cast { expr: si, ty }, span: expr.span })
        }
        ExprKind::Return(inner) => {
            let si = inner.map(|e| subst_expr(e, env, arena, stats));
            arena.alloc(Expr { kind: ExprKind::Return(si), span: expr.span })
        }
        // Nested-block-bearing variants are handled by `propagate_expr`,
        // which calls this function only on already-leaf-level
        // subexpressions (conditions, call args, etc.) — reaching one of
        // them here means it came from a context that doesn't itself
        // need env-scoping, so a plain recursive copy is correct.
        _ => expr,
    }
}

/// Every `Path` target assigned anywhere in `block`'s whole expression
/// tree, collected up front — mirrors `collect_all_set_targets`'s whole-function
/// scan: a binding reassigned *anywhere* in the function is never
/// propagated, even where a single flow path never reaches the reassign.
fn collect_assigned(block: &Block<'_>) -> HashSet<Symbol> {
    let mut out = HashSet::new();
    collect_assigned_block(block, &mut out);
    out
}

fn collect_assigned_block(block: &Block<'_>, out: &mut HashSet<Symbol>) {
    for stmt in block.stmts {
        match &stmt.kind {
            StmtKind::Let { init, .. } => {
                if let Some(e) = init {
                    collect_assigned_expr(e, out);
                }
            }
            StmtKind::Expr(e) => collect_assigned_expr(e, out),
            StmtKind::Item(_) => {}
        }
    }
    if let Some(t) = block.tail {
        collect_assigned_expr(t, out);
    }
}

fn collect_assigned_expr(expr: &Expr<'_>, out: &mut HashSet<Symbol>) {
    match &expr.kind {
        ExprKind::Assign(lhs, rhs) => {
            if let ExprKind::Path(name) = lhs.kind {
                out.insert(name);
            }
            collect_assigned_expr(rhs, out);
        }
        ExprKind::Unary(_, e) | ExprKind::Field { base: e, .. } | ExprKind::Cast { expr: e, .. } | ExprKind::Await(e) | ExprKind::Try(e) => {
            collect_assigned_expr(e, out)
        }
        ExprKind::Binary(_, l, r) | ExprKind::Index { base: l, index: r } => {
            collect_assigned_expr(l, out);
            collect_assigned_expr(r, out);
        }
        ExprKind::Call { callee, args } => {
            collect_assigned_expr(callee, out);
            for a in *args {
                collect_assigned_expr(a, out);
            }
        }
        ExprKind::MethodCall { receiver, args, .. } => {
            collect_assigned_expr(receiver, out);
            for a in *args {
                collect_assigned_expr(a, out);
            }
        }
        ExprKind::Tuple(items) | ExprKind::Array(items) => {
            for i in *items {
                collect_assigned_expr(i, out);
            }
        }
        ExprKind::If { cond, then_branch, else_branch } => {
            collect_assigned_expr(cond, out);
            collect_assigned_expr(then_branch, out);
            if let Some(e) = else_branch {
                collect_assigned_expr(e, out);
            }
        }
        ExprKind::Match { scrutinee, arms } => {
            collect_assigned_expr(scrutinee, out);
            for arm in *arms {
                collect_assigned_expr(arm.body, out);
            }
        }
        ExprKind::Block(b) | ExprKind::While { body: b, .. } | ExprKind::Loop { body: b } | ExprKind::For { body: b, .. } => {
            collect_assigned_block(b, out);
        }
        ExprKind::Return(inner) | ExprKind::Break(inner) => {
            if let Some(e) = inner {
                collect_assigned_expr(e, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use home_lexer::Lexer;
    use home_parser::Parser;

    fn propagate_main_body(src: &str) -> (String, PassStats) {
        let mut strings = Interner::new();
        let (tokens, _) = Lexer::new(src, &mut strings).tokenize();
        let arena = Arena::new();
        let (module, _) = Parser::new(tokens, &arena, &mut strings).parse_module();
        let home_parser::ast::ItemKind::Fn(fn_def) = &module.items[0].kind else {
            panic!("expected a function item");
        };
        let body = fn_def.body.expect("expected a function body");
        let mut stats = PassStats::new();
        let propagated = propagate_block(body, &arena, &mut strings, &mut stats);
        (format!("{propagated:?}"), stats)
    }

    #[test]
    fn propagates_immutable_literal_binding() {
        let (debug, stats) = propagate_main_body("fn main() -> i32 { let x = 10; let y = x + 32; return y; }");
        assert_eq!(stats.propagated_values, 1);
        assert!(debug.contains("\"42\""));
    }

    #[test]
    fn does_not_propagate_a_reassigned_binding() {
        let (_, stats) = propagate_main_body("fn main() -> i32 { let mut x = 10; x = 20; return x; }");
        assert_eq!(stats.propagated_values, 0);
    }
}
