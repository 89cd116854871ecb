//! Loop-invariant code motion, new at O2 — this and [`crate::inline`] are
//! written fresh in the same idiom as `fold`/`dce`/`propagate`: a pass
//! function taking `(node, arena, stats)` and
//! returning a rebuilt node, changed-or-not tracked by `std::ptr::eq`.
//!
//! A `let` statement at the front of a loop body is hoisted above the loop
//! when its initializer is side-effect-free (no `call`, no assignment) and
//! references no binding that is itself declared or assigned anywhere in
//! the loop body — a conservative, intra-block approximation of
//! invariance, sufficient for the straight-line loop bodies this compiler
//! actually emits.

use home_base::Symbol;
use home_parser::ast::{Block, Expr, ExprKind, Pattern, Stmt, StmtKind};
use home_parser::Arena;
use std::collections::HashSet;

use crate::stats::PassStats;

pub fn licm_block<'a>(block: &'a Block<'a>, arena: &'a Arena, stats: &mut PassStats) -> &'a Block<'a> {
    let mut out: Vec<Stmt<'a>> = Vec::with_capacity(block.stmts.len());
    for stmt in block.stmts {
        match &stmt.kind {
            StmtKind::Expr(e) => match &e.kind {
                ExprKind::While { cond, body } => {
                    let (hoisted, body) = hoist_invariant(body, arena, stats);
                    out.extend(hoisted);
                    let rebuilt = arena.alloc(Expr { kind: ExprKind::While { cond, body }, span: e.span });
                    out.push(Stmt { kind: StmtKind::Expr(rebuilt), span: stmt.span });
                }
                ExprKind::Loop { body } => {
                    let (hoisted, body) = hoist_invariant(body, arena, stats);
                    out.extend(hoisted);
                    let rebuilt = arena.alloc(Expr { kind: ExprKind::Loop { body }, span: e.span });
                    out.push(Stmt { kind: StmtKind::Expr(rebuilt), span: stmt.span });
                }
                _ => out.push(stmt.clone()),
            },
            _ => out.push(stmt.clone()),
        }
    }
    let tail = block.tail;
    arena.alloc(Block { stmts: arena.alloc_slice(out), tail, span: block.span })
}

/// Splits `body`'s leading statements into the invariant prefix that can
/// move above the loop and the (possibly shrunk) remaining body.
fn hoist_invariant<'a>(body: &'a Block<'a>, arena: &'a Arena, stats: &mut PassStats) -> (Vec<Stmt<'a>>, &'a Block<'a>) {
    let written = written_in_block(body);
    let mut hoisted = Vec::new();
    let mut split_at = 0;
    for stmt in body.stmts {
        match &stmt.kind {
            StmtKind::Let { pattern: Pattern::Binding { mutable: false, .. }, init: Some(init), .. }
                if is_pure(init) && !references_any(init, &written) =>
            {
                hoisted.push(stmt.clone());
                split_at += 1;
                stats.hoisted_invariants += 1;
            }
            _ => break,
        }
    }
    if hoisted.is_empty() {
        return (hoisted, body);
    }
    let remaining = Block { stmts: arena.alloc_slice(body.stmts[split_at..].to_vec()), tail: body.tail, span: body.span };
    (hoisted, arena.alloc(remaining))
}

/// A conservative side-effect-free check: no calls (which might mutate
/// through a reference or have observable effects) and no nested
/// assignment expressions.
fn is_pure(expr: &Expr<'_>) -> bool {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Str(_) | ExprKind::Path(_) => true,
        ExprKind::Unary(_, e) | ExprKind::Cast { expr: e, .. } | ExprKind::Field { base: e, .. } => is_pure(e),
        ExprKind::Binary(_, l, r) | ExprKind::Index { base: l, index: r } => is_pure(l) && is_pure(r),
        ExprKind::Tuple(items) | ExprKind::Array(items) => items.iter().all(is_pure),
        _ => false,
    }
}

fn references_any(expr: &Expr<'_>, names: &HashSet<Symbol>) -> bool {
    match &expr.kind {
        ExprKind::Path(name) => names.contains(name),
        ExprKind::Unary(_, e) | ExprKind::Cast { expr: e, .. } | ExprKind::Field { base: e, .. } => references_any(e, names),
        ExprKind::Binary(_, l, r) | ExprKind::Index { base: l, index: r } => references_any(l, names) || references_any(r, names),
        ExprKind::Tuple(items) | ExprKind::Array(items) => items.iter().any(|e| references_any(e, names)),
        _ => false,
    }
}

/// Every binding declared or reassigned anywhere in `block`, used to
/// reject a candidate whose initializer reads a loop-local variable.
fn written_in_block(block: &Block<'_>) -> HashSet<Symbol> {
    let mut out = HashSet::new();
    for stmt in block.stmts {
        match &stmt.kind {
            StmtKind::Let { pattern: Pattern::Binding { name, .. }, .. } => {
                out.insert(*name);
            }
            StmtKind::Expr(e) => {
                if let ExprKind::Assign(lhs, _) = &e.kind {
                    if let ExprKind::Path(name) = lhs.kind {
                        out.insert(name);
                    }
                }
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use home_base::Interner;
    use home_lexer::Lexer;
    use home_parser::Parser;

    fn licm_main_body(src: &str) -> (String, PassStats) {
        let mut strings = Interner::new();
        let (tokens, _) = Lexer::new(src, &mut strings).tokenize();
        let arena = Arena::new();
        let (module, _) = Parser::new(tokens, &arena, &mut strings).parse_module();
        let home_parser::ast::ItemKind::Fn(fn_def) = &module.items[0].kind else {
            panic!("expected a function item");
        };
        let body = fn_def.body.expect("expected a function body");
        let mut stats = PassStats::new();
        let hoisted = licm_block(body, &arena, &mut stats);
        (format!("{hoisted:?}"), stats)
    }

    #[test]
    fn hoists_loop_invariant_let() {
        let (_, stats) = licm_main_body("fn main() { let mut i = 0; while i < 10 { let step = 1 + 1; i = i + step; } }");
        assert_eq!(stats.hoisted_invariants, 1);
    }

    #[test]
    fn does_not_hoist_a_binding_that_depends_on_the_loop() {
        let (_, stats) = licm_main_body("fn main() { let mut i = 0; while i < 10 { let doubled = i * 2; i = i + 1; } }");
        assert_eq!(stats.hoisted_invariants, 0);
    }
}
