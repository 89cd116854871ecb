//! Dead-code elimination over `Block`.
//!
//! Grounded in `optimize/dce.rs`'s two jobs: truncate a statement list after
//! its first unconditionally-diverging statement, and recurse into every
//! nested block a statement or expression carries. Home's AST is
//! expression-oriented; `if`/`match`/`while`/`loop`/`for`
//! are all `Expr` variants reached through `ExprKind`, so the recursion
//! walks expressions rather than a flat `Stmt` enum, but the truncation
//! rule itself is unchanged.

use home_parser::ast::{Block, Expr, ExprKind, MatchArm, Stmt, StmtKind};
use home_parser::Arena;

use crate::stats::PassStats;

pub fn dce_block<'a>(block: &'a Block<'a>, arena: &'a Arena, stats: &mut PassStats) -> &'a Block<'a> {
    let mut stmts: Vec<Stmt<'a>> = block.stmts.iter().map(|s| dce_stmt(s, arena, stats)).collect();
    let mut tail = block.tail;

    // Truncate right after the first unconditionally-diverging statement
    //: anything after a `return`,
    // `break`, or `continue` at this block's own level can never run.
    if let Some(pos) = stmts.iter().position(|s| is_terminator(s)) {
        let dropped = (stmts.len() - (pos + 1)) as u32;
        if dropped > 0 || tail.is_some() {
            stats.eliminated_statements += dropped + tail.is_some() as u32;
        }
        stmts.truncate(pos + 1);
        tail = None;
    }

    arena.alloc(Block { stmts: arena.alloc_slice(stmts), tail, span: block.span })
}

fn is_terminator(stmt: &Stmt<'_>) -> bool {
    match &stmt.kind {
        StmtKind::Expr(e) => matches!(e.kind, ExprKind::Return(_) | ExprKind::Break(_) | ExprKind::Continue),
        _ => false,
    }
}

fn dce_stmt<'a>(stmt: &'a Stmt<'a>, arena: &'a Arena, stats: &mut PassStats) -> Stmt<'a> {
    match &stmt.kind {
        StmtKind::Let { pattern, ty, init } => Stmt {
            kind: StmtKind::Let { pattern: pattern.clone(), ty: ty.clone(), init: init.map(|e| dce_expr(e, arena, stats)) },
            span: stmt.span,
        },
        StmtKind::Expr(e) => Stmt { kind: StmtKind::Expr(dce_expr(e, arena, stats)), span: stmt.span },
        StmtKind::Item(_) => stmt.clone(),
    }
}

fn dce_expr<'a>(expr: &'a Expr<'a>, arena: &'a Arena, stats: &mut PassStats) -> &'a Expr<'a> {
    match &expr.kind {
        // `while false { ... }` never runs; drop the whole loop's
        // statement entirely rather than just its body.
        ExprKind::While { cond, .. } if is_false(cond) => {
            stats.eliminated_statements += 1;
            arena.alloc(Expr { kind: ExprKind::Literal(home_parser::ast::Literal::Unit), span: expr.span })
        }
        ExprKind::While { cond, body } => {
            arena.alloc(Expr { kind: ExprKind::While { cond, body: dce_block(body, arena, stats) }, span: expr.span })
        }
        ExprKind::Loop { body } => arena.alloc(Expr { kind: ExprKind::Loop { body: dce_block(body, arena, stats) }, span: expr.span }),
        ExprKind::For { pattern, iter, body } => {
            arena.alloc(Expr { kind: ExprKind::For { pattern: pattern.clone(), iter, body: dce_block(body, arena, stats) }, span: expr.span })
        }
        ExprKind::If { cond, then_branch, else_branch } => arena.alloc(Expr {
            kind: ExprKind::If {
                cond,
                then_branch: dce_expr(then_branch, arena, stats),
                else_branch: else_branch.map(|e| dce_expr(e, arena, stats)),
            },
            span: expr.span,
        }),
        ExprKind::Match { scrutinee, arms } => {
            let arms: Vec<MatchArm<'a>> = arms
                .iter()
                .map(|arm| MatchArm { pattern: arm.pattern.clone(), guard: arm.guard, body: dce_expr(arm.body, arena, stats) })
                .collect();
            arena.alloc(Expr { kind: ExprKind::Match { scrutinee, arms: arena.alloc_slice(arms) }, span: expr.span })
        }
        ExprKind::Block(block) => arena.alloc(Expr { kind: ExprKind::Block(dce_block(block, arena, stats)), span: expr.span }),
        // Every other variant has no nested block to eliminate code from.
        _ => expr,
    }
}

fn is_false(expr: &Expr<'_>) -> bool {
    matches!(expr.kind, ExprKind::Literal(home_parser::ast::Literal::Bool(false)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use home_base::Interner;
    use home_lexer::Lexer;
    use home_parser::Parser;

    fn dce_main_body(src: &str) -> (String, PassStats) {
        let mut strings = Interner::new();
        let (tokens, _) = Lexer::new(src, &mut strings).tokenize();
        let arena = Arena::new();
        let (module, _) = Parser::new(tokens, &arena, &mut strings).parse_module();
        let home_parser::ast::ItemKind::Fn(fn_def) = &module.items[0].kind else {
            panic!("expected a function item");
        };
        let body = fn_def.body.expect("expected a function body");
        let mut stats = PassStats::new();
        let reduced = dce_block(body, &arena, &mut stats);
        (format!("{reduced:?}"), stats)
    }

    #[test]
    fn truncates_statements_after_return() {
        let (debug, stats) = dce_main_body("fn main() -> i32 { return 1; let x = 2; }");
        assert_eq!(stats.eliminated_statements, 1);
        assert!(!debug.contains("\"2\""));
    }

    #[test]
    fn leaves_reachable_code_alone() {
        let (_, stats) = dce_main_body("fn main() -> i32 { let x = 1; return x; }");
        assert_eq!(stats.eliminated_statements, 0);
    }

    #[test]
    fn removes_while_false_loop() {
        let (debug, stats) = dce_main_body("fn main() { while false { let x = 1; } }");
        assert_eq!(stats.eliminated_statements, 1);
        assert!(!debug.contains("While"));
    }
}
