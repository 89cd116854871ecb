//! Constant folding and algebraic simplification over `Expr`.
//!
//! Grounded in `optimize/fold.rs`'s recursive rewrite: fold every child
//! first, then try to collapse the parent, and use `std::ptr::eq` to
//! return the original reference unchanged when folding a node's children
//! produced no new allocation — avoids a full-tree reallocation on every
//! pass when nothing actually changed.

use home_base::Interner;
use home_lexer::{NumberBase, NumberSuffix};
use home_parser::ast::{BinOp, Block, Expr, ExprKind, Literal, Stmt, StmtKind, UnOp};
use home_parser::Arena;

use crate::stats::PassStats;

pub fn fold_block<'a>(
    block: &'a Block<'a>,
    arena: &'a Arena,
    interner: &mut Interner,
    stats: &mut PassStats,
) -> &'a Block<'a> {
    let mut changed = false;
    let stmts: Vec<Stmt<'a>> = block
        .stmts
        .iter()
        .map(|s| {
            let folded = fold_stmt(s, arena, interner, stats);
            if !stmt_unchanged(s, &folded) {
                changed = true;
            }
            folded
        })
        .collect();
    let tail = block.tail.map(|t| {
        let ft = fold_expr(t, arena, interner, stats);
        if !std::ptr::eq(ft, t) {
            changed = true;
        }
        ft
    });

    if !changed {
        return block;
    }
    arena.alloc(Block { stmts: arena.alloc_slice(stmts), tail, span: block.span })
}

fn stmt_unchanged<'a>(before: &Stmt<'a>, after: &Stmt<'a>) -> bool {
    match (&before.kind, &after.kind) {
        (StmtKind::Let { init: bi, .. }, StmtKind::Let { init: ai, .. }) => match (bi, ai) {
            (Some(b), Some(a)) => std::ptr::eq(*b, *a),
            (None, None) => true,
            _ => false,
        },
        (StmtKind::Expr(b), StmtKind::Expr(a)) => std::ptr::eq(*b, *a),
        (StmtKind::Item(_), StmtKind::Item(_)) => true,
        _ => false,
    }
}

fn fold_stmt<'a>(stmt: &'a Stmt<'a>, arena: &'a Arena, interner: &mut Interner, stats: &mut PassStats) -> Stmt<'a> {
    match &stmt.kind {
        StmtKind::Let { pattern, ty, init } => Stmt {
            kind: StmtKind::Let {
                pattern: pattern.clone(),
                ty: ty.clone(),
                init: init.map(|e| fold_expr(e, arena, interner, stats)),
            },
            span: stmt.span,
        },
        StmtKind::Expr(e) => Stmt { kind: StmtKind::Expr(fold_expr(e, arena, interner, stats)), span: stmt.span },
        StmtKind::Item(_) => stmt.clone(),
    }
}

pub fn fold_expr<'a>(expr: &'a Expr<'a>, arena: &'a Arena, interner: &mut Interner, stats: &mut PassStats) -> &'a Expr<'a> {
    match &expr.kind {
        ExprKind::Unary(op, inner) => {
            let folded = fold_expr(inner, arena, interner, stats);
            if let Some(lit) = try_fold_unary(*op, folded, interner) {
                stats.folded_constants += 1;
                return arena.alloc(Expr { kind: ExprKind::Literal(lit), span: expr.span });
            }
            if std::ptr::eq(folded, *inner) {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Unary(*op, folded), span: expr.span })
            }
        }
        ExprKind::Binary(op, l, r) => {
            let fl = fold_expr(l, arena, interner, stats);
            let fr = fold_expr(r, arena, interner, stats);
            if let Some(lit) = try_fold_binary(*op, fl, fr, interner) {
                stats.folded_constants += 1;
                return arena.alloc(Expr { kind: ExprKind::Literal(lit), span: expr.span });
            }
            if let Some(simplified) = try_simplify_algebraic(*op, fl, fr, interner) {
                stats.folded_constants += 1;
                return simplified;
            }
            if std::ptr::eq(fl, *l) && std::ptr::eq(fr, *r) {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Binary(*op, fl, fr), span: expr.span })
            }
        }
        ExprKind::Assign(target, value) => {
            let fv = fold_expr(value, arena, interner, stats);
            if std::ptr::eq(fv, *value) {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Assign(target, fv), span: expr.span })
            }
        }
        ExprKind::Call { callee, args } => {
            let fc = fold_expr(callee, arena, interner, stats);
            let (fargs, args_changed) = fold_expr_slice(args, arena, interner, stats);
            if std::ptr::eq(fc, *callee) && !args_changed {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Call { callee: fc, args: arena.alloc_slice(fargs) }, span: expr.span })
            }
        }
        ExprKind::MethodCall { receiver, method, args } => {
            let fr = fold_expr(receiver, arena, interner, stats);
            let (fargs, args_changed) = fold_expr_slice(args, arena, interner, stats);
            if std::ptr::eq(fr, *receiver) && !args_changed {
                expr
            } else {
                arena.alloc(Expr {
                    kind: ExprKind::MethodCall { receiver: fr, method: *method, args: arena.alloc_slice(fargs) },
                    span: expr.span,
                })
            }
        }
        ExprKind::Field { base, field } => {
            let fb = fold_expr(base, arena, interner, stats);
            if std::ptr::eq(fb, *base) {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Field { base: fb, field: *field }, span: expr.span })
            }
        }
        ExprKind::Index { base, index } => {
            let fb = fold_expr(base, arena, interner, stats);
            let fi = fold_expr(index, arena, interner, stats);
            if std::ptr::eq(fb, *base) && std::ptr::eq(fi, *index) {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Index { base: fb, index: fi }, span: expr.span })
            }
        }
        ExprKind::Tuple(items) => {
            let (folded, changed) = fold_expr_slice(items, arena, interner, stats);
            if !changed {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Tuple(arena.alloc_slice(folded)), span: expr.span })
            }
        }
        ExprKind::Array(items) => {
            let (folded, changed) = fold_expr_slice(items, arena, interner, stats);
            if !changed {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Array(arena.alloc_slice(folded)), span: expr.span })
            }
        }
        ExprKind::StructLit { path, fields } => {
            let mut changed = false;
            let folded: Vec<_> = fields
                .iter()
                .map(|(n, v)| {
                    let fv = fold_expr(v, arena, interner, stats);
                    if !std::ptr::eq(fv, v) {
                        changed = true;
                    }
                    (*n, fv.clone())
                })
                .collect();
            if !changed {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::StructLit { path: *path, fields: arena.alloc_slice(folded) }, span: expr.span })
            }
        }
        ExprKind::If { cond, then_branch, else_branch } => {
            let fc = fold_expr(cond, arena, interner, stats);
            // Constant condition: fold straight to whichever branch is
            // taken.
            if let ExprKind::Literal(Literal::Bool(b)) = fc.kind {
                stats.folded_constants += 1;
                return if b {
                    fold_expr(then_branch, arena, interner, stats)
                } else if let Some(else_branch) = else_branch {
                    fold_expr(else_branch, arena, interner, stats)
                } else {
                    arena.alloc(Expr { kind: ExprKind::Literal(Literal::Unit), span: expr.span })
                };
            }
            let ft = fold_expr(then_branch, arena, interner, stats);
            let fe = else_branch.map(|e| fold_expr(e, arena, interner, stats));
            let unchanged = std::ptr::eq(fc, *cond)
                && std::ptr::eq(ft, *then_branch)
                && match (fe, *else_branch) {
                    (Some(a), Some(b)) => std::ptr::eq(a, b),
                    (None, None) => true,
                    _ => false,
                };
            if unchanged {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::If { cond: fc, then_branch: ft, else_branch: fe }, span: expr.span })
            }
        }
        ExprKind::Match { scrutinee, arms } => {
            let fs = fold_expr(scrutinee, arena, interner, stats);
            let farms: Vec<_> = arms
                .iter()
                .map(|arm| home_parser::ast::MatchArm {
                    pattern: arm.pattern.clone(),
                    guard: arm.guard.map(|g| fold_expr(g, arena, interner, stats)),
                    body: fold_expr(arm.body, arena, interner, stats),
                })
                .collect();
            arena.alloc(Expr { kind: ExprKind::Match { scrutinee: fs, arms: arena.alloc_slice(farms) }, span: expr.span })
        }
        ExprKind::Block(block) => {
            let fb = fold_block(block, arena, interner, stats);
            if std::ptr::eq(fb, *block) {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Block(fb), span: expr.span })
            }
        }
        ExprKind::While { cond, body } => {
            let fc = fold_expr(cond, arena, interner, stats);
            let fb = fold_block(body, arena, interner, stats);
            if std::ptr::eq(fc, *cond) && std::ptr::eq(fb, *body) {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::While { cond: fc, body: fb }, span: expr.span })
            }
        }
        ExprKind::Loop { body } => {
            let fb = fold_block(body, arena, interner, stats);
            if std::ptr::eq(fb, *body) {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Loop { body: fb }, span: expr.span })
            }
        }
        ExprKind::For { pattern, iter, body } => {
            let fi = fold_expr(iter, arena, interner, stats);
            let fb = fold_block(body, arena, interner, stats);
            if std::ptr::eq(fi, *iter) && std::ptr::eq(fb, *body) {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::For { pattern: pattern.clone(), iter: fi, body: fb }, span: expr.span })
            }
        }
        ExprKind::Return(inner) => fold_wrap_opt(expr, *inner, arena, interner, stats, ExprKind::Return),
        ExprKind::Break(inner) => fold_wrap_opt(expr, *inner, arena, interner, stats, ExprKind::Break),
        ExprKind::Continue => expr,
        ExprKind::Range { start, end, inclusive } => {
            let fstart = start.map(|s| fold_expr(s, arena, interner, stats));
            let fend = end.map(|e| fold_expr(e, arena, interner, stats));
            let unchanged = opt_eq(fstart, *start) && opt_eq(fend, *end);
            if unchanged {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Range { start: fstart, end: fend, inclusive: *inclusive }, span: expr.span })
            }
        }
        ExprKind::Cast { expr: inner, ty } => {
            let fi = fold_expr(inner, arena, interner, stats);
            if std::ptr::eq(fi, *inner) {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Cast { expr: fi, ty }, span: expr.span })
            }
        }
        ExprKind::Await(inner) => {
            let fi = fold_expr(inner, arena, interner, stats);
            if std::ptr::eq(fi, *inner) {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Await(fi), span: expr.span })
            }
        }
        ExprKind::Try(inner) => {
            let fi = fold_expr(inner, arena, interner, stats);
            if std::ptr::eq(fi, *inner) {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Try(fi), span: expr.span })
            }
        }
        ExprKind::Comptime(inner) => {
            // `comptime { ... }` is evaluated by the comptime evaluator, not
            // here; this only simplifies what's inside in case evaluation
            // fails and the block falls back to running at runtime.
            let fi = fold_expr(inner, arena, interner, stats);
            if std::ptr::eq(fi, *inner) {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Comptime(fi), span: expr.span })
            }
        }
        ExprKind::Closure { params, body } => {
            let fb = fold_expr(body, arena, interner, stats);
            if std::ptr::eq(fb, *body) {
                expr
            } else {
                arena.alloc(Expr { kind: ExprKind::Closure { params, body: fb }, span: expr.span })
            }
        }
        ExprKind::InterpolatedStr(_) => expr,
        // Leaves.
        ExprKind::Literal(_) | ExprKind::Str(_) | ExprKind::Path(_) => expr,
    }
}

fn opt_eq<'a>(a: Option<&'a Expr<'a>>, b: Option<&'a Expr<'a>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => std::ptr::eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn fold_wrap_opt<'a>(
    expr: &'a Expr<'a>,
    inner: Option<&'a Expr<'a>>,
    arena: &'a Arena,
    interner: &mut Interner,
    stats: &mut PassStats,
    wrap: impl FnOnce(Option<&'a Expr<'a>>) -> ExprKind<'a>,
) -> &'a Expr<'a> {
    match inner {
        None => expr,
        Some(inner) => {
            let fi = fold_expr(inner, arena, interner, stats);
            if std::ptr::eq(fi, inner) {
                expr
            } else {
                arena.alloc(Expr { kind: wrap(Some(fi)), span: expr.span })
            }
        }
    }
}

/// Folds every item, returning the new slice plus whether any element's
/// identity changed (clones lose pointer identity, so callers compare the
/// `bool` rather than re-deriving it from the output).
fn fold_expr_slice<'a>(items: &'a [Expr<'a>], arena: &'a Arena, interner: &mut Interner, stats: &mut PassStats) -> (Vec<Expr<'a>>, bool) {
    let mut changed = false;
    let folded = items
        .iter()
        .map(|e| {
            let fe = fold_expr(e, arena, interner, stats);
            if !std::ptr::eq(fe, e) {
                changed = true;
            }
            fe.clone()
        })
        .collect();
    (folded, changed)
}

fn try_fold_unary(op: UnOp, operand: &Expr, interner: &mut Interner) -> Option<Literal> {
    match (op, &operand.kind) {
        (UnOp::Neg, ExprKind::Literal(Literal::Int(text, base, suffix))) => {
            let v = parse_int(interner.resolve(*text), *base)?;
            Some(int_literal(-v, interner, *suffix))
        }
        (UnOp::Neg, ExprKind::Literal(Literal::Float(text, suffix))) => {
            let v: f64 = interner.resolve(*text).parse().ok()?;
            Some(float_literal(-v, interner, *suffix))
        }
        (UnOp::Not, ExprKind::Literal(Literal::Bool(b))) => Some(Literal::Bool(!b)),
        _ => None,
    }
}

fn try_fold_binary(op: BinOp, left: &Expr, right: &Expr, interner: &mut Interner) -> Option<Literal> {
    match (&left.kind, &right.kind) {
        (ExprKind::Literal(Literal::Int(lt, lb, ls)), ExprKind::Literal(Literal::Int(rt, rb, rs))) => {
            let l = parse_int(interner.resolve(*lt), *lb)?;
            let r = parse_int(interner.resolve(*rt), *rb)?;
            let suffix = if *ls != NumberSuffix::None { *ls } else { *rs };
            fold_int_op(op, l, r, interner, suffix)
        }
        (ExprKind::Literal(Literal::Float(lt, ls)), ExprKind::Literal(Literal::Float(rt, rs))) => {
            let l: f64 = interner.resolve(*lt).parse().ok()?;
            let r: f64 = interner.resolve(*rt).parse().ok()?;
            let suffix = if *ls != NumberSuffix::None { *ls } else { *rs };
            fold_float_op(op, l, r, interner, suffix)
        }
        (ExprKind::Literal(Literal::Bool(l)), ExprKind::Literal(Literal::Bool(r))) => fold_bool_op(op, *l, *r),
        (ExprKind::Literal(Literal::Char(l)), ExprKind::Literal(Literal::Char(r))) => match op {
            BinOp::Eq => Some(Literal::Bool(l == r)),
            BinOp::Ne => Some(Literal::Bool(l != r)),
            _ => None,
        },
        _ => None,
    }
}

fn is_int_zero(e: &Expr, interner: &Interner) -> bool {
    matches!(&e.kind, ExprKind::Literal(Literal::Int(t, b, _)) if parse_int(interner.resolve(*t), *b) == Some(0))
}

fn is_int_one(e: &Expr, interner: &Interner) -> bool {
    matches!(&e.kind, ExprKind::Literal(Literal::Int(t, b, _)) if parse_int(interner.resolve(*t), *b) == Some(1))
}

fn is_float_zero(e: &Expr, interner: &Interner) -> bool {
    matches!(&e.kind, ExprKind::Literal(Literal::Float(t, _)) if interner.resolve(*t).parse::<f64>() == Ok(0.0))
}

fn is_float_one(e: &Expr, interner: &Interner) -> bool {
    matches!(&e.kind, ExprKind::Literal(Literal::Float(t, _)) if interner.resolve(*t).parse::<f64>() == Ok(1.0))
}

/// `x + 0 = x`, `x - 0 = x`, `x * 1 = x`, `x / 1 = x` and their commutative
/// forms, grounded in `optimize/fold.rs::try_simplify_algebraic`. Multiply
/// by zero is left to `try_fold_binary` (it needs a fresh zero literal of
/// the right numeric kind, which plain identity-return can't produce).
fn try_simplify_algebraic<'a>(op: BinOp, left: &'a Expr<'a>, right: &'a Expr<'a>, interner: &Interner) -> Option<&'a Expr<'a>> {
    match op {
        BinOp::Add => {
            if is_int_zero(right, interner) || is_float_zero(right, interner) {
                return Some(left);
            }
            if is_int_zero(left, interner) || is_float_zero(left, interner) {
                return Some(right);
            }
            None
        }
        BinOp::Sub => {
            if is_int_zero(right, interner) || is_float_zero(right, interner) {
                return Some(left);
            }
            None
        }
        BinOp::Mul => {
            if is_int_one(right, interner) || is_float_one(right, interner) {
                return Some(left);
            }
            if is_int_one(left, interner) || is_float_one(left, interner) {
                return Some(right);
            }
            None
        }
        BinOp::Div => {
            if is_int_one(right, interner) || is_float_one(right, interner) {
                return Some(left);
            }
            None
        }
        _ => None,
    }
}

enum Folded {
    Int(i128),
    Bool(bool),
}

fn fold_int_op(op: BinOp, l: i128, r: i128, interner: &mut Interner, suffix: NumberSuffix) -> Option<Literal> {
    let folded = match op {
        BinOp::Add => Folded::Int(l.wrapping_add(r)),
        BinOp::Sub => Folded::Int(l.wrapping_sub(r)),
        BinOp::Mul => Folded::Int(l.wrapping_mul(r)),
        BinOp::Div if r != 0 => Folded::Int(l / r),
        BinOp::Rem if r != 0 => Folded::Int(l % r),
        BinOp::Eq => Folded::Bool(l == r),
        BinOp::Ne => Folded::Bool(l != r),
        BinOp::Lt => Folded::Bool(l < r),
        BinOp::Le => Folded::Bool(l <= r),
        BinOp::Gt => Folded::Bool(l > r),
        BinOp::Ge => Folded::Bool(l >= r),
        _ => return None,
    };
    Some(match folded {
        Folded::Int(v) => int_literal(v, interner, suffix),
        Folded::Bool(v) => Literal::Bool(v),
    })
}

fn fold_float_op(op: BinOp, l: f64, r: f64, interner: &mut Interner, suffix: NumberSuffix) -> Option<Literal> {
    match op {
        BinOp::Add => Some(float_literal(l + r, interner, suffix)),
        BinOp::Sub => Some(float_literal(l - r, interner, suffix)),
        BinOp::Mul => Some(float_literal(l * r, interner, suffix)),
        BinOp::Div if r != 0.0 => Some(float_literal(l / r, interner, suffix)),
        BinOp::Eq => Some(Literal::Bool(l == r)),
        BinOp::Ne => Some(Literal::Bool(l != r)),
        BinOp::Lt => Some(Literal::Bool(l < r)),
        BinOp::Le => Some(Literal::Bool(l <= r)),
        BinOp::Gt => Some(Literal::Bool(l > r)),
        BinOp::Ge => Some(Literal::Bool(l >= r)),
        _ => None,
    }
}

fn fold_bool_op(op: BinOp, l: bool, r: bool) -> Option<Literal> {
    match op {
        BinOp::And => Some(Literal::Bool(l && r)),
        BinOp::Or => Some(Literal::Bool(l || r)),
        BinOp::Eq => Some(Literal::Bool(l == r)),
        BinOp::Ne => Some(Literal::Bool(l != r)),
        _ => None,
    }
}

fn parse_int(text: &str, base: NumberBase) -> Option<i128> {
    let radix = match base {
        NumberBase::Binary => 2,
        NumberBase::Octal => 8,
        NumberBase::Decimal => 10,
        NumberBase::Hex => 16,
    };
    i128::from_str_radix(text, radix).ok()
}

fn int_literal(value: i128, interner: &mut Interner, suffix: NumberSuffix) -> Literal {
    let sym = interner.intern(&value.to_string());
    Literal::Int(sym, NumberBase::Decimal, suffix)
}

fn float_literal(value: f64, interner: &mut Interner, suffix: NumberSuffix) -> Literal {
    let sym = interner.intern(&format!("{value}"));
    Literal::Float(sym, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use home_lexer::Lexer;
    use home_parser::Parser;

    fn fold_main_body(src: &str) -> (String, PassStats) {
        let mut strings = Interner::new();
        let (tokens, _) = Lexer::new(src, &mut strings).tokenize();
        let arena = Arena::new();
        let (module, _) = Parser::new(tokens, &arena, &mut strings).parse_module();
        let home_parser::ast::ItemKind::Fn(fn_def) = &module.items[0].kind else {
            panic!("expected a function item");
        };
        let body = fn_def.body.expect("expected a function body");
        let mut stats = PassStats::new();
        let folded = fold_block(body, &arena, &mut strings, &mut stats);
        (format!("{folded:?}"), stats)
    }

    #[test]
    fn folds_integer_arithmetic() {
        let (debug, stats) = fold_main_body("fn main() { let x = 2 + 3 * 4; }");
        assert_eq!(stats.folded_constants, 2);
        assert!(debug.contains("\"14\""));
    }

    #[test]
    fn simplifies_additive_identity() {
        let (_, stats) = fold_main_body("fn main() { let x = y + 0; }");
        assert_eq!(stats.folded_constants, 1);
    }

    #[test]
    fn collapses_constant_if() {
        let (debug, stats) = fold_main_body("fn main() { let x = if true { 1 } else { 2 }; }");
        assert_eq!(stats.folded_constants, 1);
        assert!(debug.contains("\"1\""));
        assert!(!debug.contains("\"2\""));
    }

    #[test]
    fn leaves_non_constant_expressions_alone() {
        let (_, stats) = fold_main_body("fn main() { let x = y + z; }");
        assert_eq!(stats.folded_constants, 0);
    }
}
