//! Trivial, size-bounded inlining, new at O1+ — written
//! fresh in the `home-pass` idiom alongside [`crate::licm`].
//!
//! Operates on a whole `Module` rather than one `Block` at a time, because
//! a call site only knows whether to inline once it can look up the
//! callee's body by name. A candidate is a non-generic, non-recursive
//! top-level function whose body fits under the level's
//! `inline_size_bound` node count.
//! A call to one is rewritten in place to a nested block: one `let` per
//! parameter (preserving argument evaluation order and aliasing — no
//! textual substitution) followed by the callee body's statements and
//! tail, so the existing per-block scoping in `home-types`/`home-borrow`
//! gives the inlined locals a fresh scope for free.

use home_base::Symbol;
use home_parser::ast::{Block, Expr, ExprKind, FnDef, ImplDef, Item, ItemKind, MatchArm, Module, Pattern, Stmt, StmtKind};
use home_parser::Arena;
use std::collections::HashMap;

use crate::stats::PassStats;

pub fn inline_module<'a>(module: &Module<'a>, arena: &'a Arena, size_bound: u32, stats: &mut PassStats) -> Module<'a> {
    if size_bound == 0 {
        return module.clone_shallow();
    }
    let candidates = collect_candidates(module, size_bound);
    let items: Vec<Item<'a>> = module.items.iter().map(|item| inline_item(item, &candidates, arena, stats)).collect();
    Module { items: arena.alloc_slice(items) }
}

fn collect_candidates<'a>(module: &Module<'a>, size_bound: u32) -> HashMap<Symbol, &'a FnDef<'a>> {
    let mut out = HashMap::new();
    for item in module.items {
        if let ItemKind::Fn(def) = &item.kind {
            if def.generics.is_empty() && !def.is_async {
                if let Some(body) = def.body {
                    if block_node_count(body) <= size_bound && !calls_self(body, def.name) {
                        out.insert(def.name, def);
                    }
                }
            }
        }
    }
    out
}

fn calls_self(body: &Block<'_>, name: Symbol) -> bool {
    fn expr_calls(expr: &Expr<'_>, name: Symbol) -> bool {
        match &expr.kind {
            ExprKind::Call { callee, args } => {
                matches!(callee.kind, ExprKind::Path(n) if n == name) || args.iter().any(|a| expr_calls(a, name))
            }
            ExprKind::Binary(_, l, r) => expr_calls(l, name) || expr_calls(r, name),
            ExprKind::Unary(_, e) | ExprKind::Field { base: e, .. } | ExprKind::Cast { expr: e, .. } => expr_calls(e, name),
            ExprKind::If { cond, then_branch, else_branch } => {
                expr_calls(cond, name) || expr_calls(then_branch, name) || else_branch.map(|e| expr_calls(e, name)).unwrap_or(false)
            }
            ExprKind::Block(b) => block_calls(b, name),
            ExprKind::While { cond, body } => expr_calls(cond, name) || block_calls(body, name),
            ExprKind::Loop { body } | ExprKind::For { body, .. } => block_calls(body, name),
            ExprKind::Match { scrutinee, arms } => expr_calls(scrutinee, name) || arms.iter().any(|a| expr_calls(a.body, name)),
            _ => false,
        }
    }
    fn block_calls(block: &Block<'_>, name: Symbol) -> bool {
        block.stmts.iter().any(|s| match &s.kind {
            StmtKind::Let { init: Some(e), .. } => expr_calls(e, name),
            StmtKind::Expr(e) => expr_calls(e, name),
            _ => false,
        }) || block.tail.map(|t| expr_calls(t, name)).unwrap_or(false)
    }
    block_calls(body, name)
}

fn block_node_count(block: &Block<'_>) -> u32 {
    let mut n = block.stmts.len() as u32;
    for s in block.stmts {
        if let StmtKind::Let { init: Some(e), .. } | StmtKind::Expr(e) = &s.kind {
            n += expr_node_count(e);
        }
    }
    if let Some(t) = block.tail {
        n += expr_node_count(t);
    }
    n
}

fn expr_node_count(expr: &Expr<'_>) -> u32 {
    1 + match &expr.kind {
        ExprKind::Unary(_, e) | ExprKind::Field { base: e, .. } | ExprKind::Cast { expr: e, .. } => expr_node_count(e),
        ExprKind::Binary(_, l, r) | ExprKind::Index { base: l, index: r } => expr_node_count(l) + expr_node_count(r),
        ExprKind::Call { callee, args } => expr_node_count(callee) + args.iter().map(expr_node_count).sum::<u32>(),
        ExprKind::Tuple(items) | ExprKind::Array(items) => items.iter().map(expr_node_count).sum(),
        ExprKind::If { cond, then_branch, else_branch } => {
            expr_node_count(cond) + expr_node_count(then_branch) + else_branch.map(expr_node_count).unwrap_or(0)
        }
        ExprKind::Block(b) | ExprKind::While { body: b, .. } | ExprKind::Loop { body: b } | ExprKind::For { body: b, .. } => block_node_count(b),
        ExprKind::Match { scrutinee, arms } => expr_node_count(scrutinee) + arms.iter().map(|a| expr_node_count(a.body)).sum::<u32>(),
        _ => 0,
    }
}

fn inline_item<'a>(item: &Item<'a>, candidates: &HashMap<Symbol, &'a FnDef<'a>>, arena: &'a Arena, stats: &mut PassStats) -> Item<'a> {
    match &item.kind {
        ItemKind::Fn(def) => Item { kind: ItemKind::Fn(inline_fn(def, candidates, arena, stats)), attrs: item.attrs, span: item.span },
        ItemKind::Impl(def) => {
            let methods: Vec<FnDef<'a>> = def.methods.iter().map(|m| inline_fn(m, candidates, arena, stats)).collect();
            Item {
                kind: ItemKind::Impl(ImplDef { trait_name: def.trait_name, target: def.target.clone(), methods: arena.alloc_slice(methods), span: def.span }),
                attrs: item.attrs,
                span: item.span,
            }
        }
        _ => item.clone(),
    }
}

fn inline_fn<'a>(def: &FnDef<'a>, candidates: &HashMap<Symbol, &'a FnDef<'a>>, arena: &'a Arena, stats: &mut PassStats) -> FnDef<'a> {
    let body = def.body.map(|b| inline_block(b, def.name, candidates, arena, stats));
    FnDef {
        name: def.name,
        generics: def.generics,
        params: def.params,
        ret: def.ret.clone(),
        body,
        is_async: def.is_async,
        is_pub: def.is_pub,
        doc: def.doc,
        span: def.span,
    }
}

fn inline_block<'a>(
    block: &'a Block<'a>,
    self_name: Symbol,
    candidates: &HashMap<Symbol, &'a FnDef<'a>>,
    arena: &'a Arena,
    stats: &mut PassStats,
) -> &'a Block<'a> {
    let stmts: Vec<Stmt<'a>> = block
        .stmts
        .iter()
        .map(|s| match &s.kind {
            StmtKind::Let { pattern, ty, init } => Stmt {
                kind: StmtKind::Let { pattern: pattern.clone(), ty: ty.clone(), init: init.map(|e| inline_expr(e, self_name, candidates, arena, stats)) },
                span: s.span,
            },
            StmtKind::Expr(e) => Stmt { kind: StmtKind::Expr(inline_expr(e, self_name, candidates, arena, stats)), span: s.span },
            StmtKind::Item(_) => s.clone(),
        })
        .collect();
    let tail = block.tail.map(|t| inline_expr(t, self_name, candidates, arena, stats));
    arena.alloc(Block { stmts: arena.alloc_slice(stmts), tail, span: block.span })
}

fn inline_expr<'a>(
    expr: &'a Expr<'a>,
    self_name: Symbol,
    candidates: &HashMap<Symbol, &'a FnDef<'a>>,
    arena: &'a Arena,
    stats: &mut PassStats,
) -> &'a Expr<'a> {
    match &expr.kind {
        ExprKind::Call { callee, args } => {
            let args: Vec<&'a Expr<'a>> = args.iter().map(|a| inline_expr(a, self_name, candidates, arena, stats)).collect();
            if let ExprKind::Path(name) = callee.kind {
                if name != self_name {
                    if let Some(def) = candidates.get(&name) {
                        if def.params.len() == args.len() {
                            stats.inlined_calls += 1;
                            return build_inline_site(def, &args, expr.span, arena);
                        }
                    }
                }
            }
            let args: Vec<Expr<'a>> = args.into_iter().cloned().collect();
            arena.alloc(Expr { kind: ExprKind::Call { callee, args: arena.alloc_slice(args) }, span: expr.span })
        }
        ExprKind::Unary(op, e) => arena.alloc(Expr { kind: ExprKind::Unary(*op, inline_expr(e, self_name, candidates, arena, stats)), span: expr.span }),
        ExprKind::Binary(op, l, r) => arena.alloc(Expr {
            kind: ExprKind::Binary(*op, inline_expr(l, self_name, candidates, arena, stats), inline_expr(r, self_name, candidates, arena, stats)),
            span: expr.span,
        }),
        ExprKind::If { cond, then_branch, else_branch } => arena.alloc(Expr {
            kind: ExprKind::If {
                cond: inline_expr(cond, self_name, candidates, arena, stats),
                then_branch: inline_expr(then_branch, self_name, candidates, arena, stats),
                else_branch: else_branch.map(|e| inline_expr(e, self_name, candidates, arena, stats)),
            },
            span: expr.span,
        }),
        ExprKind::Match { scrutinee, arms } => {
            let arms: Vec<MatchArm<'a>> = arms
                .iter()
                .map(|a| MatchArm { pattern: a.pattern.clone(), guard: a.guard, body: inline_expr(a.body, self_name, candidates, arena, stats) })
                .collect();
            arena.alloc(Expr {
                kind: ExprKind::Match { scrutinee: inline_expr(scrutinee, self_name, candidates, arena, stats), arms: arena.alloc_slice(arms) },
                span: expr.span,
            })
        }
        ExprKind::Block(b) => arena.alloc(Expr { kind: ExprKind::Block(inline_block(b, self_name, candidates, arena, stats)), span: expr.span }),
        ExprKind::While { cond, body } => arena.alloc(Expr {
            kind: ExprKind::While { cond: inline_expr(cond, self_name, candidates, arena, stats), body: inline_block(body, self_name, candidates, arena, stats) },
            span: expr.span,
        }),
        ExprKind::Loop { body } => arena.alloc(Expr { kind: ExprKind::Loop { body: inline_block(body, self_name, candidates, arena, stats) }, span: expr.span }),
        ExprKind::For { pattern, iter, body } => arena.alloc(Expr {
            kind: ExprKind::For {
                pattern: pattern.clone(),
                iter: inline_expr(iter, self_name, candidates, arena, stats),
                body: inline_block(body, self_name, candidates, arena, stats),
            },
            span: expr.span,
        }),
        _ => expr,
    }
}

/// Builds the nested block a call site is rewritten to: one `let` per
/// parameter bound to its (already-inlined) argument, then the callee
/// body's statements and tail spliced in unchanged.
fn build_inline_site<'a>(def: &FnDef<'a>, args: &[&'a Expr<'a>], span: home_base::Span, arena: &'a Arena) -> &'a Expr<'a> {
    let mut stmts: Vec<Stmt<'a>> = Vec::with_capacity(def.params.len() + def.body.map(|b| b.stmts.len()).unwrap_or(0));
    for (param, arg) in def.params.iter().zip(args.iter()) {
        stmts.push(Stmt {
            kind: StmtKind::Let { pattern: Pattern::Binding { name: param.name, mutable: false }, ty: Some(param.ty.clone()), init: Some(*arg) },
            span: param.span,
        });
    }
    let mut tail = None;
    if let Some(body) = def.body {
        stmts.extend(body.stmts.iter().cloned());
        tail = body.tail;
    }
    let block = arena.alloc(Block { stmts: arena.alloc_slice(stmts), tail, span });
    arena.alloc(Expr { kind: ExprKind::Block(block), span })
}

/// `Module` doesn't implement `Clone` over its arena-borrowed item slice,
/// so when inlining is disabled (`size_bound == 0`) this trivially copies
/// the slice reference rather than rebuilding identical items.
trait ShallowModuleClone<'a> {
    fn clone_shallow(&self) -> Module<'a>;
}

impl<'a> ShallowModuleClone<'a> for Module<'a> {
    fn clone_shallow(&self) -> Module<'a> {
        Module { items: self.items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use home_base::Interner;
    use home_lexer::Lexer;
    use home_parser::Parser;

    fn inline_source(src: &str, bound: u32) -> (String, PassStats) {
        let mut strings = Interner::new();
        let (tokens, _) = Lexer::new(src, &mut strings).tokenize();
        let arena = Arena::new();
        let (module, _) = Parser::new(tokens, &arena, &mut strings).parse_module();
        let mut stats = PassStats::new();
        let inlined = inline_module(&module, &arena, bound, &mut stats);
        (format!("{inlined:?}"), stats)
    }

    #[test]
    fn inlines_a_small_function() {
        let (_, stats) = inline_source("fn add1(x: i32) -> i32 { x + 1 } fn main() -> i32 { return add1(41); }", 8);
        assert_eq!(stats.inlined_calls, 1);
    }

    #[test]
    fn does_not_inline_a_recursive_function() {
        let (_, stats) = inline_source("fn fact(n: i32) -> i32 { fact(n - 1) } fn main() -> i32 { return fact(5); }", 64);
        assert_eq!(stats.inlined_calls, 0);
    }

    #[test]
    fn zero_bound_inlines_nothing() {
        let (_, stats) = inline_source("fn add1(x: i32) -> i32 { x + 1 } fn main() -> i32 { return add1(41); }", 0);
        assert_eq!(stats.inlined_calls, 0);
    }
}
