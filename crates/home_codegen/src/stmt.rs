//! Statement lowering, the other half of the
//! `codegen::{expr, stmt}` split — `lower_stmt` covers
//! `let`/assignment/loop forms, delegating every value-producing
//! sub-expression back to [`crate::expr::lower_expr`].

use home_parser::ast::{Expr, ExprKind, Pattern, Stmt, StmtKind};
use home_types::checker::key_of;
use home_types::ty::TypeShape;

use crate::context::FunctionContext;
use crate::emit::{Condition, Reg};
use crate::error::CodegenError;
use crate::expr::{bind_tuple_elements, lower_expr};

pub fn lower_stmt(ctx: &mut FunctionContext<'_>, stmt: &Stmt<'_>) -> Result<(), CodegenError> {
    match &stmt.kind {
        StmtKind::Let { pattern: Pattern::Binding { name, .. }, init: Some(init), .. } => {
            lower_expr(ctx, init)?;
            let src = ctx.result_reg();
            let disp = ctx.local_offset(*name).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{name:?}") })?;
            let init_ty = crate::types::expr_type(ctx.typed, key_of(init));
            if crate::types::is_aggregate(&ctx.typed.interner, init_ty) {
                let size = crate::expr::aggregate_size(ctx, init_ty);
                crate::expr::copy_aggregate(ctx, Reg::Rbp, disp, src, 0, size);
            } else {
                ctx.encoder.mov_mem_reg(Reg::Rbp, disp, src);
            }
            Ok(())
        }
        StmtKind::Let { init: None, .. } | StmtKind::Let { pattern: Pattern::Wildcard, .. } => Ok(()),
        StmtKind::Let { pattern: Pattern::Tuple(pats), init: Some(init), .. } => {
            lower_expr(ctx, init)?;
            let src = ctx.result_reg();
            ctx.encoder.mov_reg_reg(Reg::R12, src);
            let init_ty = crate::types::expr_type(ctx.typed, key_of(init));
            let TypeShape::Tuple(elem_tys) = ctx.typed.interner.shape(init_ty) else {
                return Err(CodegenError::UnsupportedOp { op: "destructuring let over a non-tuple initializer".into() });
            };
            let elem_tys = elem_tys.clone();
            bind_tuple_elements(ctx, pats, &elem_tys, Reg::R12, 0)
        }
        StmtKind::Let { .. } => Err(CodegenError::UnsupportedOp { op: "destructuring let".into() }),
        StmtKind::Expr(e) => lower_stmt_expr(ctx, e),
        StmtKind::Item(_) => Ok(()),
    }
}

fn lower_stmt_expr(ctx: &mut FunctionContext<'_>, expr: &Expr<'_>) -> Result<(), CodegenError> {
    match &expr.kind {
        ExprKind::Assign(lhs, rhs) => lower_assign(ctx, lhs, rhs),
        ExprKind::While { cond, body } => lower_while(ctx, cond, body),
        ExprKind::Loop { body } => lower_loop(ctx, body),
        ExprKind::For { pattern, iter, body } => lower_for(ctx, pattern, iter, body),
        ExprKind::Break(value) => lower_break(ctx, value.as_deref()),
        ExprKind::Continue => lower_continue(ctx),
        _ => {
            lower_expr(ctx, expr)?;
            Ok(())
        }
    }
}

fn lower_assign(ctx: &mut FunctionContext<'_>, lhs: &Expr<'_>, rhs: &Expr<'_>) -> Result<(), CodegenError> {
    lower_expr(ctx, rhs)?;
    let src = ctx.result_reg();
    match &lhs.kind {
        ExprKind::Path(name) => {
            let disp = ctx.local_offset(*name).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{name:?}") })?;
            ctx.encoder.mov_mem_reg(Reg::Rbp, disp, src);
            Ok(())
        }
        ExprKind::Field { base, field } => {
            ctx.push_depth();
            lower_expr(ctx, base)?;
            let base_ty = ctx.typed.expr_types.get(&home_types::checker::key_of(*base)).copied();
            ctx.pop_depth();
            let base_reg = ctx.result_reg();
            let Some(base_ty) = base_ty else {
                return Err(CodegenError::UnresolvedType { name: "<field base>".into() });
            };
            let home_types::ty::TypeShape::Generic(struct_name, _) = ctx.typed.interner.shape(base_ty) else {
                return Err(CodegenError::UnresolvedType { name: "<non-struct field base>".into() });
            };
            let layout = ctx.layouts.structs.get(struct_name).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{struct_name:?}") })?;
            let field_layout = layout.fields.iter().find(|f| f.name == *field).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{field:?}") })?;
            ctx.encoder.mov_mem_reg(base_reg, field_layout.offset as i32, src);
            Ok(())
        }
        _ => Err(CodegenError::UnsupportedOp { op: "assignment to a non-place expression".into() }),
    }
}

/// `break`/`continue` jump to the innermost enclosing loop's patch lists
/// rather than emitting a resolved jump directly, since that loop's own
/// lowering is still in the middle of emitting its body and doesn't yet
/// know its own exit/continue addresses. A break's value expression (if
/// any) is still lowered for its side effects, though nothing in this
/// pipeline currently threads a loop-as-expression's value out of it.
pub(crate) fn lower_break(ctx: &mut FunctionContext<'_>, value: Option<&Expr<'_>>) -> Result<(), CodegenError> {
    if let Some(v) = value {
        lower_expr(ctx, v)?;
    }
    let patch = ctx.encoder.jmp_rel32();
    ctx.current_loop_mut().ok_or_else(|| CodegenError::UnsupportedOp { op: "break outside a loop".into() })?.break_patches.push(patch);
    Ok(())
}

pub(crate) fn lower_continue(ctx: &mut FunctionContext<'_>) -> Result<(), CodegenError> {
    let patch = ctx.encoder.jmp_rel32();
    ctx.current_loop_mut().ok_or_else(|| CodegenError::UnsupportedOp { op: "continue outside a loop".into() })?.continue_patches.push(patch);
    Ok(())
}

fn lower_while(ctx: &mut FunctionContext<'_>, cond: &Expr<'_>, body: &home_parser::ast::Block<'_>) -> Result<(), CodegenError> {
    let loop_start = ctx.encoder.len();
    lower_expr(ctx, cond)?;
    let cond_reg = ctx.result_reg();
    ctx.encoder.mov_reg_imm32(Reg::R11, 0);
    ctx.encoder.cmp_reg_reg(cond_reg, Reg::R11);
    let exit_patch = ctx.encoder.jcc_rel32(Condition::Equal);

    ctx.push_loop();
    for stmt in body.stmts {
        lower_stmt(ctx, stmt)?;
    }
    let labels = ctx.pop_loop();
    let back_patch = ctx.encoder.jmp_rel32();
    ctx.encoder.patch_rel32(back_patch, loop_start);

    let exit = ctx.encoder.len();
    ctx.encoder.patch_rel32(exit_patch, exit);
    for p in labels.continue_patches {
        ctx.encoder.patch_rel32(p, loop_start);
    }
    for p in labels.break_patches {
        ctx.encoder.patch_rel32(p, exit);
    }
    Ok(())
}

fn lower_loop(ctx: &mut FunctionContext<'_>, body: &home_parser::ast::Block<'_>) -> Result<(), CodegenError> {
    let loop_start = ctx.encoder.len();
    ctx.push_loop();
    for stmt in body.stmts {
        lower_stmt(ctx, stmt)?;
    }
    let labels = ctx.pop_loop();
    let back_patch = ctx.encoder.jmp_rel32();
    ctx.encoder.patch_rel32(back_patch, loop_start);

    let exit = ctx.encoder.len();
    for p in labels.continue_patches {
        ctx.encoder.patch_rel32(p, loop_start);
    }
    for p in labels.break_patches {
        ctx.encoder.patch_rel32(p, exit);
    }
    Ok(())
}

/// `for x in start..end { body }`: `home-types` only accepts a `Range` as
/// a `for`'s iterator (see `infer_expr`'s `ExprKind::Range` arm), so this
/// lowers straight to a counting loop over `x` rather than a general
/// iterator-protocol dispatch — `x`'s slot was reserved by
/// `crate::frame::place_block_locals`'s `for`-pattern case, exactly like a
/// `while`'s condition check re-evaluated every iteration, but comparing
/// the loop variable against the range's end instead of a user expression.
fn lower_for(ctx: &mut FunctionContext<'_>, pattern: &Pattern<'_>, iter: &Expr<'_>, body: &home_parser::ast::Block<'_>) -> Result<(), CodegenError> {
    let Pattern::Binding { name, .. } = pattern else {
        return Err(CodegenError::UnsupportedOp { op: "destructuring `for` pattern".into() });
    };
    let ExprKind::Range { start, end, inclusive } = &iter.kind else {
        return Err(CodegenError::UnsupportedOp { op: "`for` over a non-range iterator".into() });
    };
    let var_disp = ctx.local_offset(*name).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{name:?}") })?;

    match start {
        Some(s) => lower_expr(ctx, s)?,
        None => ctx.encoder.mov_reg_imm32(ctx.result_reg(), 0),
    }
    ctx.encoder.mov_mem_reg(Reg::Rbp, var_disp, ctx.result_reg());

    let loop_start = ctx.encoder.len();
    if let Some(e) = end {
        // Mirrors `lower_binary`'s two-operand evaluation order: the
        // range's end bound may itself be an arbitrary expression (a call,
        // a nested `if`), so it's evaluated through the same
        // `push_depth`/`pop_depth`-guarded scratch register the binary-op
        // lowering uses rather than a fixed temp that a nested lowering
        // could clobber.
        ctx.encoder.mov_reg_mem(ctx.result_reg(), Reg::Rbp, var_disp);
        let var_reg = ctx.result_reg();
        ctx.push_depth();
        lower_expr(ctx, e)?;
        let end_reg = ctx.result_reg();
        ctx.pop_depth();
        ctx.encoder.cmp_reg_reg(var_reg, end_reg);
        let cond = if *inclusive { Condition::Greater } else { Condition::GreaterEqual };
        let exit_patch = ctx.encoder.jcc_rel32(cond);

        ctx.push_loop();
        for stmt in body.stmts {
            lower_stmt(ctx, stmt)?;
        }
        let labels = ctx.pop_loop();
        // `continue` resumes here: the increment step, not `loop_start`,
        // since `loop_start` only re-checks the exit condition and skipping
        // the increment would spin forever on the same value.
        let increment = ctx.encoder.len();
        ctx.encoder.mov_reg_mem(Reg::R11, Reg::Rbp, var_disp);
        ctx.encoder.mov_reg_imm32(Reg::R9, 1);
        ctx.encoder.add_reg_reg(Reg::R11, Reg::R9);
        ctx.encoder.mov_mem_reg(Reg::Rbp, var_disp, Reg::R11);
        let back_patch = ctx.encoder.jmp_rel32();
        ctx.encoder.patch_rel32(back_patch, loop_start);

        let exit = ctx.encoder.len();
        ctx.encoder.patch_rel32(exit_patch, exit);
        for p in labels.continue_patches {
            ctx.encoder.patch_rel32(p, increment);
        }
        for p in labels.break_patches {
            ctx.encoder.patch_rel32(p, exit);
        }
    } else {
        // An unbounded range (`start..`) — no exit test, same as `loop`.
        ctx.push_loop();
        for stmt in body.stmts {
            lower_stmt(ctx, stmt)?;
        }
        let labels = ctx.pop_loop();
        let increment = ctx.encoder.len();
        ctx.encoder.mov_reg_mem(Reg::R11, Reg::Rbp, var_disp);
        ctx.encoder.mov_reg_imm32(Reg::R9, 1);
        ctx.encoder.add_reg_reg(Reg::R11, Reg::R9);
        ctx.encoder.mov_mem_reg(Reg::Rbp, var_disp, Reg::R11);
        let back_patch = ctx.encoder.jmp_rel32();
        ctx.encoder.patch_rel32(back_patch, loop_start);

        let exit = ctx.encoder.len();
        for p in labels.continue_patches {
            ctx.encoder.patch_rel32(p, increment);
        }
        for p in labels.break_patches {
            ctx.encoder.patch_rel32(p, exit);
        }
    }
    Ok(())
}
