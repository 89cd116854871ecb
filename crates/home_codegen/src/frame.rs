//! Stack frame layout: every local binding in a
//! function gets a slot at `[rbp - k]`, arrays laid out as consecutive
//! descending slots with the recorded offset pointing at element 0, and
//! the whole frame rounded up to 16 bytes for the System V AMD64 call
//! convention.

use std::collections::HashMap;

use home_base::Symbol;
use home_parser::ast::{Block, Expr, ExprKind, FnDef, Item, ItemKind, Pattern, Stmt, StmtKind};
use home_types::checker::{key_of, NodeKey};
use home_types::ty::{TypeId, TypeInterner, TypeShape};
use home_types::TypedAst;

use crate::error::CodegenError;
use crate::layout::LayoutTable;

#[derive(Debug, Clone)]
pub struct LocalInfo {
    pub stack_offset: u32,
    pub declared_type: TypeId,
    pub size_bytes: u32,
    pub alignment: u32,
}

#[derive(Debug, Default)]
pub struct FrameLayout {
    pub locals: HashMap<Symbol, LocalInfo>,
    /// Anonymous slots for aggregate-valued expressions with no named
    /// binding (struct/array literals, enum-variant constructions, calls to
    /// aggregate-returning functions), keyed by the expression's `NodeKey`.
    pub temps: HashMap<NodeKey, LocalInfo>,
    /// Slot holding the hidden destination pointer a caller passes in
    /// `rdi`, present only when this function's own return type is an
    /// aggregate (the sret calling convention).
    pub ret_ptr_offset: Option<u32>,
    pub frame_size: u32,
}

/// Builds one `FrameLayout` per function in `typed`, keyed by the
/// function's own `NodeKey` address so overloaded/shadowed names in
/// different functions never collide.
pub fn build_frames(items: &[Item<'_>], typed: &TypedAst, layouts: &LayoutTable) -> Result<HashMap<usize, FrameLayout>, CodegenError> {
    let mut out = HashMap::new();
    collect_frames(items, typed, layouts, &mut out)?;
    Ok(out)
}

fn collect_frames(items: &[Item<'_>], typed: &TypedAst, layouts: &LayoutTable, out: &mut HashMap<usize, FrameLayout>) -> Result<(), CodegenError> {
    for item in items {
        match &item.kind {
            ItemKind::Fn(def) => {
                out.insert(key_of(def), build_frame(def, typed, layouts)?);
            }
            ItemKind::Impl(impl_def) => {
                for method in impl_def.methods {
                    out.insert(key_of(method), build_frame(method, typed, layouts)?);
                }
            }
            ItemKind::Mod { items, .. } => collect_frames(items, typed, layouts, out)?,
            _ => {}
        }
    }
    Ok(())
}

fn build_frame(def: &FnDef<'_>, typed: &TypedAst, layouts: &LayoutTable) -> Result<FrameLayout, CodegenError> {
    let mut frame = FrameLayout::default();
    let mut cursor: u32 = 0;

    let ret_is_aggregate = typed
        .functions
        .get(&def.name)
        .map(|shape| crate::types::is_aggregate(&typed.interner, shape.ret))
        .unwrap_or(false);
    if ret_is_aggregate {
        cursor = align_up(cursor + 8, 8);
        frame.ret_ptr_offset = Some(cursor);
    }

    for param in def.params {
        if param.name == Symbol::EMPTY {
            continue;
        }
        let ty = typed.functions.get(&def.name).and_then(|shape| shape.params.get(param_index(def, param.name))).copied().unwrap_or(typed.interner.unknown());
        place_local(param.name, ty, &typed.interner, layouts, &mut cursor, &mut frame)?;
    }
    if let Some(body) = def.body {
        place_block_locals(body, typed, layouts, &mut cursor, &mut frame)?;
        collect_temps_block(body, typed, layouts, &mut cursor, &mut frame)?;
    }

    frame.frame_size = align_up(cursor, 16);
    Ok(frame)
}

fn param_index(def: &FnDef<'_>, name: Symbol) -> usize {
    def.params.iter().position(|p| p.name == name).unwrap_or(0)
}

fn place_block_locals(block: &Block<'_>, typed: &TypedAst, layouts: &LayoutTable, cursor: &mut u32, frame: &mut FrameLayout) -> Result<(), CodegenError> {
    for stmt in block.stmts {
        place_stmt_locals(stmt, typed, layouts, cursor, frame)?;
    }
    Ok(())
}

fn place_stmt_locals(stmt: &Stmt<'_>, typed: &TypedAst, layouts: &LayoutTable, cursor: &mut u32, frame: &mut FrameLayout) -> Result<(), CodegenError> {
    if let StmtKind::Let { pattern, init, .. } = &stmt.kind {
        let ty = init.map(|e| typed.expr_types.get(&key_of(e)).copied().unwrap_or(typed.interner.unknown())).unwrap_or(typed.interner.unknown());
        place_pattern_binding(pattern, ty, typed, layouts, cursor, frame)?;
    }
    walk_nested_blocks(stmt, typed, layouts, cursor, frame)
}

/// Scans every nested block reachable from a statement (`if`/`match`/loop
/// bodies) for further `let` bindings — every binding in a function gets
/// its own slot regardless of nesting depth, since Home has no separate
/// per-block stack frames.
fn walk_nested_blocks(stmt: &Stmt<'_>, typed: &TypedAst, layouts: &LayoutTable, cursor: &mut u32, frame: &mut FrameLayout) -> Result<(), CodegenError> {
    fn walk_expr(expr: &Expr<'_>, typed: &TypedAst, layouts: &LayoutTable, cursor: &mut u32, frame: &mut FrameLayout) -> Result<(), CodegenError> {
        match &expr.kind {
            ExprKind::Block(b) => place_block_locals(b, typed, layouts, cursor, frame),
            // The loop variable itself is a named binding just like a `let`,
            // just introduced by the `for` header instead of a `let`
            // statement — `home-types` only ever lets a `for` iterate a
            // `Range`, so its element is always an integer.
            ExprKind::For { pattern: Pattern::Binding { name, .. }, body, .. } => {
                place_local(*name, typed.interner.i64(), &typed.interner, layouts, cursor, frame)?;
                place_block_locals(body, typed, layouts, cursor, frame)
            }
            ExprKind::While { body, .. } | ExprKind::Loop { body } | ExprKind::For { body, .. } => place_block_locals(body, typed, layouts, cursor, frame),
            ExprKind::If { then_branch, else_branch, .. } => {
                walk_expr(then_branch, typed, layouts, cursor, frame)?;
                if let Some(e) = else_branch {
                    walk_expr(e, typed, layouts, cursor, frame)?;
                }
                Ok(())
            }
            ExprKind::Match { arms, .. } => {
                for arm in *arms {
                    walk_expr(arm.body, typed, layouts, cursor, frame)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    match &stmt.kind {
        StmtKind::Let { init: Some(e), .. } => walk_expr(e, typed, layouts, cursor, frame),
        StmtKind::Expr(e) => walk_expr(e, typed, layouts, cursor, frame),
        _ => Ok(()),
    }
}

/// Second pass over a function body: reserves an anonymous slot for every
/// aggregate-valued expression with no named binding, and a named slot for
/// every binding introduced by a `match` arm's pattern (the `let`-binding
/// pass above only ever looks at `StmtKind::Let`, which a pattern's own
/// bindings never go through).
fn collect_temps_block(block: &Block<'_>, typed: &TypedAst, layouts: &LayoutTable, cursor: &mut u32, frame: &mut FrameLayout) -> Result<(), CodegenError> {
    for stmt in block.stmts {
        match &stmt.kind {
            StmtKind::Let { init: Some(e), .. } => collect_temps_expr(e, typed, layouts, cursor, frame)?,
            StmtKind::Expr(e) => collect_temps_expr(e, typed, layouts, cursor, frame)?,
            _ => {}
        }
    }
    if let Some(tail) = block.tail {
        collect_temps_expr(tail, typed, layouts, cursor, frame)?;
    }
    Ok(())
}

fn collect_temps_expr(expr: &Expr<'_>, typed: &TypedAst, layouts: &LayoutTable, cursor: &mut u32, frame: &mut FrameLayout) -> Result<(), CodegenError> {
    match &expr.kind {
        ExprKind::StructLit { fields, .. } => {
            for (_, fexpr) in *fields {
                collect_temps_expr(fexpr, typed, layouts, cursor, frame)?;
            }
            place_temp(expr, typed, layouts, cursor, frame)?;
        }
        ExprKind::Array(elems) => {
            for e in *elems {
                collect_temps_expr(e, typed, layouts, cursor, frame)?;
            }
            place_temp(expr, typed, layouts, cursor, frame)?;
        }
        ExprKind::MethodCall { receiver, args, .. } => {
            collect_temps_expr(receiver, typed, layouts, cursor, frame)?;
            for a in *args {
                collect_temps_expr(a, typed, layouts, cursor, frame)?;
            }
            if is_aggregate_expr(expr, typed) {
                place_temp(expr, typed, layouts, cursor, frame)?;
            }
        }
        ExprKind::Field { base, .. } => {
            collect_temps_expr(base, typed, layouts, cursor, frame)?;
            if is_aggregate_expr(expr, typed) {
                place_temp(expr, typed, layouts, cursor, frame)?;
            }
        }
        ExprKind::Call { callee, args } => {
            collect_temps_expr(callee, typed, layouts, cursor, frame)?;
            for a in *args {
                collect_temps_expr(a, typed, layouts, cursor, frame)?;
            }
            if is_aggregate_expr(expr, typed) {
                place_temp(expr, typed, layouts, cursor, frame)?;
            }
        }
        ExprKind::Index { base, index } => {
            collect_temps_expr(base, typed, layouts, cursor, frame)?;
            collect_temps_expr(index, typed, layouts, cursor, frame)?;
        }
        ExprKind::Binary(_, lhs, rhs) | ExprKind::Assign(lhs, rhs) => {
            collect_temps_expr(lhs, typed, layouts, cursor, frame)?;
            collect_temps_expr(rhs, typed, layouts, cursor, frame)?;
        }
        ExprKind::Unary(_, inner) | ExprKind::Try(inner) | ExprKind::Cast { expr: inner, .. } | ExprKind::Comptime(inner) | ExprKind::Await(inner) => {
            collect_temps_expr(inner, typed, layouts, cursor, frame)?;
        }
        ExprKind::Tuple(elems) => {
            for e in *elems {
                collect_temps_expr(e, typed, layouts, cursor, frame)?;
            }
        }
        ExprKind::Block(b) => collect_temps_block(b, typed, layouts, cursor, frame)?,
        ExprKind::If { cond, then_branch, else_branch } => {
            collect_temps_expr(cond, typed, layouts, cursor, frame)?;
            collect_temps_expr(then_branch, typed, layouts, cursor, frame)?;
            if let Some(e) = else_branch {
                collect_temps_expr(e, typed, layouts, cursor, frame)?;
            }
        }
        ExprKind::While { cond, body } => {
            collect_temps_expr(cond, typed, layouts, cursor, frame)?;
            collect_temps_block(body, typed, layouts, cursor, frame)?;
        }
        ExprKind::Loop { body } => collect_temps_block(body, typed, layouts, cursor, frame)?,
        ExprKind::For { iter, body, .. } => {
            collect_temps_expr(iter, typed, layouts, cursor, frame)?;
            collect_temps_block(body, typed, layouts, cursor, frame)?;
        }
        ExprKind::Match { scrutinee, arms } => {
            collect_temps_expr(scrutinee, typed, layouts, cursor, frame)?;
            let scrutinee_ty = typed.expr_types.get(&key_of(*scrutinee)).copied().unwrap_or_else(|| typed.interner.unknown());
            for arm in *arms {
                place_pattern_binding(&arm.pattern, scrutinee_ty, typed, layouts, cursor, frame)?;
                if let Some(guard) = arm.guard {
                    collect_temps_expr(guard, typed, layouts, cursor, frame)?;
                }
                collect_temps_expr(arm.body, typed, layouts, cursor, frame)?;
            }
        }
        ExprKind::Return(Some(v)) | ExprKind::Break(Some(v)) => collect_temps_expr(v, typed, layouts, cursor, frame)?,
        _ => {}
    }
    Ok(())
}

/// Places the pattern's own bindings as named locals against a value of
/// type `ty` — for structural patterns (`EnumVariant`/`Struct`/`Tuple`)
/// `ty` is ignored in favor of the pattern's own declared path, exactly
/// the way `home_types::checker::bind_pattern` resolves field types.
fn place_pattern_binding(pattern: &Pattern<'_>, ty: TypeId, typed: &TypedAst, layouts: &LayoutTable, cursor: &mut u32, frame: &mut FrameLayout) -> Result<(), CodegenError> {
    match pattern {
        Pattern::Binding { name, .. } => place_local(*name, ty, &typed.interner, layouts, cursor, frame),
        _ => place_pattern_locals(pattern, ty, typed, layouts, cursor, frame),
    }
}

/// Places every binding a structural (non-leaf) pattern introduces. `ty`
/// is the type the pattern is matched against — ignored by
/// `EnumVariant`/`Struct` (they resolve field types off their own declared
/// path instead, the same way `home_types::checker::bind_pattern` does),
/// but required by `Tuple`/`Or` to recurse into each element's own type,
/// since a tuple's elements carry no path of their own to look up.
fn place_pattern_locals(pattern: &Pattern<'_>, ty: TypeId, typed: &TypedAst, layouts: &LayoutTable, cursor: &mut u32, frame: &mut FrameLayout) -> Result<(), CodegenError> {
    match pattern {
        Pattern::EnumVariant { path, variant, fields } => {
            if let Some(shape) = typed.enums.get(path) {
                if let Some((_, field_tys)) = shape.variants.iter().find(|(n, _)| n == variant) {
                    let field_tys = field_tys.clone();
                    for (p, fty) in fields.iter().zip(field_tys.iter()) {
                        place_pattern_binding(p, *fty, typed, layouts, cursor, frame)?;
                    }
                }
            }
            Ok(())
        }
        Pattern::Struct { path, fields } => {
            if let Some(shape) = typed.structs.get(path) {
                let shape = shape.clone();
                for (fname, fpat) in *fields {
                    if let Some((_, fty)) = shape.fields.iter().find(|(n, _)| n == fname) {
                        place_pattern_binding(fpat, *fty, typed, layouts, cursor, frame)?;
                    }
                }
            }
            Ok(())
        }
        Pattern::Tuple(pats) => {
            if let TypeShape::Tuple(elem_tys) = typed.interner.shape(ty) {
                let elem_tys = elem_tys.clone();
                for (p, ety) in pats.iter().zip(elem_tys.iter()) {
                    place_pattern_binding(p, *ety, typed, layouts, cursor, frame)?;
                }
            }
            Ok(())
        }
        Pattern::Or(pats) => {
            for p in *pats {
                place_pattern_locals(p, ty, typed, layouts, cursor, frame)?;
            }
            Ok(())
        }
        Pattern::Binding { .. } | Pattern::Wildcard | Pattern::Literal(_) => Ok(()),
    }
}

fn is_aggregate_expr(expr: &Expr<'_>, typed: &TypedAst) -> bool {
    let ty = typed.expr_types.get(&key_of(expr)).copied().unwrap_or_else(|| typed.interner.unknown());
    crate::types::is_aggregate(&typed.interner, ty)
}

fn place_temp(expr: &Expr<'_>, typed: &TypedAst, layouts: &LayoutTable, cursor: &mut u32, frame: &mut FrameLayout) -> Result<(), CodegenError> {
    let ty = typed.expr_types.get(&key_of(expr)).copied().unwrap_or_else(|| typed.interner.unknown());
    let (size, align) = size_align_of(ty, &typed.interner, layouts)?;
    *cursor = align_up(*cursor + size, align);
    frame.temps.insert(key_of(expr), LocalInfo { stack_offset: *cursor, declared_type: ty, size_bytes: size, alignment: align });
    Ok(())
}

fn place_local(name: Symbol, ty: TypeId, interner: &TypeInterner, layouts: &LayoutTable, cursor: &mut u32, frame: &mut FrameLayout) -> Result<(), CodegenError> {
    let (size, align) = size_align_of(ty, interner, layouts)?;
    *cursor = align_up(*cursor + size, align);
    frame.locals.insert(name, LocalInfo { stack_offset: *cursor, declared_type: ty, size_bytes: size, alignment: align });
    Ok(())
}

fn size_align_of(ty: TypeId, interner: &TypeInterner, layouts: &LayoutTable) -> Result<(u32, u32), CodegenError> {
    if let Some(size) = interner.size_of_primitive(ty) {
        return Ok((size, size.max(1)));
    }
    use home_types::ty::TypeShape;
    match interner.shape(ty) {
        TypeShape::Generic(name, _) => {
            if let Some(s) = layouts.structs.get(name) {
                Ok((s.total_size, s.alignment))
            } else if let Some(e) = layouts.enums.get(name) {
                Ok((e.total_size, e.tag_size))
            } else {
                Err(CodegenError::UnresolvedType { name: format!("{name:?}") })
            }
        }
        TypeShape::Array(elem, len) => {
            let (elem_size, elem_align) = size_align_of(*elem, interner, layouts)?;
            Ok(((elem_size as u64 * len) as u32, elem_align))
        }
        TypeShape::Tuple(elems) => {
            let mut offset = 0u32;
            let mut alignment = 1u32;
            for elem in elems {
                let (size, align) = size_align_of(*elem, interner, layouts)?;
                offset = align_up(offset + size, align);
                alignment = alignment.max(align);
            }
            Ok((offset, alignment))
        }
        _ => Ok((8, 8)),
    }
}

fn align_up(offset: u32, align: u32) -> u32 {
    if align == 0 {
        return offset;
    }
    (offset + align - 1) / align * align
}
