//! The type checker: `check(module) -> TypedAst`.
//!
//! Owns one `TypeChecker` session per compilation unit — there is no
//! process-global trait registry or type environment.
//! Diagnostics are pushed into the caller's `DiagnosticBag` rather than
//! returned eagerly, matching the best-effort style of `home-parser`.

use crate::generics::{GenericEnv, MonoTable};
use crate::infer::{InferType, UnificationTable};
use crate::symbol::{DefId, SymbolInfo, SymbolKind, SymbolTable, Visibility};
use crate::trait_table::TraitTable;
use crate::ty::{primitive_name, BorrowKind, TypeId, TypeInterner, TypeShape};
use home_base::{Interner, Span, Symbol};
use home_diag::{Diagnostic, DiagnosticBag};
use home_parser::ast::*;
use std::collections::HashMap;

/// Stable key for an AST node: the arena guarantees the reference's address
/// is valid for the lifetime of the compilation unit, so the address
/// itself is a fine dense key for the side-table of resolved types — this
/// avoids threading a second, parallel typed-tree shape through every pass.
pub type NodeKey = usize;

pub fn key_of<T>(node: &T) -> NodeKey {
    node as *const T as usize
}

/// The output of a successful check: per-expression resolved types plus
/// the struct/enum layouts and function signatures later passes need.
#[derive(Default)]
pub struct TypedAst {
    pub expr_types: HashMap<NodeKey, TypeId>,
    pub structs: HashMap<Symbol, StructShape>,
    pub enums: HashMap<Symbol, EnumShape>,
    pub functions: HashMap<Symbol, FnShape>,
    pub mono: MonoTable,
    /// The ground-type interner this module was checked against. Kept
    /// alongside the typed artifacts (rather than dropped with the
    /// `TypeChecker` session) so later passes — the borrow checker's
    /// `Copy` queries, codegen's layout computation — can resolve a
    /// `TypeId` without re-running inference.
    pub interner: TypeInterner,
}

#[derive(Debug, Clone)]
pub struct StructShape {
    pub fields: Vec<(Symbol, TypeId)>,
}

#[derive(Debug, Clone)]
pub struct EnumShape {
    pub variants: Vec<(Symbol, Vec<TypeId>)>,
}

#[derive(Debug, Clone)]
pub struct FnShape {
    pub def_id: DefId,
    pub name: Symbol,
    pub params: Vec<TypeId>,
    pub ret: TypeId,
    pub is_comptime_callable: bool,
    /// Declared generic parameters in source order, each with its trait
    /// bounds. Empty for a non-generic function.
    pub generic_params: Vec<(Symbol, Vec<Symbol>)>,
}

pub struct TypeChecker<'a> {
    pub interner: TypeInterner,
    infer: UnificationTable,
    symbols: SymbolTable,
    pub traits: TraitTable,
    generics: GenericEnv,
    strings: &'a mut Interner,
    diagnostics: &'a mut DiagnosticBag,
    result: TypedAst,
    loop_depth: u32,
}

impl<'a> TypeChecker<'a> {
    pub fn new(strings: &'a mut Interner, diagnostics: &'a mut DiagnosticBag) -> Self {
        Self {
            interner: TypeInterner::new(),
            infer: UnificationTable::new(),
            symbols: SymbolTable::new(),
            traits: TraitTable::new(),
            generics: GenericEnv::new(),
            strings,
            diagnostics,
            result: TypedAst::default(),
            loop_depth: 0,
        }
    }

    /// `check(module) -> TypedAST | [Diagnostic]`. Diagnostics
    /// are pushed to the bag given at construction; this returns the
    /// accumulated typed artifacts regardless, so later passes can still
    /// run best-effort over the parts that did check.
    pub fn check_module(mut self, module: &Module<'_>) -> TypedAst {
        self.collect_items(module.items);
        for item in module.items {
            self.check_item(item);
        }
        self.result.interner = self.interner;
        self.result
    }

    // ---- pass 1: signature collection ----

    fn collect_items(&mut self, items: &[Item<'_>]) {
        for item in items {
            match &item.kind {
                ItemKind::Struct(def) => self.collect_struct(def),
                ItemKind::Enum(def) => self.collect_enum(def),
                ItemKind::Fn(def) => self.collect_fn(def),
                ItemKind::Trait(def) => self.collect_trait(def),
                ItemKind::Impl(def) => self.collect_impl(def),
                ItemKind::Mod { items, .. } => self.collect_items(items),
                ItemKind::Const { name, ty, is_pub, .. } => {
                    let const_ty = self.resolve_type_expr(ty);
                    self.symbols.declare(
                        *name,
                        SymbolInfo {
                            kind: SymbolKind::Const,
                            ty: const_ty,
                            visibility: if *is_pub { Visibility::Public } else { Visibility::Private },
                            definition_site: item.span,
                            references: Vec::new(),
                        },
                    );
                }
                ItemKind::Use { .. } => {}
            }
        }
    }

    fn resolve_type_expr(&mut self, ty: &TypeExpr<'_>) -> TypeId {
        match ty {
            TypeExpr::Infer => self.interner.unknown(),
            TypeExpr::Reference { mutable, inner } => {
                let inner_id = self.resolve_type_expr(inner);
                let kind = if *mutable { BorrowKind::Mutable } else { BorrowKind::Shared };
                self.interner.intern(TypeShape::Reference(kind, inner_id))
            }
            TypeExpr::Tuple(elems) => {
                let ids = elems.iter().map(|e| self.resolve_type_expr(e)).collect();
                self.interner.intern(TypeShape::Tuple(ids))
            }
            TypeExpr::Function { params, ret } => {
                let param_ids = params.iter().map(|p| self.resolve_type_expr(p)).collect();
                let ret_id = self.resolve_type_expr(ret);
                self.interner.intern(TypeShape::Function(param_ids, ret_id))
            }
            TypeExpr::Path(name, args) => {
                let resolved = self.strings.resolve(*name);
                if let Some(shape) = primitive_name(resolved) {
                    return self.interner.intern(shape);
                }
                if resolved == "str" || resolved == "String" {
                    return self.interner.intern(TypeShape::Slice(self.interner.intern(TypeShape::Int(crate::ty::IntWidth::U8))));
                }
                let arg_ids: Vec<TypeId> = args.iter().map(|a| self.resolve_type_expr(a)).collect();
                self.interner.intern(TypeShape::Generic(*name, arg_ids))
            }
            TypeExpr::Array { elem, len_text, len_base } => {
                let elem_id = self.resolve_type_expr(elem);
                let len = parse_int_text(self.strings.resolve(*len_text), *len_base).unwrap_or(0) as u64;
                self.interner.intern(TypeShape::Array(elem_id, len))
            }
            TypeExpr::Slice { elem } => {
                let elem_id = self.resolve_type_expr(elem);
                self.interner.intern(TypeShape::Slice(elem_id))
            }
        }
    }

    fn collect_struct(&mut self, def: &StructDef<'_>) {
        let fields = def
            .fields
            .iter()
            .map(|f| (f.name, self.resolve_type_expr(&f.ty)))
            .collect();
        self.result.structs.insert(def.name, StructShape { fields });
    }

    fn collect_enum(&mut self, def: &EnumDef<'_>) {
        let variants = def
            .variants
            .iter()
            .map(|v| (v.name, v.fields.iter().map(|f| self.resolve_type_expr(f)).collect()))
            .collect();
        self.result.enums.insert(def.name, EnumShape { variants });
    }

    fn collect_fn(&mut self, def: &FnDef<'_>) {
        let generic_params: Vec<(Symbol, Vec<Symbol>)> = def
            .generics
            .iter()
            .map(|g| {
                for bound in g.bounds {
                    self.generics.add_bound(g.name, *bound);
                }
                (g.name, g.bounds.to_vec())
            })
            .collect();
        let params: Vec<TypeId> = def.params.iter().map(|p| self.resolve_type_expr(&p.ty)).collect();
        let ret = def.ret.as_ref().map(|t| self.resolve_type_expr(t)).unwrap_or_else(|| self.interner.unit());
        let fn_ty = self.interner.intern(TypeShape::Function(params.clone(), ret));
        let def_id = self.symbols.declare(
            def.name,
            SymbolInfo {
                kind: SymbolKind::Function,
                ty: fn_ty,
                visibility: if def.is_pub { Visibility::Public } else { Visibility::Private },
                definition_site: def.span,
                references: Vec::new(),
            },
        );
        self.result.functions.insert(
            def.name,
            FnShape { def_id, name: def.name, params, ret, is_comptime_callable: has_comptime_attr(def), generic_params },
        );
    }

    fn collect_trait(&mut self, def: &TraitDef<'_>) {
        let required = def
            .methods
            .iter()
            .map(|m| crate::trait_table::MethodSig { name: m.name, has_default: m.body.is_some() })
            .collect();
        self.traits.define_trait(def.name, crate::trait_table::TraitDef { required_methods: required });
    }

    fn collect_impl(&mut self, def: &ImplDef<'_>) {
        let for_type = Some(self.resolve_type_expr(&def.target));
        let mut methods = HashMap::new();
        for m in def.methods {
            methods.insert(m.name, ());
        }
        self.traits.add_impl(crate::trait_table::ImplBlock { trait_name: def.trait_name, for_type, methods });
    }

    // ---- pass 2: bodies ----

    fn check_item(&mut self, item: &Item<'_>) {
        match &item.kind {
            ItemKind::Fn(def) => self.check_fn_body(def),
            ItemKind::Impl(def) => {
                for m in def.methods {
                    self.check_fn_body(m);
                }
            }
            ItemKind::Mod { items, .. } => {
                for it in *items {
                    self.check_item(it);
                }
            }
            ItemKind::Const { ty, value, .. } => self.check_const(ty, value),
            _ => {}
        }
    }

    /// Checks a top-level `const`'s initializer against its declared type
    ///; the value itself is materialized later by
    /// `home-comptime`, not here — this pass only needs the value to be
    /// well-typed, keeping type checking and evaluation as separate concerns.
    fn check_const(&mut self, ty: &TypeExpr<'_>, value: &Expr<'_>) {
        let declared = self.resolve_type_expr(ty);
        let expected = InferType::from_ground(&self.interner, declared);
        let value_ty = self.infer_expr(value, Some(expected.clone()));
        if let Err(err) = self.infer.unify(&expected, &value_ty) {
            self.report_type_error(value.span, err);
        }
    }

    fn check_fn_body(&mut self, def: &FnDef<'_>) {
        let Some(body) = def.body else { return };
        self.symbols.push_scope();
        for param in def.params.iter() {
            if param.name == Symbol::EMPTY {
                continue; // `self`
            }
            let ty = self.resolve_type_expr(&param.ty);
            self.symbols.declare(
                param.name,
                SymbolInfo { kind: SymbolKind::Param, ty, visibility: Visibility::Private, definition_site: param.span, references: vec![] },
            );
        }
        let expected_ret = def.ret.as_ref().map(|t| self.resolve_type_expr(t));
        let body_ty = self.infer_block(body, expected_ret.map(|t| InferType::from_ground(&self.interner, t)));
        if let Some(expected) = expected_ret {
            let expected_infer = InferType::from_ground(&self.interner, expected);
            if let Err(err) = self.infer.unify(&expected_infer, &body_ty) {
                self.report_type_error(body.span, err);
            }
        }
        self.symbols.pop_scope();
    }

    fn report_type_error(&mut self, span: Span, err: crate::error::TypeError) {
        self.diagnostics.push(Diagnostic::error(err.code(), err.to_string(), span, "type-check"));
    }

    fn infer_block(&mut self, block: &Block<'_>, expected: Option<InferType>) -> InferType {
        self.symbols.push_scope();
        for stmt in block.stmts {
            self.infer_stmt(stmt);
        }
        let result = match block.tail {
            Some(tail) => self.infer_expr(tail, expected),
            None => InferType::Unit,
        };
        self.symbols.pop_scope();
        result
    }

    fn infer_stmt(&mut self, stmt: &Stmt<'_>) {
        match &stmt.kind {
            StmtKind::Let { pattern, ty, init } => {
                let expected = ty.as_ref().map(|t| InferType::from_ground(&self.interner, self.resolve_type_expr_const(t)));
                let init_ty = match init {
                    Some(expr) => self.infer_expr(expr, expected.clone()),
                    None => InferType::Unknown,
                };
                let bound_ty = expected.unwrap_or(init_ty);
                self.bind_pattern(pattern, bound_ty, stmt.span);
            }
            StmtKind::Expr(expr) => {
                self.infer_expr(expr, None);
            }
            StmtKind::Item(item) => self.check_item(item),
        }
    }

    /// `resolve_type_expr` takes `&mut self`; this wrapper exists for call
    /// sites that only have a `&self`-shaped borrow checkpoint (pattern
    /// type annotations evaluated alongside an active expression borrow).
    fn resolve_type_expr_const(&mut self, ty: &TypeExpr<'_>) -> TypeId {
        self.resolve_type_expr(ty)
    }

    fn bind_pattern(&mut self, pattern: &Pattern<'_>, ty: InferType, span: Span) {
        match pattern {
            Pattern::Binding { name, .. } => {
                let ground = self.infer.zonk(&mut self.interner, &ty);
                self.symbols.declare(
                    *name,
                    SymbolInfo { kind: SymbolKind::Local, ty: ground, visibility: Visibility::Private, definition_site: span, references: vec![] },
                );
            }
            Pattern::Wildcard => {}
            Pattern::Tuple(pats) => {
                if let InferType::Tuple(elems) = self.infer.resolve(&ty) {
                    for (p, t) in pats.iter().zip(elems) {
                        self.bind_pattern(p, t, span);
                    }
                } else {
                    for p in pats.iter() {
                        self.bind_pattern(p, InferType::Unknown, span);
                    }
                }
            }
            Pattern::EnumVariant { variant, fields, .. } => {
                let field_types = self
                    .result
                    .enums
                    .values()
                    .flat_map(|e| e.variants.iter())
                    .find(|(name, _)| name == variant)
                    .map(|(_, tys)| tys.clone())
                    .unwrap_or_default();
                for (p, t) in fields.iter().zip(field_types) {
                    self.bind_pattern(p, InferType::from_ground(&self.interner, t), span);
                }
            }
            Pattern::Struct { path, fields } => {
                let struct_fields = self.result.structs.get(path).map(|s| s.fields.clone()).unwrap_or_default();
                for (fname, p) in fields.iter() {
                    let fty = struct_fields
                        .iter()
                        .find(|(n, _)| n == fname)
                        .map(|(_, t)| InferType::from_ground(&self.interner, *t))
                        .unwrap_or(InferType::Unknown);
                    self.bind_pattern(p, fty, span);
                }
            }
            Pattern::Or(pats) => {
                for p in pats.iter() {
                    self.bind_pattern(p, ty.clone(), span);
                }
            }
            Pattern::Literal(_) => {}
        }
    }

    fn record(&mut self, expr: &Expr<'_>, ty: &InferType) {
        let ground = self.infer.zonk(&mut self.interner, ty);
        self.result.expr_types.insert(key_of(expr), ground);
    }

    /// Bidirectional `infer(expr, expected?) -> Type`.
    fn infer_expr(&mut self, expr: &Expr<'_>, expected: Option<InferType>) -> InferType {
        let ty = self.infer_expr_kind(expr, expected);
        self.record(expr, &ty);
        ty
    }

    fn infer_expr_kind(&mut self, expr: &Expr<'_>, expected: Option<InferType>) -> InferType {
        match &expr.kind {
            ExprKind::Literal(Literal::Int(text, base, _suffix)) => {
                let _ = parse_int_text(self.strings.resolve(*text), *base);
                match expected {
                    Some(exp @ InferType::Int(_)) => exp,
                    _ => InferType::IntLiteral,
                }
            }
            ExprKind::Literal(Literal::Float(_, _)) => match expected {
                Some(exp @ InferType::Float(_)) => exp,
                _ => InferType::FloatLiteral,
            },
            ExprKind::Literal(Literal::Bool(_)) => InferType::Bool,
            ExprKind::Literal(Literal::Char(_)) => InferType::Int(crate::ty::IntWidth::U8),
            ExprKind::Literal(Literal::Unit) => InferType::Unit,
            ExprKind::Str(_) => str_type(),
            ExprKind::InterpolatedStr(parts) => {
                for part in parts.iter() {
                    if let Some(hole) = part.hole {
                        self.infer_expr(hole, None);
                    }
                }
                str_type()
            }
            ExprKind::Path(name) => self.infer_path(*name, expr.span),
            ExprKind::Unary(op, inner) => self.infer_unary(*op, inner),
            ExprKind::Binary(op, lhs, rhs) => self.infer_binary(*op, lhs, rhs, expr.span),
            ExprKind::Assign(lhs, rhs) => {
                let lhs_ty = self.infer_expr(lhs, None);
                let rhs_ty = self.infer_expr(rhs, Some(lhs_ty.clone()));
                if let Err(err) = self.infer.unify(&lhs_ty, &rhs_ty) {
                    self.report_type_error(expr.span, err);
                }
                InferType::Unit
            }
            ExprKind::Call { callee, args } => self.infer_call(callee, args, expr.span),
            ExprKind::MethodCall { receiver, method, args } => self.infer_method_call(receiver, *method, args, expr.span),
            ExprKind::Field { base, field } => self.infer_field(base, *field, expr.span),
            ExprKind::Index { base, index } => {
                self.infer_expr(index, Some(InferType::IntLiteral));
                match self.infer_expr(base, None) {
                    InferType::Array(elem, _) | InferType::Slice(elem) => *elem,
                    _ => InferType::Unknown,
                }
            }
            ExprKind::Tuple(elems) => InferType::Tuple(elems.iter().map(|e| self.infer_expr(e, None)).collect()),
            ExprKind::Array(elems) => {
                let elem_expected = match &expected {
                    Some(InferType::Array(e, _)) => Some((**e).clone()),
                    _ => None,
                };
                let mut elem_ty = InferType::Unknown;
                for e in elems.iter() {
                    elem_ty = self.infer_expr(e, elem_expected.clone());
                }
                InferType::Array(Box::new(elem_ty), elems.len() as u64)
            }
            ExprKind::StructLit { path, fields } => self.infer_struct_lit(*path, fields, expr.span),
            ExprKind::If { cond, then_branch, else_branch } => {
                self.infer_expr(cond, Some(InferType::Bool));
                let then_ty = self.infer_expr(then_branch, expected.clone());
                match else_branch {
                    Some(else_e) => {
                        let else_ty = self.infer_expr(else_e, expected);
                        self.infer.unify(&then_ty, &else_ty).unwrap_or(InferType::Unknown)
                    }
                    None => InferType::Unit,
                }
            }
            ExprKind::Match { scrutinee, arms } => self.infer_match(scrutinee, arms, expected, expr.span),
            ExprKind::Block(block) => self.infer_block(block, expected),
            ExprKind::While { cond, body } => {
                self.infer_expr(cond, Some(InferType::Bool));
                self.loop_depth += 1;
                self.infer_block(body, None);
                self.loop_depth -= 1;
                InferType::Unit
            }
            ExprKind::Loop { body } => {
                self.loop_depth += 1;
                self.infer_block(body, None);
                self.loop_depth -= 1;
                InferType::Never
            }
            ExprKind::For { pattern, iter, body } => {
                let iter_ty = self.infer_expr(iter, None);
                let elem_ty = match self.infer.resolve(&iter_ty) {
                    InferType::Array(e, _) | InferType::Slice(e) => *e,
                    _ => InferType::Unknown,
                };
                self.symbols.push_scope();
                self.bind_pattern(pattern, elem_ty, expr.span);
                self.loop_depth += 1;
                self.infer_block(body, None);
                self.loop_depth -= 1;
                self.symbols.pop_scope();
                InferType::Unit
            }
            ExprKind::Return(value) => {
                if let Some(v) = value {
                    self.infer_expr(v, None);
                }
                InferType::Never
            }
            ExprKind::Break(value) => {
                if let Some(v) = value {
                    self.infer_expr(v, None);
                }
                InferType::Never
            }
            ExprKind::Continue => InferType::Never,
            ExprKind::Range { start, end, .. } => {
                if let Some(s) = start {
                    self.infer_expr(s, Some(InferType::IntLiteral));
                }
                if let Some(e) = end {
                    self.infer_expr(e, Some(InferType::IntLiteral));
                }
                InferType::Generic(self.strings.intern("Range"), vec![InferType::IntLiteral])
            }
            ExprKind::Cast { expr: inner, ty } => {
                let from = self.infer_expr(inner, None);
                let to_id = self.resolve_type_expr(ty);
                let to = InferType::from_ground(&self.interner, to_id);
                if !is_valid_cast(&self.infer.resolve(&from), &to) {
                    self.report_type_error(
                        expr.span,
                        crate::error::TypeError::InvalidCast { from: format!("{from:?}"), to: format!("{to:?}") },
                    );
                }
                to
            }
            ExprKind::Await(inner) => self.infer_expr(inner, None),
            ExprKind::Try(inner) => {
                let inner_ty = self.infer_expr(inner, None);
                match self.infer.resolve(&inner_ty) {
                    InferType::Generic(_, args) if !args.is_empty() => args[0].clone(),
                    other => other,
                }
            }
            ExprKind::Closure { params, body } => {
                self.symbols.push_scope();
                for p in params.iter() {
                    self.symbols.declare(
                        *p,
                        SymbolInfo { kind: SymbolKind::Param, ty: self.interner.unknown(), visibility: Visibility::Private, definition_site: expr.span, references: vec![] },
                    );
                }
                let ret = self.infer_expr(body, None);
                self.symbols.pop_scope();
                InferType::Function(vec![InferType::Unknown; params.len()], Box::new(ret))
            }
            ExprKind::Comptime(inner) => self.infer_expr(inner, expected),
        }
    }

    fn infer_path(&mut self, name: Symbol, span: Span) -> InferType {
        if name == Symbol::EMPTY {
            return InferType::Unknown; // `self`
        }
        if let Some(def_id) = self.symbols.resolve(name) {
            self.symbols.record_reference(def_id, span);
            let ty = self.symbols.info(def_id).ty;
            return InferType::from_ground(&self.interner, ty);
        }
        if let Some(shape) = self.result.functions.get(&name) {
            return InferType::Function(
                shape.params.iter().map(|t| InferType::from_ground(&self.interner, *t)).collect(),
                Box::new(InferType::from_ground(&self.interner, shape.ret)),
            );
        }
        if self.result.structs.contains_key(&name) || self.result.enums.contains_key(&name) {
            return InferType::Generic(name, vec![]);
        }
        self.report_type_error(span, crate::error::TypeError::UnresolvedName { name: self.strings.resolve(name).to_string() });
        InferType::Unknown
    }

    fn infer_unary(&mut self, op: UnOp, inner: &Expr<'_>) -> InferType {
        match op {
            UnOp::Neg | UnOp::Not => self.infer_expr(inner, None),
            UnOp::Ref => InferType::Reference(BorrowKind::Shared, Box::new(self.infer_expr(inner, None))),
            UnOp::RefMut => InferType::Reference(BorrowKind::Mutable, Box::new(self.infer_expr(inner, None))),
            UnOp::Deref => match self.infer_expr(inner, None) {
                InferType::Reference(_, t) => *t,
                other => other,
            },
        }
    }

    fn infer_binary(&mut self, op: BinOp, lhs: &Expr<'_>, rhs: &Expr<'_>, span: Span) -> InferType {
        let lhs_ty = self.infer_expr(lhs, None);
        let rhs_ty = self.infer_expr(rhs, Some(lhs_ty.clone()));
        match op {
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::And | BinOp::Or => {
                if let Err(err) = self.infer.unify(&lhs_ty, &rhs_ty) {
                    self.report_type_error(span, err);
                }
                InferType::Bool
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
                match self.infer.unify(&lhs_ty, &rhs_ty) {
                    Ok(t) => t,
                    Err(err) => {
                        self.report_type_error(span, err);
                        InferType::Unknown
                    }
                }
            }
        }
    }

    fn infer_call(&mut self, callee: &Expr<'_>, args: &[Expr<'_>], span: Span) -> InferType {
        if let ExprKind::Path(name) = &callee.kind {
            if let Some(shape) = self.result.functions.get(name).cloned() {
                if shape.params.len() != args.len() {
                    self.report_type_error(
                        span,
                        crate::error::TypeError::ArityMismatch { expected: shape.params.len(), found: args.len() },
                    );
                }
                if shape.generic_params.is_empty() {
                    for (arg, &param_ty) in args.iter().zip(shape.params.iter()) {
                        self.infer_expr(arg, Some(InferType::from_ground(&self.interner, param_ty)));
                    }
                    return InferType::from_ground(&self.interner, shape.ret);
                }
                return self.infer_generic_call(&shape, args, span);
            }
        }
        let callee_ty = self.infer_expr(callee, None);
        for arg in args {
            self.infer_expr(arg, None);
        }
        match self.infer.resolve(&callee_ty) {
            InferType::Function(_, ret) => *ret,
            _ => InferType::Unknown,
        }
    }

    /// Instantiates `shape`'s declared generic parameters with fresh
    /// unification variables, checks each argument against its
    /// (now-instantiated) declared type so the variables solve to whatever
    /// concrete types the caller actually passed, then checks the solved
    /// types against their declared bounds and registers the
    /// `(def_id, ordered_type_args)` key in the monomorphization table
    /// (spec §4.4, §3 "generic environment").
    fn infer_generic_call(&mut self, shape: &FnShape, args: &[Expr<'_>], span: Span) -> InferType {
        let subst: Vec<(Symbol, crate::infer::TyVar)> =
            shape.generic_params.iter().map(|(name, _)| (*name, self.infer.fresh())).collect();
        for (arg, &param_ty) in args.iter().zip(shape.params.iter()) {
            let instantiated = self.instantiate_generic(param_ty, &subst);
            self.infer_expr(arg, Some(instantiated));
        }

        let mut ordered = Vec::with_capacity(shape.generic_params.len());
        for (param, bounds) in &shape.generic_params {
            let var = subst.iter().find(|(n, _)| n == param).expect("declared above").1;
            let concrete = self.infer.zonk(&mut self.interner, &InferType::Var(var));
            for trait_name in bounds {
                if !self.traits.resolve_trait_bound(concrete, *trait_name) {
                    self.report_type_error(
                        span,
                        crate::error::TypeError::UnsatisfiedBound {
                            ty: self.interner.display(concrete),
                            bound: self.strings.resolve(*trait_name).to_string(),
                        },
                    );
                }
            }
            ordered.push(concrete);
        }
        let def_id = shape.def_id;
        let fn_name = self.strings.resolve(shape.name).to_string();
        let mangled = ordered.iter().map(|t| t.0.to_string()).collect::<Vec<_>>().join("_");
        let symbol_name = format!("{fn_name}${mangled}");
        let result = self.result.mono.request(def_id, ordered, || crate::generics::Specialization { symbol_name });
        if result.is_err() {
            self.report_type_error(span, crate::error::TypeError::MonomorphizationLimitExceeded { def: fn_name });
        }

        let ret_instantiated = self.instantiate_generic(shape.ret, &subst);
        let zonked_ret = self.infer.zonk(&mut self.interner, &ret_instantiated);
        InferType::from_ground(&self.interner, zonked_ret)
    }

    /// Converts a declared ground type to an [`InferType`], replacing every
    /// bare occurrence of one of `subst`'s generic-parameter placeholders
    /// (`TypeShape::Generic(name, [])`) with that parameter's fresh
    /// unification variable.
    fn instantiate_generic(&self, declared: TypeId, subst: &[(Symbol, crate::infer::TyVar)]) -> InferType {
        if let TypeShape::Generic(sym, args) = self.interner.shape(declared) {
            if args.is_empty() {
                if let Some((_, var)) = subst.iter().find(|(n, _)| n == sym) {
                    return InferType::Var(*var);
                }
            }
        }
        match self.interner.shape(declared).clone() {
            TypeShape::Reference(k, inner) => InferType::Reference(k, Box::new(self.instantiate_generic(inner, subst))),
            TypeShape::Array(elem, n) => InferType::Array(Box::new(self.instantiate_generic(elem, subst)), n),
            TypeShape::Slice(elem) => InferType::Slice(Box::new(self.instantiate_generic(elem, subst))),
            TypeShape::Tuple(elems) => {
                InferType::Tuple(elems.iter().map(|e| self.instantiate_generic(*e, subst)).collect())
            }
            TypeShape::Function(params, ret) => InferType::Function(
                params.iter().map(|p| self.instantiate_generic(*p, subst)).collect(),
                Box::new(self.instantiate_generic(ret, subst)),
            ),
            _ => InferType::from_ground(&self.interner, declared),
        }
    }

    fn infer_method_call(&mut self, receiver: &Expr<'_>, method: Symbol, args: &[Expr<'_>], span: Span) -> InferType {
        // `Enum.Variant(args)` parses identically to a method call on a
        // path receiver; disambiguate here by checking whether the
        // receiver names an enum type.
        if let ExprKind::Path(enum_name) = &receiver.kind {
            if let Some(shape) = self.result.enums.get(enum_name).cloned() {
                if let Some((_, field_types)) = shape.variants.iter().find(|(name, _)| *name == method) {
                    if field_types.len() != args.len() {
                        self.report_type_error(
                            span,
                            crate::error::TypeError::ArityMismatch { expected: field_types.len(), found: args.len() },
                        );
                    }
                    for (arg, &ft) in args.iter().zip(field_types.iter()) {
                        self.infer_expr(arg, Some(InferType::from_ground(&self.interner, ft)));
                    }
                    return InferType::Generic(*enum_name, vec![]);
                }
            }
        }
        let receiver_ty = self.infer_expr(receiver, None);
        for arg in args {
            self.infer_expr(arg, None);
        }
        let ground = self.infer.zonk(&mut self.interner, &receiver_ty);
        match self.traits.resolve_method(ground, method) {
            Ok(Some(_)) => InferType::Unknown,
            Ok(None) => {
                self.report_type_error(
                    span,
                    crate::error::TypeError::UnresolvedName { name: self.strings.resolve(method).to_string() },
                );
                InferType::Unknown
            }
            Err(n) => {
                self.report_type_error(
                    span,
                    crate::error::TypeError::AmbiguousMethod {
                        ty: self.interner.display(ground),
                        method: self.strings.resolve(method).to_string(),
                        candidates: n,
                    },
                );
                InferType::Unknown
            }
        }
    }

    fn infer_field(&mut self, base: &Expr<'_>, field: Symbol, span: Span) -> InferType {
        // `Enum.Variant` with no call parens is a zero-field variant
        // construction, disambiguated the same way
        // as the method-call case above.
        if let ExprKind::Path(enum_name) = &base.kind {
            if let Some(shape) = self.result.enums.get(enum_name) {
                if shape.variants.iter().any(|(name, fields)| *name == field && fields.is_empty()) {
                    return InferType::Generic(*enum_name, vec![]);
                }
            }
        }
        let base_ty = self.infer_expr(base, None);
        let ground = self.infer.zonk(&mut self.interner, &base_ty);
        match self.interner.shape(ground).clone() {
            TypeShape::Generic(name, _) => {
                if let Some(shape) = self.result.structs.get(&name) {
                    if let Some((_, ty)) = shape.fields.iter().find(|(f, _)| *f == field) {
                        return InferType::from_ground(&self.interner, *ty);
                    }
                    self.report_type_error(
                        span,
                        crate::error::TypeError::UnresolvedName { name: self.strings.resolve(field).to_string() },
                    );
                }
            }
            // `t.0`, `t.1`, ... — the parser interns a tuple index's digits
            // as a plain field `Symbol`, exactly like a struct field access.
            TypeShape::Tuple(elems) => match self.strings.resolve(field).parse::<usize>().ok().and_then(|i| elems.get(i)) {
                Some(ty) => return InferType::from_ground(&self.interner, *ty),
                None => self.report_type_error(
                    span,
                    crate::error::TypeError::UnresolvedName { name: self.strings.resolve(field).to_string() },
                ),
            },
            _ => {}
        }
        InferType::Unknown
    }

    fn infer_struct_lit(&mut self, path: Symbol, fields: &[(Symbol, Expr<'_>)], span: Span) -> InferType {
        let shape = self.result.structs.get(&path).cloned();
        if let Some(shape) = shape {
            for (fname, fexpr) in fields {
                let expected_ty = shape.fields.iter().find(|(n, _)| n == fname).map(|(_, t)| *t);
                self.infer_expr(fexpr, expected_ty.map(|t| InferType::from_ground(&self.interner, t)));
            }
            if fields.len() != shape.fields.len() {
                self.report_type_error(
                    span,
                    crate::error::TypeError::ArityMismatch { expected: shape.fields.len(), found: fields.len() },
                );
            }
        } else {
            for (_, fexpr) in fields {
                self.infer_expr(fexpr, None);
            }
            self.report_type_error(span, crate::error::TypeError::UnresolvedName { name: self.strings.resolve(path).to_string() });
        }
        InferType::Generic(path, vec![])
    }

    fn infer_match(&mut self, scrutinee: &Expr<'_>, arms: &[MatchArm<'_>], expected: Option<InferType>, span: Span) -> InferType {
        let scrutinee_ty = self.infer_expr(scrutinee, None);
        let mut result = expected.unwrap_or(InferType::Unknown);
        for arm in arms {
            self.symbols.push_scope();
            self.bind_pattern(&arm.pattern, scrutinee_ty.clone(), span);
            if let Some(guard) = arm.guard {
                self.infer_expr(guard, Some(InferType::Bool));
            }
            let body_ty = self.infer_expr(arm.body, Some(result.clone()));
            result = self.infer.unify(&result, &body_ty).unwrap_or(result);
            self.symbols.pop_scope();
        }
        result
    }
}

fn str_type() -> InferType {
    InferType::Slice(Box::new(InferType::Int(crate::ty::IntWidth::U8)))
}

fn has_comptime_attr(_def: &FnDef<'_>) -> bool {
    // Attribute plumbing (`@comptime`) is parsed away with other
    // attributes today; a function is conservatively comptime-callable
    // only when `home-comptime` later proves its body uses only supported
    // constructs.
    false
}

fn is_valid_cast(from: &InferType, to: &InferType) -> bool {
    matches!(
        (from, to),
        (InferType::Int(_) | InferType::IntLiteral, InferType::Int(_) | InferType::Float(_))
            | (InferType::Float(_) | InferType::FloatLiteral, InferType::Int(_) | InferType::Float(_))
            | (InferType::Bool, InferType::Int(_))
            | (_, InferType::Unknown)
            | (InferType::Unknown, _)
    )
}

/// Parses the lexer's stripped digit text against its numeric base,
/// deferred to here because the parser does not own the string interner.
pub fn parse_int_text(text: &str, base: home_lexer::NumberBase) -> Option<i128> {
    let radix = match base {
        home_lexer::NumberBase::Binary => 2,
        home_lexer::NumberBase::Octal => 8,
        home_lexer::NumberBase::Decimal => 10,
        home_lexer::NumberBase::Hex => 16,
    };
    i128::from_str_radix(text, radix).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use home_lexer::Lexer;
    use home_parser::{Arena, Parser};

    pub(super) fn check_source(src: &str) -> (TypedAst, Vec<home_diag::Diagnostic>) {
        let mut strings = Interner::new();
        let (tokens, _) = Lexer::new(src, &mut strings).tokenize();
        let arena = Arena::new();
        let (module, _) = Parser::new(tokens, &arena, &mut strings).parse_module();
        let mut bag = DiagnosticBag::new();
        let typed = TypeChecker::new(&mut strings, &mut bag).check_module(&module);
        (typed, bag.finish())
    }

    #[test]
    fn arithmetic_let_binding_checks_clean() {
        let (_typed, diags) = check_source("fn main() -> i32 { let x: i32 = 10; let y: i32 = 32; return x + y; }");
        assert!(diags.iter().all(|d| !d.is_fatal()), "{diags:?}");
    }

    #[test]
    fn struct_field_access_resolves_type() {
        let (typed, diags) = check_source(
            "struct Point { x: i32, y: i32 } fn main() -> i32 { let p = Point { x: 10, y: 20 }; return p.x + p.y; }",
        );
        assert!(diags.iter().all(|d| !d.is_fatal()), "{diags:?}");
        assert!(typed.structs.contains_key(&typed_struct_name(&typed)));
    }

    fn typed_struct_name(typed: &TypedAst) -> Symbol {
        *typed.structs.keys().next().unwrap()
    }

    #[test]
    fn unresolved_name_reports_error() {
        let (_typed, diags) = check_source("fn main() -> i32 { return missing_variable; }");
        assert!(diags.iter().any(|d| d.is_fatal()));
    }

    #[test]
    fn mismatched_return_type_reports_error() {
        let (_typed, diags) = check_source("fn main() -> i32 { return true; }");
        assert!(diags.iter().any(|d| d.is_fatal()));
    }

    #[test]
    fn generic_call_registers_a_monomorphization_key() {
        let (typed, diags) = check_source(
            "fn wrap<T>(x: T) -> T { return x; } fn main() -> i32 { return wrap(5); }",
        );
        assert!(diags.iter().all(|d| !d.is_fatal()), "{diags:?}");
        assert_eq!(typed.mono.len(), 1, "expected one specialization of `wrap`");
    }

    #[test]
    fn two_concrete_instantiations_of_the_same_generic_produce_two_keys() {
        let (typed, diags) = check_source(
            "fn wrap<T>(x: T) -> T { return x; } fn main() -> i32 { let a = wrap(5); let b = wrap(true); return a; }",
        );
        assert!(diags.iter().all(|d| !d.is_fatal()), "{diags:?}");
        assert_eq!(typed.mono.len(), 2);
    }

    #[test]
    fn unsatisfied_trait_bound_on_a_generic_call_reports_an_error() {
        let (_typed, diags) = check_source(
            "trait Show { fn show(self) -> i32; }\n\
             impl Show for i32 { fn show(self) -> i32 { return self; } }\n\
             fn announce<T: Show>(x: T) -> i32 { return 0; }\n\
             fn main() -> i32 { return announce(true); }",
        );
        assert!(diags.iter().any(|d| d.is_fatal()), "expected a bound-violation diagnostic");
    }

    #[test]
    fn satisfied_trait_bound_on_a_generic_call_checks_clean() {
        let (_typed, diags) = check_source(
            "trait Show { fn show(self) -> i32; }\n\
             impl Show for i32 { fn show(self) -> i32 { return self; } }\n\
             fn announce<T: Show>(x: T) -> i32 { return 0; }\n\
             fn main() -> i32 { return announce(5); }",
        );
        assert!(diags.iter().all(|d| !d.is_fatal()), "{diags:?}");
    }
}

/// Spec §8 property 4: monomorphization is stable — the number of distinct
/// specializations a generic call site produces depends only on how many
/// distinct concrete types it's called at, not on call order or repeats,
/// and checking the same program twice yields the same count.
#[cfg(test)]
mod monomorphization_properties {
    use super::tests::check_source;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Arg {
        Int,
        Bool,
    }

    impl Arg {
        fn literal(self) -> &'static str {
            match self {
                Arg::Int => "5",
                Arg::Bool => "true",
            }
        }
    }

    fn arg() -> impl Strategy<Value = Arg> {
        prop_oneof![Just(Arg::Int), Just(Arg::Bool)]
    }

    proptest! {
        #[test]
        fn key_count_matches_distinct_argument_types_regardless_of_call_order(calls in prop::collection::vec(arg(), 1..8)) {
            let bindings: Vec<String> = calls
                .iter()
                .enumerate()
                .map(|(i, a)| format!("let v{i} = wrap({});", a.literal()))
                .collect();
            let src = format!(
                "fn wrap<T>(x: T) -> T {{ return x; }} fn main() -> i32 {{ {} return 0; }}",
                bindings.join(" ")
            );

            let expected_keys: std::collections::HashSet<Arg> = calls.iter().copied().collect();

            let (first, first_diags) = check_source(&src);
            let (second, second_diags) = check_source(&src);

            prop_assert!(first_diags.iter().all(|d| !d.is_fatal()), "{first_diags:?}");
            prop_assert!(second_diags.iter().all(|d| !d.is_fatal()), "{second_diags:?}");
            prop_assert_eq!(first.mono.len(), expected_keys.len());
            prop_assert_eq!(first.mono.len(), second.mono.len(), "rechecking the same source must yield the same number of specializations");
        }
    }
}
