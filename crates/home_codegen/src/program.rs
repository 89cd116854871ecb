//! Whole-module codegen driver, the top of the
//! `codegen::{context, types, expr, stmt, program}` split: walks every
//! function in the verified AST, lowers its body, and assembles the
//! results into one [`ObjectModule`] ready for [`crate::object::emit`].

use std::collections::HashMap;

use home_base::{Interner, Symbol};
use home_borrow::DropPlan;
use home_parser::ast::{FnDef, Item, ItemKind, Module};
use home_types::checker::key_of;
use home_types::TypedAst;

use crate::context::FunctionContext;
use crate::emit::Reg;
use crate::error::CodegenError;
use crate::frame::{build_frames, FrameLayout};
use crate::layout::LayoutTable;
use crate::object::{DefinedSymbol, ObjectModule, Section};
use crate::stmt::lower_stmt;
use crate::strings::StringPool;

/// Lowers every function in `module` and returns the assembled object,
/// using `typed`/`drop_plan`/`layouts` exactly as produced by the
/// preceding passes (type checking, borrow checking, and layout
/// computation run once per compilation unit ahead of this call).
///
/// Takes `strings` mutably: string-literal lowering mints one fresh
/// `.Lstr.N` label `Symbol` per distinct literal (see
/// `crate::strings::StringPool`), which needs the same `Interner` every
/// earlier pass already used so the label coexists with every other
/// symbol this compilation unit interned.
pub fn lower_module(module: &Module<'_>, typed: &TypedAst, _drop_plan: &DropPlan, strings: &mut Interner, entry_name: Symbol) -> Result<ObjectModule, CodegenError> {
    let layouts = LayoutTable::build(typed)?;
    let frames = build_frames(module.items, typed, &layouts)?;
    let fn_symbols: HashMap<Symbol, usize> = HashMap::new();

    let mut object = ObjectModule::new(entry_name);
    let mut pool = StringPool::new();
    lower_items(module.items, typed, &layouts, &frames, &fn_symbols, strings, &mut pool, &mut object)?;

    let (bytes, pooled) = pool.finish();
    object.rodata = bytes;
    for entry in pooled {
        object.symbols.push(DefinedSymbol { name: entry.label, section: Section::Rodata, offset: entry.offset, size: entry.len, is_global: false, is_function: false });
    }
    Ok(object)
}

fn lower_items(
    items: &[Item<'_>],
    typed: &TypedAst,
    layouts: &LayoutTable,
    frames: &HashMap<usize, FrameLayout>,
    fn_symbols: &HashMap<Symbol, usize>,
    strings: &mut Interner,
    pool: &mut StringPool,
    object: &mut ObjectModule,
) -> Result<(), CodegenError> {
    for item in items {
        match &item.kind {
            ItemKind::Fn(def) => lower_fn(def, typed, layouts, frames, fn_symbols, strings, pool, object)?,
            ItemKind::Impl(impl_def) => {
                for method in impl_def.methods {
                    lower_fn(method, typed, layouts, frames, fn_symbols, strings, pool, object)?;
                }
            }
            ItemKind::Mod { items, .. } => lower_items(items, typed, layouts, frames, fn_symbols, strings, pool, object)?,
            _ => {}
        }
    }
    Ok(())
}

fn lower_fn(
    def: &FnDef<'_>,
    typed: &TypedAst,
    layouts: &LayoutTable,
    frames: &HashMap<usize, FrameLayout>,
    fn_symbols: &HashMap<Symbol, usize>,
    strings: &mut Interner,
    pool: &mut StringPool,
    object: &mut ObjectModule,
) -> Result<(), CodegenError> {
    let Some(body) = def.body else { return Ok(()) };
    let frame = frames.get(&key_of(def)).ok_or_else(|| CodegenError::UnresolvedType { name: format!("{:?}", def.name) })?;
    let ret_is_aggregate = typed.functions.get(&def.name).map(|shape| crate::types::is_aggregate(&typed.interner, shape.ret)).unwrap_or(false);

    let mut ctx = FunctionContext::new(frame, layouts, typed, fn_symbols, strings, pool);

    // Prologue: push rbp, mov rbp, rsp, sub rsp, frame_size.
    ctx.encoder.push_reg(Reg::Rbp);
    ctx.encoder.mov_reg_reg(Reg::Rbp, Reg::Rsp);
    if frame.frame_size > 0 {
        sub_rsp_imm(&mut ctx, frame.frame_size);
    }

    // When the return type is an aggregate, the caller's hidden destination
    // pointer arrives in `rdi` and every explicit parameter shifts one
    // register to the right (the sret convention).
    if ret_is_aggregate {
        if let Some(disp) = ctx.ret_ptr_disp() {
            ctx.encoder.mov_mem_reg(Reg::Rbp, disp, Reg::Rdi);
        }
    }
    let arg_base = if ret_is_aggregate { 1 } else { 0 };

    // Spill incoming integer arguments (System V AMD64) into their stack slots.
    for (i, param) in def.params.iter().enumerate() {
        if param.name == home_base::Symbol::EMPTY || i + arg_base >= Reg::ARG_REGS.len() {
            continue;
        }
        if let Some(disp) = ctx.local_offset(param.name) {
            ctx.encoder.mov_mem_reg(Reg::Rbp, disp, Reg::ARG_REGS[i + arg_base]);
        }
    }

    for stmt in body.stmts {
        lower_stmt(&mut ctx, stmt)?;
    }
    if let Some(tail) = body.tail {
        if matches!(tail.kind, home_parser::ast::ExprKind::Return(_)) {
            crate::expr::lower_expr(&mut ctx, tail)?;
        } else {
            crate::expr::finish_return_value(&mut ctx, tail)?;
        }
    } else {
        ctx.encoder.mov_reg_imm32(Reg::Rax, 0);
    }

    // Epilogue: mov rsp, rbp; pop rbp; ret.
    ctx.encoder.mov_reg_reg(Reg::Rsp, Reg::Rbp);
    ctx.encoder.pop_reg(Reg::Rbp);
    ctx.encoder.ret();

    let offset = object.text.len() as u64;
    let size = ctx.encoder.code.len() as u64;
    object.symbols.push(DefinedSymbol { name: def.name, section: Section::Text, offset, size, is_global: def.is_pub, is_function: true });
    for reloc in ctx.encoder.relocs {
        object.relocations.push(crate::object::ObjectRelocation { section: Section::Text, offset: offset + reloc.offset as u64, symbol: reloc.symbol, kind: reloc.kind, addend: 0 });
    }
    object.text.extend_from_slice(&ctx.encoder.code);
    Ok(())
}

/// `sub rsp, imm32` — frame allocation doesn't fit the shared
/// register-to-register helpers in [`crate::emit`], so it's encoded
/// directly here rather than adding a one-call-site method to `Encoder`.
fn sub_rsp_imm(ctx: &mut FunctionContext<'_>, amount: u32) {
    ctx.encoder.code.push(0x48); // REX.W
    ctx.encoder.code.push(0x81);
    ctx.encoder.code.push(0xEC); // ModRM: /5, rsp
    ctx.encoder.code.extend_from_slice(&(amount as i32).to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use home_diag::DiagnosticBag;
    use home_parser::Arena;
    use home_types::checker::TypeChecker;

    #[test]
    fn lowers_a_trivial_function_to_nonempty_text() {
        let mut strings = Interner::new();
        let src = "fn main() -> i32 { return 0; }";
        let (tokens, _) = home_lexer::Lexer::new(src, &mut strings).tokenize();
        let arena = Arena::new();
        let (module, _) = home_parser::Parser::new(tokens, &arena, &mut strings).parse_module();
        let mut diagnostics = DiagnosticBag::new();
        let typed = TypeChecker::new(&mut strings, &mut diagnostics).check_module(&module);
        let mut borrow_diagnostics = DiagnosticBag::new();
        let drop_plan = home_borrow::BorrowChecker::new(&strings, &typed, &typed.interner, &mut borrow_diagnostics).check_module(&module);
        let entry = strings.intern("main");
        let object = lower_module(&module, &typed, &drop_plan, &mut strings, entry).unwrap();
        assert!(!object.text.is_empty());
        assert_eq!(object.symbols.len(), 1);
        assert_eq!(object.symbols[0].name, entry);
    }

    #[test]
    fn string_literal_lowers_to_a_rodata_symbol_and_a_text_relocation() {
        let mut strings = Interner::new();
        let src = r#"fn main() -> i32 { let s = "hi"; return 0; }"#;
        let (tokens, _) = home_lexer::Lexer::new(src, &mut strings).tokenize();
        let arena = Arena::new();
        let (module, _) = home_parser::Parser::new(tokens, &arena, &mut strings).parse_module();
        let mut diagnostics = DiagnosticBag::new();
        let typed = TypeChecker::new(&mut strings, &mut diagnostics).check_module(&module);
        let mut borrow_diagnostics = DiagnosticBag::new();
        let drop_plan = home_borrow::BorrowChecker::new(&strings, &typed, &typed.interner, &mut borrow_diagnostics).check_module(&module);
        let entry = strings.intern("main");
        let object = lower_module(&module, &typed, &drop_plan, &mut strings, entry).unwrap();
        assert_eq!(object.rodata, b"hi\0");
        assert!(object.symbols.iter().any(|s| s.section == Section::Rodata));
        assert!(object.relocations.iter().any(|r| r.section == Section::Text));
    }
}
