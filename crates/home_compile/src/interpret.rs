//! `run --interpret` path: lexes, expands macros, and parses as usual, then hands
//! the module's `main` straight to `home-comptime`'s evaluator instead of
//! running type-check/borrow-check/codegen — a tree-walking shortcut for
//! quick feedback, in the same shape as `compile::interpret_program`'s
//! `ui_bridge::interpret_for_ui_sync`, a lex/parse/interpret loop with no
//! codegen step at all.
//!
//! Only programs whose `main` stays inside the comptime-safe subset can
//! run this way; anything else fails with
//! [`home_comptime::EvalError::NotComptimeSafe`] and the caller should
//! fall back to `build` + executing the native binary.

use home_base::{Interner, Span, Symbol};
use home_comptime::{ComptimeValue, EvalError, Evaluator};
use home_diag::{Diagnostic, DiagnosticBag};
use home_lexer::Lexer;
use home_macro::expand_macros;
use home_parser::ast::{Expr, ExprKind, Module};
use home_parser::{Arena, Parser};

pub struct InterpretResult {
    pub diagnostics: Vec<Diagnostic>,
    pub value: Option<ComptimeValue>,
}

pub fn interpret(source: &str, entry_name: &str) -> InterpretResult {
    let mut diagnostics = DiagnosticBag::new();
    let mut strings = Interner::new();

    let (tokens, lex_errors) = Lexer::new(source, &mut strings).tokenize();
    for err in &lex_errors {
        diagnostics.push(Diagnostic::error(err.code(), err.kind.to_string(), err.span, "lex"));
    }

    let (tokens, macro_errors) = expand_macros(tokens);
    for err in &macro_errors {
        diagnostics.push(Diagnostic::error(err.code(), err.kind.to_string(), err.span, "macro"));
    }

    let arena = Arena::new();
    let (module, parse_errors) = Parser::new(tokens, &arena, &mut strings).parse_module();
    for err in &parse_errors {
        diagnostics.push(Diagnostic::error(err.code(), err.kind.to_string(), err.span, "parse"));
    }

    if diagnostics.has_errors() {
        return InterpretResult { diagnostics: diagnostics.finish(), value: None };
    }

    let entry = strings.intern(entry_name);
    let call = build_call(&arena, entry);

    let mut evaluator = Evaluator::new(&strings, &module);
    match evaluator.evaluate(call) {
        Ok(value) => InterpretResult { diagnostics: diagnostics.finish(), value: Some(value) },
        Err(err) => {
            diagnostics.push(Diagnostic::error(err.code(), err.to_string(), Span::default(), "comptime"));
            InterpretResult { diagnostics: diagnostics.finish(), value: None }
        }
    }
}

fn build_call<'a>(arena: &'a Arena, entry: Symbol) -> &'a Expr<'a> {
    let callee = arena.alloc(Expr { kind: ExprKind::Path(entry), span: Span::default() });
    arena.alloc(Expr { kind: ExprKind::Call { callee, args: &[] }, span: Span::default() })
}

/// Evaluator lifetime helper, kept separate from [`interpret`] so a
/// caller that already has a parsed `Module` (e.g. the scheduler's
/// per-unit pipeline, before it commits to codegen) can interpret
/// without re-lexing and re-parsing.
pub fn interpret_module<'a>(strings: &'a Interner, module: &Module<'a>, arena: &'a Arena, entry_name: &str) -> Result<ComptimeValue, EvalError> {
    let entry = {
        // `strings` is shared immutably here; interning a new symbol
        // requires `&mut`, but every name the module can call is already
        // interned by the time it parsed, so a lookup-only resolve would
        // suffice in a future revision. For now the caller is expected to
        // have interned `entry_name` already (e.g. via `Lexer`/`Parser`).
        find_symbol(strings, entry_name).unwrap_or(Symbol::EMPTY)
    };
    let call = build_call(arena, entry);
    Evaluator::new(strings, module).evaluate(call)
}

fn find_symbol(strings: &Interner, name: &str) -> Option<Symbol> {
    strings.lookup(name)
}
