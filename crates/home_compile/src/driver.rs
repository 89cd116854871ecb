//! Single-compilation-unit pipeline:
//! lex -> macro-expand -> parse -> optimize -> type-check -> borrow-check ->
//! codegen -> object emission, threading one `DiagnosticBag` through every
//! stage so a failure partway still surfaces every diagnostic the earlier
//! stages found, and returning structured diagnostics rather than a bare
//! error string.

use home_base::Interner;
use home_borrow::BorrowChecker;
use home_cache::{CacheKey, CacheRecord, CacheStore, TargetFormatTag};
use home_codegen::{lower_module, ObjectModule, TargetFormat};
use home_diag::{Diagnostic, DiagnosticBag};
use home_lexer::Lexer;
use home_macro::expand_macros;
use home_parser::{Arena, Parser};
use home_pass::PassManager;
use home_types::TypeChecker;

use crate::error::CompileError;
use crate::session::{CompileSession, COMPILER_VERSION};

/// What one unit's compilation produced. `object_bytes` is `None` when
/// diagnostics include a fatal error — codegen never runs on a module the
/// earlier passes rejected.
pub struct UnitResult {
    pub diagnostics: Vec<Diagnostic>,
    pub object_bytes: Option<Vec<u8>>,
    pub from_cache: bool,
}

impl UnitResult {
    pub fn exit_code(&self) -> i32 {
        let bag = replay_bag(&self.diagnostics);
        bag.exit_code()
    }
}

fn replay_bag(diagnostics: &[Diagnostic]) -> DiagnosticBag {
    let mut bag = DiagnosticBag::new();
    bag.extend(diagnostics.iter().cloned());
    bag
}

fn target_tag(format: TargetFormat) -> TargetFormatTag {
    match format {
        TargetFormat::Elf64 => TargetFormatTag::Elf64,
        TargetFormat::MachO64 => TargetFormatTag::MachO64,
    }
}

/// Compiles one source string to a native object, consulting `cache`
/// first when the session allows it.
pub fn compile_unit(
    source: &str,
    session: &CompileSession,
    cache: Option<&CacheStore>,
    dependency_fingerprints: &[CacheKey],
) -> Result<UnitResult, CompileError> {
    let flags: Vec<&str> = session.feature_flags.iter().map(String::as_str).collect();
    let opt_name = opt_level_name(session.opt_level);
    let cache_key = CacheKey::build(source, COMPILER_VERSION, opt_name, &flags, dependency_fingerprints);

    if !session.no_cache {
        if let Some(store) = cache {
            if let Some(record) = store.get(cache_key).map_err(CompileError::Cache)? {
                return Ok(UnitResult { diagnostics: Vec::new(), object_bytes: Some(record.object_bytes), from_cache: true });
            }
        }
    }

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

    let (module, _pass_stats) = PassManager::new(session.opt_level).run(&module, &arena, &mut strings);

    let typed = TypeChecker::new(&mut strings, &mut diagnostics).check_module(&module);

    let drop_plan = BorrowChecker::new(&strings, &typed, &typed.interner, &mut diagnostics).check_module(&module);

    if diagnostics.has_errors() {
        return Ok(UnitResult { diagnostics: diagnostics.finish(), object_bytes: None, from_cache: false });
    }

    let entry_symbol = strings.intern(&session.entry_name);
    let object = lower_module(&module, &typed, &drop_plan, &mut strings, entry_symbol)?;
    let bytes = emit_bytes(&object, &strings, session.target_format);

    if let Some(store) = cache {
        let record = CacheRecord {
            object_bytes: bytes.clone(),
            entry_symbol: session.entry_name.clone(),
            target_format: target_tag(session.target_format),
            exported_symbols: exported_symbol_names(&object, &strings),
            dependency_fingerprints: dependency_fingerprints.iter().map(CacheKey::hex).collect(),
        };
        store.put(cache_key, &record).map_err(CompileError::Cache)?;
    }

    Ok(UnitResult { diagnostics: diagnostics.finish(), object_bytes: Some(bytes), from_cache: false })
}

fn emit_bytes(object: &ObjectModule, strings: &Interner, format: TargetFormat) -> Vec<u8> {
    home_codegen::object::emit(object, strings, format)
}

fn exported_symbol_names(object: &ObjectModule, strings: &Interner) -> Vec<String> {
    object.symbols.iter().filter(|sym| sym.is_global).map(|sym| strings.resolve(sym.name).to_string()).collect()
}

/// Runs lex -> macro-expand -> parse -> optimize -> type-check ->
/// borrow-check and stops there, for the CLI's `check` command and for
/// editor-style fast feedback.
pub fn check_unit(source: &str, session: &CompileSession) -> Vec<Diagnostic> {
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

    let (module, _pass_stats) = PassManager::new(session.opt_level).run(&module, &arena, &mut strings);
    let typed = TypeChecker::new(&mut strings, &mut diagnostics).check_module(&module);
    let _drop_plan = BorrowChecker::new(&strings, &typed, &typed.interner, &mut diagnostics).check_module(&module);

    diagnostics.finish()
}

fn opt_level_name(level: home_pass::OptLevel) -> &'static str {
    match level {
        home_pass::OptLevel::O0 => "O0",
        home_pass::OptLevel::O1 => "O1",
        home_pass::OptLevel::O2 => "O2",
        home_pass::OptLevel::O3 => "O3",
        home_pass::OptLevel::Os => "Os",
    }
}
