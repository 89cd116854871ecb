//! Command handlers, one function per [`crate::cli::Commands`]
//! variant: `cmd_build`/`cmd_run`/`cmd_check`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use home_cache::CacheStore;
use home_codegen::TargetFormat;
use home_compile::{check_unit, compile_unit, interpret, CompileSession};
use home_diag::render_all;

use crate::cli::{ColorMode, EmitArg, OptLevelArg, PkgAction};
use crate::config::{find_project_root, EnvConfig, Manifest};
use crate::error::CliError;

const DEFAULT_CACHE_BUDGET_BYTES: u64 = 512 * 1024 * 1024;

fn resolve_source(path: Option<PathBuf>) -> Result<(String, PathBuf, String), CliError> {
    let target = path.unwrap_or_else(|| PathBuf::from("."));

    if target.is_file() {
        let text = std::fs::read_to_string(&target)?;
        let entry_name = target.file_stem().and_then(|s| s.to_str()).unwrap_or("main").to_string();
        return Ok((text, target, entry_name));
    }

    let project_dir = find_project_root(&target).ok_or_else(|| CliError::NoProject(target.display().to_string()))?;
    let manifest = Manifest::load(&project_dir)?;
    let entry_path = manifest.entry_path(&project_dir);
    let text = std::fs::read_to_string(&entry_path)?;
    Ok((text, entry_path, "main".to_string()))
}

fn apply_color(mode: Option<ColorMode>) {
    match mode {
        Some(ColorMode::Always) => std::env::remove_var("NO_COLOR"),
        Some(ColorMode::Never) => std::env::set_var("NO_COLOR", "1"),
        Some(ColorMode::Auto) | None => {}
    }
}

fn target_format_for(env: &EnvConfig, override_target: Option<&str>) -> TargetFormat {
    let name = override_target.or(env.target.as_deref());
    match name {
        Some(t) if t.contains("darwin") || t.contains("macos") || t.contains("apple") => TargetFormat::MachO64,
        _ if cfg!(target_os = "macos") && name.is_none() => TargetFormat::MachO64,
        _ => TargetFormat::Elf64,
    }
}

fn open_cache(env: &EnvConfig, no_cache: bool) -> Option<Arc<CacheStore>> {
    if no_cache {
        return None;
    }
    Some(Arc::new(CacheStore::new(env.cache_dir.clone(), DEFAULT_CACHE_BUDGET_BYTES)))
}

pub fn build(
    path: Option<PathBuf>,
    opt_level: OptLevelArg,
    target: Option<String>,
    output: Option<PathBuf>,
    emit: EmitArg,
    no_cache: bool,
    color: Option<ColorMode>,
) -> Result<(), CliError> {
    apply_color(color);
    let env = EnvConfig::from_env();
    let (source, source_path, entry_name) = resolve_source(path)?;

    let session = CompileSession {
        opt_level: opt_level.into(),
        target_format: target_format_for(&env, target.as_deref()),
        entry_name,
        feature_flags: Vec::new(),
        no_cache,
    };

    let cache = open_cache(&env, no_cache);
    let result = compile_unit(&source, &session, cache.as_deref(), &[])?;

    print_diagnostics(&result.diagnostics, &source_path, &source);

    match &result.object_bytes {
        Some(bytes) if matches!(emit, EmitArg::Object) => {
            let out_path = output.unwrap_or_else(|| default_output_path(&source_path));
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&out_path, bytes)?;
            log::info!("wrote {}", out_path.display());
        }
        Some(_) => return Err(CliError::NotImplemented("--emit asm")),
        None => {}
    }

    exit_on_diagnostics(&result.diagnostics)
}

fn default_output_path(source_path: &Path) -> PathBuf {
    source_path.with_extension("o")
}

pub fn run(path: Option<PathBuf>, opt_level: OptLevelArg, interpret_flag: bool, no_cache: bool, color: Option<ColorMode>) -> Result<(), CliError> {
    apply_color(color);
    let (source, source_path, entry_name) = resolve_source(path)?;

    if interpret_flag {
        let outcome = interpret(&source, &entry_name);
        print_diagnostics(&outcome.diagnostics, &source_path, &source);
        if let Some(value) = &outcome.value {
            println!("{value:?}");
        }
        return exit_on_diagnostics(&outcome.diagnostics);
    }

    let env = EnvConfig::from_env();
    let session = CompileSession {
        opt_level: opt_level.into(),
        target_format: target_format_for(&env, None),
        entry_name,
        feature_flags: Vec::new(),
        no_cache,
    };
    let cache = open_cache(&env, no_cache);
    let result = compile_unit(&source, &session, cache.as_deref(), &[])?;
    print_diagnostics(&result.diagnostics, &source_path, &source);
    if result.object_bytes.is_some() {
        log::info!("built successfully; linking and executing a native object requires a system linker, which this CLI does not invoke (use --interpret for in-process execution)");
    }
    exit_on_diagnostics(&result.diagnostics)
}

pub fn check(path: Option<PathBuf>, color: Option<ColorMode>) -> Result<(), CliError> {
    apply_color(color);
    let (source, source_path, entry_name) = resolve_source(path)?;
    let session = CompileSession { entry_name, ..CompileSession::default() };
    let diagnostics = check_unit(&source, &session);
    print_diagnostics(&diagnostics, &source_path, &source);
    exit_on_diagnostics(&diagnostics)
}

/// `home test` (spec §6: "Collect `@test`-attributed functions and run
/// them"). Each tagged function is evaluated independently through
/// `home-comptime`'s tree-walking interpreter, the same shortcut `run
/// --interpret` uses — a test body is expected to stay inside the
/// comptime-safe subset (spec §4.6); a `NotComptimeSafe`/`UnsupportedConstruct`
/// failure is reported the same as any other evaluation error rather than
/// silently skipped, since a test that can't run is a failing test.
pub fn test(path: Option<PathBuf>, filter: Option<String>) -> Result<(), CliError> {
    let (source, source_path, _) = resolve_source(path)?;
    let mut strings = home_base::Interner::new();
    let (tokens, lex_errors) = home_lexer::Lexer::new(&source, &mut strings).tokenize();
    let (tokens, macro_errors) = home_macro::expand_macros(tokens);
    let arena = home_parser::Arena::new();
    let (module, parse_errors) = home_parser::Parser::new(tokens, &arena, &mut strings).parse_module();

    if !lex_errors.is_empty() || !macro_errors.is_empty() || !parse_errors.is_empty() {
        eprintln!("'{}' has lex/parse errors; run 'home check' for details", source_path.display());
        return Err(CliError::Diagnostics(1));
    }

    let mut test_names = Vec::new();
    collect_test_fns(module.items, &strings, &mut test_names);

    let mut ran = 0u32;
    let mut failed = 0u32;
    for name in &test_names {
        if let Some(filter) = &filter {
            if !name.contains(filter.as_str()) {
                continue;
            }
        }
        ran += 1;
        match home_compile::interpret_module(&strings, &module, &arena, name) {
            Ok(value) => println!("test {name} ... ok ({value:?})"),
            Err(err) => {
                failed += 1;
                println!("test {name} ... FAILED: {err}");
            }
        }
    }

    if ran == 0 {
        log::info!("no @test-attributed functions found in {}", source_path.display());
    } else {
        println!("{ran} run, {} passed, {failed} failed", ran - failed);
    }

    if failed > 0 {
        Err(CliError::Diagnostics(1))
    } else {
        Ok(())
    }
}

fn collect_test_fns<'a>(items: &'a [home_parser::ast::Item<'a>], strings: &home_base::Interner, out: &mut Vec<String>) {
    for item in items {
        match &item.kind {
            home_parser::ast::ItemKind::Fn(def) if item.has_attr("test", strings) => {
                out.push(strings.resolve(def.name).to_string());
            }
            home_parser::ast::ItemKind::Mod { items, .. } => collect_test_fns(items, strings, out),
            _ => {}
        }
    }
}

pub fn fmt(_path: Option<PathBuf>) -> Result<(), CliError> {
    Err(CliError::NotImplemented("fmt"))
}

pub fn doc(path: Option<PathBuf>) -> Result<(), CliError> {
    let (source, source_path, _) = resolve_source(path)?;
    let mut strings = home_base::Interner::new();
    let (tokens, _) = home_lexer::Lexer::new(&source, &mut strings).tokenize();
    let (tokens, _) = home_macro::expand_macros(tokens);
    let arena = home_parser::Arena::new();
    let (module, _) = home_parser::Parser::new(tokens, &arena, &mut strings).parse_module();

    for item in module.items {
        if let home_parser::ast::ItemKind::Fn(def) = &item.kind {
            if let Some(doc) = def.doc {
                println!("## fn {}\n{}\n", strings.resolve(def.name), strings.resolve(doc));
            } else {
                println!("## fn {}\n", strings.resolve(def.name));
            }
        }
    }
    log::info!("generated documentation outline for {}", source_path.display());
    Ok(())
}

pub fn pkg(action: PkgAction) -> Result<(), CliError> {
    if let PkgAction::Init { path, name } = action {
        return pkg_init(path, name);
    }

    let project_dir = find_project_root(Path::new(".")).ok_or_else(|| CliError::NoProject(".".to_string()))?;
    match action {
        PkgAction::Init { .. } => unreachable!("handled above"),
        PkgAction::Tree => {
            let manifest = Manifest::load(&project_dir)?;
            println!("{} {}", manifest.package.name, manifest.package.version);
            for (name, spec) in &manifest.dependencies {
                println!("  {name}: {spec:?}");
            }
        }
        PkgAction::Add { name, version } => {
            let mut manifest = Manifest::load(&project_dir)?;
            let spec = match version {
                Some(v) => crate::config::DependencySpec::Simple(v),
                None => crate::config::DependencySpec::Simple("*".to_string()),
            };
            manifest.dependencies.insert(name.clone(), spec);
            manifest.save(&project_dir)?;
            log::info!("added '{name}' to [dependencies] in home.toml (not fetched; package download is not implemented)");
        }
        PkgAction::Install => return Err(CliError::NotImplemented("pkg install")),
        PkgAction::Run { name } => {
            let manifest = Manifest::load(&project_dir)?;
            let command = manifest.scripts.get(&name).ok_or_else(|| CliError::NoScript(name.clone()))?;
            log::info!("running script '{name}': {command}");
            let status = std::process::Command::new("sh").arg("-c").arg(command).current_dir(&project_dir).status()?;
            if !status.success() {
                return Err(CliError::Diagnostics(1));
            }
        }
    }
    Ok(())
}

fn pkg_init(path: Option<PathBuf>, name: Option<String>) -> Result<(), CliError> {
    let dir = path.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(dir.join("src"))?;
    let package_name = name.unwrap_or_else(|| {
        dir.canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "home_project".to_string())
    });
    let manifest_path = dir.join("home.toml");
    if manifest_path.exists() {
        return Err(CliError::ManifestExists(manifest_path.display().to_string()));
    }
    let toml = format!(
        "[package]\nname = \"{package_name}\"\nversion = \"0.1.0\"\nedition = \"2024\"\n\n[dependencies]\n\n[scripts]\ntest = \"home test\"\n"
    );
    std::fs::write(&manifest_path, toml)?;
    let main_path = dir.join("src/main.home");
    if !main_path.exists() {
        std::fs::write(&main_path, "fn main() -> i32 {\n    return 0;\n}\n")?;
    }
    log::info!("created '{}'", manifest_path.display());
    Ok(())
}

fn print_diagnostics(diagnostics: &[home_diag::Diagnostic], path: &Path, source: &str) {
    if diagnostics.is_empty() {
        return;
    }
    eprintln!("{}", render_all(diagnostics, &path.display().to_string(), source));
}

fn exit_on_diagnostics(diagnostics: &[home_diag::Diagnostic]) -> Result<(), CliError> {
    let mut bag = home_diag::DiagnosticBag::new();
    bag.extend(diagnostics.iter().cloned());
    let code = bag.exit_code();
    if code == 0 {
        Ok(())
    } else {
        Err(CliError::Diagnostics(code))
    }
}
