//! In-process integration tests exercising the pipeline end to end, driving
//! whole programs through it rather than unit-testing individual passes.
//!
//! These use `home-codegen`'s `trial` feature (an in-memory mmap loader,
//! enabled only as a dev-dependency here) to actually execute a compiled
//! program's bytes and assert on the result, since this workspace never
//! invokes a system linker.

use home_base::Interner;
use home_borrow::BorrowChecker;
use home_cache::{CacheKey, CacheStore};
use home_codegen::{lower_module, trial::run_trial};
use home_compile::{compile_unit, interpret, run_pool, CompileJob, CompileSession};
use home_diag::DiagnosticBag;
use home_lexer::Lexer;
use home_parser::{Arena, Parser};
use home_pass::PassManager;
use home_types::TypeChecker;

/// Runs a source string all the way to a trial-executable object and
/// returns the entry function's return value, bypassing `home-compile`'s
/// cache/bytes-only driver since the trial loader needs the raw
/// `ObjectModule` and `Interner` that `compile_unit` doesn't expose.
fn run_to_completion(source: &str, entry_name: &str) -> i64 {
    let mut strings = Interner::new();
    let (tokens, lex_errors) = Lexer::new(source, &mut strings).tokenize();
    assert!(lex_errors.is_empty(), "unexpected lex errors: {lex_errors:?}");

    let arena = Arena::new();
    let (module, parse_errors) = Parser::new(tokens, &arena, &mut strings).parse_module();
    assert!(parse_errors.is_empty(), "unexpected parse errors: {parse_errors:?}");

    let (module, _stats) = PassManager::new(home_pass::OptLevel::O1).run(&module, &arena, &mut strings);

    let mut diagnostics = DiagnosticBag::new();
    let typed = TypeChecker::new(&mut strings, &mut diagnostics).check_module(&module);
    let drop_plan = BorrowChecker::new(&strings, &typed, &typed.interner, &mut diagnostics).check_module(&module);
    assert!(!diagnostics.has_errors(), "unexpected type/borrow errors");

    let entry = strings.intern(entry_name);
    let object = lower_module(&module, &typed, &drop_plan, &mut strings, entry).expect("lowering a well-typed module never fails");
    run_trial(&object, &strings).expect("trial execution of a well-formed object")
}

#[test]
fn e1_arithmetic_program_executes_to_the_expected_value() {
    let result = run_to_completion("fn main() -> i32 { return 1 + 2 * 3; }", "main");
    assert_eq!(result, 7);
}

#[test]
fn e2_a_called_function_contributes_to_the_result() {
    let src = "fn add1(x: i32) -> i32 { return x + 1; } fn main() -> i32 { return add1(41); }";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 42);
}

#[test]
fn e3_a_loop_accumulates_the_expected_total() {
    let src = "fn main() -> i32 { let mut i = 0; let mut total = 0; while i < 5 { total = total + i; i = i + 1; } return total; }";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 10);
}

#[test]
fn e4_a_type_error_never_reaches_codegen() {
    let session = CompileSession::default();
    let result = compile_unit("fn main() -> i32 { return true; }", &session, None, &[]).expect("pipeline itself does not error");
    assert!(result.object_bytes.is_none());
    assert!(!result.diagnostics.is_empty());
}

#[test]
fn e5_a_cache_hit_returns_byte_identical_output_and_skips_recompilation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CacheStore::new(dir.path(), 64 * 1024 * 1024);
    let session = CompileSession::default();
    let source = "fn main() -> i32 { return 9; }";

    let first = compile_unit(source, &session, Some(&store), &[]).unwrap();
    assert!(!first.from_cache);
    let second = compile_unit(source, &session, Some(&store), &[]).unwrap();
    assert!(second.from_cache);
    assert_eq!(first.object_bytes, second.object_bytes);
}

#[test]
fn e6_changing_the_opt_level_misses_the_cache() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CacheStore::new(dir.path(), 64 * 1024 * 1024);
    let source = "fn main() -> i32 { return 9; }";

    let mut o0 = CompileSession::default();
    o0.opt_level = home_pass::OptLevel::O0;
    let mut o2 = CompileSession::default();
    o2.opt_level = home_pass::OptLevel::O2;

    let first = compile_unit(source, &o0, Some(&store), &[]).unwrap();
    let second = compile_unit(source, &o2, Some(&store), &[]).unwrap();
    assert!(!first.from_cache);
    assert!(!second.from_cache);
}

#[test]
fn e7_the_worker_pool_compiles_every_unit_and_preserves_order() {
    let session = CompileSession::default();
    let jobs = vec![
        CompileJob { unit_name: "one".to_string(), source: "fn main() -> i32 { return 1; }".to_string() },
        CompileJob { unit_name: "two".to_string(), source: "fn main() -> i32 { return 2; }".to_string() },
        CompileJob { unit_name: "three".to_string(), source: "fn main() -> i32 { return 3; }".to_string() },
        CompileJob { unit_name: "four".to_string(), source: "fn main() -> i32 { return 4; }".to_string() },
    ];
    let results = run_pool(jobs, &session, None, 3);
    let names: Vec<&str> = results.iter().map(|r| r.unit_name.as_str()).collect();
    assert_eq!(names, vec!["one", "two", "three", "four"]);
    for r in &results {
        assert!(r.result.as_ref().unwrap().object_bytes.is_some());
    }
}

#[test]
fn e8_interpret_evaluates_without_emitting_an_object() {
    let outcome = interpret("fn main() -> i32 { return 6 * 7; }", "main");
    assert!(outcome.diagnostics.is_empty());
    match outcome.value {
        Some(home_comptime::ComptimeValue::Int(v)) => assert_eq!(v, 42),
        other => panic!("expected Int(42), got {other:?}"),
    }
}

#[test]
fn e9_a_parse_error_is_reported_and_interpretation_stops() {
    let outcome = interpret("fn main( {", "main");
    assert!(outcome.value.is_none());
    assert!(!outcome.diagnostics.is_empty());
}

#[test]
fn e11_a_macro_invocation_expands_before_codegen() {
    let src = "macro double(x) { x + x } fn main() -> i32 { return double!(21); }";
    let session = CompileSession::default();
    let result = compile_unit(src, &session, None, &[]).expect("pipeline itself does not error");
    assert!(result.diagnostics.is_empty(), "unexpected diagnostics: {:?}", result.diagnostics);
    assert!(result.object_bytes.is_some());
}

#[test]
fn e12_an_undefined_macro_invocation_is_reported_through_the_driver() {
    let session = CompileSession::default();
    let result = compile_unit("macro add(a, b) { a + b } fn main() -> i32 { return add!(1); }", &session, None, &[])
        .expect("pipeline itself does not error");
    assert!(result.object_bytes.is_none());
    assert!(result.diagnostics.iter().any(|d| d.code.starts_with("H07")));
}

#[test]
fn struct_literal_and_field_access_sum_to_the_expected_value() {
    let src = "struct Point { x: i32, y: i32 }\nfn main() -> i32 {\n  let p = Point { x: 10, y: 20 };\n  return p.x + p.y;\n}";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 30);
}

#[test]
fn enum_with_payload_and_match_selects_the_bound_value() {
    let src = "enum Opt { None, Some(i32) }\nfn main() -> i32 {\n  let o = Opt.Some(42);\n  return match o { Opt.None => 0, Opt.Some(v) => v };\n}";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 42);
}

#[test]
fn array_indexing_reads_the_expected_element() {
    let src = "fn main() -> i32 { let a: [i32; 3] = [10, 20, 30]; return a[1]; }";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 20);
}

#[test]
fn try_operator_propagates_the_success_payload() {
    let src = "enum Res { Ok(i32), Err(i32) }\nfn step() -> Res { return Res.Ok(7); }\nfn main() -> i32 { let v = step()?; return v; }";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 7);
}

#[test]
fn conflicting_mutable_borrows_fail_to_compile() {
    let src = "fn main() {\n  let mut x = 1;\n  let r = &mut x;\n  let s = &mut x;\n  *r = 2;\n}";
    let session = CompileSession::default();
    let result = compile_unit(src, &session, None, &[]).expect("pipeline itself does not error");
    assert!(result.object_bytes.is_none());
    assert!(result.diagnostics.iter().any(|d| d.code.starts_with("H04") || d.code.starts_with("H05")));
}

#[test]
fn numeric_cast_truncates_to_the_narrower_width() {
    let src = "fn main() -> i32 { let x: i64 = 257; let y = x as i8; return y as i32; }";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 1);
}

#[test]
fn tuple_literal_fields_are_readable_back_in_order() {
    let src = "fn main() -> i32 { let t = (10, 32); return t.0 + t.1; }";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 42);
}

#[test]
fn for_loop_over_an_exclusive_range_sums_the_expected_total() {
    let src = "fn main() -> i32 { let mut total = 0; for i in 0..5 { total = total + i; } return total; }";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 10);
}

#[test]
fn for_loop_over_an_inclusive_range_includes_the_endpoint() {
    let src = "fn main() -> i32 { let mut total = 0; for i in 1..=3 { total = total + i; } return total; }";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 6);
}

#[test]
fn break_exits_a_loop_before_it_would_otherwise_finish() {
    let src = "fn main() -> i32 { let mut i = 0; let mut total = 0; while true { if i >= 3 { break; } total = total + i; i = i + 1; } return total; }";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 3);
}

#[test]
fn continue_skips_the_rest_of_the_current_iteration() {
    let src = "fn main() -> i32 { let mut total = 0; for i in 0..5 { if i == 2 { continue; } total = total + i; } return total; }";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 8);
}

#[test]
fn a_string_literal_binding_compiles_and_executes_without_touching_its_contents() {
    let src = "fn main() -> i32 { let s = \"home\"; return 42; }";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 42);
}

#[test]
fn destructuring_let_over_a_tuple_binds_each_element() {
    let src = "fn main() -> i32 { let (a, b) = (10, 32); return a + b; }";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 42);
}

#[test]
fn destructuring_let_over_a_nested_tuple_binds_the_inner_elements() {
    let src = "fn main() -> i32 { let (a, (b, c)) = (1, (2, 3)); return a + b + c; }";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 6);
}

#[test]
fn a_tuple_pattern_in_match_binds_both_elements() {
    let src = "fn main() -> i32 { let t = (4, 5); return match t { (x, y) => x * y }; }";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 20);
}

#[test]
fn a_struct_pattern_in_match_binds_its_named_fields() {
    let src = "struct Point { x: i32, y: i32 }\nfn main() -> i32 {\n  let p = Point { x: 6, y: 7 };\n  return match p { Point { x, y } => x * y };\n}";
    let result = run_to_completion(src, "main");
    assert_eq!(result, 42);
}

#[test]
fn e10_cache_keys_are_stable_for_identical_inputs_and_differ_by_source() {
    let a = CacheKey::build("fn main() -> i32 { return 1; }", "0.1.0", "O0", &[], &[]);
    let b = CacheKey::build("fn main() -> i32 { return 1; }", "0.1.0", "O0", &[], &[]);
    let c = CacheKey::build("fn main() -> i32 { return 2; }", "0.1.0", "O0", &[], &[]);
    assert_eq!(a.hex(), b.hex());
    assert_ne!(a.hex(), c.hex());
}
