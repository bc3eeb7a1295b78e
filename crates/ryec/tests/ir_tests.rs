//! Generated-IR checks: function shapes, operator lowering, conversion
//! paths and the placement of ARC retain/release calls.

mod common;

use common::{count_occurrences, gen_ir_for_source};

#[test]
fn main_has_the_fixed_name_and_exits_zero() {
    let ir = gen_ir_for_source("set x int <- 3; Print(string(x));").expect("ir");
    assert!(ir.contains("define i32 @main()"), "unexpected IR: {}", ir);
    assert!(ir.contains("ret i32 0"), "main must return 0: {}", ir);
    // `set` declares a module-level global.
    assert!(ir.contains("@x = global i32 0"), "missing global: {}", ir);
    assert!(ir.contains("@Print"), "missing builtin call: {}", ir);
    // int -> string renders through the two-pass snprintf path.
    assert!(ir.contains("@snprintf"), "missing snprintf: {}", ir);
    assert!(ir.contains("@malloc"), "missing malloc: {}", ir);
}

#[test]
fn function_signature_and_int_arithmetic() {
    let ir = gen_ir_for_source("function add(a int, b int) int { return a + b; }").expect("ir");
    assert!(
        ir.contains("define i32 @add(i32 %a, i32 %b)"),
        "unexpected signature: {}",
        ir
    );
    assert!(ir.contains("add i32"), "expected integer add: {}", ir);
}

#[test]
fn float_arithmetic_uses_float_ops() {
    let ir = gen_ir_for_source("function mul(a float, b float) float { return a * b; }")
        .expect("ir");
    assert!(ir.contains("define float @mul(float %a, float %b)"), "{}", ir);
    assert!(ir.contains("fmul float"), "{}", ir);
}

#[test]
fn string_concat_releases_transients_and_cleanup_balances() {
    let ir = gen_ir_for_source("var s string <- \"hi\" + \" there\"; Print(s);").expect("ir");
    assert!(ir.contains("@string_concat"), "{}", ir);

    // Two literal objects are registered, plus the copy passed into
    // Print; the concat inputs, the builtin argument and the on-return
    // cleanup of `s` unregister.
    assert_eq!(count_occurrences(&ir, "call void @RegisterReference"), 3, "{}", ir);
    assert_eq!(count_occurrences(&ir, "call void @UnregisterReference"), 4, "{}", ir);
}

#[test]
fn identical_string_literals_share_one_global() {
    let ir = gen_ir_for_source("Print(\"same\"); Print(\"same\");").expect("ir");
    assert_eq!(count_occurrences(&ir, "c\"same\\00\""), 1, "{}", ir);
}

#[test]
fn from_to_emits_binder_labels_and_signed_compare() {
    let ir = gen_ir_for_source("from i <- 1 to 3 { Print(string(i)); }").expect("ir");
    assert!(ir.contains("break1:"), "{}", ir);
    assert!(ir.contains("continue1:"), "{}", ir);
    assert!(ir.contains("icmp sle i32"), "{}", ir);
    assert!(ir.contains("br i1"), "{}", ir);
}

#[test]
fn if_else_branches_on_the_condition() {
    let ir =
        gen_ir_for_source("var x <- 1; if (x == 1) { x <- 2; } else { x <- 3; }").expect("ir");
    assert!(ir.contains("icmp eq i32"), "{}", ir);
    assert!(ir.contains("then1:"), "{}", ir);
    assert!(ir.contains("else2:"), "{}", ir);
}

#[test]
fn ternary_merges_through_a_phi() {
    let ir = gen_ir_for_source("var c <- true; var x <- c ? 1 : 2;").expect("ir");
    assert!(ir.contains("phi i32"), "{}", ir);
}

#[test]
fn string_equality_calls_the_runtime_and_negates_for_not_equals() {
    let ir = gen_ir_for_source(
        "var a string <- \"x\"; var b string <- \"y\"; var same <- a == b; var diff <- a != b;",
    )
    .expect("ir");
    assert_eq!(count_occurrences(&ir, "@string_equal"), 3, "{}", ir);
    assert!(ir.contains("icmp ne i32"), "{}", ir);
    assert!(ir.contains("icmp eq i32"), "{}", ir);
}

#[test]
fn bool_to_string_selects_between_interned_literals() {
    let ir = gen_ir_for_source("var b <- true; Print(string(b));").expect("ir");
    assert!(ir.contains("select i1"), "{}", ir);
    assert!(ir.contains("c\"true\\00\""), "{}", ir);
    assert!(ir.contains("c\"false\\00\""), "{}", ir);
}

#[test]
fn string_to_primitive_conversions_call_libc() {
    let ir = gen_ir_for_source(
        "var s string <- \"3\"; var i <- int(s); var f <- float(s); var b <- bool(s);",
    )
    .expect("ir");
    assert!(ir.contains("@atoi"), "{}", ir);
    assert!(ir.contains("@atof"), "{}", ir);
    assert!(ir.contains("@strcmp"), "{}", ir);
    assert!(ir.contains("fptrunc double"), "{}", ir);
}

#[test]
fn any_boxing_goes_through_the_class_allocators() {
    let ir = gen_ir_for_source("var a any <- 3; var f any <- 1.5; var i <- int(a);").expect("ir");
    assert!(ir.contains("@int_new"), "{}", ir);
    assert!(ir.contains("@float_new"), "{}", ir);
    assert!(ir.contains("@int_get_value"), "{}", ir);
}

#[test]
fn arrays_use_the_runtime_element_api() {
    let ir = gen_ir_for_source(
        "var a <- make int(3); a[0] <- 7; var x <- a[0]; a->Push(9); var n <- a->GetLength();",
    )
    .expect("ir");
    assert!(ir.contains("@array_new"), "{}", ir);
    assert!(ir.contains("@array_set_raw"), "{}", ir);
    assert!(ir.contains("@array_get_raw"), "{}", ir);
    assert!(ir.contains("@array_push_raw"), "{}", ir);
    assert!(ir.contains("@array_get_length"), "{}", ir);
}

#[test]
fn object_arrays_use_pointer_accessors() {
    let ir = gen_ir_for_source("var a <- make string(2); a[0] <- \"x\"; var s <- a[0];")
        .expect("ir");
    assert!(ir.contains("@array_set_ptr"), "{}", ir);
    assert!(ir.contains("@array_get_ptr"), "{}", ir);
}

#[test]
fn threads_wrap_functions_and_dispatch_methods() {
    let ir = gen_ir_for_source(
        "function work() { } var t <- thread work; t->Start(); t->Join(); t->Kill();",
    )
    .expect("ir");
    assert!(ir.contains("@thread_new(ptr @work)"), "{}", ir);
    assert!(ir.contains("@thread_start"), "{}", ir);
    assert!(ir.contains("@thread_join"), "{}", ir);
    assert!(ir.contains("@thread_kill"), "{}", ir);
}

#[test]
fn returning_a_variable_retains_it_before_cleanup() {
    let ir = gen_ir_for_source(
        "function pick() string { var s string <- \"v\"; return s; }",
    )
    .expect("ir");
    // One register for the literal's initial instance, one for the
    // return-value copy; cleanup releases the local once.
    assert_eq!(count_occurrences(&ir, "call void @RegisterReference"), 2, "{}", ir);
    assert_eq!(count_occurrences(&ir, "call void @UnregisterReference"), 1, "{}", ir);
}

#[test]
fn object_parameters_are_released_on_return() {
    let ir = gen_ir_for_source("function use(s string) { }").expect("ir");
    assert_eq!(count_occurrences(&ir, "call void @UnregisterReference"), 1, "{}", ir);
}

#[test]
fn scope_cleanup_nulls_the_slot() {
    let ir =
        gen_ir_for_source("while (true) { var s string <- \"tmp\"; break; }").expect("ir");
    // The GC statement stores null back into the slot after releasing.
    assert!(ir.contains("store ptr null"), "{}", ir);
}

#[test]
fn verbose_arc_routes_through_the_verbose_entry_points() {
    let _diag_guard = ryec::diagnostics::suppress();
    let mut options = ryec::CompileOptions::new("test.rye".to_string());
    options.use_fingerprints = false;
    options.verbose_arc = true;
    let ir = ryec::compile_to_ir("var s string <- \"x\";", &options).expect("ir");
    assert!(ir.contains("@RegisterReferenceVerbose"), "{}", ir);
    assert!(ir.contains("@UnregisterReferenceVerbose"), "{}", ir);
}

#[test]
fn fingerprint_naming_keeps_main_and_builtins_stable() {
    let _diag_guard = ryec::diagnostics::suppress();
    let options = ryec::CompileOptions::new("test.rye".to_string());
    assert!(options.use_fingerprints);
    let ir = ryec::compile_to_ir("function f(a int) int { return a; } Print(\"x\");", &options)
        .expect("ir");
    assert!(ir.contains("define i32 @main()"), "{}", ir);
    assert!(ir.contains("@Print"), "{}", ir);
    // Non-builtin functions are named by fingerprint.
    assert!(ir.contains("F_f(int)_int"), "{}", ir);
}

#[test]
fn compile_writes_an_ll_file() {
    let _diag_guard = ryec::diagnostics::suppress();
    let dir = tempfile::tempdir().expect("tempdir");
    let src_path = dir.path().join("hello.rye");
    std::fs::write(&src_path, "Print(\"hello\");").expect("write source");

    let options = ryec::CompileOptions::new(src_path.to_string_lossy().into_owned());
    let out = ryec::compile(&options).expect("compile");
    assert!(out.ends_with("hello.ll"));
    let ir = std::fs::read_to_string(out).expect("read output");
    assert!(ir.contains("define i32 @main()"));
}
