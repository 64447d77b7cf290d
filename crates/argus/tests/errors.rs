//! Error taxonomy: kinds, positions, and stack snapshots.

use argus::{ErrorKind, EvalError, Interpreter, NoPrint, SourceSet};

fn run_err(src: &str) -> EvalError {
    let mut sources = SourceSet::new("example.com/app");
    sources.add_overlay("main.go", src);
    let mut interp = Interpreter::new(sources, |_| true);
    interp.set_writer(NoPrint);
    interp
        .run_entry("example.com/app", "Run")
        .expect_err("evaluation should fail")
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let err = run_err("package main\n\nfunc Run() int {\n\tzero := 0\n\treturn 1 / zero\n}\n");
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert!(err.message.contains("divide by zero"), "got: {}", err.message);
}

#[test]
fn index_out_of_range_is_a_runtime_error() {
    let err = run_err("package main\n\nfunc Run() int {\n\txs := []int{1}\n\treturn xs[3]\n}\n");
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert!(err.message.contains("out of range"), "got: {}", err.message);
}

#[test]
fn unknown_name_is_a_resolution_error_with_position() {
    let err = run_err("package main\n\nfunc Run() int {\n\treturn missing\n}\n");
    assert_eq!(err.kind, ErrorKind::Resolution);
    assert_eq!(err.pos.line, 4, "the error should point at the use site");
    assert!(err.file.contains("main.go"));
}

#[test]
fn break_outside_loop_is_a_control_flow_error() {
    let err = run_err("package main\n\nfunc Run() {\n\tbreak\n}\n");
    assert_eq!(err.kind, ErrorKind::ControlFlow);
}

#[test]
fn labeled_break_is_rejected_by_name() {
    let err = run_err("package main\n\nfunc Run() {\n\tfor {\n\t\tbreak out\n\t}\n}\n");
    assert_eq!(err.kind, ErrorKind::ControlFlow);
    assert!(err.message.contains("out"), "the label should be named: {}", err.message);
}

#[test]
fn exceeding_the_call_depth_limit_fails_cleanly() {
    let src = "package main\n\nfunc loop(n int) int {\n\treturn loop(n + 1)\n}\n\nfunc Run() int {\n\treturn loop(0)\n}\n";
    let mut sources = SourceSet::new("example.com/app");
    sources.add_overlay("main.go", src);
    let mut interp = Interpreter::new(sources, |_| true);
    interp.set_writer(NoPrint);
    interp.set_max_call_depth(32);
    let err = interp
        .run_entry("example.com/app", "Run")
        .expect_err("unbounded recursion must hit the limit");
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert!(err.message.contains("call depth"), "got: {}", err.message);
    assert!(!err.stack.is_empty(), "the error should carry a stack snapshot");
    assert!(
        err.stack.iter().any(|f| f.function.contains("loop")),
        "the snapshot should name the recursing function: {:?}",
        err.stack,
    );
}

#[test]
fn unhashable_map_key_is_a_type_error() {
    let err = run_err(
        "package main\n\nfunc Run() {\n\tm := map[string]int{}\n\tk := []int{1}\n\t_ = m\n\t_ = k\n\tm[k] = 1\n}\n",
    );
    assert_eq!(err.kind, ErrorKind::Type);
    assert!(err.message.contains("not hashable"), "got: {}", err.message);
}

#[test]
fn writing_to_a_nil_map_is_a_runtime_error() {
    let err = run_err("package main\n\nfunc Run() {\n\tvar m map[string]int\n\tm[\"k\"] = 1\n}\n");
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert!(err.message.contains("nil map"), "got: {}", err.message);
}

#[test]
fn assigning_to_a_constant_fails() {
    let err = run_err("package main\n\nconst limit = 3\n\nfunc Run() {\n\tlimit = 4\n}\n");
    assert_eq!(err.kind, ErrorKind::Type);
    assert!(err.message.contains("constant"), "got: {}", err.message);
}

#[test]
fn nil_pointer_dereference_is_a_runtime_error() {
    let err = run_err("package main\n\nfunc Run() int {\n\tvar p *int\n\treturn *p\n}\n");
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert!(err.message.contains("nil pointer"), "got: {}", err.message);
}

#[test]
fn errors_render_position_kind_and_stack() {
    let err = run_err("package main\n\nfunc inner() int {\n\treturn missing\n}\n\nfunc Run() int {\n\treturn inner()\n}\n");
    let rendered = err.to_string();
    assert!(rendered.contains("main.go:4"), "position missing from: {rendered}");
    assert!(rendered.contains("Resolution"), "kind missing from: {rendered}");
    assert!(rendered.contains("inner"), "stack missing from: {rendered}");
}
