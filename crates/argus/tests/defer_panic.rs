//! Deferred calls, panics, recover, named returns.

use argus::{CollectStringPrint, HostValue, Interpreter, NoPrint, SourceSet};

fn interp(src: &str) -> Interpreter {
    let mut sources = SourceSet::new("example.com/app");
    sources.add_overlay("main.go", src);
    let mut interp = Interpreter::new(sources, |_| true);
    interp.set_writer(NoPrint);
    interp
}

fn run(src: &str) -> HostValue {
    interp(src).run_entry("example.com/app", "Run").expect("evaluation failed")
}

/// Defers pushed D1, D2, D3 execute D3, D2, D1.
#[test]
fn deferred_calls_run_in_lifo_order() {
    let src = r#"
package main

func Run() (out string) {
	defer func() { out = out + "1" }()
	defer func() { out = out + "2" }()
	defer func() { out = out + "3" }()
	return ""
}
"#;
    assert_eq!(run(src), HostValue::Str("321".to_owned()));
}

/// A deferred mutation of a named return is visible to the caller.
#[test]
fn named_return_observes_deferred_mutation() {
    let src = r#"
package main

func f() (x int) {
	defer func() { x = x + 1 }()
	return 41
}

func Run() int {
	return f()
}
"#;
    assert_eq!(run(src), HostValue::Int(42));
}

/// A recovered panic stops the unwind inside the recovering frame; no
/// output is produced past the panic site and evaluation returns
/// normally.
#[test]
fn panic_recovered_in_deferred_function() {
    let src = r#"
package main

func Run() {
	defer func() { recover() }()
	panic("x")
	println("unreached")
}
"#;
    let collector = CollectStringPrint::new();
    let mut sources = SourceSet::new("example.com/app");
    sources.add_overlay("main.go", src);
    let mut interp = Interpreter::new(sources, |_| true);
    interp.set_writer(collector.clone());
    let result = interp.run_entry("example.com/app", "Run");
    assert!(result.is_ok(), "recovered panic must not escape: {result:?}");
    assert_eq!(collector.output(), "", "nothing after the panic site may print");
}

/// An unrecovered panic surfaces as an error carrying the payload.
#[test]
fn unrecovered_panic_escapes_as_error() {
    let src = r#"
package main

func Run() {
	panic("boom")
}
"#;
    let err = interp(src)
        .run_entry("example.com/app", "Run")
        .expect_err("panic should escape");
    assert!(err.message.contains("boom"), "payload missing from: {}", err.message);
}

/// A panic unwinds through intermediate frames, running their defers,
/// until a defer recovers; the recovering frame returns its named
/// returns.
#[test]
fn panic_unwinds_through_frames_and_recover_stops_it() {
    let src = r#"
package main

func inner() {
	panic("boom")
}

func middle() (msg string) {
	defer func() {
		if r := recover(); r != nil {
			msg = "caught:" + r.(string)
		}
	}()
	inner()
	return "unreached"
}

func Run() string {
	return middle()
}
"#;
    assert_eq!(run(src), HostValue::Str("caught:boom".to_owned()));
}

/// Defers of every unwound frame run, outermost last.
#[test]
fn unwinding_runs_defers_of_each_frame() {
    let src = r#"
package main

var trail = ""

func inner() {
	defer func() { trail = trail + "i" }()
	panic("x")
}

func outer() {
	defer func() { trail = trail + "o" }()
	inner()
}

func Run() string {
	defer func() { recover() }()
	defer func() { trail = trail + "r" }()
	outer()
	return ""
}
"#;
    let mut interp = interp(src);
    let result = interp.run_entry("example.com/app", "Run");
    assert!(result.is_ok(), "recover at the top should absorb the panic: {result:?}");
    let trail = interp.global("example.com/app", "trail").expect("trail variable");
    assert_eq!(trail, HostValue::Str("ior".to_owned()), "defers fire innermost first");
}

/// `recover()` outside any deferred call returns nil and clears nothing.
#[test]
fn recover_outside_defer_returns_nil() {
    let src = r#"
package main

func Run() bool {
	return recover() == nil
}
"#;
    assert_eq!(run(src), HostValue::Bool(true));
}

/// A fresh panic raised inside a deferred call supersedes the original.
#[test]
fn panic_in_defer_supersedes_original() {
    let src = r#"
package main

func Run() {
	defer func() { panic("second") }()
	panic("first")
}
"#;
    let err = interp(src)
        .run_entry("example.com/app", "Run")
        .expect_err("superseding panic should escape");
    assert!(
        err.message.contains("second"),
        "the later panic should win: {}",
        err.message
    );
}

/// After a recovered panic, a frame without named returns hands back zero
/// values.
#[test]
fn recovered_frame_returns_zero_values() {
    let src = r#"
package main

func f() int {
	defer func() { recover() }()
	panic("x")
}

func Run() int {
	return f() + 5
}
"#;
    assert_eq!(run(src), HostValue::Int(5), "f returns int's zero after recovery");
}

/// Deferred calls capture their environment at defer time and replay at
/// exit.
#[test]
fn deferred_call_sees_mutations_of_captured_variables() {
    let src = r#"
package main

func Run() (n int) {
	x := 1
	defer func() { n = x }()
	x = 9
	return 0
}
"#;
    assert_eq!(run(src), HostValue::Int(9), "the defer reads x at execution time");
}
