//! The intrinsic registry and the foreign-value bridge.

use argus::{
    ErrorKind, HostFunction, HostParam, HostValue, Interpreter, NoPrint, QueueInput, SourceSet,
};

fn interp(src: &str) -> Interpreter {
    let mut sources = SourceSet::new("example.com/app");
    sources.add_overlay("main.go", src);
    let mut interp = Interpreter::new(sources, |_| true);
    interp.set_writer(NoPrint);
    interp
}

/// A registered intrinsic intercepts a bodyless declaration by its fully
/// qualified name, after argument evaluation.
#[test]
fn intrinsic_intercepts_resolved_call() {
    let src = r#"
package main

func magic(a, b int) int

func Run() int {
	return magic(20, 21)
}
"#;
    let mut interp = interp(src);
    interp.register_intrinsic("example.com/app.magic", |args| {
        let mut total = 1;
        for arg in args {
            if let HostValue::Int(v) = arg {
                total += v;
            }
        }
        Ok(HostValue::Int(total))
    });
    let out = interp.run_entry("example.com/app", "Run").expect("evaluation failed");
    assert_eq!(out, HostValue::Int(42), "20 + 21 + 1 via the host callback");
}

/// Without a registration, a bodyless declaration answers symbolically.
#[test]
fn unregistered_stub_goes_symbolic() {
    let src = r#"
package main

func external() int

func Run() int {
	v := external()
	_ = v
	return 5
}
"#;
    let out = interp(src).run_entry("example.com/app", "Run").expect("stub must not fail");
    assert_eq!(out, HostValue::Int(5));
}

/// An intrinsic error surfaces as a Foreign evaluation error with the
/// callee name in the message.
#[test]
fn intrinsic_error_surfaces_as_foreign_error() {
    let src = r#"
package main

func flaky() int

func Run() int {
	return flaky()
}
"#;
    let mut interp = interp(src);
    interp.register_intrinsic("example.com/app.flaky", |_args| Err("no backend".to_owned()));
    let err = interp
        .run_entry("example.com/app", "Run")
        .expect_err("host error should propagate");
    assert_eq!(err.kind, ErrorKind::Foreign);
    assert!(err.message.contains("flaky"), "unexpected message: {}", err.message);
}

/// Special forms receive the raw argument syntax before any evaluation:
/// arguments that would explode never run.
#[test]
fn special_form_receives_unevaluated_syntax() {
    let src = r#"
package main

func capture(a int, b int) int

func boom() int {
	panic("must not evaluate")
}

func Run() int {
	return capture(1+2, boom())
}
"#;
    let mut interp = interp(src);
    interp.register_special("example.com/app.capture", |args, _scope| {
        Ok(HostValue::Int(args.len() as i64))
    });
    let out = interp.run_entry("example.com/app", "Run").expect("evaluation failed");
    assert_eq!(out, HostValue::Int(2), "the callback sees two syntax nodes, unevaluated");
}

/// Special forms can inspect the call-site scope.
#[test]
fn special_form_reads_the_scope() {
    let src = r#"
package main

func snapshot() int

func Run() int {
	x := 41
	return snapshot() + x
}
"#;
    let mut interp = interp(src);
    interp.register_special("example.com/app.snapshot", |_args, scope| {
        match scope.lookup("x") {
            Some(HostValue::Int(v)) => Ok(HostValue::Int(v - 40)),
            other => Err(format!("x not visible: {other:?}")),
        }
    });
    let out = interp.run_entry("example.com/app", "Run").expect("evaluation failed");
    assert_eq!(out, HostValue::Int(42));
}

/// A host function declared through the bridge converts arguments per
/// parameter and widens numerics.
#[test]
fn host_function_converts_arguments() {
    let src = r#"
package main

func hypot(a float64, b float64) float64

func Run() float64 {
	return hypot(3, 4)
}
"#;
    let mut interp = interp(src);
    interp.register_host_fn(
        "example.com/app.hypot",
        HostFunction::new("hypot", vec![HostParam::Float, HostParam::Float], false, |args| {
            let (HostValue::Float(a), HostValue::Float(b)) = (&args[0], &args[1]) else {
                return Err("bad arguments".to_owned());
            };
            Ok(HostValue::Float((a * a + b * b).sqrt()))
        }),
    );
    let out = interp.run_entry("example.com/app", "Run").expect("evaluation failed");
    assert_eq!(out, HostValue::Float(5.0), "ints widen to floats across the bridge");
}

/// Passing a pointer to a struct parameter materializes a host slot and
/// writes mutations back by field tag.
#[test]
fn host_function_writes_struct_back_by_tag() {
    let src = r#"
package main

type Counter struct {
	N int `json:"n"`
}

func bump(c *Counter)

func Run() int {
	c := Counter{N: 1}
	bump(&c)
	return c.N
}
"#;
    let mut interp = interp(src);
    interp.register_host_fn(
        "example.com/app.bump",
        HostFunction::new("bump", vec![HostParam::StructRef("Counter".to_owned())], false, |args| {
            let HostValue::Struct { name, fields } = &mut args[0] else {
                return Err("want a struct slot".to_owned());
            };
            assert_eq!(name, "Counter");
            for (key, value) in fields.iter_mut() {
                if key == "n" {
                    if let HostValue::Int(v) = value {
                        *v += 41;
                    }
                }
            }
            Ok(HostValue::Nil)
        }),
    );
    let out = interp.run_entry("example.com/app", "Run").expect("evaluation failed");
    assert_eq!(out, HostValue::Int(42), "the host-side mutation lands back in the instance");
}

/// A panic inside a host callback re-enters the interpreter as a panic
/// and is recoverable there.
#[test]
fn host_panic_is_recoverable_in_source() {
    let src = r#"
package main

func explode()

func Run() (msg string) {
	defer func() {
		if r := recover(); r != nil {
			msg = r.(string)
		}
	}()
	explode()
	return "unreached"
}
"#;
    let mut interp = interp(src);
    interp.register_host_fn(
        "example.com/app.explode",
        HostFunction::new("explode", vec![], false, |_args| panic!("host went down")),
    );
    let out = interp.run_entry("example.com/app", "Run").expect("recover should absorb it");
    assert_eq!(out, HostValue::Str("host went down".to_owned()));
}

/// `readln` pulls from the host-supplied input handle.
#[test]
fn readln_reads_queued_input() {
    let src = r#"
package main

func Run() string {
	a := readln()
	b := readln()
	return a + "|" + b
}
"#;
    let mut interp = interp(src);
    interp.set_input(QueueInput::new(["first", "second"]));
    let out = interp.run_entry("example.com/app", "Run").expect("evaluation failed");
    assert_eq!(out, HostValue::Str("first|second".to_owned()));
}

/// Method-shaped fully-qualified names intercept method calls.
#[test]
fn intrinsic_intercepts_method_calls() {
    let src = r#"
package main

type Mux struct{}

func (m *Mux) Handle(path string) int {
	return 0
}

func Run() int {
	m := &Mux{}
	return m.Handle("/health")
}
"#;
    let mut interp = interp(src);
    interp.register_intrinsic("(*example.com/app.Mux).Handle", |args| {
        match args.first() {
            Some(HostValue::Str(path)) if path == "/health" => Ok(HostValue::Int(200)),
            other => Err(format!("unexpected args: {other:?}")),
        }
    });
    let out = interp.run_entry("example.com/app", "Run").expect("evaluation failed");
    assert_eq!(out, HostValue::Int(200), "the intrinsic replaces the source body");
}
