//! Struct instances, pointers, method dispatch, embedding, interfaces.

use argus::{ErrorKind, HostValue, Interpreter, NoPrint, SourceSet};

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

fn run_err(src: &str) -> argus::EvalError {
    interp(src)
        .run_entry("example.com/app", "Run")
        .expect_err("evaluation should fail")
}

/// Value receivers observe a copy; pointer receivers mutate the original
/// through shared cells.
#[test]
fn value_and_pointer_receiver_methods() {
    let src = r#"
package main

type C struct {
	n int
}

func (c C) V() int {
	return c.n
}

func (c *C) P() int {
	c.n += 1
	return c.n
}

func Run() (int, int, int) {
	c := C{n: 10}
	a := c.V()
	b := (&c).P()
	d := c.V()
	return a, b, d
}
"#;
    assert_eq!(
        run(src),
        HostValue::Tuple(vec![HostValue::Int(10), HostValue::Int(11), HostValue::Int(11)]),
        "P must mutate c through the pointer; V must see the mutation afterwards",
    );
}

/// After `p := &x`, writes through `p` are observable via `x`, and a
/// second copy `q := p` shares the same cell.
#[test]
fn pointer_identity_across_copies() {
    let src = r#"
package main

func Run() int {
	x := 1
	p := &x
	*p = 2
	q := p
	*q = 3
	return x
}
"#;
    assert_eq!(run(src), HostValue::Int(3));
}

#[test]
fn new_builtin_returns_pointer_to_zero_value() {
    let src = r#"
package main

func Run() int {
	p := new(int)
	*p = 41
	return *p + 1
}
"#;
    assert_eq!(run(src), HostValue::Int(42));
}

#[test]
fn struct_assignment_copies_but_pointers_share() {
    let src = r#"
package main

type Box struct {
	v int
}

func Run() (int, int) {
	a := Box{v: 1}
	b := a
	b.v = 2
	p := &a
	p.v = 9
	return a.v, b.v
}
"#;
    assert_eq!(
        run(src),
        HostValue::Tuple(vec![HostValue::Int(9), HostValue::Int(2)]),
        "b is an independent copy; p aliases a",
    );
}

/// Struct value auto-addressing is NOT performed: calling a
/// pointer-receiver method on a value fails.
#[test]
fn value_cannot_call_pointer_method() {
    let src = r#"
package main

type C struct{}

func (c *C) M() {}

func Run() {
	c := C{}
	c.M()
}
"#;
    let err = run_err(src);
    assert_eq!(err.kind, ErrorKind::Type);
    assert!(
        err.message.contains("pointer method"),
        "unexpected message: {}",
        err.message
    );
}

/// For a value-receiver method, `s.M()` and `(&s).M()` both succeed and
/// observe the same receiver state.
#[test]
fn pointer_auto_derefs_for_value_receiver_methods() {
    let src = r#"
package main

type S struct {
	n int
}

func (s S) Get() int {
	return s.n
}

func Run() (int, int) {
	s := S{n: 7}
	return s.Get(), (&s).Get()
}
"#;
    assert_eq!(run(src), HostValue::Tuple(vec![HostValue::Int(7), HostValue::Int(7)]));
}

/// A typed-nil pointer still resolves methods to method values without
/// dereferencing.
#[test]
fn typed_nil_selector_yields_method_value() {
    let src = r#"
package main

type S struct{}

func (s *S) M() int {
	return 7
}

func Run() int {
	m := (*S)(nil).M
	return m()
}
"#;
    assert_eq!(run(src), HostValue::Int(7));
}

/// Methods of an embedded type promote to the outer type; the receiver is
/// the embedded value.
#[test]
fn embedded_method_promotion() {
    let src = r#"
package main

type Animal struct {
	name string
}

func (a Animal) Name() string {
	return a.name
}

type Dog struct {
	Animal
}

func Run() string {
	d := Dog{Animal{name: "rex"}}
	return d.Name()
}
"#;
    assert_eq!(run(src), HostValue::Str("rex".to_owned()));
}

/// An explicit field shadows a promoted field of the same name.
#[test]
fn explicit_field_shadows_promoted_field() {
    let src = r#"
package main

type Base struct {
	Name string
}

type Wrap struct {
	Base
	Name string
}

func Run() (string, string) {
	w := Wrap{}
	w.Base = Base{Name: "inner"}
	w.Name = "outer"
	return w.Name, w.Base.Name
}
"#;
    assert_eq!(
        run(src),
        HostValue::Tuple(vec![HostValue::Str("outer".to_owned()), HostValue::Str("inner".to_owned())]),
    );
}

#[test]
fn promoted_field_reads_and_writes() {
    let src = r#"
package main

type Inner struct {
	Count int
}

type Outer struct {
	Inner
}

func Run() int {
	o := Outer{}
	o.Count = 5
	o.Count += 2
	return o.Count
}
"#;
    assert_eq!(run(src), HostValue::Int(7), "promotion applies to both reads and writes");
}

/// Calling a method through an interface reaches the same body as the
/// direct call.
#[test]
fn interface_dispatch_reaches_concrete_method() {
    let src = r#"
package main

type Greeter interface {
	Greet() string
}

type Person struct {
	name string
}

func (p Person) Greet() string {
	return "hi " + p.name
}

func Run() (string, string) {
	p := Person{name: "ana"}
	var g Greeter = p
	return g.Greet(), p.Greet()
}
"#;
    assert_eq!(
        run(src),
        HostValue::Tuple(vec![HostValue::Str("hi ana".to_owned()), HostValue::Str("hi ana".to_owned())]),
    );
}

/// A pointer satisfies an interface whose method has a pointer receiver;
/// the bare value does not.
#[test]
fn interface_satisfaction_respects_receiver_kinds() {
    let ok_src = r#"
package main

type G interface {
	Hello()
}

type P struct{}

func (p *P) Hello() {}

func Run() {
	var g G = &P{}
	g.Hello()
}
"#;
    assert_eq!(run(ok_src), HostValue::Nil);

    let bad_src = r#"
package main

type G interface {
	Hello()
}

type P struct{}

func (p *P) Hello() {}

func Run() {
	var g G = P{}
	_ = g
}
"#;
    let err = run_err(bad_src);
    assert_eq!(err.kind, ErrorKind::Type);
    assert!(
        err.message.contains("does not implement"),
        "unexpected message: {}",
        err.message
    );
}

/// Nil satisfies any interface.
#[test]
fn nil_satisfies_interfaces() {
    let src = r#"
package main

type G interface {
	Hello()
}

func Run() bool {
	var g G = nil
	return g == nil
}
"#;
    assert_eq!(run(src), HostValue::Bool(true));
}

#[test]
fn type_assertion_and_type_switch() {
    let src = r#"
package main

func describe(x any) string {
	switch v := x.(type) {
	case nil:
		return "nil"
	case int:
		if v > 0 {
			return "pos"
		}
		return "int"
	case string:
		return v
	default:
		return "other"
	}
}

func Run() (string, string, string, string) {
	return describe(nil), describe(3), describe("s"), describe(1.5)
}
"#;
    assert_eq!(
        run(src),
        HostValue::Tuple(vec![
            HostValue::Str("nil".to_owned()),
            HostValue::Str("pos".to_owned()),
            HostValue::Str("s".to_owned()),
            HostValue::Str("other".to_owned()),
        ]),
    );
}

#[test]
fn two_value_type_assertion_does_not_fail() {
    let src = r#"
package main

func Run() (int, bool, bool) {
	var x any = 4
	n, ok := x.(int)
	_, bad := x.(string)
	return n, ok, bad
}
"#;
    assert_eq!(
        run(src),
        HostValue::Tuple(vec![HostValue::Int(4), HostValue::Bool(true), HostValue::Bool(false)]),
    );
}

#[test]
fn self_referential_struct_zero_value_terminates() {
    let src = r#"
package main

type Node struct {
	next *Node
	v    int
}

func Run() int {
	var n Node
	if n.next == nil {
		return 1
	}
	return 0
}
"#;
    assert_eq!(run(src), HostValue::Int(1), "zero_value must not recurse into struct fields");
}

#[test]
fn methods_on_struct_from_sibling_package() {
    let src = r#"
package main

import "example.com/app/shapes"

func Run() int {
	r := shapes.Rect{W: 3, H: 4}
	return r.Area()
}
"#;
    let shapes = r#"
package shapes

type Rect struct {
	W int
	H int
}

func (r Rect) Area() int {
	return r.W * r.H
}
"#;
    let mut sources = SourceSet::new("example.com/app");
    sources.add_overlay("main.go", src);
    sources.add_overlay("shapes/shapes.go", shapes);
    let mut interp = Interpreter::new(sources, |_| true);
    interp.set_writer(NoPrint);
    let out = interp.run_entry("example.com/app", "Run").expect("evaluation failed");
    assert_eq!(out, HostValue::Int(12));
}
