//! Generic functions and types: inference, instantiation, constraints.

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

/// `T` infers from a slice argument's element type.
#[test]
fn inference_through_slice_element() {
    let src = r#"
package main

func First[T any](xs []T) T {
	return xs[0]
}

func Run() string {
	return First([]string{"a", "b"})
}
"#;
    assert_eq!(run(src), HostValue::Str("a".to_owned()));
}

/// `map[K]V` infers both parameters at once.
#[test]
fn inference_through_map_key_and_value() {
    let src = r#"
package main

func Keys[K comparable, V any](m map[K]V) []K {
	out := []K{}
	for k := range m {
		out = append(out, k)
	}
	return out
}

func Run() int {
	return len(Keys(map[string]int{"a": 1, "b": 2}))
}
"#;
    assert_eq!(run(src), HostValue::Int(2));
}

/// `*T` infers from the pointee type.
#[test]
fn inference_through_pointer() {
    let src = r#"
package main

func Deref[T any](p *T) T {
	return *p
}

func Run() int {
	x := 5
	return Deref(&x)
}
"#;
    assert_eq!(run(src), HostValue::Int(5));
}

/// Conflicting bindings for one parameter fail.
#[test]
fn conflicting_inference_fails() {
    let src = r#"
package main

func Same[T any](a T, b T) T {
	return a
}

func Run() {
	Same(1, "x")
}
"#;
    let err = interp(src)
        .run_entry("example.com/app", "Run")
        .expect_err("int vs string must not unify");
    assert_eq!(err.kind, ErrorKind::Generics);
    assert!(err.message.contains("conflicting"), "unexpected message: {}", err.message);
}

/// `S ~[]E` propagates: once S lands on a concrete slice type, E refines
/// from its element type.
#[test]
fn constraint_propagation_through_tilde_slice() {
    let src = r#"
package main

func Head[S ~[]E, E any](xs S) E {
	return xs[0]
}

func Run() int {
	return Head([]int{7, 8})
}
"#;
    assert_eq!(run(src), HostValue::Int(7));
}

/// Explicit instantiation supplies the type arguments directly.
#[test]
fn explicit_instantiation_of_generic_function() {
    let src = r#"
package main

func Zero[T any]() []T {
	return []T{}
}

func Run() int {
	f := Zero[int]
	return len(f())
}
"#;
    assert_eq!(run(src), HostValue::Int(0));
}

/// A generic function with no inferable parameter fails without explicit
/// type arguments.
#[test]
fn uninferable_call_without_type_arguments_fails() {
    let src = r#"
package main

func Zero[T any]() []T {
	return []T{}
}

func Run() {
	Zero()
}
"#;
    let err = interp(src)
        .run_entry("example.com/app", "Run")
        .expect_err("nothing constrains T");
    assert_eq!(err.kind, ErrorKind::Generics);
}

/// Generic struct types instantiate through index syntax and infer field
/// types from the bound arguments.
#[test]
fn generic_struct_instantiation() {
    let src = r#"
package main

type Pair[K comparable, V any] struct {
	Key K
	Val V
}

func Run() (string, int) {
	p := Pair[string, int]{Key: "a", Val: 1}
	return p.Key, p.Val
}
"#;
    assert_eq!(
        run(src),
        HostValue::Tuple(vec![HostValue::Str("a".to_owned()), HostValue::Int(1)]),
    );
}

/// Wrong type-argument arity on a generic type is a Generics error.
#[test]
fn wrong_number_of_type_arguments_fails() {
    let src = r#"
package main

type Pair[K comparable, V any] struct {
	Key K
	Val V
}

func Run() {
	_ = Pair[string]{}
}
"#;
    let err = interp(src)
        .run_entry("example.com/app", "Run")
        .expect_err("one argument for two parameters");
    assert_eq!(err.kind, ErrorKind::Generics);
    assert!(
        err.message.contains("type arguments"),
        "unexpected message: {}",
        err.message
    );
}

/// Union constraints admit any listed term.
#[test]
fn union_constraint_admits_listed_types() {
    let src = r#"
package main

func Add[T int | float64](a T, b T) T {
	return a + b
}

func Run() int {
	return Add(20, 22)
}
"#;
    assert_eq!(run(src), HostValue::Int(42));
}

/// Union constraints reject types outside the list.
#[test]
fn union_constraint_rejects_unlisted_type() {
    let src = r#"
package main

func Add[T int | float64](a T, b T) T {
	return a + b
}

func Run() {
	Add("x", "y")
}
"#;
    let err = interp(src)
        .run_entry("example.com/app", "Run")
        .expect_err("string is not in the union");
    assert_eq!(err.kind, ErrorKind::Generics);
    assert!(err.message.contains("constraint"), "unexpected message: {}", err.message);
}

/// Generic methods on instantiated receivers see the receiver's type
/// arguments.
#[test]
fn methods_on_generic_struct_receivers() {
    let src = r#"
package main

type Stack[T any] struct {
	items []T
}

func (s *Stack[T]) Push(v T) {
	s.items = append(s.items, v)
}

func (s *Stack[T]) Len() int {
	return len(s.items)
}

func Run() int {
	s := &Stack[int]{}
	s.Push(1)
	s.Push(2)
	return s.Len()
}
"#;
    assert_eq!(run(src), HostValue::Int(2));
}

/// A generic alias instantiates by evaluating its underlying expression
/// with the parameters bound.
#[test]
fn generic_alias_instantiation() {
    let src = r#"
package main

type List[T any] = []T

func Run() int {
	xs := List[int]{1, 2, 3}
	return len(xs)
}
"#;
    assert_eq!(run(src), HostValue::Int(3));
}
