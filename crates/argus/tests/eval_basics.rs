//! Evaluator basics: expressions, declarations, control flow, closures.
//!
//! Every test parses a single-file package from an in-memory overlay and
//! calls its `Run` entry point, asserting on the bridged result.

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

#[test]
fn arithmetic_and_precedence() {
    let out = run("package main\n\nfunc Run() int {\n\treturn 2 + 3*4 - 10/2\n}\n");
    assert_eq!(out, HostValue::Int(9), "2 + 12 - 5 should be 9");
}

#[test]
fn string_concatenation_and_len() {
    let out = run("package main\n\nfunc Run() int {\n\ts := \"ab\" + \"cde\"\n\treturn len(s)\n}\n");
    assert_eq!(out, HostValue::Int(5));
}

#[test]
fn variables_persist_and_shadow() {
    let src = r#"
package main

func Run() int {
	x := 1
	{
		x := 100
		_ = x
	}
	x = x + 1
	return x
}
"#;
    assert_eq!(run(src), HostValue::Int(2), "inner shadowing must not leak out");
}

#[test]
fn var_declaration_without_initializer_uses_zero_value() {
    let src = r#"
package main

func Run() (int, string, bool) {
	var a int
	var s string
	var b bool
	return a, s, b
}
"#;
    assert_eq!(
        run(src),
        HostValue::Tuple(vec![HostValue::Int(0), HostValue::Str(String::new()), HostValue::Bool(false)]),
    );
}

#[test]
fn const_group_with_iota_repetition() {
    let src = r#"
package main

const (
	A = iota
	B
	C
)

func Run() int {
	return A + B*10 + C*100
}
"#;
    assert_eq!(run(src), HostValue::Int(210), "iota should count specs: 0, 1, 2");
}

/// `false && E` never evaluates E; `true || E` never evaluates E.
#[test]
fn short_circuit_operators_skip_the_right_side() {
    let src = r#"
package main

func boom() bool {
	panic("must not evaluate")
}

func Run() bool {
	if false && boom() {
		return false
	}
	return true || boom()
}
"#;
    assert_eq!(run(src), HostValue::Bool(true));
}

#[test]
fn if_else_chain_with_init_statement() {
    let src = r#"
package main

func classify(n int) string {
	if m := n % 3; m == 0 {
		return "zero"
	} else if m == 1 {
		return "one"
	} else {
		return "two"
	}
}

func Run() string {
	return classify(3) + classify(4) + classify(5)
}
"#;
    assert_eq!(run(src), HostValue::Str("zeroonetwo".to_owned()));
}

#[test]
fn three_clause_for_loop() {
    let src = r#"
package main

func Run() int {
	sum := 0
	for i := 0; i < 5; i++ {
		sum += i
	}
	return sum
}
"#;
    assert_eq!(run(src), HostValue::Int(10));
}

#[test]
fn break_and_continue_in_loops() {
    let src = r#"
package main

func Run() int {
	sum := 0
	for i := 0; i < 10; i++ {
		if i%2 == 0 {
			continue
		}
		if i > 6 {
			break
		}
		sum += i
	}
	return sum
}
"#;
    assert_eq!(run(src), HostValue::Int(9), "1 + 3 + 5, then break at 7");
}

/// Closures created in a loop body observe per-iteration copies of the
/// loop variables.
#[test]
fn loop_variables_are_per_iteration_for_closures() {
    let src = r#"
package main

func Run() int {
	fns := []func() int{}
	for i := 0; i < 3; i++ {
		fns = append(fns, func() int { return i })
	}
	return fns[0]() + fns[1]()*10 + fns[2]()*100
}
"#;
    assert_eq!(run(src), HostValue::Int(210), "captured 0, 1, 2 - not 2, 2, 2");
}

#[test]
fn switch_with_tag_default_and_fallthrough() {
    let src = r#"
package main

func bucket(n int) string {
	switch n {
	case 1:
		fallthrough
	case 2:
		return "small"
	case 3:
		return "three"
	default:
		return "big"
	}
}

func Run() string {
	return bucket(1) + "," + bucket(3) + "," + bucket(9)
}
"#;
    assert_eq!(run(src), HostValue::Str("small,three,big".to_owned()));
}

#[test]
fn switch_without_tag_selects_first_true_case() {
    let src = r#"
package main

func Run() string {
	n := 15
	switch {
	case n < 10:
		return "low"
	case n < 20:
		return "mid"
	default:
		return "high"
	}
}
"#;
    assert_eq!(run(src), HostValue::Str("mid".to_owned()));
}

#[test]
fn range_over_slice_map_string_and_int() {
    let src = r#"
package main

func Run() (int, int, int, int) {
	slice := 0
	for i, v := range []int{10, 20, 30} {
		slice += i + v
	}
	m := 0
	for _, v := range map[string]int{"a": 1, "b": 2} {
		m += v
	}
	s := 0
	for i, r := range "ab" {
		s += i + r
	}
	n := 0
	for i := range 4 {
		n += i
	}
	return slice, m, s, n
}
"#;
    assert_eq!(
        run(src),
        HostValue::Tuple(vec![
            HostValue::Int(63),
            HostValue::Int(3),
            HostValue::Int(1 + 97 + 98),
            HostValue::Int(6),
        ]),
    );
}

/// The range-over-func form: a yield callback drives the body, and
/// `break` stops the iteration.
#[test]
fn range_over_yield_function_with_break() {
    let src = r#"
package main

func Range2(yield func(int) bool) {
	yield(1)
	yield(2)
	yield(3)
}

func Run() int {
	sum := 0
	for v := range Range2 {
		if v == 2 {
			break
		}
		sum += v
	}
	return sum
}
"#;
    assert_eq!(run(src), HostValue::Int(1), "break at 2 keeps only the first value");
}

/// `return` inside a range-over-func body propagates out of the loop and
/// the enclosing function.
#[test]
fn range_over_yield_function_with_return() {
    let src = r#"
package main

func Range2(yield func(int) bool) {
	yield(1)
	yield(2)
}

func Run() int {
	for v := range Range2 {
		if v == 2 {
			return 42
		}
	}
	return 0
}
"#;
    assert_eq!(run(src), HostValue::Int(42));
}

#[test]
fn maps_store_lookup_delete_and_two_value_form() {
    let src = r#"
package main

func Run() (int, bool, int, bool) {
	m := map[string]int{"a": 1}
	m["b"] = 2
	delete(m, "a")
	v, ok := m["b"]
	missing, mok := m["a"]
	return v, ok, missing, mok
}
"#;
    assert_eq!(
        run(src),
        HostValue::Tuple(vec![
            HostValue::Int(2),
            HostValue::Bool(true),
            HostValue::Int(0),
            HostValue::Bool(false),
        ]),
        "missing keys yield the value type's zero and ok=false",
    );
}

#[test]
fn slices_append_copy_index_and_slice_expressions() {
    let src = r#"
package main

func Run() (int, int, int) {
	xs := []int{1, 2, 3, 4}
	ys := xs[1:3]
	zs := append(ys, 9)
	n := copy(zs, []int{7})
	return ys[0] + ys[1], zs[0] + zs[1] + zs[2], n
}
"#;
    assert_eq!(
        run(src),
        HostValue::Tuple(vec![HostValue::Int(5), HostValue::Int(19), HostValue::Int(1)]),
        "ys is [2 3]; zs is [7 3 9] after copy",
    );
}

#[test]
fn println_writes_through_the_writer() {
    let src = r#"
package main

func Run() {
	println("hello", 42)
}
"#;
    let collector = CollectStringPrint::new();
    let mut sources = SourceSet::new("example.com/app");
    sources.add_overlay("main.go", src);
    let mut interp = Interpreter::new(sources, |_| true);
    interp.set_writer(collector.clone());
    interp.run_entry("example.com/app", "Run").expect("evaluation failed");
    assert_eq!(collector.output(), "hello 42\n");
}

#[test]
fn parallel_assignment_evaluates_all_sources_first() {
    let src = r#"
package main

func Run() (int, int) {
	a, b := 1, 2
	a, b = b, a
	return a, b
}
"#;
    assert_eq!(run(src), HostValue::Tuple(vec![HostValue::Int(2), HostValue::Int(1)]));
}

/// Evaluating the same program twice produces the same result.
#[test]
fn evaluation_is_deterministic() {
    let src = r#"
package main

func Run() int {
	total := 0
	for i := 0; i < 4; i++ {
		total = total*10 + i
	}
	return total
}
"#;
    let first = run(src);
    let second = run(src);
    assert_eq!(first, second);
    assert_eq!(first, HostValue::Int(123));
}

#[test]
fn type_conversions_between_builtins() {
    let src = r#"
package main

func Run() (int, float64, string, int) {
	f := float64(3)
	i := int(f / 2.0)
	s := string(rune(65))
	b := []byte("hi")
	return i, f, s, int(b[0])
}
"#;
    assert_eq!(
        run(src),
        HostValue::Tuple(vec![
            HostValue::Int(1),
            HostValue::Float(3.0),
            HostValue::Str("A".to_owned()),
            HostValue::Int(104),
        ]),
    );
}

#[test]
fn variadic_functions_collect_and_spread() {
    let src = r#"
package main

func sum(base int, xs ...int) int {
	total := base
	for _, x := range xs {
		total += x
	}
	return total
}

func Run() (int, int) {
	direct := sum(100, 1, 2, 3)
	spread := sum(0, []int{4, 5}...)
	return direct, spread
}
"#;
    assert_eq!(run(src), HostValue::Tuple(vec![HostValue::Int(106), HostValue::Int(9)]));
}

#[test]
fn min_max_and_clear_builtins() {
    let src = r#"
package main

func Run() (int, int, int) {
	m := map[string]int{"a": 1, "b": 2}
	clear(m)
	return min(3, 1, 2), max(3, 1, 2), len(m)
}
"#;
    assert_eq!(
        run(src),
        HostValue::Tuple(vec![HostValue::Int(1), HostValue::Int(3), HostValue::Int(0)]),
    );
}
