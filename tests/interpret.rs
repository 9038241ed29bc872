//! Interpreter integration tests
//!
//! Tests the full pipeline: source → lex → parse → interpret

use std::sync::Arc;

use miette::SourceSpan;
use pretty_assertions::assert_eq;

use primer::EvalError;
use primer::interp::{Interpreter, RandomSource, Value};

fn interpreter() -> Interpreter {
    Interpreter::with_random(Arc::new(RandomSource::seeded(7))).quiet()
}

/// Helper to interpret source code and return the last statement's value
fn eval(source: &str) -> Value {
    match interpreter().eval_source(source) {
        Ok(Some(value)) => value,
        Ok(None) => panic!("Expected a value from {:?}", source),
        Err(e) => panic!("Interpretation failed: {}", e),
    }
}

/// Helper to check that interpretation fails
fn eval_err(source: &str) -> EvalError {
    match interpreter().eval_source(source) {
        Ok(v) => panic!("Expected failure, got {:?}", v),
        Err(e) => e,
    }
}

/// Textual form of the result
fn show(source: &str) -> String {
    eval(source).to_string()
}

// ==================== Interpolation ====================

#[test]
fn test_hello_interpolation() {
    assert_eq!(eval(r#""Hello {2+3} World""#), Value::str("Hello 5 World"));
}

#[test]
fn test_interpolation_of_bindings() {
    let source = r#"
let town = Town(name: "Munich", citizens: ["Richard"])
"{town.name} has {town.citizens.count} citizen"
"#;
    assert_eq!(eval(source), Value::str("Munich has 1 citizen"));
}

#[test]
fn test_interpolation_error_points_into_string() {
    let err = eval_err(r#""Hi {ghost}""#);
    assert_eq!(err.kind(), "UnboundNameError");
    assert_eq!(err.span(), Some(SourceSpan::new(5.into(), 5)));
}

#[test]
fn test_print_is_captured() {
    let mut interp = interpreter();
    interp
        .eval_source(r#"print("Hello {2+3} World"); print(1, 2.5, nil)"#)
        .unwrap();
    assert_eq!(
        interp.get_output(),
        &["Hello 5 World".to_string(), "1 2.5 nil".to_string()]
    );
}

// ==================== Arithmetic ====================

#[test]
fn test_arithmetic() {
    assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
    assert_eq!(eval("(1 + 2) * 3"), Value::Int(9));
    assert_eq!(eval("7 / 2"), Value::Int(3));
    assert_eq!(eval("7 % 4"), Value::Int(3));
    assert_eq!(eval("1 + 0.5"), Value::Float(1.5));
    assert_eq!(eval("-3 + 1"), Value::Int(-2));
}

#[test]
fn test_division_by_zero() {
    assert_eq!(eval_err("1 / 0").kind(), "ArithmeticError");
    assert_eq!(eval_err("1 % 0").kind(), "ArithmeticError");
}

#[test]
fn test_overflow() {
    assert_eq!(eval_err("9223372036854775807 + 1").kind(), "ArithmeticError");
}

#[test]
fn test_comparisons_and_logic() {
    assert_eq!(eval("1 < 2 && 2 <= 2"), Value::Bool(true));
    assert_eq!(eval("!(1 == 1) || false"), Value::Bool(false));
    assert_eq!(eval("\"a\" + \"b\" == \"ab\""), Value::Bool(true));
}

#[test]
fn test_unbound_name() {
    assert_eq!(eval_err("y + 1").kind(), "UnboundNameError");
}

// ==================== Optionals ====================

#[test]
fn test_force_unwrap_nil() {
    let err = eval_err("let x: Int? = nil\nx!");
    assert_eq!(err.kind(), "NilUnwrapError");
    assert_eq!(err.span(), Some(SourceSpan::new(18.into(), 2)));
}

#[test]
fn test_force_unwrap_present() {
    assert_eq!(eval("let x: Int? = 4\nx! + 1"), Value::Int(5));
}

#[test]
fn test_coalesce() {
    assert_eq!(eval("let x: Int? = nil\nx ?? 5"), Value::Int(5));
    assert_eq!(eval("let x: Int? = 2\nx ?? 5"), Value::Int(2));
}

#[test]
fn test_coalesce_default_not_evaluated_when_present() {
    assert_eq!(eval("let x: Int? = 2\nx ?? 1 / 0"), Value::Int(2));
}

#[test]
fn test_optional_annotation_wraps_once() {
    insta::assert_snapshot!(show(r#"var nickname: String? = "Bud"; nickname"#), @r#"Optional("Bud")"#);
    insta::assert_snapshot!(show("var nickname: String?; nickname"), @"nil");
    insta::assert_snapshot!(show("some(some(1))"), @"Optional(Optional(1))");
}

#[test]
fn test_optional_chaining() {
    let source = r#"
let town: Town? = Town(name: "Munich", citizens: ["Richard"])
town?.citizens.count
"#;
    insta::assert_snapshot!(show(source), @"Optional(1)");

    let source = r#"
let town: Town? = nil
town?.citizens.count
"#;
    insta::assert_snapshot!(show(source), @"nil");
}

#[test]
fn test_optional_chain_method() {
    let source = r#"
let town: Town? = Town()
town?.fortify()
"#;
    insta::assert_snapshot!(show(source), @r#"Optional("Defenses increased!")"#);
}

#[test]
fn test_optional_chain_on_plain_value() {
    assert_eq!(eval_err("let n = 1\nn?.count").kind(), "TypeError");
}

#[test]
fn test_if_let() {
    let source = r#"
let name: String? = "Bob"
if let n = name { "Hi {n}" } else { "nobody" }
"#;
    assert_eq!(eval(source), Value::str("Hi Bob"));

    let source = r#"
let name: String? = nil
if let n = name { "Hi {n}" } else { "nobody" }
"#;
    assert_eq!(eval(source), Value::str("nobody"));
}

#[test]
fn test_if_let_binding_is_scoped() {
    let source = r#"
let name: String? = "Bob"
if let n = name { n }
n
"#;
    assert_eq!(eval_err(source).kind(), "UnboundNameError");
}

#[test]
fn test_nil_checks() {
    assert_eq!(eval("let x: Int? = 3\nx != nil"), Value::Bool(true));
    assert_eq!(eval("let x: Int? = 3\nx == 3"), Value::Bool(true));
    assert_eq!(eval("let x: Int? = nil\nx == nil"), Value::Bool(true));
}

#[test]
fn test_if_without_else() {
    assert_eq!(eval("if false { 1 }"), Value::nil());
    assert_eq!(eval("if 2 > 1 { \"yes\" } else { \"no\" }"), Value::str("yes"));
}

// ==================== Bindings ====================

#[test]
fn test_let_is_immutable() {
    let mut interp = interpreter();
    interp.eval_source("let x = 1").unwrap();
    let err = interp.eval_source("x = 2").unwrap_err();
    assert_eq!(err.kind(), "ImmutableFieldError");
    assert_eq!(interp.eval_source("x").unwrap(), Some(Value::Int(1)));
}

#[test]
fn test_var_reassign_checks_type() {
    let mut interp = interpreter();
    interp.eval_source("var x: Int = 1").unwrap();
    assert_eq!(interp.eval_source("x = \"one\"").unwrap_err().kind(), "TypeError");
    interp.eval_source("x = 2").unwrap();
    assert_eq!(interp.eval_source("x").unwrap(), Some(Value::Int(2)));
}

#[test]
fn test_failed_statement_leaves_bindings() {
    let mut interp = interpreter();
    interp.eval_source("var xs = [1]").unwrap();
    assert_eq!(
        interp.eval_source("xs.append(1 / 0)").unwrap_err().kind(),
        "ArithmeticError"
    );
    assert_eq!(
        interp.eval_source("xs").unwrap(),
        Some(Value::from(vec![1i64]))
    );
}

#[test]
fn test_failed_input_undoes_earlier_statements() {
    let mut interp = interpreter();
    interp.eval_source("var x = 1").unwrap();
    let err = interp
        .eval_source("x = 2; let n: Int? = nil; n!")
        .unwrap_err();
    assert_eq!(err.kind(), "NilUnwrapError");
    assert_eq!(interp.eval_source("x").unwrap(), Some(Value::Int(1)));
    assert_eq!(interp.eval_source("n").unwrap_err().kind(), "UnboundNameError");
}

#[test]
fn test_failed_input_undoes_record_writes() {
    let mut interp = interpreter();
    interp.eval_source("var town = Town()").unwrap();
    let err = interp
        .eval_source("town.citizens.append(\"Richard\"); ghost")
        .unwrap_err();
    assert_eq!(err.kind(), "UnboundNameError");
    assert_eq!(
        interp.eval_source("town.citizens.count").unwrap(),
        Some(Value::Int(2))
    );
}

#[test]
fn test_failed_input_undoes_writes_through_aliases() {
    let mut interp = interpreter();
    interp
        .eval_source("class Village { var citizens: [String] = [] }\nlet a = Village()\nlet b = a")
        .unwrap();
    let err = interp
        .eval_source("b.citizens.append(\"x\")\nlet fresh = Village()\nfresh.citizens.append(\"y\")\n1 / 0")
        .unwrap_err();
    assert_eq!(err.kind(), "ArithmeticError");
    assert_eq!(interp.eval_source("a.citizens.count").unwrap(), Some(Value::Int(0)));
    assert_eq!(interp.eval_source("fresh").unwrap_err().kind(), "UnboundNameError");
}

#[test]
fn test_failed_input_undoes_declarations() {
    let mut interp = interpreter();
    let err = interp
        .eval_source("struct Pet { var age = 1 }\nlet p = Pet()\np.ghost")
        .unwrap_err();
    assert_eq!(err.kind(), "RecordError");
    assert_eq!(interp.eval_source("Pet()").unwrap_err().kind(), "UnboundNameError");
}

#[test]
fn test_type_annotation_mismatch() {
    assert_eq!(eval_err("let x: Int = \"s\"").kind(), "TypeError");
    assert_eq!(eval("let x: Double = 2\nx"), Value::Float(2.0));
}

// ==================== Records ====================

#[test]
fn test_record_display() {
    insta::assert_snapshot!(
        show(r#"Town(name: "Munich", citizens: ["Richard"])"#),
        @r#"Town(name: "Munich", citizens: ["Richard"])"#
    );
    insta::assert_snapshot!(show("Enemy()"), @"Enemy(health: 100, attackStrength: 10)");
}

#[test]
fn test_town_append_scenario() {
    let source = r#"
var town = Town(name: "Munich", citizens: [])
town.citizens.append("Richard")
town.citizens.append("Tom Hanks")
town.citizens
"#;
    insta::assert_snapshot!(show(source), @r#"["Richard", "Tom Hanks"]"#);
}

#[test]
fn test_struct_copies_on_bind() {
    let source = r#"
var a = Town(name: "A", citizens: [])
var b = a
b.citizens.append("x")
a.citizens.count
"#;
    assert_eq!(eval(source), Value::Int(0));
}

#[test]
fn test_class_aliases_on_bind() {
    let source = r#"
class Village { var citizens: [String] = [] }
let a = Village()
let b = a
b.citizens.append("x")
a.citizens.count
"#;
    assert_eq!(eval(source), Value::Int(1));
}

#[test]
fn test_let_struct_is_frozen() {
    let mut interp = interpreter();
    interp.eval_source("let town = Town()").unwrap();
    let err = interp.eval_source("town.citizens.append(\"x\")").unwrap_err();
    assert_eq!(err.kind(), "ImmutableFieldError");
    insta::assert_snapshot!(
        interp.eval_source("town.citizens").unwrap().unwrap().to_string(),
        @r#"["Catariana", "Louis"]"#
    );
}

#[test]
fn test_let_field_cannot_change() {
    assert_eq!(
        eval_err("var town = Town()\ntown.name = \"Berlin\"").kind(),
        "ImmutableFieldError"
    );
}

#[test]
fn test_var_field_assignment() {
    insta::assert_snapshot!(
        show("var town = Town()\ntown.citizens = [\"z\"]\ntown.citizens"),
        @r#"["z"]"#
    );
}

#[test]
fn test_class_fields_mutable_through_let() {
    assert_eq!(
        eval("let enemy = Enemy()\nenemy.health = 50\nenemy.health"),
        Value::Int(50)
    );
}

#[test]
fn test_fortify() {
    assert_eq!(eval("Town().fortify()"), Value::str("Defenses increased!"));
}

// ==================== Methods ====================

const KINGDOM: &str = r#"
struct Kingdom {
    let name = "Camelot"
    var citizens = ["Catariana", "Louis"]

    func fortify() {
        print("Defenses increased!")
    }

    mutating func harvestRice() {
        citizens.append("Jason")
    }

    func census() -> Int {
        self.citizens.count
    }
}
"#;

#[test]
fn test_method_prints() {
    let mut interp = interpreter();
    interp.eval_source(KINGDOM).unwrap();
    assert_eq!(interp.eval_source("Kingdom().fortify()").unwrap(), None);
    assert_eq!(interp.get_output(), &["Defenses increased!".to_string()]);
}

#[test]
fn test_mutating_method_on_var_struct() {
    let mut interp = interpreter();
    interp.eval_source(KINGDOM).unwrap();
    interp.eval_source("var k = Kingdom()\nlet before = k\nk.harvestRice()").unwrap();
    insta::assert_snapshot!(
        interp.eval_source("k.citizens").unwrap().unwrap().to_string(),
        @r#"["Catariana", "Louis", "Jason"]"#
    );
    assert_eq!(interp.eval_source("k.census()").unwrap(), Some(Value::Int(3)));
    assert_eq!(interp.eval_source("before.census()").unwrap(), Some(Value::Int(2)));
}

#[test]
fn test_mutating_method_on_let_struct_fails() {
    let mut interp = interpreter();
    interp.eval_source(KINGDOM).unwrap();
    interp.eval_source("let k = Kingdom()").unwrap();
    let err = interp.eval_source("k.harvestRice()").unwrap_err();
    assert_eq!(err.kind(), "ImmutableFieldError");
    assert_eq!(interp.eval_source("k.census()").unwrap(), Some(Value::Int(2)));
}

#[test]
fn test_mutating_method_on_temporary_fails() {
    let mut interp = interpreter();
    interp.eval_source(KINGDOM).unwrap();
    assert_eq!(
        interp.eval_source("Kingdom().harvestRice()").unwrap_err().kind(),
        "TypeError"
    );
}

#[test]
fn test_plain_struct_method_cannot_write_fields() {
    let source = r#"
struct Counter {
    var n = 0
    func bump() { n = n + 1 }
}
var c = Counter()
c.bump()
"#;
    assert_eq!(eval_err(source).kind(), "ImmutableFieldError");
}

#[test]
fn test_class_method_changes_every_alias() {
    let source = r#"
class Knight {
    var health = 100
    func takeDamage(amount: Int) {
        health = health - amount
    }
}
let a = Knight()
let b = a
b.takeDamage(amount: 10)
a.takeDamage(amount: 5)
a.health
"#;
    assert_eq!(eval(source), Value::Int(85));
}

#[test]
fn test_method_arguments_are_checked() {
    let source = r#"
class Knight {
    var health = 100
    func takeDamage(amount: Int) { health = health - amount }
}
let k = Knight()
"#;
    let mut interp = interpreter();
    interp.eval_source(source).unwrap();
    assert_eq!(interp.eval_source("k.takeDamage(hits: 3)").unwrap_err().kind(), "TypeError");
    assert_eq!(interp.eval_source("k.takeDamage(amount: \"3\")").unwrap_err().kind(), "TypeError");
    assert_eq!(interp.eval_source("k.takeDamage()").unwrap_err().kind(), "TypeError");
    assert_eq!(interp.eval_source("k.health").unwrap(), Some(Value::Int(100)));
}

#[test]
fn test_failed_method_leaves_fields() {
    let source = r#"
class Vault {
    var coins = 10
    func spend(n: Int) {
        coins = coins - n
        let check: Int? = nil
        check!
    }
}
let v = Vault()
"#;
    let mut interp = interpreter();
    interp.eval_source(source).unwrap();
    assert_eq!(interp.eval_source("v.spend(n: 3)").unwrap_err().kind(), "NilUnwrapError");
    assert_eq!(interp.eval_source("v.coins").unwrap(), Some(Value::Int(10)));
}

#[test]
fn test_method_return_type() {
    let source = r#"
struct Dice {
    var sides = 6
    func describe() -> String { "d{sides}" }
    func broken() -> Int { print("no value") }
}
"#;
    let mut interp = interpreter();
    interp.eval_source(source).unwrap();
    assert_eq!(interp.eval_source("Dice().describe()").unwrap(), Some(Value::str("d6")));
    assert_eq!(interp.eval_source("Dice().broken()").unwrap_err().kind(), "TypeError");
}

#[test]
fn test_runaway_recursion_is_reported() {
    let source = r#"
class Echo {
    func again() -> Int { self.again() }
}
Echo().again()
"#;
    assert_eq!(eval_err(source).kind(), "RecordError");
}

#[test]
fn test_struct_declaration_defaults() {
    let source = r#"
struct Pet {
    let name: String
    var nickname: String?
    var age = 1
}
Pet(name: "Rex")
"#;
    insta::assert_snapshot!(show(source), @r#"Pet(name: "Rex", nickname: nil, age: 1)"#);
}

#[test]
fn test_missing_field() {
    let source = "struct Pet { let name: String }\nPet()";
    assert_eq!(eval_err(source).kind(), "RecordError");
}

#[test]
fn test_reference_cycle_rejected() {
    let source = r#"
class Node { var next: Node? }
let node = Node()
node.next = node
"#;
    assert_eq!(eval_err(source).kind(), "TypeError");
}

// ==================== Random ====================

#[test]
fn test_int_random_in_range() {
    let mut interp = interpreter();
    for _ in 0..50 {
        let value = interp.eval_source("Int.random(in: 1...3)").unwrap();
        let n = value.and_then(|v| v.as_int()).unwrap();
        assert!((1..=3).contains(&n));
    }
}

#[test]
fn test_float_random_in_range() {
    let mut interp = interpreter();
    for _ in 0..50 {
        let value = interp.eval_source("Float.random(in: 1.0..<3.0)").unwrap();
        let x = value.and_then(|v| v.as_float()).unwrap();
        assert!((1.0..3.0).contains(&x));
    }
}

#[test]
fn test_random_builtins() {
    let n = eval("randomInt(4, 4)");
    assert_eq!(n, Value::Int(4));
    assert_eq!(eval_err("Int.random(in: 3...1)").kind(), "RangeError");
    assert_eq!(eval_err("randomFloat(2.0, 2.0)").kind(), "RangeError");
    assert_eq!(eval_err("let r = 1...3").kind(), "TypeError");
}

#[test]
fn test_seeded_interpreters_agree() {
    let mut a = interpreter();
    let mut b = interpreter();
    let source = "Int.random(in: 1...1000)";
    for _ in 0..10 {
        assert_eq!(a.eval_source(source).unwrap(), b.eval_source(source).unwrap());
    }
}

#[test]
fn test_random_element_and_shuffle() {
    insta::assert_snapshot!(show(r#"["only"].randomElement()"#), @r#"Optional("only")"#);
    insta::assert_snapshot!(show("[].randomElement()"), @"nil");

    let source = r#"
var names = ["a", "b", "c"]
names.shuffle()
names.count
"#;
    assert_eq!(eval(source), Value::Int(3));
}

#[test]
fn test_mutation_inside_expression_rejected() {
    assert_eq!(eval_err("[1].append(2)").kind(), "TypeError");
}
