use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use rox::error::{ErrorKind, LoxError};
use rox::interpreter::Interpreter;
use rox::parser::Parser;
use rox::resolver::Resolver;
use rox::scanner::scan;
use rox::Config;

/// Runs `source` through the whole pipeline and returns what it printed plus
/// the runtime outcome.  Static errors fail the test.
fn execute(source: &str, config: Config) -> (String, Result<(), LoxError>) {
    let tokens = scan(source).expect("Tokenize should work on valid program");
    let program = Parser::new(tokens)
        .parse()
        .expect("Parse should work on valid program");
    let locals = Resolver::new()
        .resolve(&program)
        .expect("Resolve should work on valid program");

    let output = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::with_config(output.clone(), config);
    let result = interpreter.interpret(&program, locals);

    let output = String::from_utf8(output.take()).expect("Output should be valid UTF-8");
    (output, result)
}

fn test_valid_program(source: &str, expected_output: &str) {
    let (output, result) = execute(source, Config::default());
    if let Err(e) = result {
        panic!("Interpret should work on valid program, got: {}", e);
    }
    assert_eq!(output, expected_output);
}

/// Expects a runtime error rendered as `message\n[line N]`, after
/// `expected_output` was printed.
fn test_runtime_error(source: &str, expected_output: &str, expected_error: &str) {
    let (output, result) = execute(source, Config::default());
    let error = result.expect_err("program should fail at runtime");

    assert_eq!(error.kind(), ErrorKind::Runtime);
    assert_eq!(error.to_string(), expected_error);
    assert_eq!(output, expected_output);
}

#[test]
fn test_arithmetic_and_display() {
    let source = r#"
    print 1 + 2;
    print 5 / 2;
    print -(3 * 4) + 0.5;
    print "con" + "cat";
    print 1 / 0;
    print 10 >= 10;
    print !nil;
    "#;
    test_valid_program(source, "3\n2.5\n-11.5\nconcat\ninf\ntrue\ntrue\n");
}

#[test]
fn test_equality_never_coerces() {
    let source = r#"
    print nil == nil;
    print 0 == false;
    print "a" == "a";
    print 1 == "1";
    print nil != false;
    fun f() {}
    var g = f;
    print f == g;
    "#;
    test_valid_program(source, "true\nfalse\ntrue\nfalse\ntrue\ntrue\n");
}

#[test]
fn test_logical_operators_return_operands() {
    let source = r#"
    print nil or "fallback";
    print 0 and "zero is truthy";
    print false and undefined;
    print "left" or undefined;
    "#;
    test_valid_program(source, "fallback\nzero is truthy\nfalse\nleft\n");
}

#[test]
fn test_fib() {
    let source = r#"
    fun fib(n) {
        if (n <= 1) return n;
        return fib(n - 1) + fib(n - 2);
    }

    for (var i = 0; i < 10; i = i + 1) {
        print fib(i);
    }
    "#;
    test_valid_program(source, "0\n1\n1\n2\n3\n5\n8\n13\n21\n34\n");
}

#[test]
fn test_closure_counter() {
    let source = r#"
    fun makeCounter() {
        var i = 0;
        fun count() {
            i = i + 1;
            return i;
        }
        return count;
    }

    var counter = makeCounter();
    print counter(); // 1
    print counter(); // 2
    var other = makeCounter();
    print other();   // 1
    "#;
    test_valid_program(source, "1\n2\n1\n");
}

#[test]
fn test_functions_cant_break_scope() {
    let source = r#"
    var a = "global";
    {
        fun showA() {
            print a;
        }

        showA();
        var a = "block";
        showA();
        print a;
    }
    "#;
    test_valid_program(source, "global\nglobal\nblock\n");
}

#[test]
fn test_nested_blocks_and_shadowing() {
    let source = r#"
    var a = "outer a";
    var b = "outer b";
    {
        var a = "middle a";
        {
            var b = "inner b";
            a = a + "!";
            print a;
            print b;
        }
        print a;
        print b;
    }
    print a;
    "#;
    test_valid_program(
        source,
        "middle a!\ninner b\nmiddle a!\nouter b\nouter a\n",
    );
}

#[test]
fn test_return_unwinds_loops() {
    let source = r#"
    fun firstOver(limit) {
        var i = 0;
        while (true) {
            {
                if (i * i > limit) return i;
            }
            i = i + 1;
        }
    }
    print firstOver(50);

    fun nothing() { return; }
    print nothing();
    "#;
    test_valid_program(source, "8\nnil\n");
}

#[test]
fn test_inheritance_greeting() {
    let source = r#"
    class A { greet() { return "hi " + this.name; } }
    class B < A { init(n) { this.name = n; } }
    print B("world").greet();
    "#;
    test_valid_program(source, "hi world\n");
}

#[test]
fn test_super_calls_immediate_superclass() {
    let source = r#"
    class A {
        method() { print "A method"; }
    }
    class B < A {
        method() { print "B method"; }
        test() { super.method(); }
    }
    class C < B {}
    C().test();
    "#;
    test_valid_program(source, "A method\n");
}

#[test]
fn test_this_stays_subclass_instance_through_super() {
    let source = r#"
    class A {
        name() { return "A"; }
        describe() { return "I am " + this.name(); }
    }
    class B < A {
        name() { return "B"; }
        describe() { return super.describe() + "!"; }
    }
    class C < B {
        name() { return "C"; }
    }
    print C().describe();
    print B().describe();
    "#;
    test_valid_program(source, "I am C!\nI am B!\n");
}

#[test]
fn test_initializer_semantics() {
    let source = r#"
    class Foo {
        init(x) {
            this.x = x;
            if (x > 1) return;
            this.small = true;
        }
    }

    var f = Foo(2);
    print f.x;
    print f.init(5) == f;
    print f.x;
    print Foo(1).small;
    "#;
    test_valid_program(source, "2\ntrue\n5\ntrue\n");
}

#[test]
fn test_fields_and_bound_methods() {
    let source = r#"
    class Box {
        get() { return this.value; }
    }

    var box = Box();
    box.value = "stored";
    var get = box.get;
    print get();

    box.get = "field wins";
    print box.get;
    "#;
    test_valid_program(source, "stored\nfield wins\n");
}

#[test]
fn test_value_display() {
    let source = r#"
    fun f() {}
    class K {}
    print f;
    print clock;
    print K;
    print K();
    print nil;
    print 3.0;
    "#;
    test_valid_program(source, "<fn f>\n<native fn>\nK\nK instance\nnil\n3\n");
}

#[test]
fn test_clock_is_monotonic() {
    let source = r#"
    var start = clock();
    var later = clock();
    print later >= start;
    print start >= 0;
    "#;
    test_valid_program(source, "true\ntrue\n");
}

#[test]
fn test_arity_mismatch() {
    test_runtime_error(
        "fun add(a, b) { return a + b; }\nprint add(1, 2);\nadd(1);",
        "3\n",
        "Expected 2 arguments but got 1.\n[line 3]",
    );
    test_runtime_error(
        "fun add(a, b) { return a + b; }\nadd(1, 2, 3);",
        "",
        "Expected 2 arguments but got 3.\n[line 2]",
    );
    test_runtime_error(
        "class P { init(a, b) {} }\nP(1);",
        "",
        "Expected 2 arguments but got 1.\n[line 2]",
    );
    test_runtime_error(
        "class Q {}\nQ(1);",
        "",
        "Expected 0 arguments but got 1.\n[line 2]",
    );
}

#[test]
fn test_runtime_error_halts_program() {
    test_runtime_error(
        "print 1;\nprint -\"x\";\nprint 2;",
        "1\n",
        "Operand must be a number.\n[line 2]",
    );
}

#[test]
fn test_operand_errors() {
    test_runtime_error(
        "print 1 + \"a\";",
        "",
        "Operands must be two numbers or two strings.\n[line 1]",
    );
    test_runtime_error(
        "print \"a\" < \"b\";",
        "",
        "Operands must be numbers.\n[line 1]",
    );
    test_runtime_error("print nil * 2;", "", "Operands must be numbers.\n[line 1]");
}

#[test]
fn test_call_and_property_errors() {
    test_runtime_error(
        "\"not a function\"();",
        "",
        "Can only call functions and classes.\n[line 1]",
    );
    test_runtime_error(
        "var x = 1;\nprint x.y;",
        "",
        "Only instances have properties.\n[line 2]",
    );
    test_runtime_error(
        "var x = 1;\nx.y = 2;",
        "",
        "Only instances have fields.\n[line 2]",
    );
    test_runtime_error(
        "class E {}\nprint E().missing;",
        "",
        "Undefined property 'missing'.\n[line 2]",
    );
}

#[test]
fn test_class_errors() {
    test_runtime_error(
        "var NotAClass = \"nope\";\nclass A < NotAClass {}",
        "",
        "Superclass must be a class.\n[line 2]",
    );
    test_runtime_error(
        "class A {}\nclass B < A { m() { return super.missing; } }\nB().m();",
        "",
        "Undefined property 'missing'.\n[line 2]",
    );
}

#[test]
fn test_undefined_variables() {
    test_runtime_error("print nope;", "", "Undefined variable 'nope'.\n[line 1]");
    test_runtime_error("nope = 1;", "", "Undefined variable 'nope'.\n[line 1]");
    test_runtime_error("var a = a;", "", "Undefined variable 'a'.\n[line 1]");
}

#[test]
fn test_unbounded_recursion_is_a_stack_overflow() {
    test_runtime_error(
        "fun f() { f(); }\nf();",
        "",
        "Stack overflow.\n[line 1]",
    );
}

#[test]
fn test_call_depth_is_configurable() {
    let source = r#"
    fun down(n) {
        if (n == 0) return "bottom";
        return down(n - 1);
    }
    print down(30);
    print down(100);
    "#;

    let (output, result) = execute(source, Config { max_call_depth: 64 });
    let error = result.expect_err("depth 101 exceeds the limit");

    assert_eq!(output, "bottom\n");
    assert_eq!(error.message(), "Stack overflow.");
}

#[test]
fn test_deep_recursion_within_default_limit() {
    let source = r#"
    fun sum(n) {
        if (n == 0) return 0;
        return n + sum(n - 1);
    }
    print sum(1000);
    "#;
    test_valid_program(source, "500500\n");
}
