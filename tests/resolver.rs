#[cfg(test)]
mod resolver_tests {
    use rox as lox;

    use lox::ast::{Locals, Program};
    use lox::error::{ErrorKind, LoxError};
    use lox::expr::Expr;
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::scan;
    use lox::stmt::Stmt;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Program {
        let tokens = scan(source).expect("no lexical errors");
        Parser::new(tokens).parse().expect("no syntax errors")
    }

    fn resolve(source: &str) -> Result<Locals, Vec<LoxError>> {
        Resolver::new().resolve(&parse(source))
    }

    fn resolve_errors(source: &str) -> Vec<String> {
        resolve(source)
            .expect_err("resolution errors")
            .iter()
            .map(|e| {
                assert_eq!(e.kind(), ErrorKind::Resolve);
                e.to_string()
            })
            .collect()
    }

    #[test]
    fn test_globals_are_not_recorded() {
        let locals = resolve("var a = 1; print a; a = 2;").expect("resolves");

        assert!(locals.is_empty());
    }

    #[test]
    fn test_block_locals_get_hop_counts() {
        let program = parse("{ var a = 1; { print a; } }");
        let locals = Resolver::new().resolve(&program).expect("resolves");

        // { var a; { print a; } } → the read is one scope out.
        let Stmt::Block(outer) = &program.statements[0] else {
            panic!("expected block");
        };
        let Stmt::Block(inner) = &outer[1] else {
            panic!("expected inner block");
        };
        let Stmt::Print(read) = &inner[0] else {
            panic!("expected print");
        };

        let id = read.id().expect("variable has an id");
        assert_eq!(locals.get(&id), Some(&1));
    }

    #[test]
    fn test_closure_captures_declaring_scope() {
        let program = parse(
            "fun outer() { var x = 1; fun inner() { return x; } return inner; }",
        );
        let locals = Resolver::new().resolve(&program).expect("resolves");

        let Stmt::Function(outer) = &program.statements[0] else {
            panic!("expected function");
        };
        let Stmt::Function(inner) = &outer.body[1] else {
            panic!("expected nested function");
        };
        let Stmt::Return {
            value: Some(read), ..
        } = &inner.body[0]
        else {
            panic!("expected return");
        };

        // `x` lives in outer's call frame, one hop from inner's.
        assert_eq!(locals.get(&read.id().expect("id")), Some(&1));

        // `inner` is read from outer's own frame.
        let Stmt::Return {
            value: Some(Expr::Variable { id, .. }),
            ..
        } = &outer.body[2]
        else {
            panic!("expected return of inner");
        };
        assert_eq!(locals.get(id), Some(&0));
    }

    #[test]
    fn test_read_in_own_initializer() {
        assert_eq!(
            resolve_errors("var a = 1; { var a = a + 1; print a; }"),
            vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."]
        );
    }

    #[test]
    fn test_global_self_reference_is_allowed() {
        assert!(resolve("var a = a;").is_ok());
    }

    #[test]
    fn test_redeclaration_in_local_scope() {
        assert_eq!(
            resolve_errors("fun f(a) { var a; }\n{ var b; var b; }"),
            vec![
                "[line 1] Error at 'a': Already a variable with this name in this scope.",
                "[line 2] Error at 'b': Already a variable with this name in this scope.",
            ]
        );

        // Globals may be redeclared freely.
        assert!(resolve("var c; var c;").is_ok());
    }

    #[test]
    fn test_top_level_return() {
        assert_eq!(
            resolve_errors("return 1;"),
            vec!["[line 1] Error at 'return': Can't return from top-level code."]
        );
    }

    #[test]
    fn test_misplaced_this_and_super() {
        assert_eq!(
            resolve_errors(
                "print this;\nfun f() { super.g(); }\nclass A { m() { super.m(); } }"
            ),
            vec![
                "[line 1] Error at 'this': Can't use 'this' outside of a class.",
                "[line 2] Error at 'super': Can't use 'super' outside of a class.",
                "[line 3] Error at 'super': Can't use 'super' in a class with no superclass.",
            ]
        );
    }

    #[test]
    fn test_class_cannot_inherit_from_itself() {
        assert_eq!(
            resolve_errors("class A < A {}"),
            vec!["[line 1] Error at 'A': A class can't inherit from itself."]
        );
    }

    #[test]
    fn test_all_errors_are_reported_together() {
        let errors = resolve("return;\nprint this;\n{ var x = x; }").expect_err("three errors");

        let lines: Vec<Option<usize>> = errors.iter().map(|e| e.line()).collect();
        assert_eq!(lines, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_this_and_super_distances() {
        let source = "class A { m() {} }\nclass B < A { m() { super.m(); return this; } }";
        let program = parse(source);
        let locals = Resolver::new().resolve(&program).expect("resolves");

        let Stmt::Class { methods, .. } = &program.statements[1] else {
            panic!("expected class");
        };
        let body = &methods[0].body;

        // method frame → `this` frame → `super` frame
        let Stmt::Expression(Expr::Call { callee, .. }) = &body[0] else {
            panic!("expected super call");
        };
        assert_eq!(locals.get(&callee.id().expect("super id")), Some(&2));

        let Stmt::Return {
            value: Some(this), ..
        } = &body[1]
        else {
            panic!("expected return this");
        };
        assert_eq!(locals.get(&this.id().expect("this id")), Some(&1));
    }
}
