#[cfg(test)]
mod parser_tests {
    use rox as lox;

    use lox::ast::Program;
    use lox::ast_printer::AstPrinter;
    use lox::error::{ErrorKind, LoxError};
    use lox::expr::{Expr, LiteralValue};
    use lox::parser::Parser;
    use lox::scanner::scan;
    use lox::stmt::Stmt;
    use pretty_assertions::assert_eq;

    fn parse_program(source: &str) -> Result<Program, Vec<LoxError>> {
        let tokens = scan(source).expect("no lexical errors");
        Parser::new(tokens).parse()
    }

    fn print_expr(source: &str) -> String {
        let tokens = scan(source).expect("no lexical errors");
        let expr = Parser::new(tokens)
            .parse_expression()
            .expect("valid expression");
        AstPrinter::print(&expr)
    }

    fn error_strings(source: &str) -> Vec<String> {
        parse_program(source)
            .expect_err("syntax errors")
            .iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn test_precedence_and_grouping() {
        assert_eq!(print_expr("-123 * (45.67)"), "(* (- 123.0) (group 45.67))");
        assert_eq!(print_expr("1 + 2 * 3 - 4"), "(- (+ 1.0 (* 2.0 3.0)) 4.0)");
        assert_eq!(
            print_expr("1 < 2 == !false"),
            "(== (< 1.0 2.0) (! false))"
        );
    }

    #[test]
    fn test_expression_must_reach_end_of_input() {
        let tokens = scan("1 2 )").expect("no lexical errors");
        let errors = Parser::new(tokens)
            .parse_expression()
            .expect_err("trailing tokens");

        let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["[line 1] Error at '2': Expect end of expression."]
        );
    }

    #[test]
    fn test_logical_and_assignment() {
        assert_eq!(print_expr("a = b or c and nil"), "(= a (or b (and c nil)))");
        assert_eq!(print_expr("a = b = \"x\""), "(= a (= b x))");
    }

    #[test]
    fn test_calls_properties_and_super() {
        assert_eq!(
            print_expr("f(1, g())(2)"),
            "(call (call f 1.0 (call g)) 2.0)"
        );
        assert_eq!(print_expr("a.b.c = this"), "(= (. a b) c this)");
        assert_eq!(print_expr("super.init(x)"), "(call (super init) x)");
    }

    #[test]
    fn test_for_desugars_to_while() {
        let program = parse_program("for (var i = 0; i < 3; i = i + 1) print i;")
            .expect("valid program");

        assert_eq!(program.len(), 1);

        let Stmt::Block(outer) = &program.statements[0] else {
            panic!(
                "expected an enclosing block, got {:?}",
                program.statements[0]
            );
        };
        assert_eq!(outer.len(), 2);
        assert!(matches!(outer[0], Stmt::Var { .. }));

        let Stmt::While { condition, body } = &outer[1] else {
            panic!("expected a while loop, got {:?}", outer[1]);
        };
        assert_eq!(AstPrinter::print(condition), "(< i 3.0)");

        let Stmt::Block(inner) = body.as_ref() else {
            panic!("expected body + increment block, got {:?}", body);
        };
        assert!(matches!(inner[0], Stmt::Print(_)));
        assert!(matches!(inner[1], Stmt::Expression(Expr::Assign { .. })));
    }

    #[test]
    fn test_empty_for_clauses_loop_forever() {
        let program = parse_program("for (;;) print 1;").expect("valid program");

        let Stmt::While { condition, .. } = &program.statements[0] else {
            panic!(
                "expected a bare while loop, got {:?}",
                program.statements[0]
            );
        };
        assert_eq!(*condition, Expr::Literal(LiteralValue::True));
    }

    #[test]
    fn test_class_declaration() {
        let source = "class B < A { init(n) { this.n = n; } get() { return this.n; } }";
        let program = parse_program(source).expect("valid program");

        let Stmt::Class {
            name,
            superclass,
            methods,
        } = &program.statements[0]
        else {
            panic!("expected a class, got {:?}", program.statements[0]);
        };

        assert_eq!(name.lexeme, "B");
        assert!(matches!(
            superclass,
            Some(Expr::Variable { name, .. }) if name.lexeme == "A"
        ));

        let names: Vec<&str> = methods.iter().map(|m| m.name.lexeme.as_str()).collect();
        assert_eq!(names, vec!["init", "get"]);
        assert_eq!(methods[0].params.len(), 1);
    }

    #[test]
    fn test_recovers_and_reports_every_error() {
        let errors = error_strings("var = 1;\nprint 2;\nprint (3;\nvar ok = 4;\nfun (");

        assert_eq!(
            errors,
            vec![
                "[line 1] Error at '=': Expect variable name.",
                "[line 3] Error at ';': Expect ')' after expression.",
                "[line 5] Error at '(': Expect function name.",
            ]
        );
    }

    #[test]
    fn test_missing_semicolon_at_end() {
        let errors = error_strings("print 1");

        assert_eq!(
            errors,
            vec!["[line 1] Error at end: Expect ';' after value."]
        );
    }

    #[test]
    fn test_invalid_assignment_target_does_not_panic() {
        let errors = parse_program("1 + 2 = 3; a + b = c; print;")
            .expect_err("invalid targets");

        let messages: Vec<String> = errors.iter().map(|e| e.message()).collect();
        assert_eq!(
            messages,
            vec![
                "Invalid assignment target.",
                "Invalid assignment target.",
                "Expect expression.",
            ]
        );
        assert!(errors.iter().all(|e| e.kind() == ErrorKind::Parse));
    }

    #[test]
    fn test_too_many_arguments() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("f({});", args.join(", "));

        let errors = parse_program(&source).expect_err("too many arguments");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "Can't have more than 255 arguments.");
    }

    #[test]
    fn test_too_many_parameters() {
        let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
        let source = format!("fun f({}) {{}}", params.join(", "));

        let errors = parse_program(&source).expect_err("too many parameters");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "Can't have more than 255 parameters.");
    }

    #[test]
    fn test_expression_ids_are_unique() {
        let tokens = scan("a = b; c;").expect("no lexical errors");
        let mut parser = Parser::new(tokens).with_first_id(10);
        let program = parser.parse().expect("valid program");

        let mut ids = Vec::new();
        for stmt in &program.statements {
            if let Stmt::Expression(expr) = stmt {
                ids.extend(expr.id());
                if let Expr::Assign { value, .. } = expr {
                    ids.extend(value.id());
                }
            }
        }

        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| id.0 >= 10));
        // The discarded `a` variable node also consumed an id.
        assert_eq!(parser.next_id(), 14);
    }
}
