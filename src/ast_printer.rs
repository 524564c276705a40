use crate::expr::{Expr, LiteralValue, Visitor};
use crate::token::Token;

/// Converts an expression to the Crafting‑Interpreters prefix form, e.g.
/// `(* (- 123.0) (group 45.67))`.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(expr: &Expr) -> String {
        expr.accept(&mut AstPrinter)
    }

    fn parenthesize(&mut self, name: &str, parts: &[&Expr]) -> String {
        let mut s = format!("({}", name);
        for part in parts {
            s.push(' ');
            s.push_str(&part.accept(self));
        }
        s.push(')');
        s
    }
}

impl Visitor<String> for AstPrinter {
    fn visit_assign(&mut self, _expr: &Expr, name: &Token, value: &Expr) -> String {
        format!("(= {} {})", name.lexeme, value.accept(self))
    }

    fn visit_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> String {
        self.parenthesize(&operator.lexeme, &[left, right])
    }

    fn visit_call(&mut self, callee: &Expr, _paren: &Token, arguments: &[Expr]) -> String {
        let mut s = format!("(call {}", callee.accept(self));
        for arg in arguments {
            s.push(' ');
            s.push_str(&arg.accept(self));
        }
        s.push(')');
        s
    }

    fn visit_get(&mut self, object: &Expr, name: &Token) -> String {
        format!("(. {} {})", object.accept(self), name.lexeme)
    }

    fn visit_grouping(&mut self, inner: &Expr) -> String {
        self.parenthesize("group", &[inner])
    }

    fn visit_literal(&mut self, value: &LiteralValue) -> String {
        match value {
            LiteralValue::True => "true".into(),

            LiteralValue::False => "false".into(),

            LiteralValue::Nil => "nil".into(),

            LiteralValue::Str(s) => s.clone(),

            LiteralValue::Number(n) => {
                if n.fract() == 0.0 {
                    // 3.0 → "3.0"
                    format!("{:.1}", n)
                } else {
                    n.to_string()
                }
            }
        }
    }

    fn visit_logical(&mut self, left: &Expr, operator: &Token, right: &Expr) -> String {
        self.parenthesize(&operator.lexeme, &[left, right])
    }

    fn visit_set(&mut self, object: &Expr, name: &Token, value: &Expr) -> String {
        format!(
            "(= {} {} {})",
            object.accept(self),
            name.lexeme,
            value.accept(self)
        )
    }

    fn visit_super(&mut self, _expr: &Expr, _keyword: &Token, method: &Token) -> String {
        format!("(super {})", method.lexeme)
    }

    fn visit_this(&mut self, _expr: &Expr, _keyword: &Token) -> String {
        "this".into()
    }

    fn visit_unary(&mut self, operator: &Token, right: &Expr) -> String {
        self.parenthesize(&operator.lexeme, &[right])
    }

    fn visit_variable(&mut self, _expr: &Expr, name: &Token) -> String {
        name.lexeme.clone()
    }
}
