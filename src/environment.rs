use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One runtime scope frame.  Frames form a chain through `enclosing` up to
/// the globals; closures keep their defining chain alive through the `Rc`.
///
/// Frames are reference counted, not traced, so a frame that ends up holding
/// a closure over itself is never freed.  That happens for a function declared
/// inside a block or another function (it is bound in the very frame it
/// captures) and for the methods of a class declared in a local scope.  Such
/// frames live until the process exits.  Globals are unaffected since the
/// global frame lives for the whole session anyway.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Convenience for `Rc::new(RefCell::new(Environment::with_enclosing(..)))`.
    pub fn child_of(enclosing: &Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        let env = Environment::with_enclosing(Rc::clone(enclosing));
        Rc::new(RefCell::new(env))
    }

    /// Binds `name` in this frame.  Redefinition simply overwrites.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Dynamic lookup walking the whole chain.  Used for globals.
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    /// Assigns to the nearest frame that declares `name`.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// The frame exactly `distance` links up the chain from `env`.
    pub fn ancestor(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
    ) -> Option<Rc<RefCell<Environment>>> {
        let mut current = Rc::clone(env);
        for _ in 0..distance {
            let next = current.borrow().enclosing.clone()?;
            current = next;
        }
        Some(current)
    }

    /// Reads `name` from the frame `distance` hops up, without falling back.
    pub fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &Token) -> Result<Value> {
        Self::get_str_at(env, distance, &name.lexeme).ok_or_else(|| undefined(name))
    }

    /// Like [`Environment::get_at`] for the synthetic `this` / `super` names.
    pub fn get_str_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
    ) -> Option<Value> {
        Self::ancestor(env, distance)?.borrow().values.get(name).cloned()
    }

    /// Writes `name` in the frame `distance` hops up.  The resolver guarantees
    /// the frame declares it; a miss is reported as an undefined variable.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &Token,
        value: Value,
    ) -> Result<()> {
        let frame = Self::ancestor(env, distance).ok_or_else(|| undefined(name))?;
        let mut frame = frame.borrow_mut();

        match frame.values.get_mut(&name.lexeme) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name)),
        }
    }
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(name.line, format!("Undefined variable '{}'.", name.lexeme))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name, 1)
    }

    #[test]
    fn lookup_falls_through_to_enclosing() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("a", Value::Number(1.0));
        let inner = Environment::child_of(&globals);

        assert_eq!(
            inner.borrow().get(&ident("a")).ok(),
            Some(Value::Number(1.0))
        );
    }

    #[test]
    fn assign_mutates_declaring_frame() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("a", Value::Number(1.0));
        let inner = Environment::child_of(&globals);

        inner
            .borrow_mut()
            .assign(&ident("a"), Value::Number(2.0))
            .expect("a is declared in globals");

        assert_eq!(
            globals.borrow().get(&ident("a")).ok(),
            Some(Value::Number(2.0))
        );
        assert!(inner.borrow().values.is_empty());
    }

    #[test]
    fn assign_to_undeclared_name_fails() {
        let env = Environment::new().assign(&ident("nope"), Value::Nil);
        let err = env.expect_err("undeclared");

        assert_eq!(err.message(), "Undefined variable 'nope'.");
    }

    #[test]
    fn get_at_does_not_fall_back() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("a", Value::Number(1.0));
        let middle = Environment::child_of(&globals);
        let inner = Environment::child_of(&middle);

        assert_eq!(
            Environment::get_at(&inner, 2, &ident("a")).ok(),
            Some(Value::Number(1.0))
        );
        assert!(Environment::get_at(&inner, 1, &ident("a")).is_err());
        assert!(Environment::ancestor(&inner, 3).is_none());
    }
}
