//! Static resolver pass for the **Lox** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<String,bool>` tracking declared/defined).
//! 2. Report static errors (redeclaration, forward‑read in initializer, invalid
//!    `return`, misplaced `this`/`super`, self‑inheritance).  Errors are
//!    collected; the walk carries on so all of them are reported together.
//! 3. Record, for *each* local variable occurrence, how many scopes lie between
//!    the use and the declaration.  Occurrences without an entry are globals, so
//!    the interpreter never falls back to dynamic lookup that would see a later
//!    shadowing local.
//!
//! Scopes mirror the environments the interpreter will create: one per block,
//! one per function call (parameters and body share it), one holding `this`
//! around every method, and one holding `super` around the methods of a
//! subclass.  The global scope is not tracked.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Locals, Program};
use crate::error::LoxError;
use crate::expr::{self, Expr, LiteralValue};
use crate::stack::ensure_sufficient_stack;
use crate::stmt::{self, FunctionDecl, Stmt};
use crate::token::Token;
use log::{debug, info};

/// What kind of function body we are in.  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
}

/// What kind of class body we are in.  Used to validate `this` and `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and records binding
/// distances for locals.
pub struct Resolver {
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    locals: Locals,
    errors: Vec<LoxError>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        info!("Resolver instantiated");
        Resolver {
            scopes: Vec::new(),
            locals: Locals::new(),
            errors: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Walk all top‑level statements and return the hop count of every local
    /// reference, or every static error found.
    pub fn resolve(mut self, program: &Program) -> Result<Locals, Vec<LoxError>> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            program.statements.len()
        );

        for stmt in &program.statements {
            self.resolve_stmt(stmt);
        }

        if self.errors.is_empty() {
            info!("Resolved {} local reference(s)", self.locals.len());
            Ok(self.locals)
        } else {
            info!("Resolve failed with {} error(s)", self.errors.len());
            Err(self.errors)
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        ensure_sufficient_stack(|| stmt.accept(self))
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        ensure_sufficient_stack(|| expr.accept(self))
    }

    /// Enter a fresh scope for a function's parameters + body.
    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        for stmt in &decl.body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };

        if scope.contains_key(&name.lexeme) {
            self.errors.push(LoxError::resolve(
                name,
                "Already a variable with this name in this scope.",
            ));
            return;
        }

        scope.insert(name.lexeme.clone(), false);
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    /// Define a synthetic name (`this`, `super`) in the innermost scope.
    fn define_synthetic(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    /// Record this occurrence as a local at depth `d`, or leave it global if
    /// no local scope declares it.
    fn resolve_local(&mut self, expr: &Expr, name: &str) {
        let Some(id) = expr.id() else {
            return;
        };

        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name) {
                debug!("Resolved '{}' at depth {}", name, depth);
                self.locals.insert(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Statement resolution
// ─────────────────────────────────────────────────────────────────────────────

impl stmt::Visitor<()> for Resolver {
    fn visit_block(&mut self, statements: &[Stmt]) {
        self.begin_scope();
        for s in statements {
            self.resolve_stmt(s);
        }
        self.end_scope();
    }

    fn visit_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = superclass
            {
                if super_name.lexeme == name.lexeme {
                    self.errors.push(LoxError::resolve(
                        super_name,
                        "A class can't inherit from itself.",
                    ));
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);

            self.begin_scope();
            self.define_synthetic("super");
        }

        self.begin_scope();
        self.define_synthetic("this");

        for method in methods {
            self.resolve_function(method, FunctionType::Method);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn visit_expression(&mut self, expr: &Expr) {
        self.resolve_expr(expr);
    }

    fn visit_function(&mut self, decl: &Rc<FunctionDecl>) {
        // The name is defined before the body so the function can recurse.
        self.declare(&decl.name);
        self.define(&decl.name);
        self.resolve_function(decl, FunctionType::Function);
    }

    fn visit_if(&mut self, condition: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) {
        self.resolve_expr(condition);
        self.resolve_stmt(then_branch);
        if let Some(eb) = else_branch {
            self.resolve_stmt(eb);
        }
    }

    fn visit_print(&mut self, expr: &Expr) {
        self.resolve_expr(expr);
    }

    fn visit_return(&mut self, keyword: &Token, value: Option<&Expr>) {
        if self.current_function == FunctionType::None {
            self.errors.push(LoxError::resolve(
                keyword,
                "Can't return from top-level code.",
            ));
        }

        if let Some(expr) = value {
            self.resolve_expr(expr);
        }
    }

    fn visit_var(&mut self, name: &Token, initializer: Option<&Expr>) {
        // declare → resolve initializer → define
        self.declare(name);
        if let Some(expr) = initializer {
            self.resolve_expr(expr);
        }
        self.define(name);
    }

    fn visit_while(&mut self, condition: &Expr, body: &Stmt) {
        self.resolve_expr(condition);
        self.resolve_stmt(body);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Expression resolution
// ─────────────────────────────────────────────────────────────────────────────

impl expr::Visitor<()> for Resolver {
    fn visit_assign(&mut self, expr: &Expr, name: &Token, value: &Expr) {
        // First resolve RHS, then bind LHS
        self.resolve_expr(value);
        self.resolve_local(expr, &name.lexeme);
    }

    fn visit_binary(&mut self, left: &Expr, _operator: &Token, right: &Expr) {
        self.resolve_expr(left);
        self.resolve_expr(right);
    }

    fn visit_call(&mut self, callee: &Expr, _paren: &Token, arguments: &[Expr]) {
        self.resolve_expr(callee);
        for arg in arguments {
            self.resolve_expr(arg);
        }
    }

    fn visit_get(&mut self, object: &Expr, _name: &Token) {
        self.resolve_expr(object);
    }

    fn visit_grouping(&mut self, inner: &Expr) {
        self.resolve_expr(inner);
    }

    fn visit_literal(&mut self, _value: &LiteralValue) {}

    fn visit_logical(&mut self, left: &Expr, _operator: &Token, right: &Expr) {
        self.resolve_expr(left);
        self.resolve_expr(right);
    }

    fn visit_set(&mut self, object: &Expr, _name: &Token, value: &Expr) {
        self.resolve_expr(value);
        self.resolve_expr(object);
    }

    fn visit_super(&mut self, expr: &Expr, keyword: &Token, _method: &Token) {
        match self.current_class {
            ClassType::None => self.errors.push(LoxError::resolve(
                keyword,
                "Can't use 'super' outside of a class.",
            )),
            ClassType::Class => self.errors.push(LoxError::resolve(
                keyword,
                "Can't use 'super' in a class with no superclass.",
            )),
            ClassType::Subclass => {}
        }

        self.resolve_local(expr, "super");
    }

    fn visit_this(&mut self, expr: &Expr, keyword: &Token) {
        if self.current_class == ClassType::None {
            self.errors.push(LoxError::resolve(
                keyword,
                "Can't use 'this' outside of a class.",
            ));
            return;
        }

        self.resolve_local(expr, "this");
    }

    fn visit_unary(&mut self, _operator: &Token, right: &Expr) {
        self.resolve_expr(right);
    }

    fn visit_variable(&mut self, expr: &Expr, name: &Token) {
        // Cannot read in own initializer
        if self.scopes.last().and_then(|scope| scope.get(&name.lexeme)) == Some(&false) {
            self.errors.push(LoxError::resolve(
                name,
                "Can't read local variable in its own initializer.",
            ));
        }

        self.resolve_local(expr, &name.lexeme);
    }
}
