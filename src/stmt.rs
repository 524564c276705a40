use std::rc::Rc;

use crate::expr::Expr;
use crate::token::Token;

/// A `fun` declaration or a class method.  Shared (`Rc`) between the tree and
/// every closure created from it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

/// **Abstract‑Syntax‑Tree node** for *statements*.  `for` loops have no node
/// of their own; the parser desugars them into `Block` + `While`.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Braced scope containing zero or more declarations/statements.
    Block(Vec<Stmt>),

    Class {
        name: Token,
        /// Always an `Expr::Variable` when present.
        superclass: Option<Expr>,
        methods: Vec<Rc<FunctionDecl>>,
    },

    /// Stand‑alone expression terminated by a semicolon.
    Expression(Expr),

    Function(Rc<FunctionDecl>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    Print(Expr),

    Return {
        /// The `return` keyword token (for error locations).
        keyword: Token,
        /// Absent ⇒ `nil` is returned.
        value: Option<Expr>,
    },

    /// `var name (= initializer)?;`
    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
    },
}

/// Per‑variant callbacks for walking a [`Stmt`].
pub trait Visitor<R> {
    fn visit_block(&mut self, statements: &[Stmt]) -> R;
    fn visit_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> R;
    fn visit_expression(&mut self, expr: &Expr) -> R;
    fn visit_function(&mut self, decl: &Rc<FunctionDecl>) -> R;
    fn visit_if(&mut self, condition: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) -> R;
    fn visit_print(&mut self, expr: &Expr) -> R;
    fn visit_return(&mut self, keyword: &Token, value: Option<&Expr>) -> R;
    fn visit_var(&mut self, name: &Token, initializer: Option<&Expr>) -> R;
    fn visit_while(&mut self, condition: &Expr, body: &Stmt) -> R;
}

impl Stmt {
    /// Double dispatch into `visitor`.
    pub fn accept<R, V: Visitor<R> + ?Sized>(&self, visitor: &mut V) -> R {
        match self {
            Stmt::Block(statements) => visitor.visit_block(statements),
            Stmt::Class {
                name,
                superclass,
                methods,
            } => visitor.visit_class(name, superclass.as_ref(), methods),
            Stmt::Expression(expr) => visitor.visit_expression(expr),
            Stmt::Function(decl) => visitor.visit_function(decl),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => visitor.visit_if(condition, then_branch, else_branch.as_deref()),
            Stmt::Print(expr) => visitor.visit_print(expr),
            Stmt::Return { keyword, value } => visitor.visit_return(keyword, value.as_ref()),
            Stmt::Var { name, initializer } => visitor.visit_var(name, initializer.as_ref()),
            Stmt::While { condition, body } => visitor.visit_while(condition, body),
        }
    }
}
