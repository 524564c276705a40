use serde::Serialize;

use crate::ast::ExprId;
use crate::token::Token;

/// A **literal constant** that appears directly in the source code.
///
/// The parser copies the value out of the token so the tree does not depend
/// on the token buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LiteralValue {
    /// Numeric literal, stored as IEEE‑754 `f64`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    True,

    False,

    Nil,
}

/// **Abstract‑Syntax‑Tree node** representing every kind of *expression*.
///
/// Nodes that name a variable (`Variable`, `Assign`, `This`, `Super`) carry an
/// [`ExprId`] so the resolver can record a scope distance for them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    /// `name = value`
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },

    /// Infix binary operator expression, e.g. `a + b`, `x <= y`.
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Function‑, method‑ or constructor call, e.g. `clock()` or `add(1, 2)`.
    Call {
        callee: Box<Expr>,
        /// The closing `)` token, retained for error reporting.
        paren: Token,
        arguments: Vec<Expr>,
    },

    /// `object.name`
    Get {
        object: Box<Expr>,
        name: Token,
    },

    /// Parenthesised sub‑expression.
    Grouping(Box<Expr>),

    Literal(LiteralValue),

    /// Short‑circuiting `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// `object.name = value`
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    /// `super.method`
    Super {
        id: ExprId,
        keyword: Token,
        method: Token,
    },

    This {
        id: ExprId,
        keyword: Token,
    },

    /// Prefix `!` or `-`.
    Unary {
        operator: Token,
        right: Box<Expr>,
    },

    Variable {
        id: ExprId,
        name: Token,
    },
}

/// Per‑variant callbacks for walking an [`Expr`].  Implemented by the
/// resolver, the interpreter and the AST printer.
pub trait Visitor<R> {
    fn visit_assign(&mut self, expr: &Expr, name: &Token, value: &Expr) -> R;
    fn visit_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> R;
    fn visit_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> R;
    fn visit_get(&mut self, object: &Expr, name: &Token) -> R;
    fn visit_grouping(&mut self, inner: &Expr) -> R;
    fn visit_literal(&mut self, value: &LiteralValue) -> R;
    fn visit_logical(&mut self, left: &Expr, operator: &Token, right: &Expr) -> R;
    fn visit_set(&mut self, object: &Expr, name: &Token, value: &Expr) -> R;
    fn visit_super(&mut self, expr: &Expr, keyword: &Token, method: &Token) -> R;
    fn visit_this(&mut self, expr: &Expr, keyword: &Token) -> R;
    fn visit_unary(&mut self, operator: &Token, right: &Expr) -> R;
    fn visit_variable(&mut self, expr: &Expr, name: &Token) -> R;
}

impl Expr {
    /// Double dispatch into `visitor`.
    pub fn accept<R, V: Visitor<R> + ?Sized>(&self, visitor: &mut V) -> R {
        match self {
            Expr::Assign { name, value, .. } => visitor.visit_assign(self, name, value),
            Expr::Binary {
                left,
                operator,
                right,
            } => visitor.visit_binary(left, operator, right),
            Expr::Call {
                callee,
                paren,
                arguments,
            } => visitor.visit_call(callee, paren, arguments),
            Expr::Get { object, name } => visitor.visit_get(object, name),
            Expr::Grouping(inner) => visitor.visit_grouping(inner),
            Expr::Literal(value) => visitor.visit_literal(value),
            Expr::Logical {
                left,
                operator,
                right,
            } => visitor.visit_logical(left, operator, right),
            Expr::Set {
                object,
                name,
                value,
            } => visitor.visit_set(object, name, value),
            Expr::Super {
                keyword, method, ..
            } => visitor.visit_super(self, keyword, method),
            Expr::This { keyword, .. } => visitor.visit_this(self, keyword),
            Expr::Unary { operator, right } => visitor.visit_unary(operator, right),
            Expr::Variable { name, .. } => visitor.visit_variable(self, name),
        }
    }

    /// Resolution id of a variable‑naming node.
    pub fn id(&self) -> Option<ExprId> {
        match self {
            Expr::Assign { id, .. }
            | Expr::Super { id, .. }
            | Expr::This { id, .. }
            | Expr::Variable { id, .. } => Some(*id),
            _ => None,
        }
    }
}
