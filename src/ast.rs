use std::collections::HashMap;

use serde::Serialize;

use crate::stmt::Stmt;

/// Identity of a variable‑naming expression node, handed out by the parser.
///
/// Ids are unique within a [`crate::session::Lox`] session, not just within
/// one program, so resolutions recorded for earlier REPL lines stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ExprId(pub usize);

/// Scope distance (hop count) for every locally resolved expression.
/// Expressions without an entry are globals.
pub type Locals = HashMap<ExprId, usize>;

/// A parsed source file: the ordered top‑level statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}
