//! Tree‑walking evaluator for resolved Lox programs.
//!
//! The interpreter owns the global environment and the side table of local
//! binding distances produced by the resolver.  Statements evaluate to a
//! [`Flow`] so `return` unwinds through blocks and loops as an ordinary value;
//! the only `Err` that travels up the Rust stack is a genuine runtime error,
//! which halts the current run.
//!
//! Every `evaluate` / `execute` step runs under [`ensure_sufficient_stack`],
//! and user calls are counted against [`Config::max_call_depth`], so unbounded
//! Lox recursion surfaces as a `Stack overflow.` runtime error instead of
//! crashing the host.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use std::sync::OnceLock;
use std::time::Instant;

use log::{debug, info};

use crate::ast::{Locals, Program};
use crate::callable::{LoxCallable, LoxFunction, NativeFunction};
use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::expr::{self, Expr, LiteralValue};
use crate::session::Config;
use crate::stack::ensure_sufficient_stack;
use crate::stmt::{self, FunctionDecl, Stmt};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Outcome of executing a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: Locals,
    output: Rc<RefCell<dyn Write>>,
    config: Config,
    depth: usize,
}

impl Interpreter {
    /// Creates an interpreter printing to `output`, with the default
    /// configuration and the native `clock` defined.
    pub fn new(output: Rc<RefCell<dyn Write>>) -> Self {
        Self::with_config(output, Config::default())
    }

    pub fn with_config(output: Rc<RefCell<dyn Write>>, config: Config) -> Self {
        info!("Initializing Interpreter ({:?})", config);

        let globals = Rc::new(RefCell::new(Environment::new()));

        debug!("Defining native function 'clock'");
        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction(Rc::new(NativeFunction::new("clock", 0, clock))),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: Locals::new(),
            output,
            config,
            depth: 0,
        }
    }

    /// Executes a resolved program.  `locals` is merged into the distances
    /// already known from earlier runs, since closures created then may
    /// still be called.
    pub fn interpret(&mut self, program: &Program, locals: Locals) -> Result<()> {
        debug!(
            "Interpreting {} statements ({} resolved locals)",
            program.len(),
            locals.len()
        );
        self.locals.extend(locals);

        for stmt in &program.statements {
            self.execute(stmt)?;
        }

        self.output.borrow_mut().flush()?;
        info!("Interpretation completed successfully");
        Ok(())
    }

    /// Evaluates an expression.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        ensure_sufficient_stack(|| expr.accept(self))
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        ensure_sufficient_stack(|| stmt.accept(self))
    }

    /// Runs `statements` with `environment` as the current frame.  The
    /// previous frame is restored whether the block finishes, returns or
    /// fails.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<Flow> {
        let previous = std::mem::replace(&mut self.environment, environment);
        let result = self.execute_all(statements);
        self.environment = previous;
        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn look_up_variable(&self, expr: &Expr, name: &Token) -> Result<Value> {
        match expr.id().and_then(|id| self.locals.get(&id)) {
            Some(&distance) => Environment::get_at(&self.environment, distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    /// Arity check plus call‑depth accounting around a single invocation.
    fn invoke(
        &mut self,
        callable: Rc<dyn LoxCallable>,
        arguments: Vec<Value>,
        paren: &Token,
    ) -> Result<Value> {
        if arguments.len() != callable.arity() {
            return Err(LoxError::runtime(
                paren.line,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    arguments.len()
                ),
            ));
        }

        if self.depth >= self.config.max_call_depth {
            return Err(LoxError::runtime(paren.line, "Stack overflow."));
        }

        self.depth += 1;
        let result = callable.call(self, arguments, paren.line);
        self.depth -= 1;
        result
    }
}

impl stmt::Visitor<Result<Flow>> for Interpreter {
    fn visit_block(&mut self, statements: &[Stmt]) -> Result<Flow> {
        debug!("Entering block with {} statements", statements.len());
        let environment = Environment::child_of(&self.environment);
        self.execute_block(statements, environment)
    }

    fn visit_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<Flow> {
        debug!("Defining class '{}'", name.lexeme);

        let superclass = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let line = match expr {
                        Expr::Variable { name: var, .. } => var.line,
                        _ => name.line,
                    };
                    return Err(LoxError::runtime(line, "Superclass must be a class."));
                }
            },
            None => None,
        };

        self.environment.borrow_mut().define(&name.lexeme, Value::Nil);

        // Methods of a subclass close over a frame holding `super`.
        let method_env = match &superclass {
            Some(class) => {
                let env = Environment::child_of(&self.environment);
                env.borrow_mut().define("super", Value::Class(Rc::clone(class)));
                env
            }
            None => Rc::clone(&self.environment),
        };

        let methods: HashMap<String, Rc<LoxFunction>> = methods
            .iter()
            .map(|method| {
                let is_initializer = method.name.lexeme == "init";
                let function =
                    LoxFunction::new(Rc::clone(method), Rc::clone(&method_env), is_initializer);
                (method.name.lexeme.clone(), Rc::new(function))
            })
            .collect();

        let class = LoxClass::new(name.lexeme.clone(), superclass, methods);
        self.environment
            .borrow_mut()
            .assign(name, Value::Class(Rc::new(class)))?;

        info!("Class '{}' defined", name.lexeme);
        Ok(Flow::Normal)
    }

    fn visit_expression(&mut self, expr: &Expr) -> Result<Flow> {
        self.evaluate(expr)?;
        Ok(Flow::Normal)
    }

    fn visit_function(&mut self, decl: &Rc<FunctionDecl>) -> Result<Flow> {
        debug!("Defining function '{}'", decl.name.lexeme);

        let function = LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment), false);
        self.environment
            .borrow_mut()
            .define(&decl.name.lexeme, Value::Function(Rc::new(function)));

        Ok(Flow::Normal)
    }

    fn visit_if(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<Flow> {
        if self.evaluate(condition)?.is_truthy() {
            self.execute(then_branch)
        } else if let Some(else_branch) = else_branch {
            self.execute(else_branch)
        } else {
            Ok(Flow::Normal)
        }
    }

    fn visit_print(&mut self, expr: &Expr) -> Result<Flow> {
        let value = self.evaluate(expr)?;
        writeln!(self.output.borrow_mut(), "{}", value)?;
        debug!("Printed value: {}", value);
        Ok(Flow::Normal)
    }

    fn visit_return(&mut self, _keyword: &Token, value: Option<&Expr>) -> Result<Flow> {
        let value = match value {
            Some(expr) => self.evaluate(expr)?,
            None => Value::Nil,
        };
        debug!("Returning value: {}", value);
        Ok(Flow::Return(value))
    }

    fn visit_var(&mut self, name: &Token, initializer: Option<&Expr>) -> Result<Flow> {
        let value = match initializer {
            Some(expr) => self.evaluate(expr)?,
            None => Value::Nil,
        };
        debug!("Variable '{}' defined with value: {}", name.lexeme, value);
        self.environment.borrow_mut().define(&name.lexeme, value);
        Ok(Flow::Normal)
    }

    fn visit_while(&mut self, condition: &Expr, body: &Stmt) -> Result<Flow> {
        while self.evaluate(condition)?.is_truthy() {
            if let Flow::Return(value) = self.execute(body)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }
}

impl expr::Visitor<Result<Value>> for Interpreter {
    fn visit_assign(&mut self, expr: &Expr, name: &Token, value: &Expr) -> Result<Value> {
        let value = self.evaluate(value)?;

        match expr.id().and_then(|id| self.locals.get(&id)) {
            Some(&distance) => {
                Environment::assign_at(&self.environment, distance, name, value.clone())?
            }
            None => self.globals.borrow_mut().assign(name, value.clone())?,
        }

        debug!("Assigned value {} to '{}'", value, name.lexeme);
        Ok(value)
    }

    fn visit_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        let value = match operator.token_type {
            TokenType::PLUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                (Value::String(a), Value::String(b)) => Value::String(a + &b),
                _ => {
                    return Err(LoxError::runtime(
                        operator.line,
                        "Operands must be two numbers or two strings.",
                    ))
                }
            },
            TokenType::MINUS => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Value::Number(a - b)
            }
            TokenType::STAR => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Value::Number(a * b)
            }
            TokenType::SLASH => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Value::Number(a / b)
            }
            TokenType::GREATER => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Value::Bool(a > b)
            }
            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Value::Bool(a >= b)
            }
            TokenType::LESS => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Value::Bool(a < b)
            }
            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Value::Bool(a <= b)
            }
            TokenType::EQUAL_EQUAL => Value::Bool(left == right),
            TokenType::BANG_EQUAL => Value::Bool(left != right),
            _ => {
                return Err(LoxError::runtime(
                    operator.line,
                    format!("Invalid binary operator '{}'.", operator.lexeme),
                ))
            }
        };

        Ok(value)
    }

    fn visit_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Result<Value> {
        let callee = self.evaluate(callee)?;

        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            values.push(self.evaluate(argument)?);
        }

        let callable = callee.as_callable().ok_or_else(|| {
            LoxError::runtime(paren.line, "Can only call functions and classes.")
        })?;

        self.invoke(callable, values, paren)
    }

    fn visit_get(&mut self, object: &Expr, name: &Token) -> Result<Value> {
        match self.evaluate(object)? {
            Value::Instance(instance) => LoxInstance::get(&instance, name),
            _ => Err(LoxError::runtime(
                name.line,
                "Only instances have properties.",
            )),
        }
    }

    fn visit_grouping(&mut self, inner: &Expr) -> Result<Value> {
        self.evaluate(inner)
    }

    fn visit_literal(&mut self, value: &LiteralValue) -> Result<Value> {
        Ok(match value {
            LiteralValue::Number(n) => Value::Number(*n),
            LiteralValue::Str(s) => Value::String(s.clone()),
            LiteralValue::True => Value::Bool(true),
            LiteralValue::False => Value::Bool(false),
            LiteralValue::Nil => Value::Nil,
        })
    }

    fn visit_logical(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        let left = self.evaluate(left)?;

        // `or` stops on a truthy left operand, `and` on a falsey one.
        let short_circuit = if operator.token_type == TokenType::OR {
            left.is_truthy()
        } else {
            !left.is_truthy()
        };

        if short_circuit {
            Ok(left)
        } else {
            self.evaluate(right)
        }
    }

    fn visit_set(&mut self, object: &Expr, name: &Token, value: &Expr) -> Result<Value> {
        let Value::Instance(instance) = self.evaluate(object)? else {
            return Err(LoxError::runtime(name.line, "Only instances have fields."));
        };

        let value = self.evaluate(value)?;
        instance.borrow_mut().set(name, value.clone());
        Ok(value)
    }

    fn visit_super(&mut self, expr: &Expr, keyword: &Token, method: &Token) -> Result<Value> {
        let distance = expr
            .id()
            .and_then(|id| self.locals.get(&id).copied())
            .ok_or_else(|| {
                LoxError::runtime(keyword.line, "Can't use 'super' outside of a class.")
            })?;

        // `this` lives in the frame just inside the one holding `super`.
        let superclass = Environment::get_str_at(&self.environment, distance, "super");
        let receiver = distance
            .checked_sub(1)
            .and_then(|d| Environment::get_str_at(&self.environment, d, "this"));

        let (Some(Value::Class(superclass)), Some(Value::Instance(receiver))) =
            (superclass, receiver)
        else {
            return Err(LoxError::runtime(
                keyword.line,
                "Can't use 'super' outside of a class.",
            ));
        };

        let method = superclass.find_method(&method.lexeme).ok_or_else(|| {
            LoxError::runtime(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )
        })?;

        Ok(Value::Function(Rc::new(method.bind(receiver))))
    }

    fn visit_this(&mut self, expr: &Expr, keyword: &Token) -> Result<Value> {
        self.look_up_variable(expr, keyword)
    }

    fn visit_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value> {
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operand must be a number.",
                )),
            },
            TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
            _ => Err(LoxError::runtime(
                operator.line,
                format!("Invalid unary operator '{}'.", operator.lexeme),
            )),
        }
    }

    fn visit_variable(&mut self, expr: &Expr, name: &Token) -> Result<Value> {
        self.look_up_variable(expr, name)
    }
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(LoxError::runtime(
            operator.line,
            "Operands must be numbers.",
        )),
    }
}

/// Native `clock()`: seconds since the first call in this process, from a
/// monotonic clock.
fn clock(_args: &[Value]) -> std::result::Result<Value, String> {
    static START: OnceLock<Instant> = OnceLock::new();

    let start = START.get_or_init(Instant::now);
    Ok(Value::Number(start.elapsed().as_secs_f64()))
}
