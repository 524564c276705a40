//! One interpreter session: the scan → parse → resolve → interpret pipeline
//! over a long‑lived [`Interpreter`].
//!
//! Globals and previously defined closures survive between [`Lox::run`]
//! calls, which is what the REPL needs.  Expression ids keep counting across
//! runs so distances recorded for earlier code are never overwritten.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use log::{debug, info};

use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner;

/// Runtime limits for an interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Nested calls allowed before `Stack overflow.` is raised.
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_call_depth: 1024,
        }
    }
}

/// What happened during one [`Lox::run`].
#[derive(Debug, Default)]
pub struct RunResult {
    /// A lexical, syntax or resolution error stopped the program before it ran.
    pub had_error: bool,
    /// The program started and was halted by a runtime error.
    pub had_runtime_error: bool,
    /// Every reported error, in source order for static errors.  A runtime
    /// error is always alone.
    pub errors: Vec<LoxError>,
}

impl RunResult {
    pub fn is_ok(&self) -> bool {
        !self.had_error && !self.had_runtime_error
    }

    fn static_errors(errors: Vec<LoxError>) -> Self {
        Self {
            had_error: true,
            had_runtime_error: false,
            errors,
        }
    }
}

pub struct Lox {
    interpreter: Interpreter,
    next_id: usize,
}

impl Lox {
    pub fn new(output: Rc<RefCell<dyn Write>>) -> Self {
        Self::with_config(output, Config::default())
    }

    pub fn with_config(output: Rc<RefCell<dyn Write>>, config: Config) -> Self {
        info!("Starting Lox session");
        Self {
            interpreter: Interpreter::with_config(output, config),
            next_id: 0,
        }
    }

    /// Runs `source` as a program against this session's globals.
    pub fn run(&mut self, source: &str) -> RunResult {
        let tokens = match scanner::scan(source) {
            Ok(tokens) => tokens,
            Err(errors) => return RunResult::static_errors(errors),
        };
        debug!("Scanned {} tokens", tokens.len());

        let mut parser = Parser::new(tokens).with_first_id(self.next_id);
        let parsed = parser.parse();
        self.next_id = parser.next_id();

        let program = match parsed {
            Ok(program) => program,
            Err(errors) => return RunResult::static_errors(errors),
        };

        let locals = match Resolver::new().resolve(&program) {
            Ok(locals) => locals,
            Err(errors) => return RunResult::static_errors(errors),
        };

        match self.interpreter.interpret(&program, locals) {
            Ok(()) => RunResult::default(),
            Err(error) => {
                info!("Run halted by runtime error: {}", error.message());
                RunResult {
                    had_error: false,
                    had_runtime_error: true,
                    errors: vec![error],
                }
            }
        }
    }
}
