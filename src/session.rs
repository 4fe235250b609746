//! One interpreter session: the scan → parse → resolve → check → execute
//! pipeline plus the state that must survive across REPL lines (the global
//! scope, the resolved-distance table, the module cache, the expression-id
//! counter).
//!
//! Everything that the runtime mutates lives on this value; creating a new
//! `Session` gives a completely independent program run.

use std::fmt;

use log::{debug, info};

use crate::ast::Stmt;
use crate::checkers::run_checks;
use crate::error::{QuillError, RuntimeError, Warning};
use crate::interpreter::{Interpreter, Output};
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::token::Token;

/// Why a run failed. Static failures carry every collected diagnostic;
/// execution is never attempted when any exist.
#[derive(Debug)]
pub enum SessionError {
    Static(Vec<QuillError>),
    Runtime(RuntimeError),
}

impl std::error::Error for SessionError {}

impl From<RuntimeError> for SessionError {
    fn from(error: RuntimeError) -> Self {
        SessionError::Runtime(error)
    }
}

impl SessionError {
    /// Process exit code convention: 65 for static errors, 70 for runtime.
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Static(_) => 65,
            SessionError::Runtime(_) => 70,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Static(errors) => {
                let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                write!(f, "{}", rendered.join("\n"))
            }
            SessionError::Runtime(error) => write!(f, "{}", error),
        }
    }
}

pub struct Session {
    interpreter: Interpreter,
    /// Gates warning output in the driver; the checkers always produce
    /// warnings, the session just reports them back.
    pub report_warnings: bool,
    next_expr_id: usize,
}

impl Session {
    pub fn new() -> Self {
        Session {
            interpreter: Interpreter::new(),
            report_warnings: false,
            next_expr_id: 0,
        }
    }

    pub fn with_output(out: Output) -> Self {
        Session {
            interpreter: Interpreter::with_output(out),
            report_warnings: false,
            next_expr_id: 0,
        }
    }

    /// Run a program (a whole file, or one `;`-terminated REPL line).
    /// Returns the warnings the checker pipeline produced; warnings never
    /// block execution.
    pub fn run(&mut self, source: &str) -> Result<Vec<Warning>, SessionError> {
        info!("Session run over {} byte(s) of source", source.len());

        let tokens = self.scan(source)?;
        let statements = self.parse(tokens)?;

        let locals = Resolver::new()
            .resolve(&statements)
            .map_err(|errors| {
                SessionError::Static(errors.into_iter().map(QuillError::Static).collect())
            })?;

        let report = run_checks(&statements);
        if !report.is_clean() {
            return Err(SessionError::Static(
                report.errors.into_iter().map(QuillError::Static).collect(),
            ));
        }

        self.interpreter.add_locals(locals);
        self.interpreter.interpret(&statements)?;

        Ok(report.warnings)
    }

    /// Evaluate one expression and render its value (REPL display mode).
    pub fn run_expression(&mut self, source: &str) -> Result<String, SessionError> {
        debug!("Session expression: {}", source);

        let tokens = self.scan(source)?;

        let mut parser = Parser::with_id_offset(tokens, self.next_expr_id);
        let expr = parser
            .parse_expression()
            .map_err(|e| SessionError::Static(vec![e]))?;
        self.next_expr_id = parser.next_id();

        // resolve + check the wrapped expression so scope errors and stray
        // this/super are caught before evaluation, exactly as in a program
        let wrapped = [Stmt::Expression(expr.clone())];

        let locals = Resolver::new().resolve(&wrapped).map_err(|errors| {
            SessionError::Static(errors.into_iter().map(QuillError::Static).collect())
        })?;

        let report = run_checks(&wrapped);
        if !report.is_clean() {
            return Err(SessionError::Static(
                report.errors.into_iter().map(QuillError::Static).collect(),
            ));
        }

        self.interpreter.add_locals(locals);

        let rendered = self.interpreter.interpret_expression(&expr)?;
        Ok(rendered)
    }

    fn scan(&self, source: &str) -> Result<Vec<Token>, SessionError> {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        for result in Scanner::new(source) {
            match result {
                Ok(token) => tokens.push(token),
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(tokens)
        } else {
            Err(SessionError::Static(errors))
        }
    }

    fn parse(&mut self, tokens: Vec<Token>) -> Result<Vec<Stmt>, SessionError> {
        let mut parser = Parser::with_id_offset(tokens, self.next_expr_id);
        let (statements, errors) = parser.parse();
        self.next_expr_id = parser.next_id();

        if errors.is_empty() {
            Ok(statements)
        } else {
            Err(SessionError::Static(errors))
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
