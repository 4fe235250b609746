//! Centralised error hierarchy for the **Quill interpreter**.
//!
//! All subsystems (scanner, parser, resolver, checkers, runtime, CLI) convert
//! their internal failure modes into one of the types defined here. This
//! enables a uniform `Result<T>` alias throughout the crate and ergonomic
//! inter-operation with `anyhow`, while still preserving rich diagnostic
//! detail.
//!
//! Three disjoint tiers exist:
//! 1. static errors ([`StaticError`]): lexing, parsing, resolution and
//!    semantic-check failures; collected, never executed past,
//! 2. runtime errors ([`RuntimeError`]): abort one execution unit,
//! 3. warnings ([`Warning`]): advisory only, never affect control flow.
//!
//! The module **does not** print diagnostics itself.

use std::fmt;
use std::io;

use log::info;
use thiserror::Error;

use crate::token::Token;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuillError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human-readable description.
        message: String,

        /// 1-based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}] Error: {message}")]
    Parse { message: String, line: usize },

    /// Static-analysis failure from the resolver or a checker pass.
    #[error(transparent)]
    Static(#[from] StaticError),

    /// Runtime evaluation error.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Wrapper around `std::io::Error` (transparent). Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF-8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl QuillError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        QuillError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", line, message);

        QuillError::Parse { message, line }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, QuillError>;

/// A static-analysis diagnostic with source-line context.
///
/// Produced by the resolver and the checker passes; the pipeline collects
/// every one of these before deciding whether execution may proceed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {line}] Error: {message}")]
pub struct StaticError {
    pub message: String,
    pub line: usize,
}

impl StaticError {
    pub fn new(token: &Token, msg: impl Into<String>) -> Self {
        let message: String = msg.into();

        info!("Creating static error: line={}, msg={}", token.line, message);

        StaticError {
            message,
            line: token.line,
        }
    }
}

/// The advisory diagnostic categories, so callers can filter them
/// independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    UnusedVariable,
    DeprecatedReference,
}

/// An advisory diagnostic. Never blocks execution, never affects exit codes.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
    pub line: usize,
}

impl Warning {
    pub fn new(kind: WarningKind, token: &Token, msg: impl Into<String>) -> Self {
        Warning {
            kind,
            message: msg.into(),
            line: token.line,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] warning: {}", self.line, self.message)
    }
}

/// A runtime failure, carrying the offending token for line attribution.
///
/// Uncaught, one of these aborts the current execution unit (a whole file
/// run, or one REPL line) but never the host process.
#[derive(Debug, Clone, Error)]
#[error("{kind}\n[line {}]", .token.line)]
pub struct RuntimeError {
    pub token: Token,
    pub kind: RuntimeErrorKind,
}

impl RuntimeError {
    pub fn new(token: &Token, kind: RuntimeErrorKind) -> Self {
        info!("Creating runtime error at line {}: {}", token.line, kind);

        RuntimeError {
            token: token.clone(),
            kind,
        }
    }

    /// Shorthand for the common operand/shape mismatch case.
    pub fn type_error(token: &Token, msg: impl Into<String>) -> Self {
        RuntimeError::new(token, RuntimeErrorKind::Type(msg.into()))
    }
}

/// The distinct runtime failure modes of the evaluator and natives.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeErrorKind {
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),

    #[error("Undefined property '{0}'.")]
    UndefinedProperty(String),

    #[error("Zero division.")]
    ZeroDivision,

    #[error("Expected {expected} arguments but got {got}.")]
    Arity { expected: String, got: usize },

    #[error("Failed to find special method '{0}' on operand.")]
    MissingSpecialMethod(String),

    /// Operand/shape mismatches ("Operands must be numbers." and kin).
    #[error("{0}")]
    Type(String),

    /// Native precondition failures (bad sleep duration, import failures...).
    #[error("{0}")]
    Native(String),
}
