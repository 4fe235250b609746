//! Return-placement checker.
//!
//! Tracks the kind of function the walk is currently inside. A `return`
//! outside any function is a static error; `return <value>` inside an
//! initializer is a static error (a bare `return` stays legal there, for
//! early exit).

use crate::ast::{ExprKind, Stmt};
use crate::checkers::{walk_expr, walk_stmt, Visit};
use crate::error::StaticError;

#[derive(Copy, Clone, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
    Initializer,
}

pub struct ReturnChecker {
    current: FunctionKind,
    errors: Vec<StaticError>,
}

impl ReturnChecker {
    pub fn check(statements: &[Stmt]) -> Vec<StaticError> {
        let mut checker = ReturnChecker {
            current: FunctionKind::None,
            errors: Vec::new(),
        };

        for stmt in statements {
            checker.visit_stmt(stmt);
        }

        checker.errors
    }

    fn with_kind(&mut self, kind: FunctionKind, body: &[Stmt]) {
        let enclosing = self.current;
        self.current = kind;

        for stmt in body {
            self.visit_stmt(stmt);
        }

        self.current = enclosing;
    }
}

impl Visit for ReturnChecker {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Return { keyword, value } => {
                if self.current == FunctionKind::None {
                    self.errors.push(StaticError::new(
                        keyword,
                        "Cannot return from top-level code.",
                    ));
                    return;
                }

                if let Some(expr) = value {
                    // a value-carrying return is forbidden in initializers;
                    // a bare return is the supported early exit
                    if self.current == FunctionKind::Initializer {
                        self.errors.push(StaticError::new(
                            keyword,
                            "Cannot return a value from an initializer.",
                        ));
                    }
                    self.visit_expr(expr);
                }
            }

            Stmt::Function(decl) => {
                self.with_kind(FunctionKind::Function, &decl.body);
            }

            Stmt::Class { methods, .. } => {
                for method in methods {
                    let kind = if method.name.lexeme == "init" {
                        FunctionKind::Initializer
                    } else {
                        FunctionKind::Function
                    };
                    self.with_kind(kind, &method.body);
                }
            }

            _ => walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &crate::ast::Expr) {
        match &expr.kind {
            ExprKind::Lambda { body, .. } => {
                self.with_kind(FunctionKind::Function, body);
            }
            _ => walk_expr(self, expr),
        }
    }
}
