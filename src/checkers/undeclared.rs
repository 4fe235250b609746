//! Deprecated bare-reference warning pass.
//!
//! Referencing a variable that no earlier declaration (local, global, or
//! predefined) introduced still works at run time through dynamic global
//! lookup, but the declare-before-use style is the supported one; the bare
//! reference gets an advisory warning. `this`/`super` are skipped here:
//! their placement problems are hard errors owned by the this/super
//! checker.

use std::collections::HashSet;

use crate::ast::{ExprKind, Stmt};
use crate::checkers::{walk_expr, walk_stmt, Visit};
use crate::error::{Warning, WarningKind};
use crate::predefs;
use crate::token::Token;

pub struct UndeclaredVariableChecker {
    scopes: Vec<HashSet<String>>,
    globals: HashSet<String>,
    warnings: Vec<Warning>,
}

impl UndeclaredVariableChecker {
    pub fn check(statements: &[Stmt]) -> Vec<Warning> {
        let mut globals: HashSet<String> = HashSet::new();
        globals.extend(predefs::PREDEFINED_NAMES.iter().map(|s| s.to_string()));
        globals.extend(predefs::PREDEFINED_CLASSES.iter().map(|s| s.to_string()));

        let mut checker = UndeclaredVariableChecker {
            scopes: Vec::new(),
            globals,
            warnings: Vec::new(),
        };

        for stmt in statements {
            checker.visit_stmt(stmt);
        }

        checker.warnings
    }

    fn declare(&mut self, name: &Token) {
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.insert(name.lexeme.clone());
            }
            None => {
                self.globals.insert(name.lexeme.clone());
            }
        }
    }

    fn is_known(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|scope| scope.contains(name))
            || self.globals.contains(name)
    }

    fn check_function(&mut self, params: &[Token], body: &[Stmt]) {
        self.scopes.push(HashSet::new());
        for param in params {
            self.declare(param);
        }
        for stmt in body {
            self.visit_stmt(stmt);
        }
        self.scopes.pop();
    }
}

impl Visit for UndeclaredVariableChecker {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.scopes.push(HashSet::new());
                for s in statements {
                    self.visit_stmt(s);
                }
                self.scopes.pop();
            }

            Stmt::Var { name, initializer } => {
                if let Some(expr) = initializer {
                    self.visit_expr(expr);
                }
                self.declare(name);
            }

            Stmt::Function(decl) => {
                self.declare(&decl.name);
                self.check_function(&decl.params, &decl.body);
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                self.declare(name);
                if let Some(expr) = superclass {
                    self.visit_expr(expr);
                }
                for method in methods {
                    self.check_function(&method.params, &method.body);
                }
            }

            _ => walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &crate::ast::Expr) {
        match &expr.kind {
            ExprKind::Variable { name } => {
                if !self.is_known(&name.lexeme) {
                    self.warnings.push(Warning::new(
                        WarningKind::DeprecatedReference,
                        name,
                        "variable reference without prior declaration is deprecated",
                    ));
                }
            }

            ExprKind::Lambda { params, body } => {
                self.check_function(params, body);
            }

            _ => walk_expr(self, expr),
        }
    }
}
