//! Unused-variable warning pass.
//!
//! On scope exit, any declared name never subsequently referenced produces
//! a non-fatal warning. Global declarations are not tracked (a REPL or an
//! importing file may still reach them), and the reserved `this`/`super`
//! bindings never appear here because they are not declared through `var`.

use std::collections::HashMap;

use crate::ast::{ExprKind, Stmt};
use crate::checkers::{walk_expr, walk_stmt, Visit};
use crate::error::{Warning, WarningKind};
use crate::token::Token;

pub struct UnusedVariableChecker {
    /// `Some(token)` = declared and not yet referenced; `None` = used.
    scopes: Vec<HashMap<String, Option<Token>>>,
    warnings: Vec<Warning>,
}

impl UnusedVariableChecker {
    pub fn check(statements: &[Stmt]) -> Vec<Warning> {
        let mut checker = UnusedVariableChecker {
            scopes: Vec::new(),
            warnings: Vec::new(),
        };

        for stmt in statements {
            checker.visit_stmt(stmt);
        }

        checker.warnings
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        let scope = self.scopes.pop().expect("scope stack underflow");

        for token in scope.into_values().flatten() {
            self.warnings.push(Warning::new(
                WarningKind::UnusedVariable,
                &token,
                format!("Unused variable {}", token.lexeme),
            ));
        }
    }

    fn declare(&mut self, name: &Token) {
        // global names are not tracked
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), Some(name.clone()));
        }
    }

    fn mark_used(&mut self, name: &Token) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(&name.lexeme) {
                *slot = None;
                return;
            }
        }
    }

    fn check_function(&mut self, params: &[Token], body: &[Stmt]) {
        self.begin_scope();
        for param in params {
            self.declare(param);
        }
        for stmt in body {
            self.visit_stmt(stmt);
        }
        self.end_scope();
    }
}

impl Visit for UnusedVariableChecker {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                for s in statements {
                    self.visit_stmt(s);
                }
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(expr) = initializer {
                    self.visit_expr(expr);
                }
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
            ExprKind::Variable { name } => self.mark_used(name),

            // writing alone does not count as a use, but the RHS may read
            ExprKind::Assign { value, .. } => {
                self.visit_expr(value);
            }

            ExprKind::Lambda { params, body } => {
                self.check_function(params, body);
            }

            _ => walk_expr(self, expr),
        }
    }
}
