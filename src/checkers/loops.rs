//! Break/continue-placement checker.
//!
//! `break` and `continue` are only legal inside a loop body, and a function
//! or lambda body defined inside a loop starts a fresh "not in a loop"
//! context, so loop control can never escape through a closure boundary.

use crate::ast::{ExprKind, Stmt};
use crate::checkers::{walk_expr, walk_stmt, Visit};
use crate::error::StaticError;

pub struct LoopChecker {
    in_loop: bool,
    errors: Vec<StaticError>,
}

impl LoopChecker {
    pub fn check(statements: &[Stmt]) -> Vec<StaticError> {
        let mut checker = LoopChecker {
            in_loop: false,
            errors: Vec::new(),
        };

        for stmt in statements {
            checker.visit_stmt(stmt);
        }

        checker.errors
    }

    fn with_loop(&mut self, in_loop: bool, body: &Stmt) {
        let enclosing = self.in_loop;
        self.in_loop = in_loop;
        self.visit_stmt(body);
        self.in_loop = enclosing;
    }

    fn outside_loop(&mut self, body: &[Stmt]) {
        let enclosing = self.in_loop;
        self.in_loop = false;

        for stmt in body {
            self.visit_stmt(stmt);
        }

        self.in_loop = enclosing;
    }
}

impl Visit for LoopChecker {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Control { keyword } => {
                if !self.in_loop {
                    self.errors.push(StaticError::new(
                        keyword,
                        "Loop control statement outside of a loop.",
                    ));
                }
            }

            Stmt::While { condition, body } => {
                self.visit_expr(condition);
                self.with_loop(true, body);
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                if let Some(init) = initializer.as_deref() {
                    self.visit_stmt(init);
                }
                self.visit_expr(condition);
                if let Some(inc) = increment {
                    self.visit_expr(inc);
                }
                self.with_loop(true, body);
            }

            Stmt::Function(decl) => {
                self.outside_loop(&decl.body);
            }

            Stmt::Class { methods, .. } => {
                for method in methods {
                    self.outside_loop(&method.body);
                }
            }

            _ => walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &crate::ast::Expr) {
        match &expr.kind {
            ExprKind::Lambda { body, .. } => {
                self.outside_loop(body);
            }
            _ => walk_expr(self, expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::test_support::parse;

    #[test]
    fn break_outside_loop_is_an_error() {
        let errors = LoopChecker::check(&parse("break;"));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("outside of a loop"));
    }

    #[test]
    fn continue_inside_while_is_fine() {
        let errors = LoopChecker::check(&parse("while (true) { continue; }"));
        assert!(errors.is_empty());
    }

    #[test]
    fn break_inside_for_is_fine() {
        let errors = LoopChecker::check(&parse("for (var i = 0; i < 3; i = i + 1) break;"));
        assert!(errors.is_empty());
    }

    #[test]
    fn break_cannot_escape_through_a_lambda() {
        let errors = LoopChecker::check(&parse("while (true) { var f = fun () { break; }; }"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn break_cannot_escape_through_a_nested_function() {
        let errors = LoopChecker::check(&parse("while (true) { fun f() { break; } }"));
        assert_eq!(errors.len(), 1);
    }
}
