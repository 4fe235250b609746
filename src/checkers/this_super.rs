//! This/super-placement checker.
//!
//! Tracks the class context the walk is currently inside: none, a class
//! without a superclass, a class with one, or a static method body. `this`
//! and `super` are rejected outside a class, `super` additionally in a
//! class with no superclass, and both inside `static` methods.

use crate::ast::{ExprKind, Stmt};
use crate::checkers::{walk_expr, walk_stmt, Visit};
use crate::error::StaticError;

#[derive(Copy, Clone, PartialEq, Eq)]
enum ClassContext {
    None,
    Class,
    Subclass,
}

pub struct ThisSuperChecker {
    class: ClassContext,
    in_static_method: bool,
    errors: Vec<StaticError>,
}

impl ThisSuperChecker {
    pub fn check(statements: &[Stmt]) -> Vec<StaticError> {
        let mut checker = ThisSuperChecker {
            class: ClassContext::None,
            in_static_method: false,
            errors: Vec::new(),
        };

        for stmt in statements {
            checker.visit_stmt(stmt);
        }

        checker.errors
    }
}

impl Visit for ThisSuperChecker {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Class {
                superclass,
                methods,
                ..
            } => {
                let enclosing_class = self.class;
                let enclosing_static = self.in_static_method;

                self.class = if superclass.is_some() {
                    ClassContext::Subclass
                } else {
                    ClassContext::Class
                };

                if let Some(expr) = superclass {
                    self.visit_expr(expr);
                }

                for method in methods {
                    self.in_static_method = method.is_static;
                    for s in &method.body {
                        self.visit_stmt(s);
                    }
                }

                self.class = enclosing_class;
                self.in_static_method = enclosing_static;
            }

            _ => walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &crate::ast::Expr) {
        match &expr.kind {
            ExprKind::This { keyword } => {
                if self.class == ClassContext::None {
                    self.errors.push(StaticError::new(
                        keyword,
                        "Cannot use 'this' outside of a class.",
                    ));
                } else if self.in_static_method {
                    self.errors.push(StaticError::new(
                        keyword,
                        "Cannot use 'this' in a static method.",
                    ));
                }
            }

            ExprKind::Super { keyword, .. } => {
                if self.class == ClassContext::None {
                    self.errors.push(StaticError::new(
                        keyword,
                        "Cannot use 'super' outside of a class.",
                    ));
                } else if self.in_static_method {
                    self.errors.push(StaticError::new(
                        keyword,
                        "Cannot use 'super' in a static method.",
                    ));
                } else if self.class != ClassContext::Subclass {
                    self.errors.push(StaticError::new(
                        keyword,
                        "Cannot use 'super' in a class with no superclass.",
                    ));
                }
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
    fn this_outside_class_is_an_error() {
        let errors = ThisSuperChecker::check(&parse("print this;"));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("outside of a class"));
    }

    #[test]
    fn super_without_superclass_is_an_error() {
        let errors =
            ThisSuperChecker::check(&parse("class A { f() { return super.f(); } }"));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("no superclass"));
    }

    #[test]
    fn super_in_subclass_is_fine() {
        let errors = ThisSuperChecker::check(&parse(
            "class A { f() { return 1; } } class B < A { f() { return super.f(); } }",
        ));
        assert!(errors.is_empty());
    }

    #[test]
    fn this_in_static_method_is_an_error() {
        let errors =
            ThisSuperChecker::check(&parse("class A { static f() { return this; } }"));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("static method"));
    }

    #[test]
    fn this_in_instance_method_is_fine() {
        let errors = ThisSuperChecker::check(&parse("class A { f() { return this; } }"));
        assert!(errors.is_empty());
    }

    #[test]
    fn this_in_function_nested_in_method_is_fine() {
        let errors = ThisSuperChecker::check(&parse(
            "class A { f() { fun inner() { return this; } return inner(); } }",
        ));
        assert!(errors.is_empty());
    }
}
