//! Semantic checker passes.
//!
//! Each checker is an independent full-AST walk validating one structural
//! invariant before execution:
//!
//! - [`returns::ReturnChecker`]: `return` placement (top level, initializers),
//! - [`loops::LoopChecker`]: `break`/`continue` placement,
//! - [`this_super::ThisSuperChecker`]: `this`/`super` placement,
//! - [`unused::UnusedVariableChecker`]: unused-variable warnings,
//! - [`undeclared::UndeclaredVariableChecker`]: deprecated bare-reference
//!   warnings.
//!
//! The checkers share a default recursive walk through the [`Visit`] trait;
//! each pass overrides only the nodes it cares about and delegates the rest
//! to [`walk_stmt`] / [`walk_expr`]. All errors from every pass are
//! collected before execution is allowed; warnings never block it.

pub mod loops;
pub mod returns;
pub mod this_super;
pub mod undeclared;
pub mod unused;

use log::info;

use crate::ast::{Expr, ExprKind, Stmt};
use crate::error::{StaticError, Warning};

/// Default pre-order traversal. Implementors override `visit_stmt` /
/// `visit_expr` for the nodes they check and call back into the walk
/// functions for everything else.
pub trait Visit {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

/// Visit every child of `stmt` in source order.
pub fn walk_stmt<V: Visit + ?Sized>(v: &mut V, stmt: &Stmt) {
    match stmt {
        Stmt::Expression(expr) | Stmt::Print(expr) => v.visit_expr(expr),

        Stmt::Var { initializer, .. } => {
            if let Some(expr) = initializer {
                v.visit_expr(expr);
            }
        }

        Stmt::Block(statements) => {
            for s in statements {
                v.visit_stmt(s);
            }
        }

        Stmt::If {
            condition,
            then_branch,
            else_branch,
        } => {
            v.visit_expr(condition);
            v.visit_stmt(then_branch);
            if let Some(eb) = else_branch.as_deref() {
                v.visit_stmt(eb);
            }
        }

        Stmt::While { condition, body } => {
            v.visit_expr(condition);
            v.visit_stmt(body);
        }

        Stmt::For {
            initializer,
            condition,
            increment,
            body,
        } => {
            if let Some(init) = initializer.as_deref() {
                v.visit_stmt(init);
            }
            v.visit_expr(condition);
            if let Some(inc) = increment {
                v.visit_expr(inc);
            }
            v.visit_stmt(body);
        }

        Stmt::Control { .. } => {}

        Stmt::Function(decl) => {
            for s in &decl.body {
                v.visit_stmt(s);
            }
        }

        Stmt::Return { value, .. } => {
            if let Some(expr) = value {
                v.visit_expr(expr);
            }
        }

        Stmt::Class {
            superclass,
            methods,
            ..
        } => {
            if let Some(expr) = superclass {
                v.visit_expr(expr);
            }
            for method in methods {
                for s in &method.body {
                    v.visit_stmt(s);
                }
            }
        }
    }
}

/// Visit every child of `expr` in source order.
pub fn walk_expr<V: Visit + ?Sized>(v: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Literal(_)
        | ExprKind::Variable { .. }
        | ExprKind::This { .. }
        | ExprKind::Super { .. } => {}

        ExprKind::Grouping(inner) => v.visit_expr(inner),

        ExprKind::Unary { right, .. } => v.visit_expr(right),

        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }

        ExprKind::Ternary {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            v.visit_expr(condition);
            v.visit_expr(then_branch);
            v.visit_expr(else_branch);
        }

        ExprKind::Assign { value, .. } => v.visit_expr(value),

        ExprKind::Call {
            callee, arguments, ..
        } => {
            v.visit_expr(callee);
            for arg in arguments {
                v.visit_expr(arg);
            }
        }

        ExprKind::Get { object, .. } => v.visit_expr(object),

        ExprKind::Set { object, value, .. } => {
            v.visit_expr(object);
            v.visit_expr(value);
        }

        ExprKind::Lambda { body, .. } => {
            for s in body {
                v.visit_stmt(s);
            }
        }
    }
}

/// The combined outcome of every checker pass.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub errors: Vec<StaticError>,
    pub warnings: Vec<Warning>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run the full checker pipeline over a program.
pub fn run_checks(statements: &[Stmt]) -> CheckReport {
    info!("Running checker pipeline over {} statement(s)", statements.len());

    let mut report = CheckReport::default();

    report
        .errors
        .extend(returns::ReturnChecker::check(statements));
    report.errors.extend(loops::LoopChecker::check(statements));
    report
        .errors
        .extend(this_super::ThisSuperChecker::check(statements));
    report
        .warnings
        .extend(unused::UnusedVariableChecker::check(statements));
    report
        .warnings
        .extend(undeclared::UndeclaredVariableChecker::check(statements));

    info!(
        "Checker pipeline finished: {} error(s), {} warning(s)",
        report.errors.len(),
        report.warnings.len()
    );

    report
}
