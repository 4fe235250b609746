//! Static resolver pass for the **Quill** interpreter.
//!
//! A single pre-order AST walk that:
//! 1. builds lexical scopes (stack of `HashMap<String, bool>` tracking
//!    declared/defined),
//! 2. reports static scoping errors (redeclaration, forward-read in an
//!    initializer, self-inheritance),
//! 3. records, for *each* variable / `this` / `super` occurrence, how many
//!    scopes separate the reference from its declaration, so the
//!    interpreter jumps straight to the right scope instead of searching
//!    a chain that a later shadowing local could confuse.
//!
//! References not found in any lexical scope are left out of the map and
//! resolve dynamically against the global scope at run time (top-level
//! declarations are not all known at resolution time in a REPL).
//!
//! The scope structure mirrored here must match the environments the
//! interpreter creates at run time exactly: one scope per block, one per
//! function call (parameters and body share it), one per `for` loop, one
//! `this` scope per class body, and one `super` scope when a superclass
//! exists.

use std::collections::HashMap;

use log::{debug, info};

use crate::ast::{Expr, ExprId, ExprKind, FunctionDecl, Stmt};
use crate::error::StaticError;
use crate::token::Token;

/// The resolved distance table: expression identity → scopes to cross.
pub type Locals = HashMap<ExprId, usize>;

/// Resolver: tracks scopes, enforces static scoping rules, and records
/// binding distances. All diagnostics are collected; nothing aborts the
/// walk.
pub struct Resolver {
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    locals: Locals,
    errors: Vec<StaticError>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            locals: HashMap::new(),
            errors: Vec::new(),
        }
    }

    /// Walk all top-level statements. Returns the distance table, or every
    /// static error found if there was at least one.
    pub fn resolve(mut self, statements: &[Stmt]) -> Result<Locals, Vec<StaticError>> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        if self.errors.is_empty() {
            Ok(self.locals)
        } else {
            Err(self.errors)
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Function(decl) => {
                // a function's name is visible inside its own body
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(&decl.params, &decl.body);
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                // one scope for the whole loop; the interpreter opens a
                // matching environment around initializer and iterations
                self.begin_scope();
                if let Some(init) = initializer {
                    self.resolve_stmt(init);
                }
                self.resolve_expr(condition);
                if let Some(inc) = increment {
                    self.resolve_expr(inc);
                }
                self.resolve_stmt(body);
                self.end_scope();
            }

            Stmt::Return { value, .. } => {
                // placement is the return checker's concern
                if let Some(expr) = value {
                    self.resolve_expr(expr);
                }
            }

            Stmt::Control { .. } => {}
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[FunctionDecl],
    ) {
        self.declare(name);
        self.define(name);

        if let Some(superclass) = superclass {
            if let ExprKind::Variable { name: super_name } = &superclass.kind {
                if super_name.lexeme == name.lexeme {
                    self.errors
                        .push(StaticError::new(super_name, "Class cannot inherit itself."));
                }
            }
            self.resolve_expr(superclass);

            self.begin_scope();
            self.scopes
                .last_mut()
                .expect("scope just pushed")
                .insert("super".to_string(), true);
        }

        self.begin_scope();
        self.scopes
            .last_mut()
            .expect("scope just pushed")
            .insert("this".to_string(), true);

        for method in methods {
            self.resolve_function(&method.params, &method.body);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(_) => {}

            ExprKind::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            ExprKind::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            ExprKind::Ternary {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
            }

            ExprKind::Variable { name } => {
                // cannot read a local in its own initializer
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.errors.push(StaticError::new(
                            name,
                            "Cannot read local variable in its own initializer.",
                        ));
                    }
                }
                self.resolve_local(expr.id, name);
            }

            ExprKind::Assign { name, value } => {
                // first resolve the RHS, then bind the LHS
                self.resolve_expr(value);
                self.resolve_local(expr.id, name);
            }

            ExprKind::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            ExprKind::Get { object, .. } => self.resolve_expr(object),

            ExprKind::Set { object, value, .. } => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }

            ExprKind::This { keyword } => {
                self.resolve_local(expr.id, keyword);
            }

            ExprKind::Super { keyword, .. } => {
                self.resolve_local(expr.id, keyword);
            }

            ExprKind::Lambda { params, body } => {
                self.resolve_function(params, body);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    fn resolve_function(&mut self, params: &[Token], body: &[Stmt]) {
        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        for stmt in body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.errors.push(StaticError::new(
                    name,
                    "Variable with this name already declared in this scope.",
                ));
            }
            scope.insert(name.lexeme.clone(), false);
        }
        // global declarations are unchecked: re-declaring a global is legal
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at the depth of the innermost scope
    /// declaring it, or leave it for dynamic global lookup if no scope does.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.locals.insert(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}
