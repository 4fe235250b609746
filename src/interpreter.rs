//! The tree-walking evaluator.
//!
//! Statement execution produces no value, only side effects plus a
//! control-transfer signal ([`Flow`]); expression evaluation always produces
//! exactly one [`Value`]. `return`/`break`/`continue` are modeled as `Flow`
//! variants threaded through the evaluator's own `Result` plumbing, never
//! as host-level unwinding, so each signal is intercepted at exactly its
//! structural boundary (loop body for break/continue, call frame for
//! return) and can be seen to never leak past it.
//!
//! All per-run mutable state (global scope, resolved distances, module
//! cache, output sink) lives on the [`Interpreter`] value; there are no
//! process-wide singletons, so independent runs never interfere.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, ExprKind, FunctionDecl, Lit, Stmt};
use crate::checkers::run_checks;
use crate::environment::Environment;
use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::parser::Parser;
use crate::predefs;
use crate::resolver::{Locals, Resolver};
use crate::scanner::Scanner;
use crate::token::{Token, TokenType};
use crate::value::{Arity, Class, Function, Instance, Value};

/// Where program output (`print`, StdIO natives) goes. Shared so a module
/// executed through `import` writes to the same sink as its importer.
pub type Output = Rc<RefCell<dyn Write>>;

/// The result of executing one statement: either control falls through to
/// the next statement, or a non-local transfer is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Statement-execution result.
pub type ExecResult = Result<Flow, RuntimeError>;

/// Expression-evaluation result.
pub type EvalResult = Result<Value, RuntimeError>;

pub struct Interpreter {
    /// The outermost scope; dynamic fallback target for unresolved names.
    pub globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    /// Resolved scope distances, keyed by expression identity.
    locals: Locals,
    /// Memoized environments of imported files, shared with child
    /// interpreters so each path executes at most once per run.
    modules: Rc<RefCell<HashMap<String, Rc<RefCell<Environment>>>>>,
    pub(crate) out: Output,
}

impl Interpreter {
    /// Creates a new Interpreter writing to stdout, with the predefined
    /// natives (`clock`, `sleep`, `type`, `arity`, `assert`, `import`, ...)
    /// already in scope.
    pub fn new() -> Self {
        Self::with_output(Rc::new(RefCell::new(io::stdout())))
    }

    /// Creates a new Interpreter with a caller-supplied output sink.
    pub fn with_output(out: Output) -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        let mut interpreter = Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            modules: Rc::new(RefCell::new(HashMap::new())),
            out,
        };

        predefs::bake(&mut interpreter);

        interpreter
    }

    /// Merge a resolver-produced distance table. The REPL resolves each
    /// line separately; ids are unique across lines, so merging is safe.
    pub fn add_locals(&mut self, locals: Locals) {
        debug!("Adding {} resolved local binding(s)", locals.len());
        self.locals.extend(locals);
    }

    /// Interprets a list of statements (a "program").
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            // checker pipeline guarantees no stray break/continue/return
            // survives to the top level
            self.execute(stmt)?;
        }

        info!("Interpretation completed successfully");
        Ok(())
    }

    /// Evaluates one expression and renders its value for REPL display.
    pub fn interpret_expression(&mut self, expr: &Expr) -> Result<String, RuntimeError> {
        let value = self.evaluate(expr)?;
        Ok(value.to_string())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> ExecResult {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                debug!("Printing value: {}", value);
                let _ = writeln!(self.out.borrow_mut(), "{}", value);
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Defining variable '{}' = {}", name.lexeme, value);
                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &self.environment,
                ))));
                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch.as_deref() {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                debug!("Entering while loop");

                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        // a return unwinds past the loop to the call frame
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => self.execute_for(initializer.as_deref(), condition, increment.as_ref(), body),

            Stmt::Control { keyword } => match keyword.token_type {
                TokenType::BREAK => Ok(Flow::Break),
                TokenType::CONTINUE => Ok(Flow::Continue),
                _ => Err(RuntimeError::type_error(
                    keyword,
                    "Invalid loop control statement.",
                )),
            },

            Stmt::Function(decl) => {
                let function = self.make_function(decl);
                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, function);
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Return in flight with value: {}", value);
                Ok(Flow::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class_decl(name, superclass.as_ref(), methods),
        }
    }

    /// Run `statements` in `env`, restoring the previous scope on every
    /// exit path (normal completion, control transfer, or error).
    pub(crate) fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: Rc<RefCell<Environment>>,
    ) -> ExecResult {
        let previous = Rc::clone(&self.environment);
        self.environment = env;

        let mut outcome = Ok(Flow::Normal);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                other => {
                    outcome = other;
                    break;
                }
            }
        }

        self.environment = previous;
        outcome
    }

    /// `for` semantics: one fresh scope holds the initializer and is shared
    /// across iterations (a closure made in the body sees the same binding
    /// every iteration). The increment still runs after a `continue`, but
    /// not after a `break`.
    fn execute_for(
        &mut self,
        initializer: Option<&Stmt>,
        condition: &Expr,
        increment: Option<&Expr>,
        body: &Stmt,
    ) -> ExecResult {
        debug!("Entering for loop");

        let previous = Rc::clone(&self.environment);
        self.environment = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &previous,
        ))));

        let outcome = (|| {
            if let Some(init) = initializer {
                match self.execute(init)? {
                    Flow::Normal => {}
                    flow => return Ok(flow),
                }
            }

            while self.evaluate(condition)?.is_truthy() {
                match self.execute(body)? {
                    Flow::Normal | Flow::Continue => {}
                    Flow::Break => return Ok(Flow::Normal),
                    flow @ Flow::Return(_) => return Ok(flow),
                }

                if let Some(inc) = increment {
                    self.evaluate(inc)?;
                }
            }

            Ok(Flow::Normal)
        })();

        self.environment = previous;
        outcome
    }

    fn execute_class_decl(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[FunctionDecl],
    ) -> ExecResult {
        let superclass_value = match superclass {
            Some(expr) => {
                let value = self.evaluate(expr)?;
                let blame = superclass_token(expr, name);
                match value {
                    Value::Class(class) => Some(class),
                    _ => {
                        return Err(RuntimeError::type_error(
                            &blame,
                            "Superclass must be a class.",
                        ))
                    }
                }
            }
            None => None,
        };

        // the class name is bound before methods are built, so methods may
        // reference their own class recursively
        self.environment.borrow_mut().define(&name.lexeme, Value::Nil);

        let enclosing = match &superclass_value {
            Some(sc) => {
                let mut env = Environment::with_enclosing(Rc::clone(&self.environment));
                env.define("super", Value::Class(Rc::clone(sc)));

                let previous = Rc::clone(&self.environment);
                self.environment = Rc::new(RefCell::new(env));
                Some(previous)
            }
            None => None,
        };

        let mut method_table = HashMap::new();
        for method in methods {
            let function = Function {
                name: Some(method.name.lexeme.clone()),
                params: method.params.clone(),
                body: Rc::new(method.body.clone()),
                closure: Rc::clone(&self.environment),
                is_initializer: method.name.lexeme == "init",
            };
            method_table.insert(method.name.lexeme.clone(), Value::function(function));
        }

        let class = Value::Class(Rc::new(Class {
            name: name.lexeme.clone(),
            superclass: superclass_value,
            methods: method_table,
        }));

        if let Some(previous) = enclosing {
            self.environment = previous;
        }

        info!("Class '{}' declared", name.lexeme);
        self.environment.borrow_mut().assign(name, class)?;

        Ok(Flow::Normal)
    }

    fn make_function(&self, decl: &FunctionDecl) -> Value {
        Value::function(Function {
            name: Some(decl.name.lexeme.clone()),
            params: decl.params.clone(),
            body: Rc::new(decl.body.clone()),
            closure: Rc::clone(&self.environment),
            is_initializer: false,
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> EvalResult {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(match lit {
                Lit::Number(n) => Value::Number(*n),
                Lit::Str(s) => Value::Str(s.clone()),
                Lit::True => Value::Bool(true),
                Lit::False => Value::Bool(false),
                Lit::Nil => Value::Nil,
            }),

            ExprKind::Grouping(inner) => self.evaluate(inner),

            ExprKind::Unary { operator, right } => self.evaluate_unary(operator, right),

            ExprKind::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            ExprKind::Ternary {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                // only the selected branch is evaluated
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            ExprKind::Logical {
                left,
                operator,
                right,
            } => {
                let left_value = self.evaluate(left)?;

                // short-circuit, passing the operand value through untouched
                match operator.token_type {
                    TokenType::OR if left_value.is_truthy() => Ok(left_value),
                    TokenType::AND if !left_value.is_truthy() => Ok(left_value),
                    _ => self.evaluate(right),
                }
            }

            ExprKind::Variable { name } => self.lookup_variable(name, expr.id),

            ExprKind::Assign { name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(&expr.id) {
                    Some(distance) => {
                        Environment::assign_at(&self.environment, *distance, name, value.clone());
                    }
                    None => {
                        self.globals.borrow_mut().assign(name, value.clone())?;
                    }
                }

                Ok(value)
            }

            ExprKind::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_value = self.evaluate(callee)?;

                let mut argument_values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    argument_values.push(self.evaluate(argument)?);
                }

                self.call_value(&callee_value, argument_values, paren)
            }

            ExprKind::Get { object, name } => {
                let object = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => Instance::get(&instance, name),
                    // static access: methods looked up on the class itself
                    // come back unbound
                    Value::Class(class) => class.find_method(&name.lexeme).ok_or_else(|| {
                        RuntimeError::new(
                            name,
                            RuntimeErrorKind::UndefinedProperty(name.lexeme.clone()),
                        )
                    }),
                    _ => Err(RuntimeError::type_error(
                        name,
                        "Only instances have properties.",
                    )),
                }
            }

            ExprKind::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value)?;
                        instance.borrow_mut().set(name, value.clone());
                        Ok(value)
                    }
                    _ => Err(RuntimeError::type_error(name, "Only instances have fields.")),
                }
            }

            ExprKind::This { keyword } => self.lookup_variable(keyword, expr.id),

            ExprKind::Super { keyword, method } => self.evaluate_super(expr.id, keyword, method),

            ExprKind::Lambda { params, body } => Ok(Value::function(Function {
                name: None,
                params: params.clone(),
                body: Rc::new(body.clone()),
                closure: Rc::clone(&self.environment),
                is_initializer: false,
            })),
        }
    }

    fn lookup_variable(&self, name: &Token, id: ExprId) -> EvalResult {
        match self.locals.get(&id) {
            Some(distance) => Environment::get_at(&self.environment, *distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> EvalResult {
        let distance = *self.locals.get(&id).ok_or_else(|| {
            RuntimeError::type_error(keyword, "Cannot use 'super' outside of a subclass method.")
        })?;

        let superclass = match Environment::get_at(&self.environment, distance, keyword)? {
            Value::Class(class) => class,
            _ => {
                return Err(RuntimeError::type_error(keyword, "Superclass must be a class."));
            }
        };

        // the receiver sits one scope inside the `super` scope
        let this_token = Token::new(TokenType::THIS, "this", keyword.line);
        let object = match Environment::get_at(&self.environment, distance - 1, &this_token)? {
            Value::Instance(instance) => instance,
            _ => {
                return Err(RuntimeError::type_error(keyword, "'super' requires a receiver."));
            }
        };

        match superclass.find_method(&method.lexeme) {
            Some(Value::Function(function)) => Ok(Value::function(function.bind(object))),
            Some(other) => Ok(other),
            None => Err(RuntimeError::new(
                method,
                RuntimeErrorKind::UndefinedProperty(method.lexeme.clone()),
            )),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Operators
    // ─────────────────────────────────────────────────────────────────────

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> EvalResult {
        let right_value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right_value {
                Value::Number(n) => Ok(Value::Number(-n)),
                instance @ Value::Instance(_) => {
                    self.call_special_method(&instance, "unary_minus", None, operator)
                }
                _ => Err(RuntimeError::type_error(operator, "Operand must be a number.")),
            },

            TokenType::BANG => match right_value {
                instance @ Value::Instance(_) => {
                    self.call_special_method(&instance, "unary_not", None, operator)
                }
                value => Ok(Value::Bool(!value.is_truthy())),
            },

            _ => Err(RuntimeError::type_error(operator, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> EvalResult {
        let left_value = self.evaluate(left)?;
        let right_value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
                // mixed string/number concatenation coerces the number to
                // its display string
                (Value::Str(a), b @ Value::Number(_)) => Ok(Value::Str(format!("{}{}", a, b))),
                (a @ Value::Number(_), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
                (instance @ Value::Instance(_), b) => {
                    self.call_special_method(&instance, "add", Some(b), operator)
                }
                _ => Err(RuntimeError::type_error(
                    operator,
                    "Operands must be two numbers or two strings or a string and a number.",
                )),
            },

            TokenType::MINUS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
                (instance @ Value::Instance(_), b) => {
                    self.call_special_method(&instance, "subtract", Some(b), operator)
                }
                _ => Err(RuntimeError::type_error(operator, "Operands must be numbers.")),
            },

            TokenType::STAR => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
                (Value::Str(s), Value::Number(n)) => {
                    let count = n.round() as i64;
                    if count < 1 {
                        return Err(RuntimeError::type_error(
                            operator,
                            "Right operand of string repetition should be >= 1.",
                        ));
                    }
                    Ok(Value::Str(s.repeat(count as usize)))
                }
                (instance @ Value::Instance(_), b) => {
                    self.call_special_method(&instance, "multiply", Some(b), operator)
                }
                _ => Err(RuntimeError::type_error(
                    operator,
                    "Operands must be two numbers or a string and a number.",
                )),
            },

            TokenType::SLASH => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => {
                    if b == 0.0 {
                        Err(RuntimeError::new(operator, RuntimeErrorKind::ZeroDivision))
                    } else {
                        Ok(Value::Number(a / b))
                    }
                }
                (instance @ Value::Instance(_), b) => {
                    self.call_special_method(&instance, "divide", Some(b), operator)
                }
                _ => Err(RuntimeError::type_error(operator, "Operands must be numbers.")),
            },

            TokenType::GREATER => self.compare(left_value, right_value, operator, "greater"),
            TokenType::GREATER_EQUAL => {
                self.compare(left_value, right_value, operator, "greater_equal")
            }
            TokenType::LESS => self.compare(left_value, right_value, operator, "less"),
            TokenType::LESS_EQUAL => self.compare(left_value, right_value, operator, "less_equal"),

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_value.equals(&right_value))),
            TokenType::BANG_EQUAL => Ok(Value::Bool(!left_value.equals(&right_value))),

            // comma: both sides evaluated, the right one wins
            TokenType::COMMA => Ok(right_value),

            _ => Err(RuntimeError::type_error(operator, "Invalid binary operator.")),
        }
    }

    /// Shared semantics of `>` `>=` `<` `<=`: numeric ordering, lexicographic
    /// string ordering, or a special-method dispatch for object operands.
    fn compare(
        &mut self,
        left: Value,
        right: Value,
        operator: &Token,
        special: &'static str,
    ) -> EvalResult {
        let ordering = match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Instance(_), _) => {
                return self.call_special_method(&left, special, Some(right), operator);
            }
            _ => {
                return Err(RuntimeError::type_error(
                    operator,
                    "Operands must be two numbers or two strings.",
                ));
            }
        };

        let result = match (ordering, &operator.token_type) {
            (Some(ord), TokenType::GREATER) => ord == std::cmp::Ordering::Greater,
            (Some(ord), TokenType::GREATER_EQUAL) => ord != std::cmp::Ordering::Less,
            (Some(ord), TokenType::LESS) => ord == std::cmp::Ordering::Less,
            (Some(ord), TokenType::LESS_EQUAL) => ord != std::cmp::Ordering::Greater,
            // NaN comparisons are false
            (None, _) => false,
            _ => {
                return Err(RuntimeError::type_error(operator, "Invalid comparison operator."));
            }
        };

        Ok(Value::Bool(result))
    }

    /// Operator-overload dispatch: look up the fixed-name hook on the
    /// operand and call it. Binary hooks must declare arity exactly {1},
    /// unary hooks exactly {0}.
    fn call_special_method(
        &mut self,
        object: &Value,
        name: &'static str,
        argument: Option<Value>,
        operator: &Token,
    ) -> EvalResult {
        let Value::Instance(instance) = object else {
            return Err(RuntimeError::type_error(operator, "Operand must be an object."));
        };

        let method_token = Token::new(TokenType::IDENTIFIER, name, operator.line);
        let method = Instance::get(instance, &method_token).map_err(|_| {
            RuntimeError::new(
                operator,
                RuntimeErrorKind::MissingSpecialMethod(name.to_string()),
            )
        })?;

        let expected = if argument.is_some() { 1 } else { 0 };

        let declared = match &method {
            Value::Function(function) => function.arity(),
            Value::Native(native) => native.arity.clone(),
            _ => {
                return Err(RuntimeError::type_error(
                    operator,
                    format!("'{}' is not a method.", name),
                ));
            }
        };

        if !declared.is_exactly(expected) {
            return Err(RuntimeError::new(
                operator,
                RuntimeErrorKind::Arity {
                    expected: declared.to_string(),
                    got: expected,
                },
            ));
        }

        debug!("Dispatching special method '{}'", name);

        let arguments: Vec<Value> = argument.into_iter().collect();
        self.call_value(&method, arguments, operator)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Call protocol
    // ─────────────────────────────────────────────────────────────────────

    /// Invoke any callable value: user function, native, or class
    /// (constructor). The argument count must be a member of the callee's
    /// acceptable-arity set.
    pub fn call_value(
        &mut self,
        callee: &Value,
        arguments: Vec<Value>,
        paren: &Token,
    ) -> EvalResult {
        match callee {
            Value::Function(function) => {
                self.check_arity(&function.arity(), arguments.len(), paren)?;
                self.call_function(function, arguments)
            }

            Value::Native(native) => {
                debug!("Calling native function '{}'", native.name);
                self.check_arity(&native.arity, arguments.len(), paren)?;
                (native.func)(self, &arguments, paren)
            }

            Value::Class(class) => {
                self.check_arity(&class.arity(), arguments.len(), paren)?;

                let instance = Rc::new(RefCell::new(Instance::new(Rc::clone(class))));

                if let Some(Value::Function(init)) = class.find_method("init") {
                    let bound = Rc::new(init.bind(Rc::clone(&instance)));
                    self.call_function(&bound, arguments)?;
                }

                Ok(Value::Instance(instance))
            }

            _ => Err(RuntimeError::type_error(
                paren,
                "Can only call functions and classes.",
            )),
        }
    }

    fn check_arity(
        &self,
        arity: &Arity,
        got: usize,
        paren: &Token,
    ) -> Result<(), RuntimeError> {
        if arity.contains(got) {
            Ok(())
        } else {
            Err(RuntimeError::new(
                paren,
                RuntimeErrorKind::Arity {
                    expected: arity.to_string(),
                    got,
                },
            ))
        }
    }

    /// One fresh scope per call, chained to the function's captured closure
    /// (not the caller's scope); that is what makes closures lexical.
    fn call_function(&mut self, function: &Rc<Function>, arguments: Vec<Value>) -> EvalResult {
        let mut env = Environment::with_enclosing(Rc::clone(&function.closure));
        for (param, argument) in function.params.iter().zip(arguments) {
            env.define(&param.lexeme, argument);
        }

        let flow = self.execute_block(&function.body, Rc::new(RefCell::new(env)))?;

        if function.is_initializer {
            // initializers yield the bound instance even on a bare early
            // return; the checker already rejected value-carrying returns
            return Environment::get_at(&function.closure, 0, &Token::synthetic("this"));
        }

        match flow {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Nil),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Module loading
    // ─────────────────────────────────────────────────────────────────────

    /// Resolve a file-backed import: execute `path` at most once per run
    /// and hand back its global environment.
    pub fn import_module(
        &mut self,
        path: &str,
        blame: &Token,
    ) -> Result<Rc<RefCell<Environment>>, RuntimeError> {
        if let Some(env) = self.modules.borrow().get(path) {
            debug!("Module '{}' served from cache", path);
            return Ok(Rc::clone(env));
        }

        info!("Loading module '{}'", path);

        let source = fs::read_to_string(path).map_err(|_| {
            RuntimeError::new(
                blame,
                RuntimeErrorKind::Native(format!("Failed to find file {} while importing.", path)),
            )
        })?;

        let env = self.execute_module(&source, path, blame)?;

        self.modules
            .borrow_mut()
            .insert(path.to_string(), Rc::clone(&env));

        Ok(env)
    }

    /// Full scan→parse→resolve→check→interpret pipeline over another file,
    /// in a child interpreter that shares this one's output sink and module
    /// cache. Any failure along the way is one import error.
    fn execute_module(
        &mut self,
        source: &str,
        path: &str,
        blame: &Token,
    ) -> Result<Rc<RefCell<Environment>>, RuntimeError> {
        let import_error = || {
            RuntimeError::new(
                blame,
                RuntimeErrorKind::Native(format!(
                    "Failed to execute file {} while importing.",
                    path
                )),
            )
        };

        let mut tokens = Vec::new();
        for result in Scanner::new(source) {
            tokens.push(result.map_err(|_| import_error())?);
        }

        let (statements, parse_errors) = Parser::new(tokens).parse();
        if !parse_errors.is_empty() {
            return Err(import_error());
        }

        let locals = Resolver::new()
            .resolve(&statements)
            .map_err(|_| import_error())?;

        if !run_checks(&statements).is_clean() {
            return Err(import_error());
        }

        let mut child = Interpreter::with_output(Rc::clone(&self.out));
        child.modules = Rc::clone(&self.modules);
        child.add_locals(locals);
        child.interpret(&statements).map_err(|_| import_error())?;

        Ok(Rc::clone(&child.globals))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// The token to blame when a superclass expression is not a class.
fn superclass_token(expr: &Expr, fallback: &Token) -> Token {
    match &expr.kind {
        ExprKind::Variable { name } => name.clone(),
        _ => fallback.clone(),
    }
}
