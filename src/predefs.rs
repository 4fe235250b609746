//! Predefined natives and importable built-in objects.
//!
//! `bake` installs the native functions (`clock`, `sleep`, `type`, `arity`,
//! `assert`, `import`) and the predefined classes into a fresh
//! interpreter's global scope. The importable objects (`predef.StdIO`,
//! `predef.Math`) are built on demand by the `import` native; they are
//! ordinary instances whose classes carry native methods, which is the
//! whole protocol a library object needs to join the object model.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info};

use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::interpreter::Interpreter;
use crate::token::{Token, TokenType};
use crate::value::{Arity, Class, Instance, NativeFn, Value};

/// The native functions the predefined layer installs. Checker passes seed
/// their known-globals set from this so predefined names never look like
/// undeclared references.
pub const PREDEFINED_NAMES: &[&str] = &["clock", "sleep", "type", "arity", "assert", "import"];

/// The predefined classes, used by `type` and installed alongside the
/// natives.
pub const PREDEFINED_CLASSES: &[&str] =
    &["Class", "Function", "Object", "Nil", "Number", "String", "Boolean"];

/// Install every predefined binding into the interpreter's global scope.
pub fn bake(interpreter: &mut Interpreter) {
    info!("Baking predefined natives into globals");

    let globals = Rc::clone(&interpreter.globals);
    let mut env = globals.borrow_mut();

    env.define("clock", Value::native("clock", Arity::exactly(0), clock));
    env.define("sleep", Value::native("sleep", Arity::exactly(1), sleep));
    env.define("type", Value::native("type", Arity::exactly(1), type_of));
    env.define("arity", Value::native("arity", Arity::exactly(1), arity_of));
    env.define(
        "assert",
        Value::native("assert", Arity::one_of(&[1, 2]), assert_truthy),
    );
    env.define("import", Value::native("import", Arity::exactly(1), import));

    for name in PREDEFINED_CLASSES {
        env.define(name, empty_class(name));
    }
}

fn empty_class(name: &str) -> Value {
    Value::Class(Rc::new(Class {
        name: name.to_string(),
        superclass: None,
        methods: HashMap::new(),
    }))
}

fn native_error(blame: &Token, message: impl Into<String>) -> RuntimeError {
    RuntimeError::new(blame, RuntimeErrorKind::Native(message.into()))
}

fn number_arg(args: &[Value], index: usize, blame: &Token) -> Result<f64, RuntimeError> {
    match args.get(index) {
        Some(Value::Number(n)) => Ok(*n),
        _ => Err(native_error(blame, "argument must be a number.")),
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Native functions
// ─────────────────────────────────────────────────────────────────────────

fn clock(_interp: &mut Interpreter, _args: &[Value], _blame: &Token) -> Result<Value, RuntimeError> {
    let seconds = Utc::now().timestamp_millis() as f64 / 1000.0;
    debug!("clock() -> {}", seconds);
    Ok(Value::Number(seconds))
}

/// Block the single execution thread for the requested milliseconds.
/// Negative durations are a runtime error.
fn sleep(_interp: &mut Interpreter, args: &[Value], blame: &Token) -> Result<Value, RuntimeError> {
    let millis = number_arg(args, 0, blame)?;

    let rounded = millis.round();
    if rounded < 0.0 {
        return Err(native_error(blame, "time cannot be negative."));
    }

    thread::sleep(Duration::from_millis(rounded as u64));
    Ok(Value::Nil)
}

/// The predefined class a value belongs to; instances answer with their own
/// class.
fn type_of(interp: &mut Interpreter, args: &[Value], blame: &Token) -> Result<Value, RuntimeError> {
    let class_name = match &args[0] {
        Value::Nil => "Nil",
        Value::Bool(_) => "Boolean",
        Value::Number(_) => "Number",
        Value::Str(_) => "String",
        Value::Function(_) | Value::Native(_) => "Function",
        Value::Class(_) => "Class",
        Value::Instance(instance) => {
            return Ok(Value::Class(Rc::clone(&instance.borrow().class)));
        }
    };

    let lookup = Token::new(TokenType::IDENTIFIER, class_name, blame.line);
    interp.globals.borrow().get(&lookup)
}

/// The acceptable argument count of a callable: a number for the usual
/// single-count case, a string such as "0 or 1" for variadic natives.
fn arity_of(_interp: &mut Interpreter, args: &[Value], blame: &Token) -> Result<Value, RuntimeError> {
    let arity = match &args[0] {
        Value::Function(function) => function.arity(),
        Value::Native(native) => native.arity.clone(),
        Value::Class(class) => class.arity(),
        _ => return Err(native_error(blame, "argument must be a function or class.")),
    };

    Ok(match arity.as_single() {
        Some(count) => Value::Number(count as f64),
        None => Value::Str(arity.to_string()),
    })
}

/// `assert(value)` or `assert(value, message)`: passes truthy values
/// through, fails with the optional message otherwise.
fn assert_truthy(
    _interp: &mut Interpreter,
    args: &[Value],
    blame: &Token,
) -> Result<Value, RuntimeError> {
    if !args[0].is_truthy() {
        let message = match args.get(1) {
            Some(Value::Str(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "assertion error.".to_string(),
        };
        return Err(native_error(blame, message));
    }
    Ok(args[0].clone())
}

// ─────────────────────────────────────────────────────────────────────────
// Import
// ─────────────────────────────────────────────────────────────────────────

/// Resolve a dotted import path to a built-in predefined object, a global
/// name, or a name exported by another source file (executed at most once
/// per resolved path).
fn import(interp: &mut Interpreter, args: &[Value], blame: &Token) -> Result<Value, RuntimeError> {
    let Value::Str(path) = &args[0] else {
        return Err(native_error(blame, "argument must be a string."));
    };

    let parts: Vec<&str> = path.split('.').collect();

    match parts.as_slice() {
        ["predef", name] => predef_object(name, blame),

        [name] => {
            let lookup = Token::new(TokenType::IDENTIFIER, *name, blame.line);
            interp
                .globals
                .borrow()
                .get(&lookup)
                .map_err(|_| native_error(blame, format!("Failed to resolve name {}.", path)))
        }

        [..] if parts.len() >= 2 => {
            let mut file_path = String::new();
            for part in &parts[..parts.len() - 2] {
                file_path.push_str(part);
                file_path.push('/');
            }
            file_path.push_str(parts[parts.len() - 2]);
            file_path.push_str(".ql");

            let name = parts[parts.len() - 1];

            let module = interp.import_module(&file_path, blame)?;
            let lookup = Token::new(TokenType::IDENTIFIER, name, blame.line);

            let value = module.borrow().get(&lookup).map_err(|_| {
                native_error(
                    blame,
                    format!(
                        "Could not find name {} in file {} while importing.",
                        name, file_path
                    ),
                )
            })?;

            Ok(value)
        }

        _ => Err(native_error(blame, "empty import path.")),
    }
}

/// The built-in objects reachable through `import("predef.X")`.
fn predef_object(name: &str, blame: &Token) -> Result<Value, RuntimeError> {
    match name {
        "StdIO" => Ok(instance_of(native_class(
            "StdIO",
            &[
                ("write", Arity::exactly(1), stdio_write as NativeFn),
                ("writeln", Arity::exactly(1), stdio_writeln as NativeFn),
                ("readln", Arity::exactly(0), stdio_readln as NativeFn),
            ],
        ))),

        "Math" => Ok(instance_of(native_class(
            "Math",
            &[
                ("abs", Arity::exactly(1), math_abs as NativeFn),
                ("floor", Arity::exactly(1), math_floor as NativeFn),
                ("ceil", Arity::exactly(1), math_ceil as NativeFn),
                ("sqrt", Arity::exactly(1), math_sqrt as NativeFn),
                ("pow", Arity::exactly(2), math_pow as NativeFn),
            ],
        ))),

        _ => Err(native_error(blame, "unknown predefined object.")),
    }
}

fn native_class(name: &'static str, methods: &[(&'static str, Arity, NativeFn)]) -> Rc<Class> {
    let mut table = HashMap::new();
    for (method_name, arity, func) in methods {
        table.insert(
            method_name.to_string(),
            Value::native(*method_name, arity.clone(), *func),
        );
    }

    Rc::new(Class {
        name: name.to_string(),
        superclass: None,
        methods: table,
    })
}

fn instance_of(class: Rc<Class>) -> Value {
    Value::Instance(Rc::new(RefCell::new(Instance::new(class))))
}

// ─────────────────────────────────────────────────────────────────────────
// StdIO methods
// ─────────────────────────────────────────────────────────────────────────

fn stdio_write(interp: &mut Interpreter, args: &[Value], blame: &Token) -> Result<Value, RuntimeError> {
    write!(interp.out.borrow_mut(), "{}", args[0])
        .map_err(|e| native_error(blame, format!("write failed: {}", e)))?;
    Ok(Value::Nil)
}

fn stdio_writeln(
    interp: &mut Interpreter,
    args: &[Value],
    blame: &Token,
) -> Result<Value, RuntimeError> {
    writeln!(interp.out.borrow_mut(), "{}", args[0])
        .map_err(|e| native_error(blame, format!("write failed: {}", e)))?;
    Ok(Value::Nil)
}

fn stdio_readln(
    _interp: &mut Interpreter,
    _args: &[Value],
    blame: &Token,
) -> Result<Value, RuntimeError> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| native_error(blame, format!("read failed: {}", e)))?;

    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }

    Ok(Value::Str(line))
}

// ─────────────────────────────────────────────────────────────────────────
// Math methods
// ─────────────────────────────────────────────────────────────────────────

fn math_abs(_interp: &mut Interpreter, args: &[Value], blame: &Token) -> Result<Value, RuntimeError> {
    Ok(Value::Number(number_arg(args, 0, blame)?.abs()))
}

fn math_floor(_interp: &mut Interpreter, args: &[Value], blame: &Token) -> Result<Value, RuntimeError> {
    Ok(Value::Number(number_arg(args, 0, blame)?.floor()))
}

fn math_ceil(_interp: &mut Interpreter, args: &[Value], blame: &Token) -> Result<Value, RuntimeError> {
    Ok(Value::Number(number_arg(args, 0, blame)?.ceil()))
}

fn math_sqrt(_interp: &mut Interpreter, args: &[Value], blame: &Token) -> Result<Value, RuntimeError> {
    Ok(Value::Number(number_arg(args, 0, blame)?.sqrt()))
}

fn math_pow(_interp: &mut Interpreter, args: &[Value], blame: &Token) -> Result<Value, RuntimeError> {
    let base = number_arg(args, 0, blame)?;
    let exponent = number_arg(args, 1, blame)?;
    Ok(Value::Number(base.powf(exponent)))
}
