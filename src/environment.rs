//! The scope chain.
//!
//! Scopes are shared-ownership (`Rc<RefCell<..>>`) because several closures
//! may capture the same scope and a scope can outlive the statement that
//! created it. Mutation through any holder is visible through all of them;
//! that is how closures observe later writes to captured variables.

use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    pub enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Insert or overwrite `name` in *this* scope. Never fails; declaration
    /// always succeeds in whichever scope is current.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Search outward through the chain; error if no scope declares `name`.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(RuntimeError::new(
                name,
                RuntimeErrorKind::UndefinedVariable(name.lexeme.clone()),
            ))
        }
    }

    /// Mutate the first match walking outward. Assignment never creates a
    /// binding; an exhausted chain is an error.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if self.values.contains_key(&name.lexeme) {
            self.values.insert(name.lexeme.clone(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(RuntimeError::new(
                name,
                RuntimeErrorKind::UndefinedVariable(name.lexeme.clone()),
            ))
        }
    }

    /// The scope exactly `distance` hops outward from `env`.
    ///
    /// Panics if the chain is shorter than `distance`; the resolver only
    /// hands out distances it derived from the same lexical structure the
    /// interpreter rebuilds at run time, so a short chain is a logic bug,
    /// not a user error.
    pub fn ancestor(env: &Rc<RefCell<Environment>>, distance: usize) -> Rc<RefCell<Environment>> {
        let mut current = Rc::clone(env);

        for _ in 0..distance {
            let next = current
                .borrow()
                .enclosing
                .as_ref()
                .expect("resolved distance exceeds scope-chain depth")
                .clone();
            current = next;
        }

        current
    }

    /// O(1) read at a resolved distance (no outward search).
    pub fn get_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &Token,
    ) -> Result<Value, RuntimeError> {
        let scope = Environment::ancestor(env, distance);
        let borrowed = scope.borrow();

        match borrowed.values.get(&name.lexeme) {
            Some(value) => Ok(value.clone()),
            None => Err(RuntimeError::new(
                name,
                RuntimeErrorKind::UndefinedVariable(name.lexeme.clone()),
            )),
        }
    }

    /// O(1) write at a resolved distance (no outward search).
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &Token,
        value: Value,
    ) {
        let scope = Environment::ancestor(env, distance);
        scope.borrow_mut().values.insert(name.lexeme.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name, 1)
    }

    #[test]
    fn define_then_get() {
        let mut env = Environment::new();
        env.define("a", Value::Number(1.0));

        assert_eq!(env.get(&ident("a")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn get_walks_outward() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a", Value::Number(1.0));

        let inner = Environment::with_enclosing(Rc::clone(&global));

        assert_eq!(inner.get(&ident("a")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_mutates_declaring_scope() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a", Value::Number(1.0));

        let mut inner = Environment::with_enclosing(Rc::clone(&global));
        inner.assign(&ident("a"), Value::Number(2.0)).unwrap();

        assert_eq!(global.borrow().get(&ident("a")).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn assign_never_creates_bindings() {
        let mut env = Environment::new();
        let err = env.assign(&ident("ghost"), Value::Nil).unwrap_err();

        assert_eq!(
            err.kind,
            RuntimeErrorKind::UndefinedVariable("ghost".to_string())
        );
    }

    #[test]
    fn get_at_jumps_exactly_n_scopes() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a", Value::Number(1.0));

        let middle = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &global,
        ))));
        middle.borrow_mut().define("a", Value::Number(2.0));

        let inner = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &middle,
        ))));

        assert_eq!(
            Environment::get_at(&inner, 1, &ident("a")).unwrap(),
            Value::Number(2.0)
        );
        assert_eq!(
            Environment::get_at(&inner, 2, &ident("a")).unwrap(),
            Value::Number(1.0)
        );
    }

    #[test]
    fn shared_scope_mutation_is_visible_to_all_holders() {
        let shared = Rc::new(RefCell::new(Environment::new()));
        shared.borrow_mut().define("n", Value::Number(0.0));

        let holder_a = Rc::clone(&shared);
        let holder_b = Rc::clone(&shared);

        holder_a.borrow_mut().define("n", Value::Number(5.0));

        assert_eq!(
            holder_b.borrow().get(&ident("n")).unwrap(),
            Value::Number(5.0)
        );
    }
}
