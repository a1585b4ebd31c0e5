use crate::error::{Result, SalmonError};
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One scope frame.  Frames are shared (`Rc`) by every block, call and
/// closure that captured them; `enclosing` points outward only.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
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

    pub fn into_shared(self) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(self))
    }

    /// Binds `name` in this frame, replacing any previous binding.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Dynamic lookup through the chain.  Only used for globals, whose frame
    /// has no parent, so in practice this checks a single frame.
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// The frame exactly `distance` links out from `env`.
    pub fn ancestor(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
    ) -> Option<Rc<RefCell<Environment>>> {
        let mut current: Rc<RefCell<Environment>> = Rc::clone(env);

        for _ in 0..distance {
            let parent = current.borrow().enclosing.clone()?;
            current = parent;
        }

        Some(current)
    }

    /// Reads `name` from the frame `distance` hops out, without walking any
    /// further.
    pub fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &Token) -> Result<Value> {
        let frame = Self::ancestor(env, distance).ok_or_else(|| undefined(name))?;
        let value = frame.borrow().values.get(&name.lexeme).cloned();

        value.ok_or_else(|| undefined(name))
    }

    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &Token,
        value: Value,
    ) -> Result<()> {
        let frame = Self::ancestor(env, distance).ok_or_else(|| undefined(name))?;
        let mut frame = frame.borrow_mut();

        match frame.values.get_mut(&name.lexeme) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name)),
        }
    }
}

fn undefined(name: &Token) -> SalmonError {
    SalmonError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name, 1)
    }

    #[test]
    fn get_at_reads_exactly_the_resolved_frame() {
        let globals = Environment::new().into_shared();
        globals.borrow_mut().define("a", Value::Number(1.0));

        let block = Environment::with_enclosing(Rc::clone(&globals)).into_shared();
        block.borrow_mut().define("a", Value::Number(2.0));

        let inner = Environment::with_enclosing(Rc::clone(&block)).into_shared();

        assert_eq!(
            Environment::get_at(&inner, 1, &ident("a")).unwrap(),
            Value::Number(2.0)
        );
        assert_eq!(
            Environment::get_at(&inner, 2, &ident("a")).unwrap(),
            Value::Number(1.0)
        );
        // No fallback walk: the name is not in the innermost frame itself.
        assert!(Environment::get_at(&inner, 0, &ident("a")).is_err());
    }

    #[test]
    fn assign_at_mutates_shared_frame() {
        let outer = Environment::new().into_shared();
        outer.borrow_mut().define("count", Value::Number(0.0));

        let first = Environment::with_enclosing(Rc::clone(&outer)).into_shared();
        let second = Environment::with_enclosing(Rc::clone(&outer)).into_shared();

        Environment::assign_at(&first, 1, &ident("count"), Value::Number(5.0)).unwrap();
        assert_eq!(
            Environment::get_at(&second, 1, &ident("count")).unwrap(),
            Value::Number(5.0)
        );
    }

    #[test]
    fn undefined_global_is_an_error() {
        let globals = Environment::new();
        let err = globals.get(&ident("missing")).unwrap_err();
        assert_eq!(err.to_string(), "Undefined variable 'missing'.\n[line 1]");

        let mut globals = globals;
        assert!(globals.assign(&ident("missing"), Value::Nil).is_err());
    }

    #[test]
    fn ancestor_past_the_chain_is_none() {
        let globals = Environment::new().into_shared();
        assert!(Environment::ancestor(&globals, 1).is_none());
    }
}
