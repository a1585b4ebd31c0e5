use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::class::Instance;
use crate::environment::Environment;
use crate::stmt::FunctionDecl;
use crate::value::Value;

/// A user function or method: its declaration plus the environment that was
/// active where it was defined.
pub struct Function {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

impl Function {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    /// Returns a copy whose closure is a fresh frame binding `this` to
    /// `instance`, parented at the original closure.
    pub fn bind(&self, instance: Rc<RefCell<Instance>>) -> Function {
        let mut env = Environment::with_enclosing(Rc::clone(&self.closure));
        env.define("this", Value::Instance(instance));

        Function::new(
            Rc::clone(&self.declaration),
            env.into_shared(),
            self.is_initializer,
        )
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    pub fn declaration(&self) -> &FunctionDecl {
        &self.declaration
    }

    pub fn closure(&self) -> &Rc<RefCell<Environment>> {
        &self.closure
    }

    pub fn is_initializer(&self) -> bool {
        self.is_initializer
    }
}

// The closure usually contains this function again, so it is left out.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .field("is_initializer", &self.is_initializer)
            .finish()
    }
}
