//! Tree‑walking evaluator.
//!
//! One `Interpreter` is a session: it owns the global frame and the
//! resolver's hop‑count table, both of which persist across successive
//! [`crate::run`] calls so a REPL accumulates definitions.
//!
//! Statement execution returns [`Flow`]: `return` travels outward as an
//! ordinary value until the enclosing call consumes it, while genuine
//! failures travel as `Err(SalmonError)` up to [`Interpreter::interpret`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::class::{Class, Instance};
use crate::environment::Environment;
use crate::error::{Result, SalmonError};
use crate::expr::{Expr, ExprId, LiteralValue};
use crate::function::Function;
use crate::stack::ensure_sufficient_stack;
use crate::stmt::Stmt;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Deepest chain of nested calls before `Stack overflow.` is raised.
pub const MAX_CALL_DEPTH: usize = 2048;

/// How a statement finished.
#[derive(Debug)]
enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    next_expr_id: usize,
    call_depth: usize,
    out: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates an interpreter that prints to stdout, with natives such as
    /// `clock` already defined.
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }

    /// Creates an interpreter whose `print` output goes to `out`.
    pub fn with_output<W: Write + 'static>(out: W) -> Self {
        info!("Initializing Interpreter");

        let globals = Environment::new().into_shared();

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction {
                name: "clock",
                arity: 0,
                func: |_args: &[Value]| {
                    let micros: i64 = chrono::Utc::now().timestamp_micros();
                    Ok(Value::Number(micros as f64 / 1_000_000.0))
                },
            },
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            next_expr_id: 0,
            call_depth: 0,
            out: Box::new(out),
        }
    }

    /// Records that the reference `id` lives `depth` frames out from the
    /// frame active when it is evaluated.  Called by the resolver.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// Hop count recorded for `id`; `None` means global.
    pub fn resolved_depth(&self, id: ExprId) -> Option<usize> {
        self.locals.get(&id).copied()
    }

    /// First expression id not yet used by a program run in this session.
    pub fn next_expr_id(&self) -> usize {
        self.next_expr_id
    }

    pub fn set_next_expr_id(&mut self, next: usize) {
        self.next_expr_id = next;
    }

    /// Interprets a list of statements (a "program").  Stops at the first
    /// runtime error; the session itself stays usable.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        let result: Result<()> = statements
            .iter()
            .try_for_each(|stmt| self.execute(stmt).map(|_| ()));

        // Output printed before a runtime error still reaches the sink.
        self.out.flush()?;
        result?;

        info!("Interpretation completed successfully");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        ensure_sufficient_stack(|| self.execute_stmt(stmt))
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}'", name.lexeme);
                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let env = Environment::with_enclosing(Rc::clone(&self.environment)).into_shared();
                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);

                let function = Function::new(Rc::clone(decl), Rc::clone(&self.environment), false);
                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let superclass: Option<Rc<Class>> = match superclass {
                    Some(expr) => match self.evaluate(expr)? {
                        Value::Class(class) => Some(class),
                        _ => {
                            let token = match expr {
                                Expr::Variable { name, .. } => name,
                                _ => name,
                            };
                            return Err(SalmonError::runtime(token, "Superclass must be a class."));
                        }
                    },
                    None => None,
                };

                self.environment.borrow_mut().define(&name.lexeme, Value::Nil);

                // Methods of a subclass close over a frame holding `super`.
                let enclosing = superclass.as_ref().map(|superclass| {
                    let mut env = Environment::with_enclosing(Rc::clone(&self.environment));
                    env.define("super", Value::Class(Rc::clone(superclass)));
                    std::mem::replace(&mut self.environment, env.into_shared())
                });

                let methods: HashMap<String, Rc<Function>> = methods
                    .iter()
                    .map(|decl| {
                        let function = Function::new(
                            Rc::clone(decl),
                            Rc::clone(&self.environment),
                            decl.name.lexeme == "init",
                        );
                        (decl.name.lexeme.clone(), Rc::new(function))
                    })
                    .collect();

                if let Some(previous) = enclosing {
                    self.environment = previous;
                }

                let class = Class::new(name.lexeme.clone(), superclass, methods);
                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, Value::Class(Rc::new(class)));

                info!("Class '{}' defined", name.lexeme);
                Ok(Flow::Normal)
            }
        }
    }

    /// Runs `statements` with `env` as the current frame, restoring the
    /// previous frame afterwards on every path.
    fn execute_block(&mut self, statements: &[Stmt], env: Rc<RefCell<Environment>>) -> Result<Flow> {
        let previous = std::mem::replace(&mut self.environment, env);

        let mut result = Ok(Flow::Normal);
        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;
        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        ensure_sufficient_stack(|| self.evaluate_expr(expr))
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;

                let short_circuit = if operator.token_type == TokenType::OR {
                    left_val.is_truthy()
                } else {
                    !left_val.is_truthy()
                };

                if short_circuit {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(&self.environment, distance, name, value.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee)?;

                let mut arg_values: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    arg_values.push(self.evaluate(arg)?);
                }

                self.invoke_callable(callee_val, paren, arg_values)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Instance::get(&instance, name),
                _ => Err(SalmonError::runtime(name, "Only instances have properties.")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(SalmonError::runtime(name, "Only instances have fields."));
                };

                let value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());
                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value> {
        let right_val = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right_val {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(SalmonError::runtime(operator, "Operand must be a number.")),
            },
            TokenType::BANG => Ok(Value::Bool(!right_val.is_truthy())),
            _ => Err(SalmonError::runtime(operator, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err(SalmonError::runtime(
                    operator,
                    "Operands must be two numbers or two strings.",
                )),
            },
            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),
            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),
            _ => {
                let (a, b) = number_operands(operator, &left_val, &right_val)?;

                match operator.token_type {
                    TokenType::MINUS => Ok(Value::Number(a - b)),
                    TokenType::STAR => Ok(Value::Number(a * b)),
                    TokenType::SLASH => Ok(Value::Number(a / b)),
                    TokenType::GREATER => Ok(Value::Bool(a > b)),
                    TokenType::GREATER_EQUAL => Ok(Value::Bool(a >= b)),
                    TokenType::LESS => Ok(Value::Bool(a < b)),
                    TokenType::LESS_EQUAL => Ok(Value::Bool(a <= b)),
                    _ => Err(SalmonError::runtime(operator, "Invalid binary operator.")),
                }
            }
        }
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let distance: usize = self.locals.get(&id).copied().ok_or_else(|| {
            SalmonError::runtime(keyword, "Undefined variable 'super'.")
        })?;

        let superclass = match Environment::get_at(&self.environment, distance, keyword)? {
            Value::Class(class) => class,
            _ => return Err(SalmonError::runtime(keyword, "Superclass must be a class.")),
        };

        // `this` always sits in the frame just inside the one holding `super`.
        let this_distance: usize = distance
            .checked_sub(1)
            .ok_or_else(|| SalmonError::runtime(keyword, "Undefined variable 'this'."))?;
        let this_token = Token::synthetic(TokenType::THIS, "this");
        let instance = match Environment::get_at(&self.environment, this_distance, &this_token)? {
            Value::Instance(instance) => instance,
            _ => return Err(SalmonError::runtime(keyword, "Undefined variable 'this'.")),
        };

        let Some(function) = superclass.find_method(&method.lexeme) else {
            return Err(SalmonError::runtime(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            ));
        };

        Ok(Value::Function(Rc::new(function.bind(instance))))
    }

    /// Reads a name at its resolved depth, or from the globals if unresolved.
    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    /// Invokes a callable (native function, user function or class).
    fn invoke_callable(&mut self, callee: Value, paren: &Token, args: Vec<Value>) -> Result<Value> {
        match callee {
            Value::NativeFunction { name, arity, func } => {
                check_arity(paren, arity, args.len())?;

                debug!("Calling native function '{}'", name);
                func(&args).map_err(|msg| SalmonError::runtime(paren, msg))
            }

            Value::Function(function) => {
                check_arity(paren, function.arity(), args.len())?;
                self.call_function(&function, args, paren)
            }

            Value::Class(class) => {
                check_arity(paren, class.arity(), args.len())?;

                let instance = Rc::new(RefCell::new(Instance::new(Rc::clone(&class))));

                if let Some(initializer) = class.find_method("init") {
                    let bound = initializer.bind(Rc::clone(&instance));
                    self.call_function(&bound, args, paren)?;
                }

                Ok(Value::Instance(instance))
            }

            _ => Err(SalmonError::runtime(
                paren,
                "Can only call functions and classes.",
            )),
        }
    }

    /// Runs a user function body in a fresh frame parented at its closure.
    fn call_function(&mut self, function: &Function, args: Vec<Value>, paren: &Token) -> Result<Value> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(SalmonError::runtime(paren, "Stack overflow."));
        }

        debug!("Calling user-defined function '{}'", function.name());

        let mut env = Environment::with_enclosing(Rc::clone(function.closure()));
        for (param, arg) in function.declaration().params.iter().zip(args) {
            env.define(&param.lexeme, arg);
        }

        self.call_depth += 1;
        let flow = self.execute_block(&function.declaration().body, env.into_shared());
        self.call_depth -= 1;

        let flow = flow?;

        if function.is_initializer() {
            let this_token = Token::synthetic(TokenType::THIS, "this");
            return Environment::get_at(function.closure(), 0, &this_token);
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

fn check_arity(paren: &Token, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(SalmonError::runtime(
            paren,
            format!("Expected {} arguments but got {}.", expected, got),
        ));
    }

    Ok(())
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(SalmonError::runtime(operator, "Operands must be numbers.")),
    }
}
