//! Static resolver pass for the **Salmon** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (a stack of `HashMap<String, VarState>` tracking declared/defined).
//! 2. Report static errors (redeclaration, read in own initializer, invalid `return`,
//!    `this`/`super` misuse, self‑inheritance).  Errors are collected; the walk goes on.
//! 3. Tell the interpreter, for *each* local variable occurrence, how many scopes out its
//!    binding lives.  Names found in no tracked scope are globals and are left unrecorded,
//!    so the interpreter looks them up dynamically in the global frame.

use crate::error::SalmonError;
use crate::expr::{Expr, ExprId};
use crate::interpreter::Interpreter;
use crate::stack::ensure_sufficient_stack;
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::Token;
use log::{debug, info};
use std::collections::HashMap;
use std::rc::Rc;

/// Are we inside a function, and which kind?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

/// Are we inside a class body?  Used to validate `this` and `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// A local's state inside its scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum VarState {
    /// Name reserved, initializer not finished.
    Declared,
    /// Usable.
    Defined,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances by calling back into the interpreter once the pass succeeds.
pub struct Resolver<'interp> {
    interpreter: &'interp mut Interpreter,
    scopes: Vec<HashMap<String, VarState>>,
    /// Hop counts found so far; handed to the interpreter only if the whole
    /// pass is error‑free.
    locals: HashMap<ExprId, usize>,
    current_function: FunctionType,
    current_class: ClassType,
    errors: Vec<SalmonError>,
}

impl<'interp> Resolver<'interp> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'interp mut Interpreter) -> Self {
        info!("Resolver instantiated");

        Resolver {
            interpreter,
            scopes: Vec::new(),
            locals: HashMap::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            errors: Vec::new(),
        }
    }

    /// Walk all top‑level statements, returning every static error found.
    pub fn resolve(mut self, statements: &[Stmt]) -> Result<(), Vec<SalmonError>> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        self.resolve_stmts(statements);

        if self.errors.is_empty() {
            for (id, depth) in self.locals {
                self.interpreter.resolve(id, depth);
            }
            Ok(())
        } else {
            info!("Resolve pass found {} error(s)", self.errors.len());
            Err(self.errors)
        }
    }

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        ensure_sufficient_stack(|| self.visit_stmt(stmt))
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements);
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
                // name is visible *inside* its own body
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionType::Function);
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

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(expr);
                }
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass) = superclass {
            if let Expr::Variable { name: super_name, .. } = superclass {
                if super_name.lexeme == name.lexeme {
                    self.error(super_name, "A class can't inherit from itself.");
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);

            // Scope holding `super`, shared by every method of this class.
            self.begin_scope();
            self.mark_defined("super");
        }

        // Scope holding `this`, resolved like any captured local.
        self.begin_scope();
        self.mark_defined("this");

        for method in methods {
            let kind = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, kind);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        ensure_sufficient_stack(|| self.visit_expr(expr))
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                // Cannot read in own initializer
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&VarState::Declared) {
                        self.error(name, "Can't read local variable in its own initializer.");
                    }
                }

                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                // First resolve RHS, then bind LHS
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Can't use 'super' outside of a class.");
                        return;
                    }
                    ClassType::Class => {
                        self.error(keyword, "Can't use 'super' in a class with no superclass.");
                        return;
                    }
                    ClassType::Subclass => {}
                }

                self.resolve_local(*id, keyword);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&decl.body);
        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return; // globals are not tracked
        };

        if scope.contains_key(&name.lexeme) {
            self.error(name, "Already a variable with this name in this scope.");
            return;
        }

        scope.insert(name.lexeme.clone(), VarState::Declared);
    }

    fn define(&mut self, name: &Token) {
        self.mark_defined(&name.lexeme);
    }

    fn mark_defined(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_owned(), VarState::Defined);
        }
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.errors.push(SalmonError::resolve(token, message));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at depth `d`, or leave it for the
    /// global frame if no scope declares it.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn resolve(source: &str) -> (Interpreter, std::result::Result<(), Vec<SalmonError>>) {
        let (tokens, _) = Scanner::new(source.as_bytes()).scan_all();
        let stmts = Parser::new(&tokens).parse().expect("valid program");
        let mut interpreter = Interpreter::with_output(std::io::sink());
        let result = Resolver::new(&mut interpreter).resolve(&stmts);
        (interpreter, result)
    }

    fn messages(source: &str) -> Vec<String> {
        let (_, result) = resolve(source);
        result
            .expect_err("expected resolve errors")
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn hop_counts_match_nesting() {
        // ids: reads of a(0), b(1), g(2); a lives in the outermost block
        let (interpreter, result) =
            resolve("{ var a = 1; { var b = 2; { print a; print b; print g; } } }");
        assert!(result.is_ok());
        assert_eq!(interpreter.resolved_depth(ExprId(0)), Some(2));
        assert_eq!(interpreter.resolved_depth(ExprId(1)), Some(1));
        assert_eq!(interpreter.resolved_depth(ExprId(2)), None);
    }

    #[test]
    fn closure_reference_counts_function_scope() {
        // `count` inside `inc` is one hop out, in the body scope of `outer`.
        let (interpreter, result) = resolve(
            "fun outer() { var count = 0; fun inc() { count = count + 1; } }",
        );
        assert!(result.is_ok());
        // ids: assign count(0), read count(1)
        assert_eq!(interpreter.resolved_depth(ExprId(0)), Some(1));
        assert_eq!(interpreter.resolved_depth(ExprId(1)), Some(1));
    }

    #[test]
    fn self_referential_initializer_is_rejected_locally() {
        assert_eq!(
            messages("{ var a = a; }"),
            vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."]
        );
    }

    #[test]
    fn self_referential_initializer_is_fine_globally() {
        let (_, result) = resolve("var a = a;");
        assert!(result.is_ok());
    }

    #[test]
    fn duplicate_local_is_rejected() {
        assert_eq!(
            messages("fun f() { var a; var a; }"),
            vec!["[line 1] Error at 'a': Already a variable with this name in this scope."]
        );
    }

    #[test]
    fn collects_every_static_error() {
        let errors = messages("return 1;\nprint this;\nclass A { init() { return 2; } }");
        assert_eq!(
            errors,
            vec![
                "[line 1] Error at 'return': Can't return from top-level code.",
                "[line 2] Error at 'this': Can't use 'this' outside of a class.",
                "[line 3] Error at 'return': Can't return a value from an initializer.",
            ]
        );
    }

    #[test]
    fn super_rules() {
        assert_eq!(
            messages("class A < A {}"),
            vec!["[line 1] Error at 'A': A class can't inherit from itself."]
        );
        assert_eq!(
            messages("class A { m() { super.m(); } }"),
            vec!["[line 1] Error at 'super': Can't use 'super' in a class with no superclass."]
        );
        assert_eq!(
            messages("super.m();"),
            vec!["[line 1] Error at 'super': Can't use 'super' outside of a class."]
        );
    }

    #[test]
    fn failed_pass_records_no_hop_counts() {
        // id 0 is the read of `a`, which would resolve at depth 0.
        let (interpreter, result) = resolve("{ var a = 1; print a; }\nreturn 1;");
        assert!(result.is_err());
        assert_eq!(interpreter.resolved_depth(ExprId(0)), None);
    }

    #[test]
    fn deeply_nested_blocks_resolve() {
        let depth = 3000;
        let source = format!("{}var a = 1; print a;{}", "{ ".repeat(depth), " }".repeat(depth));
        let (interpreter, result) = resolve(&source);
        assert!(result.is_ok());
        assert_eq!(interpreter.resolved_depth(ExprId(0)), Some(0));
    }

    #[test]
    fn bare_return_in_initializer_is_allowed() {
        let (_, result) = resolve("class A { init() { return; } }");
        assert!(result.is_ok());
    }
}
