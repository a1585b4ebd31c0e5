//! Salmon: a small dynamically‑typed scripting language with closures and
//! single‑inheritance classes, run by a tree‑walking interpreter.
//!
//! The pipeline is scanner → parser → resolver → interpreter.  [`run`] drives
//! one source unit through all of it against a long‑lived [`Interpreter`].

pub mod ast_printer;
pub mod class;
pub mod environment;
pub mod error;
pub mod expr;
pub mod function;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
mod stack;
pub mod stmt;
pub mod token;
pub mod value;

pub use error::{RunError, SalmonError};
pub use interpreter::Interpreter;

use log::info;

use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;

/// Scans, parses, resolves and executes `source` in `interpreter`.
///
/// Scan and parse errors are reported together; resolution only runs on a
/// clean parse, and execution only on a clean resolution.  Globals, functions
/// and classes defined by a successful (or partially executed) run remain
/// visible to later runs on the same interpreter.
pub fn run(source: &[u8], interpreter: &mut Interpreter) -> Result<(), RunError> {
    let (tokens, mut errors) = Scanner::new(source).scan_all();

    let mut parser = Parser::new(&tokens).with_first_id(interpreter.next_expr_id());
    let parsed = parser.parse();
    interpreter.set_next_expr_id(parser.next_id());

    let statements = match parsed {
        Ok(statements) if errors.is_empty() => statements,
        Ok(_) => return Err(RunError::Static(errors)),
        Err(parse_errors) => {
            errors.extend(parse_errors);
            return Err(RunError::Static(errors));
        }
    };

    Resolver::new(interpreter)
        .resolve(&statements)
        .map_err(RunError::Static)?;

    info!("Executing {} top-level statement(s)", statements.len());

    interpreter
        .interpret(&statements)
        .map_err(RunError::Runtime)
}
