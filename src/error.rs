//! Centralised error hierarchy for the **Salmon interpreter**.
//!
//! All pipeline stages (scanner, parser, resolver, runtime) convert their
//! failure modes into one of the variants defined here.  Each variant's
//! `Display` is the exact diagnostic line the driver writes to stderr.
//!
//! The module **does not** print diagnostics itself

use std::io;
use thiserror::Error;

use log::debug;

use crate::token::Token;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SalmonError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error, located at the offending token.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        line: usize,
        location: String,
    },

    /// Static‑analysis failure found by the resolver.
    #[error("[line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        line: usize,
        location: String,
    },

    /// Runtime evaluation error.  Unwinds to the top‑level statement loop.
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Raised when `print`
    /// cannot write to its sink.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// `" at 'lexeme'"`, or `" at end"` for the end marker.
fn location(token: &Token) -> String {
    if token.is_eof() {
        " at end".to_owned()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

impl SalmonError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Lex error: line={}, msg={}", line, message);

        SalmonError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Parse error: line={}, msg={}", token.line, message);

        SalmonError::Parse {
            message,
            line: token.line,
            location: location(token),
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Resolve error: line={}, msg={}", token.line, message);

        SalmonError::Resolve {
            message,
            line: token.line,
            location: location(token),
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Runtime error: line={}, msg={}", token.line, message);

        SalmonError::Runtime {
            message,
            line: token.line,
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, SalmonError>;

/// Why a call to [`crate::run`] did not complete normally.
#[derive(Debug)]
pub enum RunError {
    /// Every scan, parse or resolve error found; nothing was executed.
    Static(Vec<SalmonError>),

    /// The runtime error that stopped the program.
    Runtime(SalmonError),
}

impl RunError {
    /// Process exit code the driver reports for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Static(_) => 65,
            RunError::Runtime(_) => 70,
        }
    }

    /// The diagnostics in reporting order.
    pub fn errors(&self) -> &[SalmonError] {
        match self {
            RunError::Static(errors) => errors,
            RunError::Runtime(error) => std::slice::from_ref(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    #[test]
    fn diagnostics_render_in_driver_format() {
        let name = Token::new(TokenType::IDENTIFIER, "foo", 7);
        let eof = Token::new(TokenType::EOF, "", 9);

        assert_eq!(
            SalmonError::lex(2, "Unexpected character.").to_string(),
            "[line 2] Error: Unexpected character."
        );
        assert_eq!(
            SalmonError::parse(&name, "Expect ';' after value.").to_string(),
            "[line 7] Error at 'foo': Expect ';' after value."
        );
        assert_eq!(
            SalmonError::resolve(&eof, "Expect expression.").to_string(),
            "[line 9] Error at end: Expect expression."
        );
        assert_eq!(
            SalmonError::runtime(&name, "Undefined variable 'foo'.").to_string(),
            "Undefined variable 'foo'.\n[line 7]"
        );
    }

    #[test]
    fn exit_codes_follow_phase() {
        let static_err = RunError::Static(vec![SalmonError::lex(1, "Unterminated string.")]);
        assert_eq!(static_err.exit_code(), 65);
        assert_eq!(static_err.errors().len(), 1);

        let name = Token::new(TokenType::IDENTIFIER, "x", 1);
        let runtime = RunError::Runtime(SalmonError::runtime(&name, "boom"));
        assert_eq!(runtime.exit_code(), 70);
        assert_eq!(runtime.errors()[0].to_string(), "boom\n[line 1]");
    }
}
