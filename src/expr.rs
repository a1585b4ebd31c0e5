
use crate::token::Token;

/// Stable identity of a name‑referencing expression.  The resolver keys its
/// hop counts by this id; the parser hands out a fresh one per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub usize);

/// A **literal constant** that appears directly in the source code.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal, stored as IEEE‑754 `f64`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    True,

    False,

    Nil,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Used to parse literal expressions
    Literal(LiteralValue),

    // Used to parse parenthesized grouped expressions
    Grouping(Box<Expr>),

    // Used to parse `!x` and `-x`
    Unary {
        operator: Token,
        right: Box<Expr>,
    },

    // Used to parse arithmetic, comparison and equality operators
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    // Used to parse short-circuiting `and` / `or`
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    // Used to parse variable references
    Variable {
        id: ExprId,
        name: Token,
    },

    // Used to parse assignment to a variable
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },

    // Used to parse function calls; `paren` is the closing ')' for error lines
    Call {
        callee: Box<Expr>,
        paren: Token,
        arguments: Vec<Expr>,
    },

    // object.name
    Get {
        object: Box<Expr>,
        name: Token,
    },

    // object.name = value
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    // `this` inside a method
    This {
        id: ExprId,
        keyword: Token,
    },

    // `super.method` inside a subclass method
    Super {
        id: ExprId,
        keyword: Token,
        method: Token,
    },
}
