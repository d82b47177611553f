use std::fmt;

use crate::ast::TokenKind;

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    /// Addition (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,
    /// Multiplication (`*`)
    Multiply,
    /// Division (`/`)
    Divide,
}

impl MathOp {
    /// Maps an operator token to its operator. A self-star in operator
    /// position means multiplication.
    pub fn from_token(kind: TokenKind) -> Option<MathOp> {
        match kind {
            TokenKind::Plus => Some(MathOp::Add),
            TokenKind::Minus => Some(MathOp::Subtract),
            TokenKind::Star | TokenKind::SelfStar => Some(MathOp::Multiply),
            TokenKind::Slash => Some(MathOp::Divide),
            _ => None,
        }
    }

    /// Binding power for precedence climbing; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            MathOp::Add | MathOp::Subtract => 1,
            MathOp::Multiply | MathOp::Divide => 2,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            MathOp::Add => "+",
            MathOp::Subtract => "-",
            MathOp::Multiply => "*",
            MathOp::Divide => "/",
        }
    }
}

impl fmt::Display for MathOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
