use std::fmt;

use crate::ast::{Expr, MathOp};

/// A value node: anything that can appear as a command argument, an
/// expression input or the right-hand side of an assignment.
///
/// The `Display` form is valid source that parses back to the same node.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean literal
    Bool(bool),

    /// Number literal
    ///
    /// # Example
    /// ```text
    /// 1.25
    /// ```
    Number(f64),

    /// String literal, quotes and escape backslashes removed
    ///
    /// # Example
    /// ```text
    /// "clips/intro.mp4"
    /// ```
    String(String),

    /// Name of a variable or stream binding; `stream` is also an identifier
    Identifier(String),

    /// Self reference (`*`)
    SelfStar,

    /// List literal
    ///
    /// # Example
    /// ```text
    /// [intro, main, outro]
    /// ```
    List(Vec<Value>),

    /// Inline sub-expression with a parameter list
    ///
    /// # Example
    /// ```text
    /// [i, el] (el |> volume 0.5 * i + 1)
    /// ```
    SubExpr(SubExpr),

    /// Arithmetic expression
    Math(MathExpr),

    /// Pipeline expression
    Expr(Expr),
}

/// Discriminant of a [`Value`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Number,
    String,
    Identifier,
    SelfStar,
    List,
    SubExpr,
    Math,
    Expr,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Identifier => "identifier",
            ValueKind::SelfStar => "self reference",
            ValueKind::List => "list",
            ValueKind::SubExpr => "sub-expression",
            ValueKind::Math => "math expression",
            ValueKind::Expr => "expression",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Identifier(_) => ValueKind::Identifier,
            Value::SelfStar => ValueKind::SelfStar,
            Value::List(_) => ValueKind::List,
            Value::SubExpr(_) => ValueKind::SubExpr,
            Value::Math(_) => ValueKind::Math,
            Value::Expr(_) => ValueKind::Expr,
        }
    }

    pub fn ident(name: impl Into<String>) -> Value {
        Value::Identifier(name.into())
    }

    pub fn string(text: impl Into<String>) -> Value {
        Value::String(text.into())
    }
}

/// Sub-expression: `[params] (body)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubExpr {
    pub params: Vec<String>,
    pub body: Box<Value>,
}

/// Binary arithmetic node. Unary signs are represented as `0 op operand`.
#[derive(Debug, Clone, PartialEq)]
pub struct MathExpr {
    pub left: Box<Value>,
    pub op: MathOp,
    pub right: Box<Value>,
}

impl MathExpr {
    pub fn new(left: Value, op: MathOp, right: Value) -> Self {
        MathExpr {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("\"")?;
    for ch in text.chars() {
        if ch == '"' || ch == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{ch}")?;
    }
    f.write_str("\"")
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write_string_literal(f, s),
            Value::Identifier(name) => f.write_str(name),
            Value::SelfStar => f.write_str("*"),
            Value::List(items) => write_list(f, items),
            Value::SubExpr(sub) => write!(f, "{sub}"),
            Value::Math(math) => write!(f, "{math}"),
            Value::Expr(expr) => write!(f, "{expr}"),
        }
    }
}

impl fmt::Display for SubExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ({})", self.params.join(", "), self.body)
    }
}

impl fmt::Display for MathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.left, self.op, self.right)
    }
}
