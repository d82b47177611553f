use std::fmt;

use crate::{ast::SubExpr, backend::Handle};

/// A runtime value, as bound to a variable or passed to a command.
///
/// # Examples
///
/// ```
/// use vidlang::value::{ValueBox, ValueType};
///
/// let level = ValueBox::Number(1.2);
/// assert_eq!(level.value_type(), ValueType::Number);
/// assert_eq!(level.as_number(), Some(1.2));
/// assert_eq!(level.as_str(), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ValueBox {
    Bool(bool),

    Number(f64),

    String(String),

    /// One or more stream handles, as read from the stream store
    Stream(Vec<Handle>),

    List(Vec<ValueBox>),

    SubExpr(SubExpr),
}

/// Runtime type tag of a [`ValueBox`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Number,
    String,
    Stream,
    List,
    SubExpr,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Bool => "bool",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Stream => "stream",
            ValueType::List => "list",
            ValueType::SubExpr => "sub-expression",
        };
        f.write_str(name)
    }
}

impl ValueBox {
    pub fn value_type(&self) -> ValueType {
        match self {
            ValueBox::Bool(_) => ValueType::Bool,
            ValueBox::Number(_) => ValueType::Number,
            ValueBox::String(_) => ValueType::String,
            ValueBox::Stream(_) => ValueType::Stream,
            ValueBox::List(_) => ValueType::List,
            ValueBox::SubExpr(_) => ValueType::SubExpr,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ValueBox::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ValueBox::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ValueBox::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ValueBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueBox::Bool(b) => write!(f, "{b}"),
            ValueBox::Number(n) => write!(f, "{n}"),
            ValueBox::String(s) => write!(f, "{s:?}"),
            ValueBox::Stream(handles) => {
                let handles: Vec<String> = handles.iter().map(Handle::to_string).collect();
                write!(f, "<stream {}>", handles.join(", "))
            }
            ValueBox::List(items) => {
                let items: Vec<String> = items.iter().map(ValueBox::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
            ValueBox::SubExpr(sub) => write!(f, "{sub}"),
        }
    }
}
