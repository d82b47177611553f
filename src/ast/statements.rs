use std::fmt;

use crate::ast::Value;

/// One pipeline stage: a command name and its arguments.
///
/// # Example
/// ```text
/// stack "h" left right
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub args: Vec<Value>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Command {
            name: name.into(),
            args,
        }
    }
}

/// Ordered sequence of commands joined by `|>`.
///
/// Never empty when produced by the parser.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    pub commands: Vec<Command>,
}

impl Pipeline {
    pub fn new(commands: Vec<Command>) -> Self {
        Pipeline { commands }
    }

    pub fn first(&self) -> Option<&Command> {
        self.commands.first()
    }
}

/// Pipeline expression with its (possibly empty) list of inputs.
///
/// # Examples
/// ```text
/// open "a.mp4" |> brightness 1.2
/// clip |> export "out.mp4"
/// [stream, *] |> crossfade 0.5
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub input: Vec<Value>,
    pub pipeline: Pipeline,
}

/// Assignment or declaration.
///
/// `is_declaration` is set for `:=`, which binds (and may shadow); `=`
/// requires the destination to exist, which the evaluator checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub dest: Vec<String>,
    pub value: Value,
    pub is_declaration: bool,
}

/// A top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `names := value` or `names = value`
    Assignment(Assignment),

    /// Bare pipeline; its result becomes the global `stream`
    Expr(Expr),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in &self.args {
            match arg {
                // keeps `cut 1 (-2)` from reading back as `cut (1 - 2)`
                Value::Number(n) if n.is_sign_negative() => write!(f, " ({n})")?,
                _ => write!(f, " {arg}")?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cmd) in self.commands.iter().enumerate() {
            if i > 0 {
                f.write_str(" |> ")?;
            }
            write!(f, "{cmd}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.input.as_slice() {
            [] => {}
            [single] if !matches!(single, Value::List(_)) => write!(f, "{single} |> ")?,
            items => write!(f, "{} |> ", Value::List(items.to_vec()))?,
        }
        write!(f, "{}", self.pipeline)
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.is_declaration { ":=" } else { "=" };
        write!(f, "{} {op} {}", self.dest.join(", "), self.value)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Assignment(assign) => write!(f, "{assign}"),
            Statement::Expr(expr) => write!(f, "{expr}"),
        }
    }
}
