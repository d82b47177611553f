//! Tree-walking evaluator.
//!
//! Statements are evaluated strictly in order against a mutable
//! [`Context`]; the first error aborts the run. Pipelines thread stream
//! handles through the command handlers in [`commands`], which delegate the
//! actual media work to a [`MediaBackend`].

pub mod commands;

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::{
    arith::{self, ArithError},
    ast::{Assignment, Builtin, Expr, Pipeline, Statement, Value, ValueKind},
    backend::{BackendError, Handle, MediaBackend, OpenError},
    config::Config,
    media::ExtensionFilter,
    parser::{ParseError, parse},
    store::{StreamRead, StreamStore},
    value::{ValueBox, ValueType},
};

use self::commands::StageInput;

/// Errors that abort evaluation.
#[derive(Error, Debug)]
pub enum EvalError {
    /// A scan or syntax error delivered by the parser
    #[error(transparent)]
    Syntax(#[from] ParseError),

    /// Reference to a name that is neither a variable nor a stream
    #[error("variable `{0}` not found")]
    UnknownVariable(String),

    /// A name bound to a value of the wrong type
    #[error("`{name}` is a {found}, expected a {expected}")]
    TypeMismatch {
        name: String,
        expected: ValueType,
        found: ValueType,
    },

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Argument of the wrong kind; `position` is 1-based
    #[error("{command}: argument {position} must be a {expected}, got {found}")]
    WrongKind {
        command: String,
        position: usize,
        expected: ValueType,
        found: String,
    },

    #[error("{command} takes {expected}, got {found}")]
    WrongArgCount {
        command: String,
        expected: String,
        found: usize,
    },

    #[error("{command}: {message}")]
    InvalidArgument { command: String, message: String },

    #[error("cannot assign stream to multiple variables ({})", .0.join(", "))]
    MultipleDestinations(Vec<String>),

    #[error("multiple inputs not supported ({0} given)")]
    MultipleInputs(usize),

    #[error("a {0} cannot be used as pipeline input")]
    InvalidInput(ValueKind),

    #[error("{0} requires an input stream")]
    MissingInput(String),

    #[error("`*` can only be used on the right-hand side of an assignment")]
    SelfOutsideAssignment,

    /// `=` on a name that was never declared with `:=`
    #[error("cannot assign to undeclared `{0}`, declare it with `:=` first")]
    Undeclared(String),

    #[error("`open` must be the first command of a pipeline and takes no input")]
    MisplacedOpen,

    #[error(transparent)]
    Arith(#[from] ArithError),

    /// Failure reported by the backend, tagged with the command that caused it
    #[error("{command}: {source}")]
    Backend {
        command: String,
        #[source]
        source: BackendError,
    },

    #[error("{command}: {source}")]
    Open {
        command: String,
        #[source]
        source: OpenError,
    },
}

/// Mutable evaluation state: variables, stream bindings and run flags.
#[derive(Debug)]
pub struct Context {
    /// Non-stream bindings
    pub variables: HashMap<String, ValueBox>,
    pub streams: StreamStore,
    /// Logs every dispatched command at `info` level
    pub debug: bool,
    /// Exports also feed the preview sink
    pub preview: bool,
    pub config: Config,
    media_filter: ExtensionFilter,
    /// Destination of the assignment being evaluated, what `*` refers to
    target: Option<String>,
}

impl Context {
    pub fn new(config: Config) -> Result<Self, regex::Error> {
        let media_filter = ExtensionFilter::new(&config.media_extensions)?;
        Ok(Context {
            variables: HashMap::new(),
            streams: StreamStore::new(),
            debug: false,
            preview: false,
            config,
            media_filter,
            target: None,
        })
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    pub fn media_filter(&self) -> &ExtensionFilter {
        &self.media_filter
    }

    /// Whether `name` is bound at all, as a variable or a stream.
    pub fn is_bound(&self, name: &str) -> bool {
        self.variables.contains_key(name) || self.streams.contains(name)
    }

    /// Name `*` currently stands for.
    pub fn self_target(&self) -> Result<&str, EvalError> {
        self.target.as_deref().ok_or(EvalError::SelfOutsideAssignment)
    }

    pub fn variable(&self, name: &str) -> Result<&ValueBox, EvalError> {
        self.variables
            .get(name)
            .ok_or_else(|| EvalError::UnknownVariable(name.to_string()))
    }

    /// Looks up a variable that must hold a number.
    pub fn number(&self, name: &str) -> Result<f64, EvalError> {
        let value = self.variable(name)?;
        value.as_number().ok_or_else(|| EvalError::TypeMismatch {
            name: name.to_string(),
            expected: ValueType::Number,
            found: value.value_type(),
        })
    }

    /// Reads a stream binding through the store, drawing a new branch when
    /// the binding is not trusted.
    pub fn read_stream(&mut self, name: &str) -> Result<StreamRead, EvalError> {
        if let Some(read) = self.streams.get(name) {
            return Ok(read);
        }
        match self.variables.get(name) {
            Some(value) => Err(EvalError::TypeMismatch {
                name: name.to_string(),
                expected: ValueType::Stream,
                found: value.value_type(),
            }),
            None => Err(EvalError::UnknownVariable(name.to_string())),
        }
    }

    /// Reads the stream `value` names: an identifier or `*`.
    pub fn read_stream_ref(&mut self, value: &Value) -> Option<Result<StreamRead, EvalError>> {
        match value {
            Value::Identifier(name) => Some(self.read_stream(name)),
            Value::SelfStar => Some(
                self.self_target()
                    .map(str::to_string)
                    .and_then(|target| self.read_stream(&target)),
            ),
            _ => None,
        }
    }

    fn bind_stream(
        &mut self,
        backend: &mut dyn MediaBackend,
        name: &str,
        read: StreamRead,
    ) -> Result<(), EvalError> {
        self.streams
            .set(backend, name, read.handles, read.eligible)
            .map_err(|source| EvalError::Backend {
                command: "split".to_string(),
                source,
            })?;
        self.variables.remove(name);
        Ok(())
    }

    fn bind_value(&mut self, name: &str, value: ValueBox) {
        debug!(name, %value, "bind value");
        self.streams.remove(name);
        self.variables.insert(name.to_string(), value);
    }
}

/// Evaluates `statements` in order, stopping at the first error.
///
/// # Examples
///
/// ```
/// use vidlang::{Config, Context, parse, run};
/// use vidlang::backend::graph::{DryRunner, FilterGraph};
///
/// let config = Config::default();
/// let mut ctx = Context::new(config.clone()).unwrap();
/// let mut backend = FilterGraph::new(&config, DryRunner::default());
///
/// run(parse("level := 0.5 * 3"), &mut ctx, &mut backend).unwrap();
/// assert_eq!(ctx.number("level").unwrap(), 1.5);
/// ```
pub fn run<I, B>(statements: I, ctx: &mut Context, backend: &mut B) -> Result<(), EvalError>
where
    I: IntoIterator<Item = Result<Statement, ParseError>>,
    B: MediaBackend,
{
    for statement in statements {
        let statement = statement?;
        execute(ctx, backend, &statement)?;
    }
    Ok(())
}

/// Evaluates one statement.
pub fn execute(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    statement: &Statement,
) -> Result<(), EvalError> {
    debug!(%statement, "evaluating statement");
    match statement {
        Statement::Assignment(assign) => evaluate_assignment(ctx, backend, assign),
        Statement::Expr(expr) => {
            let result = evaluate_expression(ctx, backend, expr)?;
            ctx.bind_stream(backend, crate::ast::grammar::GLOBAL_STREAM, result)
        }
    }
}

fn evaluate_assignment(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    assign: &Assignment,
) -> Result<(), EvalError> {
    let Some(first) = assign.dest.first() else {
        return Err(EvalError::InvalidArgument {
            command: "assignment".to_string(),
            message: "no destination".to_string(),
        });
    };

    if !assign.is_declaration
        && let Some(missing) = assign.dest.iter().find(|name| !ctx.is_bound(name))
    {
        return Err(EvalError::Undeclared(missing.clone()));
    }

    let stream_valued = match &assign.value {
        Value::Expr(_) => true,
        Value::Identifier(name) => ctx.streams.contains(name),
        Value::SelfStar => ctx.streams.contains(first),
        _ => false,
    };
    if stream_valued && assign.dest.len() > 1 {
        return Err(EvalError::MultipleDestinations(assign.dest.clone()));
    }

    let previous = ctx.target.replace(first.clone());
    let result = if stream_valued {
        let read = match &assign.value {
            Value::Expr(expr) => evaluate_expression(ctx, backend, expr),
            other => ctx
                .read_stream_ref(other)
                .unwrap_or(Err(EvalError::InvalidInput(other.kind()))),
        };
        read.and_then(|read| ctx.bind_stream(backend, first, read))
    } else {
        resolve_value(ctx, backend, &assign.value).map(|value| {
            for name in &assign.dest {
                ctx.bind_value(name, value.clone());
            }
        })
    };
    ctx.target = previous;
    result
}

/// Evaluates a pipeline expression to the handles it produces.
pub fn evaluate_expression(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    expr: &Expr,
) -> Result<StreamRead, EvalError> {
    let input = match expr.input.as_slice() {
        [] => None,
        [value] => Some(
            ctx.read_stream_ref(value)
                .unwrap_or(Err(EvalError::InvalidInput(value.kind())))?,
        ),
        inputs => return Err(EvalError::MultipleInputs(inputs.len())),
    };
    evaluate_pipeline(ctx, backend, &expr.pipeline, input)
}

/// Runs `pipeline` over every input stream independently.
///
/// Without an input the pipeline runs once with no stream, unless it starts
/// with `open`, whose results become the inputs. The result is eligible for
/// stream copy only when every branch is.
pub fn evaluate_pipeline(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    pipeline: &Pipeline,
    input: Option<StreamRead>,
) -> Result<StreamRead, EvalError> {
    let open = Builtin::Open.name();
    let mut stages = pipeline.commands.as_slice();

    let (mut threads, eligible): (Vec<Option<Handle>>, bool) = match input {
        Some(read) => (read.handles.into_iter().map(Some).collect(), read.eligible),
        None => (vec![None], true),
    };

    if let Some((first, rest)) = stages.split_first()
        && first.name == open
    {
        if threads.iter().any(Option::is_some) {
            return Err(EvalError::MisplacedOpen);
        }
        log_command(ctx, first);
        threads = commands::open(ctx, backend, &first.args)?
            .into_iter()
            .map(Some)
            .collect();
        stages = rest;
    }
    if stages.iter().any(|cmd| cmd.name == open) {
        return Err(EvalError::MisplacedOpen);
    }

    let branches = threads.len();
    let mut handles = Vec::with_capacity(branches);
    let mut all_eligible = eligible;

    for (branch, stream) in threads.into_iter().enumerate() {
        let mut stage = StageInput {
            stream,
            eligible,
            branch,
            branches,
        };
        for cmd in stages {
            let handler = commands::lookup(&cmd.name)
                .ok_or_else(|| EvalError::UnknownCommand(cmd.name.clone()))?;
            log_command(ctx, cmd);
            let out = handler(ctx, backend, &stage, &cmd.args)?;
            stage.stream = Some(out.handle);
            stage.eligible &= out.eligible;
        }
        all_eligible &= stage.eligible;
        handles.extend(stage.stream);
    }

    Ok(StreamRead {
        handles,
        eligible: all_eligible,
    })
}

fn log_command(ctx: &Context, cmd: &crate::ast::Command) {
    if ctx.debug {
        info!(command = %cmd, "dispatch");
    } else {
        debug!(command = %cmd, "dispatch");
    }
}

/// Resolves an AST value to a runtime value.
pub fn resolve_value(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    value: &Value,
) -> Result<ValueBox, EvalError> {
    match value {
        Value::Bool(b) => Ok(ValueBox::Bool(*b)),
        Value::Number(n) => Ok(ValueBox::Number(*n)),
        Value::String(s) => Ok(ValueBox::String(s.clone())),
        Value::Identifier(name) => resolve_name(ctx, name),
        Value::SelfStar => {
            let target = ctx.self_target()?.to_string();
            resolve_name(ctx, &target)
        }
        Value::List(items) => items
            .iter()
            .map(|item| resolve_value(ctx, backend, item))
            .collect::<Result<Vec<_>, _>>()
            .map(ValueBox::List),
        Value::SubExpr(sub) => Ok(ValueBox::SubExpr(sub.clone())),
        Value::Math(math) => {
            let ctx = &*ctx;
            arith::evaluate_math(math, &mut |name: &str| ctx.number(name)).map(ValueBox::Number)
        }
        Value::Expr(expr) => {
            evaluate_expression(ctx, backend, expr).map(|read| ValueBox::Stream(read.handles))
        }
    }
}

fn resolve_name(ctx: &mut Context, name: &str) -> Result<ValueBox, EvalError> {
    if let Some(value) = ctx.variables.get(name) {
        return Ok(value.clone());
    }
    ctx.read_stream(name).map(|read| ValueBox::Stream(read.handles))
}

/// Owns a [`Context`] and a backend and evaluates whole scripts.
pub struct Interpreter<B> {
    ctx: Context,
    backend: B,
}

impl<B: MediaBackend> Interpreter<B> {
    pub fn new(ctx: Context, backend: B) -> Self {
        Interpreter { ctx, backend }
    }

    /// Parses and evaluates `source`, stopping at the first error.
    pub fn run(&mut self, source: &str) -> Result<(), EvalError> {
        run(parse(source), &mut self.ctx, &mut self.backend)
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_parts(self) -> (Context, B) {
        (self.ctx, self.backend)
    }
}
