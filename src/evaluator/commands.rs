//! Built-in commands.
//!
//! Each handler gets the running [`StageInput`] of its pipeline branch and
//! its raw argument nodes. It validates the arguments itself and returns the
//! handle it produced together with its own stream-copy verdict.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{
    arith,
    ast::{Builtin, Value},
    backend::{Handle, MediaBackend, Param, StackDirection},
    evaluator::{Context, EvalError},
    media,
    store::StreamRead,
    value::ValueType,
};

/// What a stage sees of its pipeline branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageInput {
    /// Output of the previous stage, or the pipeline input
    pub stream: Option<Handle>,
    /// Whether everything up to this stage allows a stream copy
    pub eligible: bool,
    /// Index of this branch when the pipeline fans out
    pub branch: usize,
    pub branches: usize,
}

/// Output of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub handle: Handle,
    /// `false` when the stage changed the media
    pub eligible: bool,
}

impl Stage {
    fn transformed(handle: Handle) -> Self {
        Stage {
            handle,
            eligible: false,
        }
    }
}

pub type Handler =
    fn(&mut Context, &mut dyn MediaBackend, &StageInput, &[Value]) -> Result<Stage, EvalError>;

/// Commands with a handler. `open` is dispatched by the pipeline itself
/// since it produces inputs rather than consuming one.
const COMMANDS: &[(Builtin, Handler)] = &[
    (Builtin::Export, export),
    (Builtin::Brightness, brightness),
    (Builtin::Contrast, contrast),
    (Builtin::Saturation, saturation),
    (Builtin::Gamma, gamma),
    (Builtin::Hue, hue),
    (Builtin::Flip, flip),
    (Builtin::Cut, cut),
    (Builtin::Speed, speed),
    (Builtin::Concat, concat),
    (Builtin::Stack, stack),
];

pub fn lookup(name: &str) -> Option<Handler> {
    COMMANDS
        .iter()
        .find(|(builtin, _)| builtin.name() == name)
        .map(|&(_, handler)| handler)
}

/// Argument access for one command.
struct Args<'a> {
    command: Builtin,
    args: &'a [Value],
}

impl<'a> Args<'a> {
    fn new(command: Builtin, args: &'a [Value]) -> Self {
        Args { command, args }
    }

    fn name(&self) -> String {
        self.command.name().to_string()
    }

    fn exactly(&self, count: usize) -> Result<(), EvalError> {
        if self.args.len() != count {
            return Err(EvalError::WrongArgCount {
                command: self.name(),
                expected: plural(count, "argument"),
                found: self.args.len(),
            });
        }
        Ok(())
    }

    fn at_least(&self, count: usize) -> Result<(), EvalError> {
        if self.args.len() < count {
            return Err(EvalError::WrongArgCount {
                command: self.name(),
                expected: format!("at least {}", plural(count, "argument")),
                found: self.args.len(),
            });
        }
        Ok(())
    }

    fn wrong_kind(&self, index: usize, expected: ValueType, found: String) -> EvalError {
        EvalError::WrongKind {
            command: self.name(),
            position: index + 1,
            expected,
            found,
        }
    }

    fn number(&self, ctx: &Context, index: usize) -> Result<f64, EvalError> {
        match &self.args[index] {
            Value::Number(n) => Ok(*n),
            Value::Math(math) => arith::evaluate_math(math, &mut |name: &str| ctx.number(name)),
            Value::Identifier(name) => {
                let value = ctx.variable(name)?;
                value.as_number().ok_or_else(|| {
                    self.wrong_kind(index, ValueType::Number, format!("{} `{name}`", value.value_type()))
                })
            }
            other => Err(self.wrong_kind(index, ValueType::Number, other.kind().to_string())),
        }
    }

    fn string(&self, ctx: &Context, index: usize) -> Result<String, EvalError> {
        match &self.args[index] {
            Value::String(s) => Ok(s.clone()),
            Value::Identifier(name) => {
                let value = ctx.variable(name)?;
                value.as_str().map(str::to_string).ok_or_else(|| {
                    self.wrong_kind(index, ValueType::String, format!("{} `{name}`", value.value_type()))
                })
            }
            other => Err(self.wrong_kind(index, ValueType::String, other.kind().to_string())),
        }
    }

    fn streams(&self, ctx: &mut Context, index: usize) -> Result<StreamRead, EvalError> {
        let arg = &self.args[index];
        ctx.read_stream_ref(arg)
            .unwrap_or_else(|| Err(self.wrong_kind(index, ValueType::Stream, arg.kind().to_string())))
    }

    fn input(&self, stage: &StageInput) -> Result<Handle, EvalError> {
        stage.stream.ok_or_else(|| EvalError::MissingInput(self.name()))
    }

    fn backend_err(&self) -> impl FnOnce(crate::backend::BackendError) -> EvalError + '_ {
        move |source| EvalError::Backend {
            command: self.name(),
            source,
        }
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Opens the file or directory named by the single argument.
///
/// A directory yields one handle per media file directly inside it, in path
/// order.
pub fn open(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    args: &[Value],
) -> Result<Vec<Handle>, EvalError> {
    let args = Args::new(Builtin::Open, args);
    args.exactly(1)?;
    let path = PathBuf::from(args.string(ctx, 0)?);

    let open_err = |source| EvalError::Open {
        command: Builtin::Open.name().to_string(),
        source,
    };

    let files = if path.is_dir() {
        media::list_media(&path, ctx.media_filter()).map_err(open_err)?
    } else {
        vec![path]
    };

    let mut handles = Vec::with_capacity(files.len());
    for file in &files {
        handles.push(backend.open(file).map_err(open_err)?);
        if ctx.debug {
            info!(path = %file.display(), "opened");
        } else {
            debug!(path = %file.display(), "opened");
        }
    }
    Ok(handles)
}

/// `base.ext` becomes `base_<index>.ext`.
fn numbered_output(path: &Path, index: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{index}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{index}"),
    };
    path.with_file_name(name)
}

/// `export "path"` writes the piped stream; `export name "path"` writes a
/// named stream. Several streams are written to numbered files.
fn export(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    stage: &StageInput,
    args: &[Value],
) -> Result<Stage, EvalError> {
    let args = Args::new(Builtin::Export, args);

    let (targets, eligible) = match args.args.len() {
        1 => {
            let output = PathBuf::from(args.string(ctx, 0)?);
            let handle = args.input(stage)?;
            let output = if stage.branches > 1 {
                numbered_output(&output, stage.branch)
            } else {
                output
            };
            (vec![(handle, output)], stage.eligible)
        }
        2 => {
            let read = args.streams(ctx, 0)?;
            let output = PathBuf::from(args.string(ctx, 1)?);
            let count = read.handles.len();
            let targets: Vec<(Handle, PathBuf)> = read
                .handles
                .into_iter()
                .enumerate()
                .map(|(i, handle)| {
                    let path = if count > 1 {
                        numbered_output(&output, i)
                    } else {
                        output.clone()
                    };
                    (handle, path)
                })
                .collect();
            (targets, read.eligible)
        }
        found => {
            return Err(EvalError::WrongArgCount {
                command: args.name(),
                expected: "1 or 2 arguments".to_string(),
                found,
            });
        }
    };

    let mut last = None;
    for (handle, path) in targets {
        backend
            .export(handle, &path, eligible, ctx.preview)
            .map_err(args.backend_err())?;
        info!(output = %path.display(), copy = eligible, "exported");
        last = Some(handle);
    }

    let handle = last.ok_or_else(|| EvalError::InvalidArgument {
        command: args.name(),
        message: "no streams to export".to_string(),
    })?;
    Ok(Stage { handle, eligible })
}

/// Applies one `eq` option taking a single number.
fn eq_filter(
    command: Builtin,
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    stage: &StageInput,
    args: &[Value],
) -> Result<Stage, EvalError> {
    let args = Args::new(command, args);
    args.exactly(1)?;
    let level = args.number(ctx, 0)?;
    let input = args.input(stage)?;

    backend
        .apply_filter(input, "eq", &[Param::named(command.name(), level)])
        .map(Stage::transformed)
        .map_err(args.backend_err())
}

fn brightness(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    stage: &StageInput,
    args: &[Value],
) -> Result<Stage, EvalError> {
    eq_filter(Builtin::Brightness, ctx, backend, stage, args)
}

fn contrast(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    stage: &StageInput,
    args: &[Value],
) -> Result<Stage, EvalError> {
    eq_filter(Builtin::Contrast, ctx, backend, stage, args)
}

fn saturation(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    stage: &StageInput,
    args: &[Value],
) -> Result<Stage, EvalError> {
    eq_filter(Builtin::Saturation, ctx, backend, stage, args)
}

fn gamma(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    stage: &StageInput,
    args: &[Value],
) -> Result<Stage, EvalError> {
    eq_filter(Builtin::Gamma, ctx, backend, stage, args)
}

/// `hue degrees`
fn hue(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    stage: &StageInput,
    args: &[Value],
) -> Result<Stage, EvalError> {
    let args = Args::new(Builtin::Hue, args);
    args.exactly(1)?;
    let degrees = args.number(ctx, 0)?;
    let input = args.input(stage)?;

    backend
        .apply_filter(input, "hue", &[Param::named("h", degrees)])
        .map(Stage::transformed)
        .map_err(args.backend_err())
}

/// `flip "h"` mirrors left to right, `flip "v"` top to bottom.
fn flip(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    stage: &StageInput,
    args: &[Value],
) -> Result<Stage, EvalError> {
    let args = Args::new(Builtin::Flip, args);
    args.exactly(1)?;
    let filter = match args.string(ctx, 0)?.as_str() {
        "h" => "hflip",
        "v" => "vflip",
        other => {
            return Err(EvalError::InvalidArgument {
                command: args.name(),
                message: format!("direction must be \"h\" or \"v\", got {other:?}"),
            });
        }
    };
    let input = args.input(stage)?;

    backend
        .apply_filter(input, filter, &[])
        .map(Stage::transformed)
        .map_err(args.backend_err())
}

/// `cut start end`, in seconds. Timestamps restart at zero.
fn cut(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    stage: &StageInput,
    args: &[Value],
) -> Result<Stage, EvalError> {
    let args = Args::new(Builtin::Cut, args);
    args.exactly(2)?;
    let start = args.number(ctx, 0)?;
    let end = args.number(ctx, 1)?;
    let input = args.input(stage)?;

    let trimmed = backend
        .trim(input, start, end)
        .map_err(args.backend_err())?;
    backend
        .apply_filter(trimmed, "setpts", &[Param::positional("PTS-STARTPTS")])
        .map(Stage::transformed)
        .map_err(args.backend_err())
}

/// `speed factor`; 2 plays twice as fast.
fn speed(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    stage: &StageInput,
    args: &[Value],
) -> Result<Stage, EvalError> {
    let args = Args::new(Builtin::Speed, args);
    args.exactly(1)?;
    let factor = args.number(ctx, 0)?;
    if factor <= 0.0 {
        return Err(EvalError::InvalidArgument {
            command: args.name(),
            message: format!("factor must be positive, got {factor}"),
        });
    }
    let input = args.input(stage)?;

    backend
        .apply_filter(input, "setpts", &[Param::positional(format!("PTS/{factor}"))])
        .map(Stage::transformed)
        .map_err(args.backend_err())
}

/// Stream arguments from `first` on, preceded by the piped input if any.
fn collect_streams(
    args: &Args<'_>,
    ctx: &mut Context,
    stage: &StageInput,
    first: usize,
) -> Result<Vec<Handle>, EvalError> {
    let mut handles: Vec<Handle> = stage.stream.into_iter().collect();
    for index in first..args.args.len() {
        handles.extend(args.streams(ctx, index)?.handles);
    }
    Ok(handles)
}

/// `concat a b ...` plays the piped input (if any) and then every argument
/// stream back to back, scaled and padded to the output geometry.
fn concat(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    stage: &StageInput,
    args: &[Value],
) -> Result<Stage, EvalError> {
    let args = Args::new(Builtin::Concat, args);
    args.at_least(1)?;
    let inputs = collect_streams(&args, ctx, stage, 0)?;

    let (w, h) = (ctx.config.width, ctx.config.height);
    let normalize = [
        (
            "scale",
            Param::positional(format!("{w}:{h}:force_original_aspect_ratio=decrease")),
        ),
        ("pad", Param::positional(format!("{w}:{h}:(ow-iw)/2:(oh-ih)/2"))),
        ("setpts", Param::positional("PTS-STARTPTS")),
    ];

    let mut normalized = Vec::with_capacity(inputs.len());
    for input in inputs {
        let mut handle = input;
        for (filter, param) in &normalize {
            handle = backend
                .apply_filter(handle, filter, std::slice::from_ref(param))
                .map_err(args.backend_err())?;
        }
        normalized.push(handle);
    }

    backend
        .concat(&normalized)
        .map(Stage::transformed)
        .map_err(args.backend_err())
}

/// `stack "h"|"v" a ...` lays the piped input (if any) and the argument
/// streams out side by side or one above the other. Inputs are scaled to a
/// common height (horizontal) or width (vertical).
fn stack(
    ctx: &mut Context,
    backend: &mut dyn MediaBackend,
    stage: &StageInput,
    args: &[Value],
) -> Result<Stage, EvalError> {
    let args = Args::new(Builtin::Stack, args);
    args.at_least(2)?;
    let raw = args.string(ctx, 0)?;
    let direction = StackDirection::from_arg(&raw).ok_or_else(|| EvalError::InvalidArgument {
        command: args.name(),
        message: format!("direction must be \"h\" or \"v\", got {raw:?}"),
    })?;
    let inputs = collect_streams(&args, ctx, stage, 1)?;

    let (w, h) = (ctx.config.width, ctx.config.height);
    let (scale, pad) = match direction {
        StackDirection::Horizontal => (format!("-2:{h}"), format!("iw:{h}:(ow-iw)/2:(oh-ih)/2")),
        StackDirection::Vertical => (format!("{w}:-2"), format!("{w}:ih:(ow-iw)/2:(oh-ih)/2")),
    };

    let mut normalized = Vec::with_capacity(inputs.len());
    for input in inputs {
        let scaled = backend
            .apply_filter(input, "scale", &[Param::positional(scale.as_str())])
            .and_then(|handle| backend.apply_filter(handle, "pad", &[Param::positional(pad.as_str())]))
            .and_then(|handle| backend.apply_filter(handle, "setsar", &[Param::positional("1")]))
            .map_err(args.backend_err())?;
        normalized.push(scaled);
    }

    backend
        .stack(direction, &normalized)
        .map(Stage::transformed)
        .map_err(args.backend_err())
}
