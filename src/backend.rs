//! The boundary between the evaluator and whatever actually processes media.
//!
//! The evaluator only ever sees opaque [`Handle`]s. Every operation is
//! non-destructive: it returns a new handle and leaves its inputs untouched,
//! so the same handle can be fed to several stages.
//!
//! [`graph::FilterGraph`] is the ffmpeg implementation.

pub mod graph;

use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Opaque reference to one output of a node in the backend's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    pub node: usize,
    pub output: usize,
}

impl Handle {
    pub fn new(node: usize, output: usize) -> Self {
        Handle { node, output }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.node, self.output)
    }
}

/// A splitter a stream can be forked from. `branch(i)` always returns the
/// same handle for the same `i`, and different handles for different `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSource {
    node: usize,
}

impl SplitSource {
    pub fn new(node: usize) -> Self {
        SplitSource { node }
    }

    pub fn branch(&self, index: usize) -> Handle {
        Handle::new(self.node, index)
    }
}

/// Layout of a `stack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackDirection {
    /// Side by side
    Horizontal,
    /// One above the other
    Vertical,
}

impl StackDirection {
    /// Parses the `"h"` / `"v"` script argument.
    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "h" => Some(StackDirection::Horizontal),
            "v" => Some(StackDirection::Vertical),
            _ => None,
        }
    }
}

/// One filter parameter; positional parameters render bare, named ones as
/// `key=value`.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Positional(String),
    Named(String, String),
}

impl Param {
    pub fn positional(value: impl Into<String>) -> Self {
        Param::Positional(value.into())
    }

    pub fn named(key: impl Into<String>, value: impl ToString) -> Self {
        Param::Named(key.into(), value.to_string())
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Positional(value) => f.write_str(value),
            Param::Named(key, value) => write!(f, "{key}={value}"),
        }
    }
}

/// Failure to open a media resource.
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("no media files found in directory: {}", .0.display())]
    NoMediaFound(PathBuf),

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure inside the backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("unknown stream handle {0}")]
    UnknownHandle(Handle),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to start {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Non-zero exit; `status` is the rendered exit status.
    #[error("{} failed ({status})\n{stderr}", .program.display())]
    Process {
        program: PathBuf,
        status: String,
        stderr: String,
    },
}

/// Operations the evaluator needs from a media backend.
pub trait MediaBackend {
    /// Opens a single media file.
    fn open(&mut self, path: &Path) -> Result<Handle, OpenError>;

    fn apply_filter(
        &mut self,
        input: Handle,
        filter: &str,
        params: &[Param],
    ) -> Result<Handle, BackendError>;

    /// Creates a splitter over `input` that any number of branches can be
    /// drawn from.
    fn split(&mut self, input: Handle) -> Result<SplitSource, BackendError>;

    fn concat(&mut self, inputs: &[Handle]) -> Result<Handle, BackendError>;

    fn stack(
        &mut self,
        direction: StackDirection,
        inputs: &[Handle],
    ) -> Result<Handle, BackendError>;

    /// Keeps `start..end` seconds of `input`.
    fn trim(&mut self, input: Handle, start: f64, end: f64) -> Result<Handle, BackendError>;

    /// Renders `input` to `output`. With `preview`, a live copy is also sent
    /// to the backend's preview sink.
    fn export(
        &mut self,
        input: Handle,
        output: &Path,
        copy_eligible: bool,
        preview: bool,
    ) -> Result<(), BackendError>;
}
