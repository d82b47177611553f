//! ffmpeg backend.
//!
//! Every [`MediaBackend`] call appends a node to an in-memory graph; nothing
//! touches the media until [`MediaBackend::export`], which renders the part
//! of the graph reachable from the exported handle into one ffmpeg command
//! line and hands it to a [`Runner`].

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use tracing::{debug, info};

use crate::{
    backend::{BackendError, Handle, MediaBackend, OpenError, Param, SplitSource, StackDirection},
    config::Config,
};

/// A graph node. Every node except [`Node::Split`] has exactly one output.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Input {
        path: PathBuf,
    },
    Filter {
        input: Handle,
        name: String,
        params: Vec<Param>,
    },
    Split {
        input: Handle,
    },
    Concat {
        inputs: Vec<Handle>,
    },
    Stack {
        direction: StackDirection,
        inputs: Vec<Handle>,
    },
    Trim {
        input: Handle,
        start: f64,
        end: f64,
    },
}

impl Node {
    fn inputs(&self) -> &[Handle] {
        match self {
            Node::Input { .. } => &[],
            Node::Filter { input, .. } | Node::Split { input } | Node::Trim { input, .. } => {
                std::slice::from_ref(input)
            }
            Node::Concat { inputs } | Node::Stack { inputs, .. } => inputs,
        }
    }
}

/// Executes a rendered command line.
pub trait Runner {
    fn run(&mut self, program: &Path, args: &[String]) -> Result<(), BackendError>;
}

/// Runs ffmpeg as a child process and waits for it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl Runner for ProcessRunner {
    fn run(&mut self, program: &Path, args: &[String]) -> Result<(), BackendError> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| BackendError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;

        if !output.status.success() {
            return Err(BackendError::Process {
                program: program.to_path_buf(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

/// One recorded command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            let plain = !arg.is_empty()
                && arg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,@".contains(c));
            if plain {
                write!(f, " {arg}")?;
            } else {
                write!(f, " '{}'", arg.replace('\'', r"'\''"))?;
            }
        }
        Ok(())
    }
}

/// Records command lines instead of running them.
#[derive(Debug, Default, Clone)]
pub struct DryRunner {
    invocations: Vec<Invocation>,
}

impl DryRunner {
    pub fn invocations(&self) -> &[Invocation] {
        &self.invocations
    }
}

impl Runner for DryRunner {
    fn run(&mut self, program: &Path, args: &[String]) -> Result<(), BackendError> {
        self.invocations.push(Invocation {
            program: program.to_path_buf(),
            args: args.to_vec(),
        });
        Ok(())
    }
}

/// Append-only filter graph rendered to ffmpeg command lines.
#[derive(Debug)]
pub struct FilterGraph<R> {
    nodes: Vec<Node>,
    ffmpeg: PathBuf,
    preview_sink: String,
    frame_rate: u32,
    size: String,
    runner: R,
}

impl<R: Runner> FilterGraph<R> {
    pub fn new(config: &Config, runner: R) -> Self {
        FilterGraph {
            nodes: Vec::new(),
            ffmpeg: config.ffmpeg.clone(),
            preview_sink: config.preview_sink.clone(),
            frame_rate: config.frame_rate,
            size: config.size(),
            runner,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Adds an input node without checking that the file exists.
    pub fn add_input(&mut self, path: impl Into<PathBuf>) -> Handle {
        self.push(Node::Input { path: path.into() })
    }

    fn push(&mut self, node: Node) -> Handle {
        self.nodes.push(node);
        Handle::new(self.nodes.len() - 1, 0)
    }

    fn check(&self, handle: Handle) -> Result<Handle, BackendError> {
        match self.nodes.get(handle.node) {
            Some(Node::Split { .. }) => Ok(handle),
            Some(_) if handle.output == 0 => Ok(handle),
            _ => Err(BackendError::UnknownHandle(handle)),
        }
    }

    fn check_all(&self, handles: &[Handle]) -> Result<Vec<Handle>, BackendError> {
        if handles.is_empty() {
            return Err(BackendError::InvalidInput(
                "at least one stream is required".to_string(),
            ));
        }
        handles.iter().map(|&h| self.check(h)).collect()
    }

    /// Nodes `handle` depends on, itself included, in insertion order.
    fn reachable(&self, handle: Handle) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut pending = vec![handle.node];
        while let Some(id) = pending.pop() {
            if seen.insert(id) {
                pending.extend(self.nodes[id].inputs().iter().map(|h| h.node));
            }
        }
        seen
    }

    /// Builds the ffmpeg argument vector that exports `handle` to `output`.
    pub fn render_export(
        &self,
        handle: Handle,
        output: &Path,
        copy_eligible: bool,
        preview: bool,
    ) -> Result<Vec<String>, BackendError> {
        self.check(handle)?;
        let reachable = self.reachable(handle);

        let mut args: Vec<String> = vec!["-y".into(), "-hide_banner".into()];

        let mut input_index = BTreeMap::new();
        for &id in &reachable {
            if let Node::Input { path } = &self.nodes[id] {
                input_index.insert(id, input_index.len());
                args.push("-i".into());
                args.push(path.display().to_string());
            }
        }

        // split nodes only get as many outputs as there are consumers
        let mut used: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        let consumed = reachable
            .iter()
            .flat_map(|&id| self.nodes[id].inputs().iter().copied())
            .chain(std::iter::once(handle));
        for h in consumed {
            if matches!(self.nodes[h.node], Node::Split { .. }) {
                used.entry(h.node).or_default().insert(h.output);
            }
        }

        let label = |h: Handle| -> String {
            match (&self.nodes[h.node], input_index.get(&h.node)) {
                (Node::Input { .. }, Some(index)) => format!("[{index}:v]"),
                (Node::Split { .. }, _) => format!("[s{}o{}]", h.node, h.output),
                _ => format!("[n{}]", h.node),
            }
        };
        let labels = |inputs: &[Handle]| inputs.iter().map(|&h| label(h)).collect::<String>();

        let mut chains = Vec::new();
        for &id in &reachable {
            let chain = match &self.nodes[id] {
                Node::Input { .. } => continue,
                Node::Filter {
                    input,
                    name,
                    params,
                } => {
                    let params: Vec<String> = params.iter().map(Param::to_string).collect();
                    if params.is_empty() {
                        format!("{}{name}[n{id}]", label(*input))
                    } else {
                        format!("{}{name}={}[n{id}]", label(*input), params.join(":"))
                    }
                }
                Node::Split { input } => {
                    let outputs = used.get(&id).cloned().unwrap_or_default();
                    let outs: String = outputs
                        .iter()
                        .map(|&o| label(Handle::new(id, o)))
                        .collect();
                    format!("{}split={}{outs}", label(*input), outputs.len())
                }
                Node::Concat { inputs } => {
                    format!("{}concat=n={}:v=1:a=0[n{id}]", labels(inputs), inputs.len())
                }
                Node::Stack { direction, inputs } => {
                    let filter = match direction {
                        StackDirection::Horizontal => "hstack",
                        StackDirection::Vertical => "vstack",
                    };
                    format!("{}{filter}=inputs={}[n{id}]", labels(inputs), inputs.len())
                }
                Node::Trim { input, start, end } => {
                    format!("{}trim=start={start}:end={end}[n{id}]", label(*input))
                }
            };
            chains.push(chain);
        }

        let bare_input = matches!(self.nodes[handle.node], Node::Input { .. });
        let main_map = if preview {
            chains.push(format!("{}split=2[out][preview]", label(handle)));
            "[out]".to_string()
        } else if bare_input {
            // maps every stream of the file, audio included
            input_index
                .get(&handle.node)
                .map(ToString::to_string)
                .unwrap_or_default()
        } else {
            label(handle)
        };

        if !chains.is_empty() {
            args.push("-filter_complex".into());
            args.push(chains.join(";"));
        }

        args.extend(["-map".to_string(), main_map]);
        if !copy_eligible {
            args.extend(
                [
                    "-c:v",
                    "libx264",
                    "-c:a",
                    "aac",
                    "-r",
                    self.frame_rate.to_string().as_str(),
                    "-s",
                    self.size.as_str(),
                ]
                .map(String::from),
            );
        } else if !preview {
            args.extend(["-c".to_string(), "copy".to_string()]);
        }
        args.extend(["-fflags".to_string(), "+genpts".to_string()]);
        args.push(output.display().to_string());

        if preview {
            args.extend(
                [
                    "-map",
                    "[preview]",
                    "-c:v",
                    "libx264",
                    "-tune",
                    "zerolatency",
                    "-preset",
                    "ultrafast",
                    "-r",
                    "24",
                    "-f",
                    "mpegts",
                    self.preview_sink.as_str(),
                ]
                .map(String::from),
            );
        }

        Ok(args)
    }
}

impl<R: Runner> MediaBackend for FilterGraph<R> {
    fn open(&mut self, path: &Path) -> Result<Handle, OpenError> {
        if !path.exists() {
            return Err(OpenError::NotFound(path.to_path_buf()));
        }
        let handle = self.add_input(path);
        debug!(path = %path.display(), %handle, "opened input");
        Ok(handle)
    }

    fn apply_filter(
        &mut self,
        input: Handle,
        filter: &str,
        params: &[Param],
    ) -> Result<Handle, BackendError> {
        let input = self.check(input)?;
        Ok(self.push(Node::Filter {
            input,
            name: filter.to_string(),
            params: params.to_vec(),
        }))
    }

    fn split(&mut self, input: Handle) -> Result<SplitSource, BackendError> {
        let input = self.check(input)?;
        let handle = self.push(Node::Split { input });
        Ok(SplitSource::new(handle.node))
    }

    fn concat(&mut self, inputs: &[Handle]) -> Result<Handle, BackendError> {
        let inputs = self.check_all(inputs)?;
        Ok(self.push(Node::Concat { inputs }))
    }

    fn stack(
        &mut self,
        direction: StackDirection,
        inputs: &[Handle],
    ) -> Result<Handle, BackendError> {
        let inputs = self.check_all(inputs)?;
        Ok(self.push(Node::Stack { direction, inputs }))
    }

    fn trim(&mut self, input: Handle, start: f64, end: f64) -> Result<Handle, BackendError> {
        let input = self.check(input)?;
        if end <= start {
            return Err(BackendError::InvalidInput(format!(
                "trim end ({end}) must be after start ({start})"
            )));
        }
        Ok(self.push(Node::Trim { input, start, end }))
    }

    fn export(
        &mut self,
        input: Handle,
        output: &Path,
        copy_eligible: bool,
        preview: bool,
    ) -> Result<(), BackendError> {
        let args = self.render_export(input, output, copy_eligible, preview)?;
        info!(output = %output.display(), copy_eligible, preview, "exporting");
        debug!(program = %self.ffmpeg.display(), args = ?args, "running ffmpeg");
        self.runner.run(&self.ffmpeg, &args)
    }
}
