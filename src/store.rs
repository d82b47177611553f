//! Named stream bindings.
//!
//! A stream that is still exactly what `open` produced can be referenced
//! any number of times and exported with a plain stream copy. Once anything
//! has been applied to it, each consumer needs its own decodable branch, so
//! every read draws a fresh branch from a splitter made when the name was
//! bound.

use std::collections::HashMap;

use tracing::debug;

use crate::backend::{BackendError, Handle, MediaBackend, SplitSource};

/// Result of reading a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRead {
    pub handles: Vec<Handle>,
    /// `true` when the handles are the untouched originals
    pub eligible: bool,
}

#[derive(Debug, Clone)]
struct Entry {
    trusted: Option<Vec<Handle>>,
    forks: Vec<SplitSource>,
    branches: usize,
}

/// Stream bindings owned by the evaluation context.
#[derive(Debug, Clone, Default)]
pub struct StreamStore {
    entries: HashMap<String, Entry>,
}

impl StreamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `handles`, replacing any previous binding.
    ///
    /// With `eligible` the handles are kept as the trusted originals. A
    /// splitter is made for every handle either way and the branch counter
    /// restarts at zero.
    pub fn set<B: MediaBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        name: &str,
        handles: Vec<Handle>,
        eligible: bool,
    ) -> Result<(), BackendError> {
        let forks = handles
            .iter()
            .map(|&handle| backend.split(handle))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(name, streams = handles.len(), eligible, "bind stream");
        self.entries.insert(
            name.to_string(),
            Entry {
                trusted: eligible.then_some(handles),
                forks,
                branches: 0,
            },
        );
        Ok(())
    }

    /// Reads `name`. Trusted originals come back as-is; otherwise the next
    /// branch is drawn and the counter advances.
    pub fn get(&mut self, name: &str) -> Option<StreamRead> {
        let entry = self.entries.get_mut(name)?;

        if let Some(trusted) = &entry.trusted {
            debug!(name, "read trusted stream");
            return Some(StreamRead {
                handles: trusted.clone(),
                eligible: true,
            });
        }

        let index = entry.branches;
        entry.branches += 1;
        debug!(name, branch = index, "read stream branch");
        Some(StreamRead {
            handles: entry.forks.iter().map(|fork| fork.branch(index)).collect(),
            eligible: false,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// Number of branches drawn from `name` since it was last bound.
    pub fn branch_count(&self, name: &str) -> Option<usize> {
        self.entries.get(name).map(|entry| entry.branches)
    }
}
