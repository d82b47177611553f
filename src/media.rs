//! Media discovery for directory `open`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use regex::Regex;
use tracing::debug;

use crate::backend::OpenError;

/// Case-insensitive allow-list of media file extensions.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    pattern: Option<Regex>,
}

impl ExtensionFilter {
    /// Builds a filter from bare extensions such as `"mp4"`. A leading dot is
    /// tolerated. An empty list matches nothing.
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = extensions
            .iter()
            .map(|ext| regex::escape(ext.as_ref().trim_start_matches('.')))
            .filter(|ext| !ext.is_empty())
            .collect();

        if alternatives.is_empty() {
            return Ok(ExtensionFilter { pattern: None });
        }
        let pattern = Regex::new(&format!(r"(?i)\.(?:{})$", alternatives.join("|")))?;
        Ok(ExtensionFilter {
            pattern: Some(pattern),
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        let Some(pattern) = &self.pattern else {
            return false;
        };
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| pattern.is_match(name))
    }
}

/// Lists the media files directly inside `dir`, sorted by path.
///
/// Subdirectories are not descended into. Fails with
/// [`OpenError::NoMediaFound`] when nothing matches.
pub fn list_media(dir: &Path, filter: &ExtensionFilter) -> Result<Vec<PathBuf>, OpenError> {
    let io_err = |source| OpenError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if entry.file_type().map_err(io_err)?.is_dir() {
            continue;
        }
        if filter.matches(&path) {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(OpenError::NoMediaFound(dir.to_path_buf()));
    }
    files.sort();
    debug!(dir = %dir.display(), count = files.len(), "found media files");
    Ok(files)
}
