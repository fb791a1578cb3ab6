//! Locating the control population on disk.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::IoError;

/// File name pattern matched by default: `.nii` and `.nii.gz` files.
pub const DEFAULT_CONTROL_PATTERN: &str = r"\.nii(\.gz)?$";

/// Finds control volumes in a directory.
#[derive(Debug, Clone)]
pub struct ControlDiscovery {
    pattern: Regex,
    exclude: Vec<PathBuf>,
}

impl ControlDiscovery {
    /// Matches file names against `pattern`.
    pub fn new(pattern: &str) -> Result<Self, IoError> {
        Ok(Self {
            pattern: Regex::new(pattern).map_err(IoError::Pattern)?,
            exclude: Vec::new(),
        })
    }

    /// Never report `path`, even if it matches; used to keep the case volume
    /// out of its own control set.
    #[must_use]
    pub fn exclude(mut self, path: &Path) -> Self {
        self.exclude.push(normalize(path));
        self
    }

    /// Regular files in `dir` (not recursive) whose names match, sorted by name.
    pub fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>, IoError> {
        let list_error = |source| IoError::ListDirectory {
            dir: dir.to_owned(),
            source,
        };

        let mut found = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(list_error)? {
            let entry = entry.map_err(list_error)?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!(path = %path.display(), "skipping file with non UTF-8 name");
                continue;
            };
            if !self.pattern.is_match(name) || self.exclude.contains(&normalize(&path)) {
                continue;
            }
            found.push(path);
        }
        found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        tracing::info!(dir = %dir.display(), count = found.len(), "discovered control volumes");
        Ok(found)
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_owned())
}
