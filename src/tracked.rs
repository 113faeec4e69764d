//! Tracked-URL list
//!
//! The list of tracked shows is a plain text file with one URL per line. It
//! is the durable source of truth for what is tracked: appending a line adds
//! a show, and the engine persists episode advances by rewriting the file
//! with each show's current episode URL.

use crate::show::ShowRecord;
use crate::temp::write_atomically;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading or writing the tracked list
#[derive(Debug, Error)]
pub enum TrackedListError {
    /// The list could not be read; nothing can be refreshed without it
    #[error("Failed to read tracked list {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    /// The list could not be written
    #[error("Failed to write tracked list {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },
}

/// Handle to the tracked-URL file
#[derive(Debug, Clone)]
pub struct TrackedList {
    path: PathBuf,
}

impl TrackedList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all tracked URLs in file order, skipping blank lines
    pub fn read(&self) -> Result<Vec<String>, TrackedListError> {
        let content = fs::read_to_string(&self.path).map_err(|e| TrackedListError::ReadFailed {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Appends a URL, creating the file if needed
    pub fn append(&self, url: &str) -> Result<(), TrackedListError> {
        let write_failed = |e| TrackedListError::WriteFailed {
            path: self.path.clone(),
            source: e,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        // Keep the new URL on its own line if the file lacks a final newline
        let needs_newline = fs::read(&self.path)
            .map(|content| !content.is_empty() && !content.ends_with(b"\n"))
            .unwrap_or(false);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_failed)?;

        let line = if needs_newline {
            format!("\n{}\n", url)
        } else {
            format!("{}\n", url)
        };
        file.write_all(line.as_bytes()).map_err(write_failed)
    }

    /// Rewrites the list from the given shows, sorted by title
    pub fn rewrite(&self, shows: &[ShowRecord]) -> Result<(), TrackedListError> {
        let mut sorted: Vec<&ShowRecord> = shows.iter().collect();
        sorted.sort_by(|a, b| a.title.cmp(&b.title));

        let content: String = sorted
            .iter()
            .map(|show| format!("{}\n", show.current_ep_url))
            .collect();

        write_atomically(&self.path, content.as_bytes()).map_err(|e| TrackedListError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })
    }
}
