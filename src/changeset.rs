//! Multi-document atomic writes
//!
//! A [`Changeset`] collects the new text of every document an operation
//! touches. Nothing reaches disk until [`Changeset::commit`]: every document
//! is first written to a temporary file next to its target, and only when
//! all of them are staged are they renamed into place. A failure while
//! staging leaves every target untouched.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::parser::{ArtifactParser, ParsedDocument};

#[derive(Debug, Clone)]
enum Change {
    Write(String),
    Create(String),
    Delete,
}

/// Pending edits keyed by absolute path
#[derive(Debug, Default)]
pub struct Changeset {
    changes: BTreeMap<PathBuf, Change>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Current text of `path`: the pending version if any, else disk
    pub fn text(&self, path: &Path) -> Result<String> {
        match self.changes.get(path) {
            Some(Change::Write(text)) | Some(Change::Create(text)) => Ok(text.clone()),
            Some(Change::Delete) => Err(StoreError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is scheduled for deletion", path.display()),
            ))),
            None => Ok(fs::read_to_string(path)?),
        }
    }

    /// Parse the current text of `path`
    pub fn parse(&self, path: &Path, parser: &ArtifactParser) -> Result<(String, ParsedDocument)> {
        let text = self.text(path)?;
        let parsed = parser.parse(&text);
        Ok((text, parsed))
    }

    /// Replace the contents of an existing (or already pending) document
    pub fn write(&mut self, path: &Path, text: String) {
        let change = match self.changes.get(path) {
            Some(Change::Create(_)) => Change::Create(text),
            _ => Change::Write(text),
        };
        self.changes.insert(path.to_path_buf(), change);
    }

    /// Create a new document; refuses to clobber an existing one
    pub fn create(&mut self, path: &Path, text: String) -> Result<()> {
        if path.exists() || self.changes.contains_key(path) {
            return Err(StoreError::structural(
                path.display().to_string(),
                "target document already exists",
            ));
        }
        self.changes.insert(path.to_path_buf(), Change::Create(text));
        Ok(())
    }

    pub fn delete(&mut self, path: &Path) {
        self.changes.insert(path.to_path_buf(), Change::Delete);
    }

    /// Apply every change; returns the paths written or deleted
    pub fn commit(self) -> Result<Vec<PathBuf>> {
        let mut staged: Vec<(NamedTempFile, PathBuf)> = Vec::new();
        let mut deletions = Vec::new();

        for (path, change) in &self.changes {
            match change {
                Change::Write(text) | Change::Create(text) => {
                    if let Change::Create(_) = change {
                        if path.exists() {
                            return Err(StoreError::structural(
                                path.display().to_string(),
                                "target document already exists",
                            ));
                        }
                    }
                    staged.push((stage(path, text)?, path.clone()));
                }
                Change::Delete => deletions.push(path.clone()),
            }
        }

        let mut touched = Vec::with_capacity(staged.len() + deletions.len());
        for (temp, target) in staged {
            temp.persist(&target)?;
            debug!(path = %target.display(), "document written");
            touched.push(target);
        }
        for path in deletions {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "document removed"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            touched.push(path);
        }
        Ok(touched)
    }
}

/// Write `text` to a temporary file in the target's directory
fn stage(target: &Path, text: &str) -> Result<NamedTempFile> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(text.as_bytes())?;
    temp.as_file().sync_all()?;
    Ok(temp)
}
