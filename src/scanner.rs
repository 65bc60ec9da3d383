//! Document Scanner
//!
//! Walks the tracked document root and yields the text of every tracked
//! document. Paths handed out are relative to the root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::StoreConfig;
use crate::error::Result;

/// Configuration for document scanning
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Skip documents matching these relative path prefixes
    pub skip_prefixes: Vec<String>,
    /// Extension of tracked documents, without the dot
    pub extension: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            skip_prefixes: vec![
                ".git/".to_string(),         // Git repository
                "target/".to_string(),       // Rust build artifacts
                "node_modules/".to_string(), // Node.js dependencies
            ],
            extension: "md".to_string(),
        }
    }
}

/// One document read from disk
#[derive(Debug, Clone)]
pub struct ScannedDocument {
    /// Path relative to the document root
    pub path: PathBuf,
    pub text: String,
}

/// Walks a document root
#[derive(Debug, Clone)]
pub struct DocumentScanner {
    root: PathBuf,
    config: ScanConfig,
}

impl DocumentScanner {
    pub fn new(root: impl Into<PathBuf>, config: ScanConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Scanner for a store configuration; a staging area nested under the root is never scanned
    pub fn from_config(config: &StoreConfig) -> Self {
        let root = config.doc_root();
        let mut scan = ScanConfig {
            extension: config.store.extension.clone(),
            ..ScanConfig::default()
        };
        scan.skip_prefixes.extend(config.store.skip_prefixes.iter().cloned());
        if let Ok(nested) = config.provisional_root().strip_prefix(&root) {
            let prefix = nested.to_string_lossy().replace('\\', "/");
            if !prefix.is_empty() {
                scan.skip_prefixes.push(format!("{}/", prefix.trim_end_matches('/')));
            }
        }
        Self::new(root, scan)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn absolute(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// Root-relative form of `path` if it is a tracked document location
    pub fn tracked_relative(&self, path: &Path) -> Option<PathBuf> {
        let relative = path.strip_prefix(&self.root).ok()?;
        if self.is_tracked(relative) {
            Some(relative.to_path_buf())
        } else {
            None
        }
    }

    /// Whether a root-relative path would be picked up by [`scan`](Self::scan)
    pub fn is_tracked(&self, relative: &Path) -> bool {
        if relative
            .extension()
            .map(|e| e != self.config.extension.as_str())
            .unwrap_or(true)
        {
            return false;
        }
        let relative_str = relative.to_string_lossy().replace('\\', "/");
        !self
            .config
            .skip_prefixes
            .iter()
            .any(|p| relative_str.starts_with(p.as_str()))
    }

    /// Read every tracked document, sorted by path
    pub fn scan(&self) -> Result<Vec<ScannedDocument>> {
        let mut documents = Vec::new();
        if !self.root.exists() {
            debug!(root = %self.root.display(), "document root does not exist yet");
            return Ok(documents);
        }

        for entry in WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            if !self.is_tracked(relative) {
                continue;
            }
            match fs::read_to_string(path) {
                Ok(text) => documents.push(ScannedDocument {
                    path: relative.to_path_buf(),
                    text,
                }),
                // Unreadable documents are skipped, not fatal
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable document"),
            }
        }

        debug!(count = documents.len(), "scanned documents");
        Ok(documents)
    }

    /// Current text of one document, `None` if it no longer exists
    pub fn read(&self, relative: &Path) -> Result<Option<String>> {
        match fs::read_to_string(self.absolute(relative)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
