//! Configuration management for the artifact store
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (artifacts.toml)
//! - Environment variables (ARTIFACTS__*)
//!
//! ## Example config file (artifacts.toml):
//! ```toml
//! [store]
//! doc_root = "./docs"
//! provisional_root = "./docs/provisional"
//! extension = "md"
//! skip_prefixes = ["archive/"]
//!
//! [finalize]
//! version_footer = true
//! max_suffix_len = 50
//!
//! [ledger]
//! file = ".artifact-ledger.toml"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the artifact store
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Document locations
    #[serde(default)]
    pub store: LocationConfig,

    /// Finalization settings
    #[serde(default)]
    pub finalize: FinalizeConfig,

    /// Allocation ledger settings
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Where tracked documents and drafts live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Root of the tracked document corpus
    #[serde(default = "default_doc_root")]
    pub doc_root: PathBuf,

    /// Staging area for drafts awaiting finalization
    #[serde(default = "default_provisional_root")]
    pub provisional_root: PathBuf,

    /// File extension of tracked documents
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Relative path prefixes never scanned
    #[serde(default)]
    pub skip_prefixes: Vec<String>,
}

/// Finalization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeConfig {
    /// Append a version footer comment to finalized documents
    #[serde(default = "default_true")]
    pub version_footer: bool,

    /// Longest accepted file name suffix
    #[serde(default = "default_max_suffix_len")]
    pub max_suffix_len: usize,
}

/// Allocation ledger settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Ledger file name, relative to the document root
    #[serde(default = "default_ledger_file")]
    pub file: String,
}

fn default_doc_root() -> PathBuf {
    PathBuf::from("docs")
}

fn default_provisional_root() -> PathBuf {
    PathBuf::from("docs/provisional")
}

fn default_extension() -> String {
    "md".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_suffix_len() -> usize {
    50
}

fn default_ledger_file() -> String {
    ".artifact-ledger.toml".to_string()
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            doc_root: default_doc_root(),
            provisional_root: default_provisional_root(),
            extension: default_extension(),
            skip_prefixes: Vec::new(),
        }
    }
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self {
            version_footer: true,
            max_suffix_len: default_max_suffix_len(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            file: default_ledger_file(),
        }
    }
}

impl StoreConfig {
    /// Configuration rooted at explicit directories, everything else default
    pub fn with_roots(doc_root: impl Into<PathBuf>, provisional_root: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.store.doc_root = doc_root.into();
        config.store.provisional_root = provisional_root.into();
        config
    }

    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["artifacts.toml", ".artifacts.toml", "config/artifacts.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "artifact-store") {
            let xdg_config = config_dir.config_dir().join("artifacts.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // ARTIFACTS__STORE__DOC_ROOT=/srv/docs
        builder = builder.add_source(
            Environment::with_prefix("ARTIFACTS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Tracked document root (resolves relative paths)
    pub fn doc_root(&self) -> PathBuf {
        resolve(&self.store.doc_root)
    }

    /// Draft staging area (resolves relative paths)
    pub fn provisional_root(&self) -> PathBuf {
        resolve(&self.store.provisional_root)
    }

    /// Location of the allocation ledger
    pub fn ledger_path(&self) -> PathBuf {
        self.doc_root().join(&self.ledger.file)
    }
}

fn resolve(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}
