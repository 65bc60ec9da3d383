//! Error types for the artifact store

use std::path::PathBuf;

use thiserror::Error;

use crate::artifact_type::{ArtifactType, Status};

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Artifact store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Artifact not found: {id}{}", suggestion_suffix(.suggestions))]
    NotFound { id: String, suggestions: Vec<String> },

    #[error("Identifier {id} is ambiguous: defined in {}", .locations.join(", "))]
    AmbiguousIdentifier { id: String, locations: Vec<String> },

    #[error("Invalid transition for {id}: {from} -> {to} (allowed: {})", display_statuses(.allowed))]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
        allowed: Vec<Status>,
    },

    #[error("Structural violation in {context}: {reason}")]
    StructuralViolation { context: String, reason: String },

    #[error("{artifact_type} does not support {operation}")]
    CapabilityError {
        artifact_type: ArtifactType,
        operation: String,
    },

    #[error("Provisional id {id} is referenced but never defined")]
    UnresolvedProvisionalId { id: String },

    #[error("Provisional ordinal {ordinal} is used by more than one artifact: {}", .ids.join(", "))]
    DuplicateProvisionalOrdinal { ordinal: u32, ids: Vec<String> },

    #[error("Step {step} not found in {id}")]
    StepNotFound { id: String, step: String },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Draft not found: {0}")]
    DraftNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Atomic write failed: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl StoreError {
    /// Stable machine-readable code for this error
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "NotFound",
            StoreError::AmbiguousIdentifier { .. } => "AmbiguousIdentifier",
            StoreError::InvalidTransition { .. } => "InvalidTransition",
            StoreError::StructuralViolation { .. } => "StructuralViolation",
            StoreError::CapabilityError { .. } => "CapabilityError",
            StoreError::UnresolvedProvisionalId { .. } => "UnresolvedProvisionalId",
            StoreError::DuplicateProvisionalOrdinal { .. } => "DuplicateProvisionalOrdinal",
            StoreError::StepNotFound { .. } => "StepNotFound",
            StoreError::InvalidIdentifier(_) => "InvalidIdentifier",
            StoreError::DraftNotFound(_) => "DraftNotFound",
            StoreError::Io(_) => "Io",
            StoreError::Config(_) => "Config",
            StoreError::Ledger(_) => "Ledger",
            StoreError::Persist(_) => "Io",
        }
    }

    pub(crate) fn structural(context: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::StructuralViolation {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound {
            id: id.into(),
            suggestions: Vec::new(),
        }
    }
}

fn suggestion_suffix(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean {}?)", suggestions.join(", "))
    }
}

fn display_statuses(statuses: &[Status]) -> String {
    if statuses.is_empty() {
        return "none".to_string();
    }
    statuses
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
