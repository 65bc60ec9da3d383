//! Step Tracker
//!
//! Checks off checklist items by dotted sub-id. Only the box character of
//! the matching line changes; the description is left as written.

use serde::Serialize;
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::mutator::splice;
use crate::parser::{ParsedArtifact, Span, StepRef};

/// Outcome of marking a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub id: String,
    pub step: String,
    /// False when the step was already checked
    pub changed: bool,
}

/// Check off `step` inside `artifact`; returns the new text (unchanged when already done)
pub fn mark_done(text: &str, artifact: &ParsedArtifact, step: &str) -> Result<(String, StepOutcome)> {
    if !artifact.artifact_type().has_steps() {
        return Err(StoreError::CapabilityError {
            artifact_type: artifact.artifact_type(),
            operation: "checklist steps".to_string(),
        });
    }

    let not_found = || StoreError::StepNotFound {
        id: artifact.id.to_string(),
        step: step.trim().to_string(),
    };
    let step_ref = StepRef::parse(step).ok_or_else(not_found)?;
    if step_ref.ordinal.map(|o| o != artifact.id.ordinal).unwrap_or(false) {
        return Err(not_found());
    }

    let mut matches = artifact.steps_numbered(step_ref.number);
    let target = matches.next().ok_or_else(not_found)?;
    if matches.next().is_some() {
        warn!(id = %artifact.id, step = %target.ordinal, "duplicate checklist lines, marking the first");
    }

    let outcome = StepOutcome {
        id: artifact.id.to_string(),
        step: target.ordinal.clone(),
        changed: !target.done,
    };
    if target.done {
        return Ok((text.to_string(), outcome));
    }
    let updated = splice(text, Span::new(target.marker, target.marker + 1), "x");
    Ok((updated, outcome))
}
