//! Status State Machine
//!
//! Transition checks come from each type's table in
//! [`artifact_type`](crate::artifact_type). Side effects are enumerated here
//! as data: [`CASCADES`] lists the transitions that move other artifacts,
//! [`ELIGIBILITY`] lists the ones that only make a parent eligible for an
//! explicit follow-up transition, and [`ANNOTATIONS`] lists the types whose
//! current status is mirrored into the "Referenced by" lists they appear in.

use serde::Serialize;
use tracing::warn;

use crate::artifact_type::{ArtifactType, Status};
use crate::error::{Result, StoreError};
use crate::id::ArtifactId;
use crate::index::{ArtifactRecord, Index, Lookup};
use crate::parser::labels;

/// A transition that drags dependents along
#[derive(Debug)]
pub struct CascadeRule {
    pub source: &'static [ArtifactType],
    pub trigger: Status,
    /// Field on the source listing the dependents
    pub follow: &'static str,
    pub dependent: ArtifactType,
    pub dependent_status: Status,
}

/// A transition after which a parent may be completed by the caller
#[derive(Debug)]
pub struct EligibilityRule {
    pub source: ArtifactType,
    pub trigger: Status,
    pub parent: ArtifactType,
    pub parent_status: Status,
}

/// Types whose status is noted next to their entry in a target's "Referenced by" list
#[derive(Debug)]
pub struct AnnotationRule {
    pub source: &'static [ArtifactType],
    /// Field on the source listing the annotated targets
    pub follow: &'static str,
}

pub const CASCADES: &[CascadeRule] = &[CascadeRule {
    source: &[ArtifactType::Uacc, ArtifactType::Sacc],
    trigger: Status::Passed,
    follow: labels::TESTS,
    dependent: ArtifactType::Req,
    dependent_status: Status::Completed,
}];

pub const ELIGIBILITY: &[EligibilityRule] = &[EligibilityRule {
    source: ArtifactType::Task,
    trigger: Status::Completed,
    parent: ArtifactType::Taskprd,
    parent_status: Status::Completed,
}];

pub const ANNOTATIONS: &[AnnotationRule] = &[
    AnnotationRule {
        source: &[ArtifactType::Task],
        follow: labels::IMPLEMENTS,
    },
    AnnotationRule {
        source: &[ArtifactType::Uacc, ArtifactType::Sacc],
        follow: labels::TESTS,
    },
];

/// A dependent the cascade left alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCascade {
    pub id: ArtifactId,
    pub status: Status,
    pub reason: String,
}

/// Every status write one request will make
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub id: ArtifactId,
    pub from: Status,
    pub to: Status,
    /// Dependents to move, in listing order
    pub cascades: Vec<(ArtifactId, Status)>,
    pub skipped: Vec<SkippedCascade>,
    /// Targets listing the source under "Referenced by", to be re-annotated
    pub annotations: Vec<ArtifactId>,
}

/// Check a single transition against the type's table
pub fn check_transition(record: &ArtifactRecord, to: Status) -> Result<()> {
    let spec = record.artifact_type.spec();
    if spec.allows(record.status, to) {
        return Ok(());
    }
    Err(StoreError::InvalidTransition {
        id: record.id.to_string(),
        from: record.status.to_string(),
        to: to.to_string(),
        allowed: spec.targets(record.status).to_vec(),
    })
}

/// Validate a request and work out its cascades; nothing is written
///
/// Every dependent must resolve (`NotFound` otherwise). Dependents already
/// at the cascade status are skipped silently; dependents whose table
/// forbids the move are reported in `skipped`.
pub fn plan(index: &Index, record: &ArtifactRecord, to: Status) -> Result<TransitionPlan> {
    check_transition(record, to)?;

    let mut plan = TransitionPlan {
        id: record.id,
        from: record.status,
        to,
        cascades: Vec::new(),
        skipped: Vec::new(),
        annotations: Vec::new(),
    };

    for rule in CASCADES
        .iter()
        .filter(|r| r.trigger == to && r.source.contains(&record.artifact_type))
    {
        for dependent_id in record.field_ids(rule.follow) {
            if dependent_id.artifact_type != rule.dependent || plan.cascades.iter().any(|(id, _)| *id == dependent_id) {
                continue;
            }
            let dependent = index.resolve(&dependent_id)?;
            if dependent.status == rule.dependent_status {
                continue;
            }
            if !dependent.artifact_type.spec().allows(dependent.status, rule.dependent_status) {
                warn!(
                    id = %dependent.id,
                    status = %dependent.status,
                    "cascade to {} skipped",
                    rule.dependent_status
                );
                plan.skipped.push(SkippedCascade {
                    id: dependent.id,
                    status: dependent.status,
                    reason: format!(
                        "{} -> {} is not allowed for {}",
                        dependent.status, rule.dependent_status, dependent.artifact_type
                    ),
                });
                continue;
            }
            plan.cascades.push((dependent.id, rule.dependent_status));
        }
    }

    for rule in ANNOTATIONS.iter().filter(|r| r.source.contains(&record.artifact_type)) {
        for target_id in record.field_ids(rule.follow) {
            if plan.annotations.contains(&target_id) {
                continue;
            }
            match index.lookup(&target_id) {
                Lookup::Unique(target) => {
                    if target.field_ids(labels::REFERENCED_BY).contains(&record.id) {
                        plan.annotations.push(target_id);
                    }
                }
                Lookup::Missing | Lookup::Ambiguous(_) => {
                    warn!(id = %record.id, target = %target_id, "annotation target does not resolve");
                }
            }
        }
    }

    Ok(plan)
}

/// The parent an eligibility rule points at after `record` moves to `to`
pub fn eligibility_parent(record: &ArtifactRecord, to: Status) -> Option<ArtifactId> {
    ELIGIBILITY
        .iter()
        .find(|r| r.source == record.artifact_type && r.trigger == to)
        .and_then(|r| record.parent.filter(|p| p.artifact_type == r.parent))
}

/// Whether `parent` may now take its eligibility transition
///
/// True when the parent's table allows the move and every child of the
/// rule's source type has reached the trigger status. Cancelled and
/// replaced children do not block; a parent without children is never
/// eligible.
pub fn completion_eligible(index: &Index, parent: &ArtifactRecord) -> bool {
    let Some(rule) = ELIGIBILITY.iter().find(|r| r.parent == parent.artifact_type) else {
        return false;
    };
    if !parent.artifact_type.spec().allows(parent.status, rule.parent_status) {
        return false;
    }
    let children = index.query(&[rule.source], None, Some(parent.id));
    let mut reached = 0;
    for child in &children {
        match child.status {
            s if s == rule.trigger => reached += 1,
            Status::Cancelled | Status::Replaced => {}
            _ => return false,
        }
    }
    reached > 0
}
