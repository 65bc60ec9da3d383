//! Artifact types, statuses and the per-type capability table
//!
//! Every capability question (is this type file-level, which children may it
//! embed, does it carry checklist steps, which status moves are legal) is
//! answered by a single static [`TypeSpec`] row per type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Type of artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ArtifactType {
    /// Product requirements document
    Prd,
    /// Requirement record, embedded in a PRD
    Req,
    /// Architecture decision record
    Adr,
    /// Task breakdown document for a PRD
    Taskprd,
    /// Task, embedded in a TASKPRD
    Task,
    /// Architecture / system design document
    Asd,
    /// User acceptance test
    Uacc,
    /// System acceptance test
    Sacc,
}

impl ArtifactType {
    /// All known types, in declaration order
    pub const ALL: [ArtifactType; 8] = [
        ArtifactType::Prd,
        ArtifactType::Req,
        ArtifactType::Adr,
        ArtifactType::Taskprd,
        ArtifactType::Task,
        ArtifactType::Asd,
        ArtifactType::Uacc,
        ArtifactType::Sacc,
    ];

    /// The id prefix for this type (e.g. "REQ")
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::Prd => "PRD",
            ArtifactType::Req => "REQ",
            ArtifactType::Adr => "ADR",
            ArtifactType::Taskprd => "TASKPRD",
            ArtifactType::Task => "TASK",
            ArtifactType::Asd => "ASD",
            ArtifactType::Uacc => "UACC",
            ArtifactType::Sacc => "SACC",
        }
    }

    /// The capability row for this type
    pub fn spec(&self) -> &'static TypeSpec {
        match self {
            ArtifactType::Prd => &PRD,
            ArtifactType::Req => &REQ,
            ArtifactType::Adr => &ADR,
            ArtifactType::Taskprd => &TASKPRD,
            ArtifactType::Task => &TASK,
            ArtifactType::Asd => &ASD,
            ArtifactType::Uacc => &UACC,
            ArtifactType::Sacc => &SACC,
        }
    }

    pub fn is_file_level(&self) -> bool {
        self.spec().placement == Placement::FileLevel
    }

    pub fn has_steps(&self) -> bool {
        self.spec().has_steps
    }

    /// Whether an artifact of this type may embed a child of `child` type
    pub fn can_embed(&self, child: ArtifactType) -> bool {
        self.spec().children.contains(&child)
    }

    /// Regex alternation of every type prefix, longest first
    pub(crate) fn pattern_alternation() -> String {
        let mut names: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
        names.sort_by_key(|n| std::cmp::Reverse(n.len()));
        names.join("|")
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
                format!("unknown artifact type '{}' (valid: {})", s, valid.join(", "))
            })
    }
}

/// Artifact status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    New,
    Active,
    Testing,
    Passed,
    Failed,
    Completed,
    Cancelled,
    Replaced,
}

impl Status {
    pub const ALL: [Status; 8] = [
        Status::New,
        Status::Active,
        Status::Testing,
        Status::Passed,
        Status::Failed,
        Status::Completed,
        Status::Cancelled,
        Status::Replaced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::New => "NEW",
            Status::Active => "ACTIVE",
            Status::Testing => "TESTING",
            Status::Passed => "PASSED",
            Status::Failed => "FAILED",
            Status::Completed => "COMPLETED",
            Status::Cancelled => "CANCELLED",
            Status::Replaced => "REPLACED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|st| st.as_str() == upper)
            .ok_or_else(|| format!("unknown status '{}'", s))
    }
}

/// Where an artifact lives inside its document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Owns a whole document, heading `# TYPE-n: title`
    FileLevel,
    /// A subsection of a parent document, heading `### TYPE-n: title`
    Embedded,
}

impl Placement {
    /// Markdown heading level used by artifacts with this placement
    pub fn heading_level(&self) -> usize {
        match self {
            Placement::FileLevel => 1,
            Placement::Embedded => 3,
        }
    }
}

/// Capability row for one artifact type
#[derive(Debug)]
pub struct TypeSpec {
    pub artifact_type: ArtifactType,
    pub placement: Placement,
    /// Status assigned on creation
    pub initial: Status,
    /// Legal targets per source status; sources without a row are terminal
    pub transitions: &'static [(Status, &'static [Status])],
    /// Whether checklist steps are tracked
    pub has_steps: bool,
    /// Types this artifact may embed as subsections
    pub children: &'static [ArtifactType],
    /// `##` section a parent document files this type under
    pub section: Option<&'static str>,
    /// Labeled fields content updates must keep
    pub required_fields: &'static [&'static str],
}

impl TypeSpec {
    /// Targets reachable from `from` in one step
    pub fn targets(&self, from: Status) -> &'static [Status] {
        self.transitions
            .iter()
            .find(|(source, _)| *source == from)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }

    pub fn allows(&self, from: Status, to: Status) -> bool {
        self.targets(from).contains(&to)
    }

    /// Every status an artifact of this type may hold
    pub fn legal_statuses(&self) -> Vec<Status> {
        let mut statuses = vec![self.initial];
        for (source, targets) in self.transitions {
            statuses.push(*source);
            statuses.extend(targets.iter().copied());
        }
        statuses.sort();
        statuses.dedup();
        statuses
    }

    pub fn is_legal(&self, status: Status) -> bool {
        self.legal_statuses().contains(&status)
    }

    pub fn is_terminal(&self, status: Status) -> bool {
        self.targets(status).is_empty()
    }
}

use Status::*;

const DOCUMENT_FLOW: &[(Status, &[Status])] = &[
    (New, &[Active, Cancelled]),
    (Active, &[Completed, Replaced, Cancelled]),
];

const REQ_FLOW: &[(Status, &[Status])] = &[
    (New, &[Active, Completed, Replaced, Cancelled]),
    (Active, &[Completed, Replaced, Cancelled]),
];

const TASK_FLOW: &[(Status, &[Status])] = &[
    (New, &[Active, Cancelled]),
    (Active, &[Completed, Cancelled]),
];

const TEST_FLOW: &[(Status, &[Status])] = &[
    (New, &[Active, Cancelled]),
    (Active, &[Testing, Passed, Failed, Cancelled]),
    (Testing, &[Passed, Failed, Cancelled]),
    (Failed, &[Testing]),
];

static PRD: TypeSpec = TypeSpec {
    artifact_type: ArtifactType::Prd,
    placement: Placement::FileLevel,
    initial: New,
    transitions: DOCUMENT_FLOW,
    has_steps: false,
    children: &[ArtifactType::Req, ArtifactType::Adr, ArtifactType::Uacc, ArtifactType::Sacc],
    section: None,
    required_fields: &[],
};

static TASKPRD: TypeSpec = TypeSpec {
    artifact_type: ArtifactType::Taskprd,
    placement: Placement::FileLevel,
    initial: New,
    transitions: DOCUMENT_FLOW,
    has_steps: false,
    children: &[ArtifactType::Task],
    section: None,
    required_fields: &["Parent"],
};

static ASD: TypeSpec = TypeSpec {
    artifact_type: ArtifactType::Asd,
    placement: Placement::FileLevel,
    initial: New,
    transitions: DOCUMENT_FLOW,
    has_steps: false,
    children: &[ArtifactType::Adr],
    section: None,
    required_fields: &[],
};

static REQ: TypeSpec = TypeSpec {
    artifact_type: ArtifactType::Req,
    placement: Placement::Embedded,
    initial: New,
    transitions: REQ_FLOW,
    has_steps: false,
    children: &[],
    section: Some("## Requirements"),
    required_fields: &[],
};

static ADR: TypeSpec = TypeSpec {
    artifact_type: ArtifactType::Adr,
    placement: Placement::Embedded,
    initial: New,
    transitions: DOCUMENT_FLOW,
    has_steps: false,
    children: &[],
    section: Some("## Decisions"),
    required_fields: &[],
};

static TASK: TypeSpec = TypeSpec {
    artifact_type: ArtifactType::Task,
    placement: Placement::Embedded,
    initial: New,
    transitions: TASK_FLOW,
    has_steps: true,
    children: &[],
    section: Some("## Tasks"),
    required_fields: &["Implements"],
};

static UACC: TypeSpec = TypeSpec {
    artifact_type: ArtifactType::Uacc,
    placement: Placement::Embedded,
    initial: New,
    transitions: TEST_FLOW,
    has_steps: true,
    children: &[],
    section: Some("## Acceptance Tests"),
    required_fields: &["Tests"],
};

static SACC: TypeSpec = TypeSpec {
    artifact_type: ArtifactType::Sacc,
    placement: Placement::Embedded,
    initial: New,
    transitions: TEST_FLOW,
    has_steps: true,
    children: &[],
    section: Some("## Acceptance Tests"),
    required_fields: &["Tests"],
};
