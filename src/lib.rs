//! Artifact Store
//!
//! A structure-preserving store for identified markdown project artifacts
//! (PRDs, requirements, acceptance criteria, task plans, tasks, architecture
//! decisions). Documents stay the source of truth; the store indexes them,
//! answers lookups and applies edits that touch only the bytes they must.
//!
//! ## Features
//!
//! - **Lossless Edits**: Status, content, step and reference edits rewrite single spans
//! - **Staleness Detection**: SHA256 checksums revalidate cached documents before use
//! - **Lifecycle Rules**: Per-type transition tables with cascades and eligibility
//! - **ID Allocation**: Provisional ids confirmed in one pass, backed by a ledger
//! - **Atomic Commits**: Every multi-file edit lands together or not at all
//!
//! ## Layout
//!
//! ```text
//! docs/
//! ├── PRD-1_checkout.md          # PRD-1 with embedded REQ / UACC / SACC
//! ├── TASKPRD-1_rollout.md       # TASKPRD-1 with embedded TASK sections
//! ├── ASD-2_storage.md
//! ├── .artifact-ledger.toml      # highest ordinal issued per type
//! └── .provisional/
//!     └── TASKPRD-PROVISIONAL1.md
//! ```

pub mod allocator;
pub mod artifact_type;
pub mod changeset;
pub mod checksum;
pub mod config;
pub mod error;
pub mod graph;
pub mod id;
pub mod index;
pub mod ledger;
pub mod lifecycle;
pub mod mutator;
pub mod parser;
pub mod scanner;
pub mod steps;
pub mod store;

pub use artifact_type::{ArtifactType, Placement, Status};
pub use checksum::Checksum;
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use id::{ArtifactId, Ordinal};
pub use index::{ArtifactRecord, ArtifactSummary, DocumentWarning, Index};
pub use parser::{ArtifactParser, ParsedArtifact, ParsedDocument};
pub use steps::StepOutcome;
pub use store::{
    ArtifactStore, FinalizeReport, ReferenceOutcome, RegisterReport, SearchHit, TransitionOutcome,
};
