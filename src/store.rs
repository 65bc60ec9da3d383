//! Artifact Store
//!
//! The operation surface the workflow layer calls. Every operation resolves
//! its ids through the [`Index`] (revalidated against disk first), computes
//! the complete set of text edits in a [`Changeset`], commits it atomically,
//! and then re-indexes exactly the documents it touched. A failing operation
//! returns before commit, so neither disk nor the Index changes.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::allocator::{normalize_suffix, rewrite_with, Allocation, IdMapping, ProvisionalScan};
use crate::artifact_type::{ArtifactType, Status};
use crate::changeset::Changeset;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::id::ArtifactId;
use crate::index::{ArtifactRecord, ArtifactSummary, DocumentWarning, Index, Lookup};
use crate::ledger::AllocationLedger;
use crate::lifecycle::{self, SkippedCascade};
use crate::mutator;
use crate::parser::{labels, ArtifactParser, ParsedDocument, ProvisionalToken};
use crate::scanner::DocumentScanner;
use crate::steps::{self, StepOutcome};

/// Result of `search_by_id`
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub artifact: ArtifactRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_by: Option<Vec<ArtifactId>>,
}

/// Result of `update_status`
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub id: ArtifactId,
    pub from: Status,
    pub to: Status,
    pub applied: bool,
    /// Dependents moved by cascade rules
    pub cascades: Vec<ArtifactId>,
    /// Dependents a cascade rule could not move
    pub skipped: Vec<SkippedCascade>,
    /// Artifacts whose "Referenced by" entry for this one now shows the new status
    pub annotated: Vec<ArtifactId>,
    /// Parent now eligible for an explicit completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_eligible: Option<ArtifactId>,
}

/// Result of `finalize_draft`
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeReport {
    pub mapping: Vec<IdMapping>,
    /// Documents written, relative to the document root
    pub documents: Vec<PathBuf>,
}

/// Result of `register_provisional_ids`
#[derive(Debug, Clone, Serialize)]
pub struct RegisterReport {
    pub id: ArtifactId,
    pub mapping: Vec<IdMapping>,
}

/// Result of `add_reference`
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceOutcome {
    pub target: ArtifactId,
    pub referrer: ArtifactId,
    /// False when the referrer was already listed
    pub added: bool,
}

/// A resolved artifact with the current text of its document
struct Loaded {
    record: ArtifactRecord,
    path: PathBuf,
    text: String,
    doc: ParsedDocument,
}

/// The artifact store
pub struct ArtifactStore {
    config: StoreConfig,
    scanner: DocumentScanner,
    parser: ArtifactParser,
    index: Index,
}

impl ArtifactStore {
    /// Open a store and build its index
    pub fn open(config: StoreConfig) -> Result<Self> {
        let scanner = DocumentScanner::from_config(&config);
        let parser = ArtifactParser::new();
        let index = Index::build(&scanner, &parser)?;
        info!(
            root = %scanner.root().display(),
            documents = index.document_count(),
            artifacts = index.len(),
            "artifact store opened"
        );
        Ok(Self {
            config,
            scanner,
            parser,
            index,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Drop the cache and rescan everything
    pub fn rebuild(&mut self) -> Result<()> {
        self.index = Index::build(&self.scanner, &self.parser)?;
        Ok(())
    }

    /// Parse warnings for every tracked document
    pub fn warnings(&mut self) -> Result<Vec<DocumentWarning>> {
        self.index.refresh(&self.scanner, &self.parser)?;
        Ok(self.index.warnings())
    }

    // ----- queries -----

    /// Artifacts of the given types (all types when empty) in discovery order
    pub fn search_by_type(
        &mut self,
        types: &[ArtifactType],
        status: Option<Status>,
        parent: Option<&str>,
    ) -> Result<Vec<ArtifactSummary>> {
        let parent = parent.map(|p| self.normalize(p)).transpose()?;
        self.index.refresh(&self.scanner, &self.parser)?;
        Ok(self
            .index
            .query(types, status, parent)
            .into_iter()
            .map(|r| r.summary())
            .collect())
    }

    pub fn search_by_id(&mut self, id: &str, include_references: bool) -> Result<SearchHit> {
        let id = self.normalize(id)?;
        let artifact = self.resolve(&id)?;
        let referenced_by = if include_references {
            Some(self.index.reverse_references(&id).into_iter().collect())
        } else {
            None
        };
        Ok(SearchHit {
            artifact,
            referenced_by,
        })
    }

    /// Exact text of the artifact's span
    pub fn get_artifact(&mut self, id: &str) -> Result<String> {
        let id = self.normalize(id)?;
        let loaded = self.load(&id)?;
        let artifact = loaded.doc.find(&id).ok_or_else(|| StoreError::not_found(id.to_string()))?;
        Ok(artifact.span.slice(&loaded.text).to_string())
    }

    /// Whether a parent may now take its explicit completion transition
    pub fn completion_eligible(&mut self, id: &str) -> Result<bool> {
        let id = self.normalize(id)?;
        let record = self.resolve(&id)?;
        Ok(lifecycle::completion_eligible(&self.index, &record))
    }

    // ----- mutations -----

    /// Apply a status transition and its cascades in one atomic write
    pub fn update_status(&mut self, id: &str, status: Status) -> Result<TransitionOutcome> {
        let id = self.normalize(id)?;
        let record = self.resolve(&id)?;
        let plan = lifecycle::plan(&self.index, &record, status)?;

        let mut changes = Changeset::new();
        self.write_status(&mut changes, &plan.id, plan.to)?;
        for (dependent, dependent_status) in &plan.cascades {
            self.write_status(&mut changes, dependent, *dependent_status)?;
        }
        for target in &plan.annotations {
            self.write_annotation(&mut changes, target, &plan.id, plan.to)?;
        }
        self.commit(changes)?;

        info!(id = %plan.id, from = %plan.from, to = %plan.to, cascades = plan.cascades.len(), "status updated");
        for (dependent, dependent_status) in &plan.cascades {
            info!(id = %dependent, to = %dependent_status, trigger = %plan.id, "cascade applied");
        }

        let completion_eligible = lifecycle::eligibility_parent(&record, status).filter(|parent| {
            match self.index.resolve(parent) {
                Ok(parent_record) => lifecycle::completion_eligible(&self.index, parent_record),
                Err(_) => false,
            }
        });
        if let Some(parent) = completion_eligible {
            info!(id = %parent, "parent is now eligible for completion");
        }

        Ok(TransitionOutcome {
            id: plan.id,
            from: plan.from,
            to: plan.to,
            applied: true,
            cascades: plan.cascades.iter().map(|(id, _)| *id).collect(),
            skipped: plan.skipped,
            annotated: plan.annotations,
            completion_eligible,
        })
    }

    /// Replace the artifact's whole span with `new_text` after structural validation
    pub fn update_content(&mut self, id: &str, new_text: &str) -> Result<()> {
        let id = self.normalize(id)?;
        let loaded = self.load(&id)?;
        let current = loaded.doc.find(&id).ok_or_else(|| StoreError::not_found(id.to_string()))?;
        let span = current.span;
        if span.slice(&loaded.text) == new_text {
            debug!(id = %id, "content unchanged");
            return Ok(());
        }

        let new_doc = mutator::validate_section(&self.parser, &id, new_text)?;
        let context = id.to_string();
        let replacement = new_doc
            .find(&id)
            .ok_or_else(|| StoreError::structural(&context, "artifact heading missing"))?;

        if replacement.status != current.status {
            return Err(StoreError::structural(
                &context,
                format!(
                    "status changes from {} to {} must go through a status update",
                    current.status, replacement.status
                ),
            ));
        }

        let contained: BTreeSet<ArtifactId> = loaded
            .doc
            .confirmed()
            .filter(|a| a.id != id && span.contains(&a.span))
            .map(|a| a.id)
            .collect();
        let kept: BTreeSet<ArtifactId> = new_doc.confirmed().map(|a| a.id).collect();
        if let Some(dropped) = contained.iter().find(|c| !kept.contains(*c)) {
            return Err(StoreError::structural(&context, format!("update would remove {}", dropped)));
        }
        for child in &contained {
            if let (Some(before), Some(after)) = (loaded.doc.find(child), new_doc.find(child)) {
                if before.status != after.status {
                    return Err(StoreError::structural(
                        &context,
                        format!(
                            "status of {} changes from {} to {}; use a status update",
                            child, before.status, after.status
                        ),
                    ));
                }
            }
        }
        for introduced in kept.iter().filter(|k| **k != id && !contained.contains(*k)) {
            if !matches!(self.index.lookup(introduced), Lookup::Missing) {
                return Err(StoreError::structural(
                    &context,
                    format!("{} is already defined elsewhere", introduced),
                ));
            }
        }

        let fitted = mutator::fit_replacement(&loaded.text, span, new_text);
        let mut changes = Changeset::new();
        changes.write(&loaded.path, mutator::splice(&loaded.text, span, &fitted));
        self.commit(changes)?;
        info!(id = %id, "content updated");
        Ok(())
    }

    /// Check off one checklist step
    pub fn mark_step_done(&mut self, id: &str, step: &str) -> Result<StepOutcome> {
        let id = self.normalize(id)?;
        let loaded = self.load(&id)?;
        let artifact = loaded.doc.find(&id).ok_or_else(|| StoreError::not_found(id.to_string()))?;
        let (updated, outcome) = steps::mark_done(&loaded.text, artifact, step)?;
        if outcome.changed {
            let mut changes = Changeset::new();
            changes.write(&loaded.path, updated);
            self.commit(changes)?;
            info!(id = %id, step = %outcome.step, "step marked done");
        } else {
            debug!(id = %id, step = %outcome.step, "step already done");
        }
        Ok(outcome)
    }

    /// Record `referrer` in the "Referenced by" list of `target`
    pub fn add_reference(&mut self, target: &str, referrer: &str) -> Result<ReferenceOutcome> {
        let target = self.normalize(target)?;
        let referrer = self.normalize(referrer)?;
        if target == referrer {
            return Err(StoreError::structural(target.to_string(), "an artifact cannot reference itself"));
        }
        self.resolve(&referrer)?;
        let loaded = self.load(&target)?;
        let artifact = loaded.doc.find(&target).ok_or_else(|| StoreError::not_found(target.to_string()))?;

        let added = match mutator::add_referenced_by(&loaded.text, artifact, &referrer) {
            Some(updated) => {
                let mut changes = Changeset::new();
                changes.write(&loaded.path, updated);
                self.commit(changes)?;
                info!(target = %target, referrer = %referrer, "reference added");
                true
            }
            None => false,
        };
        Ok(ReferenceOutcome {
            target,
            referrer,
            added,
        })
    }

    /// Insert a new provisional section of `new_type` under `parent`
    ///
    /// `content` either opens with its own `### TYPE-PROVISIONAL<n>: title`
    /// heading or is plain text whose first line becomes the title, in which
    /// case the next free provisional number of the document is used.
    pub fn add_artifact(&mut self, parent: &str, new_type: ArtifactType, content: &str) -> Result<ArtifactId> {
        let parent = self.normalize(parent)?;
        let loaded = self.load(&parent)?;
        if !loaded.record.artifact_type.can_embed(new_type) {
            return Err(StoreError::CapabilityError {
                artifact_type: loaded.record.artifact_type,
                operation: format!("embedding {}", new_type),
            });
        }

        let used: Vec<ArtifactId> = self
            .parser
            .grammar()
            .provisional_tokens(&loaded.text)
            .into_iter()
            .filter_map(|t| match t {
                ProvisionalToken::Typed { id, .. } => Some(id),
                ProvisionalToken::Bare { .. } => None,
            })
            .collect();

        let (id, block) = self.provisional_block(new_type, content, &used)?;
        let block = mutator::ensure_status_line(&block, &self.parser);
        let section = mutator::validate_section(&self.parser, &id, &block)?;
        let initial = new_type.spec().initial;
        if let Some(status) = section.find(&id).map(|a| a.status).filter(|s| *s != initial) {
            return Err(StoreError::structural(
                id.to_string(),
                format!("new artifacts start at {}, not {}", initial, status),
            ));
        }

        let updated = mutator::insert_embedded(&loaded.text, &loaded.doc, new_type, &block);
        let mut changes = Changeset::new();
        changes.write(&loaded.path, updated);
        self.commit(changes)?;
        info!(id = %id, parent = %parent, "provisional artifact added");
        Ok(id)
    }

    /// Confirm the provisional ids nested inside an already-confirmed artifact
    pub fn register_provisional_ids(&mut self, id: &str, allowed: &[ArtifactType]) -> Result<RegisterReport> {
        let id = self.normalize(id)?;
        let loaded = self.load(&id)?;
        let artifact = loaded.doc.find(&id).ok_or_else(|| StoreError::not_found(id.to_string()))?;
        let span = artifact.span;
        let body = span.slice(&loaded.text);

        let scan = ProvisionalScan::discover(&self.parser, body, allowed)?;
        if scan.is_empty() {
            return Ok(RegisterReport {
                id,
                mapping: Vec::new(),
            });
        }

        let mut ledger = AllocationLedger::load(&self.config.ledger_path())?;
        let allocation = scan.confirm(body, |t| self.next_base(t, &ledger));

        let mut changes = Changeset::new();
        changes.write(&loaded.path, mutator::splice(&loaded.text, span, &allocation.text));
        self.record_allocation(&mut changes, &mut ledger, &allocation)?;
        self.register_back_references(&mut changes, &allocation, &[loaded.path.clone()])?;
        self.commit(changes)?;

        for m in &allocation.mapping {
            info!(provisional = %m.provisional, confirmed = %m.confirmed, within = %id, "id registered");
        }
        Ok(RegisterReport {
            id,
            mapping: allocation.mapping,
        })
    }

    /// Confirm every provisional id of a draft and move it into the tracked root
    ///
    /// A draft with a file-level heading becomes a new document named after
    /// the draft (provisional ids replaced, optional `_suffix`). A draft of
    /// embedded sections only is merged under each section's `*Parent*`.
    pub fn finalize_draft(&mut self, draft: &Path, name_suffix: Option<&str>) -> Result<FinalizeReport> {
        let draft = self.draft_location(draft)?;
        let context = draft.display().to_string();
        let draft_text = fs::read_to_string(&draft)?;
        let draft_doc = self.parser.parse(&draft_text);

        if let Some(warning) = draft_doc.warnings.iter().find(|w| w.excluded) {
            return Err(StoreError::structural(
                &context,
                format!("line {}: {}", warning.line, warning.message),
            ));
        }
        if let Some(confirmed) = draft_doc.confirmed().next() {
            return Err(StoreError::structural(
                &context,
                format!("drafts may only define provisional ids, found {}", confirmed.id),
            ));
        }

        let scan = ProvisionalScan::discover(&self.parser, &draft_text, &[])?;
        if scan.is_empty() {
            return Err(StoreError::structural(&context, "draft defines no provisional artifacts"));
        }

        // Allocation must see every ordinal already issued
        self.index.refresh(&self.scanner, &self.parser)?;
        let mut ledger = AllocationLedger::load(&self.config.ledger_path())?;
        let allocation = scan.confirm(&draft_text, |t| self.next_base(t, &ledger));
        let final_doc = self.parser.parse(&allocation.text);

        for artifact in &final_doc.artifacts {
            for label in artifact.artifact_type().spec().required_fields {
                if artifact.field(label).is_none() {
                    return Err(StoreError::structural(
                        artifact.id.to_string(),
                        format!("missing required field '*{}*'", label),
                    ));
                }
            }
        }

        let mut changes = Changeset::new();
        let mut documents: Vec<PathBuf> = Vec::new();

        if let Some(owner) = final_doc.file_level() {
            let owner_type = owner.artifact_type();
            if let Some(child) = final_doc
                .artifacts
                .iter()
                .find(|a| !a.artifact_type().is_file_level() && !owner_type.can_embed(a.artifact_type()))
            {
                return Err(StoreError::CapabilityError {
                    artifact_type: owner_type,
                    operation: format!("embedding {}", child.artifact_type()),
                });
            }
            let stem = draft
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let stem = rewrite_with(&self.parser, &stem, &allocation);
            let suffix = normalize_suffix(name_suffix.unwrap_or(""), self.config.finalize.max_suffix_len)?;
            let extension = &self.config.store.extension;
            let name = match suffix {
                Some(suffix) => format!("{}_{}.{}", stem, suffix, extension),
                None => format!("{}.{}", stem, extension),
            };
            let target = self.scanner.root().join(name);
            let text = if self.config.finalize.version_footer {
                mutator::with_footer(&allocation.text, &final_doc)
            } else {
                allocation.text.clone()
            };
            changes.create(&target, text)?;
            documents.push(target);
        } else {
            for artifact in &final_doc.artifacts {
                let parent_id = artifact
                    .field_ids(labels::PARENT)
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        StoreError::structural(artifact.id.to_string(), "embedded draft sections must declare *Parent*")
                    })?;
                let parent = self.resolve(&parent_id)?;
                if !parent.artifact_type.can_embed(artifact.artifact_type()) {
                    return Err(StoreError::CapabilityError {
                        artifact_type: parent.artifact_type,
                        operation: format!("embedding {}", artifact.artifact_type()),
                    });
                }
                let path = self.scanner.absolute(&parent.path);
                let (text, doc) = changes.parse(&path, &self.parser)?;
                let block = artifact.span.slice(&allocation.text);
                changes.write(&path, mutator::insert_embedded(&text, &doc, artifact.artifact_type(), block));
                if !documents.contains(&path) {
                    documents.push(path);
                }
            }
        }

        self.record_allocation(&mut changes, &mut ledger, &allocation)?;
        self.register_back_references(&mut changes, &allocation, &documents)?;
        changes.delete(&draft);
        self.commit(changes)?;

        for m in &allocation.mapping {
            info!(provisional = %m.provisional, confirmed = %m.confirmed, "id confirmed");
        }
        info!(draft = %context, documents = documents.len(), "draft finalized");

        let documents = documents
            .iter()
            .map(|p| p.strip_prefix(self.scanner.root()).unwrap_or(p.as_path()).to_path_buf())
            .collect();
        Ok(FinalizeReport {
            mapping: allocation.mapping,
            documents,
        })
    }

    // ----- internals -----

    /// Normalize caller input into a confirmed id
    fn normalize(&self, input: &str) -> Result<ArtifactId> {
        let id = ArtifactId::normalize(input)?;
        if id.is_provisional() {
            // Provisional ids are draft-local and never indexed
            return Err(StoreError::not_found(id.to_string()));
        }
        Ok(id)
    }

    /// Resolve with staleness checks
    ///
    /// The root is rescanned first: changed documents are re-parsed, new ones
    /// indexed and removed ones dropped, so a copy of the id added anywhere
    /// since the last operation surfaces as `AmbiguousIdentifier`.
    fn resolve(&mut self, id: &ArtifactId) -> Result<ArtifactRecord> {
        self.index.refresh(&self.scanner, &self.parser)?;
        self.index.resolve(id).cloned()
    }

    fn load(&mut self, id: &ArtifactId) -> Result<Loaded> {
        let record = self.resolve(id)?;
        let text = self
            .scanner
            .read(&record.path)?
            .ok_or_else(|| StoreError::not_found(id.to_string()))?;
        let doc = self.parser.parse(&text);
        Ok(Loaded {
            path: self.scanner.absolute(&record.path),
            record,
            text,
            doc,
        })
    }

    /// Stage a status rewrite against the current (possibly pending) text
    fn write_status(&self, changes: &mut Changeset, id: &ArtifactId, status: Status) -> Result<()> {
        let record = self.index.resolve(id)?;
        let path = self.scanner.absolute(&record.path);
        let (text, doc) = changes.parse(&path, &self.parser)?;
        let artifact = doc.find(id).ok_or_else(|| StoreError::not_found(id.to_string()))?;
        changes.write(&path, mutator::set_status(&text, artifact, status));
        Ok(())
    }

    /// Stage the status note next to `referrer` in `target`'s "Referenced by" list
    fn write_annotation(
        &self,
        changes: &mut Changeset,
        target: &ArtifactId,
        referrer: &ArtifactId,
        status: Status,
    ) -> Result<()> {
        let record = self.index.resolve(target)?;
        let path = self.scanner.absolute(&record.path);
        let (text, doc) = changes.parse(&path, &self.parser)?;
        let artifact = doc.find(target).ok_or_else(|| StoreError::not_found(target.to_string()))?;
        if let Some(updated) = mutator::annotate_referrer(&text, artifact, referrer, status) {
            changes.write(&path, updated);
        }
        Ok(())
    }

    /// Highest ordinal ever issued for a type
    fn next_base(&self, artifact_type: ArtifactType, ledger: &AllocationLedger) -> u32 {
        self.index.max_ordinal(artifact_type).max(ledger.mark(artifact_type))
    }

    fn record_allocation(
        &self,
        changes: &mut Changeset,
        ledger: &mut AllocationLedger,
        allocation: &Allocation,
    ) -> Result<()> {
        for m in &allocation.mapping {
            ledger.record(&m.confirmed);
        }
        changes.write(&self.config.ledger_path(), ledger.to_toml()?);
        Ok(())
    }

    /// Add each newly confirmed artifact to the "Referenced by" list of what it tests or implements
    fn register_back_references(
        &self,
        changes: &mut Changeset,
        allocation: &Allocation,
        new_documents: &[PathBuf],
    ) -> Result<()> {
        for mapping in &allocation.mapping {
            let confirmed = mapping.confirmed;
            let mut targets = Vec::new();
            for path in new_documents {
                let (_, doc) = changes.parse(path, &self.parser)?;
                if let Some(artifact) = doc.find(&confirmed) {
                    targets.extend(artifact.field_ids(labels::TESTS));
                    targets.extend(artifact.field_ids(labels::IMPLEMENTS));
                    break;
                }
            }

            for target in targets.into_iter().filter(|t| !t.is_provisional() && *t != confirmed) {
                let Some(path) = self.document_of(changes, &target, new_documents)? else {
                    warn!(id = %confirmed, target = %target, "back-reference target not found");
                    continue;
                };
                let (text, doc) = changes.parse(&path, &self.parser)?;
                let Some(artifact) = doc.find(&target) else {
                    continue;
                };
                if let Some(updated) = mutator::add_referenced_by(&text, artifact, &confirmed) {
                    changes.write(&path, updated);
                }
            }
        }
        Ok(())
    }

    /// Absolute path of the document holding `id`, looking at pending documents first
    fn document_of(&self, changes: &Changeset, id: &ArtifactId, pending: &[PathBuf]) -> Result<Option<PathBuf>> {
        for path in pending {
            let (_, doc) = changes.parse(path, &self.parser)?;
            if doc.find(id).is_some() {
                return Ok(Some(path.clone()));
            }
        }
        Ok(match self.index.lookup(id) {
            Lookup::Unique(record) => Some(self.scanner.absolute(&record.path)),
            Lookup::Missing | Lookup::Ambiguous(_) => None,
        })
    }

    /// Locate a draft: absolute, under the staging area, or relative to the working directory
    fn draft_location(&self, draft: &Path) -> Result<PathBuf> {
        let candidates = [
            Some(draft.to_path_buf()).filter(|p| p.is_absolute()),
            Some(self.config.provisional_root().join(draft)),
            Some(draft.to_path_buf()),
        ];
        candidates
            .into_iter()
            .flatten()
            .find(|p| p.is_file())
            .ok_or_else(|| StoreError::DraftNotFound(draft.to_path_buf()))
    }

    /// Build the section text for `add_artifact`
    fn provisional_block(&self, new_type: ArtifactType, content: &str, used: &[ArtifactId]) -> Result<(ArtifactId, String)> {
        let content = content.trim_start_matches(['\n', '\r']);
        let first_line = content.lines().next().unwrap_or("");
        let context = format!("new {}", new_type);

        let Some(heading) = self.parser.grammar().heading(first_line) else {
            let number = used.iter().map(|id| id.number()).max().unwrap_or(0) + 1;
            let id = ArtifactId::provisional(new_type, number);
            let title = first_line.trim();
            if title.is_empty() {
                return Err(StoreError::structural(&context, "content needs a heading or a title line"));
            }
            let rest = content.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
            return Ok((id, format!("### {}: {}\n{}", id, title, rest)));
        };

        let found = self
            .parser
            .grammar()
            .artifact_heading(heading.text)
            .ok_or_else(|| StoreError::structural(&context, "content must open with an artifact heading"))?;
        if found.id.artifact_type != new_type {
            return Err(StoreError::structural(
                &context,
                format!("heading declares {} instead of a {}", found.id, new_type),
            ));
        }
        if !found.id.is_provisional() {
            return Err(StoreError::structural(
                &context,
                format!("{} is confirmed; new artifacts carry a provisional id", found.id),
            ));
        }
        if let Some(clash) = used.iter().find(|u| u.number() == found.id.number()) {
            return Err(StoreError::DuplicateProvisionalOrdinal {
                ordinal: found.id.number(),
                ids: vec![clash.to_string(), found.id.to_string()],
            });
        }
        Ok((found.id, content.to_string()))
    }

    /// Commit and re-index every tracked document the changeset touched
    fn commit(&mut self, changes: Changeset) -> Result<()> {
        for path in changes.commit()? {
            if let Some(relative) = self.scanner.tracked_relative(&path) {
                self.index.revalidate(&relative, &self.scanner, &self.parser)?;
            }
        }
        Ok(())
    }
}
