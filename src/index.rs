//! Artifact Index
//!
//! In-memory, rebuildable cache of every confirmed artifact in the tracked
//! document root: id -> record, discovery order for queries, and the
//! reference graph for reverse lookups.
//!
//! Each indexed document keeps the checksum of the text it was parsed from.
//! Callers revalidate a document against disk before trusting its spans;
//! a mismatch re-parses just that document.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::artifact_type::{ArtifactType, Status};
use crate::checksum::Checksum;
use crate::error::{Result, StoreError};
use crate::graph::ReferenceGraph;
use crate::id::ArtifactId;
use crate::parser::{ArtifactParser, ParseWarning, ParsedArtifact, ParsedField, ParsedStep, RefKind, Span};
use crate::scanner::DocumentScanner;

/// Indexed view of one confirmed artifact
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRecord {
    pub id: ArtifactId,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub title: String,
    pub status: Status,
    pub parent: Option<ArtifactId>,
    /// Document path relative to the document root
    pub path: PathBuf,
    pub span: Span,
    pub fields: Vec<ParsedField>,
    pub steps: Vec<ParsedStep>,
}

impl ArtifactRecord {
    pub fn from_parsed(path: &Path, artifact: &ParsedArtifact) -> Self {
        Self {
            id: artifact.id,
            artifact_type: artifact.artifact_type(),
            title: artifact.title.clone(),
            status: artifact.status,
            parent: artifact.parent(),
            path: path.to_path_buf(),
            span: artifact.span,
            fields: artifact.fields.clone(),
            steps: artifact.steps.clone(),
        }
    }

    /// Ids listed in a labeled field, empty when absent
    pub fn field_ids(&self, label: &str) -> Vec<ArtifactId> {
        self.fields
            .iter()
            .find(|f| f.label.eq_ignore_ascii_case(label))
            .map(|f| f.ids.clone())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            id: self.id,
            artifact_type: self.artifact_type,
            status: self.status,
            parent: self.parent,
            title: self.title.clone(),
            path: self.path.clone(),
        }
    }
}

/// Row returned by type searches
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSummary {
    pub id: ArtifactId,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub status: Status,
    pub parent: Option<ArtifactId>,
    pub title: String,
    pub path: PathBuf,
}

/// A parse warning tagged with its document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentWarning {
    pub path: PathBuf,
    #[serde(flatten)]
    pub warning: ParseWarning,
}

#[derive(Debug, Clone)]
struct DocumentEntry {
    checksum: Checksum,
    /// Confirmed ids in order of appearance
    ids: Vec<ArtifactId>,
    /// Confirmed ids named by any artifact heading, including excluded sections
    headed: Vec<ArtifactId>,
}

/// Result of a raw id lookup
#[derive(Debug)]
pub enum Lookup<'a> {
    Missing,
    Unique(&'a ArtifactRecord),
    Ambiguous(Vec<&'a ArtifactRecord>),
}

/// The artifact index
#[derive(Debug, Default)]
pub struct Index {
    documents: BTreeMap<PathBuf, DocumentEntry>,
    /// More than one record for an id means the id is ambiguous
    entries: HashMap<ArtifactId, Vec<ArtifactRecord>>,
    graph: ReferenceGraph,
    warnings: BTreeMap<PathBuf, Vec<ParseWarning>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from scratch by scanning and parsing every tracked document
    pub fn build(scanner: &DocumentScanner, parser: &ArtifactParser) -> Result<Self> {
        let mut index = Self::new();
        for doc in scanner.scan()? {
            index.index_document(&doc.path, &doc.text, parser);
        }
        debug!(
            documents = index.documents.len(),
            artifacts = index.entries.len(),
            edges = index.graph.edge_count(),
            "index built"
        );
        Ok(index)
    }

    /// Replace everything known about one document with a fresh parse of `text`
    pub fn index_document(&mut self, path: &Path, text: &str, parser: &ArtifactParser) {
        self.remove_document(path);

        let parsed = parser.parse(text);
        let mut ids = Vec::new();
        for artifact in parsed.confirmed() {
            let record = ArtifactRecord::from_parsed(path, artifact);
            for (kind, target) in artifact.references() {
                self.graph.add_edge(artifact.id, target, kind, path);
            }
            for referrer in artifact.referenced_by() {
                if referrer != artifact.id {
                    self.graph.add_edge(referrer, artifact.id, RefKind::ReferencedBy, path);
                }
            }
            let records = self.entries.entry(artifact.id).or_default();
            if !records.is_empty() {
                tracing::warn!(id = %artifact.id, path = %path.display(), "duplicate confirmed id");
            }
            records.push(record);
            ids.push(artifact.id);
        }

        if !parsed.warnings.is_empty() {
            self.warnings.insert(path.to_path_buf(), parsed.warnings);
        }
        let headed = parsed
            .headings
            .iter()
            .filter(|h| h.level <= 3)
            .filter_map(|h| {
                let grammar = parser.grammar();
                match grammar.artifact_heading(&h.text) {
                    Some(found) => Some(found.id),
                    None if grammar.looks_like_artifact(&h.text) => grammar.id_tokens(&h.text).into_iter().next(),
                    None => None,
                }
            })
            .filter(|id| !id.is_provisional())
            .collect();
        self.documents.insert(
            path.to_path_buf(),
            DocumentEntry {
                checksum: Checksum::of_text(text),
                ids,
                headed,
            },
        );
    }

    pub fn remove_document(&mut self, path: &Path) {
        let Some(entry) = self.documents.remove(path) else {
            return;
        };
        for id in entry.ids {
            if let Some(records) = self.entries.get_mut(&id) {
                records.retain(|r| r.path != path);
                if records.is_empty() {
                    self.entries.remove(&id);
                }
            }
        }
        self.graph.remove_declared_in(path);
        self.warnings.remove(path);
    }

    /// Re-parse one document if its text changed on disk; drop it if it is gone
    pub fn revalidate(&mut self, path: &Path, scanner: &DocumentScanner, parser: &ArtifactParser) -> Result<bool> {
        match scanner.read(path)? {
            Some(text) => {
                let fresh = self
                    .documents
                    .get(path)
                    .map(|d| d.checksum.matches(&text))
                    .unwrap_or(false);
                if fresh {
                    return Ok(false);
                }
                debug!(path = %path.display(), "document changed on disk, re-parsing");
                self.index_document(path, &text, parser);
                Ok(true)
            }
            None => {
                debug!(path = %path.display(), "document removed, dropping from index");
                self.remove_document(path);
                Ok(true)
            }
        }
    }

    /// Bring the whole index in line with disk, re-parsing only changed documents
    pub fn refresh(&mut self, scanner: &DocumentScanner, parser: &ArtifactParser) -> Result<()> {
        let mut seen = BTreeSet::new();
        for doc in scanner.scan()? {
            let fresh = self
                .documents
                .get(&doc.path)
                .map(|d| d.checksum.matches(&doc.text))
                .unwrap_or(false);
            if !fresh {
                debug!(path = %doc.path.display(), "re-parsing changed document");
                self.index_document(&doc.path, &doc.text, parser);
            }
            seen.insert(doc.path);
        }
        let gone: Vec<PathBuf> = self
            .documents
            .keys()
            .filter(|p| !seen.contains(*p))
            .cloned()
            .collect();
        for path in gone {
            self.remove_document(&path);
        }
        Ok(())
    }

    pub fn lookup(&self, id: &ArtifactId) -> Lookup<'_> {
        match self.entries.get(id).map(|r| r.as_slice()) {
            None | Some([]) => Lookup::Missing,
            Some([record]) => Lookup::Unique(record),
            Some(records) => Lookup::Ambiguous(records.iter().collect()),
        }
    }

    /// Resolve against the cached state only
    pub fn resolve(&self, id: &ArtifactId) -> Result<&ArtifactRecord> {
        match self.lookup(id) {
            Lookup::Unique(record) => Ok(record),
            Lookup::Ambiguous(records) => Err(StoreError::AmbiguousIdentifier {
                id: id.to_string(),
                locations: records.iter().map(|r| r.path.display().to_string()).collect(),
            }),
            Lookup::Missing => Err(StoreError::NotFound {
                id: id.to_string(),
                suggestions: self.suggestions(&id.to_string()),
            }),
        }
    }

    /// Records matching the filters in discovery order (path, then position)
    pub fn query(&self, types: &[ArtifactType], status: Option<Status>, parent: Option<ArtifactId>) -> Vec<&ArtifactRecord> {
        let mut results = Vec::new();
        for (path, doc) in &self.documents {
            for id in &doc.ids {
                if !types.is_empty() && !types.contains(&id.artifact_type) {
                    continue;
                }
                let Some(record) = self
                    .entries
                    .get(id)
                    .and_then(|records| records.iter().find(|r| &r.path == path))
                else {
                    continue;
                };
                if status.map(|s| record.status != s).unwrap_or(false) {
                    continue;
                }
                if parent.is_some() && record.parent != parent {
                    continue;
                }
                results.push(record);
            }
        }
        results
    }

    /// Ids referencing `id`
    pub fn reverse_references(&self, id: &ArtifactId) -> BTreeSet<ArtifactId> {
        self.graph.referrers(id)
    }

    /// Highest confirmed ordinal of a type in any tracked heading, 0 if none
    ///
    /// Headings of sections left out of the index still count, so fixing a
    /// malformed section never collides with a later allocation.
    pub fn max_ordinal(&self, artifact_type: ArtifactType) -> u32 {
        self.documents
            .values()
            .flat_map(|d| d.headed.iter())
            .filter(|id| id.artifact_type == artifact_type)
            .map(|id| id.number())
            .max()
            .unwrap_or(0)
    }

    /// Closest indexed ids for a "did you mean" hint
    pub fn suggestions(&self, query: &str) -> Vec<String> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<(i64, String)> = self
            .entries
            .keys()
            .filter_map(|id| {
                let candidate = id.to_string();
                let forward = matcher.fuzzy_match(&candidate, query);
                let backward = matcher.fuzzy_match(query, &candidate);
                forward.max(backward).map(|score| (score, candidate))
            })
            .collect();

        // Sort by score descending, then by id for stable output
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.into_iter().take(3).map(|(_, id)| id).collect()
    }

    pub fn warnings(&self) -> Vec<DocumentWarning> {
        self.warnings
            .iter()
            .flat_map(|(path, warnings)| {
                warnings.iter().map(move |w| DocumentWarning {
                    path: path.clone(),
                    warning: w.clone(),
                })
            })
            .collect()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
