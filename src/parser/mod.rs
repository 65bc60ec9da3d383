//! Artifact Parser
//!
//! Line-oriented state machine over the [`Grammar`] tokens. Produces every
//! artifact found in a document together with byte-exact spans for the
//! pieces the mutators rewrite (heading, status value, fields, step markers).
//!
//! Parsing never fails: damaged sections are reported as [`ParseWarning`]s
//! and left out of the result so unrelated artifacts stay usable.

pub mod grammar;

pub use grammar::{Grammar, ProvisionalToken};

use serde::Serialize;
use tracing::debug;

use crate::artifact_type::{ArtifactType, Placement, Status};
use crate::id::{ArtifactId, Ordinal};

/// Half-open byte range within a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn slice<'t>(&self, text: &'t str) -> &'t str {
        &text[self.start..self.end]
    }
}

/// A `*Label*: value` field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedField {
    pub label: String,
    pub value: String,
    /// Ids mentioned in the value, in order
    pub ids: Vec<ArtifactId>,
    #[serde(skip)]
    pub line: Span,
    #[serde(skip)]
    pub value_span: Span,
}

/// One checklist item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedStep {
    /// Dotted sub-id, e.g. `7.2`
    pub ordinal: String,
    pub number: u32,
    pub done: bool,
    pub description: String,
    #[serde(skip)]
    pub line: Span,
    /// Byte offset of the box character (` ` or `x`)
    #[serde(skip)]
    pub marker: usize,
}

/// A heading line outside fenced code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingLine {
    pub level: usize,
    pub text: String,
    pub span: Span,
}

/// Non-fatal parse problem with a best-effort location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// 1-based line number
    pub line: usize,
    pub span: Span,
    pub message: String,
    /// Whether the section was left out of the parse result
    pub excluded: bool,
}

/// An artifact located in a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedArtifact {
    pub id: ArtifactId,
    pub title: String,
    pub status: Status,
    /// Heading depth (1 for file-level, 3 for embedded)
    pub level: usize,
    /// The file-level artifact whose document holds this one
    pub container: Option<ArtifactId>,
    pub span: Span,
    pub heading: Span,
    /// The whole status line, absent when a file-level artifact omits it
    pub status_line: Option<Span>,
    #[serde(skip)]
    pub status_value: Option<Span>,
    pub fields: Vec<ParsedField>,
    pub steps: Vec<ParsedStep>,
}

impl ParsedArtifact {
    pub fn artifact_type(&self) -> ArtifactType {
        self.id.artifact_type
    }

    /// First field with this label (case-insensitive)
    pub fn field(&self, label: &str) -> Option<&ParsedField> {
        self.fields.iter().find(|f| f.label.eq_ignore_ascii_case(label))
    }

    /// Ids listed in a field, empty when the field is absent
    pub fn field_ids(&self, label: &str) -> Vec<ArtifactId> {
        self.field(label).map(|f| f.ids.clone()).unwrap_or_default()
    }

    /// `*Parent*` when declared, else the containing file-level artifact
    pub fn parent(&self) -> Option<ArtifactId> {
        self.field_ids(labels::PARENT)
            .into_iter()
            .next()
            .or(self.container)
    }

    /// Outgoing references declared by this artifact
    pub fn references(&self) -> Vec<(RefKind, ArtifactId)> {
        let mut refs = Vec::new();
        for (label, kind) in [
            (labels::IMPLEMENTS, RefKind::Implements),
            (labels::TESTS, RefKind::Tests),
            (labels::PARENT, RefKind::Parent),
        ] {
            for id in self.field_ids(label) {
                if id != self.id {
                    refs.push((kind, id));
                }
            }
        }
        refs
    }

    /// Ids listed in this artifact's own "Referenced by" field
    pub fn referenced_by(&self) -> Vec<ArtifactId> {
        self.field_ids(labels::REFERENCED_BY)
    }

    pub fn steps_numbered(&self, number: u32) -> impl Iterator<Item = &ParsedStep> {
        self.steps.iter().filter(move |s| s.number == number)
    }
}

/// Field labels the store interprets
pub mod labels {
    pub const IMPLEMENTS: &str = "Implements";
    pub const TESTS: &str = "Tests";
    pub const PARENT: &str = "Parent";
    pub const REFERENCED_BY: &str = "Referenced by";
}

/// Kind of a reference edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Implements,
    Tests,
    Parent,
    ReferencedBy,
}

/// Everything found in one document
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub artifacts: Vec<ParsedArtifact>,
    pub warnings: Vec<ParseWarning>,
    pub headings: Vec<HeadingLine>,
    pub footer: Option<Span>,
}

impl ParsedDocument {
    pub fn find(&self, id: &ArtifactId) -> Option<&ParsedArtifact> {
        self.artifacts.iter().find(|a| a.id == *id)
    }

    /// The artifact owning the whole document, if any
    pub fn file_level(&self) -> Option<&ParsedArtifact> {
        self.artifacts.iter().find(|a| a.level == 1)
    }

    pub fn confirmed(&self) -> impl Iterator<Item = &ParsedArtifact> {
        self.artifacts.iter().filter(|a| !a.id.is_provisional())
    }

    pub fn provisional(&self) -> impl Iterator<Item = &ParsedArtifact> {
        self.artifacts.iter().filter(|a| a.id.is_provisional())
    }
}

/// Which section currently owns content lines
#[derive(Debug, Clone, Copy)]
enum Owner {
    /// No artifact (preamble, plain `##` section, malformed section)
    None,
    /// The document's file-level artifact
    File(usize),
    /// An embedded artifact section
    Embedded(usize),
}

/// A heading awaiting its status line
struct Pending {
    artifact: ParsedArtifact,
    heading_line: usize,
}

/// The artifact parser
pub struct ArtifactParser {
    grammar: Grammar,
}

impl Default for ArtifactParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactParser {
    pub fn new() -> Self {
        Self {
            grammar: Grammar::new(),
        }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Parse a whole document
    pub fn parse(&self, text: &str) -> ParsedDocument {
        let mut doc = ParsedDocument::default();
        let mut owner = Owner::None;
        let mut pending: Option<Pending> = None;
        let mut file_level: Option<usize> = None;
        let mut in_fence = false;
        let mut offset = 0;

        for (line_no, raw) in text.split_inclusive('\n').enumerate() {
            let start = offset;
            offset += raw.len();
            let line = raw.trim_end_matches(['\n', '\r']);
            let line_span = Span::new(start, offset);
            let line_number = line_no + 1;

            if self.grammar.is_fence(line) {
                in_fence = !in_fence;
                self.settle_pending(&mut doc, &mut pending, &mut owner, &mut file_level);
                continue;
            }
            if in_fence {
                continue;
            }

            // A heading awaits its status line: only the first non-blank line counts
            if pending.is_some() && !line.trim().is_empty() && self.grammar.heading(line).is_none() {
                if let Some((value, vs, ve)) = self.grammar.status(line) {
                    if let Some(mut p) = pending.take() {
                        match self.accept_status(&mut p.artifact, value) {
                            Ok(()) => {
                                p.artifact.status_line = Some(line_span);
                                p.artifact.status_value = Some(Span::new(start + vs, start + ve));
                                owner = push_artifact(&mut doc, &mut file_level, p.artifact);
                            }
                            Err(message) => {
                                push_warning(&mut doc, line_number, p.artifact.heading, message, true);
                                owner = Owner::None;
                            }
                        }
                    }
                    continue;
                }
                self.settle_pending(&mut doc, &mut pending, &mut owner, &mut file_level);
            }

            if self.grammar.is_footer(line) {
                self.settle_pending(&mut doc, &mut pending, &mut owner, &mut file_level);
                close_embedded(&mut doc, &mut owner, file_level, start);
                doc.footer = Some(line_span);
                continue;
            }

            if let Some(heading) = self.grammar.heading(line) {
                self.settle_pending(&mut doc, &mut pending, &mut owner, &mut file_level);
                doc.headings.push(HeadingLine {
                    level: heading.level,
                    text: heading.text.to_string(),
                    span: line_span,
                });
                if heading.level <= 3 {
                    close_embedded(&mut doc, &mut owner, file_level, start);
                }
                if let Some(found) = self.grammar.artifact_heading(heading.text) {
                    let placement = found.id.artifact_type.spec().placement;
                    if heading.level != placement.heading_level() {
                        if heading.level <= 3 {
                            push_warning(&mut doc,
                                line_number,
                                line_span,
                                format!(
                                    "{} heading at level {}, expected level {}",
                                    found.id,
                                    heading.level,
                                    placement.heading_level()
                                ),
                                true,
                            );
                            owner = Owner::None;
                        }
                        continue;
                    }
                    if placement == Placement::FileLevel {
                        if let Some(existing) = file_level {
                            let first = doc.artifacts[existing].id;
                            push_warning(&mut doc,
                                line_number,
                                line_span,
                                format!("second file-level heading {} ignored; document belongs to {}", found.id, first),
                                true,
                            );
                            owner = Owner::File(existing);
                            continue;
                        }
                    }
                    let container = match placement {
                        Placement::FileLevel => None,
                        Placement::Embedded => file_level.map(|i| doc.artifacts[i].id),
                    };
                    let span_end = match placement {
                        Placement::FileLevel => text.len(),
                        Placement::Embedded => offset,
                    };
                    pending = Some(Pending {
                        artifact: ParsedArtifact {
                            id: found.id,
                            title: found.title.to_string(),
                            status: found.id.artifact_type.spec().initial,
                            level: heading.level,
                            container,
                            span: Span::new(if placement == Placement::FileLevel { 0 } else { start }, span_end),
                            heading: line_span,
                            status_line: None,
                            status_value: None,
                            fields: Vec::new(),
                            steps: Vec::new(),
                        },
                        heading_line: line_number,
                    });
                    owner = Owner::None;
                } else if heading.level <= 3 && self.grammar.looks_like_artifact(heading.text) {
                    push_warning(&mut doc,
                        line_number,
                        line_span,
                        format!("heading '{}' looks like an artifact but is missing ':' after the id", heading.text),
                        true,
                    );
                    owner = Owner::None;
                } else if heading.level <= 3 {
                    owner = file_level.map(Owner::File).unwrap_or(Owner::None);
                }
                continue;
            }

            self.content_line(&mut doc, owner, line, line_span, line_number);
        }

        let end = text.len();
        self.settle_pending(&mut doc, &mut pending, &mut owner, &mut file_level);
        close_embedded(&mut doc, &mut owner, file_level, end);

        debug!(
            artifacts = doc.artifacts.len(),
            warnings = doc.warnings.len(),
            "parsed document"
        );
        doc
    }

    fn accept_status(&self, artifact: &mut ParsedArtifact, value: &str) -> Result<(), String> {
        let status: Status = value
            .parse()
            .map_err(|_| format!("{} has unknown status '{}'", artifact.id, value))?;
        if !artifact.artifact_type().spec().is_legal(status) {
            return Err(format!(
                "{} has status {} which is not legal for {}",
                artifact.id,
                status,
                artifact.artifact_type()
            ));
        }
        artifact.status = status;
        Ok(())
    }

    /// Resolve a heading whose status line never arrived
    fn settle_pending(
        &self,
        doc: &mut ParsedDocument,
        pending: &mut Option<Pending>,
        owner: &mut Owner,
        file_level: &mut Option<usize>,
    ) {
        let Some(p) = pending.take() else {
            return;
        };
        match p.artifact.artifact_type().spec().placement {
            Placement::FileLevel => {
                let id = p.artifact.id;
                let initial = p.artifact.status;
                push_warning(doc,
                    p.heading_line,
                    p.artifact.heading,
                    format!("{} has no status line; assuming {}", id, initial),
                    false,
                );
                *owner = push_artifact(doc, file_level, p.artifact);
            }
            Placement::Embedded => {
                push_warning(doc,
                    p.heading_line,
                    p.artifact.heading,
                    format!("{} heading is not followed by a status line", p.artifact.id),
                    true,
                );
                *owner = Owner::None;
            }
        }
    }

    fn content_line(&self, doc: &mut ParsedDocument, owner: Owner, line: &str, line_span: Span, line_number: usize) {
        let idx = match owner {
            Owner::File(i) | Owner::Embedded(i) => i,
            Owner::None => return,
        };

        if let Some(field) = self.grammar.field(line) {
            let ids = self.grammar.id_tokens(field.value);
            doc.artifacts[idx].fields.push(ParsedField {
                label: field.label.to_string(),
                value: field.value.to_string(),
                ids,
                line: line_span,
                value_span: Span::new(line_span.start + field.value_start, line_span.start + field.value_end),
            });
            return;
        }

        if let Some(step) = self.grammar.step(line) {
            let artifact = &doc.artifacts[idx];
            if !artifact.artifact_type().has_steps() {
                return;
            }
            if step.ordinal != artifact.id.ordinal {
                let message = format!(
                    "step {}.{} does not match ordinal of {}",
                    step.ordinal, step.number, artifact.id
                );
                push_warning(doc, line_number, line_span, message, false);
                return;
            }
            doc.artifacts[idx].steps.push(ParsedStep {
                ordinal: format!("{}.{}", step.ordinal, step.number),
                number: step.number,
                done: step.done,
                description: step.description.to_string(),
                line: line_span,
                marker: line_span.start + step.marker,
            });
        }
    }
}

fn push_artifact(doc: &mut ParsedDocument, file_level: &mut Option<usize>, artifact: ParsedArtifact) -> Owner {
    let is_file = artifact.level == 1;
    doc.artifacts.push(artifact);
    let idx = doc.artifacts.len() - 1;
    if is_file {
        *file_level = Some(idx);
        Owner::File(idx)
    } else {
        Owner::Embedded(idx)
    }
}

/// End the open embedded section at `at` and hand ownership back to the file-level artifact
fn close_embedded(doc: &mut ParsedDocument, owner: &mut Owner, file_level: Option<usize>, at: usize) {
    if let Owner::Embedded(i) = *owner {
        doc.artifacts[i].span.end = at;
    }
    *owner = match file_level {
        Some(i) => Owner::File(i),
        None => Owner::None,
    };
}

fn push_warning(doc: &mut ParsedDocument, line: usize, span: Span, message: String, excluded: bool) {
    tracing::warn!(line, "{}", message);
    doc.warnings.push(ParseWarning {
        line,
        span,
        message,
        excluded,
    });
}

/// Dotted step reference as written by callers: `7.2` or just `2`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRef {
    pub ordinal: Option<Ordinal>,
    pub number: u32,
}

impl StepRef {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text.rsplit_once('.') {
            Some((ordinal, number)) => Some(Self {
                ordinal: Some(Ordinal::parse(&ordinal.to_ascii_uppercase())?),
                number: number.parse().ok()?,
            }),
            None => Some(Self {
                ordinal: None,
                number: text.parse().ok()?,
            }),
        }
    }
}
