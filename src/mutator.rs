//! Section Mutator
//!
//! Structure-preserving text edits. Every function here is pure: it takes
//! a document's text plus parse results and returns the new text, touching
//! only the bytes of the targeted span. Writing the result is the job of a
//! [`Changeset`](crate::changeset::Changeset).

use crate::artifact_type::{ArtifactType, Placement, Status};
use crate::error::{Result, StoreError};
use crate::id::ArtifactId;
use crate::parser::{labels, ArtifactParser, ParsedArtifact, ParsedDocument, Span};

/// Replace exactly the bytes within `span`
pub fn splice(text: &str, span: Span, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len() - span.len() + replacement.len());
    out.push_str(&text[..span.start]);
    out.push_str(replacement);
    out.push_str(&text[span.end..]);
    out
}

/// Make sure a replacement does not run into the text that follows its span
pub fn fit_replacement(text: &str, span: Span, new_text: &str) -> String {
    if span.end < text.len() && !new_text.ends_with('\n') {
        format!("{}\n", new_text)
    } else {
        new_text.to_string()
    }
}

/// Insert `line` (without newline) as a new line right after `after`
fn insert_line_after(text: &str, after: Span, line: &str) -> String {
    let at = after.end;
    let insertion = if text[..at].ends_with('\n') || at == 0 {
        format!("{}\n", line)
    } else {
        format!("\n{}", line)
    };
    splice(text, Span::new(at, at), &insertion)
}

/// Status line as written under a heading
pub fn status_line(status: Status) -> String {
    format!("`Status`: {}", status)
}

/// Rewrite (or insert) the status line of `artifact`
pub fn set_status(text: &str, artifact: &ParsedArtifact, status: Status) -> String {
    match artifact.status_value {
        Some(span) => splice(text, span, status.as_str()),
        None => insert_line_after(text, artifact.heading, &status_line(status)),
    }
}

/// Add `referrer` to the "Referenced by" field of `artifact`; `None` when already listed
pub fn add_referenced_by(text: &str, artifact: &ParsedArtifact, referrer: &ArtifactId) -> Option<String> {
    if artifact.referenced_by().contains(referrer) {
        return None;
    }
    let updated = match artifact.field(labels::REFERENCED_BY) {
        Some(field) if field.value.trim().is_empty() => splice(text, field.value_span, &referrer.to_string()),
        Some(field) => {
            let end = field.value_span.end;
            splice(text, Span::new(end, end), &format!(", {}", referrer))
        }
        None => {
            let after = artifact.status_line.unwrap_or(artifact.heading);
            insert_line_after(text, after, &format!("*{}*: {}", labels::REFERENCED_BY, referrer))
        }
    };
    Some(updated)
}

/// Set the ` (STATUS)` note after `referrer` in the "Referenced by" field
///
/// `None` when the referrer is not listed or its note is already current.
pub fn annotate_referrer(text: &str, artifact: &ParsedArtifact, referrer: &ArtifactId, status: Status) -> Option<String> {
    let field = artifact.field(labels::REFERENCED_BY)?;
    let value = field.value_span.slice(text);
    let token = referrer.to_string();
    let after = find_token(value, &token)? + token.len();
    let current = status_note_len(&value[after..]);
    let note = format!(" ({})", status);
    if value[after..after + current] == note {
        return None;
    }
    let start = field.value_span.start + after;
    Some(splice(text, Span::new(start, start + current), &note))
}

/// Offset of `token` in `value` as a whole id (so `TASK-1` never matches inside `TASK-10`)
fn find_token(value: &str, token: &str) -> Option<usize> {
    let part_of_id = |c: char| c.is_ascii_alphanumeric() || c == '-';
    value.match_indices(token).map(|(i, _)| i).find(|&i| {
        !value[..i].chars().next_back().is_some_and(part_of_id)
            && !value[i + token.len()..].chars().next().is_some_and(part_of_id)
    })
}

/// Byte length of a leading ` (STATUS)` note, 0 when there is none
fn status_note_len(rest: &str) -> usize {
    let trimmed = rest.trim_start_matches(' ');
    let Some(inner) = trimmed.strip_prefix('(') else {
        return 0;
    };
    let Some(close) = inner.find(')') else {
        return 0;
    };
    if inner[..close].parse::<Status>().is_err() {
        return 0;
    }
    rest.len() - trimmed.len() + close + 2
}

/// Marker appended to finalized documents
pub fn version_footer() -> String {
    format!("<!-- artifact-store v{} -->", env!("CARGO_PKG_VERSION"))
}

/// Append the version footer unless the document already carries one
pub fn with_footer(text: &str, doc: &ParsedDocument) -> String {
    if doc.footer.is_some() {
        return text.to_string();
    }
    let mut out = text.trim_end_matches('\n').to_string();
    out.push_str("\n\n");
    out.push_str(&version_footer());
    out.push('\n');
    out
}

/// Insert an embedded section under the parent's embedding section for `child`
///
/// The `## <Section>` heading is created (before the footer, or at the end)
/// when the document does not have one yet.
pub fn insert_embedded(text: &str, doc: &ParsedDocument, child: ArtifactType, block: &str) -> String {
    let section = child.spec().section.unwrap_or("## Sections");
    let title = section.trim_start_matches('#').trim();
    let body = format!("{}\n", block.trim_end());
    let tail = doc.footer.map(|f| f.start).unwrap_or(text.len());

    let existing = doc
        .headings
        .iter()
        .position(|h| h.level == 2 && h.text.eq_ignore_ascii_case(title));

    let (at, block) = match existing {
        Some(i) => {
            let next = doc.headings[i + 1..]
                .iter()
                .find(|h| h.level <= 2)
                .map(|h| h.span.start)
                .unwrap_or(text.len());
            // The footer only bounds the section when it comes after the section heading
            let at = if tail >= doc.headings[i].span.end { next.min(tail) } else { next };
            (at, body)
        }
        None => (tail, format!("{}\n\n{}", section, body)),
    };

    let before = &text[..at];
    let after = &text[at..];
    let pad = if before.is_empty() || before.ends_with("\n\n") {
        ""
    } else if before.ends_with('\n') {
        "\n"
    } else {
        "\n\n"
    };
    let gap = if after.is_empty() { "" } else { "\n" };
    format!("{}{}{}{}{}", before, pad, block, gap, after)
}

/// Fill in a `Status` line with the type's initial status when the block has none
pub fn ensure_status_line(block: &str, parser: &ArtifactParser) -> String {
    let doc = parser.parse(block);
    let Some(first) = doc.headings.first() else {
        return block.to_string();
    };
    if doc.artifacts.iter().any(|a| a.heading == first.span) {
        return block.to_string();
    }
    let Some(heading) = parser.grammar().artifact_heading(&first.text) else {
        return block.to_string();
    };
    let initial = heading.id.artifact_type.spec().initial;
    // The heading is not recognized yet because its status line is missing
    insert_line_after(block, first.span, &status_line(initial))
}

/// Check that `new_text` is a structurally complete section for `id`
///
/// The text must open with the artifact's own heading at its placement
/// level, carry a status line (embedded types), keep every required labeled
/// field, and must not open another section at the same or a shallower level.
pub fn validate_section(parser: &ArtifactParser, id: &ArtifactId, new_text: &str) -> Result<ParsedDocument> {
    let context = id.to_string();
    let doc = parser.parse(new_text);
    let placement = id.artifact_type.spec().placement;

    let first = doc
        .headings
        .first()
        .filter(|h| h.span.start == 0)
        .ok_or_else(|| StoreError::structural(&context, "text must start with the artifact heading"))?;
    if first.level != placement.heading_level() {
        return Err(StoreError::structural(
            &context,
            format!("heading must be level {}", placement.heading_level()),
        ));
    }

    let artifact = doc.artifacts.iter().find(|a| a.heading == first.span).ok_or_else(|| {
        let reason = doc
            .warnings
            .first()
            .map(|w| w.message.clone())
            .unwrap_or_else(|| "heading is not a valid artifact heading".to_string());
        StoreError::structural(&context, reason)
    })?;
    if artifact.id != *id {
        return Err(StoreError::structural(
            &context,
            format!("heading names {} instead of {}", artifact.id, id),
        ));
    }

    match placement {
        Placement::Embedded => {
            if let Some(extra) = doc.headings.iter().skip(1).find(|h| h.level <= 3) {
                return Err(StoreError::structural(
                    &context,
                    format!("text opens another section '{}'", extra.text),
                ));
            }
            if artifact.status_line.is_none() {
                return Err(StoreError::structural(&context, "missing status line"));
            }
        }
        Placement::FileLevel => {
            if doc.headings.iter().skip(1).any(|h| h.level == 1) {
                return Err(StoreError::structural(&context, "text contains a second top-level heading"));
            }
        }
    }

    for label in id.artifact_type.spec().required_fields {
        if artifact.field(label).is_none() {
            return Err(StoreError::structural(
                &context,
                format!("missing required field '*{}*'", label),
            ));
        }
    }

    if let Some(warning) = doc.warnings.iter().find(|w| w.excluded) {
        return Err(StoreError::structural(
            &context,
            format!("line {}: {}", warning.line, warning.message),
        ));
    }

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> ParsedDocument {
        ArtifactParser::new().parse(text)
    }

    fn id(text: &str) -> ArtifactId {
        text.parse().unwrap()
    }

    #[test]
    fn test_splice_leaves_outside_bytes() {
        let text = "aaa[bbb]ccc";
        assert_eq!(splice(text, Span::new(4, 7), "X"), "aaa[X]ccc");
    }

    #[test]
    fn test_set_status_rewrites_value_only() {
        let text = "### REQ-1: A\n`Status`: NEW\nbody\n";
        let doc = parse(text);
        let out = set_status(text, &doc.artifacts[0], Status::Active);
        assert_eq!(out, "### REQ-1: A\n`Status`: ACTIVE\nbody\n");
    }

    #[test]
    fn test_set_status_inserts_missing_line() {
        let text = "# PRD-1: A\n\nbody\n";
        let doc = parse(text);
        let out = set_status(text, &doc.artifacts[0], Status::Active);
        assert_eq!(out, "# PRD-1: A\n`Status`: ACTIVE\n\nbody\n");
    }

    #[test]
    fn test_add_referenced_by() {
        let text = "### REQ-1: A\n`Status`: NEW\n\nbody\n";
        let doc = parse(text);
        let once = add_referenced_by(text, &doc.artifacts[0], &id("SACC-2")).unwrap();
        assert_eq!(once, "### REQ-1: A\n`Status`: NEW\n*Referenced by*: SACC-2\n\nbody\n");

        let doc = parse(&once);
        assert!(add_referenced_by(&once, &doc.artifacts[0], &id("SACC-2")).is_none());
        let twice = add_referenced_by(&once, &doc.artifacts[0], &id("TASK-4")).unwrap();
        assert!(twice.contains("*Referenced by*: SACC-2, TASK-4\n"));
    }

    #[test]
    fn test_annotate_referrer() {
        let text = "### REQ-1: A\n`Status`: NEW\n*Referenced by*: TASK-10, TASK-1\n";
        let doc = parse(text);
        let noted = annotate_referrer(text, &doc.artifacts[0], &id("TASK-1"), Status::Active).unwrap();
        assert_eq!(noted, "### REQ-1: A\n`Status`: NEW\n*Referenced by*: TASK-10, TASK-1 (ACTIVE)\n");

        let doc = parse(&noted);
        assert_eq!(doc.artifacts[0].referenced_by(), vec![id("TASK-10"), id("TASK-1")]);
        assert!(annotate_referrer(&noted, &doc.artifacts[0], &id("TASK-1"), Status::Active).is_none());
        let moved = annotate_referrer(&noted, &doc.artifacts[0], &id("TASK-1"), Status::Completed).unwrap();
        assert!(moved.ends_with("*Referenced by*: TASK-10, TASK-1 (COMPLETED)\n"));

        assert!(annotate_referrer(&noted, &doc.artifacts[0], &id("TASK-2"), Status::Active).is_none());
    }

    #[test]
    fn test_insert_into_existing_section() {
        let text = "# PRD-1: A\n`Status`: NEW\n\n## Requirements\n\n### REQ-1: A\n`Status`: NEW\n\n## Decisions\n";
        let out = insert_embedded(text, &parse(text), ArtifactType::Req, "### REQ-PROVISIONAL1: B\n`Status`: NEW");
        assert_eq!(
            out,
            "# PRD-1: A\n`Status`: NEW\n\n## Requirements\n\n### REQ-1: A\n`Status`: NEW\n\n### REQ-PROVISIONAL1: B\n`Status`: NEW\n\n## Decisions\n"
        );
    }

    #[test]
    fn test_insert_creates_section_before_footer() {
        let text = "# PRD-1: A\n`Status`: NEW\n\n<!-- artifact-store v0.1.0 -->\n";
        let out = insert_embedded(text, &parse(text), ArtifactType::Sacc, "### SACC-PROVISIONAL1: B\n`Status`: NEW\n");
        assert_eq!(
            out,
            "# PRD-1: A\n`Status`: NEW\n\n## Acceptance Tests\n\n### SACC-PROVISIONAL1: B\n`Status`: NEW\n\n<!-- artifact-store v0.1.0 -->\n"
        );
        // Both new sections parse back
        assert!(parse(&out).find(&id("SACC-PROVISIONAL1")).is_some());
    }

    #[test]
    fn test_ensure_status_line() {
        let parser = ArtifactParser::new();
        let out = ensure_status_line("### REQ-PROVISIONAL2: New\n\nbody\n", &parser);
        assert_eq!(out, "### REQ-PROVISIONAL2: New\n`Status`: NEW\n\nbody\n");
        let kept = ensure_status_line("### REQ-PROVISIONAL2: New\n`Status`: NEW\n", &parser);
        assert_eq!(kept, "### REQ-PROVISIONAL2: New\n`Status`: NEW\n");
    }

    #[test]
    fn test_validate_section_rules() {
        let parser = ArtifactParser::new();
        let sacc = id("SACC-2");
        assert!(validate_section(&parser, &sacc, "### SACC-2: A\n`Status`: NEW\n*Tests*: REQ-1\n").is_ok());

        let missing_field = validate_section(&parser, &sacc, "### SACC-2: A\n`Status`: NEW\n").unwrap_err();
        assert_eq!(missing_field.kind(), "StructuralViolation");

        let no_status = validate_section(&parser, &sacc, "### SACC-2: A\n*Tests*: REQ-1\n").unwrap_err();
        assert_eq!(no_status.kind(), "StructuralViolation");

        let wrong_id = validate_section(&parser, &sacc, "### SACC-3: A\n`Status`: NEW\n*Tests*: REQ-1\n");
        assert!(wrong_id.is_err());

        let extra = validate_section(
            &parser,
            &sacc,
            "### SACC-2: A\n`Status`: NEW\n*Tests*: REQ-1\n\n## Sneaky\n",
        );
        assert!(extra.is_err());
    }

    #[test]
    fn test_fit_replacement_adds_newline_only_when_text_follows() {
        let text = "### REQ-1: A\n`Status`: NEW\n### REQ-2: B\n";
        assert_eq!(fit_replacement(text, Span::new(0, 26), "x"), "x\n");
        assert_eq!(fit_replacement(text, Span::new(0, text.len()), "x"), "x");
    }
}
