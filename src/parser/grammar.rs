//! Token patterns for the document conventions
//!
//! Each line of a document is classified by exactly one of these patterns;
//! the state machine in the parent module decides what the token means in
//! context.

use regex::{Captures, Regex};

use crate::artifact_type::ArtifactType;
use crate::id::{ArtifactId, Ordinal};

/// Compiled line patterns
pub struct Grammar {
    /// `#`..`######` followed by heading text
    heading: Regex,
    /// Heading text of the form `TYPE-<id>: <title>`
    artifact_heading: Regex,
    /// Heading text that starts like an artifact id but is not one
    id_like: Regex,
    /// `` `Status`: VALUE ``
    status: Regex,
    /// `*Label*: value`
    field: Regex,
    /// `[ ] 7.2 description` with an optional list bullet
    step: Regex,
    /// ``` or ~~~ fence opener/closer
    fence: Regex,
    /// Trailing `<!-- artifact-store vX.Y.Z -->` marker
    footer: Regex,
    /// Any id token inside free text
    id_token: Regex,
    /// Provisional tokens: `TYPE-PROVISIONAL<n>` or the bare step form `PROVISIONAL<n>.<m>`
    provisional_token: Regex,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

/// A classified heading line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingToken<'t> {
    pub level: usize,
    pub text: &'t str,
}

/// Artifact heading parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHeading<'t> {
    pub id: ArtifactId,
    pub title: &'t str,
}

/// A `*Label*: value` line, with the value's byte range inside the line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldToken<'t> {
    pub label: &'t str,
    pub value: &'t str,
    pub value_start: usize,
    pub value_end: usize,
}

/// A checklist line; `marker` is the byte offset of the box character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepToken<'t> {
    pub done: bool,
    pub ordinal: Ordinal,
    pub number: u32,
    pub description: &'t str,
    pub marker: usize,
}

/// One provisional occurrence found by [`Grammar::provisional_tokens`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionalToken {
    /// `UACC-PROVISIONAL3`
    Typed { id: ArtifactId, start: usize, end: usize },
    /// `PROVISIONAL3` in a `PROVISIONAL3.2` step ordinal; covers the id part only
    Bare { number: u32, start: usize, end: usize },
}

impl ProvisionalToken {
    pub fn number(&self) -> u32 {
        match self {
            ProvisionalToken::Typed { id, .. } => id.number(),
            ProvisionalToken::Bare { number, .. } => *number,
        }
    }

    pub fn range(&self) -> (usize, usize) {
        match self {
            ProvisionalToken::Typed { start, end, .. } | ProvisionalToken::Bare { start, end, .. } => {
                (*start, *end)
            }
        }
    }
}

impl Grammar {
    pub fn new() -> Self {
        let types = ArtifactType::pattern_alternation();
        let ordinal = r"(?:[0-9]+|PROVISIONAL[0-9]+)";
        Self {
            heading: Regex::new(r"^(#{1,6})[ \t]+(.*?)[ \t]*$").unwrap(),
            artifact_heading: Regex::new(&format!(r"^({types})-({ordinal}):[ \t]*(.*)$")).unwrap(),
            id_like: Regex::new(&format!(r"^(?:{types})-{ordinal}\b")).unwrap(),
            status: Regex::new(r"^[ \t]*`Status`:[ \t]*(\S+)[ \t]*$").unwrap(),
            field: Regex::new(r"^[ \t]*\*([^*]+)\*:[ \t]*(.*?)[ \t]*$").unwrap(),
            step: Regex::new(&format!(
                r"^[ \t]*(?:[-*+][ \t]+)?\[([ xX])\][ \t]+({ordinal})\.([0-9]+)(?:[ \t]+(.*?))?[ \t]*$"
            ))
            .unwrap(),
            fence: Regex::new(r"^[ \t]*(```|~~~)").unwrap(),
            footer: Regex::new(r"^<!-- artifact-store v[^ ]+ -->[ \t]*$").unwrap(),
            id_token: Regex::new(&format!(r"\b({types})-({ordinal})\b")).unwrap(),
            provisional_token: Regex::new(&format!(
                r"\b({types})-PROVISIONAL([0-9]+)\b|\bPROVISIONAL([0-9]+)\.[0-9]+\b"
            ))
            .unwrap(),
        }
    }

    pub fn heading<'t>(&self, line: &'t str) -> Option<HeadingToken<'t>> {
        let caps = self.heading.captures(line)?;
        Some(HeadingToken {
            level: caps.get(1)?.as_str().len(),
            text: caps.get(2)?.as_str(),
        })
    }

    /// Parse heading text as an artifact heading
    pub fn artifact_heading<'t>(&self, text: &'t str) -> Option<ArtifactHeading<'t>> {
        let caps = self.artifact_heading.captures(text)?;
        let id = id_from_captures(&caps)?;
        Some(ArtifactHeading {
            id,
            title: caps.get(3).map(|m| m.as_str().trim()).unwrap_or(""),
        })
    }

    /// Heading text that begins with an id token but failed the full pattern
    pub fn looks_like_artifact(&self, text: &str) -> bool {
        self.id_like.is_match(text)
    }

    /// Returns the status value and its byte range within the line
    pub fn status<'t>(&self, line: &'t str) -> Option<(&'t str, usize, usize)> {
        let caps = self.status.captures(line)?;
        let value = caps.get(1)?;
        Some((value.as_str(), value.start(), value.end()))
    }

    pub fn field<'t>(&self, line: &'t str) -> Option<FieldToken<'t>> {
        let caps = self.field.captures(line)?;
        let value = caps.get(2)?;
        Some(FieldToken {
            label: caps.get(1)?.as_str().trim(),
            value: value.as_str(),
            value_start: value.start(),
            value_end: value.end(),
        })
    }

    pub fn step<'t>(&self, line: &'t str) -> Option<StepToken<'t>> {
        let caps = self.step.captures(line)?;
        let mark = caps.get(1)?;
        Some(StepToken {
            done: mark.as_str() != " ",
            ordinal: Ordinal::parse(caps.get(2)?.as_str())?,
            number: caps.get(3)?.as_str().parse().ok()?,
            description: caps.get(4).map(|m| m.as_str()).unwrap_or(""),
            marker: mark.start(),
        })
    }

    pub fn is_fence(&self, line: &str) -> bool {
        self.fence.is_match(line)
    }

    pub fn is_footer(&self, line: &str) -> bool {
        self.footer.is_match(line)
    }

    /// Every well-formed id token in `text`, in order of appearance
    pub fn id_tokens(&self, text: &str) -> Vec<ArtifactId> {
        self.id_token
            .captures_iter(text)
            .filter_map(|caps| id_from_captures(&caps))
            .collect()
    }

    /// Every provisional occurrence in `text`, in order of appearance
    pub fn provisional_tokens(&self, text: &str) -> Vec<ProvisionalToken> {
        let mut tokens = Vec::new();
        for caps in self.provisional_token.captures_iter(text) {
            if let (Some(prefix), Some(number)) = (caps.get(1), caps.get(2)) {
                let Ok(artifact_type) = prefix.as_str().parse::<ArtifactType>() else {
                    continue;
                };
                let Ok(n) = number.as_str().parse() else {
                    continue;
                };
                tokens.push(ProvisionalToken::Typed {
                    id: ArtifactId::provisional(artifact_type, n),
                    start: prefix.start(),
                    end: number.end(),
                });
            } else if let Some(number) = caps.get(3) {
                let Ok(n) = number.as_str().parse() else {
                    continue;
                };
                // "PROVISIONAL" precedes the digits
                let start = number.start() - crate::id::PROVISIONAL_MARKER.len();
                tokens.push(ProvisionalToken::Bare {
                    number: n,
                    start,
                    end: number.end(),
                });
            }
        }
        tokens
    }
}

fn id_from_captures(caps: &Captures<'_>) -> Option<ArtifactId> {
    let artifact_type = caps.get(1)?.as_str().parse().ok()?;
    let ordinal = Ordinal::parse(caps.get(2)?.as_str())?;
    if ordinal == Ordinal::Confirmed(0) {
        return None;
    }
    Some(ArtifactId {
        artifact_type,
        ordinal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_levels() {
        let g = Grammar::new();
        let h = g.heading("###  REQ-5: Login works  ").unwrap();
        assert_eq!(h.level, 3);
        assert_eq!(h.text, "REQ-5: Login works");
        assert!(g.heading("####### too deep").is_none());
        assert!(g.heading("#nospace").is_none());
    }

    #[test]
    fn test_artifact_heading() {
        let g = Grammar::new();
        let a = g.artifact_heading("TASKPRD-2: Rollout").unwrap();
        assert_eq!(a.id.to_string(), "TASKPRD-2");
        assert_eq!(a.title, "Rollout");

        let p = g.artifact_heading("SACC-PROVISIONAL4: Smoke").unwrap();
        assert!(p.id.is_provisional());

        assert!(g.artifact_heading("REQ-5 Login").is_none());
        assert!(g.looks_like_artifact("REQ-5 Login"));
        assert!(!g.looks_like_artifact("Requirements"));
    }

    #[test]
    fn test_status_line() {
        let g = Grammar::new();
        let line = "`Status`: ACTIVE";
        let (value, start, end) = g.status(line).unwrap();
        assert_eq!(value, "ACTIVE");
        assert_eq!(&line[start..end], "ACTIVE");
        assert!(g.status("Status: ACTIVE").is_none());
    }

    #[test]
    fn test_field_line() {
        let g = Grammar::new();
        let line = "*Tests*: REQ-5, REQ-7";
        let f = g.field(line).unwrap();
        assert_eq!(f.label, "Tests");
        assert_eq!(f.value, "REQ-5, REQ-7");
        assert_eq!(&line[f.value_start..f.value_end], "REQ-5, REQ-7");
    }

    #[test]
    fn test_step_line() {
        let g = Grammar::new();
        let line = "- [ ] 7.2 Write the handler";
        let s = g.step(line).unwrap();
        assert!(!s.done);
        assert_eq!(s.ordinal, Ordinal::Confirmed(7));
        assert_eq!(s.number, 2);
        assert_eq!(s.description, "Write the handler");
        assert_eq!(&line[s.marker..s.marker + 1], " ");

        let done = g.step("[x] PROVISIONAL3.1 Draft").unwrap();
        assert!(done.done);
        assert_eq!(done.ordinal, Ordinal::Provisional(3));
    }

    #[test]
    fn test_id_tokens_skip_partial_words() {
        let g = Grammar::new();
        let ids = g.id_tokens("REQ-5, TASKPRD-1 and XREQ-9 plus REQ-0");
        let names: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
        assert_eq!(names, vec!["REQ-5", "TASKPRD-1"]);
    }

    #[test]
    fn test_provisional_tokens() {
        let g = Grammar::new();
        let text = "### TASK-PROVISIONAL2: x\n[ ] PROVISIONAL2.1 do\n*Implements*: REQ-PROVISIONAL1";
        let tokens = g.provisional_tokens(text);
        assert_eq!(tokens.len(), 3);
        assert!(matches!(tokens[1], ProvisionalToken::Bare { number: 2, .. }));
        let (start, end) = tokens[1].range();
        assert_eq!(&text[start..end], "PROVISIONAL2");
        let (start, end) = tokens[2].range();
        assert_eq!(&text[start..end], "REQ-PROVISIONAL1");
    }
}
