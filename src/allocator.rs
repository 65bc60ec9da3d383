//! ID Allocator
//!
//! Confirms provisional ids. Discovery, validation and rewriting all work
//! from one list of provisional tokens so the rewrite is a single pass over
//! the text: every occurrence is replaced or none is.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::artifact_type::ArtifactType;
use crate::error::{Result, StoreError};
use crate::id::ArtifactId;
use crate::parser::{ArtifactParser, ProvisionalToken};

/// One confirmed provisional id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdMapping {
    pub provisional: ArtifactId,
    pub confirmed: ArtifactId,
}

/// Result of confirming the provisional ids of a text
#[derive(Debug, Clone)]
pub struct Allocation {
    /// In order of first appearance
    pub mapping: Vec<IdMapping>,
    /// The fully rewritten text
    pub text: String,
}

impl Allocation {
    pub fn confirmed_for(&self, provisional: &ArtifactId) -> Option<ArtifactId> {
        self.mapping
            .iter()
            .find(|m| m.provisional == *provisional)
            .map(|m| m.confirmed)
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

/// Provisional ids discovered in a text, validated for consistency
#[derive(Debug, Clone)]
pub struct ProvisionalScan {
    /// Distinct ids in order of first appearance
    pub order: Vec<ArtifactId>,
    tokens: Vec<ProvisionalToken>,
    by_number: HashMap<u32, ArtifactId>,
}

impl ProvisionalScan {
    /// Find and validate the provisional ids of `text` whose type is in `allowed` (empty = all)
    ///
    /// Fails with `DuplicateProvisionalOrdinal` when one number is used by
    /// two types or one id is defined twice, and with
    /// `UnresolvedProvisionalId` when an id is mentioned without a heading.
    pub fn discover(parser: &ArtifactParser, text: &str, allowed: &[ArtifactType]) -> Result<Self> {
        let permitted = |t: ArtifactType| allowed.is_empty() || allowed.contains(&t);

        let doc = parser.parse(text);
        let mut defined: BTreeMap<ArtifactId, usize> = BTreeMap::new();
        for artifact in doc.provisional() {
            if permitted(artifact.artifact_type()) {
                *defined.entry(artifact.id).or_default() += 1;
            }
        }
        if let Some((id, _)) = defined.iter().find(|(_, count)| **count > 1) {
            return Err(StoreError::DuplicateProvisionalOrdinal {
                ordinal: id.number(),
                ids: vec![id.to_string(), id.to_string()],
            });
        }

        let all_tokens = parser.grammar().provisional_tokens(text);

        // One number, one type
        let mut types_by_number: BTreeMap<u32, BTreeSet<ArtifactId>> = BTreeMap::new();
        for token in &all_tokens {
            if let ProvisionalToken::Typed { id, .. } = token {
                if permitted(id.artifact_type) {
                    types_by_number.entry(id.number()).or_default().insert(*id);
                }
            }
        }
        if let Some((number, ids)) = types_by_number.iter().find(|(_, ids)| ids.len() > 1) {
            return Err(StoreError::DuplicateProvisionalOrdinal {
                ordinal: *number,
                ids: ids.iter().map(|i| i.to_string()).collect(),
            });
        }
        let by_number: HashMap<u32, ArtifactId> = defined.keys().map(|id| (id.number(), *id)).collect();

        let mut order = Vec::new();
        let mut tokens = Vec::new();
        for token in all_tokens {
            let id = match &token {
                ProvisionalToken::Typed { id, .. } => {
                    if !permitted(id.artifact_type) {
                        continue;
                    }
                    if !defined.contains_key(id) {
                        return Err(StoreError::UnresolvedProvisionalId { id: id.to_string() });
                    }
                    *id
                }
                ProvisionalToken::Bare { number, .. } => match by_number.get(number) {
                    Some(id) => *id,
                    // A bare ordinal of a type outside `allowed` stays as written
                    None if !allowed.is_empty() => continue,
                    None => {
                        return Err(StoreError::UnresolvedProvisionalId {
                            id: format!("{}{}", crate::id::PROVISIONAL_MARKER, number),
                        })
                    }
                },
            };
            if !order.contains(&id) {
                order.push(id);
            }
            tokens.push(token);
        }

        Ok(Self {
            order,
            tokens,
            by_number,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Assign ordinals above `base(type)` in order of first appearance and rewrite `text`
    pub fn confirm(&self, text: &str, base: impl Fn(ArtifactType) -> u32) -> Allocation {
        let mut next: HashMap<ArtifactType, u32> = HashMap::new();
        let mapping: Vec<IdMapping> = self
            .order
            .iter()
            .map(|provisional| {
                let counter = next
                    .entry(provisional.artifact_type)
                    .or_insert_with(|| base(provisional.artifact_type));
                *counter += 1;
                IdMapping {
                    provisional: *provisional,
                    confirmed: ArtifactId::confirmed(provisional.artifact_type, *counter),
                }
            })
            .collect();

        let lookup: HashMap<ArtifactId, ArtifactId> = mapping.iter().map(|m| (m.provisional, m.confirmed)).collect();
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for token in &self.tokens {
            let (start, end) = token.range();
            let replacement = match token {
                ProvisionalToken::Typed { id, .. } => lookup.get(id).map(|c| c.to_string()),
                ProvisionalToken::Bare { number, .. } => self
                    .by_number
                    .get(number)
                    .and_then(|id| lookup.get(id))
                    .map(|c| c.number().to_string()),
            };
            if let Some(replacement) = replacement {
                out.push_str(&text[cursor..start]);
                out.push_str(&replacement);
                cursor = end;
            }
        }
        out.push_str(&text[cursor..]);

        Allocation { mapping, text: out }
    }
}

/// Rewrite provisional tokens in a short string (file stems) using an existing mapping
pub fn rewrite_with(parser: &ArtifactParser, text: &str, allocation: &Allocation) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for token in parser.grammar().provisional_tokens(text) {
        if let ProvisionalToken::Typed { id, start, end } = token {
            if let Some(confirmed) = allocation.confirmed_for(&id) {
                out.push_str(&text[cursor..start]);
                out.push_str(&confirmed.to_string());
                cursor = end;
            }
        }
    }
    out.push_str(&text[cursor..]);
    out
}

/// Normalize a caller-supplied file name suffix: lower-case, `[a-z0-9]` runs joined by `_`
pub fn normalize_suffix(suffix: &str, max_len: usize) -> Result<Option<String>> {
    let mut out = String::new();
    let mut gap = false;
    for c in suffix.trim().chars().flat_map(|c| c.to_lowercase()) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if gap && !out.is_empty() {
                out.push('_');
            }
            out.push(c);
            gap = false;
        } else {
            gap = true;
        }
    }
    if out.is_empty() {
        return Ok(None);
    }
    if out.len() > max_len {
        return Err(StoreError::structural(
            "name suffix",
            format!("'{}' is longer than {} characters", out, max_len),
        ));
    }
    Ok(Some(out))
}
