//! End-to-end tests for the artifact store
//!
//! Each test copies the fixture corpus into a fresh temporary directory and
//! drives the store through its public operations.

use std::fs;
use std::path::{Path, PathBuf};

use artifact_store::{ArtifactStore, ArtifactType, Status, StoreConfig, StoreError};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const PRD: &str = include_str!("fixtures/PRD-1_checkout.md");
const TASKS: &str = include_str!("fixtures/TASKPRD-1_rollout.md");
const TASK_DRAFT: &str = include_str!("fixtures/TASKPRD-PROVISIONAL1.md");
const EMBEDDED_DRAFT: &str = include_str!("fixtures/saved_carts.md");

struct Corpus {
    _dir: TempDir,
    docs: PathBuf,
    drafts: PathBuf,
}

impl Corpus {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        let drafts = dir.path().join("drafts");
        fs::create_dir_all(&docs).unwrap();
        fs::create_dir_all(&drafts).unwrap();
        fs::write(docs.join("PRD-1_checkout.md"), PRD).unwrap();
        fs::write(docs.join("TASKPRD-1_rollout.md"), TASKS).unwrap();
        Self { _dir: dir, docs, drafts }
    }

    fn open(&self) -> ArtifactStore {
        ArtifactStore::open(StoreConfig::with_roots(&self.docs, &self.drafts)).unwrap()
    }

    fn read(&self, name: &str) -> String {
        fs::read_to_string(self.docs.join(name)).unwrap()
    }

    fn draft(&self, name: &str, text: &str) -> PathBuf {
        let path = self.drafts.join(name);
        fs::write(&path, text).unwrap();
        path
    }
}

fn status_of(store: &mut ArtifactStore, id: &str) -> Status {
    store.search_by_id(id, false).unwrap().artifact.status
}

fn ids<T: ToString>(items: impl IntoIterator<Item = T>) -> Vec<String> {
    items.into_iter().map(|i| i.to_string()).collect()
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn test_search_by_type_discovery_order() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    let all = store.search_by_type(&[], None, None).unwrap();
    assert_eq!(
        ids(all.iter().map(|s| s.id)),
        vec!["PRD-1", "REQ-5", "REQ-7", "REQ-9", "SACC-2", "TASKPRD-1", "TASK-3", "TASK-4"]
    );

    let reqs = store.search_by_type(&[ArtifactType::Req], None, Some("prd-1")).unwrap();
    assert_eq!(ids(reqs.iter().map(|s| s.id)), vec!["REQ-5", "REQ-7", "REQ-9"]);

    let active = store
        .search_by_type(&[ArtifactType::Task], Some(Status::Active), None)
        .unwrap();
    assert_eq!(ids(active.iter().map(|s| s.id)), vec!["TASK-4"]);
}

#[test]
fn test_search_by_id_with_references() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    let hit = store.search_by_id("REQ-5", true).unwrap();
    assert_eq!(hit.artifact.title, "Cart totals");
    assert_eq!(hit.artifact.parent.map(|p| p.to_string()), Some("PRD-1".to_string()));
    let mut referrers = ids(hit.referenced_by.unwrap());
    referrers.sort();
    assert_eq!(referrers, vec!["SACC-2", "TASK-4"]);

    assert!(store.search_by_id("REQ-5", false).unwrap().referenced_by.is_none());
}

#[test]
fn test_unknown_id_is_not_found() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    match store.search_by_id("REQ-99", false).unwrap_err() {
        StoreError::NotFound { id, .. } => assert_eq!(id, "REQ-99"),
        other => panic!("Expected NotFound, got {:?}", other),
    }
    assert_eq!(store.get_artifact("ZZZ-1").unwrap_err().kind(), "InvalidIdentifier");
}

#[test]
fn test_duplicate_id_is_ambiguous() {
    let corpus = Corpus::new();
    fs::write(
        corpus.docs.join("PRD-2_copy.md"),
        "# PRD-2: Copy\n`Status`: NEW\n\n### REQ-5: Duplicate\n`Status`: NEW\n",
    )
    .unwrap();
    let mut store = corpus.open();

    match store.get_artifact("REQ-5").unwrap_err() {
        StoreError::AmbiguousIdentifier { locations, .. } => assert_eq!(locations.len(), 2),
        other => panic!("Expected AmbiguousIdentifier, got {:?}", other),
    }
}

#[test]
fn test_copy_added_after_open_is_ambiguous() {
    let corpus = Corpus::new();
    let mut store = corpus.open();
    assert!(store.get_artifact("REQ-5").is_ok());

    fs::write(
        corpus.docs.join("PRD-2_copy.md"),
        "# PRD-2: Copy\n`Status`: NEW\n\n### REQ-5: Duplicate\n`Status`: NEW\n",
    )
    .unwrap();

    assert_eq!(store.get_artifact("REQ-5").unwrap_err().kind(), "AmbiguousIdentifier");
    assert_eq!(
        store
            .update_content("REQ-5", "### REQ-5: Cart totals\n`Status`: ACTIVE\n\nChanged.\n\n")
            .unwrap_err()
            .kind(),
        "AmbiguousIdentifier"
    );
    assert_eq!(store.add_reference("REQ-5", "TASK-3").unwrap_err().kind(), "AmbiguousIdentifier");
    assert_eq!(corpus.read("PRD-1_checkout.md"), PRD);
}

#[test]
fn test_external_edits_are_picked_up() {
    let corpus = Corpus::new();
    let mut store = corpus.open();
    assert_eq!(status_of(&mut store, "REQ-9"), Status::New);

    let edited = corpus
        .read("PRD-1_checkout.md")
        .replace("### REQ-9: Gift cards\n`Status`: NEW", "### REQ-9: Gift cards\n`Status`: ACTIVE");
    fs::write(corpus.docs.join("PRD-1_checkout.md"), edited).unwrap();
    fs::write(
        corpus.docs.join("ASD-1_storage.md"),
        "# ASD-1: Storage\n`Status`: NEW\n\n## Decisions\n\n### ADR-2: Use sqlite\n`Status`: NEW\n",
    )
    .unwrap();

    assert_eq!(status_of(&mut store, "REQ-9"), Status::Active);
    assert_eq!(store.search_by_id("ADR-2", false).unwrap().artifact.path, Path::new("ASD-1_storage.md"));
}

// =============================================================================
// Content
// =============================================================================

#[test]
fn test_get_then_update_is_byte_identical() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    for id in ["REQ-5", "SACC-2", "PRD-1"] {
        let text = store.get_artifact(id).unwrap();
        store.update_content(id, &text).unwrap();
        assert_eq!(corpus.read("PRD-1_checkout.md"), PRD);
    }
}

#[test]
fn test_get_returns_exact_span() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    assert_eq!(
        store.get_artifact("REQ-7").unwrap(),
        "### REQ-7: Payment capture\n`Status`: ACTIVE\n\nCards are captured once the order ships.\n\n"
    );
    assert_eq!(store.get_artifact("TASKPRD-1").unwrap(), TASKS);
}

#[test]
fn test_update_content_touches_only_the_span() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    let old = store.get_artifact("REQ-5").unwrap();
    let new = "### REQ-5: Cart totals\n`Status`: ACTIVE\n\nTotals include tax, shipping and discounts.\n\n";
    store.update_content("REQ-5", new).unwrap();

    assert_eq!(corpus.read("PRD-1_checkout.md"), PRD.replace(&old, new));
    assert_eq!(store.get_artifact("REQ-5").unwrap(), new);
}

#[test]
fn test_update_content_rejects_broken_structure() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    let cases = [
        // status line dropped
        "### REQ-5: Cart totals\n\nTotals include tax.\n\n",
        // wrong heading level
        "## REQ-5: Cart totals\n`Status`: ACTIVE\n\n",
        // another artifact's heading
        "### REQ-6: Cart totals\n`Status`: ACTIVE\n\n",
        // status changes go through update_status
        "### REQ-5: Cart totals\n`Status`: COMPLETED\n\n",
        // swallows a sibling section
        "### REQ-5: Cart totals\n`Status`: ACTIVE\n\n### REQ-6: Sneaky\n`Status`: NEW\n\n",
    ];
    for text in cases {
        let err = store.update_content("REQ-5", text).unwrap_err();
        assert_eq!(err.kind(), "StructuralViolation", "accepted {:?}", text);
    }

    // SACC requires its Tests field
    let err = store
        .update_content("SACC-2", "### SACC-2: Checkout smoke test\n`Status`: TESTING\n\n- [ ] 2.1 Add items\n")
        .unwrap_err();
    assert_eq!(err.kind(), "StructuralViolation");

    assert_eq!(corpus.read("PRD-1_checkout.md"), PRD);
}

#[test]
fn test_update_content_cannot_drop_embedded_artifacts() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    let trimmed = TASKS.split("### TASK-4").next().unwrap().to_string();
    let err = store.update_content("TASKPRD-1", &trimmed).unwrap_err();
    assert_eq!(err.kind(), "StructuralViolation");
    assert_eq!(corpus.read("TASKPRD-1_rollout.md"), TASKS);
}

#[test]
fn test_update_content_cannot_change_embedded_status() {
    let corpus = Corpus::new();
    let mut store = corpus.open();
    assert_eq!(store.update_status("TASK-3", Status::Completed).unwrap_err().kind(), "InvalidTransition");

    let edited = TASKS.replace(
        "### TASK-3: Wire payment provider\n`Status`: NEW",
        "### TASK-3: Wire payment provider\n`Status`: COMPLETED",
    );
    let err = store.update_content("TASKPRD-1", &edited).unwrap_err();
    assert_eq!(err.kind(), "StructuralViolation");
    assert_eq!(corpus.read("TASKPRD-1_rollout.md"), TASKS);
    assert_eq!(status_of(&mut store, "TASK-3"), Status::New);
}

// =============================================================================
// Status transitions
// =============================================================================

#[test]
fn test_passing_system_test_completes_requirements() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    let outcome = store.update_status("SACC-2", Status::Passed).unwrap();
    assert!(outcome.applied);
    assert_eq!(outcome.from, Status::Testing);
    assert_eq!(ids(outcome.cascades), vec!["REQ-5", "REQ-7"]);
    assert!(outcome.skipped.is_empty());

    assert_eq!(status_of(&mut store, "SACC-2"), Status::Passed);
    assert_eq!(status_of(&mut store, "REQ-5"), Status::Completed);
    assert_eq!(status_of(&mut store, "REQ-7"), Status::Completed);
    assert_eq!(status_of(&mut store, "REQ-9"), Status::New);

    let expected = PRD
        .replace("### REQ-5: Cart totals\n`Status`: ACTIVE", "### REQ-5: Cart totals\n`Status`: COMPLETED")
        .replace("### REQ-7: Payment capture\n`Status`: ACTIVE", "### REQ-7: Payment capture\n`Status`: COMPLETED")
        .replace("`Status`: TESTING", "`Status`: PASSED");
    assert_eq!(corpus.read("PRD-1_checkout.md"), expected);
}

#[test]
fn test_cascade_skips_completed_requirements() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    store.update_status("REQ-7", Status::Completed).unwrap();
    let outcome = store.update_status("SACC-2", Status::Passed).unwrap();
    assert_eq!(ids(outcome.cascades), vec!["REQ-5"]);
    assert!(outcome.skipped.is_empty());
}

#[test]
fn test_task_cannot_skip_active() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    match store.update_status("TASK-3", Status::Completed).unwrap_err() {
        StoreError::InvalidTransition { from, to, allowed, .. } => {
            assert_eq!(from, "NEW");
            assert_eq!(to, "COMPLETED");
            assert_eq!(allowed, vec![Status::Active, Status::Cancelled]);
        }
        other => panic!("Expected InvalidTransition, got {:?}", other),
    }
    assert_eq!(corpus.read("TASKPRD-1_rollout.md"), TASKS);
    assert_eq!(status_of(&mut store, "TASK-3"), Status::New);
}

#[test]
fn test_cancelling_never_cascades() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    let outcome = store.update_status("SACC-2", Status::Cancelled).unwrap();
    assert!(outcome.cascades.is_empty());
    assert_eq!(status_of(&mut store, "REQ-5"), Status::Active);
}

#[test]
fn test_completing_last_task_reports_eligibility() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    store.update_status("TASK-3", Status::Active).unwrap();
    let first = store.update_status("TASK-3", Status::Completed).unwrap();
    assert_eq!(first.completion_eligible, None);
    assert!(!store.completion_eligible("TASKPRD-1").unwrap());

    let last = store.update_status("TASK-4", Status::Completed).unwrap();
    assert_eq!(last.completion_eligible.map(|p| p.to_string()), Some("TASKPRD-1".to_string()));
    assert!(store.completion_eligible("TASKPRD-1").unwrap());

    // Eligibility never completes the parent by itself
    assert_eq!(status_of(&mut store, "TASKPRD-1"), Status::Active);
    store.update_status("TASKPRD-1", Status::Completed).unwrap();
    assert!(!store.completion_eligible("TASKPRD-1").unwrap());
}

#[test]
fn test_status_changes_refresh_back_reference_notes() {
    let corpus = Corpus::new();
    let mut store = corpus.open();
    store.add_reference("REQ-7", "TASK-3").unwrap();
    store.add_reference("REQ-5", "SACC-2").unwrap();

    let outcome = store.update_status("TASK-3", Status::Active).unwrap();
    assert_eq!(ids(outcome.annotated), vec!["REQ-7"]);
    assert!(corpus
        .read("PRD-1_checkout.md")
        .contains("### REQ-7: Payment capture\n`Status`: ACTIVE\n*Referenced by*: TASK-3 (ACTIVE)\n"));

    store.update_status("TASK-3", Status::Completed).unwrap();
    assert!(corpus
        .read("PRD-1_checkout.md")
        .contains("*Referenced by*: TASK-3 (COMPLETED)\n"));

    // The note lands in the same write as the cascade
    let outcome = store.update_status("SACC-2", Status::Passed).unwrap();
    assert_eq!(ids(outcome.cascades), vec!["REQ-5", "REQ-7"]);
    assert_eq!(ids(outcome.annotated), vec!["REQ-5"]);
    let text = corpus.read("PRD-1_checkout.md");
    assert!(text.contains("### REQ-5: Cart totals\n`Status`: COMPLETED\n*Referenced by*: SACC-2 (PASSED)\n"));
    assert!(text.contains("### REQ-7: Payment capture\n`Status`: COMPLETED\n*Referenced by*: TASK-3 (COMPLETED)\n"));

    // Notes do not change what the list means
    assert!(!store.add_reference("REQ-7", "TASK-3").unwrap().added);
    let mut referrers = ids(store.search_by_id("REQ-7", true).unwrap().referenced_by.unwrap());
    referrers.sort();
    assert_eq!(referrers, vec!["SACC-2", "TASK-3"]);
}

// =============================================================================
// Steps and references
// =============================================================================

#[test]
fn test_mark_step_done_is_idempotent() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    let first = store.mark_step_done("TASK-3", "3.2").unwrap();
    assert!(first.changed);
    let once = corpus.read("TASKPRD-1_rollout.md");
    assert_eq!(once, TASKS.replace("- [ ] 3.2 Store credentials", "- [x] 3.2 Store credentials"));

    let second = store.mark_step_done("TASK-3", "3.2").unwrap();
    assert!(!second.changed);
    assert_eq!(corpus.read("TASKPRD-1_rollout.md"), once);
}

#[test]
fn test_step_errors() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    assert_eq!(store.mark_step_done("TASK-3", "3.7").unwrap_err().kind(), "StepNotFound");
    assert_eq!(store.mark_step_done("TASK-3", "4.1").unwrap_err().kind(), "StepNotFound");
    assert_eq!(store.mark_step_done("REQ-5", "5.1").unwrap_err().kind(), "CapabilityError");
}

#[test]
fn test_add_reference_is_symmetric_and_idempotent() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    assert!(store.add_reference("REQ-9", "TASK-3").unwrap().added);
    let hit = store.search_by_id("REQ-9", true).unwrap();
    assert!(ids(hit.referenced_by.unwrap()).contains(&"TASK-3".to_string()));

    assert!(!store.add_reference("REQ-9", "TASK-3").unwrap().added);
    let text = corpus.read("PRD-1_checkout.md");
    assert_eq!(text.matches("*Referenced by*: TASK-3").count(), 1);
    assert!(text.contains("### REQ-9: Gift cards\n`Status`: NEW\n*Referenced by*: TASK-3\n"));

    store.add_reference("REQ-9", "TASK-4").unwrap();
    assert!(corpus.read("PRD-1_checkout.md").contains("*Referenced by*: TASK-3, TASK-4\n"));
}

#[test]
fn test_add_reference_errors() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    assert_eq!(store.add_reference("REQ-9", "TASK-99").unwrap_err().kind(), "NotFound");
    assert_eq!(store.add_reference("REQ-99", "TASK-3").unwrap_err().kind(), "NotFound");
    assert_eq!(store.add_reference("REQ-9", "REQ-9").unwrap_err().kind(), "StructuralViolation");
    assert_eq!(corpus.read("PRD-1_checkout.md"), PRD);
}

// =============================================================================
// Provisional ids
// =============================================================================

#[test]
fn test_finalize_file_level_draft() {
    let corpus = Corpus::new();
    let draft = corpus.draft("TASKPRD-PROVISIONAL1.md", TASK_DRAFT);
    let mut store = corpus.open();

    let report = store.finalize_draft(&draft, Some("Gift Cards")).unwrap();
    let mapping: Vec<(String, String)> = report
        .mapping
        .iter()
        .map(|m| (m.provisional.to_string(), m.confirmed.to_string()))
        .collect();
    assert_eq!(
        mapping,
        vec![
            ("TASKPRD-PROVISIONAL1".to_string(), "TASKPRD-2".to_string()),
            ("TASK-PROVISIONAL2".to_string(), "TASK-5".to_string()),
            ("TASK-PROVISIONAL3".to_string(), "TASK-6".to_string()),
        ]
    );
    assert_eq!(report.documents, vec![PathBuf::from("TASKPRD-2_gift_cards.md")]);
    assert!(!draft.exists());

    // Heading, Implements field and checklist ordinals all rewritten
    let text = corpus.read("TASKPRD-2_gift_cards.md");
    assert!(!text.contains("PROVISIONAL"));
    assert!(text.starts_with("# TASKPRD-2: Gift card rollout\n"));
    assert!(text.contains("### TASK-5: Gift card ledger\n"));
    assert!(text.contains("- [ ] 5.1 Design balance table\n"));
    assert!(text.contains("- [ ] 5.2 Expose redemption API\n"));
    assert!(text.contains("*Implements*: REQ-9, TASK-5\n"));
    assert!(text.contains("*Referenced by*: TASK-6\n"));
    assert!(text.trim_end().ends_with("-->"));

    // Back-references land on the implemented requirement
    assert!(corpus.read("PRD-1_checkout.md").contains("*Referenced by*: TASK-5, TASK-6\n"));

    let tasks = store.search_by_type(&[ArtifactType::Task], None, Some("TASKPRD-2")).unwrap();
    assert_eq!(ids(tasks.iter().map(|s| s.id)), vec!["TASK-5", "TASK-6"]);
    store.mark_step_done("TASK-5", "5.1").unwrap();
}

#[test]
fn test_finalize_embedded_draft_merges_under_parent() {
    let corpus = Corpus::new();
    let draft = corpus.draft("saved_carts.md", EMBEDDED_DRAFT);
    let mut store = corpus.open();

    let report = store.finalize_draft(Path::new("saved_carts.md"), None).unwrap();
    assert_eq!(ids(report.mapping.iter().map(|m| m.confirmed)), vec!["REQ-10", "UACC-1"]);
    assert_eq!(report.documents, vec![PathBuf::from("PRD-1_checkout.md")]);
    assert!(!draft.exists());

    let reqs = store.search_by_type(&[ArtifactType::Req], None, None).unwrap();
    assert_eq!(ids(reqs.iter().map(|s| s.id)), vec!["REQ-5", "REQ-7", "REQ-9", "REQ-10"]);
    let tests = store.search_by_type(&[ArtifactType::Uacc, ArtifactType::Sacc], None, None).unwrap();
    assert_eq!(ids(tests.iter().map(|s| s.id)), vec!["SACC-2", "UACC-1"]);

    let req = store.get_artifact("REQ-10").unwrap();
    assert!(req.contains("Carts persist across sessions."));
    assert!(req.contains("*Referenced by*: UACC-1\n"));
    assert!(store.get_artifact("UACC-1").unwrap().contains("- [ ] 1.1 Log out and back in"));

    // Everything that was there before is untouched
    let text = corpus.read("PRD-1_checkout.md");
    assert!(text.starts_with(PRD.split("## Acceptance Tests").next().unwrap().trim_end()));
}

#[test]
fn test_finalized_ordinals_are_never_reused() {
    let corpus = Corpus::new();
    let draft = corpus.draft("TASKPRD-PROVISIONAL1.md", TASK_DRAFT);
    let mut store = corpus.open();
    store.finalize_draft(&draft, None).unwrap();

    // The finalized document disappears outside the store
    fs::remove_file(corpus.docs.join("TASKPRD-2.md")).unwrap();

    let draft = corpus.draft("TASKPRD-PROVISIONAL1.md", TASK_DRAFT);
    let report = store.finalize_draft(&draft, Some("again")).unwrap();
    assert_eq!(ids(report.mapping.iter().map(|m| m.confirmed)), vec!["TASKPRD-3", "TASK-7", "TASK-8"]);
}

#[test]
fn test_excluded_headings_still_reserve_ordinals() {
    let corpus = Corpus::new();
    fs::write(
        corpus.docs.join("PRD-3_broken.md"),
        "# PRD-3: Broken\n`Status`: NEW\n\n## Requirements\n\n### REQ-10: Unfinished\n\nBody\n\n### REQ-12 Missing colon\n`Status`: NEW\n",
    )
    .unwrap();
    corpus.draft("saved_carts.md", EMBEDDED_DRAFT);
    let mut store = corpus.open();

    let report = store.finalize_draft(Path::new("saved_carts.md"), None).unwrap();
    assert_eq!(ids(report.mapping.iter().map(|m| m.confirmed)), vec!["REQ-13", "UACC-1"]);
    assert!(!corpus.read("PRD-1_checkout.md").contains("REQ-10"));
}

#[test]
fn test_finalize_failures_leave_everything_in_place() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    assert_eq!(
        store.finalize_draft(Path::new("missing.md"), None).unwrap_err().kind(),
        "DraftNotFound"
    );

    let unresolved = corpus.draft("bad.md", &TASK_DRAFT.replace("TASK-PROVISIONAL2\n", "TASK-PROVISIONAL4\n"));
    assert_eq!(
        store.finalize_draft(&unresolved, None).unwrap_err().kind(),
        "UnresolvedProvisionalId"
    );
    assert!(unresolved.exists());

    let clash = corpus.draft(
        "clash.md",
        "### REQ-PROVISIONAL1: A\n`Status`: NEW\n*Parent*: PRD-1\n\n### UACC-PROVISIONAL1: B\n`Status`: NEW\n*Parent*: PRD-1\n*Tests*: REQ-PROVISIONAL1\n",
    );
    assert_eq!(
        store.finalize_draft(&clash, None).unwrap_err().kind(),
        "DuplicateProvisionalOrdinal"
    );

    let orphan = corpus.draft("orphan.md", "### REQ-PROVISIONAL1: A\n`Status`: NEW\n*Parent*: PRD-8\n");
    assert_eq!(store.finalize_draft(&orphan, None).unwrap_err().kind(), "NotFound");

    let misplaced = corpus.draft(
        "misplaced.md",
        "### TASK-PROVISIONAL1: A\n`Status`: NEW\n*Parent*: PRD-1\n*Implements*: REQ-5\n",
    );
    assert_eq!(store.finalize_draft(&misplaced, None).unwrap_err().kind(), "CapabilityError");

    // A file-level draft may only hold children its type embeds
    let wrong_child = corpus.draft(
        "PRD-PROVISIONAL1.md",
        "# PRD-PROVISIONAL1: Loyalty\n`Status`: NEW\n\n## Tasks\n\n### TASK-PROVISIONAL2: Points\n`Status`: NEW\n*Implements*: REQ-5\n",
    );
    assert_eq!(store.finalize_draft(&wrong_child, None).unwrap_err().kind(), "CapabilityError");
    assert!(wrong_child.exists());
    assert!(!corpus.docs.join("PRD-2.md").exists());

    assert_eq!(corpus.read("PRD-1_checkout.md"), PRD);
    assert_eq!(corpus.read("TASKPRD-1_rollout.md"), TASKS);
    assert!(!corpus.docs.join(".artifact-ledger.toml").exists());
}

#[test]
fn test_add_artifact_then_register() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    let id = store
        .add_artifact("PRD-1", ArtifactType::Uacc, "Gift card checkout\n*Tests*: REQ-9\n\n- [ ] PROVISIONAL1.1 Redeem a card\n")
        .unwrap();
    assert_eq!(id.to_string(), "UACC-PROVISIONAL1");
    let text = corpus.read("PRD-1_checkout.md");
    assert!(text.contains("### UACC-PROVISIONAL1: Gift card checkout\n`Status`: NEW\n*Tests*: REQ-9\n"));
    assert!(text.starts_with(PRD));

    // The provisional number is taken within this document
    let err = store
        .add_artifact(
            "PRD-1",
            ArtifactType::Sacc,
            "### SACC-PROVISIONAL1: Other\n`Status`: NEW\n*Tests*: REQ-5\n",
        )
        .unwrap_err();
    assert_eq!(err.kind(), "DuplicateProvisionalOrdinal");

    let report = store
        .register_provisional_ids("PRD-1", &[ArtifactType::Uacc, ArtifactType::Sacc])
        .unwrap();
    assert_eq!(ids(report.mapping.iter().map(|m| m.confirmed)), vec!["UACC-1"]);

    let text = corpus.read("PRD-1_checkout.md");
    assert!(!text.contains("PROVISIONAL"));
    assert!(text.contains("### UACC-1: Gift card checkout\n"));
    assert!(text.contains("- [ ] 1.1 Redeem a card\n"));
    assert!(text.contains("### REQ-9: Gift cards\n`Status`: NEW\n*Referenced by*: UACC-1\n"));

    store.mark_step_done("UACC-1", "1.1").unwrap();
    assert_eq!(
        store.register_provisional_ids("PRD-1", &[ArtifactType::Uacc]).unwrap().mapping.len(),
        0
    );
}

#[test]
fn test_add_artifact_capability() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    let err = store.add_artifact("PRD-1", ArtifactType::Task, "Not here\n").unwrap_err();
    assert_eq!(err.kind(), "CapabilityError");
    let err = store.add_artifact("REQ-5", ArtifactType::Uacc, "Nested\n*Tests*: REQ-5\n").unwrap_err();
    assert_eq!(err.kind(), "CapabilityError");
    assert_eq!(corpus.read("PRD-1_checkout.md"), PRD);
}

#[test]
fn test_add_artifact_starts_at_initial_status() {
    let corpus = Corpus::new();
    let mut store = corpus.open();

    let err = store
        .add_artifact(
            "PRD-1",
            ArtifactType::Uacc,
            "### UACC-PROVISIONAL1: Already passing\n`Status`: PASSED\n*Tests*: REQ-9\n",
        )
        .unwrap_err();
    assert_eq!(err.kind(), "StructuralViolation");
    assert_eq!(corpus.read("PRD-1_checkout.md"), PRD);

    store
        .add_artifact(
            "PRD-1",
            ArtifactType::Uacc,
            "### UACC-PROVISIONAL1: Fresh\n`Status`: NEW\n*Tests*: REQ-9\n",
        )
        .unwrap();
    assert!(corpus
        .read("PRD-1_checkout.md")
        .contains("### UACC-PROVISIONAL1: Fresh\n`Status`: NEW\n*Tests*: REQ-9\n"));
}

#[test]
fn test_warnings_report_malformed_sections() {
    let corpus = Corpus::new();
    fs::write(
        corpus.docs.join("PRD-3_broken.md"),
        "# PRD-3: Broken\n`Status`: NEW\n\n### REQ-11 Missing colon\n`Status`: NEW\n\n### REQ-12: No status\n\nBody\n",
    )
    .unwrap();
    let mut store = corpus.open();

    let warnings = store.warnings().unwrap();
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| w.path == Path::new("PRD-3_broken.md") && w.warning.excluded));
    assert_eq!(store.search_by_id("REQ-12", false).unwrap_err().kind(), "NotFound");
    // The rest of the corpus still works
    assert_eq!(status_of(&mut store, "PRD-3"), Status::New);
}
