//! Integration tests for batch run semantics
//!
//! These tests pin down the rules a batch run must obey:
//! - Phase transitions (running / paused / completed / cancelled)
//! - Single-file query matching
//! - Batch cursor arithmetic

use pretty_assertions::assert_eq;

// ============================================================================
// Phase Transition Tests
// ============================================================================

const PHASES: &[&str] = &["running", "paused", "completed", "cancelled"];

/// Phase transition rules for a batch run
fn is_valid_transition(from: &str, to: &str) -> bool {
    match (from, to) {
        // running -> paused: client requests a pause between batches
        ("running", "paused") => true,
        // paused -> running: client resumes
        ("paused", "running") => true,
        // running -> completed: cursor reached the end of the snapshot
        ("running", "completed") => true,
        // cancel is allowed from any live phase and is terminal
        ("running", "cancelled") | ("paused", "cancelled") => true,
        _ => false,
    }
}

#[test]
fn test_happy_path_transitions() {
    assert!(is_valid_transition("running", "paused"));
    assert!(is_valid_transition("paused", "running"));
    assert!(is_valid_transition("running", "completed"));
}

#[test]
fn test_cancel_from_any_live_phase() {
    assert!(is_valid_transition("running", "cancelled"));
    assert!(is_valid_transition("paused", "cancelled"));
}

#[test]
fn test_terminal_phases_admit_no_transitions() {
    for terminal in ["completed", "cancelled"] {
        for to in PHASES {
            assert!(
                !is_valid_transition(terminal, to),
                "{terminal} must not transition to {to}"
            );
        }
    }
}

#[test]
fn test_paused_runs_cannot_complete_directly() {
    // A paused run must resume before batches can advance it to completion
    assert!(!is_valid_transition("paused", "completed"));
}

// ============================================================================
// Single-File Query Matching Tests
// ============================================================================

/// A query with an extension matches one exact filename; without one it
/// matches on the stem.
fn matches_query(filename: &str, query: &str) -> bool {
    if query.contains('.') {
        return filename == query;
    }
    std::path::Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        == Some(query)
}

#[test]
fn test_extension_query_is_exact() {
    assert!(matches_query("sunset.jpg", "sunset.jpg"));
    assert!(!matches_query("sunset.png", "sunset.jpg"));
    assert!(!matches_query("old-sunset.jpg", "sunset.jpg"));
}

#[test]
fn test_stem_query_matches_any_extension() {
    assert!(matches_query("sunset.jpg", "sunset"));
    assert!(matches_query("sunset.png", "sunset"));
    assert!(matches_query("sunset.webp", "sunset"));
}

#[test]
fn test_stem_query_does_not_match_prefixes() {
    assert!(!matches_query("sunset-2.jpg", "sunset"));
    assert!(!matches_query("sunsets.jpg", "sunset"));
}

#[test]
fn test_multi_dot_filenames() {
    // "archive.tar" is the stem of "archive.tar.gz"
    assert!(matches_query("archive.tar.gz", "archive.tar"));
    assert!(!matches_query("archive.tar.gz", "archive"));
    assert!(matches_query("archive.tar.gz", "archive.tar.gz"));
}

// ============================================================================
// Batch Cursor Tests
// ============================================================================

/// One cursor advance over a snapshot of `total` files
fn advance(offset: usize, batch_size: usize, total: usize) -> (usize, usize, bool) {
    let end = (offset + batch_size).min(total);
    let processed = end - offset;
    (end, processed, end >= total)
}

#[test]
fn test_cursor_advances_in_full_batches() {
    let (offset, processed, done) = advance(0, 10, 45);
    assert_eq!((offset, processed, done), (10, 10, false));

    let (offset, processed, done) = advance(offset, 10, 45);
    assert_eq!((offset, processed, done), (20, 10, false));
}

#[test]
fn test_final_batch_is_short() {
    let (offset, processed, done) = advance(40, 10, 45);
    assert_eq!((offset, processed, done), (45, 5, true));
}

#[test]
fn test_exact_multiple_completes_on_last_batch() {
    let (offset, processed, done) = advance(30, 10, 40);
    assert_eq!((offset, processed, done), (40, 10, true));
}

#[test]
fn test_empty_snapshot_completes_immediately() {
    let (offset, processed, done) = advance(0, 10, 0);
    assert_eq!((offset, processed, done), (0, 0, true));
}

#[test]
fn test_batch_larger_than_snapshot() {
    let (offset, processed, done) = advance(0, 50, 3);
    assert_eq!((offset, processed, done), (3, 3, true));
}
