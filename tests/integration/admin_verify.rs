#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use msgstore::{
    admin::{stats, verify, AdminError, AdminOpenOptions, VerifyMode, VerifySeverity},
    primitives::io::StdFileIo,
    storage::{gat, MessageStore, StoreOptions},
    types::{MessagePointer, GAT_FREE, GAT_TERMINAL, USABLE_BLOCKS},
};
use tempfile::TempDir;

fn setup(name: &str) -> (TempDir, PathBuf, MessageStore) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join(format!("{name}.dat"));
    let store = MessageStore::open(&path, StoreOptions::default()).expect("open store");
    (dir, path, store)
}

fn text_of(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| b'A' + ((i + seed as usize) % 26) as u8)
        .collect()
}

fn poke_gat(path: &Path, section: u32, index: u16, value: u16) {
    let (io, _) = StdFileIo::open(path).expect("open file");
    let mut table = gat::peek_section(&io, section).expect("load table");
    table.set(index, value);
    gat::save_section(&io, &table).expect("save table");
}

fn admin_opts() -> AdminOpenOptions {
    AdminOpenOptions::default()
}

#[test]
fn stats_counts_blocks_and_chains() {
    let (_dir, path, store) = setup("stats");
    store.save(None, &text_of(600, 0)).expect("save");
    store.save(None, &text_of(100, 1)).expect("save");

    let report = stats(&path, &admin_opts()).expect("stats report");
    assert_eq!(report.totals.sections, 1);
    assert_eq!(report.totals.used_blocks, 3);
    assert_eq!(report.totals.free_blocks, USABLE_BLOCKS - 3);
    assert_eq!(report.totals.chains, 2);
    assert_eq!(report.sections.len(), 1);
    assert!(report.file_size_bytes > 4096);
    let json = report.to_json().expect("json");
    assert!(json.contains("\"free_blocks\""));
}

#[test]
fn missing_file_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("absent.dat");
    assert!(matches!(
        stats(&path, &admin_opts()),
        Err(AdminError::MissingStore(_))
    ));
    assert!(matches!(
        verify(&path, &[], &admin_opts(), VerifyMode::Check),
        Err(AdminError::MissingStore(_))
    ));
}

#[test]
fn clean_store_verifies() {
    let (_dir, path, store) = setup("clean");
    let a = store.save(None, &text_of(1500, 0)).expect("save");
    let b = store.save(None, b"short").expect("save");
    let legacy = MessagePointer {
        storage_type: 1,
        stored_as: 9,
    };

    let report = verify(&path, &[a, legacy, b], &admin_opts(), VerifyMode::Repair)
        .expect("verify");
    assert!(report.success);
    assert!(report.findings.is_empty());
    assert!(report.dead_messages.is_empty());
    assert_eq!(report.counts.messages_checked, 2);
    assert_eq!(report.counts.blocks_referenced, 4);
    assert_eq!(report.counts.lost_clusters, 0);
    assert!(!report.changes_written);
}

#[test]
fn lost_clusters_are_freed_only_on_repair() {
    let (_dir, path, store) = setup("lost");
    let a = store.save(None, &text_of(300, 0)).expect("save");
    let orphan = store.save(None, &text_of(1100, 1)).expect("save");
    let orphan_blocks = store
        .table(0)
        .expect("table")
        .chain(orphan.head())
        .expect("chain");

    let check = verify(&path, &[a], &admin_opts(), VerifyMode::Check).expect("verify");
    assert!(check.success);
    assert_eq!(check.counts.lost_clusters, 3);
    assert_eq!(check.findings[0].severity, VerifySeverity::Warning);
    assert!(!check.changes_written);
    assert!(!store.table(0).expect("table").is_free(orphan.head()));

    let repair = verify(&path, &[a], &admin_opts(), VerifyMode::Repair).expect("verify");
    assert!(repair.changes_written);
    let table = store.table(0).expect("table");
    assert!(orphan_blocks.iter().all(|&b| table.is_free(b)));
    assert_eq!(store.read(a).expect("read"), text_of(300, 0));
}

#[test]
fn collision_truncates_both_chains() {
    let (_dir, path, store) = setup("collision");
    let a_text = text_of(600, 0);
    let a = store.save(None, &a_text).expect("save");
    let b = store.save(None, b"bee").expect("save");
    assert_eq!((a.head(), b.head()), (1, 3));
    // b now wanders into a's second block.
    poke_gat(&path, 0, 3, 2);

    let report = verify(&path, &[a, b], &admin_opts(), VerifyMode::Repair).expect("verify");
    assert!(!report.success);
    assert_eq!(report.counts.chains_truncated, 2);
    assert_eq!(report.counts.lost_clusters, 1);
    assert!(report.dead_messages.is_empty());
    assert!(report.changes_written);

    let table = store.table(0).expect("table");
    assert_eq!(table.get(1), GAT_TERMINAL);
    assert_eq!(table.get(3), GAT_TERMINAL);
    assert_eq!(table.get(2), GAT_FREE);
    assert_eq!(store.read(a).expect("read"), &a_text[..512]);
}

#[test]
fn dangling_head_marks_message_dead() {
    let (_dir, path, store) = setup("dangling");
    let a = store.save(None, b"alive").expect("save");
    let b = store.save(None, b"doomed").expect("save");
    poke_gat(&path, 0, b.head(), GAT_FREE);
    let beyond = MessagePointer::disk(5, 1);

    let report = verify(&path, &[a, b, beyond], &admin_opts(), VerifyMode::Check)
        .expect("verify");
    assert!(!report.success);
    assert_eq!(report.dead_messages, vec![2, 1]);
    assert_eq!(report.counts.lost_clusters, 0);
    assert!(report
        .findings
        .iter()
        .all(|f| f.severity == VerifySeverity::Error && f.message.is_some()));
}

#[test]
fn dangling_link_truncates_chain() {
    let (_dir, path, store) = setup("dangling-link");
    let text = text_of(1200, 2);
    let a = store.save(None, &text).expect("save");
    // Free the last block while the middle one still points at it.
    poke_gat(&path, 0, 3, GAT_FREE);

    let report = verify(&path, &[a], &admin_opts(), VerifyMode::Repair).expect("verify");
    assert_eq!(report.counts.chains_truncated, 1);
    assert_eq!(store.table(0).expect("table").get(2), GAT_TERMINAL);
    assert_eq!(store.read(a).expect("read"), &text[..1024]);
}

#[test]
fn self_loop_is_cut() {
    let (_dir, path, store) = setup("loop");
    let text = text_of(600, 4);
    let a = store.save(None, &text).expect("save");
    poke_gat(&path, 0, 2, 1);
    assert!(store.read(a).is_err());

    let report = verify(&path, &[a], &admin_opts(), VerifyMode::Repair).expect("verify");
    assert!(!report.success);
    assert_eq!(report.counts.chains_truncated, 1);
    assert_eq!(store.read(a).expect("read"), text);
    let json = report.to_json().expect("json");
    assert!(json.contains("\"repair\""));
}
