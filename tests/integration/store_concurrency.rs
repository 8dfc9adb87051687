#![allow(missing_docs)]

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use msgstore::storage::{MessageStore, StoreOptions};
use tempfile::TempDir;

const THREADS: usize = 4;
const MESSAGES_PER_THREAD: usize = 40;

#[test]
fn concurrent_handles_never_share_blocks() {
    let dir = TempDir::new().expect("tempdir");
    let path = Arc::new(dir.path().join("shared.dat"));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let path = Arc::clone(&path);
            thread::spawn(move || {
                // Each thread gets its own handle, as separate BBS nodes would.
                let store = MessageStore::open(path.as_path(), StoreOptions::default())
                    .expect("open store");
                let mut saved = Vec::with_capacity(MESSAGES_PER_THREAD);
                for i in 0..MESSAGES_PER_THREAD {
                    let text = format!("node {t} message {i} ").repeat(1 + i % 60);
                    let ptr = store.save(None, text.as_bytes()).expect("save");
                    if i % 7 == 0 {
                        store.append_line(ptr, b"-- signature").expect("append");
                        saved.push((ptr, format!("{text}-- signature\r\n")));
                    } else {
                        saved.push((ptr, text));
                    }
                }
                saved
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.join().expect("thread panicked"));
    }

    let store = MessageStore::open(path.as_path(), StoreOptions::default()).expect("open store");
    let mut blocks = HashSet::new();
    for (ptr, text) in &all {
        assert_eq!(store.read(*ptr).expect("read"), text.as_bytes());
        let table = store.table(ptr.section()).expect("table");
        for block in table.chain(ptr.head()).expect("chain") {
            assert!(
                blocks.insert((ptr.section(), block)),
                "block {block} of section {} used twice",
                ptr.section()
            );
        }
    }
    assert_eq!(all.len(), THREADS * MESSAGES_PER_THREAD);
}

#[test]
fn concurrent_removes_release_everything() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("churn.dat");
    let store = Arc::new(MessageStore::open(&path, StoreOptions::default()).expect("open"));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..MESSAGES_PER_THREAD {
                    let text = vec![b'a' + (t as u8); 100 + i * 37];
                    let ptr = store.save(None, &text).expect("save");
                    assert_eq!(store.read(ptr).expect("read"), text);
                    store.remove(ptr).expect("remove");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread panicked");
    }

    let table = store.table(0).expect("table");
    assert_eq!(table.free_count(), msgstore::types::USABLE_BLOCKS);
    assert_eq!(store.metrics().live_blocks(), 0);
}
