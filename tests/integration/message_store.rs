#![allow(missing_docs)]

use std::path::PathBuf;

use msgstore::{
    storage::{GatTable, MessageStore, StoreOptions},
    types::{
        MessagePointer, StoreError, BLOCK_SIZE, GAT_SECTION_SIZE, GAT_TERMINAL, SECTION_STRIDE,
        USABLE_BLOCKS,
    },
    AppendOverflow,
};
use tempfile::TempDir;

type TestResult = msgstore::Result<()>;

fn setup(name: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join(format!("{name}.dat"));
    (dir, path)
}

fn allocated(table: &GatTable) -> Vec<u16> {
    (1..2048u16).filter(|&i| !table.is_free(i)).collect()
}

fn text_of(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| b'a' + ((i + seed as usize) % 26) as u8)
        .collect()
}

#[test]
fn round_trips_assorted_lengths() -> TestResult {
    let (_dir, path) = setup("roundtrip");
    let store = MessageStore::open(&path, StoreOptions::default())?;
    for (seed, len) in [0usize, 1, 511, 512, 513, 1024, 4000, 10_000]
        .into_iter()
        .enumerate()
    {
        let text = text_of(len, seed as u8);
        let ptr = store.save(None, &text)?;
        assert_eq!(store.read(ptr)?, text, "len {len}");
    }
    Ok(())
}

#[test]
fn terminator_bytes_inside_text_survive() -> TestResult {
    let (_dir, path) = setup("ctrlz");
    let store = MessageStore::open(&path, StoreOptions::default())?;
    let mut early = vec![0x1A; 10];
    early.extend_from_slice(&text_of(700, 3));
    let ptr = store.save(None, &early)?;
    assert_eq!(store.read(ptr)?, early);

    let mut aligned = text_of(1024, 1);
    aligned[1000] = 0x1A;
    let ptr = store.save(None, &aligned)?;
    assert_eq!(store.read(ptr)?, aligned);
    Ok(())
}

#[test]
fn block_aligned_save_uses_exact_block_count() -> TestResult {
    let (_dir, path) = setup("accounting");
    let store = MessageStore::open(&path, StoreOptions::default())?;
    store.save(None, b"warmup")?;
    for k in 1..=4usize {
        let before = allocated(&store.table(0)?);
        store.save(None, &text_of(BLOCK_SIZE * k, k as u8))?;
        let table = store.table(0)?;
        let new: Vec<u16> = allocated(&table)
            .into_iter()
            .filter(|i| !before.contains(i))
            .collect();
        assert_eq!(new.len(), k);
        let terminals = new
            .iter()
            .filter(|&&i| table.get(i) == GAT_TERMINAL)
            .count();
        assert_eq!(terminals, 1);
    }
    Ok(())
}

#[test]
fn freed_blocks_are_reused() -> TestResult {
    let (_dir, path) = setup("reuse");
    let store = MessageStore::open(&path, StoreOptions::default())?;
    let keep = store.save(None, &text_of(600, 0))?;
    let gone = store.save(None, &text_of(1200, 1))?;
    let freed = store.table(0)?.chain(gone.head())?;
    store.remove(gone)?;
    let again = store.save(None, &text_of(1200, 2))?;
    let reused = store.table(0)?.chain(again.head())?;
    assert!(reused.iter().any(|b| freed.contains(b)));
    assert_eq!(store.read(keep)?, text_of(600, 0));
    Ok(())
}

#[test]
fn full_section_rolls_over() -> TestResult {
    let (_dir, path) = setup("rollover");
    let store = MessageStore::open(&path, StoreOptions::default())?;
    let chunk = text_of(BLOCK_SIZE * 89, 0);
    let mut saved = 0usize;
    // 23 messages of 89 blocks fill all 2047 usable blocks of section 0.
    for _ in 0..USABLE_BLOCKS / 89 {
        let ptr = store.save(None, &chunk)?;
        assert_eq!(ptr.section(), 0);
        saved += 89;
    }
    assert_eq!(saved, USABLE_BLOCKS);
    assert_eq!(store.table(0)?.free_count(), 0);

    let ptr = store.save(None, b"next section")?;
    assert_eq!(ptr.section(), 1);
    assert_eq!(ptr.head(), 1);
    assert_eq!(ptr.stored_as, 2048 + 1);
    assert_eq!(store.read(ptr)?, b"next section");
    assert!(std::fs::metadata(&path)?.len() >= SECTION_STRIDE + GAT_SECTION_SIZE as u64);
    Ok(())
}

#[test]
fn large_message_skips_crowded_section() -> TestResult {
    let (_dir, path) = setup("skip");
    let store = MessageStore::open(&path, StoreOptions::default())?;
    store.save(None, &text_of(BLOCK_SIZE * 1500, 0))?;
    let big = text_of(BLOCK_SIZE * 600, 1);
    let ptr = store.save(None, &big)?;
    assert_eq!(ptr.section(), 1);
    let small = store.save(None, b"fits")?;
    assert_eq!(small.section(), 0);
    assert_eq!(store.read(ptr)?, big);
    Ok(())
}

#[test]
fn append_keeps_pointer_and_order() -> TestResult {
    let (_dir, path) = setup("append");
    let store = MessageStore::open(&path, StoreOptions::default())?;
    let ptr = store.save(None, b"line1")?;
    let after = store.append_line(ptr, b"line2")?;
    assert_eq!(after, ptr);
    let text = store.read(ptr)?;
    assert_eq!(text, b"line1line2\r\n");
    Ok(())
}

#[test]
fn append_grows_chain_across_blocks() -> TestResult {
    let (_dir, path) = setup("append-grow");
    let store = MessageStore::open(&path, StoreOptions::default())?;
    let first = text_of(500, 0);
    let ptr = store.save(None, &first)?;
    let line = text_of(700, 5);
    store.append_line(ptr, &line)?;
    let chain = store.table(0)?.chain(ptr.head())?;
    assert_eq!(chain.len(), 3);

    let mut expected = first.clone();
    expected.extend_from_slice(&line);
    expected.extend_from_slice(b"\r\n");
    assert_eq!(store.read(ptr)?, expected);

    store.append_line(ptr, b"tail")?;
    expected.extend_from_slice(b"tail\r\n");
    assert_eq!(store.read(ptr)?, expected);
    Ok(())
}

#[test]
fn append_overflow_policies() -> TestResult {
    let (_dir, path) = setup("append-full");
    let strict = MessageStore::open(&path, StoreOptions::default().max_sections(1))?;
    let ptr = strict.save(None, &text_of(510, 0))?;
    strict.save(None, &text_of(BLOCK_SIZE * 2046, 1))?;
    assert_eq!(strict.table(0)?.free_count(), 0);

    let err = strict.append_line(ptr, b"does not fit").unwrap_err();
    assert!(matches!(err, StoreError::StorageFull { .. }));
    assert_eq!(strict.read(ptr)?, text_of(510, 0));

    let lenient = MessageStore::open(
        &path,
        StoreOptions::default()
            .max_sections(1)
            .append_overflow(AppendOverflow::Drop),
    )?;
    assert_eq!(lenient.append_line(ptr, b"does not fit")?, ptr);
    assert_eq!(lenient.read(ptr)?, text_of(510, 0));
    Ok(())
}

#[test]
fn saves_survive_reopen() -> TestResult {
    let (_dir, path) = setup("reopen");
    let ptr = {
        let store = MessageStore::open(&path, StoreOptions::default())?;
        store.save(None, b"persistent")?
    };
    let store = MessageStore::open(&path, StoreOptions::default())?;
    assert_eq!(store.read(ptr)?, b"persistent");
    let decoded = MessagePointer::decode(&ptr.encode())?;
    assert_eq!(store.read(decoded)?, b"persistent");
    Ok(())
}

#[test]
fn append_after_aligned_text_keeps_trailing_nuls() -> TestResult {
    let (_dir, path) = setup("append-nul");
    let store = MessageStore::open(&path, StoreOptions::default())?;
    let mut text = text_of(BLOCK_SIZE, 0);
    text[400..].fill(0);
    let ptr = store.save(None, &text)?;
    store.append_line(ptr, b"next")?;
    let mut expected = text.clone();
    expected.extend_from_slice(b"next\r\n");
    assert_eq!(store.read(ptr)?, expected);

    let zeros = vec![0u8; BLOCK_SIZE];
    let ptr = store.save(None, &zeros)?;
    store.append_line(ptr, b"after zeros")?;
    let mut expected = zeros;
    expected.extend_from_slice(b"after zeros\r\n");
    assert_eq!(store.read(ptr)?, expected);
    Ok(())
}
