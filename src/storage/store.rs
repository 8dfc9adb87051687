#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::block::{blocks_needed, decode_message, encode_message, format_line, splice_line};
use super::gat::{block_offset, is_block, load_section, peek_section, save_section, GatTable};
use super::metrics::{StoreMetrics, StoreMetricsSnapshot};
use super::options::{AppendOverflow, StoreOptions};
use crate::primitives::concurrency::{AreaLock, FileLock};
use crate::primitives::io::{FileIo, StdFileIo};
use crate::types::{
    MessagePointer, Result, StoreError, BLOCK_SIZE, GAT_ENTRIES, GAT_SECTION_SIZE,
    STORAGE_TYPE_DISK, USABLE_BLOCKS,
};

/// Type-2 message text store over one message area file.
///
/// Every operation opens the file, serializes against other users of the
/// same area, does its work and closes the file again; no allocation table
/// is cached between calls.
pub struct MessageStore {
    path: PathBuf,
    lock: AreaLock,
    opts: StoreOptions,
    metrics: StoreMetrics,
}

impl std::fmt::Debug for MessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStore")
            .field("path", &self.path)
            .field("opts", &self.opts)
            .finish()
    }
}

impl MessageStore {
    /// Creates a store for the message file at `path`.
    ///
    /// No I/O happens here; the file is created by the first operation that
    /// needs it.
    pub fn open(path: impl Into<PathBuf>, opts: StoreOptions) -> Result<Self> {
        if opts.max_sections == 0 {
            return Err(StoreError::Invalid("max_sections must be at least 1"));
        }
        if u64::from(opts.max_sections) * GAT_ENTRIES as u64 > u64::from(u32::MAX) + 1 {
            return Err(StoreError::Invalid(
                "max_sections overflows the message pointer",
            ));
        }
        if opts.initial_data_blocks as usize > GAT_ENTRIES {
            return Err(StoreError::Invalid(
                "initial_data_blocks exceeds one section",
            ));
        }
        let path = path.into();
        let lock = AreaLock::for_path(&path);
        Ok(Self {
            path,
            lock,
            opts,
            metrics: StoreMetrics::default(),
        })
    }

    /// Path of the message file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Options the store was opened with.
    pub fn options(&self) -> &StoreOptions {
        &self.opts
    }

    /// Snapshot of the block traffic counters.
    pub fn metrics(&self) -> StoreMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Stores `text` and returns the pointer to it.
    ///
    /// The blocks of a message always come from a single section; sections
    /// are tried in order and created on demand. A pointer of storage type 0
    /// or 1 is returned untouched. Saving with a type-2 pointer allocates a
    /// new chain and leaves the old one in place.
    pub fn save(&self, existing: Option<MessagePointer>, text: &[u8]) -> Result<MessagePointer> {
        if let Some(ptr) = existing {
            match ptr.storage_type {
                0 | 1 => return Ok(ptr),
                STORAGE_TYPE_DISK => {}
                _ => return Err(StoreError::Invalid("unsupported storage type")),
            }
        }
        let needed = blocks_needed(text);
        if needed > USABLE_BLOCKS {
            warn!(
                len = text.len(),
                blocks_needed = needed,
                "msgstore.save.too_large"
            );
            return Err(StoreError::StorageFull {
                blocks_needed: needed,
            });
        }
        let raw = encode_message(text);
        self.with_file(true, |io| {
            for section in 0..self.opts.max_sections {
                let mut table = load_section(io, section)?;
                let blocks = table.free_blocks(needed);
                if blocks.len() < needed {
                    continue;
                }
                for (&block, chunk) in blocks.iter().zip(raw.chunks_exact(BLOCK_SIZE)) {
                    io.write_at(block_offset(section, block), chunk)?;
                }
                table.link(&blocks);
                save_section(io, &table)?;
                self.finish_mutation(io)?;
                self.metrics.record_alloc(blocks.len());
                self.metrics.record_write(raw.len());
                let ptr = MessagePointer::disk(section, blocks[0]);
                debug!(
                    section,
                    head = blocks[0],
                    blocks = blocks.len(),
                    len = text.len(),
                    "msgstore.save.placed"
                );
                return Ok(ptr);
            }
            warn!(
                blocks_needed = needed,
                max_sections = self.opts.max_sections,
                "msgstore.save.storage_full"
            );
            Err(StoreError::StorageFull {
                blocks_needed: needed,
            })
        })
    }

    /// Reads the text stored at `ptr`.
    ///
    /// Pointers of other storage types, pointers into a missing file and
    /// pointers whose head block is free all yield [`StoreError::NotFound`].
    pub fn read(&self, ptr: MessagePointer) -> Result<Vec<u8>> {
        if !ptr.is_disk() || !is_block(ptr.head()) {
            return Err(StoreError::NotFound);
        }
        self.with_file(false, |io| {
            let section = ptr.section();
            let table = peek_section(io, section)?;
            let chain = live_chain(&table, ptr)?;
            let mut raw = Vec::with_capacity(chain.len() * BLOCK_SIZE);
            let mut block = [0u8; BLOCK_SIZE];
            for &index in &chain {
                let read = io.read_at(block_offset(section, index), &mut block)?;
                raw.extend_from_slice(&block[..read]);
            }
            if raw.is_empty() {
                return Err(StoreError::NotFound);
            }
            self.metrics.record_read(raw.len());
            Ok(decode_message(raw))
        })
    }

    /// Frees every block of the message at `ptr`.
    ///
    /// Removing a message twice, or a pointer of another storage type, is a
    /// no-op.
    pub fn remove(&self, ptr: MessagePointer) -> Result<()> {
        if !ptr.is_disk() || !is_block(ptr.head()) {
            return Ok(());
        }
        if !self.path.exists() {
            return Ok(());
        }
        self.with_file(false, |io| {
            let mut table = peek_section(io, ptr.section())?;
            if table.is_free(ptr.head()) {
                debug!(ptr = %ptr, "msgstore.remove.already_free");
                return Ok(());
            }
            let freed = table.free_chain(ptr.head())?;
            save_section(io, &table)?;
            self.finish_mutation(io)?;
            self.metrics.record_free(freed);
            debug!(ptr = %ptr, blocks = freed, "msgstore.remove.freed");
            Ok(())
        })
    }

    /// Appends `line` plus CRLF to the end of the message at `ptr`.
    ///
    /// The line is spliced into the tail block; whatever does not fit goes
    /// into newly allocated blocks of the same section. The returned pointer
    /// always equals `ptr`. Pointers of other storage types are returned
    /// untouched.
    pub fn append_line(&self, ptr: MessagePointer, line: &[u8]) -> Result<MessagePointer> {
        if !ptr.is_disk() {
            return Ok(ptr);
        }
        if !is_block(ptr.head()) {
            return Err(StoreError::NotFound);
        }
        self.with_file(false, |io| {
            let section = ptr.section();
            let mut table = peek_section(io, section)?;
            let chain = live_chain(&table, ptr)?;
            let tail = *chain.last().ok_or(StoreError::NotFound)?;

            let mut tail_block = [0u8; BLOCK_SIZE];
            io.read_at(block_offset(section, tail), &mut tail_block)?;
            let spliced = splice_line(&tail_block, &format_line(line));
            let extra = spliced.len() / BLOCK_SIZE - 1;
            let fresh = table.free_blocks(extra);
            if fresh.len() < extra {
                warn!(
                    ptr = %ptr,
                    blocks_needed = extra,
                    policy = ?self.opts.append_overflow,
                    "msgstore.append.section_full"
                );
                return match self.opts.append_overflow {
                    AppendOverflow::Error => Err(StoreError::StorageFull {
                        blocks_needed: extra,
                    }),
                    AppendOverflow::Drop => Ok(ptr),
                };
            }

            let mut targets = Vec::with_capacity(extra + 1);
            targets.push(tail);
            targets.extend_from_slice(&fresh);
            for (&block, chunk) in targets.iter().zip(spliced.chunks_exact(BLOCK_SIZE)) {
                io.write_at(block_offset(section, block), chunk)?;
            }
            if extra > 0 {
                table.link(&targets);
                save_section(io, &table)?;
            }
            self.finish_mutation(io)?;
            self.metrics.record_alloc(extra);
            self.metrics.record_write(spliced.len());
            debug!(
                ptr = %ptr,
                tail,
                new_blocks = extra,
                "msgstore.append.done"
            );
            Ok(ptr)
        })
    }

    /// Returns a copy of the allocation table of `section` without
    /// materializing it.
    pub fn table(&self, section: u32) -> Result<GatTable> {
        if !self.path.exists() {
            return Ok(GatTable::empty(section));
        }
        self.with_file(false, |io| peek_section(io, section))
    }

    fn with_file<T>(&self, create: bool, op: impl FnOnce(&StdFileIo) -> Result<T>) -> Result<T> {
        let _area = self.lock.acquire();
        if !create && !self.path.exists() {
            return Err(StoreError::NotFound);
        }
        let (io, created) = StdFileIo::open(&self.path)?;
        let _file_lock = if self.opts.advisory_lock {
            Some(FileLock::exclusive(io.file())?)
        } else {
            None
        };
        if create && (created || io.is_empty()?) {
            self.initialize(&io)?;
        }
        op(&io)
    }

    fn initialize(&self, io: &StdFileIo) -> Result<()> {
        save_section(io, &GatTable::empty(0))?;
        let len = GAT_SECTION_SIZE as u64 + u64::from(self.opts.initial_data_blocks) * BLOCK_SIZE as u64;
        io.set_len(len)?;
        debug!(path = %self.path.display(), len, "msgstore.file.created");
        Ok(())
    }

    fn finish_mutation(&self, io: &StdFileIo) -> Result<()> {
        if self.opts.sync_writes {
            io.sync_all()?;
        }
        if let Some(observer) = &self.opts.observer {
            observer.posts_changed();
        }
        Ok(())
    }
}

fn live_chain(table: &GatTable, ptr: MessagePointer) -> Result<Vec<u16>> {
    if table.is_free(ptr.head()) {
        return Err(StoreError::NotFound);
    }
    table.chain(ptr.head())
}
