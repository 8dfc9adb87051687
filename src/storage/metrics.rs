use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for block traffic through a [`super::MessageStore`].
#[derive(Default)]
pub struct StoreMetrics {
    blocks_allocated: AtomicU64,
    blocks_freed: AtomicU64,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
}

/// Snapshot of [`StoreMetrics`] at a point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreMetricsSnapshot {
    /// Data blocks handed out by saves and appends.
    pub blocks_allocated: u64,
    /// Data blocks returned by removes.
    pub blocks_freed: u64,
    /// Bytes written to data blocks.
    pub bytes_written: u64,
    /// Bytes read from data blocks.
    pub bytes_read: u64,
}

impl StoreMetricsSnapshot {
    /// Blocks allocated through this store and not freed through it.
    pub fn live_blocks(&self) -> i64 {
        self.blocks_allocated as i64 - self.blocks_freed as i64
    }
}

impl StoreMetrics {
    pub(crate) fn record_alloc(&self, blocks: usize) {
        self.blocks_allocated
            .fetch_add(blocks as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_free(&self, blocks: usize) {
        self.blocks_freed.fetch_add(blocks as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self, bytes: usize) {
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_read(&self, bytes: usize) {
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Captures the current counter values.
    pub fn snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            blocks_allocated: self.blocks_allocated.load(Ordering::Relaxed),
            blocks_freed: self.blocks_freed.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }
}
