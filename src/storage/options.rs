use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::observer::ChangeObserver;
use crate::types::LEGACY_MAX_SECTIONS;

/// Data blocks a freshly created message file is pre-extended to hold.
pub const DEFAULT_INITIAL_DATA_BLOCKS: u32 = 150;

/// What `append_line` does when the chain must grow but the section is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendOverflow {
    /// Fail with `StorageFull` and leave the message unchanged.
    #[default]
    Error,
    /// Report success without writing anything, as legacy systems do.
    Drop,
}

/// Configuration supplied when opening a [`super::MessageStore`].
#[derive(Clone)]
pub struct StoreOptions {
    /// Number of sections `save` scans before giving up.
    pub max_sections: u32,
    /// Data blocks a new file is pre-extended to hold.
    pub initial_data_blocks: u32,
    /// Whether to take an exclusive advisory lock on the file per operation.
    pub advisory_lock: bool,
    /// Behavior when an append cannot get an overflow block.
    pub append_overflow: AppendOverflow,
    /// Whether to fsync the file after each mutating operation.
    pub sync_writes: bool,
    /// Optional observer notified after every successful mutation.
    pub observer: Option<Arc<dyn ChangeObserver>>,
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("max_sections", &self.max_sections)
            .field("initial_data_blocks", &self.initial_data_blocks)
            .field("advisory_lock", &self.advisory_lock)
            .field("append_overflow", &self.append_overflow)
            .field("sync_writes", &self.sync_writes)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_sections: LEGACY_MAX_SECTIONS,
            initial_data_blocks: DEFAULT_INITIAL_DATA_BLOCKS,
            advisory_lock: true,
            append_overflow: AppendOverflow::Error,
            sync_writes: false,
            observer: None,
        }
    }
}

impl StoreOptions {
    /// Sets how many sections `save` may scan.
    pub fn max_sections(mut self, sections: u32) -> Self {
        self.max_sections = sections;
        self
    }

    /// Sets the preallocation of newly created files, in data blocks.
    pub fn initial_data_blocks(mut self, blocks: u32) -> Self {
        self.initial_data_blocks = blocks;
        self
    }

    /// Enables or disables the advisory file lock.
    pub fn advisory_lock(mut self, enabled: bool) -> Self {
        self.advisory_lock = enabled;
        self
    }

    /// Sets the append overflow policy.
    pub fn append_overflow(mut self, policy: AppendOverflow) -> Self {
        self.append_overflow = policy;
        self
    }

    /// Enables or disables fsync after each mutation.
    pub fn sync_writes(mut self, enabled: bool) -> Self {
        self.sync_writes = enabled;
        self
    }

    /// Sets the change observer.
    pub fn observer(mut self, observer: Arc<dyn ChangeObserver>) -> Self {
        self.observer = Some(observer);
        self
    }
}
