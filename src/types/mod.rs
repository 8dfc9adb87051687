#![forbid(unsafe_code)]

//! Shared types: the message pointer handle, on-disk layout constants and
//! the crate error type.

use std::fmt;

/// Number of entries in one section's allocation table.
pub const GAT_ENTRIES: usize = 2048;
/// Size in bytes of one serialized allocation table (2048 little-endian u16).
pub const GAT_SECTION_SIZE: usize = 4096;
/// Size in bytes of one data block.
pub const BLOCK_SIZE: usize = 512;
/// Distance in bytes between the starts of two consecutive sections.
pub const SECTION_STRIDE: u64 = (GAT_SECTION_SIZE + GAT_ENTRIES * BLOCK_SIZE) as u64;
/// Usable data blocks per section (block 0 is reserved).
pub const USABLE_BLOCKS: usize = GAT_ENTRIES - 1;

/// GAT entry value for a free block.
pub const GAT_FREE: u16 = 0;
/// GAT entry value for the final block of a chain.
pub const GAT_TERMINAL: u16 = 0xFFFF;

/// Byte marking the end of message text inside the final block (Control-Z).
pub const TERMINATOR: u8 = 0x1A;

/// Storage type of the GAT-backed disk store.
pub const STORAGE_TYPE_DISK: u8 = 2;

/// Section count scanned by `save` on legacy systems.
pub const LEGACY_MAX_SECTIONS: u32 = 1024;

/// Encoded length of a [`MessagePointer`] inside index records.
pub const MESSAGE_POINTER_LEN: usize = 5;

/// Errors produced by the message store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Underlying file failure.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// No section within the scan bound had enough free blocks.
    #[error("storage full: no section has {blocks_needed} free blocks")]
    StorageFull {
        /// Blocks the rejected write required.
        blocks_needed: usize,
    },
    /// The pointer does not address any stored text.
    #[error("message not found")]
    NotFound,
    /// A chain walk exceeded the number of blocks a section can hold.
    #[error("corrupt chain in section {section} starting at block {head}")]
    CorruptChain {
        /// Section holding the chain.
        section: u32,
        /// Head block of the chain.
        head: u16,
    },
    /// The caller passed something the store cannot act on.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Handle addressing one stored message text.
///
/// Higher-level index records (posts, e-mail) embed this value; it is the only
/// way callers refer to a message body. `stored_as` packs the section number
/// and the head block of the chain as `section * 2048 + head`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct MessagePointer {
    /// Storage tag. Only [`STORAGE_TYPE_DISK`] is backed by the store.
    pub storage_type: u8,
    /// Section and head block, packed.
    pub stored_as: u32,
}

impl MessagePointer {
    /// Builds a disk pointer for the chain starting at `head` in `section`.
    pub fn disk(section: u32, head: u16) -> Self {
        Self {
            storage_type: STORAGE_TYPE_DISK,
            stored_as: section * GAT_ENTRIES as u32 + u32::from(head),
        }
    }

    /// Returns true when the pointer addresses the GAT-backed store.
    pub fn is_disk(&self) -> bool {
        self.storage_type == STORAGE_TYPE_DISK
    }

    /// Section holding the chain.
    pub fn section(&self) -> u32 {
        self.stored_as / GAT_ENTRIES as u32
    }

    /// Head block index within the section.
    pub fn head(&self) -> u16 {
        (self.stored_as % GAT_ENTRIES as u32) as u16
    }

    /// Encodes the pointer as the packed 5-byte record layout
    /// (tag byte followed by little-endian `stored_as`).
    pub fn encode(&self) -> [u8; MESSAGE_POINTER_LEN] {
        let mut out = [0u8; MESSAGE_POINTER_LEN];
        out[0] = self.storage_type;
        out[1..].copy_from_slice(&self.stored_as.to_le_bytes());
        out
    }

    /// Decodes a pointer from the packed record layout.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MESSAGE_POINTER_LEN {
            return Err(StoreError::Invalid("message pointer truncated"));
        }
        let mut stored_as = [0u8; 4];
        stored_as.copy_from_slice(&bytes[1..MESSAGE_POINTER_LEN]);
        Ok(Self {
            storage_type: bytes[0],
            stored_as: u32::from_le_bytes(stored_as),
        })
    }
}

impl fmt::Display for MessagePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_disk() {
            write!(f, "type2:{}/{}", self.section(), self.head())
        } else {
            write!(f, "type{}:{}", self.storage_type, self.stored_as)
        }
    }
}
