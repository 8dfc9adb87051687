#![forbid(unsafe_code)]

//! Generic Allocation Table handling.
//!
//! Each section of a message file starts with a 4096-byte table of 2048
//! little-endian `u16` entries, one per data block of the section. An entry is
//! `0` for a free block, `0xFFFF` for the last block of a chain, or the index
//! of the next block in the chain. Entry 0 is never allocated.

use tracing::debug;

use crate::primitives::io::FileIo;
use crate::types::{
    Result, StoreError, BLOCK_SIZE, GAT_ENTRIES, GAT_FREE, GAT_SECTION_SIZE, GAT_TERMINAL,
    SECTION_STRIDE, USABLE_BLOCKS,
};

/// Byte offset of the start of `section` (its table).
pub fn section_offset(section: u32) -> u64 {
    u64::from(section) * SECTION_STRIDE
}

/// Byte offset of data block `block` in `section`.
pub fn block_offset(section: u32, block: u16) -> u64 {
    section_offset(section) + GAT_SECTION_SIZE as u64 + u64::from(block) * BLOCK_SIZE as u64
}

/// Number of sections whose table is fully present in a file of `len` bytes.
pub fn materialized_sections(len: u64) -> u32 {
    let mut count = 0u32;
    while section_offset(count) + GAT_SECTION_SIZE as u64 <= len {
        count += 1;
    }
    count
}

/// Returns true when `index` addresses a data block (`1..=2047`).
pub fn is_block(index: u16) -> bool {
    index > 0 && (index as usize) < GAT_ENTRIES
}

/// In-memory copy of one section's allocation table.
#[derive(Clone, PartialEq, Eq)]
pub struct GatTable {
    section: u32,
    entries: Box<[u16; GAT_ENTRIES]>,
}

impl std::fmt::Debug for GatTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatTable")
            .field("section", &self.section)
            .field("free", &self.free_count())
            .finish()
    }
}

impl GatTable {
    /// All-free table for `section`.
    pub fn empty(section: u32) -> Self {
        Self {
            section,
            entries: Box::new([GAT_FREE; GAT_ENTRIES]),
        }
    }

    /// Decodes a serialized table.
    pub fn decode(section: u32, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < GAT_SECTION_SIZE {
            return Err(StoreError::Invalid("allocation table truncated"));
        }
        let mut table = Self::empty(section);
        for (entry, raw) in table
            .entries
            .iter_mut()
            .zip(bytes[..GAT_SECTION_SIZE].chunks_exact(2))
        {
            *entry = u16::from_le_bytes([raw[0], raw[1]]);
        }
        Ok(table)
    }

    /// Serializes the table into its 4096-byte on-disk form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(GAT_SECTION_SIZE);
        for entry in self.entries.iter() {
            out.extend_from_slice(&entry.to_le_bytes());
        }
        out
    }

    /// Section the table belongs to.
    pub fn section(&self) -> u32 {
        self.section
    }

    /// Raw entry for `index`.
    pub fn get(&self, index: u16) -> u16 {
        self.entries[index as usize % GAT_ENTRIES]
    }

    /// Overwrites the entry for block `index`.
    pub fn set(&mut self, index: u16, value: u16) {
        self.entries[index as usize % GAT_ENTRIES] = value;
    }

    /// Returns true when data block `index` is unallocated.
    pub fn is_free(&self, index: u16) -> bool {
        self.get(index) == GAT_FREE
    }

    /// Number of unallocated data blocks.
    pub fn free_count(&self) -> usize {
        self.entries[1..].iter().filter(|&&e| e == GAT_FREE).count()
    }

    /// Number of chains in the section (blocks marked terminal).
    pub fn terminal_count(&self) -> usize {
        self.entries[1..]
            .iter()
            .filter(|&&e| e == GAT_TERMINAL)
            .count()
    }

    /// Collects up to `wanted` free block indices in ascending order.
    pub fn free_blocks(&self, wanted: usize) -> Vec<u16> {
        (1..GAT_ENTRIES as u16)
            .filter(|&i| self.is_free(i))
            .take(wanted)
            .collect()
    }

    /// Links `blocks` into a chain in the given order, marking the last terminal.
    pub fn link(&mut self, blocks: &[u16]) {
        for pair in blocks.windows(2) {
            self.set(pair[0], pair[1]);
        }
        if let Some(&last) = blocks.last() {
            self.set(last, GAT_TERMINAL);
        }
    }

    /// Block indices of the chain starting at `head`, in chain order.
    ///
    /// The walk stops at the first entry outside `1..=2047` (normally the
    /// terminal marker). A walk longer than the section's usable blocks can
    /// only come from a cycle and is reported as [`StoreError::CorruptChain`].
    pub fn chain(&self, head: u16) -> Result<Vec<u16>> {
        let mut blocks = Vec::new();
        let mut current = head;
        while is_block(current) {
            if blocks.len() == USABLE_BLOCKS {
                return Err(StoreError::CorruptChain {
                    section: self.section,
                    head,
                });
            }
            blocks.push(current);
            current = self.get(current);
        }
        Ok(blocks)
    }

    /// Frees every block of the chain starting at `head`, returning the count.
    pub fn free_chain(&mut self, head: u16) -> Result<usize> {
        let blocks = self.chain(head)?;
        for &block in &blocks {
            self.set(block, GAT_FREE);
        }
        Ok(blocks.len())
    }
}

/// Loads the table of `section`, materializing the section when the file
/// does not reach it yet.
///
/// A section whose start lies beyond the end of file is created by extending
/// the file to the section start; a section whose table is missing or cut
/// short gets an all-free table. Either way the fresh table is written out
/// before it is returned.
pub fn load_section(io: &dyn FileIo, section: u32) -> Result<GatTable> {
    let offset = section_offset(section);
    let len = io.len()?;
    if len < offset {
        io.set_len(offset)?;
    }
    if len < offset + GAT_SECTION_SIZE as u64 {
        let table = GatTable::empty(section);
        save_section(io, &table)?;
        debug!(section, file_len = len, "gat.section.materialized");
        return Ok(table);
    }
    read_table(io, section, offset)
}

/// Loads the table of `section` without modifying the file.
///
/// A section the file does not reach reads as all free.
pub fn peek_section(io: &dyn FileIo, section: u32) -> Result<GatTable> {
    let offset = section_offset(section);
    if io.len()? < offset + GAT_SECTION_SIZE as u64 {
        return Ok(GatTable::empty(section));
    }
    read_table(io, section, offset)
}

/// Writes the full table back to its section.
pub fn save_section(io: &dyn FileIo, table: &GatTable) -> Result<()> {
    io.write_at(section_offset(table.section()), &table.encode())
}

fn read_table(io: &dyn FileIo, section: u32, offset: u64) -> Result<GatTable> {
    let mut buf = vec![0u8; GAT_SECTION_SIZE];
    let read = io.read_at(offset, &mut buf)?;
    if read < GAT_SECTION_SIZE {
        return Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "allocation table shorter than expected",
        )));
    }
    GatTable::decode(section, &buf)
}
