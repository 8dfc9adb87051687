use std::path::Path;

use serde::Serialize;

use crate::admin::options::AdminOpenOptions;
use crate::admin::util::with_message_file;
use crate::admin::Result;
use crate::primitives::io::FileIo;
use crate::storage::gat::{materialized_sections, peek_section};
use crate::types::USABLE_BLOCKS;

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub path: String,
    pub file_size_bytes: u64,
    pub sections: Vec<SectionStats>,
    pub totals: BlockTotals,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionStats {
    pub section: u32,
    pub free_blocks: usize,
    pub used_blocks: usize,
    pub chains: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BlockTotals {
    pub sections: u32,
    pub free_blocks: usize,
    pub used_blocks: usize,
    pub chains: usize,
}

impl StatsReport {
    /// Renders the report as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub fn stats(path: impl AsRef<Path>, opts: &AdminOpenOptions) -> Result<StatsReport> {
    let path = path.as_ref();
    with_message_file(path, opts, |io| {
        let file_size_bytes = io.len()?;
        let count = materialized_sections(file_size_bytes);
        let mut sections = Vec::with_capacity(count as usize);
        let mut totals = BlockTotals {
            sections: count,
            ..BlockTotals::default()
        };
        for section in 0..count {
            let table = peek_section(io, section)?;
            let free_blocks = table.free_count();
            let stats = SectionStats {
                section,
                free_blocks,
                used_blocks: USABLE_BLOCKS - free_blocks,
                chains: table.terminal_count(),
            };
            totals.free_blocks += stats.free_blocks;
            totals.used_blocks += stats.used_blocks;
            totals.chains += stats.chains;
            sections.push(stats);
        }
        Ok(StatsReport {
            path: path.display().to_string(),
            file_size_bytes,
            sections,
            totals,
        })
    })
}
