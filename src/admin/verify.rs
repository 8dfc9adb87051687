use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::admin::options::AdminOpenOptions;
use crate::admin::util::with_message_file;
use crate::admin::Result;
use crate::primitives::io::FileIo;
use crate::storage::gat::{is_block, materialized_sections, peek_section, save_section, GatTable};
use crate::types::{MessagePointer, GAT_ENTRIES, GAT_FREE, GAT_TERMINAL};

const MAX_FINDINGS: usize = 64;

/// Whether verification may write its repairs back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyMode {
    /// Report problems only; the file is not modified.
    Check,
    /// Report problems and save the repaired allocation tables.
    Repair,
}

/// Indicates the severity level of a verification finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifySeverity {
    /// Informational message about the verification process.
    Info,
    /// Space was leaked but no message text is affected.
    Warning,
    /// A message's text is damaged or missing.
    Error,
}

/// Represents a single issue discovered during verification.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyFinding {
    /// The severity level of this finding.
    pub severity: VerifySeverity,
    /// Index into the pointer list of the affected message, if any.
    pub message: Option<usize>,
    /// Human-readable description of the issue.
    pub detail: String,
}

/// Statistics collected during verification.
#[derive(Clone, Debug, Default, Serialize)]
pub struct VerifyCounts {
    /// Sections present in the file.
    pub sections: u32,
    /// Type-2 pointers examined.
    pub messages_checked: u64,
    /// Blocks reachable from surviving messages after repair.
    pub blocks_referenced: u64,
    /// Chains cut short at a damaged block.
    pub chains_truncated: u64,
    /// Allocated blocks no message reaches.
    pub lost_clusters: u64,
}

/// Complete report of a verification run.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyReport {
    /// Mode the verification ran in.
    pub mode: VerifyMode,
    /// True when no message was found damaged.
    pub success: bool,
    /// Issues discovered (capped).
    pub findings: Vec<VerifyFinding>,
    /// Indices of messages whose text is gone; the index records pointing at
    /// them should be deleted by the caller.
    pub dead_messages: Vec<usize>,
    /// Counters for the examined structures.
    pub counts: VerifyCounts,
    /// Whether repaired tables were written to the file.
    pub changes_written: bool,
}

impl VerifyReport {
    /// Renders the report as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Unclaimed,
    Owned(usize),
    Collided,
    Dangling,
}

struct Section {
    table: GatTable,
    state: Vec<BlockState>,
    dirty: bool,
}

/// Cross-checks the chains of `pointers` against the message file at `path`.
///
/// Every type-2 pointer's chain is walked and each block is claimed by its
/// message. A block claimed twice is a collision; a chain stepping into a
/// free block is dangling. Messages damaged at their first block are
/// reported dead, others are truncated before the damaged block. Finally
/// every allocated block that no surviving message reaches is freed as a
/// lost cluster. In [`VerifyMode::Repair`] the rebuilt tables are saved.
///
/// # Errors
///
/// Returns an error if the file is missing or I/O fails.
pub fn verify(
    path: impl AsRef<Path>,
    pointers: &[MessagePointer],
    opts: &AdminOpenOptions,
    mode: VerifyMode,
) -> Result<VerifyReport> {
    let path = path.as_ref();
    with_message_file(path, opts, |io| {
        let count = materialized_sections(io.len()?);
        let mut sections = Vec::with_capacity(count as usize);
        for section in 0..count {
            sections.push(Section {
                table: peek_section(io, section)?,
                state: vec![BlockState::Unclaimed; GAT_ENTRIES],
                dirty: false,
            });
        }

        let mut findings = Vec::new();
        let mut counts = VerifyCounts {
            sections: count,
            ..VerifyCounts::default()
        };
        let mut dead = Vec::new();

        claim_chains(pointers, &mut sections, &mut findings, &mut dead, &mut counts);
        cut_damaged_chains(pointers, &mut sections, &mut findings, &mut dead, &mut counts);
        free_lost_clusters(pointers, &dead, &mut sections, &mut findings, &mut counts);

        let success = !findings
            .iter()
            .any(|f: &VerifyFinding| f.severity == VerifySeverity::Error);
        let any_dirty = sections.iter().any(|s| s.dirty);
        let mut changes_written = false;
        if mode == VerifyMode::Repair && any_dirty {
            for section in sections.iter().filter(|s| s.dirty) {
                save_section(io, &section.table)?;
            }
            io.sync_all()?;
            changes_written = true;
            info!(
                path = %path.display(),
                dead = dead.len(),
                truncated = counts.chains_truncated,
                lost = counts.lost_clusters,
                "admin.verify.repaired"
            );
        }
        findings.truncate(MAX_FINDINGS);
        Ok(VerifyReport {
            mode,
            success,
            findings,
            dead_messages: dead,
            counts,
            changes_written,
        })
    })
}

fn claim_chains(
    pointers: &[MessagePointer],
    sections: &mut [Section],
    findings: &mut Vec<VerifyFinding>,
    dead: &mut Vec<usize>,
    counts: &mut VerifyCounts,
) {
    for (idx, ptr) in pointers.iter().enumerate() {
        if !ptr.is_disk() {
            continue;
        }
        counts.messages_checked += 1;
        let Some(section) = sections.get_mut(ptr.section() as usize) else {
            push(
                findings,
                VerifySeverity::Error,
                Some(idx),
                format!("points at section {} beyond end of file", ptr.section()),
            );
            dead.push(idx);
            continue;
        };
        if !is_block(ptr.head()) {
            push(
                findings,
                VerifySeverity::Error,
                Some(idx),
                "has no head block".to_string(),
            );
            dead.push(idx);
            continue;
        }
        let mut prev: Option<u16> = None;
        let mut current = ptr.head();
        while is_block(current) {
            let slot = current as usize;
            match section.state[slot] {
                BlockState::Owned(owner) if owner == idx => {
                    // Chain loops back into itself; end it at the previous block.
                    if let Some(prev) = prev {
                        section.table.set(prev, GAT_TERMINAL);
                        section.dirty = true;
                    }
                    counts.chains_truncated += 1;
                    push(
                        findings,
                        VerifySeverity::Error,
                        Some(idx),
                        format!("chain loops at block {current}, truncating"),
                    );
                    break;
                }
                BlockState::Owned(_) | BlockState::Collided => {
                    section.state[slot] = BlockState::Collided;
                    break;
                }
                BlockState::Dangling => break,
                BlockState::Unclaimed => {}
            }
            if section.table.get(current) == GAT_FREE {
                section.state[slot] = BlockState::Dangling;
                break;
            }
            section.state[slot] = BlockState::Owned(idx);
            prev = Some(current);
            current = section.table.get(current);
        }
    }
}

fn cut_damaged_chains(
    pointers: &[MessagePointer],
    sections: &mut [Section],
    findings: &mut Vec<VerifyFinding>,
    dead: &mut Vec<usize>,
    counts: &mut VerifyCounts,
) {
    for (idx, ptr) in pointers.iter().enumerate() {
        if !ptr.is_disk() || dead.contains(&idx) {
            continue;
        }
        let Some(section) = sections.get_mut(ptr.section() as usize) else {
            continue;
        };
        let mut prev: Option<u16> = None;
        let mut current = ptr.head();
        let mut hops = 0usize;
        while is_block(current) && hops < GAT_ENTRIES {
            let detail = match section.state[current as usize] {
                BlockState::Collided => format!("collided on block {current}"),
                BlockState::Dangling => format!("points to unallocated block {current}"),
                _ => {
                    prev = Some(current);
                    current = section.table.get(current);
                    hops += 1;
                    continue;
                }
            };
            match prev {
                None => {
                    push(
                        findings,
                        VerifySeverity::Error,
                        Some(idx),
                        format!("{detail}, first block of message, removing"),
                    );
                    dead.push(idx);
                }
                Some(prev) => {
                    push(
                        findings,
                        VerifySeverity::Error,
                        Some(idx),
                        format!("{detail}, truncating message"),
                    );
                    section.table.set(prev, GAT_TERMINAL);
                    section.dirty = true;
                    counts.chains_truncated += 1;
                }
            }
            break;
        }
    }
}

fn free_lost_clusters(
    pointers: &[MessagePointer],
    dead: &[usize],
    sections: &mut [Section],
    findings: &mut Vec<VerifyFinding>,
    counts: &mut VerifyCounts,
) {
    let mut reachable: Vec<Vec<bool>> = sections
        .iter()
        .map(|_| vec![false; GAT_ENTRIES])
        .collect();
    for (idx, ptr) in pointers.iter().enumerate() {
        if !ptr.is_disk() || dead.contains(&idx) {
            continue;
        }
        let Some(section) = sections.get(ptr.section() as usize) else {
            continue;
        };
        let marks = &mut reachable[ptr.section() as usize];
        let mut current = ptr.head();
        while is_block(current) && !marks[current as usize] {
            marks[current as usize] = true;
            counts.blocks_referenced += 1;
            current = section.table.get(current);
        }
    }

    let mut lost = 0u64;
    for (number, (section, marks)) in sections.iter_mut().zip(&reachable).enumerate() {
        for block in 1..GAT_ENTRIES as u16 {
            if section.table.get(block) != GAT_FREE && !marks[block as usize] {
                section.table.set(block, GAT_FREE);
                section.dirty = true;
                lost += 1;
            }
        }
        if section.dirty {
            tracing::debug!(section = number, "admin.verify.section_changed");
        }
    }
    counts.lost_clusters = lost;
    if lost > 0 {
        push(
            findings,
            VerifySeverity::Warning,
            None,
            format!("{lost} lost clusters recovered"),
        );
    }
}

fn push(
    findings: &mut Vec<VerifyFinding>,
    severity: VerifySeverity,
    message: Option<usize>,
    detail: String,
) {
    warn!(?severity, pointer_index = ?message, detail = %detail, "admin.verify.finding");
    findings.push(VerifyFinding {
        severity,
        message,
        detail,
    });
}
