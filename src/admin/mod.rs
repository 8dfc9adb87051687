#![forbid(unsafe_code)]

//! Message file administration and maintenance utilities.
//!
//! This module provides the offline tools an operator runs against a type-2
//! message file: allocation statistics and chain verification with optional
//! repair.

mod error;
mod options;
mod stats;
mod util;
mod verify;

/// Error types for administrative operations.
///
/// Defines error conditions that can occur during administrative tasks.
pub use error::{AdminError, Result};

/// Configuration options for opening a message file in admin mode.
pub use options::AdminOpenOptions;

/// Statistics collection and reporting.
///
/// Reports per-section free, used and chain counts of a message file.
pub use stats::{stats, BlockTotals, SectionStats, StatsReport};

/// Message chain verification.
///
/// Cross-checks message pointers against the allocation tables, reports
/// collisions, dangling links and lost clusters, and optionally repairs them.
pub use verify::{verify, VerifyCounts, VerifyFinding, VerifyMode, VerifyReport, VerifySeverity};

/// Utility for running a closure against a locked message file.
pub use util::with_message_file;
