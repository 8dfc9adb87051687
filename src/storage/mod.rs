//! Type-2 message text storage.
//!
//! Message texts live in 512-byte blocks grouped into sections of 2048
//! blocks, each section headed by an allocation table that chains a
//! message's blocks together.

/// Allocation table of a section and the functions that load and save it.
pub mod gat;

mod block;
mod metrics;
mod observer;
mod options;
mod store;

/// Block layout of message text.
pub use block::{blocks_needed, decode_message, encode_message};

/// The message store itself.
pub use store::MessageStore;

/// Block traffic counters.
pub use metrics::{StoreMetrics, StoreMetricsSnapshot};

/// Change notification hooks.
pub use observer::{default_observer, ChangeCounter, ChangeObserver, NoopObserver};

/// Store configuration options.
pub use options::{AppendOverflow, StoreOptions, DEFAULT_INITIAL_DATA_BLOCKS};

pub use gat::GatTable;
