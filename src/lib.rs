//! Block-chained message text storage for WWIV type-2 message areas.
//!
//! A message file is a sequence of sections, each a 4 KiB allocation table
//! followed by 2048 blocks of 512 bytes. [`storage::MessageStore`] saves,
//! reads, removes and appends to message texts; [`admin`] holds the offline
//! statistics and repair tools.

#![warn(missing_docs)]

pub mod admin;
pub mod config;
pub mod logging;
pub mod primitives;
pub mod storage;
pub mod types;

pub use config::{ConfigError, StoreConfig};
pub use storage::{AppendOverflow, MessageStore, StoreOptions};
pub use types::{MessagePointer, Result, StoreError};
