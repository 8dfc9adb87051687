//! Low-level primitives the message store is built on.
//!
//! Includes positioned file I/O and the locking that serializes store
//! operations against a message area file.

/// Per-area serialization.
///
/// Process-wide area mutexes and advisory file locks.
pub mod concurrency;

/// I/O abstractions and utilities.
///
/// Positioned reads and writes against a message area file.
pub mod io;
