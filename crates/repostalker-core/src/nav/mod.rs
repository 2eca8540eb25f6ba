//! Logical back-stack for screens that are not OS navigation entries.
//!
//! Entries are stored as `"{seq}|{id}"`. The sequence number increases on
//! every push and is never reused. Every successful pop is broadcast on the
//! back-event channel.

pub mod navigator;

use thiserror::Error;

pub use navigator::Navigator;

/// Separates the sequence number from the logical id in a stack entry.
pub const NAV_DELIMITER: char = '|';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    #[error("Cannot pop from empty stack")]
    EmptyStack,

    #[error("Navigator is no longer running")]
    Closed,
}

/// The logical id of a stack entry: everything after the last delimiter.
pub fn strip_sequence(entry: &str) -> &str {
    match entry.rfind(NAV_DELIMITER) {
        Some(idx) => &entry[idx + NAV_DELIMITER.len_utf8()..],
        None => entry,
    }
}
