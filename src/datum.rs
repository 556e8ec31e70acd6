//! The stored key/value pair and the typed result of a `modify` mutation.

/// A single stored key/value pair. Keys and values are both opaque bytes; the engine never
/// inspects value contents except at join-specific boundaries (count/generic accumulators).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datum {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Datum {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Datum { key, value }
    }
}

/// Result of a `Table::modify` mutator closure.
///
/// Replaces the marker-byte-sentinel convention of the original (`is_erase_marker`,
/// `is_invalidate_marker` tests against reserved value prefixes) with a plain tagged enum, so
/// a stored value is never at risk of colliding with a sentinel encoding — see SPEC_FULL.md's
/// design notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
    /// No change; no notification fires.
    Keep,
    /// Upsert this value.
    Write(Vec<u8>),
    /// Remove the entry entirely.
    Erase,
    /// Force dependents to be recomputed on next validate, without changing the stored value.
    Invalidate,
}

/// What kind of event produced a notification to dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Insert,
    Update,
    Erase,
}
