//! Ordered key/value store with optional triecut routing into nested sub-tables.

use std::collections::BTreeMap;

use ahash::AHashSet;

use crate::datum::Datum;
use crate::error::EngineError;

/// One entry in a `Table`'s ordered store: either primary data, or a nested sub-table reached
/// by a fixed-length key prefix (the triecut).
#[derive(Debug)]
pub enum Entry {
    Leaf(Datum),
    Table(Box<Table>),
}

/// An ordered store of `Entry`s, keyed by the suffix of the original key remaining after any
/// ancestor triecuts have been stripped off. `triecut == 0` means this table holds data
/// directly; `triecut > 0` means keys of length `>= triecut` are routed into a nested `Table`
/// keyed by their first `triecut` bytes.
///
/// `source_ranges`/`join_ranges` are *not* fields here — per SPEC_FULL.md section 4.4 they live
/// only on the topmost triecut-root for a key family, which this crate models as the single
/// `TableFamily` wrapper in `server.rs` rather than duplicating interval trees at every nesting
/// level.
#[derive(Debug, Default)]
pub struct Table {
    pub triecut: usize,
    store: BTreeMap<Vec<u8>, Entry>,
    hash_shortcut: Option<AHashSet<Vec<u8>>>,
    pub ninsert: u64,
    pub nmodify: u64,
    pub nmodify_nohint: u64,
    pub nerase: u64,
    pub nvalidate: u64,
    pub nsubtables: u64,
}

impl Table {
    pub fn new() -> Self {
        Table::default()
    }

    /// Installs a triecut, if this table is still empty. Installing over existing data is
    /// refused (triecut is immutable once data exists) — callers should check the return value
    /// and log a warning rather than treat it as fatal.
    pub fn set_triecut(&mut self, triecut: usize, hash_shortcut_max: usize) -> bool {
        if !self.store.is_empty() || triecut == 0 {
            return triecut == self.triecut;
        }
        self.triecut = triecut;
        if triecut <= hash_shortcut_max {
            self.hash_shortcut = Some(AHashSet::default());
        }
        true
    }

    /// Upserts `key` (already stripped of ancestor triecut prefixes) with `value`. Returns the
    /// previous value, if any, and whether this was an insert (`true`) or an update (`false`).
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) -> (bool, Option<Vec<u8>>) {
        if self.triecut > 0 && key.len() >= self.triecut {
            let prefix = key[..self.triecut].to_vec();
            let suffix = &key[self.triecut..];
            let child = self.child_mut(&prefix);
            self.ninsert += 1;
            return child.insert(suffix, value);
        }
        self.ninsert += 1;
        match self.store.get_mut(key) {
            Some(Entry::Leaf(datum)) => {
                let old = std::mem::replace(&mut datum.value, value);
                (false, Some(old))
            }
            Some(Entry::Table(_)) => {
                // A leaf key colliding with an existing subtable prefix is a routing bug, not a
                // caller error: correct triecut selection makes this unreachable.
                panic!(
                    "{}",
                    EngineError::TriecutViolation {
                        key_len: key.len(),
                        triecut: self.triecut,
                    }
                );
            }
            None => {
                self.store
                    .insert(key.to_vec(), Entry::Leaf(Datum::new(key.to_vec(), value)));
                (true, None)
            }
        }
    }

    pub fn erase(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        if self.triecut > 0 && key.len() >= self.triecut {
            let prefix = key[..self.triecut].to_vec();
            let suffix = &key[self.triecut..];
            let removed = match self.store.get_mut(&prefix) {
                Some(Entry::Table(t)) => {
                    self.nerase += 1;
                    t.erase(suffix)
                }
                _ => None,
            };
            return removed;
        }
        self.nerase += 1;
        match self.store.remove(key) {
            Some(Entry::Leaf(d)) => Some(d.value),
            Some(other) => {
                self.store.insert(key.to_vec(), other);
                None
            }
            None => None,
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        if self.triecut > 0 && key.len() >= self.triecut {
            let prefix = &key[..self.triecut];
            let suffix = &key[self.triecut..];
            return match self.store.get(prefix) {
                Some(Entry::Table(t)) => t.get(suffix),
                _ => None,
            };
        }
        match self.store.get(key) {
            Some(Entry::Leaf(d)) => Some(&d.value),
            _ => None,
        }
    }

    fn child_mut(&mut self, prefix: &[u8]) -> &mut Table {
        if let Some(shortcut) = &mut self.hash_shortcut {
            shortcut.insert(prefix.to_vec());
        }
        if !self.store.contains_key(prefix) {
            self.store
                .insert(prefix.to_vec(), Entry::Table(Box::new(Table::new())));
            self.nsubtables += 1;
        }
        match self.store.get_mut(prefix).unwrap() {
            Entry::Table(t) => t,
            Entry::Leaf(_) => {
                panic!(
                    "{}",
                    EngineError::TriecutViolation {
                        key_len: prefix.len(),
                        triecut: self.triecut,
                    }
                )
            }
        }
    }

    /// The local lower bound for entries stored directly in this (sub)table, given that its
    /// reassembled keys all begin with `prefix_so_far`: entries at this level sort by their own
    /// local bytes, which agree with full-key order exactly because the shared prefix cancels
    /// out of the comparison. Returns `None` when `first` sorts at or past the end of this
    /// entire (sub)table's keyspace, meaning nothing here can qualify.
    ///
    /// When `triecut > 0`, every local key is either a subtable name of exactly `triecut` bytes
    /// or a leaf shorter than that (§4.4's invariant), so only the first `triecut` bytes of the
    /// derived bound are meaningful here — anything past that belongs to a nested table's own
    /// comparison, not this level's. Truncating keeps a subtable from being skipped just because
    /// `first` asks for something deeper inside it than the subtable name alone can express.
    fn local_lower_bound(&self, prefix_so_far: &[u8], first: &[u8]) -> Option<Vec<u8>> {
        let bound = if first <= prefix_so_far {
            Vec::new()
        } else if first.starts_with(prefix_so_far) {
            first[prefix_so_far.len()..].to_vec()
        } else {
            return None;
        };
        if self.triecut > 0 && bound.len() > self.triecut {
            Some(bound[..self.triecut].to_vec())
        } else {
            Some(bound)
        }
    }

    /// Counts stored leaves whose full (suffix-reassembled) key falls in `[first, last)`.
    /// Entries are visited in `(ibegin, iend)`-consistent ascending order (the `BTreeMap`'s
    /// native order), so the scan can stop the instant a candidate's full key reaches `last`.
    pub fn count_range(&self, prefix_so_far: &[u8], first: &[u8], last: &[u8]) -> usize {
        let Some(lo) = self.local_lower_bound(prefix_so_far, first) else {
            return 0;
        };
        let mut count = 0;
        for (k, entry) in self.store.range(lo..) {
            let mut full = prefix_so_far.to_vec();
            full.extend_from_slice(k);
            if full.as_slice() >= last {
                break;
            }
            match entry {
                Entry::Leaf(_) => count += 1,
                Entry::Table(t) => count += t.count_range(&full, first, last),
            }
        }
        count
    }

    /// Collects stored leaves (full key + value) whose reassembled key falls in
    /// `[first, last)`, appending them to `out` in ascending key order. Same pruning as
    /// `count_range`.
    pub fn collect_range(&self, prefix_so_far: &[u8], first: &[u8], last: &[u8], out: &mut Vec<Datum>) {
        let Some(lo) = self.local_lower_bound(prefix_so_far, first) else {
            return;
        };
        for (k, entry) in self.store.range(lo..) {
            let mut full = prefix_so_far.to_vec();
            full.extend_from_slice(k);
            if full.as_slice() >= last {
                break;
            }
            match entry {
                Entry::Leaf(d) => out.push(Datum::new(full, d.value.clone())),
                Entry::Table(t) => t.collect_range(&full, first, last, out),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.store
            .values()
            .map(|e| match e {
                Entry::Leaf(_) => 1,
                Entry::Table(t) => t.len(),
            })
            .sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_then_get_roundtrips() {
        let mut t = Table::new();
        t.insert(b"a", b"1".to_vec());
        t.insert(b"b", b"2".to_vec());
        assert_eq!(t.get(b"a"), Some(&b"1"[..]));
        assert_eq!(t.get(b"b"), Some(&b"2"[..]));
        assert_eq!(t.get(b"c"), None);
    }

    #[test]
    fn erase_removes_entry() {
        let mut t = Table::new();
        t.insert(b"a", b"1".to_vec());
        assert_eq!(t.erase(b"a"), Some(b"1".to_vec()));
        assert_eq!(t.get(b"a"), None);
        assert_eq!(t.erase(b"a"), None);
    }

    #[test]
    fn triecut_routes_into_subtables() {
        let mut t = Table::new();
        assert!(t.set_triecut(6, 8));
        for i in 0..100u32 {
            let key = format!("{:06}x", i);
            t.insert(key.as_bytes(), b"v".to_vec());
        }
        assert_eq!(t.nsubtables, 100);
        assert_eq!(t.len(), 100);
    }

    #[test]
    fn triecut_refuses_to_change_once_data_exists() {
        let mut t = Table::new();
        t.insert(b"abcdef", b"1".to_vec());
        assert!(!t.set_triecut(3, 8));
        assert_eq!(t.triecut, 0);
    }

    #[test]
    fn collect_range_finds_a_deep_key_inside_a_triecut_subtable() {
        // regression check: `first` reaches past a subtable's own (short) name into a key that
        // only exists deeper inside it, so a naive `first`-as-range-bound would skip the
        // subtable entirely.
        let mut t = Table::new();
        t.set_triecut(3, 8);
        t.insert(b"000zzz", b"a".to_vec());
        t.insert(b"000aaa", b"b".to_vec());
        t.insert(b"001aaa", b"c".to_vec());

        let mut out = Vec::new();
        t.collect_range(b"", b"000bbb", b"001zzz", &mut out);
        let mut keys: Vec<Vec<u8>> = out.into_iter().map(|d| d.key).collect();
        keys.sort();
        assert_eq!(keys, vec![b"000zzz".to_vec(), b"001aaa".to_vec()]);
    }

    #[test]
    fn count_range_matches_collect_range_len() {
        let mut t = Table::new();
        t.set_triecut(3, 8);
        for k in [&b"000aaa"[..], b"000zzz", b"001aaa", b"002xyz"] {
            t.insert(k, b"v".to_vec());
        }
        let mut out = Vec::new();
        t.collect_range(b"", b"000bbb", b"002000", &mut out);
        assert_eq!(t.count_range(b"", b"000bbb", b"002000"), out.len());
    }
}
