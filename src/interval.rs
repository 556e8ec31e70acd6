//! Range-keyed index over half-open byte-string intervals `[ibegin, iend)`.
//!
//! Ordered the way the original C++ `interval_comparator` orders tree nodes: primarily by
//! `ibegin`, ties broken by `iend`. Three query shapes are exposed, matching
//! `interval_tree::visit_contains`/`visit_overlaps`: containment of a point, containment of
//! a whole interval, and overlap with an interval.

use std::collections::BTreeMap;

pub type IndexId = u64;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval {
    pub ibegin: Vec<u8>,
    pub iend: Vec<u8>,
}

impl Interval {
    pub fn new(ibegin: Vec<u8>, iend: Vec<u8>) -> Self {
        debug_assert!(ibegin <= iend, "interval endpoints out of order");
        Interval { ibegin, iend }
    }

    pub fn contains_point(&self, p: &[u8]) -> bool {
        self.ibegin.as_slice() <= p && p < self.iend.as_slice()
    }

    pub fn contains(&self, other: &Interval) -> bool {
        self.ibegin <= other.ibegin && other.iend <= self.iend
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.ibegin < other.iend && other.ibegin < self.iend
    }
}

/// An ordered multimap from `Interval` to `V`, queryable by point/contains/overlaps.
///
/// Backed by a `BTreeMap<(ibegin, iend, id), V>` rather than a balanced tree with an augmented
/// subtree-max field: see `DESIGN.md` for why `iset::IntervalMap` (the teacher's own go-to for
/// this shape of index) doesn't fit variable-length byte-string keys. Entries are stored in
/// `(ibegin, iend)` order, so a left-to-right scan from the query's lower bound can stop as soon
/// as a candidate's `ibegin` reaches the query's `iend` — the same early-exit the original's
/// `visit_right` predicate encodes, just expressed over an ordered map instead of tree pointers.
pub struct IntervalIndex<V> {
    entries: BTreeMap<(Vec<u8>, Vec<u8>, IndexId), V>,
    locations: BTreeMap<IndexId, (Vec<u8>, Vec<u8>)>,
    next_id: IndexId,
}

impl<V> Default for IntervalIndex<V> {
    fn default() -> Self {
        IntervalIndex {
            entries: BTreeMap::new(),
            locations: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<V> IntervalIndex<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, interval: Interval, value: V) -> IndexId {
        let id = self.next_id;
        self.next_id += 1;
        self.locations
            .insert(id, (interval.ibegin.clone(), interval.iend.clone()));
        self.entries
            .insert((interval.ibegin, interval.iend, id), value);
        id
    }

    pub fn remove(&mut self, id: IndexId) -> Option<V> {
        let (ibegin, iend) = self.locations.remove(&id)?;
        self.entries.remove(&(ibegin, iend, id))
    }

    pub fn get(&self, id: IndexId) -> Option<&V> {
        let (ibegin, iend) = self.locations.get(&id)?;
        self.entries.get(&(ibegin.clone(), iend.clone(), id))
    }

    pub fn get_mut(&mut self, id: IndexId) -> Option<&mut V> {
        let (ibegin, iend) = self.locations.get(&id)?.clone();
        self.entries.get_mut(&(ibegin, iend, id))
    }

    /// All entries whose interval contains `p`, in ascending `(ibegin, iend)` order.
    pub fn visit_contains_point(&self, p: &[u8], mut f: impl FnMut(IndexId, &Interval, &V)) {
        for ((ibegin, iend, id), v) in self.entries.iter() {
            if ibegin.as_slice() > p {
                break;
            }
            if iend.as_slice() > p {
                let iv = Interval::new(ibegin.clone(), iend.clone());
                f(*id, &iv, v);
            }
        }
    }

    /// All entries whose interval fully contains `query`.
    pub fn visit_contains_interval(&self, query: &Interval, mut f: impl FnMut(IndexId, &Interval, &V)) {
        for ((ibegin, iend, id), v) in self.entries.iter() {
            if ibegin.as_slice() > &query.ibegin[..] {
                break;
            }
            if iend.as_slice() >= query.iend.as_slice() {
                let iv = Interval::new(ibegin.clone(), iend.clone());
                f(*id, &iv, v);
            }
        }
    }

    /// All entries overlapping `query`, ascending `(ibegin, iend)` order.
    pub fn visit_overlaps(&self, query: &Interval, mut f: impl FnMut(IndexId, &Interval, &V)) {
        for ((ibegin, iend, id), v) in self.entries.iter() {
            if ibegin.as_slice() >= query.iend.as_slice() {
                break;
            }
            let iv = Interval::new(ibegin.clone(), iend.clone());
            if iv.overlaps(query) {
                f(*id, &iv, v);
            }
        }
    }

    /// Snapshot of ids+intervals overlapping `query`. Used when the caller's callback needs to
    /// mutate this index or an owner of it mid-walk (see `table::Table::notify`), since Rust's
    /// borrow checker won't allow a live immutable borrow of `self` across such a callback the
    /// way the original's raw-pointer tree traversal could get away with.
    pub fn snapshot_overlaps(&self, query: &Interval) -> Vec<(IndexId, Interval)> {
        let mut out = Vec::new();
        self.visit_overlaps(query, |id, iv, _| out.push((id, iv.clone())));
        out
    }

    pub fn snapshot_contains_point(&self, p: &[u8]) -> Vec<(IndexId, Interval)> {
        let mut out = Vec::new();
        self.visit_contains_point(p, |id, iv, _| out.push((id, iv.clone())));
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.values_mut()
    }
}
