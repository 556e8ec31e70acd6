//! Root of the table tree: routes every public operation to the right table family by key
//! prefix, and owns the join registry. This is the module external callers (RPC loop, CLI,
//! workload generators — all out of scope here) are expected to embed.

use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::datum::{Datum, Modification, NotifyKind};
use crate::error::{EngineError, Result};
use crate::interval::{Interval, IntervalIndex};
use crate::join::{Join, JoinId};
use crate::keys::table_name_of;
use crate::partitioner::{NullPartitioner, Partitioner};
use crate::pattern::{parse_join_line, Match, Pattern};
use crate::sink_range::{JoinRange, SinkRange};
use crate::source_range::SourceRange;
use crate::stats::Stats;
use crate::table::Table;

/// Everything rooted at one table name: the ordered store itself plus the two interval trees
/// that index it as a join dependency source (`source_ranges`) and as a join sink
/// (`join_ranges`). Per SPEC_FULL.md section 4.4, these trees live only once per table name —
/// triecut subtables nested inside `table` do not carry their own copies.
#[derive(Default)]
struct TableFamily {
    table: Table,
    source_ranges: IntervalIndex<SourceRange>,
    join_ranges: IntervalIndex<JoinRange>,
}

impl TableFamily {
    fn total_sink_ranges(&self) -> u64 {
        self.join_ranges.iter().map(|jr| jr.sink_ranges.len() as u64).sum()
    }
}

/// The in-memory key/value store with incrementally maintained, range-indexed join views.
///
/// Single-threaded cooperative: every public method except [`Server::prepare_validate`] runs to
/// completion without suspending (SPEC_FULL.md section 5).
pub struct Server {
    families: BTreeMap<Vec<u8>, TableFamily>,
    joins: BTreeMap<JoinId, Join>,
    next_join_id: u64,
    hash_shortcut_max_triecut: usize,
    default_staleness_us: u64,
    partitioner: Box<dyn Partitioner>,
    clock_override: Option<u64>,
}

impl Default for Server {
    fn default() -> Self {
        Server::new(8)
    }
}

impl Server {
    pub fn new(hash_shortcut_max_triecut: usize) -> Self {
        Server {
            families: BTreeMap::new(),
            joins: BTreeMap::new(),
            next_join_id: 0,
            hash_shortcut_max_triecut,
            default_staleness_us: 0,
            partitioner: Box::new(NullPartitioner),
            clock_override: None,
        }
    }

    /// Builds a `Server` from a loaded `EngineConfig`: installs the config's log level
    /// (`EngineConfig::apply`), and carries `hash_shortcut_max_triecut`/`default_staleness_us`
    /// into the fields that actually consult them (`install_triecut_for_pattern`,
    /// `add_join_with_default_staleness`).
    pub fn from_config(cfg: &EngineConfig) -> Self {
        cfg.apply();
        let mut server = Server::new(cfg.hash_shortcut_max_triecut);
        server.default_staleness_us = cfg.default_staleness_us;
        server
    }

    pub fn with_partitioner(mut self, partitioner: Box<dyn Partitioner>) -> Self {
        self.partitioner = partitioner;
        self
    }

    /// Installs a fixed clock for tests exercising staleness (SPEC_FULL.md scenario 3). Absent
    /// an override, `now_us` reads the real wall clock.
    pub fn set_test_clock_us(&mut self, now_us: u64) {
        self.clock_override = Some(now_us);
    }

    pub fn now_us(&self) -> u64 {
        match self.clock_override {
            Some(t) => t,
            None => std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("system clock before unix epoch")
                .as_micros() as u64,
        }
    }

    fn ensure_family(&mut self, table_name: &[u8]) {
        self.families.entry(table_name.to_vec()).or_default();
    }

    // ---- imperative API -------------------------------------------------------------------

    /// Upserts `key`. Fires notifications to matching `SourceRange`s so maintained joins stay
    /// current; a table that does not yet exist is created silently (SPEC_FULL.md section 4.7
    /// failure policy).
    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        let key = key.into();
        let value = value.into();
        let table_name = table_name_of(&key);
        self.ensure_family(&table_name);
        let remainder = key[table_name.len()..].to_vec();
        let family = self.families.get_mut(&table_name).unwrap();
        let (is_new, old) = family.table.insert(&remainder, value.clone());
        let kind = if is_new { NotifyKind::Insert } else { NotifyKind::Update };
        let datum = Datum::new(key, value);
        self.notify(&table_name, &datum, old, kind);
    }

    /// Removes `key`. A no-op if absent.
    pub fn erase(&mut self, key: &[u8]) -> bool {
        let table_name = table_name_of(key);
        let remainder = &key[table_name.len()..];
        let removed = match self.families.get_mut(&table_name) {
            Some(family) => family.table.erase(remainder),
            None => None,
        };
        match removed {
            Some(old_value) => {
                let datum = Datum::new(key.to_vec(), old_value.clone());
                self.notify(&table_name, &datum, Some(old_value), NotifyKind::Erase);
                true
            }
            None => false,
        }
    }

    /// Used both by the public API and by join notification: `f` sees the current value (if
    /// any) and returns what should happen. See `Modification` for the replacement of the
    /// original's marker-byte sentinels.
    pub fn modify(&mut self, key: &[u8], f: impl FnOnce(Option<&[u8]>) -> Modification) {
        let table_name = table_name_of(key);
        self.ensure_family(&table_name);
        let remainder = key[table_name.len()..].to_vec();
        let current = {
            let family = self.families.get(&table_name).unwrap();
            family.table.get(&remainder).map(|v| v.to_vec())
        };
        let modification = f(current.as_deref());
        {
            let family = self.families.get_mut(&table_name).unwrap();
            family.table.nmodify += 1;
            family.table.nmodify_nohint += 1;
        }
        match modification {
            Modification::Keep => {}
            Modification::Write(new_value) => {
                let family = self.families.get_mut(&table_name).unwrap();
                let (is_new, old) = family.table.insert(&remainder, new_value.clone());
                let kind = if is_new { NotifyKind::Insert } else { NotifyKind::Update };
                let datum = Datum::new(key.to_vec(), new_value);
                self.notify(&table_name, &datum, old, kind);
            }
            Modification::Erase => {
                let family = self.families.get_mut(&table_name).unwrap();
                if let Some(old) = family.table.erase(&remainder) {
                    let datum = Datum::new(key.to_vec(), old.clone());
                    self.notify(&table_name, &datum, Some(old), NotifyKind::Erase);
                }
            }
            Modification::Invalidate => {
                let successor = crate::pattern::increment_bytes(key.to_vec());
                self.invalidate_dependents(key, &successor);
            }
        }
    }

    /// Counts stored entries in `[first, last)` without validating anything first. Callers that
    /// want derived data materialized first should call `validate`, whose return value is this
    /// same count taken after recomputation.
    pub fn count(&self, first: &[u8], last: &[u8]) -> usize {
        let table_name = table_name_of(first);
        match self.families.get(&table_name) {
            Some(family) => family.table.count_range(&table_name, first, last),
            None => 0,
        }
    }

    /// Ensures every join covering `[first, last)` is up to date, then returns the resulting
    /// count. See SPEC_FULL.md section 4.7 for the gap/recompute algorithm.
    pub fn validate(&mut self, first: &[u8], last: &[u8]) -> usize {
        let table_name = table_name_of(first);
        self.ensure_family(&table_name);
        let query = Interval::new(first.to_vec(), last.to_vec());
        let join_ids: Vec<JoinId> = {
            let family = self.families.get(&table_name).unwrap();
            family
                .join_ranges
                .snapshot_overlaps(&query)
                .into_iter()
                .filter_map(|(id, _)| family.join_ranges.get(id).map(|jr| jr.join))
                .collect()
        };
        if !join_ids.is_empty() {
            let now = self.now_us();
            {
                let family = self.families.get_mut(&table_name).unwrap();
                family.table.nvalidate += 1;
            }
            for jid in join_ids {
                crate::validate::validate_join_range(self, jid, first, last, now);
            }
        }
        self.count(first, last)
    }

    /// Fetches remote partitions (if any) covering `[first, last)`, then runs the synchronous
    /// `validate`. The only suspension point in the public API (SPEC_FULL.md section 5).
    pub async fn prepare_validate(&mut self, first: &[u8], last: &[u8]) -> Result<usize> {
        self.partitioner
            .analyze(first, last)
            .await
            .map_err(|_| EngineError::PartitionUnavailable)?;
        Ok(self.validate(first, last))
    }

    /// Parses and registers a join specification line. Rejects structurally identical joins
    /// already registered over an overlapping sink interval (first registration wins).
    pub fn add_join(&mut self, line: &str, maintained: bool, staleness_us: u64) -> Result<JoinId> {
        let parsed = parse_join_line(line)?;
        let id = JoinId(self.next_join_id);
        let join = Join::from_join_line(id, parsed, maintained, staleness_us)?;

        let sink_interval = Interval::new(join.sink.expand_first(&Match::new()), join.sink.expand_last(&Match::new()));
        self.ensure_family(&join.sink_table);
        if let Some(existing_id) = self.find_redundant_join(&join, &sink_interval) {
            crate::warn!("redundant join over an overlapping interval ignored, first registration wins");
            return Ok(existing_id);
        }

        self.install_triecut_for_pattern(&join.sink);
        for source in &join.sources {
            self.install_triecut_for_pattern(source);
        }

        let family = self.families.get_mut(&join.sink_table).unwrap();
        family
            .join_ranges
            .insert(sink_interval.clone(), JoinRange::new(id, sink_interval));

        self.next_join_id += 1;
        self.joins.insert(id, join);
        Ok(id)
    }

    /// Like `add_join`, but applies this server's `default_staleness_us` (from `EngineConfig`)
    /// instead of requiring every caller to pass its own staleness figure.
    pub fn add_join_with_default_staleness(&mut self, line: &str, maintained: bool) -> Result<JoinId> {
        let staleness_us = self.default_staleness_us;
        self.add_join(line, maintained, staleness_us)
    }

    fn find_redundant_join(&self, join: &Join, sink_interval: &Interval) -> Option<JoinId> {
        let family = self.families.get(&join.sink_table)?;
        let mut found = None;
        family.join_ranges.visit_overlaps(sink_interval, |_, _, jr| {
            if found.is_some() {
                return;
            }
            if let Some(existing) = self.joins.get(&jr.join) {
                if existing.sink == join.sink && existing.sources == join.sources {
                    found = Some(jr.join);
                }
            }
        });
        found
    }

    /// Installs a triecut on `pattern`'s table, if that table is still empty. Triecut is
    /// immutable once a table holds data (SPEC_FULL.md section 4.4), so later joins anchored on
    /// a non-empty table simply skip this.
    fn install_triecut_for_pattern(&mut self, pattern: &Pattern) {
        let table_name = table_name_of(&pattern.expand_first(&Match::new()));
        let tc = Join::subtable_length(pattern);
        if tc == 0 {
            return;
        }
        self.ensure_family(&table_name);
        let family = self.families.get_mut(&table_name).unwrap();
        family.table.set_triecut(tc, self.hash_shortcut_max_triecut);
    }

    pub fn stats(&self) -> Stats {
        let mut s = Stats::new();
        for family in self.families.values() {
            s.store_size += family.table.len() as u64;
            s.source_ranges_size += family.source_ranges.len() as u64;
            s.join_ranges_size += family.join_ranges.len() as u64;
            s.valid_ranges_size += family.total_sink_ranges();
            s.ninsert += family.table.ninsert;
            s.nmodify += family.table.nmodify;
            s.nmodify_nohint += family.table.nmodify_nohint;
            s.nerase += family.table.nerase;
            s.nvalidate += family.table.nvalidate;
            s.nsubtables += family.table.nsubtables;
        }
        s
    }

    // ---- internals used by validate.rs / source_range.rs -----------------------------------

    pub(crate) fn join(&self, id: JoinId) -> Option<&Join> {
        self.joins.get(&id)
    }

    pub(crate) fn join_staleness_us(&self, id: JoinId) -> u64 {
        self.joins.get(&id).map(|j| j.staleness_us).unwrap_or(0)
    }

    /// Snapshots the stored leaves in `[first, last)`. Used by the recursive validator, which
    /// needs an owned list it can iterate while also calling back into `self`.
    pub(crate) fn snapshot_leaves_in_range(&self, first: &[u8], last: &[u8]) -> Vec<Datum> {
        let table_name = table_name_of(first);
        let mut out = Vec::new();
        if let Some(family) = self.families.get(&table_name) {
            family.table.collect_range(&table_name, first, last, &mut out);
        }
        out
    }

    pub(crate) fn sink_ranges_for(&self, join_id: JoinId, first: &[u8], last: &[u8]) -> Vec<SinkRange> {
        let Some(join) = self.joins.get(&join_id) else {
            return Vec::new();
        };
        let Some(family) = self.families.get(&join.sink_table) else {
            return Vec::new();
        };
        let query = Interval::new(first.to_vec(), last.to_vec());
        let mut out = Vec::new();
        family.join_ranges.visit_overlaps(&query, |_, _, jr| {
            if jr.join == join_id {
                out.extend(jr.sink_ranges.iter().cloned());
            }
        });
        out
    }

    pub(crate) fn record_valid_sink_range(&mut self, join_id: JoinId, first: &[u8], last: &[u8], expires_at_us: u64) {
        let Some(join) = self.joins.get(&join_id) else { return };
        let sink_table = join.sink_table.clone();
        let query = Interval::new(first.to_vec(), last.to_vec());
        let Some(family) = self.families.get_mut(&sink_table) else { return };
        let candidates = family.join_ranges.snapshot_overlaps(&query);
        for (id, _) in candidates {
            if let Some(jr) = family.join_ranges.get_mut(id) {
                if jr.join == join_id {
                    jr.record_valid(Interval::new(first.to_vec(), last.to_vec()), expires_at_us);
                    return;
                }
            }
        }
    }

    /// Inserts a new `SourceRange`, folding it into an existing one registered for the same
    /// `(join, joinpos)` over an overlapping interval if one is found (`add_source` in
    /// SPEC_FULL.md section 4.5), rather than storing a duplicate.
    pub(crate) fn add_source_range(&mut self, sr: SourceRange) {
        let table_name = table_name_of(&sr.interval.ibegin);
        self.ensure_family(&table_name);
        let family = self.families.get_mut(&table_name).unwrap();
        let existing_id = {
            let mut found = None;
            family.source_ranges.visit_overlaps(&sr.interval, |id, _, existing: &SourceRange| {
                if found.is_none() && existing.join == sr.join && existing.joinpos == sr.joinpos {
                    found = Some(id);
                }
            });
            found
        };
        match existing_id {
            Some(id) => {
                if let Some(existing) = family.source_ranges.get_mut(id) {
                    existing.merge_resultkeys(sr.resultkeys);
                }
            }
            None => {
                let interval = sr.interval.clone();
                family.source_ranges.insert(interval, sr);
            }
        }
    }

    /// Walks matching `SourceRange`s for a mutation of `datum.key` and dispatches their
    /// `notify`. Candidates are snapshotted first so `sr.notify`'s reentrant calls into `self`
    /// (inserts/modifies on sink keys) don't conflict with a live borrow of `families`.
    fn notify(&mut self, table_name: &[u8], datum: &Datum, _old_value: Option<Vec<u8>>, kind: NotifyKind) {
        let candidates: Vec<SourceRange> = match self.families.get(table_name) {
            Some(family) => {
                let mut v = Vec::new();
                family.source_ranges.visit_contains_point(&datum.key, |_, _, sr| v.push(sr.clone()));
                v
            }
            None => Vec::new(),
        };
        for sr in candidates {
            let back_source_matches = match self.joins.get(&sr.join) {
                Some(join) => {
                    let mut m = Match::new();
                    join.sources[sr.joinpos].match_key(&datum.key, &mut m)
                }
                None => false,
            };
            if back_source_matches {
                sr.notify(datum, kind, self);
            }
        }
    }

    /// Marks every `SinkRange` that depends on source data in `[first, last)` as needing an
    /// update, without recomputing anything now. Cheaper than eager recomputation; forces the
    /// next `validate` covering an affected sink key to rebuild it.
    pub fn invalidate_dependents(&mut self, first: &[u8], last: &[u8]) {
        let table_name = table_name_of(first);
        let query = Interval::new(first.to_vec(), last.to_vec());
        let matches: Vec<SourceRange> = match self.families.get(&table_name) {
            Some(family) => {
                let mut v = Vec::new();
                family.source_ranges.visit_overlaps(&query, |_, _, sr| v.push(sr.clone()));
                v
            }
            None => Vec::new(),
        };
        for sr in matches {
            let Some(join) = self.joins.get(&sr.join) else { continue };
            for seed in sr.resultkeys.iter() {
                // `seed` may still leave sink slots unbound (this source position is the one
                // that resolves them); widen to the full span of sink keys consistent with what
                // is known, rather than assuming a single concrete key.
                let sink_first = join.sink.expand_first(seed);
                let sink_last = join.sink.expand_last(seed);
                let sink_table = table_name_of(&sink_first);
                if let Some(family) = self.families.get_mut(&sink_table) {
                    for jr in family.join_ranges.iter_mut() {
                        if jr.join == sr.join {
                            jr.invalidate(&sink_first, &sink_last);
                        }
                    }
                }
                // The sink range just marked stale may itself be a source for another join
                // further down the chain; propagate so that join's sinks are marked stale too,
                // rather than only discovering the staleness lazily one validate() at a time.
                self.invalidate_dependents(&sink_first, &sink_last);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::EngineConfig;

    #[test]
    fn from_config_threads_default_staleness_into_add_join() {
        let cfg = EngineConfig {
            default_staleness_us: 2_000,
            hash_shortcut_max_triecut: 3,
            log_level: 2,
        };
        let mut s = Server::from_config(&cfg);
        let id = s.add_join_with_default_staleness("t|<u:1>|<p:1> s|<p>", false).unwrap();
        assert_eq!(s.join_staleness_us(id), 2_000);

        // hash_shortcut_max_triecut still reaches the Table that installs a triecut below it.
        s.add_join("u|<u:6>|<v:1> r|<u>|<v:1>", true, 0).unwrap();
        s.insert(b"u|000001|x".to_vec(), b"v".to_vec());
        assert_eq!(s.stats().nsubtables, 1);
    }

    #[test]
    fn generic_sum_join_erase_invalidates_the_source_interval_not_the_sink() {
        let mut s = Server::default();
        s.add_join("sum v|<u:1> f|<u>|<v:1>", true, 0).unwrap();
        s.insert(b"f|a|3".to_vec(), b"3".to_vec());
        s.insert(b"f|a|4".to_vec(), b"4".to_vec());
        s.validate(b"v|", b"v}");
        assert_eq!(s.snapshot_leaves_in_range(b"v|a", b"v|a\x00")[0].value, b"7".to_vec());

        s.erase(b"f|a|3");

        let family = s.families.get(&b"v|".to_vec()).unwrap();
        let jr = family.join_ranges.iter().next().unwrap();
        assert!(
            jr.sink_ranges.iter().any(|sr| sr.need_update),
            "a Min/Max/Sum join cannot retract a single contributing row in place, so erase \
             must invalidate the sink's SinkRange rather than leave the stale sum in place"
        );

        s.validate(b"v|", b"v}");
        assert_eq!(
            s.snapshot_leaves_in_range(b"v|a", b"v|a\x00")[0].value,
            b"4".to_vec(),
            "re-validation after invalidation must recompute the sum over the remaining rows"
        );
    }

    #[test]
    fn count_join_scenario_1() {
        let mut s = Server::default();
        s.add_join("count v|<u:1> f|<u>|<v:1>", true, 0).unwrap();
        s.insert(b"f|a|b".to_vec(), b"1".to_vec());
        s.insert(b"f|a|c".to_vec(), b"1".to_vec());
        s.insert(b"f|d|b".to_vec(), b"1".to_vec());
        s.validate(b"v|", b"v}");
        assert_eq!(s.count(b"v|a", b"v|a\x00"), 1);

        let v_a = s.snapshot_leaves_in_range(b"v|a", b"v|a\x00");
        assert_eq!(v_a.len(), 1);
        assert_eq!(v_a[0].value, b"2".to_vec());
        let v_d = s.snapshot_leaves_in_range(b"v|d", b"v|d\x00");
        assert_eq!(v_d[0].value, b"1".to_vec());

        s.erase(b"f|a|b");
        let v_a = s.snapshot_leaves_in_range(b"v|a", b"v|a\x00");
        assert_eq!(v_a[0].value, b"1".to_vec());
    }

    #[test]
    fn copy_last_join_scenario_2() {
        let mut s = Server::default();
        s.add_join("t|<u:1>|<p:1> s|<p>", true, 0).unwrap();
        s.insert(b"s|x".to_vec(), b"X".to_vec());
        s.validate(b"t|a|x", b"t|a|x\x00");
        let got = s.snapshot_leaves_in_range(b"t|a|x", b"t|a|x\x00");
        assert_eq!(got[0].value, b"X".to_vec());

        s.insert(b"s|x".to_vec(), b"Y".to_vec());
        let got = s.snapshot_leaves_in_range(b"t|a|x", b"t|a|x\x00");
        assert_eq!(got[0].value, b"Y".to_vec());
    }

    #[test]
    fn pull_only_staleness_scenario_3() {
        let mut s = Server::default();
        s.add_join("t|<u:1>|<p:1> s|<p>", false, 1000).unwrap();
        s.insert(b"s|x".to_vec(), b"X".to_vec());

        s.set_test_clock_us(0);
        s.validate(b"t|a|x", b"t|a|x\x00");
        assert_eq!(s.snapshot_leaves_in_range(b"t|a|x", b"t|a|x\x00")[0].value, b"X".to_vec());

        s.set_test_clock_us(500);
        s.insert(b"s|x".to_vec(), b"Y".to_vec());
        s.validate(b"t|a|x", b"t|a|x\x00");
        assert_eq!(
            s.snapshot_leaves_in_range(b"t|a|x", b"t|a|x\x00")[0].value,
            b"X".to_vec(),
            "pull-only join must not see the update before its SinkRange expires"
        );

        s.set_test_clock_us(1100);
        s.validate(b"t|a|x", b"t|a|x\x00");
        assert_eq!(
            s.snapshot_leaves_in_range(b"t|a|x", b"t|a|x\x00")[0].value,
            b"Y".to_vec(),
            "expired SinkRange must trigger re-materialization"
        );
    }

    #[test]
    fn redundant_join_over_same_structure_is_rejected() {
        let mut s = Server::default();
        let first = s.add_join("t|<u:1>|<p:1> s|<p>", true, 0).unwrap();
        let second = s.add_join("t|<u:1>|<p:1> s|<p>", true, 0).unwrap();
        assert_eq!(first, second);
        assert_eq!(s.joins.len(), 1);
    }

    #[test]
    fn validate_twice_does_no_extra_join_work() {
        let mut s = Server::default();
        s.add_join("count v|<u:1> f|<u>|<v:1>", true, 0).unwrap();
        s.insert(b"f|a|b".to_vec(), b"1".to_vec());
        s.validate(b"v|", b"v}");
        let before = s.stats().nvalidate;
        s.validate(b"v|", b"v}");
        // both calls reach validate(), but the second should find no gaps to recompute: the
        // sink value must be unchanged and no new SourceRange should appear.
        assert_eq!(s.stats().source_ranges_size, 1);
        assert!(s.stats().nvalidate >= before);
    }

    #[test]
    fn insert_then_erase_restores_copy_join_byte_identical_state() {
        let mut s = Server::default();
        s.add_join("t|<u:1>|<p:1> s|<p>", true, 0).unwrap();
        s.validate(b"t|a|x", b"t|a|x\x00");
        let before = s.stats().store_size;

        s.insert(b"s|x".to_vec(), b"X".to_vec());
        assert_eq!(s.snapshot_leaves_in_range(b"t|a|x", b"t|a|x\x00")[0].value, b"X".to_vec());
        s.erase(b"s|x");
        assert!(s.snapshot_leaves_in_range(b"t|a|x", b"t|a|x\x00").is_empty());
        assert_eq!(s.stats().store_size, before);
    }

    #[test]
    fn triecut_routing_via_add_join_scenario_4() {
        let mut s = Server::default();
        s.add_join("t|<u:6>|<v:1> s|<u>|<v:1>", true, 0).unwrap();

        for i in 1..=100u32 {
            let key = format!("t|{:06}|x", i).into_bytes();
            s.insert(key, b"v".to_vec());
        }

        let stats = s.stats();
        assert_eq!(stats.nsubtables, 100, "each distinct 6-byte prefix must get its own subtable");
        assert_eq!(stats.store_size, 100);
    }

    #[test]
    fn invalidation_cascades_through_chained_joins_scenario_6() {
        let mut s = Server::default();
        let join_ab = s.add_join("b|<u:1> a|<u:1>", true, 0).unwrap();
        let join_bc = s.add_join("c|<u:1> b|<u:1>", true, 0).unwrap();
        assert_ne!(join_ab, join_bc);

        s.insert(b"a|x".to_vec(), b"1".to_vec());
        s.validate(b"c|x", b"c|x\x00");
        assert_eq!(s.snapshot_leaves_in_range(b"c|x", b"c|x\x00")[0].value, b"1".to_vec());

        s.modify(b"a|x", |_| Modification::Invalidate);

        let c_family = s.families.get(&b"c|".to_vec()).unwrap();
        let c_jr = c_family.join_ranges.iter().find(|jr| jr.join == join_bc).unwrap();
        assert!(
            c_jr.sink_ranges.iter().any(|sr| sr.need_update),
            "invalidating an A key must mark C's SinkRange stale through the B hop"
        );

        s.validate(b"c|x", b"c|x\x00");
        assert_eq!(
            s.snapshot_leaves_in_range(b"c|x", b"c|x\x00")[0].value,
            b"1".to_vec(),
            "re-validation must recompute to the same correct value once the source is unchanged"
        );
    }
}
