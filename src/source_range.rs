//! Live dependencies from a source key-range to the sink keys derived from it.

use smallvec::{smallvec, SmallVec};

use crate::datum::{Datum, Modification, NotifyKind};
use crate::interval::Interval;
use crate::join::{count_from_bytes, count_to_bytes, GenericAccumKind, Join, JoinId, JoinValueAccum, JoinValueKind};
use crate::pattern::Match;
use crate::server::Server;

/// Partial `Match`es this range was registered under. Most joins only ever see one outer
/// binding reach a given source sub-range; `SmallVec` avoids a heap allocation for that case.
/// A binding may still leave some sink slots unresolved (e.g. a single-source join whose only
/// linking slot lives in this very source pattern) — those get filled in per datum in `notify`,
/// mirroring the original's `join_->expand(s, d->key())` byte-copy from the matched row into the
/// sink template (see `examples/original_source/src/pqserver.cc`'s `*SourceRange::notify`).
pub type ResultKeys = SmallVec<[Match; 1]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRangeKind {
    Copy,
    Count,
    Generic(GenericAccumKind),
}

#[derive(Debug, Clone)]
pub struct SourceRange {
    pub interval: Interval,
    pub join: JoinId,
    pub joinpos: usize,
    pub resultkeys: ResultKeys,
    pub kind: SourceRangeKind,
}

impl SourceRange {
    pub fn new(
        interval: Interval,
        join: JoinId,
        joinpos: usize,
        resultkeys: ResultKeys,
        kind: SourceRangeKind,
    ) -> Self {
        SourceRange {
            interval,
            join,
            joinpos,
            resultkeys,
            kind,
        }
    }

    /// Builds the `SourceRange` registered at the back-source position of `join`, carrying `m`
    /// (the binding gathered so far) forward as the seed every matching datum completes.
    /// Mirrors `SourceRange::make`'s dispatch on join-value type in the original.
    pub fn make(interval: Interval, join: &Join, joinpos: usize, m: &Match) -> Self {
        let kind = match join.value_kind {
            JoinValueKind::CopyLast => SourceRangeKind::Copy,
            JoinValueKind::CountMatch => SourceRangeKind::Count,
            JoinValueKind::Generic(k) => SourceRangeKind::Generic(k),
        };
        SourceRange::new(interval, join.id, joinpos, smallvec![m.clone()], kind)
    }

    /// Folds another range's seed bindings into this one, for the "fold into an existing range
    /// with the same join" path in `Server::add_source_range`.
    pub fn merge_resultkeys(&mut self, other: ResultKeys) {
        for m in other {
            if !self.resultkeys.contains(&m) {
                self.resultkeys.push(m);
            }
        }
    }

    /// Completes each seed binding against `datum.key` (binding whatever slots this source
    /// position still leaves open) and applies the resulting sink key change. Dispatch mirrors
    /// `CopySourceRange::notify`/`CountSourceRange::notify`/`JVSourceRange::notify` in the
    /// original almost line for line; the per-seed completion step is this crate's equivalent of
    /// `join_->expand(s.mutable_udata(), d->key())`.
    pub fn notify(&self, datum: &Datum, kind_event: NotifyKind, server: &mut Server) {
        let Some(join) = server.join(self.join).cloned() else {
            return;
        };
        let source = &join.sources[self.joinpos];
        let mut sinks: SmallVec<[Vec<u8>; 1]> = smallvec![];
        for seed in &self.resultkeys {
            let mut m = seed.clone();
            if source.match_key(&datum.key, &mut m) {
                if let Some(sink_key) = join.sink_key(&m) {
                    sinks.push(sink_key);
                }
            }
        }
        match self.kind {
            SourceRangeKind::Copy => {
                for sink in &sinks {
                    match kind_event {
                        NotifyKind::Insert | NotifyKind::Update => {
                            server.insert(sink.clone(), datum.value.clone());
                        }
                        NotifyKind::Erase => {
                            server.erase(sink);
                        }
                    }
                }
            }
            SourceRangeKind::Count => {
                let delta: i64 = match kind_event {
                    NotifyKind::Insert => 1,
                    NotifyKind::Erase => -1,
                    NotifyKind::Update => 0,
                };
                if delta != 0 {
                    for sink in &sinks {
                        server.modify(sink, |old| {
                            let n = count_from_bytes(old) + delta;
                            if n <= 0 {
                                Modification::Erase
                            } else {
                                Modification::Write(count_to_bytes(n))
                            }
                        });
                    }
                }
            }
            SourceRangeKind::Generic(gk) => match kind_event {
                NotifyKind::Insert | NotifyKind::Update => {
                    for sink in &sinks {
                        server.modify(sink, |old| {
                            let mut acc = JoinValueAccum::seed(gk, old);
                            acc.fold(&datum.value);
                            match acc.into_bytes() {
                                Some(b) => Modification::Write(b),
                                None => Modification::Keep,
                            }
                        });
                    }
                }
                NotifyKind::Erase => {
                    // Sum/min/max are not all invertible — min/max in particular cannot be
                    // decremented by retracting one contributing row. Rather than guess, force
                    // the sink to be recomputed from the remaining source rows on next read.
                    // Deliberate deviation from the original's `JVSourceRange::notify`, which
                    // assumes sum-like invertibility unconditionally; see DESIGN.md.
                    server.invalidate_dependents(&self.interval.ibegin, &self.interval.iend);
                }
            },
        }
    }
}
