//! The recursive source-walk that materializes sink entries on demand, and the gap computation
//! that decides which parts of a requested range still need it.

use crate::datum::{Datum, NotifyKind};
use crate::interval::Interval;
use crate::join::JoinId;
use crate::pattern::Match;
use crate::server::Server;
use crate::sink_range::SinkRange;
use crate::source_range::SourceRange;

/// Computes the sub-intervals of `[first, last)` not covered by any unexpired, non-`need_update`
/// `SinkRange` in `ranges`. A simplified stand-in for the original's switch-bitmap (`sw_`)
/// algorithm in `ServerRangeSet::push_back`/`hard_visit`: that machinery tracks many candidate
/// ranges live at once via a bitmask as a scan cursor sweeps forward; here, since a single
/// `validate` call only ever consults the `SinkRange`s of one `JoinRange` at a time, an
/// interval-merge produces the same gaps with less bookkeeping. See DESIGN.md.
pub fn compute_gaps(ranges: &[SinkRange], first: &[u8], last: &[u8], now_us: u64) -> Vec<(Vec<u8>, Vec<u8>)> {
    let query = Interval::new(first.to_vec(), last.to_vec());
    let mut covered: Vec<(Vec<u8>, Vec<u8>)> = ranges
        .iter()
        .filter(|r| r.is_valid(now_us) && r.interval.overlaps(&query))
        .map(|r| {
            let cb = if r.interval.ibegin > query.ibegin {
                r.interval.ibegin.clone()
            } else {
                query.ibegin.clone()
            };
            let ce = if r.interval.iend < query.iend {
                r.interval.iend.clone()
            } else {
                query.iend.clone()
            };
            (cb, ce)
        })
        .collect();
    covered.sort();

    let mut gaps = Vec::new();
    let mut cursor = first.to_vec();
    for (cb, ce) in covered {
        if cb > cursor {
            gaps.push((cursor.clone(), cb.clone()));
        }
        if ce > cursor {
            cursor = ce;
        }
    }
    if cursor < last.to_vec() {
        gaps.push((cursor, last.to_vec()));
    }
    gaps
}

/// Materializes every gap of `[first, last)` not already validly covered for `join_id`'s sink
/// range, then records the whole interval as valid. `now_us` is supplied by the caller (see
/// `Server::validate`) rather than read from a clock in this module, since the engine has no
/// ambient wall-clock dependency — see the Open Question resolution in SPEC_FULL.md section 9.
pub fn validate_join_range(server: &mut Server, join_id: JoinId, first: &[u8], last: &[u8], now_us: u64) {
    let existing = server.sink_ranges_for(join_id, first, last);
    let gaps = compute_gaps(&existing, first, last, now_us);
    for (gf, gl) in gaps {
        let Some(join) = server.join(join_id) else { continue };
        let mut mf = join.sink.bind_prefix(&gf);
        let mut ml = join.sink.bind_prefix(&gl);
        validate_step(server, join_id, &gf, &gl, 0, &mut mf, &mut ml);
    }
    let staleness = server.join_staleness_us(join_id);
    let expires_at = if staleness == 0 { 0 } else { now_us + staleness };
    server.record_valid_sink_range(join_id, first, last, expires_at);
}

/// The recursive per-source-position walk described in SPEC_FULL.md section 4.7. `mf`/`ml`
/// bracket the partial match at the lower/upper edge of the range currently being validated;
/// they diverge only while a not-yet-fully-bound slot is still open, and a sibling-datum loop
/// mutates them in place with save/restore rather than cloning, matching the original's hot-loop
/// idiom (see the design note on this in SPEC_FULL.md section 9).
fn validate_step(
    server: &mut Server,
    join_id: JoinId,
    first: &[u8],
    last: &[u8],
    pos: usize,
    mf: &mut Match,
    ml: &mut Match,
) {
    let join = match server.join(join_id) {
        Some(j) => j.clone(),
        None => return,
    };
    let source = &join.sources[pos];
    let is_back = pos == join.back_source_pos();

    let kf = source.expand_first(mf);
    let kl = source.expand_last(ml);

    // Recurse upstream first: the data this source position reads may itself be derived.
    server.validate(&kf, &kl);

    let source_range = if is_back {
        Some(SourceRange::make(Interval::new(kf.clone(), kl.clone()), &join, pos, mf))
    } else {
        None
    };

    let datums = server.snapshot_leaves_in_range(&kf, &kl);
    for datum in &datums {
        if datum.key.len() != source.key_length() {
            continue;
        }
        if is_back {
            if let Some(sr) = &source_range {
                sr.notify(datum, NotifyKind::Insert, server);
            }
        } else {
            let snap_f = mf.save();
            let snap_l = ml.save();
            if source.match_key(&datum.key, mf) && source.match_key(&datum.key, ml) {
                validate_step(server, join_id, first, last, pos + 1, mf, ml);
            }
            mf.restore(snap_f);
            ml.restore(snap_l);
        }
    }

    if let Some(sr) = source_range {
        if join.maintained {
            server.add_source_range(sr);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sink_range::SinkRange;

    fn iv(a: &[u8], b: &[u8]) -> Interval {
        Interval::new(a.to_vec(), b.to_vec())
    }

    #[test]
    fn no_ranges_means_whole_query_is_a_gap() {
        let gaps = compute_gaps(&[], b"a", b"z", 0);
        assert_eq!(gaps, vec![(b"a".to_vec(), b"z".to_vec())]);
    }

    #[test]
    fn fully_covered_range_has_no_gaps() {
        let ranges = vec![SinkRange::new(iv(b"a", b"z"), 0)];
        let gaps = compute_gaps(&ranges, b"a", b"z", 0);
        assert!(gaps.is_empty());
    }

    #[test]
    fn partial_coverage_leaves_a_gap_on_each_side() {
        let ranges = vec![SinkRange::new(iv(b"c", b"f"), 0)];
        let gaps = compute_gaps(&ranges, b"a", b"z", 0);
        assert_eq!(gaps, vec![(b"a".to_vec(), b"c".to_vec()), (b"f".to_vec(), b"z".to_vec())]);
    }

    #[test]
    fn expired_range_counts_as_a_gap() {
        let mut r = SinkRange::new(iv(b"a", b"z"), 100);
        r.need_update = false;
        let ranges = vec![r];
        let gaps = compute_gaps(&ranges, b"a", b"z", 200);
        assert_eq!(gaps, vec![(b"a".to_vec(), b"z".to_vec())]);
    }
}
