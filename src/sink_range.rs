//! Validated sink intervals (a.k.a. "validjoin" ranges in the original) and the join
//! registrations that own them.

use crate::interval::Interval;
use crate::join::JoinId;

/// A validated sub-interval of a join's sink range: reads within it are answered from stored
/// data without recomputation, until it expires or is explicitly invalidated.
#[derive(Debug, Clone)]
pub struct SinkRange {
    pub interval: Interval,
    pub expires_at_us: u64,
    pub need_update: bool,
    pub hint: Option<Vec<u8>>,
}

impl SinkRange {
    pub fn new(interval: Interval, expires_at_us: u64) -> Self {
        SinkRange {
            interval,
            expires_at_us,
            need_update: false,
            hint: None,
        }
    }

    pub fn has_expired(&self, now_us: u64) -> bool {
        self.expires_at_us != 0 && self.expires_at_us < now_us
    }

    pub fn is_valid(&self, now_us: u64) -> bool {
        !self.need_update && !self.has_expired(now_us)
    }

    pub fn update_hint(&mut self, key: &[u8]) {
        self.hint = Some(key.to_vec());
    }
}

/// A join's registration over a sink interval: the set of `SinkRange`s materialized so far.
/// Distinct from `Join` (the parsed spec in `join.rs`) — a `JoinRange` is the per-interval
/// bookkeeping object the validator consults to find gaps.
#[derive(Debug, Clone)]
pub struct JoinRange {
    pub join: JoinId,
    pub interval: Interval,
    pub sink_ranges: Vec<SinkRange>,
}

impl JoinRange {
    pub fn new(join: JoinId, interval: Interval) -> Self {
        JoinRange {
            join,
            interval,
            sink_ranges: Vec::new(),
        }
    }

    /// Marks every `SinkRange` overlapping `[first, last)` as needing an update. Idempotent:
    /// ranges already marked are left alone.
    pub fn invalidate(&mut self, first: &[u8], last: &[u8]) {
        let query = Interval::new(first.to_vec(), last.to_vec());
        for sr in self.sink_ranges.iter_mut() {
            if sr.interval.overlaps(&query) {
                sr.need_update = true;
            }
        }
    }

    pub fn record_valid(&mut self, interval: Interval, expires_at_us: u64) {
        self.sink_ranges.push(SinkRange::new(interval, expires_at_us));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn expiry_respects_zero_as_never() {
        let sr = SinkRange::new(Interval::new(vec![0], vec![1]), 0);
        assert!(!sr.has_expired(1_000_000));
    }

    #[test]
    fn expiry_fires_after_deadline() {
        let sr = SinkRange::new(Interval::new(vec![0], vec![1]), 100);
        assert!(!sr.has_expired(50));
        assert!(sr.has_expired(101));
    }

    #[test]
    fn invalidate_is_idempotent() {
        let mut jr = JoinRange::new(JoinId(0), Interval::new(vec![0], vec![10]));
        jr.record_valid(Interval::new(vec![0], vec![10]), 0);
        jr.invalidate(&[0], &[10]);
        assert!(jr.sink_ranges[0].need_update);
        jr.invalidate(&[0], &[10]);
        assert!(jr.sink_ranges[0].need_update);
    }
}
