//! Join specifications: a sink pattern plus one or more source patterns, together with the
//! aggregation flavor applied at the sink and its push/pull flags.

use crate::error::{EngineError, Result};
use crate::pattern::{JoinLine, Match, Pattern};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JoinId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericAccumKind {
    Sum,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinValueKind {
    /// Sink holds a verbatim copy of the back-source's value.
    CopyLast,
    /// Sink holds the count of matching source rows, as an ASCII decimal.
    CountMatch,
    /// Sink holds a generic accumulator (sum/min/max) over the source values as i64.
    Generic(GenericAccumKind),
}

impl JoinValueKind {
    fn from_verb(verb: Option<&str>) -> Result<Self> {
        Ok(match verb {
            None | Some("copy") => JoinValueKind::CopyLast,
            Some("count") => JoinValueKind::CountMatch,
            Some("sum") => JoinValueKind::Generic(GenericAccumKind::Sum),
            Some("min") => JoinValueKind::Generic(GenericAccumKind::Min),
            Some("max") => JoinValueKind::Generic(GenericAccumKind::Max),
            Some(other) => {
                return Err(EngineError::MalformedPattern(format!(
                    "unknown join assignment verb '{other}'"
                )))
            }
        })
    }
}

/// A join registration: derives sink keys from one or more source patterns.
#[derive(Debug, Clone)]
pub struct Join {
    pub id: JoinId,
    pub sink: Pattern,
    pub sources: Vec<Pattern>,
    pub value_kind: JoinValueKind,
    pub maintained: bool,
    pub staleness_us: u64,
    /// Table name the sink pattern routes to, cached at registration time so the validator and
    /// notifier don't re-derive it from an all-slots-unbound `expand_first` on every call.
    pub sink_table: Vec<u8>,
}

impl Join {
    pub fn from_join_line(id: JoinId, line: JoinLine, maintained: bool, staleness_us: u64) -> Result<Self> {
        let value_kind = JoinValueKind::from_verb(line.verb.as_deref())?;
        let sink_table = crate::keys::table_name_of(&line.sink.expand_first(&Match::new()));
        Ok(Join {
            id,
            sink: line.sink,
            sources: line.sources,
            value_kind,
            maintained,
            staleness_us,
            sink_table,
        })
    }

    /// The shortest *remainder* key prefix (i.e. after the table name has been stripped, the
    /// form `Table` itself stores and routes on) that fully determines a pattern's first slot:
    /// the fixed lead-in plus the first variable slot, minus however much of that lead-in is
    /// just the table name. Used to pick a table's triecut when a join anchoring that table is
    /// first registered (`SPEC_FULL.md` section 4.4) — `Server` always hands `Table` keys with
    /// the table name already stripped off, so a triecut measured from the start of the *whole*
    /// key would overshoot by exactly the table name's length.
    pub fn subtable_length(pattern: &Pattern) -> usize {
        let mut acc = 0usize;
        let mut found_slot = false;
        for part in &pattern.parts {
            match part {
                crate::pattern::Part::Literal(lit) => acc += lit.len(),
                crate::pattern::Part::Slot { len, .. } => {
                    acc += len;
                    found_slot = true;
                    break;
                }
            }
        }
        if !found_slot {
            return 0;
        }
        let table_name_len = crate::keys::table_name_of(&pattern.expand_first(&Match::new())).len();
        acc.saturating_sub(table_name_len)
    }

    /// Index of the back-source: the last source pattern, whose events actually produce a
    /// sink write once the full `Match` across all source positions is known.
    pub fn back_source_pos(&self) -> usize {
        self.sources.len() - 1
    }

    pub fn back_source(&self) -> &Pattern {
        &self.sources[self.back_source_pos()]
    }

    /// Substitutes `m`'s bindings into the sink pattern, producing a concrete sink key. Every
    /// slot in `self.sink` must be bound in `m` — callers only call this once the back-source
    /// has matched and the full chain of bindings is in hand.
    pub fn sink_key(&self, m: &Match) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(self.sink.key_length());
        for part in &self.sink.parts {
            match part {
                crate::pattern::Part::Literal(lit) => out.extend_from_slice(lit),
                crate::pattern::Part::Slot { name, .. } => out.extend_from_slice(m.get(name)?),
            }
        }
        Some(out)
    }
}

/// Parses a decimal count stored at a sink key, treating a missing value as zero.
pub fn count_from_bytes(bytes: Option<&[u8]>) -> i64 {
    bytes
        .and_then(|b| std::str::from_utf8(b).ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

pub fn count_to_bytes(n: i64) -> Vec<u8> {
    n.to_string().into_bytes()
}

/// Accumulator state for a `Generic` join, folded over the matching source rows of one sink
/// key. Built fresh per `validate`/notify pass; not persisted between calls.
#[derive(Debug, Clone, Copy)]
pub struct JoinValueAccum {
    kind: GenericAccumKind,
    value: Option<i64>,
}

impl JoinValueAccum {
    pub fn new(kind: GenericAccumKind) -> Self {
        JoinValueAccum { kind, value: None }
    }

    pub fn seed(kind: GenericAccumKind, existing: Option<&[u8]>) -> Self {
        let value = existing
            .and_then(|b| std::str::from_utf8(b).ok())
            .and_then(|s| s.parse().ok());
        JoinValueAccum { kind, value }
    }

    pub fn fold(&mut self, source_value: &[u8]) {
        let Ok(n) = std::str::from_utf8(source_value).unwrap_or("").parse::<i64>() else {
            return;
        };
        self.value = Some(match (self.value, self.kind) {
            (None, _) => n,
            (Some(cur), GenericAccumKind::Sum) => cur + n,
            (Some(cur), GenericAccumKind::Min) => cur.min(n),
            (Some(cur), GenericAccumKind::Max) => cur.max(n),
        });
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        self.value.map(|v| v.to_string().into_bytes())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pattern::parse_join_line;

    #[test]
    fn copy_join_is_the_default_verb() {
        let line = parse_join_line("t|<u:1>|<p:1> s|<p>").unwrap();
        let j = Join::from_join_line(JoinId(0), line, true, 0).unwrap();
        assert_eq!(j.value_kind, JoinValueKind::CopyLast);
        assert_eq!(j.back_source_pos(), 0);
    }

    #[test]
    fn count_join_accumulates_across_inserts_and_erases() {
        assert_eq!(count_from_bytes(None), 0);
        assert_eq!(count_from_bytes(Some(b"3")), 3);
        assert_eq!(count_to_bytes(2), b"2");
    }

    #[test]
    fn generic_sum_folds_multiple_source_rows() {
        let mut acc = JoinValueAccum::new(GenericAccumKind::Sum);
        acc.fold(b"3");
        acc.fold(b"4");
        assert_eq!(acc.into_bytes(), Some(b"7".to_vec()));
    }

    #[test]
    fn generic_max_tracks_largest_value_seen() {
        let mut acc = JoinValueAccum::seed(GenericAccumKind::Max, Some(b"5"));
        acc.fold(b"3");
        acc.fold(b"9");
        assert_eq!(acc.into_bytes(), Some(b"9".to_vec()));
    }
}
