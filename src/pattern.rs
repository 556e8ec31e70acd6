//! Join patterns: literal-plus-slot templates over byte strings, and the partial bindings
//! (`Match`) that a pattern is evaluated against.

use std::collections::HashMap;

use pest::iterators::Pair;
use pest::Parser;

use crate::error::{EngineError, Result};

pub type Error = pest::error::Error<Rule>;

#[derive(pest_derive::Parser)]
#[grammar = "pattern.pest"]
pub struct JoinLineParser;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Literal(Vec<u8>),
    Slot { name: String, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pattern {
    pub parts: Vec<Part>,
}

impl Pattern {
    pub fn key_length(&self) -> usize {
        self.parts
            .iter()
            .map(|p| match p {
                Part::Literal(b) => b.len(),
                Part::Slot { len, .. } => *len,
            })
            .sum()
    }

    /// Consumes `key` against this pattern. On success, binds every slot into `m` (slots
    /// already bound in `m` must agree with the corresponding substring of `key`) and returns
    /// true. On failure `m` is left untouched: matching runs against a scratch copy first.
    pub fn match_key(&self, key: &[u8], m: &mut Match) -> bool {
        if key.len() != self.key_length() {
            return false;
        }
        let mut scratch = m.clone();
        let mut pos = 0;
        for part in &self.parts {
            match part {
                Part::Literal(lit) => {
                    if &key[pos..pos + lit.len()] != lit.as_slice() {
                        return false;
                    }
                    pos += lit.len();
                }
                Part::Slot { name, len } => {
                    let slice = &key[pos..pos + len];
                    if let Some(existing) = scratch.get(name) {
                        if existing != slice {
                            return false;
                        }
                    } else {
                        scratch.bind(name, slice.to_vec());
                    }
                    pos += len;
                }
            }
        }
        *m = scratch;
        true
    }

    /// Smallest key consistent with the bound slots in `m`; unbound slots filled with `0x00`.
    pub fn expand_first(&self, m: &Match) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.key_length());
        for part in &self.parts {
            match part {
                Part::Literal(lit) => out.extend_from_slice(lit),
                Part::Slot { name, len } => match m.get(name) {
                    Some(bytes) => out.extend_from_slice(bytes),
                    None => out.extend(std::iter::repeat(0x00u8).take(*len)),
                },
            }
        }
        out
    }

    /// One past the largest key consistent with the bound slots in `m` (half-open upper bound);
    /// unbound slots filled with `0xFF`, then the whole key is incremented with carry. An
    /// all-`0xFF` key with no bound slots overflows to a key one byte longer, acting as +inf for
    /// this table — see SPEC_FULL.md section 4.2.
    pub fn expand_last(&self, m: &Match) -> Vec<u8> {
        let mut max_key = Vec::with_capacity(self.key_length());
        for part in &self.parts {
            match part {
                Part::Literal(lit) => max_key.extend_from_slice(lit),
                Part::Slot { name, len } => match m.get(name) {
                    Some(bytes) => max_key.extend_from_slice(bytes),
                    None => max_key.extend(std::iter::repeat(0xFFu8).take(*len)),
                },
            }
        }
        increment_bytes(max_key)
    }

    /// Best-effort binding of this pattern's slots against a range boundary `key`, which may be
    /// shorter than `key_length()` (an unbound upper/lower bound from a `validate` gap) rather
    /// than a real, fully-formed key. Consumes parts left to right; stops at the first part that
    /// doesn't fully fit in the remaining bytes of `key`, or whose literal bytes disagree, and
    /// leaves every slot from that point on unbound. Used to narrow a recursive source walk to
    /// the sub-range a `validate` gap actually covers (SPEC_FULL.md section 4.7), rather than
    /// rescanning the whole table whenever a gap happens to be narrower than the full pattern.
    pub fn bind_prefix(&self, key: &[u8]) -> Match {
        let mut m = Match::new();
        let mut pos = 0;
        for part in &self.parts {
            let len = match part {
                Part::Literal(lit) => lit.len(),
                Part::Slot { len, .. } => *len,
            };
            if pos + len > key.len() {
                break;
            }
            match part {
                Part::Literal(lit) => {
                    if &key[pos..pos + len] != lit.as_slice() {
                        break;
                    }
                }
                Part::Slot { name, .. } => {
                    m.bind(name, key[pos..pos + len].to_vec());
                }
            }
            pos += len;
        }
        m
    }

    fn parse_pattern_pair(pair: Pair<'_, Rule>, slot_lengths: &mut HashMap<String, usize>) -> Result<Pattern> {
        let mut parts = Vec::new();
        for part in pair.into_inner() {
            let inner = part.into_inner().next().unwrap_or(part.clone());
            match inner.as_rule() {
                Rule::slot_new => {
                    let mut it = inner.into_inner();
                    let name = it.next().unwrap().as_str().to_string();
                    let len: usize = it.next().unwrap().as_str().parse().map_err(|_| {
                        EngineError::MalformedPattern(format!("bad slot length for {name}"))
                    })?;
                    slot_lengths.insert(name.clone(), len);
                    parts.push(Part::Slot { name, len });
                }
                Rule::slot_ref => {
                    let name = inner.into_inner().next().unwrap().as_str().to_string();
                    let len = *slot_lengths.get(&name).ok_or_else(|| {
                        EngineError::MalformedPattern(format!(
                            "slot <{name}> referenced before it is declared with a length"
                        ))
                    })?;
                    parts.push(Part::Slot { name, len });
                }
                Rule::literal_char => {
                    parts.push(Part::Literal(inner.as_str().as_bytes().to_vec()));
                }
                _ => unreachable!("unexpected part rule"),
            }
        }
        Ok(Pattern { parts })
    }
}

pub(crate) fn increment_bytes(mut bytes: Vec<u8>) -> Vec<u8> {
    for i in (0..bytes.len()).rev() {
        if bytes[i] != 0xFF {
            bytes[i] += 1;
            bytes.truncate(i + 1);
            return bytes;
        }
    }
    bytes.push(0x00);
    bytes
}

/// A partial assignment of pattern slot names to bound byte strings.
///
/// Bindings accumulate in insertion order rather than a `HashMap` — joins bind at most a
/// handful of slots, so a linear scan is both simpler and, for this size, no slower. `save`/
/// `restore` let a recursive validator unwind speculative bindings on backtrack without cloning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Match {
    bindings: Vec<(String, Vec<u8>)>,
}

#[derive(Debug, Clone, Copy)]
pub struct MatchSnapshot(usize);

impl Match {
    pub fn new() -> Self {
        Match::default()
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.bindings
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn bind(&mut self, name: &str, value: Vec<u8>) {
        self.bindings.push((name.to_string(), value));
    }

    pub fn save(&self) -> MatchSnapshot {
        MatchSnapshot(self.bindings.len())
    }

    pub fn restore(&mut self, snapshot: MatchSnapshot) {
        self.bindings.truncate(snapshot.0);
    }
}

/// The parsed form of one join-specification line: an optional assignment verb followed by a
/// sink pattern and one or more source patterns (see SPEC_FULL.md section 6 grammar).
#[derive(Debug, Clone)]
pub struct JoinLine {
    pub verb: Option<String>,
    pub sink: Pattern,
    pub sources: Vec<Pattern>,
}

pub fn parse_join_line(line: &str) -> Result<JoinLine> {
    let mut pairs = JoinLineParser::parse(Rule::join_line, line)
        .map_err(|e| EngineError::MalformedPattern(e.to_string()))?;
    let join_line = pairs.next().unwrap();

    let mut verb = None;
    let mut patterns = Vec::new();
    let mut slot_lengths = HashMap::new();
    for pair in join_line.into_inner() {
        match pair.as_rule() {
            Rule::verb => verb = Some(pair.as_str().to_string()),
            Rule::pattern => patterns.push(Pattern::parse_pattern_pair(pair, &mut slot_lengths)?),
            Rule::EOI => {}
            _ => unreachable!(),
        }
    }
    if patterns.len() < 2 {
        return Err(EngineError::MalformedPattern(
            "a join line needs a sink pattern and at least one source pattern".into(),
        ));
    }
    let sink = patterns.remove(0);
    Ok(JoinLine {
        verb,
        sink,
        sources: patterns,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_count_join_scenario_1() {
        let jl = parse_join_line("count v|<u:1> f|<u>|<v:1>").unwrap();
        assert_eq!(jl.verb.as_deref(), Some("count"));
        assert_eq!(jl.sink.key_length(), 2);
        assert_eq!(jl.sources.len(), 1);
        assert_eq!(jl.sources[0].key_length(), 4);
    }

    #[test]
    fn slot_ref_inherits_declared_length() {
        let jl = parse_join_line("t|<u:1>|<p:1> s|<p>").unwrap();
        assert_eq!(jl.sources[0].key_length(), 2);
    }

    #[test]
    fn undeclared_slot_ref_is_malformed() {
        let err = parse_join_line("t|<x> s|<x>");
        assert!(err.is_err());
    }

    #[test]
    fn match_key_binds_and_checks_consistency() {
        let jl = parse_join_line("v|<u:1> f|<u>|<v:1>").unwrap();
        let mut m = Match::new();
        assert!(jl.sources[0].match_key(b"f|a|b", &mut m));
        assert_eq!(m.get("u"), Some(&b"a"[..]));
        assert_eq!(m.get("v"), Some(&b"b"[..]));

        let mut m2 = Match::new();
        m2.bind("u", b"z".to_vec());
        assert!(!jl.sources[0].match_key(b"f|a|b", &mut m2));
    }

    #[test]
    fn expand_first_last_fully_bound_is_single_key_range() {
        let jl = parse_join_line("v|<u:1> f|<u>|<v:1>").unwrap();
        let mut m = Match::new();
        m.bind("u", b"a".to_vec());
        m.bind("v", b"b".to_vec());
        let first = jl.sources[0].expand_first(&m);
        let last = jl.sources[0].expand_last(&m);
        assert_eq!(first, b"f|a|b");
        assert_eq!(last, b"f|a|c");
    }

    #[test]
    fn expand_last_carries_into_preceding_literal_when_the_slot_saturates() {
        // the unbound slot's byte range spans 0x00..=0xFF, so one-past-the-max carries out of
        // the slot entirely and bumps the literal byte immediately before it, dropping the slot
        // position from the result (there is nothing left to hold a value past the carry).
        let jl = parse_join_line("v|<u:1> f|<u:1>").unwrap();
        let m = Match::new();
        let first = jl.sources[0].expand_first(&m);
        let last = jl.sources[0].expand_last(&m);
        assert_eq!(first, b"f|\x00");
        assert_eq!(last, b"f}");
    }

    #[test]
    fn expand_last_overflows_to_longer_key_when_all_ff() {
        // a pattern with no literal tail after the unbound slot: max key is all taken up by
        // the slot itself, so carry must propagate out past the end of the key entirely.
        let jl = parse_join_line("v|<u:1> <u:1>").unwrap();
        let m = Match::new();
        let last = jl.sources[0].expand_last(&m);
        assert_eq!(last, vec![0xFF, 0x00]);
    }

    #[test]
    fn bind_prefix_binds_only_slots_fully_covered_by_the_boundary_key() {
        let jl = parse_join_line("v|<u:1> f|<u>|<v:1>").unwrap();
        // a validate-gap boundary of just the table name: nothing past it is known.
        let m = jl.sink.bind_prefix(b"v|");
        assert_eq!(m.get("u"), None);

        // a boundary that reaches exactly through the slot: fully bound.
        let m = jl.sink.bind_prefix(b"v|a");
        assert_eq!(m.get("u"), Some(&b"a"[..]));

        // a boundary whose literal bytes disagree with the pattern stops the walk early.
        let m = jl.sink.bind_prefix(b"x|a");
        assert_eq!(m.get("u"), None);
    }

    #[test]
    fn save_restore_round_trips_bindings() {
        let mut m = Match::new();
        m.bind("a", vec![1]);
        let snap = m.save();
        m.bind("b", vec![2]);
        assert_eq!(m.get("b"), Some(&[2][..]));
        m.restore(snap);
        assert_eq!(m.get("b"), None);
        assert_eq!(m.get("a"), Some(&[1][..]));
    }
}
