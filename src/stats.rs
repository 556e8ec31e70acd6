//! Monitoring/statistics snapshot. Transport (JSON over a wire, a `/stats` endpoint, whatever a
//! host process wants) is explicitly out of scope; this module only produces the object.

use serde::Serialize;

/// Grounded on `Server::stats()`/`Server::print` in `examples/original_source/src/pqserver.cc`
/// for the field list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub store_size: u64,
    pub source_ranges_size: u64,
    pub join_ranges_size: u64,
    pub valid_ranges_size: u64,
    pub ninsert: u64,
    pub nmodify: u64,
    pub nmodify_nohint: u64,
    pub nerase: u64,
    pub nvalidate: u64,
    pub nsubtables: u64,
}

impl Stats {
    pub fn new() -> Self {
        Stats::default()
    }
}
