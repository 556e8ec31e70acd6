//! An in-memory key/value store with incrementally maintained, range-indexed materialized
//! views ("joins") over its keyspace. See `SPEC_FULL.md` for the full module map; this crate
//! is embedded, not run standalone — the RPC loop, CLI, and workload generators that would
//! front a deployment are out of scope here.

pub mod config;
pub mod datum;
pub mod error;
pub mod interval;
pub mod join;
pub mod keys;
pub mod log;
pub mod partitioner;
pub mod pattern;
pub mod server;
pub mod sink_range;
pub mod source_range;
pub mod stats;
pub mod table;
pub mod validate;

pub use config::EngineConfig;
pub use datum::{Datum, Modification, NotifyKind};
pub use error::{EngineError, Result};
pub use join::{GenericAccumKind, Join, JoinId, JoinValueKind};
pub use partitioner::{NullPartitioner, Partitioner};
pub use server::Server;
pub use stats::Stats;
