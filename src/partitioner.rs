//! The only hook a distributed deployment needs: a way to ensure a key range's data is locally
//! available before a `validate` runs against it. Semantics beyond that are explicitly
//! unspecified — see the Open Question resolution in SPEC_FULL.md section 9 — this crate ships
//! only the interface and a no-op implementation.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Partitioner: Send + Sync {
    /// Ensures `[first, last)` is available to read locally, fetching remote shards if needed.
    /// Resolves immediately once nothing remote is required.
    async fn analyze(&self, first: &[u8], last: &[u8]) -> Result<()>;
}

/// The default partitioner for a single-node deployment: everything is already local.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPartitioner;

#[async_trait]
impl Partitioner for NullPartitioner {
    async fn analyze(&self, _first: &[u8], _last: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn null_partitioner_resolves_immediately() {
        let p = NullPartitioner;
        assert!(p.analyze(b"a", b"z").await.is_ok());
    }
}
