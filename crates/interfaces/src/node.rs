use crate::error::RequestResult;
use async_trait::async_trait;
use blockmesh_primitives::{Block, BlockNumber};
use std::{fmt::Debug, sync::Arc};

/// Transport to a single RPC endpoint.
///
/// Implementations only move bytes. Health bookkeeping (latency, activity, in-flight counts) is
/// done by the handle that wraps the client.
#[async_trait]
pub trait NodeClient: Send + Sync + Debug {
    /// Returns the height of the highest block the node can serve.
    async fn block_height(&self) -> RequestResult<BlockNumber>;

    /// Returns the version string the node identifies itself with.
    async fn version(&self) -> RequestResult<String>;

    /// Returns the block at `number`.
    async fn block(&self, number: BlockNumber) -> RequestResult<Block>;

    /// Releases transport resources. Further requests may fail.
    fn close(&self) {}
}

#[async_trait]
impl<T: NodeClient + ?Sized> NodeClient for Arc<T> {
    async fn block_height(&self) -> RequestResult<BlockNumber> {
        (**self).block_height().await
    }

    async fn version(&self) -> RequestResult<String> {
        (**self).version().await
    }

    async fn block(&self, number: BlockNumber) -> RequestResult<Block> {
        (**self).block(number).await
    }

    fn close(&self) {
        (**self).close()
    }
}

#[async_trait]
impl<T: NodeClient + ?Sized> NodeClient for Box<T> {
    async fn block_height(&self) -> RequestResult<BlockNumber> {
        (**self).block_height().await
    }

    async fn version(&self) -> RequestResult<String> {
        (**self).version().await
    }

    async fn block(&self, number: BlockNumber) -> RequestResult<Block> {
        (**self).block(number).await
    }

    fn close(&self) {
        (**self).close()
    }
}
