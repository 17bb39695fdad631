use async_trait::async_trait;
use blockmesh_interfaces::{node::NodeClient, RequestError, RequestResult};
use blockmesh_primitives::{Block, BlockNumber};
use jsonrpsee::{
    core::{client::ClientT, ClientError},
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::trace;

/// Response of `getversion`, only the fields we use.
#[derive(Debug, Deserialize)]
struct VersionResponse {
    useragent: String,
}

/// JSON-RPC transport over HTTP.
///
/// - `getblockcount` returns the number of blocks, the height is one less.
/// - `getversion` returns an object carrying the node's `useragent`.
/// - `getblock [height, 0]` returns the raw block as a hex string.
#[derive(Debug, Clone)]
pub struct RpcClient {
    endpoint: String,
    inner: HttpClient,
}

impl RpcClient {
    /// Creates a client for `endpoint`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> RequestResult<Self> {
        let endpoint = endpoint.into();
        let inner = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(&endpoint)
            .map_err(into_request_error)?;
        Ok(Self { endpoint, inner })
    }

    /// The endpoint this client talks to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl NodeClient for RpcClient {
    async fn block_height(&self) -> RequestResult<BlockNumber> {
        trace!(target: "node::rpc", endpoint = %self.endpoint, "getblockcount");
        let count: u64 =
            self.inner.request("getblockcount", rpc_params![]).await.map_err(into_request_error)?;
        count
            .checked_sub(1)
            .ok_or_else(|| RequestError::BadResponse("node reported zero blocks".to_string()))
    }

    async fn version(&self) -> RequestResult<String> {
        trace!(target: "node::rpc", endpoint = %self.endpoint, "getversion");
        let version: VersionResponse =
            self.inner.request("getversion", rpc_params![]).await.map_err(into_request_error)?;
        Ok(version.useragent)
    }

    async fn block(&self, number: BlockNumber) -> RequestResult<Block> {
        trace!(target: "node::rpc", endpoint = %self.endpoint, number, "getblock");
        let raw: String = self
            .inner
            .request("getblock", rpc_params![number, 0])
            .await
            .map_err(into_request_error)?;
        Block::from_hex(&raw).map_err(|err| RequestError::BadResponse(err.to_string()))
    }
}

fn into_request_error(err: ClientError) -> RequestError {
    match err {
        ClientError::RequestTimeout => RequestError::Timeout,
        ClientError::Call(err) => {
            RequestError::Rpc { code: err.code(), message: err.message().to_string() }
        }
        ClientError::ParseError(err) => RequestError::BadResponse(err.to_string()),
        err => RequestError::Transport(err.to_string()),
    }
}
