use alloy::primitives::{Bytes, U256};
use async_trait::async_trait;
use thiserror::Error;

use crate::{
    common_types::EvmAddress,
    network::ChainId,
    transaction::types::{TransactionErrorRecord, TransactionHash, TransactionReceipt},
    NetworkConfig,
};

mod evm_provider;
pub use evm_provider::{create_retry_client, EvmProvider, HarnessProvider, RetryClientError};

/// Which view of an account's transaction count to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    /// Transactions included in the latest finalized block.
    Latest,
    /// Latest plus those still waiting in the node's mempool.
    Pending,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainRpcError {
    /// The node answered with an error; the message is kept verbatim so that
    /// callers can classify it.
    #[error("{message}")]
    Rejected { message: String },

    #[error("Node unreachable: {0}")]
    Unavailable(String),

    #[error("No provider configured for shard {0}")]
    UnknownShard(u32),

    #[error("Malformed node response: {0}")]
    Malformed(String),
}

impl ChainRpcError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Network access the engine consumes. Transport, encoding and node
/// discovery live behind it.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn chain_id(&self) -> Result<ChainId, ChainRpcError>;

    async fn get_balance(&self, address: &EvmAddress, shard: u32) -> Result<U256, ChainRpcError>;

    async fn get_transaction_count(
        &self,
        address: &EvmAddress,
        tag: BlockTag,
    ) -> Result<u64, ChainRpcError>;

    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<TransactionHash, ChainRpcError>;

    async fn get_transaction_receipt(
        &self,
        hash: &TransactionHash,
    ) -> Result<Option<TransactionReceipt>, ChainRpcError>;

    /// Looks up an explicit rejection the node recorded for `hash`, if any.
    async fn get_transaction_error(
        &self,
        hash: &TransactionHash,
    ) -> Result<Option<TransactionErrorRecord>, ChainRpcError>;
}

#[derive(Error, Debug)]
pub enum LoadProviderError {
    #[error("Providers are required in the yaml")]
    ProvidersRequired,

    #[error("{0}")]
    RetryClientError(#[from] RetryClientError),

    #[error("Configured chain id {configured} does not match node chain id {actual}")]
    ChainIdMismatch { configured: ChainId, actual: ChainId },

    #[error("{0}")]
    ChainRpcError(#[from] ChainRpcError),
}

/// Connects to every configured shard endpoint and checks that the node
/// serves the configured chain.
pub async fn load_provider(network: &NetworkConfig) -> Result<EvmProvider, LoadProviderError> {
    if network.provider_urls.is_empty() {
        return Err(LoadProviderError::ProvidersRequired);
    }

    let provider = EvmProvider::new(&network.provider_urls)?;

    let actual = provider.chain_id().await?;
    if actual != network.chain_id {
        return Err(LoadProviderError::ChainIdMismatch {
            configured: network.chain_id,
            actual,
        });
    }

    Ok(provider)
}
