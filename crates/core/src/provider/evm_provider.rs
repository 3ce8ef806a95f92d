use std::sync::Arc;

use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    network::ReceiptResponse,
    primitives::{Bytes, U256},
    providers::{Provider, RootProvider},
    rpc::client::ClientBuilder,
    transports::{http::reqwest::Url, layers::RetryBackoffLayer, RpcError, TransportErrorKind},
};
use async_trait::async_trait;
use thiserror::Error;

use crate::{
    common_types::EvmAddress,
    network::ChainId,
    provider::{BlockTag, ChainRpc, ChainRpcError},
    stakeprobe_info,
    transaction::types::{TransactionErrorRecord, TransactionHash, TransactionReceipt},
};

pub type HarnessProvider = RootProvider;

/// JSON-RPC method exposing the node's recent transaction rejections.
const TRANSACTION_ERROR_SINK_METHOD: &str = "hmy_getCurrentTransactionErrorSink";

/// JSON-RPC "method not found".
const METHOD_NOT_FOUND_CODE: i64 = -32601;

#[derive(Error, Debug)]
pub enum RetryClientError {
    #[error("http provider cant be created for {0}: {1}")]
    HttpProviderCantBeCreated(String, String),

    #[error("at least one provider url is required")]
    NoProviderUrls,
}

pub fn create_retry_client(rpc_url: &str) -> Result<Arc<HarnessProvider>, RetryClientError> {
    let url = Url::parse(rpc_url).map_err(|e| {
        RetryClientError::HttpProviderCantBeCreated(rpc_url.to_string(), e.to_string())
    })?;

    let retry_layer = RetryBackoffLayer::new(10, 500, 660);
    let client = ClientBuilder::default().layer(retry_layer).http(url);

    Ok(Arc::new(RootProvider::new(client)))
}

fn map_rpc_error(error: RpcError<TransportErrorKind>) -> ChainRpcError {
    match error {
        RpcError::ErrorResp(payload) => {
            ChainRpcError::Rejected { message: payload.message.to_string() }
        }
        RpcError::Transport(kind) => ChainRpcError::Unavailable(kind.to_string()),
        RpcError::DeserError { .. } | RpcError::NullResp => {
            ChainRpcError::Malformed(error.to_string())
        }
        other => ChainRpcError::Unavailable(other.to_string()),
    }
}

/// `ChainRpc` over alloy HTTP providers, one per shard.
#[derive(Clone)]
pub struct EvmProvider {
    rpc_clients: Vec<Arc<HarnessProvider>>,
    pub provider_urls: Vec<String>,
}

impl EvmProvider {
    /// `provider_urls[i]` is the endpoint serving shard `i`. Transactions are
    /// always broadcast through shard 0.
    pub fn new(provider_urls: &[String]) -> Result<Self, RetryClientError> {
        if provider_urls.is_empty() {
            return Err(RetryClientError::NoProviderUrls);
        }

        let mut rpc_clients = Vec::with_capacity(provider_urls.len());
        for url in provider_urls {
            rpc_clients.push(create_retry_client(url)?);
        }

        Ok(EvmProvider { rpc_clients, provider_urls: provider_urls.to_vec() })
    }

    fn rpc_client(&self) -> Arc<HarnessProvider> {
        self.rpc_clients[0].clone()
    }

    fn shard_client(&self, shard: u32) -> Result<Arc<HarnessProvider>, ChainRpcError> {
        self.rpc_clients.get(shard as usize).cloned().ok_or(ChainRpcError::UnknownShard(shard))
    }
}

#[async_trait]
impl ChainRpc for EvmProvider {
    async fn chain_id(&self) -> Result<ChainId, ChainRpcError> {
        let chain_id = self.rpc_client().get_chain_id().await.map_err(map_rpc_error)?;
        Ok(ChainId::new(chain_id))
    }

    async fn get_balance(&self, address: &EvmAddress, shard: u32) -> Result<U256, ChainRpcError> {
        self.shard_client(shard)?
            .get_balance(address.into_address())
            .block_id(BlockId::Number(BlockNumberOrTag::Latest))
            .await
            .map_err(map_rpc_error)
    }

    async fn get_transaction_count(
        &self,
        address: &EvmAddress,
        tag: BlockTag,
    ) -> Result<u64, ChainRpcError> {
        let block = match tag {
            BlockTag::Latest => BlockNumberOrTag::Latest,
            BlockTag::Pending => BlockNumberOrTag::Pending,
        };

        self.rpc_client()
            .get_transaction_count(address.into_address())
            .block_id(BlockId::Number(block))
            .await
            .map_err(map_rpc_error)
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<TransactionHash, ChainRpcError> {
        let pending =
            self.rpc_client().send_raw_transaction(raw.as_ref()).await.map_err(map_rpc_error)?;

        Ok(TransactionHash::from_alloy_hash(pending.tx_hash()))
    }

    async fn get_transaction_receipt(
        &self,
        hash: &TransactionHash,
    ) -> Result<Option<TransactionReceipt>, ChainRpcError> {
        let receipt = self
            .rpc_client()
            .get_transaction_receipt(hash.into_alloy_hash())
            .await
            .map_err(map_rpc_error)?;

        Ok(receipt.map(|receipt| TransactionReceipt {
            transaction_hash: TransactionHash::from_alloy_hash(&ReceiptResponse::transaction_hash(
                &receipt,
            )),
            block_number: ReceiptResponse::block_number(&receipt),
            status: ReceiptResponse::status(&receipt),
            gas_used: ReceiptResponse::gas_used(&receipt),
            contract_address: ReceiptResponse::contract_address(&receipt).map(EvmAddress::new),
        }))
    }

    async fn get_transaction_error(
        &self,
        hash: &TransactionHash,
    ) -> Result<Option<TransactionErrorRecord>, ChainRpcError> {
        let result = self
            .rpc_client()
            .raw_request::<_, Vec<TransactionErrorRecord>>(
                TRANSACTION_ERROR_SINK_METHOD.into(),
                (),
            )
            .await;

        match result {
            Ok(records) => Ok(records.into_iter().find(|record| &record.transaction_hash == hash)),
            Err(RpcError::ErrorResp(payload)) if payload.code == METHOD_NOT_FOUND_CODE => {
                stakeprobe_info!(
                    "Node does not expose {}, skipping error sink lookup for {}",
                    TRANSACTION_ERROR_SINK_METHOD,
                    hash
                );
                Ok(None)
            }
            Err(e) => Err(map_rpc_error(e)),
        }
    }
}
