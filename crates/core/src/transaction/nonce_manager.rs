use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::common_types::EvmAddress;
use crate::provider::{BlockTag, ChainRpc, ChainRpcError};
use crate::transaction::types::{NonceSetting, TransactionNonce};

#[derive(Error, Debug, Clone)]
pub enum NonceError {
    #[error("Could not resolve nonce for {address}: {source}")]
    Unresolved { address: EvmAddress, source: ChainRpcError },
}

/// Hands out consecutive nonces from a starting point.
pub struct NonceManager {
    nonce: Mutex<TransactionNonce>,
}

impl NonceManager {
    pub fn new(current_nonce: TransactionNonce) -> Self {
        NonceManager { nonce: Mutex::new(current_nonce) }
    }

    pub async fn get_and_increment(&self) -> TransactionNonce {
        let mut nonce_guard = self.nonce.lock().await;
        let current_nonce = *nonce_guard;
        *nonce_guard = current_nonce + 1;
        current_nonce
    }
}

/// A contiguous block of nonces for one sender, fetched from the chain once.
pub struct NonceReservation {
    address: EvmAddress,
    start: TransactionNonce,
    count: usize,
    manager: NonceManager,
}

impl NonceReservation {
    pub fn address(&self) -> &EvmAddress {
        &self.address
    }

    pub fn start(&self) -> TransactionNonce {
        self.start
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Every nonce in the block, in order. Call before fanning out so that
    /// each task owns its nonce up front.
    pub async fn assign_all(self) -> Vec<TransactionNonce> {
        let mut nonces = Vec::with_capacity(self.count);
        for _ in 0..self.count {
            nonces.push(self.manager.get_and_increment().await);
        }
        nonces
    }
}

/// Reads transaction counts from the chain and turns them into nonces.
#[derive(Clone)]
pub struct NonceSequencer {
    chain: Arc<dyn ChainRpc>,
}

impl NonceSequencer {
    pub fn new(chain: Arc<dyn ChainRpc>) -> Self {
        NonceSequencer { chain }
    }

    async fn transaction_count(
        &self,
        address: &EvmAddress,
        tag: BlockTag,
    ) -> Result<TransactionNonce, NonceError> {
        self.chain
            .get_transaction_count(address, tag)
            .await
            .map(TransactionNonce::new)
            .map_err(|source| NonceError::Unresolved { address: *address, source })
    }

    /// Next nonce according to finalized state.
    pub async fn current_nonce(&self, address: &EvmAddress) -> Result<TransactionNonce, NonceError> {
        self.transaction_count(address, BlockTag::Latest).await
    }

    /// Next nonce counting transactions still in the mempool.
    pub async fn pending_nonce(&self, address: &EvmAddress) -> Result<TransactionNonce, NonceError> {
        self.transaction_count(address, BlockTag::Pending).await
    }

    pub async fn resolve(
        &self,
        address: &EvmAddress,
        setting: NonceSetting,
    ) -> Result<TransactionNonce, NonceError> {
        match setting {
            NonceSetting::Explicit(nonce) => Ok(nonce),
            NonceSetting::Auto => self.current_nonce(address).await,
        }
    }

    /// Reserves `count` nonces starting at the pending count, so that
    /// transactions already in flight are not collided with.
    pub async fn reserve(
        &self,
        address: &EvmAddress,
        count: usize,
    ) -> Result<NonceReservation, NonceError> {
        let start = self.pending_nonce(address).await?;

        Ok(NonceReservation {
            address: *address,
            start,
            count,
            manager: NonceManager::new(start),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChain;
    use assert_matches::assert_matches;
    use std::collections::HashSet;

    fn sender() -> EvmAddress {
        "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap()
    }

    #[tokio::test]
    async fn get_and_increment_is_consecutive() {
        let manager = NonceManager::new(TransactionNonce::new(7));
        assert_eq!(manager.get_and_increment().await, TransactionNonce::new(7));
        assert_eq!(manager.get_and_increment().await, TransactionNonce::new(8));
    }

    #[tokio::test]
    async fn explicit_nonce_wins_over_chain_state() {
        let chain = Arc::new(MockChain::new());
        chain.set_nonce(&sender(), 4);
        let sequencer = NonceSequencer::new(chain);

        assert_eq!(
            sequencer.resolve(&sender(), NonceSetting::explicit(42)).await.unwrap(),
            TransactionNonce::new(42)
        );
        assert_eq!(
            sequencer.resolve(&sender(), NonceSetting::Auto).await.unwrap(),
            TransactionNonce::new(4)
        );
    }

    #[tokio::test]
    async fn reservation_covers_a_contiguous_unique_range() {
        let chain = Arc::new(MockChain::new());
        chain.set_nonce(&sender(), 10);
        chain.add_pending(&sender(), 2);
        let sequencer = NonceSequencer::new(chain);

        let reservation = sequencer.reserve(&sender(), 5).await.unwrap();
        assert_eq!(reservation.start(), TransactionNonce::new(12));

        let nonces = reservation.assign_all().await;
        let unique: HashSet<_> = nonces.iter().copied().collect();
        assert_eq!(unique.len(), 5);
        assert_eq!(nonces, (12..17).map(TransactionNonce::new).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn rpc_failure_is_propagated_not_zeroed() {
        let chain = Arc::new(MockChain::new());
        chain.fail_nonce_queries(true);
        let sequencer = NonceSequencer::new(chain);

        assert_matches!(
            sequencer.resolve(&sender(), NonceSetting::Auto).await,
            Err(NonceError::Unresolved { .. })
        );
        assert!(matches!(sequencer.reserve(&sender(), 3).await, Err(NonceError::Unresolved { .. })));
    }
}
