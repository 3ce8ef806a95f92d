use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::time::sleep;

use crate::provider::ChainRpc;
use crate::stakeprobe_info;
use crate::transaction::types::{TransactionHash, TransactionReceipt};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationError {
    /// The node recorded an explicit rejection for the transaction.
    #[error("Transaction {hash} failed on chain: {message}")]
    Failed { hash: TransactionHash, message: String },

    /// Included in a block, but with a failure status.
    #[error("Transaction {hash} was mined with a failure status")]
    Reverted { hash: TransactionHash, receipt: TransactionReceipt },

    #[error("Transaction {hash} not confirmed within {timeout_seconds}s")]
    TimedOut { hash: TransactionHash, timeout_seconds: i64 },
}

/// Polls for a receipt until one appears, the node reports the transaction as
/// rejected, or the countdown runs out.
#[derive(Clone)]
pub struct ConfirmationWaiter {
    chain: Arc<dyn ChainRpc>,
    poll_interval: Duration,
}

impl ConfirmationWaiter {
    pub fn new(chain: Arc<dyn ChainRpc>, poll_interval: Duration) -> Self {
        ConfirmationWaiter { chain, poll_interval }
    }

    /// Number of sleeps a `timeout_seconds` budget allows.
    fn poll_budget(&self, timeout_seconds: i64) -> u64 {
        if timeout_seconds <= 0 {
            return 0;
        }

        let timeout_ms = timeout_seconds as u128 * 1000;
        let interval_ms = self.poll_interval.as_millis().max(1);
        timeout_ms.div_ceil(interval_ms) as u64
    }

    pub async fn wait_for_confirmation(
        &self,
        hash: &TransactionHash,
        timeout_seconds: i64,
    ) -> Result<TransactionReceipt, ConfirmationError> {
        let mut remaining = self.poll_budget(timeout_seconds);

        loop {
            match self.chain.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) if receipt.is_success() => return Ok(receipt),
                Ok(Some(receipt)) => {
                    return Err(ConfirmationError::Reverted { hash: *hash, receipt })
                }
                Ok(None) => {}
                Err(e) => stakeprobe_info!("Receipt lookup for {} failed: {}", hash, e),
            }

            match self.chain.get_transaction_error(hash).await {
                Ok(Some(record)) => {
                    return Err(ConfirmationError::Failed { hash: *hash, message: record.message })
                }
                Ok(None) => {}
                Err(e) => stakeprobe_info!("Error sink lookup for {} failed: {}", hash, e),
            }

            if remaining == 0 {
                return Err(ConfirmationError::TimedOut { hash: *hash, timeout_seconds });
            }

            sleep(self.poll_interval).await;
            remaining -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_config, MockChain, MockKeystore};
    use crate::transaction::types::UnsignedTransaction;
    use crate::wallet::KeystoreManagerTrait;
    use crate::network::ChainId;
    use alloy::primitives::{Address, Bytes, U256};
    use assert_matches::assert_matches;
    use tokio::time::Instant;

    async fn broadcast(chain: &MockChain) -> TransactionHash {
        let keystore = MockKeystore::new();
        let from = keystore.generate("sender", "pw").await.unwrap();
        keystore.unlock("sender", "pw").await.unwrap();
        chain.set_balance(&from, U256::from(1_000));

        let tx = UnsignedTransaction {
            nonce: 0,
            gas_price: 1,
            gas_limit: 21_000,
            to: Address::repeat_byte(1),
            value: U256::from(1),
            input: Bytes::new(),
        };
        let chain_id = ChainId::new(test_config().network.chain_id.u64());
        let signed = keystore.sign_transaction("sender", &tx, &chain_id).await.unwrap();
        chain.send_raw_transaction(&signed.raw).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn returns_immediately_when_first_poll_has_a_receipt() {
        let chain = Arc::new(MockChain::new());
        let hash = broadcast(&chain).await;
        let waiter = ConfirmationWaiter::new(chain, Duration::from_secs(1));

        let started = Instant::now();
        let receipt = waiter.wait_for_confirmation(&hash, 10).await.unwrap();

        assert_eq!(receipt.transaction_hash, hash);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_the_configured_seconds() {
        let chain = Arc::new(MockChain::new());
        let hash = broadcast(&chain).await;
        chain.withhold_receipts(true);
        let waiter = ConfirmationWaiter::new(chain, Duration::from_secs(1));

        let started = Instant::now();
        let result = waiter.wait_for_confirmation(&hash, 5).await;

        assert_matches!(result, Err(ConfirmationError::TimedOut { timeout_seconds: 5, .. }));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn picks_up_a_late_receipt() {
        let chain = Arc::new(MockChain::new());
        let hash = broadcast(&chain).await;
        chain.delay_receipts(3);
        let waiter = ConfirmationWaiter::new(chain, Duration::from_secs(1));

        let started = Instant::now();
        waiter.wait_for_confirmation(&hash, 10).await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn error_sink_record_is_terminal() {
        let chain = Arc::new(MockChain::new());
        chain.reject_next_on_chain("staking validator does not exist");
        let hash = broadcast(&chain).await;
        let waiter = ConfirmationWaiter::new(chain, Duration::from_secs(1));

        let started = Instant::now();
        let result = waiter.wait_for_confirmation(&hash, 10).await;

        assert_matches!(
            result,
            Err(ConfirmationError::Failed { message, .. }) if message.contains("does not exist")
        );
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_status_is_reported_as_reverted() {
        let chain = Arc::new(MockChain::new());
        chain.fail_next_receipts(1);
        let hash = broadcast(&chain).await;
        let waiter = ConfirmationWaiter::new(chain, Duration::from_secs(1));

        assert_matches!(
            waiter.wait_for_confirmation(&hash, 10).await,
            Err(ConfirmationError::Reverted { .. })
        );
    }
}
