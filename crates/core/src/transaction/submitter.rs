use std::sync::Arc;

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::network::ChainId;
use crate::provider::{ChainRpc, ChainRpcError};
use crate::transaction::confirmation::{ConfirmationError, ConfirmationWaiter};
use crate::transaction::types::{
    ConfirmationOutcome, PendingTransaction, TransactionHash, TransactionReceipt,
    UnsignedTransaction,
};
use crate::wallet::{KeystoreError, KeystoreManagerTrait};

/// Broad class of a node's refusal, used to pick a retry strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendErrorKind {
    Underpriced,
    ReplaceUnderpriced,
    IntrinsicGasTooLow,
    InsufficientFunds,
    NonceTooLow,
    Network,
    Other,
}

impl SendErrorKind {
    /// Classifies a node error message. Matching is on the message text since
    /// nodes do not agree on error codes.
    pub fn classify(message: &str) -> SendErrorKind {
        let message = message.to_lowercase();

        if message.contains("replacement transaction underpriced") {
            SendErrorKind::ReplaceUnderpriced
        } else if message.contains("underpriced") {
            SendErrorKind::Underpriced
        } else if message.contains("intrinsic gas too low") {
            SendErrorKind::IntrinsicGasTooLow
        } else if message.contains("insufficient funds") {
            SendErrorKind::InsufficientFunds
        } else if message.contains("nonce too low") {
            SendErrorKind::NonceTooLow
        } else {
            SendErrorKind::Other
        }
    }

    pub fn from_rpc_error(error: &ChainRpcError) -> SendErrorKind {
        match error {
            ChainRpcError::Rejected { message } => SendErrorKind::classify(message),
            ChainRpcError::Unavailable(_) => SendErrorKind::Network,
            ChainRpcError::UnknownShard(_) | ChainRpcError::Malformed(_) => SendErrorKind::Other,
        }
    }

    /// Whether a resubmission needs a higher gas price to be accepted.
    pub fn needs_gas_bump(&self) -> bool {
        matches!(
            self,
            SendErrorKind::Underpriced
                | SendErrorKind::ReplaceUnderpriced
                | SendErrorKind::IntrinsicGasTooLow
        )
    }
}

#[derive(Error, Debug, Clone)]
pub enum SubmitError {
    #[error("Keystore refused account {name}: {message}")]
    Keystore { name: String, message: String },

    #[error("Node rejected transaction ({kind:?}): {message}")]
    Rejected { kind: SendErrorKind, message: String },

    #[error("{0}")]
    Confirmation(#[from] ConfirmationError),
}

impl SubmitError {
    fn keystore(name: &str, error: KeystoreError) -> Self {
        SubmitError::Keystore { name: name.to_string(), message: error.to_string() }
    }

    pub fn kind(&self) -> Option<SendErrorKind> {
        match self {
            SubmitError::Rejected { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<ChainRpcError> for SubmitError {
    fn from(error: ChainRpcError) -> Self {
        SubmitError::Rejected { kind: SendErrorKind::from_rpc_error(&error), message: error.message() }
    }
}

/// A broadcast the node accepted.
#[derive(Debug, Clone)]
pub struct SubmittedTransaction {
    pub hash: TransactionHash,
    pub response: Map<String, Value>,
}

/// What `submit_and_confirm` observed.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub submitted: SubmittedTransaction,
    pub outcome: ConfirmationOutcome,
    pub receipt: Option<TransactionReceipt>,
}

/// Signs and broadcasts one transaction, exactly once. Retries belong to the
/// caller.
#[derive(Clone)]
pub struct TransactionSubmitter {
    chain: Arc<dyn ChainRpc>,
    keystore: Arc<dyn KeystoreManagerTrait>,
    waiter: ConfirmationWaiter,
    chain_id: ChainId,
}

impl TransactionSubmitter {
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        keystore: Arc<dyn KeystoreManagerTrait>,
        waiter: ConfirmationWaiter,
        chain_id: ChainId,
    ) -> Self {
        TransactionSubmitter { chain, keystore, waiter, chain_id }
    }

    pub async fn submit(
        &self,
        pending: &PendingTransaction,
    ) -> Result<SubmittedTransaction, SubmitError> {
        let name = pending.from.name.as_str();

        self.keystore
            .unlock(name, &pending.from.passphrase)
            .await
            .map_err(|e| SubmitError::keystore(name, e))?;

        let call = pending.payload.to_call(&pending.from.address, &pending.to, pending.amount);
        let transaction = UnsignedTransaction {
            nonce: pending.nonce.into_inner(),
            gas_price: pending.gas_price.into_u128(),
            gas_limit: pending.gas_limit.into_inner(),
            to: call.to,
            value: call.value,
            input: call.input,
        };

        let signed = self
            .keystore
            .sign_transaction(name, &transaction, &self.chain_id)
            .await
            .map_err(|e| SubmitError::keystore(name, e))?;

        let hash = self.chain.send_raw_transaction(&signed.raw).await?;

        let mut response = Map::new();
        response.insert("hash".to_string(), json!(hash.hex()));
        response.insert("from".to_string(), json!(pending.from.address.hex()));
        response.insert("to".to_string(), json!(format!("{:?}", transaction.to)));
        response.insert("nonce".to_string(), json!(transaction.nonce));
        response.insert("gasPrice".to_string(), json!(transaction.gas_price.to_string()));
        response.insert("gasLimit".to_string(), json!(transaction.gas_limit));
        response.insert("value".to_string(), json!(transaction.value.to_string()));
        response.insert("kind".to_string(), json!(pending.payload.kind()));

        Ok(SubmittedTransaction { hash, response })
    }

    /// Submits, then waits up to `pending.timeout` seconds for a receipt. A
    /// timeout of zero or less returns as soon as the node accepts the
    /// broadcast.
    pub async fn submit_and_confirm(
        &self,
        pending: &PendingTransaction,
    ) -> Result<SubmissionOutcome, SubmitError> {
        let submitted = self.submit(pending).await?;

        if pending.timeout <= 0 {
            return Ok(SubmissionOutcome {
                submitted,
                outcome: ConfirmationOutcome::Submitted,
                receipt: None,
            });
        }

        let receipt = self.waiter.wait_for_confirmation(&submitted.hash, pending.timeout).await?;

        Ok(SubmissionOutcome { submitted, outcome: ConfirmationOutcome::Confirmed, receipt: Some(receipt) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Account, AccountName};
    use crate::gas::{GasLimit, GasPrice};
    use crate::testing::{MockChain, MockKeystore, TEST_CHAIN_ID};
    use crate::transaction::types::{TransactionNonce, TransactionPayload};
    use alloy::primitives::U256;
    use assert_matches::assert_matches;
    use std::time::Duration;

    async fn setup() -> (Arc<MockChain>, TransactionSubmitter, Account) {
        let chain = Arc::new(MockChain::new());
        let keystore = Arc::new(MockKeystore::new());
        let address = keystore.generate("sender", "pw").await.unwrap();
        chain.set_balance(&address, U256::from(1_000_000));

        let waiter = ConfirmationWaiter::new(chain.clone(), Duration::from_secs(1));
        let submitter =
            TransactionSubmitter::new(chain.clone(), keystore, waiter, ChainId::new(TEST_CHAIN_ID));
        (chain, submitter, Account::new(AccountName::raw("sender"), address, "pw"))
    }

    fn pending(from: Account, timeout: i64) -> PendingTransaction {
        PendingTransaction {
            from,
            to: "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC".parse().unwrap(),
            amount: U256::from(10),
            payload: TransactionPayload::transfer(),
            gas_limit: GasLimit::new(21_000),
            gas_price: GasPrice::new(1),
            nonce: TransactionNonce::new(0),
            timeout,
            retries_remaining: 1,
        }
    }

    #[test]
    fn classifies_node_messages() {
        assert_eq!(SendErrorKind::classify("transaction underpriced"), SendErrorKind::Underpriced);
        assert_eq!(
            SendErrorKind::classify("replacement transaction underpriced"),
            SendErrorKind::ReplaceUnderpriced
        );
        assert_eq!(
            SendErrorKind::classify("intrinsic gas too low"),
            SendErrorKind::IntrinsicGasTooLow
        );
        assert_eq!(
            SendErrorKind::classify("insufficient funds for gas * price + value"),
            SendErrorKind::InsufficientFunds
        );
        assert_eq!(SendErrorKind::classify("Nonce too low"), SendErrorKind::NonceTooLow);
        assert_eq!(SendErrorKind::classify("execution reverted"), SendErrorKind::Other);
        assert_eq!(
            SendErrorKind::from_rpc_error(&ChainRpcError::Unavailable("timeout".into())),
            SendErrorKind::Network
        );
    }

    #[tokio::test]
    async fn broadcasts_once_and_describes_the_transaction() {
        let (chain, submitter, account) = setup().await;

        let submitted = submitter.submit(&pending(account, 0)).await.unwrap();

        assert_eq!(chain.send_attempts(), 1);
        assert_eq!(submitted.response["nonce"], json!(0));
        assert_eq!(submitted.response["value"], json!("10"));
        assert_eq!(submitted.response["hash"], json!(submitted.hash.hex()));
    }

    #[tokio::test]
    async fn fire_and_forget_does_not_wait() {
        let (chain, submitter, account) = setup().await;
        chain.withhold_receipts(true);

        let outcome = submitter.submit_and_confirm(&pending(account, 0)).await.unwrap();

        assert_eq!(outcome.outcome, ConfirmationOutcome::Submitted);
        assert!(outcome.receipt.is_none());
    }

    #[tokio::test]
    async fn rejection_carries_its_classification() {
        let (chain, submitter, account) = setup().await;
        chain.script_send_errors(["transaction underpriced"]);

        let result = submitter.submit(&pending(account, 0)).await;

        assert_matches!(result, Err(SubmitError::Rejected { kind: SendErrorKind::Underpriced, .. }));
        assert_eq!(chain.send_attempts(), 1);
    }

    #[tokio::test]
    async fn wrong_passphrase_never_reaches_the_node() {
        let (chain, submitter, mut account) = setup().await;
        account.passphrase = "nope".to_string();

        let result = submitter.submit(&pending(account, 0)).await;

        assert_matches!(result, Err(SubmitError::Keystore { .. }));
        assert_eq!(chain.send_attempts(), 0);
    }
}
