use std::sync::Arc;

use alloy::primitives::U256;
use thiserror::Error;

use crate::account::{Account, AccountProvisioner, ProvisionError};
use crate::funding::{FundingError, FundingManager, TeardownOutcome};
use crate::network::ChainId;
use crate::provider::{ChainRpc, ChainRpcError};
use crate::transaction::types::TransactionResult;
use crate::transaction::{
    ConfirmationWaiter, NonceSequencer, RetryingSender, SendError, SendRequest,
    TransactionSubmitter,
};
use crate::wallet::KeystoreManagerTrait;
use crate::{stakeprobe_info, HarnessConfig};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Could not reach the network: {0}")]
    Chain(#[from] ChainRpcError),

    #[error("Configured chain id {configured} does not match node chain id {actual}")]
    ChainIdMismatch { configured: ChainId, actual: ChainId },

    #[error("{0}")]
    Provision(#[from] ProvisionError),
}

/// Every component wired against one chain, one keystore and one config.
#[derive(Clone)]
pub struct Engine {
    pub config: Arc<HarnessConfig>,
    pub chain: Arc<dyn ChainRpc>,
    pub keystore: Arc<dyn KeystoreManagerTrait>,
    pub sequencer: NonceSequencer,
    pub sender: RetryingSender,
    pub provisioner: AccountProvisioner,
    pub funding: FundingManager,
}

impl Engine {
    /// Checks the chain id, imports the treasury and builds the components.
    pub async fn new(
        config: Arc<HarnessConfig>,
        chain: Arc<dyn ChainRpc>,
        keystore: Arc<dyn KeystoreManagerTrait>,
    ) -> Result<Self, EngineError> {
        let actual = chain.chain_id().await?;
        if actual != config.network.chain_id {
            return Err(EngineError::ChainIdMismatch { configured: config.network.chain_id, actual });
        }

        let sequencer = NonceSequencer::new(chain.clone());
        let waiter = ConfirmationWaiter::new(chain.clone(), config.confirmation.poll_interval());
        let submitter =
            TransactionSubmitter::new(chain.clone(), keystore.clone(), waiter, config.network.chain_id);
        let sender = RetryingSender::new(config.clone(), sequencer.clone(), submitter);
        let provisioner = AccountProvisioner::new(config.clone(), keystore.clone(), chain.clone());

        let treasury = provisioner.import_treasury().await?;
        let funding = FundingManager::new(
            config.clone(),
            chain.clone(),
            sequencer.clone(),
            sender.clone(),
            provisioner.clone(),
            treasury,
        );

        stakeprobe_info!(
            "Engine ready on {} (chain {}, shard {})",
            config.network.name,
            config.network.chain_id,
            config.network.shard
        );

        Ok(Engine { config, chain, keystore, sequencer, sender, provisioner, funding })
    }

    pub fn treasury(&self) -> &Account {
        self.funding.treasury()
    }

    pub async fn fund_and_provision(
        &self,
        logical_name: &str,
        amount: U256,
        multiple: u64,
    ) -> Result<Account, FundingError> {
        self.funding.fund_and_provision(logical_name, amount, multiple).await
    }

    pub async fn send_with_retry(
        &self,
        request: SendRequest,
    ) -> Result<TransactionResult, SendError> {
        self.sender.send_with_retry(request).await
    }

    pub async fn teardown(&self, account: &Account) -> Result<TeardownOutcome, FundingError> {
        self.funding.teardown_to_treasury(account).await
    }

    pub async fn balance_of(&self, account: &Account) -> Result<U256, ChainRpcError> {
        self.chain.get_balance(&account.address, self.config.network.shard).await
    }
}
