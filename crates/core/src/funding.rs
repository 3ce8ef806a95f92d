use std::sync::Arc;

use alloy::primitives::U256;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::account::{Account, AccountName, AccountProvisioner, ProvisionError};
use crate::common_types::EvmAddress;
use crate::gas::{GasLimitSetting, GasPrice};
use crate::provider::{ChainRpc, ChainRpcError};
use crate::shared::utils::scale_amount;
use crate::transaction::types::{NonceSetting, TransactionHash, TransactionNonce, TransactionResult};
use crate::transaction::{NonceError, NonceSequencer, RetryingSender, SendError, SendRequest};
use crate::{stakeprobe_error, stakeprobe_info, HarnessConfig};

#[derive(Error, Debug)]
pub enum FundingError {
    #[error("Treasury holds {available} wei but funding {count} accounts needs {required} wei")]
    InsufficientTreasury { count: u64, required: U256, available: U256 },

    #[error("Funding {name} failed: {reason}")]
    FundingFailed { name: AccountName, reason: String },

    /// The transfer was broadcast but not seen in a block. The account is
    /// kept so that it can still be torn down.
    #[error("Funding {} was not confirmed, transaction {hash} may still land", account.name)]
    Unconfirmed { account: Box<Account>, hash: TransactionHash },

    #[error("{0}")]
    Nonce(#[from] NonceError),

    #[error("{0}")]
    Chain(#[from] ChainRpcError),

    #[error("{0}")]
    Provision(#[from] ProvisionError),
}

/// What a funding batch will cost, checked against the treasury's live
/// balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingDetails {
    pub count: u64,
    pub per_account_amount: U256,
    pub gas_cost: U256,
    pub required: U256,
    pub available: U256,
}

/// Result of funding one account in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct FundingOutcome {
    /// The account with its post-funding balance snapshot.
    pub account: Account,
    pub funded: bool,
    pub final_balance: U256,
    #[serde(skip)]
    pub result: Option<TransactionResult>,
    /// Set when the transfer went out but was never confirmed.
    pub pending: Option<TransactionHash>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum TeardownOutcome {
    /// Leftover funds went back to the treasury.
    Swept { account: Account, amount: U256, result: TransactionResult },
    /// The balance did not cover the fee of a sweep.
    NothingToSweep { account: Account, balance: U256 },
    /// The sweep failed; the account was removed anyway.
    SweepFailed { account: Account, error: String },
    /// The account was already gone from the keystore.
    AlreadyRemoved { name: AccountName },
}

/// One treasury transfer of a batch, with the retry state it carries across
/// nonce reassignments.
struct FundingJob {
    index: usize,
    account: Account,
    nonce: TransactionNonce,
    gas_price: Option<GasPrice>,
    attempts: Option<u32>,
}

/// Moves funds between the treasury and test accounts.
#[derive(Clone)]
pub struct FundingManager {
    config: Arc<HarnessConfig>,
    chain: Arc<dyn ChainRpc>,
    sequencer: NonceSequencer,
    sender: RetryingSender,
    provisioner: AccountProvisioner,
    treasury: Account,
}

impl FundingManager {
    pub fn new(
        config: Arc<HarnessConfig>,
        chain: Arc<dyn ChainRpc>,
        sequencer: NonceSequencer,
        sender: RetryingSender,
        provisioner: AccountProvisioner,
        treasury: Account,
    ) -> Self {
        FundingManager { config, chain, sequencer, sender, provisioner, treasury }
    }

    pub fn treasury(&self) -> &Account {
        &self.treasury
    }

    /// Fails with `InsufficientTreasury` when the treasury can not pay
    /// `count` transfers of `per_account_amount` plus their gas.
    pub async fn calculate_funding_details(
        &self,
        count: u64,
        per_account_amount: &U256,
    ) -> Result<FundingDetails, FundingError> {
        let gas_cost = self.config.gas.cost();
        let required =
            scale_amount(per_account_amount, count).saturating_add(scale_amount(&gas_cost, count));
        let available =
            self.chain.get_balance(&self.treasury.address, self.config.network.shard).await?;

        if available < required {
            stakeprobe_error!(
                "Treasury {} has {} wei, {} transfers of {} need {}",
                self.treasury.address,
                available,
                count,
                per_account_amount,
                required
            );
            return Err(FundingError::InsufficientTreasury { count, required, available });
        }

        Ok(FundingDetails {
            count,
            per_account_amount: *per_account_amount,
            gas_cost,
            required,
            available,
        })
    }

    fn transfer_gas_limit(&self) -> GasLimitSetting {
        GasLimitSetting::Explicit(self.config.gas.gas_limit())
    }

    async fn send_jobs(
        &self,
        jobs: Vec<FundingJob>,
        amount: U256,
    ) -> Vec<(FundingJob, Result<TransactionResult, SendError>)> {
        let mut tasks = JoinSet::new();

        for job in jobs {
            let manager = self.clone();

            tasks.spawn(async move {
                let mut request =
                    SendRequest::transfer(manager.treasury.clone(), job.account.address, amount)
                        .with_nonce(NonceSetting::Explicit(job.nonce))
                        .with_gas_limit(manager.transfer_gas_limit());
                request.gas_price = job.gas_price;
                request.attempts = job.attempts;

                let sent = manager.sender.send_with_retry(request).await;
                (job, sent)
            });
        }

        let mut sent = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => sent.push(result),
                Err(e) => stakeprobe_error!("Funding task panicked: {}", e),
            }
        }
        sent
    }

    /// Sends every job concurrently. Jobs whose nonce got used up are given
    /// a fresh range once the whole round has settled, so no two in-flight
    /// transfers ever share a nonce.
    async fn dispatch(
        &self,
        accounts: Vec<Account>,
        amount: U256,
        nonces: Vec<TransactionNonce>,
    ) -> Vec<FundingOutcome> {
        let mut jobs: Vec<FundingJob> = accounts
            .into_iter()
            .zip(nonces)
            .enumerate()
            .map(|(index, (account, nonce))| FundingJob {
                index,
                account,
                nonce,
                gas_price: None,
                attempts: None,
            })
            .collect();
        let mut settled = Vec::with_capacity(jobs.len());

        while !jobs.is_empty() {
            let mut reassign = Vec::new();
            for (job, sent) in self.send_jobs(jobs, amount).await {
                match sent {
                    Err(SendError::NonceConsumed { gas_price, attempts_left, .. })
                        if attempts_left > 0 =>
                    {
                        reassign.push(FundingJob {
                            gas_price: Some(gas_price),
                            attempts: Some(attempts_left),
                            ..job
                        });
                    }
                    sent => settled.push((job, sent)),
                }
            }

            if reassign.is_empty() {
                break;
            }

            jobs = match self.sequencer.reserve(&self.treasury.address, reassign.len()).await {
                Ok(reservation) => {
                    let nonces = reservation.assign_all().await;
                    reassign
                        .into_iter()
                        .zip(nonces)
                        .map(|(job, nonce)| FundingJob { nonce, ..job })
                        .collect()
                }
                Err(e) => {
                    for job in reassign {
                        settled.push((job, Err(SendError::Nonce(e.clone()))));
                    }
                    Vec::new()
                }
            };
        }

        let mut outcomes = Vec::with_capacity(settled.len());
        for (job, sent) in settled {
            outcomes.push((job.index, self.outcome(job.account, amount, sent).await));
        }

        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    async fn outcome(
        &self,
        account: Account,
        amount: U256,
        sent: Result<TransactionResult, SendError>,
    ) -> FundingOutcome {
        let final_balance =
            match self.chain.get_balance(&account.address, self.config.network.shard).await {
                Ok(balance) => balance,
                Err(e) => {
                    stakeprobe_error!("Could not read balance of {}: {}", account.address, e);
                    account.balance
                }
            };

        match sent {
            Ok(result) => FundingOutcome {
                account: account.with_balance(final_balance),
                funded: true,
                final_balance,
                result: Some(result),
                pending: None,
                error: None,
            },
            Err(e) => {
                stakeprobe_error!("Funding {} with {} failed: {}", account.name, amount, e);
                let pending = match &e {
                    SendError::Unconfirmed { hash, .. } => Some(*hash),
                    _ => None,
                };
                FundingOutcome {
                    account: account.with_balance(final_balance),
                    funded: false,
                    final_balance,
                    result: None,
                    pending,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Sends `per_account_amount` to every account concurrently. The
    /// treasury's nonces are reserved and assigned before anything is sent;
    /// one failed transfer does not stop the others.
    pub async fn fund_accounts(
        &self,
        accounts: &[Account],
        per_account_amount: U256,
    ) -> Result<Vec<FundingOutcome>, FundingError> {
        if accounts.is_empty() {
            return Ok(Vec::new());
        }

        self.calculate_funding_details(accounts.len() as u64, &per_account_amount).await?;

        let nonces = self
            .sequencer
            .reserve(&self.treasury.address, accounts.len())
            .await?
            .assign_all()
            .await;

        let outcomes = self.dispatch(accounts.to_vec(), per_account_amount, nonces).await;
        let funded = outcomes.iter().filter(|outcome| outcome.funded).count();
        stakeprobe_info!("Funded {}/{} accounts with {} wei each", funded, accounts.len(), per_account_amount);

        Ok(outcomes)
    }

    /// Creates a fresh account and funds it with `amount * multiple`.
    pub async fn fund_and_provision(
        &self,
        logical_name: &str,
        amount: U256,
        multiple: u64,
    ) -> Result<Account, FundingError> {
        self.calculate_funding_details(multiple, &amount).await?;

        let account = self.provisioner.generate(logical_name).await?;
        self.fund_provisioned(&account, amount, multiple).await
    }

    /// Funds an existing account with `amount * multiple`. When the transfer
    /// fails the account is torn down again. When it is only unconfirmed the
    /// account stays, because the funds may still arrive.
    pub async fn fund_provisioned(
        &self,
        account: &Account,
        amount: U256,
        multiple: u64,
    ) -> Result<Account, FundingError> {
        let total = scale_amount(&amount, multiple);

        let nonce = match self.sequencer.pending_nonce(&self.treasury.address).await {
            Ok(nonce) => nonce,
            Err(e) => {
                self.release(account).await;
                return Err(e.into());
            }
        };

        let mut outcomes = self.dispatch(vec![account.clone()], total, vec![nonce]).await;
        match outcomes.pop() {
            Some(outcome) if outcome.funded => Ok(outcome.account),
            Some(FundingOutcome { pending: Some(hash), account, .. }) => {
                Err(FundingError::Unconfirmed { account: Box::new(account), hash })
            }
            Some(outcome) => {
                self.release(account).await;
                Err(FundingError::FundingFailed {
                    name: account.name.clone(),
                    reason: outcome.error.unwrap_or_default(),
                })
            }
            None => {
                self.release(account).await;
                Err(FundingError::FundingFailed {
                    name: account.name.clone(),
                    reason: "funding task did not finish".to_string(),
                })
            }
        }
    }

    /// Tears down an account whose funding did not go through. Anything that
    /// did arrive is swept back first.
    async fn release(&self, account: &Account) {
        if let Err(e) = self.teardown_to_treasury(account).await {
            stakeprobe_error!("Could not release unfunded account {}: {}", account.name, e);
        }
    }

    /// Sweeps what is left on `account` back to `treasury_address`, then
    /// removes the account. Safe to call more than once.
    pub async fn teardown(
        &self,
        account: &Account,
        treasury_address: &EvmAddress,
    ) -> Result<TeardownOutcome, FundingError> {
        if !self.provisioner.exists(account).await {
            return Ok(TeardownOutcome::AlreadyRemoved { name: account.name.clone() });
        }

        let outcome = match self.sweep(account, treasury_address).await {
            Ok(outcome) => outcome,
            Err(e) => {
                stakeprobe_error!("Sweeping {} back to treasury failed: {}", account.name, e);
                TeardownOutcome::SweepFailed { account: account.clone(), error: e.to_string() }
            }
        };

        self.provisioner.remove(account).await?;

        Ok(outcome)
    }

    pub async fn teardown_to_treasury(
        &self,
        account: &Account,
    ) -> Result<TeardownOutcome, FundingError> {
        let treasury_address = self.treasury.address;
        self.teardown(account, &treasury_address).await
    }

    async fn sweep(
        &self,
        account: &Account,
        treasury_address: &EvmAddress,
    ) -> Result<TeardownOutcome, FundingError> {
        let balance = self.chain.get_balance(&account.address, self.config.network.shard).await?;
        let gas_cost = self.config.gas.cost();

        if balance <= gas_cost {
            stakeprobe_info!(
                "{} holds {} wei, not enough to pay {} for a sweep",
                account.name,
                balance,
                gas_cost
            );
            return Ok(TeardownOutcome::NothingToSweep { account: account.clone(), balance });
        }

        // the fee is taken from the balance at whatever price the send ends up at
        let request = SendRequest::sweep(account.clone(), *treasury_address, balance)
            .with_gas_limit(self.transfer_gas_limit());

        match self.sender.send_with_retry(request).await {
            Ok(result) => {
                Ok(TeardownOutcome::Swept { account: account.clone(), amount: result.amount, result })
            }
            Err(e) => Ok(TeardownOutcome::SweepFailed { account: account.clone(), error: e.to_string() }),
        }
    }

    pub async fn teardown_all(
        &self,
        accounts: &[Account],
        treasury_address: &EvmAddress,
    ) -> Vec<Result<TeardownOutcome, FundingError>> {
        let mut tasks = JoinSet::new();

        for (index, account) in accounts.iter().cloned().enumerate() {
            let manager = self.clone();
            let treasury_address = *treasury_address;
            tasks.spawn(async move { (index, manager.teardown(&account, &treasury_address).await) });
        }

        let mut outcomes = Vec::with_capacity(accounts.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => stakeprobe_error!("Teardown task panicked: {}", e),
            }
        }

        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::testing::{test_config, MockChain, MockKeystore};
    use crate::wallet::KeystoreManagerTrait;
    use alloy::primitives::utils::parse_ether;
    use assert_matches::assert_matches;
    use std::collections::HashSet;

    const TREASURY: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn treasury_address() -> EvmAddress {
        TREASURY.parse().unwrap()
    }

    async fn engine_with(
        treasury_balance: U256,
        configure: impl FnOnce(&mut HarnessConfig),
    ) -> (Arc<MockChain>, Arc<MockKeystore>, Engine) {
        let mut config = test_config();
        configure(&mut config);

        let chain = Arc::new(MockChain::new());
        chain.set_balance(&treasury_address(), treasury_balance);
        let keystore = Arc::new(MockKeystore::new());

        let engine = Engine::new(Arc::new(config), chain.clone(), keystore.clone()).await.unwrap();
        (chain, keystore, engine)
    }

    #[tokio::test(start_paused = true)]
    async fn funds_five_accounts_with_unique_nonces() {
        let (chain, _, engine) = engine_with(parse_ether("100").unwrap(), |_| {}).await;
        chain.set_nonce(&treasury_address(), 7);

        let names: Vec<String> = (0..5).map(|i| format!("funded_{}", i)).collect();
        let accounts = engine.provisioner.async_generate_multiple_accounts(&names).await;
        let outcomes =
            engine.funding.fund_accounts(&accounts, parse_ether("10").unwrap()).await.unwrap();

        assert_eq!(outcomes.len(), 5);
        for outcome in &outcomes {
            assert!(outcome.funded);
            assert_eq!(outcome.final_balance, parse_ether("10").unwrap());
            assert_eq!(outcome.account.balance, parse_ether("10").unwrap());
        }

        let nonces: HashSet<u64> =
            chain.sent_from(&treasury_address()).iter().map(|tx| tx.nonce).collect();
        assert_eq!(nonces, (7..12).collect::<HashSet<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn overdraw_fails_before_anything_is_sent() {
        let (chain, _, engine) = engine_with(parse_ether("30").unwrap(), |_| {}).await;

        let names: Vec<String> = (0..5).map(|i| format!("overdraw_{}", i)).collect();
        let accounts = engine.provisioner.async_generate_multiple_accounts(&names).await;
        let result = engine.funding.fund_accounts(&accounts, parse_ether("10").unwrap()).await;

        assert_matches!(result, Err(FundingError::InsufficientTreasury { count: 5, .. }));
        assert_eq!(chain.send_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failed_transfer_does_not_abort_the_batch() {
        let (chain, _, engine) = engine_with(parse_ether("100").unwrap(), |config| {
            config.retries.send_attempts = 1;
        })
        .await;

        let names: Vec<String> = (0..3).map(|i| format!("partial_{}", i)).collect();
        let accounts = engine.provisioner.async_generate_multiple_accounts(&names).await;
        chain.script_send_errors(["header not found"]);

        let outcomes =
            engine.funding.fund_accounts(&accounts, parse_ether("1").unwrap()).await.unwrap();

        assert_eq!(outcomes.iter().filter(|o| o.funded).count(), 2);
        assert_eq!(outcomes.iter().filter(|o| !o.funded).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fund_and_provision_checks_budget_for_the_multiple() {
        let (chain, keystore, engine) = engine_with(parse_ether("25").unwrap(), |_| {}).await;

        let result = engine.funding.fund_and_provision("validator", parse_ether("10").unwrap(), 3).await;

        assert_matches!(result, Err(FundingError::InsufficientTreasury { count: 3, .. }));
        assert_eq!(chain.send_attempts(), 0);
        assert!(!keystore.contains("e2e_localnet_validator").await);

        let account = engine
            .funding
            .fund_and_provision("validator", parse_ether("10").unwrap(), 2)
            .await
            .unwrap();
        assert_eq!(account.balance, parse_ether("20").unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_funding_removes_the_new_account() {
        let (chain, keystore, engine) = engine_with(parse_ether("100").unwrap(), |config| {
            config.retries.send_attempts = 2;
        })
        .await;
        chain.script_send_errors(["header not found", "header not found"]);

        let result = engine.funding.fund_and_provision("doomed", parse_ether("1").unwrap(), 1).await;

        assert_matches!(result, Err(FundingError::FundingFailed { .. }));
        assert!(!keystore.contains("e2e_localnet_doomed").await);
    }

    #[tokio::test(start_paused = true)]
    async fn reverted_transfer_in_a_batch_gets_a_fresh_nonce() {
        let (chain, _, engine) = engine_with(parse_ether("100").unwrap(), |_| {}).await;

        let names: Vec<String> = (0..3).map(|i| format!("revert_{}", i)).collect();
        let accounts = engine.provisioner.async_generate_multiple_accounts(&names).await;
        chain.fail_next_receipts(1);

        let outcomes =
            engine.funding.fund_accounts(&accounts, parse_ether("1").unwrap()).await.unwrap();

        assert!(outcomes.iter().all(|o| o.funded));
        assert_eq!(chain.send_attempts(), 4);

        let mut nonces: Vec<u64> =
            chain.sent_from(&treasury_address()).iter().map(|tx| tx.nonce).collect();
        nonces.sort_unstable();
        assert_eq!(nonces, vec![0, 1, 2, 3]);

        let retried = outcomes.iter().find(|o| o.result.as_ref().unwrap().nonce.into_inner() == 3);
        assert!(retried.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_funding_keeps_the_account() {
        let start = parse_ether("100").unwrap();
        let (chain, keystore, engine) = engine_with(start, |_| {}).await;
        chain.withhold_receipts(true);

        let result = engine.funding.fund_and_provision("late", parse_ether("5").unwrap(), 1).await;

        let account = match result {
            Err(FundingError::Unconfirmed { account, .. }) => *account,
            other => panic!("expected an unconfirmed funding, got {:?}", other.map(|a| a.name)),
        };
        assert!(keystore.contains("e2e_localnet_late").await);
        assert_eq!(chain.balance_of(&account.address), parse_ether("5").unwrap());

        chain.withhold_receipts(false);
        let outcome = engine.funding.teardown(&account, &treasury_address()).await.unwrap();

        assert_matches!(outcome, TeardownOutcome::Swept { .. });
        assert!(!keystore.contains("e2e_localnet_late").await);
        assert_eq!(chain.balance_of(&treasury_address()), start - engine.config.gas.cost());
    }

    #[tokio::test(start_paused = true)]
    async fn fee_charging_sweep_survives_a_gas_bump() {
        let (chain, keystore, engine) = engine_with(parse_ether("100").unwrap(), |_| {}).await;
        chain.charge_fees(true);
        let account =
            engine.funding.fund_and_provision("bumped", parse_ether("5").unwrap(), 1).await.unwrap();
        chain.script_send_errors(["transaction underpriced"]);

        let outcome = engine.funding.teardown(&account, &treasury_address()).await.unwrap();

        let bumped_fee = U256::from(21_000u64) * U256::from(1_100_000_000u64);
        assert_matches!(
            outcome,
            TeardownOutcome::Swept { amount, .. } if amount == parse_ether("5").unwrap() - bumped_fee
        );
        assert_eq!(chain.balance_of(&account.address), U256::ZERO);
        assert!(!keystore.contains(account.name.as_str()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_is_idempotent() {
        let (chain, _, engine) = engine_with(parse_ether("100").unwrap(), |_| {}).await;
        let account =
            engine.funding.fund_and_provision("twice", parse_ether("5").unwrap(), 1).await.unwrap();

        let first = engine.funding.teardown(&account, &treasury_address()).await.unwrap();
        assert_matches!(first, TeardownOutcome::Swept { .. });
        let sweeps = chain.sent_from(&account.address).len();

        let second = engine.funding.teardown(&account, &treasury_address()).await.unwrap();
        assert_matches!(second, TeardownOutcome::AlreadyRemoved { .. });
        assert_eq!(chain.sent_from(&account.address).len(), sweeps);
    }

    #[tokio::test(start_paused = true)]
    async fn balance_below_gas_cost_is_not_swept_but_still_removed() {
        let (chain, keystore, engine) = engine_with(parse_ether("100").unwrap(), |_| {}).await;
        let account = engine.provisioner.generate("dust").await.unwrap();
        chain.set_balance(&account.address, U256::from(1_000));

        let outcome = engine.funding.teardown(&account, &treasury_address()).await.unwrap();

        assert_matches!(outcome, TeardownOutcome::NothingToSweep { .. });
        assert!(chain.sent_from(&account.address).is_empty());
        assert!(!keystore.contains(account.name.as_str()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_sweep_still_removes_the_account() {
        let (chain, keystore, engine) = engine_with(parse_ether("100").unwrap(), |config| {
            config.retries.send_attempts = 1;
        })
        .await;
        let account =
            engine.funding.fund_and_provision("stuck", parse_ether("5").unwrap(), 1).await.unwrap();
        chain.script_send_errors(["header not found"]);

        let outcome = engine.funding.teardown(&account, &treasury_address()).await.unwrap();

        assert_matches!(outcome, TeardownOutcome::SweepFailed { .. });
        assert!(!keystore.contains(account.name.as_str()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_fee_round_trip_conserves_the_treasury() {
        let start = parse_ether("100").unwrap();
        let (chain, _, engine) = engine_with(start, |config| config.gas.price_gwei = 0).await;

        let names: Vec<String> = (0..3).map(|i| format!("conserve_{}", i)).collect();
        let accounts = engine.provisioner.async_generate_multiple_accounts(&names).await;
        let outcomes =
            engine.funding.fund_accounts(&accounts, parse_ether("10").unwrap()).await.unwrap();
        let funded: Vec<Account> = outcomes.into_iter().map(|o| o.account).collect();

        let spend = parse_ether("4").unwrap();
        let outside: EvmAddress = "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC".parse().unwrap();
        engine
            .sender
            .send_with_retry(SendRequest::transfer(funded[0].clone(), outside, spend))
            .await
            .unwrap();

        let results = engine.funding.teardown_all(&funded, &treasury_address()).await;
        assert!(results.iter().all(|r| matches!(r, Ok(TeardownOutcome::Swept { .. }))));

        assert_eq!(chain.balance_of(&treasury_address()), start - spend);
    }
}
