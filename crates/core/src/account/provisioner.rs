use std::{path::Path, sync::Arc};

use thiserror::Error;
use tokio::{sync::mpsc, task::JoinSet};

use crate::account::{Account, AccountName};
use crate::provider::{ChainRpc, ChainRpcError};
use crate::wallet::{KeystoreError, KeystoreManagerTrait};
use crate::{stakeprobe_error, stakeprobe_info, stakeprobe_warn, HarnessConfig};

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Account {name} could not be created after {attempts} attempts: {reason}")]
    Corrupted { name: AccountName, attempts: u32, reason: String },

    #[error("Keystore error: {0}")]
    Keystore(#[from] KeystoreError),

    #[error("Could not read balance: {0}")]
    Balance(#[from] ChainRpcError),

    #[error("Treasury is misconfigured: {0}")]
    Treasury(String),
}

/// Creates, imports and removes keystore accounts under the harness naming
/// scheme.
#[derive(Clone)]
pub struct AccountProvisioner {
    config: Arc<HarnessConfig>,
    keystore: Arc<dyn KeystoreManagerTrait>,
    chain: Arc<dyn ChainRpc>,
}

impl AccountProvisioner {
    pub fn new(
        config: Arc<HarnessConfig>,
        keystore: Arc<dyn KeystoreManagerTrait>,
        chain: Arc<dyn ChainRpc>,
    ) -> Self {
        AccountProvisioner { config, keystore, chain }
    }

    pub async fn generate(&self, logical_name: &str) -> Result<Account, ProvisionError> {
        self.perform_generate_account(logical_name, self.config.retries.generate_attempts).await
    }

    /// Generates a fresh account, retrying up to `attempts` times. A failed or
    /// empty-address generation may leave a half-written entry behind, so the
    /// name is force-removed before the next try.
    pub async fn perform_generate_account(
        &self,
        logical_name: &str,
        attempts: u32,
    ) -> Result<Account, ProvisionError> {
        let name = self.config.account_name(logical_name);
        let passphrase = &self.config.keystore.passphrase;
        let mut reason = String::from("no attempts allowed");

        for attempt in 1..=attempts {
            match self.keystore.generate(name.as_str(), passphrase).await {
                Ok(address) if !address.is_empty() => {
                    stakeprobe_info!("Generated account {} at {}", name, address);
                    return Ok(Account::new(name, address, passphrase.clone()));
                }
                Ok(_) => {
                    reason = "keystore returned an empty address".to_string();
                }
                Err(e) => {
                    reason = e.to_string();
                }
            }

            stakeprobe_warn!(
                "Generating account {} failed on attempt {}/{}: {}",
                name,
                attempt,
                attempts,
                reason
            );

            if let Err(e) = self.keystore.remove_account(name.as_str()).await {
                stakeprobe_error!("Could not clear partial account {}: {}", name, e);
            }
        }

        Err(ProvisionError::Corrupted { name, attempts, reason })
    }

    async fn snapshot(&self, name: AccountName, passphrase: &str) -> Result<Account, ProvisionError> {
        let address = self.keystore.address_of(name.as_str()).await?;
        let balance = self.chain.get_balance(&address, self.config.network.shard).await?;

        Ok(Account::new(name, address, passphrase).with_balance(balance))
    }

    pub async fn import_private_key(
        &self,
        logical_name: &str,
        private_key: &str,
    ) -> Result<Account, ProvisionError> {
        let name = self.config.account_name(logical_name);
        let passphrase = &self.config.keystore.passphrase;

        self.keystore.import_private_key(name.as_str(), private_key, passphrase).await?;
        self.snapshot(name, passphrase).await
    }

    pub async fn import_keystore_file(
        &self,
        logical_name: &str,
        path: &Path,
        passphrase: &str,
    ) -> Result<Account, ProvisionError> {
        let name = self.config.account_name(logical_name);

        self.keystore.import_keystore_file(name.as_str(), path, passphrase).await?;
        self.snapshot(name, passphrase).await
    }

    /// Brings the configured treasury into the keystore. A stale entry left
    /// by an earlier run is replaced.
    pub async fn import_treasury(&self) -> Result<Account, ProvisionError> {
        let treasury = &self.config.treasury;
        treasury.validate().map_err(ProvisionError::Treasury)?;

        let name = self.config.account_name(&treasury.name);
        if self.keystore.contains(name.as_str()).await {
            self.keystore.remove_account(name.as_str()).await?;
        }

        let account = match (&treasury.private_key, &treasury.keystore_file) {
            (Some(private_key), _) => self.import_private_key(&treasury.name, private_key).await?,
            (None, Some(path)) => {
                let passphrase = treasury.passphrase.as_deref().unwrap_or_default();
                self.import_keystore_file(&treasury.name, path, passphrase).await?
            }
            (None, None) => {
                return Err(ProvisionError::Treasury("no key source configured".to_string()))
            }
        };

        stakeprobe_info!("Treasury {} holds {} wei", account.address, account.balance);
        Ok(account)
    }

    /// Generates one account per name concurrently. Names that fail are
    /// logged and left out of the result.
    pub async fn async_generate_multiple_accounts(&self, logical_names: &[String]) -> Vec<Account> {
        let (sender, mut receiver) = mpsc::channel(logical_names.len().max(1));
        let mut tasks = JoinSet::new();

        for logical_name in logical_names {
            let provisioner = self.clone();
            let sender = sender.clone();
            let logical_name = logical_name.clone();

            tasks.spawn(async move {
                match provisioner.generate(&logical_name).await {
                    Ok(account) => {
                        if sender.send(account).await.is_err() {
                            stakeprobe_error!("Account channel closed before {} was sent", logical_name);
                        }
                    }
                    Err(e) => stakeprobe_error!("Skipping account {}: {}", logical_name, e),
                }
            });
        }
        drop(sender);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                stakeprobe_error!("Account generation task panicked: {}", e);
            }
        }

        let mut accounts = Vec::with_capacity(logical_names.len());
        while let Some(account) = receiver.recv().await {
            accounts.push(account);
        }
        accounts
    }

    pub async fn exists(&self, account: &Account) -> bool {
        self.keystore.contains(account.name.as_str()).await
    }

    /// Removes the account from the keystore. Returns `false` if it was
    /// already gone.
    pub async fn remove(&self, account: &Account) -> Result<bool, ProvisionError> {
        let removed = self.keystore.remove_account(account.name.as_str()).await?;
        if removed {
            stakeprobe_info!("Removed account {}", account.name);
        }
        Ok(removed)
    }
}
