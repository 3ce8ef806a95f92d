use std::fmt::Display;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::common_types::EvmAddress;

mod provisioner;
pub use provisioner::{AccountProvisioner, ProvisionError};

/// Keystore name of an account: `<framework-id>_<network>_<logical-name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountName(String);

impl AccountName {
    pub fn compose(framework_id: &str, network: &str, logical_name: &str) -> Self {
        AccountName(format!("{}_{}_{}", framework_id, network, logical_name))
    }

    /// Wraps a name that is already fully composed, such as the treasury's.
    pub fn raw(name: impl Into<String>) -> Self {
        AccountName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AccountName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A keystore-backed account. `balance` is a snapshot taken when the account
/// was provisioned or funded, not a live value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub name: AccountName,
    pub address: EvmAddress,
    pub balance: U256,
    #[serde(skip_serializing)]
    pub passphrase: String,
}

impl Account {
    pub fn new(name: AccountName, address: EvmAddress, passphrase: impl Into<String>) -> Self {
        Account { name, address, balance: U256::ZERO, passphrase: passphrase.into() }
    }

    pub fn with_balance(&self, balance: U256) -> Account {
        Account { balance, ..self.clone() }
    }
}
