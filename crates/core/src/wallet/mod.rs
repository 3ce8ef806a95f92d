use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::common_types::EvmAddress;
use crate::network::ChainId;
use crate::transaction::types::{SignedTransaction, UnsignedTransaction};

mod file_keystore_manager;
pub use file_keystore_manager::FileKeystoreManager;

#[derive(Error, Debug)]
pub enum KeystoreError {
    #[error("Keystore error: {0}")]
    Keystore(#[from] eth_keystore::KeystoreError),

    #[error("Signing key error: {0}")]
    SigningKey(#[from] alloy::signers::local::LocalSignerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Account {0} is not in the keystore")]
    AccountNotFound(String),

    #[error("Account {0} already exists in the keystore")]
    AccountExists(String),

    #[error("Account {0} is locked")]
    Locked(String),

    #[error("Generic signer error: {0}")]
    GenericSignerError(String),
}

impl From<alloy::signers::Error> for KeystoreError {
    fn from(error: alloy::signers::Error) -> Self {
        KeystoreError::GenericSignerError(format!("Alloy signer error: {}", error))
    }
}

/// Named, passphrase-protected accounts and the ability to sign with them.
///
/// Operations on distinct names are independent; callers serialize work on
/// the same name.
#[async_trait]
pub trait KeystoreManagerTrait: Send + Sync {
    /// Create a fresh random key stored under `name`.
    async fn generate(&self, name: &str, passphrase: &str) -> Result<EvmAddress, KeystoreError>;

    /// Store a hex-encoded private key under `name`.
    async fn import_private_key(
        &self,
        name: &str,
        private_key: &str,
        passphrase: &str,
    ) -> Result<EvmAddress, KeystoreError>;

    /// Copy an existing encrypted keystore file in under `name`.
    async fn import_keystore_file(
        &self,
        name: &str,
        path: &Path,
        passphrase: &str,
    ) -> Result<EvmAddress, KeystoreError>;

    async fn unlock(&self, name: &str, passphrase: &str) -> Result<(), KeystoreError>;

    async fn address_of(&self, name: &str) -> Result<EvmAddress, KeystoreError>;

    async fn contains(&self, name: &str) -> bool;

    /// Sign with an unlocked account.
    async fn sign_transaction(
        &self,
        name: &str,
        transaction: &UnsignedTransaction,
        chain_id: &ChainId,
    ) -> Result<SignedTransaction, KeystoreError>;

    /// Returns `false` when there was nothing to remove.
    async fn remove_account(&self, name: &str) -> Result<bool, KeystoreError>;
}
