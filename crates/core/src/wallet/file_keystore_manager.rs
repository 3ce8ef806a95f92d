use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSigner;
use alloy::primitives::{Bytes, TxKind};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use eth_keystore::{decrypt_key, encrypt_key};
use rand::thread_rng;
use tokio::sync::Mutex;

use crate::common_types::EvmAddress;
use crate::network::ChainId;
use crate::transaction::types::{SignedTransaction, TransactionHash, UnsignedTransaction};
use crate::wallet::{KeystoreError, KeystoreManagerTrait};

/// Encrypted JSON keystores on disk, one file per account name.
pub struct FileKeystoreManager {
    directory: PathBuf,
    addresses: Mutex<HashMap<String, EvmAddress>>,
    unlocked: Mutex<HashMap<String, PrivateKeySigner>>,
}

impl FileKeystoreManager {
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, KeystoreError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;

        Ok(FileKeystoreManager {
            directory,
            addresses: Mutex::new(HashMap::new()),
            unlocked: Mutex::new(HashMap::new()),
        })
    }

    fn keystore_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    fn write_key(
        &self,
        name: &str,
        signer: &PrivateKeySigner,
        passphrase: &str,
    ) -> Result<(), KeystoreError> {
        if self.keystore_path(name).exists() {
            return Err(KeystoreError::AccountExists(name.to_string()));
        }

        let mut rng = thread_rng();
        encrypt_key(&self.directory, &mut rng, signer.to_bytes(), passphrase, Some(name))?;

        Ok(())
    }

    fn read_key(path: &Path, passphrase: &str) -> Result<PrivateKeySigner, KeystoreError> {
        let key = decrypt_key(path, passphrase)?;
        PrivateKeySigner::from_slice(&key)
            .map_err(|e| KeystoreError::InvalidPrivateKey(e.to_string()))
    }

    async fn store(
        &self,
        name: &str,
        signer: PrivateKeySigner,
        passphrase: &str,
    ) -> Result<EvmAddress, KeystoreError> {
        self.write_key(name, &signer, passphrase)?;

        let address = EvmAddress::new(signer.address());
        self.addresses.lock().await.insert(name.to_string(), address);

        Ok(address)
    }
}

#[async_trait]
impl KeystoreManagerTrait for FileKeystoreManager {
    async fn generate(&self, name: &str, passphrase: &str) -> Result<EvmAddress, KeystoreError> {
        self.store(name, PrivateKeySigner::random(), passphrase).await
    }

    async fn import_private_key(
        &self,
        name: &str,
        private_key: &str,
        passphrase: &str,
    ) -> Result<EvmAddress, KeystoreError> {
        let signer = private_key
            .trim_start_matches("0x")
            .parse::<PrivateKeySigner>()
            .map_err(|e| KeystoreError::InvalidPrivateKey(e.to_string()))?;

        self.store(name, signer, passphrase).await
    }

    async fn import_keystore_file(
        &self,
        name: &str,
        path: &Path,
        passphrase: &str,
    ) -> Result<EvmAddress, KeystoreError> {
        let signer = Self::read_key(path, passphrase)?;
        self.store(name, signer, passphrase).await
    }

    async fn unlock(&self, name: &str, passphrase: &str) -> Result<(), KeystoreError> {
        if self.unlocked.lock().await.contains_key(name) {
            return Ok(());
        }

        let path = self.keystore_path(name);
        if !path.exists() {
            return Err(KeystoreError::AccountNotFound(name.to_string()));
        }

        let signer = Self::read_key(&path, passphrase)?;
        self.addresses.lock().await.insert(name.to_string(), EvmAddress::new(signer.address()));
        self.unlocked.lock().await.insert(name.to_string(), signer);

        Ok(())
    }

    async fn address_of(&self, name: &str) -> Result<EvmAddress, KeystoreError> {
        if let Some(address) = self.addresses.lock().await.get(name) {
            return Ok(*address);
        }

        if self.keystore_path(name).exists() {
            Err(KeystoreError::Locked(name.to_string()))
        } else {
            Err(KeystoreError::AccountNotFound(name.to_string()))
        }
    }

    async fn contains(&self, name: &str) -> bool {
        self.addresses.lock().await.contains_key(name) || self.keystore_path(name).exists()
    }

    async fn sign_transaction(
        &self,
        name: &str,
        transaction: &UnsignedTransaction,
        chain_id: &ChainId,
    ) -> Result<SignedTransaction, KeystoreError> {
        let signer = self
            .unlocked
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| KeystoreError::Locked(name.to_string()))?;

        let mut tx = TxLegacy {
            chain_id: Some(chain_id.u64()),
            nonce: transaction.nonce,
            gas_price: transaction.gas_price,
            gas_limit: transaction.gas_limit,
            to: TxKind::Call(transaction.to),
            value: transaction.value,
            input: transaction.input.clone(),
        };

        let signature = signer.sign_transaction(&mut tx).await?;
        let envelope = TxEnvelope::Legacy(tx.into_signed(signature));

        Ok(SignedTransaction {
            hash: TransactionHash::from_alloy_hash(envelope.tx_hash()),
            raw: Bytes::from(envelope.encoded_2718()),
        })
    }

    async fn remove_account(&self, name: &str) -> Result<bool, KeystoreError> {
        let cached = self.addresses.lock().await.remove(name).is_some();
        self.unlocked.lock().await.remove(name);

        let path = self.keystore_path(name);
        if path.exists() {
            fs::remove_file(&path)?;
            return Ok(true);
        }

        Ok(cached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};
    use assert_matches::assert_matches;

    const PASSPHRASE: &str = "harness";
    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn transfer() -> UnsignedTransaction {
        UnsignedTransaction {
            nonce: 0,
            gas_price: 1_000_000_000,
            gas_limit: 21_000,
            to: Address::ZERO,
            value: U256::from(1),
            input: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn generated_account_must_be_unlocked_before_signing() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = FileKeystoreManager::new(dir.path()).unwrap();

        let address = keystore.generate("fw_local_alice", PASSPHRASE).await.unwrap();
        assert!(!address.is_empty());
        assert!(keystore.contains("fw_local_alice").await);

        let locked =
            keystore.sign_transaction("fw_local_alice", &transfer(), &ChainId::new(2)).await;
        assert_matches!(locked, Err(KeystoreError::Locked(_)));

        keystore.unlock("fw_local_alice", PASSPHRASE).await.unwrap();
        let signed =
            keystore.sign_transaction("fw_local_alice", &transfer(), &ChainId::new(2)).await.unwrap();
        assert!(!signed.raw.is_empty());
    }

    #[tokio::test]
    async fn imported_key_keeps_its_address() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = FileKeystoreManager::new(dir.path()).unwrap();

        let address = keystore.import_private_key("treasury", ANVIL_KEY, PASSPHRASE).await.unwrap();
        assert_eq!(address.hex().to_lowercase(), "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");

        let duplicate = keystore.import_private_key("treasury", ANVIL_KEY, PASSPHRASE).await;
        assert_matches!(duplicate, Err(KeystoreError::AccountExists(_)));
    }

    #[tokio::test]
    async fn remove_is_a_no_op_for_unknown_names() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = FileKeystoreManager::new(dir.path()).unwrap();

        keystore.generate("gone", PASSPHRASE).await.unwrap();
        assert!(keystore.remove_account("gone").await.unwrap());
        assert!(!keystore.remove_account("gone").await.unwrap());
        assert!(!keystore.contains("gone").await);
    }
}
