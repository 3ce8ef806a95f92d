use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{Mutex, MutexGuard},
};

use alloy::primitives::{keccak256, Bytes};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use super::MockSignedPayload;
use crate::common_types::EvmAddress;
use crate::network::ChainId;
use crate::transaction::types::{SignedTransaction, TransactionHash, UnsignedTransaction};
use crate::wallet::{KeystoreError, KeystoreManagerTrait};

struct MockEntry {
    address: EvmAddress,
    passphrase: String,
    unlocked: bool,
}

#[derive(Default)]
struct MockKeystoreState {
    entries: HashMap<String, MockEntry>,
    failing_generations: u32,
    empty_generations: u32,
    always_failing: HashSet<String>,
    generate_calls: u32,
    removed: Vec<String>,
}

/// Keystore that keeps keys in memory and "signs" by serializing the
/// transaction, which `MockChain` knows how to read back.
#[derive(Default)]
pub struct MockKeystore {
    state: Mutex<MockKeystoreState>,
}

impl MockKeystore {
    pub fn new() -> Self {
        MockKeystore::default()
    }

    fn state(&self) -> MutexGuard<'_, MockKeystoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The next `count` generations leave a partial entry behind and fail.
    pub fn fail_next_generations(&self, count: u32) {
        self.state().failing_generations += count;
    }

    /// The next `count` generations "succeed" with the zero address.
    pub fn empty_next_generations(&self, count: u32) {
        self.state().empty_generations += count;
    }

    /// Every generation under `name` fails.
    pub fn always_fail_generation(&self, name: &str) {
        self.state().always_failing.insert(name.to_string());
    }

    pub fn generate_calls(&self) -> u32 {
        self.state().generate_calls
    }

    pub fn removed(&self) -> Vec<String> {
        self.state().removed.clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.state().entries.keys().cloned().collect()
    }

    fn insert(
        &self,
        name: &str,
        address: EvmAddress,
        passphrase: &str,
    ) -> Result<EvmAddress, KeystoreError> {
        let mut state = self.state();
        if state.entries.contains_key(name) {
            return Err(KeystoreError::AccountExists(name.to_string()));
        }

        state.entries.insert(
            name.to_string(),
            MockEntry { address, passphrase: passphrase.to_string(), unlocked: false },
        );
        Ok(address)
    }
}

#[async_trait]
impl KeystoreManagerTrait for MockKeystore {
    async fn generate(&self, name: &str, passphrase: &str) -> Result<EvmAddress, KeystoreError> {
        let (fail, empty) = {
            let mut state = self.state();
            state.generate_calls += 1;

            let fail = state.always_failing.contains(name) || state.failing_generations > 0;
            if state.failing_generations > 0 {
                state.failing_generations -= 1;
            }

            let empty = !fail && state.empty_generations > 0;
            if empty {
                state.empty_generations -= 1;
            }

            (fail, empty)
        };

        if fail {
            self.insert(name, EvmAddress::zero(), passphrase)?;
            return Err(KeystoreError::GenericSignerError(format!(
                "keystore file for {} was left half written",
                name
            )));
        }

        let address =
            if empty { EvmAddress::zero() } else { EvmAddress::new(PrivateKeySigner::random().address()) };
        self.insert(name, address, passphrase)
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

        self.insert(name, EvmAddress::new(signer.address()), passphrase)
    }

    async fn import_keystore_file(
        &self,
        name: &str,
        path: &Path,
        passphrase: &str,
    ) -> Result<EvmAddress, KeystoreError> {
        if !path.exists() {
            return Err(KeystoreError::AccountNotFound(path.display().to_string()));
        }

        self.insert(name, EvmAddress::new(PrivateKeySigner::random().address()), passphrase)
    }

    async fn unlock(&self, name: &str, passphrase: &str) -> Result<(), KeystoreError> {
        let mut state = self.state();
        let entry = state
            .entries
            .get_mut(name)
            .ok_or_else(|| KeystoreError::AccountNotFound(name.to_string()))?;

        if entry.passphrase != passphrase {
            return Err(KeystoreError::GenericSignerError("wrong passphrase".to_string()));
        }

        entry.unlocked = true;
        Ok(())
    }

    async fn address_of(&self, name: &str) -> Result<EvmAddress, KeystoreError> {
        self.state()
            .entries
            .get(name)
            .map(|entry| entry.address)
            .ok_or_else(|| KeystoreError::AccountNotFound(name.to_string()))
    }

    async fn contains(&self, name: &str) -> bool {
        self.state().entries.contains_key(name)
    }

    async fn sign_transaction(
        &self,
        name: &str,
        transaction: &UnsignedTransaction,
        chain_id: &ChainId,
    ) -> Result<SignedTransaction, KeystoreError> {
        let from = {
            let state = self.state();
            let entry = state
                .entries
                .get(name)
                .ok_or_else(|| KeystoreError::AccountNotFound(name.to_string()))?;
            if !entry.unlocked {
                return Err(KeystoreError::Locked(name.to_string()));
            }
            entry.address
        };

        let payload =
            MockSignedPayload { from, chain_id: chain_id.u64(), tx: transaction.clone() };
        let raw = serde_json::to_vec(&payload)
            .map_err(|e| KeystoreError::GenericSignerError(e.to_string()))?;

        Ok(SignedTransaction {
            hash: TransactionHash::from_alloy_hash(&keccak256(&raw)),
            raw: Bytes::from(raw),
        })
    }

    async fn remove_account(&self, name: &str) -> Result<bool, KeystoreError> {
        let mut state = self.state();
        let removed = state.entries.remove(name).is_some();
        if removed {
            state.removed.push(name.to_string());
        }
        Ok(removed)
    }
}
