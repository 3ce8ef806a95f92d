//! In-memory stand-ins for the chain and the keystore, used by the unit tests
//! here and by downstream harness tests through the `test-utils` feature.

mod mock_chain;
mod mock_keystore;

pub use mock_chain::{MockChain, SentTransaction};
pub use mock_keystore::MockKeystore;

use serde::{Deserialize, Serialize};

use crate::common_types::EvmAddress;
use crate::transaction::types::UnsignedTransaction;
use crate::yaml::{parse, HarnessConfig};

/// What `MockKeystore` "signs": the transaction and its sender, JSON encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MockSignedPayload {
    pub from: EvmAddress,
    pub chain_id: u64,
    pub tx: UnsignedTransaction,
}

pub const TEST_CHAIN_ID: u64 = 1_666_700_000;

const TEST_CONFIG: &str = r#"
framework_id: e2e
network:
  name: localnet
  chain_id: 1666700000
  provider_urls: ["http://127.0.0.1:9500", "http://127.0.0.1:9501"]
treasury:
  private_key: "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
gas:
  price_gwei: 1
  limit: 21000
confirmation:
  timeout_seconds: 10
  poll_interval_ms: 1000
keystore:
  directory: ./keystore
  passphrase: harness
"#;

/// A harness config pointing at nothing, for use with the mocks.
pub fn test_config() -> HarnessConfig {
    match parse(TEST_CONFIG, true) {
        Ok(config) => config,
        Err(e) => panic!("built-in test config is invalid: {}", e),
    }
}
