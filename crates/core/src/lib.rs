pub mod account;
pub mod engine;
pub mod funding;
pub mod gas;
mod logger;
pub use logger::{setup_info_logger, setup_logger};
pub mod network;
pub mod provider;
mod shared;
pub use shared::{common_types, utils};
pub mod transaction;
pub mod wallet;
pub mod yaml;
pub use yaml::{
    read, ConfirmationConfig, GasConfig, HarnessConfig, KeystoreConfig, NetworkConfig,
    ReadYamlError, RetryConfig, TreasuryConfig,
};

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use account::{Account, AccountName, AccountProvisioner, ProvisionError};
pub use engine::{Engine, EngineError};
pub use funding::{FundingDetails, FundingError, FundingManager, FundingOutcome, TeardownOutcome};
pub use provider::{load_provider, ChainRpc, ChainRpcError, EvmProvider};
pub use transaction::{RetryingSender, SendError, SendRequest};
pub use wallet::{FileKeystoreManager, KeystoreError, KeystoreManagerTrait};

pub use tracing::{error as stakeprobe_error, info as stakeprobe_info, warn as stakeprobe_warn};
