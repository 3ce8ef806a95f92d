use serde::{Deserialize, Serialize};

use crate::common_types::EvmAddress;
use crate::transaction::types::TransactionHash;

/// The parts of an on-chain receipt the harness cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: TransactionHash,
    pub block_number: Option<u64>,
    pub status: bool,
    pub gas_used: u64,
    /// Address created by the transaction, e.g. a contract or a new validator.
    pub contract_address: Option<EvmAddress>,
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        self.status
    }
}

/// An explicit rejection the node recorded against a transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionErrorRecord {
    #[serde(rename = "tx-hash-id")]
    pub transaction_hash: TransactionHash,
    #[serde(rename = "error-message")]
    pub message: String,
    #[serde(rename = "time-at-rejection", default)]
    pub time_at_rejection: i64,
}
