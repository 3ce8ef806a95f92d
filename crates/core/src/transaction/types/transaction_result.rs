use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common_types::EvmAddress;
use crate::gas::GasPrice;
use crate::shared::utils::format_wei_to_eth;
use crate::transaction::types::{TransactionHash, TransactionNonce, TransactionReceipt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    /// Broadcast accepted, no wait was requested.
    Submitted,
    Confirmed,
    /// Included with a failure status or rejected by the node.
    Failed,
    /// No receipt was observed within the confirmation budget.
    TimedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResult {
    pub hash: TransactionHash,
    pub success: bool,
    pub outcome: ConfirmationOutcome,
    pub from: EvmAddress,
    pub to: EvmAddress,
    pub amount: U256,
    pub nonce: TransactionNonce,
    pub gas_price: GasPrice,
    /// Number of submission cycles used to reach this result.
    pub attempts: u32,
    pub receipt: Option<TransactionReceipt>,
    pub response: Map<String, Value>,
    pub error: Option<String>,
}

impl TransactionResult {
    pub fn to_record(&self, kind: &str) -> TransactionRecord {
        TransactionRecord {
            kind: kind.to_string(),
            from: self.from,
            to: self.to,
            amount: format_wei_to_eth(&self.amount),
            hash: Some(self.hash),
            nonce: Some(self.nonce),
            gas_price: Some(self.gas_price),
            success: self.success,
            error: self.error.clone(),
            recorded_at: Utc::now(),
        }
    }
}

/// Ledger entry a test case keeps for reporting; unlike `TransactionResult`
/// it can also describe a send that never produced a hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub kind: String,
    pub from: EvmAddress,
    pub to: EvmAddress,
    /// Amount in whole-token units.
    pub amount: String,
    pub hash: Option<TransactionHash>,
    pub nonce: Option<TransactionNonce>,
    pub gas_price: Option<GasPrice>,
    pub success: bool,
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn failed(kind: &str, from: EvmAddress, to: EvmAddress, amount: U256, error: String) -> Self {
        TransactionRecord {
            kind: kind.to_string(),
            from,
            to,
            amount: format_wei_to_eth(&amount),
            hash: None,
            nonce: None,
            gas_price: None,
            success: false,
            error: Some(error),
            recorded_at: Utc::now(),
        }
    }
}
