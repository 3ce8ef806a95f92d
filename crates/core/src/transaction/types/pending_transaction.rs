use alloy::primitives::U256;

use crate::account::Account;
use crate::common_types::EvmAddress;
use crate::gas::{GasLimit, GasPrice};
use crate::transaction::types::{TransactionNonce, TransactionPayload};

/// One concrete submission attempt. A gas-bumped retry derives a new value
/// with the same nonce; the old one is simply dropped.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub from: Account,
    pub to: EvmAddress,
    pub amount: U256,
    pub payload: TransactionPayload,
    pub gas_limit: GasLimit,
    pub gas_price: GasPrice,
    pub nonce: TransactionNonce,
    /// Seconds to wait for a receipt; zero or negative means fire-and-forget.
    pub timeout: i64,
    pub retries_remaining: u32,
}

impl PendingTransaction {
    pub fn with_bumped_gas_price(&self, percent: u32) -> PendingTransaction {
        PendingTransaction { gas_price: self.gas_price.bumped(percent), ..self.clone() }
    }

    pub fn with_nonce(&self, nonce: TransactionNonce) -> PendingTransaction {
        PendingTransaction { nonce, ..self.clone() }
    }

    pub fn gas_cost(&self) -> U256 {
        self.gas_price.cost_for(self.gas_limit)
    }
}
