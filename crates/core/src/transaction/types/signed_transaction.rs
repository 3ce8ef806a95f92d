use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::transaction::types::TransactionHash;

/// Everything a signer needs to produce a legacy transaction, minus the
/// chain id which the signer is handed separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
}

/// Signed, encoded transaction ready for `send_raw_transaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: TransactionHash,
}
