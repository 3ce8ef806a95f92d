use std::{fmt::Display, str::FromStr};

use alloy::primitives::TxHash;
use serde::{Deserialize, Serialize};

/// Hash a transaction is tracked by from broadcast to receipt.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TransactionHash(TxHash);

impl TransactionHash {
    pub fn hex(&self) -> String {
        format!("{:?}", self.0)
    }

    pub fn from_alloy_hash(hash: &TxHash) -> Self {
        Self(*hash)
    }

    pub fn into_alloy_hash(self) -> TxHash {
        self.0
    }
}

impl Display for TransactionHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransactionHash {
    type Err = String;

    fn from_str(param: &str) -> Result<Self, Self::Err> {
        TxHash::from_str(param)
            .map(TransactionHash)
            .map_err(|e| format!("invalid transaction hash {}: {}", param, e))
    }
}
