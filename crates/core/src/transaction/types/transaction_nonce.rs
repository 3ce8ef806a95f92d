use std::{fmt::Display, ops::Add};

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionNonce(u64);

impl TransactionNonce {
    pub fn new(nonce: u64) -> Self {
        TransactionNonce(nonce)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl Display for TransactionNonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<u64> for TransactionNonce {
    type Output = TransactionNonce;

    fn add(self, other: u64) -> Self::Output {
        TransactionNonce(self.0 + other)
    }
}

impl From<u64> for TransactionNonce {
    fn from(nonce: u64) -> Self {
        TransactionNonce(nonce)
    }
}

impl From<TransactionNonce> for u64 {
    fn from(nonce: TransactionNonce) -> Self {
        nonce.0
    }
}

/// How the nonce of an outgoing transaction is chosen.
///
/// An explicit nonce always wins; `Auto` asks the chain for the sender's
/// current transaction count at submission time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonceSetting {
    #[default]
    Auto,
    Explicit(TransactionNonce),
}

impl NonceSetting {
    pub fn explicit(nonce: u64) -> Self {
        NonceSetting::Explicit(TransactionNonce::new(nonce))
    }
}

impl From<Option<u64>> for NonceSetting {
    fn from(value: Option<u64>) -> Self {
        match value {
            Some(nonce) => NonceSetting::explicit(nonce),
            None => NonceSetting::Auto,
        }
    }
}
