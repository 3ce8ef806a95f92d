use std::{fmt::Display, str::FromStr};

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An account address. Display and `hex()` both give the checksummed,
/// `0x`-prefixed form.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EvmAddress(Address);

impl EvmAddress {
    pub fn hex(&self) -> String {
        self.0.to_checksum(None)
    }

    pub fn new(address: Address) -> Self {
        EvmAddress(address)
    }

    pub fn into_address(self) -> Address {
        self.0
    }

    pub fn zero() -> Self {
        Self(Address::ZERO)
    }

    /// A keystore entry that came back with an all-zero address is treated as
    /// empty, the same as one with no address at all.
    pub fn is_empty(&self) -> bool {
        self.0 == Address::ZERO
    }
}

impl Display for EvmAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hex())
    }
}

#[derive(Error, Debug)]
#[error("invalid EVM address {input}: {reason}")]
pub struct ParseEvmAddressError {
    input: String,
    reason: String,
}

impl FromStr for EvmAddress {
    type Err = ParseEvmAddressError;

    fn from_str(param: &str) -> Result<Self, Self::Err> {
        Address::from_str(param.trim()).map(EvmAddress).map_err(|e| ParseEvmAddressError {
            input: param.to_string(),
            reason: e.to_string(),
        })
    }
}

impl From<Address> for EvmAddress {
    fn from(address: Address) -> Self {
        EvmAddress(address)
    }
}
