use std::fmt::Display;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use super::GasLimit;

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GasPrice(u128);

impl GasPrice {
    pub fn new(gas_price: u128) -> Self {
        GasPrice(gas_price)
    }

    pub fn from_gwei(gwei: u64) -> Self {
        GasPrice(gwei as u128 * 1_000_000_000)
    }

    pub fn into_u128(self) -> u128 {
        self.0
    }

    /// Returns the replacement price for a resubmission: the current price
    /// raised by `percent`, and never by less than one wei so a zero or tiny
    /// price still strictly increases.
    pub fn bumped(self, percent: u32) -> GasPrice {
        let increase = self.0.saturating_mul(percent as u128) / 100;
        GasPrice(self.0.saturating_add(increase.max(1)))
    }

    /// Total fee paid for `gas_limit` units at this price.
    pub fn cost_for(self, gas_limit: GasLimit) -> U256 {
        U256::from(self.0).saturating_mul(U256::from(gas_limit.into_inner()))
    }
}

impl Display for GasPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for GasPrice {
    fn from(gas_price: u128) -> Self {
        GasPrice(gas_price)
    }
}
