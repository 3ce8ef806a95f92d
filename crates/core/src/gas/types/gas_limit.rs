use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GasLimit(u64);

impl GasLimit {
    pub fn new(gas_limit: u64) -> Self {
        GasLimit(gas_limit)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl Display for GasLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GasLimit {
    fn from(gas_limit: u64) -> Self {
        GasLimit(gas_limit)
    }
}

/// How the gas limit of an outgoing transaction is chosen.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasLimitSetting {
    /// Derive the limit from the payload's intrinsic gas.
    #[default]
    Auto,
    Explicit(GasLimit),
}

impl GasLimitSetting {
    /// The limit to sign with; `Auto` falls back to `intrinsic`.
    pub fn resolve(self, intrinsic: impl FnOnce() -> GasLimit) -> GasLimit {
        match self {
            GasLimitSetting::Explicit(gas_limit) => gas_limit,
            GasLimitSetting::Auto => intrinsic(),
        }
    }
}
