use super::GasLimit;

/// Base cost of every plain transaction.
pub const TX_GAS: u64 = 21_000;

/// Base cost of a validator-creation staking transaction.
pub const TX_GAS_VALIDATOR_CREATION: u64 = 5_000_000;

pub const TX_DATA_ZERO_GAS: u64 = 4;

pub const TX_DATA_NON_ZERO_GAS: u64 = 16;

/// Computes the minimum gas a transaction needs before any execution happens.
///
/// This is what `GasLimitSetting::Auto` resolves to. Validator creation carries
/// a much larger base than a plain transfer, and every calldata byte is charged
/// on top of the base.
pub fn intrinsic_gas(data: &[u8], is_validator_creation: bool) -> GasLimit {
    let base = if is_validator_creation { TX_GAS_VALIDATOR_CREATION } else { TX_GAS };

    let zero_bytes = data.iter().filter(|byte| **byte == 0).count() as u64;
    let non_zero_bytes = data.len() as u64 - zero_bytes;

    let data_gas = zero_bytes
        .saturating_mul(TX_DATA_ZERO_GAS)
        .saturating_add(non_zero_bytes.saturating_mul(TX_DATA_NON_ZERO_GAS));

    GasLimit::new(base.saturating_add(data_gas))
}
