use alloy::primitives::U256;

pub fn format_wei_to_eth(wei: &U256) -> String {
    let eth_divisor = U256::from(10u64.pow(18));
    let whole_eth = wei / eth_divisor;
    let remainder = wei % eth_divisor;

    if remainder.is_zero() {
        format!("{}", whole_eth)
    } else {
        let decimal_str = format!("{:018}", remainder);
        let decimal_trimmed = decimal_str.trim_end_matches('0');
        format!("{}.{}", whole_eth, decimal_trimmed)
    }
}

/// `amount * count`, saturating at `U256::MAX` so that an absurd batch size
/// fails the treasury budget check instead of wrapping around.
pub fn scale_amount(amount: &U256, count: u64) -> U256 {
    amount.saturating_mul(U256::from(count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::utils::parse_ether;

    #[test]
    fn formats_whole_and_fractional_ether() {
        assert_eq!(format_wei_to_eth(&parse_ether("10").unwrap()), "10");
        assert_eq!(format_wei_to_eth(&parse_ether("0.25").unwrap()), "0.25");
        assert_eq!(format_wei_to_eth(&U256::ZERO), "0");
    }

    #[test]
    fn scale_amount_saturates() {
        assert_eq!(scale_amount(&U256::from(10), 5), U256::from(50));
        assert_eq!(scale_amount(&U256::MAX, 2), U256::MAX);
    }
}
