use std::fmt::Display;

use serde::{de, Deserialize, Deserializer, Serialize};

/// EIP-155 chain id. Config files may give it as a number or as a
/// `0x`-prefixed hex string, the form `eth_chainId` returns it in.
#[derive(Debug, Copy, Clone, Serialize, PartialEq, Eq, Hash)]
pub struct ChainId(u64);

impl ChainId {
    pub fn new(id: u64) -> Self {
        ChainId(id)
    }

    pub fn u64(&self) -> u64 {
        self.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChainId {
    Number(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawChainId::deserialize(deserializer)? {
            RawChainId::Number(id) => Ok(ChainId(id)),
            RawChainId::Text(text) => {
                let parsed = match text.strip_prefix("0x") {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => text.parse(),
                };
                parsed
                    .map(ChainId)
                    .map_err(|e| de::Error::custom(format!("invalid chain id {}: {}", text, e)))
            }
        }
    }
}

impl Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        ChainId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_numbers_and_hex() {
        let number: ChainId = serde_yaml::from_str("1666700000").unwrap();
        let hex: ChainId = serde_yaml::from_str("\"0x6357d2e0\"").unwrap();
        let text: ChainId = serde_yaml::from_str("\"1666700000\"").unwrap();

        assert_eq!(number, ChainId::new(1_666_700_000));
        assert_eq!(hex, number);
        assert_eq!(text, number);
        assert!(serde_yaml::from_str::<ChainId>("\"localnet\"").is_err());
    }
}
