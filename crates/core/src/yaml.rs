use std::{
    env,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy::primitives::utils::parse_ether;
use alloy::primitives::U256;
use regex::{Captures, Regex};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::{
    account::AccountName,
    gas::{GasLimit, GasPrice},
    network::ChainId,
    stakeprobe_error,
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: ChainId,
    /// Shard the harness funds and sends from.
    #[serde(default)]
    pub shard: u32,
    /// One endpoint per shard, indexed by shard number.
    pub provider_urls: Vec<String>,
}

/// Where the master funding account comes from. Exactly one of
/// `private_key` or `keystore_file` must be set.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TreasuryConfig {
    #[serde(default = "default_treasury_name")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub private_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub keystore_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub passphrase: Option<String>,
}

fn default_treasury_name() -> String {
    "treasury".to_string()
}

impl TreasuryConfig {
    pub fn validate(&self) -> Result<(), String> {
        match (&self.private_key, &self.keystore_file) {
            (Some(_), Some(_)) => {
                Err("treasury must set either private_key or keystore_file, not both".to_string())
            }
            (None, None) => Err("treasury requires a private_key or a keystore_file".to_string()),
            (None, Some(_)) if self.passphrase.is_none() => {
                Err("treasury keystore_file requires a passphrase".to_string())
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GasConfig {
    #[serde(default = "default_gas_price_gwei")]
    pub price_gwei: u64,
    #[serde(default = "default_gas_limit")]
    pub limit: u64,
    /// Per-transaction fee reserved when budgeting; defaults to limit × price.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "deserialize_optional_ether",
        serialize_with = "serialize_optional_ether"
    )]
    pub cost_ether: Option<U256>,
}

fn default_gas_price_gwei() -> u64 {
    1
}

fn default_gas_limit() -> u64 {
    21_000
}

impl Default for GasConfig {
    fn default() -> Self {
        GasConfig { price_gwei: default_gas_price_gwei(), limit: default_gas_limit(), cost_ether: None }
    }
}

impl GasConfig {
    pub fn gas_price(&self) -> GasPrice {
        GasPrice::from_gwei(self.price_gwei)
    }

    pub fn gas_limit(&self) -> GasLimit {
        GasLimit::new(self.limit)
    }

    pub fn cost(&self) -> U256 {
        self.cost_ether.unwrap_or_else(|| self.gas_price().cost_for(self.gas_limit()))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_generate_attempts")]
    pub generate_attempts: u32,
    #[serde(default = "default_send_attempts")]
    pub send_attempts: u32,
}

fn default_generate_attempts() -> u32 {
    3
}

fn default_send_attempts() -> u32 {
    5
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            generate_attempts: default_generate_attempts(),
            send_attempts: default_send_attempts(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConfirmationConfig {
    /// Zero or negative sends fire-and-forget.
    #[serde(default = "default_confirmation_timeout")]
    pub timeout_seconds: i64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_confirmation_timeout() -> i64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        ConfirmationConfig {
            timeout_seconds: default_confirmation_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ConfirmationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KeystoreConfig {
    pub directory: PathBuf,
    /// Passphrase protecting every generated test account.
    pub passphrase: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HarnessConfig {
    /// Prefix that keeps one harness run's accounts apart from another's.
    pub framework_id: String,
    pub network: NetworkConfig,
    pub treasury: TreasuryConfig,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub retries: RetryConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    pub keystore: KeystoreConfig,
    #[serde(default = "default_price_bump_percent")]
    pub price_bump_percent: u32,
    #[serde(default = "default_test_timeout_seconds")]
    pub test_timeout_seconds: u64,
}

fn default_price_bump_percent() -> u32 {
    10
}

fn default_test_timeout_seconds() -> u64 {
    180
}

impl HarnessConfig {
    pub fn account_name(&self, logical_name: &str) -> AccountName {
        AccountName::compose(&self.framework_id, &self.network.name, logical_name)
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_seconds)
    }
}

fn deserialize_optional_ether<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    value
        .map(|s| parse_ether(s.trim()).map_err(serde::de::Error::custom))
        .transpose()
}

fn serialize_optional_ether<S>(amount: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match amount {
        Some(amount) => serializer.serialize_str(&crate::shared::utils::format_wei_to_eth(amount)),
        None => serializer.serialize_none(),
    }
}

/// Substitutes `${VAR}` placeholders with environment values.
fn substitute_env_variables(contents: &str) -> Result<String, ReadYamlError> {
    let re = Regex::new(r"\$\{([^}]+)\}")?;

    if let Some(missing) =
        re.captures_iter(contents).map(|caps| caps[1].to_string()).find(|name| env::var(name).is_err())
    {
        stakeprobe_error!("Environment variable {} not found", missing);
        return Err(ReadYamlError::EnvironmentVariableNotFound(missing));
    }

    let result = re.replace_all(contents, |caps: &Captures| env::var(&caps[1]).unwrap_or_default());
    Ok(result.into_owned())
}

#[derive(Error, Debug)]
pub enum ReadYamlError {
    #[error("Can not find yaml")]
    CanNotFindYaml,

    #[error("Can not read yaml")]
    CanNotReadYaml,

    #[error("Harness config is invalid yaml and does not match the struct - {0}")]
    HarnessConfigInvalidYaml(String),

    #[error("Environment variable {0} not found")]
    EnvironmentVariableNotFound(String),

    #[error("Environment variable pattern is invalid: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Network {0} provider urls not defined")]
    NetworkProviderUrlsNotDefined(String),

    #[error("Network {network} has no provider for shard {shard}")]
    ShardProviderNotDefined { network: String, shard: u32 },

    #[error("Treasury yaml bad format: {0}")]
    TreasuryYamlError(String),

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("framework_id can not be empty")]
    FrameworkIdRequired,
}

/// Parses harness yaml that is already in memory.
pub fn parse(contents: &str, raw_yaml: bool) -> Result<HarnessConfig, ReadYamlError> {
    let substituted_contents =
        if raw_yaml { contents.to_string() } else { substitute_env_variables(contents)? };

    let config: HarnessConfig = serde_yaml::from_str(&substituted_contents)
        .map_err(|e| ReadYamlError::HarnessConfigInvalidYaml(e.to_string()))?;

    if config.framework_id.trim().is_empty() {
        return Err(ReadYamlError::FrameworkIdRequired);
    }

    if config.network.provider_urls.is_empty() {
        return Err(ReadYamlError::NetworkProviderUrlsNotDefined(config.network.name.clone()));
    }

    if config.network.provider_urls.len() <= config.network.shard as usize {
        return Err(ReadYamlError::ShardProviderNotDefined {
            network: config.network.name.clone(),
            shard: config.network.shard,
        });
    }

    config.treasury.validate().map_err(ReadYamlError::TreasuryYamlError)?;

    if config.retries.generate_attempts == 0 {
        return Err(ReadYamlError::MustBePositive("retries.generate_attempts"));
    }

    if config.retries.send_attempts == 0 {
        return Err(ReadYamlError::MustBePositive("retries.send_attempts"));
    }

    if config.confirmation.poll_interval_ms == 0 {
        return Err(ReadYamlError::MustBePositive("confirmation.poll_interval_ms"));
    }

    Ok(config)
}

/// Reads and parses the harness configuration YAML file.
pub fn read(file_path: &Path, raw_yaml: bool) -> Result<HarnessConfig, ReadYamlError> {
    let mut file = File::open(file_path).map_err(|_| ReadYamlError::CanNotFindYaml)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).map_err(|_| ReadYamlError::CanNotReadYaml)?;

    parse(&contents, raw_yaml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const MINIMAL: &str = r#"
framework_id: e2e
network:
  name: localnet
  chain_id: 2
  provider_urls: ["http://127.0.0.1:9500"]
treasury:
  private_key: "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
keystore:
  directory: ./keystore
  passphrase: harness
"#;

    #[test]
    fn applies_defaults() {
        let config = parse(MINIMAL, true).unwrap();

        assert_eq!(config.retries.generate_attempts, 3);
        assert_eq!(config.retries.send_attempts, 5);
        assert_eq!(config.price_bump_percent, 10);
        assert_eq!(config.test_timeout_seconds, 180);
        assert_eq!(config.confirmation.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.gas.cost(), U256::from(21_000u64 * 1_000_000_000));
        assert_eq!(config.account_name("alice").as_str(), "e2e_localnet_alice");
    }

    #[test]
    fn explicit_gas_cost_wins() {
        let yaml = format!("{}gas:\n  cost_ether: \"0.5\"\n", MINIMAL);
        let config = parse(&yaml, true).unwrap();

        assert_eq!(config.gas.cost(), U256::from(500_000_000_000_000_000u64));
    }

    #[test]
    fn missing_environment_variable_is_an_error() {
        let yaml = MINIMAL.replace("harness", "${STAKEPROBE_TEST_UNSET_PASSPHRASE}");
        let result = parse(&yaml, false);

        assert_matches!(
            result,
            Err(ReadYamlError::EnvironmentVariableNotFound(name))
                if name == "STAKEPROBE_TEST_UNSET_PASSPHRASE"
        );
    }

    #[test]
    fn treasury_needs_exactly_one_source() {
        let yaml = MINIMAL.replace(
            "  private_key: \"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80\"",
            "  passphrase: x",
        );

        assert_matches!(parse(&yaml, true), Err(ReadYamlError::TreasuryYamlError(_)));
    }

    #[test]
    fn shard_needs_a_provider() {
        let yaml = MINIMAL.replace("chain_id: 2", "chain_id: 2\n  shard: 1");

        assert_matches!(parse(&yaml, true), Err(ReadYamlError::ShardProviderNotDefined { .. }));
    }
}
