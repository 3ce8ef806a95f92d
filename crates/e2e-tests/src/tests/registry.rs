use crate::tests::scenario_context::ScenarioContext;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

/// Every scenario a test case can name. Unknown names fail to parse instead
/// of failing at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    TransferSameShard,
    TransferInsufficientFunds,
    TransferExplicitNonce,
    TransferFireAndForget,
    FundingBatch,
    StakingCreateValidator,
    StakingDelegate,
    StakingUndelegate,
    StakingCollectRewards,
}

impl ScenarioId {
    pub const ALL: [ScenarioId; 9] = [
        ScenarioId::TransferSameShard,
        ScenarioId::TransferInsufficientFunds,
        ScenarioId::TransferExplicitNonce,
        ScenarioId::TransferFireAndForget,
        ScenarioId::FundingBatch,
        ScenarioId::StakingCreateValidator,
        ScenarioId::StakingDelegate,
        ScenarioId::StakingUndelegate,
        ScenarioId::StakingCollectRewards,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioId::TransferSameShard => "transfer_same_shard",
            ScenarioId::TransferInsufficientFunds => "transfer_insufficient_funds",
            ScenarioId::TransferExplicitNonce => "transfer_explicit_nonce",
            ScenarioId::TransferFireAndForget => "transfer_fire_and_forget",
            ScenarioId::FundingBatch => "funding_batch",
            ScenarioId::StakingCreateValidator => "staking_create_validator",
            ScenarioId::StakingDelegate => "staking_delegate",
            ScenarioId::StakingUndelegate => "staking_undelegate",
            ScenarioId::StakingCollectRewards => "staking_collect_rewards",
        }
    }
}

impl Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScenarioId {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ScenarioId::ALL
            .into_iter()
            .find(|id| id.as_str() == value)
            .ok_or_else(|| anyhow::anyhow!("unknown scenario '{}'", value))
    }
}

/// Resolves to the observed success of the scenario. An `Err` means the
/// scenario itself broke, which always fails the test case.
pub type ScenarioFunction =
    fn(ScenarioContext) -> Pin<Box<dyn Future<Output = Result<bool>> + Send>>;

#[derive(Clone)]
pub struct ScenarioDefinition {
    pub id: ScenarioId,
    pub description: &'static str,
    pub function: ScenarioFunction,
}

impl ScenarioDefinition {
    pub fn new(id: ScenarioId, description: &'static str, function: ScenarioFunction) -> Self {
        Self { id, description, function }
    }
}

pub trait ScenarioModule {
    fn get_scenarios() -> Vec<ScenarioDefinition>;
}

#[derive(Clone, Default)]
pub struct ScenarioRegistry {
    scenarios: HashMap<ScenarioId, ScenarioDefinition>,
}

impl ScenarioRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get_all_scenarios() -> Result<Self> {
        let mut registry = Self::empty();

        for definition in crate::tests::transfers::TransferScenarios::get_scenarios()
            .into_iter()
            .chain(crate::tests::funding::FundingScenarios::get_scenarios())
            .chain(crate::tests::staking::StakingScenarios::get_scenarios())
        {
            registry.register(definition)?;
        }

        Ok(registry)
    }

    pub fn register(&mut self, definition: ScenarioDefinition) -> Result<()> {
        if self.scenarios.contains_key(&definition.id) {
            anyhow::bail!("scenario {} is registered twice", definition.id);
        }

        self.scenarios.insert(definition.id, definition);
        Ok(())
    }

    pub fn get(&self, id: ScenarioId) -> Option<&ScenarioDefinition> {
        self.scenarios.get(&id)
    }

    pub fn contains(&self, id: ScenarioId) -> bool {
        self.scenarios.contains_key(&id)
    }

    /// Scenario ids with no handler, in declaration order.
    pub fn missing(&self) -> Vec<ScenarioId> {
        ScenarioId::ALL.into_iter().filter(|id| !self.contains(*id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_scenario_has_a_handler() {
        let registry = ScenarioRegistry::get_all_scenarios().unwrap();
        assert!(registry.missing().is_empty());
    }

    #[test]
    fn scenario_ids_parse_from_snake_case() {
        let id: ScenarioId = serde_json::from_str("\"staking_delegate\"").unwrap();
        assert_eq!(id, ScenarioId::StakingDelegate);
        assert_eq!("funding_batch".parse::<ScenarioId>().unwrap(), ScenarioId::FundingBatch);
        assert!("transfer_cross_shard".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ScenarioRegistry::empty();
        let definition = ScenarioDefinition::new(ScenarioId::FundingBatch, "noop", |_| {
            Box::pin(async { Ok::<_, anyhow::Error>(true) })
        });

        registry.register(definition.clone()).unwrap();
        assert!(registry.register(definition).is_err());
    }
}
