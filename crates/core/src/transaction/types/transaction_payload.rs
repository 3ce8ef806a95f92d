use alloy::primitives::{address, Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use serde::{Deserialize, Serialize};

use crate::common_types::EvmAddress;
use crate::gas::{intrinsic_gas, GasLimit};

/// Address of the chain's staking precompile; staking directives are calls
/// into it rather than value transfers.
pub const STAKING_PRECOMPILE_ADDRESS: Address =
    address!("00000000000000000000000000000000000000fc");

sol! {
    function Delegate(address delegatorAddress, address validatorAddress, uint256 amount);
    function Undelegate(address delegatorAddress, address validatorAddress, uint256 amount);
    function CollectRewards(address delegatorAddress);
    function CreateValidator(
        address validatorAddress,
        string name,
        string identity,
        string website,
        string securityContact,
        string details,
        uint256 commissionRate,
        uint256 maxCommissionRate,
        uint256 maxChangeRate,
        uint256 minSelfDelegation,
        uint256 maxTotalDelegation,
        bytes[] slotPubKeys,
        bytes[] slotKeySigs,
        uint256 amount
    );
    function EditValidator(
        address validatorAddress,
        string name,
        string identity,
        string website,
        string securityContact,
        string details,
        uint256 commissionRate,
        uint256 minSelfDelegation,
        uint256 maxTotalDelegation,
        bytes slotKeyToRemove,
        bytes slotKeyToAdd,
        bytes slotKeyToAddSig,
        uint8 eposStatus
    );
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorDescription {
    pub name: String,
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub security_contact: String,
    #[serde(default)]
    pub details: String,
}

/// Commission rates are fixed-point decimals scaled by 1e18.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateValidator {
    pub description: ValidatorDescription,
    pub commission_rate: U256,
    pub max_commission_rate: U256,
    pub max_change_rate: U256,
    pub min_self_delegation: U256,
    pub max_total_delegation: U256,
    pub slot_pub_keys: Vec<Bytes>,
    pub slot_key_sigs: Vec<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditValidator {
    pub description: ValidatorDescription,
    pub commission_rate: U256,
    pub min_self_delegation: U256,
    pub max_total_delegation: U256,
    #[serde(default)]
    pub slot_key_to_remove: Bytes,
    #[serde(default)]
    pub slot_key_to_add: Bytes,
    #[serde(default)]
    pub slot_key_to_add_sig: Bytes,
    #[serde(default)]
    pub active: bool,
}

/// A staking operation issued by the sending account. Amounts come from the
/// surrounding send request, not from the directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingDirective {
    CreateValidator(CreateValidator),
    EditValidator(EditValidator),
    Delegate { validator: EvmAddress },
    Undelegate { validator: EvmAddress },
    CollectRewards,
}

impl StakingDirective {
    pub fn name(&self) -> &'static str {
        match self {
            StakingDirective::CreateValidator(_) => "create_validator",
            StakingDirective::EditValidator(_) => "edit_validator",
            StakingDirective::Delegate { .. } => "delegate",
            StakingDirective::Undelegate { .. } => "undelegate",
            StakingDirective::CollectRewards => "collect_rewards",
        }
    }

    fn encode(&self, sender: Address, amount: U256) -> Bytes {
        let encoded = match self {
            StakingDirective::Delegate { validator } => DelegateCall {
                delegatorAddress: sender,
                validatorAddress: validator.into_address(),
                amount,
            }
            .abi_encode(),
            StakingDirective::Undelegate { validator } => UndelegateCall {
                delegatorAddress: sender,
                validatorAddress: validator.into_address(),
                amount,
            }
            .abi_encode(),
            StakingDirective::CollectRewards => {
                CollectRewardsCall { delegatorAddress: sender }.abi_encode()
            }
            StakingDirective::CreateValidator(create) => CreateValidatorCall {
                validatorAddress: sender,
                name: create.description.name.clone(),
                identity: create.description.identity.clone(),
                website: create.description.website.clone(),
                securityContact: create.description.security_contact.clone(),
                details: create.description.details.clone(),
                commissionRate: create.commission_rate,
                maxCommissionRate: create.max_commission_rate,
                maxChangeRate: create.max_change_rate,
                minSelfDelegation: create.min_self_delegation,
                maxTotalDelegation: create.max_total_delegation,
                slotPubKeys: create.slot_pub_keys.clone(),
                slotKeySigs: create.slot_key_sigs.clone(),
                amount,
            }
            .abi_encode(),
            StakingDirective::EditValidator(edit) => EditValidatorCall {
                validatorAddress: sender,
                name: edit.description.name.clone(),
                identity: edit.description.identity.clone(),
                website: edit.description.website.clone(),
                securityContact: edit.description.security_contact.clone(),
                details: edit.description.details.clone(),
                commissionRate: edit.commission_rate,
                minSelfDelegation: edit.min_self_delegation,
                maxTotalDelegation: edit.max_total_delegation,
                slotKeyToRemove: edit.slot_key_to_remove.clone(),
                slotKeyToAdd: edit.slot_key_to_add.clone(),
                slotKeyToAddSig: edit.slot_key_to_add_sig.clone(),
                eposStatus: if edit.active { 1 } else { 0 },
            }
            .abi_encode(),
        };

        Bytes::from(encoded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionPayload {
    Transfer {
        #[serde(default)]
        data: Bytes,
    },
    Staking(StakingDirective),
}

impl Default for TransactionPayload {
    fn default() -> Self {
        TransactionPayload::transfer()
    }
}

/// The on-wire shape of a payload: recipient, attached value and calldata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadCall {
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
}

impl TransactionPayload {
    pub fn transfer() -> Self {
        TransactionPayload::Transfer { data: Bytes::new() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TransactionPayload::Transfer { .. } => "transfer",
            TransactionPayload::Staking(directive) => directive.name(),
        }
    }

    pub fn is_validator_creation(&self) -> bool {
        matches!(self, TransactionPayload::Staking(StakingDirective::CreateValidator(_)))
    }

    /// Whether the operation moves funds and therefore needs a positive amount.
    pub fn requires_amount(&self) -> bool {
        match self {
            TransactionPayload::Transfer { .. } => true,
            TransactionPayload::Staking(directive) => matches!(
                directive,
                StakingDirective::CreateValidator(_)
                    | StakingDirective::Delegate { .. }
                    | StakingDirective::Undelegate { .. }
            ),
        }
    }

    pub fn to_call(&self, sender: &EvmAddress, to: &EvmAddress, amount: U256) -> PayloadCall {
        match self {
            TransactionPayload::Transfer { data } => {
                PayloadCall { to: to.into_address(), value: amount, input: data.clone() }
            }
            TransactionPayload::Staking(directive) => PayloadCall {
                to: STAKING_PRECOMPILE_ADDRESS,
                value: U256::ZERO,
                input: directive.encode(sender.into_address(), amount),
            },
        }
    }

    pub fn intrinsic_gas(&self, sender: &EvmAddress, to: &EvmAddress, amount: U256) -> GasLimit {
        let call = self.to_call(sender, to, amount);
        intrinsic_gas(&call.input, self.is_validator_creation())
    }
}
