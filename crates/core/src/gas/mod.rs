mod intrinsic;
pub use intrinsic::{
    intrinsic_gas, TX_DATA_NON_ZERO_GAS, TX_DATA_ZERO_GAS, TX_GAS, TX_GAS_VALIDATOR_CREATION,
};

mod types;
pub use types::*;
