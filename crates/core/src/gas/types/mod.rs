mod gas_price;
pub use gas_price::GasPrice;

mod gas_limit;
pub use gas_limit::{GasLimit, GasLimitSetting};
