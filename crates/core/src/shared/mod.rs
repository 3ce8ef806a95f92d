pub mod common_types;
pub mod utils;
