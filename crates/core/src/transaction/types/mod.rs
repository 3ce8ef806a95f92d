mod transaction_hash;
pub use transaction_hash::TransactionHash;

mod transaction_nonce;
pub use transaction_nonce::{NonceSetting, TransactionNonce};

mod transaction_payload;
pub use transaction_payload::{
    CreateValidator, EditValidator, PayloadCall, StakingDirective, TransactionPayload,
    ValidatorDescription, STAKING_PRECOMPILE_ADDRESS,
};

mod transaction_receipt;
pub use transaction_receipt::{TransactionErrorRecord, TransactionReceipt};

mod transaction_result;
pub use transaction_result::{ConfirmationOutcome, TransactionRecord, TransactionResult};

mod signed_transaction;
pub use signed_transaction::{SignedTransaction, UnsignedTransaction};

mod pending_transaction;
pub use pending_transaction::PendingTransaction;
