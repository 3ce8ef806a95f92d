pub mod confirmation;
pub mod nonce_manager;
pub mod retrying_sender;
pub mod submitter;
pub mod types;

pub use confirmation::{ConfirmationError, ConfirmationWaiter};
pub use nonce_manager::{NonceError, NonceManager, NonceReservation, NonceSequencer};
pub use retrying_sender::{RetryingSender, SendError, SendRequest};
pub use submitter::{
    SendErrorKind, SubmissionOutcome, SubmitError, SubmittedTransaction, TransactionSubmitter,
};
