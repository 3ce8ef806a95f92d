use std::sync::Arc;

use alloy::primitives::U256;
use thiserror::Error;

use crate::account::Account;
use crate::common_types::EvmAddress;
use crate::gas::{GasLimitSetting, GasPrice};
use crate::transaction::confirmation::ConfirmationError;
use crate::transaction::nonce_manager::{NonceError, NonceSequencer};
use crate::transaction::submitter::{SendErrorKind, SubmitError, TransactionSubmitter};
use crate::transaction::types::{
    NonceSetting, PendingTransaction, StakingDirective, TransactionHash, TransactionNonce,
    TransactionPayload, TransactionResult,
};
use crate::{stakeprobe_error, stakeprobe_info, HarnessConfig};

/// Everything needed to send one logical transaction. Unset knobs fall back
/// to the harness config.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub account: Account,
    pub to: EvmAddress,
    pub amount: U256,
    pub payload: TransactionPayload,
    pub nonce: NonceSetting,
    pub gas_limit: GasLimitSetting,
    pub gas_price: Option<GasPrice>,
    /// Seconds to wait for a receipt; zero or negative is fire-and-forget.
    pub timeout: Option<i64>,
    pub attempts: Option<u32>,
    /// `amount` is what the sender holds; the fee at each attempt's gas price
    /// comes out of it.
    pub fee_from_amount: bool,
}

impl SendRequest {
    pub fn transfer(account: Account, to: EvmAddress, amount: U256) -> Self {
        SendRequest {
            account,
            to,
            amount,
            payload: TransactionPayload::transfer(),
            nonce: NonceSetting::Auto,
            gas_limit: GasLimitSetting::Auto,
            gas_price: None,
            timeout: None,
            attempts: None,
            fee_from_amount: false,
        }
    }

    /// Moves all of `balance` to `to`, less the fee of whichever attempt
    /// goes through.
    pub fn sweep(account: Account, to: EvmAddress, balance: U256) -> Self {
        SendRequest { fee_from_amount: true, ..Self::transfer(account, to, balance) }
    }

    /// A staking directive signed by `account`; the precompile is the
    /// recipient, so `to` is the sender itself.
    pub fn staking(account: Account, directive: StakingDirective, amount: U256) -> Self {
        let to = account.address;
        SendRequest { payload: TransactionPayload::Staking(directive), ..Self::transfer(account, to, amount) }
    }

    pub fn with_nonce(mut self, nonce: NonceSetting) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: GasLimitSetting) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_gas_price(mut self, gas_price: GasPrice) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn with_timeout(mut self, timeout: i64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }
}

#[derive(Error, Debug, Clone)]
pub enum SendError {
    #[error("{kind} requires a positive amount")]
    InvalidAmount { kind: &'static str },

    #[error("{address} can not cover {amount} wei plus gas: {message}")]
    InsufficientFunds { address: EvmAddress, amount: U256, message: String },

    #[error("Transaction {hash} was not confirmed within {timeout_seconds}s")]
    Unconfirmed { hash: TransactionHash, timeout_seconds: i64 },

    #[error("Transaction {hash} failed: {message}")]
    Failed { hash: TransactionHash, message: String },

    /// An explicitly assigned nonce is gone. Whoever assigned it has to hand
    /// out a new one; `gas_price` and `attempts_left` carry the retry state.
    #[error("Nonce {nonce} of {address} is used up: {message}")]
    NonceConsumed {
        address: EvmAddress,
        nonce: TransactionNonce,
        gas_price: GasPrice,
        attempts_left: u32,
        message: String,
    },

    #[error("Gave up after {attempts} attempts: {last_error}")]
    AttemptsExhausted { attempts: u32, last_error: String },

    #[error("{0}")]
    Nonce(#[from] NonceError),

    #[error("Keystore refused account {name}: {message}")]
    Keystore { name: String, message: String },
}

/// Sends a transaction, bumping gas and refreshing nonces as the node's
/// answers require, until it sticks or the attempts run out.
#[derive(Clone)]
pub struct RetryingSender {
    config: Arc<HarnessConfig>,
    sequencer: NonceSequencer,
    submitter: TransactionSubmitter,
}

impl RetryingSender {
    pub fn new(
        config: Arc<HarnessConfig>,
        sequencer: NonceSequencer,
        submitter: TransactionSubmitter,
    ) -> Self {
        RetryingSender { config, sequencer, submitter }
    }

    pub async fn send_with_retry(
        &self,
        request: SendRequest,
    ) -> Result<TransactionResult, SendError> {
        if request.payload.requires_amount() && request.amount.is_zero() {
            return Err(SendError::InvalidAmount { kind: request.payload.kind() });
        }

        let attempts = request.attempts.unwrap_or(self.config.retries.send_attempts);
        let from = request.account.address;
        let explicit_nonce = matches!(request.nonce, NonceSetting::Explicit(_));
        let fee_from_amount = request.fee_from_amount;
        let available = request.amount;
        let nonce = self.sequencer.resolve(&from, request.nonce).await?;
        let gas_limit = request
            .gas_limit
            .resolve(|| request.payload.intrinsic_gas(&from, &request.to, request.amount));

        let mut pending = PendingTransaction {
            from: request.account,
            to: request.to,
            amount: request.amount,
            payload: request.payload,
            gas_limit,
            gas_price: request.gas_price.unwrap_or_else(|| self.config.gas.gas_price()),
            nonce,
            timeout: request.timeout.unwrap_or(self.config.confirmation.timeout_seconds),
            retries_remaining: attempts,
        };

        let mut used = 0;
        let mut last_error = String::from("no attempts allowed");

        while pending.retries_remaining > 0 {
            if fee_from_amount {
                let fee = pending.gas_cost();
                if available <= fee {
                    return Err(SendError::InsufficientFunds {
                        address: from,
                        amount: available,
                        message: format!("fee {} leaves nothing to send", fee),
                    });
                }
                pending.amount = available - fee;
            }

            pending.retries_remaining -= 1;
            used += 1;

            let error = match self.submitter.submit_and_confirm(&pending).await {
                Ok(submission) => {
                    stakeprobe_info!(
                        "{} {} from {} to {} confirmed as {} on attempt {}",
                        pending.payload.kind(),
                        pending.amount,
                        from,
                        pending.to,
                        submission.submitted.hash,
                        used
                    );

                    return Ok(TransactionResult {
                        hash: submission.submitted.hash,
                        success: true,
                        outcome: submission.outcome,
                        from,
                        to: pending.to,
                        amount: pending.amount,
                        nonce: pending.nonce,
                        gas_price: pending.gas_price,
                        attempts: used,
                        receipt: submission.receipt,
                        response: submission.submitted.response,
                        error: None,
                    });
                }
                Err(error) => error,
            };

            stakeprobe_error!(
                "Send of {} from {} failed on attempt {}/{}: {}",
                pending.amount,
                from,
                used,
                attempts,
                error
            );
            last_error = error.to_string();

            match error {
                SubmitError::Confirmation(ConfirmationError::TimedOut {
                    hash,
                    timeout_seconds,
                }) => return Err(SendError::Unconfirmed { hash, timeout_seconds }),
                SubmitError::Confirmation(ConfirmationError::Failed { hash, message }) => {
                    return Err(SendError::Failed { hash, message })
                }
                SubmitError::Confirmation(ConfirmationError::Reverted { .. }) => {
                    // the failed transaction still consumed its nonce
                    let bumped = pending.with_bumped_gas_price(self.config.price_bump_percent);
                    if explicit_nonce {
                        return Err(nonce_consumed(&bumped, last_error));
                    }
                    let nonce = self.sequencer.current_nonce(&from).await?;
                    pending = bumped.with_nonce(nonce);
                }
                SubmitError::Keystore { name, message } => {
                    return Err(SendError::Keystore { name, message })
                }
                SubmitError::Rejected { kind, message } => match kind {
                    SendErrorKind::InsufficientFunds => {
                        return Err(SendError::InsufficientFunds {
                            address: from,
                            amount: pending.amount,
                            message,
                        })
                    }
                    SendErrorKind::NonceTooLow => {
                        if explicit_nonce {
                            return Err(nonce_consumed(&pending, message));
                        }
                        let nonce = self.sequencer.current_nonce(&from).await?;
                        pending = pending.with_nonce(nonce);
                    }
                    kind if kind.needs_gas_bump() => {
                        pending = pending.with_bumped_gas_price(self.config.price_bump_percent);
                    }
                    _ => {}
                },
            }
        }

        Err(SendError::AttemptsExhausted { attempts: used, last_error })
    }
}

fn nonce_consumed(pending: &PendingTransaction, message: String) -> SendError {
    SendError::NonceConsumed {
        address: pending.from.address,
        nonce: pending.nonce,
        gas_price: pending.gas_price,
        attempts_left: pending.retries_remaining,
        message,
    }
}
