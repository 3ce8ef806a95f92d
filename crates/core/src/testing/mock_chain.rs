use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Mutex, MutexGuard},
};

use alloy::primitives::{keccak256, Address, Bytes, U256};
use async_trait::async_trait;

use super::{MockSignedPayload, TEST_CHAIN_ID};
use crate::common_types::EvmAddress;
use crate::network::ChainId;
use crate::provider::{BlockTag, ChainRpc, ChainRpcError};
use crate::transaction::types::{
    TransactionErrorRecord, TransactionHash, TransactionReceipt, STAKING_PRECOMPILE_ADDRESS,
};

/// A transaction the mock accepted into its mempool.
#[derive(Debug, Clone)]
pub struct SentTransaction {
    pub hash: TransactionHash,
    pub from: EvmAddress,
    pub to: Address,
    pub value: U256,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub input: Bytes,
}

#[derive(Default)]
struct MockChainState {
    balances: HashMap<Address, U256>,
    next_nonces: HashMap<Address, u64>,
    used_nonces: HashSet<(Address, u64)>,
    pending_extra: HashMap<Address, u64>,
    receipts: HashMap<TransactionHash, TransactionReceipt>,
    receipt_polls: HashMap<TransactionHash, u32>,
    error_sink: Vec<TransactionErrorRecord>,
    sent: Vec<SentTransaction>,
    send_attempts: u32,
    scripted_send_errors: VecDeque<String>,
    failing_receipts: u32,
    on_chain_rejections: VecDeque<String>,
    receipt_delay_polls: u32,
    withhold_receipts: bool,
    fail_nonce_queries: bool,
    charge_fees: bool,
    block_number: u64,
}

/// A single-node chain kept in memory. Every accepted transaction is mined
/// instantly unless a test says otherwise.
pub struct MockChain {
    chain_id: ChainId,
    shards: u32,
    state: Mutex<MockChainState>,
}

impl Default for MockChain {
    fn default() -> Self {
        MockChain::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        MockChain {
            chain_id: ChainId::new(TEST_CHAIN_ID),
            shards: 2,
            state: Mutex::new(MockChainState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockChainState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_balance(&self, address: &EvmAddress, amount: U256) {
        self.state().balances.insert(address.into_address(), amount);
    }

    pub fn balance_of(&self, address: &EvmAddress) -> U256 {
        self.state().balances.get(&address.into_address()).copied().unwrap_or_default()
    }

    pub fn set_nonce(&self, address: &EvmAddress, nonce: u64) {
        self.state().next_nonces.insert(address.into_address(), nonce);
    }

    /// Pretend `count` transactions from `address` are waiting in the mempool.
    pub fn add_pending(&self, address: &EvmAddress, count: u64) {
        *self.state().pending_extra.entry(address.into_address()).or_default() += count;
    }

    /// Each following send is rejected with the next message, in order.
    pub fn script_send_errors<I, S>(&self, messages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().scripted_send_errors.extend(messages.into_iter().map(Into::into));
    }

    /// The next `count` accepted transactions are mined with a failure status.
    pub fn fail_next_receipts(&self, count: u32) {
        self.state().failing_receipts += count;
    }

    /// The next accepted transaction lands in the error sink instead of a block.
    pub fn reject_next_on_chain(&self, message: impl Into<String>) {
        self.state().on_chain_rejections.push_back(message.into());
    }

    /// Receipts stay hidden for the first `polls` lookups of each hash.
    pub fn delay_receipts(&self, polls: u32) {
        self.state().receipt_delay_polls = polls;
    }

    pub fn withhold_receipts(&self, withhold: bool) {
        self.state().withhold_receipts = withhold;
    }

    pub fn fail_nonce_queries(&self, fail: bool) {
        self.state().fail_nonce_queries = fail;
    }

    /// Charge `gas_price * gas_limit` per mined transaction. Off by default,
    /// which models a zero-fee network.
    pub fn charge_fees(&self, charge: bool) {
        self.state().charge_fees = charge;
    }

    pub fn sent(&self) -> Vec<SentTransaction> {
        self.state().sent.clone()
    }

    pub fn sent_from(&self, address: &EvmAddress) -> Vec<SentTransaction> {
        self.sent().into_iter().filter(|tx| &tx.from == address).collect()
    }

    /// Every `send_raw_transaction` call, including rejected ones.
    pub fn send_attempts(&self) -> u32 {
        self.state().send_attempts
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn chain_id(&self) -> Result<ChainId, ChainRpcError> {
        Ok(self.chain_id)
    }

    async fn get_balance(&self, address: &EvmAddress, shard: u32) -> Result<U256, ChainRpcError> {
        if shard >= self.shards {
            return Err(ChainRpcError::UnknownShard(shard));
        }

        Ok(self.balance_of(address))
    }

    async fn get_transaction_count(
        &self,
        address: &EvmAddress,
        tag: BlockTag,
    ) -> Result<u64, ChainRpcError> {
        let state = self.state();
        if state.fail_nonce_queries {
            return Err(ChainRpcError::Unavailable("connection refused".to_string()));
        }

        let latest = state.next_nonces.get(&address.into_address()).copied().unwrap_or_default();
        Ok(match tag {
            BlockTag::Latest => latest,
            BlockTag::Pending => {
                latest + state.pending_extra.get(&address.into_address()).copied().unwrap_or_default()
            }
        })
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<TransactionHash, ChainRpcError> {
        let mut state = self.state();
        state.send_attempts += 1;

        if let Some(message) = state.scripted_send_errors.pop_front() {
            return Err(ChainRpcError::Rejected { message });
        }

        let signed: MockSignedPayload = serde_json::from_slice(raw)
            .map_err(|e| ChainRpcError::Malformed(format!("undecodable transaction: {}", e)))?;
        if signed.chain_id != self.chain_id.u64() {
            return Err(ChainRpcError::Rejected { message: "invalid chain id for signer".into() });
        }

        let from = signed.from.into_address();
        let tx = signed.tx;
        let hash = TransactionHash::from_alloy_hash(&keccak256(raw));

        if state.used_nonces.contains(&(from, tx.nonce)) {
            return Err(ChainRpcError::Rejected { message: "nonce too low".to_string() });
        }

        let fee = if state.charge_fees {
            U256::from(tx.gas_price).saturating_mul(U256::from(tx.gas_limit))
        } else {
            U256::ZERO
        };
        let balance = state.balances.get(&from).copied().unwrap_or_default();
        if balance < tx.value.saturating_add(fee) {
            return Err(ChainRpcError::Rejected {
                message: "insufficient funds for gas * price + value".to_string(),
            });
        }

        state.sent.push(SentTransaction {
            hash,
            from: signed.from,
            to: tx.to,
            value: tx.value,
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            input: tx.input.clone(),
        });

        if let Some(message) = state.on_chain_rejections.pop_front() {
            state.error_sink.push(TransactionErrorRecord {
                transaction_hash: hash,
                message,
                time_at_rejection: 0,
            });
            return Ok(hash);
        }

        state.used_nonces.insert((from, tx.nonce));
        let next = state.next_nonces.entry(from).or_default();
        *next = (*next).max(tx.nonce + 1);

        let status = if state.failing_receipts > 0 {
            state.failing_receipts -= 1;
            false
        } else {
            true
        };

        let debit = if status { tx.value.saturating_add(fee) } else { fee };
        state.balances.insert(from, balance - debit);
        if status && tx.to != STAKING_PRECOMPILE_ADDRESS {
            *state.balances.entry(tx.to).or_default() += tx.value;
        }

        state.block_number += 1;
        let block_number = state.block_number;
        state.receipts.insert(
            hash,
            TransactionReceipt {
                transaction_hash: hash,
                block_number: Some(block_number),
                status,
                gas_used: tx.gas_limit,
                contract_address: None,
            },
        );

        Ok(hash)
    }

    async fn get_transaction_receipt(
        &self,
        hash: &TransactionHash,
    ) -> Result<Option<TransactionReceipt>, ChainRpcError> {
        let mut state = self.state();
        if state.withhold_receipts {
            return Ok(None);
        }

        let delay = state.receipt_delay_polls;
        let polls = state.receipt_polls.entry(*hash).or_default();
        *polls += 1;
        if *polls <= delay {
            return Ok(None);
        }

        Ok(state.receipts.get(hash).cloned())
    }

    async fn get_transaction_error(
        &self,
        hash: &TransactionHash,
    ) -> Result<Option<TransactionErrorRecord>, ChainRpcError> {
        Ok(self.state().error_sink.iter().find(|record| &record.transaction_hash == hash).cloned())
    }
}
