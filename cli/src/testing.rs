//! In-memory algod used by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use anyhow::Result;

use crate::algod::{
    AccountInfo, AlgodApi, AlgodError, AssetHolding, AssetInfo, AssetParams, CompiledTeal,
    NodeStatus, PendingTransaction, SuggestedParams,
};
use crate::crypto::{sha512_256, Address};

pub const GENESIS_ID: &str = "testnet-v1.0";
pub const GENESIS_HASH: [u8; 32] = [7u8; 32];

pub fn test_params() -> SuggestedParams {
    SuggestedParams {
        fee_per_byte: 0,
        min_fee: 1000,
        first_valid: 1,
        last_valid: 1000,
        genesis_id: GENESIS_ID.to_owned(),
        genesis_hash: GENESIS_HASH,
    }
}

pub struct MockAlgod {
    params: SuggestedParams,
    accounts: RefCell<HashMap<Address, AccountInfo>>,
    assets: RefCell<HashMap<u64, AssetInfo>>,
    lookups: RefCell<Vec<Address>>,
    sent: RefCell<Vec<Vec<u8>>>,
    compiled: RefCell<Vec<String>>,
    polls: Cell<usize>,
    confirm_after: Cell<usize>,
    pool_error: RefCell<String>,
    fail_send_at: Cell<Option<usize>>,
    round: Cell<u64>,
}

impl MockAlgod {
    pub fn new() -> Self {
        MockAlgod {
            params: test_params(),
            accounts: RefCell::new(HashMap::new()),
            assets: RefCell::new(HashMap::new()),
            lookups: RefCell::new(Vec::new()),
            sent: RefCell::new(Vec::new()),
            compiled: RefCell::new(Vec::new()),
            polls: Cell::new(0),
            confirm_after: Cell::new(0),
            pool_error: RefCell::new(String::new()),
            fail_send_at: Cell::new(None),
            round: Cell::new(100),
        }
    }

    pub fn with_params(mut self, params: SuggestedParams) -> Self {
        self.params = params;
        self
    }

    fn with_account<F: FnOnce(&mut AccountInfo)>(&self, address: Address, f: F) {
        let mut accounts = self.accounts.borrow_mut();
        let info = accounts.entry(address).or_insert_with(|| AccountInfo {
            address: address.to_string(),
            amount: 0,
            assets: Vec::new(),
        });
        f(info);
    }

    pub fn set_balance(&self, address: Address, micro: u64) {
        self.with_account(address, |info| info.amount = micro);
    }

    pub fn set_asset_holding(&self, address: Address, asset_id: u64, amount: u64, decimals: u32) {
        self.with_account(address, |info| {
            info.assets.push(AssetHolding {
                asset_id,
                amount,
                is_frozen: false,
            })
        });
        self.assets.borrow_mut().insert(
            asset_id,
            AssetInfo {
                index: asset_id,
                params: AssetParams {
                    decimals,
                    unit_name: Some("USDC".into()),
                    name: None,
                },
            },
        );
    }

    /// The first `n` pending polls report "not yet confirmed".
    pub fn confirm_after_polls(&self, n: usize) {
        self.confirm_after.set(n);
    }

    pub fn reject_with(&self, pool_error: &str) {
        *self.pool_error.borrow_mut() = pool_error.to_owned();
    }

    /// Make the `index`-th submission (zero-based) fail.
    pub fn fail_send_at(&self, index: usize) {
        self.fail_send_at.set(Some(index));
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.borrow().clone()
    }

    pub fn lookups(&self) -> Vec<Address> {
        self.lookups.borrow().clone()
    }

    pub fn compiled_sources(&self) -> Vec<String> {
        self.compiled.borrow().clone()
    }

    pub fn pending_polls(&self) -> usize {
        self.polls.get()
    }
}

impl AlgodApi for MockAlgod {
    fn suggested_params(&self) -> Result<SuggestedParams> {
        Ok(self.params.clone())
    }

    fn account_info(&self, address: &Address) -> Result<AccountInfo> {
        self.lookups.borrow_mut().push(*address);
        match self.accounts.borrow().get(address) {
            Some(info) => Ok(info.clone()),
            None => Err(AlgodError::Api {
                status: 404,
                message: "account not found".into(),
            }
            .into()),
        }
    }

    fn asset_info(&self, asset_id: u64) -> Result<AssetInfo> {
        match self.assets.borrow().get(&asset_id) {
            Some(info) => Ok(info.clone()),
            None => Err(AlgodError::Api {
                status: 404,
                message: "asset does not exist".into(),
            }
            .into()),
        }
    }

    fn send_raw_transaction(&self, signed: &[u8]) -> Result<String> {
        let index = self.sent.borrow().len();
        if self.fail_send_at.get() == Some(index) {
            return Err(AlgodError::Api {
                status: 400,
                message: "TransactionPool.Remember: overspend".into(),
            }
            .into());
        }
        self.sent.borrow_mut().push(signed.to_vec());
        Ok(format!("TXID{}", index))
    }

    fn pending_transaction_info(&self, _txid: &str) -> Result<PendingTransaction> {
        let polls = self.polls.get() + 1;
        self.polls.set(polls);

        let pool_error = self.pool_error.borrow().clone();
        if !pool_error.is_empty() {
            return Ok(PendingTransaction {
                confirmed_round: None,
                pool_error,
            });
        }
        let confirmed_round = (polls > self.confirm_after.get()).then(|| self.round.get());
        Ok(PendingTransaction {
            confirmed_round,
            pool_error: String::new(),
        })
    }

    fn status(&self) -> Result<NodeStatus> {
        Ok(NodeStatus {
            last_round: self.round.get(),
        })
    }

    fn status_after_block(&self, round: u64) -> Result<NodeStatus> {
        self.round.set(round + 1);
        self.status()
    }

    fn compile_teal(&self, source: &str) -> Result<CompiledTeal> {
        self.compiled.borrow_mut().push(source.to_owned());
        let mut preimage = b"Program".to_vec();
        preimage.extend_from_slice(source.as_bytes());
        Ok(CompiledTeal {
            hash: Address(sha512_256(&preimage)),
            program: source.as_bytes().to_vec(),
        })
    }
}
