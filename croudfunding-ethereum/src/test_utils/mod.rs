// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! An in-memory chain running the CroudFunding contract, usable as a wallet provider.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

use alloy_primitives::{keccak256, Address, Bytes, B256, U256, U64};
use alloy_sol_types::{SolInterface as _, SolValue as _};
use async_trait::async_trait;
use futures::channel::mpsc;
use serde_json::{json, Value};

use crate::{
    client::{AccountsChanged, TransactionReceipt, TransactionRequest, WalletProvider},
    common::{EthereumServiceError, RpcErrorObject},
    contract::CroudFunding::{self, CroudFundingCalls},
};

/// The address the contract is deployed at in tests.
pub const CONTRACT_ADDRESS: Address = Address::repeat_byte(0xc0);

/// The block timestamp of the first block, in seconds.
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

/// Returns a distinct test account.
pub fn account(index: u8) -> Address {
    Address::repeat_byte(index + 1)
}

/// One whole token in base units.
pub fn tokens(amount: u64) -> U256 {
    U256::from(amount) * U256::from(10u64).pow(U256::from(18))
}

enum Injected {
    Rpc(RpcErrorObject),
    Unreachable,
}

struct Transaction {
    receipt: TransactionReceipt,
    remaining_polls: u32,
}

struct State {
    owner: Address,
    accounts: Vec<Address>,
    funds: Vec<CroudFunding::Fund>,
    timestamp: u64,
    block_number: u64,
    transactions: BTreeMap<B256, Transaction>,
    receipt_delay: u32,
    hold_receipts: bool,
    revert_on_inclusion: bool,
    failures: BTreeMap<String, VecDeque<Injected>>,
    requests: Vec<String>,
    listeners: Vec<mpsc::UnboundedSender<Vec<Address>>>,
}

/// A scripted chain: it decodes calls with the contract ABI, applies them the way the
/// contract does, and lets tests delay receipts, inject failures and switch accounts.
#[derive(Clone)]
pub struct FakeChain {
    state: Arc<Mutex<State>>,
}

impl FakeChain {
    /// Creates a chain whose contract is owned by `owner`, with `owner` as the selected
    /// wallet account.
    pub fn new(owner: Address) -> Self {
        let state = State {
            owner,
            accounts: vec![owner],
            funds: Vec::new(),
            timestamp: GENESIS_TIMESTAMP,
            block_number: 1,
            transactions: BTreeMap::new(),
            receipt_delay: 0,
            hold_receipts: false,
            revert_on_inclusion: false,
            failures: BTreeMap::new(),
            requests: Vec::new(),
            listeners: Vec::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake chain state poisoned")
    }

    /// Selects `accounts` in the wallet without notifying listeners.
    pub fn with_accounts(self, accounts: Vec<Address>) -> Self {
        self.state().accounts = accounts;
        self
    }

    /// Adds a fund directly to the contract storage and returns its id.
    pub fn add_fund(
        &self,
        title: &str,
        require_amount: U256,
        current_amount: U256,
        contributors: Vec<Address>,
    ) -> u64 {
        let mut state = self.state();
        let id = state.funds.len() as u64;
        let start = state.timestamp;
        state.funds.push(CroudFunding::Fund {
            id: U256::from(id),
            title: title.to_owned(),
            brief: format!("About {title}"),
            requireAmount: require_amount,
            currentAmount: current_amount,
            completed: current_amount >= require_amount,
            startTime: U256::from(start),
            endTime: U256::from(start + 3600),
            contributors,
        });
        id
    }

    /// Returns the contract's funds as stored.
    pub fn funds(&self) -> Vec<CroudFunding::Fund> {
        self.state().funds.clone()
    }

    /// Makes every new transaction wait for `polls` receipt queries before inclusion.
    pub fn set_receipt_delay(&self, polls: u32) {
        self.state().receipt_delay = polls;
    }

    /// Withholds every receipt until [`FakeChain::release_receipts`] is called.
    pub fn hold_receipts(&self) {
        self.state().hold_receipts = true;
    }

    pub fn release_receipts(&self) {
        self.state().hold_receipts = false;
    }

    /// Makes the next included transactions report a failed status.
    pub fn revert_on_inclusion(&self, revert: bool) {
        self.state().revert_on_inclusion = revert;
    }

    /// Makes the next request for `method` fail with `error`. The method may also be the
    /// name of a view function, to fail only the `eth_call`s made to it.
    pub fn fail_next(&self, method: &str, error: RpcErrorObject) {
        self.state()
            .failures
            .entry(method.to_owned())
            .or_default()
            .push_back(Injected::Rpc(error));
    }

    /// Makes the next request for `method` fail as if the provider were unreachable.
    pub fn disconnect_next(&self, method: &str) {
        self.state()
            .failures
            .entry(method.to_owned())
            .or_default()
            .push_back(Injected::Unreachable);
    }

    /// Selects `account` in the wallet and emits `accountsChanged`.
    pub fn switch_account(&self, account: Address) {
        let mut state = self.state();
        state.accounts = vec![account];
        state
            .listeners
            .retain(|listener| listener.unbounded_send(vec![account]).is_ok());
    }

    /// Returns the methods of all requests received so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.state().requests.clone()
    }

    pub fn request_count(&self, method: &str) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|request| *request == method)
            .count()
    }

    fn handle(&self, method: &str, params: &Value) -> Result<Value, RpcErrorObject> {
        let mut state = self.state();
        match method {
            "eth_requestAccounts" | "eth_accounts" => Ok(json!(state.accounts)),
            "eth_call" => {
                let request = transaction_param(params)?;
                state.call(&request).map(|output| json!(output))
            }
            "eth_estimateGas" => {
                let request = transaction_param(params)?;
                state.clone_for_simulation().execute(&request)?;
                Ok(json!(U256::from(21_000 + request.data.len() * 16)))
            }
            "eth_sendTransaction" => {
                let request = transaction_param(params)?;
                state.send(&request).map(|hash| json!(hash))
            }
            "eth_getTransactionReceipt" => {
                let hash: B256 = params
                    .get(0)
                    .cloned()
                    .and_then(|hash| serde_json::from_value(hash).ok())
                    .ok_or_else(|| RpcErrorObject::new(-32602, "invalid params"))?;
                Ok(json!(state.poll_receipt(hash)))
            }
            _ => Err(RpcErrorObject::new(-32601, "method not found")),
        }
    }
}

fn transaction_param(params: &Value) -> Result<TransactionRequest, RpcErrorObject> {
    params
        .get(0)
        .cloned()
        .and_then(|request| serde_json::from_value(request).ok())
        .ok_or_else(|| RpcErrorObject::new(-32602, "invalid params"))
}

fn view_function(params: &Value) -> Option<&'static str> {
    let request = transaction_param(params).ok()?;
    match CroudFundingCalls::abi_decode(&request.data).ok()? {
        CroudFundingCalls::owner(_) => Some("owner"),
        CroudFundingCalls::getAllFunds(_) => Some("getAllFunds"),
        _ => None,
    }
}

impl State {
    fn clone_for_simulation(&self) -> Simulation {
        Simulation {
            owner: self.owner,
            funds: self.funds.clone(),
            timestamp: self.timestamp,
        }
    }

    fn call(&self, request: &TransactionRequest) -> Result<Bytes, RpcErrorObject> {
        if request.to != CONTRACT_ADDRESS {
            return Ok(Bytes::new());
        }
        match CroudFundingCalls::abi_decode(&request.data) {
            Ok(CroudFundingCalls::owner(_)) => Ok(self.owner.abi_encode().into()),
            Ok(CroudFundingCalls::getAllFunds(_)) => Ok(self.funds.abi_encode().into()),
            Ok(_) => Err(RpcErrorObject::reverted("not a view function")),
            Err(_) => Err(RpcErrorObject::reverted("unknown selector")),
        }
    }

    fn send(&mut self, request: &TransactionRequest) -> Result<B256, RpcErrorObject> {
        let from = request.from.unwrap_or_default();
        if !self.accounts.contains(&from) {
            return Err(RpcErrorObject::new(
                4100,
                "The requested account has not been authorized by the user.",
            ));
        }
        let mut simulation = self.clone_for_simulation();
        simulation.execute(request)?;
        self.funds = simulation.funds;
        self.block_number += 1;
        self.timestamp += 12;
        let hash = keccak256(self.block_number.to_be_bytes());
        let status = if self.revert_on_inclusion { 0u64 } else { 1 };
        let receipt = TransactionReceipt {
            transaction_hash: hash,
            block_number: Some(U64::from(self.block_number)),
            status: Some(U64::from(status)),
        };
        self.transactions.insert(
            hash,
            Transaction {
                receipt,
                remaining_polls: self.receipt_delay,
            },
        );
        Ok(hash)
    }

    fn poll_receipt(&mut self, hash: B256) -> Option<TransactionReceipt> {
        let hold = self.hold_receipts;
        let transaction = self.transactions.get_mut(&hash)?;
        if hold {
            return None;
        }
        if transaction.remaining_polls > 0 {
            transaction.remaining_polls -= 1;
            return None;
        }
        Some(transaction.receipt.clone())
    }
}

struct Simulation {
    owner: Address,
    funds: Vec<CroudFunding::Fund>,
    timestamp: u64,
}

impl Simulation {
    fn execute(&mut self, request: &TransactionRequest) -> Result<(), RpcErrorObject> {
        let from = request.from.unwrap_or_default();
        let value = request.value.unwrap_or_default();
        match CroudFundingCalls::abi_decode(&request.data) {
            Ok(CroudFundingCalls::contributeToFund(call)) => {
                let fund = usize::try_from(call.fundId)
                    .ok()
                    .and_then(|index| self.funds.get_mut(index))
                    .ok_or_else(|| RpcErrorObject::reverted("Fund does not exist"))?;
                if fund.completed {
                    return Err(RpcErrorObject::reverted("Fund is already completed"));
                }
                if value.is_zero() {
                    return Err(RpcErrorObject::reverted(
                        "Contribution must be greater than 0",
                    ));
                }
                fund.currentAmount += value;
                fund.contributors.push(from);
                if fund.currentAmount >= fund.requireAmount {
                    fund.completed = true;
                }
                Ok(())
            }
            Ok(CroudFundingCalls::createCroudFund(call)) => {
                if from != self.owner {
                    return Err(RpcErrorObject::reverted("Only owner can create funds"));
                }
                if !value.is_zero() {
                    return Err(RpcErrorObject::reverted("function is not payable"));
                }
                let id = self.funds.len();
                self.funds.push(CroudFunding::Fund {
                    id: U256::from(id),
                    title: call.title,
                    brief: call.brief,
                    requireAmount: call.requireAmount,
                    currentAmount: U256::ZERO,
                    completed: false,
                    startTime: U256::from(self.timestamp),
                    endTime: U256::from(self.timestamp)
                        + call.durationInMinutes * U256::from(60),
                    contributors: Vec::new(),
                });
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(_) => Err(RpcErrorObject::reverted("unknown selector")),
        }
    }
}

#[cfg_attr(not(web), async_trait)]
#[cfg_attr(web, async_trait(?Send))]
impl WalletProvider for FakeChain {
    async fn request(&self, method: &str, params: Value) -> Result<Value, EthereumServiceError> {
        let injected = {
            let mut state = self.state();
            state.requests.push(method.to_owned());
            let function = (method == "eth_call")
                .then(|| view_function(&params))
                .flatten();
            [Some(method), function]
                .into_iter()
                .flatten()
                .find_map(|key| {
                    state
                        .failures
                        .get_mut(key)
                        .and_then(|failures| failures.pop_front())
                })
        };
        match injected {
            Some(Injected::Rpc(error)) => Err(error.into()),
            Some(Injected::Unreachable) => Err(EthereumServiceError::Provider(String::new())),
            None => Ok(self.handle(method, &params)?),
        }
    }

    fn accounts_changed(&self) -> AccountsChanged {
        let (sender, receiver) = mpsc::unbounded();
        self.state().listeners.push(sender);
        receiver
    }
}
