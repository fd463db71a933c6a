// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Typed access to the deployed CroudFunding contract.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall};
use tracing::{debug, instrument};

use crate::{
    client::{Signer, TransactionReceipt, TransactionRequest, WalletProvider},
    common::EthereumServiceError,
    time::{timer, Duration},
};

sol! {
    /// The externally deployed CroudFunding contract.
    #[derive(Debug, PartialEq, Eq)]
    interface CroudFunding {
        struct Fund {
            uint256 id;
            string title;
            string brief;
            uint256 requireAmount;
            uint256 currentAmount;
            bool completed;
            uint256 startTime;
            uint256 endTime;
            address[] contributors;
        }

        function owner() external view returns (address);

        function getAllFunds() external view returns (Fund[] memory);

        function contributeToFund(uint256 fundId) external payable;

        function createCroudFund(
            string calldata title,
            string calldata brief,
            uint256 requireAmount,
            uint256 durationInMinutes
        ) external;
    }
}

/// How a submitted transaction is awaited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfirmationConfig {
    /// The delay between two receipt queries.
    pub poll_interval: Duration,
    /// How many receipt queries are made before giving up.
    pub max_polls: u32,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            max_polls: 120,
        }
    }
}

/// A transaction accepted by the wallet and not yet known to be included.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingTransaction {
    pub hash: B256,
}

/// The CroudFunding contract at a fixed address, used through one signing account.
pub struct CroudFundingContract<P> {
    address: Address,
    signer: Signer<P>,
    confirmation: ConfirmationConfig,
}

impl<P: WalletProvider> CroudFundingContract<P> {
    pub fn new(address: Address, signer: Signer<P>) -> Self {
        Self {
            address,
            signer,
            confirmation: ConfirmationConfig::default(),
        }
    }

    pub fn with_confirmation(mut self, confirmation: ConfirmationConfig) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> &Signer<P> {
        &self.signer
    }

    async fn call<C: SolCall>(&self, call: &C) -> Result<Bytes, EthereumServiceError> {
        let request =
            TransactionRequest::new(self.address, call.abi_encode()).with_from(self.signer.address());
        self.signer.provider().call(&request).await
    }

    #[instrument(level = "debug", skip(self), fields(contract = %self.address))]
    pub async fn get_owner(&self) -> Result<Address, EthereumServiceError> {
        let output = self.call(&CroudFunding::ownerCall {}).await?;
        Ok(CroudFunding::ownerCall::abi_decode_returns(&output)?)
    }

    /// Returns the contract's records as stored, in creation order.
    #[instrument(level = "debug", skip(self), fields(contract = %self.address))]
    pub async fn list_funds(&self) -> Result<Vec<CroudFunding::Fund>, EthereumServiceError> {
        let output = self.call(&CroudFunding::getAllFundsCall {}).await?;
        let funds = CroudFunding::getAllFundsCall::abi_decode_returns(&output)?;
        debug!(count = funds.len(), "read funds");
        Ok(funds)
    }

    #[instrument(level = "debug", skip(self), fields(contract = %self.address))]
    pub async fn submit_contribution(
        &self,
        fund_id: u64,
        value: U256,
    ) -> Result<PendingTransaction, EthereumServiceError> {
        let call = CroudFunding::contributeToFundCall {
            fundId: U256::from(fund_id),
        };
        let request = TransactionRequest::new(self.address, call.abi_encode()).with_value(value);
        let hash = self.signer.send_transaction(request).await?;
        debug!(%hash, "contribution submitted");
        Ok(PendingTransaction { hash })
    }

    #[instrument(level = "debug", skip(self, brief), fields(contract = %self.address))]
    pub async fn submit_fund_creation(
        &self,
        title: &str,
        brief: &str,
        target: U256,
        duration_minutes: u64,
    ) -> Result<PendingTransaction, EthereumServiceError> {
        let call = CroudFunding::createCroudFundCall {
            title: title.to_owned(),
            brief: brief.to_owned(),
            requireAmount: target,
            durationInMinutes: U256::from(duration_minutes),
        };
        let request = TransactionRequest::new(self.address, call.abi_encode());
        let hash = self.signer.send_transaction(request).await?;
        debug!(%hash, "fund creation submitted");
        Ok(PendingTransaction { hash })
    }

    /// Polls for the receipt of `pending` until it is included in a block.
    #[instrument(level = "debug", skip(self), fields(hash = %pending.hash))]
    pub async fn wait_for_confirmation(
        &self,
        pending: &PendingTransaction,
    ) -> Result<TransactionReceipt, EthereumServiceError> {
        let provider = self.signer.provider();
        for _ in 0..self.confirmation.max_polls {
            match provider.transaction_receipt(pending.hash).await? {
                Some(receipt) if receipt.is_included() => {
                    if !receipt.succeeded() {
                        return Err(EthereumServiceError::TransactionReverted(pending.hash));
                    }
                    debug!(block = ?receipt.block_number, "transaction confirmed");
                    return Ok(receipt);
                }
                _ => timer::sleep(self.confirmation.poll_interval).await,
            }
        }
        Err(EthereumServiceError::ConfirmationTimeout {
            hash: pending.hash,
            polls: self.confirmation.max_polls,
        })
    }
}
