// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fund creation, offered to the contract owner only.

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use async_lock::Mutex;
use croudfunding_ethereum::{client::WalletProvider, contract::CroudFundingContract};
use tracing::{info, instrument, warn};

use crate::{
    data_types::{NewFundDraft, NewFundField, OperationPhase, ValidFundDraft},
    error::Error,
    repository::FundsRepository,
    wallet::SessionEpoch,
};

/// A confirmed fund creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreationReceipt {
    pub fund: ValidFundDraft,
    pub transaction_hash: B256,
    pub refreshed: bool,
}

pub struct FundCreationCoordinator<P> {
    contract: Arc<CroudFundingContract<P>>,
    repository: Arc<FundsRepository<P>>,
    epoch: SessionEpoch,
    owner: Address,
    draft: Mutex<NewFundDraft>,
    phase: Mutex<OperationPhase>,
}

impl<P: WalletProvider> FundCreationCoordinator<P> {
    /// Returns a coordinator when the contract signer is `owner`, and `None` otherwise.
    pub fn for_owner(
        contract: Arc<CroudFundingContract<P>>,
        repository: Arc<FundsRepository<P>>,
        epoch: SessionEpoch,
        owner: Address,
    ) -> Option<Self> {
        if contract.signer().address() != owner {
            return None;
        }
        Some(Self {
            contract,
            repository,
            epoch,
            owner,
            draft: Mutex::new(NewFundDraft::default()),
            phase: Mutex::new(OperationPhase::Idle),
        })
    }

    pub async fn draft(&self) -> NewFundDraft {
        self.draft.lock().await.clone()
    }

    pub async fn update_draft(&self, field: NewFundField, value: impl Into<String>) {
        self.draft.lock().await.set(field, value);
    }

    /// Discards the draft.
    pub async fn cancel(&self) {
        *self.draft.lock().await = NewFundDraft::default();
    }

    pub async fn phase(&self) -> OperationPhase {
        *self.phase.lock().await
    }

    pub async fn acknowledge(&self) {
        let mut phase = self.phase.lock().await;
        if phase.is_terminal() {
            *phase = OperationPhase::Idle;
        }
    }

    #[instrument(level = "debug", skip(self), fields(owner = %self.owner))]
    pub async fn submit(&self) -> Result<CreationReceipt, Error> {
        {
            let mut phase = self.phase.lock().await;
            if phase.is_pending() {
                return Err(Error::CreationPending);
            }
            *phase = OperationPhase::Validating;
        }
        let result = self.execute().await;
        let phase = match &result {
            Ok(_) => OperationPhase::Succeeded,
            Err(error) => {
                warn!(%error, "fund creation failed");
                OperationPhase::Failed
            }
        };
        *self.phase.lock().await = phase;
        result
    }

    async fn execute(&self) -> Result<CreationReceipt, Error> {
        let fund = self.draft.lock().await.validate()?;

        *self.phase.lock().await = OperationPhase::Submitting;
        let pending = self
            .contract
            .submit_fund_creation(&fund.title, &fund.brief, fund.target, fund.duration_minutes)
            .await?;

        *self.phase.lock().await = OperationPhase::Confirming;
        self.contract.wait_for_confirmation(&pending).await?;
        if !self.epoch.is_current() {
            return Err(Error::SessionReset);
        }
        info!(title = %fund.title, hash = %pending.hash, "fund created");

        *self.draft.lock().await = NewFundDraft::default();
        let refreshed = self.repository.refresh().await.is_ok();
        Ok(CreationReceipt {
            fund,
            transaction_hash: pending.hash,
            refreshed,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use croudfunding_ethereum::{
        client::Signer,
        contract::CroudFundingContract,
        test_utils::{account, tokens, FakeChain, CONTRACT_ADDRESS, GENESIS_TIMESTAMP},
    };

    use super::FundCreationCoordinator;
    use crate::{
        data_types::{DraftError, NewFundDraft, NewFundField, OperationPhase},
        error::Error,
        repository::FundsRepository,
        wallet::WalletSession,
    };

    fn coordinator(
        chain: &FakeChain,
        signer: alloy_primitives::Address,
    ) -> (
        Option<FundCreationCoordinator<FakeChain>>,
        Arc<FundsRepository<FakeChain>>,
    ) {
        let session = WalletSession::with_provider(Arc::new(chain.clone()));
        let signer = Signer::new(session.provider().clone(), signer);
        let contract = Arc::new(CroudFundingContract::new(CONTRACT_ADDRESS, signer));
        let repository = Arc::new(FundsRepository::new(contract.clone()));
        let coordinator = FundCreationCoordinator::for_owner(
            contract,
            repository.clone(),
            session.epoch(),
            account(0),
        );
        (coordinator, repository)
    }

    async fn fill(coordinator: &FundCreationCoordinator<FakeChain>, duration: &str) {
        coordinator.update_draft(NewFundField::Title, "Library").await;
        coordinator
            .update_draft(NewFundField::Brief, "Books for everyone")
            .await;
        coordinator
            .update_draft(NewFundField::RequireAmount, "2.5")
            .await;
        coordinator
            .update_draft(NewFundField::DurationInMinutes, duration)
            .await;
    }

    #[test]
    fn only_the_owner_gets_a_coordinator() {
        let chain = FakeChain::new(account(0)).with_accounts(vec![account(1)]);
        assert!(coordinator(&chain, account(1)).0.is_none());
        assert!(coordinator(&chain, account(0)).0.is_some());
    }

    #[tokio::test]
    async fn created_fund_appears_after_refresh() {
        let chain = FakeChain::new(account(0));
        let (coordinator, repository) = coordinator(&chain, account(0));
        let coordinator = coordinator.unwrap();
        fill(&coordinator, "90").await;
        let receipt = coordinator.submit().await.unwrap();
        assert!(receipt.refreshed);
        assert_eq!(receipt.fund.duration_minutes, 90);
        assert_eq!(coordinator.draft().await, NewFundDraft::default());
        assert_eq!(coordinator.phase().await, OperationPhase::Succeeded);

        let funds = repository.snapshot().await;
        assert_eq!(funds.len(), 1);
        assert_eq!(funds[0].title, "Library");
        assert_eq!(funds[0].require_amount, tokens(5) / alloy_primitives::U256::from(2));
        assert_eq!(
            funds[0].end_time - funds[0].start_time,
            90 * 60 * 1000,
            "the fund must last the requested duration"
        );
        assert_eq!(funds[0].start_time, GENESIS_TIMESTAMP * 1000);
    }

    #[tokio::test]
    async fn zero_duration_never_reaches_the_chain() {
        let chain = FakeChain::new(account(0));
        let coordinator = coordinator(&chain, account(0)).0.unwrap();
        fill(&coordinator, "0").await;
        assert_matches!(
            coordinator.submit().await,
            Err(Error::InvalidFundDraft(DraftError::InvalidDuration))
        );
        assert_eq!(coordinator.phase().await, OperationPhase::Failed);
        assert!(chain.requests().is_empty());
        assert_eq!(coordinator.draft().await.duration_in_minutes, "0");
    }

    #[tokio::test]
    async fn cancel_resets_the_draft() {
        let chain = FakeChain::new(account(0));
        let coordinator = coordinator(&chain, account(0)).0.unwrap();
        fill(&coordinator, "10").await;
        coordinator.cancel().await;
        assert_eq!(coordinator.draft().await, NewFundDraft::default());
        coordinator.acknowledge().await;
        assert_eq!(coordinator.phase().await, OperationPhase::Idle);
    }
}
