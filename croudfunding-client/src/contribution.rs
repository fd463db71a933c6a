// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Contributions to funds: validation, submission, confirmation and refresh.

use std::{collections::BTreeMap, sync::Arc};

use alloy_primitives::{B256, U256};
use async_lock::Mutex;
use croudfunding_ethereum::{client::WalletProvider, contract::CroudFundingContract};
use tracing::{info, instrument, warn};

use crate::{
    amount,
    data_types::{ContributionDraft, OperationPhase},
    error::Error,
    repository::FundsRepository,
    wallet::SessionEpoch,
};

/// A confirmed contribution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContributionReceipt {
    pub fund_id: u64,
    /// In base units.
    pub amount: U256,
    pub transaction_hash: B256,
    /// Whether the funds were re-read after confirmation. The contribution stands
    /// either way.
    pub refreshed: bool,
}

/// Drives contributions, one at a time per fund.
pub struct ContributionCoordinator<P> {
    contract: Arc<CroudFundingContract<P>>,
    repository: Arc<FundsRepository<P>>,
    epoch: SessionEpoch,
    default_amount: String,
    phases: Mutex<BTreeMap<u64, OperationPhase>>,
    draft: Mutex<ContributionDraft>,
}

impl<P: WalletProvider> ContributionCoordinator<P> {
    pub fn new(
        contract: Arc<CroudFundingContract<P>>,
        repository: Arc<FundsRepository<P>>,
        epoch: SessionEpoch,
        default_amount: impl Into<String>,
    ) -> Self {
        Self {
            contract,
            repository,
            epoch,
            default_amount: default_amount.into(),
            phases: Mutex::new(BTreeMap::new()),
            draft: Mutex::new(ContributionDraft::default()),
        }
    }

    pub async fn set_amount(&self, fund_id: u64, amount: impl Into<String>) {
        self.draft.lock().await.set(fund_id, amount);
    }

    pub async fn amount(&self, fund_id: u64) -> String {
        self.draft.lock().await.get(fund_id).to_owned()
    }

    pub async fn phase(&self, fund_id: u64) -> OperationPhase {
        self.phases
            .lock()
            .await
            .get(&fund_id)
            .copied()
            .unwrap_or_default()
    }

    /// Returns a fund to `Idle` once its outcome was shown.
    pub async fn acknowledge(&self, fund_id: u64) {
        let mut phases = self.phases.lock().await;
        if phases.get(&fund_id).is_some_and(|phase| phase.is_terminal()) {
            phases.remove(&fund_id);
        }
    }

    async fn set_phase(&self, fund_id: u64, phase: OperationPhase) {
        self.phases.lock().await.insert(fund_id, phase);
    }

    /// Contributes the amount typed for `fund_id`, or the default amount when nothing
    /// was typed.
    #[instrument(level = "debug", skip(self))]
    pub async fn contribute(&self, fund_id: u64) -> Result<ContributionReceipt, Error> {
        {
            let mut phases = self.phases.lock().await;
            let phase = phases.entry(fund_id).or_default();
            if phase.is_pending() {
                return Err(Error::ContributionPending { fund_id });
            }
            *phase = OperationPhase::Validating;
        }
        let result = self.execute(fund_id).await;
        let phase = match &result {
            Ok(_) => OperationPhase::Succeeded,
            Err(error) => {
                warn!(fund_id, %error, "contribution failed");
                OperationPhase::Failed
            }
        };
        self.set_phase(fund_id, phase).await;
        result
    }

    async fn execute(&self, fund_id: u64) -> Result<ContributionReceipt, Error> {
        let input = self
            .draft
            .lock()
            .await
            .effective_amount(fund_id, &self.default_amount);
        let amount = amount::to_base_units(&input)?;

        self.set_phase(fund_id, OperationPhase::Submitting).await;
        let pending = self.contract.submit_contribution(fund_id, amount).await?;

        self.set_phase(fund_id, OperationPhase::Confirming).await;
        self.contract.wait_for_confirmation(&pending).await?;
        if !self.epoch.is_current() {
            return Err(Error::SessionReset);
        }
        info!(fund_id, %amount, hash = %pending.hash, "contribution confirmed");

        let refreshed = self.repository.refresh().await.is_ok();
        self.draft.lock().await.clear(fund_id);
        Ok(ContributionReceipt {
            fund_id,
            amount,
            transaction_hash: pending.hash,
            refreshed,
        })
    }
}
