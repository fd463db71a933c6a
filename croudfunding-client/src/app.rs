// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The application: the startup pipeline, the owner gate and the reload on account
//! changes.

use std::sync::Arc;

use alloy_primitives::Address;
use async_lock::RwLock;
use croudfunding_ethereum::{client::WalletProvider, contract::CroudFundingContract};
use futures::StreamExt as _;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{
    client_options::ClientOptions,
    contribution::{ContributionCoordinator, ContributionReceipt},
    creation::{CreationReceipt, FundCreationCoordinator},
    data_types::{Fund, FundView, NewFundDraft, NewFundField, OperationPhase},
    error::{Error, StartupStage},
    repository::FundsRepository,
    wallet::WalletSession,
};

/// The outcome of a successful startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Startup {
    pub address: Address,
    pub owner: Address,
    pub is_owner: bool,
    /// Set when the funds could not be read. The application is usable and can be
    /// refreshed later.
    pub refresh_error: Option<String>,
}

/// Everything derived from one connected account. It is dropped as a whole when the
/// account changes.
pub struct AccountContext<P> {
    pub address: Address,
    pub owner: Address,
    pub contract: Arc<CroudFundingContract<P>>,
    pub repository: Arc<FundsRepository<P>>,
    pub contributions: Arc<ContributionCoordinator<P>>,
    pub creation: Option<Arc<FundCreationCoordinator<P>>>,
}

pub struct CroudFundingApp<P> {
    session: WalletSession<P>,
    options: ClientOptions,
    context: RwLock<Option<Arc<AccountContext<P>>>>,
}

impl<P: WalletProvider> CroudFundingApp<P> {
    /// Creates the application, failing when no wallet provider is available.
    pub fn new(provider: Option<P>, options: ClientOptions) -> Result<Self, Error> {
        let session = WalletSession::new(provider)?;
        Ok(Self::with_session(session, options))
    }

    pub fn with_session(session: WalletSession<P>, options: ClientOptions) -> Self {
        Self {
            session,
            options,
            context: RwLock::new(None),
        }
    }

    pub fn session(&self) -> &WalletSession<P> {
        &self.session
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Connects the wallet, reads the contract owner, then reads the funds. A failure to
    /// read the funds is reported in the result rather than aborting the startup.
    #[instrument(level = "debug", skip(self))]
    pub async fn start(&self) -> Result<Startup, Error> {
        let epoch = self.session.epoch();
        let address = self
            .session
            .connect()
            .await
            .map_err(|error| error.at_stage(StartupStage::Connect))?;

        let signer = self.session.signer().await?;
        let contract = Arc::new(
            CroudFundingContract::new(self.options.contract_address, signer)
                .with_confirmation(self.options.confirmation()),
        );
        let owner = contract
            .get_owner()
            .await
            .map_err(|error| Error::from(error).at_stage(StartupStage::ReadOwner))?;

        let repository = Arc::new(FundsRepository::new(contract.clone()));
        let refresh_error = match repository.refresh().await {
            Ok(_) => None,
            Err(error) => Some(error.to_string()),
        };
        if !epoch.is_current() {
            return Err(Error::SessionReset);
        }

        let contributions = Arc::new(ContributionCoordinator::new(
            contract.clone(),
            repository.clone(),
            epoch.clone(),
            self.options.default_contribution.clone(),
        ));
        let creation =
            FundCreationCoordinator::for_owner(contract.clone(), repository.clone(), epoch, owner)
                .map(Arc::new);
        let startup = Startup {
            address,
            owner,
            is_owner: creation.is_some(),
            refresh_error,
        };
        info!(%address, %owner, is_owner = startup.is_owner, "client started");
        *self.context.write().await = Some(Arc::new(AccountContext {
            address,
            owner,
            contract,
            repository,
            contributions,
            creation,
        }));
        Ok(startup)
    }

    /// Drops everything derived from the previous account and starts again.
    #[instrument(level = "debug", skip(self))]
    pub async fn handle_account_change(&self) -> Result<Startup, Error> {
        self.context.write().await.take();
        self.session.reset().await;
        self.start().await
    }

    /// Reloads the application on every account change announced by the wallet, until
    /// the wallet stops reporting changes.
    pub async fn watch_accounts(&self) {
        let mut changes = self.session.accounts_changed();
        while let Some(accounts) = changes.next().await {
            info!(?accounts, "reloading after an account change");
            if let Err(error) = self.handle_account_change().await {
                warn!(%error, "failed to reload after an account change");
            }
        }
    }

    pub async fn context(&self) -> Result<Arc<AccountContext<P>>, Error> {
        self.context.read().await.clone().ok_or(Error::NotConnected)
    }

    pub async fn address(&self) -> Option<Address> {
        self.session.address().await
    }

    pub async fn is_owner(&self) -> bool {
        match self.context().await {
            Ok(context) => context.creation.is_some(),
            Err(_) => false,
        }
    }

    pub async fn funds(&self) -> Vec<Fund> {
        match self.context().await {
            Ok(context) => context.repository.snapshot().await.to_vec(),
            Err(_) => Vec::new(),
        }
    }

    pub async fn fund_views(&self) -> Vec<FundView> {
        self.funds().await.iter().map(Fund::view).collect()
    }

    pub async fn refresh(&self) -> Result<Vec<Fund>, Error> {
        let context = self.context().await?;
        Ok(context.repository.refresh().await?.to_vec())
    }

    pub async fn set_contribution_amount(&self, fund_id: u64, amount: &str) -> Result<(), Error> {
        self.context()
            .await?
            .contributions
            .set_amount(fund_id, amount)
            .await;
        Ok(())
    }

    pub async fn contribute(&self, fund_id: u64) -> Result<ContributionReceipt, Error> {
        let context = self.context().await?;
        context.contributions.contribute(fund_id).await
    }

    pub async fn contribution_phase(&self, fund_id: u64) -> OperationPhase {
        match self.context().await {
            Ok(context) => context.contributions.phase(fund_id).await,
            Err(_) => OperationPhase::Idle,
        }
    }

    async fn creation(&self) -> Result<Arc<FundCreationCoordinator<P>>, Error> {
        self.context().await?.creation.clone().ok_or(Error::NotOwner)
    }

    pub async fn update_new_fund(&self, field: NewFundField, value: &str) -> Result<(), Error> {
        self.creation().await?.update_draft(field, value).await;
        Ok(())
    }

    pub async fn new_fund_draft(&self) -> Result<NewFundDraft, Error> {
        Ok(self.creation().await?.draft().await)
    }

    pub async fn cancel_new_fund(&self) -> Result<(), Error> {
        self.creation().await?.cancel().await;
        Ok(())
    }

    pub async fn create_fund(&self) -> Result<CreationReceipt, Error> {
        self.creation().await?.submit().await
    }
}
