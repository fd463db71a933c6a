// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use async_lock::RwLock;
use croudfunding_ethereum::{client::WalletProvider, contract::CroudFundingContract};
use tracing::{debug, instrument, warn};

use crate::{data_types::Fund, error::Error};

/// The latest known list of funds. Every successful refresh replaces the whole list.
pub struct FundsRepository<P> {
    contract: Arc<CroudFundingContract<P>>,
    snapshot: RwLock<Arc<Vec<Fund>>>,
    last_error: RwLock<Option<String>>,
}

impl<P: WalletProvider> FundsRepository<P> {
    pub fn new(contract: Arc<CroudFundingContract<P>>) -> Self {
        Self {
            contract,
            snapshot: RwLock::new(Arc::default()),
            last_error: RwLock::new(None),
        }
    }

    /// Reads all funds from the contract and installs them as the new snapshot. On
    /// failure the previous snapshot is kept.
    #[instrument(level = "debug", skip(self))]
    pub async fn refresh(&self) -> Result<Arc<Vec<Fund>>, Error> {
        let records = match self.contract.list_funds().await {
            Ok(records) => records,
            Err(error) => {
                let reason = error.reason();
                warn!(%error, "failed to refresh the funds");
                *self.last_error.write().await = Some(reason.clone());
                return Err(Error::RefreshFailure { reason });
            }
        };
        let funds = Arc::new(records.iter().map(Fund::from_record).collect::<Vec<_>>());
        debug!(count = funds.len(), "funds refreshed");
        *self.snapshot.write().await = funds.clone();
        *self.last_error.write().await = None;
        Ok(funds)
    }

    /// Returns the current snapshot, empty until the first successful refresh.
    pub async fn snapshot(&self) -> Arc<Vec<Fund>> {
        self.snapshot.read().await.clone()
    }

    pub async fn fund(&self, fund_id: u64) -> Option<Fund> {
        self.snapshot()
            .await
            .iter()
            .find(|fund| fund.id == fund_id)
            .cloned()
    }

    /// The reason of the last refresh failure, cleared by the next success.
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }
}
