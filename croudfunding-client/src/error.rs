// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use croudfunding_ethereum::common::EthereumServiceError;

use crate::{amount::ParseAmountError, data_types::DraftError};

/// A step of the startup pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartupStage {
    Connect,
    ReadOwner,
}

impl fmt::Display for StartupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupStage::Connect => write!(f, "connect"),
            StartupStage::ReadOwner => write!(f, "read-owner"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no wallet provider is available")]
    WalletUnavailable,
    #[error("{reason}")]
    Chain { reason: String },
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] ParseAmountError),
    #[error("invalid fund: {0}")]
    InvalidFundDraft(#[from] DraftError),
    #[error("failed to refresh the funds: {reason}")]
    RefreshFailure { reason: String },
    #[error("a contribution to fund {fund_id} is already in progress")]
    ContributionPending { fund_id: u64 },
    #[error("a fund creation is already in progress")]
    CreationPending,
    #[error("only the contract owner can create funds")]
    NotOwner,
    #[error("the wallet is not connected")]
    NotConnected,
    #[error("the wallet account changed during the operation")]
    SessionReset,
    #[error("startup failed at stage `{stage}`: {error}")]
    Startup {
        stage: StartupStage,
        #[source]
        error: Box<Error>,
    },
}

impl Error {
    pub fn chain(reason: impl Into<String>) -> Self {
        Error::Chain {
            reason: reason.into(),
        }
    }

    pub(crate) fn at_stage(self, stage: StartupStage) -> Self {
        Error::Startup {
            stage,
            error: Box::new(self),
        }
    }

    /// Whether the client can keep running after this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::WalletUnavailable => false,
            Error::Startup { error, .. } => error.is_recoverable(),
            _ => true,
        }
    }
}

impl From<EthereumServiceError> for Error {
    fn from(error: EthereumServiceError) -> Self {
        tracing::debug!(%error, "chain operation failed");
        Error::chain(error.reason())
    }
}
