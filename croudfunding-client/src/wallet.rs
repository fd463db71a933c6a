// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The connection to the user's wallet and the account it currently exposes.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use alloy_primitives::Address;
use async_lock::RwLock;
use croudfunding_ethereum::client::{AccountsChanged, Signer, WalletProvider};
use tracing::{info, instrument, warn};

use crate::error::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected { address: Address },
}

/// The session generation observed when an operation started.
#[derive(Clone, Debug)]
pub struct SessionEpoch {
    counter: Arc<AtomicU64>,
    value: u64,
}

impl SessionEpoch {
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Whether the session was not reset since this epoch was taken.
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.value
    }
}

/// An explicit, resettable wallet session.
pub struct WalletSession<P> {
    provider: Arc<P>,
    state: RwLock<SessionState>,
    epoch: Arc<AtomicU64>,
}

impl<P: WalletProvider> WalletSession<P> {
    /// Creates a disconnected session, failing when the environment has no provider.
    pub fn new(provider: Option<P>) -> Result<Self, Error> {
        let provider = provider.ok_or(Error::WalletUnavailable)?;
        Ok(Self::with_provider(Arc::new(provider)))
    }

    pub fn with_provider(provider: Arc<P>) -> Self {
        Self {
            provider,
            state: RwLock::new(SessionState::Disconnected),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Asks the wallet for its accounts and selects the first one.
    #[instrument(level = "debug", skip(self))]
    pub async fn connect(&self) -> Result<Address, Error> {
        let epoch = self.epoch();
        *self.state.write().await = SessionState::Connecting;
        let accounts = self.provider.request_accounts().await;
        let mut state = self.state.write().await;
        if !epoch.is_current() {
            return Err(Error::SessionReset);
        }
        let address = match accounts {
            Ok(accounts) => accounts.first().copied(),
            Err(error) => {
                *state = SessionState::Disconnected;
                return Err(error.into());
            }
        };
        let Some(address) = address else {
            warn!("the wallet exposes no account");
            *state = SessionState::Disconnected;
            return Err(Error::chain("no accounts available"));
        };
        info!(%address, "wallet connected");
        *state = SessionState::Connected { address };
        Ok(address)
    }

    pub async fn address(&self) -> Option<Address> {
        match *self.state.read().await {
            SessionState::Connected { address } => Some(address),
            _ => None,
        }
    }

    /// Whether the connected account is `owner`. Addresses are compared as bytes, so the
    /// checksum casing of either side does not matter.
    pub async fn is_owner(&self, owner: &Address) -> bool {
        self.address().await.as_ref() == Some(owner)
    }

    /// Returns the signing handle of the connected account.
    pub async fn signer(&self) -> Result<Signer<P>, Error> {
        let address = self.address().await.ok_or(Error::NotConnected)?;
        Ok(Signer::new(self.provider.clone(), address))
    }

    /// Forgets the connected account and starts a new epoch.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        *state = SessionState::Disconnected;
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        info!(epoch, "wallet session reset");
    }

    pub fn epoch(&self) -> SessionEpoch {
        SessionEpoch {
            counter: self.epoch.clone(),
            value: self.epoch.load(Ordering::SeqCst),
        }
    }

    pub fn accounts_changed(&self) -> AccountsChanged {
        self.provider.accounts_changed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use croudfunding_ethereum::{
        common::RpcErrorObject,
        test_utils::{account, FakeChain},
    };

    use super::{SessionState, WalletSession};
    use crate::error::Error;

    #[test]
    fn missing_provider_is_fatal() {
        let error = WalletSession::<FakeChain>::new(None).err().unwrap();
        assert_matches!(error, Error::WalletUnavailable);
        assert!(!error.is_recoverable());
    }

    #[tokio::test]
    async fn connect_selects_the_first_account() {
        let chain = FakeChain::new(account(0)).with_accounts(vec![account(1), account(2)]);
        let session = WalletSession::new(Some(chain)).unwrap();
        assert_eq!(session.state().await, SessionState::Disconnected);
        assert_eq!(session.connect().await.unwrap(), account(1));
        assert_eq!(
            session.state().await,
            SessionState::Connected { address: account(1) }
        );
        assert!(session.is_owner(&account(1)).await);
        assert!(!session.is_owner(&account(0)).await);
        assert_eq!(session.signer().await.unwrap().address(), account(1));
    }

    #[tokio::test]
    async fn owner_check_ignores_checksum_casing() {
        let chain = FakeChain::new(account(9));
        let session = WalletSession::new(Some(chain)).unwrap();
        session.connect().await.unwrap();
        let owner = account(9).to_string();
        let lower = owner.to_lowercase();
        let upper = format!("0x{}", owner[2..].to_uppercase());
        assert!(session.is_owner(&lower.parse().unwrap()).await);
        assert!(session.is_owner(&upper.parse().unwrap()).await);
    }

    #[tokio::test]
    async fn empty_account_list_is_a_chain_error() {
        let chain = FakeChain::new(account(0)).with_accounts(Vec::new());
        let session = WalletSession::new(Some(chain)).unwrap();
        assert_matches!(
            session.connect().await,
            Err(Error::Chain { reason }) if reason == "no accounts available"
        );
        assert_eq!(session.state().await, SessionState::Disconnected);
        assert_matches!(session.signer().await, Err(Error::NotConnected));
    }

    #[tokio::test]
    async fn rejected_connection_returns_to_disconnected() {
        let chain = FakeChain::new(account(0));
        chain.fail_next(
            "eth_requestAccounts",
            RpcErrorObject::new(RpcErrorObject::USER_REJECTED, "User rejected the request."),
        );
        let session = WalletSession::with_provider(Arc::new(chain));
        assert_matches!(
            session.connect().await,
            Err(Error::Chain { reason }) if reason == "User rejected the request."
        );
        assert_eq!(session.state().await, SessionState::Disconnected);
    }

    #[tokio::test]
    async fn reset_starts_a_new_epoch() {
        let session = WalletSession::new(Some(FakeChain::new(account(0)))).unwrap();
        session.connect().await.unwrap();
        let epoch = session.epoch();
        assert!(epoch.is_current());
        session.reset().await;
        assert!(!epoch.is_current());
        assert!(session.epoch().is_current());
        assert_eq!(session.epoch().value(), epoch.value() + 1);
        assert_eq!(session.address().await, None);
    }
}
