// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::Address;
use async_lock::Mutex;
use async_trait::async_trait;
use futures::channel::mpsc;
use reqwest::{header::CONTENT_TYPE, Client};
use serde_json::{json, Value};
use url::Url;

use crate::{
    client::{AccountsChanged, JsonRpcClient, WalletProvider},
    common::EthereumServiceError,
};

/// A node reached over HTTP, standing in for a browser wallet. The node must hold
/// unlocked accounts to answer `eth_sendTransaction`.
#[derive(Debug)]
pub struct HttpProvider {
    url: Url,
    client: Client,
    id: Mutex<u64>,
    account: Option<Address>,
}

impl HttpProvider {
    /// Creates a provider for the node at `url`. Transactions are sent from `account`
    /// when one is given, and otherwise from the node's first account.
    pub fn new(url: &str, account: Option<Address>) -> Result<Self, EthereumServiceError> {
        let url = Url::parse(url)?;
        Ok(Self {
            url,
            client: Client::new(),
            id: Mutex::new(0),
            account,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl JsonRpcClient for HttpProvider {
    async fn get_id(&self) -> u64 {
        let mut id = self.id.lock().await;
        *id += 1;
        *id
    }

    async fn request_inner(&self, payload: Vec<u8>) -> Result<Vec<u8>, EthereumServiceError> {
        let res = self
            .client
            .post(self.url.clone())
            .body(payload)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        let body = res.bytes().await?;
        Ok(body.as_ref().to_vec())
    }
}

#[async_trait]
impl WalletProvider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, EthereumServiceError> {
        tracing::trace!(%method, url = %self.url, "sending JSON-RPC request");
        JsonRpcClient::request(self, method, params).await
    }

    /// A node has no account-selection UI, so the stream ends right away.
    fn accounts_changed(&self) -> AccountsChanged {
        mpsc::unbounded().1
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, EthereumServiceError> {
        if let Some(account) = self.account {
            return Ok(vec![account]);
        }
        let accounts = WalletProvider::request(self, "eth_accounts", json!([])).await?;
        Ok(serde_json::from_value(accounts)?)
    }
}
