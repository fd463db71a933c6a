// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The wallet-provider boundary: EIP-1193 requests, JSON-RPC framing and the
//! transaction-signing handle derived from a connected account.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use async_trait::async_trait;
use futures::channel::mpsc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    common::{EthereumQueryError, EthereumServiceError, RpcErrorObject},
    util::AutoTraits,
};

/// The account lists announced by a wallet through EIP-1193's `accountsChanged` event.
pub type AccountsChanged = mpsc::UnboundedReceiver<Vec<Address>>;

/// A transaction or call, in the shape expected by `eth_call`, `eth_estimateGas` and
/// `eth_sendTransaction`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
}

impl TransactionRequest {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }
}

/// The part of a transaction receipt the client acts upon.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub status: Option<U64>,
}

impl TransactionReceipt {
    /// Whether the transaction is part of a block.
    pub fn is_included(&self) -> bool {
        self.block_number.is_some()
    }

    /// Whether the transaction executed without reverting. Receipts from before
    /// EIP-658 carry no status and count as successful.
    pub fn succeeded(&self) -> bool {
        self.status.map_or(true, |status| status == U64::from(1))
    }
}

fn decode<R: DeserializeOwned>(value: Value) -> Result<R, EthereumServiceError> {
    Ok(serde_json::from_value(value)?)
}

/// An EIP-1193 provider: a browser wallet, a node, or a test double.
#[cfg_attr(not(web), async_trait)]
#[cfg_attr(web, async_trait(?Send))]
pub trait WalletProvider: AutoTraits {
    /// Sends one request and returns its JSON result.
    async fn request(&self, method: &str, params: Value) -> Result<Value, EthereumServiceError>;

    /// Subscribes to account changes. The stream ends when the provider cannot report
    /// any further change.
    fn accounts_changed(&self) -> AccountsChanged;

    /// Asks the wallet for access to its accounts. The selected account comes first.
    async fn request_accounts(&self) -> Result<Vec<Address>, EthereumServiceError> {
        decode(self.request("eth_requestAccounts", json!([])).await?)
    }

    async fn call(&self, request: &TransactionRequest) -> Result<Bytes, EthereumServiceError> {
        decode(self.request("eth_call", json!([request, "latest"])).await?)
    }

    async fn estimate_gas(
        &self,
        request: &TransactionRequest,
    ) -> Result<U256, EthereumServiceError> {
        decode(self.request("eth_estimateGas", json!([request])).await?)
    }

    async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<B256, EthereumServiceError> {
        decode(self.request("eth_sendTransaction", json!([request])).await?)
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, EthereumServiceError> {
        decode(
            self.request("eth_getTransactionReceipt", json!([hash]))
                .await?,
        )
    }
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: u64,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// A transport exchanging raw JSON-RPC 2.0 payloads with a node.
#[cfg_attr(not(web), async_trait)]
#[cfg_attr(web, async_trait(?Send))]
pub trait JsonRpcClient {
    async fn get_id(&self) -> u64;

    async fn request_inner(&self, payload: Vec<u8>) -> Result<Vec<u8>, EthereumServiceError>;

    async fn request(&self, method: &str, params: Value) -> Result<Value, EthereumServiceError> {
        let id = self.get_id().await;
        let payload = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let payload = serde_json::to_vec(&payload)?;
        let response = self.request_inner(payload).await?;
        let response: JsonRpcResponse = serde_json::from_slice(&response)?;
        if response.jsonrpc != "2.0" {
            return Err(EthereumQueryError::WrongJsonRpcVersion.into());
        }
        if response.id != id {
            return Err(EthereumQueryError::IdIsNotMatching {
                expected: id,
                received: response.id,
            }
            .into());
        }
        match response.error {
            Some(error) => Err(error.into()),
            None => Ok(response.result),
        }
    }
}

/// The transaction-signing capability of one connected account.
pub struct Signer<P> {
    provider: Arc<P>,
    address: Address,
}

impl<P> Clone for Signer<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            address: self.address,
        }
    }
}

impl<P> std::fmt::Debug for Signer<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl<P: WalletProvider> Signer<P> {
    pub fn new(provider: Arc<P>, address: Address) -> Self {
        Self { provider, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Estimates gas for `request` from this account, then hands it to the wallet
    /// for signing and broadcast. Reverts surface during the estimate, before the
    /// user is asked to sign.
    pub async fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<B256, EthereumServiceError> {
        let mut request = request.with_from(self.address);
        let gas = self.provider.estimate_gas(&request).await?;
        request.gas = Some(gas);
        self.provider.send_transaction(&request).await
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use async_lock::Mutex;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::JsonRpcClient;
    use crate::common::{EthereumQueryError, EthereumServiceError};

    struct CannedNode {
        id: Mutex<u64>,
        response: Value,
        sent: Mutex<Vec<Value>>,
    }

    impl CannedNode {
        fn new(response: Value) -> Self {
            Self {
                id: Mutex::new(0),
                response,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl JsonRpcClient for CannedNode {
        async fn get_id(&self) -> u64 {
            let mut id = self.id.lock().await;
            *id += 1;
            *id
        }

        async fn request_inner(&self, payload: Vec<u8>) -> Result<Vec<u8>, EthereumServiceError> {
            self.sent.lock().await.push(serde_json::from_slice(&payload)?);
            Ok(serde_json::to_vec(&self.response)?)
        }
    }

    #[tokio::test]
    async fn request_is_framed_and_result_extracted() {
        let node = CannedNode::new(json!({ "jsonrpc": "2.0", "id": 1, "result": "0x7a69" }));
        let result = node.request("eth_chainId", json!([])).await.unwrap();
        assert_eq!(result, json!("0x7a69"));
        let sent = node.sent.lock().await;
        assert_eq!(
            sent[0],
            json!({ "jsonrpc": "2.0", "id": 1, "method": "eth_chainId", "params": [] })
        );
    }

    #[tokio::test]
    async fn null_result_is_preserved() {
        let node = CannedNode::new(json!({ "jsonrpc": "2.0", "id": 1, "result": null }));
        let result = node
            .request("eth_getTransactionReceipt", json!(["0x00"]))
            .await
            .unwrap();
        assert_eq!(result, Value::Null);
    }

    #[tokio::test]
    async fn error_objects_become_rpc_errors() {
        let node = CannedNode::new(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "execution reverted: Fund does not exist" }
        }));
        let error = node.request("eth_call", json!([])).await.unwrap_err();
        assert_matches!(&error, EthereumServiceError::Rpc(rpc) if rpc.code == -32000);
        assert_eq!(error.reason(), "Fund does not exist");
    }

    #[tokio::test]
    async fn mismatched_frames_are_rejected() {
        let node = CannedNode::new(json!({ "jsonrpc": "2.0", "id": 7, "result": "0x1" }));
        assert_matches!(
            node.request("eth_blockNumber", json!([])).await,
            Err(EthereumServiceError::EthereumQueryError(
                EthereumQueryError::IdIsNotMatching { expected: 1, received: 7 }
            ))
        );

        let node = CannedNode::new(json!({ "jsonrpc": "1.0", "id": 1, "result": "0x1" }));
        assert_matches!(
            node.request("eth_blockNumber", json!([])).await,
            Err(EthereumServiceError::EthereumQueryError(
                EthereumQueryError::WrongJsonRpcVersion
            ))
        );
    }
}
