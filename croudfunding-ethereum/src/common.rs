// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::{hex, Bytes, B256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The reason shown to users when a failure carries no more specific explanation.
pub const NETWORK_FAILURE_REASON: &str = "network request failed";

const EXECUTION_REVERTED_PREFIX: &str = "execution reverted: ";

#[derive(Error, Debug)]
pub enum EthereumQueryError {
    /// The id should be matching
    #[error("the response id {received} does not match the request id {expected}")]
    IdIsNotMatching { expected: u64, received: u64 },

    /// wrong jsonrpc version
    #[error("wrong jsonrpc version")]
    WrongJsonRpcVersion,
}

/// An error object returned by a JSON-RPC endpoint or by an EIP-1193 wallet provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("provider error {code}: {message}")]
pub struct RpcErrorObject {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    /// The code used by nodes for a call rejected by the EVM.
    pub const EXECUTION_REVERTED: i64 = 3;
    /// The EIP-1193 code of a request the user declined in the wallet.
    pub const USER_REJECTED: i64 = 4001;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Builds the error a node reports when a call reverts with `Error(string)`.
    pub fn reverted(reason: &str) -> Self {
        use alloy_sol_types::SolError as _;

        let data = alloy_sol_types::Revert {
            reason: reason.to_owned(),
        }
        .abi_encode();
        Self {
            code: Self::EXECUTION_REVERTED,
            message: format!("{EXECUTION_REVERTED_PREFIX}{reason}"),
            data: Some(Value::String(hex::encode_prefixed(data))),
        }
    }

    /// Returns the raw revert payload, which wallets may nest under `data` or
    /// `originalError`.
    pub fn revert_data(&self) -> Option<Bytes> {
        self.data.as_ref().and_then(find_revert_data)
    }

    /// Returns the revert reason when the payload decodes, and otherwise the provider
    /// message.
    pub fn reason(&self) -> String {
        if let Some(reason) = self.revert_data().and_then(|data| decode_reason(&data)) {
            return reason;
        }
        let message = self.message.trim();
        match message.strip_prefix(EXECUTION_REVERTED_PREFIX) {
            Some(reason) => reason.to_owned(),
            None if message.is_empty() => NETWORK_FAILURE_REASON.to_owned(),
            None => message.to_owned(),
        }
    }
}

/// `Error(string)` payloads yield the bare reason. Panics and custom errors keep the
/// formatting of `decode_revert_reason`.
fn decode_reason(data: &[u8]) -> Option<String> {
    use alloy_sol_types::SolError as _;

    match alloy_sol_types::Revert::abi_decode(data) {
        Ok(revert) => Some(revert.reason),
        Err(_) => alloy_sol_types::decode_revert_reason(data),
    }
}

fn find_revert_data(value: &Value) -> Option<Bytes> {
    match value {
        Value::String(data) => data.parse::<Bytes>().ok().filter(|data| !data.is_empty()),
        Value::Object(fields) => ["data", "originalError"]
            .iter()
            .filter_map(|key| fields.get(*key))
            .find_map(find_revert_data),
        _ => None,
    }
}

#[derive(Debug, Error)]
pub enum EthereumServiceError {
    /// The JSON-RPC framing is not coherent
    #[error(transparent)]
    EthereumQueryError(#[from] EthereumQueryError),

    /// The provider rejected the request
    #[error(transparent)]
    Rpc(#[from] RpcErrorObject),

    /// The provider could not be reached, or failed without an error object
    #[error("wallet provider failure: {0}")]
    Provider(String),

    /// The contract returned data that does not match its ABI
    #[error("failed to decode the contract response: {0}")]
    AbiDecode(#[from] alloy_sol_types::Error),

    #[error("transaction {0} reverted")]
    TransactionReverted(B256),

    #[error("transaction {hash} was not confirmed after {polls} polls")]
    ConfirmationTimeout { hash: B256, polls: u32 },

    /// `serde_json` error
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// URL parsing error
    #[error(transparent)]
    #[cfg(not(target_arch = "wasm32"))]
    UrlParseError(#[from] url::ParseError),

    /// HTTP transport error
    #[error(transparent)]
    #[cfg(not(target_arch = "wasm32"))]
    ReqwestError(#[from] reqwest::Error),
}

impl EthereumServiceError {
    /// Returns a human-readable explanation of the failure, suitable for display.
    pub fn reason(&self) -> String {
        match self {
            EthereumServiceError::Rpc(error) => error.reason(),
            EthereumServiceError::TransactionReverted(_) => "transaction reverted".to_owned(),
            EthereumServiceError::ConfirmationTimeout { .. } => {
                "transaction was not confirmed in time".to_owned()
            }
            EthereumServiceError::Provider(message) if !message.trim().is_empty() => {
                message.trim().to_owned()
            }
            _ => NETWORK_FAILURE_REASON.to_owned(),
        }
    }
}
