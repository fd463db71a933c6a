// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The EIP-1193 provider injected by browser wallets as `window.ethereum`.

use std::{cell::RefCell, rc::Rc};

use alloy_primitives::Address;
use async_trait::async_trait;
use futures::channel::mpsc;
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::{prelude::*, JsCast as _};

use crate::{
    client::{AccountsChanged, WalletProvider},
    common::{EthereumServiceError, RpcErrorObject},
};

#[wasm_bindgen(typescript_custom_section)]
const EIP1193_PROVIDER_INTERFACE: &'static str = r#"
export interface Eip1193Provider {
  request(args: { method: string; params?: unknown[] }): Promise<unknown>;
  on(event: "accountsChanged", listener: (accounts: string[]) => void): void;
}"#;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(typescript_type = "Eip1193Provider")]
    pub type Eip1193Provider;

    #[wasm_bindgen(catch, method, js_name = "request")]
    async fn request_js(this: &Eip1193Provider, args: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method)]
    fn on(this: &Eip1193Provider, event: &str, listener: &js_sys::Function);
}

#[derive(Serialize)]
struct RequestArguments<'a> {
    method: &'a str,
    params: &'a Value,
}

/// The wallet injected in the page. The `accountsChanged` listener is registered once
/// and fans notifications out to every subscriber.
pub struct InjectedProvider {
    ethereum: Eip1193Provider,
    listeners: Rc<RefCell<Vec<mpsc::UnboundedSender<Vec<Address>>>>>,
}

impl InjectedProvider {
    /// Returns the provider injected as `window.ethereum`, if the page has one.
    pub fn detect() -> Option<Self> {
        let window = web_sys::window()?;
        let ethereum = js_sys::Reflect::get(&window, &JsValue::from_str("ethereum")).ok()?;
        if ethereum.is_undefined() || ethereum.is_null() {
            return None;
        }
        let ethereum: Eip1193Provider = ethereum.unchecked_into();
        let listeners = Rc::new(RefCell::new(Vec::<mpsc::UnboundedSender<_>>::new()));
        let fan_out = listeners.clone();
        let callback = Closure::<dyn FnMut(JsValue)>::new(move |accounts: JsValue| {
            let accounts: Vec<Address> =
                serde_wasm_bindgen::from_value(accounts).unwrap_or_default();
            tracing::info!(?accounts, "wallet accounts changed");
            fan_out
                .borrow_mut()
                .retain(|listener| listener.unbounded_send(accounts.clone()).is_ok());
        });
        ethereum.on("accountsChanged", callback.as_ref().unchecked_ref());
        callback.forget();
        Some(Self {
            ethereum,
            listeners,
        })
    }
}

fn provider_error(error: JsValue) -> EthereumServiceError {
    if let Ok(error) = serde_wasm_bindgen::from_value::<RpcErrorObject>(error.clone()) {
        return error.into();
    }
    let code = js_sys::Reflect::get(&error, &JsValue::from_str("code"))
        .ok()
        .and_then(|code| code.as_f64())
        .and_then(num_traits::cast::<f64, i64>);
    let message = js_sys::Reflect::get(&error, &JsValue::from_str("message"))
        .ok()
        .and_then(|message| message.as_string())
        .or_else(|| error.as_string())
        .unwrap_or_default();
    match code {
        Some(code) => RpcErrorObject::new(code, message).into(),
        None => EthereumServiceError::Provider(message),
    }
}

#[async_trait(?Send)]
impl WalletProvider for InjectedProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, EthereumServiceError> {
        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        let args = RequestArguments {
            method,
            params: &params,
        }
        .serialize(&serializer)
        .map_err(|error| EthereumServiceError::Provider(error.to_string()))?;
        let result = self.ethereum.request_js(args).await.map_err(provider_error)?;
        if result.is_undefined() {
            return Ok(Value::Null);
        }
        serde_wasm_bindgen::from_value(result)
            .map_err(|error| EthereumServiceError::Provider(error.to_string()))
    }

    fn accounts_changed(&self) -> AccountsChanged {
        let (sender, receiver) = mpsc::unbounded();
        self.listeners.borrow_mut().push(sender);
        receiver
    }
}
