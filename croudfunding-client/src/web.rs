// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
The JavaScript bindings to the client, driving the wallet injected in the page.
*/

// Methods are async so that the generated code returns a `Promise`.
#![allow(clippy::unused_async)]

use std::rc::Rc;

use croudfunding_ethereum::web::InjectedProvider;
use serde::ser::Serialize as _;
use wasm_bindgen::prelude::*;

use crate::{app::CroudFundingApp, client_options::ClientOptions, data_types::NewFundField};

type JsResult<T> = Result<T, JsError>;

fn to_js<T: serde::Serialize>(value: &T) -> JsResult<JsValue> {
    Ok(value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())?)
}

#[wasm_bindgen(start)]
pub fn main() {
    crate::tracing::init();
}

/// The CroudFunding client, connected to `window.ethereum`.
#[wasm_bindgen]
#[derive(Clone)]
pub struct CroudFunding {
    app: Rc<CroudFundingApp<InjectedProvider>>,
}

#[wasm_bindgen]
impl CroudFunding {
    /// Creates a client from optional `ClientOptions`, given as a camel-case object.
    ///
    /// # Errors
    /// If the page has no injected wallet, or the options are malformed.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> JsResult<CroudFunding> {
        let options: ClientOptions = if options.is_undefined() || options.is_null() {
            ClientOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options)?
        };
        let app = CroudFundingApp::new(InjectedProvider::detect(), options)?;
        Ok(CroudFunding { app: Rc::new(app) })
    }

    /// Connects the wallet, reads the owner and the funds.
    pub async fn connect(&self) -> JsResult<JsValue> {
        to_js(&self.app.start().await?)
    }

    /// The connected address, if any.
    pub async fn address(&self) -> Option<String> {
        self.app.address().await.map(|address| address.to_string())
    }

    #[wasm_bindgen(js_name = isOwner)]
    pub async fn is_owner(&self) -> bool {
        self.app.is_owner().await
    }

    /// The funds of the last successful refresh, as display views.
    pub async fn funds(&self) -> JsResult<JsValue> {
        to_js(&self.app.fund_views().await)
    }

    pub async fn refresh(&self) -> JsResult<JsValue> {
        self.app.refresh().await?;
        self.funds().await
    }

    #[wasm_bindgen(js_name = setContributionAmount)]
    pub async fn set_contribution_amount(&self, fund_id: u32, amount: String) -> JsResult<()> {
        Ok(self
            .app
            .set_contribution_amount(u64::from(fund_id), &amount)
            .await?)
    }

    /// Contributes to a fund and resolves once the contribution is confirmed.
    pub async fn contribute(&self, fund_id: u32) -> JsResult<String> {
        let receipt = self.app.contribute(u64::from(fund_id)).await?;
        Ok(receipt.transaction_hash.to_string())
    }

    /// Sets `title`, `brief`, `requireAmount` or `durationInMinutes` of the new fund.
    #[wasm_bindgen(js_name = setNewFundField)]
    pub async fn set_new_fund_field(&self, name: String, value: String) -> JsResult<()> {
        let field = name.parse::<NewFundField>()?;
        Ok(self.app.update_new_fund(field, &value).await?)
    }

    #[wasm_bindgen(js_name = newFund)]
    pub async fn new_fund(&self) -> JsResult<JsValue> {
        to_js(&self.app.new_fund_draft().await?)
    }

    #[wasm_bindgen(js_name = cancelNewFund)]
    pub async fn cancel_new_fund(&self) -> JsResult<()> {
        Ok(self.app.cancel_new_fund().await?)
    }

    /// Creates the fund composed so far and resolves once the creation is confirmed.
    #[wasm_bindgen(js_name = createFund)]
    pub async fn create_fund(&self) -> JsResult<String> {
        let receipt = self.app.create_fund().await?;
        Ok(receipt.transaction_hash.to_string())
    }

    /// Reloads the client whenever the wallet switches accounts, then calls `onReload`.
    #[wasm_bindgen(js_name = watchAccounts)]
    pub fn watch_accounts(&self, on_reload: Option<js_sys::Function>) {
        let app = self.app.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let mut changes = app.session().accounts_changed();
            while futures::StreamExt::next(&mut changes).await.is_some() {
                let outcome = match app.handle_account_change().await {
                    Ok(startup) => to_js(&startup).unwrap_or(JsValue::NULL),
                    Err(error) => {
                        tracing::warn!(%error, "failed to reload after an account change");
                        JsValue::NULL
                    }
                };
                if let Some(on_reload) = &on_reload {
                    if let Err(error) = on_reload.call1(&JsValue::NULL, &outcome) {
                        tracing::warn!(?error, "the reload callback failed");
                    }
                }
            }
        });
    }
}
