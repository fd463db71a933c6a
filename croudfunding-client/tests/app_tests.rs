// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use alloy_primitives::U256;
use assert_matches::assert_matches;
use croudfunding_client::{
    data_types::{DraftError, FundStatus, NewFundField, OperationPhase},
    error::StartupStage,
    ClientOptions, CroudFundingApp, Error,
};
use croudfunding_ethereum::{
    common::RpcErrorObject,
    test_utils::{account, tokens, FakeChain, CONTRACT_ADDRESS},
};

fn options() -> ClientOptions {
    ClientOptions {
        contract_address: CONTRACT_ADDRESS,
        confirmation_poll_interval_ms: 1,
        max_confirmation_polls: 10_000,
        ..ClientOptions::default()
    }
}

fn app(chain: &FakeChain) -> CroudFundingApp<FakeChain> {
    CroudFundingApp::new(Some(chain.clone()), options()).unwrap()
}

async fn wait_for_phase(app: &CroudFundingApp<FakeChain>, fund_id: u64, phase: OperationPhase) {
    while app.contribution_phase(fund_id).await != phase {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[test_log::test(tokio::test)]
async fn startup_reads_owner_then_funds() {
    let chain = FakeChain::new(account(0));
    chain.add_fund("School", tokens(4), tokens(1), vec![account(2)]);
    let app = app(&chain);
    let startup = app.start().await.unwrap();
    assert_eq!(startup.address, account(0));
    assert_eq!(startup.owner, account(0));
    assert!(startup.is_owner);
    assert_eq!(startup.refresh_error, None);
    assert_eq!(
        chain.requests(),
        ["eth_requestAccounts", "eth_call", "eth_call"]
    );

    let views = app.fund_views().await;
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].progress, "1 / 4");
    assert_eq!(views[0].percentage, 25.0);
    assert_eq!(views[0].status, FundStatus::Active);
}

#[tokio::test]
async fn missing_wallet_is_fatal() {
    let error = CroudFundingApp::<FakeChain>::new(None, options()).err().unwrap();
    assert_matches!(error, Error::WalletUnavailable);
    assert!(!error.is_recoverable());
}

#[tokio::test]
async fn startup_failures_name_their_stage() {
    let chain = FakeChain::new(account(0));
    chain.fail_next(
        "eth_requestAccounts",
        RpcErrorObject::new(RpcErrorObject::USER_REJECTED, "User rejected the request."),
    );
    let app = app(&chain);
    let error = app.start().await.unwrap_err();
    assert_matches!(
        &error,
        Error::Startup { stage: StartupStage::Connect, error }
            if error.to_string() == "User rejected the request."
    );
    assert!(error.is_recoverable());

    chain.disconnect_next("owner");
    assert_matches!(
        app.start().await,
        Err(Error::Startup { stage: StartupStage::ReadOwner, .. })
    );
    assert!(app.start().await.is_ok());
}

#[tokio::test]
async fn failed_initial_refresh_is_not_fatal() {
    let chain = FakeChain::new(account(0));
    chain.add_fund("School", tokens(4), tokens(1), Vec::new());
    chain.fail_next("getAllFunds", RpcErrorObject::new(-32000, "header not found"));
    let app = app(&chain);
    let startup = app.start().await.unwrap();
    assert_eq!(
        startup.refresh_error.as_deref(),
        Some("failed to refresh the funds: header not found")
    );
    assert!(app.funds().await.is_empty());
    assert_eq!(app.refresh().await.unwrap().len(), 1);
}

#[tokio::test]
async fn refresh_failure_keeps_the_previous_funds() {
    let chain = FakeChain::new(account(0));
    chain.add_fund("School", tokens(4), tokens(1), Vec::new());
    let app = app(&chain);
    app.start().await.unwrap();
    let before = app.funds().await;

    chain.add_fund("Well", tokens(1), tokens(0), Vec::new());
    chain.disconnect_next("eth_call");
    assert_matches!(app.refresh().await, Err(Error::RefreshFailure { .. }));
    assert_eq!(app.funds().await, before);
}

#[tokio::test]
async fn empty_contribution_defaults_to_one_hundredth() {
    let chain = FakeChain::new(account(0)).with_accounts(vec![account(3)]);
    chain.add_fund("School", tokens(1), tokens(0), Vec::new());
    let app = app(&chain);
    app.start().await.unwrap();
    app.set_contribution_amount(0, "").await.unwrap();
    let receipt = app.contribute(0).await.unwrap();
    assert_eq!(receipt.amount, tokens(1) / U256::from(100));
    assert!(receipt.refreshed);

    let fund = &app.funds().await[0];
    assert_eq!(fund.current_amount, tokens(1) / U256::from(100));
    assert_eq!(fund.contributors, vec![account(3)]);
    assert_eq!(fund.view().progress, "0.01 / 1");
}

#[tokio::test]
async fn contributions_to_completed_funds_report_the_revert_reason() {
    let chain = FakeChain::new(account(0));
    chain.add_fund("Well", tokens(1), tokens(1), Vec::new());
    let app = app(&chain);
    app.start().await.unwrap();
    assert!(!app.fund_views().await[0].accepts_contributions);
    assert_matches!(
        app.contribute(0).await,
        Err(Error::Chain { reason }) if reason == "Fund is already completed"
    );
    assert_matches!(
        app.contribute(9).await,
        Err(Error::Chain { reason }) if reason == "Fund does not exist"
    );
    assert_eq!(app.contribution_phase(0).await, OperationPhase::Failed);
}

#[tokio::test]
async fn pending_contribution_rejects_a_second_submission_without_chain_contact() {
    let chain = FakeChain::new(account(0));
    chain.add_fund("School", tokens(10), tokens(0), Vec::new());
    chain.add_fund("Well", tokens(10), tokens(0), Vec::new());
    let app = app(&chain);
    app.start().await.unwrap();
    chain.hold_receipts();

    let (first, ()) = futures::join!(app.contribute(0), async {
        wait_for_phase(&app, 0, OperationPhase::Confirming).await;
        assert_matches!(
            app.contribute(0).await,
            Err(Error::ContributionPending { fund_id: 0 })
        );
        assert_eq!(chain.request_count("eth_estimateGas"), 1);
        assert_eq!(chain.request_count("eth_sendTransaction"), 1);
        assert_eq!(app.contribution_phase(1).await, OperationPhase::Idle);
        chain.release_receipts();
    });
    first.unwrap();
    assert_eq!(app.contribution_phase(0).await, OperationPhase::Succeeded);
    assert!(app.contribute(0).await.is_ok());
}

#[tokio::test]
async fn contributions_to_different_funds_proceed_independently() {
    let chain = FakeChain::new(account(0)).with_accounts(vec![account(4)]);
    chain.add_fund("School", tokens(10), tokens(0), Vec::new());
    chain.add_fund("Well", tokens(10), tokens(0), Vec::new());
    let app = app(&chain);
    app.start().await.unwrap();
    app.set_contribution_amount(1, "0.5").await.unwrap();
    chain.hold_receipts();

    let (school, well, ()) = futures::join!(app.contribute(0), app.contribute(1), async {
        wait_for_phase(&app, 0, OperationPhase::Confirming).await;
        wait_for_phase(&app, 1, OperationPhase::Confirming).await;
        assert_eq!(chain.request_count("eth_sendTransaction"), 2);
        chain.release_receipts();
    });
    assert_eq!(school.unwrap().amount, tokens(1) / U256::from(100));
    assert_eq!(well.unwrap().amount, tokens(1) / U256::from(2));
    assert_eq!(app.contribution_phase(0).await, OperationPhase::Succeeded);
    assert_eq!(app.contribution_phase(1).await, OperationPhase::Succeeded);

    let funds = app.funds().await;
    assert_eq!(funds[0].current_amount, tokens(1) / U256::from(100));
    assert_eq!(funds[1].current_amount, tokens(1) / U256::from(2));
    assert_eq!(funds[1].contributors, vec![account(4)]);
}

#[tokio::test]
async fn account_switch_discards_the_pending_outcome() {
    let chain = FakeChain::new(account(0));
    chain.add_fund("School", tokens(10), tokens(0), Vec::new());
    let app = app(&chain);
    app.start().await.unwrap();
    chain.hold_receipts();

    let (outcome, calls_after_reload) = futures::join!(app.contribute(0), async {
        wait_for_phase(&app, 0, OperationPhase::Confirming).await;
        chain.switch_account(account(1));
        let startup = app.handle_account_change().await.unwrap();
        assert_eq!(startup.address, account(1));
        assert!(!startup.is_owner);
        let calls = chain.request_count("eth_call");
        chain.release_receipts();
        calls
    });
    assert_matches!(outcome, Err(Error::SessionReset));
    assert_eq!(chain.request_count("eth_call"), calls_after_reload);
    assert_eq!(app.address().await, Some(account(1)));
    assert_eq!(app.contribution_phase(0).await, OperationPhase::Idle);
}

#[tokio::test]
async fn watched_account_changes_reload_the_client() {
    let chain = FakeChain::new(account(0));
    let app = app(&chain);
    app.start().await.unwrap();
    assert!(app.is_owner().await);

    tokio::select! {
        biased;
        () = app.watch_accounts() => panic!("the account stream ended"),
        () = async {
            chain.switch_account(account(4));
            while !matches!(app.context().await, Ok(context) if context.address == account(4)) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        } => {}
    }
    assert!(!app.is_owner().await);
}

#[tokio::test]
async fn fund_creation_is_gated_on_the_owner() {
    let chain = FakeChain::new(account(0)).with_accounts(vec![account(1)]);
    let app = app(&chain);
    let startup = app.start().await.unwrap();
    assert!(!startup.is_owner);
    let requests = chain.requests().len();
    assert_matches!(
        app.update_new_fund(NewFundField::Title, "Mine").await,
        Err(Error::NotOwner)
    );
    assert_matches!(app.create_fund().await, Err(Error::NotOwner));
    assert_eq!(chain.requests().len(), requests);
}

#[tokio::test]
async fn owner_creates_a_fund() {
    let chain = FakeChain::new(account(0));
    let app = app(&chain);
    app.start().await.unwrap();
    for (field, value) in [
        (NewFundField::Title, "Library"),
        (NewFundField::Brief, "Books"),
        (NewFundField::RequireAmount, "3"),
        (NewFundField::DurationInMinutes, "0"),
    ] {
        app.update_new_fund(field, value).await.unwrap();
    }
    let requests = chain.requests().len();
    assert_matches!(
        app.create_fund().await,
        Err(Error::InvalidFundDraft(DraftError::InvalidDuration))
    );
    assert_eq!(chain.requests().len(), requests);

    app.update_new_fund(NewFundField::DurationInMinutes, "30")
        .await
        .unwrap();
    let receipt = app.create_fund().await.unwrap();
    assert_eq!(receipt.fund.target, tokens(3));
    assert_eq!(app.new_fund_draft().await.unwrap().title, "");
    let views = app.fund_views().await;
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].title, "Library");
    assert_eq!(views[0].progress, "0 / 3");

    app.update_new_fund(NewFundField::Title, "Draft").await.unwrap();
    app.cancel_new_fund().await.unwrap();
    assert_eq!(app.new_fund_draft().await.unwrap().title, "");
}
