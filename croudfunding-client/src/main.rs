// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Command-line client for the CroudFunding contract, for nodes with unlocked accounts.

use alloy_primitives::Address;
use anyhow::{bail, Result};
use clap::Parser;
use croudfunding_client::{
    amount, data_types::NewFundField, ClientOptions, CroudFundingApp,
};
use croudfunding_ethereum::provider::HttpProvider;

/// CroudFunding CLI
#[derive(Parser, Debug)]
#[command(name = "croudfunding")]
struct Cli {
    /// URL of the JSON-RPC node
    #[arg(long, env = "CROUDFUNDING_RPC_URL", default_value = "http://localhost:8545")]
    rpc_url: String,

    /// Account to act as, instead of the node's first account
    #[arg(long, env = "CROUDFUNDING_ACCOUNT")]
    account: Option<Address>,

    #[command(flatten)]
    options: ClientOptions,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Show the contract owner and whether the account is the owner
    Owner,
    /// List all funds
    List,
    /// Contribute to a fund, with the default contribution when no amount is given
    Contribute {
        fund_id: u64,
        /// Amount in tokens
        amount: Option<String>,
    },
    /// Create a fund (contract owner only)
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        brief: String,
        /// Target amount in tokens
        #[arg(long)]
        target: String,
        #[arg(long)]
        duration_minutes: String,
    },
}

fn main() -> Result<()> {
    croudfunding_client::tracing::init();
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let provider = HttpProvider::new(&cli.rpc_url, cli.account)?;
    let app = CroudFundingApp::new(Some(provider), cli.options)?;
    let startup = app.start().await?;

    match cli.command {
        Command::Owner => {
            println!("owner: {}", startup.owner);
            println!("account: {} (owner: {})", startup.address, startup.is_owner);
        }
        Command::List => {
            if let Some(error) = startup.refresh_error {
                bail!(error);
            }
            for fund in app.fund_views().await {
                println!(
                    "#{} {} [{}] {} ({:.2}%), {} contributors, ends {}",
                    fund.id,
                    fund.title,
                    fund.status,
                    fund.progress,
                    fund.percentage,
                    fund.contributor_count,
                    fund.end_date,
                );
                println!("    {}", fund.brief);
            }
        }
        Command::Contribute { fund_id, amount } => {
            if let Some(amount) = amount {
                app.set_contribution_amount(fund_id, &amount).await?;
            }
            let receipt = app.contribute(fund_id).await?;
            println!(
                "contributed {} to fund #{} in {}",
                amount::to_decimal_string(receipt.amount),
                receipt.fund_id,
                receipt.transaction_hash,
            );
            if let Some(fund) = app.funds().await.iter().find(|fund| fund.id == fund_id) {
                println!("progress: {}", fund.view().progress);
            }
        }
        Command::Create {
            title,
            brief,
            target,
            duration_minutes,
        } => {
            for (field, value) in [
                (NewFundField::Title, title),
                (NewFundField::Brief, brief),
                (NewFundField::RequireAmount, target),
                (NewFundField::DurationInMinutes, duration_minutes),
            ] {
                app.update_new_fund(field, &value).await?;
            }
            let receipt = app.create_fund().await?;
            println!(
                "created fund \"{}\" in {}",
                receipt.fund.title, receipt.transaction_hash
            );
        }
    }
    Ok(())
}
