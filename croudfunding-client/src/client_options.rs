// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::{address, Address};
use croudfunding_ethereum::{contract::ConfirmationConfig, time::Duration};
use serde::{Deserialize, Serialize};

/// The address of the deployed CroudFunding contract.
pub const DEFAULT_CONTRACT_ADDRESS: Address = address!("B60a78201C7e1468Af145B076319421F362E4476");

/// The amount contributed when the user leaves the amount empty, in tokens.
pub const DEFAULT_CONTRIBUTION: &str = "0.01";

#[derive(Clone, Debug, PartialEq, Eq, clap::Args, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientOptions {
    /// The address of the CroudFunding contract.
    #[arg(
        long,
        env = "CROUDFUNDING_CONTRACT_ADDRESS",
        default_value = "0xB60a78201C7e1468Af145B076319421F362E4476"
    )]
    pub contract_address: Address,

    /// The delay between two queries for the receipt of a submitted transaction.
    #[arg(
        long = "confirmation-poll-interval-ms",
        default_value = "1000",
        env = "CROUDFUNDING_CONFIRMATION_POLL_INTERVAL"
    )]
    pub confirmation_poll_interval_ms: u64,

    /// How many times the receipt of a submitted transaction is queried before giving up.
    #[arg(
        long,
        default_value = "120",
        env = "CROUDFUNDING_MAX_CONFIRMATION_POLLS"
    )]
    pub max_confirmation_polls: u32,

    /// The amount contributed when none is given, in tokens.
    #[arg(long, default_value = DEFAULT_CONTRIBUTION)]
    pub default_contribution: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            contract_address: DEFAULT_CONTRACT_ADDRESS,
            confirmation_poll_interval_ms: 1000,
            max_confirmation_polls: 120,
            default_contribution: DEFAULT_CONTRIBUTION.to_owned(),
        }
    }
}

impl ClientOptions {
    pub fn confirmation(&self) -> ConfirmationConfig {
        ConfirmationConfig {
            poll_interval: Duration::from_millis(self.confirmation_poll_interval_ms),
            max_polls: self.max_confirmation_polls,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser as _;

    use super::{ClientOptions, DEFAULT_CONTRACT_ADDRESS};

    #[derive(clap::Parser)]
    struct Command {
        #[command(flatten)]
        options: ClientOptions,
    }

    #[test]
    fn command_line_defaults_match_the_default_options() {
        let command = Command::try_parse_from(["croudfunding"]).unwrap();
        assert_eq!(command.options, ClientOptions::default());
        assert_eq!(command.options.contract_address, DEFAULT_CONTRACT_ADDRESS);
    }

    #[test]
    fn browser_options_are_camel_case_and_partial() {
        let options: ClientOptions = serde_json::from_value(serde_json::json!({
            "confirmationPollIntervalMs": 250,
            "defaultContribution": "0.5",
        }))
        .unwrap();
        assert_eq!(options.confirmation().poll_interval.as_millis(), 250);
        assert_eq!(options.max_confirmation_polls, 120);
        assert_eq!(options.default_contribution, "0.5");
        assert_eq!(options.contract_address, DEFAULT_CONTRACT_ADDRESS);
    }
}
