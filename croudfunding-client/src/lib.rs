// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! This module provides the CroudFunding client: the local view of the funds recorded
//! on the contract, and the contribution and fund-creation workflows.

pub mod amount;
pub mod app;
pub mod client_options;
pub mod contribution;
pub mod creation;
pub mod data_types;
pub mod error;
pub mod repository;
pub mod tracing;
pub mod wallet;
#[cfg(web)]
pub mod web;

pub use crate::{app::CroudFundingApp, client_options::ClientOptions, error::Error};
