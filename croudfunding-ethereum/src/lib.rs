// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! This module provides access to the CroudFunding contract through an EVM wallet provider.

pub mod client;
pub mod common;
pub mod contract;
#[cfg(not(target_arch = "wasm32"))]
pub mod provider;
pub mod time;
pub mod util;
#[cfg(web)]
pub mod web;

/// Helper types for tests.
#[cfg(with_testing)]
pub mod test_utils;
