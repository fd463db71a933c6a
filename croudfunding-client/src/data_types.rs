// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core data types of the client: funds as displayed, user drafts and operation phases.

use std::{collections::BTreeMap, fmt, str::FromStr};

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use croudfunding_ethereum::contract::CroudFunding;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::{self, ParseAmountError};

/// A crowdfunding campaign, as read from the contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fund {
    pub id: u64,
    pub title: String,
    pub brief: String,
    /// The funding target, in base units.
    pub require_amount: U256,
    /// The amount raised so far, in base units.
    pub current_amount: U256,
    pub completed: bool,
    /// Milliseconds since the Unix epoch.
    pub start_time: u64,
    /// Milliseconds since the Unix epoch.
    pub end_time: u64,
    /// One entry per contribution, in order. An address appears once per contribution.
    pub contributors: Vec<Address>,
}

fn saturating_u64(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

impl Fund {
    /// Normalizes a record returned by `getAllFunds`.
    pub fn from_record(record: &CroudFunding::Fund) -> Self {
        Self {
            id: saturating_u64(record.id),
            title: record.title.clone(),
            brief: record.brief.clone(),
            require_amount: record.requireAmount,
            current_amount: record.currentAmount,
            completed: record.completed,
            start_time: saturating_u64(record.startTime).saturating_mul(1000),
            end_time: saturating_u64(record.endTime).saturating_mul(1000),
            contributors: record.contributors.clone(),
        }
    }

    pub fn contributor_count(&self) -> usize {
        self.contributors.len()
    }

    /// Only completion closes a fund: an expired fund still accepts contributions.
    pub fn accepts_contributions(&self) -> bool {
        !self.completed
    }

    pub fn percentage(&self) -> f64 {
        amount::percentage(self.current_amount, self.require_amount)
    }

    pub fn view(&self) -> FundView {
        FundView {
            id: self.id,
            title: self.title.clone(),
            brief: self.brief.clone(),
            progress: amount::progress_text(self.current_amount, self.require_amount),
            percentage: self.percentage(),
            status: if self.completed {
                FundStatus::Completed
            } else {
                FundStatus::Active
            },
            end_date: end_date(self.end_time),
            contributor_count: self.contributor_count(),
            accepts_contributions: self.accepts_contributions(),
        }
    }
}

fn end_date(millis: u64) -> String {
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(
            || "unknown".to_owned(),
            |date| date.format("%Y-%m-%d").to_string(),
        )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundStatus {
    Completed,
    Active,
}

impl fmt::Display for FundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundStatus::Completed => write!(f, "Completed"),
            FundStatus::Active => write!(f, "Active"),
        }
    }
}

/// What is displayed for one fund.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundView {
    pub id: u64,
    pub title: String,
    pub brief: String,
    /// `"<current> / <target>"`, in tokens.
    pub progress: String,
    /// In `[0, 100]`.
    pub percentage: f64,
    pub status: FundStatus,
    /// `YYYY-MM-DD`, in UTC.
    pub end_date: String,
    pub contributor_count: usize,
    pub accepts_contributions: bool,
}

/// The contribution amounts typed by the user, per fund, as decimal strings.
#[derive(Clone, Debug, Default)]
pub struct ContributionDraft {
    amounts: BTreeMap<u64, String>,
}

impl ContributionDraft {
    pub fn set(&mut self, fund_id: u64, amount: impl Into<String>) {
        self.amounts.insert(fund_id, amount.into());
    }

    /// Returns the amount typed for `fund_id`, or the empty string.
    pub fn get(&self, fund_id: u64) -> &str {
        self.amounts.get(&fund_id).map_or("", String::as_str)
    }

    /// Returns the amount to submit for `fund_id`, with `default` standing in for an
    /// empty input.
    pub fn effective_amount(&self, fund_id: u64, default: &str) -> String {
        let amount = self.get(fund_id).trim();
        if amount.is_empty() {
            default.to_owned()
        } else {
            amount.to_owned()
        }
    }

    pub fn clear(&mut self, fund_id: u64) {
        self.amounts.remove(&fund_id);
    }
}

/// A field of [`NewFundDraft`], named as in the browser API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NewFundField {
    Title,
    Brief,
    RequireAmount,
    DurationInMinutes,
}

impl FromStr for NewFundField {
    type Err = DraftError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "title" => Ok(NewFundField::Title),
            "brief" => Ok(NewFundField::Brief),
            "requireAmount" => Ok(NewFundField::RequireAmount),
            "durationInMinutes" => Ok(NewFundField::DurationInMinutes),
            name => Err(DraftError::UnknownField(name.to_owned())),
        }
    }
}

/// The new fund being composed by the owner.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFundDraft {
    pub title: String,
    pub brief: String,
    /// Decimal number of tokens.
    pub require_amount: String,
    pub duration_in_minutes: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("the title must not be empty")]
    EmptyTitle,
    #[error("the description must not be empty")]
    EmptyBrief,
    #[error("invalid target amount: {0}")]
    InvalidTarget(ParseAmountError),
    #[error("the target amount must be greater than zero")]
    ZeroTarget,
    #[error("the duration must be a positive number of minutes")]
    InvalidDuration,
    #[error("unknown fund field `{0}`")]
    UnknownField(String),
}

/// A [`NewFundDraft`] whose fields passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidFundDraft {
    pub title: String,
    pub brief: String,
    /// In base units, strictly positive.
    pub target: U256,
    /// Strictly positive.
    pub duration_minutes: u64,
}

impl NewFundDraft {
    pub fn set(&mut self, field: NewFundField, value: impl Into<String>) {
        let value = value.into();
        match field {
            NewFundField::Title => self.title = value,
            NewFundField::Brief => self.brief = value,
            NewFundField::RequireAmount => self.require_amount = value,
            NewFundField::DurationInMinutes => self.duration_in_minutes = value,
        }
    }

    pub fn validate(&self) -> Result<ValidFundDraft, DraftError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DraftError::EmptyTitle);
        }
        let brief = self.brief.trim();
        if brief.is_empty() {
            return Err(DraftError::EmptyBrief);
        }
        let target =
            amount::to_base_units(&self.require_amount).map_err(DraftError::InvalidTarget)?;
        if target.is_zero() {
            return Err(DraftError::ZeroTarget);
        }
        let duration_minutes = self
            .duration_in_minutes
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|minutes| *minutes > 0)
            .ok_or(DraftError::InvalidDuration)?;
        Ok(ValidFundDraft {
            title: title.to_owned(),
            brief: brief.to_owned(),
            target,
            duration_minutes,
        })
    }
}

/// The lifecycle of a contribution or a fund creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationPhase {
    #[default]
    Idle,
    Validating,
    Submitting,
    Confirming,
    Succeeded,
    Failed,
}

impl OperationPhase {
    /// Whether an operation is in progress and blocks a new one.
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            OperationPhase::Validating | OperationPhase::Submitting | OperationPhase::Confirming
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OperationPhase::Succeeded | OperationPhase::Failed)
    }
}
