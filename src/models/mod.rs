// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod credential;
pub mod stats;

pub use activity::{ActivityRow, RawActivity};
pub use credential::Credential;
pub use stats::{AggregateBucket, IsoWeekId, KpiSet, MonthId, Period, PeriodKey};
