//! Per-tier monthly quotas and usage pricing.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Tier, UsageKind};

/// A quota value. `Unlimited` always passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "value")]
pub enum Limit {
    Max(u64),
    Unlimited,
}

impl Limit {
    /// True when `used` has reached the limit.
    pub fn is_reached(&self, used: u64) -> bool {
        match self {
            Limit::Max(max) => used >= *max,
            Limit::Unlimited => false,
        }
    }

    /// True when consuming `additional` more on top of `used` would exceed
    /// the limit.
    pub fn would_exceed(&self, used: u64, additional: u64) -> bool {
        match self {
            Limit::Max(max) => used.saturating_add(additional) > *max,
            Limit::Unlimited => false,
        }
    }

    /// Fraction of the limit consumed, `None` when unlimited or zero.
    pub fn utilization(&self, used: u64) -> Option<f64> {
        match self {
            Limit::Max(0) | Limit::Unlimited => None,
            Limit::Max(max) => Some(used as f64 / *max as f64),
        }
    }
}

/// Monthly quotas for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierLimits {
    pub api_calls: Limit,
    pub tokens: Limit,
    pub file_uploads: Limit,
    pub attachments: Limit,
    pub tool_executions: Limit,
}

impl TierLimits {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self {
                api_calls: Limit::Max(100),
                tokens: Limit::Max(50_000),
                file_uploads: Limit::Max(10),
                attachments: Limit::Max(10),
                tool_executions: Limit::Max(20),
            },
            Tier::Starter => Self {
                api_calls: Limit::Max(10_000),
                tokens: Limit::Max(1_000_000),
                file_uploads: Limit::Max(100),
                attachments: Limit::Max(100),
                tool_executions: Limit::Max(500),
            },
            Tier::Professional => Self {
                api_calls: Limit::Max(50_000),
                tokens: Limit::Max(5_000_000),
                file_uploads: Limit::Max(1_000),
                attachments: Limit::Max(1_000),
                tool_executions: Limit::Max(5_000),
            },
            Tier::Enterprise => Self {
                api_calls: Limit::Unlimited,
                tokens: Limit::Unlimited,
                file_uploads: Limit::Unlimited,
                attachments: Limit::Unlimited,
                tool_executions: Limit::Unlimited,
            },
        }
    }

    pub fn limit_for(&self, kind: UsageKind) -> Limit {
        match kind {
            UsageKind::ApiCall => self.api_calls,
            UsageKind::TokenUsage => self.tokens,
            UsageKind::FileUpload => self.file_uploads,
            UsageKind::AttachmentProcessing => self.attachments,
            UsageKind::ToolExecution => self.tool_executions,
        }
    }
}

// Base prices are held in thousandths of a cent so the arithmetic stays exact.
const MILLICENTS_PER_CENT: u128 = 1_000;

/// Base price of one unit of `kind`, in thousandths of a cent.
pub fn base_unit_cost_millicents(kind: UsageKind) -> u64 {
    match kind {
        UsageKind::ApiCall => 100,
        UsageKind::TokenUsage => 2,
        UsageKind::FileUpload => 1_000,
        UsageKind::AttachmentProcessing => 500,
        UsageKind::ToolExecution => 200,
    }
}

/// Tier discount as a percentage of the base price.
pub fn tier_discount_percent(tier: Tier) -> u64 {
    match tier {
        Tier::Enterprise => 50,
        Tier::Professional => 80,
        Tier::Starter | Tier::Free => 100,
    }
}

/// Cost in whole cents of `quantity` units of `kind` at `tier`, rounded up.
pub fn calculate_cost(kind: UsageKind, quantity: u64, tier: Tier) -> i64 {
    let scaled = u128::from(quantity)
        * u128::from(base_unit_cost_millicents(kind))
        * u128::from(tier_discount_percent(tier));
    let denom = MILLICENTS_PER_CENT * 100;
    let cents = scaled.div_ceil(denom);
    i64::try_from(cents).unwrap_or(i64::MAX)
}

/// Start of the billing month containing `now`: the 1st, 00:00 UTC.
pub fn billing_period_start(now: DateTime<Utc>) -> DateTime<Utc> {
    first_of_month(now.year(), now.month())
}

/// Start of the next billing month; quotas reset at this instant.
pub fn next_billing_period_start(now: DateTime<Utc>) -> DateTime<Utc> {
    if now.month() == 12 {
        first_of_month(now.year() + 1, 1)
    } else {
        first_of_month(now.year(), now.month() + 1)
    }
}

fn first_of_month(year: i32, month: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
