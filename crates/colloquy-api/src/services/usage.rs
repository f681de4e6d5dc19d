//! Usage metering and monthly quota enforcement.
//!
//! Recording is best effort: a failed write is logged and dropped so the
//! request that caused it is never blocked. Quota checks read the current
//! billing month and propagate lookup errors.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use colloquy_core::{
    billing_period_start, calculate_cost, new_v7, next_billing_period_start, NewUsageEvent,
    Result, SubscriptionRepository, Tier, TierLimits, UsageEvent, UsageKind, UsageRepository,
    UsageSummary,
};
use colloquy_db::Database;

/// Current usage compared against the owner's tier quotas.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitCheck {
    pub within_limits: bool,
    pub tier: Tier,
    pub usage: UsageSummary,
    pub limits: TierLimits,
    /// Kinds whose usage has reached the limit.
    pub exceeded: Vec<UsageKind>,
}

/// Allow/deny decision for one prospective request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<DateTime<Utc>>,
}

impl RequestDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            reset_time: None,
        }
    }

    fn deny(reason: &str, reset_time: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            reset_time: Some(reset_time),
        }
    }
}

/// Denial message for a kind.
pub fn denial_reason(kind: UsageKind) -> &'static str {
    match kind {
        UsageKind::ApiCall => "API call limit exceeded",
        UsageKind::TokenUsage => "Token limit exceeded",
        UsageKind::ToolExecution => "Tool execution limit exceeded",
        UsageKind::FileUpload | UsageKind::AttachmentProcessing => "Monthly usage limit exceeded",
    }
}

#[derive(Clone)]
pub struct UsageTracker {
    usage: Arc<dyn UsageRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl UsageTracker {
    pub fn new(
        usage: Arc<dyn UsageRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        Self {
            usage,
            subscriptions,
        }
    }

    pub fn from_database(db: &Database) -> Self {
        Self::new(
            Arc::new(db.usage.clone()),
            Arc::new(db.subscriptions.clone()),
        )
    }

    /// Tier of the owner's active subscription; `free` when there is none or
    /// the lookup fails.
    pub async fn tier(&self, owner: &str) -> Tier {
        match self.subscriptions.active_tier(owner).await {
            Ok(tier) => tier.unwrap_or_default(),
            Err(e) => {
                warn!(
                    subsystem = "api",
                    component = "usage",
                    owner = %owner,
                    error = %e,
                    "Subscription lookup failed, using free tier"
                );
                Tier::Free
            }
        }
    }

    /// Record one usage event. Never fails; errors are logged.
    pub async fn track(&self, event: NewUsageEvent) {
        let tier = self.tier(&event.owner).await;
        let cost_cents = self.calculate_cost(event.kind, event.quantity, tier);
        let row = UsageEvent {
            id: new_v7(),
            owner: event.owner,
            kind: event.kind,
            resource: event.resource,
            quantity: i64::try_from(event.quantity).unwrap_or(i64::MAX),
            metadata: event.metadata,
            cost_cents,
            created_at: Utc::now(),
        };

        match self.usage.record(&row).await {
            Ok(()) => debug!(
                subsystem = "api",
                component = "usage",
                op = "track",
                owner = %row.owner,
                usage_kind = row.kind.as_str(),
                quantity = row.quantity,
                cost_cents,
                "Usage recorded"
            ),
            Err(e) => warn!(
                subsystem = "api",
                component = "usage",
                op = "track",
                owner = %row.owner,
                usage_kind = row.kind.as_str(),
                error = %e,
                "Failed to record usage"
            ),
        }
    }

    /// Spawn [`track`](Self::track) without waiting for it. At most once: a
    /// crash before the write lands drops the event.
    pub fn track_detached(&self, event: NewUsageEvent) {
        let tracker = self.clone();
        tokio::spawn(async move {
            tracker.track(event).await;
        });
    }

    /// Usage summed by kind since the 1st of the current month, 00:00 UTC.
    pub async fn get_current_usage(&self, owner: &str, now: DateTime<Utc>) -> Result<UsageSummary> {
        self.usage
            .summarize_since(owner, billing_period_start(now))
            .await
    }

    pub async fn check_limits(&self, owner: &str, now: DateTime<Utc>) -> Result<LimitCheck> {
        let tier = self.tier(owner).await;
        let usage = self.get_current_usage(owner, now).await?;
        let limits = TierLimits::for_tier(tier);
        let exceeded: Vec<UsageKind> = UsageKind::ALL
            .iter()
            .copied()
            .filter(|kind| limits.limit_for(*kind).is_reached(usage.quantity(*kind)))
            .collect();

        Ok(LimitCheck {
            within_limits: exceeded.is_empty(),
            tier,
            usage,
            limits,
            exceeded,
        })
    }

    /// Whether `owner` may consume `quantity` more of `kind`.
    ///
    /// Denied when any kind is already at its limit or when this request
    /// would push `kind` past its own.
    pub async fn can_make_request(
        &self,
        kind: UsageKind,
        quantity: u64,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Result<RequestDecision> {
        let check = self.check_limits(owner, now).await?;
        let reset = next_billing_period_start(now);
        let used = check.usage.quantity(kind);
        let over_for_kind = check.exceeded.contains(&kind)
            || check.limits.limit_for(kind).would_exceed(used, quantity);

        let decision = if over_for_kind {
            RequestDecision::deny(denial_reason(kind), reset)
        } else if !check.within_limits {
            RequestDecision::deny("Monthly usage limit exceeded", reset)
        } else {
            RequestDecision::allow()
        };

        if !decision.allowed {
            debug!(
                subsystem = "api",
                component = "usage",
                op = "can_make_request",
                owner = %owner,
                tier = check.tier.as_str(),
                usage_kind = kind.as_str(),
                used,
                quantity,
                "Request denied by quota"
            );
        }
        Ok(decision)
    }

    /// Cost in whole cents, rounded up, after the tier discount.
    pub fn calculate_cost(&self, kind: UsageKind, quantity: u64, tier: Tier) -> i64 {
        calculate_cost(kind, quantity, tier)
    }
}
