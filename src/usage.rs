// Monthly usage counters checked against plan limits

use crate::config::plans::UNLIMITED;
use crate::db::{self, models::UsageCounters, DbPool};
use crate::utils;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    Scans,
    Optimizations,
    AiRewrites,
}

impl UsageKind {
    /// Counter column in `usage_counters`
    pub fn column(self) -> &'static str {
        match self {
            UsageKind::Scans => "scans_used",
            UsageKind::Optimizations => "optimizations_used",
            UsageKind::AiRewrites => "ai_rewrites_used",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UsageKind::Scans => "scans",
            UsageKind::Optimizations => "optimizations",
            UsageKind::AiRewrites => "ai_rewrites",
        }
    }

    fn used(self, counters: &UsageCounters) -> i64 {
        match self {
            UsageKind::Scans => counters.scans_used,
            UsageKind::Optimizations => counters.optimizations_used,
            UsageKind::AiRewrites => counters.ai_rewrites_used,
        }
    }

    fn limit(self, limits: &UsageLimits) -> i64 {
        match self {
            UsageKind::Scans => limits.scans,
            UsageKind::Optimizations => limits.optimizations,
            UsageKind::AiRewrites => limits.ai_rewrites,
        }
    }
}

impl fmt::Display for UsageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UsageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scans" => Ok(UsageKind::Scans),
            "optimizations" => Ok(UsageKind::Optimizations),
            "ai_rewrites" => Ok(UsageKind::AiRewrites),
            other => Err(Error::Validation(format!(
                "Unknown usage type '{other}'. Expected scans, optimizations or ai_rewrites"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimits {
    pub scans: i64,
    pub optimizations: i64,
    pub ai_rewrites: i64,
}

/// Activity recorded since the first of the current month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyActivity {
    pub scans: i64,
    pub optimizations: i64,
    pub ai_rewrites: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSummary {
    pub plan: String,
    pub limits: UsageLimits,
    pub scans_used: i64,
    pub optimizations_used: i64,
    pub ai_rewrites_used: i64,
    pub reset_date: DateTime<Utc>,
    pub this_month: MonthlyActivity,
}

#[derive(Clone)]
pub struct UsageTracker {
    pool: DbPool,
}

impl UsageTracker {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn limits(&self, user_id: &str) -> Result<(String, UsageLimits)> {
        let plan = db::plans::get_limits_for_user(&self.pool, user_id).await?;
        Ok((
            plan.plan,
            UsageLimits {
                scans: plan.scans_limit,
                optimizations: plan.optimizations_limit,
                ai_rewrites: plan.ai_rewrites_limit,
            },
        ))
    }

    /// Plan limits, counters and this month's activity for a user.
    ///
    /// The reads run concurrently and are not wrapped in a transaction.
    pub async fn summary(&self, user_id: &str, now: DateTime<Utc>) -> Result<UsageSummary> {
        if db::usage::reset_if_due(&self.pool, user_id, now).await? {
            debug!("Monthly usage reset for {}", user_id);
        }

        let since = utils::month_start(now);
        let ((plan, limits), counters, scans, optimizations, ai_rewrites) = futures::try_join!(
            self.limits(user_id),
            db::usage::get_or_create_counters(&self.pool, user_id, now),
            db::results::count_results_since(&self.pool, user_id, since),
            db::optimizations::count_optimizations_since(&self.pool, user_id, since),
            db::rewrites::count_rewrites_since(&self.pool, user_id, since),
        )?;

        Ok(UsageSummary {
            plan,
            limits,
            scans_used: counters.scans_used,
            optimizations_used: counters.optimizations_used,
            ai_rewrites_used: counters.ai_rewrites_used,
            reset_date: counters.reset_date,
            this_month: MonthlyActivity {
                scans,
                optimizations,
                ai_rewrites,
            },
        })
    }

    /// Add exactly one to the counter for `kind`
    pub async fn increment(
        &self,
        user_id: &str,
        kind: UsageKind,
        now: DateTime<Utc>,
    ) -> Result<UsageCounters> {
        db::usage::reset_if_due(&self.pool, user_id, now).await?;
        let counters = db::usage::increment_counter(&self.pool, user_id, kind, now).await?;
        debug!("{} usage for {} is now {}", kind, user_id, kind.used(&counters));
        Ok(counters)
    }

    /// Fail with `QuotaExceeded` once the plan's monthly limit is reached
    pub async fn ensure_within_limit(
        &self,
        user_id: &str,
        kind: UsageKind,
        now: DateTime<Utc>,
    ) -> Result<()> {
        db::usage::reset_if_due(&self.pool, user_id, now).await?;
        let ((plan, limits), counters) = futures::try_join!(
            self.limits(user_id),
            db::usage::get_or_create_counters(&self.pool, user_id, now),
        )?;

        let limit = kind.limit(&limits);
        if limit == UNLIMITED {
            return Ok(());
        }

        let used = kind.used(&counters);
        if used >= limit {
            return Err(Error::QuotaExceeded(format!(
                "Monthly {kind} limit of {limit} reached on the {plan} plan"
            )));
        }

        Ok(())
    }
}
