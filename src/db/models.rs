use crate::analyzer::SeoIssue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

pub const ROLE_MEMBER: &str = "member";
pub const ROLE_ADMIN: &str = "admin";

pub const OPTIMIZATION_COMPLETED: &str = "completed";
pub const OPTIMIZATION_ROLLED_BACK: &str = "rolled_back";

pub const TRIGGER_MANUAL: &str = "manual";
pub const TRIGGER_SCHEDULED: &str = "scheduled";

pub const MEMBER_ACTIVE: &str = "active";
pub const MEMBER_INACTIVE: &str = "inactive";

pub const ORG_ROLE_OWNER: &str = "owner";
pub const ORG_ROLE_ADMIN: &str = "admin";
pub const ORG_ROLE_MEMBER: &str = "member";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub role: String,
    pub plan: String,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
    pub email: String,
    pub role: String,
    pub plan: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanLimits {
    pub plan: String,
    pub scans_limit: i64,
    pub optimizations_limit: i64,
    pub ai_rewrites_limit: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiToken {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    #[serde(skip)]
    pub token_hash: String,
    pub token_prefix: String,
    pub rate_limit_per_hour: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewApiToken {
    pub user_id: String,
    pub name: String,
    pub token_hash: String,
    pub token_prefix: String,
    pub rate_limit_per_hour: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduledScan {
    pub id: i64,
    pub user_id: String,
    pub website_url: String,
    pub frequency_days: i64,
    pub next_scan_at: DateTime<Utc>,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub email_alerts: bool,
    pub auto_optimize: bool,
    pub claimed_until: Option<DateTime<Utc>>,
    pub failure_count: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScheduledScan {
    pub user_id: String,
    pub website_url: String,
    pub frequency_days: i64,
    pub next_scan_at: DateTime<Utc>,
    pub email_alerts: bool,
    pub auto_optimize: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateScheduledScan {
    pub frequency_days: Option<i64>,
    pub is_active: Option<bool>,
    pub email_alerts: Option<bool>,
    pub auto_optimize: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScanResult {
    pub id: i64,
    pub user_id: String,
    pub website_url: String,
    pub seo_score: i64,
    pub issues: Json<Vec<SeoIssue>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScanResult {
    pub user_id: String,
    pub website_url: String,
    pub seo_score: i64,
    pub issues: Vec<SeoIssue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScanComparison {
    pub id: i64,
    pub user_id: String,
    pub website_url: String,
    pub scheduled_scan_id: Option<i64>,
    pub previous_seo_score: i64,
    pub current_seo_score: i64,
    pub score_change: i64,
    pub new_issues: Json<Vec<String>>,
    pub fixed_issues: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScanComparison {
    pub user_id: String,
    pub website_url: String,
    pub scheduled_scan_id: Option<i64>,
    pub previous_seo_score: i64,
    pub current_seo_score: i64,
    pub new_issues: Vec<String>,
    pub fixed_issues: Vec<String>,
}

impl NewScanComparison {
    pub fn score_change(&self) -> i64 {
        self.current_seo_score - self.previous_seo_score
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageCounters {
    pub user_id: String,
    pub scans_used: i64,
    pub optimizations_used: i64,
    pub ai_rewrites_used: i64,
    pub reset_date: DateTime<Utc>,
}

/// Metric snapshot stored before and after an optimization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub seo_score: i64,
    pub issue_count: usize,
    pub issue_codes: Vec<String>,
}

/// Changes proposed by an optimization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationChanges {
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub addressed_issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OptimizationRecord {
    pub id: i64,
    pub user_id: String,
    pub website_url: String,
    pub trigger_source: String,
    pub before_metrics: Json<MetricsSnapshot>,
    pub after_metrics: Json<MetricsSnapshot>,
    pub changes: Json<OptimizationChanges>,
    pub status: String,
    pub rolled_back_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOptimizationRecord {
    pub user_id: String,
    pub website_url: String,
    pub trigger_source: String,
    pub before_metrics: MetricsSnapshot,
    pub after_metrics: MetricsSnapshot,
    pub changes: OptimizationChanges,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AiRewrite {
    pub id: i64,
    pub user_id: String,
    pub original_length: i64,
    pub rewritten_length: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub website_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrganizationMember {
    pub id: i64,
    pub organization_id: i64,
    pub user_id: String,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrganizationMember {
    pub fn is_active(&self) -> bool {
        self.status == MEMBER_ACTIVE
    }

    pub fn can_manage(&self) -> bool {
        self.is_active() && (self.role == ORG_ROLE_OWNER || self.role == ORG_ROLE_ADMIN)
    }
}

/// Member row joined with the member's email
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MemberWithEmail {
    pub id: i64,
    pub organization_id: i64,
    pub user_id: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
