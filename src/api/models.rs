use crate::db::models::*;
use crate::navigation::NavItem;
use crate::publishing::PublishedPost;
use crate::scheduler::CycleReport;
use crate::usage::{UsageKind, UsageSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Largest page a list endpoint returns
pub const MAX_LIST_LIMIT: i64 = 100;

/// `{ "success": true, ...payload }`
#[derive(Debug, Clone, Serialize)]
pub struct Success<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Success<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Shared `url` / `limit` filter for history listings
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

impl HistoryParams {
    pub fn clamped_limit(&self) -> i64 {
        self.limit.clamp(1, MAX_LIST_LIMIT)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResponse {
    pub result: ScanResult,
    pub usage: UsageCounters,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultsResponse {
    pub results: Vec<ScanResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultResponse {
    pub result: ScanResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonsResponse {
    pub comparisons: Vec<ScanComparison>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateScheduledScanRequest {
    pub website_url: String,
    #[serde(default = "default_frequency_days")]
    pub frequency_days: i64,
    #[serde(default = "default_true")]
    pub email_alerts: bool,
    #[serde(default)]
    pub auto_optimize: bool,
    /// First run; defaults to now so the baseline is taken on the next tick
    #[serde(default)]
    pub first_scan_at: Option<DateTime<Utc>>,
}

fn default_frequency_days() -> i64 {
    7
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduledScansResponse {
    pub scheduled_scans: Vec<ScheduledScan>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduledScanResponse {
    pub scheduled_scan: ScheduledScan,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizeRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResponse {
    pub optimization: OptimizationRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationsResponse {
    pub optimizations: Vec<OptimizationRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageResponse {
    pub usage: UsageSummary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncrementUsageRequest {
    #[serde(rename = "type")]
    pub kind: UsageKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountersResponse {
    pub usage: UsageCounters,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishRequest {
    pub site_url: String,
    pub username: String,
    pub application_password: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishResponse {
    pub post: PublishedPost,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RewriteRequest {
    pub content: String,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RewriteResponse {
    pub content: String,
    pub original_length: usize,
    pub rewritten_length: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTokenRequest {
    pub name: String,
    #[serde(default)]
    pub rate_limit_per_hour: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedTokenResponse {
    /// Plaintext token, returned only once
    pub token: String,
    pub api_token: ApiToken,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokensResponse {
    pub tokens: Vec<ApiToken>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub website_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectResponse {
    pub project: Project,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectsResponse {
    pub projects: Vec<Project>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationResponse {
    pub organization: Organization,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationsResponse {
    pub organizations: Vec<Organization>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddMemberRequest {
    pub email: String,
    #[serde(default = "default_member_role")]
    pub role: String,
}

fn default_member_role() -> String {
    ORG_ROLE_MEMBER.to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberResponse {
    pub member: OrganizationMember,
}

#[derive(Debug, Clone, Serialize)]
pub struct MembersResponse {
    pub members: Vec<MemberWithEmail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavigationResponse {
    pub role: String,
    pub entries: Vec<NavItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleResponse {
    pub report: CycleReport,
}

/// Empty payload for deletes and other acknowledgements
#[derive(Debug, Clone, Serialize)]
pub struct Empty {}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Readiness check response
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub database: String,
    pub scheduler: String,
}
