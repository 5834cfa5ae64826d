use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::SubsecRound;
use std::sync::Arc;
use tracing::{debug, info};

use crate::analyzer::{Analysis, HttpAnalyzer, SiteAnalyzer};
use crate::api::auth::{AdminUser, AuthUser, SessionUser};
use crate::api::models::*;
use crate::completion::{self, prompts, CompletionClient, CompletionRequest};
use crate::config::Settings;
use crate::db::{self, models::*, DbPool};
use crate::navigation::{self, NavItem};
use crate::notifier::{self, AlertNotifier};
use crate::optimizer::{CompletionOptimizer, OptimizationTarget, OptimizationTrigger, Optimizer};
use crate::publishing::{NewPost, PublishingClient, SiteCredentials};
use crate::scheduler::Scheduler;
use crate::usage::{UsageKind, UsageTracker};
use crate::utils::{self, tokens, validation};
use crate::{Error, Result};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub settings: Settings,
    pub analyzer: Arc<dyn SiteAnalyzer>,
    pub optimizer: Arc<dyn Optimizer>,
    pub usage: UsageTracker,
    pub completion: CompletionClient,
    pub publishing: PublishingClient,
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    /// Wire the service graph around an analyzer and notifier
    pub fn new(
        pool: DbPool,
        settings: Settings,
        analyzer: Arc<dyn SiteAnalyzer>,
        notifier: Arc<dyn AlertNotifier>,
    ) -> Result<Self> {
        let completion = CompletionClient::new(settings.completion.clone())?;
        let publishing = PublishingClient::new()?;
        let usage = UsageTracker::new(pool.clone());

        let optimizer: Arc<dyn Optimizer> = Arc::new(CompletionOptimizer::new(
            pool.clone(),
            completion.clone(),
            usage.clone(),
        ));

        let scheduler = Arc::new(Scheduler::new(
            pool.clone(),
            analyzer.clone(),
            notifier,
            optimizer.clone(),
            settings.scheduler.clone(),
        ));

        Ok(Self {
            pool,
            settings,
            analyzer,
            optimizer,
            usage,
            completion,
            publishing,
            scheduler,
        })
    }

    /// Production wiring: live HTTP analyzer and the configured alert channel
    pub fn from_settings(pool: DbPool, settings: Settings) -> Result<Self> {
        let analyzer: Arc<dyn SiteAnalyzer> = Arc::new(HttpAnalyzer::new(&settings.analyzer)?);
        let notifier = notifier::from_config(&settings.alerts)?;
        Self::new(pool, settings, analyzer, notifier)
    }
}

// Scans

/// POST /api/scan - Analyze a URL now and store the result
pub async fn scan_now(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ScanRequest>,
) -> Result<(StatusCode, Json<Success<ScanResponse>>)> {
    let website_url = validation::normalize_website_url(&req.url)?;
    let now = utils::now();

    state
        .usage
        .ensure_within_limit(user.user_id(), UsageKind::Scans, now)
        .await?;

    let analysis = state.analyzer.analyze(&website_url).await?;

    let result = db::results::insert_result(
        &state.pool,
        &NewScanResult {
            user_id: user.user_id().to_string(),
            website_url,
            seo_score: analysis.seo_score,
            issues: analysis.issues,
        },
    )
    .await?;

    let usage = state
        .usage
        .increment(user.user_id(), UsageKind::Scans, now)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(Success::new(ScanResponse { result, usage })),
    ))
}

/// GET /api/results - List own scan results
pub async fn list_results(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Success<ResultsResponse>>> {
    let url = params
        .url
        .as_deref()
        .map(validation::normalize_website_url)
        .transpose()?;

    let results = db::results::list_results(
        &state.pool,
        user.user_id(),
        url.as_deref(),
        params.clamped_limit(),
    )
    .await?;

    Ok(Json(Success::new(ResultsResponse { results })))
}

/// GET /api/results/:id - One scan result
pub async fn get_result(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Success<ResultResponse>>> {
    let result = db::results::get_result(&state.pool, user.user_id(), id).await?;
    Ok(Json(Success::new(ResultResponse { result })))
}

/// GET /api/comparisons - List own scan comparisons
pub async fn list_comparisons(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Success<ComparisonsResponse>>> {
    let url = params
        .url
        .as_deref()
        .map(validation::normalize_website_url)
        .transpose()?;

    let comparisons = db::comparisons::list_comparisons(
        &state.pool,
        user.user_id(),
        url.as_deref(),
        params.clamped_limit(),
    )
    .await?;

    Ok(Json(Success::new(ComparisonsResponse { comparisons })))
}

// Scheduled scans

/// GET /api/scheduled-scans
pub async fn list_scheduled_scans(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Success<ScheduledScansResponse>>> {
    let scheduled_scans = db::scheduled_scans::list_scheduled_scans(&state.pool, user.user_id()).await?;
    Ok(Json(Success::new(ScheduledScansResponse { scheduled_scans })))
}

/// POST /api/scheduled-scans
pub async fn create_scheduled_scan(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateScheduledScanRequest>,
) -> Result<(StatusCode, Json<Success<ScheduledScanResponse>>)> {
    let website_url = validation::normalize_website_url(&req.website_url)?;
    validation::validate_frequency_days(req.frequency_days)?;

    let next_scan_at = req
        .first_scan_at
        .map(|at| at.trunc_subsecs(0))
        .unwrap_or_else(utils::now);

    let scheduled_scan = db::scheduled_scans::create_scheduled_scan(
        &state.pool,
        &NewScheduledScan {
            user_id: user.user_id().to_string(),
            website_url,
            frequency_days: req.frequency_days,
            next_scan_at,
            email_alerts: req.email_alerts,
            auto_optimize: req.auto_optimize,
        },
    )
    .await?;

    info!(
        "Scheduled {} every {} days for {}",
        scheduled_scan.website_url,
        scheduled_scan.frequency_days,
        user.user_id()
    );

    Ok((
        StatusCode::CREATED,
        Json(Success::new(ScheduledScanResponse { scheduled_scan })),
    ))
}

/// PATCH /api/scheduled-scans/:id
pub async fn update_scheduled_scan(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(update): Json<UpdateScheduledScan>,
) -> Result<Json<Success<ScheduledScanResponse>>> {
    if let Some(days) = update.frequency_days {
        validation::validate_frequency_days(days)?;
    }

    let scheduled_scan =
        db::scheduled_scans::update_scheduled_scan(&state.pool, user.user_id(), id, &update).await?;

    Ok(Json(Success::new(ScheduledScanResponse { scheduled_scan })))
}

/// DELETE /api/scheduled-scans/:id
pub async fn delete_scheduled_scan(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Success<Empty>>> {
    db::scheduled_scans::delete_scheduled_scan(&state.pool, user.user_id(), id).await?;
    Ok(Json(Success::new(Empty {})))
}

// Optimizations

/// POST /api/optimize - Optimize a URL from its most recent scan
pub async fn optimize(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<OptimizeRequest>,
) -> Result<(StatusCode, Json<Success<OptimizationResponse>>)> {
    let website_url = validation::normalize_website_url(&req.url)?;

    let latest = db::results::latest_result(&state.pool, user.user_id(), &website_url)
        .await?
        .ok_or_else(|| {
            Error::Validation(format!("Scan {website_url} before requesting an optimization"))
        })?;

    let target = OptimizationTarget {
        user_id: user.user_id().to_string(),
        website_url,
        analysis: Analysis {
            seo_score: latest.seo_score,
            issues: latest.issues.0,
        },
        trigger: OptimizationTrigger::Manual,
    };

    // Quota is checked inside the optimizer
    let optimization = state.optimizer.optimize(&target).await?;

    Ok((
        StatusCode::CREATED,
        Json(Success::new(OptimizationResponse { optimization })),
    ))
}

/// GET /api/optimizations
pub async fn list_optimizations(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Success<OptimizationsResponse>>> {
    let optimizations =
        db::optimizations::list_optimizations(&state.pool, user.user_id(), params.clamped_limit())
            .await?;
    Ok(Json(Success::new(OptimizationsResponse { optimizations })))
}

/// POST /api/optimizations/:id/rollback
pub async fn rollback_optimization(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Success<OptimizationResponse>>> {
    let optimization =
        db::optimizations::rollback_optimization(&state.pool, user.user_id(), id).await?;
    info!("Rolled back optimization {} for {}", id, user.user_id());
    Ok(Json(Success::new(OptimizationResponse { optimization })))
}

// Usage

/// GET /api/usage
pub async fn get_usage(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Success<UsageResponse>>> {
    let usage = state.usage.summary(user.user_id(), utils::now()).await?;
    Ok(Json(Success::new(UsageResponse { usage })))
}

/// POST /api/usage/increment
pub async fn increment_usage(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<IncrementUsageRequest>,
) -> Result<Json<Success<CountersResponse>>> {
    let usage = state
        .usage
        .increment(user.user_id(), req.kind, utils::now())
        .await?;
    Ok(Json(Success::new(CountersResponse { usage })))
}

// Publishing and AI

/// POST /api/publish - Create a post on the user's blog
pub async fn publish(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<PublishRequest>,
) -> Result<(StatusCode, Json<Success<PublishResponse>>)> {
    let site = validation::validate_url(req.site_url.trim())?;
    let credentials = SiteCredentials {
        username: validation::require(&req.username, "username")?.to_string(),
        application_password: validation::require(&req.application_password, "application_password")?
            .to_string(),
    };
    validation::require(&req.content, "content")?;

    let post = NewPost {
        title: req.title,
        content: req.content,
        status: req.status.unwrap_or_else(|| "draft".to_string()),
        excerpt: req.excerpt,
    };

    debug!("Publishing for {} to {}", user.user_id(), site);
    let post = state
        .publishing
        .create_post(site.as_str(), &credentials, &post)
        .await?;

    Ok((StatusCode::CREATED, Json(Success::new(PublishResponse { post }))))
}

#[derive(serde::Deserialize)]
struct RewriteReply {
    html: String,
}

/// POST /api/ai/rewrite - Rewrite content through the completion service
pub async fn ai_rewrite(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<RewriteRequest>,
) -> Result<Json<Success<RewriteResponse>>> {
    let content = validation::require(&req.content, "content")?;
    let now = utils::now();

    state
        .usage
        .ensure_within_limit(user.user_id(), UsageKind::AiRewrites, now)
        .await?;

    let request = CompletionRequest::new(
        prompts::rewrite_system(),
        prompts::rewrite_content(content, req.tone.as_deref(), &req.keywords),
    )
    .json()
    .max_tokens(2048);

    let text = state.completion.complete(&request).await?;
    let rewritten = completion::parse_json_reply::<RewriteReply>(&text)
        .map(|reply| reply.html)
        .unwrap_or(text);
    let rewritten = utils::sanitize::sanitize_html(&rewritten);

    let original_length = content.chars().count();
    let rewritten_length = rewritten.chars().count();

    db::rewrites::insert_rewrite(
        &state.pool,
        user.user_id(),
        original_length as i64,
        rewritten_length as i64,
    )
    .await?;
    state
        .usage
        .increment(user.user_id(), UsageKind::AiRewrites, now)
        .await?;

    Ok(Json(Success::new(RewriteResponse {
        content: rewritten,
        original_length,
        rewritten_length,
    })))
}

// API tokens

/// GET /api/tokens
pub async fn list_tokens(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
) -> Result<Json<Success<TokensResponse>>> {
    let tokens = db::tokens::list_tokens(&state.pool, user.user_id()).await?;
    Ok(Json(Success::new(TokensResponse { tokens })))
}

/// POST /api/tokens - Create a token; the plaintext is returned only here
pub async fn create_token(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    Json(req): Json<CreateTokenRequest>,
) -> Result<(StatusCode, Json<Success<CreatedTokenResponse>>)> {
    let name = validation::require(&req.name, "name")?.to_string();
    let rate_limit_per_hour = req
        .rate_limit_per_hour
        .unwrap_or(state.settings.server.default_token_rate_limit);
    if rate_limit_per_hour <= 0 {
        return Err(Error::Validation(
            "rate_limit_per_hour must be positive".to_string(),
        ));
    }

    let token = tokens::generate_api_token();
    let api_token = db::tokens::create_token(
        &state.pool,
        &NewApiToken {
            user_id: user.user_id().to_string(),
            name,
            token_hash: tokens::hash_token(&token),
            token_prefix: tokens::display_prefix(&token),
            rate_limit_per_hour,
        },
    )
    .await?;

    info!("Created API token {} for {}", api_token.token_prefix, user.user_id());

    Ok((
        StatusCode::CREATED,
        Json(Success::new(CreatedTokenResponse { token, api_token })),
    ))
}

/// DELETE /api/tokens/:id - Revoke a token
pub async fn revoke_token(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    Path(id): Path<i64>,
) -> Result<Json<Success<Empty>>> {
    db::tokens::revoke_token(&state.pool, user.user_id(), id).await?;
    Ok(Json(Success::new(Empty {})))
}

// Projects

/// GET /api/projects
pub async fn list_projects(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Success<ProjectsResponse>>> {
    let projects = db::projects::list_projects(&state.pool, user.user_id()).await?;
    Ok(Json(Success::new(ProjectsResponse { projects })))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Success<ProjectResponse>>)> {
    let name = validation::require(&req.name, "name")?;
    let website_url = validation::normalize_website_url(&req.website_url)?;

    let project = db::projects::create_project(&state.pool, user.user_id(), name, &website_url).await?;

    Ok((
        StatusCode::CREATED,
        Json(Success::new(ProjectResponse { project })),
    ))
}

/// DELETE /api/projects/:id
pub async fn delete_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Success<Empty>>> {
    db::projects::delete_project(&state.pool, user.user_id(), id).await?;
    info!("Deleted project {} for {}", id, user.user_id());
    Ok(Json(Success::new(Empty {})))
}

// Organizations

async fn require_membership(
    state: &AppState,
    organization_id: i64,
    user: &AuthUser,
) -> Result<OrganizationMember> {
    db::organizations::get_membership(&state.pool, organization_id, user.user_id())
        .await?
        .filter(|m| m.is_active())
        .ok_or_else(|| Error::Forbidden("Not a member of this organization".to_string()))
}

async fn require_manager(state: &AppState, organization_id: i64, user: &AuthUser) -> Result<()> {
    let membership = require_membership(state, organization_id, user).await?;
    if !membership.can_manage() {
        return Err(Error::Forbidden(
            "Organization owner or admin role required".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/organizations - Organizations the caller belongs to
pub async fn list_organizations(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Success<OrganizationsResponse>>> {
    let organizations =
        db::organizations::list_organizations_for_user(&state.pool, user.user_id()).await?;
    Ok(Json(Success::new(OrganizationsResponse { organizations })))
}

/// POST /api/organizations - Create an organization owned by the caller
pub async fn create_organization(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<Success<OrganizationResponse>>)> {
    let name = validation::require(&req.name, "name")?;
    let organization =
        db::organizations::create_organization(&state.pool, name, user.user_id()).await?;

    Ok((
        StatusCode::CREATED,
        Json(Success::new(OrganizationResponse { organization })),
    ))
}

/// GET /api/organizations/:id/members
pub async fn list_members(
    State(state): State<AppState>,
    user: AuthUser,
    Path(organization_id): Path<i64>,
) -> Result<Json<Success<MembersResponse>>> {
    require_membership(&state, organization_id, &user).await?;
    let members = db::organizations::list_members(&state.pool, organization_id).await?;
    Ok(Json(Success::new(MembersResponse { members })))
}

/// POST /api/organizations/:id/members
pub async fn add_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path(organization_id): Path<i64>,
    Json(req): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<Success<MemberResponse>>)> {
    require_manager(&state, organization_id, &user).await?;

    if req.role != ORG_ROLE_ADMIN && req.role != ORG_ROLE_MEMBER {
        return Err(Error::Validation("role must be admin or member".to_string()));
    }
    validation::validate_email(&req.email)?;

    let profile = db::profiles::get_profile_by_email(&state.pool, &req.email)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No user with email {}", req.email.trim())))?;

    let member =
        db::organizations::add_member(&state.pool, organization_id, &profile.id, &req.role).await?;

    Ok((
        StatusCode::CREATED,
        Json(Success::new(MemberResponse { member })),
    ))
}

/// POST /api/organizations/:id/members/:member_id/deactivate
pub async fn deactivate_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path((organization_id, member_id)): Path<(i64, i64)>,
) -> Result<Json<Success<MemberResponse>>> {
    require_manager(&state, organization_id, &user).await?;
    let member =
        db::organizations::deactivate_member(&state.pool, organization_id, member_id).await?;
    Ok(Json(Success::new(MemberResponse { member })))
}

// Navigation and admin

/// GET /api/navigation - Entries the caller's role may see
pub async fn get_navigation(user: AuthUser) -> Result<Json<Success<NavigationResponse>>> {
    let entries = navigation::entries_for(&user.profile.role)
        .into_iter()
        .map(NavItem::from)
        .collect();

    Ok(Json(Success::new(NavigationResponse {
        role: user.profile.role,
        entries,
    })))
}

/// POST /api/admin/scheduler/run - Run one scheduler cycle now
pub async fn run_scheduler(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<Success<CycleResponse>>> {
    info!("Scheduler cycle triggered by {}", admin.user_id());
    let report = state.scheduler.run_cycle(utils::now()).await?;
    Ok(Json(Success::new(CycleResponse { report })))
}

// Health

/// GET /health - Health check endpoint
pub async fn health_check() -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

/// GET /ready - Readiness check endpoint
pub async fn readiness_check(State(state): State<AppState>) -> Result<Json<ReadinessResponse>> {
    // Check database connectivity
    let db_healthy = sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok();

    Ok(Json(ReadinessResponse {
        ready: db_healthy,
        database: if db_healthy { "ok" } else { "error" }.to_string(),
        scheduler: if state.settings.scheduler.enabled {
            "enabled"
        } else {
            "disabled"
        }
        .to_string(),
    }))
}
