use axum::http::{header, HeaderValue, Method};
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::time::Duration;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

#[cfg(not(test))]
use {
    std::net::IpAddr,
    std::sync::Arc,
    tower_governor::{governor::GovernorConfigBuilder, key_extractor::KeyExtractor, GovernorLayer},
    tracing::warn,
};

use crate::api::handlers::{self, AppState};
use crate::config::Settings;

/// Create the router with every API endpoint plus health checks
#[cfg_attr(test, allow(unused_variables))]
pub fn create_router(state: AppState, settings: &Settings) -> Router {
    #[cfg_attr(test, allow(unused_mut))]
    let mut api_routes = Router::new()
        // Scans
        .route("/scan", post(handlers::scan_now))
        .route("/results", get(handlers::list_results))
        .route("/results/:id", get(handlers::get_result))
        .route("/comparisons", get(handlers::list_comparisons))
        // Scheduled scans
        .route(
            "/scheduled-scans",
            get(handlers::list_scheduled_scans).post(handlers::create_scheduled_scan),
        )
        .route(
            "/scheduled-scans/:id",
            patch(handlers::update_scheduled_scan).delete(handlers::delete_scheduled_scan),
        )
        // Optimizations
        .route("/optimize", post(handlers::optimize))
        .route("/optimizations", get(handlers::list_optimizations))
        .route(
            "/optimizations/:id/rollback",
            post(handlers::rollback_optimization),
        )
        // Usage
        .route("/usage", get(handlers::get_usage))
        .route("/usage/increment", post(handlers::increment_usage))
        // Publishing and AI
        .route("/publish", post(handlers::publish))
        .route("/ai/rewrite", post(handlers::ai_rewrite))
        // API tokens
        .route(
            "/tokens",
            get(handlers::list_tokens).post(handlers::create_token),
        )
        .route("/tokens/:id", delete(handlers::revoke_token))
        // Projects
        .route(
            "/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route("/projects/:id", delete(handlers::delete_project))
        // Organizations
        .route(
            "/organizations",
            get(handlers::list_organizations).post(handlers::create_organization),
        )
        .route(
            "/organizations/:id/members",
            get(handlers::list_members).post(handlers::add_member),
        )
        .route(
            "/organizations/:id/members/:member_id/deactivate",
            post(handlers::deactivate_member),
        )
        // Navigation and admin
        .route("/navigation", get(handlers::get_navigation))
        .route("/admin/scheduler/run", post(handlers::run_scheduler))
        .with_state(state.clone());

    // Per-IP rate limiting sits in front of the per-token limit.
    // Behind a reverse proxy, have the proxy set X-Real-IP and switch to
    // SmartIpKeyExtractor.
    #[cfg(not(test))]
    {
        #[derive(Clone, Copy, Debug)]
        struct FallbackIpKeyExtractor;

        impl KeyExtractor for FallbackIpKeyExtractor {
            type Key = IpAddr;

            fn extract<B>(
                &self,
                req: &axum::http::Request<B>,
            ) -> Result<Self::Key, tower_governor::GovernorError> {
                if let Some(axum::extract::ConnectInfo(addr)) = req
                    .extensions()
                    .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
                {
                    return Ok(addr.ip());
                }

                // Local development without connect info
                Ok(IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)))
            }
        }

        let governor_conf = GovernorConfigBuilder::default()
            .key_extractor(FallbackIpKeyExtractor)
            .per_second(settings.server.api_rate_limit)
            .burst_size(settings.server.api_rate_limit as u32 * 2)
            .finish();

        match governor_conf {
            Some(config) => {
                api_routes = api_routes.layer(GovernorLayer {
                    config: Arc::new(config),
                });
            }
            None => warn!("Invalid API rate limit settings; per-IP limiting disabled"),
        }
    }

    let api_routes = api_routes;

    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state);

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(CookieManagerLayer::new())
        .layer(
            // Request body size limit - prevent memory exhaustion from large payloads
            RequestBodyLimitLayer::new(settings.server.max_request_body_size),
        )
        .layer(
            CorsLayer::new()
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
                .allow_origin(tower_http::cors::Any)
                .max_age(Duration::from_secs(3600)),
        )
        .layer(
            // Security headers
            SetResponseHeaderLayer::if_not_present(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
        )
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        ))
        .layer(
            // HSTS - enforce HTTPS (only if served over HTTPS)
            SetResponseHeaderLayer::if_not_present(
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static("max-age=31536000; includeSubDomains"),
            ),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{Analysis, SiteAnalyzer};
    use crate::notifier::LogNotifier;
    use crate::Result;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    struct NoopAnalyzer;

    #[async_trait]
    impl SiteAnalyzer for NoopAnalyzer {
        async fn analyze(&self, _url: &str) -> Result<Analysis> {
            Ok(Analysis {
                seo_score: 100,
                issues: vec![],
            })
        }
    }

    async fn create_test_state() -> AppState {
        let pool = crate::db::init_memory_pool().await.unwrap();
        AppState::new(
            pool,
            Settings::for_memory_database(),
            Arc::new(NoopAnalyzer),
            Arc::new(LogNotifier),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_health_routes_exist() {
        let state = create_test_state().await;
        let app = create_router(state.clone(), &state.settings);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
    }

    #[tokio::test]
    async fn test_api_requires_authentication() {
        let state = create_test_state().await;
        let app = create_router(state.clone(), &state.settings);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/usage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
