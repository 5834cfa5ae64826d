use clap::Parser;
use seowatch::{
    analyzer::HttpAnalyzer,
    api::{handlers::AppState, routes},
    cli::{commands, Cli, Commands},
    config::Settings,
    db, Error, Result,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,seowatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let settings = Settings::from_env()?;
    settings.validate()?;

    match cli.command {
        Commands::Serve { port, host } => {
            serve(settings, port, host).await?;
        }
        Commands::Migrate => {
            migrate(settings).await?;
        }
        Commands::Rescan => {
            rescan(settings).await?;
        }
        Commands::Scan { url } => {
            let analyzer = HttpAnalyzer::new(&settings.analyzer)?;
            commands::scan(&analyzer, &url).await?;
        }
        Commands::CreateUser { email, plan, role } => {
            let pool = open_database(&settings).await?;
            let (profile, token) = commands::create_user(&pool, &email, &plan, &role).await?;
            println!(
                "\x1b[32m\u{2713}\x1b[0m Created {} ({}, plan {})",
                profile.email, profile.role, profile.plan
            );
            println!("  User id: {}", profile.id);
            println!(
                "  Session token (valid {} days): {}",
                commands::CLI_SESSION_DAYS,
                token
            );
        }
        Commands::SetPlan { email, plan } => {
            let pool = open_database(&settings).await?;
            let profile = commands::set_plan(&pool, &email, &plan).await?;
            println!(
                "\x1b[32m\u{2713}\x1b[0m {} is now on plan {}",
                profile.email, profile.plan
            );
        }
        Commands::SyncPlans => {
            let pool = open_database(&settings).await?;
            let report = commands::sync_plans(&pool, &settings.plans.path).await?;
            commands::print_sync_report(&report);
        }
    }

    Ok(())
}

async fn open_database(settings: &Settings) -> Result<db::DbPool> {
    let pool = db::init_pool_with_config(&settings.database).await?;
    db::run_migrations(&pool).await?;
    Ok(pool)
}

async fn serve(mut settings: Settings, port: Option<u16>, host: Option<String>) -> Result<()> {
    if let Some(port) = port {
        settings.server.port = port;
    }
    if let Some(host) = host {
        settings.server.host = host;
    }

    info!("Starting SeoWatch server");
    info!("Database: {}", settings.database.url);
    info!("Server: {}:{}", settings.server.host, settings.server.port);

    let pool = db::init_pool_with_config(&settings.database).await?;
    info!(
        "Database connection established (max_connections: {}, min_connections: {})",
        settings.database.max_connections, settings.database.min_connections
    );

    db::run_migrations(&pool).await?;
    info!("Database migrations completed");

    // A broken plans file should not keep the API down; existing rows stay in effect
    match commands::sync_plans(&pool, &settings.plans.path).await {
        Ok(report) => {
            if !report.errors.is_empty() {
                warn!(
                    "{} plan sync errors occurred - check logs for details",
                    report.errors.len()
                );
            }
        }
        Err(e) => {
            warn!(
                "Failed to sync plans from {}: {}",
                settings.plans.path.display(),
                e
            );
            warn!("Continuing with the plan limits already stored");
        }
    }

    let state = AppState::from_settings(pool, settings.clone())?;

    if !state.completion.is_configured() {
        warn!("COMPLETION_API_KEY is not set; optimization and rewrite endpoints will fail");
    }

    if settings.scheduler.enabled {
        let _scheduler_handle = Arc::clone(&state.scheduler).start();
        info!(
            "Background scheduler started (interval: {}s)",
            settings.scheduler.interval_seconds
        );
    } else {
        info!("Background scheduler disabled");
    }

    let app = routes::create_router(state, &settings);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    println!("\n========================================");
    println!("SeoWatch Server");
    println!("========================================");
    println!("Status: Running");
    println!("Address: http://{addr}");
    println!("Database: Connected");
    if settings.scheduler.enabled {
        println!(
            "Scan Scheduler: Active ({}s interval)",
            settings.scheduler.interval_seconds
        );
    } else {
        println!("Scan Scheduler: Disabled");
    }
    println!("\nAPI Endpoints:");
    println!("  POST /api/scan");
    println!("  GET  /api/results, /api/comparisons");
    println!("  GET  /api/scheduled-scans (POST, PATCH, DELETE)");
    println!("  POST /api/optimize");
    println!("  GET  /api/usage");
    println!("  POST /api/publish, /api/ai/rewrite");
    println!("\nPlan limits are managed via {}", settings.plans.path.display());
    println!("\nPress Ctrl+C to stop");
    println!("========================================\n");

    info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| Error::Internal(format!("Server error: {e}")))?;

    info!("Shutting down...");
    Ok(())
}

async fn migrate(settings: Settings) -> Result<()> {
    info!("Running database migrations");

    let pool = db::init_pool(&settings.database.url).await?;
    db::run_migrations(&pool).await?;

    println!("\x1b[32m\u{2713}\x1b[0m Database migrations completed successfully");
    Ok(())
}

async fn rescan(settings: Settings) -> Result<()> {
    let pool = open_database(&settings).await?;
    let state = AppState::from_settings(pool, settings)?;

    let report = state.scheduler.run_cycle(seowatch::utils::now()).await?;
    commands::print_cycle_report(&report);
    Ok(())
}
