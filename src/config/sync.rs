use crate::config::plans::{PlanConfig, PlanEntry};
use crate::db::{self, models::PlanLimits, DbPool};
use crate::error::Result;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Report of plan synchronization results
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    /// Plans missing from the config that profiles still reference
    pub retained: usize,
    pub unchanged: usize,
    pub errors: Vec<String>,
}

impl SyncReport {
    pub fn log_summary(&self) {
        info!(
            "Plan sync completed: {} added, {} updated, {} removed, {} retained, {} unchanged, {} errors",
            self.added,
            self.updated,
            self.removed,
            self.retained,
            self.unchanged,
            self.errors.len()
        );

        if !self.errors.is_empty() {
            warn!("Sync errors:");
            for error in &self.errors {
                warn!("  - {}", error);
            }
        }
    }
}

fn limits_match(existing: &PlanLimits, entry: &PlanEntry) -> bool {
    existing.scans_limit == entry.scans
        && existing.optimizations_limit == entry.optimizations
        && existing.ai_rewrites_limit == entry.ai_rewrites
}

/// Synchronize plan limits from configuration to the database
pub async fn sync_plans_from_config(pool: &DbPool, config: &PlanConfig) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    info!("Starting plan sync: {} plans configured", config.plans.len());

    let mut existing_by_name: HashMap<String, PlanLimits> = db::plans::list_plan_limits(pool)
        .await?
        .into_iter()
        .map(|p| (p.plan.clone(), p))
        .collect();

    debug!("Loaded {} existing plans from database", existing_by_name.len());

    for entry in &config.plans {
        let existing = existing_by_name.remove(&entry.name);

        if let Some(ref existing) = existing {
            if limits_match(existing, entry) {
                report.unchanged += 1;
                continue;
            }
        }

        match db::plans::upsert_plan_limits(
            pool,
            &entry.name,
            entry.scans,
            entry.optimizations,
            entry.ai_rewrites,
        )
        .await
        {
            Ok(_) if existing.is_some() => {
                debug!("Updated plan limits: {}", entry.name);
                report.updated += 1;
            }
            Ok(_) => {
                debug!("Added plan: {}", entry.name);
                report.added += 1;
            }
            Err(e) => {
                let error_msg = format!("Failed to sync plan '{}': {}", entry.name, e);
                warn!("{}", error_msg);
                report.errors.push(error_msg);
            }
        }
    }

    // Whatever is left in the map is no longer configured
    for plan in existing_by_name.into_keys() {
        match remove_stale_plan(pool, &plan).await {
            Ok(true) => {
                info!("Removed plan no longer in config: {}", plan);
                report.removed += 1;
            }
            Ok(false) => {
                warn!("Plan '{}' is not configured but still has profiles; keeping it", plan);
                report.retained += 1;
            }
            Err(e) => {
                let error_msg = format!("Failed to remove plan '{plan}': {e}");
                warn!("{}", error_msg);
                report.errors.push(error_msg);
            }
        }
    }

    report.log_summary();
    Ok(report)
}

async fn remove_stale_plan(pool: &DbPool, plan: &str) -> Result<bool> {
    if db::profiles::count_profiles_on_plan(pool, plan).await? > 0 {
        return Ok(false);
    }
    db::plans::delete_plan_limits(pool, plan).await?;
    Ok(true)
}
