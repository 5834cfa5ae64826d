#![allow(dead_code)]

use async_trait::async_trait;
use seowatch::analyzer::{Analysis, SeoIssue, Severity, SiteAnalyzer};
use seowatch::config::plans::PlanConfig;
use seowatch::config::sync::sync_plans_from_config;
use seowatch::db::{self, models::*, DbPool};
use seowatch::notifier::{AlertNotifier, ScanAlert};
use seowatch::optimizer::{OptimizationTarget, Optimizer};
use seowatch::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory database with the shipped plans file synced in
pub async fn pool_with_plans() -> DbPool {
    let pool = db::init_memory_pool()
        .await
        .expect("Failed to create in-memory database");
    let config = PlanConfig::from_file("config/plans.yaml").expect("Failed to load plans");
    sync_plans_from_config(&pool, &config)
        .await
        .expect("Failed to sync plans");
    pool
}

pub async fn create_profile(pool: &DbPool, email: &str, plan: &str) -> Profile {
    db::profiles::create_profile(
        pool,
        &NewProfile {
            email: email.to_string(),
            role: ROLE_MEMBER.to_string(),
            plan: plan.to_string(),
        },
    )
    .await
    .expect("Failed to create profile")
}

pub fn issue(code: &str, points_lost: i64) -> SeoIssue {
    SeoIssue {
        code: code.to_string(),
        severity: Severity::Warning,
        message: format!("{code} detected"),
        points_lost,
    }
}

pub fn analysis(seo_score: i64, codes: &[&str]) -> Analysis {
    Analysis {
        seo_score,
        issues: codes.iter().map(|code| issue(code, 5)).collect(),
    }
}

/// Returns whatever analysis it was last given, or fails when given none
#[derive(Default)]
pub struct ScriptedAnalyzer {
    next: Mutex<Option<Analysis>>,
    calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn returning(analysis: Analysis) -> Self {
        Self {
            next: Mutex::new(Some(analysis)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SiteAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, url: &str) -> Result<Analysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.next
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Upstream {
                service: "Target site".to_string(),
                status: 503,
                details: format!("{url} is down"),
            })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub alerts: Mutex<Vec<ScanAlert>>,
}

#[async_trait]
impl AlertNotifier for RecordingNotifier {
    async fn notify(&self, alert: &ScanAlert) -> Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Records targets and declines to produce a record
#[derive(Default)]
pub struct RecordingOptimizer {
    pub targets: Mutex<Vec<OptimizationTarget>>,
}

#[async_trait]
impl Optimizer for RecordingOptimizer {
    async fn optimize(&self, target: &OptimizationTarget) -> Result<OptimizationRecord> {
        self.targets.lock().unwrap().push(target.clone());
        Err(Error::Internal("recording optimizer".to_string()))
    }
}
