// Background rescans of scheduled websites

pub mod policy;

use crate::analyzer::{Analysis, SiteAnalyzer};
use crate::config::SchedulerConfig;
use crate::db::{self, models::*, DbPool};
use crate::notifier::{AlertNotifier, ScanAlert};
use crate::optimizer::{OptimizationTarget, OptimizationTrigger, Optimizer};
use crate::{utils, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Totals for one pass over the due rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub due: usize,
    pub processed: usize,
    /// Rows another run held the lease on
    pub skipped: usize,
    pub failed: usize,
    pub alerts_sent: usize,
    pub optimizations_triggered: usize,
}

impl CycleReport {
    pub fn log_summary(&self) {
        info!(
            "Scan cycle complete: {} due, {} processed, {} skipped, {} failed, {} alerts, {} optimizations",
            self.due,
            self.processed,
            self.skipped,
            self.failed,
            self.alerts_sent,
            self.optimizations_triggered
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanOutcome {
    Processed {
        alert_sent: bool,
        optimization_triggered: bool,
    },
    Skipped,
}

/// What a successful rescan produced
struct Rescan {
    analysis: Analysis,
    comparison: ScanComparison,
}

pub struct Scheduler {
    pool: DbPool,
    analyzer: Arc<dyn SiteAnalyzer>,
    notifier: Arc<dyn AlertNotifier>,
    optimizer: Arc<dyn Optimizer>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        pool: DbPool,
        analyzer: Arc<dyn SiteAnalyzer>,
        notifier: Arc<dyn AlertNotifier>,
        optimizer: Arc<dyn Optimizer>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            pool,
            analyzer,
            notifier,
            optimizer,
            config,
        }
    }

    /// Start the scheduler in the background
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Scan scheduler started with interval: {}s",
                self.config.interval_seconds
            );

            let mut ticker = interval(std::time::Duration::from_secs(
                self.config.interval_seconds,
            ));

            loop {
                ticker.tick().await;

                debug!("Scheduler tick: checking for due scans");

                if let Err(e) = self.run_cycle(utils::now()).await {
                    error!("Error running scan cycle: {}", e.log_safe());
                }
            }
        })
    }

    /// Process every row due at `now`, one after another
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let due = db::scheduled_scans::list_due_scans(&self.pool, now).await?;
        let mut report = CycleReport {
            due: due.len(),
            ..Default::default()
        };

        debug!("{} scheduled scans due", report.due);

        for scan in &due {
            match self.process_scan(scan, now).await {
                Ok(ScanOutcome::Processed {
                    alert_sent,
                    optimization_triggered,
                }) => {
                    report.processed += 1;
                    report.alerts_sent += usize::from(alert_sent);
                    report.optimizations_triggered += usize::from(optimization_triggered);
                }
                Ok(ScanOutcome::Skipped) => {
                    debug!("Scan {} is leased by another run, skipping", scan.id);
                    report.skipped += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        "Error processing scheduled scan {} ({}): {}",
                        scan.id,
                        scan.website_url,
                        e.log_safe()
                    );
                }
            }
        }

        report.log_summary();
        Ok(report)
    }

    async fn process_scan(&self, scan: &ScheduledScan, now: DateTime<Utc>) -> Result<ScanOutcome> {
        let lease_until = now + Duration::seconds(self.config.lease_seconds);
        if !db::scheduled_scans::claim_scan(&self.pool, scan.id, now, lease_until).await? {
            return Ok(ScanOutcome::Skipped);
        }

        let rescan = match self.rescan(scan).await {
            Ok(rescan) => rescan,
            Err(e) => {
                self.record_failure(scan, now, &e.log_safe()).await;
                return Err(e);
            }
        };

        let comparison = &rescan.comparison;
        let new_issue_count = comparison.new_issues.0.len();

        let mut alert_sent = false;
        if policy::should_alert(scan, comparison.score_change, new_issue_count) {
            let alert = ScanAlert {
                user_id: scan.user_id.clone(),
                website_url: scan.website_url.clone(),
                scheduled_scan_id: scan.id,
                previous_seo_score: comparison.previous_seo_score,
                current_seo_score: comparison.current_seo_score,
                score_change: comparison.score_change,
                new_issues: comparison.new_issues.0.clone(),
                fixed_issues: comparison.fixed_issues.0.clone(),
                scanned_at: now,
            };
            match self.notifier.notify(&alert).await {
                Ok(()) => alert_sent = true,
                Err(e) => warn!("Alert for scan {} failed: {}", scan.id, e.log_safe()),
            }
        }

        let mut optimization_triggered = false;
        if policy::should_optimize(scan, comparison.score_change) {
            optimization_triggered = true;
            let target = OptimizationTarget {
                user_id: scan.user_id.clone(),
                website_url: scan.website_url.clone(),
                analysis: rescan.analysis,
                trigger: OptimizationTrigger::Scheduled,
            };
            if let Err(e) = self.optimizer.optimize(&target).await {
                warn!(
                    "Auto-optimization for scan {} failed: {}",
                    scan.id,
                    e.log_safe()
                );
            }
        }

        let next_scan_at = now + Duration::days(scan.frequency_days);
        if let Err(e) =
            db::scheduled_scans::complete_run(&self.pool, scan.id, now, next_scan_at).await
        {
            // Release the lease through the failure path so the row is not
            // left claimed until expiry
            self.record_failure(scan, now, &e.log_safe()).await;
            return Err(e);
        }

        info!(
            "Rescanned {}: {} -> {} ({:+})",
            scan.website_url,
            comparison.previous_seo_score,
            comparison.current_seo_score,
            comparison.score_change
        );

        Ok(ScanOutcome::Processed {
            alert_sent,
            optimization_triggered,
        })
    }

    /// Analyze the site, store the result and the comparison with the last one
    async fn rescan(&self, scan: &ScheduledScan) -> Result<Rescan> {
        let previous =
            db::results::latest_result(&self.pool, &scan.user_id, &scan.website_url).await?;

        let analysis = self.analyzer.analyze(&scan.website_url).await?;

        let (previous_score, previous_codes) = match previous {
            Some(result) => (
                result.seo_score,
                result
                    .issues
                    .0
                    .iter()
                    .map(|i| i.code.clone())
                    .collect::<BTreeSet<_>>(),
            ),
            None => (0, BTreeSet::new()),
        };
        let (new_issues, fixed_issues) =
            policy::diff_issues(&previous_codes, &analysis.issue_codes());

        let (_, comparison) = db::results::insert_result_with_comparison(
            &self.pool,
            &NewScanResult {
                user_id: scan.user_id.clone(),
                website_url: scan.website_url.clone(),
                seo_score: analysis.seo_score,
                issues: analysis.issues.clone(),
            },
            &NewScanComparison {
                user_id: scan.user_id.clone(),
                website_url: scan.website_url.clone(),
                scheduled_scan_id: Some(scan.id),
                previous_seo_score: previous_score,
                current_seo_score: analysis.seo_score,
                new_issues,
                fixed_issues,
            },
        )
        .await?;

        Ok(Rescan {
            analysis,
            comparison,
        })
    }

    /// Push a failed row out by the backoff and deactivate it once it has
    /// failed too many times in a row
    async fn record_failure(&self, scan: &ScheduledScan, now: DateTime<Utc>, message: &str) {
        let failure_count = scan.failure_count + 1;
        let deactivate = failure_count >= self.config.max_failures;
        let backoff = policy::failure_backoff(
            self.config.retry_base_minutes,
            failure_count,
            scan.frequency_days,
        );

        if deactivate {
            warn!(
                "Scheduled scan {} failed {} times in a row, deactivating",
                scan.id, failure_count
            );
        }

        if let Err(e) = db::scheduled_scans::record_failure(
            &self.pool,
            scan.id,
            now,
            now + backoff,
            message,
            deactivate,
        )
        .await
        {
            error!(
                "Failed to record failure for scheduled scan {}: {}",
                scan.id,
                e.log_safe()
            );
        }
    }
}
