// Completion-backed optimization of a scanned page

use crate::analyzer::Analysis;
use crate::completion::{self, prompts, CompletionClient, CompletionRequest};
use crate::db::{self, models::*, DbPool};
use crate::usage::{UsageKind, UsageTracker};
use crate::utils;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationTrigger {
    Manual,
    Scheduled,
}

impl OptimizationTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            OptimizationTrigger::Manual => TRIGGER_MANUAL,
            OptimizationTrigger::Scheduled => TRIGGER_SCHEDULED,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizationTarget {
    pub user_id: String,
    pub website_url: String,
    pub analysis: Analysis,
    pub trigger: OptimizationTrigger,
}

#[async_trait]
pub trait Optimizer: Send + Sync {
    async fn optimize(&self, target: &OptimizationTarget) -> Result<OptimizationRecord>;
}

#[derive(Debug, Default, Deserialize)]
struct Suggestion {
    meta_title: Option<String>,
    meta_description: Option<String>,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    addressed_issues: Vec<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Issue codes the changes fix: what the model claims, limited to what the
/// page actually has, plus the title/description checks a replacement tag covers
fn addressed_codes(analysis: &Analysis, changes: &OptimizationChanges) -> BTreeSet<String> {
    let present = analysis.issue_codes();
    let mut addressed: BTreeSet<String> = changes
        .addressed_issues
        .iter()
        .filter(|code| present.contains(*code))
        .cloned()
        .collect();

    for code in &present {
        let covered = (changes.meta_title.is_some() && code.starts_with("title_"))
            || (changes.meta_description.is_some() && code.starts_with("meta_desc_"));
        if covered {
            addressed.insert(code.clone());
        }
    }

    addressed
}

pub fn snapshot(analysis: &Analysis) -> MetricsSnapshot {
    MetricsSnapshot {
        seo_score: analysis.seo_score,
        issue_count: analysis.issues.len(),
        issue_codes: analysis.issue_codes().into_iter().collect(),
    }
}

/// Metrics expected once the addressed issues are fixed. The score regains
/// each addressed issue's points, capped at 100.
pub fn project_after(analysis: &Analysis, addressed: &BTreeSet<String>) -> MetricsSnapshot {
    let regained: i64 = analysis
        .issues
        .iter()
        .filter(|issue| addressed.contains(&issue.code))
        .map(|issue| issue.points_lost)
        .sum();

    let remaining: Vec<String> = analysis
        .issue_codes()
        .into_iter()
        .filter(|code| !addressed.contains(code))
        .collect();

    MetricsSnapshot {
        seo_score: (analysis.seo_score + regained).min(100),
        issue_count: analysis
            .issues
            .iter()
            .filter(|issue| !addressed.contains(&issue.code))
            .count(),
        issue_codes: remaining,
    }
}

pub struct CompletionOptimizer {
    pool: DbPool,
    completion: CompletionClient,
    usage: UsageTracker,
}

impl CompletionOptimizer {
    pub fn new(pool: DbPool, completion: CompletionClient, usage: UsageTracker) -> Self {
        Self {
            pool,
            completion,
            usage,
        }
    }

    async fn suggest(&self, target: &OptimizationTarget) -> Result<OptimizationChanges> {
        let request = CompletionRequest::new(
            prompts::seo_system(),
            prompts::optimize_page(
                &target.website_url,
                target.analysis.seo_score,
                &target.analysis.issues,
            ),
        )
        .json()
        .temperature(0.3);

        let text = self.completion.complete(&request).await?;
        let suggestion: Suggestion = completion::parse_json_reply(&text).ok_or_else(|| {
            Error::Internal("Completion service returned an unreadable suggestion".to_string())
        })?;

        let mut changes = OptimizationChanges {
            meta_title: non_blank(suggestion.meta_title),
            meta_description: non_blank(suggestion.meta_description),
            recommendations: suggestion
                .recommendations
                .into_iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
            addressed_issues: suggestion.addressed_issues,
        };
        changes.addressed_issues = addressed_codes(&target.analysis, &changes)
            .into_iter()
            .collect();

        Ok(changes)
    }
}

#[async_trait]
impl Optimizer for CompletionOptimizer {
    async fn optimize(&self, target: &OptimizationTarget) -> Result<OptimizationRecord> {
        let now = utils::now();
        self.usage
            .ensure_within_limit(&target.user_id, UsageKind::Optimizations, now)
            .await?;

        let changes = self.suggest(target).await?;
        let addressed: BTreeSet<String> = changes.addressed_issues.iter().cloned().collect();

        let record = db::optimizations::insert_optimization(
            &self.pool,
            &NewOptimizationRecord {
                user_id: target.user_id.clone(),
                website_url: target.website_url.clone(),
                trigger_source: target.trigger.as_str().to_string(),
                before_metrics: snapshot(&target.analysis),
                after_metrics: project_after(&target.analysis, &addressed),
                changes,
            },
        )
        .await?;

        self.usage
            .increment(&target.user_id, UsageKind::Optimizations, now)
            .await?;

        info!(
            "Optimization {} for {} ({}): {} -> {}",
            record.id,
            target.website_url,
            target.trigger.as_str(),
            record.before_metrics.0.seo_score,
            record.after_metrics.0.seo_score
        );

        Ok(record)
    }
}
