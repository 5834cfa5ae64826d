use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Limit value meaning "no monthly cap"
pub const UNLIMITED: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    pub version: u32,
    pub plans: Vec<PlanEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub name: String,
    pub scans: i64,
    pub optimizations: i64,
    pub ai_rewrites: i64,
}

impl PlanConfig {
    /// Load plan configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read plan config from {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_yaml(&content).map_err(|e| {
            Error::Config(format!(
                "Invalid plan config in {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: PlanConfig = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse plan config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(Error::Config(format!(
                "Unsupported config version: {}. Expected version 1",
                self.version
            )));
        }

        if self.plans.is_empty() {
            return Err(Error::Config("At least one plan is required".to_string()));
        }

        let mut seen = HashSet::new();
        for plan in &self.plans {
            if plan.name.trim().is_empty() {
                return Err(Error::Config("Plan name cannot be empty".to_string()));
            }

            if !seen.insert(plan.name.as_str()) {
                return Err(Error::Config(format!("Duplicate plan: {}", plan.name)));
            }

            for (label, value) in [
                ("scans", plan.scans),
                ("optimizations", plan.optimizations),
                ("ai_rewrites", plan.ai_rewrites),
            ] {
                if value < UNLIMITED {
                    return Err(Error::Config(format!(
                        "Plan {}: {} limit must be -1 (unlimited) or >= 0",
                        plan.name, label
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PlanEntry> {
        self.plans.iter().find(|p| p.name == name)
    }
}
