// Role-based navigation entries for the dashboard shell

use crate::db::models::ROLE_ADMIN;
use serde::Serialize;

/// What a role needs before an entry is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Member,
    Admin,
}

impl Capability {
    pub fn for_role(role: &str) -> Self {
        if role == ROLE_ADMIN {
            Capability::Admin
        } else {
            Capability::Member
        }
    }

    /// Admins can do everything members can
    pub fn allows(self, required: Capability) -> bool {
        self >= required
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavEntry {
    Dashboard,
    ScanHistory,
    ScheduledScans,
    Optimizations,
    Publishing,
    ApiTokens,
    Billing,
    Organization,
    AdminPanel,
    SchedulerControl,
}

impl NavEntry {
    pub const ALL: [NavEntry; 10] = [
        NavEntry::Dashboard,
        NavEntry::ScanHistory,
        NavEntry::ScheduledScans,
        NavEntry::Optimizations,
        NavEntry::Publishing,
        NavEntry::ApiTokens,
        NavEntry::Billing,
        NavEntry::Organization,
        NavEntry::AdminPanel,
        NavEntry::SchedulerControl,
    ];

    pub fn label(self) -> &'static str {
        match self {
            NavEntry::Dashboard => "Dashboard",
            NavEntry::ScanHistory => "Scan History",
            NavEntry::ScheduledScans => "Scheduled Scans",
            NavEntry::Optimizations => "Optimizations",
            NavEntry::Publishing => "Publishing",
            NavEntry::ApiTokens => "API Tokens",
            NavEntry::Billing => "Billing",
            NavEntry::Organization => "Organization",
            NavEntry::AdminPanel => "Admin",
            NavEntry::SchedulerControl => "Scheduler",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            NavEntry::Dashboard => "/dashboard",
            NavEntry::ScanHistory => "/dashboard/history",
            NavEntry::ScheduledScans => "/dashboard/scheduled",
            NavEntry::Optimizations => "/dashboard/optimizations",
            NavEntry::Publishing => "/dashboard/publishing",
            NavEntry::ApiTokens => "/dashboard/api-tokens",
            NavEntry::Billing => "/dashboard/billing",
            NavEntry::Organization => "/dashboard/organization",
            NavEntry::AdminPanel => "/admin",
            NavEntry::SchedulerControl => "/admin/scheduler",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            NavEntry::Dashboard => "layout-dashboard",
            NavEntry::ScanHistory => "history",
            NavEntry::ScheduledScans => "calendar-clock",
            NavEntry::Optimizations => "sparkles",
            NavEntry::Publishing => "send",
            NavEntry::ApiTokens => "key",
            NavEntry::Billing => "credit-card",
            NavEntry::Organization => "users",
            NavEntry::AdminPanel => "shield",
            NavEntry::SchedulerControl => "timer",
        }
    }

    pub fn required(self) -> Capability {
        match self {
            NavEntry::AdminPanel | NavEntry::SchedulerControl => Capability::Admin,
            _ => Capability::Member,
        }
    }
}

/// Serialized form sent to clients
#[derive(Debug, Clone, Serialize)]
pub struct NavItem {
    pub key: NavEntry,
    pub label: &'static str,
    pub path: &'static str,
    pub icon: &'static str,
}

impl From<NavEntry> for NavItem {
    fn from(entry: NavEntry) -> Self {
        NavItem {
            key: entry,
            label: entry.label(),
            path: entry.path(),
            icon: entry.icon(),
        }
    }
}

/// Entries visible to `role`, in declaration order
pub fn entries_for(role: &str) -> Vec<NavEntry> {
    let capability = Capability::for_role(role);
    NavEntry::ALL
        .into_iter()
        .filter(|entry| capability.allows(entry.required()))
        .collect()
}
