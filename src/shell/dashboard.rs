//! Dashboard controller: session shell plus aggregated statistics.

use super::{MenuItem, Navigation, SessionShell};
use crate::analysis::{load_dashboard, AggregationContext, MonthScope, DEFAULT_RECENT_LIMIT};
use crate::error::StoreError;
use crate::models::{DashboardStats, Identity, ProcessedRequest};
use crate::signals::{KeyFilter, Signal};
use crate::store::{keys, KeyValueStore};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Presentation settings for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSettings {
    pub month_scope: MonthScope,
    pub recent_limit: usize,
    /// Name shown when the admin has neither a name nor a user id.
    pub fallback_display_name: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            month_scope: MonthScope::default(),
            recent_limit: DEFAULT_RECENT_LIMIT,
            fallback_display_name: "Admin".to_string(),
        }
    }
}

/// Everything needed to render the dashboard once.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub identity: Identity,
    pub display_name: String,
    pub role_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    pub stats: DashboardStats,
    pub recent_requests: Vec<ProcessedRequest>,
    pub notifications: Vec<Value>,
    pub menu: Vec<MenuItem>,
    pub generated_at: DateTime<FixedOffset>,
}

/// What the dashboard should show.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardView {
    /// Nobody is signed in; go elsewhere instead of rendering.
    Redirect(Navigation),
    Ready(Box<DashboardSnapshot>),
}

/// Role-aware dashboard over a store.
#[derive(Debug)]
pub struct Dashboard<S> {
    shell: SessionShell<S>,
    settings: DashboardSettings,
}

impl<S: KeyValueStore> Dashboard<S> {
    pub fn new(store: S, settings: DashboardSettings) -> Self {
        Self {
            shell: SessionShell::new(store),
            settings,
        }
    }

    /// Every key the dashboard reads.
    pub fn watched_keys() -> KeyFilter {
        KeyFilter::new(keys::ALL)
    }

    pub fn shell(&self) -> &SessionShell<S> {
        &self.shell
    }

    pub fn shell_mut(&mut self) -> &mut SessionShell<S> {
        &mut self.shell
    }

    /// Read everything and build the view as of `now`.
    pub fn load(&mut self, now: DateTime<FixedOffset>) -> Result<DashboardView, StoreError> {
        self.shell.refresh()?;

        let Some(identity) = self.shell.identity() else {
            debug!("No admin signed in, redirecting to {}", Navigation::Entry);
            return Ok(DashboardView::Redirect(Navigation::Entry));
        };

        let ctx = AggregationContext {
            now,
            month_scope: self.settings.month_scope,
            recent_limit: self.settings.recent_limit,
        };
        let data = load_dashboard(self.shell.store(), identity, &ctx)?;

        Ok(DashboardView::Ready(Box::new(DashboardSnapshot {
            identity: identity.clone(),
            display_name: identity
                .display_name(&self.settings.fallback_display_name)
                .to_string(),
            role_label: identity.role_label().to_string(),
            contact: identity.contact().map(str::to_string),
            stats: data.stats,
            recent_requests: data.recent_requests,
            notifications: self.shell.notifications().to_vec(),
            menu: self.shell.menu(),
            generated_at: now,
        })))
    }

    /// Reload if `signal` concerns any key the dashboard reads.
    ///
    /// Returns `None` when the signal was ignored.
    pub fn handle_signal(
        &mut self,
        signal: &Signal,
        now: DateTime<FixedOffset>,
    ) -> Result<Option<DashboardView>, StoreError> {
        self.handle_signals(std::slice::from_ref(signal), now)
    }

    /// Reload at most once for a batch of signals, and only if one of them
    /// concerns a key the dashboard reads.
    pub fn handle_signals(
        &mut self,
        signals: &[Signal],
        now: DateTime<FixedOffset>,
    ) -> Result<Option<DashboardView>, StoreError> {
        let filter = Self::watched_keys();
        let Some(trigger) = signals.iter().find(|s| filter.matches(s)) else {
            if !signals.is_empty() {
                debug!("Ignoring {} unrelated signal(s)", signals.len());
            }
            return Ok(None);
        };
        debug!("Reloading after {} ({} signal(s) in batch)", trigger, signals.len());
        self.load(now).map(Some)
    }
}
