//! Dashboard statistics.
//!
//! Reads the store's collections and reduces them to the counters shown on
//! the dashboard, following the signed-in admin's role. Each collection is
//! read on its own; the set as a whole may straddle a concurrent write from
//! another tab.

use crate::error::StoreError;
use crate::models::{
    Admin, Certificate, CertificateRequest, DashboardStats, Identity, ProcessedRequest,
};
use crate::store::{keys, read_collection, read_raw_collection, KeyValueStore};
use chrono::{DateTime, Datelike, FixedOffset};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use tracing::debug;

/// Number of processed requests shown on the dashboard.
pub const DEFAULT_RECENT_LIMIT: usize = 7;

/// How "issued this month" is decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MonthScope {
    /// Same year and month as now.
    #[default]
    CalendarMonth,
    /// Same month of any year.
    MonthOfYear,
}

/// Inputs to a single aggregation pass.
#[derive(Debug, Clone)]
pub struct AggregationContext {
    /// Current time in the viewer's local offset.
    pub now: DateTime<FixedOffset>,
    pub month_scope: MonthScope,
    pub recent_limit: usize,
}

impl AggregationContext {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now,
            month_scope: MonthScope::default(),
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }

    pub fn offset(&self) -> &FixedOffset {
        self.now.offset()
    }

    fn is_today(&self, at: &DateTime<FixedOffset>) -> bool {
        at.date_naive() == self.now.date_naive()
    }

    fn is_this_month(&self, at: &DateTime<FixedOffset>) -> bool {
        match self.month_scope {
            MonthScope::CalendarMonth => {
                at.year() == self.now.year() && at.month() == self.now.month()
            }
            MonthScope::MonthOfYear => at.month() == self.now.month(),
        }
    }
}

/// Everything the dashboard shows besides the identity itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub stats: DashboardStats,
    pub recent_requests: Vec<ProcessedRequest>,
}

/// Compute stats and the recent request table for `identity`.
pub fn load_dashboard<S>(
    store: &S,
    identity: &Identity,
    ctx: &AggregationContext,
) -> Result<DashboardData, StoreError>
where
    S: KeyValueStore + ?Sized,
{
    Ok(DashboardData {
        stats: compute_stats(store, identity, ctx)?,
        recent_requests: recent_processed_requests(store, ctx)?,
    })
}

/// Compute the counters for `identity`'s role.
pub fn compute_stats<S>(
    store: &S,
    identity: &Identity,
    ctx: &AggregationContext,
) -> Result<DashboardStats, StoreError>
where
    S: KeyValueStore + ?Sized,
{
    match identity {
        Identity::SuperAdmin(_) => super_admin_stats(store, ctx),
        Identity::InstitutionAdmin { institution_id, .. } => {
            institution_admin_stats(store, identity.user_id(), institution_id.as_deref(), ctx)
        }
    }
}

/// System-wide counters.
pub fn super_admin_stats<S>(
    store: &S,
    ctx: &AggregationContext,
) -> Result<DashboardStats, StoreError>
where
    S: KeyValueStore + ?Sized,
{
    let institutions = read_raw_collection(store, keys::INSTITUTIONS)?;
    let admins: Vec<Admin> = read_collection(store, keys::ADMINS)?;
    let certificates: Vec<Certificate> = read_collection(store, keys::CERTIFICATES)?;

    let (today_issued, monthly_issued) = issuance_counts(certificates.iter(), ctx);

    let stats = DashboardStats {
        total_institutions: institutions.len(),
        total_admins: admins.len(),
        pending_admins: admins.iter().filter(|a| !a.is_approved()).count(),
        total_certificates: certificates.len(),
        today_issued,
        monthly_issued,
        ..DashboardStats::default()
    };
    debug!("Super admin stats: {:?}", stats);
    Ok(stats)
}

/// Counters scoped to the certificates `user_id` issued and the requests of
/// `institution_id`.
pub fn institution_admin_stats<S>(
    store: &S,
    user_id: Option<&str>,
    institution_id: Option<&str>,
    ctx: &AggregationContext,
) -> Result<DashboardStats, StoreError>
where
    S: KeyValueStore + ?Sized,
{
    let certificates: Vec<Certificate> = read_collection(store, keys::CERTIFICATES)?;
    let mine: Vec<&Certificate> = match user_id {
        Some(user_id) => certificates
            .iter()
            .filter(|c| c.issuer_id.as_deref() == Some(user_id))
            .collect(),
        None => Vec::new(),
    };

    let (today_issued, monthly_issued) = issuance_counts(mine.iter().copied(), ctx);

    let stats = DashboardStats {
        my_certificates: mine.len(),
        today_issued,
        monthly_issued,
        pending_requests: count_pending_requests(store, institution_id)?,
        ..DashboardStats::default()
    };
    debug!("Institution admin stats: {:?}", stats);
    Ok(stats)
}

/// Pending issue and revoke requests, summed.
///
/// Issue requests come from the admin queue, or from the legacy
/// `certificateRequests` key when the queue has never been written. Only
/// requests whose institution id equals `institution_id` count; a missing id
/// matches only a missing id.
pub fn count_pending_requests<S>(store: &S, institution_id: Option<&str>) -> Result<usize, StoreError>
where
    S: KeyValueStore + ?Sized,
{
    let issue_key = if store.get(keys::ADMIN_CERTIFICATE_REQUESTS)?.is_some() {
        keys::ADMIN_CERTIFICATE_REQUESTS
    } else {
        keys::CERTIFICATE_REQUESTS
    };

    let mut pending = 0;
    for key in [issue_key, keys::ADMIN_REVOKE_REQUESTS] {
        let requests: Vec<CertificateRequest> = read_collection(store, key)?;
        pending += requests
            .iter()
            .filter(|r| r.is_pending())
            .filter(|r| r.institution_id.as_deref() == institution_id)
            .count();
    }
    Ok(pending)
}

/// The most recently decided requests, newest first.
pub fn recent_processed_requests<S>(
    store: &S,
    ctx: &AggregationContext,
) -> Result<Vec<ProcessedRequest>, StoreError>
where
    S: KeyValueStore + ?Sized,
{
    let mut requests: Vec<ProcessedRequest> =
        read_collection(store, keys::ADMIN_PROCESSED_REQUESTS)?;
    sort_by_recency(&mut requests, ctx.offset());
    requests.truncate(ctx.recent_limit);
    Ok(requests)
}

/// Stable sort, newest decision first. Requests without a parseable
/// timestamp go last.
pub fn sort_by_recency(requests: &mut [ProcessedRequest], offset: &FixedOffset) {
    requests.sort_by_cached_key(|r| Reverse(r.decided_at(offset)));
}

fn issuance_counts<'a, I>(certificates: I, ctx: &AggregationContext) -> (usize, usize)
where
    I: Iterator<Item = &'a Certificate>,
{
    let mut today = 0;
    let mut month = 0;
    for issued_at in certificates.filter_map(|c| c.issued_at(ctx.offset())) {
        if ctx.is_today(&issued_at) {
            today += 1;
        }
        if ctx.is_this_month(&issued_at) {
            month += 1;
        }
    }
    (today, month)
}
