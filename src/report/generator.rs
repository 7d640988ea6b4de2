//! Markdown and JSON rendering of the dashboard.

use crate::models::{DashboardStats, ProcessedRequest, RequestKind};
use crate::shell::{DashboardSnapshot, Navigation};
use anyhow::Result;
use chrono::{DateTime, FixedOffset};

/// Generate the complete Markdown dashboard.
pub fn generate_markdown_report(snapshot: &DashboardSnapshot) -> String {
    let mut output = String::new();

    output.push_str(&generate_header_section(snapshot));
    output.push_str(&generate_stats_section(
        &snapshot.stats,
        snapshot.identity.is_super_admin(),
    ));
    output.push_str(&generate_recent_requests_section(
        &snapshot.recent_requests,
        snapshot.generated_at,
    ));
    output.push_str(&generate_menu_section(snapshot));
    output.push_str(&generate_footer(snapshot.generated_at));

    output
}

/// Welcome line, role description and notification bell.
fn generate_header_section(snapshot: &DashboardSnapshot) -> String {
    let mut section = String::new();

    section.push_str(&format!("# Welcome, {}\n\n", inline(&snapshot.display_name)));
    if snapshot.identity.is_super_admin() {
        section.push_str(
            "Super admin dashboard for managing issuing institutions and their admins.\n\n",
        );
    } else {
        section.push_str("Admin dashboard for issuing and managing certificates.\n\n");
    }

    section.push_str(&format!("- **Role:** {}\n", snapshot.role_label));
    if let Some(ref contact) = snapshot.contact {
        section.push_str(&format!("- **Account:** {}\n", inline(contact)));
    }
    section.push_str(&format!(
        "- **Notifications:** {}\n\n",
        snapshot.notifications.len()
    ));

    section
}

/// Role-specific stat cards as a table.
fn generate_stats_section(stats: &DashboardStats, super_admin: bool) -> String {
    let cards: Vec<(&str, usize)> = if super_admin {
        vec![
            ("Institutions", stats.total_institutions),
            ("Admins", stats.total_admins),
            ("Awaiting approval", stats.pending_admins),
            ("Certificates issued", stats.total_certificates),
            ("Issued today", stats.today_issued),
            ("Issued this month", stats.monthly_issued),
        ]
    } else {
        vec![
            ("My certificates", stats.my_certificates),
            ("Issued today", stats.today_issued),
            ("Issued this month", stats.monthly_issued),
            ("Pending requests", stats.pending_requests),
        ]
    };

    let mut section = String::new();
    section.push_str(if super_admin {
        "## System Overview\n\n"
    } else {
        "## My Overview\n\n"
    });

    let header: Vec<&str> = cards.iter().map(|(label, _)| *label).collect();
    let values: Vec<String> = cards.iter().map(|(_, n)| n.to_string()).collect();

    section.push_str(&format!("| {} |\n", header.join(" | ")));
    section.push_str(&format!("|{}\n", ":---:|".repeat(cards.len())));
    section.push_str(&format!("| {} |\n\n", values.join(" | ")));

    section
}

/// Table of the most recently processed requests.
fn generate_recent_requests_section(
    requests: &[ProcessedRequest],
    now: DateTime<FixedOffset>,
) -> String {
    let mut section = String::new();

    section.push_str("## Recently Processed Requests\n\n");

    if requests.is_empty() {
        section.push_str("No requests have been processed yet.\n\n");
    } else {
        section.push_str("| Requester | Type | Certificate | Result | Reason | Processed |\n");
        section.push_str("|:---|:---|:---|:---|:---|:---|\n");

        for request in requests {
            let kind = request
                .request_type
                .as_deref()
                .map(|t| RequestKind::parse(t).map_or_else(|| t.to_string(), |k| k.to_string()))
                .unwrap_or_else(|| "-".to_string());
            let when = request
                .decided_at(now.offset())
                .map(|at| format_relative_time(at, now))
                .unwrap_or_else(|| "-".to_string());

            section.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                cell(request.user_name.as_deref()),
                kind,
                cell(request.certificate_name.as_deref()),
                cell(request.action.as_deref()),
                cell(request.reason.as_deref()),
                when
            ));
        }
        section.push('\n');
    }

    section.push_str(&format!(
        "[View all requests]({})\n\n",
        Navigation::RequestList.path()
    ));

    section
}

fn generate_menu_section(snapshot: &DashboardSnapshot) -> String {
    let mut section = String::new();

    section.push_str("## Account\n\n");
    for item in &snapshot.menu {
        match item.target() {
            Some(target) => section.push_str(&format!("- [{}]({})\n", item.label(), target)),
            None => section.push_str(&format!("- {}\n", item.label())),
        }
    }
    section.push('\n');

    section
}

fn generate_footer(generated_at: DateTime<FixedOffset>) -> String {
    format!(
        "---\n\n*Generated {}*\n",
        generated_at.format("%Y-%m-%d %H:%M:%S %:z")
    )
}

/// Escape a table cell; empty values render as a dash.
fn cell(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.replace('|', "\\|").replace('\n', " "),
        _ => "-".to_string(),
    }
}

/// Escape stored text for use inside a single line of Markdown.
fn inline(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\n' | '\r' => escaped.push(' '),
            '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '>' | '#' | '|' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Human-readable age of `at` relative to `now`.
pub fn format_relative_time(at: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> String {
    let seconds = (now - at).num_seconds().max(0);
    if seconds < 60 {
        return format!("{}s ago", seconds);
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    format!("{}d ago", hours / 24)
}

/// Generate a JSON report.
pub fn generate_json_report(snapshot: &DashboardSnapshot) -> Result<String> {
    serde_json::to_string_pretty(snapshot).map_err(Into::into)
}
