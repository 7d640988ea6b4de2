//! Session shell and dashboard controller.
//!
//! The shell resolves who is signed in, relays their notifications, and
//! carries out logout and withdrawal. The dashboard controller builds on it
//! to produce role-specific views and to decide which change signals
//! warrant a re-read. [`LiveDashboard`] keeps a dashboard in sync with a
//! store file written by other processes.

pub mod dashboard;
pub mod session;
pub mod watch;

pub use dashboard::{Dashboard, DashboardSettings, DashboardSnapshot, DashboardView};
pub use session::{SessionShell, WithdrawOutcome, WITHDRAWAL_PROMPT};
pub use watch::LiveDashboard;

use serde::Serialize;
use std::fmt;

/// Screens the dashboard can send the admin to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Navigation {
    /// Login / landing screen.
    Entry,
    Profile,
    /// Super admins only.
    SystemSettings,
    /// Full list of processed requests.
    RequestList,
}

impl Navigation {
    pub fn path(&self) -> &'static str {
        match self {
            Navigation::Entry => "/admin",
            Navigation::Profile => "/admin/profile",
            Navigation::SystemSettings => "/admin/settings",
            Navigation::RequestList => "/admin/requests",
        }
    }
}

impl fmt::Display for Navigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Entries of the profile dropdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuItem {
    Profile,
    SystemSettings,
    Withdraw,
    Logout,
}

impl MenuItem {
    pub fn label(&self) -> &'static str {
        match self {
            MenuItem::Profile => "Profile settings",
            MenuItem::SystemSettings => "System settings",
            MenuItem::Withdraw => "Withdraw account",
            MenuItem::Logout => "Log out",
        }
    }

    /// Where the item links to, for items that are plain links.
    pub fn target(&self) -> Option<Navigation> {
        match self {
            MenuItem::Profile => Some(Navigation::Profile),
            MenuItem::SystemSettings => Some(Navigation::SystemSettings),
            MenuItem::Withdraw | MenuItem::Logout => None,
        }
    }
}
