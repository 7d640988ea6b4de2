//! Live dashboard over a store file shared with other processes.
//!
//! Wires a [`FileWatcher`] and the view's own [`SignalBus`] into a
//! [`Dashboard`]. Signals arriving in one step are handled as one batch, so
//! a step reloads the store at most once.

use super::{Dashboard, DashboardSettings, DashboardView, Navigation};
use crate::error::{ShellError, StoreError};
use crate::signals::{Signal, SignalBus};
use crate::store::{FileStore, FileWatcher};
use chrono::{DateTime, FixedOffset};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// A dashboard kept in sync with a [`FileStore`].
#[derive(Debug)]
pub struct LiveDashboard {
    dashboard: Dashboard<FileStore>,
    watcher: FileWatcher,
    bus: SignalBus<'static>,
    pending: Rc<RefCell<Vec<Signal>>>,
    reloads: usize,
}

impl LiveDashboard {
    pub fn new(store: FileStore, settings: DashboardSettings) -> Result<Self, StoreError> {
        let watcher = FileWatcher::new(store.path())?;

        let pending = Rc::new(RefCell::new(Vec::new()));
        let queue = Rc::clone(&pending);
        let mut bus = SignalBus::new();
        bus.subscribe(Dashboard::<FileStore>::watched_keys(), move |signal| {
            queue.borrow_mut().push(signal.clone())
        });

        Ok(Self {
            dashboard: Dashboard::new(store, settings),
            watcher,
            bus,
            pending,
            reloads: 0,
        })
    }

    /// Initial render.
    pub fn load(&mut self, now: DateTime<FixedOffset>) -> Result<DashboardView, StoreError> {
        self.dashboard.load(now)
    }

    /// Check the store file for writes by other processes.
    ///
    /// Returns the new view if anything the dashboard reads has changed.
    pub fn poll(&mut self, now: DateTime<FixedOffset>) -> Result<Option<DashboardView>, StoreError> {
        for signal in self.watcher.poll()? {
            if self.bus.publish(&signal) == 0 {
                debug!("No listener for {}", signal);
            }
        }
        self.flush(now)
    }

    /// The view regained focus; always reloads.
    pub fn focus(&mut self, now: DateTime<FixedOffset>) -> Result<Option<DashboardView>, StoreError> {
        self.bus.publish(&Signal::FocusRegained);
        self.flush(now)
    }

    /// Log out from this view. The in-tab signal goes through this view's
    /// bus, so the dashboard reloads and lands on the redirect.
    pub fn logout(
        &mut self,
        now: DateTime<FixedOffset>,
    ) -> Result<(Navigation, Option<DashboardView>), ShellError> {
        let to = self.dashboard.shell_mut().logout(&mut self.bus)?;
        self.watcher.resync()?;
        Ok((to, self.flush(now)?))
    }

    /// Number of reloads triggered by signals since creation.
    pub fn reloads(&self) -> usize {
        self.reloads
    }

    fn flush(&mut self, now: DateTime<FixedOffset>) -> Result<Option<DashboardView>, StoreError> {
        let batch: Vec<Signal> = self.pending.borrow_mut().drain(..).collect();
        let view = self.dashboard.handle_signals(&batch, now)?;
        if view.is_some() {
            self.reloads += 1;
        }
        Ok(view)
    }
}
