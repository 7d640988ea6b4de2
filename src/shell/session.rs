//! Signed-in identity, notifications, logout and withdrawal.

use super::{MenuItem, Navigation};
use crate::error::{ShellError, StoreError};
use crate::models::{Identity, StoredAdmin};
use crate::signals::{KeyFilter, Signal, SignalBus};
use crate::store::{keys, read_document, read_raw_collection, write_collection, KeyValueStore};
use serde_json::Value;
use tracing::{debug, info};

/// Question asked before an admin withdraws their own account.
pub const WITHDRAWAL_PROMPT: &str = "Withdraw this admin account? \
All of its data will be deleted and cannot be recovered.";

/// Result of a withdrawal attempt that was not rejected outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawOutcome {
    /// The admin declined the confirmation; nothing changed.
    Declined,
    /// The account was removed and the session ended.
    Withdrawn {
        /// Admin records removed from the `admins` collection.
        removed: usize,
        navigate: Navigation,
    },
}

/// Session state of one view over the store.
#[derive(Debug)]
pub struct SessionShell<S> {
    store: S,
    identity: Option<Identity>,
    notifications: Vec<Value>,
}

impl<S: KeyValueStore> SessionShell<S> {
    /// Create a shell over `store`. Nothing is read until [`mount`](Self::mount).
    pub fn new(store: S) -> Self {
        Self {
            store,
            identity: None,
            notifications: Vec::new(),
        }
    }

    /// Keys whose change in another tab affects the shell.
    pub fn watched_keys() -> KeyFilter {
        KeyFilter::new([keys::CURRENT_ADMIN, keys::ADMIN_NOTIFICATIONS])
    }

    /// Initial read of identity and notifications.
    pub fn mount(&mut self) -> Result<(), StoreError> {
        self.refresh()
    }

    /// Re-read identity and notifications from the store.
    pub fn refresh(&mut self) -> Result<(), StoreError> {
        self.identity = read_document::<StoredAdmin, _>(&self.store, keys::CURRENT_ADMIN)?
            .map(Identity::from_stored);

        self.notifications = if self.identity.is_some() {
            read_raw_collection(&self.store, keys::ADMIN_NOTIFICATIONS)?
        } else {
            Vec::new()
        };

        debug!(
            "Session refreshed: signed_in={}, notifications={}",
            self.identity.is_some(),
            self.notifications.len()
        );
        Ok(())
    }

    /// Re-read if `signal` concerns the shell. Returns whether it did.
    pub fn handle_signal(&mut self, signal: &Signal) -> Result<bool, StoreError> {
        if !Self::watched_keys().matches(signal) {
            return Ok(false);
        }
        self.refresh()?;
        Ok(true)
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn notifications(&self) -> &[Value] {
        &self.notifications
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Dropdown entries for the signed-in admin.
    pub fn menu(&self) -> Vec<MenuItem> {
        let Some(identity) = &self.identity else {
            return Vec::new();
        };

        let mut items = vec![MenuItem::Profile];
        if identity.is_super_admin() {
            items.push(MenuItem::SystemSettings);
        } else {
            items.push(MenuItem::Withdraw);
        }
        items.push(MenuItem::Logout);
        items
    }

    /// End the session: drop `currentAdmin`, tell the rest of this tab, and
    /// go back to the entry screen. Other keys are left alone.
    pub fn logout(&mut self, bus: &mut SignalBus<'_>) -> Result<Navigation, ShellError> {
        self.store.remove(keys::CURRENT_ADMIN)?;
        self.identity = None;
        self.notifications.clear();

        let notified = bus.publish(&Signal::AdminStateChanged);
        info!("Logged out ({} listener(s) notified)", notified);
        Ok(Navigation::Entry)
    }

    /// Remove the signed-in institution admin's own account.
    ///
    /// `confirm` is shown [`WITHDRAWAL_PROMPT`] and decides whether to go
    /// ahead. Only admin records with the same user id are removed; other
    /// records, and every other collection, are left untouched.
    pub fn withdraw<F>(&mut self, confirm: F) -> Result<WithdrawOutcome, ShellError>
    where
        F: FnOnce(&str) -> bool,
    {
        let identity = self.identity.as_ref().ok_or(ShellError::NotSignedIn)?;
        if identity.is_super_admin() {
            return Err(ShellError::WithdrawalForbidden);
        }

        if !confirm(WITHDRAWAL_PROMPT) {
            debug!("Withdrawal declined");
            return Ok(WithdrawOutcome::Declined);
        }

        let removed = match identity.user_id() {
            Some(user_id) => {
                let mut admins = read_raw_collection(&self.store, keys::ADMINS)?;
                let before = admins.len();
                admins.retain(|admin| admin.get("userId").and_then(Value::as_str) != Some(user_id));
                let removed = before - admins.len();
                if removed > 0 {
                    write_collection(&mut self.store, keys::ADMINS, &admins)?;
                }
                removed
            }
            None => 0,
        };

        self.store.remove(keys::CURRENT_ADMIN)?;
        self.identity = None;
        self.notifications.clear();

        info!("Admin account withdrawn ({} record(s) removed)", removed);
        Ok(WithdrawOutcome::Withdrawn {
            removed,
            navigate: Navigation::Entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    const INSTITUTION_ADMIN: &str =
        r#"{"userId": "kim", "name": "Kim", "role": "ADMIN", "institutionId": "inst-1"}"#;
    const SUPER_ADMIN: &str = r#"{"userId": "root", "role": "SUPER_ADMIN"}"#;

    fn store_with(current: &str) -> MemoryStore {
        MemoryStore::with_entries([
            (keys::CURRENT_ADMIN, current.to_string()),
            (
                keys::ADMIN_NOTIFICATIONS,
                json!([{"message": "New request", "read": false}]).to_string(),
            ),
            (
                keys::ADMINS,
                json!([
                    {"userId": "root", "approved": true},
                    {"userId": "kim", "approved": true, "phone": "010"},
                    {"userId": "lee", "approved": false},
                ])
                .to_string(),
            ),
            (keys::CERTIFICATES, json!([{"issuerId": "kim"}]).to_string()),
        ])
    }

    fn mounted(current: &str) -> SessionShell<MemoryStore> {
        let mut shell = SessionShell::new(store_with(current));
        shell.mount().unwrap();
        shell
    }

    #[test]
    fn test_mount_reads_identity_and_notifications() {
        let shell = mounted(INSTITUTION_ADMIN);

        assert_eq!(shell.identity().unwrap().user_id(), Some("kim"));
        assert_eq!(shell.notifications().len(), 1);
        assert_eq!(
            shell.menu(),
            vec![MenuItem::Profile, MenuItem::Withdraw, MenuItem::Logout]
        );
    }

    #[test]
    fn test_null_identity_is_signed_out() {
        let shell = mounted("null");
        assert!(shell.identity().is_none());
        assert!(shell.notifications().is_empty());
        assert!(shell.menu().is_empty());
    }

    #[test]
    fn test_super_admin_menu() {
        let shell = mounted(SUPER_ADMIN);
        assert_eq!(
            shell.menu(),
            vec![MenuItem::Profile, MenuItem::SystemSettings, MenuItem::Logout]
        );
    }

    #[test]
    fn test_logout_removes_only_identity_and_is_idempotent() {
        let mut shell = mounted(INSTITUTION_ADMIN);
        let mut notified = 0;

        let (once, twice) = {
            let mut bus = SignalBus::new();
            bus.subscribe(SessionShell::<MemoryStore>::watched_keys(), |signal| {
                assert_eq!(signal, &Signal::AdminStateChanged);
                notified += 1;
            });

            assert_eq!(shell.logout(&mut bus).unwrap(), Navigation::Entry);
            let once = shell.store().clone();
            shell.logout(&mut bus).unwrap();
            (once, shell.store().clone())
        };

        assert_eq!(notified, 2);
        assert!(shell.identity().is_none());
        assert_eq!(once.get(keys::CURRENT_ADMIN).unwrap(), None);
        assert_eq!(once.keys().unwrap(), twice.keys().unwrap());

        let original = store_with(INSTITUTION_ADMIN);
        for key in [keys::ADMIN_NOTIFICATIONS, keys::ADMINS, keys::CERTIFICATES] {
            assert_eq!(twice.get(key).unwrap(), original.get(key).unwrap());
        }
    }

    #[test]
    fn test_super_admin_withdrawal_rejected() {
        let mut shell = mounted(SUPER_ADMIN);
        let before = shell.store().get(keys::ADMINS).unwrap();

        let result = shell.withdraw(|_| panic!("confirmation must not be asked"));

        assert!(matches!(result, Err(ShellError::WithdrawalForbidden)));
        assert_eq!(shell.store().get(keys::ADMINS).unwrap(), before);
        assert!(shell.identity().is_some());
    }

    #[test]
    fn test_declined_withdrawal_is_noop() {
        let mut shell = mounted(INSTITUTION_ADMIN);
        let before = shell.store().clone();

        let outcome = shell.withdraw(|prompt| {
            assert_eq!(prompt, WITHDRAWAL_PROMPT);
            false
        });

        assert_eq!(outcome.unwrap(), WithdrawOutcome::Declined);
        assert_eq!(shell.store().keys().unwrap(), before.keys().unwrap());
        assert_eq!(
            shell.store().get(keys::ADMINS).unwrap(),
            before.get(keys::ADMINS).unwrap()
        );
        assert!(shell.identity().is_some());
    }

    #[test]
    fn test_withdrawal_removes_exactly_own_record() {
        let mut shell = mounted(INSTITUTION_ADMIN);

        let outcome = shell.withdraw(|_| true).unwrap();
        assert_eq!(
            outcome,
            WithdrawOutcome::Withdrawn {
                removed: 1,
                navigate: Navigation::Entry,
            }
        );

        let store = shell.into_store();
        let admins = read_raw_collection(&store, keys::ADMINS).unwrap();
        assert_eq!(
            admins,
            vec![
                json!({"userId": "root", "approved": true}),
                json!({"userId": "lee", "approved": false}),
            ]
        );
        assert_eq!(store.get(keys::CURRENT_ADMIN).unwrap(), None);
        assert!(store.get(keys::CERTIFICATES).unwrap().is_some());
    }

    #[test]
    fn test_withdrawal_requires_identity() {
        let mut shell = mounted("null");
        assert!(matches!(
            shell.withdraw(|_| true),
            Err(ShellError::NotSignedIn)
        ));
    }

    #[test]
    fn test_handle_signal_filters_keys() {
        let mut shell = SessionShell::new(store_with(INSTITUTION_ADMIN));

        assert!(!shell.handle_signal(&Signal::storage_changed("certificates")).unwrap());
        assert!(shell.identity().is_none());

        assert!(shell.handle_signal(&Signal::storage_changed("currentAdmin")).unwrap());
        assert!(shell.identity().is_some());
        assert!(shell.handle_signal(&Signal::FocusRegained).unwrap());
    }
}
