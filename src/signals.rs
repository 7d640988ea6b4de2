//! Change notifications.
//!
//! Three signal classes trigger a re-read of the store: a storage change
//! made by another tab, the in-tab "admin state changed" signal fired on
//! logout, and the view regaining focus.

use std::collections::BTreeSet;
use std::fmt;

/// A notification that the store may have changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Another tab changed `key`. `None` means the whole store was cleared.
    StorageChanged { key: Option<String> },
    /// This tab changed the signed-in admin (logout).
    AdminStateChanged,
    /// The view came back into focus.
    FocusRegained,
}

impl Signal {
    pub fn storage_changed(key: impl Into<String>) -> Self {
        Signal::StorageChanged {
            key: Some(key.into()),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::StorageChanged { key: Some(key) } => write!(f, "storage change of {}", key),
            Signal::StorageChanged { key: None } => write!(f, "storage clear"),
            Signal::AdminStateChanged => write!(f, "admin state change"),
            Signal::FocusRegained => write!(f, "focus regained"),
        }
    }
}

/// The set of storage keys a subscriber cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyFilter {
    keys: BTreeSet<String>,
}

impl KeyFilter {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `signal` should trigger a re-read for this filter.
    ///
    /// Storage changes match only watched keys or a whole-store clear;
    /// in-tab and focus signals always match.
    pub fn matches(&self, signal: &Signal) -> bool {
        match signal {
            Signal::StorageChanged { key: Some(key) } => self.keys.contains(key),
            Signal::StorageChanged { key: None } => true,
            Signal::AdminStateChanged | Signal::FocusRegained => true,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

/// Handle returned by [`SignalBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber<'a> {
    id: SubscriptionId,
    filter: KeyFilter,
    callback: Box<dyn FnMut(&Signal) + 'a>,
}

/// Single-threaded fan-out of signals to filtered subscribers.
#[derive(Default)]
pub struct SignalBus<'a> {
    subscribers: Vec<Subscriber<'a>>,
    next_id: u64,
}

impl<'a> SignalBus<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for signals matching `filter`.
    pub fn subscribe<F>(&mut self, filter: KeyFilter, callback: F) -> SubscriptionId
    where
        F: FnMut(&Signal) + 'a,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            filter,
            callback: Box::new(callback),
        });
        id
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    /// Deliver `signal` to every matching subscriber, in subscription order.
    /// Returns the number of callbacks invoked.
    pub fn publish(&mut self, signal: &Signal) -> usize {
        let mut delivered = 0;
        for subscriber in &mut self.subscribers {
            if subscriber.filter.matches(signal) {
                (subscriber.callback)(signal);
                delivered += 1;
            }
        }
        delivered
    }
}

impl fmt::Debug for SignalBus<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_filter_ignores_unrelated_keys() {
        let filter = KeyFilter::new(["currentAdmin", "adminNotifications"]);

        assert!(filter.matches(&Signal::storage_changed("currentAdmin")));
        assert!(!filter.matches(&Signal::storage_changed("theme")));
        assert!(filter.matches(&Signal::StorageChanged { key: None }));
        assert!(filter.matches(&Signal::AdminStateChanged));
        assert!(filter.matches(&Signal::FocusRegained));
    }

    #[test]
    fn test_publish_reaches_only_matching_subscribers() {
        let seen = RefCell::new(Vec::new());
        let mut bus = SignalBus::new();

        bus.subscribe(KeyFilter::new(["certificates"]), |s| {
            seen.borrow_mut().push(("certs", s.clone()))
        });
        bus.subscribe(KeyFilter::new(["currentAdmin"]), |s| {
            seen.borrow_mut().push(("admin", s.clone()))
        });

        assert_eq!(bus.publish(&Signal::storage_changed("certificates")), 1);
        assert_eq!(bus.publish(&Signal::storage_changed("unrelated")), 0);
        assert_eq!(bus.publish(&Signal::AdminStateChanged), 2);
        drop(bus);

        let seen = seen.into_inner();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], ("certs", Signal::storage_changed("certificates")));
        assert_eq!(seen[1].0, "certs");
        assert_eq!(seen[2].0, "admin");
    }

    #[test]
    fn test_unsubscribe() {
        let mut count = 0;
        {
            let mut bus = SignalBus::new();
            let id = bus.subscribe(KeyFilter::default(), |_| count += 1);

            bus.publish(&Signal::FocusRegained);
            assert!(bus.unsubscribe(id));
            assert!(!bus.unsubscribe(id));
            bus.publish(&Signal::FocusRegained);
        }
        assert_eq!(count, 1);
    }
}
