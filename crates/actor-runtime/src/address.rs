//! # Addresses
//!
//! Every actor instance is identified by an [`Address`]. Addresses are handed out by an
//! [`AddressFactory`] owned by the stage, so ids are unique within the process and are
//! never reused.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Immutable, comparable identity of an actor.
///
/// Equality, hashing and ordering only look at the numeric id; the optional name is
/// carried along for diagnostics and for actors that want to report who they are.
#[derive(Clone, Debug)]
pub struct Address {
    id: u64,
    name: Option<Arc<str>>,
}

impl Address {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}#{}", name, self.id),
            None => write!(f, "#{}", self.id),
        }
    }
}

/// Produces process-unique addresses.
#[derive(Debug)]
pub struct AddressFactory {
    next_id: AtomicU64,
}

impl AddressFactory {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// An anonymous address.
    pub fn unique(&self) -> Address {
        Address {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: None,
        }
    }

    /// A fresh address carrying `name`.
    pub fn unique_with(&self, name: impl Into<String>) -> Address {
        Address {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: Some(Arc::from(name.into())),
        }
    }
}

impl Default for AddressFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_addresses_are_unique_and_ordered() {
        let factory = AddressFactory::new();
        let first = factory.unique();
        let second = factory.unique_with("worker");

        assert_ne!(first, second);
        assert!(first < second);
        assert_eq!(second.name(), Some("worker"));
        assert_eq!(first.name(), None);

        let set: HashSet<Address> = (0..100).map(|_| factory.unique()).collect();
        assert_eq!(set.len(), 100);
    }

    #[test]
    fn test_display_includes_name_when_present() {
        let factory = AddressFactory::new();
        let anonymous = factory.unique();
        let named = factory.unique_with("router");
        assert_eq!(anonymous.to_string(), "#1");
        assert_eq!(named.to_string(), "router#2");
    }
}
