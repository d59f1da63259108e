//! Optimistic local collections backed by server state.
//!
//! Every mutation follows one protocol: snapshot the collection, apply
//! the change locally so the UI moves immediately, dispatch the server
//! call, then confirm on success or revert on failure and surface the
//! error. The wishlist additionally refetches after a confirmed add to
//! pick up the server-assigned entry ID.
//!
//! Reverts are scoped to the mutated product's entry rather than
//! restoring the whole snapshot, so a mutation that succeeded on a
//! different product while this one was in flight keeps its result.
//!
//! Derived values (item counts, totals) are computed from the entries
//! on every read and never stored.

mod debounce;

pub mod cart;
pub mod wishlist;

pub use cart::{CartLine, CartStore};
pub use debounce::{TOGGLE_WINDOW, ToggleDebouncer};
pub use wishlist::{WishlistEntry, WishlistStore};

use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use uuid::Uuid;

use tamarind_core::ProductId;

use crate::api::ApiError;

/// Errors surfaced by cart and wishlist mutations.
///
/// Messages are written for direct display, matching the session
/// error conventions.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The mutation needs a signed-in session and there is none.
    #[error("please sign in to continue")]
    NotAuthenticated,

    /// The server rejected the mutation; the local change was rolled
    /// back. Carries the server's own message when one was parseable.
    #[error("{0}")]
    Rejected(String),

    /// The request never completed; the local change was rolled back.
    #[error("could not reach the server, check your connection and try again")]
    Offline,
}

impl From<ApiError> for StoreError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(_) => Self::NotAuthenticated,
            ApiError::Rejected { message, .. } => Self::Rejected(message),
            ApiError::Network(_) => Self::Offline,
            ApiError::Malformed(_) => {
                Self::Rejected("the server returned an unexpected response".to_owned())
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Optimistic list engine
// ─────────────────────────────────────────────────────────────────────────────

/// Identity of an optimistic entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntryId {
    /// Assigned locally when an entry is created ahead of the server.
    Local(Uuid),
    /// Assigned by the server, usable in mutation URLs.
    Server(String),
}

impl EntryId {
    fn local() -> Self {
        Self::Local(Uuid::new_v4())
    }
}

/// One entry of an optimistic collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OptimisticEntry<P> {
    pub(crate) id: EntryId,
    pub(crate) payload: P,
    /// True while the mutation that produced this entry state is still
    /// in flight.
    pub(crate) pending: bool,
}

impl<P> OptimisticEntry<P> {
    /// A freshly created local entry with its mutation in flight.
    fn pending(payload: P) -> Self {
        Self {
            id: EntryId::local(),
            payload,
            pending: true,
        }
    }
}

/// Payloads are keyed by product; the key is the unit mutations and
/// reverts are scoped to.
pub(crate) trait Keyed {
    fn key(&self) -> &ProductId;
}

/// Frozen copy of a collection, captured synchronously when a mutation
/// starts.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot<P>(Vec<OptimisticEntry<P>>);

impl<P: Keyed> Snapshot<P> {
    fn entry(&self, key: &ProductId) -> Option<(usize, &OptimisticEntry<P>)> {
        self.0
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.payload.key() == key)
    }
}

/// Entry list shared across clones of a store, with key-scoped revert.
pub(crate) struct OptimisticList<P> {
    entries: Mutex<Vec<OptimisticEntry<P>>>,
}

impl<P> Default for OptimisticList<P> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<P: Keyed + Clone> OptimisticList<P> {
    fn lock(&self) -> MutexGuard<'_, Vec<OptimisticEntry<P>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> Snapshot<P> {
        Snapshot(self.lock().clone())
    }

    pub(crate) fn entries(&self) -> Vec<OptimisticEntry<P>> {
        self.lock().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn find(&self, key: &ProductId) -> Option<OptimisticEntry<P>> {
        self.lock()
            .iter()
            .find(|entry| entry.payload.key() == key)
            .cloned()
    }

    pub(crate) fn contains(&self, key: &ProductId) -> bool {
        self.lock().iter().any(|entry| entry.payload.key() == key)
    }

    /// Run a synchronous mutation over the entries.
    pub(crate) fn apply<R>(&self, mutate: impl FnOnce(&mut Vec<OptimisticEntry<P>>) -> R) -> R {
        mutate(&mut self.lock())
    }

    /// Run a synchronous read over the entries.
    pub(crate) fn read<R>(&self, read: impl FnOnce(&[OptimisticEntry<P>]) -> R) -> R {
        read(&self.lock())
    }

    /// Mark a key's entry as no longer in flight.
    pub(crate) fn confirm(&self, key: &ProductId) {
        if let Some(entry) = self
            .lock()
            .iter_mut()
            .find(|entry| entry.payload.key() == key)
        {
            entry.pending = false;
        }
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    /// Restore one key's entry to its snapshot state, leaving every
    /// other entry as it currently is.
    pub(crate) fn revert(&self, key: &ProductId, snapshot: &Snapshot<P>) {
        let mut entries = self.lock();
        let current = entries.iter().position(|entry| entry.payload.key() == key);

        match (current, snapshot.entry(key)) {
            (Some(position), Some((_, saved))) => {
                if let Some(entry) = entries.get_mut(position) {
                    *entry = saved.clone();
                }
            }
            (Some(position), None) => {
                entries.remove(position);
            }
            (None, Some((saved_position, saved))) => {
                let at = saved_position.min(entries.len());
                entries.insert(at, saved.clone());
            }
            (None, None) => {}
        }
    }

    /// Replace the entries with the server's canonical copy, keeping
    /// entries whose own mutation is still in flight and whose key the
    /// canonical copy does not know yet.
    pub(crate) fn install_canonical(&self, canonical: Vec<OptimisticEntry<P>>) {
        let mut entries = self.lock();
        let mut next = canonical;
        for entry in entries.drain(..) {
            if entry.pending
                && !next
                    .iter()
                    .any(|candidate| candidate.payload.key() == entry.payload.key())
            {
                next.push(entry);
            }
        }
        *entries = next;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestItem {
        product: ProductId,
        quantity: u32,
    }

    impl Keyed for TestItem {
        fn key(&self) -> &ProductId {
            &self.product
        }
    }

    fn item(product: &str, quantity: u32) -> TestItem {
        TestItem {
            product: ProductId::new(product),
            quantity,
        }
    }

    fn push(list: &OptimisticList<TestItem>, product: &str, quantity: u32) {
        list.apply(|entries| entries.push(OptimisticEntry::pending(item(product, quantity))));
        list.confirm(&ProductId::new(product));
    }

    #[test]
    fn test_revert_restores_modified_entry() {
        let list = OptimisticList::default();
        push(&list, "prod_a", 1);

        let snapshot = list.snapshot();
        let key = ProductId::new("prod_a");
        list.apply(|entries| {
            if let Some(entry) = entries.iter_mut().find(|e| e.payload.key() == &key) {
                entry.payload.quantity = 9;
                entry.pending = true;
            }
        });

        list.revert(&key, &snapshot);

        let entry = list.find(&key).unwrap();
        assert_eq!(entry.payload.quantity, 1);
        assert!(!entry.pending);
    }

    #[test]
    fn test_revert_removes_added_entry() {
        let list = OptimisticList::default();
        let snapshot = list.snapshot();

        let key = ProductId::new("prod_a");
        list.apply(|entries| entries.push(OptimisticEntry::pending(item("prod_a", 1))));

        list.revert(&key, &snapshot);

        assert!(list.is_empty());
    }

    #[test]
    fn test_revert_reinserts_removed_entry_at_original_position() {
        let list = OptimisticList::default();
        push(&list, "prod_a", 1);
        push(&list, "prod_b", 2);
        push(&list, "prod_c", 3);

        let snapshot = list.snapshot();
        let key = ProductId::new("prod_b");
        list.apply(|entries| entries.retain(|e| e.payload.key() != &key));

        list.revert(&key, &snapshot);

        let order: Vec<_> = list
            .entries()
            .into_iter()
            .map(|e| e.payload.product.into_inner())
            .collect();
        assert_eq!(order, vec!["prod_a", "prod_b", "prod_c"]);
    }

    #[test]
    fn test_revert_leaves_other_keys_untouched() {
        let list = OptimisticList::default();
        push(&list, "prod_a", 1);

        // Mutation on A starts.
        let snapshot = list.snapshot();
        let key_a = ProductId::new("prod_a");
        list.apply(|entries| {
            if let Some(entry) = entries.iter_mut().find(|e| e.payload.key() == &key_a) {
                entry.payload.quantity = 5;
            }
        });

        // A mutation on B lands while A is in flight.
        push(&list, "prod_b", 7);

        list.revert(&key_a, &snapshot);

        assert_eq!(list.find(&key_a).unwrap().payload.quantity, 1);
        assert_eq!(list.find(&ProductId::new("prod_b")).unwrap().payload.quantity, 7);
    }

    #[test]
    fn test_install_canonical_keeps_pending_entries_on_unknown_keys() {
        let list = OptimisticList::default();
        push(&list, "prod_a", 1);
        list.apply(|entries| entries.push(OptimisticEntry::pending(item("prod_b", 2))));

        // Canonical copy was fetched before the server learned about B.
        list.install_canonical(vec![OptimisticEntry {
            id: EntryId::Server("srv_1".to_owned()),
            payload: item("prod_a", 1),
            pending: false,
        }]);

        assert!(list.contains(&ProductId::new("prod_a")));
        let pending = list.find(&ProductId::new("prod_b")).unwrap();
        assert!(pending.pending);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_confirm_clears_pending() {
        let list = OptimisticList::default();
        let key = ProductId::new("prod_a");
        list.apply(|entries| entries.push(OptimisticEntry::pending(item("prod_a", 1))));
        assert!(list.find(&key).unwrap().pending);

        list.confirm(&key);

        assert!(!list.find(&key).unwrap().pending);
    }
}
