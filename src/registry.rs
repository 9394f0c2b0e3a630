// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Transaction Registry
//!
//! Maps transaction ids to records behind one node-wide lock. The lock
//! also guards node-local shared state `S` (the participant's store and
//! log writer, the coordinator's log writer) so that a registry update
//! and its log append happen in the same critical section.
//!
//! Critical sections must stay short. Never hold a guard across an
//! `.await` or a peer call.

use std::collections::BTreeMap;

use parking_lot::{Mutex, MutexGuard};

pub struct RegistryState<T, S> {
    pub transactions: BTreeMap<String, T>,
    pub shared: S,
}

pub struct Registry<T, S = ()> {
    inner: Mutex<RegistryState<T, S>>,
}

impl<T, S> Registry<T, S> {
    pub fn new(shared: S) -> Self {
        Self::with_transactions(BTreeMap::new(), shared)
    }

    /// Seeds the registry, e.g. from log replay.
    pub fn with_transactions(transactions: BTreeMap<String, T>, shared: S) -> Self {
        Self {
            inner: Mutex::new(RegistryState { transactions, shared }),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, RegistryState<T, S>> {
        self.inner.lock()
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.inner.lock().transactions.contains_key(txid)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone, S> Registry<T, S> {
    pub fn get(&self, txid: &str) -> Option<T> {
        self.inner.lock().transactions.get(txid).cloned()
    }

    /// Copy of every record, ordered by txid.
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.lock().transactions.values().cloned().collect()
    }
}
