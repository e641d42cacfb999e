use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use super::TxnId;

/// Represents the type of lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared lock (read lock).
    Shared,
    /// Exclusive lock (write lock).
    Exclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => f.write_str("SHARED"),
            LockMode::Exclusive => f.write_str("EXCLUSIVE"),
        }
    }
}

/// Table-granularity lock table. Requests never wait: a conflicting
/// request is refused on the spot and the caller decides what to do.
#[derive(Debug, Default)]
pub struct LockTable {
    /// resource -> holders and the mode each one holds
    locks: HashMap<String, BTreeMap<TxnId, LockMode>>,
    /// transaction -> resources it holds
    held: HashMap<TxnId, HashSet<String>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `mode` on `resource` to `txn` unless another transaction's
    /// lock conflicts. Re-requesting a held lock succeeds; a SHARED holder
    /// asking for EXCLUSIVE is upgraded only when it is the sole holder.
    pub fn acquire(&mut self, txn: TxnId, resource: &str, mode: LockMode) -> bool {
        let holders = self.locks.entry(resource.to_string()).or_default();
        let conflict = holders.iter().any(|(holder, held)| {
            *holder != txn && (*held == LockMode::Exclusive || mode == LockMode::Exclusive)
        });
        if conflict {
            return false;
        }
        let granted = match holders.get(&txn) {
            Some(LockMode::Exclusive) => LockMode::Exclusive,
            _ => mode,
        };
        holders.insert(txn, granted);
        self.held.entry(txn).or_default().insert(resource.to_string());
        true
    }

    /// Drops `txn`'s lock on `resource`; returns whether it held one.
    pub fn release(&mut self, txn: TxnId, resource: &str) -> bool {
        let Some(holders) = self.locks.get_mut(resource) else {
            return false;
        };
        let removed = holders.remove(&txn).is_some();
        if holders.is_empty() {
            self.locks.remove(resource);
        }
        if let Some(set) = self.held.get_mut(&txn) {
            set.remove(resource);
            if set.is_empty() {
                self.held.remove(&txn);
            }
        }
        removed
    }

    /// Drops every lock `txn` holds and returns the released resources.
    pub fn release_all(&mut self, txn: TxnId) -> Vec<String> {
        let mut released: Vec<String> = self
            .held
            .remove(&txn)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        released.sort();
        for resource in &released {
            if let Some(holders) = self.locks.get_mut(resource) {
                holders.remove(&txn);
                if holders.is_empty() {
                    self.locks.remove(resource);
                }
            }
        }
        released
    }

    pub fn mode_held(&self, txn: TxnId, resource: &str) -> Option<LockMode> {
        self.locks.get(resource).and_then(|h| h.get(&txn).copied())
    }

    pub fn holders(&self, resource: &str) -> Vec<(TxnId, LockMode)> {
        self.locks
            .get(resource)
            .map(|h| h.iter().map(|(t, m)| (*t, *m)).collect())
            .unwrap_or_default()
    }
}
