//! Striped per-name locks.
//!
//! A fixed table of `RwLock`s; a key name maps onto one stripe through the
//! first bytes of its SHA-256 digest. Two names sharing a stripe only
//! serialize more than needed, never less.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use sha2::{Digest, Sha256};

/// Guard over one stripe, shared or exclusive.
pub enum StripeGuard<'a> {
    Shared(RwLockReadGuard<'a, ()>),
    Exclusive(RwLockWriteGuard<'a, ()>),
}

/// Guards held for an operation touching two names.
pub struct PairGuard<'a> {
    _first: StripeGuard<'a>,
    _second: Option<StripeGuard<'a>>,
}

#[derive(Debug)]
pub struct LockTable {
    stripes: Vec<RwLock<()>>,
}

impl LockTable {
    /// Create a table with `count` stripes (at least one).
    pub fn new(count: usize) -> Self {
        let stripes = (0..count.max(1)).map(|_| RwLock::new(())).collect();
        Self { stripes }
    }

    pub fn len(&self) -> usize {
        self.stripes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stripes.is_empty()
    }

    /// Stripe index for a key name; stable for the life of the table.
    pub fn stripe_for(&self, name: &str) -> usize {
        let digest = Sha256::digest(name.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % self.stripes.len() as u64) as usize
    }

    // The guarded value is (), so a poisoned stripe carries no broken state.
    fn shared_at(&self, index: usize) -> RwLockReadGuard<'_, ()> {
        self.stripes[index]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn exclusive_at(&self, index: usize) -> RwLockWriteGuard<'_, ()> {
        self.stripes[index]
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the name's stripe is held shared.
    pub fn shared(&self, name: &str) -> RwLockReadGuard<'_, ()> {
        let index = self.stripe_for(name);
        log::debug!("acquiring shared stripe {} for {}", index, name);
        self.shared_at(index)
    }

    /// Block until the name's stripe is held exclusively.
    pub fn exclusive(&self, name: &str) -> RwLockWriteGuard<'_, ()> {
        let index = self.stripe_for(name);
        log::debug!("acquiring exclusive stripe {} for {}", index, name);
        self.exclusive_at(index)
    }

    /// Hold `write_name` exclusively and `read_name` shared.
    ///
    /// Stripes are taken in ascending index order so concurrent pairs cannot
    /// deadlock; when both names share a stripe it is taken once, exclusively.
    pub fn exclusive_and_shared(&self, write_name: &str, read_name: &str) -> PairGuard<'_> {
        let write_index = self.stripe_for(write_name);
        let read_index = self.stripe_for(read_name);
        log::debug!(
            "acquiring exclusive stripe {} for {} and shared stripe {} for {}",
            write_index,
            write_name,
            read_index,
            read_name
        );

        if write_index == read_index {
            return PairGuard {
                _first: StripeGuard::Exclusive(self.exclusive_at(write_index)),
                _second: None,
            };
        }

        if write_index < read_index {
            let first = StripeGuard::Exclusive(self.exclusive_at(write_index));
            let second = StripeGuard::Shared(self.shared_at(read_index));
            PairGuard {
                _first: first,
                _second: Some(second),
            }
        } else {
            let first = StripeGuard::Shared(self.shared_at(read_index));
            let second = StripeGuard::Exclusive(self.exclusive_at(write_index));
            PairGuard {
                _first: first,
                _second: Some(second),
            }
        }
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_LOCK_STRIPES)
    }
}
