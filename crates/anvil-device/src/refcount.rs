//! Public and internal reference counts of one object.
//!
//! Both counters share a single `AtomicU64` (public count in the high half,
//! internal count in the low half). The transition to "both zero" is exactly
//! one successful compare-exchange, so whichever call performs it is the only
//! one that sees [`Transition::Destroy`].
//!
//! Memory ordering follows `std::sync::Arc`: decrements are `AcqRel`, so the
//! destroying thread observes every write made through earlier references.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::Handle;

const PUBLIC_SHIFT: u32 = 32;
const PUBLIC_ONE: u64 = 1 << PUBLIC_SHIFT;
const INTERNAL_ONE: u64 = 1;
const HALF_MASK: u64 = 0xFFFF_FFFF;

/// Which of the two counters an operation touched.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RefKind {
    Public,
    Internal,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RefKind::Public => "public",
            RefKind::Internal => "internal",
        })
    }
}

/// Outcome of a successful release.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transition {
    /// At least one reference of either kind remains.
    Live,
    /// Both counts just reached zero; the caller must destroy the object.
    Destroy,
}

/// Reference-count protocol violation. The counts are left untouched.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RefCountError {
    /// Retain or release on an object whose counts already reached zero.
    AlreadyDestroyed,
    /// Release without a matching retain.
    Underflow { kind: RefKind },
    /// More than `u32::MAX` references of one kind.
    Overflow { kind: RefKind },
    /// `release_internal` by an owner that holds no internal reference.
    NotAnOwner { owner: Handle },
}

impl fmt::Display for RefCountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefCountError::AlreadyDestroyed => f.write_str("object was already destroyed"),
            RefCountError::Underflow { kind } => write!(f, "{kind} release without matching retain"),
            RefCountError::Overflow { kind } => write!(f, "{kind} reference count overflow"),
            RefCountError::NotAnOwner { owner } => {
                write!(f, "internal release by {owner}, which holds no internal reference")
            }
        }
    }
}

impl std::error::Error for RefCountError {}

/// Dual reference count with an owner ledger for internal references.
#[derive(Debug)]
pub struct RefCounts {
    packed: AtomicU64,
    /// Owner handle → number of internal references it holds. Every change to
    /// the internal half of `packed` happens while this lock is held.
    owners: Mutex<HashMap<Handle, u32>>,
}

impl RefCounts {
    /// A fresh object: one public reference (the creator's), no internal ones.
    pub fn new() -> Self {
        Self { packed: AtomicU64::new(PUBLIC_ONE), owners: Mutex::new(HashMap::new()) }
    }

    #[inline]
    pub fn public(&self) -> u32 {
        public_part(self.packed.load(Ordering::Acquire))
    }

    #[inline]
    pub fn internal(&self) -> u32 {
        internal_part(self.packed.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.packed.load(Ordering::Acquire) == 0
    }

    /// Internal references per owner, sorted by owner handle.
    pub fn owners(&self) -> Vec<(Handle, u32)> {
        let ledger = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
        let mut owners: Vec<_> = ledger.iter().map(|(&h, &n)| (h, n)).collect();
        owners.sort_unstable();
        owners
    }

    pub fn retain(&self) -> Result<(), RefCountError> {
        self.update(|cur| {
            if public_part(cur) == u32::MAX {
                return Err(RefCountError::Overflow { kind: RefKind::Public });
            }
            Ok(cur + PUBLIC_ONE)
        })
        .map(|_| ())
    }

    pub fn release(&self) -> Result<Transition, RefCountError> {
        self.update(|cur| {
            if public_part(cur) == 0 {
                return Err(RefCountError::Underflow { kind: RefKind::Public });
            }
            Ok(cur - PUBLIC_ONE)
        })
        .map(transition)
    }

    pub fn retain_internal(&self, owner: Handle) -> Result<(), RefCountError> {
        let mut ledger = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
        self.update(|cur| {
            if internal_part(cur) == u32::MAX {
                return Err(RefCountError::Overflow { kind: RefKind::Internal });
            }
            Ok(cur + INTERNAL_ONE)
        })?;
        *ledger.entry(owner).or_insert(0) += 1;
        Ok(())
    }

    pub fn release_internal(&self, owner: Handle) -> Result<Transition, RefCountError> {
        let mut ledger = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(held) = ledger.get_mut(&owner) else {
            return Err(RefCountError::NotAnOwner { owner });
        };
        let next = self.update(|cur| {
            if internal_part(cur) == 0 {
                return Err(RefCountError::Underflow { kind: RefKind::Internal });
            }
            Ok(cur - INTERNAL_ONE)
        })?;
        *held -= 1;
        if *held == 0 {
            ledger.remove(&owner);
        }
        Ok(transition(next))
    }

    /// CAS loop applying `f`; returns the stored value. A zero value is
    /// terminal and rejects every further update.
    fn update(&self, f: impl Fn(u64) -> Result<u64, RefCountError>) -> Result<u64, RefCountError> {
        let mut cur = self.packed.load(Ordering::Acquire);
        loop {
            if cur == 0 {
                return Err(RefCountError::AlreadyDestroyed);
            }
            let next = f(cur)?;
            match self.packed.compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Ok(next),
                Err(actual) => cur = actual,
            }
        }
    }
}

impl Default for RefCounts {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn public_part(packed: u64) -> u32 {
    (packed >> PUBLIC_SHIFT) as u32
}

#[inline]
fn internal_part(packed: u64) -> u32 {
    (packed & HALF_MASK) as u32
}

#[inline]
fn transition(next: u64) -> Transition {
    if next == 0 { Transition::Destroy } else { Transition::Live }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(i: usize) -> Handle {
        Handle::from_raw(i)
    }

    // ── public count ──────────────────────────────────────────────────────

    #[test]
    fn starts_with_one_public_reference() {
        let rc = RefCounts::new();
        assert_eq!((rc.public(), rc.internal()), (1, 0));
        assert!(!rc.is_destroyed());
    }

    #[test]
    fn last_public_release_destroys() {
        let rc = RefCounts::new();
        rc.retain().unwrap();
        assert_eq!(rc.release(), Ok(Transition::Live));
        assert_eq!(rc.release(), Ok(Transition::Destroy));
        assert!(rc.is_destroyed());
    }

    #[test]
    fn destroyed_counts_reject_everything() {
        let rc = RefCounts::new();
        rc.release().unwrap();
        assert_eq!(rc.retain(), Err(RefCountError::AlreadyDestroyed));
        assert_eq!(rc.release(), Err(RefCountError::AlreadyDestroyed));
        assert_eq!(rc.retain_internal(h(1)), Err(RefCountError::AlreadyDestroyed));
        assert!(rc.owners().is_empty());
    }

    // ── internal count ────────────────────────────────────────────────────

    #[test]
    fn internal_reference_outlives_public() {
        let rc = RefCounts::new();
        rc.retain_internal(h(2)).unwrap();
        assert_eq!(rc.release(), Ok(Transition::Live));
        assert_eq!((rc.public(), rc.internal()), (0, 1));
        assert_eq!(rc.release_internal(h(2)), Ok(Transition::Destroy));
    }

    #[test]
    fn public_underflow_is_reported_and_ignored() {
        let rc = RefCounts::new();
        rc.retain_internal(h(2)).unwrap();
        rc.release().unwrap();
        assert_eq!(rc.release(), Err(RefCountError::Underflow { kind: RefKind::Public }));
        assert_eq!((rc.public(), rc.internal()), (0, 1));
    }

    #[test]
    fn owner_ledger_detects_double_release() {
        let rc = RefCounts::new();
        rc.retain_internal(h(2)).unwrap();
        rc.release_internal(h(2)).unwrap();
        assert_eq!(rc.release_internal(h(2)), Err(RefCountError::NotAnOwner { owner: h(2) }));
        assert_eq!(rc.release_internal(h(9)), Err(RefCountError::NotAnOwner { owner: h(9) }));
        assert_eq!(rc.public(), 1);
    }

    #[test]
    fn one_owner_may_hold_several_references() {
        let rc = RefCounts::new();
        rc.retain_internal(h(4)).unwrap();
        rc.retain_internal(h(4)).unwrap();
        rc.retain_internal(h(3)).unwrap();
        assert_eq!(rc.owners(), vec![(h(3), 1), (h(4), 2)]);
        rc.release_internal(h(4)).unwrap();
        assert_eq!(rc.owners(), vec![(h(3), 1), (h(4), 1)]);
        assert_eq!(rc.internal(), 2);
    }

    #[test]
    fn error_messages() {
        let e = RefCountError::NotAnOwner { owner: h(5) };
        assert_eq!(e.to_string(), "internal release by #5, which holds no internal reference");
        let e = RefCountError::Underflow { kind: RefKind::Internal };
        assert_eq!(e.to_string(), "internal release without matching retain");
    }
}
