//! Handle table: append-only slots indexed by handle value.
//!
//! Slot 0 is permanently empty so [`Handle::NULL`] never resolves. Slots are
//! never reused: a destroyed object leaves `None` behind and its handle keeps
//! resolving to "not found" for the life of the runtime. The lock is held
//! only to index, push or take a slot; object code never runs under it.
//!
//! [`drain`](HandleTable::drain) closes the table: later allocations fail.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::object::ObjectCell;
use crate::Handle;

struct Slots {
    cells: Vec<Option<Arc<ObjectCell>>>,
    closed: bool,
}

pub(crate) struct HandleTable {
    slots: RwLock<Slots>,
}

impl HandleTable {
    pub(crate) fn new() -> Self {
        Self { slots: RwLock::new(Slots { cells: vec![None], closed: false }) }
    }

    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends the cell built by `make` for the next handle. `None` once the
    /// table is closed; `make` is not called then.
    pub(crate) fn allocate(&self, make: impl FnOnce(Handle) -> ObjectCell) -> Option<Handle> {
        let mut slots = self.write();
        if slots.closed {
            return None;
        }
        let handle = Handle::from_raw(slots.cells.len());
        assert!(!handle.is_device(), "handle table exhausted");
        let cell = make(handle);
        debug_assert_eq!(cell.handle(), handle);
        slots.cells.push(Some(Arc::new(cell)));
        Some(handle)
    }

    pub(crate) fn resolve(&self, handle: Handle) -> Option<Arc<ObjectCell>> {
        self.read().cells.get(handle.raw())?.clone()
    }

    /// Empties the slot of `handle`, returning its cell.
    pub(crate) fn remove(&self, handle: Handle) -> Option<Arc<ObjectCell>> {
        self.write().cells.get_mut(handle.raw())?.take()
    }

    /// Closes the table and empties every slot, returning the cells in
    /// ascending handle order.
    pub(crate) fn drain(&self) -> Vec<Arc<ObjectCell>> {
        let mut slots = self.write();
        slots.closed = true;
        slots.cells.iter_mut().filter_map(Option::take).collect()
    }

    /// Number of slots ever issued, including the reserved null slot.
    pub(crate) fn len(&self) -> usize {
        self.read().cells.len()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.read().cells.iter().filter(|slot| slot.is_some()).count()
    }

    /// Handles of every live object, ascending.
    pub(crate) fn live_handles(&self) -> Vec<Handle> {
        self.read()
            .cells
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| Handle::from_raw(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::FrameObject;

    fn frame(handle: Handle) -> ObjectCell {
        ObjectCell::new(handle, Box::new(FrameObject::new()))
    }

    #[test]
    fn first_handle_is_one() {
        let table = HandleTable::new();
        assert_eq!(table.allocate(frame), Some(Handle::from_raw(1)));
        assert_eq!(table.allocate(frame), Some(Handle::from_raw(2)));
        assert!(table.resolve(Handle::NULL).is_none());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn removed_slots_are_never_reused() {
        let table = HandleTable::new();
        let a = table.allocate(frame).unwrap();
        assert!(table.remove(a).is_some());
        assert!(table.remove(a).is_none());
        assert!(table.resolve(a).is_none());

        let b = table.allocate(frame).unwrap();
        assert_ne!(a, b);
        assert_eq!(table.live_count(), 1);
        assert_eq!(table.live_handles(), vec![b]);
    }

    #[test]
    fn out_of_range_handles_do_not_resolve() {
        let table = HandleTable::new();
        assert!(table.resolve(Handle::from_raw(99)).is_none());
        assert!(table.resolve(Handle::DEVICE).is_none());
    }

    #[test]
    fn drain_is_ascending() {
        let table = HandleTable::new();
        let handles: Vec<_> = (0..4).filter_map(|_| table.allocate(frame)).collect();
        table.remove(handles[1]);
        let drained: Vec<_> = table.drain().iter().map(|c| c.handle()).collect();
        assert_eq!(drained, vec![handles[0], handles[2], handles[3]]);
        assert_eq!(table.live_count(), 0);
    }

    #[test]
    fn drained_table_refuses_allocation() {
        let table = HandleTable::new();
        table.allocate(frame);
        table.drain();
        let mut called = false;
        let refused = table.allocate(|handle| {
            called = true;
            frame(handle)
        });
        assert_eq!(refused, None);
        assert!(!called);
        assert_eq!(table.live_count(), 0);
        assert_eq!(table.len(), 2);
    }
}
