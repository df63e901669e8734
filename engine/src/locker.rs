// SPDX-License-Identifier: Apache-2.0

//! Lock table guarding the reuse of shared scratch objects.
//!
//! The engine is strictly single threaded, locks are no concurrency
//! primitive. They catch an algorithm nested into another one reusing a
//! scratch object the outer one still works with.

extern crate alloc;
use alloc::vec::Vec;

use crate::EngineError;
use crate::utils_common::alloc::try_alloc_vec;

/// Index of an object's slot in an [`ObjectLocker`], as returned by
/// [`register()`](ObjectLocker::register).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LockHandle(usize);

impl LockHandle {
    pub fn slot(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy)]
struct LockSlot<K> {
    object: K,
    locked: bool,
}

/// Lock table for objects identified by `K`.
pub struct ObjectLocker<K> {
    slots: Vec<Option<LockSlot<K>>>,
    locking_active: bool,
    erase_on_lock: bool,
    erase_on_unlock: bool,
    /// `N x N` occupancy matrix, row `i` marks all objects found locked at
    /// some point when object `i` got locked.
    profile: Option<Vec<u8>>,
}

impl<K: Copy + Eq> ObjectLocker<K> {
    /// Create a lock table with a fixed number of slots.
    ///
    /// # Arguments:
    ///
    /// * `num_slots` - Maximum number of objects which can be registered.
    /// * `profile` - Whether to record the lock occupancy matrix.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::MemoryAllocationFailure`] - Failed to allocate the
    ///   table.
    pub fn new(num_slots: usize, profile: bool) -> Result<Self, EngineError> {
        let profile = if profile {
            let profile_len = num_slots
                .checked_mul(num_slots)
                .ok_or(EngineError::MemoryAllocationFailure)?;
            Some(try_alloc_vec::<u8>(profile_len)?)
        } else {
            None
        };
        let slots = try_alloc_vec::<Option<LockSlot<K>>>(num_slots)?;
        Ok(Self {
            slots,
            locking_active: true,
            erase_on_lock: false,
            erase_on_unlock: false,
            profile,
        })
    }

    /// Associate an object with a free slot.
    ///
    /// # Arguments:
    ///
    /// * `object` - The object to guard.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::LockAlreadyRegistered`] - `object` owns a slot
    ///   already.
    /// * [`EngineError::LockNoFreeSlot`] - All slots are taken.
    pub fn register(&mut self, object: K) -> Result<LockHandle, EngineError> {
        if self.find(object).is_some() {
            return Err(EngineError::LockAlreadyRegistered);
        }
        let (i, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
            .ok_or(EngineError::LockNoFreeSlot)?;
        *slot = Some(LockSlot { object, locked: false });
        Ok(LockHandle(i))
    }

    /// Turn lock tracking on or off.
    ///
    /// While inactive, [`lock()`](Self::lock), [`unlock()`](Self::unlock)
    /// and [`unlock_all()`](Self::unlock_all) don't do anything and
    /// [`is_locked()`](Self::is_locked) always reports `false`.
    pub fn set_locking_active(&mut self, active: bool) {
        self.locking_active = active;
    }

    pub fn is_locking_active(&self) -> bool {
        self.locking_active
    }

    pub fn set_erasure(&mut self, on_lock: bool, on_unlock: bool) {
        self.erase_on_lock = on_lock;
        self.erase_on_unlock = on_unlock;
    }

    pub fn erase_on_lock(&self) -> bool {
        self.erase_on_lock
    }

    pub fn erase_on_unlock(&self) -> bool {
        self.erase_on_unlock
    }

    fn find(&self, object: K) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().map(|slot| slot.object == object).unwrap_or(false))
    }

    /// Lock an object.
    ///
    /// # Arguments:
    ///
    /// * `object` - The object to lock.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::LockObjectNotFound`] - The object has not been
    ///   registered.
    /// * [`EngineError::LockAlreadyLocked`] - The object is locked already.
    pub fn lock(&mut self, object: K) -> Result<(), EngineError> {
        if !self.locking_active {
            return Ok(());
        }
        let i = self.find(object).ok_or(EngineError::LockObjectNotFound)?;
        self.lock_slot(i, object)
    }

    /// Lock an object through the handle obtained at registration.
    ///
    /// # Arguments:
    ///
    /// * `handle` - The object's lock slot.
    /// * `object` - The object to lock.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::LockObjectNotFound`] - The slot is unused.
    /// * [`EngineError::LockObjectMismatch`] - The slot belongs to another
    ///   object.
    /// * [`EngineError::LockAlreadyLocked`] - The object is locked already.
    pub fn lock_at(&mut self, handle: LockHandle, object: K) -> Result<(), EngineError> {
        if !self.locking_active {
            return Ok(());
        }
        self.lock_slot(handle.0, object)
    }

    fn lock_slot(&mut self, i: usize, object: K) -> Result<(), EngineError> {
        let slot = self
            .slots
            .get_mut(i)
            .and_then(|slot| slot.as_mut())
            .ok_or(EngineError::LockObjectNotFound)?;
        if slot.object != object {
            log::debug!("lock slot {} owned by another object", i);
            return Err(EngineError::LockObjectMismatch);
        }
        if slot.locked {
            log::debug!("lock slot {} locked already", i);
            return Err(EngineError::LockAlreadyLocked);
        }
        slot.locked = true;

        if let Some(profile) = self.profile.as_mut() {
            let n = self.slots.len();
            for (j, other) in self.slots.iter().enumerate() {
                if j != i && other.as_ref().map(|other| other.locked).unwrap_or(false) {
                    profile[i * n + j] = 1;
                }
            }
        }
        Ok(())
    }

    /// Unlock an object.
    ///
    /// # Arguments:
    ///
    /// * `object` - The object to unlock.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::LockObjectNotFound`] - The object has not been
    ///   registered.
    /// * [`EngineError::LockNotLocked`] - The object is not locked.
    pub fn unlock(&mut self, object: K) -> Result<(), EngineError> {
        if !self.locking_active {
            return Ok(());
        }
        let i = self.find(object).ok_or(EngineError::LockObjectNotFound)?;
        self.unlock_slot(i, object)
    }

    /// Unlock an object through the handle obtained at registration.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::LockObjectNotFound`] - The slot is unused.
    /// * [`EngineError::LockObjectMismatch`] - The slot belongs to another
    ///   object.
    /// * [`EngineError::LockNotLocked`] - The object is not locked.
    pub fn unlock_at(&mut self, handle: LockHandle, object: K) -> Result<(), EngineError> {
        if !self.locking_active {
            return Ok(());
        }
        self.unlock_slot(handle.0, object)
    }

    fn unlock_slot(&mut self, i: usize, object: K) -> Result<(), EngineError> {
        let slot = self
            .slots
            .get_mut(i)
            .and_then(|slot| slot.as_mut())
            .ok_or(EngineError::LockObjectNotFound)?;
        if slot.object != object {
            log::debug!("unlock slot {} owned by another object", i);
            return Err(EngineError::LockObjectMismatch);
        }
        if !slot.locked {
            log::debug!("unlock slot {} not locked", i);
            return Err(EngineError::LockNotLocked);
        }
        slot.locked = false;
        Ok(())
    }

    /// Release all locks.
    ///
    /// To be invoked for recovery after an operation has been aborted by
    /// an error.
    pub fn unlock_all(&mut self) {
        if !self.locking_active {
            return;
        }
        for slot in self.slots.iter_mut().flatten() {
            slot.locked = false;
        }
    }

    /// Query whether an object is currently locked.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::LockObjectNotFound`] - The object has not been
    ///   registered.
    pub fn is_locked(&self, object: K) -> Result<bool, EngineError> {
        if !self.locking_active {
            return Ok(false);
        }
        let i = self.find(object).ok_or(EngineError::LockObjectNotFound)?;
        Ok(self.slots[i].as_ref().map(|slot| slot.locked).unwrap_or(false))
    }

    /// Number of objects currently locked.
    pub fn num_locked(&self) -> usize {
        self.slots.iter().flatten().filter(|slot| slot.locked).count()
    }

    /// Number of slots in the table.
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// The lock occupancy matrix in row-major order, if profiling is
    /// enabled.
    pub fn profile_matrix(&self) -> Option<&[u8]> {
        self.profile.as_deref()
    }

    pub fn reset_profile(&mut self) {
        if let Some(profile) = self.profile.as_mut() {
            profile.fill(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_no_free_slot() {
        let mut locker = ObjectLocker::<u32>::new(2, false).unwrap();
        assert_eq!(locker.register(10).unwrap().slot(), 0);
        assert_eq!(locker.register(11).unwrap().slot(), 1);
        assert_eq!(locker.register(12), Err(EngineError::LockNoFreeSlot));
    }

    #[test]
    fn test_register_twice() {
        let mut locker = ObjectLocker::<u32>::new(4, false).unwrap();
        let h = locker.register(5).unwrap();
        assert_eq!(locker.register(5), Err(EngineError::LockAlreadyRegistered));
        assert_eq!(locker.lock_at(LockHandle(1), 5), Err(EngineError::LockObjectNotFound));

        // A single slot tracks the object, so it can't be locked twice.
        locker.lock(5).unwrap();
        assert_eq!(locker.lock_at(h, 5), Err(EngineError::LockAlreadyLocked));
        assert_eq!(locker.register(6).unwrap().slot(), 1);
    }

    #[test]
    fn test_profile_size_overflow() {
        assert!(matches!(
            ObjectLocker::<u32>::new(usize::MAX, true),
            Err(EngineError::MemoryAllocationFailure)
        ));
    }

    #[test]
    fn test_lock_protocol() {
        let mut locker = ObjectLocker::<u32>::new(4, false).unwrap();
        locker.register(1).unwrap();
        locker.register(2).unwrap();

        assert_eq!(locker.lock(3), Err(EngineError::LockObjectNotFound));
        assert_eq!(locker.is_locked(3), Err(EngineError::LockObjectNotFound));

        locker.lock(1).unwrap();
        assert_eq!(locker.is_locked(1), Ok(true));
        assert_eq!(locker.is_locked(2), Ok(false));
        assert_eq!(locker.lock(1), Err(EngineError::LockAlreadyLocked));

        locker.unlock(1).unwrap();
        assert_eq!(locker.unlock(1), Err(EngineError::LockNotLocked));
        assert_eq!(locker.unlock(2), Err(EngineError::LockNotLocked));
    }

    #[test]
    fn test_handle_mismatch() {
        let mut locker = ObjectLocker::<u32>::new(4, false).unwrap();
        let h1 = locker.register(1).unwrap();
        let h2 = locker.register(2).unwrap();

        assert_eq!(locker.lock_at(h1, 2), Err(EngineError::LockObjectMismatch));
        locker.lock_at(h2, 2).unwrap();
        assert_eq!(locker.unlock_at(h1, 2), Err(EngineError::LockObjectMismatch));
        locker.unlock_at(h2, 2).unwrap();

        assert_eq!(locker.lock_at(LockHandle(3), 1), Err(EngineError::LockObjectNotFound));
    }

    #[test]
    fn test_unlock_all_then_lock() {
        let mut locker = ObjectLocker::<u32>::new(3, false).unwrap();
        for i in 0..3 {
            locker.register(i).unwrap();
            locker.lock(i).unwrap();
        }
        assert_eq!(locker.num_locked(), 3);
        locker.unlock_all();
        assert_eq!(locker.num_locked(), 0);
        for i in 0..3 {
            locker.lock(i).unwrap();
        }
    }

    #[test]
    fn test_locking_inactive() {
        let mut locker = ObjectLocker::<u32>::new(1, false).unwrap();
        locker.register(7).unwrap();
        locker.set_locking_active(false);
        locker.lock(7).unwrap();
        locker.lock(7).unwrap();
        assert_eq!(locker.is_locked(7), Ok(false));
        locker.unlock(8).unwrap();

        locker.set_locking_active(true);
        assert_eq!(locker.is_locked(7), Ok(false));
        locker.lock(7).unwrap();
        assert_eq!(locker.is_locked(7), Ok(true));
    }

    #[test]
    fn test_profile_matrix() {
        let mut locker = ObjectLocker::<u32>::new(3, true).unwrap();
        for i in 0..3 {
            locker.register(i).unwrap();
        }
        locker.lock(0).unwrap();
        locker.lock(2).unwrap();
        locker.unlock(0).unwrap();
        locker.lock(1).unwrap();

        let m = locker.profile_matrix().unwrap();
        assert_eq!(&m[0..3], &[0, 0, 0]);
        assert_eq!(&m[3..6], &[0, 0, 1]);
        assert_eq!(&m[6..9], &[1, 0, 0]);

        locker.reset_profile();
        assert!(locker.profile_matrix().unwrap().iter().all(|v| *v == 0));
    }
}
