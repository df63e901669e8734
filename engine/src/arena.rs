// SPDX-License-Identifier: Apache-2.0

//! Fixed pool of named scratch objects shared by all engine algorithms.
//!
//! Every algorithm borrows the scratch [`Bignat`]s and byte buffers it needs
//! for the duration of a step through [`Arena::with_bignats()`] or
//! [`Arena::with_buffers()`]. Checking an object out locks it in the arena's
//! [`ObjectLocker`], checking it back in unlocks it again. An algorithm
//! nested into another one which attempts to check out a scratch object
//! still held by the outer one gets [`EngineError::LockAlreadyLocked`].
//!
//! If a step fails, its scratch objects are put back, but remain locked
//! until [`Arena::unlock_all()`] gets invoked.

extern crate alloc;
use alloc::{boxed::Box, vec::Vec};
use core::array;

use crate::bignat::Bignat;
use crate::config::EngineConfig;
use crate::locker::{LockHandle, ObjectLocker};
use crate::platform::Platform;
use crate::utils_common::{alloc::box_try_new, alloc::try_alloc_zeroizing_bytes, zeroize};
use crate::EngineError;

/// Operand length in bytes below which schoolbook multiplication beats the
/// coprocessor's squaring engine.
pub const FAST_MULT_THRESHOLD: usize = 16;

/// Named scratch [`Bignat`]s.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScratchBignat {
    A,
    B,
    C,
    D,
    E,
    /// Two bytes larger than the others, for exponentiation results.
    F,
    /// Point sized.
    EcA,
    EcB,
    EcC,
    EcD,
    EcE,
    EcF,
}

impl ScratchBignat {
    const ALL: [Self; 12] = [
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::EcA,
        Self::EcB,
        Self::EcC,
        Self::EcD,
        Self::EcE,
        Self::EcF,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn capacity(self, config: &EngineConfig) -> usize {
        match self {
            Self::A | Self::B | Self::C | Self::D | Self::E => config.max_bignat_len,
            Self::F => config.max_bignat_len + 2,
            Self::EcA => config.max_point_len,
            Self::EcB | Self::EcC | Self::EcD | Self::EcE | Self::EcF => config.max_coord_len,
        }
    }
}

/// Named scratch byte buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScratchBuffer {
    /// Multiplication engine sized.
    Array1,
    /// Multiplication engine sized.
    Array2,
    /// Holds an encoded point.
    UncompressedPoint,
    /// Holds a digest.
    HashArray,
}

impl ScratchBuffer {
    const ALL: [Self; 4] = [Self::Array1, Self::Array2, Self::UncompressedPoint, Self::HashArray];

    fn index(self) -> usize {
        self as usize
    }

    fn len(self, config: &EngineConfig, digest_len: usize) -> usize {
        match self {
            Self::Array1 | Self::Array2 => config.mult_engine_len,
            Self::UncompressedPoint => (1 + config.max_point_len).max(digest_len),
            Self::HashArray => digest_len,
        }
    }
}

/// Identity of a scratch object in the arena's lock table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScratchId {
    Bignat(ScratchBignat),
    Buffer(ScratchBuffer),
}

/// Multiplication algorithm selected at arena creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MultStrategy {
    /// Three squarings on the coprocessor's squaring engine, whose fixed
    /// modulus is `engine_len` bytes long.
    Coprocessor { engine_len: usize },
    /// Software multiply-accumulate.
    Schoolbook,
}

pub type ScratchBuf = zeroize::Zeroizing<Vec<u8>>;

/// Owner of all shared scratch storage, the lock table guarding it and the
/// platform primitives.
pub struct Arena {
    config: EngineConfig,
    platform: Box<dyn Platform>,
    locker: ObjectLocker<ScratchId>,
    bignats: [Option<Bignat>; 12],
    bignat_handles: [LockHandle; 12],
    buffers: [Option<ScratchBuf>; 4],
    buffer_handles: [LockHandle; 4],
    mult_strategy: MultStrategy,
    allocated_bytes: usize,
}

impl Arena {
    /// Set up all scratch storage and detect the platform's capabilities.
    ///
    /// # Arguments:
    ///
    /// * `config` - Sizing of the scratch storage and lock table options.
    /// * `platform` - The platform primitives to drive.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::MemoryAllocationFailure`] - Failed to allocate the
    ///   scratch storage.
    /// * [`EngineError::LockNoFreeSlot`] - The lock table is too small.
    pub fn new<P: Platform + 'static>(config: EngineConfig, platform: P) -> Result<Self, EngineError> {
        let platform: Box<dyn Platform> = box_try_new(platform)?;
        let digest_len = platform.digest_len();

        let num_objects = ScratchBignat::ALL.len() + ScratchBuffer::ALL.len();
        let mut locker = ObjectLocker::new(num_objects, config.profile_locks)?;
        locker.set_erasure(config.erase_on_lock, config.erase_on_unlock);

        let mut allocated_bytes = 0;
        let mut bignats: [Option<Bignat>; 12] = Default::default();
        let mut bignat_handles = [LockHandle::default(); 12];
        for role in ScratchBignat::ALL {
            let capacity = role.capacity(&config);
            bignats[role.index()] = Some(Bignat::new(capacity)?);
            bignat_handles[role.index()] = locker.register(ScratchId::Bignat(role))?;
            allocated_bytes += capacity;
        }
        let mut buffers: [Option<ScratchBuf>; 4] = Default::default();
        let mut buffer_handles = [LockHandle::default(); 4];
        for role in ScratchBuffer::ALL {
            let len = role.len(&config, digest_len);
            buffers[role.index()] = Some(try_alloc_zeroizing_bytes(len)?);
            buffer_handles[role.index()] = locker.register(ScratchId::Buffer(role))?;
            allocated_bytes += len;
        }
        // Locking gets switched off only after registration.
        locker.set_locking_active(config.locking_active);

        let mut arena = Self {
            config,
            platform,
            locker,
            bignats,
            bignat_handles,
            buffers,
            buffer_handles,
            mult_strategy: MultStrategy::Schoolbook,
            allocated_bytes,
        };
        arena.mult_strategy = arena.detect_square_engine();
        log::info!(
            "arena: {} bytes of scratch storage, multiplication strategy {:?}",
            arena.allocated_bytes,
            arena.mult_strategy
        );
        Ok(arena)
    }

    fn detect_square_engine(&mut self) -> MultStrategy {
        let engine_len = self.config.mult_engine_len;
        let try_square = |arena: &mut Self| -> Result<(), EngineError> {
            arena.with_buffers([ScratchBuffer::Array1], |[buf], arena| {
                buf.fill(0xff);
                arena.platform.init_square_engine(&buf[..])?;
                buf.fill(6);
                arena.platform.square(&mut buf[..])?;
                buf.fill(0);
                Ok(())
            })
        };
        match try_square(self) {
            Ok(()) => MultStrategy::Coprocessor { engine_len },
            Err(e) => {
                log::warn!("coprocessor squaring unavailable ({:?}), using schoolbook multiplication", e);
                // The trial squaring's buffer may have been left locked.
                self.locker.unlock_all();
                MultStrategy::Schoolbook
            }
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn multiplication_strategy(&self) -> MultStrategy {
        self.mult_strategy
    }

    /// Total number of bytes allocated for scratch storage.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    pub fn platform_mut(&mut self) -> &mut dyn Platform {
        self.platform.as_mut()
    }

    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    /// Register an additional object with the lock table.
    ///
    /// All scratch objects are registered at creation time already, hence
    /// this fails with [`EngineError::LockAlreadyRegistered`].
    pub fn register(&mut self, object: ScratchId) -> Result<LockHandle, EngineError> {
        self.locker.register(object)
    }

    pub fn lock(&mut self, object: ScratchId) -> Result<(), EngineError> {
        self.locker.lock(object)
    }

    pub fn unlock(&mut self, object: ScratchId) -> Result<(), EngineError> {
        self.locker.unlock(object)
    }

    /// Release all locks after an operation has been aborted by an error.
    pub fn unlock_all(&mut self) {
        let num_locked = self.locker.num_locked();
        if num_locked != 0 {
            log::debug!("unlock_all: releasing {} scratch objects", num_locked);
        }
        self.locker.unlock_all();
    }

    pub fn is_locked(&self, object: ScratchId) -> Result<bool, EngineError> {
        self.locker.is_locked(object)
    }

    pub fn set_locking_active(&mut self, active: bool) {
        self.locker.set_locking_active(active);
    }

    /// The lock occupancy matrix, if lock profiling has been enabled.
    pub fn lock_profile(&self) -> Option<&[u8]> {
        self.locker.profile_matrix()
    }

    pub fn reset_lock_profile(&mut self) {
        self.locker.reset_profile();
    }

    /// Zero all scratch storage currently held by the arena.
    pub fn erase(&mut self) {
        for bn in self.bignats.iter_mut().flatten() {
            bn.erase();
        }
        for buf in self.buffers.iter_mut().flatten() {
            buf.fill(0);
        }
    }

    /// Check out scratch [`Bignat`]s for the duration of `f`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::LockAlreadyLocked`] - Some of the requested objects
    ///   are in use already.
    /// * Anything returned by `f`. The requested objects stay locked in
    ///   this case.
    pub fn with_bignats<const N: usize, R, F>(&mut self, roles: [ScratchBignat; N], f: F) -> Result<R, EngineError>
    where
        F: FnOnce(&mut [Bignat; N], &mut Self) -> Result<R, EngineError>,
    {
        let ids = roles.map(|role| (ScratchId::Bignat(role), role.index(), self.bignat_handles[role.index()]));
        let mut objects = check_out(&mut self.locker, &mut self.bignats, ids)?;
        if self.locker.erase_on_lock() {
            objects.iter_mut().for_each(|bn| bn.erase());
        }
        let result = f(&mut objects, self);
        if self.locker.erase_on_unlock() {
            objects.iter_mut().for_each(|bn| bn.erase());
        }
        check_in(&mut self.locker, &mut self.bignats, ids, objects, result.is_ok())?;
        result
    }

    /// Check out scratch buffers for the duration of `f`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::LockAlreadyLocked`] - Some of the requested objects
    ///   are in use already.
    /// * Anything returned by `f`. The requested objects stay locked in
    ///   this case.
    pub fn with_buffers<const N: usize, R, F>(&mut self, roles: [ScratchBuffer; N], f: F) -> Result<R, EngineError>
    where
        F: FnOnce(&mut [ScratchBuf; N], &mut Self) -> Result<R, EngineError>,
    {
        let ids = roles.map(|role| (ScratchId::Buffer(role), role.index(), self.buffer_handles[role.index()]));
        let mut objects = check_out(&mut self.locker, &mut self.buffers, ids)?;
        if self.locker.erase_on_lock() {
            objects.iter_mut().for_each(|buf| buf.fill(0));
        }
        let result = f(&mut objects, self);
        if self.locker.erase_on_unlock() {
            objects.iter_mut().for_each(|buf| buf.fill(0));
        }
        check_in(&mut self.locker, &mut self.buffers, ids, objects, result.is_ok())?;
        result
    }
}

fn check_out<T: Default, const N: usize>(
    locker: &mut ObjectLocker<ScratchId>,
    store: &mut [Option<T>],
    ids: [(ScratchId, usize, LockHandle); N],
) -> Result<[T; N], EngineError> {
    for (id, _, handle) in ids {
        locker.lock_at(handle, id)?;
    }

    let mut taken: [Option<T>; N] = array::from_fn(|i| store[ids[i].1].take());
    if taken.iter().any(|object| object.is_none()) {
        // With locking disabled, a nested checkout of an object in use
        // finds its storage gone.
        for (i, object) in taken.iter_mut().enumerate() {
            if let Some(object) = object.take() {
                store[ids[i].1] = Some(object);
            }
        }
        return Err(EngineError::LockAlreadyLocked);
    }
    Ok(taken.map(|object| object.unwrap_or_default()))
}

fn check_in<T, const N: usize>(
    locker: &mut ObjectLocker<ScratchId>,
    store: &mut [Option<T>],
    ids: [(ScratchId, usize, LockHandle); N],
    objects: [T; N],
    unlock: bool,
) -> Result<(), EngineError> {
    for ((_, index, _), object) in ids.iter().zip(objects) {
        store[*index] = Some(object);
    }
    if unlock {
        for (id, _, handle) in ids.iter().rev() {
            locker.unlock_at(*handle, *id)?;
        }
    }
    Ok(())
}

#[cfg(all(test, feature = "software_platform"))]
pub(crate) mod tests {
    use super::*;
    use crate::platform::SoftwarePlatform;

    pub(crate) fn test_arena(max_key_bits: usize) -> Arena {
        let config = EngineConfig::for_key_length(max_key_bits).unwrap();
        Arena::new(config, SoftwarePlatform::new(b"arena tests")).unwrap()
    }

    #[test]
    fn test_setup() {
        let arena = test_arena(256);
        assert_eq!(arena.multiplication_strategy(), MultStrategy::Coprocessor { engine_len: 96 });
        // 5 * 65 + 67 + 64 + 5 * 32 + 2 * 96 + 65 + 32
        assert_eq!(arena.allocated_bytes(), 325 + 67 + 64 + 160 + 192 + 65 + 32);
        for role in ScratchBignat::ALL {
            assert_eq!(arena.is_locked(ScratchId::Bignat(role)), Ok(false));
        }
    }

    #[test]
    fn test_square_engine_fallback() {
        let config = EngineConfig::for_key_length(256).unwrap();
        let arena = Arena::new(config, SoftwarePlatform::new(b"").without_square_engine()).unwrap();
        assert_eq!(arena.multiplication_strategy(), MultStrategy::Schoolbook);
        assert_eq!(arena.is_locked(ScratchId::Buffer(ScratchBuffer::Array1)), Ok(false));
    }

    #[test]
    fn test_register_twice() {
        let mut arena = test_arena(256);
        assert_eq!(
            arena.register(ScratchId::Bignat(ScratchBignat::A)),
            Err(EngineError::LockAlreadyRegistered)
        );
        assert_eq!(
            arena.register(ScratchId::Buffer(ScratchBuffer::HashArray)),
            Err(EngineError::LockAlreadyRegistered)
        );
    }

    #[test]
    fn test_nested_checkout_conflict() {
        let mut arena = test_arena(256);
        let r = arena.with_bignats([ScratchBignat::A, ScratchBignat::B], |_, arena| {
            assert_eq!(arena.is_locked(ScratchId::Bignat(ScratchBignat::A)), Ok(true));
            arena.with_bignats([ScratchBignat::C, ScratchBignat::B], |_, _| Ok(()))
        });
        assert_eq!(r, Err(EngineError::LockAlreadyLocked));

        // A and B stay locked until recovery, C got locked before the
        // conflict was detected.
        assert_eq!(arena.is_locked(ScratchId::Bignat(ScratchBignat::A)), Ok(true));
        assert_eq!(arena.is_locked(ScratchId::Bignat(ScratchBignat::C)), Ok(true));
        assert_eq!(
            arena.with_bignats([ScratchBignat::A], |_, _| Ok(())),
            Err(EngineError::LockAlreadyLocked)
        );
        arena.unlock_all();
        arena
            .with_bignats([ScratchBignat::A, ScratchBignat::B, ScratchBignat::C], |bns, _| {
                assert!(bns.iter().all(|bn| bn.capacity() == 65));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_checkout_without_locking() {
        let config = EngineConfig::for_key_length(256).unwrap().without_locking();
        let mut arena = Arena::new(config, SoftwarePlatform::new(b"")).unwrap();
        arena
            .with_buffers([ScratchBuffer::HashArray], |[buf], arena| {
                assert_eq!(buf.len(), 32);
                assert_eq!(arena.is_locked(ScratchId::Buffer(ScratchBuffer::HashArray)), Ok(false));
                // Storage is gone, even though no lock is being tracked.
                assert_eq!(
                    arena.with_buffers([ScratchBuffer::HashArray], |_, _| Ok(())),
                    Err(EngineError::LockAlreadyLocked)
                );
                Ok(())
            })
            .unwrap();
        arena.with_buffers([ScratchBuffer::HashArray], |_, _| Ok(())).unwrap();
    }

    #[test]
    fn test_erase_on_unlock() {
        let config = EngineConfig::for_key_length(256).unwrap().with_erasure(false, true);
        let mut arena = Arena::new(config, SoftwarePlatform::new(b"")).unwrap();
        arena
            .with_bignats([ScratchBignat::D], |[d], _| d.from_byte_array(&[1, 2, 3]))
            .unwrap();
        arena
            .with_bignats([ScratchBignat::D], |[d], _| {
                assert!(d.is_zero());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_lock_profile() {
        let config = EngineConfig::for_key_length(256).unwrap().with_lock_profiling();
        let mut arena = Arena::new(config, SoftwarePlatform::new(b"")).unwrap();
        arena
            .with_bignats([ScratchBignat::A], |_, arena| {
                arena.with_buffers([ScratchBuffer::Array2], |_, _| Ok(()))
            })
            .unwrap();
        let n = ScratchBignat::ALL.len() + ScratchBuffer::ALL.len();
        let m = arena.lock_profile().unwrap();
        let array2 = ScratchBignat::ALL.len() + ScratchBuffer::Array2.index();
        assert_eq!(m[array2 * n + ScratchBignat::A.index()], 1);
        assert_eq!(m[ScratchBignat::A.index() * n + array2], 0);
    }
}
