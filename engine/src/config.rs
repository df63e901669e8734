// SPDX-License-Identifier: Apache-2.0

//! Arena sizing and lock table configuration.

use crate::EngineError;

/// Sizing and behaviour of an [`Arena`](crate::arena::Arena).
///
/// All scratch storage gets dimensioned from these values once, at arena
/// creation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Largest modulus length in bytes the platform's general modular
    /// exponentiation engine gets used for.
    pub mod_engine_len: usize,
    /// Length in bytes of the fixed modulus configured for the
    /// coprocessor squaring engine.
    pub mult_engine_len: usize,
    /// Capacity of the general purpose scratch Bignats.
    pub max_bignat_len: usize,
    /// Maximum length of the coordinate pair `x || y` of a point.
    pub max_point_len: usize,
    /// Maximum length of a single point coordinate.
    pub max_coord_len: usize,

    /// Whether the lock table actually tracks locks.
    pub locking_active: bool,
    /// Zero scratch objects when they get locked.
    pub erase_on_lock: bool,
    /// Zero scratch objects when they get unlocked.
    pub erase_on_unlock: bool,
    /// Record the lock occupancy matrix.
    pub profile_locks: bool,
}

impl EngineConfig {
    /// Obtain the configuration suitable for curves of up to `max_key_bits`
    /// bits.
    ///
    /// # Arguments:
    ///
    /// * `max_key_bits` - Bit length of the largest curve prime to support.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::UnsupportedKeyLength`] - No configuration for curves
    ///   of that size.
    pub const fn for_key_length(max_key_bits: usize) -> Result<Self, EngineError> {
        let (mod_engine_bits, mult_engine_bits, max_point_len) = if max_key_bits == 0 {
            return Err(EngineError::UnsupportedKeyLength);
        } else if max_key_bits <= 256 {
            (512, 768, 64)
        } else if max_key_bits <= 384 {
            (768, 1024, 96)
        } else if max_key_bits <= 512 {
            (1024, 1280, 128)
        } else if max_key_bits <= 521 {
            (1280, 1280, 132)
        } else {
            return Err(EngineError::UnsupportedKeyLength);
        };

        Ok(Self {
            mod_engine_len: mod_engine_bits / 8,
            mult_engine_len: mult_engine_bits / 8,
            max_bignat_len: mod_engine_bits / 8 + 1,
            max_point_len,
            max_coord_len: max_point_len / 2,
            locking_active: true,
            erase_on_lock: false,
            erase_on_unlock: false,
            profile_locks: false,
        })
    }

    /// Disable lock tracking, e.g. for a validated release build.
    pub const fn without_locking(mut self) -> Self {
        self.locking_active = false;
        self
    }

    /// Enable recording of the lock occupancy matrix.
    pub const fn with_lock_profiling(mut self) -> Self {
        self.profile_locks = true;
        self
    }

    /// Zero scratch storage upon locking and unlocking.
    pub const fn with_erasure(mut self, on_lock: bool, on_unlock: bool) -> Self {
        self.erase_on_lock = on_lock;
        self.erase_on_unlock = on_unlock;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_key_length() {
        let c = EngineConfig::for_key_length(256).unwrap();
        assert_eq!(c.mod_engine_len, 64);
        assert_eq!(c.mult_engine_len, 96);
        assert_eq!(c.max_bignat_len, 65);
        assert_eq!(c.max_coord_len, 32);
        assert!(c.locking_active);

        assert_eq!(EngineConfig::for_key_length(224), Ok(c));

        let c = EngineConfig::for_key_length(521).unwrap();
        assert_eq!(c.max_coord_len, 66);
        assert_eq!(c.max_bignat_len, 161);

        assert_eq!(EngineConfig::for_key_length(0), Err(EngineError::UnsupportedKeyLength));
        assert_eq!(EngineConfig::for_key_length(1024), Err(EngineError::UnsupportedKeyLength));
    }
}
