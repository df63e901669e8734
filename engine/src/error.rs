// SPDX-License-Identifier: Apache-2.0

//! Engine error type definitions.
//!
//! Every error maps to a distinct 16 bit status word, so that a command
//! dispatching layer can report it verbatim.

use crate::utils_common;
use core::convert;

const ENGINE_ERROR_CODE_RESIZE_TO_LONGER: u16 = 0x7000;
const ENGINE_ERROR_CODE_REALLOCATION_NOT_ALLOWED: u16 = 0x7001;
const ENGINE_ERROR_CODE_MODULO_TOO_LARGE: u16 = 0x7002;
const ENGINE_ERROR_CODE_INVALID_COPY_OTHER: u16 = 0x7003;
const ENGINE_ERROR_CODE_LOCK_ALREADY_LOCKED: u16 = 0x7005;
const ENGINE_ERROR_CODE_LOCK_NOT_LOCKED: u16 = 0x7006;
const ENGINE_ERROR_CODE_LOCK_OBJECT_NOT_FOUND: u16 = 0x7007;
const ENGINE_ERROR_CODE_LOCK_NO_FREE_SLOT: u16 = 0x7008;
const ENGINE_ERROR_CODE_LOCK_OBJECT_MISMATCH: u16 = 0x7009;
const ENGINE_ERROR_CODE_POINT_INVALID_LENGTH: u16 = 0x700a;
const ENGINE_ERROR_CODE_POINT_UNEXPECTED_KA_LENGTH: u16 = 0x700b;
const ENGINE_ERROR_CODE_CAPACITY_EXCEEDED: u16 = 0x700c;
const ENGINE_ERROR_CODE_NEGATIVE_RESULT: u16 = 0x700d;
const ENGINE_ERROR_CODE_DIVISION_BY_ZERO: u16 = 0x700e;
const ENGINE_ERROR_CODE_NOT_INVERTIBLE: u16 = 0x700f;
const ENGINE_ERROR_CODE_NON_RESIDUE: u16 = 0x7010;
const ENGINE_ERROR_CODE_POINT_AT_INFINITY: u16 = 0x7011;
const ENGINE_ERROR_CODE_INVALID_POINT: u16 = 0x7012;
const ENGINE_ERROR_CODE_UNSUPPORTED_KEY_LENGTH: u16 = 0x7013;
const ENGINE_ERROR_CODE_MEMORY_ALLOCATION_FAILURE: u16 = 0x7014;
const ENGINE_ERROR_CODE_INTERNAL: u16 = 0x7015;
const ENGINE_ERROR_CODE_LOCK_ALREADY_REGISTERED: u16 = 0x7016;
const ENGINE_ERROR_CODE_ILLEGAL_VALUE: u16 = 0x7017;

const PLATFORM_ERROR_CODE_UNKNOWN: u16 = 0xff01;
const PLATFORM_ERROR_CODE_ARRAY_INDEX_OUT_OF_BOUNDS: u16 = 0xff02;
const PLATFORM_ERROR_CODE_ARITHMETIC: u16 = 0xff03;
const PLATFORM_ERROR_CODE_CRYPTO_PREFIX: u16 = 0xf100;
const PLATFORM_ERROR_CODE_SYSTEM_PREFIX: u16 = 0xf200;

/// Coarse classification of [`EngineError`]s.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// Storage could not be set up.
    Resource,
    /// A result would exceed a value's fixed allocated capacity, or a
    /// reallocation has been attempted.
    Capacity,
    /// Violation of the scratch object lock protocol.
    Lock,
    /// Invalid arithmetic or elliptic curve input.
    Domain,
    /// Failure reported by the underlying platform.
    Platform,
}

/// Origin of a fault raised by the underlying platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlatformErrorKind {
    /// A cryptographic engine rejected a request.
    Crypto,
    /// Some system level resource failure.
    System,
    /// Out of bounds buffer access.
    ArrayIndexOutOfBounds,
    /// Arithmetic fault.
    Arithmetic,
    /// Anything not covered by the above.
    Unknown,
}

/// Fault raised by a [`Platform`](crate::platform::Platform) primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlatformError {
    pub kind: PlatformErrorKind,
    /// The platform's own reason code.
    pub reason: u8,
}

impl PlatformError {
    /// An argument had an invalid value.
    pub const REASON_ILLEGAL_VALUE: u8 = 1;
    /// A key was used before being initialized.
    pub const REASON_UNINITIALIZED_KEY: u8 = 2;
    /// The requested algorithm is not supported.
    pub const REASON_NO_SUCH_ALGORITHM: u8 = 3;
    /// An engine was used with an invalid initialization.
    pub const REASON_INVALID_INIT: u8 = 4;
    /// An engine was used in an unsupported way.
    pub const REASON_ILLEGAL_USE: u8 = 5;

    pub const fn crypto(reason: u8) -> Self {
        Self {
            kind: PlatformErrorKind::Crypto,
            reason,
        }
    }

    pub const fn system(reason: u8) -> Self {
        Self {
            kind: PlatformErrorKind::System,
            reason,
        }
    }

    const fn status_word(&self) -> u16 {
        match self.kind {
            PlatformErrorKind::Crypto => PLATFORM_ERROR_CODE_CRYPTO_PREFIX | self.reason as u16,
            PlatformErrorKind::System => PLATFORM_ERROR_CODE_SYSTEM_PREFIX | self.reason as u16,
            PlatformErrorKind::ArrayIndexOutOfBounds => PLATFORM_ERROR_CODE_ARRAY_INDEX_OUT_OF_BOUNDS,
            PlatformErrorKind::Arithmetic => PLATFORM_ERROR_CODE_ARITHMETIC,
            PlatformErrorKind::Unknown => PLATFORM_ERROR_CODE_UNKNOWN,
        }
    }

    const fn from_status_word(sw: u16) -> Option<Self> {
        let kind = match sw {
            PLATFORM_ERROR_CODE_UNKNOWN => PlatformErrorKind::Unknown,
            PLATFORM_ERROR_CODE_ARRAY_INDEX_OUT_OF_BOUNDS => PlatformErrorKind::ArrayIndexOutOfBounds,
            PLATFORM_ERROR_CODE_ARITHMETIC => PlatformErrorKind::Arithmetic,
            _ => match sw & 0xff00 {
                PLATFORM_ERROR_CODE_CRYPTO_PREFIX => return Some(Self::crypto(sw as u8)),
                PLATFORM_ERROR_CODE_SYSTEM_PREFIX => return Some(Self::system(sw as u8)),
                _ => return None,
            },
        };
        Some(Self { kind, reason: 0 })
    }
}

/// Common error returned by all engine operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineError {
    /// Memory allocation failure while setting up storage.
    MemoryAllocationFailure,
    /// Attempt to set a logical length beyond the allocated capacity.
    ResizeToLonger,
    /// A value would have to be reallocated to hold the result.
    ReallocationNotAllowed,
    /// A modulus is too large for the scratch storage reserved for it.
    ModuloTooLarge,
    /// A copy would drop significant bytes of the source.
    InvalidCopyOther,
    /// The result of an arithmetic operation exceeds the destination's
    /// capacity.
    CapacityExceeded,
    /// Unsigned subtraction with a subtrahend larger than the minuend.
    NegativeResult,
    /// Malformed serialized input.
    IllegalValue,
    /// Division or reduction by zero.
    DivisionByZero,
    /// The value has no inverse modulo the given modulus.
    NotInvertible,
    /// The value is not a quadratic residue modulo the given prime.
    NonResidue,
    /// Attempt to lock an object which is locked already.
    LockAlreadyLocked,
    /// Attempt to unlock an object which is not locked.
    LockNotLocked,
    /// The object has not been registered with the lock table.
    LockObjectNotFound,
    /// The object has been registered with the lock table already.
    LockAlreadyRegistered,
    /// The lock table is exhausted.
    LockNoFreeSlot,
    /// A lock slot is owned by a different object than the one specified.
    LockObjectMismatch,
    /// Encoded point of invalid length.
    PointInvalidLength,
    /// The platform's key agreement returned an unexpected amount of data.
    PointUnexpectedKaLength,
    /// Malformed point encoding or a point not on the curve.
    InvalidPoint,
    /// The result would be the point at infinity, which has no affine
    /// encoding.
    PointAtInfinity,
    /// Requested curve size is not supported by the configuration.
    UnsupportedKeyLength,
    /// Internal logic error.
    Internal,
    /// Fault raised by the underlying platform.
    Platform(PlatformError),
}

impl EngineError {
    /// Status word a command dispatching layer reports for this error.
    pub const fn status_word(&self) -> u16 {
        match self {
            Self::ResizeToLonger => ENGINE_ERROR_CODE_RESIZE_TO_LONGER,
            Self::ReallocationNotAllowed => ENGINE_ERROR_CODE_REALLOCATION_NOT_ALLOWED,
            Self::ModuloTooLarge => ENGINE_ERROR_CODE_MODULO_TOO_LARGE,
            Self::InvalidCopyOther => ENGINE_ERROR_CODE_INVALID_COPY_OTHER,
            Self::LockAlreadyLocked => ENGINE_ERROR_CODE_LOCK_ALREADY_LOCKED,
            Self::LockNotLocked => ENGINE_ERROR_CODE_LOCK_NOT_LOCKED,
            Self::LockObjectNotFound => ENGINE_ERROR_CODE_LOCK_OBJECT_NOT_FOUND,
            Self::LockAlreadyRegistered => ENGINE_ERROR_CODE_LOCK_ALREADY_REGISTERED,
            Self::LockNoFreeSlot => ENGINE_ERROR_CODE_LOCK_NO_FREE_SLOT,
            Self::LockObjectMismatch => ENGINE_ERROR_CODE_LOCK_OBJECT_MISMATCH,
            Self::PointInvalidLength => ENGINE_ERROR_CODE_POINT_INVALID_LENGTH,
            Self::PointUnexpectedKaLength => ENGINE_ERROR_CODE_POINT_UNEXPECTED_KA_LENGTH,
            Self::CapacityExceeded => ENGINE_ERROR_CODE_CAPACITY_EXCEEDED,
            Self::NegativeResult => ENGINE_ERROR_CODE_NEGATIVE_RESULT,
            Self::IllegalValue => ENGINE_ERROR_CODE_ILLEGAL_VALUE,
            Self::DivisionByZero => ENGINE_ERROR_CODE_DIVISION_BY_ZERO,
            Self::NotInvertible => ENGINE_ERROR_CODE_NOT_INVERTIBLE,
            Self::NonResidue => ENGINE_ERROR_CODE_NON_RESIDUE,
            Self::PointAtInfinity => ENGINE_ERROR_CODE_POINT_AT_INFINITY,
            Self::InvalidPoint => ENGINE_ERROR_CODE_INVALID_POINT,
            Self::UnsupportedKeyLength => ENGINE_ERROR_CODE_UNSUPPORTED_KEY_LENGTH,
            Self::MemoryAllocationFailure => ENGINE_ERROR_CODE_MEMORY_ALLOCATION_FAILURE,
            Self::Internal => ENGINE_ERROR_CODE_INTERNAL,
            Self::Platform(e) => e.status_word(),
        }
    }

    /// Map a status word back to the error it has been produced from.
    ///
    /// Returns `None` for status words not produced by
    /// [`status_word()`](Self::status_word).
    ///
    /// # Arguments:
    ///
    /// * `sw` - The status word.
    pub const fn from_status_word(sw: u16) -> Option<Self> {
        Some(match sw {
            ENGINE_ERROR_CODE_RESIZE_TO_LONGER => Self::ResizeToLonger,
            ENGINE_ERROR_CODE_REALLOCATION_NOT_ALLOWED => Self::ReallocationNotAllowed,
            ENGINE_ERROR_CODE_MODULO_TOO_LARGE => Self::ModuloTooLarge,
            ENGINE_ERROR_CODE_INVALID_COPY_OTHER => Self::InvalidCopyOther,
            ENGINE_ERROR_CODE_LOCK_ALREADY_LOCKED => Self::LockAlreadyLocked,
            ENGINE_ERROR_CODE_LOCK_NOT_LOCKED => Self::LockNotLocked,
            ENGINE_ERROR_CODE_LOCK_OBJECT_NOT_FOUND => Self::LockObjectNotFound,
            ENGINE_ERROR_CODE_LOCK_ALREADY_REGISTERED => Self::LockAlreadyRegistered,
            ENGINE_ERROR_CODE_LOCK_NO_FREE_SLOT => Self::LockNoFreeSlot,
            ENGINE_ERROR_CODE_LOCK_OBJECT_MISMATCH => Self::LockObjectMismatch,
            ENGINE_ERROR_CODE_POINT_INVALID_LENGTH => Self::PointInvalidLength,
            ENGINE_ERROR_CODE_POINT_UNEXPECTED_KA_LENGTH => Self::PointUnexpectedKaLength,
            ENGINE_ERROR_CODE_CAPACITY_EXCEEDED => Self::CapacityExceeded,
            ENGINE_ERROR_CODE_NEGATIVE_RESULT => Self::NegativeResult,
            ENGINE_ERROR_CODE_ILLEGAL_VALUE => Self::IllegalValue,
            ENGINE_ERROR_CODE_DIVISION_BY_ZERO => Self::DivisionByZero,
            ENGINE_ERROR_CODE_NOT_INVERTIBLE => Self::NotInvertible,
            ENGINE_ERROR_CODE_NON_RESIDUE => Self::NonResidue,
            ENGINE_ERROR_CODE_POINT_AT_INFINITY => Self::PointAtInfinity,
            ENGINE_ERROR_CODE_INVALID_POINT => Self::InvalidPoint,
            ENGINE_ERROR_CODE_UNSUPPORTED_KEY_LENGTH => Self::UnsupportedKeyLength,
            ENGINE_ERROR_CODE_MEMORY_ALLOCATION_FAILURE => Self::MemoryAllocationFailure,
            ENGINE_ERROR_CODE_INTERNAL => Self::Internal,
            _ => match PlatformError::from_status_word(sw) {
                Some(e) => Self::Platform(e),
                None => return None,
            },
        })
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MemoryAllocationFailure | Self::Internal | Self::UnsupportedKeyLength => ErrorKind::Resource,
            Self::ResizeToLonger
            | Self::ReallocationNotAllowed
            | Self::ModuloTooLarge
            | Self::InvalidCopyOther
            | Self::CapacityExceeded => ErrorKind::Capacity,
            Self::LockAlreadyLocked
            | Self::LockNotLocked
            | Self::LockObjectNotFound
            | Self::LockAlreadyRegistered
            | Self::LockNoFreeSlot
            | Self::LockObjectMismatch => ErrorKind::Lock,
            Self::NegativeResult
            | Self::IllegalValue
            | Self::DivisionByZero
            | Self::NotInvertible
            | Self::NonResidue
            | Self::PointInvalidLength
            | Self::PointUnexpectedKaLength
            | Self::InvalidPoint
            | Self::PointAtInfinity => ErrorKind::Domain,
            Self::Platform(_) => ErrorKind::Platform,
        }
    }
}

impl convert::From<utils_common::alloc::TryNewError> for EngineError {
    fn from(value: utils_common::alloc::TryNewError) -> Self {
        match value {
            utils_common::alloc::TryNewError::MemoryAllocationFailure => Self::MemoryAllocationFailure,
        }
    }
}

impl convert::From<PlatformError> for EngineError {
    fn from(value: PlatformError) -> Self {
        Self::Platform(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_words_distinct() {
        let all = [
            EngineError::MemoryAllocationFailure,
            EngineError::ResizeToLonger,
            EngineError::ReallocationNotAllowed,
            EngineError::ModuloTooLarge,
            EngineError::InvalidCopyOther,
            EngineError::CapacityExceeded,
            EngineError::NegativeResult,
            EngineError::IllegalValue,
            EngineError::DivisionByZero,
            EngineError::NotInvertible,
            EngineError::NonResidue,
            EngineError::LockAlreadyLocked,
            EngineError::LockNotLocked,
            EngineError::LockObjectNotFound,
            EngineError::LockAlreadyRegistered,
            EngineError::LockNoFreeSlot,
            EngineError::LockObjectMismatch,
            EngineError::PointInvalidLength,
            EngineError::PointUnexpectedKaLength,
            EngineError::InvalidPoint,
            EngineError::PointAtInfinity,
            EngineError::UnsupportedKeyLength,
            EngineError::Internal,
            EngineError::Platform(PlatformError::crypto(PlatformError::REASON_ILLEGAL_VALUE)),
            EngineError::Platform(PlatformError::system(3)),
        ];
        for (i, e) in all.iter().enumerate() {
            for f in all[i + 1..].iter() {
                assert_ne!(e.status_word(), f.status_word());
            }
            assert_eq!(EngineError::from_status_word(e.status_word()), Some(*e));
        }
    }

    #[test]
    fn test_platform_reason_preserved() {
        let e = EngineError::from(PlatformError::crypto(PlatformError::REASON_NO_SUCH_ALGORITHM));
        assert_eq!(e.status_word(), 0xf103);
        assert_eq!(e.kind(), ErrorKind::Platform);
        assert_eq!(EngineError::from_status_word(0x1234), None);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(EngineError::CapacityExceeded.kind(), ErrorKind::Capacity);
        assert_eq!(EngineError::LockNotLocked.kind(), ErrorKind::Lock);
        assert_eq!(EngineError::NonResidue.kind(), ErrorKind::Domain);
    }
}
