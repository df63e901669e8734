// SPDX-License-Identifier: Apache-2.0

//! Bounded capacity unsigned big integers.
//!
//! A [`Bignat`] stores its value big-endian in a buffer whose length, the
//! capacity, gets fixed at construction time and never changes afterwards.
//! The logical length denotes the number of trailing bytes of that buffer
//! making up the value. All bytes in front of the logical window are kept
//! zero, so that the value is always equal to the value of the complete
//! buffer.
//!
//! Results which would exceed the capacity are reported as errors, never
//! truncated.

extern crate alloc;
use alloc::vec::Vec;
use core::{cmp, fmt};

use crate::EngineError;
use crate::utils_common::{alloc::try_alloc_zeroizing_bytes, zeroize};

mod arith;
mod modular;

#[derive(Default)]
pub struct Bignat {
    value: zeroize::Zeroizing<Vec<u8>>,
    size: usize,
}

impl fmt::Debug for Bignat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bignat")
            .field("capacity", &self.capacity())
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Strip leading zero bytes.
fn strip_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Numeric comparison of two big-endian byte strings.
pub(crate) fn cmp_bytes(a: &[u8], b: &[u8]) -> cmp::Ordering {
    let a = strip_zeros(a);
    let b = strip_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl Bignat {
    /// Allocate a zero valued [`Bignat`] whose logical length equals its
    /// capacity.
    ///
    /// # Arguments:
    ///
    /// * `capacity` - The capacity in bytes.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::MemoryAllocationFailure`] - The memory allocation
    ///   has failed.
    pub fn new(capacity: usize) -> Result<Self, EngineError> {
        Ok(Self {
            value: try_alloc_zeroizing_bytes(capacity)?,
            size: capacity,
        })
    }

    /// Allocate a [`Bignat`] holding a copy of a big-endian byte string,
    /// sized exactly to it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        let mut bn = Self::new(bytes.len())?;
        bn.value.copy_from_slice(bytes);
        Ok(bn)
    }

    pub fn capacity(&self) -> usize {
        self.value.len()
    }

    /// The logical length in bytes.
    pub fn length(&self) -> usize {
        self.size
    }

    /// The logical window of the value, big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.value[self.capacity() - self.size..]
    }

    /// Mutable access to the logical window.
    ///
    /// Writing the window never breaks the invariant that bytes outside of
    /// it are zero.
    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        let cap = self.capacity();
        &mut self.value[cap - self.size..]
    }

    /// The value without leading zero bytes.
    pub(crate) fn significant(&self) -> &[u8] {
        strip_zeros(&self.value)
    }

    /// Minimum number of bytes needed to represent the value.
    pub fn significant_len(&self) -> usize {
        self.significant().len()
    }

    /// Number of significant bits.
    pub fn bit_len(&self) -> usize {
        arith::bit_len(&self.value)
    }

    /// Change the logical length.
    ///
    /// Shrinking the logical length below the value's significant length
    /// truncates the value modulo `256^size`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::ResizeToLonger`] - `size` exceeds the capacity.
    pub fn set_size(&mut self, size: usize) -> Result<(), EngineError> {
        let cap = self.capacity();
        if size > cap {
            return Err(EngineError::ResizeToLonger);
        }
        self.value[..cap - size].fill(0);
        self.size = size;
        Ok(())
    }

    /// Set the logical length to the capacity, optionally zeroing the
    /// value.
    pub fn resize_to_max(&mut self, erase: bool) {
        self.size = self.capacity();
        if erase {
            self.erase();
        }
    }

    /// Reduce the logical length to the significant length, but not below
    /// one byte.
    pub fn shrink(&mut self) {
        self.size = self.significant_len().max(1).min(self.capacity());
    }

    /// Make the logical length cover the value's significant bytes.
    pub(crate) fn cover_significant(&mut self) {
        self.size = self.size.max(self.significant_len());
    }

    /// Adjust the logical length of a result reduced modulo `m` to that of
    /// `m`, as far as capacity permits.
    pub(crate) fn fit_to_modulus(&mut self, m: &Bignat) {
        self.size = m.size.min(self.capacity()).max(self.significant_len());
    }

    /// Set the value to zero, retaining the logical length.
    pub fn zero(&mut self) {
        self.value.fill(0);
    }

    /// Zero the complete storage.
    pub fn erase(&mut self) {
        self.value.fill(0);
    }

    /// Set the value to a small constant, retaining the logical length if
    /// possible.
    pub fn set_u8(&mut self, v: u8) {
        self.value.fill(0);
        if let Some(last) = self.value.last_mut() {
            *last = v;
            self.size = self.size.max(1);
        }
    }

    pub fn one(&mut self) {
        self.set_u8(1);
    }

    pub fn two(&mut self) {
        self.set_u8(2);
    }

    pub fn three(&mut self) {
        self.set_u8(3);
    }

    /// Copy another value, adapting to this one's capacity.
    ///
    /// The logical length becomes that of `other`, limited to the capacity.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::InvalidCopyOther`] - Significant bytes of `other`
    ///   don't fit.
    pub fn copy(&mut self, other: &Bignat) -> Result<(), EngineError> {
        let src = other.significant();
        let cap = self.capacity();
        if src.len() > cap {
            return Err(EngineError::InvalidCopyOther);
        }
        self.value[..cap - src.len()].fill(0);
        self.value[cap - src.len()..].copy_from_slice(src);
        self.size = other.size.min(cap).max(src.len());
        Ok(())
    }

    /// Copy another value including its exact logical length.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::ReallocationNotAllowed`] - The logical length of
    ///   `other` exceeds the capacity.
    pub fn clone_value(&mut self, other: &Bignat) -> Result<(), EngineError> {
        if other.size > self.capacity() {
            return Err(EngineError::ReallocationNotAllowed);
        }
        self.set_size(other.size)?;
        self.as_bytes_mut().copy_from_slice(other.as_bytes());
        Ok(())
    }

    /// Load a big-endian byte string, the logical length becoming its
    /// length.
    ///
    /// Leading zero bytes beyond the capacity are dropped, in which case
    /// the logical length is capped at the capacity rather than following
    /// `data.len()`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::CapacityExceeded`] - The value doesn't fit.
    pub fn from_byte_array(&mut self, data: &[u8]) -> Result<(), EngineError> {
        let cap = self.capacity();
        let data = if data.len() > cap {
            let significant = strip_zeros(data);
            if significant.len() > cap {
                return Err(EngineError::CapacityExceeded);
            }
            &data[data.len() - cap..]
        } else {
            data
        };
        self.set_size(data.len())?;
        self.as_bytes_mut().copy_from_slice(data);
        Ok(())
    }

    /// Store the logical window into `out`.
    ///
    /// Returns the number of bytes written, i.e. the logical length.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::CapacityExceeded`] - `out` is too short.
    pub fn to_byte_array(&self, out: &mut [u8]) -> Result<usize, EngineError> {
        let out = out.get_mut(..self.size).ok_or(EngineError::CapacityExceeded)?;
        out.copy_from_slice(self.as_bytes());
        Ok(self.size)
    }

    /// Store the logical window at the start of `out`, filling the
    /// remainder with zeroes.
    ///
    /// This is the value scaled by `256^(out.len() - length())`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::CapacityExceeded`] - `out` is shorter than the
    ///   logical length.
    pub fn append_zeros(&self, out: &mut [u8]) -> Result<(), EngineError> {
        if out.len() < self.size {
            return Err(EngineError::CapacityExceeded);
        }
        let (head, tail) = out.split_at_mut(self.size);
        head.copy_from_slice(self.as_bytes());
        tail.fill(0);
        Ok(())
    }

    /// Store the value into all of `out`, left-padded with zeroes.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::CapacityExceeded`] - The significant bytes don't fit.
    pub fn prepend_zeros(&self, out: &mut [u8]) -> Result<(), EngineError> {
        let src = self.significant();
        if src.len() > out.len() {
            return Err(EngineError::CapacityExceeded);
        }
        let (head, tail) = out.split_at_mut(out.len() - src.len());
        head.fill(0);
        tail.copy_from_slice(src);
        Ok(())
    }

    /// Numeric comparison, independent of the logical lengths.
    pub fn cmp_value(&self, other: &Bignat) -> cmp::Ordering {
        cmp_bytes(&self.value, &other.value)
    }

    pub fn same_value(&self, other: &Bignat) -> bool {
        self.cmp_value(other) == cmp::Ordering::Equal
    }

    /// Whether `self < other`.
    pub fn lesser(&self, other: &Bignat) -> bool {
        self.cmp_value(other) == cmp::Ordering::Less
    }

    pub fn is_zero(&self) -> bool {
        self.value.iter().all(|b| *b == 0)
    }

    pub fn is_one(&self) -> bool {
        self.significant() == [1]
    }

    pub fn is_odd(&self) -> bool {
        self.value.last().map(|b| b & 1 != 0).unwrap_or(false)
    }
}
