// SPDX-License-Identifier: Apache-2.0

//! Fallible allocation helpers for the fixed-capacity storage set up at
//! engine initialization time.
//!
//! All storage the engine ever owns gets allocated exactly once, when
//! creating scratch objects, curve parameters or caller-owned values. Running
//! out of memory at that point must be reported, not panic.

extern crate alloc;
use alloc::{boxed::Box, vec::Vec};
use core::{mem, ptr};

use crate::zeroize;

/// Memory allocation error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TryNewError {
    /// Memory allocation failure.
    MemoryAllocationFailure,
}

/// Try to allocate a `Box`, handling allocation failure gracefully.
///
/// `Box::try_new()` is still unstable, hence this substitute.
///
/// # Arguments:
///
/// * `v` - The value to move into the `Box`.
///
/// # Errors:
///
/// * [`TryNewError::MemoryAllocationFailure`] - The memory allocation has
///   failed.
pub fn box_try_new<T>(v: T) -> Result<Box<T>, TryNewError> {
    // Refer to https://doc.rust-lang.org/std/boxed/index.html#memory-layout.
    let p: *mut T = if mem::size_of::<T>() == 0 {
        ptr::NonNull::dangling().as_ptr()
    } else {
        let layout = alloc::alloc::Layout::new::<T>();
        let p = unsafe { alloc::alloc::alloc(layout) } as *mut T;
        if p.is_null() {
            return Err(TryNewError::MemoryAllocationFailure);
        }
        p
    };

    unsafe { p.write(v) };

    Ok(unsafe { Box::from_raw(p) })
}

/// Allocate a default-initialized `Vec` of exactly the given length.
///
/// The capacity of the returned `Vec` equals `len`, so it never reallocates
/// as long as it isn't grown by the caller.
///
/// # Arguments:
///
/// * `len` - The length of the `Vec`.
///
/// # Errors:
///
/// * [`TryNewError::MemoryAllocationFailure`] - The memory allocation has
///   failed.
pub fn try_alloc_vec<T: Default + Clone>(len: usize) -> Result<Vec<T>, TryNewError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| TryNewError::MemoryAllocationFailure)?;
    v.resize(len, T::default());
    Ok(v)
}

/// Allocate a zero-filled byte buffer wrapped in
/// [`Zeroizing`](zeroize::Zeroizing).
///
/// # Arguments:
///
/// * `len` - The length of the buffer in bytes.
///
/// # Errors:
///
/// * [`TryNewError::MemoryAllocationFailure`] - The memory allocation has
///   failed.
pub fn try_alloc_zeroizing_bytes(len: usize) -> Result<zeroize::Zeroizing<Vec<u8>>, TryNewError> {
    Ok(try_alloc_vec::<u8>(len)?.into())
}

/// Allocate a [`Zeroizing`](zeroize::Zeroizing) byte buffer initialized from
/// a given byte slice.
///
/// # Arguments:
///
/// * `src` - The initial contents.
///
/// # Errors:
///
/// * [`TryNewError::MemoryAllocationFailure`] - The memory allocation has
///   failed.
pub fn try_alloc_zeroizing_copy(src: &[u8]) -> Result<zeroize::Zeroizing<Vec<u8>>, TryNewError> {
    let mut v = try_alloc_zeroizing_bytes(src.len())?;
    v.copy_from_slice(src);
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_alloc_exact_capacity() {
        let v = try_alloc_vec::<u8>(37).unwrap();
        assert_eq!(v.len(), 37);
        assert_eq!(v.capacity(), 37);
        assert!(v.iter().all(|b| *b == 0));

        let z = try_alloc_zeroizing_copy(&[1, 2, 3]).unwrap();
        assert_eq!(&z[..], &[1, 2, 3]);
    }

    #[test]
    fn test_box_try_new_zst() {
        let b = box_try_new(()).unwrap();
        assert_eq!(*b, ());
    }
}
