// SPDX-License-Identifier: Apache-2.0

//! Comparison primitives whose running time doesn't depend on where two
//! byte strings differ.

/// Compare two equal-length byte strings for equality.
///
/// All bytes get inspected regardless of where the first difference is
/// located. Strings of different lengths compare unequal right away, their
/// lengths are not considered secret.
///
/// # Arguments:
///
/// * `a` - The first byte string.
/// * `b` - The second byte string.
pub fn ct_eq_bytes(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    core::hint::black_box(diff) == 0
}

/// Test whether all bytes of a byte string are zero.
///
/// # Arguments:
///
/// * `a` - The byte string to inspect.
pub fn ct_is_zero_bytes(a: &[u8]) -> bool {
    let acc = a.iter().fold(0u8, |acc, x| acc | x);
    core::hint::black_box(acc) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ct_eq_bytes() {
        assert!(ct_eq_bytes(&[], &[]));
        assert!(ct_eq_bytes(&[1, 2, 3], &[1, 2, 3]));
        assert!(!ct_eq_bytes(&[1, 2, 3], &[1, 2, 4]));
        assert!(!ct_eq_bytes(&[1, 2, 3], &[1, 2]));
    }

    #[test]
    fn test_ct_is_zero_bytes() {
        assert!(ct_is_zero_bytes(&[]));
        assert!(ct_is_zero_bytes(&[0, 0]));
        assert!(!ct_is_zero_bytes(&[0, 1]));
    }
}
