// SPDX-License-Identifier: Apache-2.0

//! Signed integers on top of [`Bignat`] magnitudes.

use core::cmp;

use crate::arena::{Arena, ScratchBignat};
use crate::bignat::Bignat;
use crate::EngineError;

const SIGN_POSITIVE: u8 = 0x00;
const SIGN_NEGATIVE: u8 = 0x01;

/// Sign and magnitude.
///
/// Zero is always positive.
#[derive(Debug)]
pub struct Integer {
    negative: bool,
    magnitude: Bignat,
}

impl Integer {
    /// Create a zero valued [`Integer`] whose magnitude has the given
    /// capacity.
    pub fn new(capacity: usize) -> Result<Self, EngineError> {
        Ok(Self {
            negative: false,
            magnitude: Bignat::new(capacity)?,
        })
    }

    /// Create an [`Integer`] from its sign and big-endian magnitude, sized
    /// exactly to the magnitude.
    pub fn from_parts(negative: bool, magnitude: &[u8]) -> Result<Self, EngineError> {
        let mut i = Self {
            negative,
            magnitude: Bignat::from_bytes(magnitude)?,
        };
        i.normalize();
        Ok(i)
    }

    /// Create an [`Integer`] from its serialization, a sign byte followed
    /// by the magnitude.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::IllegalValue`] - The serialization is empty or the
    ///   sign byte is neither `0x00` nor `0x01`.
    pub fn from_byte_array(data: &[u8]) -> Result<Self, EngineError> {
        let (sign, magnitude) = data.split_first().ok_or(EngineError::IllegalValue)?;
        let negative = match *sign {
            SIGN_POSITIVE => false,
            SIGN_NEGATIVE => true,
            _ => return Err(EngineError::IllegalValue),
        };
        Self::from_parts(negative, magnitude)
    }

    /// Serialize as a sign byte followed by the magnitude's logical window.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::CapacityExceeded`] - `out` is too short.
    pub fn to_byte_array(&self, out: &mut [u8]) -> Result<usize, EngineError> {
        let (sign, rest) = out.split_first_mut().ok_or(EngineError::CapacityExceeded)?;
        *sign = if self.negative { SIGN_NEGATIVE } else { SIGN_POSITIVE };
        Ok(1 + self.magnitude.to_byte_array(rest)?)
    }

    fn normalize(&mut self) {
        if self.magnitude.is_zero() {
            self.negative = false;
        }
    }

    pub fn magnitude(&self) -> &Bignat {
        &self.magnitude
    }

    /// Replace the magnitude, retaining the sign unless the new magnitude
    /// is zero.
    pub fn set_magnitude(&mut self, magnitude: &[u8]) -> Result<(), EngineError> {
        self.magnitude.from_byte_array(magnitude)?;
        self.normalize();
        Ok(())
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Whether the value is non-negative.
    pub fn is_positive(&self) -> bool {
        !self.negative
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude.is_zero()
    }

    pub fn zero(&mut self) {
        self.magnitude.zero();
        self.negative = false;
    }

    pub fn negate(&mut self) {
        self.negative = !self.negative;
        self.normalize();
    }

    pub fn clone_from(&mut self, other: &Integer) -> Result<(), EngineError> {
        self.magnitude.copy(&other.magnitude)?;
        self.negative = other.negative;
        Ok(())
    }

    /// Signed comparison.
    pub fn cmp_value(&self, other: &Integer) -> cmp::Ordering {
        match (self.negative, other.negative) {
            (false, true) => cmp::Ordering::Greater,
            (true, false) => cmp::Ordering::Less,
            (false, false) => self.magnitude.cmp_value(&other.magnitude),
            (true, true) => other.magnitude.cmp_value(&self.magnitude),
        }
    }

    /// Whether `self < other`.
    pub fn lesser(&self, other: &Integer) -> bool {
        self.cmp_value(other) == cmp::Ordering::Less
    }

    fn add_signed(&mut self, other_negative: bool, other: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        if self.negative == other_negative {
            self.magnitude.add(other)?;
        } else if !self.magnitude.lesser(other) {
            self.magnitude.sub(other)?;
        } else {
            arena.with_bignats([ScratchBignat::A], |[diff], _| {
                diff.copy(other)?;
                diff.sub(&self.magnitude)?;
                self.magnitude.copy(diff)
            })?;
            self.negative = other_negative;
        }
        self.normalize();
        Ok(())
    }

    /// `self = self + other`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::CapacityExceeded`] - The magnitude of the sum
    ///   doesn't fit.
    pub fn add(&mut self, other: &Integer, arena: &mut Arena) -> Result<(), EngineError> {
        self.add_signed(other.negative, &other.magnitude, arena)
    }

    /// `self = self - other`, `other` remaining untouched.
    pub fn subtract(&mut self, other: &Integer, arena: &mut Arena) -> Result<(), EngineError> {
        let other_negative = !other.negative && !other.magnitude.is_zero();
        self.add_signed(other_negative, &other.magnitude, arena)
    }

    /// `self = self * other`.
    ///
    /// The magnitude of the product is computed modulo `256^L`, with `L`
    /// the logical length of `self`'s magnitude, using a scratch modulus one
    /// byte longer. The full product is formed before the reduction, so the
    /// significant lengths of both magnitudes together must not exceed the
    /// configured `max_bignat_len`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::ModuloTooLarge`] - The scratch storage can't hold
    ///   the modulus.
    /// * [`EngineError::CapacityExceeded`] - The operands are too long for
    ///   the scratch storage.
    pub fn multiply(&mut self, other: &Integer, arena: &mut Arena) -> Result<(), EngineError> {
        let len = self.magnitude.length();
        let max_len = arena.config().max_bignat_len;
        if len + 1 > max_len {
            return Err(EngineError::ModuloTooLarge);
        }
        if self.magnitude.significant_len() + other.magnitude.significant_len() > max_len {
            return Err(EngineError::CapacityExceeded);
        }
        arena.with_bignats([ScratchBignat::A, ScratchBignat::B], |[modulus, product], arena| {
            modulus.set_size(len + 1)?;
            modulus.zero();
            modulus.as_bytes_mut()[0] = 0x01;
            product.mod_mult(&self.magnitude, &other.magnitude, modulus, arena)?;
            self.magnitude.copy(product)?;
            self.magnitude.set_size(len)
        })?;
        self.negative ^= other.negative;
        self.normalize();
        Ok(())
    }

    /// `self = self / other`, rounding towards zero.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::DivisionByZero`] - `other` is zero.
    pub fn divide(&mut self, other: &Integer, arena: &mut Arena) -> Result<(), EngineError> {
        let len = self.magnitude.length();
        arena.with_bignats([ScratchBignat::A], |[rem], _| {
            rem.copy(&self.magnitude)?;
            rem.remainder_divide(&other.magnitude, Some(&mut self.magnitude))
        })?;
        self.magnitude.set_size(len.max(self.magnitude.significant_len()))?;
        self.negative ^= other.negative;
        self.normalize();
        Ok(())
    }

    /// `self = self mod other`, the remainder taking the sign of `self`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::DivisionByZero`] - `other` is zero.
    pub fn modulo(&mut self, other: &Integer) -> Result<(), EngineError> {
        self.magnitude.modulo(&other.magnitude)?;
        self.normalize();
        Ok(())
    }
}

#[cfg(all(test, feature = "software_platform"))]
mod tests {
    use super::*;
    use crate::arena::tests::test_arena;
    use crate::arena::ScratchId;

    fn int(v: i64, capacity: usize) -> Integer {
        let mut i = Integer::new(capacity).unwrap();
        let bytes = v.unsigned_abs().to_be_bytes();
        i.set_magnitude(&bytes[8 - capacity..]).unwrap();
        if v < 0 {
            i.negate();
        }
        i
    }

    fn value(i: &Integer) -> i64 {
        let mut m = 0i64;
        for b in i.magnitude().as_bytes() {
            m = (m << 8) | *b as i64;
        }
        if i.is_negative() { -m } else { m }
    }

    #[test]
    fn test_add_subtract() {
        let mut arena = test_arena(256);
        for (a, b) in [(5, 3), (5, -3), (-5, 3), (-5, -3), (3, -5), (-3, 5), (7, -7), (0, -4)] {
            let mut x = int(a, 4);
            x.add(&int(b, 4), &mut arena).unwrap();
            assert_eq!(value(&x), a + b, "{} + {}", a, b);

            let mut y = int(a, 4);
            let other = int(b, 4);
            y.subtract(&other, &mut arena).unwrap();
            assert_eq!(value(&y), a - b, "{} - {}", a, b);
            assert_eq!(value(&other), b);
        }

        let mut z = int(-7, 4);
        z.add(&int(7, 4), &mut arena).unwrap();
        assert!(z.is_zero() && z.is_positive());
    }

    #[test]
    fn test_multiply_divide() {
        let mut arena = test_arena(256);
        for (a, b) in [(12, 34), (-12, 34), (12, -34), (-1234, -5678), (0, -5)] {
            let mut x = int(a, 4);
            x.multiply(&int(b, 4), &mut arena).unwrap();
            assert_eq!(value(&x), a * b);
            assert_eq!(x.magnitude().length(), 4);
        }

        // Products wrap modulo 256^L.
        let mut w = int(0x10000, 3);
        w.multiply(&int(0x100, 3), &mut arena).unwrap();
        assert!(w.is_zero() && !w.is_negative());

        for (a, b) in [(100, 7), (-100, 7), (100, -7), (-100, -7), (3, 7)] {
            let mut x = int(a, 4);
            x.divide(&int(b, 4), &mut arena).unwrap();
            assert_eq!(value(&x), a / b);

            let mut r = int(a, 4);
            r.modulo(&int(b, 4)).unwrap();
            assert_eq!(value(&r), a % b);
        }

        let mut x = int(1, 4);
        assert_eq!(x.divide(&int(0, 4), &mut arena), Err(EngineError::DivisionByZero));
        arena.unlock_all();

        let mut big = Integer::new(80).unwrap();
        big.set_magnitude(&[1; 80]).unwrap();
        assert_eq!(big.multiply(&int(2, 1), &mut arena), Err(EngineError::ModuloTooLarge));
    }

    #[test]
    fn test_multiply_product_too_long() {
        let mut arena = test_arena(256);
        let max_len = arena.config().max_bignat_len;

        let mut x = Integer::new(40).unwrap();
        x.set_magnitude(&[0xff; 40]).unwrap();
        let mut y = Integer::new(40).unwrap();
        y.set_magnitude(&[0xff; 40]).unwrap();
        assert!(80 > max_len);
        assert_eq!(x.multiply(&y, &mut arena), Err(EngineError::CapacityExceeded));
        // Rejected up front, no scratch object got checked out.
        assert_eq!(arena.is_locked(ScratchId::Bignat(ScratchBignat::A)), Ok(false));
        assert_eq!(arena.is_locked(ScratchId::Bignat(ScratchBignat::E)), Ok(false));
        assert_eq!(x.magnitude().as_bytes(), &[0xff; 40]);

        // Magnitudes with leading zeroes count with their significant bytes.
        let mut z = Integer::new(40).unwrap();
        z.set_magnitude(&[0x02]).unwrap();
        x.multiply(&z, &mut arena).unwrap();
        assert!(x.is_positive());
        assert_eq!(x.magnitude().length(), 40);
    }

    #[test]
    fn test_serialization_and_compare() {
        let i = Integer::from_byte_array(&[0x01, 0x00, 0x2a]).unwrap();
        assert!(i.is_negative());
        let mut out = [0u8; 4];
        assert_eq!(i.to_byte_array(&mut out).unwrap(), 3);
        assert_eq!(&out[..3], &[0x01, 0x00, 0x2a]);

        let zero = Integer::from_parts(true, &[0, 0]).unwrap();
        assert!(zero.is_positive());
        assert_eq!(Integer::from_byte_array(&[]).unwrap_err(), EngineError::IllegalValue);
        assert_eq!(Integer::from_byte_array(&[0x02, 0x2a]).unwrap_err(), EngineError::IllegalValue);
        assert_eq!(Integer::from_byte_array(&[0xff, 0x2a]).unwrap_err(), EngineError::IllegalValue);
        assert!(Integer::from_byte_array(&[0x00, 0x2a]).unwrap().is_positive());

        assert!(int(-5, 2).lesser(&int(-4, 2)));
        assert!(int(-5, 2).lesser(&int(0, 2)));
        assert!(!int(5, 2).lesser(&int(4, 2)));

        let mut c = Integer::new(2).unwrap();
        c.clone_from(&i).unwrap();
        assert_eq!(value(&c), -42);
        c.zero();
        assert!(c.is_zero() && c.is_positive());
    }
}
