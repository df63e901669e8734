// SPDX-License-Identifier: Apache-2.0

//! Plain, non-modular [`Bignat`] arithmetic.

use super::{Bignat, strip_zeros};
use crate::arena::{Arena, FAST_MULT_THRESHOLD, MultStrategy, ScratchBignat, ScratchBuffer};
use crate::{EngineError, PlatformError};

/// Add `addend` into `acc`, aligned at the least significant end.
///
/// Returns the carry out of `acc`'s most significant byte. `addend` must
/// not be longer than `acc`.
pub(super) fn add_into(acc: &mut [u8], addend: &[u8]) -> u8 {
    debug_assert!(addend.len() <= acc.len());
    let mut carry = 0u16;
    let mut addend = addend.iter().rev();
    for a in acc.iter_mut().rev() {
        let b = addend.next().copied().unwrap_or(0);
        if b == 0 && carry == 0 && addend.len() == 0 {
            break;
        }
        let s = *a as u16 + b as u16 + carry;
        *a = s as u8;
        carry = s >> 8;
    }
    carry as u8
}

/// Subtract `subtrahend` from `acc`, aligned at the least significant end.
///
/// Returns the borrow out of `acc`'s most significant byte. `subtrahend`
/// must not be longer than `acc`.
pub(super) fn sub_from(acc: &mut [u8], subtrahend: &[u8]) -> u8 {
    debug_assert!(subtrahend.len() <= acc.len());
    let mut borrow = 0i16;
    let mut subtrahend = subtrahend.iter().rev();
    for a in acc.iter_mut().rev() {
        let b = subtrahend.next().copied().unwrap_or(0);
        if b == 0 && borrow == 0 && subtrahend.len() == 0 {
            break;
        }
        let d = *a as i16 - b as i16 - borrow;
        *a = d as u8;
        borrow = (d < 0) as i16;
    }
    borrow as u8
}

/// Shift a big-endian byte string right by one bit.
fn shift_right_1(v: &mut [u8]) {
    let mut carry = 0u8;
    for b in v.iter_mut() {
        let next_carry = *b << 7;
        *b = (*b >> 1) | carry;
        carry = next_carry;
    }
}

pub(super) fn bit_len(v: &[u8]) -> usize {
    let v = strip_zeros(v);
    match v.first() {
        Some(msb) => 8 * v.len() - msb.leading_zeros() as usize,
        None => 0,
    }
}

/// Byte `k`, counted from the least significant end, of `d * 2^shift`.
fn shifted_byte(d: &[u8], shift: usize, k: usize) -> u8 {
    let byte_shift = shift / 8;
    let bit_shift = shift % 8;
    let get = |i: usize| if i < d.len() { d[d.len() - 1 - i] } else { 0 };
    if k < byte_shift {
        return 0;
    }
    let i = k - byte_shift;
    let lo = get(i) << bit_shift;
    let hi = if bit_shift != 0 && i >= 1 {
        get(i - 1) >> (8 - bit_shift)
    } else {
        0
    };
    lo | hi
}

/// Whether `v >= d * 2^shift`, for a shift such that `d * 2^shift` fits
/// `v`'s length.
fn ge_shifted(v: &[u8], d: &[u8], shift: usize) -> bool {
    let n = v.len();
    for k in (0..n).rev() {
        let a = v[n - 1 - k];
        let b = shifted_byte(d, shift, k);
        if a != b {
            return a > b;
        }
    }
    true
}

/// `v -= d * 2^shift`, with the same precondition as for [`ge_shifted()`].
fn sub_shifted(v: &mut [u8], d: &[u8], shift: usize) {
    let n = v.len();
    let mut borrow = 0i16;
    for k in (shift / 8)..n {
        let diff = v[n - 1 - k] as i16 - shifted_byte(d, shift, k) as i16 - borrow;
        v[n - 1 - k] = diff as u8;
        borrow = (diff < 0) as i16;
    }
}

impl Bignat {
    /// In-place addition.
    ///
    /// The logical length grows to cover the sum.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::CapacityExceeded`] - The sum doesn't fit the
    ///   capacity. The value remains unmodified.
    pub fn add(&mut self, other: &Bignat) -> Result<(), EngineError> {
        let addend = other.significant();
        if addend.len() > self.capacity() {
            return Err(EngineError::CapacityExceeded);
        }
        if add_into(&mut self.value, addend) != 0 {
            sub_from(&mut self.value, addend);
            return Err(EngineError::CapacityExceeded);
        }
        self.size = self.size.max(other.size.min(self.capacity()));
        self.cover_significant();
        Ok(())
    }

    /// In-place subtraction, retaining the logical length.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::NegativeResult`] - `other` is larger than `self`.
    pub fn sub(&mut self, other: &Bignat) -> Result<(), EngineError> {
        if self.lesser(other) {
            return Err(EngineError::NegativeResult);
        }
        sub_from(&mut self.value, other.significant());
        Ok(())
    }

    /// Reverse subtraction, `self = minuend - self`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::NegativeResult`] - `self` is larger than `minuend`.
    /// * [`EngineError::CapacityExceeded`] - `minuend` doesn't fit the
    ///   capacity.
    pub fn rsub_from(&mut self, minuend: &Bignat) -> Result<(), EngineError> {
        let m = minuend.significant();
        let cap = self.capacity();
        if minuend.lesser(self) {
            return Err(EngineError::NegativeResult);
        }
        if m.len() > cap {
            return Err(EngineError::CapacityExceeded);
        }
        let mut borrow = 0i16;
        for k in 0..m.len() {
            let i = cap - 1 - k;
            let d = m[m.len() - 1 - k] as i16 - self.value[i] as i16 - borrow;
            self.value[i] = d as u8;
            borrow = (d < 0) as i16;
        }
        self.size = self.size.max(minuend.size.min(cap));
        Ok(())
    }

    /// Increment by one.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::CapacityExceeded`] - The result doesn't fit.
    pub fn increment_one(&mut self) -> Result<(), EngineError> {
        if add_into(&mut self.value, &[1]) != 0 {
            sub_from(&mut self.value, &[1]);
            return Err(EngineError::CapacityExceeded);
        }
        self.cover_significant();
        Ok(())
    }

    /// Decrement by one.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::NegativeResult`] - The value is zero.
    pub fn decrement_one(&mut self) -> Result<(), EngineError> {
        if self.is_zero() {
            return Err(EngineError::NegativeResult);
        }
        sub_from(&mut self.value, &[1]);
        Ok(())
    }

    pub fn divide_by_2(&mut self) {
        shift_right_1(&mut self.value);
    }

    /// Shift right by whole bytes, retaining the logical length.
    pub fn shift_bytes_right(&mut self, num_bytes: usize) {
        let cap = self.capacity();
        let num_bytes = num_bytes.min(cap);
        self.value.copy_within(..cap - num_bytes, num_bytes);
        self.value[..num_bytes].fill(0);
    }

    /// `self = x * y`, selecting the algorithm according to the arena's
    /// [`MultStrategy`].
    ///
    /// # Errors:
    ///
    /// * [`EngineError::CapacityExceeded`] - The sum of the operands'
    ///   significant lengths exceeds the capacity.
    pub fn mult(&mut self, x: &Bignat, y: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        let max_len = x.significant_len().max(y.significant_len());
        match arena.multiplication_strategy() {
            MultStrategy::Coprocessor { engine_len }
                if max_len >= FAST_MULT_THRESHOLD && 2 * (max_len + 1) <= engine_len =>
            {
                log::trace!("mult: coprocessor, {} byte operands", max_len);
                self.mult_coprocessor(x, y, arena)
            }
            _ => {
                log::trace!("mult: schoolbook, {} byte operands", max_len);
                self.mult_schoolbook(x, y)
            }
        }
    }

    /// `self = x * y` by multiply-accumulate.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::CapacityExceeded`] - The sum of the operands'
    ///   significant lengths exceeds the capacity.
    pub fn mult_schoolbook(&mut self, x: &Bignat, y: &Bignat) -> Result<(), EngineError> {
        let xs = x.significant();
        let ys = y.significant();
        let cap = self.capacity();
        if xs.len() + ys.len() > cap {
            return Err(EngineError::CapacityExceeded);
        }

        self.value.fill(0);
        let out = &mut self.value[cap - (xs.len() + ys.len())..];
        for i in (0..xs.len()).rev() {
            let mut carry = 0u16;
            for j in (0..ys.len()).rev() {
                let t = out[i + j + 1] as u16 + xs[i] as u16 * ys[j] as u16 + carry;
                out[i + j + 1] = t as u8;
                carry = t >> 8;
            }
            out[i] = carry as u8;
        }
        self.size = (xs.len() + ys.len()).max(1).min(cap);
        Ok(())
    }

    /// `self = x * y` through three squarings on the coprocessor,
    /// `x * y = ((x + y)^2 - x^2 - y^2) / 2`.
    ///
    /// The squaring engine's modulus `256^L - 1` exceeds `(x + y)^2`, hence
    /// the squares come out exact.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::CapacityExceeded`] - The sum of the operands'
    ///   significant lengths exceeds the capacity.
    /// * [`EngineError::ModuloTooLarge`] - The operands are too long for the
    ///   squaring engine.
    /// * [`EngineError::Platform`] - The squaring engine is not available.
    pub fn mult_coprocessor(&mut self, x: &Bignat, y: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        let engine_len = match arena.multiplication_strategy() {
            MultStrategy::Coprocessor { engine_len } => engine_len,
            MultStrategy::Schoolbook => {
                return Err(PlatformError::crypto(PlatformError::REASON_NO_SUCH_ALGORITHM).into());
            }
        };
        let xs = x.significant();
        let ys = y.significant();
        let cap = self.capacity();
        if 2 * (xs.len().max(ys.len()) + 1) > engine_len {
            return Err(EngineError::ModuloTooLarge);
        }
        let product_len = xs.len() + ys.len();
        if product_len > cap {
            return Err(EngineError::CapacityExceeded);
        }

        arena.with_buffers([ScratchBuffer::Array1, ScratchBuffer::Array2], |[sum, sq], arena| {
            let sum = &mut sum[..engine_len];
            let sq = &mut sq[..engine_len];

            sum.fill(0);
            sum[engine_len - xs.len()..].copy_from_slice(xs);
            add_into(sum, ys);
            arena.platform_mut().square(sum)?;

            for operand in [xs, ys] {
                sq.fill(0);
                sq[engine_len - operand.len()..].copy_from_slice(operand);
                arena.platform_mut().square(sq)?;
                if sub_from(sum, sq) != 0 {
                    return Err(EngineError::Internal);
                }
            }
            shift_right_1(sum);

            let (head, product) = sum.split_at(engine_len - product_len);
            if head.iter().any(|b| *b != 0) {
                return Err(EngineError::Internal);
            }
            self.value.fill(0);
            self.value[cap - product_len..].copy_from_slice(product);
            self.size = product_len.max(1).min(cap);

            sum.fill(0);
            sq.fill(0);
            Ok(())
        })
    }

    /// Long division, leaving the remainder in `self`.
    ///
    /// # Arguments:
    ///
    /// * `divisor` - The divisor.
    /// * `quotient` - Optional destination for the quotient.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::DivisionByZero`] - `divisor` is zero.
    /// * [`EngineError::CapacityExceeded`] - The quotient might not fit the
    ///   destination.
    pub fn remainder_divide(&mut self, divisor: &Bignat, quotient: Option<&mut Bignat>) -> Result<(), EngineError> {
        let d = divisor.significant();
        if d.is_empty() {
            return Err(EngineError::DivisionByZero);
        }
        let d_bits = bit_len(d);
        let n_bits = self.bit_len();

        let max_shift = n_bits.checked_sub(d_bits);
        let mut quotient = match quotient {
            Some(q) => {
                let q_len = max_shift.map(|s| s / 8 + 1).unwrap_or(1);
                if q_len > q.capacity() {
                    return Err(EngineError::CapacityExceeded);
                }
                q.zero();
                q.size = q.size.max(q_len);
                Some(q)
            }
            None => None,
        };
        let max_shift = match max_shift {
            Some(max_shift) => max_shift,
            None => return Ok(()),
        };

        for shift in (0..=max_shift).rev() {
            if ge_shifted(&self.value, d, shift) {
                sub_shifted(&mut self.value, d, shift);
                if let Some(q) = quotient.as_deref_mut() {
                    let q_cap = q.capacity();
                    q.value[q_cap - 1 - shift / 8] |= 1 << (shift % 8);
                }
            }
        }
        Ok(())
    }

    /// Reduce modulo `m`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::DivisionByZero`] - `m` is zero.
    pub fn modulo(&mut self, m: &Bignat) -> Result<(), EngineError> {
        self.remainder_divide(m, None)?;
        self.size = self.size.min(m.size).max(self.significant_len());
        Ok(())
    }

    /// Replace `self` by the quotient `self / divisor`, retaining the
    /// logical length.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::DivisionByZero`] - `divisor` is zero.
    /// * [`EngineError::InvalidCopyOther`] - `self` exceeds the scratch
    ///   storage.
    pub fn divide(&mut self, divisor: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        let size = self.size;
        arena.with_bignats([ScratchBignat::E], |[rem], _| {
            rem.copy(self)?;
            rem.remainder_divide(divisor, Some(&mut *self))
        })?;
        self.size = size.max(self.significant_len());
        Ok(())
    }

    /// Non-modular exponentiation, `self = self^exponent`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::CapacityExceeded`] - The power doesn't fit.
    pub fn exponentiation(&mut self, exponent: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        arena.with_bignats([ScratchBignat::A, ScratchBignat::B], |[base, product], arena| {
            base.copy(self)?;
            self.one();
            for byte in exponent.significant() {
                for bit in (0..8).rev() {
                    product.mult(self, self, arena)?;
                    self.copy(product).map_err(|_| EngineError::CapacityExceeded)?;
                    if (byte >> bit) & 1 != 0 {
                        product.mult(self, base, arena)?;
                        self.copy(product).map_err(|_| EngineError::CapacityExceeded)?;
                    }
                }
            }
            Ok(())
        })
    }

    /// Greatest common divisor, `self = gcd(self, other)`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::InvalidCopyOther`] - The operands exceed the scratch
    ///   storage.
    pub fn gcd(&mut self, other: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        arena.with_bignats([ScratchBignat::A, ScratchBignat::B], |[a, b], _| {
            a.copy(self)?;
            b.copy(other)?;
            while !b.is_zero() {
                a.remainder_divide(b, None)?;
                core::mem::swap(a, b);
            }
            self.copy(a)
        })
    }

    pub fn is_coprime(&self, other: &Bignat, arena: &mut Arena) -> Result<bool, EngineError> {
        arena.with_bignats([ScratchBignat::C], |[c], arena| {
            c.copy(self)?;
            c.gcd(other, arena)?;
            Ok(c.is_one())
        })
    }
}
