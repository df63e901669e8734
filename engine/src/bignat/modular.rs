// SPDX-License-Identifier: Apache-2.0

//! Modular [`Bignat`] arithmetic.
//!
//! All operations leave their result reduced modulo the given modulus, with
//! the modulus' logical length wherever the capacity permits. Results which
//! don't fit the destination's capacity are reported as errors.
//!
//! Scratch roles, by operation:
//!
//! | operation | scratch |
//! |---|---|
//! | `mod_mult`, `mod_mult_assign`, `mod_exp2` (software) | `E` |
//! | `mod_add` | `A` |
//! | `mod_sub` | `A`, `B` |
//! | `mod_exp` | `F`, plus `E` in software |
//! | `mod_inv` | `A`, `B`, `C`, `D`, `F`, plus those of `mod_mult` |
//! | `mod_sqrt` | `A`, `B`, `C`, `D`, plus those of `mod_exp` |
//! | `mod_mult_via_squares` | `D`, plus those of `mod_add`, `mod_sub`, `mod_exp2` |

use core::mem;

use super::Bignat;
use crate::EngineError;
use crate::arena::{Arena, ScratchBignat};

impl Bignat {
    /// `self = x * y mod m`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::DivisionByZero`] - `m` is zero.
    /// * [`EngineError::CapacityExceeded`] - The product exceeds the scratch
    ///   storage.
    pub fn mod_mult(&mut self, x: &Bignat, y: &Bignat, m: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        arena.with_bignats([ScratchBignat::E], |[product], arena| {
            product.mult(x, y, arena)?;
            product.modulo(m)?;
            self.copy(product)?;
            self.fit_to_modulus(m);
            Ok(())
        })
    }

    /// `self = self * y mod m`.
    pub fn mod_mult_assign(&mut self, y: &Bignat, m: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        arena.with_bignats([ScratchBignat::E], |[product], arena| {
            product.mult(self, y, arena)?;
            product.modulo(m)?;
            self.copy(product)?;
            self.fit_to_modulus(m);
            Ok(())
        })
    }

    /// `self = x * y mod m`, as `((x + y)^2 - x^2 - y^2) / 2` from three
    /// modular squarings.
    ///
    /// Suits platforms whose exponentiation engine outpaces multiplication.
    /// The halving needs `m` to be odd.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::DivisionByZero`] - `m` is zero.
    /// * [`EngineError::NotInvertible`] - `m` is even.
    /// * [`EngineError::InvalidCopyOther`] - `x` exceeds the capacity.
    pub fn mod_mult_via_squares(
        &mut self,
        x: &Bignat,
        y: &Bignat,
        m: &Bignat,
        arena: &mut Arena,
    ) -> Result<(), EngineError> {
        if m.is_zero() {
            return Err(EngineError::DivisionByZero);
        }
        if !m.is_odd() {
            return Err(EngineError::NotInvertible);
        }
        arena.with_bignats([ScratchBignat::D], |[sq], arena| {
            self.copy(x)?;
            self.modulo(m)?;
            self.mod_add(y, m, arena)?;
            self.mod_exp2(m, arena)?;
            for operand in [x, y] {
                sq.copy(operand)?;
                sq.mod_exp2(m, arena)?;
                self.mod_sub(sq, m, arena)?;
            }

            // (s + m) / 2 = floor(s / 2) + floor(m / 2) + 1 for odd s, m.
            let odd = self.is_odd();
            self.divide_by_2();
            if odd {
                sq.copy(m)?;
                sq.divide_by_2();
                self.add(sq)?;
                self.increment_one()?;
            }
            self.fit_to_modulus(m);
            Ok(())
        })
    }

    fn mod_square_soft(&mut self, m: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        arena.with_bignats([ScratchBignat::E], |[product], arena| {
            product.mult(self, self, arena)?;
            product.modulo(m)?;
            self.copy(product)?;
            self.fit_to_modulus(m);
            Ok(())
        })
    }

    /// `self = self + other mod m`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::DivisionByZero`] - `m` is zero.
    pub fn mod_add(&mut self, other: &Bignat, m: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        arena.with_bignats([ScratchBignat::A], |[sum], _| {
            sum.copy(self)?;
            sum.add(other)?;
            sum.modulo(m)?;
            self.copy(sum)?;
            self.fit_to_modulus(m);
            Ok(())
        })
    }

    /// `self = self - other mod m`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::DivisionByZero`] - `m` is zero.
    pub fn mod_sub(&mut self, other: &Bignat, m: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        if !self.lesser(other) {
            self.sub(other)?;
            self.modulo(m)?;
            self.fit_to_modulus(m);
            return Ok(());
        }

        self.modulo(m)?;
        arena.with_bignats([ScratchBignat::A, ScratchBignat::B], |[neg, sum], _| {
            neg.copy(other)?;
            neg.modulo(m)?;
            neg.rsub_from(m)?;
            sum.copy(self)?;
            sum.add(neg)?;
            sum.modulo(m)?;
            self.copy(sum)?;
            self.fit_to_modulus(m);
            Ok(())
        })
    }

    /// `self = -self mod m`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::DivisionByZero`] - `m` is zero.
    /// * [`EngineError::CapacityExceeded`] - `m` exceeds the capacity.
    pub fn mod_negate(&mut self, m: &Bignat) -> Result<(), EngineError> {
        self.modulo(m)?;
        if !self.is_zero() {
            self.rsub_from(m)?;
        }
        self.fit_to_modulus(m);
        Ok(())
    }

    /// Length limit for moduli handed to the platform's exponentiation
    /// engine.
    fn mod_exp_engine_len(arena: &Arena) -> usize {
        arena.config().mod_engine_len.min(arena.platform().mod_exp_max_len())
    }

    fn mod_exp_hw(&mut self, exponent: &[u8], m: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        let modulus = m.significant();
        arena.with_bignats([ScratchBignat::F], |[result], arena| {
            result.set_size(modulus.len())?;
            let base = match self.significant() {
                [] => &[0u8][..],
                base => base,
            };
            let exponent = if exponent.is_empty() { &[0u8][..] } else { exponent };
            arena
                .platform_mut()
                .mod_exp(base, exponent, modulus, result.as_bytes_mut())?;
            self.copy(result)?;
            self.fit_to_modulus(m);
            Ok(())
        })
    }

    /// `self = self^exponent mod m`.
    ///
    /// Moduli within the platform engine's limit get exponentiated in a
    /// single platform call, longer ones by square-and-multiply.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::DivisionByZero`] - `m` is zero.
    /// * [`EngineError::CapacityExceeded`] - Squares modulo `m` exceed the
    ///   scratch storage.
    pub fn mod_exp(&mut self, exponent: &Bignat, m: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        if m.is_zero() {
            return Err(EngineError::DivisionByZero);
        }
        self.modulo(m)?;
        if m.significant_len() <= Self::mod_exp_engine_len(arena) {
            log::trace!("mod_exp: platform engine, {} byte modulus", m.significant_len());
            return self.mod_exp_hw(exponent.significant(), m, arena);
        }

        log::trace!("mod_exp: square-and-multiply, {} byte modulus", m.significant_len());
        arena.with_bignats([ScratchBignat::F], |[base], arena| {
            base.copy(self)?;
            self.one();
            self.modulo(m)?;
            for byte in exponent.significant() {
                for bit in (0..8).rev() {
                    self.mod_square_soft(m, arena)?;
                    if (byte >> bit) & 1 != 0 {
                        self.mod_mult_assign(base, m, arena)?;
                    }
                }
            }
            self.fit_to_modulus(m);
            Ok(())
        })
    }

    /// `self = self^2 mod m`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::DivisionByZero`] - `m` is zero.
    pub fn mod_exp2(&mut self, m: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        if m.is_zero() {
            return Err(EngineError::DivisionByZero);
        }
        self.modulo(m)?;
        if m.significant_len() <= Self::mod_exp_engine_len(arena) {
            self.mod_exp_hw(&[2], m, arena)
        } else {
            self.mod_square_soft(m, arena)
        }
    }

    /// `self = self^-1 mod m`, by the extended Euclidean algorithm.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::DivisionByZero`] - `m` is zero.
    /// * [`EngineError::NotInvertible`] - `self` and `m` are not coprime.
    pub fn mod_inv(&mut self, m: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        if m.is_zero() {
            return Err(EngineError::DivisionByZero);
        }
        arena.with_bignats(
            [
                ScratchBignat::A,
                ScratchBignat::B,
                ScratchBignat::C,
                ScratchBignat::D,
                ScratchBignat::F,
            ],
            |[r0, r1, t0, t1, q], arena| {
                r0.copy(m)?;
                r1.copy(self)?;
                r1.modulo(m)?;
                t0.zero();
                t1.one();

                // Invariant: t_i * self = r_i mod m.
                while !r1.is_zero() {
                    r0.remainder_divide(r1, Some(&mut *q))?;
                    mem::swap(r0, r1);

                    // t0 - q * t1 mod m, with self as the temporary.
                    self.mod_mult(q, t1, m, arena)?;
                    if self.lesser(t0) || self.same_value(t0) {
                        t0.sub(self)?;
                    } else {
                        self.rsub_from(m)?;
                        t0.add(self)?;
                    }
                    mem::swap(t0, t1);
                }

                if !r0.is_one() {
                    return Err(EngineError::NotInvertible);
                }
                self.copy(t0)?;
                self.fit_to_modulus(m);
                Ok(())
            },
        )
    }

    /// Square root modulo an odd prime `p`.
    ///
    /// Returns one of the two roots, no guarantee which.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::NonResidue`] - `self` is not a quadratic residue.
    /// * [`EngineError::DivisionByZero`] - `p` is zero.
    pub fn mod_sqrt(&mut self, p: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        self.modulo(p)?;
        if self.is_zero() {
            return Ok(());
        }
        let p_mod_4 = p.significant().last().map(|b| b & 3).unwrap_or(0);
        if p_mod_4 == 3 {
            log::trace!("mod_sqrt: p = 3 mod 4");
            self.mod_sqrt_3_mod_4(p, arena)
        } else {
            log::trace!("mod_sqrt: Tonelli-Shanks");
            self.mod_sqrt_tonelli_shanks(p, arena)
        }
    }

    /// `self^((p + 1) / 4)`, checked by squaring.
    fn mod_sqrt_3_mod_4(&mut self, p: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        arena.with_bignats(
            [ScratchBignat::A, ScratchBignat::B, ScratchBignat::C],
            |[exponent, original, check], arena| {
                exponent.copy(p)?;
                exponent.increment_one()?;
                exponent.divide_by_2();
                exponent.divide_by_2();
                original.copy(self)?;

                self.mod_exp(exponent, p, arena)?;
                check.copy(self)?;
                check.mod_exp2(p, arena)?;
                if !check.same_value(original) {
                    return Err(EngineError::NonResidue);
                }
                Ok(())
            },
        )
    }

    fn mod_sqrt_tonelli_shanks(&mut self, p: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        arena.with_bignats(
            [ScratchBignat::A, ScratchBignat::B, ScratchBignat::C, ScratchBignat::D],
            |[q, c, t, b], arena| {
                // Euler's criterion, with t = (p - 1) / 2.
                t.copy(p)?;
                t.decrement_one()?;
                t.divide_by_2();
                c.copy(self)?;
                c.mod_exp(t, p, arena)?;
                if !c.is_one() {
                    return Err(EngineError::NonResidue);
                }

                // p - 1 = q * 2^s, q odd.
                q.copy(p)?;
                q.decrement_one()?;
                let mut s = 0usize;
                while !q.is_zero() && !q.is_odd() {
                    q.divide_by_2();
                    s += 1;
                }

                // Smallest non-residue z, found in c, b serving as temporary.
                c.one();
                loop {
                    c.increment_one()?;
                    if !c.lesser(p) {
                        return Err(EngineError::NonResidue);
                    }
                    b.copy(c)?;
                    b.mod_exp(t, p, arena)?;
                    b.increment_one()?;
                    if b.same_value(p) {
                        break;
                    }
                }

                // c = z^q, t = self^q, self = self^((q + 1) / 2)
                c.mod_exp(q, p, arena)?;
                t.copy(self)?;
                t.mod_exp(q, p, arena)?;
                q.increment_one()?;
                q.divide_by_2();
                self.mod_exp(q, p, arena)?;

                // q is not needed anymore, reuse it for the powers of t.
                let mut m = s;
                while !t.is_one() {
                    let mut i = 0;
                    q.copy(t)?;
                    while !q.is_one() {
                        q.mod_exp2(p, arena)?;
                        i += 1;
                        if i == m {
                            return Err(EngineError::NonResidue);
                        }
                    }

                    b.copy(c)?;
                    for _ in 0..(m - i - 1) {
                        b.mod_exp2(p, arena)?;
                    }
                    m = i;
                    c.copy(b)?;
                    c.mod_exp2(p, arena)?;
                    t.mod_mult_assign(c, p, arena)?;
                    self.mod_mult_assign(b, p, arena)?;
                }
                Ok(())
            },
        )
    }
}

#[cfg(all(test, feature = "software_platform"))]
mod tests {
    use super::*;
    use crate::arena::tests::test_arena;
    use crate::config::EngineConfig;
    use crate::platform::SoftwarePlatform;
    use hex_literal::hex;
    use num_bigint::BigUint;
    use proptest::prelude::*;

    const P256: [u8; 32] = hex!("ffffffff00000001000000000000000000000000ffffffffffffffffffffffff");
    const P224: [u8; 28] = hex!("ffffffffffffffffffffffffffffffff000000000000000000000001");

    fn to_biguint(bn: &Bignat) -> BigUint {
        BigUint::from_bytes_be(bn.as_bytes())
    }

    fn bn(bytes: &[u8], capacity: usize) -> Bignat {
        let mut bn = Bignat::new(capacity).unwrap();
        bn.from_byte_array(bytes).unwrap();
        bn
    }

    /// Arena whose platform refuses all exponentiation, forcing the
    /// square-and-multiply paths.
    fn soft_exp_arena() -> Arena {
        let config = EngineConfig::for_key_length(256).unwrap();
        Arena::new(config, SoftwarePlatform::new(b"").with_mod_exp_max_len(0)).unwrap()
    }

    #[test]
    fn test_mod_inv_small() {
        let mut arena = test_arena(256);
        let mut x = bn(&[7], 4);
        x.mod_inv(&bn(&[13], 1), &mut arena).unwrap();
        assert!(x.same_value(&bn(&[2], 1)));

        let mut y = bn(&[6], 4);
        assert_eq!(y.mod_inv(&bn(&[9], 1), &mut arena), Err(EngineError::NotInvertible));
        arena.unlock_all();
        let mut z = bn(&[0], 4);
        assert_eq!(z.mod_inv(&bn(&[9], 1), &mut arena), Err(EngineError::NotInvertible));
        arena.unlock_all();
        assert_eq!(z.mod_inv(&bn(&[0], 1), &mut arena), Err(EngineError::DivisionByZero));
    }

    #[test]
    fn test_mod_mult_via_squares_small() {
        let mut arena = test_arena(256);
        let m = bn(&[101], 1);
        for (x, y) in [(7u8, 9u8), (100, 100), (0, 55), (1, 1), (200, 3)] {
            let mut r = Bignat::new(2).unwrap();
            r.mod_mult_via_squares(&bn(&[x], 1), &bn(&[y], 1), &m, &mut arena).unwrap();
            assert_eq!(to_biguint(&r), BigUint::from(x as u32 * y as u32 % 101));
        }

        let mut r = Bignat::new(2).unwrap();
        assert_eq!(
            r.mod_mult_via_squares(&bn(&[3], 1), &bn(&[5], 1), &bn(&[100], 1), &mut arena),
            Err(EngineError::NotInvertible)
        );
        assert_eq!(
            r.mod_mult_via_squares(&bn(&[3], 1), &bn(&[5], 1), &bn(&[0], 1), &mut arena),
            Err(EngineError::DivisionByZero)
        );
    }

    #[test]
    fn test_mod_add_sub_negate() {
        let mut arena = test_arena(256);
        let m = bn(&[0x61], 1);
        let mut x = bn(&[0x50], 2);
        x.mod_add(&bn(&[0x20], 1), &m, &mut arena).unwrap();
        assert_eq!(x.as_bytes(), &[0x0f]);
        x.mod_sub(&bn(&[0x20], 1), &m, &mut arena).unwrap();
        assert_eq!(x.as_bytes(), &[0x50]);
        x.mod_sub(&bn(&[0x01, 0x00], 2), &m, &mut arena).unwrap();
        assert_eq!(to_biguint(&x), BigUint::from((0x50u32 + 3 * 0x61 - 0x100) % 0x61));
        x.mod_negate(&m).unwrap();
        x.mod_negate(&m).unwrap();
        assert_eq!(to_biguint(&x), BigUint::from((0x50u32 + 3 * 0x61 - 0x100) % 0x61));

        let mut zero = bn(&[0], 1);
        zero.mod_negate(&m).unwrap();
        assert!(zero.is_zero());
    }

    #[test]
    fn test_mod_exp_paths_agree() {
        let mut hw = test_arena(256);
        let mut sw = soft_exp_arena();
        let p = Bignat::from_bytes(&P256).unwrap();
        let e = Bignat::from_bytes(&hex!("0123456789abcdef")).unwrap();

        let mut a = bn(&hex!("deadbeefcafe"), 33);
        let mut b = bn(&hex!("deadbeefcafe"), 33);
        a.mod_exp(&e, &p, &mut hw).unwrap();
        b.mod_exp(&e, &p, &mut sw).unwrap();
        assert!(a.same_value(&b));
        assert_eq!(a.length(), 32);

        let expected = BigUint::from_bytes_be(&hex!("deadbeefcafe"))
            .modpow(&BigUint::from_bytes_be(&hex!("0123456789abcdef")), &BigUint::from_bytes_be(&P256));
        assert_eq!(to_biguint(&a), expected);

        let mut one = bn(&[5], 4);
        one.mod_exp(&bn(&[0], 1), &bn(&[7], 1), &mut sw).unwrap();
        assert!(one.is_one());
    }

    #[test]
    fn test_mod_sqrt_3_mod_4() {
        let mut arena = test_arena(256);
        let p = Bignat::from_bytes(&P256).unwrap();
        let mut x = bn(&hex!("0123456789"), 32);
        x.mod_exp2(&p, &mut arena).unwrap();
        let square = to_biguint(&x);
        x.mod_sqrt(&p, &mut arena).unwrap();
        let pr = BigUint::from_bytes_be(&P256);
        assert_eq!((to_biguint(&x) * to_biguint(&x)) % &pr, square);

        // -1 is a non-residue modulo p = 3 mod 4.
        let mut minus_one = Bignat::from_bytes(&P256).unwrap();
        minus_one.decrement_one().unwrap();
        assert_eq!(minus_one.mod_sqrt(&p, &mut arena), Err(EngineError::NonResidue));
        arena.unlock_all();
    }

    #[test]
    fn test_mod_sqrt_tonelli_shanks() {
        let mut arena = test_arena(256);
        let p = Bignat::from_bytes(&P224).unwrap();
        let pr = BigUint::from_bytes_be(&P224);
        for v in [&hex!("02")[..], &hex!("0123456789abcdef")[..], &hex!("ffff0000ffff")[..]] {
            let vr = BigUint::from_bytes_be(v);
            let square = (&vr * &vr) % &pr;
            let mut x = bn(&square.to_bytes_be(), 28);
            x.mod_sqrt(&p, &mut arena).unwrap();
            let root = to_biguint(&x);
            assert!(root == vr || root == &pr - &vr);
        }

        // Small prime p = 17 = 1 mod 16, with s = 4.
        let p17 = bn(&[17], 1);
        let mut x = bn(&[8], 1);
        x.mod_sqrt(&p17, &mut arena).unwrap();
        let r = to_biguint(&x);
        assert_eq!((&r * &r) % BigUint::from(17u8), BigUint::from(8u8));
        let mut n = bn(&[3], 1);
        assert_eq!(n.mod_sqrt(&p17, &mut arena), Err(EngineError::NonResidue));
        arena.unlock_all();
    }

    proptest! {
        #[test]
        fn prop_mod_exp2_matches_mod_exp(x in proptest::collection::vec(any::<u8>(), 1..32)) {
            let mut arena = test_arena(256);
            let mut sw = soft_exp_arena();
            let p = Bignat::from_bytes(&P256).unwrap();
            let two = bn(&[2], 1);

            let mut a = bn(&x, 32);
            a.mod_exp2(&p, &mut arena).unwrap();
            let mut b = bn(&x, 32);
            b.mod_exp(&two, &p, &mut arena).unwrap();
            let mut c = bn(&x, 32);
            c.mod_exp2(&p, &mut sw).unwrap();
            prop_assert!(a.same_value(&b));
            prop_assert!(a.same_value(&c));
        }

        #[test]
        fn prop_mod_inv_reference(x in proptest::collection::vec(any::<u8>(), 1..32)) {
            let pr = BigUint::from_bytes_be(&P256);
            let xr = BigUint::from_bytes_be(&x) % &pr;
            prop_assume!(xr != BigUint::from(0u8));
            let mut arena = test_arena(256);
            let p = Bignat::from_bytes(&P256).unwrap();
            let mut a = bn(&x, 32);
            a.mod_inv(&p, &mut arena).unwrap();
            prop_assert_eq!((to_biguint(&a) * xr) % &pr, BigUint::from(1u8));
        }

        #[test]
        fn prop_mod_mult_via_squares_matches_mod_mult(
            x in proptest::collection::vec(any::<u8>(), 0..32),
            y in proptest::collection::vec(any::<u8>(), 0..32),
        ) {
            let mut arena = test_arena(256);
            let mut sw = soft_exp_arena();
            let p = Bignat::from_bytes(&P256).unwrap();
            let mut expected = Bignat::new(32).unwrap();
            expected.mod_mult(&bn(&x, 32), &bn(&y, 32), &p, &mut arena).unwrap();

            let mut a = Bignat::new(32).unwrap();
            a.mod_mult_via_squares(&bn(&x, 32), &bn(&y, 32), &p, &mut arena).unwrap();
            prop_assert!(a.same_value(&expected));
            prop_assert_eq!(a.length(), 32);

            let mut b = Bignat::new(32).unwrap();
            b.mod_mult_via_squares(&bn(&x, 32), &bn(&y, 32), &p, &mut sw).unwrap();
            prop_assert!(b.same_value(&expected));
        }

        #[test]
        fn prop_mod_mult_reference(
            x in proptest::collection::vec(any::<u8>(), 0..32),
            y in proptest::collection::vec(any::<u8>(), 0..32),
        ) {
            let mut arena = test_arena(256);
            let p = Bignat::from_bytes(&P256).unwrap();
            let mut r = Bignat::new(32).unwrap();
            r.mod_mult(&bn(&x, 32), &bn(&y, 32), &p, &mut arena).unwrap();
            let expected = (BigUint::from_bytes_be(&x) * BigUint::from_bytes_be(&y)) % BigUint::from_bytes_be(&P256);
            prop_assert_eq!(to_biguint(&r), expected);
        }
    }
}
