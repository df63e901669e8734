// SPDX-License-Identifier: Apache-2.0

//! Elliptic curve points in affine coordinates.
//!
//! Points are stored in uncompressed form, `0x04 || x || y`, and may be
//! imported and exported in compressed form, `0x02 || x` or `0x03 || x`
//! for even and odd `y` respectively. The point at infinity has no such
//! encoding: operations which would yield it fail with
//! [`EngineError::PointAtInfinity`].
//!
//! Scratch roles, by operation:
//!
//! | operation | scratch |
//! |---|---|
//! | `add` | `EcA`..`EcF`, `UncompressedPoint` |
//! | `make_double` | `EcA`..`EcE`, `UncompressedPoint` |
//! | `multiplication` | `EcB`, `EcC`, `EcD`, `Array1`, `Array2`, `UncompressedPoint` |
//! | `multiplication_bytes` | `EcF`, plus those of `multiplication` |
//! | `negate` | `EcC` |
//! | `from_x`, `decode` | `EcC`, `EcD`, `UncompressedPoint` |
//! | `randomize` | `EcF`, plus those of `multiplication` |
//! | `multiplication_and_add` | those of `multiplication` and `add` |
//! | `is_on_curve` | `EcB`, `EcC`, `EcD` |
//! | `is_equal` | `HashArray`, `UncompressedPoint` |
//!
//! On top of that, everything used by the modular [`Bignat`] primitives
//! invoked, none of which touch the `Ec*` roles.

extern crate alloc;
use alloc::vec::Vec;

use crate::arena::{Arena, ScratchBignat, ScratchBuffer};
use crate::bignat::Bignat;
use crate::curve::{Curve, POINT_FORMAT_UNCOMPRESSED};
use crate::utils_common::{alloc::try_alloc_zeroizing_copy, ct_cmp::ct_eq_bytes, zeroize};
use crate::EngineError;

const POINT_FORMAT_COMPRESSED_EVEN: u8 = 0x02;
const POINT_FORMAT_COMPRESSED_ODD: u8 = 0x03;

/// Message signed and verified for choosing between the two square roots
/// in [`Point::multiplication()`].
const TRIAL_MESSAGE: [u8; 4] = [1, 1, 2, 3];

/// `y_sq = x^3 + a * x + b mod p`.
fn y_squared(y_sq: &mut Bignat, x: &Bignat, curve: &Curve, arena: &mut Arena) -> Result<(), EngineError> {
    let p = curve.p();
    y_sq.mod_mult(x, x, p, arena)?;
    y_sq.mod_add(curve.a(), p, arena)?;
    y_sq.mod_mult_assign(x, p, arena)?;
    y_sq.mod_add(curve.b(), p, arena)
}

/// Third intersection of the line with slope `lambda` through `(xp, yp)`
/// and a point with abscissa `xq`, reflected.
#[allow(clippy::too_many_arguments)]
fn line_result(
    lambda: &Bignat,
    xp: &Bignat,
    yp: &Bignat,
    xq: &Bignat,
    x_r: &mut Bignat,
    y_r: &mut Bignat,
    p: &Bignat,
    arena: &mut Arena,
) -> Result<(), EngineError> {
    x_r.mod_mult(lambda, lambda, p, arena)?;
    x_r.mod_sub(xp, p, arena)?;
    x_r.mod_sub(xq, p, arena)?;

    y_r.copy(xp)?;
    y_r.mod_sub(x_r, p, arena)?;
    y_r.mod_mult_assign(lambda, p, arena)?;
    y_r.mod_sub(yp, p, arena)
}

/// Encode `(x, y)` into `out`, which must be exactly point sized.
fn encode_uncompressed(x: &Bignat, y: &Bignat, coord_len: usize, out: &mut [u8]) -> Result<(), EngineError> {
    let (prefix, coords) = out.split_first_mut().ok_or(EngineError::PointInvalidLength)?;
    if coords.len() != 2 * coord_len {
        return Err(EngineError::PointInvalidLength);
    }
    *prefix = POINT_FORMAT_UNCOMPRESSED;
    let (x_out, y_out) = coords.split_at_mut(coord_len);
    x.prepend_zeros(x_out)?;
    y.prepend_zeros(y_out)
}

/// A point on a [`Curve`].
pub struct Point<'c> {
    curve: &'c Curve,
    w: zeroize::Zeroizing<Vec<u8>>,
}

impl<'c> Point<'c> {
    /// Create a point initialized to the curve's generator.
    pub fn new(curve: &'c Curve) -> Result<Self, EngineError> {
        Ok(Self {
            curve,
            w: try_alloc_zeroizing_copy(curve.g())?,
        })
    }

    pub fn curve(&self) -> &'c Curve {
        self.curve
    }

    /// The uncompressed encoding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.w
    }

    pub fn x(&self) -> &[u8] {
        &self.w[1..1 + self.curve.coord_len()]
    }

    pub fn y(&self) -> &[u8] {
        &self.w[1 + self.curve.coord_len()..]
    }

    fn export(src: &[u8], out: &mut [u8]) -> Result<usize, EngineError> {
        let out = out.get_mut(..src.len()).ok_or(EngineError::CapacityExceeded)?;
        out.copy_from_slice(src);
        Ok(src.len())
    }

    /// Store the uncompressed encoding into `out`, returning its length.
    pub fn get_w(&self, out: &mut [u8]) -> Result<usize, EngineError> {
        Self::export(&self.w, out)
    }

    pub fn get_x(&self, out: &mut [u8]) -> Result<usize, EngineError> {
        Self::export(self.x(), out)
    }

    pub fn get_y(&self, out: &mut [u8]) -> Result<usize, EngineError> {
        Self::export(self.y(), out)
    }

    /// Overwrite the point with an uncompressed encoding.
    ///
    /// Nothing gets written unless the encoding is well-formed. Whether the
    /// point is on the curve is not checked, c.f.
    /// [`is_on_curve()`](Self::is_on_curve).
    ///
    /// # Errors:
    ///
    /// * [`EngineError::PointInvalidLength`] - `w` has the wrong length.
    /// * [`EngineError::InvalidPoint`] - `w` is not in uncompressed form.
    pub fn set_w(&mut self, w: &[u8]) -> Result<(), EngineError> {
        if w.len() != self.w.len() {
            return Err(EngineError::PointInvalidLength);
        }
        if w[0] != POINT_FORMAT_UNCOMPRESSED {
            return Err(EngineError::InvalidPoint);
        }
        self.w.copy_from_slice(w);
        Ok(())
    }

    pub fn copy(&mut self, other: &Point<'_>) -> Result<(), EngineError> {
        self.set_w(&other.w)
    }

    /// Store the point's encoding into `out`, returning its length.
    ///
    /// # Arguments:
    ///
    /// * `out` - Destination buffer.
    /// * `compressed` - Whether to emit the compressed form, `x` prefixed
    ///   by the parity of `y`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::CapacityExceeded`] - `out` is too short.
    pub fn encode(&self, out: &mut [u8], compressed: bool) -> Result<usize, EngineError> {
        if !compressed {
            return self.get_w(out);
        }
        let coord_len = self.curve.coord_len();
        let out = out.get_mut(..1 + coord_len).ok_or(EngineError::CapacityExceeded)?;
        out[0] = if self.is_y_even() {
            POINT_FORMAT_COMPRESSED_EVEN
        } else {
            POINT_FORMAT_COMPRESSED_ODD
        };
        out[1..].copy_from_slice(self.x());
        Ok(1 + coord_len)
    }

    /// Overwrite the point with an encoding in either form.
    ///
    /// Returns whether the encoding has been a compressed one. The y
    /// coordinate of compressed encodings gets recovered from the curve
    /// equation. Nothing gets written on error.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::PointInvalidLength`] - `data` fits neither form.
    /// * [`EngineError::InvalidPoint`] - Unknown format prefix or `x` not
    ///   reduced.
    /// * [`EngineError::NonResidue`] - No point with the given `x` exists.
    pub fn decode(&mut self, data: &[u8], arena: &mut Arena) -> Result<bool, EngineError> {
        let coord_len = self.curve.coord_len();
        if data.len() == self.curve.point_len() {
            self.set_w(data)?;
            return Ok(false);
        }
        if data.len() != 1 + coord_len {
            return Err(EngineError::PointInvalidLength);
        }
        let y_odd = match data[0] {
            POINT_FORMAT_COMPRESSED_EVEN => false,
            POINT_FORMAT_COMPRESSED_ODD => true,
            _ => return Err(EngineError::InvalidPoint),
        };
        self.recover(&data[1..], Some(y_odd), arena)?;
        Ok(true)
    }

    /// Buffer the encoding of `(x, y)` and commit it.
    fn store(&mut self, x: &Bignat, y: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        let point_len = self.curve.point_len();
        let coord_len = self.curve.coord_len();
        arena.with_buffers([ScratchBuffer::UncompressedPoint], |[buf], _| {
            let buf = buf.get_mut(..point_len).ok_or(EngineError::UnsupportedKeyLength)?;
            encode_uncompressed(x, y, coord_len, buf)?;
            self.set_w(buf)
        })
    }

    pub fn is_y_even(&self) -> bool {
        self.w.last().map(|b| b & 1 == 0).unwrap_or(true)
    }

    /// Whether the point satisfies the curve equation.
    pub fn is_on_curve(&self, arena: &mut Arena) -> Result<bool, EngineError> {
        let curve = self.curve;
        arena.with_bignats(
            [ScratchBignat::EcB, ScratchBignat::EcC, ScratchBignat::EcD],
            |[x, y, rhs], arena| {
                x.from_byte_array(self.x())?;
                y.from_byte_array(self.y())?;
                if !x.lesser(curve.p()) || !y.lesser(curve.p()) {
                    return Ok(false);
                }
                y_squared(rhs, x, curve, arena)?;
                y.mod_exp2(curve.p(), arena)?;
                Ok(y.same_value(rhs))
            },
        )
    }

    /// Compare two points by their digests.
    pub fn is_equal(&self, other: &Point<'_>, arena: &mut Arena) -> Result<bool, EngineError> {
        if self.w.len() != other.w.len() {
            return Ok(false);
        }
        arena.with_buffers(
            [ScratchBuffer::HashArray, ScratchBuffer::UncompressedPoint],
            |[h_self, h_other], arena| {
                let platform = arena.platform_mut();
                let digest_len = platform.digest(&self.w, h_self)?;
                platform.digest(&other.w, h_other)?;
                Ok(ct_eq_bytes(&h_self[..digest_len], &h_other[..digest_len]))
            },
        )
    }

    /// `y = p - y`.
    pub fn negate(&mut self, arena: &mut Arena) -> Result<(), EngineError> {
        let curve = self.curve;
        let coord_len = curve.coord_len();
        arena.with_bignats([ScratchBignat::EcC], |[y], _| {
            y.from_byte_array(self.y())?;
            y.mod_negate(curve.p())?;
            y.prepend_zeros(&mut self.w[1 + coord_len..])
        })
    }

    /// `self = 2 * self`, by the tangent.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::PointAtInfinity`] - The point has order two.
    pub fn make_double(&mut self, arena: &mut Arena) -> Result<(), EngineError> {
        let curve = self.curve;
        let p = curve.p();
        arena.with_bignats(
            [
                ScratchBignat::EcA,
                ScratchBignat::EcB,
                ScratchBignat::EcC,
                ScratchBignat::EcD,
                ScratchBignat::EcE,
            ],
            |[lambda, nom, denom, xp, yp], arena| {
                xp.from_byte_array(self.x())?;
                yp.from_byte_array(self.y())?;
                if yp.is_zero() {
                    return Err(EngineError::PointAtInfinity);
                }

                // 3 * x^2 + a
                nom.mod_mult(xp, xp, p, arena)?;
                denom.copy(nom)?;
                nom.mod_add(denom, p, arena)?;
                nom.mod_add(denom, p, arena)?;
                nom.mod_add(curve.a(), p, arena)?;

                // 2 * y
                denom.copy(yp)?;
                denom.mod_add(yp, p, arena)?;
                denom.mod_inv(p, arena)?;

                lambda.mod_mult(nom, denom, p, arena)?;
                line_result(lambda, xp, yp, xp, nom, denom, p, arena)?;
                self.store(nom, denom, arena)
            },
        )
    }

    /// `self = self + other`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::PointAtInfinity`] - `other` is the negation of
    ///   `self`.
    pub fn add(&mut self, other: &Point<'_>, arena: &mut Arena) -> Result<(), EngineError> {
        if other.w.len() != self.w.len() {
            return Err(EngineError::PointInvalidLength);
        }
        if ct_eq_bytes(self.x(), other.x()) {
            if ct_eq_bytes(self.y(), other.y()) {
                log::trace!("point add: doubling");
                return self.make_double(arena);
            }
            return Err(EngineError::PointAtInfinity);
        }

        let curve = self.curve;
        let p = curve.p();
        arena.with_bignats(
            [
                ScratchBignat::EcA,
                ScratchBignat::EcB,
                ScratchBignat::EcC,
                ScratchBignat::EcD,
                ScratchBignat::EcE,
                ScratchBignat::EcF,
            ],
            |[lambda, nom, denom, xp, yp, xq], arena| {
                xp.from_byte_array(self.x())?;
                yp.from_byte_array(self.y())?;
                xq.from_byte_array(other.x())?;

                nom.from_byte_array(other.y())?;
                nom.mod_sub(yp, p, arena)?;
                denom.copy(xq)?;
                denom.mod_sub(xp, p, arena)?;
                denom.mod_inv(p, arena).map_err(|e| match e {
                    EngineError::NotInvertible => EngineError::PointAtInfinity,
                    e => e,
                })?;

                lambda.mod_mult(nom, denom, p, arena)?;
                line_result(lambda, xp, yp, xq, nom, denom, p, arena)?;
                self.store(nom, denom, arena)
            },
        )
    }

    /// The x coordinate of `scalar * self`, by the platform's key agreement.
    ///
    /// Returns the number of bytes written to `out`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::PointAtInfinity`] - `scalar` is zero.
    /// * [`EngineError::PointUnexpectedKaLength`] - The key agreement
    ///   produced something else than a coordinate.
    pub fn multiplication_x(&self, scalar: &Bignat, out: &mut [u8], arena: &mut Arena) -> Result<usize, EngineError> {
        if scalar.is_zero() {
            return Err(EngineError::PointAtInfinity);
        }
        let curve = self.curve;
        let len = arena
            .platform_mut()
            .ecdh_plain_x(&curve.domain(), scalar.significant(), &self.w, out)?;
        if len != curve.coord_len() {
            return Err(EngineError::PointUnexpectedKaLength);
        }
        Ok(len)
    }

    /// `self = scalar * self`.
    ///
    /// The x coordinate is obtained from the platform's key agreement, the
    /// y coordinate as a square root of `x^3 + a * x + b`. The right one of
    /// the two roots is the one for which a signature made with `scalar`
    /// and `self` as the generator verifies.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::PointAtInfinity`] - `scalar` is zero.
    /// * [`EngineError::CapacityExceeded`] - `scalar` is longer than the
    ///   curve order.
    pub fn multiplication(&mut self, scalar: &Bignat, arena: &mut Arena) -> Result<(), EngineError> {
        if scalar.is_zero() {
            return Err(EngineError::PointAtInfinity);
        }
        let curve = self.curve;
        let p = curve.p();
        let coord_len = curve.coord_len();
        let point_len = curve.point_len();
        let order_len = curve.r().length();

        arena.with_bignats(
            [ScratchBignat::EcB, ScratchBignat::EcC, ScratchBignat::EcD],
            |[x, y_sq, y], arena| {
                x.set_size(coord_len)?;
                self.multiplication_x(scalar, x.as_bytes_mut(), arena)?;

                y_squared(y_sq, x, curve, arena)?;
                y.copy(y_sq)?;
                y.mod_sqrt(p, arena)?;

                arena.with_buffers(
                    [ScratchBuffer::Array1, ScratchBuffer::Array2, ScratchBuffer::UncompressedPoint],
                    |[key, signature, candidate], arena| {
                        let key = key.get_mut(..order_len).ok_or(EngineError::UnsupportedKeyLength)?;
                        scalar.prepend_zeros(key)?;
                        let candidate = candidate
                            .get_mut(..point_len)
                            .ok_or(EngineError::UnsupportedKeyLength)?;
                        encode_uncompressed(x, y, coord_len, candidate)?;

                        let domain = curve.domain().with_generator(&self.w);
                        let platform = arena.platform_mut();
                        let signature_len = platform.ecdsa_sign(&domain, key, &TRIAL_MESSAGE, signature)?;
                        let verified =
                            platform.ecdsa_verify(&domain, candidate, &TRIAL_MESSAGE, &signature[..signature_len])?;
                        if !verified {
                            log::trace!("point multiplication: taking p - y");
                            y.rsub_from(p)?;
                            encode_uncompressed(x, y, coord_len, candidate)?;
                        }
                        self.set_w(candidate)
                    },
                )
            },
        )
    }

    /// `self = scalar * self + other`.
    ///
    /// Should the addition fail, `self` is left at `scalar * self`.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::PointAtInfinity`] - `scalar` is zero or
    ///   `scalar * self` is the negation of `other`.
    pub fn multiplication_and_add(
        &mut self,
        scalar: &Bignat,
        other: &Point<'_>,
        arena: &mut Arena,
    ) -> Result<(), EngineError> {
        self.multiplication(scalar, arena)?;
        self.add(other, arena)
    }

    /// Set the point to a random multiple of the curve's generator.
    ///
    /// The scalar is drawn from the platform's random number generator and
    /// reduced modulo the order, zero being replaced by one. Should the
    /// multiplication fail, the point is left at the generator.
    pub fn randomize(&mut self, arena: &mut Arena) -> Result<(), EngineError> {
        let curve = self.curve;
        let order_len = curve.r().length();
        arena.with_bignats([ScratchBignat::EcF], |[k], arena| {
            k.set_size(order_len)?;
            arena.platform_mut().random_bytes(k.as_bytes_mut())?;
            k.modulo(curve.r())?;
            if k.is_zero() {
                k.one();
            }
            self.set_w(curve.g())?;
            self.multiplication(k, arena)
        })
    }

    /// `self = scalar * self`, with the scalar given big-endian.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::CapacityExceeded`] - The scalar exceeds the
    ///   coordinate size.
    pub fn multiplication_bytes(&mut self, scalar: &[u8], arena: &mut Arena) -> Result<(), EngineError> {
        arena.with_bignats([ScratchBignat::EcF], |[k], arena| {
            k.from_byte_array(scalar)?;
            self.multiplication(k, arena)
        })
    }

    /// Set the point to one with the given x coordinate.
    ///
    /// Which of the two possible y coordinates gets chosen is unspecified.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::NonResidue`] - No point with that x coordinate
    ///   exists.
    pub fn from_x(&mut self, x: &[u8], arena: &mut Arena) -> Result<(), EngineError> {
        self.recover(x, None, arena)
    }

    /// Set the point to one with the given x coordinate and, if specified,
    /// the given parity of y.
    fn recover(&mut self, x: &[u8], y_odd: Option<bool>, arena: &mut Arena) -> Result<(), EngineError> {
        let curve = self.curve;
        let p = curve.p();
        arena.with_bignats([ScratchBignat::EcC, ScratchBignat::EcD], |[xb, y], arena| {
            xb.from_byte_array(x)?;
            if !xb.lesser(p) {
                return Err(EngineError::InvalidPoint);
            }
            y_squared(y, xb, curve, arena)?;
            y.mod_sqrt(p, arena)?;
            if let Some(y_odd) = y_odd {
                if y.is_odd() != y_odd {
                    // p - 0 = p is no coordinate.
                    if y.is_zero() {
                        return Err(EngineError::InvalidPoint);
                    }
                    y.rsub_from(p)?;
                }
            }
            self.store(xb, y, arena)
        })
    }
}
