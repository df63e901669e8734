// SPDX-License-Identifier: Apache-2.0

//! [`Platform`] implementation in software, for hosts without a secure
//! element's coprocessor.

extern crate alloc;
use alloc::vec::Vec;

use super::{CurveDomain, Platform};
use crate::PlatformError;
use crate::utils_common::zeroize;

use digest::Digest as _;
use hmac::{Hmac, Mac as _};
use num_bigint::BigUint;
use num_traits::{One as _, Zero as _};
use sha2::Sha256;

const SHA256_DIGEST_LEN: usize = 32;

const fn illegal_value() -> PlatformError {
    PlatformError::crypto(PlatformError::REASON_ILLEGAL_VALUE)
}

fn write_be(value: &BigUint, out: &mut [u8]) -> Result<(), PlatformError> {
    let bytes = value.to_bytes_be();
    let bytes: &[u8] = if value.is_zero() { &[] } else { &bytes };
    if bytes.len() > out.len() {
        return Err(PlatformError {
            kind: crate::PlatformErrorKind::ArrayIndexOutOfBounds,
            reason: 0,
        });
    }
    let (head, tail) = out.split_at_mut(out.len() - bytes.len());
    head.fill(0);
    tail.copy_from_slice(bytes);
    Ok(())
}

fn significant_len(bytes: &[u8]) -> usize {
    bytes.len() - bytes.iter().take_while(|b| **b == 0).count()
}

type AffinePoint = (BigUint, BigUint);

/// Affine short Weierstrass arithmetic over `BigUint`, `None` being the
/// point at infinity.
struct SoftCurve {
    p: BigUint,
    a: BigUint,
    b: BigUint,
    n: BigUint,
    g: AffinePoint,
    coord_len: usize,
}

impl SoftCurve {
    fn new(domain: &CurveDomain<'_>) -> Result<Self, PlatformError> {
        let p = BigUint::from_bytes_be(domain.p);
        let n = BigUint::from_bytes_be(domain.r);
        if p <= BigUint::from(3u8) || n.is_zero() {
            return Err(illegal_value());
        }
        let coord_len = significant_len(domain.p);
        let mut curve = Self {
            a: BigUint::from_bytes_be(domain.a) % &p,
            b: BigUint::from_bytes_be(domain.b) % &p,
            p,
            n,
            g: (BigUint::zero(), BigUint::zero()),
            coord_len,
        };
        curve.g = curve.decode_point(domain.g)?;
        Ok(curve)
    }

    fn decode_point(&self, encoded: &[u8]) -> Result<AffinePoint, PlatformError> {
        if encoded.len() != 1 + 2 * self.coord_len || encoded[0] != 0x04 {
            return Err(illegal_value());
        }
        let x = BigUint::from_bytes_be(&encoded[1..1 + self.coord_len]);
        let y = BigUint::from_bytes_be(&encoded[1 + self.coord_len..]);
        if x >= self.p || y >= self.p {
            return Err(illegal_value());
        }
        let rhs = (&x * &x * &x + &self.a * &x + &self.b) % &self.p;
        if (&y * &y) % &self.p != rhs {
            return Err(illegal_value());
        }
        Ok((x, y))
    }

    fn encode_point(&self, point: &AffinePoint, out: &mut [u8]) -> Result<(), PlatformError> {
        if out.len() != 1 + 2 * self.coord_len {
            return Err(illegal_value());
        }
        out[0] = 0x04;
        let (x_out, y_out) = out[1..].split_at_mut(self.coord_len);
        write_be(&point.0, x_out)?;
        write_be(&point.1, y_out)
    }

    fn sub_mod(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + &self.p - (b % &self.p)) % &self.p
    }

    fn inv_mod_p(&self, v: &BigUint) -> BigUint {
        v.modpow(&(&self.p - BigUint::from(2u8)), &self.p)
    }

    fn double(&self, pt: &AffinePoint) -> Option<AffinePoint> {
        let (x, y) = pt;
        if y.is_zero() {
            return None;
        }
        let num = (BigUint::from(3u8) * x * x + &self.a) % &self.p;
        let den = self.inv_mod_p(&((BigUint::from(2u8) * y) % &self.p));
        let lambda = (num * den) % &self.p;
        let x_r = self.sub_mod(&self.sub_mod(&(&lambda * &lambda), x), x);
        let y_r = self.sub_mod(&(&lambda * self.sub_mod(x, &x_r)), y);
        Some((x_r, y_r))
    }

    fn add(&self, p1: &Option<AffinePoint>, p2: &Option<AffinePoint>) -> Option<AffinePoint> {
        let (p1, p2) = match (p1, p2) {
            (None, q) => return q.clone(),
            (q, None) => return q.clone(),
            (Some(p1), Some(p2)) => (p1, p2),
        };
        if p1.0 == p2.0 {
            if p1.1 == p2.1 {
                return self.double(p1);
            }
            return None;
        }
        let num = self.sub_mod(&p2.1, &p1.1);
        let den = self.inv_mod_p(&self.sub_mod(&p2.0, &p1.0));
        let lambda = (num * den) % &self.p;
        let x_r = self.sub_mod(&self.sub_mod(&(&lambda * &lambda), &p1.0), &p2.0);
        let y_r = self.sub_mod(&(&lambda * self.sub_mod(&p1.0, &x_r)), &p1.1);
        Some((x_r, y_r))
    }

    fn mul(&self, k: &BigUint, pt: &AffinePoint) -> Option<AffinePoint> {
        let mut acc: Option<AffinePoint> = None;
        for i in (0..k.bits()).rev() {
            acc = self.add(&acc, &acc);
            if k.bit(i) {
                acc = self.add(&acc, &Some(pt.clone()));
            }
        }
        acc
    }

    fn order_len(&self) -> usize {
        (self.n.bits() as usize).div_ceil(8)
    }

    /// Hash `message` and truncate to the bit length of the order.
    fn message_representative(&self, message: &[u8]) -> BigUint {
        let h = Sha256::digest(message);
        let e = BigUint::from_bytes_be(&h);
        let n_bits = self.n.bits();
        let h_bits = 8 * SHA256_DIGEST_LEN as u64;
        if h_bits > n_bits { e >> (h_bits - n_bits) } else { e }
    }

    fn parse_scalar(&self, bytes: &[u8]) -> Result<BigUint, PlatformError> {
        let d = BigUint::from_bytes_be(bytes) % &self.n;
        if d.is_zero() {
            return Err(illegal_value());
        }
        Ok(d)
    }
}

/// HMAC-SHA256 based key stream, used for key generation.
struct KeyStream {
    key: zeroize::Zeroizing<[u8; SHA256_DIGEST_LEN]>,
    counter: u64,
}

impl KeyStream {
    fn new(seed: &[u8]) -> Self {
        let mut key = zeroize::Zeroizing::new([0u8; SHA256_DIGEST_LEN]);
        key.copy_from_slice(&Sha256::digest(seed));
        Self { key, counter: 0 }
    }

    fn fill(&mut self, out: &mut [u8]) -> Result<(), PlatformError> {
        for chunk in out.chunks_mut(SHA256_DIGEST_LEN) {
            let mut mac = Hmac::<Sha256>::new_from_slice(&self.key[..]).map_err(|_| illegal_value())?;
            mac.update(&self.counter.to_be_bytes());
            mac.update(b"keygen");
            let block = mac.finalize().into_bytes();
            chunk.copy_from_slice(&block[..chunk.len()]);
            self.counter += 1;
        }
        Ok(())
    }
}

/// Software rendition of the platform capabilities.
///
/// The squaring engine can be switched off and the modular
/// exponentiation engine's size limit lowered, to mimic less capable
/// secure elements.
pub struct SoftwarePlatform {
    square_engine_available: bool,
    /// The squaring engine's modulus and its length in bytes.
    square_modulus: Option<(BigUint, usize)>,
    mod_exp_max_len: usize,
    key_stream: KeyStream,
}

impl SoftwarePlatform {
    /// Create a software platform.
    ///
    /// # Arguments:
    ///
    /// * `seed` - Seed for key generation.
    pub fn new(seed: &[u8]) -> Self {
        Self {
            square_engine_available: true,
            square_modulus: None,
            mod_exp_max_len: 1280 / 8,
            key_stream: KeyStream::new(seed),
        }
    }

    /// Make the squaring engine reject its initialization.
    pub fn without_square_engine(mut self) -> Self {
        self.square_engine_available = false;
        self
    }

    /// Limit the modulus length accepted by [`Platform::mod_exp()`].
    pub fn with_mod_exp_max_len(mut self, max_len: usize) -> Self {
        self.mod_exp_max_len = max_len;
        self
    }
}

impl Platform for SoftwarePlatform {
    fn init_square_engine(&mut self, modulus: &[u8]) -> Result<(), PlatformError> {
        if !self.square_engine_available {
            return Err(PlatformError::crypto(PlatformError::REASON_NO_SUCH_ALGORITHM));
        }
        let len = modulus.len();
        let modulus = BigUint::from_bytes_be(modulus);
        if modulus.is_zero() {
            return Err(illegal_value());
        }
        self.square_modulus = Some((modulus, len));
        Ok(())
    }

    fn square(&mut self, value: &mut [u8]) -> Result<(), PlatformError> {
        let (modulus, len) = self
            .square_modulus
            .as_ref()
            .ok_or(PlatformError::crypto(PlatformError::REASON_UNINITIALIZED_KEY))?;
        if value.len() != *len {
            return Err(PlatformError::crypto(PlatformError::REASON_INVALID_INIT));
        }
        let v = BigUint::from_bytes_be(value);
        let sq = (&v * &v) % modulus;
        write_be(&sq, value)
    }

    fn mod_exp_max_len(&self) -> usize {
        self.mod_exp_max_len
    }

    fn mod_exp(
        &mut self,
        base: &[u8],
        exponent: &[u8],
        modulus: &[u8],
        result: &mut [u8],
    ) -> Result<(), PlatformError> {
        if modulus.len() > self.mod_exp_max_len || result.len() != modulus.len() {
            return Err(PlatformError::crypto(PlatformError::REASON_ILLEGAL_USE));
        }
        let m = BigUint::from_bytes_be(modulus);
        if m.is_zero() {
            return Err(illegal_value());
        }
        let r = if m.is_one() {
            BigUint::zero()
        } else {
            BigUint::from_bytes_be(base).modpow(&BigUint::from_bytes_be(exponent), &m)
        };
        write_be(&r, result)
    }

    fn ecdh_plain_x(
        &mut self,
        domain: &CurveDomain<'_>,
        private: &[u8],
        peer: &[u8],
        x: &mut [u8],
    ) -> Result<usize, PlatformError> {
        let curve = SoftCurve::new(domain)?;
        let peer = curve.decode_point(peer)?;
        let d = BigUint::from_bytes_be(private);
        let shared = curve.mul(&d, &peer).ok_or_else(illegal_value)?;
        let x = x.get_mut(..curve.coord_len).ok_or_else(illegal_value)?;
        write_be(&shared.0, x)?;
        Ok(curve.coord_len)
    }

    fn ecdsa_sign(
        &mut self,
        domain: &CurveDomain<'_>,
        private: &[u8],
        message: &[u8],
        signature: &mut [u8],
    ) -> Result<usize, PlatformError> {
        let curve = SoftCurve::new(domain)?;
        let d = curve.parse_scalar(private)?;
        let e = curve.message_representative(message);
        let n_len = curve.order_len();
        if signature.len() < 2 * n_len {
            return Err(illegal_value());
        }

        // Deterministic nonce derived from the private key and the message.
        let d_bytes = zeroize::Zeroizing::new(d.to_bytes_be());
        let e_bytes = e.to_bytes_be();
        for attempt in 0u8..=u8::MAX {
            let mut mac = Hmac::<Sha256>::new_from_slice(&d_bytes).map_err(|_| illegal_value())?;
            mac.update(&e_bytes);
            mac.update(&[attempt]);
            let k = BigUint::from_bytes_be(&mac.finalize().into_bytes()) % &curve.n;
            if k.is_zero() {
                continue;
            }
            let big_r = match curve.mul(&k, &curve.g) {
                Some(big_r) => big_r,
                None => continue,
            };
            let r = big_r.0 % &curve.n;
            if r.is_zero() {
                continue;
            }
            let k_inv = k.modpow(&(&curve.n - BigUint::from(2u8)), &curve.n);
            let s = (k_inv * ((&e + &r * &d) % &curve.n)) % &curve.n;
            if s.is_zero() {
                continue;
            }
            let (r_out, rest) = signature.split_at_mut(n_len);
            write_be(&r, r_out)?;
            write_be(&s, &mut rest[..n_len])?;
            return Ok(2 * n_len);
        }
        Err(illegal_value())
    }

    fn ecdsa_verify(
        &mut self,
        domain: &CurveDomain<'_>,
        public: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, PlatformError> {
        let curve = SoftCurve::new(domain)?;
        let q = curve.decode_point(public)?;
        let n_len = curve.order_len();
        if signature.len() != 2 * n_len {
            return Ok(false);
        }
        let r = BigUint::from_bytes_be(&signature[..n_len]);
        let s = BigUint::from_bytes_be(&signature[n_len..]);
        if r.is_zero() || s.is_zero() || r >= curve.n || s >= curve.n {
            return Ok(false);
        }
        let e = curve.message_representative(message);
        let w = s.modpow(&(&curve.n - BigUint::from(2u8)), &curve.n);
        let u1 = (&e * &w) % &curve.n;
        let u2 = (&r * &w) % &curve.n;
        let x = curve.add(&curve.mul(&u1, &curve.g), &curve.mul(&u2, &q));
        Ok(match x {
            Some(x) => x.0 % &curve.n == r,
            None => false,
        })
    }

    fn generate_key_pair(
        &mut self,
        domain: &CurveDomain<'_>,
        private: &mut [u8],
        public: &mut [u8],
    ) -> Result<(), PlatformError> {
        let curve = SoftCurve::new(domain)?;
        let n_len = curve.order_len();
        if private.len() != n_len {
            return Err(illegal_value());
        }
        let mut buf = zeroize::Zeroizing::new(Vec::new());
        buf.resize(n_len + 8, 0u8);
        loop {
            self.key_stream.fill(&mut buf)?;
            let d = BigUint::from_bytes_be(&buf) % &curve.n;
            if d.is_zero() {
                continue;
            }
            let q = curve.mul(&d, &curve.g).ok_or_else(illegal_value)?;
            curve.encode_point(&q, public)?;
            write_be(&d, private)?;
            return Ok(());
        }
    }

    fn random_bytes(&mut self, out: &mut [u8]) -> Result<(), PlatformError> {
        self.key_stream.fill(out)
    }

    fn digest_len(&self) -> usize {
        SHA256_DIGEST_LEN
    }

    fn digest(&mut self, data: &[u8], out: &mut [u8]) -> Result<usize, PlatformError> {
        let out = out.get_mut(..SHA256_DIGEST_LEN).ok_or_else(illegal_value)?;
        out.copy_from_slice(&Sha256::digest(data));
        Ok(SHA256_DIGEST_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    // NIST P-256
    const P: [u8; 32] = hex!("ffffffff00000001000000000000000000000000ffffffffffffffffffffffff");
    const A: [u8; 32] = hex!("ffffffff00000001000000000000000000000000fffffffffffffffffffffffc");
    const B: [u8; 32] = hex!("5ac635d8aa3a93e7b3ebbd55769886bc651d06b0cc53b0f63bce3c3e27d2604b");
    const N: [u8; 32] = hex!("ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551");
    const G: [u8; 65] = hex!(
        "04"
        "6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296"
        "4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5"
    );
    // 2G
    const G2_X: [u8; 32] = hex!("7cf27b188d034f7e8a52380304b51ac3c08969e277f21b35a60b48fc47669978");

    fn domain() -> CurveDomain<'static> {
        CurveDomain {
            p: &P,
            a: &A,
            b: &B,
            g: &G,
            r: &N,
        }
    }

    #[test]
    fn test_ecdh_plain_x() {
        let mut platform = SoftwarePlatform::new(b"test");
        let mut x = [0u8; 32];
        let len = platform.ecdh_plain_x(&domain(), &[2], &G, &mut x).unwrap();
        assert_eq!(len, 32);
        assert_eq!(x, G2_X);

        assert!(platform.ecdh_plain_x(&domain(), &N, &G, &mut x).is_err());
    }

    #[test]
    fn test_ecdsa_sign_verify() {
        let mut platform = SoftwarePlatform::new(b"test");
        let mut private = [0u8; 32];
        let mut public = [0u8; 65];
        platform.generate_key_pair(&domain(), &mut private, &mut public).unwrap();

        let mut sig = [0u8; 64];
        let sig_len = platform.ecdsa_sign(&domain(), &private, b"message", &mut sig).unwrap();
        assert_eq!(sig_len, 64);
        assert!(platform.ecdsa_verify(&domain(), &public, b"message", &sig).unwrap());
        assert!(!platform.ecdsa_verify(&domain(), &public, b"massage", &sig).unwrap());

        sig[10] ^= 1;
        assert!(!platform.ecdsa_verify(&domain(), &public, b"message", &sig).unwrap());
    }

    #[test]
    fn test_square_engine() {
        let mut platform = SoftwarePlatform::new(b"test");
        assert_eq!(
            platform.square(&mut [0u8; 4]),
            Err(PlatformError::crypto(PlatformError::REASON_UNINITIALIZED_KEY))
        );
        platform.init_square_engine(&[0xff; 4]).unwrap();
        let mut v = [0, 0, 0x01, 0x00];
        platform.square(&mut v).unwrap();
        assert_eq!(v, [0, 1, 0, 0]);

        // Operands must match the modulus length the engine was set up with.
        assert_eq!(
            platform.square(&mut [0u8, 1, 0, 0, 0]),
            Err(PlatformError::crypto(PlatformError::REASON_INVALID_INIT))
        );

        let mut platform = SoftwarePlatform::new(b"test").without_square_engine();
        assert_eq!(
            platform.init_square_engine(&[0xff; 4]),
            Err(PlatformError::crypto(PlatformError::REASON_NO_SUCH_ALGORITHM))
        );
    }

    #[test]
    fn test_mod_exp() {
        let mut platform = SoftwarePlatform::new(b"test").with_mod_exp_max_len(2);
        let mut r = [0u8; 1];
        platform.mod_exp(&[3], &[5], &[7], &mut r).unwrap();
        assert_eq!(r, [5]);
        let mut r = [0u8; 3];
        assert!(platform.mod_exp(&[3], &[5], &[1, 0, 7], &mut r).is_err());
    }

    #[test]
    fn test_random_bytes() {
        let mut a = SoftwarePlatform::new(b"seed");
        let mut b = SoftwarePlatform::new(b"seed");
        let mut first = [0u8; 40];
        let mut second = [0u8; 40];
        a.random_bytes(&mut first).unwrap();
        a.random_bytes(&mut second).unwrap();
        assert_ne!(first, second);
        assert_ne!(first, [0u8; 40]);

        let mut replay = [0u8; 40];
        b.random_bytes(&mut replay).unwrap();
        assert_eq!(first, replay);
    }
}
