// SPDX-License-Identifier: Apache-2.0

//! Elliptic curve domain parameters.

extern crate alloc;
use alloc::vec::Vec;

use hex_literal::hex;

use crate::arena::Arena;
use crate::bignat::Bignat;
use crate::platform::CurveDomain;
use crate::utils_common::alloc::{try_alloc_vec, try_alloc_zeroizing_bytes};
use crate::utils_common::zeroize;
use crate::EngineError;

#[cfg(feature = "nist_p224")]
const NIST_P224_P: [u8; 28] = hex!("ffffffffffffffffffffffffffffffff000000000000000000000001");
#[cfg(feature = "nist_p224")]
const NIST_P224_N: [u8; 28] = hex!("ffffffffffffffffffffffffffff16a2e0b8f03e13dd29455c5c2a3d");
#[cfg(feature = "nist_p224")]
const NIST_P224_A: [u8; 28] = hex!("fffffffffffffffffffffffffffffffefffffffffffffffffffffffe");
#[cfg(feature = "nist_p224")]
const NIST_P224_B: [u8; 28] = hex!("b4050a850c04b3abf54132565044b0b7d7bfd8ba270b39432355ffb4");
#[cfg(feature = "nist_p224")]
const NIST_P224_G_X: [u8; 28] = hex!("b70e0cbd6bb4bf7f321390b94a03c1d356c21122343280d6115c1d21");
#[cfg(feature = "nist_p224")]
const NIST_P224_G_Y: [u8; 28] = hex!("bd376388b5f723fb4c22dfe6cd4375a05a07476444d5819985007e34");

#[cfg(feature = "secp256r1")]
const SECP256R1_P: [u8; 32] = hex!("ffffffff00000001000000000000000000000000ffffffffffffffffffffffff");
#[cfg(feature = "secp256r1")]
const SECP256R1_N: [u8; 32] = hex!("ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551");
#[cfg(feature = "secp256r1")]
const SECP256R1_A: [u8; 32] = hex!("ffffffff00000001000000000000000000000000fffffffffffffffffffffffc");
#[cfg(feature = "secp256r1")]
const SECP256R1_B: [u8; 32] = hex!("5ac635d8aa3a93e7b3ebbd55769886bc651d06b0cc53b0f63bce3c3e27d2604b");
#[cfg(feature = "secp256r1")]
const SECP256R1_G_X: [u8; 32] = hex!("6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296");
#[cfg(feature = "secp256r1")]
const SECP256R1_G_Y: [u8; 32] = hex!("4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5");

#[cfg(feature = "secp256k1")]
const SECP256K1_P: [u8; 32] = hex!("fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f");
#[cfg(feature = "secp256k1")]
const SECP256K1_N: [u8; 32] = hex!("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141");
#[cfg(feature = "secp256k1")]
const SECP256K1_A: [u8; 1] = hex!("00");
#[cfg(feature = "secp256k1")]
const SECP256K1_B: [u8; 1] = hex!("07");
#[cfg(feature = "secp256k1")]
const SECP256K1_G_X: [u8; 32] = hex!("79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798");
#[cfg(feature = "secp256k1")]
const SECP256K1_G_Y: [u8; 32] = hex!("483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8");

/// Static domain parameters of a short Weierstrass curve, all big-endian.
#[derive(Clone, Copy, Debug)]
pub struct CurveParameters {
    pub name: &'static str,
    pub p: &'static [u8],
    pub a: &'static [u8],
    pub b: &'static [u8],
    pub g_x: &'static [u8],
    pub g_y: &'static [u8],
    pub n: &'static [u8],
}

#[cfg(feature = "nist_p224")]
pub const NIST_P224: CurveParameters = CurveParameters {
    name: "nist_p224",
    p: &NIST_P224_P,
    a: &NIST_P224_A,
    b: &NIST_P224_B,
    g_x: &NIST_P224_G_X,
    g_y: &NIST_P224_G_Y,
    n: &NIST_P224_N,
};

#[cfg(feature = "secp256r1")]
pub const SECP256R1: CurveParameters = CurveParameters {
    name: "secp256r1",
    p: &SECP256R1_P,
    a: &SECP256R1_A,
    b: &SECP256R1_B,
    g_x: &SECP256R1_G_X,
    g_y: &SECP256R1_G_Y,
    n: &SECP256R1_N,
};

#[cfg(feature = "secp256k1")]
pub const SECP256K1: CurveParameters = CurveParameters {
    name: "secp256k1",
    p: &SECP256K1_P,
    a: &SECP256K1_A,
    b: &SECP256K1_B,
    g_x: &SECP256K1_G_X,
    g_y: &SECP256K1_G_Y,
    n: &SECP256K1_N,
};

/// Uncompressed point encoding prefix.
pub(crate) const POINT_FORMAT_UNCOMPRESSED: u8 = 0x04;

/// A curve's domain parameters together with an ephemeral key pair bound
/// to them.
pub struct Curve {
    p: Bignat,
    a: Bignat,
    b: Bignat,
    r: Bignat,
    g: Vec<u8>,
    coord_len: usize,

    private_key: zeroize::Zeroizing<Vec<u8>>,
    private_key_valid: bool,
    public_key: Vec<u8>,
    public_key_valid: bool,
}

impl Curve {
    /// Load a curve's domain parameters.
    ///
    /// # Arguments:
    ///
    /// * `params` - The domain parameters.
    /// * `arena` - The arena the curve's points will get operated on with.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::UnsupportedKeyLength`] - The arena's scratch storage
    ///   is too small for the curve.
    /// * [`EngineError::InvalidPoint`] - Malformed generator.
    pub fn new(params: &CurveParameters, arena: &Arena) -> Result<Self, EngineError> {
        let mut p = Bignat::from_bytes(params.p)?;
        p.shrink();
        let coord_len = p.length();
        if coord_len == 0 || 2 * coord_len > arena.config().max_point_len {
            return Err(EngineError::UnsupportedKeyLength);
        }
        if params.g_x.len() > coord_len || params.g_y.len() > coord_len {
            return Err(EngineError::InvalidPoint);
        }

        let mut a = Bignat::new(coord_len)?;
        a.from_byte_array(params.a)?;
        a.resize_to_max(false);
        let mut b = Bignat::new(coord_len)?;
        b.from_byte_array(params.b)?;
        b.resize_to_max(false);
        let r = Bignat::from_bytes(params.n)?;

        let mut g = try_alloc_vec::<u8>(1 + 2 * coord_len)?;
        g[0] = POINT_FORMAT_UNCOMPRESSED;
        Bignat::from_bytes(params.g_x)?.prepend_zeros(&mut g[1..1 + coord_len])?;
        Bignat::from_bytes(params.g_y)?.prepend_zeros(&mut g[1 + coord_len..])?;

        let n_len = r.significant_len();
        log::debug!("curve {}: {} byte coordinates", params.name, coord_len);
        Ok(Self {
            p,
            a,
            b,
            r,
            g,
            coord_len,
            private_key: try_alloc_zeroizing_bytes(n_len)?,
            private_key_valid: false,
            public_key: try_alloc_vec::<u8>(1 + 2 * coord_len)?,
            public_key_valid: false,
        })
    }

    pub fn p(&self) -> &Bignat {
        &self.p
    }

    pub fn a(&self) -> &Bignat {
        &self.a
    }

    pub fn b(&self) -> &Bignat {
        &self.b
    }

    /// Order of the generator.
    pub fn r(&self) -> &Bignat {
        &self.r
    }

    /// The generator in uncompressed form.
    pub fn g(&self) -> &[u8] {
        &self.g
    }

    pub fn coord_len(&self) -> usize {
        self.coord_len
    }

    /// Length of an uncompressed point encoding.
    pub fn point_len(&self) -> usize {
        1 + 2 * self.coord_len
    }

    /// The domain parameters in the form consumed by the platform.
    pub fn domain(&self) -> CurveDomain<'_> {
        CurveDomain {
            p: self.p.as_bytes(),
            a: self.a.as_bytes(),
            b: self.b.as_bytes(),
            g: &self.g,
            r: self.r.as_bytes(),
        }
    }

    /// Replace the generator.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::PointInvalidLength`] - `g` is not an uncompressed
    ///   point of this curve's size.
    pub fn set_g(&mut self, g: &[u8]) -> Result<(), EngineError> {
        if g.len() != self.point_len() {
            return Err(EngineError::PointInvalidLength);
        }
        if g[0] != POINT_FORMAT_UNCOMPRESSED {
            return Err(EngineError::InvalidPoint);
        }
        self.g.copy_from_slice(g);
        self.public_key_valid = false;
        Ok(())
    }

    /// Generate a fresh ephemeral key pair on the curve.
    pub fn new_key_pair(&mut self, arena: &mut Arena) -> Result<(), EngineError> {
        self.private_key_valid = false;
        self.public_key_valid = false;
        let domain = CurveDomain {
            p: self.p.as_bytes(),
            a: self.a.as_bytes(),
            b: self.b.as_bytes(),
            g: &self.g,
            r: self.r.as_bytes(),
        };
        arena
            .platform_mut()
            .generate_key_pair(&domain, &mut self.private_key, &mut self.public_key)?;
        self.private_key_valid = true;
        self.public_key_valid = true;
        Ok(())
    }

    /// Load a scalar as the ephemeral private key.
    ///
    /// The ephemeral public key becomes unavailable.
    ///
    /// # Errors:
    ///
    /// * [`EngineError::CapacityExceeded`] - The scalar is longer than the
    ///   order.
    pub fn bignat_as_private_key(&mut self, scalar: &Bignat) -> Result<(), EngineError> {
        scalar.prepend_zeros(&mut self.private_key)?;
        self.private_key_valid = true;
        self.public_key_valid = false;
        Ok(())
    }

    pub fn private_key(&self) -> Option<&[u8]> {
        self.private_key_valid.then_some(&self.private_key[..])
    }

    pub fn public_key(&self) -> Option<&[u8]> {
        self.public_key_valid.then_some(&self.public_key[..])
    }
}

#[cfg(all(test, feature = "software_platform", feature = "secp256r1"))]
mod tests {
    use super::*;
    use crate::arena::tests::test_arena;

    #[test]
    fn test_new_curve() {
        let arena = test_arena(256);
        let curve = Curve::new(&SECP256R1, &arena).unwrap();
        assert_eq!(curve.coord_len(), 32);
        assert_eq!(curve.point_len(), 65);
        assert_eq!(curve.g()[0], 0x04);
        assert_eq!(&curve.g()[1..33], &SECP256R1_G_X);
        assert_eq!(curve.domain().r, &SECP256R1_N);
        assert!(curve.private_key().is_none());
    }

    #[cfg(feature = "secp256k1")]
    #[test]
    fn test_short_coefficients() {
        let arena = test_arena(256);
        let curve = Curve::new(&SECP256K1, &arena).unwrap();
        assert_eq!(curve.a().length(), 32);
        assert!(curve.a().is_zero());
        assert_eq!(curve.b().as_bytes()[31], 7);
    }

    #[test]
    fn test_unsupported_size() {
        let arena = test_arena(224);
        let params = CurveParameters {
            name: "too large",
            p: &[0xff; 40],
            ..SECP256R1
        };
        assert!(matches!(Curve::new(&params, &arena), Err(EngineError::UnsupportedKeyLength)));
    }

    #[test]
    fn test_key_pair() {
        let mut arena = test_arena(256);
        let mut curve = Curve::new(&SECP256R1, &arena).unwrap();
        curve.new_key_pair(&mut arena).unwrap();
        assert_eq!(curve.private_key().unwrap().len(), 32);
        assert_eq!(curve.public_key().unwrap()[0], 0x04);

        curve.bignat_as_private_key(&Bignat::from_bytes(&[0x2a]).unwrap()).unwrap();
        assert_eq!(curve.private_key().unwrap()[31], 0x2a);
        assert!(curve.public_key().is_none());
        assert_eq!(
            curve.bignat_as_private_key(&Bignat::from_bytes(&[1; 33]).unwrap()),
            Err(EngineError::CapacityExceeded)
        );

        assert_eq!(curve.set_g(&[0x04; 64]), Err(EngineError::PointInvalidLength));
        let mut g = [0u8; 65];
        g.copy_from_slice(curve.g());
        g[0] = 0x02;
        assert_eq!(curve.set_g(&g), Err(EngineError::InvalidPoint));
    }
}
