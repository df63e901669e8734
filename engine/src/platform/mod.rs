// SPDX-License-Identifier: Apache-2.0

//! Capabilities the engine consumes from the underlying platform.
//!
//! All values cross this interface as big-endian byte strings. Points are
//! passed in uncompressed SEC1 form, `0x04 || x || y`.

use crate::PlatformError;

#[cfg(feature = "software_platform")]
mod software;

#[cfg(feature = "software_platform")]
pub use software::SoftwarePlatform;

/// Elliptic curve domain parameters as handed to the platform's native
/// EC primitives.
#[derive(Clone, Copy, Debug)]
pub struct CurveDomain<'a> {
    /// Field prime.
    pub p: &'a [u8],
    /// Curve coefficient `a`.
    pub a: &'a [u8],
    /// Curve coefficient `b`.
    pub b: &'a [u8],
    /// Generator in uncompressed form.
    pub g: &'a [u8],
    /// Order of the generator.
    pub r: &'a [u8],
}

impl<'a> CurveDomain<'a> {
    /// The same domain with another generator substituted.
    ///
    /// # Arguments:
    ///
    /// * `g` - The generator in uncompressed form.
    pub fn with_generator(&self, g: &'a [u8]) -> Self {
        Self { g, ..*self }
    }
}

/// Native primitives offered by the secure element.
pub trait Platform {
    /// Configure the fixed-exponent squaring engine with its modulus.
    ///
    /// # Errors:
    ///
    /// * [`PlatformError`] - The engine is unavailable or rejected the
    ///   modulus.
    fn init_square_engine(&mut self, modulus: &[u8]) -> Result<(), PlatformError>;

    /// Square `value` in place, modulo the squaring engine's modulus.
    ///
    /// `value` must have the same length as the modulus passed to
    /// [`init_square_engine()`](Self::init_square_engine).
    fn square(&mut self, value: &mut [u8]) -> Result<(), PlatformError>;

    /// Largest modulus length in bytes the general modular exponentiation
    /// engine accepts.
    fn mod_exp_max_len(&self) -> usize;

    /// Compute `base^exponent mod modulus`.
    ///
    /// `result` must be exactly as long as `modulus`, the value gets
    /// written left-padded with zeroes.
    fn mod_exp(
        &mut self,
        base: &[u8],
        exponent: &[u8],
        modulus: &[u8],
        result: &mut [u8],
    ) -> Result<(), PlatformError>;

    /// Plain elliptic curve Diffie-Hellman: the x coordinate of
    /// `private * peer`.
    ///
    /// Returns the number of bytes written to `x`, which is always the
    /// length of the field prime.
    fn ecdh_plain_x(
        &mut self,
        domain: &CurveDomain<'_>,
        private: &[u8],
        peer: &[u8],
        x: &mut [u8],
    ) -> Result<usize, PlatformError>;

    /// ECDSA with SHA-256 over `message`, producing the raw `r || s` form.
    ///
    /// Returns the signature length.
    fn ecdsa_sign(
        &mut self,
        domain: &CurveDomain<'_>,
        private: &[u8],
        message: &[u8],
        signature: &mut [u8],
    ) -> Result<usize, PlatformError>;

    /// Verify a raw `r || s` ECDSA with SHA-256 signature.
    fn ecdsa_verify(
        &mut self,
        domain: &CurveDomain<'_>,
        public: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, PlatformError>;

    /// Generate a fresh key pair on the given curve.
    ///
    /// `private` must be as long as the order, `public` hold an
    /// uncompressed point.
    fn generate_key_pair(
        &mut self,
        domain: &CurveDomain<'_>,
        private: &mut [u8],
        public: &mut [u8],
    ) -> Result<(), PlatformError>;

    /// Fill `out` from the platform's random number generator.
    fn random_bytes(&mut self, out: &mut [u8]) -> Result<(), PlatformError>;

    /// Output length of [`digest()`](Self::digest).
    fn digest_len(&self) -> usize;

    /// Hash `data` into `out` with the platform's fixed digest.
    ///
    /// Returns the digest length.
    fn digest(&mut self, data: &[u8], out: &mut [u8]) -> Result<usize, PlatformError>;
}
