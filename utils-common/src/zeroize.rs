// SPDX-License-Identifier: Apache-2.0

//! Configuration dependent aliases for the
//! [`zeroize`](https://docs.rs/zeroize/latest/zeroize/index.html) crate.
//!
//! With the `zeroize` Cargo feature enabled, [`Zeroize`] and [`Zeroizing`]
//! resolve to the real definitions. Otherwise trivial, API compatible
//! substitutes are provided, so that code storing secret scalars or
//! intermediate values needn't be littered with `cfg`s.

#[cfg(feature = "zeroize")]
#[doc(hidden)]
mod cfg {
    pub use zeroize::Zeroize;
    pub use zeroize::Zeroizing;
}

#[cfg(not(feature = "zeroize"))]
#[doc(hidden)]
mod cfg {
    use core::ops;

    pub trait Zeroize {
        fn zeroize(&mut self);
    }

    impl<T> Zeroize for T {
        fn zeroize(&mut self) {}
    }

    #[derive(Clone, Debug, Default)]
    #[repr(transparent)]
    pub struct Zeroizing<T>(T);

    impl<T> Zeroizing<T> {
        pub fn new(value: T) -> Self {
            Self(value)
        }
    }

    impl<T> ops::Deref for Zeroizing<T> {
        type Target = T;

        fn deref(&self) -> &Self::Target {
            &self.0
        }
    }

    impl<T> ops::DerefMut for Zeroizing<T> {
        fn deref_mut(&mut self) -> &mut Self::Target {
            &mut self.0
        }
    }

    impl<T> From<T> for Zeroizing<T> {
        fn from(value: T) -> Self {
            Self(value)
        }
    }
}

/// Alias for
/// [`zeroize::Zeroize`](https://docs.rs/zeroize/latest/zeroize/trait.Zeroize.html)
/// or a no-op substitute, depending on the `zeroize` Cargo feature.
pub use cfg::Zeroize;

/// Alias for
/// [`zeroize::Zeroizing`](https://docs.rs/zeroize/latest/zeroize/struct.Zeroizing.html)
/// or a transparent substitute, depending on the `zeroize` Cargo feature.
pub use cfg::Zeroizing;
