// SPDX-License-Identifier: Apache-2.0

//! Bounded capacity big number and elliptic curve arithmetic on top of a
//! secure element's native cryptographic primitives.
//!
//! All working storage is allocated once, up front: caller-owned
//! [`Bignat`]s, [`Integer`]s and [`Point`]s have a fixed capacity, and
//! intermediate values live in the named scratch objects of an [`Arena`],
//! guarded by a lock table catching incorrectly nested reuse.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use scmath_utils_common as utils_common;

pub mod arena;
pub mod bignat;
pub mod config;
pub mod curve;
mod error;
pub mod integer;
pub mod locker;
pub mod platform;
pub mod point;

pub use arena::{Arena, MultStrategy, ScratchBignat, ScratchBuffer, ScratchId};
pub use bignat::Bignat;
pub use config::EngineConfig;
pub use curve::{Curve, CurveParameters};
pub use error::*;
pub use integer::Integer;
pub use point::Point;
