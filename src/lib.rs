// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Softmech
//!
//! The cryptographic mechanism layer of a PKCS#11 software token: it
//! turns attribute based key objects and a mechanism selector into
//! concrete operations executed by OpenSSL.
//!
//! Session handling, object storage and slot management belong to the
//! caller; this crate only sees key objects for the duration of a call
//! and hands back operation objects that own any multi-part state.

mod interface {
    #![allow(non_upper_case_globals)]
    #![allow(non_camel_case_types)]
    #![allow(dead_code)]

    pub use cryptoki_sys::*;

    pub const CK_ULONG_SIZE: usize = std::mem::size_of::<CK_ULONG>();
}

pub mod attribute;
pub mod config;
pub mod error;
pub mod mechanism;
pub mod object;

#[cfg(feature = "log")]
mod log;

mod curve;
mod kasn1;
mod keymat;
mod misc;
mod ossl;

/* Include algorithms based on selected features */
include!("enabled.rs");

pub use interface::*;

#[cfg(any(feature = "aes", feature = "des"))]
pub use blockcipher::{cipher, ChainMode};

#[cfg(feature = "ecc")]
pub use ec::validate_ec_object;

use mechanism::Mechanisms;
use once_cell::sync::Lazy;

static MECHANISMS: Lazy<Mechanisms> = Lazy::new(|| {
    let mut mechs = Mechanisms::new();
    register_all(&mut mechs);
    mechs
});

/// Returns the read-only table of every mechanism this build supports
///
/// The table is built on first use and never modified afterwards.
pub fn mechanisms() -> &'static Mechanisms {
    &MECHANISMS
}

/// Returns the name of the primitive-library backend in use
pub fn backend_name() -> &'static str {
    ossl::backend().name()
}

#[cfg(test)]
mod tests;
