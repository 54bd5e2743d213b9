// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Bindings to the primitive library
//!
//! OpenSSL exposes two generations of key construction API: the older
//! component setters (`RSA_set0_key`, `EC_KEY_set_private_key`, ...) and
//! the encoder/decoder plus `EVP_PKEY_CTX` model. Each generation lives
//! behind the [Backend] trait so mechanism code never branches on the
//! library version.

use std::fmt::Debug;

use crate::config::{BackendChoice, CONFIG};
use crate::curve::Curve;
use crate::error::Result;
use crate::keymat::{DhPrivate, EcPrivate, EcPublic, RsaPrivate, RsaPublic};

use once_cell::sync::Lazy;
use openssl::bn::BigNum;
use zeroize::Zeroizing;

/// Maps an OpenSSL failure to the given return value, tracing the failed
/// call when logging is enabled
macro_rules! trace_ossl {
    ($call:expr, $fname:expr, $rv:expr) => {
        $call.map_err(|_e| {
            #[cfg(feature = "log")]
            log::error!("{} failed: {}", $fname, _e);
            $crate::error::Error::ck_rv_from_error($rv, _e)
        })
    };
}

pub mod evp;
pub mod legacy;

/// Operations the mechanism layer needs from the primitive library
///
/// Raw RSA operations take an input exactly as long as the modulus and
/// do no padding at all. EC signatures travel as `(r, s)` pairs of
/// unsigned big endian integers of any width.
pub trait Backend: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Computes `input ^ e mod n`
    fn rsa_public(&self, key: &RsaPublic, input: &[u8]) -> Result<Vec<u8>>;

    /// Computes `input ^ d mod n`, using the CRT form when available
    fn rsa_private(
        &self,
        key: &RsaPrivate,
        input: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>>;

    /// Generates a key with a modulus of `bits` bits and the public
    /// exponent `exponent`; all CRT components are returned
    fn rsa_generate(&self, bits: u32, exponent: &[u8]) -> Result<RsaPrivate>;

    /// Computes the uncompressed public point for `scalar` and checks the
    /// resulting key pair
    fn ec_derive_public(&self, curve: &Curve, scalar: &[u8])
        -> Result<Vec<u8>>;

    /// Fails with `CKR_PUBLIC_KEY_INVALID` if the point is not on the curve
    fn ec_check_public(&self, key: &EcPublic) -> Result<()>;

    fn ec_generate(&self, curve: &Curve) -> Result<EcPrivate>;

    fn ecdsa_sign(
        &self,
        key: &EcPrivate,
        digest: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>)>;

    fn ecdsa_verify(
        &self,
        key: &EcPublic,
        digest: &[u8],
        r: &[u8],
        s: &[u8],
    ) -> Result<bool>;

    /// Raw ECDH: the x coordinate of the shared point, padded to the field
    /// length
    fn ecdh(&self, key: &EcPrivate, peer: &EcPublic)
        -> Result<Zeroizing<Vec<u8>>>;

    /// Generates a DH private value for the group `(prime, base)`,
    /// returning it along with the matching public value
    fn dh_generate(
        &self,
        prime: &[u8],
        base: &[u8],
    ) -> Result<(DhPrivate, Vec<u8>)>;

    /// Computes `peer ^ x mod p`, without leading zeros
    fn dh_derive(&self, key: &DhPrivate, peer: &[u8])
        -> Result<Zeroizing<Vec<u8>>>;
}

static LEGACY: legacy::LegacyBackend = legacy::LegacyBackend;
static EVP: evp::EvpBackend = evp::EvpBackend;

/// Picks the backend for the linked library unless configured otherwise
fn select_backend(choice: BackendChoice) -> &'static dyn Backend {
    match choice {
        BackendChoice::Legacy => &LEGACY,
        BackendChoice::Evp => &EVP,
        BackendChoice::Auto => {
            if openssl::version::number() >= 0x3000_0000 {
                &EVP
            } else {
                &LEGACY
            }
        }
    }
}

static BACKEND: Lazy<&'static dyn Backend> =
    Lazy::new(|| select_backend(CONFIG.backend));

/// Returns the process wide backend
pub fn backend() -> &'static dyn Backend {
    *BACKEND
}

/// Returns both backends, used to cross check them against each other
#[cfg(test)]
pub fn all_backends() -> [&'static dyn Backend; 2] {
    [&LEGACY, &EVP]
}

/// Converts an unsigned big endian value to a BigNum
pub fn bn(v: &[u8]) -> Result<BigNum> {
    Ok(BigNum::from_slice(v)?)
}

/// Converts a secret value to a BigNum allocated in secure memory
pub fn secure_bn(v: &[u8]) -> Result<BigNum> {
    let mut b = BigNum::new_secure()?;
    b.copy_from_slice(v)?;
    Ok(b)
}
