// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Elliptic curve mechanisms over short Weierstrass curves

use crate::curve::Curve;
use crate::error::Result;
use crate::interface::*;
use crate::keymat::{ec_store_generated, KeyMaterial};
use crate::mechanism::*;
use crate::object::{required_bytes, Object};
use crate::ossl::backend;

pub mod ecdh;
pub mod ecdsa;

/* Bit sizes of the smallest and largest supported curve */
pub const EC_MIN_BITS: CK_ULONG = 160;
pub const EC_MAX_BITS: CK_ULONG = 521;

/// Checks an EC key object can be turned into usable key material
///
/// Public keys must carry a point on the curve named by CKA_EC_PARAMS,
/// private keys must have a scalar that yields a valid key pair.
pub fn validate_ec_object(obj: &Object) -> Result<()> {
    if obj.get_key_type() != CKK_EC {
        return Err(CKR_KEY_TYPE_INCONSISTENT)?;
    }
    match KeyMaterial::from_object(obj)? {
        KeyMaterial::EcPublic(_) | KeyMaterial::EcPrivate(_) => Ok(()),
        _ => Err(CKR_KEY_TYPE_INCONSISTENT)?,
    }
}

#[derive(Debug)]
struct EcKeyPairGenMechanism {
    info: CK_MECHANISM_INFO,
}

impl Mechanism for EcKeyPairGenMechanism {
    fn info(&self) -> &CK_MECHANISM_INFO {
        &self.info
    }

    fn generate_keypair(
        &self,
        mech: &CK_MECHANISM,
        pubkey: &mut Object,
        privkey: &mut Object,
    ) -> Result<()> {
        MechParams::from_mechanism(mech)?;
        let params = required_bytes(pubkey, CKA_EC_PARAMS)?.clone();
        let curve = Curve::from_params(&params)?;
        let key = backend().ec_generate(&curve)?;
        ec_store_generated(&key, &params, pubkey, privkey)
    }
}

pub fn register(mechs: &mut Mechanisms) {
    mechs.add_mechanism(
        CKM_EC_KEY_PAIR_GEN,
        Box::new(EcKeyPairGenMechanism {
            info: new_info(EC_MIN_BITS, EC_MAX_BITS, CKF_GENERATE_KEY_PAIR),
        }),
    );
    ecdsa::register(mechs);
    ecdh::register(mechs);
}
