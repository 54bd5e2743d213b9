// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! PKCS #3 Diffie-Hellman over caller supplied groups

use crate::error::Result;
use crate::interface::*;
use crate::keymat::{
    dh_private_from_object, dh_store_generated, store_derived_secret,
};
use crate::mechanism::*;
use crate::misc::strip_leading_zeros;
use crate::object::{required_bytes, Object};
use crate::ossl::backend;

const DH_MIN_PRIME_BYTES: usize = 64;
const DH_MAX_PRIME_BYTES: usize = 256;

/// Rejects public values outside of `1 < y < p - 1`
fn check_peer_value(prime: &[u8], peer: &[u8]) -> Result<()> {
    let p = strip_leading_zeros(prime);
    let y = strip_leading_zeros(peer);
    if y.is_empty() || (y.len() == 1 && y[0] == 1) {
        return Err(CKR_MECHANISM_PARAM_INVALID)?;
    }
    if y.len() > p.len() {
        return Err(CKR_MECHANISM_PARAM_INVALID)?;
    }
    if y.len() == p.len() {
        /* p is odd, so p - 1 only differs in the last byte */
        let mut pm1 = p.to_vec();
        let last = pm1.len() - 1;
        pm1[last] &= 0xfe;
        if y >= pm1.as_slice() {
            return Err(CKR_MECHANISM_PARAM_INVALID)?;
        }
    }
    Ok(())
}

#[derive(Debug)]
struct DhKeyPairGenMechanism {
    info: CK_MECHANISM_INFO,
}

impl Mechanism for DhKeyPairGenMechanism {
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
        let prime = required_bytes(pubkey, CKA_PRIME)?.clone();
        let base = required_bytes(pubkey, CKA_BASE)?.clone();
        let plen = strip_leading_zeros(&prime).len();
        if plen < DH_MIN_PRIME_BYTES || plen > DH_MAX_PRIME_BYTES {
            return Err(CKR_ATTRIBUTE_VALUE_INVALID)?;
        }
        let (key, public) = backend().dh_generate(&prime, &base)?;
        dh_store_generated(&key, &public, pubkey, privkey)
    }
}

#[derive(Debug)]
struct DhDeriveMechanism {
    info: CK_MECHANISM_INFO,
}

impl Mechanism for DhDeriveMechanism {
    fn info(&self) -> &CK_MECHANISM_INFO {
        &self.info
    }

    fn derive(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
        template: &mut Object,
    ) -> Result<()> {
        let peer = match MechParams::from_mechanism(mech)? {
            MechParams::PeerValue(v) => v,
            _ => return Err(CKR_MECHANISM_PARAM_INVALID)?,
        };
        key.check_key_ops(CKO_PRIVATE_KEY, CKK_DH, CKA_DERIVE)?;
        let local = dh_private_from_object(key)?;
        check_peer_value(&local.prime, &peer)?;
        let secret = backend().dh_derive(&local, &peer)?;
        store_derived_secret(template, &secret)
    }
}

pub fn register(mechs: &mut Mechanisms) {
    mechs.add_mechanism(
        CKM_DH_PKCS_KEY_PAIR_GEN,
        Box::new(DhKeyPairGenMechanism {
            info: new_info(512, 2048, CKF_GENERATE_KEY_PAIR),
        }),
    );
    mechs.add_mechanism(
        CKM_DH_PKCS_DERIVE,
        Box::new(DhDeriveMechanism {
            info: new_info(512, 2048, CKF_DERIVE),
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_range() {
        let p = [0x00, 0xc5, 0x03];
        assert!(check_peer_value(&p, &[0x02]).is_ok());
        assert!(check_peer_value(&p, &[0xc5, 0x01]).is_ok());
        assert!(check_peer_value(&p, &[0x00, 0x01]).is_err());
        assert!(check_peer_value(&p, &[0xc5, 0x02]).is_err());
        assert!(check_peer_value(&p, &[0xc5, 0x03]).is_err());
        assert!(check_peer_value(&p, &[0x01, 0x00, 0x00]).is_err());
        assert!(check_peer_value(&p, &[]).is_err());
    }
}
