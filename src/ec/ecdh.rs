// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use crate::curve::decode_point;
use crate::ec::{EC_MAX_BITS, EC_MIN_BITS};
use crate::error::Result;
use crate::interface::*;
use crate::keymat::{
    ec_private_from_object, ec_public_from_point, store_derived_secret,
};
use crate::mechanism::*;
use crate::object::Object;
use crate::ossl::backend;

#[derive(Debug)]
struct EcdhMechanism {
    info: CK_MECHANISM_INFO,
}

impl Mechanism for EcdhMechanism {
    fn info(&self) -> &CK_MECHANISM_INFO {
        &self.info
    }

    /// Raw ECDH, the shared secret is the x coordinate of the shared point
    fn derive(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
        template: &mut Object,
    ) -> Result<()> {
        let params = match MechParams::from_mechanism(mech)? {
            MechParams::Ecdh(p) => p,
            _ => return Err(CKR_MECHANISM_PARAM_INVALID)?,
        };
        /* only the null KDF is offered */
        if params.kdf != CKD_NULL || !params.shared_data.is_empty() {
            return Err(CKR_MECHANISM_PARAM_INVALID)?;
        }
        key.check_key_ops(CKO_PRIVATE_KEY, CKK_EC, CKA_DERIVE)?;
        let local = ec_private_from_object(key)?;

        /* peers often send the bare point, accept both forms */
        let point = decode_point(&local.curve, &params.public_data, true)
            .map_err(|e| e.remap(CKR_MECHANISM_PARAM_INVALID))?;
        let peer = ec_public_from_point(local.curve.clone(), point)?;

        let secret = backend().ecdh(&local, &peer)?;
        store_derived_secret(template, &secret)
    }
}

pub fn register(mechs: &mut Mechanisms) {
    mechs.add_mechanism(
        CKM_ECDH1_DERIVE,
        Box::new(EcdhMechanism {
            info: new_info(EC_MIN_BITS, EC_MAX_BITS, CKF_DERIVE),
        }),
    );
}
