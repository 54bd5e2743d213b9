// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Generation of plain secret keys and helpers shared by the symmetric
//! key generators

use crate::attribute::Attribute;
use crate::error::Result;
use crate::interface::*;
use crate::mechanism::*;
use crate::object::Object;

use zeroize::Zeroizing;

const GENERIC_SECRET_MIN_BITS: CK_ULONG = 80;
const GENERIC_SECRET_MAX_BITS: CK_ULONG = 2048;

pub fn random_key(len: usize) -> Result<Zeroizing<Vec<u8>>> {
    let mut key = Zeroizing::new(vec![0u8; len]);
    openssl::rand::rand_bytes(&mut key)?;
    Ok(key)
}

/// Reads the requested key length in bytes from `CKA_VALUE_LEN`
pub fn requested_len(template: &Object) -> Result<usize> {
    match template.get_attr_as_ulong(CKA_VALUE_LEN) {
        Ok(l) => Ok(usize::try_from(l)?),
        Err(e) if e.attr_not_found() => Err(CKR_TEMPLATE_INCOMPLETE)?,
        Err(e) => Err(e),
    }
}

/// Writes a freshly generated secret into `template`
pub fn store_secret_key(
    template: &mut Object,
    key_type: CK_KEY_TYPE,
    value: &[u8],
) -> Result<()> {
    template.set_attr(Attribute::from_ulong(CKA_KEY_TYPE, key_type))?;
    template.set_attr(Attribute::from_bytes(CKA_VALUE, value.to_vec()))?;
    template.set_attr(Attribute::from_ulong(
        CKA_VALUE_LEN,
        CK_ULONG::try_from(value.len())?,
    ))?;
    template.set_attr(Attribute::from_bool(CKA_LOCAL, true))?;
    Ok(())
}

#[derive(Debug)]
struct GenericSecretKeyGenMechanism {
    info: CK_MECHANISM_INFO,
}

impl Mechanism for GenericSecretKeyGenMechanism {
    fn info(&self) -> &CK_MECHANISM_INFO {
        &self.info
    }

    fn generate_key(
        &self,
        mech: &CK_MECHANISM,
        template: &mut Object,
    ) -> Result<()> {
        MechParams::from_mechanism(mech)?;
        let len = requested_len(template)?;
        /* the capability table is expressed in bits */
        check_key_size(&self.info, len * 8)?;
        let key = random_key(len)?;
        store_secret_key(template, CKK_GENERIC_SECRET, &key)
    }
}

pub fn register(mechs: &mut Mechanisms) {
    mechs.add_mechanism(
        CKM_GENERIC_SECRET_KEY_GEN,
        Box::new(GenericSecretKeyGenMechanism {
            info: new_info(
                GENERIC_SECRET_MIN_BITS,
                GENERIC_SECRET_MAX_BITS,
                CKF_GENERATE,
            ),
        }),
    );
}
