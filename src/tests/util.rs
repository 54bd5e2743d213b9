// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use super::*;

macro_rules! ret_or_panic {
    ($ret:expr) => {
        match $ret {
            Ok(r) => r,
            Err(e) => panic!("{e}"),
        }
    };
}

/// A mechanism without parameters
pub fn mech(mechanism: CK_MECHANISM_TYPE) -> CK_MECHANISM {
    CK_MECHANISM {
        mechanism: mechanism,
        pParameter: std::ptr::null_mut(),
        ulParameterLen: 0,
    }
}

/// A mechanism whose parameter is a plain byte buffer, like an IV
pub fn mech_bytes(mechanism: CK_MECHANISM_TYPE, param: &[u8]) -> CK_MECHANISM {
    CK_MECHANISM {
        mechanism: mechanism,
        pParameter: void_ptr!(param.as_ptr()),
        ulParameterLen: param.len() as CK_ULONG,
    }
}

/// A mechanism pointing to a parameter structure, which must outlive it
pub fn mech_params<T>(mechanism: CK_MECHANISM_TYPE, param: &T) -> CK_MECHANISM {
    CK_MECHANISM {
        mechanism: mechanism,
        pParameter: void_ptr!(param),
        ulParameterLen: sizeof!(T),
    }
}

pub fn key_template(class: CK_OBJECT_CLASS, key_type: CK_KEY_TYPE) -> Object {
    let mut obj = Object::new(class);
    ret_or_panic!(obj.set_attr(Attribute::from_ulong(CKA_KEY_TYPE, key_type)));
    obj
}

pub fn secret_key(key_type: CK_KEY_TYPE, value: &[u8]) -> Object {
    let mut obj = key_template(CKO_SECRET_KEY, key_type);
    ret_or_panic!(obj.set_attr(Attribute::from_bytes(CKA_VALUE, value.to_vec())));
    obj
}

pub fn generate_key(ckm: CK_MECHANISM_TYPE, template: &mut Object) {
    let m = ret_or_panic!(mechanisms().get_for(ckm, CKF_GENERATE));
    ret_or_panic!(m.generate_key(&mech(ckm), template));
}

pub fn generate_keypair(
    ckm: CK_MECHANISM_TYPE,
    pubkey: &mut Object,
    privkey: &mut Object,
) {
    let m = ret_or_panic!(mechanisms().get_for(ckm, CKF_GENERATE_KEY_PAIR));
    ret_or_panic!(m.generate_keypair(&mech(ckm), pubkey, privkey));
}

pub fn encrypt(
    mechanism: &CK_MECHANISM,
    key: &Object,
    data: &[u8],
) -> crate::error::Result<Vec<u8>> {
    let m = mechanisms().get_for(mechanism.mechanism, CKF_ENCRYPT)?;
    let mut op = m.encryption_new(mechanism, key)?;
    let mut out = vec![0u8; op.encryption_len(data.len(), true)?];
    let len = op.encrypt(data, &mut out)?;
    out.truncate(len);
    Ok(out)
}

pub fn decrypt(
    mechanism: &CK_MECHANISM,
    key: &Object,
    data: &[u8],
) -> crate::error::Result<Vec<u8>> {
    let m = mechanisms().get_for(mechanism.mechanism, CKF_DECRYPT)?;
    let mut op = m.decryption_new(mechanism, key)?;
    let mut out = vec![0u8; op.decryption_len(data.len(), true)?];
    let len = op.decrypt(data, &mut out)?;
    out.truncate(len);
    Ok(out)
}

pub fn sign(
    mechanism: &CK_MECHANISM,
    key: &Object,
    data: &[u8],
) -> crate::error::Result<Vec<u8>> {
    let m = mechanisms().get_for(mechanism.mechanism, CKF_SIGN)?;
    let mut op = m.sign_new(mechanism, key)?;
    let mut out = vec![0u8; op.signature_len()?];
    let len = op.sign(data, &mut out)?;
    out.truncate(len);
    Ok(out)
}

pub fn verify(
    mechanism: &CK_MECHANISM,
    key: &Object,
    data: &[u8],
    signature: &[u8],
) -> crate::error::Result<()> {
    let m = mechanisms().get_for(mechanism.mechanism, CKF_VERIFY)?;
    let mut op = m.verify_new(mechanism, key)?;
    op.verify(data, signature)
}

/// Returns the CK_RV of a failed operation
pub fn err_rv<T>(res: crate::error::Result<T>) -> CK_RV {
    match res {
        Ok(_) => CKR_OK,
        Err(e) => e.rv(),
    }
}
