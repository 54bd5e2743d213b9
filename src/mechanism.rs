// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Mechanism registry, operation traits and mechanism parameter parsing.

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::error::Result;
use crate::interface::*;
use crate::object::Object;
use crate::{bytes_to_vec, cast_params};

/// Decoded OAEP parameters
#[derive(Debug, Clone, PartialEq)]
pub struct OaepParams {
    pub hash: CK_MECHANISM_TYPE,
    pub mgf: CK_RSA_PKCS_MGF_TYPE,
    pub source: Option<Vec<u8>>,
}

/// Decoded PSS parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PssParams {
    pub hash: CK_MECHANISM_TYPE,
    pub mgf: CK_RSA_PKCS_MGF_TYPE,
    pub salt_len: usize,
}

/// Decoded ECDH1 derivation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct EcdhParams {
    pub kdf: CK_EC_KDF_TYPE,
    pub shared_data: Vec<u8>,
    pub public_data: Vec<u8>,
}

/// The parameter block attached to a mechanism, decoded from the raw
/// `CK_MECHANISM` into an owned Rust value
#[derive(Debug, Clone, PartialEq)]
pub enum MechParams {
    None,
    Iv(Vec<u8>),
    Oaep(OaepParams),
    Pss(PssParams),
    /// Requested output length of the "general" MAC variants
    MacLength(usize),
    Ecdh(EcdhParams),
    /// Raw peer public value, as used by PKCS#3 DH derivation
    PeerValue(Vec<u8>),
}

impl MechParams {
    /// Decodes the parameters of `mech` according to its type
    pub fn from_mechanism(mech: &CK_MECHANISM) -> Result<MechParams> {
        match mech.mechanism {
            CKM_DES_CBC | CKM_DES_CBC_PAD | CKM_DES3_CBC
            | CKM_DES3_CBC_PAD | CKM_DES_CFB8 | CKM_DES_CFB64
            | CKM_DES_OFB64 | CKM_AES_CBC | CKM_AES_CBC_PAD => {
                Ok(MechParams::Iv(bytes_to_vec!(
                    mech.pParameter,
                    mech.ulParameterLen
                )))
            }
            CKM_RSA_PKCS_OAEP => {
                let params = cast_params!(mech, CK_RSA_PKCS_OAEP_PARAMS);
                let source = match params.source {
                    0 => {
                        if params.ulSourceDataLen != 0 {
                            return Err(CKR_MECHANISM_PARAM_INVALID)?;
                        }
                        None
                    }
                    CKZ_DATA_SPECIFIED => match params.ulSourceDataLen {
                        0 => None,
                        _ => Some(bytes_to_vec!(
                            params.pSourceData,
                            params.ulSourceDataLen
                        )),
                    },
                    _ => return Err(CKR_MECHANISM_PARAM_INVALID)?,
                };
                Ok(MechParams::Oaep(OaepParams {
                    hash: params.hashAlg,
                    mgf: params.mgf,
                    source: source,
                }))
            }
            CKM_RSA_PKCS_PSS
            | CKM_SHA1_RSA_PKCS_PSS
            | CKM_SHA224_RSA_PKCS_PSS
            | CKM_SHA256_RSA_PKCS_PSS
            | CKM_SHA384_RSA_PKCS_PSS
            | CKM_SHA512_RSA_PKCS_PSS => {
                let params = cast_params!(mech, CK_RSA_PKCS_PSS_PARAMS);
                Ok(MechParams::Pss(PssParams {
                    hash: params.hashAlg,
                    mgf: params.mgf,
                    salt_len: usize::try_from(params.sLen)?,
                }))
            }
            CKM_SHA_1_HMAC_GENERAL
            | CKM_SHA224_HMAC_GENERAL
            | CKM_SHA256_HMAC_GENERAL
            | CKM_SHA384_HMAC_GENERAL
            | CKM_SHA512_HMAC_GENERAL
            | CKM_SHA512_224_HMAC_GENERAL
            | CKM_SHA512_256_HMAC_GENERAL
            | CKM_SHA3_224_HMAC_GENERAL
            | CKM_SHA3_256_HMAC_GENERAL
            | CKM_SHA3_384_HMAC_GENERAL
            | CKM_SHA3_512_HMAC_GENERAL
            | CKM_DES3_MAC_GENERAL
            | CKM_AES_MAC_GENERAL
            | CKM_DES3_CMAC_GENERAL
            | CKM_AES_CMAC_GENERAL => {
                let len = cast_params!(mech, CK_MAC_GENERAL_PARAMS);
                Ok(MechParams::MacLength(usize::try_from(len)?))
            }
            CKM_ECDH1_DERIVE => {
                let params = cast_params!(mech, CK_ECDH1_DERIVE_PARAMS);
                Ok(MechParams::Ecdh(EcdhParams {
                    kdf: params.kdf,
                    shared_data: bytes_to_vec!(
                        params.pSharedData,
                        params.ulSharedDataLen
                    ),
                    public_data: bytes_to_vec!(
                        params.pPublicData,
                        params.ulPublicDataLen
                    ),
                }))
            }
            CKM_DH_PKCS_DERIVE => Ok(MechParams::PeerValue(bytes_to_vec!(
                mech.pParameter,
                mech.ulParameterLen
            ))),
            _ => {
                if mech.ulParameterLen != 0 {
                    return Err(CKR_MECHANISM_PARAM_INVALID)?;
                }
                Ok(MechParams::None)
            }
        }
    }

    pub fn iv(&self) -> Result<&[u8]> {
        match self {
            MechParams::Iv(iv) => Ok(iv.as_slice()),
            _ => Err(CKR_MECHANISM_PARAM_INVALID)?,
        }
    }

    pub fn mac_length(&self) -> Option<usize> {
        match self {
            MechParams::MacLength(l) => Some(*l),
            _ => None,
        }
    }
}

/// A registered mechanism: its capability entry plus the factories that
/// turn a key object into an operation
pub trait Mechanism: Debug + Send + Sync {
    fn info(&self) -> &CK_MECHANISM_INFO;

    fn encryption_new(
        &self,
        _: &CK_MECHANISM,
        _: &Object,
    ) -> Result<Box<dyn Encryption>> {
        Err(CKR_MECHANISM_INVALID)?
    }
    fn decryption_new(
        &self,
        _: &CK_MECHANISM,
        _: &Object,
    ) -> Result<Box<dyn Decryption>> {
        Err(CKR_MECHANISM_INVALID)?
    }
    fn sign_new(&self, _: &CK_MECHANISM, _: &Object) -> Result<Box<dyn Sign>> {
        Err(CKR_MECHANISM_INVALID)?
    }
    fn verify_new(
        &self,
        _: &CK_MECHANISM,
        _: &Object,
    ) -> Result<Box<dyn Verify>> {
        Err(CKR_MECHANISM_INVALID)?
    }
    fn verify_recover_new(
        &self,
        _: &CK_MECHANISM,
        _: &Object,
    ) -> Result<Box<dyn VerifyRecover>> {
        Err(CKR_MECHANISM_INVALID)?
    }
    fn mac_new(&self, _: &CK_MECHANISM, _: &Object) -> Result<Box<dyn Mac>> {
        Err(CKR_MECHANISM_INVALID)?
    }
    fn digest_new(&self, _: &CK_MECHANISM) -> Result<Box<dyn Digest>> {
        Err(CKR_MECHANISM_INVALID)?
    }
    /// Generates a secret key, writing the key material into `template`
    fn generate_key(&self, _: &CK_MECHANISM, _: &mut Object) -> Result<()> {
        Err(CKR_MECHANISM_INVALID)?
    }
    /// Generates a key pair, writing the public and private components
    /// into the respective templates
    fn generate_keypair(
        &self,
        _: &CK_MECHANISM,
        _: &mut Object,
        _: &mut Object,
    ) -> Result<()> {
        Err(CKR_MECHANISM_INVALID)?
    }
    /// Derives a secret from `key`, writing `CKA_VALUE` into `template`
    fn derive(
        &self,
        _: &CK_MECHANISM,
        _: &Object,
        _: &mut Object,
    ) -> Result<()> {
        Err(CKR_MECHANISM_INVALID)?
    }
}

/// Static capability entry for a mechanism that has no extra state
pub fn new_info(min: CK_ULONG, max: CK_ULONG, flags: CK_FLAGS) -> CK_MECHANISM_INFO {
    CK_MECHANISM_INFO {
        ulMinKeySize: min,
        ulMaxKeySize: max,
        flags: flags,
    }
}

/// Checks a key size (in the unit the mechanism table uses) against the
/// capability entry
pub fn check_key_size(info: &CK_MECHANISM_INFO, size: usize) -> Result<()> {
    let size = CK_ULONG::try_from(size)?;
    if size < info.ulMinKeySize
        || (info.ulMaxKeySize != 0 && size > info.ulMaxKeySize)
    {
        return Err(CKR_KEY_SIZE_RANGE)?;
    }
    Ok(())
}

#[derive(Debug)]
pub struct Mechanisms {
    tree: BTreeMap<CK_MECHANISM_TYPE, Box<dyn Mechanism>>,
}

impl Mechanisms {
    pub fn new() -> Mechanisms {
        Mechanisms {
            tree: BTreeMap::new(),
        }
    }

    pub fn add_mechanism(
        &mut self,
        typ: CK_MECHANISM_TYPE,
        info: Box<dyn Mechanism>,
    ) {
        self.tree.insert(typ, info);
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn list(&self) -> Vec<CK_MECHANISM_TYPE> {
        self.tree.keys().cloned().collect()
    }

    pub fn info(&self, typ: CK_MECHANISM_TYPE) -> Option<&CK_MECHANISM_INFO> {
        self.tree.get(&typ).map(|m| m.info())
    }

    pub fn get(&self, typ: CK_MECHANISM_TYPE) -> Result<&dyn Mechanism> {
        match self.tree.get(&typ) {
            Some(m) => Ok(m.as_ref()),
            None => Err(CKR_MECHANISM_INVALID)?,
        }
    }

    /// Looks up the mechanism and checks it allows the operation `flag`
    pub fn get_for(
        &self,
        typ: CK_MECHANISM_TYPE,
        flag: CK_FLAGS,
    ) -> Result<&dyn Mechanism> {
        let m = self.get(typ)?;
        if m.info().flags & flag != flag {
            return Err(CKR_MECHANISM_INVALID)?;
        }
        Ok(m)
    }
}

/// State common to every multi-part operation
pub trait MechOperation: Debug + Send + Sync {
    fn mechanism(&self) -> CK_MECHANISM_TYPE;
    fn finalized(&self) -> bool;
    /// Exports the running state so the session can be suspended
    ///
    /// Operations backed by a live library context can not be
    /// serialized.
    fn get_operation_state(&self) -> Result<Vec<u8>> {
        Err(CKR_STATE_UNSAVEABLE)?
    }
    fn set_operation_state(&mut self, _: &[u8]) -> Result<()> {
        Err(CKR_SAVED_STATE_INVALID)?
    }
}

pub trait Encryption: MechOperation {
    fn encrypt(&mut self, plain: &[u8], cipher: &mut [u8]) -> Result<usize>;
    fn encrypt_update(
        &mut self,
        plain: &[u8],
        cipher: &mut [u8],
    ) -> Result<usize>;
    fn encrypt_final(&mut self, cipher: &mut [u8]) -> Result<usize>;
    /// Output size for `data_len` more bytes, `fin` requests the size for
    /// a final (or one-shot) call
    fn encryption_len(&self, data_len: usize, fin: bool) -> Result<usize>;
}

pub trait Decryption: MechOperation {
    fn decrypt(&mut self, cipher: &[u8], plain: &mut [u8]) -> Result<usize>;
    fn decrypt_update(
        &mut self,
        cipher: &[u8],
        plain: &mut [u8],
    ) -> Result<usize>;
    fn decrypt_final(&mut self, plain: &mut [u8]) -> Result<usize>;
    fn decryption_len(&self, data_len: usize, fin: bool) -> Result<usize>;
}

pub trait Sign: MechOperation {
    fn sign(&mut self, data: &[u8], signature: &mut [u8]) -> Result<usize>;
    fn sign_update(&mut self, _data: &[u8]) -> Result<()> {
        Err(CKR_OPERATION_NOT_INITIALIZED)?
    }
    fn sign_final(&mut self, _signature: &mut [u8]) -> Result<usize> {
        Err(CKR_OPERATION_NOT_INITIALIZED)?
    }
    fn signature_len(&self) -> Result<usize>;
}

pub trait Verify: MechOperation {
    fn verify(&mut self, data: &[u8], signature: &[u8]) -> Result<()>;
    fn verify_update(&mut self, _data: &[u8]) -> Result<()> {
        Err(CKR_OPERATION_NOT_INITIALIZED)?
    }
    fn verify_final(&mut self, _signature: &[u8]) -> Result<()> {
        Err(CKR_OPERATION_NOT_INITIALIZED)?
    }
    fn signature_len(&self) -> Result<usize>;
}

pub trait VerifyRecover: MechOperation {
    /// Recovers the signed data, returns the number of bytes written
    fn verify_recover(
        &mut self,
        signature: &[u8],
        data: &mut [u8],
    ) -> Result<usize>;
    /// Upper bound of the recovered data length
    fn recover_len(&self) -> Result<usize>;
}

pub trait Digest: MechOperation {
    fn digest(&mut self, data: &[u8], digest: &mut [u8]) -> Result<usize>;
    fn digest_update(&mut self, data: &[u8]) -> Result<()>;
    fn digest_final(&mut self, digest: &mut [u8]) -> Result<usize>;
    fn digest_len(&self) -> Result<usize>;
}

pub trait Mac: MechOperation {
    fn mac(&mut self, data: &[u8], mac: &mut [u8]) -> Result<usize>;
    fn mac_update(&mut self, data: &[u8]) -> Result<()>;
    fn mac_final(&mut self, mac: &mut [u8]) -> Result<usize>;
    fn mac_len(&self) -> Result<usize>;
}

/// Fails with `CKR_BUFFER_TOO_SMALL` when `buf` can't hold `needed` bytes
pub fn check_output(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(CKR_BUFFER_TOO_SMALL)?;
    }
    Ok(())
}
