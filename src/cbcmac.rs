// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! CBC based message authentication codes
//!
//! CBC-MAC is the last block of a zero IV CBC encryption, CMAC is the
//! OpenSSL implementation. Both share [BlockMacOperation] for the state
//! handling and the truncation of the tag.

use std::fmt;

use crate::blockcipher::{
    cipher_block_size, crypter_update, mode_cipher, new_crypter,
    secret_for_op, ChainMode,
};
use crate::cmac::Cmac;
use crate::error::Result;
use crate::interface::*;
use crate::mechanism::*;
use crate::object::Object;

use constant_time_eq::constant_time_eq;
use openssl::symm::Crypter;
use zeroize::{Zeroize, Zeroizing};

/// CBC encryption with a zero IV, a partial last block is zero padded
/// and an empty message is one zero block
pub struct CbcMac {
    crypter: Crypter,
    block_size: usize,
    /// Last cipher block produced
    state: Vec<u8>,
    buffer: Vec<u8>,
    empty: bool,
}

impl Drop for CbcMac {
    fn drop(&mut self) {
        self.state.zeroize();
        self.buffer.zeroize();
    }
}

impl CbcMac {
    pub fn new(key_type: CK_KEY_TYPE, key: &[u8]) -> Result<CbcMac> {
        let (cipher, key) = mode_cipher(key_type, key, ChainMode::Cbc)?;
        let block_size = cipher_block_size(cipher);
        let iv = vec![0u8; block_size];
        Ok(CbcMac {
            crypter: new_crypter(cipher, &key, Some(&iv), true, false)?,
            block_size: block_size,
            state: vec![0u8; block_size],
            buffer: Vec::with_capacity(block_size),
            empty: true,
        })
    }

    fn update(&mut self, data: &[u8]) -> Result<()> {
        let bs = self.block_size;
        let mut joined = Zeroizing::new(std::mem::take(&mut self.buffer));
        joined.extend_from_slice(data);
        let whole = joined.len() / bs * bs;
        if whole > 0 {
            let mut out = Zeroizing::new(vec![0u8; whole]);
            crypter_update(&mut self.crypter, &joined[..whole], &mut out)?;
            self.state.copy_from_slice(&out[(whole - bs)..]);
            self.empty = false;
        }
        self.buffer.extend_from_slice(&joined[whole..]);
        Ok(())
    }

    fn tag(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if self.empty || !self.buffer.is_empty() {
            let mut last = Zeroizing::new(std::mem::take(&mut self.buffer));
            last.resize(self.block_size, 0);
            self.update(&last)?;
        }
        Ok(Zeroizing::new(self.state.clone()))
    }
}

/// The full block MAC computation behind an operation
pub enum MacEngine {
    CbcMac(CbcMac),
    Cmac(Cmac),
}

impl MacEngine {
    fn block_size(&self) -> usize {
        match self {
            MacEngine::CbcMac(m) => m.block_size,
            MacEngine::Cmac(m) => m.block_size(),
        }
    }

    fn update(&mut self, data: &[u8]) -> Result<()> {
        match self {
            MacEngine::CbcMac(m) => m.update(data),
            MacEngine::Cmac(m) => m.update(data),
        }
    }

    fn tag(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        match self {
            MacEngine::CbcMac(m) => m.tag(),
            MacEngine::Cmac(m) => m.tag(),
        }
    }
}

pub struct BlockMacOperation {
    mech: CK_MECHANISM_TYPE,
    engine: MacEngine,
    outputlen: usize,
    finalized: bool,
    in_use: bool,
}

impl fmt::Debug for BlockMacOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockMacOperation")
            .field("mech", &self.mech)
            .field("outputlen", &self.outputlen)
            .field("finalized", &self.finalized)
            .field("in_use", &self.in_use)
            .finish()
    }
}

impl BlockMacOperation {
    pub fn new(
        mech: CK_MECHANISM_TYPE,
        engine: MacEngine,
        outputlen: usize,
    ) -> Result<BlockMacOperation> {
        if outputlen == 0 || outputlen > engine.block_size() {
            return Err(CKR_MECHANISM_PARAM_INVALID)?;
        }
        Ok(BlockMacOperation {
            mech: mech,
            engine: engine,
            outputlen: outputlen,
            finalized: false,
            in_use: false,
        })
    }

    fn begin(&mut self) -> Result<()> {
        if self.in_use || self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        Ok(())
    }

    fn update(&mut self, data: &[u8]) -> Result<()> {
        if self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        self.in_use = true;
        if let Err(e) = self.engine.update(data) {
            self.finalized = true;
            return Err(e);
        }
        Ok(())
    }

    /// Computes the full block tag
    fn finalize(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        self.in_use = true;
        self.finalized = true;
        self.engine.tag()
    }

    fn finalize_into(&mut self, output: &mut [u8]) -> Result<usize> {
        if self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        check_output(output, self.outputlen)?;
        let tag = self.finalize()?;
        output[..self.outputlen].copy_from_slice(&tag[..self.outputlen]);
        Ok(self.outputlen)
    }

    fn finalize_verify(&mut self, signature: &[u8]) -> Result<()> {
        if self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        if signature.len() != self.outputlen {
            self.finalized = true;
            return Err(CKR_SIGNATURE_LEN_RANGE)?;
        }
        let tag = self.finalize()?;
        if !constant_time_eq(&tag[..self.outputlen], signature) {
            return Err(CKR_SIGNATURE_INVALID)?;
        }
        Ok(())
    }
}

impl MechOperation for BlockMacOperation {
    fn mechanism(&self) -> CK_MECHANISM_TYPE {
        self.mech
    }

    fn finalized(&self) -> bool {
        self.finalized
    }
}

impl Mac for BlockMacOperation {
    fn mac(&mut self, data: &[u8], mac: &mut [u8]) -> Result<usize> {
        self.begin()?;
        check_output(mac, self.outputlen)?;
        self.update(data)?;
        self.finalize_into(mac)
    }

    fn mac_update(&mut self, data: &[u8]) -> Result<()> {
        self.update(data)
    }

    fn mac_final(&mut self, mac: &mut [u8]) -> Result<usize> {
        self.finalize_into(mac)
    }

    fn mac_len(&self) -> Result<usize> {
        Ok(self.outputlen)
    }
}

impl Sign for BlockMacOperation {
    fn sign(&mut self, data: &[u8], signature: &mut [u8]) -> Result<usize> {
        self.begin()?;
        check_output(signature, self.outputlen)?;
        self.update(data)?;
        self.finalize_into(signature)
    }

    fn sign_update(&mut self, data: &[u8]) -> Result<()> {
        self.update(data)
    }

    fn sign_final(&mut self, signature: &mut [u8]) -> Result<usize> {
        self.finalize_into(signature)
    }

    fn signature_len(&self) -> Result<usize> {
        Ok(self.outputlen)
    }
}

impl Verify for BlockMacOperation {
    fn verify(&mut self, data: &[u8], signature: &[u8]) -> Result<()> {
        self.begin()?;
        self.update(data)?;
        self.finalize_verify(signature)
    }

    fn verify_update(&mut self, data: &[u8]) -> Result<()> {
        self.update(data)
    }

    fn verify_final(&mut self, signature: &[u8]) -> Result<()> {
        self.finalize_verify(signature)
    }

    fn signature_len(&self) -> Result<usize> {
        Ok(self.outputlen)
    }
}

/// A CBC-MAC or CMAC mechanism over one cipher family
#[derive(Debug)]
pub struct BlockMacMechanism {
    pub info: CK_MECHANISM_INFO,
    pub key_types: &'static [CK_KEY_TYPE],
    pub cmac: bool,
    pub general: bool,
}

impl BlockMacMechanism {
    fn operation(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
        op: CK_ATTRIBUTE_TYPE,
    ) -> Result<BlockMacOperation> {
        let params = MechParams::from_mechanism(mech)?;
        let (key_type, value) = secret_for_op(key, self.key_types, op)?;
        let engine = if self.cmac {
            MacEngine::Cmac(Cmac::new(key_type, value.as_slice())?)
        } else {
            MacEngine::CbcMac(CbcMac::new(key_type, value.as_slice())?)
        };
        let bs = engine.block_size();
        let outputlen = if self.general {
            match params.mac_length() {
                Some(l) => l,
                None => return Err(CKR_MECHANISM_PARAM_INVALID)?,
            }
        } else if self.cmac {
            bs
        } else {
            bs / 2
        };
        BlockMacOperation::new(mech.mechanism, engine, outputlen)
    }
}

impl Mechanism for BlockMacMechanism {
    fn info(&self) -> &CK_MECHANISM_INFO {
        &self.info
    }

    fn mac_new(&self, mech: &CK_MECHANISM, key: &Object) -> Result<Box<dyn Mac>> {
        Ok(Box::new(self.operation(mech, key, CKA_SIGN)?))
    }

    fn sign_new(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
    ) -> Result<Box<dyn Sign>> {
        Ok(Box::new(self.operation(mech, key, CKA_SIGN)?))
    }

    fn verify_new(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
    ) -> Result<Box<dyn Verify>> {
        Ok(Box::new(self.operation(mech, key, CKA_VERIFY)?))
    }
}

pub static DES3_MAC_KEYS: [CK_KEY_TYPE; 2] = [CKK_DES2, CKK_DES3];
pub static AES_MAC_KEYS: [CK_KEY_TYPE; 1] = [CKK_AES];

/// Plain and general mechanism, key size range and accepted key types
pub type MacFamily = (
    CK_MECHANISM_TYPE,
    CK_MECHANISM_TYPE,
    CK_ULONG,
    CK_ULONG,
    &'static [CK_KEY_TYPE],
);

pub fn register_families(
    mechs: &mut Mechanisms,
    families: &[MacFamily],
    cmac: bool,
) {
    for &(plain, general, min, max, key_types) in families {
        for (ckm, is_general) in [(plain, false), (general, true)] {
            mechs.add_mechanism(
                ckm,
                Box::new(BlockMacMechanism {
                    info: new_info(min, max, CKF_SIGN | CKF_VERIFY),
                    key_types: key_types,
                    cmac: cmac,
                    general: is_general,
                }),
            );
        }
    }
}

pub fn register(mechs: &mut Mechanisms) {
    register_families(
        mechs,
        &[
            (CKM_DES3_MAC, CKM_DES3_MAC_GENERAL, 16, 24, &DES3_MAC_KEYS),
            (CKM_AES_MAC, CKM_AES_MAC_GENERAL, 16, 32, &AES_MAC_KEYS),
        ],
        false,
    );
}
