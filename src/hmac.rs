// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use std::fmt;

use crate::error::Result;
use crate::hash::{HashAlg, HASH_ALGS};
use crate::interface::*;
use crate::mechanism::*;
use crate::misc::xor_into;
use crate::object::{required_bytes, Object};

use constant_time_eq::constant_time_eq;
use openssl::hash::Hasher;
use zeroize::Zeroize;

/* HMAC as defined in FIPS 198-1 */

fn check_and_fetch_key(key: &Object, op: CK_ATTRIBUTE_TYPE) -> Result<&[u8]> {
    key.check_key_ops(CKO_SECRET_KEY, CKK_GENERIC_SECRET, op)?;
    Ok(required_bytes(key, CKA_VALUE)?.as_slice())
}

#[derive(Debug)]
struct HMACMechanism {
    info: CK_MECHANISM_INFO,
    alg: &'static HashAlg,
}

impl HMACMechanism {
    fn operation(
        &self,
        mech: &CK_MECHANISM,
        key: &[u8],
    ) -> Result<HMACOperation> {
        let outputlen = if mech.mechanism == self.alg.hmac_general {
            match MechParams::from_mechanism(mech)?.mac_length() {
                Some(l) if l > 0 && l <= self.alg.size => l,
                _ => return Err(CKR_MECHANISM_PARAM_INVALID)?,
            }
        } else {
            MechParams::from_mechanism(mech)?;
            self.alg.size
        };
        HMACOperation::new(mech.mechanism, self.alg, key, outputlen)
    }
}

impl Mechanism for HMACMechanism {
    fn info(&self) -> &CK_MECHANISM_INFO {
        &self.info
    }

    fn mac_new(&self, mech: &CK_MECHANISM, key: &Object) -> Result<Box<dyn Mac>> {
        Ok(Box::new(
            self.operation(mech, check_and_fetch_key(key, CKA_SIGN)?)?,
        ))
    }

    fn sign_new(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
    ) -> Result<Box<dyn Sign>> {
        Ok(Box::new(
            self.operation(mech, check_and_fetch_key(key, CKA_SIGN)?)?,
        ))
    }

    fn verify_new(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
    ) -> Result<Box<dyn Verify>> {
        Ok(Box::new(
            self.operation(mech, check_and_fetch_key(key, CKA_VERIFY)?)?,
        ))
    }
}

pub struct HMACOperation {
    mech: CK_MECHANISM_TYPE,
    alg: &'static HashAlg,
    outputlen: usize,
    ipad: Vec<u8>,
    opad: Vec<u8>,
    inner: Hasher,
    finalized: bool,
    in_use: bool,
}

impl fmt::Debug for HMACOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HMACOperation")
            .field("mech", &self.mech)
            .field("outputlen", &self.outputlen)
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl Drop for HMACOperation {
    fn drop(&mut self) {
        self.ipad.zeroize();
        self.opad.zeroize();
    }
}

impl HMACOperation {
    pub fn new(
        mech: CK_MECHANISM_TYPE,
        alg: &'static HashAlg,
        key: &[u8],
        outputlen: usize,
    ) -> Result<HMACOperation> {
        /* K0 */
        let mut k0 = if key.len() <= alg.block_size {
            key.to_vec()
        } else {
            alg.digest(key)?
        };
        k0.resize(alg.block_size, 0);
        /* K0 ^ ipad */
        let mut ipad = vec![0x36u8; alg.block_size];
        xor_into(&mut ipad, &k0);
        /* K0 ^ opad */
        let mut opad = vec![0x5cu8; alg.block_size];
        xor_into(&mut opad, &k0);
        k0.zeroize();

        let mut hmac = HMACOperation {
            mech: mech,
            alg: alg,
            outputlen: outputlen,
            ipad: ipad,
            opad: opad,
            inner: alg.hasher()?,
            finalized: false,
            in_use: false,
        };
        /* H((K0 ^ ipad) || .. ) */
        hmac.inner.update(&hmac.ipad)?;
        Ok(hmac)
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

        /* H( .. || text ..) */
        if let Err(e) = self.inner.update(data) {
            self.finalized = true;
            return Err(e)?;
        }
        Ok(())
    }

    /// Computes the full length tag
    fn finalize(&mut self) -> Result<Vec<u8>> {
        if self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        /* It is valid to finalize without any update */
        self.in_use = true;
        self.finalized = true;

        /* H((K0 ^ ipad) || text) */
        let mut state = self.inner.finish()?.to_vec();
        /* H((K0 ^ opad) || H((K0 ^ ipad) || text)) */
        self.inner.update(&self.opad)?;
        self.inner.update(&state)?;
        state.zeroize();
        Ok(self.inner.finish()?.to_vec())
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

impl MechOperation for HMACOperation {
    fn mechanism(&self) -> CK_MECHANISM_TYPE {
        self.mech
    }

    fn finalized(&self) -> bool {
        self.finalized
    }
}

impl Mac for HMACOperation {
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

impl Sign for HMACOperation {
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

impl Verify for HMACOperation {
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

pub fn register(mechs: &mut Mechanisms) {
    for alg in &HASH_ALGS {
        for mech in [alg.hmac, alg.hmac_general] {
            mechs.add_mechanism(
                mech,
                Box::new(HMACMechanism {
                    info: new_info(0, 0, CKF_SIGN | CKF_VERIFY),
                    alg: alg,
                }),
            );
        }
    }
}
