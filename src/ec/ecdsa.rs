// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use std::fmt;

use crate::curve::{signature_from_fixed, signature_to_fixed, Curve};
use crate::ec::{EC_MAX_BITS, EC_MIN_BITS};
use crate::error::Result;
use crate::hash::{hash_alg, HashAlg};
use crate::interface::*;
use crate::keymat::{
    ec_private_from_object, ec_public_from_object, EcPrivate, EcPublic,
};
use crate::mechanism::*;
use crate::object::Object;
use crate::ossl::backend;

use openssl::hash::Hasher;

#[derive(Debug)]
struct EcdsaMechanism {
    info: CK_MECHANISM_INFO,
    prehash: Option<&'static HashAlg>,
}

impl EcdsaMechanism {
    fn operation(
        &self,
        mech: &CK_MECHANISM,
        key: EcdsaKey,
    ) -> Result<EcdsaOperation> {
        MechParams::from_mechanism(mech)?;
        let hasher = match self.prehash {
            Some(alg) => Some(alg.hasher()?),
            None => None,
        };
        Ok(EcdsaOperation {
            mech: mech.mechanism,
            curve: key.curve().clone(),
            key: key,
            hasher: hasher,
            finalized: false,
            in_use: false,
        })
    }
}

impl Mechanism for EcdsaMechanism {
    fn info(&self) -> &CK_MECHANISM_INFO {
        &self.info
    }

    fn sign_new(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
    ) -> Result<Box<dyn Sign>> {
        key.check_key_ops(CKO_PRIVATE_KEY, CKK_EC, CKA_SIGN)?;
        let key = EcdsaKey::Private(ec_private_from_object(key)?);
        Ok(Box::new(self.operation(mech, key)?))
    }

    fn verify_new(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
    ) -> Result<Box<dyn Verify>> {
        key.check_key_ops(CKO_PUBLIC_KEY, CKK_EC, CKA_VERIFY)?;
        let key = EcdsaKey::Public(ec_public_from_object(key, false)?);
        Ok(Box::new(self.operation(mech, key)?))
    }
}

#[derive(Debug)]
enum EcdsaKey {
    Public(EcPublic),
    Private(EcPrivate),
}

impl EcdsaKey {
    fn curve(&self) -> &Curve {
        match self {
            EcdsaKey::Public(k) => &k.curve,
            EcdsaKey::Private(k) => &k.curve,
        }
    }
}

/// ECDSA signature operation, signatures are the fixed width `r || s`
/// form used by PKCS#11
struct EcdsaOperation {
    mech: CK_MECHANISM_TYPE,
    curve: Curve,
    key: EcdsaKey,
    hasher: Option<Hasher>,
    finalized: bool,
    in_use: bool,
}

impl fmt::Debug for EcdsaOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaOperation")
            .field("mech", &self.mech)
            .field("curve", &self.curve)
            .field("finalized", &self.finalized)
            .field("in_use", &self.in_use)
            .finish()
    }
}

impl EcdsaOperation {
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
        let hasher = match &mut self.hasher {
            Some(h) => h,
            None => {
                self.finalized = true;
                return Err(CKR_OPERATION_NOT_INITIALIZED)?;
            }
        };
        self.in_use = true;
        if let Err(e) = hasher.update(data) {
            self.finalized = true;
            return Err(e)?;
        }
        Ok(())
    }

    fn digest(&mut self) -> Result<Vec<u8>> {
        match &mut self.hasher {
            Some(h) => Ok(h.finish()?.to_vec()),
            None => Err(CKR_OPERATION_NOT_INITIALIZED)?,
        }
    }

    fn sign_digest(&self, digest: &[u8], signature: &mut [u8]) -> Result<usize> {
        let key = match &self.key {
            EcdsaKey::Private(k) => k,
            EcdsaKey::Public(_) => return Err(CKR_KEY_TYPE_INCONSISTENT)?,
        };
        let (r, s) = backend().ecdsa_sign(key, digest)?;
        let sig = signature_to_fixed(&r, &s, self.curve.order_len())?;
        signature[..sig.len()].copy_from_slice(&sig);
        Ok(sig.len())
    }

    fn verify_digest(&self, digest: &[u8], signature: &[u8]) -> Result<()> {
        let key = match &self.key {
            EcdsaKey::Public(k) => k,
            EcdsaKey::Private(_) => return Err(CKR_KEY_TYPE_INCONSISTENT)?,
        };
        let (r, s) = signature_from_fixed(signature, self.curve.order_len())?;
        match backend().ecdsa_verify(key, digest, r, s) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CKR_SIGNATURE_INVALID)?,
            Err(e) => Err(e.remap(CKR_SIGNATURE_INVALID)),
        }
    }
}

impl MechOperation for EcdsaOperation {
    fn mechanism(&self) -> CK_MECHANISM_TYPE {
        self.mech
    }

    fn finalized(&self) -> bool {
        self.finalized
    }
}

impl Sign for EcdsaOperation {
    fn sign(&mut self, data: &[u8], signature: &mut [u8]) -> Result<usize> {
        self.begin()?;
        check_output(signature, self.curve.signature_len())?;
        if self.hasher.is_some() {
            self.update(data)?;
            return self.sign_final(signature);
        }
        self.finalized = true;
        self.sign_digest(data, signature)
    }

    fn sign_update(&mut self, data: &[u8]) -> Result<()> {
        self.update(data)
    }

    fn sign_final(&mut self, signature: &mut [u8]) -> Result<usize> {
        if self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        check_output(signature, self.curve.signature_len())?;
        self.finalized = true;
        let digest = self.digest()?;
        self.sign_digest(&digest, signature)
    }

    fn signature_len(&self) -> Result<usize> {
        Ok(self.curve.signature_len())
    }
}

impl Verify for EcdsaOperation {
    fn verify(&mut self, data: &[u8], signature: &[u8]) -> Result<()> {
        self.begin()?;
        if self.hasher.is_some() {
            self.update(data)?;
            return self.verify_final(signature);
        }
        self.finalized = true;
        self.verify_digest(data, signature)
    }

    fn verify_update(&mut self, data: &[u8]) -> Result<()> {
        self.update(data)
    }

    fn verify_final(&mut self, signature: &[u8]) -> Result<()> {
        if self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        self.finalized = true;
        let digest = self.digest()?;
        self.verify_digest(&digest, signature)
    }

    fn signature_len(&self) -> Result<usize> {
        Ok(self.curve.signature_len())
    }
}

pub fn register(mechs: &mut Mechanisms) {
    mechs.add_mechanism(
        CKM_ECDSA,
        Box::new(EcdsaMechanism {
            info: new_info(EC_MIN_BITS, EC_MAX_BITS, CKF_SIGN | CKF_VERIFY),
            prehash: None,
        }),
    );
    for (ckm, hash) in [
        (CKM_ECDSA_SHA1, CKM_SHA_1),
        (CKM_ECDSA_SHA224, CKM_SHA224),
        (CKM_ECDSA_SHA256, CKM_SHA256),
        (CKM_ECDSA_SHA384, CKM_SHA384),
        (CKM_ECDSA_SHA512, CKM_SHA512),
    ] {
        let Ok(alg) = hash_alg(hash) else {
            continue;
        };
        mechs.add_mechanism(
            ckm,
            Box::new(EcdsaMechanism {
                info: new_info(
                    EC_MIN_BITS,
                    EC_MAX_BITS,
                    CKF_SIGN | CKF_VERIFY,
                ),
                prehash: Some(alg),
            }),
        );
    }
}
