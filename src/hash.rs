// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use std::fmt;

use crate::error::Result;
use crate::interface::*;
use crate::kasn1::oid;
use crate::mechanism::*;

use openssl::hash::{Hasher, MessageDigest};
use openssl::nid::Nid;

/// Static description of a supported hash function
#[derive(Debug)]
pub struct HashAlg {
    pub mech: CK_MECHANISM_TYPE,
    pub hmac: CK_MECHANISM_TYPE,
    pub hmac_general: CK_MECHANISM_TYPE,
    pub size: usize,
    pub block_size: usize,
    pub oid: asn1::ObjectIdentifier,
    nid: Nid,
}

impl HashAlg {
    pub fn md(&self) -> Result<MessageDigest> {
        match MessageDigest::from_nid(self.nid) {
            Some(md) => Ok(md),
            None => Err(CKR_MECHANISM_INVALID)?,
        }
    }

    pub fn hasher(&self) -> Result<Hasher> {
        Ok(Hasher::new(self.md()?)?)
    }

    /// One shot digest of `data`
    pub fn digest(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(openssl::hash::hash(self.md()?, data)?.to_vec())
    }
}

pub static HASH_ALGS: [HashAlg; 11] = [
    HashAlg {
        mech: CKM_SHA_1,
        hmac: CKM_SHA_1_HMAC,
        hmac_general: CKM_SHA_1_HMAC_GENERAL,
        size: 20,
        block_size: 64,
        oid: oid::SHA1_OID,
        nid: Nid::SHA1,
    },
    HashAlg {
        mech: CKM_SHA224,
        hmac: CKM_SHA224_HMAC,
        hmac_general: CKM_SHA224_HMAC_GENERAL,
        size: 28,
        block_size: 64,
        oid: oid::SHA224_OID,
        nid: Nid::SHA224,
    },
    HashAlg {
        mech: CKM_SHA256,
        hmac: CKM_SHA256_HMAC,
        hmac_general: CKM_SHA256_HMAC_GENERAL,
        size: 32,
        block_size: 64,
        oid: oid::SHA256_OID,
        nid: Nid::SHA256,
    },
    HashAlg {
        mech: CKM_SHA384,
        hmac: CKM_SHA384_HMAC,
        hmac_general: CKM_SHA384_HMAC_GENERAL,
        size: 48,
        block_size: 128,
        oid: oid::SHA384_OID,
        nid: Nid::SHA384,
    },
    HashAlg {
        mech: CKM_SHA512,
        hmac: CKM_SHA512_HMAC,
        hmac_general: CKM_SHA512_HMAC_GENERAL,
        size: 64,
        block_size: 128,
        oid: oid::SHA512_OID,
        nid: Nid::SHA512,
    },
    HashAlg {
        mech: CKM_SHA512_224,
        hmac: CKM_SHA512_224_HMAC,
        hmac_general: CKM_SHA512_224_HMAC_GENERAL,
        size: 28,
        block_size: 128,
        oid: oid::SHA512_224_OID,
        nid: Nid::from_raw(1094), // NID_sha512_224
    },
    HashAlg {
        mech: CKM_SHA512_256,
        hmac: CKM_SHA512_256_HMAC,
        hmac_general: CKM_SHA512_256_HMAC_GENERAL,
        size: 32,
        block_size: 128,
        oid: oid::SHA512_256_OID,
        nid: Nid::from_raw(1095), // NID_sha512_256
    },
    HashAlg {
        mech: CKM_SHA3_224,
        hmac: CKM_SHA3_224_HMAC,
        hmac_general: CKM_SHA3_224_HMAC_GENERAL,
        size: 28,
        block_size: 144,
        oid: oid::SHA3_224_OID,
        nid: Nid::SHA3_224,
    },
    HashAlg {
        mech: CKM_SHA3_256,
        hmac: CKM_SHA3_256_HMAC,
        hmac_general: CKM_SHA3_256_HMAC_GENERAL,
        size: 32,
        block_size: 136,
        oid: oid::SHA3_256_OID,
        nid: Nid::SHA3_256,
    },
    HashAlg {
        mech: CKM_SHA3_384,
        hmac: CKM_SHA3_384_HMAC,
        hmac_general: CKM_SHA3_384_HMAC_GENERAL,
        size: 48,
        block_size: 104,
        oid: oid::SHA3_384_OID,
        nid: Nid::SHA3_384,
    },
    HashAlg {
        mech: CKM_SHA3_512,
        hmac: CKM_SHA3_512_HMAC,
        hmac_general: CKM_SHA3_512_HMAC_GENERAL,
        size: 64,
        block_size: 72,
        oid: oid::SHA3_512_OID,
        nid: Nid::SHA3_512,
    },
];

/// Looks up a hash by its digest mechanism
pub fn hash_alg(mech: CK_MECHANISM_TYPE) -> Result<&'static HashAlg> {
    match HASH_ALGS.iter().find(|h| h.mech == mech) {
        Some(h) => Ok(h),
        None => Err(CKR_MECHANISM_INVALID)?,
    }
}

/// Maps an MGF1 generator identifier to the hash it is built on
pub fn mgf1_hash(mgf: CK_RSA_PKCS_MGF_TYPE) -> Result<&'static HashAlg> {
    let mech = match mgf {
        CKG_MGF1_SHA1 => CKM_SHA_1,
        CKG_MGF1_SHA224 => CKM_SHA224,
        CKG_MGF1_SHA256 => CKM_SHA256,
        CKG_MGF1_SHA384 => CKM_SHA384,
        CKG_MGF1_SHA512 => CKM_SHA512,
        CKG_MGF1_SHA3_224 => CKM_SHA3_224,
        CKG_MGF1_SHA3_256 => CKM_SHA3_256,
        CKG_MGF1_SHA3_384 => CKM_SHA3_384,
        CKG_MGF1_SHA3_512 => CKM_SHA3_512,
        _ => return Err(CKR_MECHANISM_PARAM_INVALID)?,
    };
    hash_alg(mech)
}

#[derive(Debug)]
struct HashMechanism {
    info: CK_MECHANISM_INFO,
}

impl Mechanism for HashMechanism {
    fn info(&self) -> &CK_MECHANISM_INFO {
        &self.info
    }

    fn digest_new(&self, mech: &CK_MECHANISM) -> Result<Box<dyn Digest>> {
        MechParams::from_mechanism(mech)?;
        Ok(Box::new(HashOperation::new(mech.mechanism)?))
    }
}

/// Streaming digest holding a live library context
///
/// The context can not be exported, so the owning session must keep the
/// operation alive between calls.
pub struct HashOperation {
    alg: &'static HashAlg,
    hasher: Hasher,
    finalized: bool,
    in_use: bool,
}

impl fmt::Debug for HashOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashOperation")
            .field("alg", &self.alg.mech)
            .field("finalized", &self.finalized)
            .field("in_use", &self.in_use)
            .finish()
    }
}

impl HashOperation {
    pub fn new(mech: CK_MECHANISM_TYPE) -> Result<HashOperation> {
        let alg = hash_alg(mech)?;
        Ok(HashOperation {
            alg: alg,
            hasher: alg.hasher()?,
            finalized: false,
            in_use: false,
        })
    }
}

impl MechOperation for HashOperation {
    fn mechanism(&self) -> CK_MECHANISM_TYPE {
        self.alg.mech
    }

    fn finalized(&self) -> bool {
        self.finalized
    }
}

impl Digest for HashOperation {
    fn digest(&mut self, data: &[u8], digest: &mut [u8]) -> Result<usize> {
        if self.in_use || self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        check_output(digest, self.alg.size)?;
        self.finalized = true;
        let out = self.alg.digest(data)?;
        digest[..out.len()].copy_from_slice(&out);
        Ok(out.len())
    }

    fn digest_update(&mut self, data: &[u8]) -> Result<()> {
        if self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        self.in_use = true;
        if let Err(e) = self.hasher.update(data) {
            self.finalized = true;
            return Err(e)?;
        }
        Ok(())
    }

    fn digest_final(&mut self, digest: &mut [u8]) -> Result<usize> {
        if self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        check_output(digest, self.alg.size)?;
        self.in_use = true;
        self.finalized = true;
        let out = self.hasher.finish()?;
        digest[..out.len()].copy_from_slice(&out);
        Ok(out.len())
    }

    fn digest_len(&self) -> Result<usize> {
        Ok(self.alg.size)
    }
}

pub fn register(mechs: &mut Mechanisms) {
    for alg in &HASH_ALGS {
        mechs.add_mechanism(
            alg.mech,
            Box::new(HashMechanism {
                info: new_info(0, 0, CKF_DIGEST),
            }),
        );
    }
}
