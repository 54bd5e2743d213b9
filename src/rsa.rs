// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! RSA mechanisms
//!
//! All paddings are applied in [crate::padding]; the backend is only asked
//! for raw modular exponentiation on modulus sized blocks.

use std::fmt;

use crate::config::{CONFIG, MIN_RSA_GEN_BITS};
use crate::error::{Error, Result};
use crate::hash::{hash_alg, mgf1_hash, HashAlg};
use crate::interface::*;
use crate::kasn1::DigestInfo;
use crate::keymat::{
    rsa_private_from_object, rsa_public_from_object, rsa_store_generated,
    RsaPrivate, RsaPublic,
};
use crate::mechanism::*;
use crate::misc::{strip_leading_zeros, zero_pad_to};
use crate::object::Object;
use crate::ossl::backend;
use crate::padding::*;

use constant_time_eq::constant_time_eq;
use openssl::hash::Hasher;
use zeroize::Zeroizing;

const RSA_F4: [u8; 3] = [0x01, 0x00, 0x01];

/// Key size range in bits, the upper bound follows the configuration
fn key_size_info(flags: CK_FLAGS) -> CK_MECHANISM_INFO {
    new_info(
        CK_ULONG::from(MIN_RSA_GEN_BITS),
        CK_ULONG::from(CONFIG.rsa_max_bits),
        flags,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    /// PKCS#1 v1.5, block type 2 for encryption and 1 for signatures
    Pkcs1,
    /// Raw "X.509" RSA, no padding at all
    Raw,
    Oaep,
    Pss,
}

fn modulus_bits(n: &[u8]) -> usize {
    let n = strip_leading_zeros(n);
    match n.first() {
        Some(b) => n.len() * 8 - usize::try_from(b.leading_zeros()).unwrap_or(0),
        None => 0,
    }
}

/// True if `input`, read as a big endian integer, is smaller than `n`
fn below_modulus(n: &[u8], input: &[u8]) -> bool {
    let n = strip_leading_zeros(n);
    let input = strip_leading_zeros(input);
    if input.len() != n.len() {
        return input.len() < n.len();
    }
    input < n
}

/// Pads the output of the primitive to the modulus length
fn to_modulus_len(block: &[u8], k: usize) -> Result<Zeroizing<Vec<u8>>> {
    match zero_pad_to(block, k) {
        Some(v) => Ok(Zeroizing::new(v)),
        None => Err(CKR_GENERAL_ERROR)?,
    }
}

fn digest_info(alg: &HashAlg, digest: &[u8]) -> Result<Vec<u8>> {
    match asn1::write_single(&DigestInfo::new(alg.oid.clone(), digest)) {
        Ok(der) => Ok(der),
        Err(_) => Err(CKR_GENERAL_ERROR)?,
    }
}

#[derive(Debug)]
struct OaepSettings {
    label_hash: Vec<u8>,
    mgf: &'static HashAlg,
}

impl OaepSettings {
    fn from_mechanism(mech: &CK_MECHANISM) -> Result<OaepSettings> {
        let params = match MechParams::from_mechanism(mech)? {
            MechParams::Oaep(p) => p,
            _ => return Err(CKR_MECHANISM_PARAM_INVALID)?,
        };
        let alg = hash_alg(params.hash)
            .map_err(|e| e.remap(CKR_MECHANISM_PARAM_INVALID))?;
        let label = match &params.source {
            Some(s) => s.as_slice(),
            None => &[],
        };
        Ok(OaepSettings {
            label_hash: alg.digest(label)?,
            mgf: mgf1_hash(params.mgf)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct PssSettings {
    alg: &'static HashAlg,
    mgf: &'static HashAlg,
    salt_len: usize,
}

impl PssSettings {
    fn from_mechanism(
        mech: &CK_MECHANISM,
        prehash: Option<&'static HashAlg>,
    ) -> Result<PssSettings> {
        let params = match MechParams::from_mechanism(mech)? {
            MechParams::Pss(p) => p,
            _ => return Err(CKR_MECHANISM_PARAM_INVALID)?,
        };
        let alg = hash_alg(params.hash)
            .map_err(|e| e.remap(CKR_MECHANISM_PARAM_INVALID))?;
        if let Some(h) = prehash {
            if h.mech != alg.mech {
                return Err(CKR_MECHANISM_PARAM_INVALID)?;
            }
        }
        Ok(PssSettings {
            alg: alg,
            mgf: mgf1_hash(params.mgf)?,
            salt_len: params.salt_len,
        })
    }
}

#[derive(Debug)]
struct RsaKeyPairGenMechanism {
    info: CK_MECHANISM_INFO,
}

impl Mechanism for RsaKeyPairGenMechanism {
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
        let bits = match pubkey.get_attr_as_ulong(CKA_MODULUS_BITS) {
            Ok(b) => b,
            Err(e) if e.attr_not_found() => {
                return Err(CKR_TEMPLATE_INCOMPLETE)?
            }
            Err(e) => return Err(e),
        };
        let bits = u32::try_from(bits)
            .map_err(|_| Error::ck_rv(CKR_KEY_SIZE_RANGE))?;
        if bits < MIN_RSA_GEN_BITS || bits > CONFIG.rsa_max_bits {
            return Err(CKR_KEY_SIZE_RANGE)?;
        }
        let exponent = match pubkey.get_attr_as_bytes(CKA_PUBLIC_EXPONENT) {
            Ok(e) => e.clone(),
            Err(e) if e.attr_not_found() => RSA_F4.to_vec(),
            Err(e) => return Err(e),
        };
        if exponent.is_empty() || exponent.len() > CK_ULONG_SIZE {
            return Err(CKR_ATTRIBUTE_VALUE_INVALID)?;
        }

        let key = backend().rsa_generate(bits, &exponent)?;
        rsa_store_generated(&key, pubkey, privkey)
    }
}

#[derive(Debug)]
struct RsaMechanism {
    info: CK_MECHANISM_INFO,
    scheme: Scheme,
    /// Hash applied to the data for the hash-and-sign variants
    prehash: Option<&'static HashAlg>,
}

impl RsaMechanism {
    fn cipher_op(
        &self,
        mech: &CK_MECHANISM,
        key: RsaKey,
    ) -> Result<RsaCipherOperation> {
        let oaep = match self.scheme {
            Scheme::Oaep => Some(OaepSettings::from_mechanism(mech)?),
            Scheme::Pkcs1 | Scheme::Raw => {
                MechParams::from_mechanism(mech)?;
                None
            }
            Scheme::Pss => return Err(CKR_MECHANISM_INVALID)?,
        };
        Ok(RsaCipherOperation {
            mech: mech.mechanism,
            scheme: self.scheme,
            k: key.public().modulus_len(),
            key: key,
            oaep: oaep,
            finalized: false,
        })
    }

    fn sig_op(
        &self,
        mech: &CK_MECHANISM,
        key: RsaKey,
    ) -> Result<RsaSigOperation> {
        let pss = match self.scheme {
            Scheme::Pss => {
                Some(PssSettings::from_mechanism(mech, self.prehash)?)
            }
            Scheme::Pkcs1 | Scheme::Raw => {
                MechParams::from_mechanism(mech)?;
                None
            }
            Scheme::Oaep => return Err(CKR_MECHANISM_INVALID)?,
        };
        let hasher = match self.prehash {
            Some(alg) => Some(alg.hasher()?),
            None => None,
        };
        let public = key.public();
        Ok(RsaSigOperation {
            mech: mech.mechanism,
            scheme: self.scheme,
            k: public.modulus_len(),
            em_bits: modulus_bits(&public.n).saturating_sub(1),
            key: key,
            prehash: self.prehash,
            hasher: hasher,
            pss: pss,
            finalized: false,
            in_use: false,
        })
    }
}

fn public_key(key: &Object, op: CK_ATTRIBUTE_TYPE) -> Result<RsaKey> {
    key.check_key_ops(CKO_PUBLIC_KEY, CKK_RSA, op)?;
    Ok(RsaKey::Public(rsa_public_from_object(key)?))
}

fn private_key(key: &Object, op: CK_ATTRIBUTE_TYPE) -> Result<RsaKey> {
    key.check_key_ops(CKO_PRIVATE_KEY, CKK_RSA, op)?;
    Ok(RsaKey::Private(rsa_private_from_object(key)?))
}

impl Mechanism for RsaMechanism {
    fn info(&self) -> &CK_MECHANISM_INFO {
        &self.info
    }

    fn encryption_new(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
    ) -> Result<Box<dyn Encryption>> {
        if self.info.flags & CKF_ENCRYPT == 0 {
            return Err(CKR_MECHANISM_INVALID)?;
        }
        Ok(Box::new(self.cipher_op(mech, public_key(key, CKA_ENCRYPT)?)?))
    }

    fn decryption_new(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
    ) -> Result<Box<dyn Decryption>> {
        if self.info.flags & CKF_DECRYPT == 0 {
            return Err(CKR_MECHANISM_INVALID)?;
        }
        Ok(Box::new(self.cipher_op(mech, private_key(key, CKA_DECRYPT)?)?))
    }

    fn sign_new(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
    ) -> Result<Box<dyn Sign>> {
        if self.info.flags & CKF_SIGN == 0 {
            return Err(CKR_MECHANISM_INVALID)?;
        }
        Ok(Box::new(self.sig_op(mech, private_key(key, CKA_SIGN)?)?))
    }

    fn verify_new(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
    ) -> Result<Box<dyn Verify>> {
        if self.info.flags & CKF_VERIFY == 0 {
            return Err(CKR_MECHANISM_INVALID)?;
        }
        Ok(Box::new(self.sig_op(mech, public_key(key, CKA_VERIFY)?)?))
    }

    fn verify_recover_new(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
    ) -> Result<Box<dyn VerifyRecover>> {
        if self.info.flags & CKF_VERIFY_RECOVER == 0 {
            return Err(CKR_MECHANISM_INVALID)?;
        }
        Ok(Box::new(
            self.sig_op(mech, public_key(key, CKA_VERIFY_RECOVER)?)?,
        ))
    }
}

#[derive(Debug)]
enum RsaKey {
    Public(RsaPublic),
    Private(RsaPrivate),
}

impl RsaKey {
    fn public(&self) -> RsaPublic {
        match self {
            RsaKey::Public(k) => k.clone(),
            RsaKey::Private(k) => k.public(),
        }
    }

    fn modulus(&self) -> &[u8] {
        match self {
            RsaKey::Public(k) => &k.n,
            RsaKey::Private(k) => &k.n,
        }
    }

    fn public_op(&self, input: &[u8], k: usize) -> Result<Zeroizing<Vec<u8>>> {
        match self {
            RsaKey::Public(key) => {
                to_modulus_len(&backend().rsa_public(key, input)?, k)
            }
            RsaKey::Private(_) => Err(CKR_KEY_TYPE_INCONSISTENT)?,
        }
    }

    fn private_op(&self, input: &[u8], k: usize) -> Result<Zeroizing<Vec<u8>>> {
        match self {
            RsaKey::Private(key) => {
                to_modulus_len(&backend().rsa_private(key, input)?, k)
            }
            RsaKey::Public(_) => Err(CKR_KEY_TYPE_INCONSISTENT)?,
        }
    }
}

#[derive(Debug)]
struct RsaCipherOperation {
    mech: CK_MECHANISM_TYPE,
    scheme: Scheme,
    key: RsaKey,
    k: usize,
    oaep: Option<OaepSettings>,
    finalized: bool,
}

impl RsaCipherOperation {
    fn oaep(&self) -> Result<&OaepSettings> {
        match &self.oaep {
            Some(o) => Ok(o),
            None => Err(CKR_GENERAL_ERROR)?,
        }
    }

    fn encode(&self, plain: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        match self.scheme {
            Scheme::Pkcs1 => pkcs1_format(plain, self.k, BlockType::Bt2),
            Scheme::Raw => {
                let block = x509_pad(plain, self.k)?;
                if !below_modulus(self.key.modulus(), &block) {
                    return Err(CKR_DATA_INVALID)?;
                }
                Ok(block)
            }
            Scheme::Oaep => {
                let oaep = self.oaep()?;
                oaep_encode(plain, self.k, &oaep.label_hash, oaep.mgf)
            }
            Scheme::Pss => Err(CKR_GENERAL_ERROR)?,
        }
    }

    fn decode(&self, block: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        match self.scheme {
            Scheme::Pkcs1 => pkcs1_parse(block, BlockType::Bt2),
            Scheme::Raw => Ok(Zeroizing::new(block.to_vec())),
            Scheme::Oaep => {
                let oaep = self.oaep()?;
                oaep_decode(block, &oaep.label_hash, oaep.mgf)
            }
            Scheme::Pss => Err(CKR_GENERAL_ERROR)?,
        }
    }
}

impl MechOperation for RsaCipherOperation {
    fn mechanism(&self) -> CK_MECHANISM_TYPE {
        self.mech
    }

    fn finalized(&self) -> bool {
        self.finalized
    }
}

impl Encryption for RsaCipherOperation {
    fn encrypt(&mut self, plain: &[u8], cipher: &mut [u8]) -> Result<usize> {
        if self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        check_output(cipher, self.k)?;
        self.finalized = true;
        let block = self.encode(plain)?;
        let out = self.key.public_op(&block, self.k)?;
        cipher[..self.k].copy_from_slice(&out);
        Ok(self.k)
    }

    fn encrypt_update(&mut self, _: &[u8], _: &mut [u8]) -> Result<usize> {
        self.finalized = true;
        Err(CKR_OPERATION_NOT_INITIALIZED)?
    }

    fn encrypt_final(&mut self, _: &mut [u8]) -> Result<usize> {
        self.finalized = true;
        Err(CKR_OPERATION_NOT_INITIALIZED)?
    }

    fn encryption_len(&self, _: usize, _: bool) -> Result<usize> {
        Ok(self.k)
    }
}

impl Decryption for RsaCipherOperation {
    fn decrypt(&mut self, cipher: &[u8], plain: &mut [u8]) -> Result<usize> {
        if self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        if cipher.len() != self.k {
            self.finalized = true;
            return Err(CKR_ENCRYPTED_DATA_LEN_RANGE)?;
        }
        if !below_modulus(self.key.modulus(), cipher) {
            self.finalized = true;
            return Err(CKR_ENCRYPTED_DATA_INVALID)?;
        }
        let block = match self.key.private_op(cipher, self.k) {
            Ok(b) => b,
            Err(e) => {
                self.finalized = true;
                return Err(e);
            }
        };
        let out = match self.decode(&block) {
            Ok(o) => o,
            Err(e) => {
                self.finalized = true;
                return Err(e);
            }
        };
        /* a short buffer leaves the operation usable for a retry */
        check_output(plain, out.len())?;
        self.finalized = true;
        plain[..out.len()].copy_from_slice(&out);
        Ok(out.len())
    }

    fn decrypt_update(&mut self, _: &[u8], _: &mut [u8]) -> Result<usize> {
        self.finalized = true;
        Err(CKR_OPERATION_NOT_INITIALIZED)?
    }

    fn decrypt_final(&mut self, _: &mut [u8]) -> Result<usize> {
        self.finalized = true;
        Err(CKR_OPERATION_NOT_INITIALIZED)?
    }

    fn decryption_len(&self, _: usize, _: bool) -> Result<usize> {
        Ok(self.k)
    }
}

struct RsaSigOperation {
    mech: CK_MECHANISM_TYPE,
    scheme: Scheme,
    key: RsaKey,
    k: usize,
    em_bits: usize,
    prehash: Option<&'static HashAlg>,
    hasher: Option<Hasher>,
    pss: Option<PssSettings>,
    finalized: bool,
    in_use: bool,
}

impl fmt::Debug for RsaSigOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaSigOperation")
            .field("mech", &self.mech)
            .field("scheme", &self.scheme)
            .field("k", &self.k)
            .field("finalized", &self.finalized)
            .field("in_use", &self.in_use)
            .finish()
    }
}

impl RsaSigOperation {
    fn pss(&self) -> Result<PssSettings> {
        match self.pss {
            Some(p) => Ok(p),
            None => Err(CKR_GENERAL_ERROR)?,
        }
    }

    /// Builds the block to be exponentiated with the private key, `input`
    /// is the data or, for the hash-and-sign variants, its digest
    fn encode(&self, input: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        match self.scheme {
            Scheme::Pkcs1 => match self.prehash {
                Some(alg) => pkcs1_format(
                    &digest_info(alg, input)?,
                    self.k,
                    BlockType::Bt1,
                ),
                None => pkcs1_format(input, self.k, BlockType::Bt1),
            },
            Scheme::Raw => {
                let block = x509_pad(input, self.k)?;
                if !below_modulus(self.key.modulus(), &block) {
                    return Err(CKR_DATA_INVALID)?;
                }
                Ok(block)
            }
            Scheme::Pss => {
                let pss = self.pss()?;
                let em = pss_encode(
                    input,
                    self.em_bits,
                    pss.salt_len,
                    pss.alg,
                    pss.mgf,
                )?;
                to_modulus_len(&em, self.k)
            }
            Scheme::Oaep => Err(CKR_GENERAL_ERROR)?,
        }
    }

    /// Checks the recovered block against `input`; every mismatch is
    /// reported as `CKR_SIGNATURE_INVALID`
    fn check(&self, input: &[u8], block: &[u8]) -> Result<()> {
        match self.scheme {
            Scheme::Pkcs1 => {
                let expected = match self.prehash {
                    Some(alg) => pkcs1_format(
                        &digest_info(alg, input)?,
                        self.k,
                        BlockType::Bt1,
                    ),
                    None => pkcs1_format(input, self.k, BlockType::Bt1),
                }
                .map_err(|e| e.remap(CKR_SIGNATURE_INVALID))?;
                if !constant_time_eq(&expected, block) {
                    return Err(CKR_SIGNATURE_INVALID)?;
                }
                Ok(())
            }
            Scheme::Raw => x509_compare(input, block),
            Scheme::Pss => {
                let pss = self.pss()?;
                pss_verify(
                    input,
                    block,
                    self.em_bits,
                    pss.salt_len,
                    pss.alg,
                    pss.mgf,
                )
            }
            Scheme::Oaep => Err(CKR_GENERAL_ERROR)?,
        }
    }

    /// Runs the public operation on a signature
    fn open(&self, signature: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if signature.len() != self.k {
            return Err(CKR_SIGNATURE_LEN_RANGE)?;
        }
        if !below_modulus(self.key.modulus(), signature) {
            return Err(CKR_SIGNATURE_INVALID)?;
        }
        self.key
            .public_op(signature, self.k)
            .map_err(|e| e.remap(CKR_SIGNATURE_INVALID))
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
        let hasher = match &mut self.hasher {
            Some(h) => h,
            None => {
                /* raw mechanisms are single part only */
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

    /// Returns the digest accumulated so far, for the hash-and-sign
    /// variants
    fn digest(&mut self) -> Result<Vec<u8>> {
        match &mut self.hasher {
            Some(h) => Ok(h.finish()?.to_vec()),
            None => Err(CKR_OPERATION_NOT_INITIALIZED)?,
        }
    }

    fn sign_input(&mut self, input: &[u8], signature: &mut [u8]) -> Result<usize> {
        let block = self.encode(input)?;
        let out = self.key.private_op(&block, self.k)?;
        signature[..self.k].copy_from_slice(&out);
        Ok(self.k)
    }
}

impl MechOperation for RsaSigOperation {
    fn mechanism(&self) -> CK_MECHANISM_TYPE {
        self.mech
    }

    fn finalized(&self) -> bool {
        self.finalized
    }
}

impl Sign for RsaSigOperation {
    fn sign(&mut self, data: &[u8], signature: &mut [u8]) -> Result<usize> {
        self.begin()?;
        check_output(signature, self.k)?;
        if self.hasher.is_some() {
            self.update(data)?;
            return self.sign_final(signature);
        }
        self.finalized = true;
        self.sign_input(data, signature)
    }

    fn sign_update(&mut self, data: &[u8]) -> Result<()> {
        self.update(data)
    }

    fn sign_final(&mut self, signature: &mut [u8]) -> Result<usize> {
        if self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        check_output(signature, self.k)?;
        self.finalized = true;
        let digest = self.digest()?;
        self.sign_input(&digest, signature)
    }

    fn signature_len(&self) -> Result<usize> {
        Ok(self.k)
    }
}

impl Verify for RsaSigOperation {
    fn verify(&mut self, data: &[u8], signature: &[u8]) -> Result<()> {
        self.begin()?;
        if self.hasher.is_some() {
            self.update(data)?;
            return self.verify_final(signature);
        }
        self.finalized = true;
        let block = self.open(signature)?;
        self.check(data, &block)
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
        let block = self.open(signature)?;
        self.check(&digest, &block)
    }

    fn signature_len(&self) -> Result<usize> {
        Ok(self.k)
    }
}

impl VerifyRecover for RsaSigOperation {
    fn verify_recover(
        &mut self,
        signature: &[u8],
        data: &mut [u8],
    ) -> Result<usize> {
        self.begin()?;
        let block = match self.open(signature) {
            Ok(b) => b,
            Err(e) => {
                self.finalized = true;
                return Err(e);
            }
        };
        let out = match self.scheme {
            Scheme::Pkcs1 => pkcs1_parse(&block, BlockType::Bt1)
                .map_err(|e| e.remap(CKR_SIGNATURE_INVALID)),
            Scheme::Raw => Ok(block),
            _ => Err(Error::ck_rv(CKR_MECHANISM_INVALID)),
        };
        let out = match out {
            Ok(o) => o,
            Err(e) => {
                self.finalized = true;
                return Err(e);
            }
        };
        check_output(data, out.len())?;
        self.finalized = true;
        data[..out.len()].copy_from_slice(&out);
        Ok(out.len())
    }

    fn recover_len(&self) -> Result<usize> {
        Ok(self.k)
    }
}

fn add_rsa(
    mechs: &mut Mechanisms,
    mech: CK_MECHANISM_TYPE,
    scheme: Scheme,
    prehash: Option<&'static HashAlg>,
    flags: CK_FLAGS,
) {
    mechs.add_mechanism(
        mech,
        Box::new(RsaMechanism {
            info: key_size_info(flags),
            scheme: scheme,
            prehash: prehash,
        }),
    );
}

pub fn register(mechs: &mut Mechanisms) {
    mechs.add_mechanism(
        CKM_RSA_PKCS_KEY_PAIR_GEN,
        Box::new(RsaKeyPairGenMechanism {
            info: key_size_info(CKF_GENERATE_KEY_PAIR),
        }),
    );

    let all = CKF_ENCRYPT
        | CKF_DECRYPT
        | CKF_SIGN
        | CKF_VERIFY
        | CKF_VERIFY_RECOVER;
    add_rsa(mechs, CKM_RSA_PKCS, Scheme::Pkcs1, None, all);
    add_rsa(mechs, CKM_RSA_X_509, Scheme::Raw, None, all);
    add_rsa(
        mechs,
        CKM_RSA_PKCS_OAEP,
        Scheme::Oaep,
        None,
        CKF_ENCRYPT | CKF_DECRYPT,
    );
    add_rsa(
        mechs,
        CKM_RSA_PKCS_PSS,
        Scheme::Pss,
        None,
        CKF_SIGN | CKF_VERIFY,
    );

    for (pkcs, pss, hash) in [
        (CKM_SHA1_RSA_PKCS, CKM_SHA1_RSA_PKCS_PSS, CKM_SHA_1),
        (CKM_SHA224_RSA_PKCS, CKM_SHA224_RSA_PKCS_PSS, CKM_SHA224),
        (CKM_SHA256_RSA_PKCS, CKM_SHA256_RSA_PKCS_PSS, CKM_SHA256),
        (CKM_SHA384_RSA_PKCS, CKM_SHA384_RSA_PKCS_PSS, CKM_SHA384),
        (CKM_SHA512_RSA_PKCS, CKM_SHA512_RSA_PKCS_PSS, CKM_SHA512),
    ] {
        let Ok(alg) = hash_alg(hash) else {
            continue;
        };
        add_rsa(mechs, pkcs, Scheme::Pkcs1, Some(alg), CKF_SIGN | CKF_VERIFY);
        add_rsa(mechs, pss, Scheme::Pss, Some(alg), CKF_SIGN | CKF_VERIFY);
    }
}
