// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Encoder/decoder generation of the OpenSSL API
//!
//! Keys are handed to the library as DER structures and decoded there,
//! operations run through `EVP_PKEY_CTX`. Generated keys are exported
//! back to DER and the components are read out of the encoding.

use crate::curve::Curve;
use crate::error::Result;
use crate::interface::*;
use crate::kasn1::{
    ECPrivateKey, EcSubjectPublicKeyInfo, EcdsaSignature, RsaPrivateKey,
    RsaPublicKey, DerEncBigUint,
};
use crate::keymat::{
    DhPrivate, EcPrivate, EcPublic, RsaCrt, RsaPrivate, RsaPublic,
};
use crate::misc::zero_pad_to;
use crate::ossl::{bn, secure_bn, Backend};

use openssl::dh::Dh;
use openssl::bn::BigNumContext;
use openssl::ec::{EcKey, PointConversionForm};
use openssl::pkey::{PKey, Private, Public};
use openssl::pkey_ctx::PkeyCtx;
use openssl::rsa::{Padding, Rsa, RsaPrivateKeyBuilder};
use zeroize::Zeroizing;

#[derive(Debug)]
pub struct EvpBackend;

fn der_encode<T: asn1::Asn1Writable>(v: &T) -> Result<Zeroizing<Vec<u8>>> {
    match asn1::write_single(v) {
        Ok(der) => Ok(Zeroizing::new(der)),
        Err(_) => Err(CKR_GENERAL_ERROR)?,
    }
}

fn rsa_public_pkey(key: &RsaPublic) -> Result<PKey<Public>> {
    let der = der_encode(&RsaPublicKey {
        modulus: DerEncBigUint::new(&key.n)?,
        public_exponent: DerEncBigUint::new(&key.e)?,
    })?;
    let rsa = trace_ossl!(
        Rsa::public_key_from_der_pkcs1(&der),
        "d2i_RSAPublicKey",
        CKR_ATTRIBUTE_VALUE_INVALID
    )?;
    Ok(PKey::from_rsa(rsa)?)
}

fn rsa_private_pkey(key: &RsaPrivate) -> Result<PKey<Private>> {
    let rsa = match &key.crt {
        Some(crt) => {
            let der = der_encode(&RsaPrivateKey::new(
                &key.n, &key.e, &key.d, &crt.p, &crt.q, &crt.dp, &crt.dq,
                &crt.qinv,
            )?)?;
            trace_ossl!(
                Rsa::private_key_from_der(&der),
                "d2i_RSAPrivateKey",
                CKR_ATTRIBUTE_VALUE_INVALID
            )?
        }
        /* PKCS#1 has no encoding for a key without its factors */
        None => RsaPrivateKeyBuilder::new(
            bn(&key.n)?,
            bn(&key.e)?,
            secure_bn(&key.d)?,
        )?
        .build(),
    };
    Ok(PKey::from_rsa(rsa)?)
}

fn ec_public_pkey(key: &EcPublic) -> Result<PKey<Public>> {
    let der = der_encode(&EcSubjectPublicKeyInfo::new(
        key.curve.oid().clone(),
        &key.point,
    )?)?;
    let pkey = trace_ossl!(
        PKey::public_key_from_der(&der),
        "d2i_PUBKEY",
        CKR_PUBLIC_KEY_INVALID
    )?;
    trace_ossl!(
        pkey.ec_key()?.check_key(),
        "EVP_PKEY_public_check",
        CKR_PUBLIC_KEY_INVALID
    )?;
    Ok(pkey)
}

/// Decodes a SEC1 private key; without `point` the library computes the
/// public point itself
fn ec_private_eckey(
    curve: &Curve,
    scalar: &[u8],
    point: Option<&[u8]>,
) -> Result<EcKey<Private>> {
    let der = der_encode(&ECPrivateKey::new(scalar, curve.oid().clone(), point)?)?;
    let eckey = trace_ossl!(
        EcKey::private_key_from_der(&der),
        "d2i_ECPrivateKey",
        CKR_FUNCTION_FAILED
    )?;
    trace_ossl!(eckey.check_key(), "EVP_PKEY_check", CKR_FUNCTION_FAILED)?;
    Ok(eckey)
}

fn ec_private_pkey(key: &EcPrivate) -> Result<PKey<Private>> {
    Ok(PKey::from_ec_key(ec_private_eckey(
        &key.curve,
        &key.scalar,
        Some(key.point.as_slice()),
    )?)?)
}

/// Reads the scalar and point out of an exported SEC1 structure
fn ec_components(curve: &Curve, der: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let sec1 = match asn1::parse_single::<ECPrivateKey>(der) {
        Ok(k) => k,
        Err(_) => return Err(CKR_GENERAL_ERROR)?,
    };
    let scalar = match zero_pad_to(sec1.private_key.as_bytes(), curve.order_len())
    {
        Some(s) => s,
        None => return Err(CKR_GENERAL_ERROR)?,
    };
    let point = match &sec1.public_key {
        Some(p) => p.as_bytes().to_vec(),
        None => return Err(CKR_GENERAL_ERROR)?,
    };
    Ok((scalar, point))
}

fn dh_params(prime: &[u8], base: &[u8]) -> Result<Dh<openssl::pkey::Params>> {
    Ok(Dh::from_pqg(bn(prime)?, None, bn(base)?)?)
}

impl Backend for EvpBackend {
    fn name(&self) -> &'static str {
        "evp"
    }

    fn rsa_public(&self, key: &RsaPublic, input: &[u8]) -> Result<Vec<u8>> {
        let pkey = rsa_public_pkey(key)?;
        let mut ctx = PkeyCtx::new(&pkey)?;
        ctx.encrypt_init()?;
        ctx.set_rsa_padding(Padding::NONE)?;
        let mut out = Vec::new();
        ctx.encrypt_to_vec(input, &mut out)?;
        Ok(out)
    }

    fn rsa_private(
        &self,
        key: &RsaPrivate,
        input: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        let pkey = rsa_private_pkey(key)?;
        let mut ctx = PkeyCtx::new(&pkey)?;
        ctx.decrypt_init()?;
        ctx.set_rsa_padding(Padding::NONE)?;
        let mut out = Zeroizing::new(Vec::new());
        ctx.decrypt_to_vec(input, &mut out)?;
        Ok(out)
    }

    fn rsa_generate(&self, bits: u32, exponent: &[u8]) -> Result<RsaPrivate> {
        let e = bn(exponent)?;
        let rsa = Rsa::generate_with_e(bits, &e)?;
        let der = Zeroizing::new(rsa.private_key_to_der()?);
        let pkcs1 = match asn1::parse_single::<RsaPrivateKey>(&der) {
            Ok(k) => k,
            Err(_) => return Err(CKR_GENERAL_ERROR)?,
        };
        Ok(RsaPrivate {
            n: pkcs1.modulus.as_nopad_bytes().to_vec(),
            e: pkcs1.public_exponent.as_nopad_bytes().to_vec(),
            d: pkcs1.private_exponent.as_nopad_bytes().to_vec(),
            crt: Some(RsaCrt {
                p: pkcs1.prime1.as_nopad_bytes().to_vec(),
                q: pkcs1.prime2.as_nopad_bytes().to_vec(),
                dp: pkcs1.exponent1.as_nopad_bytes().to_vec(),
                dq: pkcs1.exponent2.as_nopad_bytes().to_vec(),
                qinv: pkcs1.coefficient.as_nopad_bytes().to_vec(),
            }),
        })
    }

    fn ec_derive_public(
        &self,
        curve: &Curve,
        scalar: &[u8],
    ) -> Result<Vec<u8>> {
        let eckey = ec_private_eckey(curve, scalar, None)?;
        /* the decoder marks computed points as not to be encoded back */
        let group = curve.group()?;
        let mut ctx = BigNumContext::new()?;
        Ok(eckey.public_key().to_bytes(
            &group,
            PointConversionForm::UNCOMPRESSED,
            &mut ctx,
        )?)
    }

    fn ec_check_public(&self, key: &EcPublic) -> Result<()> {
        ec_public_pkey(key).map(|_| ())
    }

    fn ec_generate(&self, curve: &Curve) -> Result<EcPrivate> {
        let group = curve.group()?;
        let eckey = EcKey::generate(&group)?;
        let der = Zeroizing::new(eckey.private_key_to_der()?);
        let (scalar, point) = ec_components(curve, &der)?;
        Ok(EcPrivate {
            curve: curve.clone(),
            scalar: scalar,
            point: point,
        })
    }

    fn ecdsa_sign(
        &self,
        key: &EcPrivate,
        digest: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        let pkey = ec_private_pkey(key)?;
        let mut ctx = PkeyCtx::new(&pkey)?;
        ctx.sign_init()?;
        let mut der = Vec::new();
        ctx.sign_to_vec(digest, &mut der)?;
        let sig = match asn1::parse_single::<EcdsaSignature>(&der) {
            Ok(s) => s,
            Err(_) => return Err(CKR_GENERAL_ERROR)?,
        };
        Ok((
            sig.r.as_nopad_bytes().to_vec(),
            sig.s.as_nopad_bytes().to_vec(),
        ))
    }

    fn ecdsa_verify(
        &self,
        key: &EcPublic,
        digest: &[u8],
        r: &[u8],
        s: &[u8],
    ) -> Result<bool> {
        let pkey = ec_public_pkey(key)?;
        let der = der_encode(&EcdsaSignature {
            r: DerEncBigUint::new(r)?,
            s: DerEncBigUint::new(s)?,
        })?;
        let mut ctx = PkeyCtx::new(&pkey)?;
        ctx.verify_init()?;
        Ok(ctx.verify(digest, &der)?)
    }

    fn ecdh(
        &self,
        key: &EcPrivate,
        peer: &EcPublic,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let pkey = ec_private_pkey(key)?;
        let peer = ec_public_pkey(peer)?;
        let mut ctx = PkeyCtx::new(&pkey)?;
        ctx.derive_init()?;
        ctx.derive_set_peer(&peer)?;
        let mut secret = Zeroizing::new(Vec::new());
        ctx.derive_to_vec(&mut secret)?;
        Ok(secret)
    }

    fn dh_generate(
        &self,
        prime: &[u8],
        base: &[u8],
    ) -> Result<(DhPrivate, Vec<u8>)> {
        let params = PKey::from_dh(dh_params(prime, base)?)?;
        let mut ctx = PkeyCtx::new(&params)?;
        ctx.keygen_init()?;
        let pkey = ctx.keygen()?;
        let dh = pkey.dh()?;
        Ok((
            DhPrivate {
                prime: prime.to_vec(),
                base: base.to_vec(),
                value: dh.private_key().to_vec(),
            },
            dh.public_key().to_vec(),
        ))
    }

    fn dh_derive(
        &self,
        key: &DhPrivate,
        peer: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        let local = PKey::from_dh(
            dh_params(&key.prime, &key.base)?
                .set_private_key(secure_bn(&key.value)?)?,
        )?;
        let remote = PKey::from_dh(
            dh_params(&key.prime, &key.base)?.set_public_key(bn(peer)?)?,
        )?;
        let mut ctx = PkeyCtx::new(&local)?;
        ctx.derive_init()?;
        ctx.derive_set_peer(&remote)?;
        let mut secret = Zeroizing::new(Vec::new());
        ctx.derive_to_vec(&mut secret)?;
        Ok(secret)
    }
}
