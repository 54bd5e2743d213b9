// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Component setter generation of the OpenSSL API
//!
//! Keys are assembled from their individual numbers and every operation
//! goes through the algorithm specific low level calls.

use crate::curve::Curve;
use crate::error::Result;
use crate::interface::*;
use crate::keymat::{
    DhPrivate, EcPrivate, EcPublic, RsaCrt, RsaPrivate, RsaPublic,
};
use crate::misc::zero_pad_to;
use crate::ossl::{bn, secure_bn, Backend};

use openssl::bn::{BigNum, BigNumContext};
use openssl::dh::Dh;
use openssl::ec::{EcGroup, EcKey, EcPoint, PointConversionForm};
use openssl::ecdsa::EcdsaSig;
use openssl::pkey::{Private, Public};
use openssl::rsa::{Padding, Rsa, RsaPrivateKeyBuilder};
use zeroize::Zeroizing;

#[derive(Debug)]
pub struct LegacyBackend;

fn rsa_public_key(key: &RsaPublic) -> Result<Rsa<Public>> {
    Ok(Rsa::from_public_components(bn(&key.n)?, bn(&key.e)?)?)
}

fn rsa_private_key(key: &RsaPrivate) -> Result<Rsa<Private>> {
    let mut builder =
        RsaPrivateKeyBuilder::new(bn(&key.n)?, bn(&key.e)?, secure_bn(&key.d)?)?;
    if let Some(crt) = &key.crt {
        builder = builder
            .set_factors(secure_bn(&crt.p)?, secure_bn(&crt.q)?)?
            .set_crt_params(
                secure_bn(&crt.dp)?,
                secure_bn(&crt.dq)?,
                secure_bn(&crt.qinv)?,
            )?;
    }
    Ok(builder.build())
}

fn decode_point(group: &EcGroup, data: &[u8]) -> Result<EcPoint> {
    let mut ctx = BigNumContext::new()?;
    trace_ossl!(
        EcPoint::from_bytes(group, data, &mut ctx),
        "EC_POINT_oct2point",
        CKR_PUBLIC_KEY_INVALID
    )
}

fn ec_public_key(key: &EcPublic) -> Result<EcKey<Public>> {
    let group = key.curve.group()?;
    let point = decode_point(&group, &key.point)?;
    let eckey = trace_ossl!(
        EcKey::from_public_key(&group, &point),
        "EC_KEY_set_public_key",
        CKR_PUBLIC_KEY_INVALID
    )?;
    trace_ossl!(eckey.check_key(), "EC_KEY_check_key", CKR_PUBLIC_KEY_INVALID)?;
    Ok(eckey)
}

fn ec_private_key(
    group: &EcGroup,
    scalar: &[u8],
    point: &EcPoint,
) -> Result<EcKey<Private>> {
    let priv_bn = secure_bn(scalar)?;
    let eckey = EcKey::from_private_components(group, &priv_bn, point)?;
    /* a scalar that does not match its point is a broken key */
    trace_ossl!(eckey.check_key(), "EC_KEY_check_key", CKR_FUNCTION_FAILED)?;
    Ok(eckey)
}

impl Backend for LegacyBackend {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn rsa_public(&self, key: &RsaPublic, input: &[u8]) -> Result<Vec<u8>> {
        let rsa = rsa_public_key(key)?;
        let mut out = vec![0u8; usize::try_from(rsa.size())?];
        let len = rsa.public_encrypt(input, &mut out, Padding::NONE)?;
        out.truncate(len);
        Ok(out)
    }

    fn rsa_private(
        &self,
        key: &RsaPrivate,
        input: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        let rsa = rsa_private_key(key)?;
        let mut out = Zeroizing::new(vec![0u8; usize::try_from(rsa.size())?]);
        let len = rsa.private_decrypt(input, &mut out, Padding::NONE)?;
        out.truncate(len);
        Ok(out)
    }

    fn rsa_generate(&self, bits: u32, exponent: &[u8]) -> Result<RsaPrivate> {
        let e = bn(exponent)?;
        let rsa = Rsa::generate_with_e(bits, &e)?;
        let component = |c: Option<&openssl::bn::BigNumRef>| match c {
            Some(v) => Ok(v.to_vec()),
            None => Err(CKR_GENERAL_ERROR),
        };
        Ok(RsaPrivate {
            n: rsa.n().to_vec(),
            e: rsa.e().to_vec(),
            d: rsa.d().to_vec(),
            crt: Some(RsaCrt {
                p: component(rsa.p())?,
                q: component(rsa.q())?,
                dp: component(rsa.dmp1())?,
                dq: component(rsa.dmq1())?,
                qinv: component(rsa.iqmp())?,
            }),
        })
    }

    fn ec_derive_public(
        &self,
        curve: &Curve,
        scalar: &[u8],
    ) -> Result<Vec<u8>> {
        let group = curve.group()?;
        let ctx = BigNumContext::new()?;
        let mut point = EcPoint::new(&group)?;
        let k = secure_bn(scalar)?;
        point.mul_generator(&group, &k, &ctx)?;
        let eckey = ec_private_key(&group, scalar, &point)?;
        let mut ctx = BigNumContext::new()?;
        Ok(eckey.public_key().to_bytes(
            &group,
            PointConversionForm::UNCOMPRESSED,
            &mut ctx,
        )?)
    }

    fn ec_check_public(&self, key: &EcPublic) -> Result<()> {
        ec_public_key(key).map(|_| ())
    }

    fn ec_generate(&self, curve: &Curve) -> Result<EcPrivate> {
        let group = curve.group()?;
        let eckey = EcKey::generate(&group)?;
        let scalar = match zero_pad_to(
            &eckey.private_key().to_vec(),
            curve.order_len(),
        ) {
            Some(s) => s,
            None => return Err(CKR_GENERAL_ERROR)?,
        };
        let mut ctx = BigNumContext::new()?;
        let point = eckey.public_key().to_bytes(
            &group,
            PointConversionForm::UNCOMPRESSED,
            &mut ctx,
        )?;
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
        let group = key.curve.group()?;
        let point = decode_point(&group, &key.point)?;
        let eckey = ec_private_key(&group, &key.scalar, &point)?;
        let sig = EcdsaSig::sign(digest, &eckey)?;
        Ok((sig.r().to_vec(), sig.s().to_vec()))
    }

    fn ecdsa_verify(
        &self,
        key: &EcPublic,
        digest: &[u8],
        r: &[u8],
        s: &[u8],
    ) -> Result<bool> {
        let eckey = ec_public_key(key)?;
        let sig = EcdsaSig::from_private_components(bn(r)?, bn(s)?)?;
        Ok(sig.verify(digest, &eckey)?)
    }

    fn ecdh(
        &self,
        key: &EcPrivate,
        peer: &EcPublic,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let group = key.curve.group()?;
        let peer_point = ec_public_key(peer)?;
        let mut ctx = BigNumContext::new()?;
        let mut shared = EcPoint::new(&group)?;
        let k = secure_bn(&key.scalar)?;
        shared.mul(&group, peer_point.public_key(), &k, &ctx)?;
        let mut x = BigNum::new_secure()?;
        let mut y = BigNum::new_secure()?;
        shared.affine_coordinates_gfp(&group, &mut x, &mut y, &mut ctx)?;
        Ok(Zeroizing::new(
            x.to_vec_padded(i32::try_from(key.curve.field_len())?)?,
        ))
    }

    fn dh_generate(
        &self,
        prime: &[u8],
        base: &[u8],
    ) -> Result<(DhPrivate, Vec<u8>)> {
        let dh = Dh::from_pqg(bn(prime)?, None, bn(base)?)?.generate_key()?;
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
        let mut ctx = BigNumContext::new_secure()?;
        let mut z = BigNum::new_secure()?;
        let y = bn(peer)?;
        let x = secure_bn(&key.value)?;
        let p = bn(&key.prime)?;
        z.mod_exp(&y, &x, &p, &mut ctx)?;
        Ok(Zeroizing::new(z.to_vec()))
    }
}
