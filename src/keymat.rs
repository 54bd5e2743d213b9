// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Conversion between attribute based key objects and the typed key
//! material handed to the primitive library backends
//!
//! Key material lives for the duration of a single operation; every
//! secret component is wiped when the holding structure is dropped.

use crate::attribute::Attribute;
use crate::curve::{decode_point, encode_point, Curve};
use crate::error::Result;
use crate::interface::*;
use crate::misc::{strip_leading_zeros, zero_pad_to};
use crate::object::{required_bytes, Object};
use crate::ossl::backend;

use zeroize::Zeroize;

#[derive(Debug, Clone)]
pub struct RsaPublic {
    pub n: Vec<u8>,
    pub e: Vec<u8>,
}

impl RsaPublic {
    /// Modulus length in bytes, the unit of every RSA buffer
    pub fn modulus_len(&self) -> usize {
        strip_leading_zeros(&self.n).len()
    }
}

/// The five CRT components, always all present together
#[derive(Debug, Clone)]
pub struct RsaCrt {
    pub p: Vec<u8>,
    pub q: Vec<u8>,
    pub dp: Vec<u8>,
    pub dq: Vec<u8>,
    pub qinv: Vec<u8>,
}

impl Drop for RsaCrt {
    fn drop(&mut self) {
        self.p.zeroize();
        self.q.zeroize();
        self.dp.zeroize();
        self.dq.zeroize();
        self.qinv.zeroize();
    }
}

#[derive(Debug, Clone)]
pub struct RsaPrivate {
    pub n: Vec<u8>,
    pub e: Vec<u8>,
    pub d: Vec<u8>,
    pub crt: Option<RsaCrt>,
}

impl Drop for RsaPrivate {
    fn drop(&mut self) {
        self.d.zeroize();
    }
}

impl RsaPrivate {
    pub fn modulus_len(&self) -> usize {
        strip_leading_zeros(&self.n).len()
    }

    pub fn public(&self) -> RsaPublic {
        RsaPublic {
            n: self.n.clone(),
            e: self.e.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EcPublic {
    pub curve: Curve,
    /// Encoded point, without the DER wrapping
    pub point: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct EcPrivate {
    pub curve: Curve,
    /// Private scalar, zero padded to the order length
    pub scalar: Vec<u8>,
    /// Public point computed from the scalar
    pub point: Vec<u8>,
}

impl Drop for EcPrivate {
    fn drop(&mut self) {
        self.scalar.zeroize();
    }
}

#[derive(Debug, Clone)]
pub struct DhPublic {
    pub prime: Vec<u8>,
    pub base: Vec<u8>,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct DhPrivate {
    pub prime: Vec<u8>,
    pub base: Vec<u8>,
    pub value: Vec<u8>,
}

impl Drop for DhPrivate {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

/// Raw symmetric key bytes
#[derive(Debug, Clone)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub fn new(v: Vec<u8>) -> SecretBytes {
        SecretBytes(v)
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Native key material, built on demand from a key object
#[derive(Debug)]
pub enum KeyMaterial {
    RsaPublic(RsaPublic),
    RsaPrivate(RsaPrivate),
    EcPublic(EcPublic),
    EcPrivate(EcPrivate),
    DhPublic(DhPublic),
    DhPrivate(DhPrivate),
    Symmetric(SecretBytes),
}

impl KeyMaterial {
    /// Converts `obj` according to its class and key type
    pub fn from_object(obj: &Object) -> Result<KeyMaterial> {
        match (obj.get_class(), obj.get_key_type()) {
            (CKO_PUBLIC_KEY, CKK_RSA) => {
                Ok(KeyMaterial::RsaPublic(rsa_public_from_object(obj)?))
            }
            (CKO_PRIVATE_KEY, CKK_RSA) => {
                Ok(KeyMaterial::RsaPrivate(rsa_private_from_object(obj)?))
            }
            (CKO_PUBLIC_KEY, CKK_EC) => {
                Ok(KeyMaterial::EcPublic(ec_public_from_object(obj, false)?))
            }
            (CKO_PRIVATE_KEY, CKK_EC) => {
                Ok(KeyMaterial::EcPrivate(ec_private_from_object(obj)?))
            }
            (CKO_PUBLIC_KEY, CKK_DH) => {
                Ok(KeyMaterial::DhPublic(dh_public_from_object(obj)?))
            }
            (CKO_PRIVATE_KEY, CKK_DH) => {
                Ok(KeyMaterial::DhPrivate(dh_private_from_object(obj)?))
            }
            (CKO_SECRET_KEY, _) => {
                Ok(KeyMaterial::Symmetric(secret_from_object(obj)?))
            }
            _ => Err(CKR_KEY_TYPE_INCONSISTENT)?,
        }
    }
}

pub fn rsa_public_from_object(obj: &Object) -> Result<RsaPublic> {
    Ok(RsaPublic {
        n: required_bytes(obj, CKA_MODULUS)?.clone(),
        e: required_bytes(obj, CKA_PUBLIC_EXPONENT)?.clone(),
    })
}

/// Reads an RSA private key; CRT components must be all present or all
/// absent
pub fn rsa_private_from_object(obj: &Object) -> Result<RsaPrivate> {
    let n = required_bytes(obj, CKA_MODULUS)?.clone();
    let e = required_bytes(obj, CKA_PUBLIC_EXPONENT)?.clone();
    let d = required_bytes(obj, CKA_PRIVATE_EXPONENT)?.clone();

    let crt = match obj.get_attr_as_bytes_not_empty(CKA_PRIME_1) {
        Ok(p) => {
            let companion = |t| match obj.get_attr_as_bytes_not_empty(t) {
                Ok(v) => Ok(v.clone()),
                Err(_) => Err(CKR_TEMPLATE_INCONSISTENT),
            };
            Some(RsaCrt {
                p: p.clone(),
                q: companion(CKA_PRIME_2)?,
                dp: companion(CKA_EXPONENT_1)?,
                dq: companion(CKA_EXPONENT_2)?,
                qinv: companion(CKA_COEFFICIENT)?,
            })
        }
        Err(_) => {
            for t in [CKA_PRIME_2, CKA_EXPONENT_1, CKA_EXPONENT_2, CKA_COEFFICIENT]
            {
                if obj.get_attr_as_bytes_not_empty(t).is_ok() {
                    return Err(CKR_TEMPLATE_INCONSISTENT)?;
                }
            }
            None
        }
    };
    Ok(RsaPrivate {
        n: n,
        e: e,
        d: d,
        crt: crt,
    })
}

/// Stores generated RSA components into the public and private templates
pub fn rsa_store_generated(
    key: &RsaPrivate,
    pubkey: &mut Object,
    privkey: &mut Object,
) -> Result<()> {
    let crt = match &key.crt {
        Some(c) => c,
        None => return Err(CKR_GENERAL_ERROR)?,
    };
    pubkey.set_attr(Attribute::from_bytes(CKA_MODULUS, key.n.clone()))?;
    pubkey
        .set_attr(Attribute::from_bytes(CKA_PUBLIC_EXPONENT, key.e.clone()))?;
    pubkey.set_attr(Attribute::from_bool(CKA_LOCAL, true))?;

    privkey.set_attr(Attribute::from_bytes(CKA_MODULUS, key.n.clone()))?;
    privkey
        .set_attr(Attribute::from_bytes(CKA_PUBLIC_EXPONENT, key.e.clone()))?;
    privkey
        .set_attr(Attribute::from_bytes(CKA_PRIVATE_EXPONENT, key.d.clone()))?;
    privkey.set_attr(Attribute::from_bytes(CKA_PRIME_1, crt.p.clone()))?;
    privkey.set_attr(Attribute::from_bytes(CKA_PRIME_2, crt.q.clone()))?;
    privkey.set_attr(Attribute::from_bytes(CKA_EXPONENT_1, crt.dp.clone()))?;
    privkey.set_attr(Attribute::from_bytes(CKA_EXPONENT_2, crt.dq.clone()))?;
    privkey
        .set_attr(Attribute::from_bytes(CKA_COEFFICIENT, crt.qinv.clone()))?;
    privkey.set_attr(Attribute::from_bool(CKA_LOCAL, true))?;
    Ok(())
}

pub fn curve_from_object(obj: &Object) -> Result<Curve> {
    Curve::from_params(required_bytes(obj, CKA_EC_PARAMS)?)
}

/// Reads an EC public key and checks the point lies on the curve
///
/// `allow_raw` accepts a bare point in place of the DER OCTET STRING.
pub fn ec_public_from_object(obj: &Object, allow_raw: bool) -> Result<EcPublic> {
    let curve = curve_from_object(obj)?;
    let point = decode_point(&curve, required_bytes(obj, CKA_EC_POINT)?, allow_raw)?;
    ec_public_from_point(curve, point)
}

/// Builds validated EC public key material out of a decoded point
pub fn ec_public_from_point(curve: Curve, point: Vec<u8>) -> Result<EcPublic> {
    let key = EcPublic {
        curve: curve,
        point: point,
    };
    backend().ec_check_public(&key)?;
    Ok(key)
}

/// Reads an EC private key, computing and cross-checking its public point
pub fn ec_private_from_object(obj: &Object) -> Result<EcPrivate> {
    let curve = curve_from_object(obj)?;
    let value = required_bytes(obj, CKA_VALUE)?;
    let scalar = match zero_pad_to(value, curve.order_len()) {
        Some(s) => s,
        None => return Err(CKR_ATTRIBUTE_VALUE_INVALID)?,
    };
    let point = backend().ec_derive_public(&curve, &scalar)?;
    Ok(EcPrivate {
        curve: curve,
        scalar: scalar,
        point: point,
    })
}

/// Stores a generated EC key pair into the public and private templates
pub fn ec_store_generated(
    key: &EcPrivate,
    params: &[u8],
    pubkey: &mut Object,
    privkey: &mut Object,
) -> Result<()> {
    pubkey.set_attr(Attribute::from_bytes(
        CKA_EC_POINT,
        encode_point(&key.point)?,
    ))?;
    pubkey.set_attr(Attribute::from_bool(CKA_LOCAL, true))?;

    privkey.set_attr(Attribute::from_bytes(CKA_VALUE, key.scalar.clone()))?;
    privkey.set_attr(Attribute::from_bytes(CKA_EC_PARAMS, params.to_vec()))?;
    privkey.set_attr(Attribute::from_bool(CKA_LOCAL, true))?;
    Ok(())
}

pub fn dh_public_from_object(obj: &Object) -> Result<DhPublic> {
    Ok(DhPublic {
        prime: required_bytes(obj, CKA_PRIME)?.clone(),
        base: required_bytes(obj, CKA_BASE)?.clone(),
        value: required_bytes(obj, CKA_VALUE)?.clone(),
    })
}

pub fn dh_private_from_object(obj: &Object) -> Result<DhPrivate> {
    Ok(DhPrivate {
        prime: required_bytes(obj, CKA_PRIME)?.clone(),
        base: required_bytes(obj, CKA_BASE)?.clone(),
        value: required_bytes(obj, CKA_VALUE)?.clone(),
    })
}

/// Stores a generated DH key pair; prime and base are echoed into the
/// private template so a later derivation is self contained
pub fn dh_store_generated(
    key: &DhPrivate,
    public_value: &[u8],
    pubkey: &mut Object,
    privkey: &mut Object,
) -> Result<()> {
    pubkey.set_attr(Attribute::from_bytes(CKA_VALUE, public_value.to_vec()))?;
    pubkey.set_attr(Attribute::from_bool(CKA_LOCAL, true))?;

    let bits = CK_ULONG::try_from(key.value.len() * 8)?;
    privkey.set_attr(Attribute::from_bytes(CKA_VALUE, key.value.clone()))?;
    privkey.set_attr(Attribute::from_ulong(CKA_VALUE_BITS, bits))?;
    privkey.set_attr(Attribute::from_bytes(CKA_PRIME, key.prime.clone()))?;
    privkey.set_attr(Attribute::from_bytes(CKA_BASE, key.base.clone()))?;
    privkey.set_attr(Attribute::from_bool(CKA_LOCAL, true))?;
    Ok(())
}

/// Stores a derived secret into `template` as `CKA_VALUE`
///
/// When the template asks for a `CKA_VALUE_LEN` shorter than the raw
/// secret only its trailing bytes are kept; a longer request can not be
/// satisfied without a KDF.
pub fn store_derived_secret(template: &mut Object, secret: &[u8]) -> Result<()> {
    let keylen = match template.get_attr_as_ulong(CKA_VALUE_LEN) {
        Ok(l) => usize::try_from(l)?,
        Err(e) if e.attr_not_found() => secret.len(),
        Err(e) => return Err(e),
    };
    if keylen == 0 || keylen > secret.len() {
        return Err(CKR_TEMPLATE_INCONSISTENT)?;
    }
    let value = secret[(secret.len() - keylen)..].to_vec();
    template.set_attr(Attribute::from_bytes(CKA_VALUE, value))?;
    template.set_attr(Attribute::from_ulong(
        CKA_VALUE_LEN,
        CK_ULONG::try_from(keylen)?,
    ))?;
    Ok(())
}

pub fn secret_from_object(obj: &Object) -> Result<SecretBytes> {
    Ok(SecretBytes::new(required_bytes(obj, CKA_VALUE)?.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsa_obj(class: CK_OBJECT_CLASS) -> Object {
        let mut obj = Object::new(class);
        obj.set_attr(Attribute::from_ulong(CKA_KEY_TYPE, CKK_RSA))
            .unwrap();
        obj.set_attr(Attribute::from_bytes(CKA_MODULUS, vec![0x00, 0xc1, 0x01]))
            .unwrap();
        obj.set_attr(Attribute::from_bytes(
            CKA_PUBLIC_EXPONENT,
            vec![0x01, 0x00, 0x01],
        ))
        .unwrap();
        obj
    }

    #[test]
    fn test_rsa_conversion() {
        let obj = rsa_obj(CKO_PUBLIC_KEY);
        match KeyMaterial::from_object(&obj).unwrap() {
            KeyMaterial::RsaPublic(k) => assert_eq!(k.modulus_len(), 2),
            _ => panic!("wrong key material"),
        }

        let mut obj = rsa_obj(CKO_PRIVATE_KEY);
        assert_eq!(
            rsa_private_from_object(&obj).unwrap_err().rv(),
            CKR_TEMPLATE_INCOMPLETE
        );
        obj.set_attr(Attribute::from_bytes(CKA_PRIVATE_EXPONENT, vec![3]))
            .unwrap();
        assert!(rsa_private_from_object(&obj).unwrap().crt.is_none());

        /* partial CRT data */
        obj.set_attr(Attribute::from_bytes(CKA_PRIME_1, vec![5])).unwrap();
        obj.set_attr(Attribute::from_bytes(CKA_PRIME_2, vec![7])).unwrap();
        assert_eq!(
            rsa_private_from_object(&obj).unwrap_err().rv(),
            CKR_TEMPLATE_INCONSISTENT
        );
        obj.del_attr(CKA_PRIME_1);
        assert_eq!(
            rsa_private_from_object(&obj).unwrap_err().rv(),
            CKR_TEMPLATE_INCONSISTENT
        );

        obj.set_attr(Attribute::from_bytes(CKA_PRIME_1, vec![5])).unwrap();
        obj.set_attr(Attribute::from_bytes(CKA_EXPONENT_1, vec![1]))
            .unwrap();
        obj.set_attr(Attribute::from_bytes(CKA_EXPONENT_2, vec![1]))
            .unwrap();
        obj.set_attr(Attribute::from_bytes(CKA_COEFFICIENT, vec![3]))
            .unwrap();
        let key = rsa_private_from_object(&obj).unwrap();
        assert_eq!(key.crt.as_ref().unwrap().q, vec![7]);
        /* plain form stays available */
        assert_eq!(key.d, vec![3]);
    }

    #[test]
    fn test_ec_public_validation() {
        let mut obj = Object::new(CKO_PUBLIC_KEY);
        obj.set_attr(Attribute::from_ulong(CKA_KEY_TYPE, CKK_EC)).unwrap();
        obj.set_attr(Attribute::from_bytes(
            CKA_EC_PARAMS,
            hex::decode("06082a8648ce3d030107").unwrap(),
        ))
        .unwrap();
        /* well formed encoding of a point that is not on the curve */
        let mut point = vec![0x04u8];
        point.extend_from_slice(&[0x01u8; 64]);
        obj.set_attr(Attribute::from_bytes(
            CKA_EC_POINT,
            encode_point(&point).unwrap(),
        ))
        .unwrap();
        assert_eq!(
            ec_public_from_object(&obj, false).unwrap_err().rv(),
            CKR_PUBLIC_KEY_INVALID
        );

        obj.set_attr(Attribute::from_bytes(
            CKA_EC_PARAMS,
            hex::decode("06032b0601").unwrap(),
        ))
        .unwrap();
        assert_eq!(
            ec_public_from_object(&obj, false).unwrap_err().rv(),
            CKR_CURVE_NOT_SUPPORTED
        );
    }
}
