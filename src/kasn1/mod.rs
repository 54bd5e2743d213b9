// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! This module provides helpers to (de)serialize the key and signature
//! structures exchanged with the primitive library using DER
//! (Distinguished Encoding Rules)

use std::borrow::Cow;

use crate::error::Result;
use crate::interface::*;
use crate::misc::zeromem;

use asn1;

/* Helper routines to use with rust/asn1 */

/// Wrapper object to properly handle DER Encoded
/// Big Unsigned Integers
pub struct DerEncBigUint<'a> {
    data: Cow<'a, [u8]>,
}

impl<'a> DerEncBigUint<'a> {
    /// Creates a DER Encoded Big Uint from a byte buffer
    ///
    /// A zero byte is prepended when the high bit is set so the value is
    /// not read back as negative, redundant leading zeros are skipped.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(CKR_ATTRIBUTE_VALUE_INVALID)?;
        }
        let de = if data[0] & 0x80 == 0x80 {
            let mut v = Vec::with_capacity(data.len() + 1);
            v.push(0);
            v.extend_from_slice(data);
            DerEncBigUint {
                data: Cow::Owned(v),
            }
        } else {
            let mut skip = 0;
            while data[skip] == 0
                && skip + 1 < data.len()
                && data[skip + 1] & 0x80 == 0
            {
                skip += 1;
            }
            DerEncBigUint {
                data: Cow::from(&data[skip..]),
            }
        };
        /* check it works */
        match asn1::BigUint::new(&de.data) {
            Some(_) => Ok(de),
            None => Err(CKR_GENERAL_ERROR)?,
        }
    }

    /// Returns a reference to the internal byte buffer
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Get the BN bytes without possible leading NULL bytes.
    pub fn as_nopad_bytes(&self) -> &[u8] {
        let mut skip = 0;
        for val in self.data.as_ref() {
            if *val != 0 {
                break;
            }
            skip += 1;
        }
        /* zero is encoded as a single byte */
        if skip == self.data.len() {
            skip -= 1;
        }
        &self.data[skip..]
    }
}

impl Drop for DerEncBigUint<'_> {
    fn drop(&mut self) {
        match &self.data {
            Cow::Owned(_) => zeromem(self.data.to_mut()),
            _ => (),
        }
    }
}

impl<'a> asn1::SimpleAsn1Readable<'a> for DerEncBigUint<'a> {
    const TAG: asn1::Tag = asn1::BigUint::TAG;
    fn parse_data(data: &'a [u8]) -> asn1::ParseResult<Self> {
        match DerEncBigUint::new(data) {
            Ok(x) => Ok(x),
            Err(_) => {
                Err(asn1::ParseError::new(asn1::ParseErrorKind::InvalidValue))
            }
        }
    }
}
impl<'a> asn1::SimpleAsn1Writable for DerEncBigUint<'a> {
    const TAG: asn1::Tag = asn1::BigUint::TAG;
    fn write_data(&self, dest: &mut asn1::WriteBuf) -> asn1::WriteResult {
        dest.push_slice(self.as_bytes())
    }
}

/// Represents a ASN.1 OctetString wrapper that wipes owned copies
pub struct DerEncOctetString<'a> {
    data: Cow<'a, [u8]>,
}

impl<'a> DerEncOctetString<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self> {
        Ok(DerEncOctetString {
            data: Cow::from(data),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for DerEncOctetString<'_> {
    fn drop(&mut self) {
        match &self.data {
            Cow::Owned(_) => zeromem(self.data.to_mut()),
            _ => (),
        }
    }
}

impl<'a> asn1::SimpleAsn1Readable<'a> for DerEncOctetString<'a> {
    const TAG: asn1::Tag = asn1::Tag::primitive(0x04);
    fn parse_data(data: &'a [u8]) -> asn1::ParseResult<Self> {
        match DerEncOctetString::new(data) {
            Ok(x) => Ok(x),
            Err(_) => {
                Err(asn1::ParseError::new(asn1::ParseErrorKind::InvalidValue))
            }
        }
    }
}
impl<'a> asn1::SimpleAsn1Writable for DerEncOctetString<'a> {
    const TAG: asn1::Tag = asn1::Tag::primitive(0x04);
    fn write_data(&self, dest: &mut asn1::WriteBuf) -> asn1::WriteResult {
        dest.push_slice(self.as_bytes())
    }
}

type Version = u64;

/// PKCS#1 RSAPublicKey, defined in
/// [RFC 8017](https://www.rfc-editor.org/rfc/rfc8017#appendix-A.1.1)
#[derive(asn1::Asn1Read, asn1::Asn1Write)]
pub struct RsaPublicKey<'a> {
    pub modulus: DerEncBigUint<'a>,
    pub public_exponent: DerEncBigUint<'a>,
}

/// PKCS#1 RSAPrivateKey (two prime version only), defined in
/// [RFC 8017](https://www.rfc-editor.org/rfc/rfc8017#appendix-A.1.2)
#[derive(asn1::Asn1Read, asn1::Asn1Write)]
pub struct RsaPrivateKey<'a> {
    version: Version,
    pub modulus: DerEncBigUint<'a>,
    pub public_exponent: DerEncBigUint<'a>,
    pub private_exponent: DerEncBigUint<'a>,
    pub prime1: DerEncBigUint<'a>,
    pub prime2: DerEncBigUint<'a>,
    pub exponent1: DerEncBigUint<'a>,
    pub exponent2: DerEncBigUint<'a>,
    pub coefficient: DerEncBigUint<'a>,
}

impl<'a> RsaPrivateKey<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        n: &'a [u8],
        e: &'a [u8],
        d: &'a [u8],
        p: &'a [u8],
        q: &'a [u8],
        a: &'a [u8],
        b: &'a [u8],
        c: &'a [u8],
    ) -> Result<RsaPrivateKey<'a>> {
        Ok(RsaPrivateKey {
            version: 0,
            modulus: DerEncBigUint::new(n)?,
            public_exponent: DerEncBigUint::new(e)?,
            private_exponent: DerEncBigUint::new(d)?,
            prime1: DerEncBigUint::new(p)?,
            prime2: DerEncBigUint::new(q)?,
            exponent1: DerEncBigUint::new(a)?,
            exponent2: DerEncBigUint::new(b)?,
            coefficient: DerEncBigUint::new(c)?,
        })
    }
}

/// EC Private Key ASN.1 Object
///
/// Defined in [RFC 5915](https://www.rfc-editor.org/rfc/rfc5915), with the
/// parameters restricted to the namedCurve choice
#[derive(asn1::Asn1Read, asn1::Asn1Write)]
pub struct ECPrivateKey<'a> {
    version: Version,
    pub private_key: DerEncOctetString<'a>,
    #[explicit(0)]
    pub parameters: Option<asn1::ObjectIdentifier>,
    #[explicit(1)]
    pub public_key: Option<asn1::BitString<'a>>,
}

impl<'a> ECPrivateKey<'a> {
    pub fn new(
        private_key: &'a [u8],
        curve: asn1::ObjectIdentifier,
        public_key: Option<&'a [u8]>,
    ) -> Result<ECPrivateKey<'a>> {
        let public_key = match public_key {
            Some(p) => match asn1::BitString::new(p, 0) {
                Some(b) => Some(b),
                None => return Err(CKR_GENERAL_ERROR)?,
            },
            None => None,
        };
        Ok(ECPrivateKey {
            version: 1,
            private_key: DerEncOctetString::new(private_key)?,
            parameters: Some(curve),
            public_key: public_key,
        })
    }
}

/// AlgorithmIdentifier restricted to the forms used for EC keys
#[derive(asn1::Asn1Read, asn1::Asn1Write)]
pub struct EcAlgorithmIdentifier {
    pub algorithm: asn1::ObjectIdentifier,
    pub named_curve: asn1::ObjectIdentifier,
}

/// SubjectPublicKeyInfo for EC public keys, defined in
/// [RFC 5480](https://www.rfc-editor.org/rfc/rfc5480)
#[derive(asn1::Asn1Read, asn1::Asn1Write)]
pub struct EcSubjectPublicKeyInfo<'a> {
    pub algorithm: EcAlgorithmIdentifier,
    pub subject_public_key: asn1::BitString<'a>,
}

impl<'a> EcSubjectPublicKeyInfo<'a> {
    pub fn new(
        curve: asn1::ObjectIdentifier,
        point: &'a [u8],
    ) -> Result<EcSubjectPublicKeyInfo<'a>> {
        let subject_public_key = match asn1::BitString::new(point, 0) {
            Some(b) => b,
            None => return Err(CKR_GENERAL_ERROR)?,
        };
        Ok(EcSubjectPublicKeyInfo {
            algorithm: EcAlgorithmIdentifier {
                algorithm: oid::EC_PUBLIC_KEY,
                named_curve: curve,
            },
            subject_public_key: subject_public_key,
        })
    }
}

/// ECDSA-Sig-Value, defined in
/// [RFC 3279](https://www.rfc-editor.org/rfc/rfc3279#section-2.2.3)
#[derive(asn1::Asn1Read, asn1::Asn1Write)]
pub struct EcdsaSignature<'a> {
    pub r: DerEncBigUint<'a>,
    pub s: DerEncBigUint<'a>,
}

/// AlgorithmIdentifier of a hash function inside a DigestInfo
#[derive(asn1::Asn1Read, asn1::Asn1Write)]
pub struct HashAlgorithmIdentifier {
    pub algorithm: asn1::ObjectIdentifier,
    pub parameters: Option<asn1::Null>,
}

/// DigestInfo used by EMSA-PKCS1-v1_5, defined in
/// [RFC 8017](https://www.rfc-editor.org/rfc/rfc8017#section-9.2)
#[derive(asn1::Asn1Read, asn1::Asn1Write)]
pub struct DigestInfo<'a> {
    pub digest_algorithm: HashAlgorithmIdentifier,
    pub digest: &'a [u8],
}

impl<'a> DigestInfo<'a> {
    pub fn new(
        algorithm: asn1::ObjectIdentifier,
        digest: &'a [u8],
    ) -> DigestInfo<'a> {
        DigestInfo {
            digest_algorithm: HashAlgorithmIdentifier {
                algorithm: algorithm,
                parameters: Some(()),
            },
            digest: digest,
        }
    }
}

pub mod oid;
