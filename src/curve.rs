// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Curve and point codec for short Weierstrass curves
//!
//! Curves are identified by the DER encoded OID stored in CKA_EC_PARAMS
//! and resolved against the table of curves known to OpenSSL, so any named
//! curve the linked library supports is accepted.

use std::fmt;

use crate::error::Result;
use crate::interface::*;
use crate::misc::zero_pad_to;

use openssl::asn1::Asn1Object;
use openssl::ec::EcGroup;
use openssl::nid::Nid;

#[derive(Clone)]
pub struct Curve {
    oid: asn1::ObjectIdentifier,
    nid: Nid,
    order_len: usize,
    field_len: usize,
}

impl fmt::Debug for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Curve")
            .field("oid", &self.oid.to_string())
            .field("nid", &self.nid.as_raw())
            .field("order_len", &self.order_len)
            .finish()
    }
}

impl Curve {
    /// Resolves the curve from the DER encoded namedCurve OID
    ///
    /// The whole buffer must be consumed by the OID.
    pub fn from_params(params: &[u8]) -> Result<Curve> {
        let oid = match asn1::parse_single::<asn1::ObjectIdentifier>(params) {
            Ok(o) => o,
            Err(_) => return Err(CKR_CURVE_NOT_SUPPORTED)?,
        };
        Self::from_oid(oid)
    }

    pub fn from_oid(oid: asn1::ObjectIdentifier) -> Result<Curve> {
        let nid = match Asn1Object::from_str(&oid.to_string()) {
            Ok(obj) => obj.nid(),
            Err(_) => return Err(CKR_CURVE_NOT_SUPPORTED)?,
        };
        if nid == Nid::UNDEF {
            return Err(CKR_CURVE_NOT_SUPPORTED)?;
        }
        let group = match EcGroup::from_curve_name(nid) {
            Ok(g) => g,
            Err(_) => return Err(CKR_CURVE_NOT_SUPPORTED)?,
        };
        let order_bits = usize::try_from(group.order_bits())?;
        let field_bits = usize::try_from(group.degree())?;
        Ok(Curve {
            oid: oid,
            nid: nid,
            order_len: (order_bits + 7) / 8,
            field_len: (field_bits + 7) / 8,
        })
    }

    pub fn oid(&self) -> &asn1::ObjectIdentifier {
        &self.oid
    }

    pub fn nid(&self) -> Nid {
        self.nid
    }

    pub fn group(&self) -> Result<EcGroup> {
        Ok(EcGroup::from_curve_name(self.nid)?)
    }

    /// Byte length of the group order, the width of the private scalar
    /// and of each signature half
    pub fn order_len(&self) -> usize {
        self.order_len
    }

    /// Byte length of a field element, the width of an ECDH secret
    pub fn field_len(&self) -> usize {
        self.field_len
    }

    /// Length of an uncompressed point
    pub fn point_len(&self) -> usize {
        2 * self.field_len + 1
    }

    pub fn signature_len(&self) -> usize {
        2 * self.order_len
    }

    /// DER encoding of the curve OID, as stored in CKA_EC_PARAMS
    pub fn params(&self) -> Result<Vec<u8>> {
        match asn1::write_single(&self.oid) {
            Ok(v) => Ok(v),
            Err(_) => Err(CKR_GENERAL_ERROR)?,
        }
    }

    fn is_point(&self, data: &[u8]) -> bool {
        match data.first() {
            Some(0x04) | Some(0x06) | Some(0x07) => {
                data.len() == self.point_len()
            }
            Some(0x02) | Some(0x03) => data.len() == self.field_len + 1,
            _ => false,
        }
    }
}

/// Extracts the encoded point from a CKA_EC_POINT style value
///
/// The canonical form is a DER OCTET STRING wrapping the point; when
/// `allow_raw` is set a bare point is accepted as well.
pub fn decode_point(
    curve: &Curve,
    data: &[u8],
    allow_raw: bool,
) -> Result<Vec<u8>> {
    if let Ok(inner) = asn1::parse_single::<&[u8]>(data) {
        if curve.is_point(inner) {
            return Ok(inner.to_vec());
        }
    }
    if allow_raw && curve.is_point(data) {
        return Ok(data.to_vec());
    }
    Err(CKR_ATTRIBUTE_VALUE_INVALID)?
}

/// Wraps a point in a DER OCTET STRING
pub fn encode_point(point: &[u8]) -> Result<Vec<u8>> {
    match asn1::write_single(&point) {
        Ok(v) => Ok(v),
        Err(_) => Err(CKR_GENERAL_ERROR)?,
    }
}

/// Packs `(r, s)` into the fixed width `r || s` form, each half zero
/// padded to the order length
pub fn signature_to_fixed(
    r: &[u8],
    s: &[u8],
    order_len: usize,
) -> Result<Vec<u8>> {
    let mut sig = match zero_pad_to(r, order_len) {
        Some(v) => v,
        None => return Err(CKR_GENERAL_ERROR)?,
    };
    match zero_pad_to(s, order_len) {
        Some(v) => sig.extend_from_slice(&v),
        None => return Err(CKR_GENERAL_ERROR)?,
    }
    Ok(sig)
}

/// Splits a fixed width signature into its `(r, s)` halves
pub fn signature_from_fixed(
    sig: &[u8],
    order_len: usize,
) -> Result<(&[u8], &[u8])> {
    if sig.len() != 2 * order_len {
        return Err(CKR_SIGNATURE_LEN_RANGE)?;
    }
    Ok(sig.split_at(order_len))
}
