// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Typed key attributes
//!
//! Key objects reach the mechanism layer as bags of `CK_ATTRIBUTE`s. Each
//! one is copied into an [Attribute] whose [AttrType] is taken from a
//! small map covering the attributes the key converters understand.

use std::cmp::Ordering;

use crate::error::Result;
use crate::interface::*;
use crate::misc::zeromem;

/// List of attribute types we understand
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AttrType {
    BoolType,
    NumType,
    StringType,
    BytesType,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Attrmap<'a> {
    id: CK_ULONG,
    name: &'a str,
    atype: AttrType,
}

impl PartialOrd for Attrmap<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Attrmap<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Attrmap<'_> {
    /// The map is sorted by id
    pub fn search_by_id(id: CK_ULONG) -> Option<&'static Attrmap<'static>> {
        match &ATTRMAP.binary_search(&Attrmap {
            id: id,
            name: "",
            atype: AttrType::StringType,
        }) {
            Ok(i) => Some(&ATTRMAP[*i]),
            Err(_) => None,
        }
    }
}

macro_rules! attrmap_element {
    ($id:expr; as $attrtype:ident) => {
        Attrmap {
            id: $id,
            name: stringify!($id),
            atype: AttrType::$attrtype,
        }
    };
}

/// The attributes the key converters read or emit, sorted by id
static ATTRMAP: [Attrmap<'_>; 31] = [
    attrmap_element!(CKA_CLASS; as NumType),
    attrmap_element!(CKA_TOKEN; as BoolType),
    attrmap_element!(CKA_PRIVATE; as BoolType),
    attrmap_element!(CKA_LABEL; as StringType),
    attrmap_element!(CKA_VALUE; as BytesType),
    attrmap_element!(CKA_KEY_TYPE; as NumType),
    attrmap_element!(CKA_ID; as BytesType),
    attrmap_element!(CKA_SENSITIVE; as BoolType),
    attrmap_element!(CKA_ENCRYPT; as BoolType),
    attrmap_element!(CKA_DECRYPT; as BoolType),
    attrmap_element!(CKA_WRAP; as BoolType),
    attrmap_element!(CKA_UNWRAP; as BoolType),
    attrmap_element!(CKA_SIGN; as BoolType),
    attrmap_element!(CKA_VERIFY; as BoolType),
    attrmap_element!(CKA_DERIVE; as BoolType),
    attrmap_element!(CKA_MODULUS; as BytesType),
    attrmap_element!(CKA_MODULUS_BITS; as NumType),
    attrmap_element!(CKA_PUBLIC_EXPONENT; as BytesType),
    attrmap_element!(CKA_PRIVATE_EXPONENT; as BytesType),
    attrmap_element!(CKA_PRIME_1; as BytesType),
    attrmap_element!(CKA_PRIME_2; as BytesType),
    attrmap_element!(CKA_EXPONENT_1; as BytesType),
    attrmap_element!(CKA_EXPONENT_2; as BytesType),
    attrmap_element!(CKA_COEFFICIENT; as BytesType),
    attrmap_element!(CKA_PRIME; as BytesType),
    attrmap_element!(CKA_BASE; as BytesType),
    attrmap_element!(CKA_VALUE_BITS; as NumType),
    attrmap_element!(CKA_VALUE_LEN; as NumType),
    attrmap_element!(CKA_LOCAL; as BoolType),
    attrmap_element!(CKA_EC_PARAMS; as BytesType),
    attrmap_element!(CKA_EC_POINT; as BytesType),
];

/* unknown attributes are carried as opaque bytes */
fn lookup_attrtype(id: CK_ULONG) -> AttrType {
    match Attrmap::search_by_id(id) {
        Some(a) => a.atype,
        None => AttrType::BytesType,
    }
}

/// A Rust native, typed attribute that holds the attribute value
///
/// The value buffer is wiped when the attribute is dropped, so secret
/// components never outlive the attribute that carried them.
#[derive(Debug, Clone)]
pub struct Attribute {
    ck_type: CK_ULONG,
    attrtype: AttrType,
    value: Vec<u8>,
}

impl Drop for Attribute {
    fn drop(&mut self) {
        zeromem(self.value.as_mut_slice());
    }
}

impl Attribute {
    pub fn get_type(&self) -> CK_ULONG {
        self.ck_type
    }

    pub fn get_attrtype(&self) -> AttrType {
        self.attrtype
    }

    /// Printable `CKA_*` name, or the numeric id when unknown
    pub fn name(&self) -> String {
        match Attrmap::search_by_id(self.ck_type) {
            Some(a) => a.name.to_string(),
            None => self.ck_type.to_string(),
        }
    }

    pub fn to_bool(&self) -> Result<bool> {
        if self.attrtype != AttrType::BoolType {
            return Err(CKR_ATTRIBUTE_TYPE_INVALID)?;
        }
        if self.value.len() != 1 {
            return Err(CKR_ATTRIBUTE_VALUE_INVALID)?;
        }
        Ok(self.value[0] != 0)
    }

    /// Numeric attributes are stored in native byte order
    pub fn to_ulong(&self) -> Result<CK_ULONG> {
        if self.attrtype != AttrType::NumType {
            return Err(CKR_ATTRIBUTE_TYPE_INVALID)?;
        }
        match <[u8; CK_ULONG_SIZE]>::try_from(self.value.as_slice()) {
            Ok(b) => Ok(CK_ULONG::from_ne_bytes(b)),
            Err(_) => Err(CKR_ATTRIBUTE_VALUE_INVALID)?,
        }
    }

    pub fn to_string(&self) -> Result<String> {
        if self.attrtype != AttrType::StringType {
            return Err(CKR_ATTRIBUTE_TYPE_INVALID)?;
        }
        match std::str::from_utf8(&self.value) {
            Ok(s) => Ok(s.to_string()),
            Err(_) => Err(CKR_ATTRIBUTE_VALUE_INVALID)?,
        }
    }

    pub fn to_bytes(&self) -> Result<&Vec<u8>> {
        if self.attrtype != AttrType::BytesType {
            return Err(CKR_ATTRIBUTE_TYPE_INVALID)?;
        }
        Ok(&self.value)
    }

    pub fn from_bool(t: CK_ULONG, val: bool) -> Attribute {
        Attribute {
            ck_type: t,
            attrtype: AttrType::BoolType,
            value: vec![if val { 1u8 } else { 0u8 }],
        }
    }

    pub fn from_ulong(t: CK_ULONG, val: CK_ULONG) -> Attribute {
        Attribute {
            ck_type: t,
            attrtype: AttrType::NumType,
            value: Vec::from(val.to_ne_bytes()),
        }
    }

    pub fn from_string(t: CK_ULONG, val: String) -> Attribute {
        Attribute {
            ck_type: t,
            attrtype: AttrType::StringType,
            value: Vec::from(val.as_bytes()),
        }
    }

    /// Takes ownership of the value buffer
    pub fn from_bytes(t: CK_ULONG, val: Vec<u8>) -> Attribute {
        Attribute {
            ck_type: t,
            attrtype: AttrType::BytesType,
            value: val,
        }
    }

    /// Creates an attribute from a raw CK_ATTRIBUTE as found in a
    /// caller template, typing it from the attribute map
    ///
    /// # Safety
    ///
    /// `attr.pValue` must point to `attr.ulValueLen` readable bytes.
    pub unsafe fn from_ck_attr(attr: &CK_ATTRIBUTE) -> Result<Attribute> {
        let len = usize::try_from(attr.ulValueLen)?;
        let value = if attr.pValue.is_null() || len == 0 {
            Vec::new()
        } else {
            std::slice::from_raw_parts(attr.pValue as *const u8, len).to_vec()
        };
        let attrtype = lookup_attrtype(attr.type_);
        match attrtype {
            AttrType::BoolType if value.len() != 1 => {
                Err(CKR_ATTRIBUTE_VALUE_INVALID)?
            }
            AttrType::NumType if value.len() != CK_ULONG_SIZE => {
                Err(CKR_ATTRIBUTE_VALUE_INVALID)?
            }
            _ => Ok(Attribute {
                ck_type: attr.type_,
                attrtype: attrtype,
                value: value,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attrmap_sorted() {
        for w in ATTRMAP.windows(2) {
            assert!(w[0].id < w[1].id, "{} out of order", w[1].name);
        }
    }

    #[test]
    fn test_typed_access() {
        let a = Attribute::from_ulong(CKA_VALUE_LEN, 24);
        assert_eq!(a.to_ulong().unwrap(), 24);
        assert_eq!(a.to_bytes().unwrap_err().rv(), CKR_ATTRIBUTE_TYPE_INVALID);
        assert_eq!(a.name(), "CKA_VALUE_LEN");

        let b = Attribute::from_bool(CKA_LOCAL, true);
        assert!(b.to_bool().unwrap());

        let c = Attribute::from_bytes(CKA_EC_POINT, vec![0x04]);
        assert_eq!(c.get_attrtype(), AttrType::BytesType);
    }

    #[test]
    fn test_from_ck_attr() {
        let modulus = [0xc5u8, 0x01, 0x02];
        let raw = CK_ATTRIBUTE {
            type_: CKA_MODULUS,
            pValue: modulus.as_ptr() as CK_VOID_PTR,
            ulValueLen: modulus.len() as CK_ULONG,
        };
        let a = unsafe { Attribute::from_ck_attr(&raw) }.unwrap();
        assert_eq!(a.to_bytes().unwrap().as_slice(), &modulus);

        let bad = CK_ATTRIBUTE {
            type_: CKA_CLASS,
            pValue: modulus.as_ptr() as CK_VOID_PTR,
            ulValueLen: modulus.len() as CK_ULONG,
        };
        let e = unsafe { Attribute::from_ck_attr(&bad) }.unwrap_err();
        assert_eq!(e.rv(), CKR_ATTRIBUTE_VALUE_INVALID);
    }
}
