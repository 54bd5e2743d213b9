// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Minimal key object used as the attribute boundary with the object
//! manager: an ordered set of [Attribute]s unique by type.

use crate::attribute::{AttrType, Attribute};
use crate::error::{Error, Result};
use crate::interface::*;

/// Helper macro that generates methods to retrieve attributes
/// values of a specific type from objects
macro_rules! attr_as_type {
    (make $name:ident; with $r:ty; $atype:ident; via $conv:ident) => {
        #[doc = concat!("Returns the value of the attribute as a `", stringify!($r), "`")]
        pub fn $name(&self, t: CK_ULONG) -> Result<$r> {
            for attr in &self.attributes {
                if attr.get_type() == t {
                    if attr.get_attrtype() != AttrType::$atype {
                        return Err(CKR_ATTRIBUTE_TYPE_INVALID)?;
                    }
                    return attr.$conv();
                }
            }
            Err(Error::not_found(t.to_string()))
        }
    };
}

/// Generic container for key objects and key templates
///
/// Insertion order is preserved so that generated attributes come back
/// to the caller in the order they were produced.
#[derive(Debug, Clone)]
pub struct Object {
    class: CK_OBJECT_CLASS,
    attributes: Vec<Attribute>,
}

impl Object {
    /// Creates a new empty Object of the given class
    pub fn new(class: CK_OBJECT_CLASS) -> Object {
        Object {
            class: class,
            attributes: vec![Attribute::from_ulong(CKA_CLASS, class)],
        }
    }

    /// Builds an object out of a raw caller template
    ///
    /// # Safety
    ///
    /// Every attribute in `template` must reference a valid buffer.
    pub unsafe fn from_template(template: &[CK_ATTRIBUTE]) -> Result<Object> {
        let mut obj = Object {
            class: CK_UNAVAILABLE_INFORMATION,
            attributes: Vec::with_capacity(template.len()),
        };
        for a in template {
            obj.set_attr(Attribute::from_ck_attr(a)?)?;
        }
        Ok(obj)
    }

    pub fn get_class(&self) -> CK_OBJECT_CLASS {
        self.class
    }

    /// Returns the key type, CK_UNAVAILABLE_INFORMATION if unset
    pub fn get_key_type(&self) -> CK_KEY_TYPE {
        self.get_attr_as_ulong(CKA_KEY_TYPE)
            .unwrap_or(CK_UNAVAILABLE_INFORMATION)
    }

    pub fn get_attr(&self, ck_type: CK_ULONG) -> Option<&Attribute> {
        self.attributes.iter().find(|r| r.get_type() == ck_type)
    }

    /// Inserts or replaces an attribute, taking ownership of its value
    pub fn set_attr(&mut self, a: Attribute) -> Result<()> {
        let atype = a.get_type();
        if atype == CKA_CLASS {
            self.class = a.to_ulong()?;
        }
        match self.attributes.iter().position(|r| r.get_type() == atype) {
            Some(idx) => self.attributes[idx] = a,
            None => self.attributes.push(a),
        }
        Ok(())
    }

    /// Deletes an attribute from the object by attribute id
    pub fn del_attr(&mut self, ck_type: CK_ULONG) {
        self.attributes.retain(|a| a.get_type() != ck_type);
    }

    /// Gets a reference to the internal vector of object attributes
    pub fn get_attributes(&self) -> &Vec<Attribute> {
        &self.attributes
    }

    attr_as_type! {make get_attr_as_bool; with bool; BoolType; via to_bool}
    attr_as_type! {make get_attr_as_ulong; with CK_ULONG; NumType; via to_ulong}
    attr_as_type! {make get_attr_as_string; with String; StringType; via to_string}
    attr_as_type! {make get_attr_as_bytes; with &Vec<u8>; BytesType; via to_bytes}

    /// Like `get_attr_as_bytes` but a present and empty value is an
    /// error as well
    pub fn get_attr_as_bytes_not_empty(&self, t: CK_ULONG) -> Result<&Vec<u8>> {
        let v = self.get_attr_as_bytes(t)?;
        if v.is_empty() {
            return Err(CKR_ATTRIBUTE_VALUE_INVALID)?;
        }
        Ok(v)
    }

    /// Checks the object is a key of the expected class and type that
    /// allows the requested operation
    pub fn check_key_ops(
        &self,
        class: CK_OBJECT_CLASS,
        ktype: CK_KEY_TYPE,
        op: CK_ATTRIBUTE_TYPE,
    ) -> Result<()> {
        if self.class != class {
            return Err(CKR_KEY_TYPE_INCONSISTENT)?;
        }
        if ktype != CK_UNAVAILABLE_INFORMATION && self.get_key_type() != ktype
        {
            return Err(CKR_KEY_TYPE_INCONSISTENT)?;
        }
        /* a missing usage flag means the caller did not restrict it */
        match self.get_attr_as_bool(op) {
            Ok(false) => Err(CKR_KEY_FUNCTION_NOT_PERMITTED)?,
            Ok(true) => Ok(()),
            Err(e) if e.attr_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Maps a missing or empty required attribute to `CKR_TEMPLATE_INCOMPLETE`
pub fn required_bytes(obj: &Object, t: CK_ULONG) -> Result<&Vec<u8>> {
    match obj.get_attr_as_bytes_not_empty(t) {
        Ok(v) => Ok(v),
        Err(e) => {
            if e.attr_not_found() || e.rv() == CKR_ATTRIBUTE_VALUE_INVALID {
                Err(CKR_TEMPLATE_INCOMPLETE)?
            } else {
                Err(e)
            }
        }
    }
}
