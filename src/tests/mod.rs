// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use crate::attribute::Attribute;
use crate::interface::*;
use crate::mechanism::*;
use crate::object::Object;
use crate::{mechanisms, sizeof, void_ptr};

#[macro_use]
mod util;
use util::*;

#[cfg(any(feature = "aes", feature = "des"))]
mod blockcipher;


#[cfg(feature = "ecc")]
mod ecc;


#[cfg(feature = "hash")]
mod hashes;

mod keys;

mod macs;
