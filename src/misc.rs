// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

/* misc utilities that do not really belong in any module */

use zeroize::Zeroize;

#[macro_export]
macro_rules! map_err {
    ($map:expr, $err:tt) => {{
        $map.map_err(|e| $crate::error::Error::ck_rv_from_error($err, e))
    }};
}

#[macro_export]
macro_rules! bytes_to_vec {
    ($ptr:expr, $len:expr) => {{
        let ptr = $ptr as *const u8;
        let size = usize::try_from($len)?;
        if ptr.is_null() || size == 0 {
            Vec::new()
        } else {
            let mut v = Vec::<u8>::with_capacity(size);
            unsafe {
                std::ptr::copy_nonoverlapping(ptr, v.as_mut_ptr(), size);
                v.set_len(size);
            }
            v
        }
    }};
}

#[macro_export]
macro_rules! void_ptr {
    ($ptr:expr) => {
        $ptr as *const _ as CK_VOID_PTR
    };
}

#[macro_export]
macro_rules! cast_params {
    ($mech:expr, $params:ty) => {{
        let Ok(len) = usize::try_from($mech.ulParameterLen) else {
            return Err(CKR_ARGUMENTS_BAD)?;
        };
        if len != std::mem::size_of::<$params>() || $mech.pParameter.is_null()
        {
            return Err(CKR_MECHANISM_PARAM_INVALID)?;
        }
        unsafe { std::ptr::read_unaligned($mech.pParameter as *const $params) }
    }};
}

#[macro_export]
macro_rules! sizeof {
    ($type:ty) => {
        CK_ULONG::try_from(std::mem::size_of::<$type>()).unwrap_or(0)
    };
}

/// Wipes a buffer in a way the compiler can not optimize away
pub fn zeromem(mem: &mut [u8]) {
    mem.zeroize();
}

/// Strips leading zero bytes, never returning less than nothing
pub fn strip_leading_zeros(buf: &[u8]) -> &[u8] {
    let skip = buf.iter().take_while(|b| **b == 0).count();
    &buf[skip..]
}

/// Left pads `src` with zeros into a freshly allocated buffer of `len`
/// bytes; fails if the value does not fit
pub fn zero_pad_to(src: &[u8], len: usize) -> Option<Vec<u8>> {
    let src = strip_leading_zeros(src);
    if src.len() > len {
        return None;
    }
    let mut out = vec![0u8; len];
    out[(len - src.len())..].copy_from_slice(src);
    Some(out)
}

/// XORs `src` into `dst` for the length of the shorter of the two
pub fn xor_into(dst: &mut [u8], src: &[u8]) {
    dst.iter_mut().zip(src.iter()).for_each(|(d, s)| *d ^= *s);
}
