// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! RSA block encodings from [RFC 8017](https://www.rfc-editor.org/rfc/rfc8017)
//!
//! Every function here works on buffers sized to the modulus and never
//! calls the RSA primitive itself. Decoding failures all collapse into a
//! single return value per scheme so the caller can not be used as a
//! padding oracle.

use crate::error::Result;
use crate::hash::HashAlg;
use crate::interface::*;
use crate::misc::{strip_leading_zeros, xor_into};

use constant_time_eq::constant_time_eq;
use zeroize::Zeroizing;

/// Minimum number of padding bytes in a PKCS#1 v1.5 block
pub const PKCS1_MIN_PAD: usize = 8;
/// Bytes of a PKCS#1 v1.5 block not available to the payload
pub const PKCS1_OVERHEAD: usize = PKCS1_MIN_PAD + 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Signature blocks, padded with 0xFF
    Bt1 = 1,
    /// Encryption blocks, padded with random non zero bytes
    Bt2 = 2,
}

fn random_bytes(len: usize) -> Result<Zeroizing<Vec<u8>>> {
    let mut buf = Zeroizing::new(vec![0u8; len]);
    openssl::rand::rand_bytes(&mut buf)?;
    Ok(buf)
}

/// Fills `buf` with random bytes none of which is zero
fn random_nonzero(buf: &mut [u8]) -> Result<()> {
    openssl::rand::rand_bytes(buf)?;
    let mut extra = [0u8; 1];
    for b in buf.iter_mut() {
        while *b == 0 {
            openssl::rand::rand_bytes(&mut extra)?;
            *b = extra[0];
        }
    }
    Ok(())
}

/// Builds `0x00 || BT || PS || 0x00 || data` in a `k` bytes buffer
pub fn pkcs1_format(
    data: &[u8],
    k: usize,
    bt: BlockType,
) -> Result<Zeroizing<Vec<u8>>> {
    if k < PKCS1_OVERHEAD || data.len() > k - PKCS1_OVERHEAD {
        return Err(CKR_DATA_LEN_RANGE)?;
    }
    let pslen = k - data.len() - 3;
    let mut block = Zeroizing::new(vec![0u8; k]);
    block[1] = bt as u8;
    match bt {
        BlockType::Bt1 => block[2..(2 + pslen)].fill(0xff),
        BlockType::Bt2 => random_nonzero(&mut block[2..(2 + pslen)])?,
    }
    block[(3 + pslen)..].copy_from_slice(data);
    Ok(block)
}

/// Extracts the payload of a PKCS#1 v1.5 block
///
/// Any malformation is reported as `CKR_ENCRYPTED_DATA_INVALID`.
pub fn pkcs1_parse(block: &[u8], bt: BlockType) -> Result<Zeroizing<Vec<u8>>> {
    if block.len() < PKCS1_OVERHEAD {
        return Err(CKR_ENCRYPTED_DATA_INVALID)?;
    }
    let mut bad = (block[0] != 0) as u8 | (block[1] != bt as u8) as u8;
    let mut sep = 0usize;
    let mut found = 0u8;
    for (i, b) in block.iter().enumerate().skip(2) {
        let is_zero = (*b == 0) as u8;
        let first = is_zero & (found ^ 1);
        /* record the first separator without branching on secret data */
        sep |= i * usize::from(first);
        found |= is_zero;
        if bt == BlockType::Bt1 {
            bad |= (found ^ 1) & (*b != 0xff) as u8;
        }
    }
    bad |= found ^ 1;
    bad |= (sep < 2 + PKCS1_MIN_PAD) as u8;
    if bad != 0 {
        return Err(CKR_ENCRYPTED_DATA_INVALID)?;
    }
    Ok(Zeroizing::new(block[(sep + 1)..].to_vec()))
}

/// MGF1 from RFC 8017 appendix B.2.1
pub fn mgf1(
    alg: &HashAlg,
    seed: &[u8],
    len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let mut mask = Zeroizing::new(Vec::with_capacity(len + alg.size));
    let mut counter = 0u32;
    while mask.len() < len {
        let mut hasher = alg.hasher()?;
        hasher.update(seed)?;
        hasher.update(&counter.to_be_bytes())?;
        mask.extend_from_slice(&hasher.finish()?);
        counter += 1;
    }
    mask.truncate(len);
    Ok(mask)
}

/// EME-OAEP encoding
///
/// `label_hash` is the digest of the label with the OAEP hash, whose
/// length also sets the seed size.
pub fn oaep_encode(
    msg: &[u8],
    k: usize,
    label_hash: &[u8],
    mgf: &HashAlg,
) -> Result<Zeroizing<Vec<u8>>> {
    let hlen = label_hash.len();
    if k < 2 * hlen + 2 || msg.len() > k - 2 * hlen - 2 {
        return Err(CKR_DATA_LEN_RANGE)?;
    }
    let dblen = k - hlen - 1;
    let mut em = Zeroizing::new(vec![0u8; k]);
    {
        let (seed, db) = em[1..].split_at_mut(hlen);
        /* DB = lHash || PS || 0x01 || M */
        db[..hlen].copy_from_slice(label_hash);
        db[dblen - msg.len() - 1] = 0x01;
        db[(dblen - msg.len())..].copy_from_slice(msg);

        seed.copy_from_slice(&random_bytes(hlen)?);
        xor_into(db, &mgf1(mgf, seed, dblen)?);
        xor_into(seed, &mgf1(mgf, db, hlen)?);
    }
    Ok(em)
}

/// EME-OAEP decoding, every failure is `CKR_ENCRYPTED_DATA_INVALID`
pub fn oaep_decode(
    em: &[u8],
    label_hash: &[u8],
    mgf: &HashAlg,
) -> Result<Zeroizing<Vec<u8>>> {
    let hlen = label_hash.len();
    let k = em.len();
    if k < 2 * hlen + 2 {
        return Err(CKR_ENCRYPTED_DATA_INVALID)?;
    }
    let dblen = k - hlen - 1;
    let mut seed = Zeroizing::new(em[1..(1 + hlen)].to_vec());
    let mut db = Zeroizing::new(em[(1 + hlen)..].to_vec());
    xor_into(&mut seed, &mgf1(mgf, &db, hlen)?);
    xor_into(&mut db, &mgf1(mgf, &seed, dblen)?);

    let mut bad = (em[0] != 0) as u8;
    bad |= (!constant_time_eq(&db[..hlen], label_hash)) as u8;
    let mut found = 0u8;
    let mut index = 0usize;
    for (i, b) in db.iter().enumerate().skip(hlen) {
        let is_one = (*b == 0x01) as u8;
        let is_zero = (*b == 0x00) as u8;
        let first = is_one & (found ^ 1);
        index |= i * usize::from(first);
        /* only zeros may precede the 0x01 separator */
        bad |= (found ^ 1) & (is_one ^ 1) & (is_zero ^ 1);
        found |= is_one;
    }
    bad |= found ^ 1;
    if bad != 0 {
        return Err(CKR_ENCRYPTED_DATA_INVALID)?;
    }
    Ok(Zeroizing::new(db[(index + 1)..].to_vec()))
}

fn pss_hash(
    alg: &HashAlg,
    mhash: &[u8],
    salt: &[u8],
) -> Result<Vec<u8>> {
    let mut hasher = alg.hasher()?;
    hasher.update(&[0u8; 8])?;
    hasher.update(mhash)?;
    hasher.update(salt)?;
    Ok(hasher.finish()?.to_vec())
}

/// EMSA-PSS encoding of an already computed message digest
///
/// Returns an `emLen` bytes block, `emLen = ceil(em_bits / 8)`.
pub fn pss_encode(
    mhash: &[u8],
    em_bits: usize,
    salt_len: usize,
    alg: &HashAlg,
    mgf: &HashAlg,
) -> Result<Vec<u8>> {
    let hlen = alg.size;
    if mhash.len() != hlen {
        return Err(CKR_DATA_LEN_RANGE)?;
    }
    let em_len = (em_bits + 7) / 8;
    if em_len < hlen + salt_len + 2 {
        return Err(CKR_MECHANISM_PARAM_INVALID)?;
    }
    let salt = random_bytes(salt_len)?;
    let h = pss_hash(alg, mhash, &salt)?;

    let dblen = em_len - hlen - 1;
    let mut em = vec![0u8; em_len];
    /* DB = PS || 0x01 || salt */
    em[dblen - salt_len - 1] = 0x01;
    em[(dblen - salt_len)..dblen].copy_from_slice(&salt);
    xor_into(&mut em[..dblen], &mgf1(mgf, &h, dblen)?);
    em[0] &= 0xff >> (8 * em_len - em_bits);
    em[dblen..(dblen + hlen)].copy_from_slice(&h);
    em[em_len - 1] = 0xbc;
    Ok(em)
}

/// EMSA-PSS verification, every failure is `CKR_SIGNATURE_INVALID`
///
/// `em` may carry extra leading zero bytes, as when it is the raw output
/// of the RSA public operation.
pub fn pss_verify(
    mhash: &[u8],
    em: &[u8],
    em_bits: usize,
    salt_len: usize,
    alg: &HashAlg,
    mgf: &HashAlg,
) -> Result<()> {
    let hlen = alg.size;
    let em_len = (em_bits + 7) / 8;
    if mhash.len() != hlen
        || em.len() < em_len
        || em_len < hlen + salt_len + 2
        || em[..(em.len() - em_len)].iter().any(|b| *b != 0)
    {
        return Err(CKR_SIGNATURE_INVALID)?;
    }
    let em = &em[(em.len() - em_len)..];
    let topmask = 0xffu8 >> (8 * em_len - em_bits);
    if em[em_len - 1] != 0xbc || em[0] & !topmask != 0 {
        return Err(CKR_SIGNATURE_INVALID)?;
    }
    let dblen = em_len - hlen - 1;
    let h = &em[dblen..(dblen + hlen)];
    let mut db = Zeroizing::new(em[..dblen].to_vec());
    xor_into(&mut db, &mgf1(mgf, h, dblen)?);
    db[0] &= topmask;

    let pslen = dblen - salt_len - 1;
    let mut bad = db[..pslen].iter().fold(0u8, |acc, b| acc | *b);
    bad |= db[pslen] ^ 0x01;
    let hprime = pss_hash(alg, mhash, &db[(dblen - salt_len)..])?;
    if bad != 0 || !constant_time_eq(h, &hprime) {
        return Err(CKR_SIGNATURE_INVALID)?;
    }
    Ok(())
}

/// Left pads raw data to the modulus length
pub fn x509_pad(data: &[u8], k: usize) -> Result<Zeroizing<Vec<u8>>> {
    match crate::misc::zero_pad_to(data, k) {
        Some(v) => Ok(Zeroizing::new(v)),
        None => Err(CKR_DATA_LEN_RANGE)?,
    }
}

/// Compares raw data with a recovered block, ignoring leading zeros on
/// both sides independently
pub fn x509_compare(data: &[u8], recovered: &[u8]) -> Result<()> {
    let a = strip_leading_zeros(data);
    let b = strip_leading_zeros(recovered);
    if a.len() != b.len() || !constant_time_eq(a, b) {
        return Err(CKR_SIGNATURE_INVALID)?;
    }
    Ok(())
}
