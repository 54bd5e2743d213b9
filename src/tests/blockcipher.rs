// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use crate::tests::*;

#[cfg(feature = "des")]
use crate::tests::des3_vectors::*;

use serial_test::parallel;

/// Runs a multi-part operation feeding the input as described by
/// `chunks`, a negative chunk is an update with no data
fn chunked(
    mechanism: &CK_MECHANISM,
    key: &Object,
    input: &[u8],
    chunks: &[isize],
    encrypting: bool,
) -> Vec<u8> {
    let mut out = Vec::new();
    let mut pos = 0;
    if encrypting {
        let m = ret_or_panic!(mechanisms().get_for(mechanism.mechanism, CKF_ENCRYPT));
        let mut op = ret_or_panic!(m.encryption_new(mechanism, key));
        for c in chunks {
            let len = usize::try_from(*c).unwrap_or(0);
            let mut buf = vec![0u8; ret_or_panic!(op.encryption_len(len, false))];
            let n = ret_or_panic!(op.encrypt_update(&input[pos..(pos + len)], &mut buf));
            out.extend_from_slice(&buf[..n]);
            pos += len;
        }
        let mut buf = vec![0u8; ret_or_panic!(op.encryption_len(0, true))];
        let n = ret_or_panic!(op.encrypt_final(&mut buf));
        out.extend_from_slice(&buf[..n]);
    } else {
        let m = ret_or_panic!(mechanisms().get_for(mechanism.mechanism, CKF_DECRYPT));
        let mut op = ret_or_panic!(m.decryption_new(mechanism, key));
        for c in chunks {
            let len = usize::try_from(*c).unwrap_or(0);
            let mut buf = vec![0u8; ret_or_panic!(op.decryption_len(len, false))];
            let n = ret_or_panic!(op.decrypt_update(&input[pos..(pos + len)], &mut buf));
            out.extend_from_slice(&buf[..n]);
            pos += len;
        }
        let mut buf = vec![0u8; ret_or_panic!(op.decryption_len(0, true))];
        let n = ret_or_panic!(op.decrypt_final(&mut buf));
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(pos, input.len());
    out
}

#[cfg(feature = "des")]
fn run_des3_suite(ckm: CK_MECHANISM_TYPE, vectors: &[Des3Vector]) {
    for (count, tv) in vectors.iter().enumerate() {
        let key = secret_key(CKK_DES3, &hex::decode(tv.key).unwrap());
        let iv = hex::decode(tv.iv).unwrap();
        let pt = hex::decode(tv.plaintext).unwrap();
        let ct = hex::decode(tv.ciphertext).unwrap();
        let mechanism = if iv.is_empty() {
            mech(ckm)
        } else {
            mech_bytes(ckm, &iv)
        };

        /* one shot */
        assert_eq!(
            ret_or_panic!(encrypt(&mechanism, &key, &pt)),
            ct,
            "encrypt vector {count}"
        );
        assert_eq!(
            ret_or_panic!(decrypt(&mechanism, &key, &ct)),
            pt,
            "decrypt vector {count}"
        );

        /* published split, or a single update */
        let whole = [pt.len() as isize];
        let chunks = if tv.chunks.is_empty() {
            &whole[..]
        } else {
            tv.chunks
        };
        assert_eq!(chunked(&mechanism, &key, &pt, chunks, true), ct);
        assert_eq!(chunked(&mechanism, &key, &ct, chunks, false), pt);

        /* the result must not depend on how the input is split */
        let bytes = vec![1isize; pt.len()];
        assert_eq!(chunked(&mechanism, &key, &pt, &bytes, true), ct);
        assert_eq!(chunked(&mechanism, &key, &ct, &bytes, false), pt);
    }
}

#[test]
#[parallel]
#[cfg(feature = "des")]
fn test_des3_ecb_kat() {
    run_des3_suite(CKM_DES3_ECB, &DES3_ECB_VECTORS);
}

#[test]
#[parallel]
#[cfg(feature = "des")]
fn test_des3_cbc_kat() {
    run_des3_suite(CKM_DES3_CBC, &DES3_CBC_VECTORS);
}

#[test]
#[parallel]
#[cfg(feature = "des")]
fn test_des3_cfb8_kat() {
    run_des3_suite(CKM_DES_CFB8, &DES3_CFB8_VECTORS);
}

#[test]
#[parallel]
#[cfg(feature = "des")]
fn test_des3_cfb64_kat() {
    run_des3_suite(CKM_DES_CFB64, &DES3_CFB64_VECTORS);
}

#[test]
#[parallel]
#[cfg(feature = "des")]
fn test_des3_ofb64_kat() {
    run_des3_suite(CKM_DES_OFB64, &DES3_OFB64_VECTORS);
}

#[test]
#[parallel]
#[cfg(feature = "des")]
fn test_des3_ecb_two_updates() {
    let key = secret_key(
        CKK_DES3,
        &hex::decode("b51a4fbace3de354b51a4fbace3de354b51a4fbace3de354")
            .unwrap(),
    );
    let pt = hex::decode(
        "1d1a567f1beeab44bb7eecf0ae086b59fdbda9d1422123ac17b46efccfd2869f",
    )
    .unwrap();
    let ct = hex::decode(
        "a6861133718c5187eecea82c7e26be2e0e938112b1da96511f48cecdb842d6ba",
    )
    .unwrap();
    let mechanism = mech(CKM_DES3_ECB);

    let m = ret_or_panic!(mechanisms().get_for(CKM_DES3_ECB, CKF_ENCRYPT));
    let mut op = ret_or_panic!(m.encryption_new(&mechanism, &key));
    let mut out = vec![0u8; 32];
    assert_eq!(ret_or_panic!(op.encrypt_update(&pt[..16], &mut out[..16])), 16);
    assert_eq!(ret_or_panic!(op.encrypt_update(&pt[16..], &mut out[16..])), 16);
    assert_eq!(ret_or_panic!(op.encrypt_final(&mut [])), 0);
    assert!(op.finalized());
    assert_eq!(out, ct);

    assert_eq!(ret_or_panic!(encrypt(&mechanism, &key, &pt)), ct);
}

#[test]
#[parallel]
#[cfg(feature = "des")]
fn test_des_key_lengths() {
    let k = hex::decode("c44aef545b1331f2").unwrap();
    let pt = hex::decode("6c70fa4b7aba00ca").unwrap();
    let ct = hex::decode("9413638a0b5401bd").unwrap();

    /* single DES is Triple DES with three equal keys */
    let key = secret_key(CKK_DES, &k);
    assert_eq!(ret_or_panic!(encrypt(&mech(CKM_DES_ECB), &key, &pt)), ct);
    assert_eq!(
        err_rv(encrypt(&mech(CKM_DES3_ECB), &key, &pt)),
        CKR_KEY_TYPE_INCONSISTENT
    );

    /* double length keys reuse the first key as the third */
    let k2 = hex::decode("0123456789abcdeffedcba9876543210").unwrap();
    let mut k3 = k2.clone();
    k3.extend_from_slice(&k2[..8]);
    let ct2 = ret_or_panic!(encrypt(
        &mech(CKM_DES3_ECB),
        &secret_key(CKK_DES2, &k2),
        &pt
    ));
    let ct3 = ret_or_panic!(encrypt(
        &mech(CKM_DES3_ECB),
        &secret_key(CKK_DES3, &k3),
        &pt
    ));
    assert_eq!(ct2, ct3);

    /* wrong length for the declared type */
    assert_eq!(
        err_rv(encrypt(&mech(CKM_DES3_ECB), &secret_key(CKK_DES3, &k2), &pt)),
        CKR_KEY_SIZE_RANGE
    );
}

#[test]
#[parallel]
#[cfg(feature = "aes")]
fn test_aes_kat() {
    let key = secret_key(
        CKK_AES,
        &hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap(),
    );
    let pt = hex::decode(
        "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51",
    )
    .unwrap();

    let ct = ret_or_panic!(encrypt(&mech(CKM_AES_ECB), &key, &pt[..16]));
    assert_eq!(hex::encode(ct), "3ad77bb40d7a3660a89ecaf32466ef97");

    let iv = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
    let cbc = mech_bytes(CKM_AES_CBC, &iv);
    let ct = ret_or_panic!(encrypt(&cbc, &key, &pt));
    assert_eq!(
        hex::encode(&ct),
        "7649abac8119b246cee98e9b12e9197d5086cb9b507219ee95db113a917678b2"
    );
    assert_eq!(chunked(&cbc, &key, &pt, &[3, 20, -1, 9], true), ct);
    assert_eq!(ret_or_panic!(decrypt(&cbc, &key, &ct)), pt);

    /* the IV must be exactly one block */
    assert_eq!(
        err_rv(encrypt(&mech_bytes(CKM_AES_CBC, &iv[..8]), &key, &pt)),
        CKR_MECHANISM_PARAM_INVALID
    );
}

#[test]
#[parallel]
#[cfg(feature = "aes")]
fn test_aes_cbc_pad() {
    let key = secret_key(CKK_AES, &[0x42u8; 32]);
    let iv = [0x24u8; 16];
    let pad = mech_bytes(CKM_AES_CBC_PAD, &iv);
    let plain = mech_bytes(CKM_AES_CBC, &iv);

    for len in 0..=33 {
        let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
        let ct = ret_or_panic!(encrypt(&pad, &key, &data));
        assert_eq!(ct.len(), (len / 16 + 1) * 16);

        /* same as unpadded CBC over the PKCS#7 padded data */
        let mut padded = data.clone();
        let padlen = 16 - len % 16;
        padded.resize(len + padlen, padlen as u8);
        assert_eq!(ret_or_panic!(encrypt(&plain, &key, &padded)), ct);

        assert_eq!(ret_or_panic!(decrypt(&pad, &key, &ct)), data);
        let ones = vec![1isize; ct.len()];
        assert_eq!(chunked(&pad, &key, &ct, &ones, false), data);
    }

    /* a block decrypting to a zero pad byte */
    let ct = ret_or_panic!(encrypt(&plain, &key, &[0u8; 16]));
    assert_eq!(
        err_rv(decrypt(&pad, &key, &ct)),
        CKR_ENCRYPTED_DATA_INVALID
    );

    /* truncated ciphertext */
    assert_eq!(
        err_rv(decrypt(&pad, &key, &ct[..15])),
        CKR_ENCRYPTED_DATA_LEN_RANGE
    );
}

#[test]
#[parallel]
#[cfg(feature = "aes")]
fn test_short_buffer_keeps_state() {
    let key = secret_key(CKK_AES, &[0x17u8; 16]);
    let iv = [0u8; 16];
    let mechanism = mech_bytes(CKM_AES_CBC, &iv);
    let data = [0x99u8; 48];
    let expected = ret_or_panic!(encrypt(&mechanism, &key, &data));

    let m = ret_or_panic!(mechanisms().get_for(CKM_AES_CBC, CKF_ENCRYPT));
    let mut op = ret_or_panic!(m.encryption_new(&mechanism, &key));
    let mut small = [0u8; 8];
    assert_eq!(
        op.encrypt_update(&data[..32], &mut small).unwrap_err().rv(),
        CKR_BUFFER_TOO_SMALL
    );
    assert!(!op.finalized());

    let mut out = vec![0u8; 48];
    assert_eq!(ret_or_panic!(op.encrypt_update(&data[..32], &mut out[..32])), 32);
    assert_eq!(ret_or_panic!(op.encrypt_update(&data[32..], &mut out[32..])), 16);
    assert_eq!(ret_or_panic!(op.encrypt_final(&mut [])), 0);
    assert_eq!(out, expected);

    /* data that is not a multiple of the block size */
    assert_eq!(
        err_rv(encrypt(&mechanism, &key, &data[..20])),
        CKR_DATA_LEN_RANGE
    );
    assert_eq!(
        err_rv(decrypt(&mechanism, &key, &expected[..20])),
        CKR_ENCRYPTED_DATA_LEN_RANGE
    );
}

#[test]
#[parallel]
#[cfg(feature = "aes")]
fn test_public_cipher_api() {
    let key = [0x61u8; 24];
    let iv = [0x01u8; 16];
    let data = b"some text that is not block aligned";
    let ct = ret_or_panic!(crate::cipher(
        CKK_AES,
        &key,
        crate::ChainMode::CbcPad,
        Some(&iv),
        true,
        data
    ));
    let mechanism = mech_bytes(CKM_AES_CBC_PAD, &iv);
    assert_eq!(
        ret_or_panic!(encrypt(&mechanism, &secret_key(CKK_AES, &key), data)),
        ct
    );
    let pt = ret_or_panic!(crate::cipher(
        CKK_AES,
        &key,
        crate::ChainMode::CbcPad,
        Some(&iv),
        false,
        &ct
    ));
    assert_eq!(pt, data.to_vec());
}

#[test]
#[parallel]
#[cfg(feature = "aes")]
fn test_public_cipher_length_errors() {
    let key = [0x2bu8; 16];
    let iv = [0u8; 16];
    assert_eq!(
        err_rv(crate::cipher(
            CKK_AES,
            &key,
            crate::ChainMode::Ecb,
            None,
            false,
            &[0u8; 15]
        )),
        CKR_DATA_LEN_RANGE
    );
    assert_eq!(
        err_rv(crate::cipher(
            CKK_AES,
            &key,
            crate::ChainMode::Cbc,
            Some(&iv),
            true,
            &[0u8; 17]
        )),
        CKR_DATA_LEN_RANGE
    );
    for data in [&[0u8; 0][..], &[0u8; 31][..]] {
        assert_eq!(
            err_rv(crate::cipher(
                CKK_AES,
                &key,
                crate::ChainMode::CbcPad,
                Some(&iv),
                false,
                data
            )),
            CKR_DATA_LEN_RANGE
        );
    }

    /* the feedback modes take any length */
    let ct = ret_or_panic!(crate::cipher(
        CKK_AES,
        &key,
        crate::ChainMode::Cfb8,
        Some(&iv),
        true,
        &[0x11u8; 15]
    ));
    assert_eq!(ct.len(), 15);
    let pt = ret_or_panic!(crate::cipher(
        CKK_AES,
        &key,
        crate::ChainMode::Cfb8,
        Some(&iv),
        false,
        &ct
    ));
    assert_eq!(pt, vec![0x11u8; 15]);
}
