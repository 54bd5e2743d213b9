// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use crate::tests::*;

use serial_test::parallel;

fn mac(mechanism: &CK_MECHANISM, key: &Object, data: &[u8]) -> Vec<u8> {
    let m = ret_or_panic!(mechanisms().get(mechanism.mechanism));
    let mut op = ret_or_panic!(m.mac_new(mechanism, key));
    let mut out = vec![0u8; ret_or_panic!(op.mac_len())];
    let len = ret_or_panic!(op.mac(data, &mut out));
    out.truncate(len);
    out
}

#[test]
#[parallel]
#[cfg(feature = "hmac")]
fn test_hmac_rfc4231() {
    let key = secret_key(CKK_GENERIC_SECRET, &[0x0bu8; 20]);
    assert_eq!(
        hex::encode(mac(&mech(CKM_SHA256_HMAC), &key, b"Hi There")),
        "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7"
    );

    let key = secret_key(CKK_GENERIC_SECRET, b"Jefe");
    let data = b"what do ya want for nothing?";
    let tag256 = ret_or_panic!(sign(&mech(CKM_SHA256_HMAC), &key, data));
    assert_eq!(
        hex::encode(&tag256),
        "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
    );
    assert_eq!(
        hex::encode(ret_or_panic!(sign(&mech(CKM_SHA512_HMAC), &key, data))),
        "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554\
         9758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
    );
    ret_or_panic!(verify(&mech(CKM_SHA256_HMAC), &key, data, &tag256));

    /* truncated output with the general variant */
    let len: CK_MAC_GENERAL_PARAMS = 16;
    let general = mech_params(CKM_SHA256_HMAC_GENERAL, &len);
    let tag = ret_or_panic!(sign(&general, &key, data));
    assert_eq!(tag, tag256[..16].to_vec());
    ret_or_panic!(verify(&general, &key, data, &tag));
    assert_eq!(
        err_rv(verify(&general, &key, data, &tag256)),
        CKR_SIGNATURE_LEN_RANGE
    );

    let mut bad = tag256.clone();
    bad[31] ^= 0x80;
    assert_eq!(
        err_rv(verify(&mech(CKM_SHA256_HMAC), &key, data, &bad)),
        CKR_SIGNATURE_INVALID
    );

    let too_long: CK_MAC_GENERAL_PARAMS = 33;
    assert_eq!(
        err_rv(sign(&mech_params(CKM_SHA256_HMAC_GENERAL, &too_long), &key, data)),
        CKR_MECHANISM_PARAM_INVALID
    );

    /* only generic secrets are HMAC keys */
    let aes = secret_key(CKK_AES, &[0u8; 16]);
    assert_eq!(
        err_rv(sign(&mech(CKM_SHA256_HMAC), &aes, data)),
        CKR_KEY_TYPE_INCONSISTENT
    );
}

#[test]
#[parallel]
#[cfg(feature = "hmac")]
fn test_hmac_multipart() {
    let key = secret_key(CKK_GENERIC_SECRET, &[0xaau8; 131]);
    let data = [0xcdu8; 200];
    let m = ret_or_panic!(mechanisms().get(CKM_SHA384_HMAC));
    let expected = mac(&mech(CKM_SHA384_HMAC), &key, &data);
    assert_eq!(expected.len(), 48);

    let mut op = ret_or_panic!(m.sign_new(&mech(CKM_SHA384_HMAC), &key));
    for chunk in data.chunks(33) {
        ret_or_panic!(op.sign_update(chunk));
    }
    let mut tag = [0u8; 48];
    ret_or_panic!(op.sign_final(&mut tag));
    assert_eq!(tag.to_vec(), expected);

    let mut op = ret_or_panic!(m.verify_new(&mech(CKM_SHA384_HMAC), &key));
    for chunk in data.chunks(64) {
        ret_or_panic!(op.verify_update(chunk));
    }
    ret_or_panic!(op.verify_final(&tag));

    /* sign usage must be allowed */
    let mut key = key;
    ret_or_panic!(key.set_attr(Attribute::from_bool(CKA_SIGN, false)));
    assert_eq!(
        err_rv(m.sign_new(&mech(CKM_SHA384_HMAC), &key)),
        CKR_KEY_FUNCTION_NOT_PERMITTED
    );
}

#[test]
#[parallel]
#[cfg(feature = "aes")]
fn test_aes_cmac_mechanisms() {
    let key = secret_key(
        CKK_AES,
        &hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap(),
    );
    let msg = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
    assert_eq!(
        hex::encode(mac(&mech(CKM_AES_CMAC), &key, &msg)),
        "070a16b46b4d4144f79bdd9dd04a287c"
    );
    assert_eq!(
        hex::encode(mac(&mech(CKM_AES_CMAC), &key, &[])),
        "bb1d6929e95937287fa37d129b756746"
    );

    let len: CK_MAC_GENERAL_PARAMS = 4;
    let general = mech_params(CKM_AES_CMAC_GENERAL, &len);
    let tag = ret_or_panic!(sign(&general, &key, &msg));
    assert_eq!(hex::encode(&tag), "070a16b4");
    ret_or_panic!(verify(&general, &key, &msg, &tag));
}

#[test]
#[parallel]
#[cfg(feature = "aes")]
fn test_aes_cbc_mac_mechanisms() {
    let key = secret_key(CKK_AES, &[0x33u8; 16]);
    let data = [0x5au8; 32];
    let ct = ret_or_panic!(encrypt(
        &mech_bytes(CKM_AES_CBC, &[0u8; 16]),
        &key,
        &data
    ));

    /* the default length is half a block */
    let tag = mac(&mech(CKM_AES_MAC), &key, &data);
    assert_eq!(tag, ct[16..24].to_vec());

    let len: CK_MAC_GENERAL_PARAMS = 16;
    let general = mech_params(CKM_AES_MAC_GENERAL, &len);
    assert_eq!(ret_or_panic!(sign(&general, &key, &data)), ct[16..].to_vec());

    let zero: CK_MAC_GENERAL_PARAMS = 0;
    assert_eq!(
        err_rv(sign(&mech_params(CKM_AES_MAC_GENERAL, &zero), &key, &data)),
        CKR_MECHANISM_PARAM_INVALID
    );
}

#[test]
#[parallel]
#[cfg(feature = "des")]
fn test_des3_macs() {
    let key = secret_key(CKK_DES2, &[0x2cu8; 16]);
    let data = b"sixteen byte msg";

    let tag = mac(&mech(CKM_DES3_MAC), &key, data);
    assert_eq!(tag.len(), 4);
    let ct = ret_or_panic!(encrypt(
        &mech_bytes(CKM_DES3_CBC, &[0u8; 8]),
        &key,
        data
    ));
    assert_eq!(tag, ct[8..12].to_vec());

    let tag = ret_or_panic!(sign(&mech(CKM_DES3_CMAC), &key, data));
    assert_eq!(tag.len(), 8);
    ret_or_panic!(verify(&mech(CKM_DES3_CMAC), &key, data, &tag));
    assert_eq!(
        err_rv(verify(&mech(CKM_DES3_CMAC), &key, &data[1..], &tag)),
        CKR_SIGNATURE_INVALID
    );

    /* single DES keys are not accepted */
    let des = secret_key(CKK_DES, &[0x2cu8; 8]);
    assert_eq!(
        err_rv(sign(&mech(CKM_DES3_MAC), &des, data)),
        CKR_KEY_TYPE_INCONSISTENT
    );
}
