// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use crate::tests::*;

use serial_test::parallel;

#[test]
#[parallel]
fn test_digests() {
    for (ckm, expect) in [
        (CKM_SHA_1, "a9993e364706816aba3e25717850c26c9cd0d89d"),
        (
            CKM_SHA224,
            "23097d223405d8228642a477bda255b32aadbce4bda0b3f7e36c9da7",
        ),
        (
            CKM_SHA256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
        ),
        (
            CKM_SHA384,
            "cb00753f45a35e8bb5a03d699ac65007272c32ab0eded163\
             1a8b605a43ff5bed8086072ba1e7cc2358baeca134c825a7",
        ),
        (
            CKM_SHA512,
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f",
        ),
        (
            CKM_SHA3_256,
            "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532",
        ),
    ] {
        let m = ret_or_panic!(mechanisms().get_for(ckm, CKF_DIGEST));

        /* one shot */
        let mut op = ret_or_panic!(m.digest_new(&mech(ckm)));
        let mut digest = vec![0u8; ret_or_panic!(op.digest_len())];
        assert_eq!(ret_or_panic!(op.digest(b"abc", &mut digest)), digest.len());
        assert_eq!(hex::encode(&digest), expect);
        assert!(op.finalized());

        /* multi part */
        let mut op = ret_or_panic!(m.digest_new(&mech(ckm)));
        ret_or_panic!(op.digest_update(b"a"));
        ret_or_panic!(op.digest_update(b""));
        ret_or_panic!(op.digest_update(b"bc"));
        let mut digest2 = vec![0u8; digest.len()];
        ret_or_panic!(op.digest_final(&mut digest2));
        assert_eq!(digest, digest2);
    }
}

#[test]
#[parallel]
fn test_digest_state_machine() {
    let m = ret_or_panic!(mechanisms().get_for(CKM_SHA256, CKF_DIGEST));
    let mut op = ret_or_panic!(m.digest_new(&mech(CKM_SHA256)));
    let mut short = [0u8; 16];
    assert_eq!(
        op.digest(b"abc", &mut short).unwrap_err().rv(),
        CKR_BUFFER_TOO_SMALL
    );
    /* still usable after asking for the length */
    let mut digest = [0u8; 32];
    ret_or_panic!(op.digest(b"abc", &mut digest));
    assert_eq!(
        op.digest_update(b"abc").unwrap_err().rv(),
        CKR_OPERATION_NOT_INITIALIZED
    );

    /* one shot after an update is refused */
    let mut op = ret_or_panic!(m.digest_new(&mech(CKM_SHA256)));
    ret_or_panic!(op.digest_update(b"abc"));
    assert_eq!(
        op.digest(b"abc", &mut digest).unwrap_err().rv(),
        CKR_OPERATION_NOT_INITIALIZED
    );

    /* live contexts can not be exported */
    let mut op = ret_or_panic!(m.digest_new(&mech(CKM_SHA256)));
    assert_eq!(err_rv(op.get_operation_state()), CKR_STATE_UNSAVEABLE);
    assert_eq!(
        err_rv(op.set_operation_state(&[0u8; 16])),
        CKR_SAVED_STATE_INVALID
    );

    let iv = [0u8; 8];
    assert_eq!(
        err_rv(m.digest_new(&mech_bytes(CKM_SHA256, &iv))),
        CKR_MECHANISM_PARAM_INVALID
    );
}
