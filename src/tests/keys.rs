// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use crate::tests::*;

use serial_test::parallel;

fn value_of(obj: &Object) -> Vec<u8> {
    ret_or_panic!(obj.get_attr_as_bytes(CKA_VALUE)).clone()
}

fn with_value_len(key_type: CK_KEY_TYPE, len: CK_ULONG) -> Object {
    let mut obj = key_template(CKO_SECRET_KEY, key_type);
    ret_or_panic!(obj.set_attr(Attribute::from_ulong(CKA_VALUE_LEN, len)));
    obj
}

#[test]
#[parallel]
fn test_generic_secret_keygen() {
    let mut template = with_value_len(CKK_GENERIC_SECRET, 32);
    generate_key(CKM_GENERIC_SECRET_KEY_GEN, &mut template);
    assert_eq!(value_of(&template).len(), 32);
    assert_eq!(ret_or_panic!(template.get_attr_as_ulong(CKA_VALUE_LEN)), 32);
    assert!(ret_or_panic!(template.get_attr_as_bool(CKA_LOCAL)));

    let m = ret_or_panic!(mechanisms().get(CKM_GENERIC_SECRET_KEY_GEN));
    let keygen = mech(CKM_GENERIC_SECRET_KEY_GEN);
    for (len, rv) in [(9, CKR_KEY_SIZE_RANGE), (257, CKR_KEY_SIZE_RANGE)] {
        let mut template = with_value_len(CKK_GENERIC_SECRET, len);
        assert_eq!(err_rv(m.generate_key(&keygen, &mut template)), rv);
    }
    let mut template = key_template(CKO_SECRET_KEY, CKK_GENERIC_SECRET);
    assert_eq!(
        err_rv(m.generate_key(&keygen, &mut template)),
        CKR_TEMPLATE_INCOMPLETE
    );
}

#[test]
#[parallel]
#[cfg(feature = "aes")]
fn test_aes_keygen() {
    for len in [16, 24, 32] {
        let mut template = with_value_len(CKK_AES, len);
        generate_key(CKM_AES_KEY_GEN, &mut template);
        assert_eq!(value_of(&template).len() as CK_ULONG, len);
        assert_eq!(template.get_key_type(), CKK_AES);
    }

    let m = ret_or_panic!(mechanisms().get(CKM_AES_KEY_GEN));
    let mut template = with_value_len(CKK_AES, 20);
    assert_eq!(
        err_rv(m.generate_key(&mech(CKM_AES_KEY_GEN), &mut template)),
        CKR_KEY_SIZE_RANGE
    );
}

#[test]
#[parallel]
#[cfg(feature = "des")]
fn test_des_keygen() {
    for (ckm, key_type, len) in [
        (CKM_DES_KEY_GEN, CKK_DES, 8),
        (CKM_DES2_KEY_GEN, CKK_DES2, 16),
        (CKM_DES3_KEY_GEN, CKK_DES3, 24),
    ] {
        let mut template = key_template(CKO_SECRET_KEY, key_type);
        generate_key(ckm, &mut template);
        let value = value_of(&template);
        assert_eq!(value.len(), len);
        assert_eq!(template.get_key_type(), key_type);
        for b in &value {
            assert_eq!(b.count_ones() % 2, 1, "odd parity");
        }
        if key_type != CKK_DES3 {
            for k in value.chunks(8) {
                assert!(!crate::des::is_weak_key(k));
            }
        }

        /* the generated key is usable right away */
        let ecb = if key_type == CKK_DES { CKM_DES_ECB } else { CKM_DES3_ECB };
        let ct = ret_or_panic!(encrypt(&mech(ecb), &template, &[0u8; 8]));
        assert_eq!(ret_or_panic!(decrypt(&mech(ecb), &template, &ct)), [0u8; 8]);
    }
}
