// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use crate::curve::Curve;
use crate::keymat::EcPublic;
use crate::ossl::{all_backends, Backend};
use crate::tests::*;
use crate::validate_ec_object;

use serial_test::parallel;

const P256: &str = "06082a8648ce3d030107";
const P384: &str = "06052b81040022";
const P521: &str = "06052b81040023";

fn ec_keypair(params: &str) -> (Object, Object) {
    let params = hex::decode(params).unwrap();
    let mut pubkey = key_template(CKO_PUBLIC_KEY, CKK_EC);
    ret_or_panic!(pubkey.set_attr(Attribute::from_bytes(CKA_EC_PARAMS, params)));
    let mut privkey = key_template(CKO_PRIVATE_KEY, CKK_EC);
    generate_keypair(CKM_EC_KEY_PAIR_GEN, &mut pubkey, &mut privkey);
    (pubkey, privkey)
}

fn ecdh_params(point: &[u8]) -> CK_ECDH1_DERIVE_PARAMS {
    CK_ECDH1_DERIVE_PARAMS {
        kdf: CKD_NULL,
        ulSharedDataLen: 0,
        pSharedData: std::ptr::null_mut(),
        ulPublicDataLen: point.len() as CK_ULONG,
        pPublicData: point.as_ptr() as *mut u8,
    }
}

fn derive(
    params: &CK_ECDH1_DERIVE_PARAMS,
    key: &Object,
    value_len: Option<CK_ULONG>,
) -> crate::error::Result<Vec<u8>> {
    let mut template = key_template(CKO_SECRET_KEY, CKK_GENERIC_SECRET);
    if let Some(len) = value_len {
        template.set_attr(Attribute::from_ulong(CKA_VALUE_LEN, len))?;
    }
    let m = mechanisms().get_for(CKM_ECDH1_DERIVE, CKF_DERIVE)?;
    m.derive(&mech_params(CKM_ECDH1_DERIVE, params), key, &mut template)?;
    Ok(template.get_attr_as_bytes(CKA_VALUE)?.clone())
}

#[test]
#[parallel]
fn test_ec_backends_agree() {
    let curve = ret_or_panic!(Curve::from_params(&hex::decode(P384).unwrap()));
    let digest = [0x3cu8; 48];
    for gen in all_backends() {
        let key = ret_or_panic!(gen.ec_generate(&curve));
        assert_eq!(key.scalar.len(), curve.order_len());
        assert_eq!(key.point.len(), curve.point_len());
        let public = EcPublic {
            curve: curve.clone(),
            point: key.point.clone(),
        };
        for b in all_backends() {
            assert_eq!(
                ret_or_panic!(b.ec_derive_public(&curve, &key.scalar)),
                key.point
            );
            ret_or_panic!(b.ec_check_public(&public));
            let (r, s) = ret_or_panic!(b.ecdsa_sign(&key, &digest));
            for v in all_backends() {
                assert!(ret_or_panic!(v.ecdsa_verify(&public, &digest, &r, &s)));
            }
        }
    }

    let [legacy, evp] = all_backends();
    let k1 = ret_or_panic!(legacy.ec_generate(&curve));
    let k2 = ret_or_panic!(evp.ec_generate(&curve));
    let p1 = EcPublic {
        curve: curve.clone(),
        point: k1.point.clone(),
    };
    let p2 = EcPublic {
        curve: curve.clone(),
        point: k2.point.clone(),
    };
    let s1 = ret_or_panic!(legacy.ecdh(&k1, &p2));
    let s2 = ret_or_panic!(evp.ecdh(&k2, &p1));
    assert_eq!(s1.len(), curve.field_len());
    assert_eq!(*s1, *s2);
}

#[test]
#[parallel]
fn test_ecdsa_curves() {
    for (params, order_len) in [(P256, 32), (P384, 48), (P521, 66)] {
        let (pubkey, privkey) = ec_keypair(params);
        let data = b"data to be signed";

        let hashed = mech(CKM_ECDSA_SHA256);
        let sig = ret_or_panic!(sign(&hashed, &privkey, data));
        assert_eq!(sig.len(), 2 * order_len);
        ret_or_panic!(verify(&hashed, &pubkey, data, &sig));

        let mut bad = sig.clone();
        bad[order_len + 3] ^= 0x10;
        assert_eq!(
            err_rv(verify(&hashed, &pubkey, data, &bad)),
            CKR_SIGNATURE_INVALID
        );
        assert_eq!(
            err_rv(verify(&hashed, &pubkey, &data[1..], &sig)),
            CKR_SIGNATURE_INVALID
        );
        assert_eq!(
            err_rv(verify(&hashed, &pubkey, data, &sig[1..])),
            CKR_SIGNATURE_LEN_RANGE
        );

        /* multi part */
        let m = ret_or_panic!(mechanisms().get(CKM_ECDSA_SHA256));
        let mut op = ret_or_panic!(m.verify_new(&hashed, &pubkey));
        ret_or_panic!(op.verify_update(&data[..4]));
        ret_or_panic!(op.verify_update(&data[4..]));
        ret_or_panic!(op.verify_final(&sig));
    }
}

#[test]
#[parallel]
fn test_ecdsa_wrong_key() {
    let (_, privkey) = ec_keypair(P256);
    let (other_pub, _) = ec_keypair(P256);
    let (p384_pub, _) = ec_keypair(P384);
    let data = b"data";

    let raw = mech(CKM_ECDSA);
    let digest = [0x77u8; 32];
    let sig = ret_or_panic!(sign(&raw, &privkey, &digest));
    assert_eq!(
        err_rv(verify(&raw, &other_pub, &digest, &sig)),
        CKR_SIGNATURE_INVALID
    );
    assert_eq!(
        err_rv(verify(&raw, &p384_pub, &digest, &sig)),
        CKR_SIGNATURE_LEN_RANGE
    );

    /* raw ECDSA is single part */
    let m = ret_or_panic!(mechanisms().get(CKM_ECDSA));
    let mut op = ret_or_panic!(m.sign_new(&raw, &privkey));
    assert_eq!(err_rv(op.sign_update(data)), CKR_OPERATION_NOT_INITIALIZED);
}

#[test]
#[parallel]
fn test_ecdh() {
    let (pub1, priv1) = ec_keypair(P256);
    let (pub2, priv2) = ec_keypair(P256);

    let der1 = ret_or_panic!(pub1.get_attr_as_bytes(CKA_EC_POINT)).clone();
    let der2 = ret_or_panic!(pub2.get_attr_as_bytes(CKA_EC_POINT)).clone();
    /* bare points, as a peer would send them */
    let raw1 = der1[2..].to_vec();
    let raw2 = der2[2..].to_vec();
    assert_eq!(raw1.len(), 65);

    let s1 = ret_or_panic!(derive(&ecdh_params(&raw2), &priv1, None));
    let s2 = ret_or_panic!(derive(&ecdh_params(&raw1), &priv2, None));
    assert_eq!(s1.len(), 32);
    assert_eq!(s1, s2);

    /* DER wrapped point works too */
    assert_eq!(ret_or_panic!(derive(&ecdh_params(&der2), &priv1, None)), s1);

    /* shorter keys keep the trailing bytes */
    let short = ret_or_panic!(derive(&ecdh_params(&raw2), &priv1, Some(16)));
    assert_eq!(short, s1[16..].to_vec());
    assert_eq!(
        err_rv(derive(&ecdh_params(&raw2), &priv1, Some(33))),
        CKR_TEMPLATE_INCONSISTENT
    );

    assert_eq!(
        err_rv(derive(&ecdh_params(&raw2[..40]), &priv1, None)),
        CKR_MECHANISM_PARAM_INVALID
    );

    let mut params = ecdh_params(&raw2);
    params.kdf = CKD_SHA256_KDF;
    assert_eq!(
        err_rv(derive(&params, &priv1, None)),
        CKR_MECHANISM_PARAM_INVALID
    );

    /* a public key can not derive */
    assert_eq!(
        err_rv(derive(&ecdh_params(&raw2), &pub1, None)),
        CKR_KEY_TYPE_INCONSISTENT
    );
}

#[test]
#[parallel]
fn test_ec_key_validation() {
    let (pubkey, privkey) = ec_keypair(P256);
    ret_or_panic!(validate_ec_object(&pubkey));
    ret_or_panic!(validate_ec_object(&privkey));

    /* a scalar larger than the group order */
    let mut bad = privkey.clone();
    ret_or_panic!(bad.set_attr(Attribute::from_bytes(CKA_VALUE, vec![0xffu8; 32])));
    assert!(validate_ec_object(&bad).is_err());

    /* point off the curve */
    let mut point = ret_or_panic!(pubkey.get_attr_as_bytes(CKA_EC_POINT)).clone();
    let last = point.len() - 1;
    point[last] ^= 0x01;
    let mut bad = pubkey.clone();
    ret_or_panic!(bad.set_attr(Attribute::from_bytes(CKA_EC_POINT, point)));
    assert_eq!(err_rv(validate_ec_object(&bad)), CKR_PUBLIC_KEY_INVALID);

    /* garbage encoding */
    let mut bad = pubkey.clone();
    ret_or_panic!(bad.set_attr(Attribute::from_bytes(CKA_EC_POINT, vec![0x04, 0x01, 0x02])));
    assert_eq!(err_rv(validate_ec_object(&bad)), CKR_ATTRIBUTE_VALUE_INVALID);

    let rsa = key_template(CKO_PUBLIC_KEY, CKK_RSA);
    assert_eq!(err_rv(validate_ec_object(&rsa)), CKR_KEY_TYPE_INCONSISTENT);

    /* unknown curve at generation time */
    let mut pubkey = key_template(CKO_PUBLIC_KEY, CKK_EC);
    ret_or_panic!(pubkey.set_attr(Attribute::from_bytes(
        CKA_EC_PARAMS,
        hex::decode("06032b0601").unwrap()
    )));
    let mut privkey = key_template(CKO_PRIVATE_KEY, CKK_EC);
    let m = ret_or_panic!(mechanisms().get(CKM_EC_KEY_PAIR_GEN));
    assert_eq!(
        err_rv(m.generate_keypair(
            &mech(CKM_EC_KEY_PAIR_GEN),
            &mut pubkey,
            &mut privkey
        )),
        CKR_CURVE_NOT_SUPPORTED
    );
}
