// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! DES and Triple DES keys and cipher mechanisms

use crate::blockcipher::{BlockCipherMechanism, ChainMode};
use crate::config::CONFIG;
use crate::error::Result;
use crate::interface::*;
use crate::mechanism::*;
use crate::object::Object;
use crate::secret::{random_key, store_secret_key};

const DES_KEY_LEN: usize = 8;

/// Weak and semi weak DES keys, with odd parity applied
const DES_WEAK_KEYS: [[u8; DES_KEY_LEN]; 16] = [
    [0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01],
    [0xfe, 0xfe, 0xfe, 0xfe, 0xfe, 0xfe, 0xfe, 0xfe],
    [0xe0, 0xe0, 0xe0, 0xe0, 0xf1, 0xf1, 0xf1, 0xf1],
    [0x1f, 0x1f, 0x1f, 0x1f, 0x0e, 0x0e, 0x0e, 0x0e],
    [0x01, 0x1f, 0x01, 0x1f, 0x01, 0x0e, 0x01, 0x0e],
    [0x1f, 0x01, 0x1f, 0x01, 0x0e, 0x01, 0x0e, 0x01],
    [0x01, 0xe0, 0x01, 0xe0, 0x01, 0xf1, 0x01, 0xf1],
    [0xe0, 0x01, 0xe0, 0x01, 0xf1, 0x01, 0xf1, 0x01],
    [0x01, 0xfe, 0x01, 0xfe, 0x01, 0xfe, 0x01, 0xfe],
    [0xfe, 0x01, 0xfe, 0x01, 0xfe, 0x01, 0xfe, 0x01],
    [0x1f, 0xe0, 0x1f, 0xe0, 0x0e, 0xf1, 0x0e, 0xf1],
    [0xe0, 0x1f, 0xe0, 0x1f, 0xf1, 0x0e, 0xf1, 0x0e],
    [0x1f, 0xfe, 0x1f, 0xfe, 0x0e, 0xfe, 0x0e, 0xfe],
    [0xfe, 0x1f, 0xfe, 0x1f, 0xfe, 0x0e, 0xfe, 0x0e],
    [0xe0, 0xfe, 0xe0, 0xfe, 0xf1, 0xfe, 0xf1, 0xfe],
    [0xfe, 0xe0, 0xfe, 0xe0, 0xfe, 0xf1, 0xfe, 0xf1],
];

/// Sets the low bit of every byte so each byte has odd parity
pub fn set_odd_parity(key: &mut [u8]) {
    for b in key.iter_mut() {
        let high = *b & 0xfe;
        *b = high | u8::from(high.count_ones() % 2 == 0);
    }
}

pub fn is_weak_key(key: &[u8]) -> bool {
    DES_WEAK_KEYS.iter().any(|w| w.as_slice() == key)
}

#[derive(Debug)]
struct DesKeyGenMechanism {
    info: CK_MECHANISM_INFO,
    key_type: CK_KEY_TYPE,
    key_len: usize,
}

impl Mechanism for DesKeyGenMechanism {
    fn info(&self) -> &CK_MECHANISM_INFO {
        &self.info
    }

    fn generate_key(
        &self,
        mech: &CK_MECHANISM,
        template: &mut Object,
    ) -> Result<()> {
        MechParams::from_mechanism(mech)?;
        for _ in 0..CONFIG.des_weak_key_retries {
            let mut key = random_key(self.key_len)?;
            set_odd_parity(&mut key);
            /* triple length keys are not screened */
            if self.key_type != CKK_DES3
                && key.chunks(DES_KEY_LEN).any(|k| is_weak_key(k))
            {
                continue;
            }
            return store_secret_key(template, self.key_type, &key);
        }
        Err(CKR_FUNCTION_FAILED)?
    }
}

static DES_KEYS: [CK_KEY_TYPE; 1] = [CKK_DES];
static DES3_KEYS: [CK_KEY_TYPE; 2] = [CKK_DES2, CKK_DES3];
static ANY_DES_KEYS: [CK_KEY_TYPE; 3] = [CKK_DES, CKK_DES2, CKK_DES3];

pub fn register(mechs: &mut Mechanisms) {
    for (ckm, key_type, size) in [
        (CKM_DES_KEY_GEN, CKK_DES, 8),
        (CKM_DES2_KEY_GEN, CKK_DES2, 16),
        (CKM_DES3_KEY_GEN, CKK_DES3, 24),
    ] {
        mechs.add_mechanism(
            ckm,
            Box::new(DesKeyGenMechanism {
                info: new_info(size, size, CKF_GENERATE),
                key_type: key_type,
                key_len: size as usize,
            }),
        );
    }

    let flags = CKF_ENCRYPT | CKF_DECRYPT;
    let table: [(
        CK_MECHANISM_TYPE,
        ChainMode,
        &'static [CK_KEY_TYPE],
        CK_ULONG,
    ); 9] = [
        (CKM_DES_ECB, ChainMode::Ecb, &DES_KEYS, 8),
        (CKM_DES_CBC, ChainMode::Cbc, &DES_KEYS, 8),
        (CKM_DES_CBC_PAD, ChainMode::CbcPad, &DES_KEYS, 8),
        (CKM_DES_CFB8, ChainMode::Cfb8, &ANY_DES_KEYS, 8),
        (CKM_DES_CFB64, ChainMode::Cfb64, &ANY_DES_KEYS, 8),
        (CKM_DES_OFB64, ChainMode::Ofb64, &ANY_DES_KEYS, 8),
        (CKM_DES3_ECB, ChainMode::Ecb, &DES3_KEYS, 16),
        (CKM_DES3_CBC, ChainMode::Cbc, &DES3_KEYS, 16),
        (CKM_DES3_CBC_PAD, ChainMode::CbcPad, &DES3_KEYS, 16),
    ];
    for (ckm, mode, key_types, min) in table {
        mechs.add_mechanism(
            ckm,
            Box::new(BlockCipherMechanism {
                info: new_info(min, 24, flags),
                mode: mode,
                key_types: key_types,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity_and_weak_keys() {
        let mut key = [0x00u8, 0xff, 0x10, 0x11];
        set_odd_parity(&mut key);
        assert_eq!(key, [0x01, 0xfe, 0x10, 0x10]);
        for k in &DES_WEAK_KEYS {
            let mut copy = *k;
            set_odd_parity(&mut copy);
            assert_eq!(&copy, k);
            assert!(is_weak_key(k));
        }
        assert!(!is_weak_key(&hex::decode("0123456789abcdef").unwrap()));
    }
}
