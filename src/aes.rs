// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use crate::blockcipher::{BlockCipherMechanism, ChainMode};
use crate::error::Result;
use crate::interface::*;
use crate::mechanism::*;
use crate::object::Object;
use crate::secret::{random_key, requested_len, store_secret_key};

pub const MIN_AES_SIZE_BYTES: usize = 16;
pub const MAX_AES_SIZE_BYTES: usize = 32;

fn check_key_len(len: usize) -> Result<()> {
    match len {
        16 | 24 | 32 => Ok(()),
        _ => Err(CKR_KEY_SIZE_RANGE)?,
    }
}

#[derive(Debug)]
struct AesKeyGenMechanism {
    info: CK_MECHANISM_INFO,
}

impl Mechanism for AesKeyGenMechanism {
    fn info(&self) -> &CK_MECHANISM_INFO {
        &self.info
    }

    fn generate_key(
        &self,
        mech: &CK_MECHANISM,
        template: &mut Object,
    ) -> Result<()> {
        MechParams::from_mechanism(mech)?;
        let len = requested_len(template)?;
        check_key_len(len)?;
        let key = random_key(len)?;
        store_secret_key(template, CKK_AES, &key)
    }
}

static AES_KEYS: [CK_KEY_TYPE; 1] = [CKK_AES];

pub fn register(mechs: &mut Mechanisms) {
    let min = CK_ULONG::try_from(MIN_AES_SIZE_BYTES).unwrap_or(0);
    let max = CK_ULONG::try_from(MAX_AES_SIZE_BYTES).unwrap_or(0);

    mechs.add_mechanism(
        CKM_AES_KEY_GEN,
        Box::new(AesKeyGenMechanism {
            info: new_info(min, max, CKF_GENERATE),
        }),
    );

    for (ckm, mode) in [
        (CKM_AES_ECB, ChainMode::Ecb),
        (CKM_AES_CBC, ChainMode::Cbc),
        (CKM_AES_CBC_PAD, ChainMode::CbcPad),
    ] {
        mechs.add_mechanism(
            ckm,
            Box::new(BlockCipherMechanism {
                info: new_info(min, max, CKF_ENCRYPT | CKF_DECRYPT),
                mode: mode,
                key_types: &AES_KEYS,
            }),
        );
    }
}
