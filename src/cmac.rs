// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Cipher based MAC as defined in NIST SP 800-38B

use crate::blockcipher::{cipher_block_size, mode_cipher, ChainMode};
use crate::cbcmac::{register_families, AES_MAC_KEYS, DES3_MAC_KEYS};
use crate::error::Result;
use crate::interface::*;
use crate::mechanism::*;

use openssl::pkey::PKey;
use openssl::sign::Signer;
use zeroize::Zeroizing;

/// OpenSSL CMAC context over the CBC cipher of the key
pub struct Cmac {
    signer: Signer<'static>,
    block_size: usize,
}

impl Cmac {
    pub fn new(key_type: CK_KEY_TYPE, key: &[u8]) -> Result<Cmac> {
        let (cipher, key) = mode_cipher(key_type, key, ChainMode::Cbc)?;
        let pkey = PKey::cmac(&cipher, &key)?;
        let signer: Signer<'static> = Signer::new_without_digest(&pkey)?;
        Ok(Cmac {
            signer: signer,
            block_size: cipher_block_size(cipher),
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn update(&mut self, data: &[u8]) -> Result<()> {
        Ok(self.signer.update(data)?)
    }

    pub fn tag(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new(self.signer.sign_to_vec()?))
    }
}

pub fn register(mechs: &mut Mechanisms) {
    register_families(
        mechs,
        &[
            (CKM_DES3_CMAC, CKM_DES3_CMAC_GENERAL, 16, 24, &DES3_MAC_KEYS),
            (CKM_AES_CMAC, CKM_AES_CMAC_GENERAL, 16, 32, &AES_MAC_KEYS),
        ],
        true,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cbcmac::{BlockMacOperation, MacEngine};

    const KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";
    const MSG: &str = "6bc1bee22e409f96e93d7e117393172a\
                       ae2d8a571e03ac9c9eb76fac45af8e51\
                       30c81c46a35ce411e5fbc1191a0a52ef\
                       f69f2445df4f9b17ad2b417be66c3710";

    fn cmac_op(outputlen: usize) -> BlockMacOperation {
        let key = hex::decode(KEY).unwrap();
        let engine = MacEngine::Cmac(Cmac::new(CKK_AES, &key).unwrap());
        BlockMacOperation::new(CKM_AES_CMAC, engine, outputlen).unwrap()
    }

    #[test]
    fn test_aes128_vectors() {
        let msg = hex::decode(MSG).unwrap();
        for (len, expect) in [
            (0, "bb1d6929e95937287fa37d129b756746"),
            (16, "070a16b46b4d4144f79bdd9dd04a287c"),
            (40, "dfa66747de9ae63030ca32611497c827"),
            (64, "51f0bebf7e3b9d92fc49741779363cfe"),
        ] {
            let mut tag = [0u8; 16];
            let mut op = cmac_op(16);
            op.mac(&msg[..len], &mut tag).unwrap();
            assert_eq!(hex::encode(tag), expect);

            /* same result fed in uneven pieces */
            let mut op = cmac_op(16);
            for chunk in msg[..len].chunks(7) {
                op.mac_update(chunk).unwrap();
            }
            let mut tag2 = [0u8; 16];
            op.mac_final(&mut tag2).unwrap();
            assert_eq!(tag, tag2);
        }
    }

    #[test]
    fn test_double_length_key() {
        let k1 = hex::decode("8aa83bf8cbda1062").unwrap();
        let k2 = hex::decode("0bc1bf19fbb6cd58").unwrap();
        let double = [k1.as_slice(), k2.as_slice()].concat();
        let triple = [k1.as_slice(), k2.as_slice(), k1.as_slice()].concat();
        let msg = hex::decode(MSG).unwrap();

        let mut tags = Vec::new();
        for (key_type, key) in [(CKK_DES2, &double), (CKK_DES3, &triple)] {
            let engine = MacEngine::Cmac(Cmac::new(key_type, key).unwrap());
            let mut op =
                BlockMacOperation::new(CKM_DES3_CMAC, engine, 8).unwrap();
            let mut tag = [0u8; 8];
            op.mac(&msg[..20], &mut tag).unwrap();
            tags.push(tag);
        }
        assert_eq!(tags[0], tags[1]);
    }

    #[test]
    fn test_truncated_verify() {
        let msg = hex::decode(MSG).unwrap();
        let expect = hex::decode("dfa66747de9ae630").unwrap();
        let mut op = cmac_op(8);
        op.verify(&msg[..40], &expect).unwrap();

        let mut bad = expect.clone();
        bad[0] ^= 1;
        let mut op = cmac_op(8);
        assert_eq!(
            op.verify(&msg[..40], &bad).unwrap_err().rv(),
            CKR_SIGNATURE_INVALID
        );
    }
}
