// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Block cipher adapter
//!
//! Every chaining mode is the OpenSSL implementation of that mode. This
//! module only adds the multi-part rules: whole blocks go to the library
//! and partial blocks wait in a local buffer, so the output size of a
//! call is known before any state changes. Single length DES keys run as
//! `K || K || K` Triple DES, double length keys as `K1 || K2 || K1`.

use std::fmt;

use crate::error::Result;
use crate::interface::*;
use crate::keymat::{secret_from_object, SecretBytes};
use crate::mechanism::*;
use crate::object::Object;

use openssl::symm::{Cipher, Crypter, Mode};
use zeroize::{Zeroize, Zeroizing};

/// Chaining mode of a block cipher mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainMode {
    Ecb,
    Cbc,
    /// CBC with PKCS#7 padding added on encryption and removed on
    /// decryption
    CbcPad,
    /// 8 bit cipher feedback
    Cfb8,
    /// Full block cipher feedback
    Cfb64,
    /// Full block output feedback
    Ofb64,
}

impl ChainMode {
    fn needs_iv(&self) -> bool {
        *self != ChainMode::Ecb
    }

    fn is_stream(&self) -> bool {
        matches!(self, ChainMode::Cfb8 | ChainMode::Cfb64 | ChainMode::Ofb64)
    }
}

/// Expands a DES family key to the 24 byte Triple DES form
fn des3_key(key_type: CK_KEY_TYPE, key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let mut full = Zeroizing::new(Vec::with_capacity(24));
    match (key_type, key.len()) {
        (CKK_DES, 8) => {
            for _ in 0..3 {
                full.extend_from_slice(key);
            }
        }
        (CKK_DES2, 16) => {
            full.extend_from_slice(key);
            full.extend_from_slice(&key[..8]);
        }
        (CKK_DES3, 24) => full.extend_from_slice(key),
        _ => return Err(CKR_KEY_SIZE_RANGE)?,
    }
    Ok(full)
}

fn aes_cipher(key_len: usize, mode: ChainMode) -> Result<Cipher> {
    Ok(match (key_len, mode) {
        (16, ChainMode::Ecb) => Cipher::aes_128_ecb(),
        (16, ChainMode::Cbc | ChainMode::CbcPad) => Cipher::aes_128_cbc(),
        (16, ChainMode::Cfb8) => Cipher::aes_128_cfb8(),
        (16, ChainMode::Cfb64) => Cipher::aes_128_cfb128(),
        (16, ChainMode::Ofb64) => Cipher::aes_128_ofb(),
        (24, ChainMode::Ecb) => Cipher::aes_192_ecb(),
        (24, ChainMode::Cbc | ChainMode::CbcPad) => Cipher::aes_192_cbc(),
        (24, ChainMode::Cfb8) => Cipher::aes_192_cfb8(),
        (24, ChainMode::Cfb64) => Cipher::aes_192_cfb128(),
        (24, ChainMode::Ofb64) => Cipher::aes_192_ofb(),
        (32, ChainMode::Ecb) => Cipher::aes_256_ecb(),
        (32, ChainMode::Cbc | ChainMode::CbcPad) => Cipher::aes_256_cbc(),
        (32, ChainMode::Cfb8) => Cipher::aes_256_cfb8(),
        (32, ChainMode::Cfb64) => Cipher::aes_256_cfb128(),
        (32, ChainMode::Ofb64) => Cipher::aes_256_ofb(),
        _ => return Err(CKR_KEY_SIZE_RANGE)?,
    })
}

/// Returns the OpenSSL cipher implementing `mode` for a key of the given
/// PKCS#11 type, and the key in the form that cipher expects
pub fn mode_cipher(
    key_type: CK_KEY_TYPE,
    key: &[u8],
    mode: ChainMode,
) -> Result<(Cipher, Zeroizing<Vec<u8>>)> {
    match key_type {
        CKK_DES | CKK_DES2 | CKK_DES3 => {
            let cipher = match mode {
                ChainMode::Ecb => Cipher::des_ede3_ecb(),
                ChainMode::Cbc | ChainMode::CbcPad => Cipher::des_ede3_cbc(),
                ChainMode::Cfb8 => Cipher::des_ede3_cfb8(),
                ChainMode::Cfb64 => Cipher::des_ede3_cfb64(),
                ChainMode::Ofb64 => Cipher::des_ede3_ofb(),
            };
            Ok((cipher, des3_key(key_type, key)?))
        }
        CKK_AES => Ok((
            aes_cipher(key.len(), mode)?,
            Zeroizing::new(key.to_vec()),
        )),
        _ => Err(CKR_KEY_TYPE_INCONSISTENT)?,
    }
}

/// Block size of the underlying block cipher, also for the feedback
/// modes that OpenSSL exposes as streams
pub fn cipher_block_size(cipher: Cipher) -> usize {
    match cipher.iv_len() {
        Some(len) => len,
        None => cipher.block_size(),
    }
}

pub fn new_crypter(
    cipher: Cipher,
    key: &[u8],
    iv: Option<&[u8]>,
    encrypt: bool,
    pad: bool,
) -> Result<Crypter> {
    let mode = if encrypt { Mode::Encrypt } else { Mode::Decrypt };
    let mut crypter = Crypter::new(cipher, mode, key, iv)?;
    crypter.pad(pad);
    Ok(crypter)
}

/// Runs `input` through the crypter and copies the result to `output`
///
/// The crypter never holds a partial block when called this way, so the
/// output is exactly as long as the input.
pub fn crypter_update(
    crypter: &mut Crypter,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize> {
    let mut scratch = Zeroizing::new(vec![0u8; input.len() + 32]);
    let len = crypter.update(input, &mut scratch)?;
    if len > output.len() {
        return Err(CKR_GENERAL_ERROR)?;
    }
    output[..len].copy_from_slice(&scratch[..len]);
    Ok(len)
}

/// Fetches the value of a secret key object for the given operation,
/// checking the key type against the accepted ones
pub fn secret_for_op(
    key: &Object,
    key_types: &[CK_KEY_TYPE],
    op: CK_ATTRIBUTE_TYPE,
) -> Result<(CK_KEY_TYPE, SecretBytes)> {
    key.check_key_ops(CKO_SECRET_KEY, CK_UNAVAILABLE_INFORMATION, op)?;
    let key_type = key.get_key_type();
    if !key_types.contains(&key_type) {
        return Err(CKR_KEY_TYPE_INCONSISTENT)?;
    }
    Ok((key_type, secret_from_object(key)?))
}

/// A multi-part encryption or decryption in one of the chaining modes
pub struct BlockCipherOperation {
    mech: CK_MECHANISM_TYPE,
    mode: ChainMode,
    encrypt: bool,
    cipher: Cipher,
    key: Zeroizing<Vec<u8>>,
    crypter: Crypter,
    block_size: usize,
    /// Input bytes not yet handed to the library
    buffer: Vec<u8>,
    /// Last cipher block handed to the library, the IV of the block that
    /// padded decryption holds back
    chain: Vec<u8>,
    finalized: bool,
    in_use: bool,
}

impl fmt::Debug for BlockCipherOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockCipherOperation")
            .field("mech", &self.mech)
            .field("mode", &self.mode)
            .field("encrypt", &self.encrypt)
            .field("finalized", &self.finalized)
            .field("in_use", &self.in_use)
            .finish()
    }
}

impl Drop for BlockCipherOperation {
    fn drop(&mut self) {
        self.buffer.zeroize();
        self.chain.zeroize();
    }
}

impl BlockCipherOperation {
    pub fn new(
        mech: CK_MECHANISM_TYPE,
        mode: ChainMode,
        key_type: CK_KEY_TYPE,
        key: &[u8],
        iv: Option<&[u8]>,
        encrypt: bool,
    ) -> Result<BlockCipherOperation> {
        let (cipher, key) = mode_cipher(key_type, key, mode)?;
        let block_size = cipher_block_size(cipher);
        let chain = match iv {
            Some(iv) if mode.needs_iv() => {
                if iv.len() != block_size {
                    return Err(CKR_MECHANISM_PARAM_INVALID)?;
                }
                iv.to_vec()
            }
            None if !mode.needs_iv() => Vec::new(),
            _ => return Err(CKR_MECHANISM_PARAM_INVALID)?,
        };
        /* the library pads on encryption, padded decryption strips the
         * held back block on its own crypter */
        let pad = mode == ChainMode::CbcPad && encrypt;
        let crypter = new_crypter(cipher, &key, iv, encrypt, pad)?;
        Ok(BlockCipherOperation {
            mech: mech,
            mode: mode,
            encrypt: encrypt,
            cipher: cipher,
            key: key,
            crypter: crypter,
            block_size: block_size,
            buffer: Vec::with_capacity(block_size),
            chain: chain,
            finalized: false,
            in_use: false,
        })
    }

    fn len_error(&self) -> CK_RV {
        if self.encrypt {
            CKR_DATA_LEN_RANGE
        } else {
            CKR_ENCRYPTED_DATA_LEN_RANGE
        }
    }

    /// Whether `len` bytes can be processed in a single call
    fn accepts_len(&self, len: usize) -> bool {
        match (self.mode, self.encrypt) {
            (m, _) if m.is_stream() => true,
            (ChainMode::CbcPad, true) => true,
            (ChainMode::CbcPad, false) => len > 0 && len % self.block_size == 0,
            _ => len % self.block_size == 0,
        }
    }

    /// Decrypts the block held back by padded decryption and strips the
    /// padding, `prev` is the cipher block preceding it
    fn padded_tail(
        &self,
        prev: &[u8],
        last: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        let mut crypter =
            new_crypter(self.cipher, &self.key, Some(prev), false, true)?;
        let bs = self.block_size;
        let mut out = Zeroizing::new(vec![0u8; 2 * bs]);
        let mut len = crypter.update(last, &mut out)?;
        len += match crypter.finalize(&mut out[len..]) {
            Ok(n) => n,
            Err(_) => return Err(CKR_ENCRYPTED_DATA_INVALID)?,
        };
        out.truncate(len);
        Ok(out)
    }

    /// Works out the output of this call and checks it fits, then hands
    /// the whole blocks to the library
    fn run(
        &mut self,
        data: &[u8],
        output: &mut [u8],
        fin: bool,
    ) -> Result<usize> {
        if self.mode.is_stream() {
            check_output(output, data.len())?;
            return crypter_update(&mut self.crypter, data, output);
        }

        let bs = self.block_size;
        let mut joined = Zeroizing::new(self.buffer.clone());
        joined.extend_from_slice(data);
        let total = joined.len();
        let mut whole = total / bs * bs;
        /* the last block may hold the padding, keep it for the final call */
        let holding = self.mode == ChainMode::CbcPad
            && !self.encrypt
            && whole > 0
            && whole == total;
        if holding {
            whole -= bs;
        }

        let mut tail: Option<Zeroizing<Vec<u8>>> = None;
        let mut tail_len = 0;
        if fin {
            match (self.mode, self.encrypt) {
                (ChainMode::CbcPad, true) => tail_len = bs,
                (ChainMode::CbcPad, false) => {
                    if !holding {
                        return Err(self.len_error())?;
                    }
                    let prev = if whole > 0 {
                        &joined[(whole - bs)..whole]
                    } else {
                        self.chain.as_slice()
                    };
                    let plain = self.padded_tail(prev, &joined[whole..])?;
                    tail_len = plain.len();
                    tail = Some(plain);
                }
                _ => {
                    if whole != total {
                        return Err(self.len_error())?;
                    }
                }
            }
        }
        check_output(output, whole + tail_len)?;

        let mut len = 0;
        if whole > 0 {
            len = crypter_update(
                &mut self.crypter,
                &joined[..whole],
                &mut output[..whole],
            )?;
            if self.mode == ChainMode::CbcPad && !self.encrypt {
                self.chain.copy_from_slice(&joined[(whole - bs)..whole]);
            }
        }
        self.buffer.zeroize();
        self.buffer.clear();
        self.buffer.extend_from_slice(&joined[whole..]);
        if !fin {
            return Ok(len);
        }

        if self.mode == ChainMode::CbcPad && self.encrypt {
            let partial = Zeroizing::new(std::mem::take(&mut self.buffer));
            let mut last = Zeroizing::new(vec![0u8; 2 * bs]);
            let mut n = self.crypter.update(&partial, &mut last)?;
            n += self.crypter.finalize(&mut last[n..])?;
            if n != bs {
                return Err(CKR_GENERAL_ERROR)?;
            }
            output[len..(len + n)].copy_from_slice(&last[..n]);
            len += n;
        }
        if let Some(plain) = tail {
            output[len..(len + plain.len())].copy_from_slice(&plain);
            len += plain.len();
        }
        self.buffer.zeroize();
        self.buffer.clear();
        Ok(len)
    }

    /// Output size for `data_len` more bytes, an upper bound for padded
    /// decryption
    fn output_len(&self, data_len: usize, fin: bool) -> usize {
        if self.mode.is_stream() {
            return data_len;
        }
        let bs = self.block_size;
        let total = self.buffer.len() + data_len;
        match (self.mode, self.encrypt, fin) {
            (ChainMode::CbcPad, true, true) => (total / bs + 1) * bs,
            (ChainMode::CbcPad, false, true) => total,
            (ChainMode::CbcPad, false, false) => {
                if total > 0 && total % bs == 0 {
                    total - bs
                } else {
                    total / bs * bs
                }
            }
            _ => total / bs * bs,
        }
    }

    fn step(
        &mut self,
        data: &[u8],
        output: &mut [u8],
        fin: bool,
    ) -> Result<usize> {
        match self.run(data, output, fin) {
            Ok(len) => {
                if fin {
                    self.finalized = true;
                }
                Ok(len)
            }
            Err(e) => {
                if e.rv() != CKR_BUFFER_TOO_SMALL {
                    self.finalized = true;
                }
                Err(e)
            }
        }
    }

    fn one_shot(&mut self, data: &[u8], output: &mut [u8]) -> Result<usize> {
        if self.in_use || self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        if !self.accepts_len(data.len()) {
            self.finalized = true;
            return Err(self.len_error())?;
        }
        self.step(data, output, true)
    }

    fn update(&mut self, data: &[u8], output: &mut [u8]) -> Result<usize> {
        if self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        let len = self.step(data, output, false)?;
        self.in_use = true;
        Ok(len)
    }

    fn finish(&mut self, output: &mut [u8]) -> Result<usize> {
        if self.finalized {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        self.step(&[], output, true)
    }
}

impl MechOperation for BlockCipherOperation {
    fn mechanism(&self) -> CK_MECHANISM_TYPE {
        self.mech
    }

    fn finalized(&self) -> bool {
        self.finalized
    }
}

impl Encryption for BlockCipherOperation {
    fn encrypt(&mut self, plain: &[u8], cipher: &mut [u8]) -> Result<usize> {
        self.one_shot(plain, cipher)
    }

    fn encrypt_update(
        &mut self,
        plain: &[u8],
        cipher: &mut [u8],
    ) -> Result<usize> {
        self.update(plain, cipher)
    }

    fn encrypt_final(&mut self, cipher: &mut [u8]) -> Result<usize> {
        self.finish(cipher)
    }

    fn encryption_len(&self, data_len: usize, fin: bool) -> Result<usize> {
        Ok(self.output_len(data_len, fin))
    }
}

impl Decryption for BlockCipherOperation {
    fn decrypt(&mut self, cipher: &[u8], plain: &mut [u8]) -> Result<usize> {
        self.one_shot(cipher, plain)
    }

    fn decrypt_update(
        &mut self,
        cipher: &[u8],
        plain: &mut [u8],
    ) -> Result<usize> {
        self.update(cipher, plain)
    }

    fn decrypt_final(&mut self, plain: &mut [u8]) -> Result<usize> {
        self.finish(plain)
    }

    fn decryption_len(&self, data_len: usize, fin: bool) -> Result<usize> {
        Ok(self.output_len(data_len, fin))
    }
}

/// Encrypts or decrypts `data` in one call
///
/// Outside of padded CBC encryption the block modes take a whole number
/// of blocks, anything else fails with `CKR_DATA_LEN_RANGE` in either
/// direction. The feedback modes take any length.
pub fn cipher(
    key_type: CK_KEY_TYPE,
    key: &[u8],
    mode: ChainMode,
    iv: Option<&[u8]>,
    encrypt: bool,
    data: &[u8],
) -> Result<Vec<u8>> {
    let mut op = BlockCipherOperation::new(
        CK_UNAVAILABLE_INFORMATION,
        mode,
        key_type,
        key,
        iv,
        encrypt,
    )?;
    if !op.accepts_len(data.len()) {
        return Err(CKR_DATA_LEN_RANGE)?;
    }
    let mut out = vec![0u8; op.output_len(data.len(), true)];
    let len = op.one_shot(data, &mut out)?;
    out.truncate(len);
    Ok(out)
}

/// Mechanism entry for one chaining mode of one cipher family
#[derive(Debug)]
pub struct BlockCipherMechanism {
    pub info: CK_MECHANISM_INFO,
    pub mode: ChainMode,
    pub key_types: &'static [CK_KEY_TYPE],
}

impl BlockCipherMechanism {
    fn operation(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
        encrypt: bool,
    ) -> Result<BlockCipherOperation> {
        let params = MechParams::from_mechanism(mech)?;
        let iv = match self.mode {
            ChainMode::Ecb => None,
            _ => Some(params.iv()?),
        };
        let op = if encrypt { CKA_ENCRYPT } else { CKA_DECRYPT };
        let (key_type, value) = secret_for_op(key, self.key_types, op)?;
        BlockCipherOperation::new(
            mech.mechanism,
            self.mode,
            key_type,
            value.as_slice(),
            iv,
            encrypt,
        )
    }
}

impl Mechanism for BlockCipherMechanism {
    fn info(&self) -> &CK_MECHANISM_INFO {
        &self.info
    }

    fn encryption_new(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
    ) -> Result<Box<dyn Encryption>> {
        Ok(Box::new(self.operation(mech, key, true)?))
    }

    fn decryption_new(
        &self,
        mech: &CK_MECHANISM,
        key: &Object,
    ) -> Result<Box<dyn Decryption>> {
        Ok(Box::new(self.operation(mech, key, false)?))
    }
}
