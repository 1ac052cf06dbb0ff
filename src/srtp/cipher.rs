//! Block-cipher stream transforms used by SRTP: counter mode and F8 mode
//! (RFC 3711, 4.1.1 and 4.1.2) over AES or Twofish.

use std::fmt;

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, InnerIvInit, KeyInit, StreamCipher};
use aes::{Aes128, Aes192, Aes256};
use twofish::Twofish;
use zeroize::{Zeroize, Zeroizing};

use super::error::{Result, SrtpError};
use super::BLOCK_LEN;

/// F8 key mask filler: m = k_s || 0x555..5 (RFC 3711, 4.1.2.1).
const F8_MASK_FILL: u8 = 0x55;

/// Block cipher behind a stream transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherFamily {
    Aes,
    Twofish,
}

/// A keyed 128-bit block cipher.
#[derive(Clone)]
enum BlockKey {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
    Twofish(Box<Twofish>),
}

impl BlockKey {
    fn new(family: CipherFamily, key: &[u8]) -> Result<Self> {
        let invalid = |_| SrtpError::InvalidKeyLength {
            what: "cipher key",
            len: key.len(),
        };
        match (family, key.len()) {
            (CipherFamily::Aes, 16) => Aes128::new_from_slice(key)
                .map(BlockKey::Aes128)
                .map_err(invalid),
            (CipherFamily::Aes, 24) => Aes192::new_from_slice(key)
                .map(BlockKey::Aes192)
                .map_err(invalid),
            (CipherFamily::Aes, 32) => Aes256::new_from_slice(key)
                .map(BlockKey::Aes256)
                .map_err(invalid),
            (CipherFamily::Twofish, 16 | 24 | 32) => Twofish::new_from_slice(key)
                .map(|c| BlockKey::Twofish(Box::new(c)))
                .map_err(invalid),
            (_, len) => Err(SrtpError::InvalidKeyLength {
                what: "cipher key",
                len,
            }),
        }
    }

    fn encrypt_block(&self, block: &mut [u8; BLOCK_LEN]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            BlockKey::Aes128(c) => c.encrypt_block(block),
            BlockKey::Aes192(c) => c.encrypt_block(block),
            BlockKey::Aes256(c) => c.encrypt_block(block),
            BlockKey::Twofish(c) => c.encrypt_block(block),
        }
    }

    /// XOR the big-endian 128-bit counter keystream starting at `iv` into `data`.
    fn apply_ctr(&self, iv: &[u8; BLOCK_LEN], data: &mut [u8]) {
        let iv = GenericArray::from_slice(iv);
        match self {
            BlockKey::Aes128(c) => {
                ctr::Ctr128BE::<Aes128>::from_core(ctr::CtrCore::inner_iv_init(c.clone(), iv))
                    .apply_keystream(data)
            }
            BlockKey::Aes192(c) => {
                ctr::Ctr128BE::<Aes192>::from_core(ctr::CtrCore::inner_iv_init(c.clone(), iv))
                    .apply_keystream(data)
            }
            BlockKey::Aes256(c) => {
                ctr::Ctr128BE::<Aes256>::from_core(ctr::CtrCore::inner_iv_init(c.clone(), iv))
                    .apply_keystream(data)
            }
            BlockKey::Twofish(c) => {
                ctr::Ctr128BE::<Twofish>::from_core(ctr::CtrCore::inner_iv_init(
                    c.as_ref().clone(),
                    iv,
                ))
                .apply_keystream(data)
            }
        }
    }
}

/// Stream cipher handle of a crypto context.
///
/// Holds the main key schedule (master key during derivation, session
/// encryption key afterwards) and, for F8, the schedule of the masked key
/// used to encrypt the IV.
pub struct SrtpCipher {
    family: CipherFamily,
    key: BlockKey,
    f8: Option<BlockKey>,
}

impl fmt::Debug for SrtpCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrtpCipher")
            .field("family", &self.family)
            .field("f8", &self.f8.is_some())
            .finish()
    }
}

impl SrtpCipher {
    pub fn new(family: CipherFamily, key: &[u8]) -> Result<Self> {
        Ok(Self {
            family,
            key: BlockKey::new(family, key)?,
            f8: None,
        })
    }

    pub fn family(&self) -> CipherFamily {
        self.family
    }

    /// Replace the key schedule. Any F8 state belongs to the old key and is dropped.
    pub fn set_key(&mut self, key: &[u8]) -> Result<()> {
        self.key = BlockKey::new(self.family, key)?;
        self.f8 = None;
        Ok(())
    }

    /// Fill `out` with counter-mode keystream starting at `iv`.
    pub fn keystream(&self, out: &mut [u8], iv: &[u8; BLOCK_LEN]) {
        out.fill(0);
        self.key.apply_ctr(iv, out);
    }

    /// Counter-mode encrypt (or decrypt) `data` in place.
    pub fn ctr_encrypt(&self, data: &mut [u8], iv: &[u8; BLOCK_LEN]) {
        self.key.apply_ctr(iv, data);
    }

    /// Prepare F8 mode: key the IV cipher with `key XOR (salt || 0x55..)`.
    pub fn f8_derive(&mut self, key: &[u8], salt: &[u8]) -> Result<()> {
        if salt.len() > key.len() {
            return Err(SrtpError::InvalidKeyLength {
                what: "F8 salt",
                len: salt.len(),
            });
        }
        let mut masked = Zeroizing::new(key.to_vec());
        for (i, b) in masked.iter_mut().enumerate() {
            *b ^= salt.get(i).copied().unwrap_or(F8_MASK_FILL);
        }
        self.f8 = Some(BlockKey::new(self.family, &masked)?);
        Ok(())
    }

    /// F8-mode encrypt (or decrypt) `data` in place.
    ///
    /// IV' = E(k_e XOR m, IV); S(j) = E(k_e, IV' XOR j XOR S(j-1)), S(-1) = 0.
    pub fn f8_encrypt(&self, data: &mut [u8], iv: &[u8; BLOCK_LEN]) -> Result<()> {
        let f8 = self.f8.as_ref().ok_or(SrtpError::F8NotInitialized)?;

        let mut iv_accent = *iv;
        f8.encrypt_block(&mut iv_accent);

        let mut s = [0u8; BLOCK_LEN];
        for (j, chunk) in data.chunks_mut(BLOCK_LEN).enumerate() {
            for (b, v) in s.iter_mut().zip(iv_accent.iter()) {
                *b ^= v;
            }
            for (b, c) in s[12..].iter_mut().zip((j as u32).to_be_bytes()) {
                *b ^= c;
            }
            self.key.encrypt_block(&mut s);
            for (b, k) in chunk.iter_mut().zip(s.iter()) {
                *b ^= k;
            }
        }
        s.zeroize();
        iv_accent.zeroize();
        Ok(())
    }
}
