//! Session key derivation (RFC 3711, 4.3.1).
//!
//! Each session key is a slice of AES-CM (or Twofish-CM) keystream keyed
//! with the master key, with the IV built from the master salt, a label and
//! `index DIV key_derivation_rate`.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::cipher::SrtpCipher;
use super::error::{Result, SrtpError};
use super::mac::MacContext;
use super::policy::{CryptoPolicy, EncryptionAlgorithm};
use super::{BLOCK_LEN, MASTER_SALT_LEN};

/// Labels selecting the encryption key, authentication key and salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLabels {
    pub encryption: u8,
    pub authentication: u8,
    pub salt: u8,
}

/// SRTP key derivation labels (RFC 3711, section 4.3.1).
pub const SRTP_LABELS: KeyLabels = KeyLabels {
    encryption: 0x00,
    authentication: 0x01,
    salt: 0x02,
};

/// SRTCP key derivation labels (RFC 3711, section 4.3.2).
pub const SRTCP_LABELS: KeyLabels = KeyLabels {
    encryption: 0x03,
    authentication: 0x04,
    salt: 0x05,
};

/// Master key and master salt. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKeyMaterial {
    key: Vec<u8>,
    salt: Vec<u8>,
}

impl fmt::Debug for MasterKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKeyMaterial")
            .field("key_len", &self.key.len())
            .field("salt_len", &self.salt.len())
            .finish()
    }
}

impl MasterKeyMaterial {
    pub fn new(key: &[u8], salt: &[u8]) -> Self {
        Self {
            key: key.to_vec(),
            salt: salt.to_vec(),
        }
    }

    /// Split concatenated `key || salt` bytes (the SDES/ZRTP "inline" layout).
    pub fn from_concatenated(bytes: &[u8], key_len: usize) -> Result<Self> {
        if bytes.len() < key_len + MASTER_SALT_LEN {
            return Err(SrtpError::InvalidKeyLength {
                what: "master key material",
                len: bytes.len(),
            });
        }
        Ok(Self::new(
            &bytes[..key_len],
            &bytes[key_len..key_len + MASTER_SALT_LEN],
        ))
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Check lengths against what the policy's PRF and IV construction need.
    pub fn validate_for(&self, policy: &CryptoPolicy) -> Result<()> {
        if policy.is_null() {
            return Ok(());
        }
        // Both PRF ciphers take 128, 192 or 256 bit keys.
        if !matches!(self.key.len(), 16 | 24 | 32) {
            return Err(SrtpError::InvalidKeyLength {
                what: "master key",
                len: self.key.len(),
            });
        }
        if self.salt.len() != MASTER_SALT_LEN {
            return Err(SrtpError::InvalidKeyLength {
                what: "master salt",
                len: self.salt.len(),
            });
        }
        Ok(())
    }
}

/// Derived session keys. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    pub encryption_key: Vec<u8>,
    pub auth_key: Vec<u8>,
    pub salt: Vec<u8>,
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("encryption_key_len", &self.encryption_key.len())
            .field("auth_key_len", &self.auth_key.len())
            .field("salt_len", &self.salt.len())
            .finish()
    }
}

/// Build the key-derivation IV.
///
/// ```text
/// key_id:                           XX XX XX XX XX XX XX
/// master_salt: XX XX XX XX XX XX XX XX XX XX XX XX XX XX
/// ------------------------------------------------------------ XOR
/// IV:          XX XX XX XX XX XX XX XX XX XX XX XX XX XX 00 00
/// ```
///
/// `master_salt` must hold at least 14 bytes.
pub fn compute_iv(
    label: u8,
    index: u64,
    key_derivation_rate: u64,
    master_salt: &[u8],
) -> [u8; BLOCK_LEN] {
    let key_id = if key_derivation_rate == 0 {
        (label as u64) << 48
    } else {
        ((label as u64) << 48) | (index / key_derivation_rate)
    };

    let mut iv = [0u8; BLOCK_LEN];
    iv[..7].copy_from_slice(&master_salt[..7]);
    for i in 7..MASTER_SALT_LEN {
        iv[i] = ((key_id >> (8 * (13 - i))) & 0xFF) as u8 ^ master_salt[i];
    }
    iv
}

/// Fill `out` with the key for `label`. `prf` must be keyed with the master key.
pub fn derive_key(
    prf: &SrtpCipher,
    master_salt: &[u8],
    label: u8,
    index: u64,
    key_derivation_rate: u64,
    out: &mut [u8],
) {
    let iv = compute_iv(label, index, key_derivation_rate, master_salt);
    prf.keystream(out, &iv);
}

/// Derive all three session keys for `policy` in one go.
pub fn derive_session_keys(
    policy: &CryptoPolicy,
    master: &MasterKeyMaterial,
    labels: KeyLabels,
    index: u64,
    key_derivation_rate: u64,
) -> Result<SessionKeys> {
    policy.validate()?;
    master.validate_for(policy)?;
    let policy = policy.normalized();

    let mut keys = SessionKeys {
        encryption_key: vec![0u8; policy.encryption_key_len],
        auth_key: vec![0u8; policy.auth_key_len],
        salt: vec![0u8; policy.salt_len],
    };
    if policy.is_null() {
        return Ok(keys);
    }

    let prf = SrtpCipher::new(policy.prf_family(), master.key())?;
    let salt = master.salt();
    derive_key(
        &prf,
        salt,
        labels.encryption,
        index,
        key_derivation_rate,
        &mut keys.encryption_key,
    );
    derive_key(
        &prf,
        salt,
        labels.authentication,
        index,
        key_derivation_rate,
        &mut keys.auth_key,
    );
    derive_key(
        &prf,
        salt,
        labels.salt,
        index,
        key_derivation_rate,
        &mut keys.salt,
    );
    Ok(keys)
}

/// Keyed transforms of one derivation: the payload cipher, the MAC and the
/// session salt. The raw encryption and authentication keys are not kept.
#[derive(Debug)]
pub struct SessionTransforms {
    pub cipher: Option<SrtpCipher>,
    pub mac: Option<MacContext>,
    pub salt: Zeroizing<Vec<u8>>,
}

/// Derive session keys and key the transforms for `policy`.
///
/// Order: encryption key, authentication key (MAC keyed, key wiped), session
/// salt, then the PRF cipher is re-keyed with the encryption key and, for F8,
/// the IV cipher is prepared.
pub fn derive_transforms(
    policy: &CryptoPolicy,
    master: &MasterKeyMaterial,
    labels: KeyLabels,
    index: u64,
    key_derivation_rate: u64,
) -> Result<SessionTransforms> {
    master.validate_for(policy)?;
    let policy = policy.normalized();
    if policy.is_null() {
        return Ok(SessionTransforms {
            cipher: None,
            mac: None,
            salt: Zeroizing::new(Vec::new()),
        });
    }

    let mut prf = SrtpCipher::new(policy.prf_family(), master.key())?;
    let salt = master.salt();

    let mut encryption_key = Zeroizing::new(vec![0u8; policy.encryption_key_len]);
    derive_key(
        &prf,
        salt,
        labels.encryption,
        index,
        key_derivation_rate,
        &mut encryption_key,
    );

    let mac = {
        let mut auth_key = Zeroizing::new(vec![0u8; policy.auth_key_len]);
        derive_key(
            &prf,
            salt,
            labels.authentication,
            index,
            key_derivation_rate,
            &mut auth_key,
        );
        MacContext::new(policy.authentication, &auth_key, policy.tag_len)?
    };

    let mut session_salt = Zeroizing::new(vec![0u8; policy.salt_len]);
    derive_key(
        &prf,
        salt,
        labels.salt,
        index,
        key_derivation_rate,
        &mut session_salt,
    );

    let cipher = if policy.encryption == EncryptionAlgorithm::Null {
        None
    } else {
        prf.set_key(&encryption_key)?;
        if policy.encryption.is_f8() {
            prf.f8_derive(&encryption_key, &session_salt)?;
        }
        Some(prf)
    };

    Ok(SessionTransforms {
        cipher,
        mac,
        salt: session_salt,
    })
}
