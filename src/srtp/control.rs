//! SRTCP cryptographic context (RFC 3711, 3.4).
//!
//! Same shape as [`CryptoContext`](super::CryptoContext) but indexed by the
//! explicit 31-bit SRTCP index carried in every packet, so there is no ROC
//! guessing and no key derivation rate.

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::cipher::SrtpCipher;
use super::error::{Result, SrtpError};
use super::kdf::{self, MasterKeyMaterial, SRTCP_LABELS};
use super::mac::MacContext;
use super::policy::{AuthenticationAlgorithm, CryptoPolicy, EncryptionAlgorithm};
use super::replay::ReplayWindow;
use super::BLOCK_LEN;
use crate::rtcp::{self, RTCP_HEADER_SIZE, SRTCP_E_FLAG, SRTCP_INDEX_MASK, SRTCP_INDEX_SIZE};

/// Crypto state of one RTCP stream.
pub struct CryptoContextCtrl {
    ssrc: Option<u32>,
    policy: CryptoPolicy,
    master: Option<MasterKeyMaterial>,
    cipher: Option<SrtpCipher>,
    mac: Option<MacContext>,
    session_salt: Zeroizing<Vec<u8>>,
    keys_derived: bool,
    /// Highest SRTCP index accepted so far.
    s_l: u32,
    window: ReplayWindow,
    /// Index for the next outgoing packet.
    send_index: u32,
}

impl fmt::Debug for CryptoContextCtrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoContextCtrl")
            .field("ssrc", &self.ssrc)
            .field("policy", &self.policy)
            .field("master", &self.master)
            .field("keys_derived", &self.keys_derived)
            .field("s_l", &self.s_l)
            .field("send_index", &self.send_index)
            .finish()
    }
}

impl CryptoContextCtrl {
    pub fn new(
        ssrc: Option<u32>,
        policy: CryptoPolicy,
        master_key: &[u8],
        master_salt: &[u8],
    ) -> Result<Self> {
        policy.validate()?;
        let policy = policy.normalized();
        let master = MasterKeyMaterial::new(master_key, master_salt);
        master.validate_for(&policy)?;

        Ok(Self {
            ssrc,
            policy,
            master: Some(master),
            cipher: None,
            mac: None,
            session_salt: Zeroizing::new(Vec::new()),
            keys_derived: false,
            s_l: 0,
            window: ReplayWindow::new(),
            send_index: 0,
        })
    }

    /// Derive the SRTCP session keys (labels 3, 4 and 5) and wipe the master
    /// key material.
    pub fn derive_srtcp_keys(&mut self) -> Result<()> {
        let master = self.master.as_ref().ok_or(SrtpError::MasterKeyConsumed)?;
        let transforms = kdf::derive_transforms(&self.policy, master, SRTCP_LABELS, 0, 0)?;

        self.cipher = transforms.cipher;
        self.mac = transforms.mac;
        self.session_salt = transforms.salt;
        self.keys_derived = true;
        self.master = None;

        tracing::debug!(ssrc = ?self.ssrc, "derived SRTCP session keys");
        Ok(())
    }

    fn ensure_keys(&mut self) -> Result<()> {
        if self.keys_derived {
            return Ok(());
        }
        self.derive_srtcp_keys()
    }

    fn require_keys(&self) -> Result<()> {
        if !self.keys_derived && !self.policy.is_null() {
            return Err(SrtpError::KeysNotDerived);
        }
        Ok(())
    }

    /// Encrypt (or decrypt) the part of an RTCP packet after the first
    /// eight bytes. `header` is those eight bytes.
    pub fn srtcp_encrypt(
        &self,
        header: &[u8],
        payload: &mut [u8],
        index: u32,
        ssrc: u32,
    ) -> Result<()> {
        if self.policy.encryption == EncryptionAlgorithm::Null {
            return Ok(());
        }
        self.require_keys()?;
        let cipher = self.cipher.as_ref().ok_or(SrtpError::KeysNotDerived)?;

        match self.policy.encryption {
            EncryptionAlgorithm::Null => Ok(()),
            EncryptionAlgorithm::AesCm | EncryptionAlgorithm::TwofishCm => {
                let iv = cm_iv(&self.session_salt, ssrc, index);
                cipher.ctr_encrypt(payload, &iv);
                Ok(())
            }
            EncryptionAlgorithm::AesF8 | EncryptionAlgorithm::TwofishF8 => {
                let iv = f8_iv(header, index)?;
                cipher.f8_encrypt(payload, &iv)
            }
        }
    }

    /// Tag over `packet || index_word`, where `index_word` is `E || SRTCP index`.
    pub fn srtcp_authenticate(&self, packet: &[u8], index_word: u32, tag: &mut [u8]) -> Result<()> {
        if self.policy.authentication == AuthenticationAlgorithm::Null {
            return Ok(());
        }
        self.require_keys()?;
        let mac = self.mac.as_ref().ok_or(SrtpError::KeysNotDerived)?;
        mac.compute(&[packet, &index_word.to_be_bytes()[..]], tag)
    }

    /// Constant-time check of a received tag.
    pub fn verify_tag(&self, packet: &[u8], index_word: u32, received: &[u8]) -> Result<()> {
        let tag_len = self.tag_len();
        if tag_len == 0 {
            return Ok(());
        }
        let mut expected = Zeroizing::new(vec![0u8; tag_len]);
        self.srtcp_authenticate(packet, index_word, &mut expected)?;
        if received.len() == tag_len && bool::from(expected.ct_eq(received)) {
            Ok(())
        } else {
            Err(SrtpError::AuthenticationFailed)
        }
    }

    /// Replay check on the 31-bit SRTCP index. Does not change state.
    pub fn check_replay(&self, index: u32) -> Result<()> {
        if self.policy.is_null() {
            return Ok(());
        }
        let delta = index as i64 - self.s_l as i64;
        self.window.check(delta, index as u64)
    }

    /// Commit an authenticated packet to the replay window.
    pub fn update(&mut self, index: u32) {
        let delta = index as i64 - self.s_l as i64;
        self.window.update(delta);
        if index > self.s_l {
            self.s_l = index;
        }
    }

    pub fn ssrc(&self) -> Option<u32> {
        self.ssrc
    }

    pub fn is_template(&self) -> bool {
        self.ssrc.is_none()
    }

    pub fn tag_len(&self) -> usize {
        self.policy.tag_len
    }

    pub fn policy(&self) -> &CryptoPolicy {
        &self.policy
    }

    pub fn keys_derived(&self) -> bool {
        self.keys_derived
    }

    pub fn highest_index(&self) -> u32 {
        self.s_l
    }

    pub fn send_index(&self) -> u32 {
        self.send_index
    }

    pub fn set_send_index(&mut self, index: u32) {
        self.send_index = index & SRTCP_INDEX_MASK;
    }

    /// New context for `ssrc` with this context's policy and master key.
    pub fn clone_for_source(&self, ssrc: u32) -> Result<Self> {
        let master = self.master.as_ref().ok_or(SrtpError::MasterKeyConsumed)?;
        Self::new(Some(ssrc), self.policy, master.key(), master.salt())
    }

    /// Protect an outgoing RTCP packet in place: encrypt after the first
    /// eight bytes, append `E || index` and the tag.
    ///
    /// A context without encryption and authentication leaves the packet as is.
    pub fn protect(&mut self, packet: &mut Vec<u8>) -> Result<()> {
        if self.policy.is_null() {
            return Ok(());
        }
        let ssrc = rtcp::ssrc(packet).ok_or(SrtpError::PacketTooShort { len: packet.len() })?;
        self.ensure_keys()?;

        let index = self.send_index;
        let encrypted = self.policy.encryption != EncryptionAlgorithm::Null;
        if encrypted {
            let (header, payload) = packet.split_at_mut(RTCP_HEADER_SIZE);
            self.srtcp_encrypt(header, payload, index, ssrc)?;
        }

        let word = if encrypted { index | SRTCP_E_FLAG } else { index };
        let mut tag = vec![0u8; self.tag_len()];
        self.srtcp_authenticate(packet, word, &mut tag)?;
        packet.extend_from_slice(&word.to_be_bytes());
        packet.extend_from_slice(&tag);

        self.send_index = index.wrapping_add(1) & SRTCP_INDEX_MASK;
        Ok(())
    }

    /// Unprotect an incoming SRTCP packet in place: verify the tag, check
    /// the index against the replay window, decrypt, strip the trailer.
    pub fn unprotect(&mut self, packet: &mut Vec<u8>) -> Result<()> {
        if self.policy.is_null() {
            return Ok(());
        }
        let len = packet.len();
        let tag_len = self.tag_len();
        if len < RTCP_HEADER_SIZE + SRTCP_INDEX_SIZE + tag_len {
            return Err(SrtpError::PacketTooShort { len });
        }
        let ssrc = rtcp::ssrc(packet).ok_or(SrtpError::PacketTooShort { len })?;
        let tag_start = len - tag_len;
        let word_start = tag_start - SRTCP_INDEX_SIZE;
        let word = u32::from_be_bytes([
            packet[word_start],
            packet[word_start + 1],
            packet[word_start + 2],
            packet[word_start + 3],
        ]);
        let (encrypted, index) = rtcp::split_index_word(word);

        if let Err(err) = self.check_replay(index) {
            tracing::warn!(ssrc, index, %err, "SRTCP packet rejected");
            return Err(err);
        }
        self.ensure_keys()?;
        if let Err(err) = self.verify_tag(&packet[..word_start], word, &packet[tag_start..]) {
            tracing::warn!(ssrc, index, %err, "SRTCP packet rejected");
            return Err(err);
        }

        if encrypted {
            let (header, payload) = packet[..word_start].split_at_mut(RTCP_HEADER_SIZE);
            self.srtcp_encrypt(header, payload, index, ssrc)?;
        }
        packet.truncate(word_start);

        self.update(index);
        Ok(())
    }
}

/// Counter-mode IV for SRTCP: the 31-bit index goes into bytes 10..14.
fn cm_iv(salt: &[u8], ssrc: u32, index: u32) -> [u8; BLOCK_LEN] {
    let mut iv = [0u8; BLOCK_LEN];
    iv[..14].copy_from_slice(&salt[..14]);
    for (b, s) in iv[4..8].iter_mut().zip(ssrc.to_be_bytes()) {
        *b ^= s;
    }
    for (b, i) in iv[10..14].iter_mut().zip(index.to_be_bytes()) {
        *b ^= i;
    }
    iv
}

/// F8 IV for SRTCP (RFC 3711, 4.1.2.3): `0..0 || E || index || V P RC PT length SSRC`.
fn f8_iv(header: &[u8], index: u32) -> Result<[u8; BLOCK_LEN]> {
    if header.len() < RTCP_HEADER_SIZE {
        return Err(SrtpError::PacketTooShort { len: header.len() });
    }
    let mut iv = [0u8; BLOCK_LEN];
    iv[4..8].copy_from_slice(&(index | SRTCP_E_FLAG).to_be_bytes());
    iv[8..].copy_from_slice(&header[..RTCP_HEADER_SIZE]);
    Ok(iv)
}
