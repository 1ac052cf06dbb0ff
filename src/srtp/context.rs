//! SRTP cryptographic context for one RTP synchronization source.

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::cipher::SrtpCipher;
use super::error::{Result, SrtpError};
use super::kdf::{self, MasterKeyMaterial, SessionTransforms, SRTP_LABELS};
use super::mac::MacContext;
use super::policy::{AuthenticationAlgorithm, CryptoPolicy, EncryptionAlgorithm};
use super::replay::{IndexGuess, ReplayWindow, SequenceState};
use super::BLOCK_LEN;
use crate::rtp;

/// Crypto state of one RTP stream: keys, transforms, ROC and replay window.
///
/// A context built with `ssrc: None` is a template that hands out per-source
/// copies via [`CryptoContext::clone_for_source`]. It can still process
/// packets itself, taking the SSRC from each packet header.
pub struct CryptoContext {
    ssrc: Option<u32>,
    policy: CryptoPolicy,
    key_derivation_rate: u64,
    /// `None` once consumed by a derivation with rate 0.
    master: Option<MasterKeyMaterial>,
    cipher: Option<SrtpCipher>,
    mac: Option<MacContext>,
    session_salt: Zeroizing<Vec<u8>>,
    /// `index / key_derivation_rate` at the last derivation.
    derived_epoch: Option<u64>,
    sequence: SequenceState,
    window: ReplayWindow,
}

impl fmt::Debug for CryptoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoContext")
            .field("ssrc", &self.ssrc)
            .field("policy", &self.policy)
            .field("key_derivation_rate", &self.key_derivation_rate)
            .field("master", &self.master)
            .field("keys_derived", &self.derived_epoch.is_some())
            .field("roc", &self.sequence.roc())
            .finish()
    }
}

impl CryptoContext {
    /// Build a context. Session keys are not derived yet.
    ///
    /// Lengths are checked here so a context can never end up half keyed.
    pub fn new(
        ssrc: Option<u32>,
        roc: u32,
        key_derivation_rate: u64,
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
            key_derivation_rate,
            master: Some(master),
            cipher: None,
            mac: None,
            session_salt: Zeroizing::new(Vec::new()),
            derived_epoch: None,
            sequence: SequenceState::new(roc),
            window: ReplayWindow::new(),
        })
    }

    /// Derive (or re-derive) the session keys for packet `index`.
    ///
    /// With a key derivation rate of 0 the master key material is wiped
    /// afterwards and a second call fails with `MasterKeyConsumed`.
    pub fn derive_srtp_keys(&mut self, index: u64) -> Result<()> {
        let transforms = self.derive_transforms(index)?;
        self.install(transforms, index);
        Ok(())
    }

    fn derive_transforms(&self, index: u64) -> Result<SessionTransforms> {
        let master = self.master.as_ref().ok_or(SrtpError::MasterKeyConsumed)?;
        kdf::derive_transforms(
            &self.policy,
            master,
            SRTP_LABELS,
            index,
            self.key_derivation_rate,
        )
    }

    fn install(&mut self, transforms: SessionTransforms, index: u64) {
        if self.derived_epoch.is_some() {
            tracing::info!(ssrc = ?self.ssrc, index, "re-deriving SRTP session keys");
        }
        self.cipher = transforms.cipher;
        self.mac = transforms.mac;
        self.session_salt = transforms.salt;
        self.derived_epoch = Some(self.epoch_of(index));
        if self.key_derivation_rate == 0 {
            self.master = None;
        }

        tracing::debug!(
            ssrc = ?self.ssrc,
            index,
            encryption = ?self.policy.encryption,
            authentication = ?self.policy.authentication,
            "derived SRTP session keys"
        );
    }

    fn epoch_of(&self, index: u64) -> u64 {
        if self.key_derivation_rate == 0 {
            0
        } else {
            index / self.key_derivation_rate
        }
    }

    /// Fresh transforms when `index` needs keys other than the installed
    /// ones: on first use and on every key-derivation-rate boundary.
    fn pending_transforms(&self, index: u64) -> Result<Option<SessionTransforms>> {
        match self.derived_epoch {
            Some(epoch) if epoch == self.epoch_of(index) => Ok(None),
            _ => self.derive_transforms(index).map(Some),
        }
    }

    fn ensure_keys(&mut self, index: u64) -> Result<()> {
        if let Some(transforms) = self.pending_transforms(index)? {
            self.install(transforms, index);
        }
        Ok(())
    }

    fn require_keys(&self) -> Result<()> {
        if self.derived_epoch.is_none() && !self.policy.is_null() {
            return Err(SrtpError::KeysNotDerived);
        }
        Ok(())
    }

    /// Encrypt `payload` in place. Decryption is the same operation.
    ///
    /// `header` is the RTP header the payload belongs to (used by F8), `index`
    /// the 48-bit packet index.
    pub fn srtp_encrypt(
        &self,
        header: &[u8],
        payload: &mut [u8],
        index: u64,
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
                let iv = f8_iv(header, (index >> 16) as u32)?;
                cipher.f8_encrypt(payload, &iv)
            }
        }
    }

    /// Write the tag over `packet || ROC` into `tag[..tag_len]`.
    ///
    /// `packet` is header plus payload without any tag.
    pub fn srtp_authenticate(&self, packet: &[u8], roc: u32, tag: &mut [u8]) -> Result<()> {
        if self.policy.authentication == AuthenticationAlgorithm::Null {
            return Ok(());
        }
        self.require_keys()?;
        let mac = self.mac.as_ref().ok_or(SrtpError::KeysNotDerived)?;
        compute_tag(mac, packet, roc, tag)
    }

    /// Recompute the tag for `packet` and compare it with `received` in
    /// constant time.
    pub fn verify_tag(&self, packet: &[u8], roc: u32, received: &[u8]) -> Result<()> {
        if self.tag_len() == 0 {
            return Ok(());
        }
        self.require_keys()?;
        let mac = self.mac.as_ref().ok_or(SrtpError::KeysNotDerived)?;
        check_tag(mac, packet, roc, received)
    }

    /// Estimate the 48-bit index of `new_seq` from the ROC and `s_l`.
    pub fn guess_index(&self, new_seq: u16) -> IndexGuess {
        self.sequence.guess(new_seq)
    }

    /// Replay check for an incoming sequence number. Does not change state.
    ///
    /// Always passes when neither encryption nor authentication is in use.
    pub fn check_replay(&self, new_seq: u16) -> Result<()> {
        if self.policy.is_null() {
            return Ok(());
        }
        let guess = self.sequence.guess(new_seq);
        if guess.wire_roc().is_none() {
            return Err(SrtpError::ReplayTooOld {
                index: guess.index().max(0) as u64,
            });
        }
        self.window
            .check(self.sequence.delta(new_seq), guess.index() as u64)
    }

    /// Commit an authenticated packet to the replay window and ROC.
    pub fn update(&mut self, new_seq: u16) {
        let delta = self.sequence.delta(new_seq);
        self.window.update(delta);
        if self.sequence.commit(new_seq) {
            tracing::debug!(ssrc = ?self.ssrc, roc = self.sequence.roc(), "ROC rolled over");
        }
    }

    pub fn ssrc(&self) -> Option<u32> {
        self.ssrc
    }

    pub fn is_template(&self) -> bool {
        self.ssrc.is_none()
    }

    pub fn roc(&self) -> u32 {
        self.sequence.roc()
    }

    pub fn set_roc(&mut self, roc: u32) {
        self.sequence.set_roc(roc);
    }

    pub fn tag_len(&self) -> usize {
        self.policy.tag_len
    }

    pub fn policy(&self) -> &CryptoPolicy {
        &self.policy
    }

    pub fn key_derivation_rate(&self) -> u64 {
        self.key_derivation_rate
    }

    pub fn keys_derived(&self) -> bool {
        self.derived_epoch.is_some()
    }

    /// New context for `ssrc` with this context's policy and master key
    /// material, fresh ROC and replay state. `self` is not modified.
    pub fn clone_for_source(&self, ssrc: u32, roc: u32, key_derivation_rate: u64) -> Result<Self> {
        let master = self.master.as_ref().ok_or(SrtpError::MasterKeyConsumed)?;
        Self::new(
            Some(ssrc),
            roc,
            key_derivation_rate,
            self.policy,
            master.key(),
            master.salt(),
        )
    }

    /// Protect an outgoing RTP packet in place: encrypt the payload and
    /// append the tag. Bumps the ROC after sequence number 0xFFFF.
    pub fn protect(&mut self, packet: &mut Vec<u8>) -> Result<()> {
        let len = packet.len();
        let too_short = || SrtpError::PacketTooShort { len };
        let header_len = rtp::full_header_len(packet).ok_or_else(too_short)?;
        let seq = rtp::sequence_number(packet).ok_or_else(too_short)?;
        let ssrc = rtp::ssrc(packet).ok_or_else(too_short)?;

        let roc = self.sequence.roc();
        let index = ((roc as u64) << 16) | seq as u64;
        self.ensure_keys(index)?;

        let (header, payload) = packet.split_at_mut(header_len);
        self.srtp_encrypt(header, payload, index, ssrc)?;

        let tag_len = self.tag_len();
        if tag_len > 0 {
            let mut tag = vec![0u8; tag_len];
            self.srtp_authenticate(packet, roc, &mut tag)?;
            packet.extend_from_slice(&tag);
        }

        if seq == u16::MAX {
            self.sequence.set_roc(roc.wrapping_add(1));
        }
        Ok(())
    }

    /// Unprotect an incoming SRTP packet in place: replay check, verify and
    /// strip the tag, decrypt, then update the replay state.
    ///
    /// On error the packet must be dropped; ROC and replay state are left
    /// unchanged.
    pub fn unprotect(&mut self, packet: &mut Vec<u8>) -> Result<()> {
        let tag_len = self.tag_len();
        let len = packet.len();
        let too_short = || SrtpError::PacketTooShort { len };
        let header_len = rtp::full_header_len(packet).ok_or_else(too_short)?;
        if len < header_len + tag_len {
            return Err(too_short());
        }
        let seq = rtp::sequence_number(packet).ok_or_else(too_short)?;
        let ssrc = rtp::ssrc(packet).ok_or_else(too_short)?;

        if let Err(err) = self.check_replay(seq) {
            tracing::warn!(ssrc, seq, %err, "SRTP packet rejected");
            return Err(err);
        }

        let guess = self.sequence.guess(seq);
        let roc = guess.wire_roc().ok_or(SrtpError::ReplayTooOld {
            index: guess.index().max(0) as u64,
        })?;
        let index = ((roc as u64) << 16) | seq as u64;

        // Keys for a new epoch are only installed once the tag checks out.
        let pending = self.pending_transforms(index)?;
        let tag_start = packet.len() - tag_len;
        if tag_len > 0 {
            let mac = match &pending {
                Some(transforms) => transforms.mac.as_ref(),
                None => self.mac.as_ref(),
            }
            .ok_or(SrtpError::KeysNotDerived)?;
            if let Err(err) = check_tag(mac, &packet[..tag_start], roc, &packet[tag_start..]) {
                tracing::warn!(ssrc, seq, %err, "SRTP packet rejected");
                return Err(err);
            }
        }
        if let Some(transforms) = pending {
            self.install(transforms, index);
        }

        let (header, payload) = packet[..tag_start].split_at_mut(header_len);
        self.srtp_encrypt(header, payload, index, ssrc)?;
        packet.truncate(tag_start);

        self.update(seq);
        Ok(())
    }
}

fn compute_tag(mac: &MacContext, packet: &[u8], roc: u32, tag: &mut [u8]) -> Result<()> {
    mac.compute(&[packet, &roc.to_be_bytes()[..]], tag)
}

/// Constant-time comparison of `received` against the tag over `packet || ROC`.
fn check_tag(mac: &MacContext, packet: &[u8], roc: u32, received: &[u8]) -> Result<()> {
    let mut expected = Zeroizing::new(vec![0u8; mac.tag_len()]);
    compute_tag(mac, packet, roc, &mut expected)?;
    if received.len() == expected.len() && bool::from(expected.ct_eq(received)) {
        Ok(())
    } else {
        Err(SrtpError::AuthenticationFailed)
    }
}

/// Counter-mode IV (RFC 3711, 4.1.1).
///
/// ```text
/// k_s   XX XX XX XX XX XX XX XX XX XX XX XX XX XX
/// SSRC              XX XX XX XX
/// index                         XX XX XX XX XX XX
/// ------------------------------------------------------XOR
/// IV    XX XX XX XX XX XX XX XX XX XX XX XX XX XX 00 00
/// ```
fn cm_iv(salt: &[u8], ssrc: u32, index: u64) -> [u8; BLOCK_LEN] {
    let mut iv = [0u8; BLOCK_LEN];
    iv[..14].copy_from_slice(&salt[..14]);
    for (b, s) in iv[4..8].iter_mut().zip(ssrc.to_be_bytes()) {
        *b ^= s;
    }
    for (b, i) in iv[8..14].iter_mut().zip(&index.to_be_bytes()[2..]) {
        *b ^= i;
    }
    iv
}

/// F8 IV (RFC 3711, 4.1.2.2): `0x00 || M PT SEQ TS SSRC || ROC`.
fn f8_iv(header: &[u8], roc: u32) -> Result<[u8; BLOCK_LEN]> {
    if header.len() < rtp::RTP_HEADER_SIZE {
        return Err(SrtpError::PacketTooShort { len: header.len() });
    }
    let mut iv = [0u8; BLOCK_LEN];
    iv[1..12].copy_from_slice(&header[1..12]);
    iv[12..].copy_from_slice(&roc.to_be_bytes());
    Ok(iv)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER_KEY: [u8; 16] = [
        0xe1, 0xf9, 0x7a, 0x0d, 0x3e, 0x01, 0x8b, 0xe0, 0xd6, 0x4f, 0xa3, 0x2c, 0x06, 0xde, 0x41,
        0x39,
    ];
    const MASTER_SALT: [u8; 14] = [
        0x0e, 0xc6, 0x75, 0xad, 0x49, 0x8a, 0xfe, 0xeb, 0xb6, 0x96, 0x0b, 0x3a, 0xab, 0xe6,
    ];

    fn context(policy: CryptoPolicy) -> CryptoContext {
        CryptoContext::new(Some(0xcafebabe), 0, 0, policy, &MASTER_KEY, &MASTER_SALT).unwrap()
    }

    fn packet(seq: u16) -> Vec<u8> {
        rtp::encode(0, seq, seq as u32 * 160, 0xcafebabe, &[0xab; 16])
    }

    #[test]
    fn test_protect_known_answer() {
        // AES_CM_128_HMAC_SHA1_80, SSRC cafebabe, seq 0x1234, ROC 0.
        let mut ctx = context(CryptoPolicy::aes_cm_128_hmac_sha1_80());
        let mut pkt = vec![
            0x80, 0x0f, 0x12, 0x34, 0xde, 0xca, 0xfb, 0xad, 0xca, 0xfe, 0xba, 0xbe,
        ];
        pkt.extend_from_slice(&[0xab; 16]);
        ctx.protect(&mut pkt).unwrap();
        let expected = [
            0x80, 0x0f, 0x12, 0x34, 0xde, 0xca, 0xfb, 0xad, 0xca, 0xfe, 0xba, 0xbe, 0x4e, 0x55,
            0xdc, 0x4c, 0xe7, 0x99, 0x78, 0xd8, 0x8c, 0xa4, 0xd2, 0x15, 0x94, 0x9d, 0x24, 0x02,
            0xb7, 0x8d, 0x6a, 0xcc, 0x99, 0xea, 0x17, 0x9b, 0x8d, 0xbb,
        ];
        assert_eq!(pkt, expected);
    }

    #[test]
    fn test_end_to_end_all_policies() {
        for policy in [
            CryptoPolicy::aes_cm_128_hmac_sha1_80(),
            CryptoPolicy::aes_cm_128_hmac_sha1_32(),
            CryptoPolicy::aes_cm_256_hmac_sha1_80(),
            CryptoPolicy::aes_f8_128_hmac_sha1_80(),
            CryptoPolicy::twofish_cm_128_hmac_sha1_80(),
            CryptoPolicy::twofish_f8_128_hmac_sha1_80(),
            CryptoPolicy::aes_cm_128_skein_64(),
            CryptoPolicy::aes_cm_128_skein_32(),
        ] {
            let mut sender = context(policy);
            let mut receiver = context(policy);
            for seq in 1..=20u16 {
                let plain = packet(seq);
                let mut pkt = plain.clone();
                sender.protect(&mut pkt).unwrap();
                assert_eq!(pkt.len(), plain.len() + policy.tag_len);
                assert_ne!(&pkt[12..plain.len()], &plain[12..], "{:?}", policy);
                receiver.unprotect(&mut pkt).unwrap();
                assert_eq!(pkt, plain, "{:?}", policy);
            }
        }
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut sender = context(CryptoPolicy::default());
        let mut receiver = context(CryptoPolicy::default());
        let mut pkt = packet(7);
        sender.protect(&mut pkt).unwrap();
        let copy = pkt.clone();
        receiver.unprotect(&mut pkt).unwrap();

        let mut again = copy;
        assert_eq!(
            receiver.unprotect(&mut again),
            Err(SrtpError::ReplayDuplicate { index: 7 })
        );
    }

    #[test]
    fn test_corrupted_payload_fails_auth() {
        let mut sender = context(CryptoPolicy::default());
        let mut receiver = context(CryptoPolicy::default());
        let mut pkt = packet(1);
        sender.protect(&mut pkt).unwrap();
        pkt[15] ^= 0x01;
        let before = pkt.clone();
        assert_eq!(
            receiver.unprotect(&mut pkt),
            Err(SrtpError::AuthenticationFailed)
        );
        // Nothing was decrypted or committed, and the master key is intact.
        assert_eq!(pkt, before);
        assert!(!receiver.sequence.is_started());
        assert!(!receiver.keys_derived());
        assert!(receiver.master.is_some());

        // The genuine packet still gets through afterwards.
        pkt[15] ^= 0x01;
        receiver.unprotect(&mut pkt).unwrap();
    }

    #[test]
    fn test_roc_rollover_end_to_end() {
        let mut sender = context(CryptoPolicy::default());
        let mut receiver = context(CryptoPolicy::default());
        for seq in [65533u16, 65534, 65535, 0, 1, 2] {
            let plain = packet(seq);
            let mut pkt = plain.clone();
            sender.protect(&mut pkt).unwrap();
            receiver.unprotect(&mut pkt).unwrap();
            assert_eq!(pkt, plain);
        }
        assert_eq!(sender.roc(), 1);
        assert_eq!(receiver.roc(), 1);
    }

    #[test]
    fn test_null_policy_pass_through() {
        let mut ctx = CryptoContext::new(Some(1), 0, 0, CryptoPolicy::null(), &[], &[]).unwrap();
        for seq in [5u16, 5, 3, 60000, 1] {
            ctx.check_replay(seq).unwrap();
            ctx.update(seq);
        }

        let plain = packet(9);
        let mut payload = plain[12..].to_vec();
        ctx.srtp_encrypt(&plain[..12], &mut payload, 9, 1).unwrap();
        assert_eq!(payload, &plain[12..]);

        let mut tag = [0x5a; 10];
        ctx.srtp_authenticate(&plain, 0, &mut tag).unwrap();
        assert_eq!(tag, [0x5a; 10]);

        let mut pkt = plain.clone();
        ctx.protect(&mut pkt).unwrap();
        assert_eq!(pkt, plain);
        ctx.unprotect(&mut pkt).unwrap();
        assert_eq!(pkt, plain);
    }

    #[test]
    fn test_encrypt_before_derive() {
        let ctx = context(CryptoPolicy::default());
        let mut payload = [0u8; 4];
        assert_eq!(
            ctx.srtp_encrypt(&[0x80; 12], &mut payload, 0, 0),
            Err(SrtpError::KeysNotDerived)
        );
        let mut tag = [0u8; 10];
        assert_eq!(
            ctx.srtp_authenticate(&[0x80; 12], 0, &mut tag),
            Err(SrtpError::KeysNotDerived)
        );
    }

    #[test]
    fn test_master_key_consumed() {
        let mut ctx = context(CryptoPolicy::default());
        ctx.derive_srtp_keys(0).unwrap();
        assert!(ctx.keys_derived());
        assert_eq!(ctx.derive_srtp_keys(0), Err(SrtpError::MasterKeyConsumed));
        assert!(matches!(
            ctx.clone_for_source(1, 0, 0),
            Err(SrtpError::MasterKeyConsumed)
        ));
    }

    #[test]
    fn test_key_derivation_rate_rekeys() {
        let policy = CryptoPolicy::default();
        let mut ctx =
            CryptoContext::new(Some(1), 0, 0x10000, policy, &MASTER_KEY, &MASTER_SALT).unwrap();
        ctx.derive_srtp_keys(0).unwrap();
        let mut a = [0u8; 16];
        ctx.srtp_encrypt(&[0x80; 12], &mut a, 5, 1).unwrap();

        // Same epoch, same keystream for the same index.
        ctx.derive_srtp_keys(0xFFFF).unwrap();
        let mut b = [0u8; 16];
        ctx.srtp_encrypt(&[0x80; 12], &mut b, 5, 1).unwrap();
        assert_eq!(a, b);

        // Next epoch, new session keys.
        ctx.derive_srtp_keys(0x10000).unwrap();
        let mut c = [0u8; 16];
        ctx.srtp_encrypt(&[0x80; 12], &mut c, 5, 1).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_key_derivation_rate_end_to_end() {
        let policy = CryptoPolicy::default();
        let mut sender =
            CryptoContext::new(Some(1), 0, 4, policy, &MASTER_KEY, &MASTER_SALT).unwrap();
        let mut receiver =
            CryptoContext::new(Some(1), 0, 4, policy, &MASTER_KEY, &MASTER_SALT).unwrap();
        for seq in 0..12u16 {
            let plain = rtp::encode(0, seq, 0, 1, b"rekeyed payload");
            let mut pkt = plain.clone();
            sender.protect(&mut pkt).unwrap();
            receiver.unprotect(&mut pkt).unwrap();
            assert_eq!(pkt, plain);
        }
    }

    #[test]
    fn test_forged_packet_keeps_session_keys() {
        let policy = CryptoPolicy::default();
        let mut sender =
            CryptoContext::new(Some(1), 0, 4, policy, &MASTER_KEY, &MASTER_SALT).unwrap();
        let mut receiver =
            CryptoContext::new(Some(1), 0, 4, policy, &MASTER_KEY, &MASTER_SALT).unwrap();

        let mut first = rtp::encode(0, 1, 0, 1, b"epoch zero");
        sender.protect(&mut first).unwrap();
        receiver.unprotect(&mut first).unwrap();
        assert_eq!(receiver.derived_epoch, Some(0));

        // A packet far ahead, in another key epoch, with a bad tag.
        let mut forged = rtp::encode(0, 40, 0, 1, b"epoch ten!");
        forged.extend_from_slice(&[0u8; 10]);
        assert_eq!(
            receiver.unprotect(&mut forged),
            Err(SrtpError::AuthenticationFailed)
        );
        assert_eq!(receiver.derived_epoch, Some(0));
        assert_eq!(receiver.sequence.highest_seq(), 1);

        // Genuine traffic in both epochs still gets through.
        for seq in [2u16, 40] {
            let plain = rtp::encode(0, seq, 0, 1, b"genuine");
            let mut pkt = plain.clone();
            sender.protect(&mut pkt).unwrap();
            receiver.unprotect(&mut pkt).unwrap();
            assert_eq!(pkt, plain);
        }
        assert_eq!(receiver.derived_epoch, Some(10));
    }

    #[test]
    fn test_roc_overflow_rejected() {
        let mut ctx = context(CryptoPolicy::default());
        ctx.set_roc(u32::MAX);
        ctx.update(65000);
        // Seq 10 after 65000 guesses ROC + 1, which does not fit in 32 bits.
        assert!(matches!(
            ctx.check_replay(10),
            Err(SrtpError::ReplayTooOld { .. })
        ));

        let mut pkt = packet(10);
        pkt.extend_from_slice(&[0u8; 10]);
        assert!(matches!(
            ctx.unprotect(&mut pkt),
            Err(SrtpError::ReplayTooOld { .. })
        ));
        assert_eq!(ctx.roc(), u32::MAX);
        assert!(!ctx.keys_derived());
    }

    #[test]
    fn test_template_protects_with_header_ssrc() {
        let mut template =
            CryptoContext::new(None, 0, 0, CryptoPolicy::default(), &MASTER_KEY, &MASTER_SALT)
                .unwrap();
        let mut receiver = context(CryptoPolicy::default());
        let mut pkt = packet(5);
        template.protect(&mut pkt).unwrap();
        assert!(template.is_template());
        receiver.unprotect(&mut pkt).unwrap();
        assert_eq!(pkt, packet(5));
    }

    #[test]
    fn test_template_clone() {
        let template =
            CryptoContext::new(None, 0, 0, CryptoPolicy::default(), &MASTER_KEY, &MASTER_SALT)
                .unwrap();
        assert!(template.is_template());

        let mut sender = template.clone_for_source(0xcafebabe, 0, 0).unwrap();
        let mut receiver = template.clone_for_source(0xcafebabe, 0, 0).unwrap();
        assert_eq!(sender.ssrc(), Some(0xcafebabe));
        assert!(!sender.is_template());
        assert!(!template.keys_derived());

        let mut pkt = packet(3);
        sender.protect(&mut pkt).unwrap();
        receiver.unprotect(&mut pkt).unwrap();
        assert_eq!(pkt, packet(3));
    }

    #[test]
    fn test_roc_accessors_and_guess() {
        let mut ctx = context(CryptoPolicy::default());
        ctx.set_roc(3);
        assert_eq!(ctx.roc(), 3);
        ctx.update(100);
        assert_eq!(ctx.guess_index(101).index(), (3 << 16) | 101);
    }

    #[test]
    fn test_rejects_invalid_construction() {
        assert!(CryptoContext::new(
            Some(1),
            0,
            0,
            CryptoPolicy::default(),
            &MASTER_KEY[..5],
            &MASTER_SALT
        )
        .is_err());
        let bad = CryptoPolicy {
            tag_len: 0,
            ..CryptoPolicy::default()
        };
        assert!(CryptoContext::new(Some(1), 0, 0, bad, &MASTER_KEY, &MASTER_SALT).is_err());
    }

    #[test]
    fn test_short_packets() {
        let mut ctx = context(CryptoPolicy::default());
        let mut short = vec![0x80; 8];
        assert!(matches!(
            ctx.protect(&mut short),
            Err(SrtpError::PacketTooShort { len: 8 })
        ));
        // Header only, no room for the tag.
        let mut no_tag = packet(1)[..14].to_vec();
        assert!(matches!(
            ctx.unprotect(&mut no_tag),
            Err(SrtpError::PacketTooShort { .. })
        ));
    }

    #[test]
    fn test_cm_iv_layout() {
        let salt: Vec<u8> = (0xf0..=0xfd).collect();
        assert_eq!(
            cm_iv(&salt, 0, 0),
            [
                0xf0, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa, 0xfb, 0xfc,
                0xfd, 0x00, 0x00
            ]
        );
        let iv = cm_iv(&[0u8; 14], 0x01020304, 0x0000_0a0b_0c0d_0e0f);
        assert_eq!(&iv[4..8], &[1, 2, 3, 4]);
        assert_eq!(&iv[8..14], &[0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f]);
    }

    #[test]
    fn test_f8_iv_layout() {
        let header = rtp::encode(0x6e, 0x5cba, 0x50681de5, 0x5c621599, &[]);
        let iv = f8_iv(&header, 0xd462564a).unwrap();
        assert_eq!(
            iv,
            [
                0x00, 0x6e, 0x5c, 0xba, 0x50, 0x68, 0x1d, 0xe5, 0x5c, 0x62, 0x15, 0x99, 0xd4,
                0x62, 0x56, 0x4a
            ]
        );
    }
}
