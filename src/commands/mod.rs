//! Command implementations for the CLI front-end.

use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::Path;
use zeroize::Zeroizing;

use srtp_context::srtp::cipher::{CipherFamily, SrtpCipher};
use srtp_context::srtp::kdf::{self, MasterKeyMaterial, SRTCP_LABELS, SRTP_LABELS};
use srtp_context::{rtcp, rtp, CryptoContext, CryptoContextCtrl, CryptoPolicy, SrtpError};

use crate::config::Config;

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn from_hex(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        bail!("odd-length hex string");
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).context("invalid hex digit"))
        .collect()
}

/// Generate a random master key and salt for the configured policy.
pub fn keygen(config: &mut Config, save: bool, path: &Path) -> Result<()> {
    let mut key = Zeroizing::new(vec![0u8; config.policy.master_key_len()]);
    let mut salt = Zeroizing::new(vec![0u8; config.policy.master_salt_len()]);
    getrandom::getrandom(&mut key)
        .and_then(|_| getrandom::getrandom(&mut salt))
        .map_err(|e| anyhow!("Failed to read system randomness: {}", e))?;

    config.set_inline_key(&MasterKeyMaterial::new(&key, &salt));
    println!("{}", config.inline_key.as_deref().unwrap_or_default());

    if save {
        config.save_to(path)?;
        tracing::info!("Saved master key to {}", path.display());
    }
    Ok(())
}

/// Print the session keys derived from the configured master key.
pub fn derive(config: &Config, index: u64, rtcp: bool) -> Result<()> {
    let master = config.master_key()?;
    let keys = if rtcp {
        kdf::derive_session_keys(&config.policy, &master, SRTCP_LABELS, 0, 0)?
    } else {
        kdf::derive_session_keys(
            &config.policy,
            &master,
            SRTP_LABELS,
            index,
            config.key_derivation_rate,
        )?
    };

    println!();
    println!("Encryption key: {}", to_hex(&keys.encryption_key));
    println!("Auth key:       {}", to_hex(&keys.auth_key));
    println!("Salt:           {}", to_hex(&keys.salt));
    Ok(())
}

/// Packet-level options shared by `protect` and `unprotect`.
pub struct PacketArgs<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub rtcp: bool,
    pub roc: u32,
    pub index: u32,
}

/// Protect one raw RTP or RTCP packet read from a file.
pub fn protect(config: &Config, args: &PacketArgs) -> Result<()> {
    let mut packet = fs::read(args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let master = config.master_key()?;

    if args.rtcp {
        let ssrc = rtcp::ssrc(&packet).context("RTCP packet too short")?;
        let mut ctx =
            CryptoContextCtrl::new(Some(ssrc), config.policy, master.key(), master.salt())?;
        ctx.set_send_index(args.index);
        ctx.protect(&mut packet)?;
    } else {
        let ssrc = rtp::ssrc(&packet).context("RTP packet too short")?;
        let mut ctx = CryptoContext::new(
            Some(ssrc),
            args.roc,
            config.key_derivation_rate,
            config.policy,
            master.key(),
            master.salt(),
        )?;
        ctx.protect(&mut packet)?;
    }

    fs::write(args.output, &packet)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    tracing::info!(bytes = packet.len(), "Wrote {}", args.output.display());
    Ok(())
}

/// Tell dropped packets apart from configuration or usage errors.
fn dropped(err: SrtpError) -> anyhow::Error {
    if err.is_packet_rejection() {
        tracing::warn!(%err, "Packet dropped");
        anyhow!("Packet dropped: {}", err)
    } else {
        err.into()
    }
}

/// Verify and decrypt one SRTP or SRTCP packet read from a file.
pub fn unprotect(config: &Config, args: &PacketArgs) -> Result<()> {
    let mut packet = fs::read(args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let master = config.master_key()?;

    if args.rtcp {
        let ssrc = rtcp::ssrc(&packet).context("SRTCP packet too short")?;
        let mut ctx =
            CryptoContextCtrl::new(Some(ssrc), config.policy, master.key(), master.salt())?;
        ctx.unprotect(&mut packet).map_err(dropped)?;
    } else {
        let ssrc = rtp::ssrc(&packet).context("SRTP packet too short")?;
        let mut ctx = CryptoContext::new(
            Some(ssrc),
            args.roc,
            config.key_derivation_rate,
            config.policy,
            master.key(),
            master.salt(),
        )?;
        ctx.unprotect(&mut packet).map_err(dropped)?;
    }

    fs::write(args.output, &packet)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    tracing::info!(bytes = packet.len(), "Wrote {}", args.output.display());
    Ok(())
}

// RFC 3711 Appendix B.3 master key and salt; also used by the packet vectors.
const KAT_MASTER_KEY: &str = "e1f97a0d3e018be0d64fa32c06de4139";
const KAT_MASTER_SALT: &str = "0ec675ad498afeebb6960b3aabe6";

fn expect(name: &str, got: &[u8], want: &str) -> Result<()> {
    let got = to_hex(got);
    if got != want {
        bail!("{}: got {}, expected {}", name, got, want);
    }
    println!("{:<28} ok", name);
    Ok(())
}

/// Run the built-in known-answer tests.
pub fn selftest() -> Result<()> {
    let master_key = from_hex(KAT_MASTER_KEY)?;
    let master_salt = from_hex(KAT_MASTER_SALT)?;

    // Key derivation (RFC 3711 B.3)
    let master = MasterKeyMaterial::new(&master_key, &master_salt);
    let keys = kdf::derive_session_keys(
        &CryptoPolicy::aes_cm_128_hmac_sha1_80(),
        &master,
        SRTP_LABELS,
        0,
        0,
    )?;
    expect(
        "kdf cipher key",
        &keys.encryption_key,
        "c61e7a93744f39ee10734afe3ff7a087",
    )?;
    expect(
        "kdf auth key",
        &keys.auth_key,
        "cebe321f6ff7716b6fd4ab49af256a156d38baa4",
    )?;
    expect("kdf salt", &keys.salt, "30cbbc08863d8c85d49db34a9ae1")?;

    // AES-CM keystream (RFC 3711 B.2)
    let cm_key = from_hex("2b7e151628aed2a6abf7158809cf4f3c")?;
    let cm = SrtpCipher::new(CipherFamily::Aes, &cm_key)?;
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&from_hex("f0f1f2f3f4f5f6f7f8f9fafbfcfd0000")?);
    let mut stream = [0u8; 32];
    cm.keystream(&mut stream, &iv);
    expect(
        "aes-cm keystream",
        &stream,
        "e03ead0935c95e80e166b16dd92b4eb4d23513162b02d0f72a43a2fe4a5f97ab",
    )?;

    // AES-F8 (RFC 3711 B.1)
    let f8_key = from_hex("234829008467be186c3de14aae72d62c")?;
    let mut f8 = SrtpCipher::new(CipherFamily::Aes, &f8_key)?;
    f8.f8_derive(&f8_key, &from_hex("32f2870d")?)?;
    iv.copy_from_slice(&from_hex("006e5cba50681de55c621599d462564a")?);
    let mut data = b"pseudorandomness is the next best thing".to_vec();
    f8.f8_encrypt(&mut data, &iv)?;
    expect(
        "aes-f8 encrypt",
        &data,
        "019ce7a26e7854014a6366aa95d4eefd1ad4172a14f9faf455b7f1d4b62bd08f562c0eef7c4802",
    )?;

    // Full packets, AES_CM_128_HMAC_SHA1_80
    let mut ctx = CryptoContext::new(
        Some(0xcafebabe),
        0,
        0,
        CryptoPolicy::aes_cm_128_hmac_sha1_80(),
        &master_key,
        &master_salt,
    )?;
    let mut packet = from_hex("800f1234decafbadcafebabe")?;
    packet.extend_from_slice(&[0xab; 16]);
    ctx.protect(&mut packet)?;
    expect(
        "srtp packet",
        &packet,
        "800f1234decafbadcafebabe4e55dc4ce79978d88ca4d215949d2402b78d6acc99ea179b8dbb",
    )?;

    let mut ctrl = CryptoContextCtrl::new(
        Some(0xcafebabe),
        CryptoPolicy::aes_cm_128_hmac_sha1_80(),
        &master_key,
        &master_salt,
    )?;
    ctrl.set_send_index(1);
    let mut packet = from_hex("81c8000bcafebabe")?;
    packet.extend_from_slice(&[0xab; 16]);
    ctrl.protect(&mut packet)?;
    expect(
        "srtcp packet",
        &packet,
        "81c8000bcafebabe7128035be487b9bdbef89041f977a5a880000001993e08cd54d6c1230798",
    )?;

    println!();
    println!("All self-tests passed");
    Ok(())
}
