//! SRTP/SRTCP cryptographic contexts (RFC 3711).
//!
//! Session key derivation, payload encryption in counter mode or F8 mode,
//! packet authentication and replay protection for one RTP or RTCP stream.
//! Transport, signaling and key exchange live elsewhere: callers hand in raw
//! packet bytes and get protected or unprotected bytes back.

pub mod rtcp;
pub mod rtp;
pub mod srtp;

pub use srtp::{
    AuthenticationAlgorithm, CryptoContext, CryptoContextCtrl, CryptoPolicy, EncryptionAlgorithm,
    SrtpError,
};
