//! SRTP cryptographic context (RFC 3711).
//!
//! One [`CryptoContext`] protects the RTP packets of a single synchronization
//! source, one [`CryptoContextCtrl`] the matching RTCP packets. Both are
//! built from a [`CryptoPolicy`] and master key material, derive their
//! session keys once (or on every key-derivation-rate boundary) and are then
//! driven packet by packet:
//!
//! - outgoing: encrypt, then authenticate
//! - incoming: replay check, verify tag, decrypt, update replay state
//!
//! Contexts are not internally synchronized. Keep one per source and
//! serialize access to it.

pub mod cipher;
pub mod context;
pub mod control;
pub mod error;
pub mod kdf;
pub mod mac;
pub mod policy;
pub mod replay;
pub mod skein;

pub use context::CryptoContext;
pub use control::CryptoContextCtrl;
pub use error::{Result, SrtpError};
pub use policy::{AuthenticationAlgorithm, CryptoPolicy, EncryptionAlgorithm};

/// Number of packet indices tracked behind the highest accepted one.
pub const REPLAY_WINDOW_SIZE: u64 = 64;

/// Master salt length (112 bits per RFC 3711).
pub const MASTER_SALT_LEN: usize = 14;

/// IV / block size of the SRTP stream ciphers.
pub const BLOCK_LEN: usize = 16;
