use thiserror::Error;

/// Result type for SRTP operations
pub type Result<T> = std::result::Result<T, SrtpError>;

/// Error types for SRTP/SRTCP processing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SrtpError {
    /// Key, salt or tag length does not fit the selected algorithm
    #[error("invalid {what} length: {len} bytes")]
    InvalidKeyLength { what: &'static str, len: usize },

    /// Encrypt/authenticate called before session keys were derived
    #[error("session keys not derived")]
    KeysNotDerived,

    /// Master key material was zeroized after the last derivation
    #[error("master key material already consumed")]
    MasterKeyConsumed,

    /// F8 encryption requested without an F8 key schedule
    #[error("F8 cipher not initialized")]
    F8NotInitialized,

    /// Received tag does not match the computed one
    #[error("authentication tag mismatch")]
    AuthenticationFailed,

    /// Packet index fell behind the replay window
    #[error("packet index {index} is older than the replay window")]
    ReplayTooOld { index: u64 },

    /// Packet index already accepted once
    #[error("packet index {index} already received")]
    ReplayDuplicate { index: u64 },

    /// Packet cannot hold header and SRTP trailer
    #[error("packet too short: {len} bytes")]
    PacketTooShort { len: usize },

    /// Output buffer for the tag is shorter than the tag length
    #[error("tag buffer too small: {len} bytes, need {need}")]
    TagBufferTooSmall { len: usize, need: usize },
}

impl SrtpError {
    /// True for the per-packet failures a receiver drops and counts.
    pub fn is_packet_rejection(&self) -> bool {
        matches!(
            self,
            SrtpError::AuthenticationFailed
                | SrtpError::ReplayTooOld { .. }
                | SrtpError::ReplayDuplicate { .. }
        )
    }
}
