//! RTCP header access for the SRTCP packet helpers (RFC 3550, 3711 §3.4).
//!
//! ```text
//!  0                   1                   2                   3
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|   RC    |      PT       |            length             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         SSRC of sender                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  encrypted portion ...                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |E|                         SRTCP index                         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

/// The first eight bytes (header and sender SSRC) stay in the clear.
pub const RTCP_HEADER_SIZE: usize = 8;

/// Length of the `E || SRTCP index` word.
pub const SRTCP_INDEX_SIZE: usize = 4;

/// E flag in the SRTCP index word.
pub const SRTCP_E_FLAG: u32 = 0x8000_0000;

/// Largest SRTCP index (31 bits).
pub const SRTCP_INDEX_MASK: u32 = 0x7FFF_FFFF;

/// Sender SSRC of a packet at least [`RTCP_HEADER_SIZE`] bytes long.
pub fn ssrc(data: &[u8]) -> Option<u32> {
    if data.len() < RTCP_HEADER_SIZE {
        return None;
    }
    Some(u32::from_be_bytes([data[4], data[5], data[6], data[7]]))
}

/// Split an `E || index` word into the E flag and the 31-bit index.
pub fn split_index_word(word: u32) -> (bool, u32) {
    (word & SRTCP_E_FLAG != 0, word & SRTCP_INDEX_MASK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssrc() {
        let sr = [0x81, 0xc8, 0x00, 0x0b, 0xca, 0xfe, 0xba, 0xbe];
        assert_eq!(ssrc(&sr), Some(0xcafebabe));
        assert_eq!(ssrc(&sr[..7]), None);
    }

    #[test]
    fn test_split_index_word() {
        assert_eq!(split_index_word(0x8000_0001), (true, 1));
        assert_eq!(split_index_word(0x7FFF_FFFF), (false, SRTCP_INDEX_MASK));
    }
}
