//! RTP header access for the SRTP packet helpers.
//!
//! RTP header format (RFC 3550):
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           synchronization source (SSRC) identifier            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

/// Minimum RTP header size in bytes (no CSRC, no extension).
pub const RTP_HEADER_SIZE: usize = 12;

/// Compute the full RTP header length from raw packet bytes.
///
/// Accounts for CSRC entries and header extensions (RFC 3550 §5.3.1).
/// Returns `None` if the packet is too short.
pub fn full_header_len(data: &[u8]) -> Option<usize> {
    if data.len() < RTP_HEADER_SIZE {
        return None;
    }
    let csrc_count = (data[0] & 0x0F) as usize;
    let has_extension = (data[0] >> 4) & 0x01 != 0;
    let mut len = RTP_HEADER_SIZE + csrc_count * 4;
    if data.len() < len {
        return None;
    }
    if has_extension {
        // Extension header: 2 bytes profile + 2 bytes length (in 32-bit words)
        if data.len() < len + 4 {
            return None;
        }
        let ext_words = u16::from_be_bytes([data[len + 2], data[len + 3]]) as usize;
        len += 4 + ext_words * 4;
        if data.len() < len {
            return None;
        }
    }
    Some(len)
}

/// Sequence number of a packet at least [`RTP_HEADER_SIZE`] bytes long.
pub fn sequence_number(data: &[u8]) -> Option<u16> {
    if data.len() < RTP_HEADER_SIZE {
        return None;
    }
    Some(u16::from_be_bytes([data[2], data[3]]))
}

/// SSRC of a packet at least [`RTP_HEADER_SIZE`] bytes long.
pub fn ssrc(data: &[u8]) -> Option<u32> {
    if data.len() < RTP_HEADER_SIZE {
        return None;
    }
    Some(u32::from_be_bytes([data[8], data[9], data[10], data[11]]))
}

/// Encode an RTP packet into bytes.
pub fn encode(payload_type: u8, seq: u16, timestamp: u32, ssrc: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RTP_HEADER_SIZE + payload.len());

    // Byte 0: V=2, P=0, X=0, CC=0 -> 0x80
    buf.push(0x80);
    // Byte 1: M=0, PT
    buf.push(payload_type & 0x7F);
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(&timestamp.to_be_bytes());
    buf.extend_from_slice(&ssrc.to_be_bytes());
    buf.extend_from_slice(payload);

    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_fields() {
        let pkt = encode(0, 0x1234, 0xdecafbad, 0xcafebabe, &[0xab; 4]);
        assert_eq!(pkt.len(), RTP_HEADER_SIZE + 4);
        assert_eq!(pkt[0], 0x80);
        assert_eq!(sequence_number(&pkt), Some(0x1234));
        assert_eq!(ssrc(&pkt), Some(0xcafebabe));
        assert_eq!(full_header_len(&pkt), Some(RTP_HEADER_SIZE));
    }

    #[test]
    fn test_header_len_with_csrc_and_extension() {
        let mut pkt = encode(96, 1, 0, 1, &[]);
        pkt[0] |= 0x02; // CC = 2
        pkt.extend_from_slice(&[0u8; 8]);
        assert_eq!(full_header_len(&pkt), Some(20));

        pkt[0] |= 0x10; // X
        pkt.extend_from_slice(&[0xbe, 0xde, 0x00, 0x01, 1, 2, 3, 4]);
        assert_eq!(full_header_len(&pkt), Some(28));
    }

    #[test]
    fn test_truncated() {
        assert_eq!(full_header_len(&[0x80; 11]), None);
        assert_eq!(sequence_number(&[0x80; 3]), None);
        assert_eq!(ssrc(&[0x80; 11]), None);

        // CC says 1 CSRC, none present.
        let mut pkt = encode(0, 1, 0, 1, &[]);
        pkt[0] |= 0x01;
        assert_eq!(full_header_len(&pkt), None);
    }
}
