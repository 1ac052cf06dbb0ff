//! Packet authentication: HMAC-SHA1 or Skein-512-MAC over ordered chunks,
//! truncated to the policy's tag length.

use std::fmt;

use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::error::{Result, SrtpError};
use super::policy::AuthenticationAlgorithm;
use super::skein::SkeinMac;

type HmacSha1 = Hmac<Sha1>;

/// Keyed MAC state. Created once per key derivation, freed on drop.
#[derive(Clone)]
pub enum MacContext {
    HmacSha1 { mac: HmacSha1, tag_len: usize },
    Skein(SkeinMac),
}

impl fmt::Debug for MacContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacContext::HmacSha1 { tag_len, .. } => {
                write!(f, "MacContext::HmacSha1 {{ tag_len: {} }}", tag_len)
            }
            MacContext::Skein(mac) => {
                write!(f, "MacContext::Skein {{ tag_len: {} }}", mac.output_len())
            }
        }
    }
}

impl MacContext {
    /// Key a MAC for `algorithm`. Returns `None` for NULL authentication.
    pub fn new(
        algorithm: AuthenticationAlgorithm,
        key: &[u8],
        tag_len: usize,
    ) -> Result<Option<Self>> {
        match algorithm {
            AuthenticationAlgorithm::Null => Ok(None),
            AuthenticationAlgorithm::HmacSha1 => {
                if tag_len == 0 || tag_len > 20 {
                    return Err(SrtpError::InvalidKeyLength {
                        what: "authentication tag",
                        len: tag_len,
                    });
                }
                let mac = HmacSha1::new_from_slice(key).map_err(|_| {
                    SrtpError::InvalidKeyLength {
                        what: "authentication key",
                        len: key.len(),
                    }
                })?;
                Ok(Some(MacContext::HmacSha1 { mac, tag_len }))
            }
            // Skein-MAC takes its output size from the tag length.
            AuthenticationAlgorithm::SkeinMac => {
                Ok(Some(MacContext::Skein(SkeinMac::new(key, tag_len)?)))
            }
        }
    }

    pub fn tag_len(&self) -> usize {
        match self {
            MacContext::HmacSha1 { tag_len, .. } => *tag_len,
            MacContext::Skein(mac) => mac.output_len(),
        }
    }

    /// MAC over `chunks` in order, truncated into `tag[..tag_len]`.
    pub fn compute(&self, chunks: &[&[u8]], tag: &mut [u8]) -> Result<()> {
        let need = self.tag_len();
        if tag.len() < need {
            return Err(SrtpError::TagBufferTooSmall {
                len: tag.len(),
                need,
            });
        }
        match self {
            MacContext::HmacSha1 { mac, tag_len } => {
                let mut mac = mac.clone();
                for chunk in chunks {
                    mac.update(chunk);
                }
                let result = mac.finalize().into_bytes();
                tag[..*tag_len].copy_from_slice(&result[..*tag_len]);
                Ok(())
            }
            MacContext::Skein(mac) => mac.compute(chunks, tag),
        }
    }
}
