//! Algorithm selection for a crypto context.
//!
//! A [`CryptoPolicy`] is fixed at construction and never changes for the
//! lifetime of a context.

use serde::{Deserialize, Serialize};

use super::cipher::CipherFamily;
use super::error::{Result, SrtpError};
use super::MASTER_SALT_LEN;

/// Largest HMAC-SHA1 output.
const SHA1_MAC_LEN: usize = 20;

/// Largest Skein-512 MAC output used for tags.
const SKEIN_MAC_LEN: usize = 64;

/// Payload encryption transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionAlgorithm {
    Null,
    AesCm,
    AesF8,
    TwofishCm,
    TwofishF8,
}

impl EncryptionAlgorithm {
    /// Block cipher behind the transform, `None` for NULL.
    pub fn cipher_family(self) -> Option<CipherFamily> {
        match self {
            EncryptionAlgorithm::Null => None,
            EncryptionAlgorithm::AesCm | EncryptionAlgorithm::AesF8 => Some(CipherFamily::Aes),
            EncryptionAlgorithm::TwofishCm | EncryptionAlgorithm::TwofishF8 => {
                Some(CipherFamily::Twofish)
            }
        }
    }

    pub fn is_f8(self) -> bool {
        matches!(
            self,
            EncryptionAlgorithm::AesF8 | EncryptionAlgorithm::TwofishF8
        )
    }
}

/// Packet authentication transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationAlgorithm {
    Null,
    HmacSha1,
    SkeinMac,
}

/// Algorithms plus session key, salt and tag lengths (all in bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoPolicy {
    pub encryption: EncryptionAlgorithm,
    pub authentication: AuthenticationAlgorithm,
    /// Session encryption key length (n_e).
    pub encryption_key_len: usize,
    /// Session authentication key length (n_a).
    pub auth_key_len: usize,
    /// Session salt length (n_s).
    pub salt_len: usize,
    /// Authentication tag length appended to each packet.
    pub tag_len: usize,
}

impl Default for CryptoPolicy {
    fn default() -> Self {
        Self::aes_cm_128_hmac_sha1_80()
    }
}

impl CryptoPolicy {
    /// `AES_CM_128_HMAC_SHA1_80`, the RFC 3711 default.
    pub fn aes_cm_128_hmac_sha1_80() -> Self {
        Self {
            encryption: EncryptionAlgorithm::AesCm,
            authentication: AuthenticationAlgorithm::HmacSha1,
            encryption_key_len: 16,
            auth_key_len: 20,
            salt_len: 14,
            tag_len: 10,
        }
    }

    /// `AES_CM_128_HMAC_SHA1_32`
    pub fn aes_cm_128_hmac_sha1_32() -> Self {
        Self {
            tag_len: 4,
            ..Self::aes_cm_128_hmac_sha1_80()
        }
    }

    /// `AES_CM_256_HMAC_SHA1_80`
    pub fn aes_cm_256_hmac_sha1_80() -> Self {
        Self {
            encryption_key_len: 32,
            ..Self::aes_cm_128_hmac_sha1_80()
        }
    }

    /// `AES_F8_128_HMAC_SHA1_80`
    pub fn aes_f8_128_hmac_sha1_80() -> Self {
        Self {
            encryption: EncryptionAlgorithm::AesF8,
            ..Self::aes_cm_128_hmac_sha1_80()
        }
    }

    pub fn twofish_cm_128_hmac_sha1_80() -> Self {
        Self {
            encryption: EncryptionAlgorithm::TwofishCm,
            ..Self::aes_cm_128_hmac_sha1_80()
        }
    }

    pub fn twofish_f8_128_hmac_sha1_80() -> Self {
        Self {
            encryption: EncryptionAlgorithm::TwofishF8,
            ..Self::aes_cm_128_hmac_sha1_80()
        }
    }

    /// AES-CM with a 64-bit Skein-512-MAC tag (ZRTP "SK64").
    pub fn aes_cm_128_skein_64() -> Self {
        Self {
            authentication: AuthenticationAlgorithm::SkeinMac,
            auth_key_len: 32,
            tag_len: 8,
            ..Self::aes_cm_128_hmac_sha1_80()
        }
    }

    /// AES-CM with a 32-bit Skein-512-MAC tag (ZRTP "SK32").
    pub fn aes_cm_128_skein_32() -> Self {
        Self {
            tag_len: 4,
            ..Self::aes_cm_128_skein_64()
        }
    }

    /// No encryption, no authentication, no replay protection.
    pub fn null() -> Self {
        Self {
            encryption: EncryptionAlgorithm::Null,
            authentication: AuthenticationAlgorithm::Null,
            encryption_key_len: 0,
            auth_key_len: 0,
            salt_len: 0,
            tag_len: 0,
        }
    }

    /// True when neither encryption nor authentication is applied.
    pub fn is_null(&self) -> bool {
        self.encryption == EncryptionAlgorithm::Null
            && self.authentication == AuthenticationAlgorithm::Null
    }

    /// Block cipher used as the key-derivation PRF.
    ///
    /// Twofish transforms derive with Twofish, everything else with AES.
    pub fn prf_family(&self) -> CipherFamily {
        self.encryption.cipher_family().unwrap_or(CipherFamily::Aes)
    }

    /// Master key length this policy expects.
    pub fn master_key_len(&self) -> usize {
        match (self.encryption, self.authentication) {
            (EncryptionAlgorithm::Null, AuthenticationAlgorithm::Null) => 0,
            (EncryptionAlgorithm::Null, _) => 16,
            _ => self.encryption_key_len,
        }
    }

    /// Master salt length this policy expects.
    pub fn master_salt_len(&self) -> usize {
        if self.is_null() {
            0
        } else {
            MASTER_SALT_LEN
        }
    }

    /// Check that every length fits the selected algorithms.
    pub fn validate(&self) -> Result<()> {
        match self.encryption {
            EncryptionAlgorithm::Null => {}
            EncryptionAlgorithm::AesCm | EncryptionAlgorithm::TwofishCm => {
                check_cipher_key_len(self.encryption_key_len)?;
                if self.salt_len != MASTER_SALT_LEN {
                    return Err(SrtpError::InvalidKeyLength {
                        what: "session salt",
                        len: self.salt_len,
                    });
                }
            }
            EncryptionAlgorithm::AesF8 | EncryptionAlgorithm::TwofishF8 => {
                check_cipher_key_len(self.encryption_key_len)?;
                if self.salt_len == 0 || self.salt_len > self.encryption_key_len {
                    return Err(SrtpError::InvalidKeyLength {
                        what: "session salt",
                        len: self.salt_len,
                    });
                }
            }
        }

        let max_tag = match self.authentication {
            AuthenticationAlgorithm::Null => return Ok(()),
            AuthenticationAlgorithm::HmacSha1 => SHA1_MAC_LEN,
            AuthenticationAlgorithm::SkeinMac => SKEIN_MAC_LEN,
        };
        if self.auth_key_len == 0 {
            return Err(SrtpError::InvalidKeyLength {
                what: "authentication key",
                len: 0,
            });
        }
        if self.tag_len == 0 || self.tag_len > max_tag {
            return Err(SrtpError::InvalidKeyLength {
                what: "authentication tag",
                len: self.tag_len,
            });
        }
        Ok(())
    }

    /// Zero the lengths of NULL transforms so they allocate nothing.
    pub fn normalized(mut self) -> Self {
        if self.encryption == EncryptionAlgorithm::Null {
            self.encryption_key_len = 0;
            self.salt_len = 0;
        }
        if self.authentication == AuthenticationAlgorithm::Null {
            self.auth_key_len = 0;
            self.tag_len = 0;
        }
        self
    }
}

fn check_cipher_key_len(len: usize) -> Result<()> {
    match len {
        16 | 24 | 32 => Ok(()),
        _ => Err(SrtpError::InvalidKeyLength {
            what: "encryption key",
            len,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for policy in [
            CryptoPolicy::aes_cm_128_hmac_sha1_80(),
            CryptoPolicy::aes_cm_128_hmac_sha1_32(),
            CryptoPolicy::aes_cm_256_hmac_sha1_80(),
            CryptoPolicy::aes_f8_128_hmac_sha1_80(),
            CryptoPolicy::twofish_cm_128_hmac_sha1_80(),
            CryptoPolicy::twofish_f8_128_hmac_sha1_80(),
            CryptoPolicy::aes_cm_128_skein_64(),
            CryptoPolicy::aes_cm_128_skein_32(),
            CryptoPolicy::null(),
        ] {
            policy.validate().unwrap();
        }
    }

    #[test]
    fn test_rejects_bad_key_len() {
        let policy = CryptoPolicy {
            encryption_key_len: 20,
            ..CryptoPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(SrtpError::InvalidKeyLength {
                what: "encryption key",
                len: 20
            })
        ));
    }

    #[test]
    fn test_rejects_short_cm_salt() {
        let policy = CryptoPolicy {
            salt_len: 4,
            ..CryptoPolicy::default()
        };
        assert!(policy.validate().is_err());

        // F8 accepts any salt up to the key length.
        let f8 = CryptoPolicy {
            salt_len: 4,
            ..CryptoPolicy::aes_f8_128_hmac_sha1_80()
        };
        f8.validate().unwrap();
    }

    #[test]
    fn test_rejects_oversized_tag() {
        let policy = CryptoPolicy {
            tag_len: 21,
            ..CryptoPolicy::default()
        };
        assert!(policy.validate().is_err());

        let skein = CryptoPolicy {
            tag_len: 32,
            ..CryptoPolicy::aes_cm_128_skein_64()
        };
        skein.validate().unwrap();
    }

    #[test]
    fn test_null_auth_ignores_lengths() {
        let policy = CryptoPolicy {
            authentication: AuthenticationAlgorithm::Null,
            tag_len: 99,
            ..CryptoPolicy::default()
        };
        policy.validate().unwrap();
        let normalized = policy.normalized();
        assert_eq!(normalized.tag_len, 0);
        assert_eq!(normalized.auth_key_len, 0);
        assert_eq!(normalized.encryption_key_len, 16);
    }

    #[test]
    fn test_prf_family() {
        assert_eq!(CryptoPolicy::default().prf_family(), CipherFamily::Aes);
        assert_eq!(
            CryptoPolicy::twofish_f8_128_hmac_sha1_80().prf_family(),
            CipherFamily::Twofish
        );
        assert_eq!(CryptoPolicy::null().prf_family(), CipherFamily::Aes);
    }

    #[test]
    fn test_master_lengths() {
        assert_eq!(CryptoPolicy::aes_cm_256_hmac_sha1_80().master_key_len(), 32);
        assert_eq!(CryptoPolicy::null().master_key_len(), 0);
        assert_eq!(CryptoPolicy::null().master_salt_len(), 0);
        let auth_only = CryptoPolicy {
            encryption: EncryptionAlgorithm::Null,
            ..CryptoPolicy::default()
        };
        assert_eq!(auth_only.master_key_len(), 16);
        assert_eq!(auth_only.master_salt_len(), MASTER_SALT_LEN);
    }

    #[test]
    fn test_toml_names() {
        let policy: CryptoPolicy = toml::from_str(
            r#"
            encryption = "twofish_f8"
            authentication = "skein_mac"
            encryption_key_len = 32
            auth_key_len = 32
            salt_len = 14
            tag_len = 8
            "#,
        )
        .unwrap();
        assert_eq!(policy.encryption, EncryptionAlgorithm::TwofishF8);
        assert_eq!(policy.authentication, AuthenticationAlgorithm::SkeinMac);
        policy.validate().unwrap();
    }
}
