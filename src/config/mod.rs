//! Configuration and master key storage

use anyhow::{bail, Context, Result};
use base64::Engine;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use srtp_context::srtp::kdf::MasterKeyMaterial;
use srtp_context::CryptoPolicy;

/// Application configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Key derivation rate (0 = derive once)
    #[serde(default)]
    pub key_derivation_rate: u64,
    /// Base64 of master key followed by master salt
    pub inline_key: Option<String>,
    /// Algorithms and session key lengths
    #[serde(default)]
    pub policy: CryptoPolicy,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "srtp-context", "srtp-context")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Default config file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from `path`, defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        config
            .policy
            .validate()
            .context("Invalid crypto policy in config file")?;
        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains the master key)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    pub fn set_inline_key(&mut self, master: &MasterKeyMaterial) {
        let mut bytes = zeroize::Zeroizing::new(master.key().to_vec());
        bytes.extend_from_slice(master.salt());
        self.inline_key = Some(base64::engine::general_purpose::STANDARD.encode(&*bytes));
    }

    /// Decode the stored inline key, split per the configured policy.
    pub fn master_key(&self) -> Result<MasterKeyMaterial> {
        if self.policy.is_null() {
            return Ok(MasterKeyMaterial::new(&[], &[]));
        }
        let Some(encoded) = self.inline_key.as_deref() else {
            bail!("No master key configured. Run `srtp-context keygen --save` first.");
        };
        let bytes = zeroize::Zeroizing::new(
            base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .context("Failed to decode inline key")?,
        );
        let key_len = self.policy.master_key_len();
        let expected = key_len + self.policy.master_salt_len();
        if bytes.len() != expected {
            bail!(
                "Inline key is {} bytes, policy needs {} (key) + {} (salt)",
                bytes.len(),
                key_len,
                self.policy.master_salt_len()
            );
        }
        MasterKeyMaterial::from_concatenated(&bytes, key_len).context("Invalid inline key")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_master() -> MasterKeyMaterial {
        MasterKeyMaterial::new(&[0x11; 16], &[0x22; 14])
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.policy, CryptoPolicy::default());
        assert_eq!(config.key_derivation_rate, 0);
        assert!(config.inline_key.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config {
            key_derivation_rate: 1 << 16,
            inline_key: None,
            policy: CryptoPolicy::aes_cm_128_skein_64(),
        };
        config.set_inline_key(&sample_master());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.policy, CryptoPolicy::aes_cm_128_skein_64());
        assert_eq!(loaded.key_derivation_rate, 1 << 16);
        let master = loaded.master_key().unwrap();
        assert_eq!(master.key(), &[0x11; 16]);
        assert_eq!(master.salt(), &[0x22; 14]);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_missing_and_malformed_keys() {
        let mut config = Config::default();
        assert!(config.master_key().is_err());

        config.inline_key = Some("not base64!".to_string());
        assert!(config.master_key().is_err());

        // 16 + 14 bytes expected, only 20 given.
        config.inline_key = Some(base64::engine::general_purpose::STANDARD.encode([0u8; 20]));
        assert!(config.master_key().is_err());
    }

    #[test]
    fn test_null_policy_needs_no_key() {
        let config = Config {
            policy: CryptoPolicy::null(),
            ..Config::default()
        };
        let master = config.master_key().unwrap();
        assert!(master.key().is_empty());
    }

    #[test]
    fn test_rejects_invalid_policy_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            key_derivation_rate = 0

            [policy]
            encryption = "aes_cm"
            authentication = "hmac_sha1"
            encryption_key_len = 20
            auth_key_len = 20
            salt_len = 14
            tag_len = 10
            "#,
        )
        .unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
