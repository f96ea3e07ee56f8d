//! Runtime configuration for the sanitization engine

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, WipeError};

/// Default write block size (64 KiB)
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Default number of Purge passes
pub const DEFAULT_PURGE_PASSES: u32 = 7;

/// Conservative write throughput used for time estimates (100 MB/s)
pub const DEFAULT_THROUGHPUT: u64 = 100 * 1024 * 1024;

/// Maximum file entries embedded in a certificate
pub const DEFAULT_CERTIFICATE_FILE_LIMIT: usize = 1000;

/// How the post-Purge sampling check judges the file
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMode {
    /// Samples only need to be readable
    Readable,
    /// Samples must match the bytes written by the final pass
    LastPass,
}

impl Default for VerificationMode {
    fn default() -> Self {
        VerificationMode::LastPass
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WipeConfig {
    pub block_size: usize,
    pub purge_passes: u32,
    /// Bytes per second, advisory only
    pub assumed_throughput: u64,
    pub verification: VerificationMode,
    pub certificate_file_limit: usize,
    pub display_error_limit: usize,
    pub remove_empty_dirs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_dir: Option<PathBuf>,
}

impl Default for WipeConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            purge_passes: DEFAULT_PURGE_PASSES,
            assumed_throughput: DEFAULT_THROUGHPUT,
            verification: VerificationMode::default(),
            certificate_file_limit: DEFAULT_CERTIFICATE_FILE_LIMIT,
            display_error_limit: 5,
            remove_empty_dirs: true,
            audit_dir: None,
        }
    }
}

impl WipeConfig {
    /// Load a config from a JSON file; missing keys fall back to defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| WipeError::io(path, e))?;
        let config: WipeConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(WipeError::InvalidConfig(
                "block_size must be greater than zero".to_string(),
            ));
        }
        if self.purge_passes == 0 {
            return Err(WipeError::InvalidConfig(
                "purge_passes must be at least 1".to_string(),
            ));
        }
        if self.assumed_throughput == 0 {
            return Err(WipeError::InvalidConfig(
                "assumed_throughput must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Default audit directory (~/.securewipe/audit)
    pub fn default_audit_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".securewipe").join("audit"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = WipeConfig::default();
        assert_eq!(config.block_size, 65536);
        assert_eq!(config.purge_passes, 7);
        assert_eq!(config.certificate_file_limit, 1000);
        assert_eq!(config.verification, VerificationMode::LastPass);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wipe.json");
        std::fs::write(&path, r#"{"purge_passes": 3, "verification": "readable"}"#).unwrap();

        let config = WipeConfig::load(&path).unwrap();
        assert_eq!(config.purge_passes, 3);
        assert_eq!(config.verification, VerificationMode::Readable);
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn test_rejects_zero_passes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wipe.json");
        std::fs::write(&path, r#"{"purge_passes": 0}"#).unwrap();

        assert!(matches!(
            WipeConfig::load(&path),
            Err(WipeError::InvalidConfig(_))
        ));
    }
}
