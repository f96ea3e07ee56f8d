/// NIST SP 800-88 sanitization: overwrite primitive, Clear/Purge and
/// swappable secure-delete strategies
pub mod nist;
pub mod pattern;
pub mod strategy;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use nist::{estimate_time, method_info, verify_wipe, MethodInfo, NistSanitizer};
pub use pattern::{
    clear_schedule, overwrite_pass, purge_schedule, run_schedule, BlockSink, FileSink,
    OverwritePass, Pattern, SampleWindow, SampleWindows, ScheduleOutcome, SAMPLE_SIZE,
};
pub use strategy::{ExternalToolSanitizer, SecureDelete};

/// Sanitization method, chosen per invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WipeMethod {
    /// Single zero-fill pass
    Clear,
    /// Zeros, ones, then random passes, followed by a sampling check
    Purge,
}

impl WipeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            WipeMethod::Clear => "clear",
            WipeMethod::Purge => "purge",
        }
    }
}

impl std::fmt::Display for WipeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WipeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clear" => Ok(WipeMethod::Clear),
            "purge" => Ok(WipeMethod::Purge),
            other => Err(format!("Unknown wipe method: {}", other)),
        }
    }
}

/// What a strategy did to one file before it was unlinked
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SanitizeOutcome {
    pub passes_completed: u32,
    pub bytes_written: u64,
    /// Post-overwrite sampling check; `None` when the method has none
    pub sample_check: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!("clear".parse::<WipeMethod>().unwrap(), WipeMethod::Clear);
        assert_eq!(" PURGE ".parse::<WipeMethod>().unwrap(), WipeMethod::Purge);
        assert!("shred".parse::<WipeMethod>().is_err());
        assert_eq!(WipeMethod::Purge.to_string(), "purge");
    }
}
