//! Swappable secure-delete strategies.
//!
//! Every strategy fulfils the same contract: overwrite the whole file, then
//! remove it. The portable NIST implementation is the default; a native
//! platform tool (`shred`, `srm`, `sdelete`) can be plugged in instead.

use std::io;
use std::path::Path;
use std::sync::Arc;

use super::nist::NistSanitizer;
use super::{SanitizeOutcome, WipeMethod};
use crate::cancel::CancellationFlag;
use crate::error::{Result, WipeError};
use crate::platform::Platform;

pub trait SecureDelete: Send + Sync {
    fn name(&self) -> &'static str;

    /// Overwrite and unlink `path`. Progress is reported in [0, 100].
    fn sanitize(
        &self,
        path: &Path,
        method: WipeMethod,
        cancel: &CancellationFlag,
        progress: &mut dyn FnMut(f64),
    ) -> Result<SanitizeOutcome>;

    /// Nominal number of passes for `method`
    fn passes_for(&self, method: WipeMethod) -> u32;
}

impl SecureDelete for NistSanitizer {
    fn name(&self) -> &'static str {
        "nist-portable"
    }

    fn sanitize(
        &self,
        path: &Path,
        method: WipeMethod,
        cancel: &CancellationFlag,
        progress: &mut dyn FnMut(f64),
    ) -> Result<SanitizeOutcome> {
        match method {
            WipeMethod::Clear => self.clear(path, cancel, progress),
            WipeMethod::Purge => self.purge(path, self.config().purge_passes, cancel, progress),
        }
    }

    fn passes_for(&self, method: WipeMethod) -> u32 {
        NistSanitizer::passes_for(self, method)
    }
}

/// Delegates to the platform's native secure-delete command.
///
/// Refuses with [`WipeError::ToolUnavailable`] when the platform has no tool
/// rather than falling back to a plain unlink. The tool runs to completion
/// once started, so cancellation is only honoured before launch.
pub struct ExternalToolSanitizer {
    platform: Arc<dyn Platform>,
    purge_passes: u32,
}

impl ExternalToolSanitizer {
    pub fn new(platform: Arc<dyn Platform>, purge_passes: u32) -> Self {
        Self {
            platform,
            purge_passes,
        }
    }

    pub fn is_available(&self) -> bool {
        self.platform
            .secure_delete_command(Path::new("probe"), WipeMethod::Clear, 1)
            .is_some()
    }
}

impl SecureDelete for ExternalToolSanitizer {
    fn name(&self) -> &'static str {
        "platform-tool"
    }

    fn sanitize(
        &self,
        path: &Path,
        method: WipeMethod,
        cancel: &CancellationFlag,
        progress: &mut dyn FnMut(f64),
    ) -> Result<SanitizeOutcome> {
        if cancel.is_cancelled() {
            return Err(WipeError::CancelledByUser);
        }

        let passes = self.passes_for(method);
        let mut command = self
            .platform
            .secure_delete_command(path, method, passes)
            .ok_or_else(|| {
                WipeError::ToolUnavailable(format!(
                    "no secure delete tool found for {}",
                    self.platform.name()
                ))
            })?;

        let size = std::fs::metadata(path)
            .map_err(|e| WipeError::io(path, e))?
            .len();

        tracing::info!(
            "Running {:?} on {}",
            command.get_program(),
            path.display()
        );
        progress(0.0);

        let output = command.output().map_err(|e| WipeError::io(path, e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WipeError::io(
                path,
                io::Error::new(
                    io::ErrorKind::Other,
                    format!("{:?} exited with {}: {}", command.get_program(), output.status, stderr.trim()),
                ),
            ));
        }

        progress(100.0);
        Ok(SanitizeOutcome {
            passes_completed: passes,
            // Nominal: the tool does its own I/O
            bytes_written: size * passes as u64,
            sample_check: None,
        })
    }

    fn passes_for(&self, method: WipeMethod) -> u32 {
        match method {
            WipeMethod::Clear => 1,
            WipeMethod::Purge => self.purge_passes,
        }
    }
}
