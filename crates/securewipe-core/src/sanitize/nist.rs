//! NIST SP 800-88 Clear and Purge
//!
//! Clear: one zero pass, then unlink.
//! Purge: zeros, ones, random for the remaining passes, a sampling check of
//! the first/middle/last 1 KiB, then unlink. A failed sampling check is
//! logged and recorded but never blocks the unlink.

use serde::Serialize;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use super::pattern::{clear_schedule, purge_schedule, run_schedule, FileSink, Pattern, SampleWindows};
use super::{SanitizeOutcome, WipeMethod};
use crate::cancel::CancellationFlag;
use crate::config::{VerificationMode, WipeConfig};
use crate::error::{Result, WipeError};

/// Portable overwrite-then-unlink implementation of Clear and Purge
#[derive(Debug, Clone, Default)]
pub struct NistSanitizer {
    config: WipeConfig,
}

impl NistSanitizer {
    pub fn new(config: WipeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WipeConfig {
        &self.config
    }

    /// Single zero pass, durable flush, unlink
    pub fn clear(
        &self,
        path: &Path,
        cancel: &CancellationFlag,
        progress: &mut dyn FnMut(f64),
    ) -> Result<SanitizeOutcome> {
        tracing::info!("Clear method: {}", path.display());

        let outcome = self.overwrite(path, &clear_schedule(), false, cancel, progress)?;
        unlink(path)?;

        tracing::info!("Clear method completed: {}", path.display());
        Ok(SanitizeOutcome {
            passes_completed: outcome.passes_completed,
            bytes_written: outcome.bytes_written,
            sample_check: None,
        })
    }

    /// `passes` overwrite passes, sampling check, unlink
    pub fn purge(
        &self,
        path: &Path,
        passes: u32,
        cancel: &CancellationFlag,
        progress: &mut dyn FnMut(f64),
    ) -> Result<SanitizeOutcome> {
        tracing::info!("Purge method: {} ({} passes)", path.display(), passes);

        let schedule = purge_schedule(passes.max(1));
        let capture = self.config.verification == VerificationMode::LastPass;
        let outcome = self.overwrite(path, &schedule, capture, cancel, progress)?;

        let sample_check = verify_overwrite(
            path,
            outcome.final_pass_samples.as_ref(),
            self.config.verification,
        );
        if !sample_check {
            tracing::warn!("Verification failed for {}", path.display());
        }

        unlink(path)?;

        tracing::info!("Purge method completed: {}", path.display());
        Ok(SanitizeOutcome {
            passes_completed: outcome.passes_completed,
            bytes_written: outcome.bytes_written,
            sample_check: Some(sample_check),
        })
    }

    /// Advisory duration for wiping `size` bytes with `method`
    pub fn estimate(&self, size: u64, method: WipeMethod) -> f64 {
        estimate_time(size, self.passes_for(method), self.config.assumed_throughput)
    }

    pub fn passes_for(&self, method: WipeMethod) -> u32 {
        match method {
            WipeMethod::Clear => 1,
            WipeMethod::Purge => self.config.purge_passes,
        }
    }

    fn overwrite(
        &self,
        path: &Path,
        schedule: &[Pattern],
        capture_final: bool,
        cancel: &CancellationFlag,
        progress: &mut dyn FnMut(f64),
    ) -> Result<super::ScheduleOutcome> {
        // The handle must be closed before unlinking
        let mut sink = FileSink::open(path)?;
        run_schedule(
            &mut sink,
            schedule,
            self.config.block_size,
            cancel,
            capture_final,
            progress,
        )
    }
}

fn unlink(path: &Path) -> Result<()> {
    std::fs::remove_file(path).map_err(|e| match e.kind() {
        io::ErrorKind::PermissionDenied => WipeError::PermissionDenied {
            path: path.to_path_buf(),
            reason: "cannot unlink file".to_string(),
        },
        _ => WipeError::io(path, e),
    })
}

/// Sampling check after the final pass.
///
/// `Readable` only confirms each window can be read in full. `LastPass`
/// additionally requires the bytes on disk to equal what the final pass
/// wrote; without captured samples it degrades to `Readable`.
pub fn verify_overwrite(
    path: &Path,
    samples: Option<&SampleWindows>,
    mode: VerificationMode,
) -> bool {
    let result = (|| -> io::Result<bool> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();

        let fallback;
        let windows = match (mode, samples) {
            (VerificationMode::LastPass, Some(samples)) => samples,
            _ => {
                fallback = SampleWindows::for_length(len);
                &fallback
            }
        };
        let compare = mode == VerificationMode::LastPass && samples.is_some();

        for window in windows.windows() {
            let mut buf = vec![0u8; window.len as usize];
            file.seek(SeekFrom::Start(window.offset))?;
            file.read_exact(&mut buf)?;
            if compare && buf != window.expected {
                tracing::warn!(
                    "Sample at offset {} of {} does not match final pass",
                    window.offset,
                    path.display()
                );
                return Ok(false);
            }
        }
        Ok(true)
    })();

    result.unwrap_or_else(|e| {
        tracing::warn!("Verification error for {}: {}", path.display(), e);
        false
    })
}

/// Authoritative deletion check: true only when the path no longer resolves.
/// Any error other than "not found" fails closed.
pub fn verify_wipe(path: &Path) -> bool {
    match std::fs::symlink_metadata(path) {
        Ok(_) => false,
        Err(e) => e.kind() == io::ErrorKind::NotFound,
    }
}

/// `size * passes / throughput`, in seconds
pub fn estimate_time(size: u64, passes: u32, throughput: u64) -> f64 {
    if throughput == 0 {
        return 0.0;
    }
    (size as f64 * passes as f64) / throughput as f64
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub passes: u32,
    pub security_level: &'static str,
    pub speed: &'static str,
    pub use_case: &'static str,
}

pub fn method_info(method: WipeMethod, purge_passes: u32) -> MethodInfo {
    match method {
        WipeMethod::Clear => MethodInfo {
            name: "NIST Clear",
            description: "Single-pass overwrite with zeros",
            passes: 1,
            security_level: "Standard",
            speed: "Fast",
            use_case: "Non-sensitive data, regular use",
        },
        WipeMethod::Purge => MethodInfo {
            name: "NIST Purge",
            description: "Multi-pass overwrite: zeros, ones, then random data",
            passes: purge_passes,
            security_level: "High",
            speed: "Slow",
            use_case: "Sensitive data, compliance requirements",
        },
    }
}
