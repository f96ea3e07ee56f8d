//! Wipe orchestrator
//!
//! Drives a [`SecureDelete`] strategy over a single file, an explicit
//! selection, or a directory tree, strictly sequentially. Per-file failures
//! are captured into [`WipeResult`]s and never abort a batch. Cancellation
//! is observed before every file and, through the strategy, before every
//! block; anything not finished when it is observed is counted as skipped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use uuid::Uuid;

use crate::audit::{AuditLog, AuditLogger};
use crate::cancel::CancellationFlag;
use crate::config::WipeConfig;
use crate::error::{ErrorKind, Result, WipeError};
use crate::platform::{current_platform, Platform};
use crate::sanitize::{estimate_time, verify_wipe, NistSanitizer, SanitizeOutcome, SecureDelete, WipeMethod};

/// Per-file state machine:
/// `Pending -> Validating -> Overwriting -> Verifying -> Done | Failed | Cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WipeState {
    Pending,
    Validating,
    Overwriting,
    Verifying,
    Done,
    Failed,
    Cancelled,
}

impl WipeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WipeState::Done | WipeState::Failed | WipeState::Cancelled)
    }
}

impl std::fmt::Display for WipeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            WipeState::Pending => "pending",
            WipeState::Validating => "validating",
            WipeState::Overwriting => "overwriting",
            WipeState::Verifying => "verifying",
            WipeState::Done => "done",
            WipeState::Failed => "failed",
            WipeState::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Outcome of wiping one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WipeResult {
    pub path: PathBuf,
    pub method: WipeMethod,
    /// Name of the secure-delete strategy that ran
    pub strategy: String,
    pub state: WipeState,
    pub success: bool,
    /// The path no longer resolves
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_check: Option<bool>,
    pub passes_completed: u32,
    pub bytes_written: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_secs: f64,
}

impl WipeResult {
    fn pending(path: &Path, method: WipeMethod, strategy: &str) -> Self {
        let now = Utc::now();
        Self {
            path: path.to_path_buf(),
            method,
            strategy: strategy.to_string(),
            state: WipeState::Pending,
            success: false,
            verified: false,
            sample_check: None,
            passes_completed: 0,
            bytes_written: 0,
            error: None,
            error_kind: None,
            start_time: now,
            end_time: now,
            duration_secs: 0.0,
        }
    }

    fn fail_with(&mut self, state: WipeState, error: &WipeError) {
        self.state = state;
        self.success = false;
        self.error = Some(error.to_string());
        self.error_kind = Some(error.kind());
    }
}

/// A per-file error recorded inline in a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    pub path: PathBuf,
    pub message: String,
}

/// Aggregate of one folder/selection invocation.
///
/// `successful + failed + skipped == total_files` always holds. Skipped
/// means not completed because of cancellation; failed means attempted
/// and failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    pub method: WipeMethod,
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub files: Vec<WipeResult>,
    pub errors: Vec<BatchError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_paths: Vec<PathBuf>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_secs: f64,
}

impl BatchResult {
    fn new(source: Option<&Path>, method: WipeMethod, total_files: usize) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            source: source.map(Path::to_path_buf),
            method,
            total_files,
            successful: 0,
            failed: 0,
            skipped: 0,
            files: Vec::with_capacity(total_files),
            errors: Vec::new(),
            skipped_paths: Vec::new(),
            start_time: now,
            end_time: now,
            duration_secs: 0.0,
        }
    }

    /// Wrap a single-file result so it can be reported and certified
    pub fn from_single(result: WipeResult) -> Self {
        let mut batch = Self::new(Some(&result.path), result.method, 1);
        batch.start_time = result.start_time;
        batch.end_time = result.end_time;
        batch.duration_secs = result.duration_secs;
        batch.record(result);
        batch
    }

    fn record(&mut self, result: WipeResult) {
        match result.state {
            WipeState::Done => self.successful += 1,
            WipeState::Cancelled => {
                self.skipped += 1;
                self.skipped_paths.push(result.path.clone());
            }
            _ => {
                self.failed += 1;
                self.errors.push(BatchError {
                    path: result.path.clone(),
                    message: result
                        .error
                        .clone()
                        .unwrap_or_else(|| "Unknown error".to_string()),
                });
            }
        }
        self.files.push(result);
    }

    fn skip(&mut self, path: &Path) {
        self.skipped += 1;
        self.skipped_paths.push(path.to_path_buf());
    }

    pub fn was_cancelled(&self) -> bool {
        self.skipped > 0
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0 && self.successful == self.total_files
    }

    pub fn verified_count(&self) -> usize {
        self.files.iter().filter(|f| f.verified).count()
    }
}

/// Progress snapshot handed to the progress callback.
///
/// `percent` is overall progress for the whole call, in [0, 100] and
/// non-decreasing. The callback runs on the wiping thread and must not block.
#[derive(Debug, Clone)]
pub struct WipeProgress {
    pub percent: f64,
    /// Progress within the current file
    pub file_percent: f64,
    pub files_completed: usize,
    pub total_files: usize,
    pub current_file: Option<PathBuf>,
    pub state: WipeState,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub cancel_requested: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_state: Option<WipeState>,
}

type ProgressCallback = dyn Fn(WipeProgress) + Send + Sync;

struct ProgressTracker<'a> {
    callback: Option<&'a ProgressCallback>,
    total_files: usize,
    last: f64,
}

impl<'a> ProgressTracker<'a> {
    fn new(callback: Option<&'a ProgressCallback>, total_files: usize) -> Self {
        Self {
            callback,
            total_files,
            last: 0.0,
        }
    }

    fn update(&mut self, index: usize, file_percent: f64, path: &Path, state: WipeState) {
        let Some(callback) = self.callback else {
            return;
        };

        let file_percent = file_percent.clamp(0.0, 100.0);
        let total = self.total_files.max(1) as f64;
        let overall = ((index as f64 + file_percent / 100.0) / total * 100.0).clamp(0.0, 100.0);

        // Clamp so a strategy that reports out of order cannot move backwards
        self.last = overall.max(self.last);

        callback(WipeProgress {
            percent: self.last,
            file_percent,
            files_completed: index,
            total_files: self.total_files,
            current_file: Some(path.to_path_buf()),
            state,
        });
    }

    fn finish(&mut self) {
        self.last = 100.0;
        if let Some(callback) = self.callback {
            callback(WipeProgress {
                percent: 100.0,
                file_percent: 100.0,
                files_completed: self.total_files,
                total_files: self.total_files,
                current_file: None,
                state: WipeState::Done,
            });
        }
    }
}

/// Sequential wipe orchestrator
pub struct WipeEngine {
    config: WipeConfig,
    strategy: Box<dyn SecureDelete>,
    platform: Arc<dyn Platform>,
    cancel: CancellationFlag,
    audit: Option<AuditLogger>,
    progress_callback: Option<Box<ProgressCallback>>,
    status: Mutex<EngineStatus>,
}

impl WipeEngine {
    /// Engine using the portable NIST strategy and the host platform.
    /// `cancel` may be cloned and set from any thread or signal handler.
    pub fn new(config: WipeConfig, cancel: CancellationFlag) -> Self {
        let strategy = Box::new(NistSanitizer::new(config.clone()));
        Self {
            config,
            strategy,
            platform: current_platform(),
            cancel,
            audit: None,
            progress_callback: None,
            status: Mutex::new(EngineStatus::default()),
        }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn SecureDelete>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_audit_log(mut self, log: Arc<AuditLog>) -> Self {
        self.audit = Some(AuditLogger::new(log));
        self
    }

    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: Fn(WipeProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
    }

    pub fn config(&self) -> &WipeConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub fn audit(&self) -> Option<&AuditLogger> {
        self.audit.as_ref()
    }

    /// Handle to the shared cancellation flag
    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Request cancellation of the running operation. Idempotent.
    pub fn emergency_stop(&self) {
        let already = self.cancel.is_cancelled();
        self.cancel.cancel();
        if !already {
            tracing::warn!("Emergency stop requested");
            if let Some(audit) = &self.audit {
                audit.emergency_stop();
            }
        }
    }

    pub fn reset_cancel(&self) {
        self.cancel.reset();
    }

    pub fn status(&self) -> EngineStatus {
        let mut status = self.lock_status().clone();
        status.cancel_requested = self.cancel.is_cancelled();
        status
    }

    /// Advisory duration for wiping every existing file in `paths`
    pub fn estimate_operation_time(&self, paths: &[PathBuf], method: WipeMethod) -> f64 {
        let total_size: u64 = paths
            .iter()
            .filter_map(|p| std::fs::metadata(p).ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum();

        estimate_time(
            total_size,
            self.strategy.passes_for(method),
            self.config.assumed_throughput,
        )
    }

    /// Wipe one file. Never returns an error: failures are in the result.
    pub fn wipe_file(&self, path: &Path, method: WipeMethod) -> WipeResult {
        tracing::info!("Wiping file: {} using {}", path.display(), method);
        if let Some(audit) = &self.audit {
            audit.session_start(&path.display().to_string(), method.as_str(), 1);
        }

        let mut tracker = ProgressTracker::new(self.progress_callback.as_deref(), 1);
        let result = self.wipe_one(path, method, 0, &mut tracker);
        if result.state != WipeState::Cancelled {
            tracker.finish();
        }
        self.set_idle();

        if let Some(audit) = &self.audit {
            let done = usize::from(result.state == WipeState::Done);
            let failed = usize::from(result.state == WipeState::Failed);
            let skipped = usize::from(result.state == WipeState::Cancelled);
            audit.session_end(done, failed, skipped);
        }
        result
    }

    /// Wipe every regular file under `folder`.
    ///
    /// Files are enumerated before any wipe starts. Symbolic links are never
    /// followed or wiped. With `recursive`, emptied subdirectories are
    /// pruned afterwards, cancelled or not.
    pub fn wipe_folder(
        &self,
        folder: &Path,
        method: WipeMethod,
        recursive: bool,
    ) -> Result<BatchResult> {
        let metadata = std::fs::symlink_metadata(folder).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => WipeError::PathNotFound(folder.to_path_buf()),
            _ => WipeError::io(folder, e),
        })?;
        if metadata.file_type().is_symlink() {
            return Err(WipeError::PathIsSymlink(folder.to_path_buf()));
        }
        if !metadata.is_dir() {
            return Err(WipeError::io(
                folder,
                io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            ));
        }
        if self.is_protected(folder) {
            return Err(WipeError::SystemFileProtected(folder.to_path_buf()));
        }

        let files = collect_files(folder, recursive).map_err(|e| WipeError::io(folder, e))?;
        tracing::info!(
            "Wiping folder: {} ({} files, recursive: {})",
            folder.display(),
            files.len(),
            recursive
        );

        let batch = self.run_batch(Some(folder), &files, method);

        // Runs after a cancelled batch as well; only empty directories are removed
        if recursive && self.config.remove_empty_dirs {
            remove_empty_dirs(folder);
        }
        Ok(batch)
    }

    /// Wipe an explicit, pre-validated list of files
    pub fn wipe_selection(&self, paths: &[PathBuf], method: WipeMethod) -> BatchResult {
        tracing::info!("Wiping selection: {} files using {}", paths.len(), method);
        self.run_batch(None, paths, method)
    }

    fn run_batch(&self, source: Option<&Path>, files: &[PathBuf], method: WipeMethod) -> BatchResult {
        let timer = Instant::now();
        let mut batch = BatchResult::new(source, method, files.len());

        if let Some(audit) = &self.audit {
            let target = source
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "selection".to_string());
            audit.session_start(&target, method.as_str(), files.len());
        }

        let mut tracker = ProgressTracker::new(self.progress_callback.as_deref(), files.len());

        for (index, path) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    "Operation cancelled, skipping {} remaining files",
                    files.len() - index
                );
                for remaining in &files[index..] {
                    batch.skip(remaining);
                    if let Some(audit) = &self.audit {
                        audit.file_skipped(remaining);
                    }
                }
                break;
            }

            let result = self.wipe_one(path, method, index, &mut tracker);
            batch.record(result);
        }

        if !batch.was_cancelled() {
            tracker.finish();
        }
        self.set_idle();

        batch.end_time = Utc::now();
        batch.duration_secs = timer.elapsed().as_secs_f64();

        tracing::info!(
            "Batch complete: {}/{} wiped, {} failed, {} skipped in {:.2}s",
            batch.successful,
            batch.total_files,
            batch.failed,
            batch.skipped,
            batch.duration_secs
        );
        if let Some(audit) = &self.audit {
            audit.session_end(batch.successful, batch.failed, batch.skipped);
        }
        batch
    }

    fn wipe_one(
        &self,
        path: &Path,
        method: WipeMethod,
        index: usize,
        tracker: &mut ProgressTracker<'_>,
    ) -> WipeResult {
        let timer = Instant::now();
        let mut result = WipeResult::pending(path, method, self.strategy.name());

        match self.sanitize_file(path, method, index, tracker) {
            Ok(outcome) => {
                self.set_state(path, WipeState::Verifying);
                result.passes_completed = outcome.passes_completed;
                result.bytes_written = outcome.bytes_written;
                result.sample_check = outcome.sample_check;
                result.verified = verify_wipe(path);

                if result.verified {
                    result.state = WipeState::Done;
                    result.success = true;
                    tracing::info!("✅ Wiped {}", path.display());
                    if let Some(audit) = &self.audit {
                        audit.file_wiped(path, method.as_str(), result.passes_completed, result.bytes_written);
                    }
                } else {
                    let err = WipeError::io(
                        path,
                        io::Error::new(io::ErrorKind::Other, "file still exists after wipe"),
                    );
                    result.fail_with(WipeState::Failed, &err);
                    tracing::warn!("❌ {}", err);
                    if let Some(audit) = &self.audit {
                        audit.file_failed(path, &err.to_string());
                    }
                }
            }
            Err(err) if err.is_cancellation() => {
                result.fail_with(WipeState::Cancelled, &err);
                tracing::warn!("Wipe of {} cancelled", path.display());
                if let Some(audit) = &self.audit {
                    audit.file_skipped(path);
                }
            }
            Err(err) => {
                result.fail_with(WipeState::Failed, &err);
                tracing::warn!("❌ Failed to wipe {}: {}", path.display(), err);
                if let Some(audit) = &self.audit {
                    match err.kind() {
                        ErrorKind::PathIsSymlink
                        | ErrorKind::NotAFile
                        | ErrorKind::SystemFileProtected => {
                            audit.validation_rejected(path, &err.to_string())
                        }
                        _ => audit.file_failed(path, &err.to_string()),
                    }
                }
            }
        }

        self.set_state(path, result.state);
        result.end_time = Utc::now();
        result.duration_secs = timer.elapsed().as_secs_f64();
        result
    }

    fn sanitize_file(
        &self,
        path: &Path,
        method: WipeMethod,
        index: usize,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<SanitizeOutcome> {
        self.set_state(path, WipeState::Validating);
        if self.cancel.is_cancelled() {
            return Err(WipeError::CancelledByUser);
        }
        self.preflight(path)?;

        self.set_state(path, WipeState::Overwriting);
        tracker.update(index, 0.0, path, WipeState::Overwriting);
        self.strategy
            .sanitize(path, method, &self.cancel, &mut |percent| {
                tracker.update(index, percent, path, WipeState::Overwriting)
            })
    }

    /// Refuse anything that is not an existing, regular, non-system file
    fn preflight(&self, path: &Path) -> Result<()> {
        let metadata = std::fs::symlink_metadata(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => WipeError::PathNotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => WipeError::PermissionDenied {
                path: path.to_path_buf(),
                reason: "cannot read metadata".to_string(),
            },
            _ => WipeError::io(path, e),
        })?;

        if metadata.file_type().is_symlink() {
            return Err(WipeError::PathIsSymlink(path.to_path_buf()));
        }
        if !metadata.is_file() {
            return Err(WipeError::NotAFile(path.to_path_buf()));
        }
        if self.is_protected(path) {
            return Err(WipeError::SystemFileProtected(path.to_path_buf()));
        }
        Ok(())
    }

    fn is_protected(&self, path: &Path) -> bool {
        self.platform.is_system_file(path)
            || std::fs::canonicalize(path)
                .map(|resolved| self.platform.is_system_file(&resolved))
                .unwrap_or(false)
    }

    fn lock_status(&self) -> MutexGuard<'_, EngineStatus> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, path: &Path, state: WipeState) {
        let mut status = self.lock_status();
        status.running = true;
        if status.current_path.as_deref() != Some(path) {
            status.current_path = Some(path.to_path_buf());
        }
        status.current_state = Some(state);
    }

    fn set_idle(&self) {
        let mut status = self.lock_status();
        status.running = false;
        status.current_path = None;
        status.current_state = None;
    }
}

/// Eagerly list regular files under `root`, sorted. Symlinks are skipped.
/// Only an unlistable root is an error; anything below it that cannot be
/// read is logged and left out.
fn collect_files(root: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            // The root must be listable; subdirectories are best effort
            Err(e) if dir == root => return Err(e),
            Err(e) => {
                tracing::warn!("Cannot list {}: {}", dir.display(), e);
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Cannot read entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    tracing::warn!("Cannot stat {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if file_type.is_symlink() {
                tracing::debug!("Skipping symbolic link {}", entry.path().display());
            } else if file_type.is_dir() {
                if recursive {
                    pending.push(entry.path());
                }
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Remove now-empty directories below `root`, deepest first. A directory
/// that is still non-empty holds residue of a failed wipe and is left alone.
fn remove_empty_dirs(root: &Path) {
    let Ok(entries) = std::fs::read_dir(root) else {
        return;
    };

    for entry in entries.flatten() {
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            let dir = entry.path();
            remove_empty_dirs(&dir);
            if std::fs::remove_dir(&dir).is_ok() {
                tracing::debug!("Removed empty directory {}", dir.display());
            }
        }
    }
}
