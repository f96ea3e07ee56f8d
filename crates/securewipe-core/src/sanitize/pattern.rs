//! Overwrite primitive
//!
//! Writes one pass of a byte pattern across the full length of a target in
//! fixed-size blocks, in block order starting at offset 0, and forces the
//! result to durable storage before returning. The target is abstracted
//! behind [`BlockSink`] so the exact write stream can be observed.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::cancel::CancellationFlag;
use crate::error::{Result, WipeError};

/// Size of each verification sample window
pub const SAMPLE_SIZE: u64 = 1024;

/// Byte pattern written during one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Every byte equals the given value
    Fixed(u8),
    /// Every block independently filled from the OS CSPRNG
    Random,
}

impl Pattern {
    pub const ZEROS: Pattern = Pattern::Fixed(0x00);
    pub const ONES: Pattern = Pattern::Fixed(0xFF);

    fn fill(&self, buf: &mut [u8]) -> io::Result<()> {
        match self {
            Pattern::Fixed(byte) => {
                buf.fill(*byte);
                Ok(())
            }
            Pattern::Random => OsRng
                .try_fill_bytes(buf)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e)),
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pattern::Fixed(0x00) => write!(f, "zeros"),
            Pattern::Fixed(0xFF) => write!(f, "ones"),
            Pattern::Fixed(byte) => write!(f, "0x{:02X}", byte),
            Pattern::Random => write!(f, "random"),
        }
    }
}

/// Pattern schedule for NIST Clear: a single zero pass
pub fn clear_schedule() -> Vec<Pattern> {
    vec![Pattern::ZEROS]
}

/// Pattern schedule for NIST Purge: zeros, ones, then random for the rest
pub fn purge_schedule(passes: u32) -> Vec<Pattern> {
    (1..=passes)
        .map(|pass| match pass {
            1 => Pattern::ZEROS,
            2 => Pattern::ONES,
            _ => Pattern::Random,
        })
        .collect()
}

/// One traversal of a target. Lives only for the duration of the pass.
#[derive(Debug, Clone)]
pub struct OverwritePass {
    pub pattern: Pattern,
    pub block_size: usize,
    pub length: u64,
    /// Byte offset cursor
    pub offset: u64,
}

impl OverwritePass {
    pub fn new(pattern: Pattern, block_size: usize, length: u64) -> Self {
        Self {
            pattern,
            block_size: block_size.max(1),
            length,
            offset: 0,
        }
    }

    pub fn block_count(&self) -> u64 {
        self.length.div_ceil(self.block_size as u64)
    }

    /// Fraction of this pass written so far, in [0, 1]
    pub fn fraction(&self) -> f64 {
        if self.length == 0 {
            1.0
        } else {
            self.offset as f64 / self.length as f64
        }
    }
}

/// Destination of an overwrite pass
pub trait BlockSink {
    /// Path used for error reporting
    fn target(&self) -> &Path;

    /// Length to overwrite, read fresh at the start of every pass
    fn current_len(&mut self) -> io::Result<u64>;

    /// Reposition to offset 0
    fn rewind(&mut self) -> io::Result<()>;

    fn write_block(&mut self, block: &[u8]) -> io::Result<()>;

    /// Flush and block until the OS reports the data durable
    fn sync(&mut self) -> io::Result<()>;
}

/// [`BlockSink`] over a regular file opened read/write without truncation
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => WipeError::PathNotFound(path.to_path_buf()),
                io::ErrorKind::PermissionDenied => WipeError::PermissionDenied {
                    path: path.to_path_buf(),
                    reason: "file is not writable".to_string(),
                },
                _ => WipeError::io(path, e),
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

impl BlockSink for FileSink {
    fn target(&self) -> &Path {
        &self.path
    }

    fn current_len(&mut self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0)).map(|_| ())
    }

    fn write_block(&mut self, block: &[u8]) -> io::Result<()> {
        self.file.write_all(block)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()
    }
}

/// Verification window and the bytes the final pass wrote into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleWindow {
    pub offset: u64,
    pub len: u64,
    pub expected: Vec<u8>,
}

/// First 1 KiB, a middle 1 KiB (len > 2 KiB), last 1 KiB (len > 1 KiB)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleWindows {
    windows: Vec<SampleWindow>,
}

impl SampleWindows {
    pub fn for_length(len: u64) -> Self {
        let mut windows = Vec::new();
        let mut push = |offset: u64, len: u64| {
            windows.push(SampleWindow {
                offset,
                len,
                expected: Vec::with_capacity(len as usize),
            })
        };

        if len > 0 {
            push(0, len.min(SAMPLE_SIZE));
        }
        if len > 2 * SAMPLE_SIZE {
            push(len / 2, SAMPLE_SIZE.min(len - len / 2));
        }
        if len > SAMPLE_SIZE {
            push(len - SAMPLE_SIZE, SAMPLE_SIZE);
        }

        Self { windows }
    }

    /// Record whatever part of a block falls inside a window.
    /// Blocks arrive in offset order, so appending keeps windows contiguous.
    fn capture(&mut self, offset: u64, block: &[u8]) {
        let block_end = offset + block.len() as u64;
        for window in &mut self.windows {
            let start = window.offset.max(offset);
            let end = (window.offset + window.len).min(block_end);
            if start < end {
                window
                    .expected
                    .extend_from_slice(&block[(start - offset) as usize..(end - offset) as usize]);
            }
        }
    }

    pub fn windows(&self) -> &[SampleWindow] {
        &self.windows
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Write one full pass. `progress` receives the fraction of this pass done
/// after every block. Cancellation is checked before every block.
pub fn overwrite_pass<S: BlockSink + ?Sized>(
    sink: &mut S,
    pass: &mut OverwritePass,
    cancel: &CancellationFlag,
    mut samples: Option<&mut SampleWindows>,
    progress: &mut dyn FnMut(f64),
) -> Result<u64> {
    let target = sink.target().to_path_buf();
    sink.rewind().map_err(|e| WipeError::io(&target, e))?;

    let buffer_len = pass.length.min(pass.block_size as u64).max(1) as usize;
    let mut buffer = vec![0u8; buffer_len];
    if let Pattern::Fixed(_) = pass.pattern {
        pass.pattern
            .fill(&mut buffer)
            .map_err(|e| WipeError::io(&target, e))?;
    }

    while pass.offset < pass.length {
        if cancel.is_cancelled() {
            return Err(WipeError::CancelledByUser);
        }

        let chunk = (pass.length - pass.offset).min(pass.block_size as u64) as usize;
        let block = &mut buffer[..chunk];
        if pass.pattern == Pattern::Random {
            pass.pattern
                .fill(block)
                .map_err(|e| WipeError::io(&target, e))?;
        }

        sink.write_block(block)
            .map_err(|e| WipeError::io(&target, e))?;
        if let Some(samples) = samples.as_deref_mut() {
            samples.capture(pass.offset, block);
        }

        pass.offset += chunk as u64;
        progress(pass.fraction());
    }

    // An unsynced pass provides no sanitization guarantee
    sink.sync().map_err(|e| WipeError::io(&target, e))?;

    Ok(pass.offset)
}

/// Result of running a full pattern schedule
#[derive(Debug, Clone, Default)]
pub struct ScheduleOutcome {
    pub passes_completed: u32,
    pub bytes_written: u64,
    pub final_pass_samples: Option<SampleWindows>,
}

/// Run every pass of `schedule` in order. Progress is reported in [0, 100]:
/// pass `p` of `N` occupies `[(p-1)/N, p/N) * 100`.
pub fn run_schedule<S: BlockSink + ?Sized>(
    sink: &mut S,
    schedule: &[Pattern],
    block_size: usize,
    cancel: &CancellationFlag,
    capture_final: bool,
    progress: &mut dyn FnMut(f64),
) -> Result<ScheduleOutcome> {
    let total = schedule.len().max(1) as f64;
    let mut outcome = ScheduleOutcome::default();

    for (index, pattern) in schedule.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(WipeError::CancelledByUser);
        }

        let length = sink
            .current_len()
            .map_err(|e| WipeError::io(sink.target(), e))?;
        let is_final = index + 1 == schedule.len();
        let mut samples = (capture_final && is_final).then(|| SampleWindows::for_length(length));

        tracing::debug!(
            "Pass {}/{} ({}) over {} bytes of {}",
            index + 1,
            schedule.len(),
            pattern,
            length,
            sink.target().display()
        );

        let base = index as f64;
        let mut pass = OverwritePass::new(*pattern, block_size, length);
        let written = overwrite_pass(&mut *sink, &mut pass, cancel, samples.as_mut(), &mut |fraction| {
            progress((base + fraction) / total * 100.0)
        })?;
        if length == 0 {
            progress((base + 1.0) / total * 100.0);
        }

        outcome.passes_completed += 1;
        outcome.bytes_written += written;
        if samples.is_some() {
            outcome.final_pass_samples = samples;
        }
    }

    Ok(outcome)
}
