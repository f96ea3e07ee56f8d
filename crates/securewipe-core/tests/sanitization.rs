use std::io;
use std::path::{Path, PathBuf};

use securewipe_core::sanitize::{
    clear_schedule, purge_schedule, run_schedule, BlockSink, NistSanitizer, SecureDelete,
};
use securewipe_core::{verify_wipe, CancellationFlag, WipeConfig, WipeError, WipeMethod};
use tempfile::TempDir;

/// Records every block, grouped by pass (a rewind starts a new pass)
struct RecordingSink {
    path: PathBuf,
    len: u64,
    passes: Vec<Vec<Vec<u8>>>,
    syncs: usize,
}

impl RecordingSink {
    fn new(len: u64) -> Self {
        Self {
            path: PathBuf::from("recording"),
            len,
            passes: Vec::new(),
            syncs: 0,
        }
    }

    fn pass_bytes(&self, pass: usize) -> Vec<u8> {
        self.passes[pass].iter().flatten().copied().collect()
    }
}

impl BlockSink for RecordingSink {
    fn target(&self) -> &Path {
        &self.path
    }

    fn current_len(&mut self) -> io::Result<u64> {
        Ok(self.len)
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.passes.push(Vec::new());
        Ok(())
    }

    fn write_block(&mut self, block: &[u8]) -> io::Result<()> {
        if let Some(pass) = self.passes.last_mut() {
            pass.push(block.to_vec());
        }
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.syncs += 1;
        Ok(())
    }
}

#[test]
fn clear_writes_exactly_size_zero_bytes_in_blocks() {
    let block_size = 64 * 1024;
    for size in [0u64, 1, 65_535, 65_536, 65_537, 300_000] {
        let mut sink = RecordingSink::new(size);
        run_schedule(
            &mut sink,
            &clear_schedule(),
            block_size,
            &CancellationFlag::new(),
            false,
            &mut |_| {},
        )
        .unwrap();

        assert_eq!(sink.passes.len(), 1);
        let expected_blocks = size.div_ceil(block_size as u64) as usize;
        assert_eq!(sink.passes[0].len(), expected_blocks, "size {}", size);

        let bytes = sink.pass_bytes(0);
        assert_eq!(bytes.len() as u64, size);
        assert!(bytes.iter().all(|b| *b == 0));
        assert_eq!(sink.syncs, 1);
    }
}

#[test]
fn purge_schedule_patterns() {
    let mut sink = RecordingSink::new(20_000);
    run_schedule(
        &mut sink,
        &purge_schedule(7),
        4096,
        &CancellationFlag::new(),
        false,
        &mut |_| {},
    )
    .unwrap();

    assert_eq!(sink.passes.len(), 7);
    assert_eq!(sink.syncs, 7);
    assert!(sink.pass_bytes(0).iter().all(|b| *b == 0x00));
    assert!(sink.pass_bytes(1).iter().all(|b| *b == 0xFF));

    let random: Vec<Vec<u8>> = (2..7).map(|p| sink.pass_bytes(p)).collect();
    for pass in &random {
        assert_eq!(pass.len(), 20_000);
        assert!(pass.iter().any(|b| *b != pass[0]), "random pass is constant");
    }
    for i in 0..random.len() {
        for j in (i + 1)..random.len() {
            assert_ne!(random[i], random[j], "passes {} and {} repeat", i + 3, j + 3);
        }
    }
}

#[test]
fn purge_progress_is_monotonic_and_complete() {
    let mut sink = RecordingSink::new(50_000);
    let mut seen = Vec::new();
    run_schedule(
        &mut sink,
        &purge_schedule(7),
        4096,
        &CancellationFlag::new(),
        false,
        &mut |p| seen.push(p),
    )
    .unwrap();

    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert!(seen.iter().all(|p| (0.0..=100.0).contains(p)));
    assert_eq!(*seen.last().unwrap(), 100.0);
}

#[test]
fn clear_and_purge_on_real_files() {
    let temp_dir = TempDir::new().unwrap();
    let sanitizer = NistSanitizer::new(WipeConfig::default());

    for (name, method) in [("a.bin", WipeMethod::Clear), ("b.bin", WipeMethod::Purge)] {
        let path = temp_dir.path().join(name);
        std::fs::write(&path, vec![0x5Au8; 200_000]).unwrap();

        let outcome = sanitizer
            .sanitize(&path, method, &CancellationFlag::new(), &mut |_| {})
            .unwrap();
        assert_eq!(outcome.bytes_written, 200_000 * outcome.passes_completed as u64);
        assert!(verify_wipe(&path));
        assert!(verify_wipe(&path));
    }
}

#[test]
fn verify_wipe_false_while_file_exists() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("still-here.txt");
    std::fs::write(&path, b"x").unwrap();

    assert!(!verify_wipe(&path));
    assert!(!verify_wipe(&path));
}

#[test]
fn cancelled_purge_leaves_file_and_reports_cancellation() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("big.bin");
    std::fs::write(&path, vec![1u8; 64 * 1024 * 4]).unwrap();

    let cancel = CancellationFlag::new();
    let handle = cancel.clone();
    let result = NistSanitizer::default().sanitize(&path, WipeMethod::Purge, &cancel, &mut |p| {
        if p > 20.0 {
            handle.cancel();
        }
    });

    assert!(matches!(result, Err(WipeError::CancelledByUser)));
    assert!(path.exists());
}
