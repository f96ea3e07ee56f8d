use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use securewipe_core::platform::LinuxPlatform;
use securewipe_core::validation::PathType;
use securewipe_core::{
    CancellationFlag, ErrorKind, Platform, Validator, WipeConfig, WipeEngine, WipeError,
    WipeMethod, WipeState,
};
use tempfile::TempDir;

/// Treats everything under one directory as protected
struct FencedPlatform {
    fence: String,
}

impl FencedPlatform {
    fn around(dir: &Path) -> Self {
        let canonical = std::fs::canonicalize(dir).unwrap();
        Self {
            fence: canonical.to_string_lossy().to_lowercase(),
        }
    }
}

impl Platform for FencedPlatform {
    fn name(&self) -> &'static str {
        "fenced"
    }

    fn system_paths(&self) -> &'static [&'static str] {
        &[]
    }

    fn is_system_file(&self, path: &Path) -> bool {
        path.to_string_lossy().to_lowercase().starts_with(&self.fence)
    }

    fn secure_delete_command(&self, _: &Path, _: WipeMethod, _: u32) -> Option<Command> {
        None
    }
}

#[test]
fn protected_files_are_never_touched() {
    let temp_dir = TempDir::new().unwrap();
    let protected = temp_dir.path().join("protected");
    std::fs::create_dir(&protected).unwrap();
    let file = protected.join("kernel.img");
    std::fs::write(&file, b"do not wipe").unwrap();

    let engine = WipeEngine::new(WipeConfig::default(), CancellationFlag::new())
        .with_platform(Arc::new(FencedPlatform::around(&protected)));

    let result = engine.wipe_file(&file, WipeMethod::Purge);
    assert_eq!(result.state, WipeState::Failed);
    assert_eq!(result.error_kind, Some(ErrorKind::SystemFileProtected));
    assert_eq!(result.bytes_written, 0);
    assert_eq!(std::fs::read(&file).unwrap(), b"do not wipe");

    let folder = engine.wipe_folder(&protected, WipeMethod::Clear, true);
    assert!(matches!(folder, Err(WipeError::SystemFileProtected(_))));
    assert!(file.exists());
}

#[cfg(target_os = "linux")]
#[test]
fn linux_deny_list_blocks_critical_paths_regardless_of_permissions() {
    let engine = WipeEngine::new(WipeConfig::default(), CancellationFlag::new())
        .with_platform(Arc::new(LinuxPlatform));

    for path in ["/etc/passwd", "/etc/shadow", "/usr/bin/env", "/boot/vmlinuz"] {
        let result = engine.wipe_file(Path::new(path), WipeMethod::Clear);
        assert!(!result.success, "{} was not refused", path);
        assert_ne!(result.state, WipeState::Done);
        if Path::new(path).exists() {
            assert_eq!(result.error_kind, Some(ErrorKind::SystemFileProtected), "{}", path);
        }
    }
}

#[test]
fn selection_with_a_system_file_is_rejected_as_a_whole() {
    let temp_dir = TempDir::new().unwrap();
    let ordinary = temp_dir.path().join("notes.txt");
    std::fs::write(&ordinary, b"notes").unwrap();

    let linux = LinuxPlatform;
    let selection = vec![ordinary.clone(), PathBuf::from("/etc/passwd")];
    let result = Validator::new().validate_selection(&selection, |p| linux.is_system_file(p));

    assert!(!result.valid);
    assert_eq!(result.system_files, vec![PathBuf::from("/etc/passwd")]);
    assert_eq!(result.valid_files, vec![ordinary]);
    assert!(result.errors.iter().any(|e| e.contains("system file")));
}

#[cfg(unix)]
#[test]
fn symlinks_are_refused_by_validator_and_engine() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("target.txt");
    std::fs::write(&target, b"linked").unwrap();
    let link = temp_dir.path().join("link.txt");
    std::os::unix::fs::symlink(&target, &link).unwrap();

    let validation = Validator::new().validate_path(&link);
    assert!(!validation.valid);
    assert_eq!(validation.path_type, Some(PathType::Symlink));
    assert!(Validator::new().validate_path(&target).valid);

    let engine = WipeEngine::new(WipeConfig::default(), CancellationFlag::new());
    let result = engine.wipe_file(&link, WipeMethod::Purge);
    assert_eq!(result.error_kind, Some(ErrorKind::PathIsSymlink));
    assert!(link.symlink_metadata().is_ok());
    assert_eq!(std::fs::read(&target).unwrap(), b"linked");

    let batch = engine.wipe_selection(&[link.clone()], WipeMethod::Clear);
    assert_eq!(batch.failed, 1);
    assert_eq!(std::fs::read(&target).unwrap(), b"linked");

    let folder_link = temp_dir.path().join("folder-link");
    std::os::unix::fs::symlink(temp_dir.path(), &folder_link).unwrap();
    assert!(matches!(
        engine.wipe_folder(&folder_link, WipeMethod::Clear, true),
        Err(WipeError::PathIsSymlink(_))
    ));
}

#[test]
fn directories_and_missing_paths_fail_cleanly() {
    let temp_dir = TempDir::new().unwrap();
    let engine = WipeEngine::new(WipeConfig::default(), CancellationFlag::new());

    let dir_result = engine.wipe_file(temp_dir.path(), WipeMethod::Clear);
    assert_eq!(dir_result.error_kind, Some(ErrorKind::NotAFile));
    assert!(temp_dir.path().exists());

    let missing = engine.wipe_file(&temp_dir.path().join("gone"), WipeMethod::Clear);
    assert_eq!(missing.error_kind, Some(ErrorKind::PathNotFound));

    assert!(matches!(
        engine.wipe_folder(&temp_dir.path().join("gone"), WipeMethod::Clear, false),
        Err(WipeError::PathNotFound(_))
    ));
}
