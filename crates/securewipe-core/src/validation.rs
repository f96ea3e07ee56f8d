//! Pre-flight validation.
//!
//! Every check here runs before any byte is overwritten. A selection that
//! contains even one system file is rejected as a whole.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::format::format_file_size;
use crate::sanitize::WipeMethod;

/// Files above this size are flagged as large
pub const LARGE_FILE_THRESHOLD: u64 = 1024 * 1024 * 1024;

/// Selections above this total size get a critical warning
pub const CRITICAL_TOTAL_SIZE: u64 = 10 * 1024 * 1024 * 1024;

/// Selections with more files than this need explicit confirmation
pub const CONFIRMATION_FILE_COUNT: usize = 10;

const EXECUTABLE_EXTENSIONS: [&str; 5] = ["exe", "dll", "so", "dylib", "app"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathType {
    File,
    Directory,
    Symlink,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathValidation {
    pub path: PathBuf,
    pub valid: bool,
    pub exists: bool,
    pub accessible: bool,
    #[serde(rename = "type")]
    pub path_type: Option<PathType>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionValidation {
    pub path: PathBuf,
    pub can_delete: bool,
    pub readable: bool,
    pub writable: bool,
    pub parent_writable: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidPath {
    pub path: PathBuf,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionValidation {
    pub valid: bool,
    pub total_files: usize,
    pub valid_files: Vec<PathBuf>,
    pub invalid_files: Vec<InvalidPath>,
    pub system_files: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyStatistics {
    pub total_files: usize,
    pub total_size: u64,
    pub large_files: usize,
    pub hidden_files: usize,
    pub executable_files: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyReport {
    pub safe: bool,
    pub warnings: Vec<String>,
    pub critical_warnings: Vec<String>,
    pub statistics: SafetyStatistics,
}

#[derive(Debug, Clone, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// Existence, type and readability. Symbolic links are always invalid,
    /// whatever they point at.
    pub fn validate_path(&self, path: &Path) -> PathValidation {
        let mut result = PathValidation {
            path: path.to_path_buf(),
            valid: false,
            exists: false,
            accessible: false,
            path_type: None,
            errors: Vec::new(),
        };

        if has_invalid_characters(path) {
            result.errors.push("Path contains invalid characters".to_string());
            return result;
        }

        // Never follow links: the link itself is what would be wiped
        let metadata = match std::fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                result.errors.push("Path does not exist".to_string());
                return result;
            }
            Err(e) => {
                result.errors.push(format!("Validation error: {}", e));
                return result;
            }
        };
        result.exists = true;

        let file_type = metadata.file_type();
        if file_type.is_symlink() {
            result.path_type = Some(PathType::Symlink);
            result.errors.push("Symbolic links are not supported".to_string());
            return result;
        } else if file_type.is_file() {
            result.path_type = Some(PathType::File);
        } else if file_type.is_dir() {
            result.path_type = Some(PathType::Directory);
        } else {
            result.path_type = Some(PathType::Unknown);
            result.errors.push("Unknown path type".to_string());
            return result;
        }

        if !access::readable(path) {
            result.errors.push("Path is not readable".to_string());
            return result;
        }

        result.accessible = true;
        result.valid = true;
        result
    }

    /// Deleting needs a writable file and a writable parent directory
    pub fn validate_permissions(&self, path: &Path) -> PermissionValidation {
        let mut result = PermissionValidation {
            path: path.to_path_buf(),
            can_delete: false,
            readable: false,
            writable: false,
            parent_writable: false,
            errors: Vec::new(),
        };

        if std::fs::symlink_metadata(path).is_err() {
            result.errors.push("Path does not exist".to_string());
            return result;
        }

        result.readable = access::readable(path);
        result.writable = access::writable(path);

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        result.parent_writable = access::writable(parent);

        if !result.writable {
            result.errors.push("File is not writable".to_string());
        }
        if !result.parent_writable {
            result.errors.push("Parent directory is not writable".to_string());
        }
        result.can_delete = result.writable && result.parent_writable;
        result
    }

    /// Validate a whole selection. System files are checked first, so they
    /// land in `system_files` no matter what their permissions are, and any
    /// one of them invalidates the selection.
    pub fn validate_selection<F>(&self, paths: &[PathBuf], is_system_file: F) -> SelectionValidation
    where
        F: Fn(&Path) -> bool,
    {
        let mut result = SelectionValidation {
            valid: true,
            total_files: paths.len(),
            valid_files: Vec::new(),
            invalid_files: Vec::new(),
            system_files: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        };

        if paths.is_empty() {
            result.valid = false;
            result.errors.push("No files selected".to_string());
            return result;
        }

        for path in paths {
            let resolved = std::fs::canonicalize(path).ok();
            if is_system_file(path.as_path()) || resolved.as_deref().map_or(false, &is_system_file) {
                result
                    .warnings
                    .push(format!("WARNING: {} appears to be a system file", path.display()));
                result.system_files.push(path.clone());
                continue;
            }

            let path_result = self.validate_path(path);
            if !path_result.valid {
                result.invalid_files.push(InvalidPath {
                    path: path.clone(),
                    reasons: path_result.errors,
                });
                continue;
            }

            let permissions = self.validate_permissions(path);
            if !permissions.can_delete {
                result.invalid_files.push(InvalidPath {
                    path: path.clone(),
                    reasons: permissions.errors,
                });
                continue;
            }

            result.valid_files.push(path.clone());
        }

        if !result.system_files.is_empty() {
            result.valid = false;
            result.errors.push(format!(
                "{} system file(s) detected - deletion not allowed",
                result.system_files.len()
            ));
        }
        if result.valid_files.is_empty() {
            result.valid = false;
            result.errors.push("No valid files to delete".to_string());
        }

        tracing::info!(
            "Validation: {}/{} files valid",
            result.valid_files.len(),
            paths.len()
        );
        result
    }

    pub fn validate_wipe_method(&self, method: &str) -> bool {
        match method.parse::<WipeMethod>() {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("{}", e);
                false
            }
        }
    }

    /// Advisory size/kind statistics; never blocks a wipe on its own
    pub fn validate_file_list_safety(&self, paths: &[PathBuf]) -> SafetyReport {
        let mut report = SafetyReport {
            safe: true,
            warnings: Vec::new(),
            critical_warnings: Vec::new(),
            statistics: SafetyStatistics {
                total_files: paths.len(),
                ..Default::default()
            },
        };

        for path in paths {
            let Ok(metadata) = std::fs::metadata(path) else {
                continue;
            };
            let size = metadata.len();
            report.statistics.total_size += size;

            if size > LARGE_FILE_THRESHOLD {
                report.statistics.large_files += 1;
                report.warnings.push(format!(
                    "Large file detected: {} ({})",
                    path.display(),
                    format_file_size(size)
                ));
            }
            if is_hidden(path) {
                report.statistics.hidden_files += 1;
            }
            if is_executable(path) {
                report.statistics.executable_files += 1;
                report
                    .warnings
                    .push(format!("Executable file detected: {}", path.display()));
            }
        }

        if report.statistics.large_files > 0 {
            report.warnings.push(format!(
                "{} large file(s) - deletion may take significant time",
                report.statistics.large_files
            ));
        }
        if report.statistics.total_size > CRITICAL_TOTAL_SIZE {
            report.safe = false;
            report.critical_warnings.push(format!(
                "WARNING: Deleting {} of data",
                format_file_size(report.statistics.total_size)
            ));
        }
        report
    }
}

/// More than 10 files or more than 1 GiB in total
pub fn require_user_confirmation(paths: &[PathBuf]) -> bool {
    if paths.len() > CONFIRMATION_FILE_COUNT {
        return true;
    }

    let total_size: u64 = paths
        .iter()
        .filter_map(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .sum();
    total_size > LARGE_FILE_THRESHOLD
}

fn has_invalid_characters(path: &Path) -> bool {
    path.to_string_lossy()
        .chars()
        .any(|c| c == '\0' || (c.is_control() && !matches!(c, '\t' | '\n' | '\r')))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn is_executable(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            EXECUTABLE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(unix)]
mod access {
    use rustix::fs::Access;
    use std::path::Path;

    pub fn readable(path: &Path) -> bool {
        rustix::fs::access(path, Access::READ_OK).is_ok()
    }

    pub fn writable(path: &Path) -> bool {
        rustix::fs::access(path, Access::WRITE_OK).is_ok()
    }
}

#[cfg(not(unix))]
mod access {
    use std::path::Path;

    pub fn readable(path: &Path) -> bool {
        if path.is_dir() {
            std::fs::read_dir(path).is_ok()
        } else {
            std::fs::File::open(path).is_ok()
        }
    }

    pub fn writable(path: &Path) -> bool {
        std::fs::metadata(path)
            .map(|m| !m.permissions().readonly())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_file(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"contents").unwrap();
        path
    }

    #[test]
    fn test_validate_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = make_file(&temp_dir, "a.txt");

        let result = Validator::new().validate_path(&path);
        assert!(result.valid);
        assert!(result.exists);
        assert!(result.accessible);
        assert_eq!(result.path_type, Some(PathType::File));

        let dir_result = Validator::new().validate_path(temp_dir.path());
        assert_eq!(dir_result.path_type, Some(PathType::Directory));
    }

    #[test]
    fn test_missing_and_control_characters() {
        let temp_dir = TempDir::new().unwrap();
        let validator = Validator::new();

        let missing = validator.validate_path(&temp_dir.path().join("nope"));
        assert!(!missing.valid);
        assert!(!missing.exists);
        assert_eq!(missing.errors, vec!["Path does not exist".to_string()]);

        let weird = validator.validate_path(&temp_dir.path().join("bad\u{7}name"));
        assert!(!weird.valid);
        assert_eq!(weird.errors, vec!["Path contains invalid characters".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let target = make_file(&temp_dir, "target.txt");
        let link = temp_dir.path().join("link.txt");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let result = Validator::new().validate_path(&link);
        assert!(!result.valid);
        assert_eq!(result.path_type, Some(PathType::Symlink));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "symlink");
    }

    #[test]
    fn test_permissions_of_writable_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = make_file(&temp_dir, "w.txt");

        let result = Validator::new().validate_permissions(&path);
        assert!(result.readable);
        assert!(result.writable);
        assert!(result.parent_writable);
        assert!(result.can_delete);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_selection_with_system_file_is_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let ordinary = make_file(&temp_dir, "ordinary.txt");
        let protected = make_file(&temp_dir, "protected.txt");

        let protected_name = protected.clone();
        let result = Validator::new().validate_selection(&[ordinary.clone(), protected.clone()], |p| {
            p.file_name() == protected_name.file_name()
        });

        assert!(!result.valid);
        assert_eq!(result.system_files, vec![protected.clone()]);
        assert_eq!(result.valid_files, vec![ordinary]);
        assert!(!result.valid_files.contains(&protected));
        assert!(result.errors[0].contains("system file(s) detected"));
    }

    #[test]
    fn test_selection_invalid_entries() {
        let temp_dir = TempDir::new().unwrap();
        let validator = Validator::new();

        let empty = validator.validate_selection(&[], |_| false);
        assert!(!empty.valid);
        assert_eq!(empty.errors, vec!["No files selected".to_string()]);

        let missing = temp_dir.path().join("missing.txt");
        let result = validator.validate_selection(&[missing.clone()], |_| false);
        assert!(!result.valid);
        assert_eq!(result.invalid_files[0].path, missing);
        assert!(result.errors.contains(&"No valid files to delete".to_string()));
    }

    #[test]
    fn test_wipe_method_validation() {
        let validator = Validator::new();
        assert!(validator.validate_wipe_method("clear"));
        assert!(validator.validate_wipe_method("PURGE"));
        assert!(!validator.validate_wipe_method("dod"));
    }

    #[test]
    fn test_file_list_safety() {
        let temp_dir = TempDir::new().unwrap();
        let paths = vec![
            make_file(&temp_dir, ".hidden"),
            make_file(&temp_dir, "libfoo.so"),
            make_file(&temp_dir, "notes.txt"),
            temp_dir.path().join("missing.bin"),
        ];

        let report = Validator::new().validate_file_list_safety(&paths);
        assert!(report.safe);
        assert_eq!(report.statistics.total_files, 4);
        assert_eq!(report.statistics.total_size, 24);
        assert_eq!(report.statistics.hidden_files, 1);
        assert_eq!(report.statistics.executable_files, 1);
        assert!(report.critical_warnings.is_empty());
    }

    #[test]
    fn test_require_user_confirmation() {
        let temp_dir = TempDir::new().unwrap();
        let few: Vec<PathBuf> = (0..3).map(|i| make_file(&temp_dir, &format!("{}.txt", i))).collect();
        assert!(!require_user_confirmation(&few));

        let many: Vec<PathBuf> = (0..11).map(|i| temp_dir.path().join(format!("{}.bin", i))).collect();
        assert!(require_user_confirmation(&many));
    }
}
