//! Platform collaborators: system file deny lists, file attributes and
//! optional native secure-delete tools

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use crate::sanitize::WipeMethod;

/// Platform metadata for a path. Informational only, never gates wiping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttributes {
    pub size: u64,
    pub readonly: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inode: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nlink: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
}

pub trait Platform: Send + Sync {
    fn name(&self) -> &'static str;

    /// Prefixes of critical OS paths, lowercase
    fn system_paths(&self) -> &'static [&'static str];

    /// Case-insensitive prefix match against the deny list
    fn is_system_file(&self, path: &Path) -> bool {
        let lowered = path.to_string_lossy().to_lowercase().replace('\\', "/");
        self.system_paths()
            .iter()
            .any(|prefix| lowered.starts_with(prefix))
    }

    fn file_attributes(&self, path: &Path) -> Option<FileAttributes> {
        read_attributes(path)
    }

    /// Native secure-delete command for `path`, if this platform has one
    fn secure_delete_command(&self, path: &Path, method: WipeMethod, passes: u32)
        -> Option<Command>;
}

pub struct LinuxPlatform;

impl Platform for LinuxPlatform {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn system_paths(&self) -> &'static [&'static str] {
        &[
            "/bin/", "/sbin/", "/boot/", "/dev/", "/proc/", "/sys/", "/lib/", "/lib64/",
            "/usr/bin/", "/usr/sbin/", "/usr/lib/", "/etc/fstab", "/etc/passwd",
            "/etc/shadow", "/etc/group",
        ]
    }

    fn secure_delete_command(
        &self,
        path: &Path,
        method: WipeMethod,
        passes: u32,
    ) -> Option<Command> {
        let shred = find_in_path("shred")?;
        let mut command = Command::new(shred);
        // -z adds a final zero pass, so Clear asks for no random passes at all
        let random_passes = match method {
            WipeMethod::Clear => 0,
            WipeMethod::Purge => passes.saturating_sub(1).max(1),
        };
        command
            .arg("-v")
            .arg("-z")
            .arg("-u")
            .arg(format!("--iterations={}", random_passes))
            .arg(path);
        Some(command)
    }
}

pub struct MacOsPlatform;

impl Platform for MacOsPlatform {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn system_paths(&self) -> &'static [&'static str] {
        &[
            "/system/", "/usr/bin/", "/usr/sbin/", "/usr/lib/", "/bin/", "/sbin/", "/boot/",
            "/library/extensions/", "/private/etc/", "/private/var/db/", "/private/var/vm/",
        ]
    }

    fn secure_delete_command(
        &self,
        path: &Path,
        method: WipeMethod,
        _passes: u32,
    ) -> Option<Command> {
        let srm = find_in_path("srm")?;
        let mut command = Command::new(srm);
        match method {
            WipeMethod::Clear => command.arg("-s"),
            WipeMethod::Purge => command.arg("-m"),
        };
        command.arg(path);
        Some(command)
    }
}

pub struct WindowsPlatform;

impl Platform for WindowsPlatform {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn system_paths(&self) -> &'static [&'static str] {
        &[
            "c:/windows/",
            "c:/program files/",
            "c:/program files (x86)/",
            "c:/programdata/microsoft/",
            "c:/pagefile.sys",
            "c:/hiberfil.sys",
            "c:/swapfile.sys",
            "c:/bootmgr",
            "c:/recovery/",
        ]
    }

    fn secure_delete_command(
        &self,
        path: &Path,
        _method: WipeMethod,
        passes: u32,
    ) -> Option<Command> {
        let sdelete = find_in_path("sdelete.exe").or_else(|| find_in_path("sdelete64.exe"))?;
        let mut command = Command::new(sdelete);
        command
            .arg("-nobanner")
            .arg("-p")
            .arg(passes.to_string())
            .arg(path);
        Some(command)
    }
}

/// Platform handler for the OS this binary was built for
pub fn current_platform() -> Arc<dyn Platform> {
    if cfg!(target_os = "macos") {
        Arc::new(MacOsPlatform)
    } else if cfg!(windows) {
        Arc::new(WindowsPlatform)
    } else {
        Arc::new(LinuxPlatform)
    }
}

/// Locate an executable on PATH
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

fn read_attributes(path: &Path) -> Option<FileAttributes> {
    let metadata = std::fs::symlink_metadata(path).ok()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        Some(FileAttributes {
            size: metadata.len(),
            readonly: metadata.permissions().readonly(),
            inode: Some(metadata.ino()),
            device: Some(metadata.dev()),
            nlink: Some(metadata.nlink()),
            uid: Some(metadata.uid()),
            gid: Some(metadata.gid()),
            mode: Some(metadata.mode()),
            permissions: Some(format_permissions(metadata.mode())),
        })
    }

    #[cfg(not(unix))]
    {
        Some(FileAttributes {
            size: metadata.len(),
            readonly: metadata.permissions().readonly(),
            inode: None,
            device: None,
            nlink: None,
            uid: None,
            gid: None,
            mode: None,
            permissions: None,
        })
    }
}

/// `rwxr-x---` style rendering of the low nine mode bits
pub fn format_permissions(mode: u32) -> String {
    const FLAGS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];

    FLAGS
        .iter()
        .map(|(bit, c)| if mode & bit != 0 { *c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_deny_list() {
        let platform = LinuxPlatform;
        assert!(platform.is_system_file(Path::new("/etc/shadow")));
        assert!(platform.is_system_file(Path::new("/usr/bin/ls")));
        assert!(platform.is_system_file(Path::new("/BOOT/vmlinuz")));
        assert!(!platform.is_system_file(Path::new("/home/alice/notes.txt")));
        assert!(!platform.is_system_file(Path::new("/etc/hosts")));
    }

    #[test]
    fn test_windows_deny_list_normalizes_separators() {
        let platform = WindowsPlatform;
        assert!(platform.is_system_file(Path::new(r"C:\Windows\System32\kernel32.dll")));
        assert!(!platform.is_system_file(Path::new(r"C:\Users\bob\report.docx")));
    }

    #[test]
    fn test_macos_deny_list() {
        let platform = MacOsPlatform;
        assert!(platform.is_system_file(Path::new("/System/Library/Kernels/kernel")));
        assert!(!platform.is_system_file(Path::new("/Users/carol/Desktop/a.txt")));
    }

    #[test]
    fn test_format_permissions() {
        assert_eq!(format_permissions(0o755), "rwxr-xr-x");
        assert_eq!(format_permissions(0o640), "rw-r-----");
        assert_eq!(format_permissions(0o100600), "rw-------");
    }

    #[test]
    fn test_file_attributes() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("a.bin");
        std::fs::write(&path, b"12345").unwrap();

        let attrs = current_platform().file_attributes(&path).unwrap();
        assert_eq!(attrs.size, 5);
        assert!(current_platform()
            .file_attributes(&temp_dir.path().join("missing"))
            .is_none());
    }
}
