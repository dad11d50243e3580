//! Toolchain binary resolution and checks.

use crate::error::ConfigError;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Compiler names tried, in order, by [`find_compiler`].
pub const COMPILER_CANDIDATES: &[&str] = &["clang", "clang-19", "clang-18", "clang-17", "clang-16"];

/// Resolve a configured toolchain or sandbox binary.
///
/// The path must be absolute. Symlinks are resolved (so `/usr/bin/clang`
/// pointing at a versioned binary is fine) and the target must be a regular
/// file executable by the current user.
pub fn resolve_binary(path: &Path) -> Result<PathBuf, ConfigError> {
    if !path.is_absolute() {
        return Err(ConfigError::BinNotAbsolute {
            path: path.display().to_string(),
        });
    }

    let canonical = std::fs::canonicalize(path).map_err(|e| {
        let path_str = path.display().to_string();
        match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::BinNotFound { path: path_str },
            _ => ConfigError::BinResolveFailed {
                path: path_str,
                reason: e.to_string(),
            },
        }
    })?;

    check_binary(&canonical)?;
    Ok(canonical)
}

/// Look for clang on a `PATH`-style search list.
pub fn find_compiler(search_path: &str) -> Option<PathBuf> {
    COMPILER_CANDIDATES.iter().find_map(|name| {
        search_path
            .split(':')
            .filter(|dir| !dir.is_empty())
            .map(|dir| Path::new(dir).join(name))
            .find(|candidate| resolve_binary(candidate).is_ok())
    })
}

/// Check that a path points to a regular executable file.
fn check_binary(path: &Path) -> Result<(), ConfigError> {
    let path_str = path.display().to_string();

    let metadata = std::fs::metadata(path).map_err(|e| ConfigError::BinResolveFailed {
        path: path_str.clone(),
        reason: e.to_string(),
    })?;

    if metadata.is_dir() {
        return Err(ConfigError::BinIsDirectory { path: path_str });
    }

    if !metadata.is_file() {
        return Err(ConfigError::BinNotRegularFile { path: path_str });
    }

    if !is_executable(&metadata) {
        return Err(ConfigError::BinNotExecutable { path: path_str });
    }

    Ok(())
}

/// Check owner, group, then other execute bits against the current user.
fn is_executable(metadata: &Metadata) -> bool {
    let mode = metadata.permissions().mode();

    // SAFETY: getuid/getgid cannot fail.
    let uid = unsafe { libc::getuid() };
    let gid = unsafe { libc::getgid() };

    if uid == metadata.uid() && (mode & 0o100) != 0 {
        return true;
    }

    if gid == metadata.gid() && (mode & 0o010) != 0 {
        return true;
    }

    if (mode & 0o001) != 0 {
        return true;
    }

    // root can execute anything with at least one execute bit
    uid == 0 && (mode & 0o111) != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn write_exec(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let file = dir.join(name);
        std::fs::write(&file, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(mode)).unwrap();
        file
    }

    #[test]
    fn test_relative_path_rejected() {
        let result = resolve_binary(Path::new("clang"));
        assert!(matches!(result, Err(ConfigError::BinNotAbsolute { .. })));
    }

    #[test]
    fn test_missing_compiler() {
        let result = resolve_binary(Path::new("/nonexistent/bin/clang"));
        assert!(matches!(result, Err(ConfigError::BinNotFound { .. })));
    }

    #[test]
    fn test_directory_rejected() {
        let tmp = TempDir::new().unwrap();
        let result = resolve_binary(tmp.path());
        assert!(matches!(result, Err(ConfigError::BinIsDirectory { .. })));
    }

    #[test]
    fn test_not_executable_rejected() {
        let tmp = TempDir::new().unwrap();
        let file = write_exec(tmp.path(), "clang", 0o644);
        let result = resolve_binary(&file);
        assert!(matches!(result, Err(ConfigError::BinNotExecutable { .. })));
    }

    #[test]
    fn test_device_file_rejected() {
        let result = resolve_binary(Path::new("/dev/null"));
        assert!(matches!(result, Err(ConfigError::BinNotRegularFile { .. })));
    }

    #[test]
    fn test_symlink_resolves() {
        let tmp = TempDir::new().unwrap();
        let real = write_exec(tmp.path(), "clang-18", 0o755);
        let link = tmp.path().join("clang");
        symlink(&real, &link).unwrap();

        let resolved = resolve_binary(&link).unwrap();
        assert_eq!(resolved, std::fs::canonicalize(&real).unwrap());
    }

    #[test]
    fn test_find_compiler_searches_path() {
        let empty = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        write_exec(tmp.path(), "clang", 0o755);

        let search = format!("{}:{}", empty.path().display(), tmp.path().display());
        let found = find_compiler(&search).unwrap();
        assert_eq!(found, tmp.path().join("clang"));

        assert!(find_compiler(&empty.path().display().to_string()).is_none());
    }
}
