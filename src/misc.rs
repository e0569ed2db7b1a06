use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::Path;
use walkdir::WalkDir;

/// Copies a file, or a directory tree, from `src` to `dst`, overwriting existing files.
///
/// File permissions are carried over and symlinks are recreated rather than followed.
pub fn copy(src: &Path, dst: &Path) -> io::Result<u64> {
    let metadata = src.symlink_metadata()?;
    if !metadata.is_dir() {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }

        return copy_entry(src, dst, &metadata);
    }

    let mut copied = 0;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|why| io::Error::new(
            io::ErrorKind::Other,
            format!("entry in directory walk had an error: {}", why)
        ))?;

        let relative = entry.path().strip_prefix(src).map_err(|why| io::Error::new(
            io::ErrorKind::Other,
            format!("{} is not within {}: {}", entry.path().display(), src.display(), why)
        ))?;

        let target = dst.join(relative);
        let metadata = entry.path().symlink_metadata()?;
        if metadata.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            copied += copy_entry(entry.path(), &target, &metadata)?;
        }
    }

    Ok(copied)
}

fn copy_entry(src: &Path, dst: &Path, metadata: &fs::Metadata) -> io::Result<u64> {
    if metadata.file_type().is_symlink() {
        if dst.symlink_metadata().is_ok() {
            fs::remove_file(dst)?;
        }

        symlink(fs::read_link(src)?, dst)?;
        Ok(0)
    } else {
        fs::copy(src, dst)
    }
}

pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    debug!("setting mode of {} to {:04o}", path.display(), mode);
    fs::set_permissions(path, Permissions::from_mode(mode))
}

/// Total size in bytes of the regular files beneath `path`.
pub fn dir_size(path: &Path) -> io::Result<u64> {
    let mut size = 0;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|why| io::Error::new(
            io::ErrorKind::Other,
            format!("entry in directory walk had an error: {}", why)
        ))?;

        if entry.file_type().is_file() {
            size += entry.metadata().map_err(io::Error::from)?.len();
        }
    }

    Ok(size)
}

/// Bytes to KiB, rounding halves up as `Installed-Size` expects whole KiB.
pub fn kibibytes(bytes: u64) -> u64 {
    (bytes + 512) / 1024
}

/// Writes `contents` to `path`, creating any missing parent directories.
pub fn write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, contents)
}

/// Removes the directory if it exists, and recreates it empty.
pub fn empty_dir(path: &Path) -> io::Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }

    fs::create_dir_all(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn copies_trees() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("dist");
        fs::create_dir_all(src.join("locales")).unwrap();
        fs::write(src.join("electron"), b"#!/bin/sh\n").unwrap();
        fs::write(src.join("locales/en-US.pak"), b"pak").unwrap();
        set_mode(&src.join("electron"), 0o755).unwrap();
        symlink("electron", src.join("launcher")).unwrap();

        let dst = dir.path().join("opt/app");
        assert_eq!(copy(&src, &dst).unwrap(), 13);

        assert_eq!(fs::read(dst.join("locales/en-US.pak")).unwrap(), b"pak");
        let mode = fs::metadata(dst.join("electron")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(fs::read_link(dst.join("launcher")).unwrap(), Path::new("electron"));

        // A second copy overwrites in place.
        fs::write(src.join("locales/en-US.pak"), b"new").unwrap();
        copy(&src, &dst).unwrap();
        assert_eq!(fs::read(dst.join("locales/en-US.pak")).unwrap(), b"new");
    }

    #[test]
    fn copies_single_files() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("icon.png");
        fs::write(&src, b"png").unwrap();

        let dst = dir.path().join("opt/app/icon.png");
        copy(&src, &dst).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"png");
    }

    #[test]
    fn missing_source() {
        let dir = tempdir().unwrap();
        let result = copy(&dir.path().join("nothing"), &dir.path().join("dst"));
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn sizes() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a"), vec![0u8; 1000]).unwrap();
        fs::write(dir.path().join("sub/b"), vec![0u8; 536]).unwrap();

        assert_eq!(dir_size(dir.path()).unwrap(), 1536);
        assert_eq!(kibibytes(1536), 2);
        assert_eq!(kibibytes(1535), 1);
        assert_eq!(kibibytes(0), 0);
    }

    #[test]
    fn empties_directories() {
        let dir = tempdir().unwrap();
        let tmp = dir.path().join("tmp");
        write(tmp.join("stale/file"), b"old").unwrap();

        empty_dir(&tmp).unwrap();
        assert!(tmp.exists());
        assert_eq!(fs::read_dir(&tmp).unwrap().count(), 0);
    }
}
