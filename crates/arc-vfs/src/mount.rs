//! Host-directory mounts.
//!
//! A [`DiskMount`] maps one namespace onto one host directory and is the
//! only code in the crate that touches host paths. Every resolution is
//! verified to stay inside the mount root after symlink resolution.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;

use crate::{Error, FileKind, Result, Stat, VfsPath};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct DiskMount {
    root: PathBuf,
    /// Symlink-resolved root; the jail boundary.
    canonical_root: PathBuf,
}

impl DiskMount {
    /// Opens (creating if needed) a mount rooted at `root`.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| Error::io("<mount root>", &err))?;
        let canonical_root = fs::canonicalize(&root).map_err(|err| Error::io("<mount root>", &err))?;
        Ok(Self {
            root,
            canonical_root,
        })
    }

    /// Opens an existing directory without creating it (dev `cart:/`).
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let canonical_root = fs::canonicalize(&root).map_err(|err| Error::io("<mount root>", &err))?;
        Ok(Self {
            root,
            canonical_root,
        })
    }

    fn resolve(&self, path: &VfsPath) -> PathBuf {
        let mut host = self.root.clone();
        for segment in path.segments() {
            host.push(segment);
        }
        host
    }

    /// Resolves and verifies the jail: the symlink-resolved deepest existing
    /// ancestor of the target must stay under the canonical root.
    fn resolve_checked(&self, path: &VfsPath) -> Result<PathBuf> {
        let host = self.resolve(path);
        let mut probe: &Path = &host;
        let resolved = loop {
            match fs::canonicalize(probe) {
                Ok(resolved) => break resolved,
                Err(_) => match probe.parent() {
                    Some(parent) => probe = parent,
                    None => return Err(Error::PermissionDenied(path.to_string())),
                },
            }
        };
        if resolved.starts_with(&self.canonical_root) {
            Ok(host)
        } else {
            Err(Error::PermissionDenied(path.to_string()))
        }
    }

    pub fn read(&self, path: &VfsPath) -> Result<Vec<u8>> {
        let host = self.resolve_checked(path)?;
        // The file itself may be a symlink; re-verify its resolved location.
        let resolved = fs::canonicalize(&host).map_err(|err| self.map_io(path, err))?;
        if !resolved.starts_with(&self.canonical_root) {
            return Err(Error::PermissionDenied(path.to_string()));
        }
        fs::read(&resolved).map_err(|err| self.map_io(path, err))
    }

    /// Atomic write: the bytes land in a sibling temporary file which is
    /// renamed over the destination.
    pub fn write(&self, path: &VfsPath, data: &[u8]) -> Result<()> {
        if path.is_root() {
            return Err(Error::InvalidPath {
                path: path.to_string(),
                reason: "cannot write the namespace root",
            });
        }
        let host = self.resolve_checked(path)?;
        if let Some(parent) = host.parent() {
            fs::create_dir_all(parent).map_err(|err| self.map_io(path, err))?;
        }
        let tmp = host.with_extension(format!(
            "tmp.{}.{}",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, data).map_err(|err| self.map_io(path, err))?;
        fs::rename(&tmp, &host).map_err(|err| {
            let _ = fs::remove_file(&tmp);
            self.map_io(path, err)
        })
    }

    pub fn exists(&self, path: &VfsPath) -> bool {
        match self.resolve_checked(path) {
            Ok(host) => host.exists(),
            Err(_) => false,
        }
    }

    pub fn stat(&self, path: &VfsPath) -> Result<Stat> {
        let host = self.resolve_checked(path)?;
        let metadata = fs::metadata(&host).map_err(|err| self.map_io(path, err))?;
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|duration| duration.as_secs());
        Ok(Stat {
            kind: if metadata.is_dir() {
                FileKind::Dir
            } else {
                FileKind::File
            },
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            mtime,
        })
    }

    /// Entry names, sorted lexicographically. A pure function of the
    /// directory contents.
    pub fn list_dir(&self, path: &VfsPath) -> Result<Vec<String>> {
        let host = self.resolve_checked(path)?;
        let entries = fs::read_dir(&host).map_err(|err| self.map_io(path, err))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| self.map_io(path, err))?;
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort_unstable();
        Ok(names)
    }

    pub fn mkdir(&self, path: &VfsPath) -> Result<()> {
        let host = self.resolve_checked(path)?;
        fs::create_dir_all(&host).map_err(|err| self.map_io(path, err))
    }

    /// Removes a file or an empty directory.
    pub fn remove(&self, path: &VfsPath) -> Result<()> {
        let host = self.resolve_checked(path)?;
        let metadata = fs::symlink_metadata(&host).map_err(|err| self.map_io(path, err))?;
        if metadata.is_dir() {
            fs::remove_dir(&host).map_err(|err| self.map_io(path, err))
        } else {
            fs::remove_file(&host).map_err(|err| self.map_io(path, err))
        }
    }

    /// Total size of all files under the mount, for quota accounting.
    pub fn used_bytes(&self) -> u64 {
        fn walk(dir: &Path, total: &mut u64) {
            let Ok(entries) = fs::read_dir(dir) else {
                return;
            };
            for entry in entries.flatten() {
                let Ok(metadata) = entry.metadata() else {
                    continue;
                };
                if metadata.is_dir() {
                    walk(&entry.path(), total);
                } else {
                    *total += metadata.len();
                }
            }
        }
        let mut total = 0;
        walk(&self.root, &mut total);
        total
    }

    /// Size of an existing file, 0 when absent. Quota accounting helper.
    pub fn file_size(&self, path: &VfsPath) -> u64 {
        self.resolve_checked(path)
            .ok()
            .and_then(|host| fs::metadata(host).ok())
            .map_or(0, |metadata| metadata.len())
    }

    fn map_io(&self, path: &VfsPath, err: std::io::Error) -> Error {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.to_string())
        } else {
            Error::io(path.to_string(), &err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mount() -> (tempfile::TempDir, DiskMount) {
        let dir = tempfile::tempdir().unwrap();
        let mount = DiskMount::create(dir.path().join("save")).unwrap();
        (dir, mount)
    }

    fn path(raw: &str) -> VfsPath {
        VfsPath::parse(raw).unwrap()
    }

    #[test]
    fn write_read_roundtrip() {
        let (_dir, mount) = mount();
        mount.write(&path("save:/a/b.txt"), b"hello").unwrap();
        assert_eq!(mount.read(&path("save:/a/b.txt")).unwrap(), b"hello");
        assert!(mount.exists(&path("save:/a/b.txt")));
        assert!(!mount.exists(&path("save:/a/missing.txt")));
    }

    #[test]
    fn stat_and_list() {
        let (_dir, mount) = mount();
        mount.write(&path("save:/z.txt"), b"1234").unwrap();
        mount.write(&path("save:/a.txt"), b"12").unwrap();
        mount.mkdir(&path("save:/sub")).unwrap();

        let stat = mount.stat(&path("save:/z.txt")).unwrap();
        assert_eq!(stat.kind, FileKind::File);
        assert_eq!(stat.size, 4);
        assert!(stat.mtime.is_some());

        // Lexicographic, stable.
        assert_eq!(mount.list_dir(&path("save:/")).unwrap(), ["a.txt", "sub", "z.txt"]);
    }

    #[test]
    fn remove_file_and_empty_dir() {
        let (_dir, mount) = mount();
        mount.write(&path("save:/f"), b"x").unwrap();
        mount.mkdir(&path("save:/d")).unwrap();
        mount.remove(&path("save:/f")).unwrap();
        mount.remove(&path("save:/d")).unwrap();
        assert!(!mount.exists(&path("save:/f")));
        assert!(matches!(
            mount.remove(&path("save:/f")),
            Err(Error::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_denied() {
        let (dir, mount) = mount();
        let outside = dir.path().join("outside.txt");
        fs::write(&outside, b"secret").unwrap();
        std::os::unix::fs::symlink(&outside, dir.path().join("save").join("link.txt")).unwrap();

        let err = mount.read(&path("save:/link.txt")).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        // The message names the virtual path, not the host path.
        assert!(err.to_string().contains("save:/link.txt"));
        assert!(!err.to_string().contains("outside"));
    }

    #[test]
    fn used_bytes_counts_files() {
        let (_dir, mount) = mount();
        mount.write(&path("save:/a"), &[0; 10]).unwrap();
        mount.write(&path("save:/d/b"), &[0; 5]).unwrap();
        assert_eq!(mount.used_bytes(), 15);
    }
}
