//! Arcanee VFS
//!
//! The sandbox every cartridge file operation goes through. Three
//! namespaces exist: `cart:/` (read-only cartridge content, directory or
//! archive backed), `save:/` (persistent, permission-gated) and `temp:/`
//! (ephemeral cache, writable without the save permission). Paths are
//! canonicalized before use and host-side resolutions are verified to stay
//! inside their mount root, symlinks included.

// crate-specific lint exceptions:
//#![allow()]

mod archive;
mod errors;
mod mount;
mod path;

use std::path::Path;

pub use archive::{ArchiveMount, INTEGRITY_FILE};
pub use errors::{Error, Result};
pub use mount::DiskMount;
pub use path::{Namespace, VfsPath, MAX_PATH_LEN};

/// What `stat` reports for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub kind: FileKind,
    pub size: u64,
    /// Seconds since the Unix epoch; `None` where the backing store has no
    /// timestamps (archives).
    pub mtime: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Dir,
}

impl FileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Dir => "dir",
        }
    }
}

/// The `cart:/` backing store.
pub enum CartMount {
    /// Development layout: a plain directory, mounted read-only.
    Dir(DiskMount),
    /// Distribution layout: an in-memory `.arc` archive.
    Archive(ArchiveMount),
}

/// Quotas and permissions the sandbox enforces; a projection of the
/// effective policy so this crate does not depend on `arc-cartridge`.
#[derive(Debug, Clone)]
pub struct SandboxLimits {
    pub save_writes_enabled: bool,
    pub save_bytes: u64,
    pub temp_bytes: u64,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            save_writes_enabled: false,
            save_bytes: 256 << 20,
            temp_bytes: 64 << 20,
        }
    }
}

/// The namespaced sandbox filesystem of one cartridge instance.
pub struct Vfs {
    cart: CartMount,
    save: DiskMount,
    temp: DiskMount,
    limits: SandboxLimits,
}

impl Vfs {
    /// Mounts the three namespaces for a cartridge.
    ///
    /// `user_data_root` is the engine's per-user data directory; the
    /// cartridge id partitions it as `<root>/save/<id>` and
    /// `<root>/temp/<id>`.
    ///
    /// # Errors
    ///
    /// Fails when the writable roots cannot be created or the cart source
    /// cannot be opened.
    pub fn mount(
        cart: CartMount,
        user_data_root: &Path,
        cartridge_id: &str,
        limits: SandboxLimits,
    ) -> Result<Self> {
        let save = DiskMount::create(user_data_root.join("save").join(cartridge_id))?;
        let temp = DiskMount::create(user_data_root.join("temp").join(cartridge_id))?;
        Ok(Self {
            cart,
            save,
            temp,
            limits,
        })
    }

    /// Reads a whole file as bytes.
    pub fn read_bytes(&self, raw: &str) -> Result<Vec<u8>> {
        let path = VfsPath::parse(raw)?;
        match path.namespace() {
            Namespace::Cart => match &self.cart {
                CartMount::Dir(mount) => mount.read(&path),
                CartMount::Archive(mount) => mount.read(&path),
            },
            Namespace::Save => self.save.read(&path),
            Namespace::Temp => self.temp.read(&path),
        }
    }

    /// Reads a whole file as UTF-8 text (lossy for invalid sequences).
    pub fn read_text(&self, raw: &str) -> Result<String> {
        self.read_bytes(raw)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Writes a whole file atomically (write-temp-then-rename).
    pub fn write_bytes(&self, raw: &str, data: &[u8]) -> Result<()> {
        let path = VfsPath::parse(raw)?;
        let (mount, quota, namespace) = self.writable_mount(&path)?;

        let used = mount.used_bytes() - mount.file_size(&path);
        let requested = data.len() as u64;
        if used + requested > quota {
            return Err(Error::QuotaExceeded {
                namespace,
                used,
                requested,
                quota,
            });
        }
        mount.write(&path, data)
    }

    pub fn write_text(&self, raw: &str, text: &str) -> Result<()> {
        self.write_bytes(raw, text.as_bytes())
    }

    pub fn exists(&self, raw: &str) -> Result<bool> {
        let path = VfsPath::parse(raw)?;
        Ok(match path.namespace() {
            Namespace::Cart => match &self.cart {
                CartMount::Dir(mount) => mount.exists(&path),
                CartMount::Archive(mount) => mount.exists(&path),
            },
            Namespace::Save => self.save.exists(&path),
            Namespace::Temp => self.temp.exists(&path),
        })
    }

    pub fn stat(&self, raw: &str) -> Result<Stat> {
        let path = VfsPath::parse(raw)?;
        match path.namespace() {
            Namespace::Cart => match &self.cart {
                CartMount::Dir(mount) => mount.stat(&path),
                CartMount::Archive(mount) => mount.stat(&path),
            },
            Namespace::Save => self.save.stat(&path),
            Namespace::Temp => self.temp.stat(&path),
        }
    }

    /// Entry names under a directory, lexicographically sorted.
    pub fn list_dir(&self, raw: &str) -> Result<Vec<String>> {
        let path = VfsPath::parse(raw)?;
        match path.namespace() {
            Namespace::Cart => match &self.cart {
                CartMount::Dir(mount) => mount.list_dir(&path),
                CartMount::Archive(mount) => mount.list_dir(&path),
            },
            Namespace::Save => self.save.list_dir(&path),
            Namespace::Temp => self.temp.list_dir(&path),
        }
    }

    pub fn mkdir(&self, raw: &str) -> Result<()> {
        let path = VfsPath::parse(raw)?;
        let (mount, _, _) = self.writable_mount(&path)?;
        mount.mkdir(&path)
    }

    /// Removes a file or an empty directory.
    pub fn remove(&self, raw: &str) -> Result<()> {
        let path = VfsPath::parse(raw)?;
        let (mount, _, _) = self.writable_mount(&path)?;
        mount.remove(&path)
    }

    /// Wipes the whole `temp:/` namespace. Called on stop and reload.
    pub fn clear_temp(&self) -> Result<()> {
        let root = VfsPath::parse("temp:/")?;
        for name in self.temp.list_dir(&root)? {
            let entry = root.join(&name)?;
            if self.temp.stat(&entry)?.kind == FileKind::Dir {
                self.remove_tree(&entry)?;
            } else {
                self.temp.remove(&entry)?;
            }
        }
        Ok(())
    }

    fn remove_tree(&self, dir: &VfsPath) -> Result<()> {
        for name in self.temp.list_dir(dir)? {
            let entry = dir.join(&name)?;
            if self.temp.stat(&entry)?.kind == FileKind::Dir {
                self.remove_tree(&entry)?;
            } else {
                self.temp.remove(&entry)?;
            }
        }
        self.temp.remove(dir)
    }

    fn writable_mount(&self, path: &VfsPath) -> Result<(&DiskMount, u64, &'static str)> {
        match path.namespace() {
            Namespace::Cart => Err(Error::PermissionDenied(format!(
                "{} (cart:/ is read-only)",
                path
            ))),
            Namespace::Save => {
                if self.limits.save_writes_enabled {
                    Ok((&self.save, self.limits.save_bytes, "save"))
                } else {
                    Err(Error::PermissionDenied(format!(
                        "{} (save_storage permission not granted)",
                        path
                    )))
                }
            }
            Namespace::Temp => Ok((&self.temp, self.limits.temp_bytes, "temp")),
        }
    }
}
