//! Distribution-archive mount (`.arc` containers).
//!
//! The archive is a ZIP with a canonical internal layout: `/`-separated,
//! case-sensitive entry names with no traversal. Contents are read fully
//! into memory at mount time; cartridges are small and this keeps every
//! later read allocation-bounded and syscall-free.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::{Error, FileKind, Result, Stat, VfsPath};

/// Name of the optional integrity descriptor inside an archive.
pub const INTEGRITY_FILE: &str = "integrity.json";

#[derive(Debug, Deserialize)]
struct IntegrityManifest {
    #[serde(default)]
    algorithm: Option<String>,
    /// Archive-relative path -> lowercase hex SHA-256.
    files: BTreeMap<String, String>,
}

/// An immutable in-memory mount over a distribution archive.
pub struct ArchiveMount {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

impl ArchiveMount {
    /// Parses an archive and validates `integrity.json` when present.
    ///
    /// # Errors
    ///
    /// Fails on malformed ZIP data, on entry names that are absolute or
    /// contain traversal, and on any integrity mismatch.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|err| Error::Archive(err.to_string()))?;

        let mut files = BTreeMap::new();
        let mut dirs = BTreeSet::new();
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|err| Error::Archive(err.to_string()))?;
            // `enclosed_name` rejects absolute names and traversal.
            let Some(name) = entry.enclosed_name().map(|p| p.to_owned()) else {
                return Err(Error::Archive(format!(
                    "unsafe entry name {:?}",
                    entry.name()
                )));
            };
            let name = name
                .to_str()
                .ok_or_else(|| Error::Archive("non-UTF-8 entry name".to_string()))?
                .replace('\\', "/");

            if entry.is_dir() {
                dirs.insert(name.trim_end_matches('/').to_string());
                continue;
            }
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|err| Error::Archive(err.to_string()))?;

            // Implicit parent directories.
            let mut prefix = String::new();
            let segments: Vec<&str> = name.split('/').collect();
            for segment in segments.iter().take(segments.len().saturating_sub(1)) {
                if !prefix.is_empty() {
                    prefix.push('/');
                }
                prefix.push_str(segment);
                dirs.insert(prefix.clone());
            }
            files.insert(name, data);
        }

        let mount = Self { files, dirs };
        mount.validate_integrity()?;
        Ok(mount)
    }

    fn validate_integrity(&self) -> Result<()> {
        let Some(raw) = self.files.get(INTEGRITY_FILE) else {
            return Ok(());
        };
        let manifest: IntegrityManifest = serde_json::from_slice(raw)
            .map_err(|err| Error::Integrity(format!("{}: {}", INTEGRITY_FILE, err)))?;
        if let Some(algorithm) = &manifest.algorithm {
            if algorithm != "sha256" {
                return Err(Error::Integrity(format!(
                    "unsupported algorithm {:?}",
                    algorithm
                )));
            }
        }
        for (name, expected) in &manifest.files {
            let Some(data) = self.files.get(name) else {
                return Err(Error::Integrity(name.clone()));
            };
            let digest = Sha256::digest(data);
            let actual: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
            if &actual != &expected.to_ascii_lowercase() {
                return Err(Error::Integrity(name.clone()));
            }
        }
        Ok(())
    }

    pub fn read(&self, path: &VfsPath) -> Result<Vec<u8>> {
        self.files
            .get(path.rest())
            .cloned()
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    pub fn exists(&self, path: &VfsPath) -> bool {
        path.is_root() || self.files.contains_key(path.rest()) || self.dirs.contains(path.rest())
    }

    pub fn stat(&self, path: &VfsPath) -> Result<Stat> {
        if path.is_root() || self.dirs.contains(path.rest()) {
            return Ok(Stat {
                kind: FileKind::Dir,
                size: 0,
                mtime: None,
            });
        }
        match self.files.get(path.rest()) {
            Some(data) => Ok(Stat {
                kind: FileKind::File,
                size: data.len() as u64,
                mtime: None,
            }),
            None => Err(Error::NotFound(path.to_string())),
        }
    }

    /// Entry names directly under `path`, sorted lexicographically.
    pub fn list_dir(&self, path: &VfsPath) -> Result<Vec<String>> {
        if !path.is_root() && !self.dirs.contains(path.rest()) {
            return Err(Error::NotFound(path.to_string()));
        }
        let prefix = if path.is_root() {
            String::new()
        } else {
            format!("{}/", path.rest())
        };
        let mut names = BTreeSet::new();
        for name in self.files.keys().chain(self.dirs.iter()) {
            if let Some(rest) = name.strip_prefix(&prefix) {
                if rest.is_empty() {
                    continue;
                }
                let first = rest.split('/').next().unwrap_or(rest);
                names.insert(first.to_string());
            }
        }
        Ok(names.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn path(raw: &str) -> VfsPath {
        VfsPath::parse(raw).unwrap()
    }

    #[test]
    fn reads_and_lists() {
        let bytes = build_archive(&[
            ("cartridge.toml", b"id = \"x\""),
            ("scripts/main.rhai", b"fn init() {}"),
            ("scripts/util.rhai", b"// util"),
            ("assets/sfx.wav", b"RIFF"),
        ]);
        let mount = ArchiveMount::from_bytes(bytes).unwrap();

        assert_eq!(mount.read(&path("cart:/cartridge.toml")).unwrap(), b"id = \"x\"");
        assert!(mount.exists(&path("cart:/scripts")));
        assert_eq!(
            mount.list_dir(&path("cart:/")).unwrap(),
            ["assets", "cartridge.toml", "scripts"]
        );
        assert_eq!(
            mount.list_dir(&path("cart:/scripts")).unwrap(),
            ["main.rhai", "util.rhai"]
        );
        assert_eq!(
            mount.stat(&path("cart:/scripts/main.rhai")).unwrap().kind,
            FileKind::File
        );
        assert!(matches!(
            mount.read(&path("cart:/missing")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn integrity_validation() {
        let body: &[u8] = b"fn init() {}";
        let digest = Sha256::digest(body);
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();

        let good = build_archive(&[
            ("main.rhai", body),
            (
                INTEGRITY_FILE,
                format!(r#"{{"algorithm":"sha256","files":{{"main.rhai":"{}"}}}}"#, hex).as_bytes(),
            ),
        ]);
        assert!(ArchiveMount::from_bytes(good).is_ok());

        let bad = build_archive(&[
            ("main.rhai", b"tampered"),
            (
                INTEGRITY_FILE,
                format!(r#"{{"files":{{"main.rhai":"{}"}}}}"#, hex).as_bytes(),
            ),
        ]);
        assert!(matches!(
            ArchiveMount::from_bytes(bad),
            Err(Error::Integrity(_))
        ));

        let missing = build_archive(&[(
            INTEGRITY_FILE,
            br#"{"files":{"ghost.rhai":"00"}}"#,
        )]);
        assert!(matches!(
            ArchiveMount::from_bytes(missing),
            Err(Error::Integrity(_))
        ));
    }
}
