//! Canonical virtual paths.
//!
//! Every path a cartridge hands the runtime is reduced to the canonical
//! form `<ns>:/<segments>` before anything touches a mount. Traversal
//! (`..`) is rejected outright rather than resolved.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Maximum length of a canonical path, in bytes.
pub const MAX_PATH_LEN: usize = 240;

/// Bytes forbidden inside path segments.
const FORBIDDEN: &[u8] = b"\\:*?\"<>|";

/// The three sandbox namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Read-only cartridge content.
    Cart,
    /// Persistent storage, gated by `permissions.save_storage`.
    Save,
    /// Ephemeral cache storage, writable without the save permission.
    Temp,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Save => "save",
            Self::Temp => "temp",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "cart" => Some(Self::Cart),
            "save" => Some(Self::Save),
            "temp" => Some(Self::Temp),
            _ => None,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A canonicalized virtual path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VfsPath {
    namespace: Namespace,
    /// `/`-joined segments; empty for the namespace root.
    rest: String,
}

impl VfsPath {
    /// Canonicalizes a raw path.
    ///
    /// The algorithm: parse `<ns>:/`; replace `\` with `/`; split on `/`;
    /// drop empty and `.` segments; reject `..`; validate segment bytes and
    /// total length; reconstruct.
    ///
    /// # Errors
    ///
    /// Any malformed input fails with [`Error::InvalidPath`]; an unknown or
    /// missing namespace fails with [`Error::PermissionDenied`] (there is
    /// nothing outside the whitelist a cartridge may address).
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidPath {
            path: raw.to_string(),
            reason,
        };

        // Backslash is accepted as a separator everywhere, so flip it before
        // the prefix parse; `save:\x` and `save:/x` are the same path.
        let flipped = raw.replace('\\', "/");
        let (prefix, rest) = flipped
            .split_once(":/")
            .ok_or_else(|| invalid("missing namespace prefix"))?;
        let namespace = Namespace::from_prefix(prefix)
            .ok_or_else(|| Error::PermissionDenied(raw.to_string()))?;
        let mut segments: Vec<&str> = Vec::new();
        for segment in rest.split('/') {
            match segment {
                "" | "." => {}
                ".." => return Err(invalid("path traversal")),
                _ => {
                    if segment
                        .bytes()
                        .any(|b| b.is_ascii_control() || FORBIDDEN.contains(&b))
                    {
                        return Err(invalid("forbidden character"));
                    }
                    segments.push(segment);
                }
            }
        }

        let path = Self {
            namespace,
            rest: segments.join("/"),
        };
        if path.as_str_len() > MAX_PATH_LEN {
            return Err(invalid("path too long"));
        }
        Ok(path)
    }

    fn as_str_len(&self) -> usize {
        self.namespace.as_str().len() + 2 + self.rest.len()
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// The segments after the namespace, `/`-joined. Empty at the root.
    pub fn rest(&self) -> &str {
        &self.rest
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.rest.split('/').filter(|s| !s.is_empty())
    }

    pub fn is_root(&self) -> bool {
        self.rest.is_empty()
    }

    /// Final segment, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// The path with the final segment removed; the root is its own parent.
    pub fn parent(&self) -> Self {
        let rest = match self.rest.rfind('/') {
            Some(idx) => self.rest[..idx].to_string(),
            None => String::new(),
        };
        Self {
            namespace: self.namespace,
            rest,
        }
    }

    /// Appends a relative path (which is canonicalized with the same rules).
    ///
    /// # Errors
    ///
    /// Fails on traversal, forbidden characters, or overlong results.
    pub fn join(&self, relative: &str) -> Result<Self> {
        let combined = if self.rest.is_empty() {
            format!("{}:/{}", self.namespace, relative)
        } else {
            format!("{}:/{}/{}", self.namespace, self.rest, relative)
        };
        Self::parse(&combined)
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:/{}", self.namespace, self.rest)
    }
}

impl FromStr for VfsPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_forms() {
        let path = VfsPath::parse("cart:/a/./b//c").unwrap();
        assert_eq!(path.to_string(), "cart:/a/b/c");
        assert_eq!(path.namespace(), Namespace::Cart);

        // Backslashes are separators.
        let path = VfsPath::parse("save:\\data\\slot1.json").unwrap();
        assert_eq!(path.to_string(), "save:/data/slot1.json");

        // Trailing slashes and dot segments do not change the canonical form.
        let a = VfsPath::parse("temp:/x/y/").unwrap();
        let b = VfsPath::parse("temp:/x/./y").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = VfsPath::parse("cart:/a/./b//").unwrap();
        let twice = VfsPath::parse(&once.to_string()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn traversal_is_rejected() {
        assert!(matches!(
            VfsPath::parse("cart:/../etc/passwd"),
            Err(Error::InvalidPath { .. })
        ));
        assert!(VfsPath::parse("cart:/a/../b").is_err());
        assert!(VfsPath::parse("save:/..").is_err());
    }

    #[test]
    fn namespace_whitelist() {
        assert!(matches!(
            VfsPath::parse("sys:/anything"),
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            VfsPath::parse("/absolute/host/path"),
            Err(Error::InvalidPath { .. })
        ));
        assert!(VfsPath::parse("relative.txt").is_err());
    }

    #[test]
    fn forbidden_characters() {
        assert!(VfsPath::parse("cart:/a*b").is_err());
        assert!(VfsPath::parse("cart:/que?stion").is_err());
        assert!(VfsPath::parse("cart:/nul\u{0}byte").is_err());
        assert!(VfsPath::parse("cart:/col:on").is_err());
    }

    #[test]
    fn length_boundary() {
        // "cart:/" is 6 chars; pad to exactly 240 and 241.
        let ok = format!("cart:/{}", "a".repeat(MAX_PATH_LEN - 6));
        assert!(VfsPath::parse(&ok).is_ok());
        let too_long = format!("cart:/{}", "a".repeat(MAX_PATH_LEN - 5));
        assert!(VfsPath::parse(&too_long).is_err());
    }

    #[test]
    fn parent_and_join() {
        let path = VfsPath::parse("cart:/scripts/lib/util.rhai").unwrap();
        assert_eq!(path.parent().to_string(), "cart:/scripts/lib");
        assert_eq!(path.file_name(), Some("util.rhai"));

        let joined = path.parent().join("other.rhai").unwrap();
        assert_eq!(joined.to_string(), "cart:/scripts/lib/other.rhai");
        assert!(path.parent().join("../escape").is_err());

        let root = VfsPath::parse("save:/").unwrap();
        assert!(root.is_root());
        assert_eq!(root.parent(), root);
    }
}
