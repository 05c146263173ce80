use arc_core::ErrorCategory;
use thiserror::Error;

/// An error type.
///
/// Messages carry *virtual* paths only. Host-side paths must never appear
/// in `Display` output; they would leak into Player-mode error strings.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("quota exceeded in {namespace}:/ ({used} + {requested} > {quota} bytes)")]
    QuotaExceeded {
        namespace: &'static str,
        used: u64,
        requested: u64,
        quota: u64,
    },
    #[error("I/O error on {path}: {kind}")]
    Io {
        path: String,
        kind: std::io::ErrorKind,
    },
    #[error("archive error: {0}")]
    Archive(String),
    #[error("integrity check failed for {0}")]
    Integrity(String),
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidPath { .. } => ErrorCategory::InvalidArgument,
            Self::PermissionDenied(_) => ErrorCategory::PermissionDenied,
            Self::NotFound(_) => ErrorCategory::IoError,
            Self::QuotaExceeded { .. } => ErrorCategory::QuotaExceeded,
            Self::Io { .. } => ErrorCategory::IoError,
            Self::Archive(_) | Self::Integrity(_) => ErrorCategory::AssetDecodeError,
        }
    }

    pub(crate) fn io(path: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            kind: err.kind(),
        }
    }
}

/// A result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
