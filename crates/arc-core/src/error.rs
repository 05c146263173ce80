use std::fmt;

/// Category attached to every runtime failure surfaced to a cartridge.
///
/// Categories are documentation-level: scripts observe them only through the
/// `"<function>: <cause>"` last-error string, never as enum values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    CompileError,
    RuntimeError,
    MissingEntryPoints,
    ModuleLoadError,
    InvalidArgument,
    InvalidHandle,
    PermissionDenied,
    QuotaExceeded,
    UnsupportedFeature,
    IoError,
    AssetDecodeError,
    DeviceError,
    AudioDeviceError,
    UpdateBudgetOverrun,
    HangDetected,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CompileError => "CompileError",
            Self::RuntimeError => "RuntimeError",
            Self::MissingEntryPoints => "MissingEntryPoints",
            Self::ModuleLoadError => "ModuleLoadError",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidHandle => "InvalidHandle",
            Self::PermissionDenied => "PermissionDenied",
            Self::QuotaExceeded => "QuotaExceeded",
            Self::UnsupportedFeature => "UnsupportedFeature",
            Self::IoError => "IOError",
            Self::AssetDecodeError => "AssetDecodeError",
            Self::DeviceError => "DeviceError",
            Self::AudioDeviceError => "AudioDeviceError",
            Self::UpdateBudgetOverrun => "UpdateBudgetOverrun",
            Self::HangDetected => "HangDetected",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
