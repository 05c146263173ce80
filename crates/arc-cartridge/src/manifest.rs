use std::fmt;
use std::str::FromStr;

use arc_core::CartridgeId;
use serde::Deserialize;

use crate::display::{AspectMode, Preset, ScalingMode};
use crate::{Error, Result, DEFAULT_ENTRY, SUPPORTED_API_VERSION};

/// `major.minor` version of the scripting API a cartridge was written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ApiVersion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s.split_once('.').ok_or(())?;
        // A trailing patch component is tolerated and ignored.
        let minor = minor.split('.').next().ok_or(())?;
        Ok(Self {
            major: major.parse().map_err(|_| ())?,
            minor: minor.parse().map_err(|_| ())?,
        })
    }
}

/// Display preferences declared by the cartridge.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DisplayPrefs {
    pub aspect: AspectMode,
    pub preset: Preset,
    pub scaling: ScalingMode,
    pub allow_user_override: Option<bool>,
}

impl DisplayPrefs {
    pub fn allow_user_override(&self) -> bool {
        self.allow_user_override.unwrap_or(true)
    }
}

/// Capability switches requested by the cartridge. All default to off
/// except `audio`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Permissions {
    pub save_storage: bool,
    pub audio: bool,
    /// Reserved; the runtime has no networking stack.
    pub net: bool,
    /// Reserved; cartridges can never load native code.
    pub native: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            save_storage: false,
            audio: true,
            net: false,
            native: false,
        }
    }
}

/// Advisory budgets requested by the manifest. The runtime is authoritative
/// and only ever clamps these downward; see [`crate::EffectivePolicy`].
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CapsRequest {
    pub audio_channels: Option<u32>,
    pub save_bytes: Option<u64>,
    pub temp_bytes: Option<u64>,
    pub max_surfaces: Option<u32>,
    pub max_images: Option<u32>,
    pub max_entities: Option<u32>,
    pub texture_memory_bytes: Option<u64>,
    pub cpu_ms_per_update: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawManifest {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    version: String,
    api_version: String,
    entry: Option<String>,
    #[serde(default)]
    display: DisplayPrefs,
    #[serde(default)]
    permissions: Permissions,
    #[serde(default)]
    caps: CapsRequest,
}

/// A parsed, validated cartridge descriptor.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub id: CartridgeId,
    pub title: String,
    pub version: String,
    pub api_version: ApiVersion,
    /// Entry script path relative to `cart:/`.
    pub entry: String,
    pub display: DisplayPrefs,
    pub permissions: Permissions,
    pub caps: CapsRequest,
}

impl Manifest {
    /// Parses a descriptor, trying TOML first and JSON second.
    ///
    /// `toml` and `json` are the raw descriptor bytes when the respective
    /// file exists in the cartridge. TOML wins when both exist.
    ///
    /// # Errors
    ///
    /// Fails when neither descriptor exists, on syntax errors in the chosen
    /// format, and on any field validation failure.
    pub fn parse(toml: Option<&str>, json: Option<&str>) -> Result<Self> {
        let raw: RawManifest = if let Some(toml) = toml {
            toml::from_str(toml).map_err(|err| Error::Parse(err.to_string()))?
        } else if let Some(json) = json {
            serde_json::from_str(json).map_err(|err| Error::Parse(err.to_string()))?
        } else {
            return Err(Error::MissingDescriptor);
        };
        Self::validate(raw)
    }

    fn validate(raw: RawManifest) -> Result<Self> {
        let id = CartridgeId::new(raw.id)?;

        let api_version: ApiVersion =
            raw.api_version
                .parse()
                .map_err(|()| Error::InvalidField {
                    field: "api_version",
                    reason: format!("{:?} is not a version string", raw.api_version),
                })?;
        if api_version > SUPPORTED_API_VERSION {
            return Err(Error::UnsupportedApiVersion {
                found: api_version.to_string(),
                supported: SUPPORTED_API_VERSION,
            });
        }

        let entry = match raw.entry {
            Some(entry) if entry.is_empty() => {
                return Err(Error::InvalidField {
                    field: "entry",
                    reason: "must not be empty".to_string(),
                })
            }
            Some(entry) => entry,
            None => DEFAULT_ENTRY.to_string(),
        };

        Ok(Self {
            id,
            title: raw.title,
            version: raw.version,
            api_version,
            entry,
            display: raw.display,
            permissions: raw.permissions,
            caps: raw.caps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_TOML: &str = r#"
        id = "com.example.pong"
        title = "Pong"
        version = "1.2.0"
        api_version = "0.1"
        entry = "game.rhai"

        [display]
        aspect = "4:3"
        preset = "medium"
        scaling = "integer_nearest"
        allow_user_override = false

        [permissions]
        save_storage = true
        audio = true

        [caps]
        audio_channels = 8
        max_surfaces = 4

        # Unknown fields anywhere are ignored.
        [workbench]
        favorite = true
    "#;

    #[test]
    fn parses_a_full_toml_descriptor() {
        let manifest = Manifest::parse(Some(FULL_TOML), None).unwrap();
        assert_eq!(manifest.id.as_str(), "com.example.pong");
        assert_eq!(manifest.entry, "game.rhai");
        assert_eq!(manifest.display.aspect, AspectMode::Classic);
        assert_eq!(manifest.display.scaling, ScalingMode::IntegerNearest);
        assert!(!manifest.display.allow_user_override());
        assert!(manifest.permissions.save_storage);
        assert_eq!(manifest.caps.audio_channels, Some(8));
    }

    #[test]
    fn toml_takes_precedence_over_json() {
        let json = r#"{ "id": "from.json", "api_version": "0.1" }"#;
        let manifest = Manifest::parse(Some(FULL_TOML), Some(json)).unwrap();
        assert_eq!(manifest.id.as_str(), "com.example.pong");

        let manifest = Manifest::parse(None, Some(json)).unwrap();
        assert_eq!(manifest.id.as_str(), "from.json");
    }

    #[test]
    fn missing_descriptor_is_rejected() {
        assert!(matches!(
            Manifest::parse(None, None),
            Err(Error::MissingDescriptor)
        ));
    }

    #[test]
    fn missing_entry_defaults() {
        let manifest =
            Manifest::parse(Some("id = \"a\"\napi_version = \"0.1\"\n"), None).unwrap();
        assert_eq!(manifest.entry, DEFAULT_ENTRY);
    }

    #[test]
    fn future_api_version_is_rejected() {
        let result = Manifest::parse(Some("id = \"a\"\napi_version = \"2.0\"\n"), None);
        assert!(matches!(result, Err(Error::UnsupportedApiVersion { .. })));
    }

    #[test]
    fn bad_enum_values_are_rejected() {
        let result = Manifest::parse(
            Some("id = \"a\"\napi_version = \"0.1\"\n[display]\nscaling = \"zoom\"\n"),
            None,
        );
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn bad_id_is_rejected() {
        let result = Manifest::parse(Some("id = \"Bad Id\"\napi_version = \"0.1\"\n"), None);
        assert!(matches!(result, Err(Error::InvalidId(_))));
    }
}
