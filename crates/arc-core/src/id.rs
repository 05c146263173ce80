use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A cartridge id failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid cartridge id {0:?}: expected 1-255 chars of [a-z0-9._-]")]
pub struct InvalidCartridgeId(pub String);

/// Stable identifier of a cartridge: `[a-z0-9._-]{1,255}`.
///
/// The id names the `save:/` and `temp:/` roots on the host filesystem,
/// which is why the charset is this conservative.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CartridgeId(String);

impl CartridgeId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidCartridgeId> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= 255
            && id
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'.' | b'_' | b'-'));
        if valid {
            Ok(Self(id))
        } else {
            Err(InvalidCartridgeId(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CartridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CartridgeId {
    type Err = InvalidCartridgeId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_documented_charset() {
        assert!(CartridgeId::new("com.example.my-game_2").is_ok());
        assert!(CartridgeId::new("a").is_ok());
        assert!(CartridgeId::new("a".repeat(255)).is_ok());
    }

    #[test]
    fn rejects_everything_else() {
        assert!(CartridgeId::new("").is_err());
        assert!(CartridgeId::new("Uppercase").is_err());
        assert!(CartridgeId::new("with space").is_err());
        assert!(CartridgeId::new("slash/y").is_err());
        assert!(CartridgeId::new("a".repeat(256)).is_err());
    }
}
