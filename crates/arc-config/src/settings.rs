use serde::Deserialize;

use crate::{Config, Result};

/// Host window configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub fullscreen: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Arcanee".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            fullscreen: false,
        }
    }
}

/// Everything the player binary reads before constructing the runtime.
#[derive(Debug, Clone)]
pub struct HostSettings {
    pub window: WindowSettings,
    /// Fixed simulation rate. The scheduler derives `dt_fixed = 1/tick_hz`.
    pub tick_hz: u32,
    /// Dev mode unlocks the `dev` script namespace and verbose errors.
    pub dev_mode: bool,
    /// Override for the user-data root (`save:/` and `temp:/` live here).
    pub user_data_root: Option<std::path::PathBuf>,
}

impl HostSettings {
    /// Reads the typed settings out of a layered [`Config`].
    ///
    /// # Errors
    ///
    /// Returns an error when a present value has the wrong shape; absent
    /// values take their defaults.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            window: config.get_or_default("window")?,
            tick_hz: config.get_or("runtime.tick_hz", 60)?,
            dev_mode: config.get_or("runtime.dev_mode", false)?,
            user_data_root: config.get("runtime.user_data_root")?,
        })
    }
}
