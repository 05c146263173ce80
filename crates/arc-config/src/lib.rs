//! Configuration.
//!
//! Layered host-side configuration for the runtime: window, dev mode, tick
//! rate, budget overrides. Cartridge manifests are a separate concern
//! (`arc-cartridge`); nothing here is visible to scripts.

// crate-specific lint exceptions:
//#![allow()]

mod errors;
mod settings;

use std::path::PathBuf;

use config::{ConfigError, FileFormat};

pub use errors::{Error, Result};
pub use settings::{HostSettings, WindowSettings};

/// The default filename for configuration files.
pub static DEFAULT_FILENAME: &str = "arcanee.toml";

/// Environment variable naming an extra configuration file to load.
pub static CONFIG_FILE_ENV: &str = "ARCANEE_CONFIG";

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) config: config::Config,
}

impl Config {
    /// Create a configuration from a TOML string.
    ///
    /// Useful for tests mostly.
    pub fn from_toml(toml: &str) -> Self {
        let config = config::Config::builder()
            .add_source(config::File::from_str(toml, FileFormat::Toml))
            .build()
            .expect("failed to build the configuration");
        Self { config }
    }

    /// Load the configuration from all its sources.
    ///
    /// If a value is set in several sources, the last read source wins.
    /// Sources, in order:
    ///
    /// - Any `arcanee.toml` in the current binary directory or one of its
    ///   parent directories, stopping at the first file found.
    /// - Any `arcanee.toml` in the current working directory or one of its
    ///   parent directories, stopping at the first file found (skipped if it
    ///   is the file already read above).
    /// - `<user-config-dir>/arcanee/arcanee.toml`.
    /// - Any file named by the `ARCANEE_CONFIG` environment variable.
    /// - Environment variables starting with `ARCANEE_`.
    ///
    /// # Errors
    ///
    /// If the configuration cannot be loaded, an error is returned.
    pub fn load() -> Result<Self> {
        let mut config_builder = config::Config::builder();

        // Starting with the current binary directory, walk up to the root,
        // stopping as soon as we find a configuration file.
        let mut known_path = None;
        if let Ok(exe) = std::env::current_exe() {
            if let Some(exe_dir) = exe.parent() {
                for dir in exe_dir.ancestors() {
                    let config_file_path = dir.join(DEFAULT_FILENAME);

                    if std::fs::metadata(&config_file_path).is_ok() {
                        config_builder = config_builder.add_source(
                            config::File::from(config_file_path.clone()).format(FileFormat::Toml),
                        );
                        known_path = Some(config_file_path);
                        break;
                    }
                }
            }
        }

        // Then, the closest file from the working directory.
        for dir in std::env::current_dir()?.ancestors() {
            let config_file_path = dir.join(DEFAULT_FILENAME);

            if std::fs::metadata(&config_file_path).is_ok() {
                if Some(&config_file_path) != known_path.as_ref() {
                    config_builder = config_builder
                        .add_source(config::File::from(config_file_path).format(FileFormat::Toml));
                }
                break;
            }
        }

        // If we have a user configuration folder, try to read from it.
        if let Some(config_dir) = dirs::config_dir() {
            let config_file_path = config_dir.join("arcanee").join(DEFAULT_FILENAME);
            config_builder = config_builder.add_source(
                config::File::from(config_file_path)
                    .required(false)
                    .format(FileFormat::Toml),
            );
        }

        // If a specific configuration file was specified, try to read it.
        if let Some(config_file_path) = std::env::var_os(CONFIG_FILE_ENV) {
            config_builder = config_builder.add_source(
                config::File::from(PathBuf::from(config_file_path)).format(FileFormat::Toml),
            );
        }

        // Finally, read from environment variables, starting with `ARCANEE`.
        config_builder = config_builder.add_source(config::Environment::with_prefix("ARCANEE"));

        Ok(Self {
            config: config_builder.build()?,
        })
    }

    /// Get the value specified by the key.
    ///
    /// If the value does not exist, None is returned.
    ///
    /// # Errors
    ///
    /// If any error occurs, including the specified key not existing in the
    /// configuration, it is returned.
    pub fn get<'de, T>(&self, key: &str) -> Result<Option<T>>
    where
        T: serde::Deserialize<'de>,
    {
        match self.config.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(err) => match &err {
                ConfigError::NotFound(missing_key) => {
                    if key == missing_key {
                        Ok(None)
                    } else {
                        Err(err.into())
                    }
                }
                _ => Err(err.into()),
            },
        }
    }

    /// Get the value specified by the key or a specified default value if it
    /// is not found.
    ///
    /// # Errors
    ///
    /// If any other error occurs, it is returned.
    pub fn get_or<'de, T>(&self, key: &str, default: T) -> Result<T>
    where
        T: serde::Deserialize<'de>,
    {
        self.get(key).map(|value| value.unwrap_or(default))
    }

    /// Get the value specified by the key or a default value if it is not
    /// found.
    ///
    /// # Errors
    ///
    /// If any other error occurs, it is returned.
    pub fn get_or_default<'de, T>(&self, key: &str) -> Result<T>
    where
        T: serde::Deserialize<'de> + Default,
    {
        self.get(key).map(Option::unwrap_or_default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_reads_from_toml() {
        let config = Config::from_toml(
            r#"
            [window]
            title = "demo"
            width = 1280
            height = 720
            vsync = false

            [runtime]
            tick_hz = 30
            "#,
        );

        let window: WindowSettings = config.get("window").unwrap().unwrap();
        assert_eq!(window.title, "demo");
        assert_eq!((window.width, window.height), (1280, 720));
        assert!(!window.vsync);

        assert_eq!(config.get_or("runtime.tick_hz", 60_u32).unwrap(), 30);
        assert_eq!(config.get_or("runtime.missing", 60_u32).unwrap(), 60);
        assert!(config.get::<String>("runtime.absent").unwrap().is_none());
    }

    #[test]
    fn host_settings_defaults() {
        let config = Config::from_toml("");
        let settings = HostSettings::from_config(&config).unwrap();
        assert_eq!(settings.window.title, "Arcanee");
        assert_eq!(settings.tick_hz, 60);
        assert!(!settings.dev_mode);
    }
}
