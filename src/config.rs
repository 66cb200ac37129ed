use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::error::ConfigError;

/// Settings for the `kumitate` binary, read from a TOML file.
///
/// ```toml
/// source = "source"
/// output = "build"
///
/// [server]
/// port = 3000
/// cors = true
/// notify = false
/// ui = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Input tree, read only.
    pub source: Utf8PathBuf,
    /// Output tree, wiped on every full build.
    pub output: Utf8PathBuf,
    pub server: ServeOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: Utf8PathBuf::from("source"),
            output: Utf8PathBuf::from("build"),
            server: ServeOptions::default(),
        }
    }
}

impl Config {
    /// Load configuration from `path`; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Utf8Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no config file at {path}, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

/// Options for the development server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeOptions {
    /// HTTP port.
    pub port: u16,
    /// Allow cross-origin requests.
    pub cors: bool,
    /// Announce server readiness to connecting clients.
    pub notify: bool,
    /// Expose the status dashboard at `/__kumitate`.
    pub ui: bool,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            port: 3000,
            cors: true,
            notify: false,
            ui: false,
        }
    }
}
