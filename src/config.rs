use log::debug;
use serde::Deserialize;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::Error;
use crate::store::ResourceStore;

const HOME_ENV: &str = "PAGEWATCH_HOME";
const HOME_DIR_NAME: &str = ".pagewatch";
const DATA_FILE: &str = "pages.json";
const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub config: ConfigOptions,
    #[serde(skip)]
    pub home: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ConfigOptions {
    pub check_interval_secs: u64,
    /// Per-fetch timeout. Unset means the HTTP client's default (none).
    pub timeout_secs: Option<u64>,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            check_interval_secs: DEFAULT_INTERVAL_SECS,
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Loads the configuration from the default home directory, creating the
    /// directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined, the directory
    /// cannot be created, or `config.toml` exists but is invalid.
    pub fn load() -> Result<Config, Error> {
        Self::load_from(home_dir()?)
    }

    /// Same as [`Config::load`] with an explicit home directory.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load_from<P: AsRef<Path>>(home: P) -> Result<Config, Error> {
        let home = home.as_ref();
        fs::create_dir_all(home)?;

        let path = home.join(CONFIG_FILE);
        let mut config: Config = match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                Config::default()
            }
            Err(e) => return Err(e.into()),
        };
        config.home = home.to_path_buf();

        if config.config.check_interval_secs == 0 {
            return Err(Error::Config(
                "check_interval_secs must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    #[must_use]
    pub fn store(&self) -> ResourceStore {
        ResourceStore::new(self.home.join(DATA_FILE))
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.config.timeout_secs.map(Duration::from_secs)
    }
}

// PAGEWATCH_HOME wins (also read from .env), then ~/.pagewatch.
fn home_dir() -> Result<PathBuf, Error> {
    if let Ok(home) = dotenvy::var(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir()
        .map(|home| home.join(HOME_DIR_NAME))
        .ok_or_else(|| Error::Config("could not determine the home directory".to_string()))
}
