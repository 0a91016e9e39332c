use std::env;
use std::io;
use std::path::Path;
use std::str::FromStr;

use bracket_generator_core::math::MAX_PARTICIPANTS;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

macro_rules! from_environment {
    ($config:expr, $($key:expr, $name:tt),*$(,)?) => {{
        $(
            {
                if let Some(value) = parse_var($key) {
                    $config.$name = value;
                }
            }
        )*
    }};
}

/// Reads and parses an environment variable. Missing and unparsable values are both `None`.
fn parse_var<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    env::var(key).ok()?.parse().ok()
}

macro_rules! from_environment_error {
    ($config:expr, $($key:expr, $name:tt),*$(,)?) => {{
        $(
            let value = env::var($key).map_err(|_| ConfigError::MissingField($key))?;
            $config.$name = value.parse().map_err(|_| ConfigError::MissingField($key))?;
        )*
    }};
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub database: Database,
    pub loglevel: LevelFilter,
    #[serde(default)]
    pub generation: Generation,
}

impl Config {
    pub async fn from_file<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let mut file = File::open(path).await?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;

        Ok(toml::from_slice(&buf)?)
    }

    /// Creates a complete [`Config`] instance from the environment.
    pub fn from_environment() -> Result<Self, ConfigError> {
        let mut this = Self::default();

        from_environment_error!(this, "BG_LOGLEVEL", loglevel);

        this.database = Database::from_environment()?;
        this.generation = Generation::default().with_environment();

        Ok(this)
    }

    pub fn with_environment(mut self) -> Self {
        from_environment!(self, "BG_LOGLEVEL", loglevel);
        self.database = self.database.with_environment();
        self.generation = self.generation.with_environment();

        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: Database::default(),
            loglevel: LevelFilter::Info,
            generation: Generation::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Database {
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub prefix: String,
}

impl Database {
    pub fn connect_string(&self) -> String {
        format!(
            "{}://{}:{}@{}:{}/{}?ssl-mode=DISABLED",
            self.driver, self.user, self.password, self.host, self.port, self.database
        )
    }

    pub fn from_environment() -> Result<Self, ConfigError> {
        let mut this = Self::default();

        from_environment_error!(
            this,
            "BG_DB_DRIVER",
            driver,
            "BG_DB_HOST",
            host,
            "BG_DB_PORT",
            port,
            "BG_DB_USER",
            user,
            "BG_DB_PASSWORD",
            password,
            "BG_DB_DATABASE",
            database,
            "BG_DB_PREFIX",
            prefix,
        );

        Ok(this)
    }

    pub fn with_environment(mut self) -> Self {
        from_environment!(
            self,
            "BG_DB_DRIVER",
            driver,
            "BG_DB_HOST",
            host,
            "BG_DB_PORT",
            port,
            "BG_DB_USER",
            user,
            "BG_DB_PASSWORD",
            password,
            "BG_DB_DATABASE",
            database,
            "BG_DB_PREFIX",
            prefix,
        );

        self
    }
}

/// Defaults applied to every generation request that does not set them itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Generation {
    pub max_participants: usize,
    pub default_seeding: String,
}

impl Generation {
    pub fn with_environment(mut self) -> Self {
        from_environment!(
            self,
            "BG_GEN_MAX_PARTICIPANTS",
            max_participants,
            "BG_GEN_DEFAULT_SEEDING",
            default_seeding,
        );

        self
    }
}

impl Default for Generation {
    fn default() -> Self {
        Self {
            max_participants: MAX_PARTICIPANTS,
            default_seeding: String::from("random"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error("missing config field: {0}")]
    MissingField(&'static str),
}
