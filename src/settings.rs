use config::{Config, ConfigError, Environment, File, Source};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for Http {
    fn default() -> Self {
        Http {
            listen: default_listen(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Without a database section the records live in memory.
    pub postgres: Option<Postgres>,
    #[serde(default)]
    pub http: Http,
}

fn default_max_connections() -> u32 {
    5
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

impl Settings {
    /// Reads `path` if it exists, then `FINANCE__SECTION__KEY` variables.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Self::from_source(File::with_name(path).required(false))
    }

    fn from_source<S>(source: S) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let config = Config::builder()
            .add_source(source)
            .add_source(
                Environment::with_prefix("FINANCE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        config.try_deserialize()
    }
}
