use crate::connection_config::ConnectionConfig;
use config::{Config, ConfigError, Environment, FileFormat};
use dbexec_driver::{Error, ProviderKind, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub(crate) static DEFAULT_CONFIG: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/resources/dbexec.toml"));

pub const DEFAULT_ENV_PREFIX: &str = "DBEXEC";

/// A named connection from the configuration
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct ConnectionSettings {
    pub provider: ProviderKind,
    pub connection_string: String,
}

/// A builder for creating a [Configuration] instance.
#[derive(Clone, Debug)]
pub struct ConfigurationBuilder {
    config_file: Option<PathBuf>,
    env_prefix: String,
    log_level: Option<String>,
    connections: Vec<(String, ConnectionSettings)>,
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self {
            config_file: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            log_level: None,
            connections: Vec::new(),
        }
    }
}

impl ConfigurationBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from a TOML file; the file must exist.
    #[must_use]
    pub fn with_config_file<P: Into<PathBuf>>(mut self, config_file: P) -> Self {
        self.config_file = Some(config_file.into());
        self
    }

    /// Set the prefix of the environment variables that override settings (e.g.
    /// `DBEXEC_LOG__LEVEL`).
    #[must_use]
    pub fn with_env_prefix<S: Into<String>>(mut self, env_prefix: S) -> Self {
        self.env_prefix = env_prefix.into();
        self
    }

    /// Set the log level to use.
    #[must_use]
    pub fn with_log_level<S: Into<String>>(mut self, log_level: S) -> Self {
        self.log_level = Some(log_level.into());
        self
    }

    /// Add a named connection; replaces a connection of the same name from files or the
    /// environment.
    #[must_use]
    pub fn with_connection<N, S>(
        mut self,
        name: N,
        provider: ProviderKind,
        connection_string: S,
    ) -> Self
    where
        N: Into<String>,
        S: Into<String>,
    {
        self.connections.push((
            name.into(),
            ConnectionSettings {
                provider,
                connection_string: connection_string.into(),
            },
        ));
        self
    }

    /// Build a [Configuration] instance.
    ///
    /// # Errors
    /// * [`ConfigurationError`](Error::ConfigurationError) if a source cannot be read or holds
    ///   invalid settings
    pub fn build(self) -> Result<Configuration> {
        let environment = Environment::with_prefix(&self.env_prefix)
            .prefix_separator("_")
            .separator("__");
        self.build_with_environment(environment)
    }

    fn build_with_environment(self, environment: Environment) -> Result<Configuration> {
        let mut builder =
            Config::builder().add_source(config::File::from_str(DEFAULT_CONFIG, FileFormat::Toml));
        if let Some(config_file) = &self.config_file {
            debug!("Configuration file: {}", config_file.display());
            builder = builder.add_source(
                config::File::from(config_file.as_path())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }
        debug!("Configuration environment prefix: {}", self.env_prefix);
        let config = builder
            .add_source(environment)
            .build()
            .map_err(configuration_error)?;

        let mut configuration = Configuration::default();
        if let Ok(log_level) = config.get::<String>("log.level") {
            configuration.log_level = log_level;
        }
        configuration.connections = match config.get("connections") {
            Ok(connections) => connections,
            Err(ConfigError::NotFound(_)) => BTreeMap::new(),
            Err(error) => return Err(configuration_error(error)),
        };

        if let Some(log_level) = self.log_level {
            configuration.log_level = log_level;
        }
        for (name, settings) in self.connections {
            configuration.connections.insert(name, settings);
        }
        Ok(configuration)
    }
}

/// Library settings: the log filter and the named connections.
#[derive(Clone, Debug, PartialEq)]
pub struct Configuration {
    pub log_level: String,
    pub connections: BTreeMap<String, ConnectionSettings>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            connections: BTreeMap::new(),
        }
    }
}

impl Configuration {
    #[must_use]
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    /// [`ConnectionConfig`] for a named connection
    ///
    /// # Errors
    /// * [`ConfigurationError`](Error::ConfigurationError) if no connection has this name
    pub fn connection(&self, name: &str) -> Result<ConnectionConfig> {
        match self.connections.get(name) {
            Some(settings) => Ok(ConnectionConfig::new(
                settings.provider,
                settings.connection_string.clone(),
            )),
            None => Err(Error::ConfigurationError(format!(
                "connection is not configured: {name}"
            ))),
        }
    }

    /// Install a fmt subscriber filtered by `RUST_LOG`, or by the configured log level when
    /// `RUST_LOG` is not set.  Does nothing if a global subscriber is already installed.
    ///
    /// # Errors
    /// * [`ConfigurationError`](Error::ConfigurationError) if the log level is not a valid filter
    pub fn init_tracing(&self) -> Result<()> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&self.log_level).map_err(|error| {
                let log_level = &self.log_level;
                Error::ConfigurationError(format!("invalid log level [{log_level}]: {error}"))
            })?,
        };

        if let Err(error) = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
        {
            debug!(%error, "tracing subscriber already installed");
        }
        Ok(())
    }
}

fn configuration_error(error: ConfigError) -> Error {
    Error::ConfigurationError(error.to_string())
}
