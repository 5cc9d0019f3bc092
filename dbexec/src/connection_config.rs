use dbexec_driver::{Driver, ProviderKind};
use std::sync::Arc;

/// Where the driver for a connection comes from
#[derive(Clone, Debug)]
pub enum ProviderSource {
    /// Resolve the driver through the provider registry
    Kind(ProviderKind),
    /// Use this driver directly, bypassing the registry
    Driver(Arc<dyn Driver>),
}

/// Connection string plus the provider used to connect with it
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    connection_string: String,
    provider: ProviderSource,
}

impl ConnectionConfig {
    #[must_use]
    pub fn new<S: Into<String>>(kind: ProviderKind, connection_string: S) -> Self {
        Self {
            connection_string: connection_string.into(),
            provider: ProviderSource::Kind(kind),
        }
    }

    /// Connect with a caller supplied driver instead of a registered one
    #[must_use]
    pub fn with_driver<S: Into<String>>(driver: Arc<dyn Driver>, connection_string: S) -> Self {
        Self {
            connection_string: connection_string.into(),
            provider: ProviderSource::Driver(driver),
        }
    }

    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    #[must_use]
    pub fn provider(&self) -> &ProviderSource {
        &self.provider
    }

    /// Provider kind, when the driver is resolved through the registry
    #[must_use]
    pub fn kind(&self) -> Option<ProviderKind> {
        match self.provider {
            ProviderSource::Kind(kind) => Some(kind),
            ProviderSource::Driver(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use dbexec_driver::MockDriver;

    #[test]
    fn test_connection_config_kind() {
        let config = ConnectionConfig::new(ProviderKind::Sqlite, "sqlite://");
        assert_eq!(config.connection_string(), "sqlite://");
        assert_eq!(config.kind(), Some(ProviderKind::Sqlite));
    }

    #[test]
    fn test_connection_config_driver() {
        let mut driver = MockDriver::new();
        driver.expect_identifier().return_const("mock");
        let config = ConnectionConfig::with_driver(Arc::new(driver), "mock://");
        assert_eq!(config.kind(), None);
        match config.provider() {
            ProviderSource::Driver(driver) => assert_eq!(driver.identifier(), "mock"),
            ProviderSource::Kind(kind) => panic!("unexpected provider kind: {kind}"),
        }
    }
}
