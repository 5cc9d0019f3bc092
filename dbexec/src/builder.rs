use crate::connection_config::{ConnectionConfig, ProviderSource};
use dbexec_driver::{Command, CommandSpec, Connection, Driver, ProviderRegistry, Result};
use std::sync::Arc;
use tracing::{debug, instrument};

/// A command bound to a fresh, unopened connection
#[derive(Debug)]
pub struct BoundCommand {
    command: Command,
    connection: Box<dyn Connection>,
}

impl BoundCommand {
    #[must_use]
    pub fn command(&self) -> &Command {
        &self.command
    }

    #[must_use]
    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    pub(crate) fn into_parts(self) -> (Command, Box<dyn Connection>) {
        (self.command, self.connection)
    }
}

/// Builds driver commands from a [`ConnectionConfig`] and a [`CommandSpec`]
#[derive(Clone, Debug)]
pub struct CommandBuilder<'a> {
    registry: &'a ProviderRegistry,
}

impl<'a> CommandBuilder<'a> {
    #[must_use]
    pub fn new(registry: &'a ProviderRegistry) -> Self {
        Self { registry }
    }

    /// Create a new connection and a command bound to it.  The connection is never opened here.
    ///
    /// # Errors
    /// * [`UnknownProviderKind`](dbexec_driver::Error::UnknownProviderKind) or
    ///   [`ProviderUnavailable`](dbexec_driver::Error::ProviderUnavailable) if the driver cannot
    ///   be resolved
    /// * If the driver rejects the connection string
    #[instrument(level = "debug", skip_all, fields(command = spec.command_text()))]
    pub fn build(&self, config: &ConnectionConfig, spec: &CommandSpec) -> Result<BoundCommand> {
        let driver = self.driver(config)?;
        let connection = driver.create_connection(config.connection_string())?;

        let mut command = Command::new(spec.command_text(), spec.kind());
        command.timeout = spec.timeout();
        if !spec.parameters().is_empty() {
            command.parameters = spec
                .parameters()
                .iter()
                .map(|parameter| driver.create_parameter(parameter))
                .collect();
        }
        debug!(
            driver = driver.identifier(),
            parameters = command.parameters.len(),
            "command built"
        );

        Ok(BoundCommand {
            command,
            connection,
        })
    }

    fn driver(&self, config: &ConnectionConfig) -> Result<Arc<dyn Driver>> {
        match config.provider() {
            ProviderSource::Kind(kind) => self.registry.resolve(*kind),
            ProviderSource::Driver(driver) => Ok(Arc::clone(driver)),
        }
    }
}
