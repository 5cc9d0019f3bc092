use crate::error::Result;
use crate::{Connection, Parameter, ParameterSpec};
use mockall::automock;
use std::fmt::Debug;

/// Factory for the connections and parameters of one backend
#[automock]
pub trait Driver: Debug + Send + Sync {
    /// Driver name the factory is registered under
    fn identifier(&self) -> &'static str;

    /// Create a new, unopened connection
    ///
    /// # Errors
    /// * If the connection string cannot be used by this driver
    fn create_connection(&self, connection_string: &str) -> Result<Box<dyn Connection>>;

    /// Create a driver-native parameter
    fn create_parameter(&self, spec: &ParameterSpec) -> Parameter {
        Parameter::from(spec)
    }
}
