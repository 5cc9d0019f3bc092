use crate::Value;
use std::time::Duration;

/// How the command text is interpreted by the driver
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum CommandKind {
    #[default]
    Text,
    StoredProcedure,
}

/// Direction of a command parameter
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

impl ParameterDirection {
    /// Returns true if the caller supplies a value for this direction
    #[must_use]
    pub fn is_input(self) -> bool {
        matches!(self, ParameterDirection::Input | ParameterDirection::InputOutput)
    }
}

/// Description of one command parameter
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub value: Value,
    pub direction: ParameterDirection,
}

impl ParameterSpec {
    #[must_use]
    pub fn new<S: Into<String>, V: Into<Value>>(name: S, value: V) -> Self {
        Self::with_direction(name, value, ParameterDirection::Input)
    }

    #[must_use]
    pub fn with_direction<S: Into<String>, V: Into<Value>>(
        name: S,
        value: V,
        direction: ParameterDirection,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            direction,
        }
    }
}

/// Immutable description of one unit of work
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandSpec {
    text: String,
    kind: CommandKind,
    parameters: Vec<ParameterSpec>,
    timeout: Option<Duration>,
}

impl CommandSpec {
    /// Create a plain text command
    #[must_use]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Create a command that invokes a stored procedure by name
    #[must_use]
    pub fn stored_procedure<S: Into<String>>(name: S) -> Self {
        Self::text(name).with_kind(CommandKind::StoredProcedure)
    }

    #[must_use]
    pub fn with_kind(mut self, kind: CommandKind) -> Self {
        self.kind = kind;
        self
    }

    /// Append an input parameter
    #[must_use]
    pub fn with_parameter<S: Into<String>, V: Into<Value>>(self, name: S, value: V) -> Self {
        self.with_parameter_spec(ParameterSpec::new(name, value))
    }

    /// Append a parameter with an explicit direction
    #[must_use]
    pub fn with_parameter_spec(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Append parameters in order
    #[must_use]
    pub fn with_parameters<I: IntoIterator<Item = ParameterSpec>>(mut self, parameters: I) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Timeout handed to the driver; expiry surfaces as an execution error
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn command_text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    #[must_use]
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// A driver-native parameter attached to a [`Command`]
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
    pub direction: ParameterDirection,
}

impl From<&ParameterSpec> for Parameter {
    fn from(spec: &ParameterSpec) -> Self {
        Self {
            name: spec.name.clone(),
            value: spec.value.clone(),
            direction: spec.direction,
        }
    }
}

/// A command ready to be run by a [`Connection`](crate::Connection)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Command {
    pub text: String,
    pub kind: CommandKind,
    pub parameters: Vec<Parameter>,
    pub timeout: Option<Duration>,
}

impl Command {
    #[must_use]
    pub fn new<S: Into<String>>(text: S, kind: CommandKind) -> Self {
        Self {
            text: text.into(),
            kind,
            ..Self::default()
        }
    }
}
