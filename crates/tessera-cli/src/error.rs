use std::fmt;
use std::process::ExitCode;

use tessera_core::driver::DriverError;
use tessera_core::exerciser::ExerciseError;
use tessera_core::project::ConfigureError;
use tessera_core::simctl::SimctlError;

#[derive(Debug)]
pub enum CliError {
    /// A step of the procedure failed against an otherwise healthy target.
    StepFailed(String),
    /// The agent or simulator could not be reached, or the app not launched.
    Connection(String),
    NotFound(String),
    Io(String),
}

impl CliError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::StepFailed(_) => ExitCode::from(1),
            CliError::Connection(_) => ExitCode::from(2),
            CliError::NotFound(_) => ExitCode::from(3),
            CliError::Io(_) => ExitCode::from(4),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::StepFailed(msg) => write!(f, "Step failed: {}", msg),
            CliError::Connection(msg) => write!(f, "Connection error: {}", msg),
            CliError::NotFound(msg) => write!(f, "Not found: {}", msg),
            CliError::Io(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<DriverError> for CliError {
    fn from(e: DriverError) -> Self {
        if e.is_transport() {
            CliError::Connection(e.to_string())
        } else {
            CliError::StepFailed(e.to_string())
        }
    }
}

impl From<SimctlError> for CliError {
    fn from(e: SimctlError) -> Self {
        CliError::Connection(e.to_string())
    }
}

impl From<ExerciseError> for CliError {
    fn from(e: ExerciseError) -> Self {
        match e {
            ExerciseError::Driver(inner) => inner.into(),
            other => CliError::StepFailed(other.to_string()),
        }
    }
}

impl From<ConfigureError> for CliError {
    fn from(e: ConfigureError) -> Self {
        match e {
            ConfigureError::ProjectNotFound(_) | ConfigureError::DependencyNotFound { .. } => {
                CliError::NotFound(e.to_string())
            }
            ConfigureError::PersistError(_) | ConfigureError::Registry(_) | ConfigureError::InvalidDescriptor(_) => {
                CliError::Io(e.to_string())
            }
            ConfigureError::NoHostApplication { .. }
            | ConfigureError::TargetKindConflict { .. }
            | ConfigureError::InvalidSchemeName(_) => CliError::StepFailed(e.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}
