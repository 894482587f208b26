use std::fmt;

use thiserror::Error;

use crate::{ConfigError, LifecycleState, Operation, ValueKind, ValueReference};

/// Outcome reported to the orchestrator for every boundary call.
///
/// Orchestrators treat anything other than [`Status::Ok`] and
/// [`Status::Warning`] as a failed call that needs recovery on their side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Warning,
    Discard,
    Error,
    Fatal,
}

impl Status {
    /// Returns `true` if the orchestrator may carry on as if the call succeeded.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Status::Ok | Status::Warning)
    }
}

impl<T> From<&Result<T, Error>> for Status {
    fn from(result: &Result<T, Error>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(error) => error.status(),
        }
    }
}

/// Optional FMI2 capabilities this slave family deliberately does not offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    GetFmuState,
    SetFmuState,
    FreeFmuState,
    SerializedFmuStateSize,
    SerializeFmuState,
    DeserializeFmuState,
    DirectionalDerivative,
    SetRealInputDerivatives,
    GetRealOutputDerivatives,
    CancelStep,
    GetStatus,
    GetRealStatus,
    GetIntegerStatus,
    GetBooleanStatus,
    GetStringStatus,
}

impl Capability {
    /// Every capability in declaration order.
    pub const ALL: [Capability; 15] = [
        Capability::GetFmuState,
        Capability::SetFmuState,
        Capability::FreeFmuState,
        Capability::SerializedFmuStateSize,
        Capability::SerializeFmuState,
        Capability::DeserializeFmuState,
        Capability::DirectionalDerivative,
        Capability::SetRealInputDerivatives,
        Capability::GetRealOutputDerivatives,
        Capability::CancelStep,
        Capability::GetStatus,
        Capability::GetRealStatus,
        Capability::GetIntegerStatus,
        Capability::GetBooleanStatus,
        Capability::GetStringStatus,
    ];

    /// The FMI2 function name that exposes this capability.
    #[must_use]
    pub fn function_name(self) -> &'static str {
        match self {
            Capability::GetFmuState => "fmi2GetFMUstate",
            Capability::SetFmuState => "fmi2SetFMUstate",
            Capability::FreeFmuState => "fmi2FreeFMUstate",
            Capability::SerializedFmuStateSize => "fmi2SerializedFMUstateSize",
            Capability::SerializeFmuState => "fmi2SerializeFMUstate",
            Capability::DeserializeFmuState => "fmi2DeSerializeFMUstate",
            Capability::DirectionalDerivative => "fmi2GetDirectionalDerivative",
            Capability::SetRealInputDerivatives => "fmi2SetRealInputDerivatives",
            Capability::GetRealOutputDerivatives => "fmi2GetRealOutputDerivatives",
            Capability::CancelStep => "fmi2CancelStep",
            Capability::GetStatus => "fmi2GetStatus",
            Capability::GetRealStatus => "fmi2GetRealStatus",
            Capability::GetIntegerStatus => "fmi2GetIntegerStatus",
            Capability::GetBooleanStatus => "fmi2GetBooleanStatus",
            Capability::GetStringStatus => "fmi2GetStringStatus",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function_name())
    }
}

/// Reasons `instantiate` refuses to produce an instance.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InstantiateError {
    #[error("instance name must not be empty")]
    EmptyName,

    #[error("identity token `{provided}` does not match `{expected}`")]
    IdentityMismatch {
        expected: &'static str,
        provided: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors returned by operations on a live instance.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("handle does not refer to a live instance")]
    InvalidHandle,

    #[error("{kind} value reference {vr} is not declared")]
    UnknownReference { kind: ValueKind, vr: ValueReference },

    #[error("{kind} variable `{name}` (value reference {vr}) is not writable")]
    ReadOnly {
        kind: ValueKind,
        vr: ValueReference,
        name: &'static str,
    },

    #[error("{references} value references but {values} values")]
    LengthMismatch { references: usize, values: usize },

    #[error("null array passed for {0} elements")]
    NullArray(usize),

    #[error("step requested at t = {requested} but instance is at t = {expected}")]
    TimeDesync { expected: f64, requested: f64 },

    #[error("communication step size must be finite and positive, got {0}")]
    InvalidStepSize(f64),

    #[error("{operation} is not allowed in state {state}")]
    IllegalState {
        operation: Operation,
        state: LifecycleState,
    },

    #[error("{0} is not supported")]
    Unsupported(Capability),

    #[error("debug logging cannot be configured")]
    LoggingUnsupported,

    #[error("instance table was poisoned by a panic")]
    Poisoned,
}

impl Error {
    /// Maps this error to the status code reported across the boundary.
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Error::LoggingUnsupported => Status::Warning,
            Error::Poisoned => Status::Fatal,
            _ => Status::Error,
        }
    }
}
