use std::fmt;

use crate::Error;

/// Lifecycle state of a slave instance.
///
/// ```text
/// Instantiated -> InitializationMode -> StepMode -> Terminated
///       |                                 ^  |
///       +---------------------------------+  +-> Error (time desync, sticky)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Instantiated,
    InitializationMode,
    StepMode,
    Terminated,
    Error,
}

/// Operations gated by the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SetupExperiment,
    EnterInitializationMode,
    ExitInitializationMode,
    DoStep,
    GetVariables,
    SetVariables,
    Terminate,
    Reset,
}

impl LifecycleState {
    /// Returns `true` if `operation` may be performed in this state.
    ///
    /// Reads stay available after termination and after an error so the
    /// orchestrator can inspect the last known values. Entering and leaving
    /// initialization, `Terminate` and `Reset` are accepted everywhere; see
    /// [`LifecycleState::after`] for where they lead.
    #[must_use]
    pub fn permits(self, operation: Operation) -> bool {
        use LifecycleState as S;
        use Operation as Op;

        match operation {
            Op::SetupExperiment => matches!(self, S::Instantiated | S::InitializationMode),
            Op::DoStep => self == S::StepMode,
            Op::SetVariables => {
                matches!(self, S::Instantiated | S::InitializationMode | S::StepMode)
            }
            Op::EnterInitializationMode
            | Op::ExitInitializationMode
            | Op::GetVariables
            | Op::Terminate
            | Op::Reset => true,
        }
    }

    /// State reached by entering or leaving initialization from this state.
    ///
    /// Leaving initialization starts stepping whether or not initialization
    /// was entered first. Once an instance is stepping, terminated or in
    /// error, both calls keep the state as it is.
    #[must_use]
    pub fn after(self, operation: Operation) -> Self {
        use LifecycleState as S;
        use Operation as Op;

        match (self, operation) {
            (S::Instantiated, Op::EnterInitializationMode) => S::InitializationMode,
            (S::Instantiated | S::InitializationMode, Op::ExitInitializationMode) => S::StepMode,
            (state, _) => state,
        }
    }

    /// Checks that `operation` is allowed in this state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if it is not.
    pub fn check(self, operation: Operation) -> Result<(), Error> {
        if self.permits(operation) {
            Ok(())
        } else {
            Err(Error::IllegalState {
                operation,
                state: self,
            })
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Instantiated => "Instantiated",
            LifecycleState::InitializationMode => "InitializationMode",
            LifecycleState::StepMode => "StepMode",
            LifecycleState::Terminated => "Terminated",
            LifecycleState::Error => "Error",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::SetupExperiment => "SetupExperiment",
            Operation::EnterInitializationMode => "EnterInitializationMode",
            Operation::ExitInitializationMode => "ExitInitializationMode",
            Operation::DoStep => "DoStep",
            Operation::GetVariables => "Get",
            Operation::SetVariables => "Set",
            Operation::Terminate => "Terminate",
            Operation::Reset => "Reset",
        };
        f.write_str(name)
    }
}
