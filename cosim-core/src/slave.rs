use std::ffi::CStr;

use tracing::{debug, warn};
use uom::si::f64::Time;

use crate::{
    Capability, Clock, Config, Error, InstantiateError, LifecycleState, Model, Operation,
    ResetPolicy, StepSize, ValueReference, VariableStore,
};

/// One co-simulation slave instance.
///
/// A `Slave` owns its lifecycle state, time cursor, and variable store
/// exclusively; instances never share mutable state. All operations run to
/// completion synchronously.
///
/// # Lifecycle
///
/// ```text
/// instantiate -> setup_experiment -> enter_initialization_mode
///             -> exit_initialization_mode -> do_step* -> terminate
/// ```
///
/// A step requested from the wrong communication point moves the instance to
/// [`LifecycleState::Error`], after which it refuses further steps and writes
/// but still answers reads with the last known values.
#[derive(Debug)]
pub struct Slave<M: Model> {
    name: String,
    model: M,
    config: Config,
    state: LifecycleState,
    clock: Clock,
    store: VariableStore,
}

impl<M: Model> Slave<M> {
    /// Creates an instance with every variable at its declared default.
    ///
    /// # Errors
    ///
    /// - [`InstantiateError::EmptyName`] if `name` is empty.
    /// - [`InstantiateError::IdentityMismatch`] if `identity` is not exactly
    ///   the model's identity token.
    /// - [`InstantiateError::Config`] if `config` fails validation.
    pub fn instantiate(
        model: M,
        name: &str,
        identity: &str,
        config: Config,
    ) -> Result<Self, InstantiateError> {
        let description = M::DESCRIPTION;

        if name.is_empty() {
            warn!(model = description.name, "refused instance without a name");
            return Err(InstantiateError::EmptyName);
        }
        if identity != description.identity {
            warn!(
                model = description.name,
                instance = name,
                provided = identity,
                "refused instance with a foreign identity token"
            );
            return Err(InstantiateError::IdentityMismatch {
                expected: description.identity,
                provided: identity.to_owned(),
            });
        }
        config.validate()?;

        debug!(model = description.name, instance = name, "instantiated");

        Ok(Self {
            name: name.to_owned(),
            model,
            config,
            state: LifecycleState::Instantiated,
            clock: Clock::default(),
            store: VariableStore::new(description),
        })
    }

    /// Returns the instance name given at instantiation.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> Time {
        self.clock.now()
    }

    /// Returns the configuration this instance was created with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Binds the start time of the experiment.
    ///
    /// The tolerance and stop time are accepted for interface compatibility;
    /// the equations here are algebraic and never look at them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] once the instance has left initialization.
    pub fn setup_experiment(
        &mut self,
        tolerance: Option<f64>,
        start_time: f64,
        stop_time: Option<f64>,
    ) -> Result<(), Error> {
        self.permit(Operation::SetupExperiment)?;

        self.clock = Clock::starting_at(start_time);
        self.mirror_time();

        debug!(
            instance = %self.name,
            start_time,
            ?stop_time,
            ?tolerance,
            "experiment set up"
        );
        Ok(())
    }

    /// Moves a freshly instantiated instance into initialization mode.
    ///
    /// Accepted in every state; past instantiation it changes nothing.
    pub fn enter_initialization_mode(&mut self) -> Result<(), Error> {
        self.advance_lifecycle(Operation::EnterInitializationMode)
    }

    /// Leaves initialization and starts accepting steps.
    ///
    /// An instance that never entered initialization starts stepping too.
    /// Terminated and errored instances stay where they are.
    pub fn exit_initialization_mode(&mut self) -> Result<(), Error> {
        self.advance_lifecycle(Operation::ExitInitializationMode)
    }

    /// Advances the instance by one communication step.
    ///
    /// 1. Checks that the instance is stepping and `step_size` is usable.
    /// 2. Checks that `current_point` matches the instance's time within
    ///    [`Config::time_tolerance`]; on mismatch the instance enters
    ///    [`LifecycleState::Error`] and neither time nor outputs change.
    /// 3. Advances time by `step_size`.
    /// 4. Recomputes outputs with the model's equation at the new time.
    ///
    /// `_no_set_prior_state` is accepted for interface compatibility: state
    /// rollback is not offered, so the hint has nothing to enable.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalState`] outside of step mode.
    /// - [`Error::InvalidStepSize`] if `step_size` is not finite and positive.
    /// - [`Error::TimeDesync`] if `current_point` is off the instance's time.
    pub fn do_step(
        &mut self,
        current_point: f64,
        step_size: f64,
        _no_set_prior_state: bool,
    ) -> Result<(), Error> {
        self.permit(Operation::DoStep)?;

        let dt = StepSize::from_seconds(step_size)
            .inspect_err(|error| self.log_rejection(Operation::DoStep, error))?;

        if let Err(error) = self
            .clock
            .check_continuity(current_point, self.config.time_tolerance)
        {
            self.log_rejection(Operation::DoStep, &error);
            self.transition(LifecycleState::Error);
            return Err(error);
        }

        self.clock.advance(dt);
        self.mirror_time();
        self.model.evaluate(self.clock.seconds(), &mut self.store);

        Ok(())
    }

    /// Ends the simulation run. Reads remain available afterwards.
    ///
    /// # Errors
    ///
    /// Never fails; the `Result` keeps the signature uniform.
    pub fn terminate(&mut self) -> Result<(), Error> {
        self.permit(Operation::Terminate)?;
        self.transition(LifecycleState::Terminated);
        Ok(())
    }

    /// Resets the instance according to [`Config::reset`].
    ///
    /// With [`ResetPolicy::RestoreDefaults`] every variable returns to its
    /// default, time returns to zero, and the state to `Instantiated`.
    /// With [`ResetPolicy::Keep`] nothing changes.
    ///
    /// # Errors
    ///
    /// Never fails; the `Result` keeps the signature uniform.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.permit(Operation::Reset)?;

        match self.config.reset {
            ResetPolicy::RestoreDefaults => {
                self.store.reset();
                self.clock = Clock::default();
                self.mirror_time();
                self.transition(LifecycleState::Instantiated);
            }
            ResetPolicy::Keep => {
                debug!(instance = %self.name, "reset requested, keeping current state");
            }
        }
        Ok(())
    }

    /// Refuses to configure debug logging.
    ///
    /// Log output goes through `tracing`; filtering belongs to the host's
    /// subscriber, not to the instance.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::LoggingUnsupported`], reported as a warning.
    pub fn set_debug_logging(&self, enabled: bool, categories: &[&str]) -> Result<(), Error> {
        debug!(instance = %self.name, enabled, ?categories, "debug logging request ignored");
        Err(Error::LoggingUnsupported)
    }

    /// Requests one of the optional FMI2 capabilities.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::Unsupported`]: this slave family offers no
    /// state snapshots, derivatives, asynchronous steps, or status inquiries.
    pub fn capability(&self, capability: Capability) -> Result<(), Error> {
        Err(Error::Unsupported(capability))
    }

    /// Reads reals by value reference.
    ///
    /// # Errors
    ///
    /// See [`VariableStore::get_reals`].
    pub fn get_reals(&self, vrs: &[ValueReference], values: &mut [f64]) -> Result<(), Error> {
        self.permit(Operation::GetVariables)?;
        self.store
            .get_reals(vrs, values)
            .inspect_err(|error| self.log_rejection(Operation::GetVariables, error))
    }

    /// Reads integers by value reference.
    ///
    /// # Errors
    ///
    /// See [`VariableStore::get_integers`].
    pub fn get_integers(&self, vrs: &[ValueReference], values: &mut [i32]) -> Result<(), Error> {
        self.permit(Operation::GetVariables)?;
        self.store
            .get_integers(vrs, values)
            .inspect_err(|error| self.log_rejection(Operation::GetVariables, error))
    }

    /// Reads booleans by value reference.
    ///
    /// # Errors
    ///
    /// See [`VariableStore::get_booleans`].
    pub fn get_booleans(&self, vrs: &[ValueReference], values: &mut [bool]) -> Result<(), Error> {
        self.permit(Operation::GetVariables)?;
        self.store
            .get_booleans(vrs, values)
            .inspect_err(|error| self.log_rejection(Operation::GetVariables, error))
    }

    /// Reads strings by value reference, borrowing from the instance.
    ///
    /// # Errors
    ///
    /// See [`VariableStore::get_strings`].
    pub fn get_strings<'a>(
        &'a self,
        vrs: &[ValueReference],
        values: &mut [&'a CStr],
    ) -> Result<(), Error> {
        self.permit(Operation::GetVariables)?;
        self.store
            .get_strings(vrs, values)
            .inspect_err(|error| self.log_rejection(Operation::GetVariables, error))
    }

    /// Writes reals by value reference.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalState`] after termination or an error.
    /// - Otherwise see [`VariableStore::set_reals`].
    pub fn set_reals(&mut self, vrs: &[ValueReference], values: &[f64]) -> Result<(), Error> {
        self.permit(Operation::SetVariables)?;
        self.store
            .set_reals(vrs, values)
            .inspect_err(|error| self.log_rejection(Operation::SetVariables, error))
    }

    /// Writes integers by value reference.
    ///
    /// # Errors
    ///
    /// See [`set_reals`](Self::set_reals).
    pub fn set_integers(&mut self, vrs: &[ValueReference], values: &[i32]) -> Result<(), Error> {
        self.permit(Operation::SetVariables)?;
        self.store
            .set_integers(vrs, values)
            .inspect_err(|error| self.log_rejection(Operation::SetVariables, error))
    }

    /// Writes booleans by value reference.
    ///
    /// # Errors
    ///
    /// See [`set_reals`](Self::set_reals).
    pub fn set_booleans(&mut self, vrs: &[ValueReference], values: &[bool]) -> Result<(), Error> {
        self.permit(Operation::SetVariables)?;
        self.store
            .set_booleans(vrs, values)
            .inspect_err(|error| self.log_rejection(Operation::SetVariables, error))
    }

    /// Writes strings by value reference.
    ///
    /// # Errors
    ///
    /// See [`set_reals`](Self::set_reals).
    pub fn set_strings(&mut self, vrs: &[ValueReference], values: &[&CStr]) -> Result<(), Error> {
        self.permit(Operation::SetVariables)?;
        self.store
            .set_strings(vrs, values)
            .inspect_err(|error| self.log_rejection(Operation::SetVariables, error))
    }

    fn permit(&self, operation: Operation) -> Result<(), Error> {
        self.state
            .check(operation)
            .inspect_err(|error| self.log_rejection(operation, error))
    }

    fn advance_lifecycle(&mut self, operation: Operation) -> Result<(), Error> {
        self.permit(operation)?;
        let next = self.state.after(operation);
        if next == self.state {
            debug!(instance = %self.name, state = %self.state, %operation, "nothing to change");
        } else {
            self.transition(next);
        }
        Ok(())
    }

    fn transition(&mut self, next: LifecycleState) {
        debug!(instance = %self.name, from = %self.state, to = %next, "lifecycle transition");
        self.state = next;
    }

    fn mirror_time(&mut self) {
        let now = self.clock.seconds();
        for vr in M::DESCRIPTION.time_references() {
            self.store.assign_real(vr, now);
        }
    }

    fn log_rejection(&self, operation: Operation, error: &Error) {
        warn!(
            instance = %self.name,
            state = %self.state,
            %operation,
            %error,
            "call rejected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use uom::si::time::second;

    use crate::{ModelDescription, Variable};

    /// Output is `offset + time * rate`; exercises every table feature.
    struct Ramp;

    mod vr {
        pub const RATE: u32 = 0;
        pub const OFFSET: u32 = 1;
        pub const OUTPUT: u32 = 2;
        pub const TIME: u32 = 3;
    }

    impl Model for Ramp {
        const DESCRIPTION: &'static ModelDescription = &ModelDescription {
            name: "Ramp",
            identity: "{ramp}",
            reals: &[
                Variable::input("rate", 1.0),
                Variable::parameter("offset", 0.0),
                Variable::output("y", -1.0),
                Variable::time("time"),
            ],
            integers: &[],
            booleans: &[Variable::parameter("flag", false)],
            strings: &[],
        };

        fn evaluate(&self, time: f64, store: &mut VariableStore) {
            let y = store.real(vr::OFFSET) + time * store.real(vr::RATE);
            store.assign_real(vr::OUTPUT, y);
        }
    }

    fn ramp() -> Slave<Ramp> {
        Slave::instantiate(Ramp, "ramp", "{ramp}", Config::default()).unwrap()
    }

    fn stepping_ramp(start_time: f64) -> Slave<Ramp> {
        let mut slave = ramp();
        slave.setup_experiment(None, start_time, None).unwrap();
        slave.enter_initialization_mode().unwrap();
        slave.exit_initialization_mode().unwrap();
        slave
    }

    fn real(slave: &Slave<Ramp>, vr: ValueReference) -> f64 {
        let mut value = [0.0];
        slave.get_reals(&[vr], &mut value).unwrap();
        value[0]
    }

    #[test]
    fn instantiate_checks_name_and_identity() {
        assert!(matches!(
            Slave::instantiate(Ramp, "", "{ramp}", Config::default()),
            Err(InstantiateError::EmptyName)
        ));
        assert!(matches!(
            Slave::instantiate(Ramp, "r", "{ramp} ", Config::default()),
            Err(InstantiateError::IdentityMismatch { .. })
        ));

        let slave = ramp();
        assert_eq!(slave.name(), "ramp");
        assert_eq!(slave.state(), LifecycleState::Instantiated);
        assert_eq!(real(&slave, vr::OUTPUT), -1.0);
    }

    #[test]
    fn instantiate_rejects_invalid_config() {
        let config = Config {
            time_tolerance: -1.0,
            ..Config::default()
        };
        assert!(matches!(
            Slave::instantiate(Ramp, "r", "{ramp}", config),
            Err(InstantiateError::Config(_))
        ));
    }

    #[test]
    fn full_lifecycle() {
        let mut slave = ramp();
        slave.setup_experiment(Some(1e-6), 2.0, Some(10.0)).unwrap();
        assert_eq!(real(&slave, vr::TIME), 2.0);

        slave.enter_initialization_mode().unwrap();
        assert_eq!(slave.state(), LifecycleState::InitializationMode);
        slave.set_reals(&[vr::RATE, vr::OFFSET], &[3.0, 1.0]).unwrap();

        slave.exit_initialization_mode().unwrap();
        assert_eq!(slave.state(), LifecycleState::StepMode);

        slave.do_step(2.0, 0.5, true).unwrap();
        assert_relative_eq!(slave.time().get::<second>(), 2.5);
        assert_relative_eq!(real(&slave, vr::OUTPUT), 8.5);
        assert_relative_eq!(real(&slave, vr::TIME), 2.5);

        slave.terminate().unwrap();
        assert_eq!(slave.state(), LifecycleState::Terminated);
        assert_relative_eq!(real(&slave, vr::OUTPUT), 8.5);
    }

    #[test]
    fn step_requires_step_mode() {
        let mut slave = ramp();
        assert!(matches!(
            slave.do_step(0.0, 1.0, true),
            Err(Error::IllegalState {
                operation: Operation::DoStep,
                state: LifecycleState::Instantiated
            })
        ));
        assert_eq!(slave.state(), LifecycleState::Instantiated);
    }

    #[test]
    fn exit_without_enter_starts_stepping() {
        let mut slave = ramp();
        slave.exit_initialization_mode().unwrap();
        assert_eq!(slave.state(), LifecycleState::StepMode);

        slave.do_step(0.0, 1.0, true).unwrap();
        assert_relative_eq!(real(&slave, vr::OUTPUT), 1.0);
    }

    #[test]
    fn initialization_calls_past_initialization_change_nothing() {
        let mut slave = stepping_ramp(0.0);
        slave.do_step(0.0, 1.0, true).unwrap();

        slave.enter_initialization_mode().unwrap();
        slave.exit_initialization_mode().unwrap();
        assert_eq!(slave.state(), LifecycleState::StepMode);
        assert_relative_eq!(slave.time().get::<second>(), 1.0);
        assert!(slave.setup_experiment(None, 0.0, None).is_err());

        slave.terminate().unwrap();
        slave.enter_initialization_mode().unwrap();
        slave.exit_initialization_mode().unwrap();
        assert_eq!(slave.state(), LifecycleState::Terminated);
        assert!(slave.do_step(1.0, 1.0, true).is_err());
    }

    #[test]
    fn exit_does_not_clear_the_error_state() {
        let mut slave = stepping_ramp(0.0);
        slave.do_step(3.0, 1.0, true).unwrap_err();

        slave.exit_initialization_mode().unwrap();
        assert_eq!(slave.state(), LifecycleState::Error);
    }

    #[test]
    fn desynchronized_step_is_sticky_and_changes_nothing() {
        let mut slave = stepping_ramp(0.0);
        slave.do_step(0.0, 1.0, true).unwrap();
        let output = real(&slave, vr::OUTPUT);

        let err = slave.do_step(0.5, 1.0, true).unwrap_err();
        assert_eq!(
            err,
            Error::TimeDesync {
                expected: 1.0,
                requested: 0.5
            }
        );
        assert_eq!(slave.state(), LifecycleState::Error);
        assert_relative_eq!(slave.time().get::<second>(), 1.0);
        assert_eq!(real(&slave, vr::OUTPUT), output);

        assert!(slave.do_step(1.0, 1.0, true).is_err());
        assert_relative_eq!(slave.time().get::<second>(), 1.0);
        assert!(slave.set_reals(&[vr::RATE], &[2.0]).is_err());
        assert_eq!(real(&slave, vr::OUTPUT), output);
    }

    #[test]
    fn invalid_step_size_is_rejected_without_error_state() {
        let mut slave = stepping_ramp(0.0);
        assert_eq!(
            slave.do_step(0.0, 0.0, true),
            Err(Error::InvalidStepSize(0.0))
        );
        assert_eq!(slave.state(), LifecycleState::StepMode);
        slave.do_step(0.0, 0.5, true).unwrap();
    }

    #[test]
    fn continuity_uses_configured_tolerance() {
        let config = Config {
            time_tolerance: 0.1,
            ..Config::default()
        };
        let mut slave = Slave::instantiate(Ramp, "loose", "{ramp}", config).unwrap();
        slave.enter_initialization_mode().unwrap();
        slave.exit_initialization_mode().unwrap();

        slave.do_step(0.05, 1.0, true).unwrap();
        assert_relative_eq!(slave.time().get::<second>(), 1.0);
    }

    #[test]
    fn writes_stop_after_termination() {
        let mut slave = stepping_ramp(0.0);
        slave.terminate().unwrap();
        assert!(matches!(
            slave.set_booleans(&[0], &[true]),
            Err(Error::IllegalState { .. })
        ));
        let mut flag = [true];
        slave.get_booleans(&[0], &mut flag).unwrap();
        assert_eq!(flag, [false]);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut slave = stepping_ramp(5.0);
        slave.set_reals(&[vr::RATE], &[4.0]).unwrap();
        slave.do_step(5.0, 1.0, true).unwrap();
        slave.do_step(0.0, 1.0, true).unwrap_err();

        slave.reset().unwrap();

        assert_eq!(slave.state(), LifecycleState::Instantiated);
        assert_eq!(slave.time().get::<second>(), 0.0);
        assert_eq!(real(&slave, vr::RATE), 1.0);
        assert_eq!(real(&slave, vr::OUTPUT), -1.0);
        assert_eq!(real(&slave, vr::TIME), 0.0);
    }

    #[test]
    fn reset_can_keep_state() {
        let config = Config {
            reset: ResetPolicy::Keep,
            ..Config::default()
        };
        let mut slave = Slave::instantiate(Ramp, "kept", "{ramp}", config).unwrap();
        slave.enter_initialization_mode().unwrap();
        slave.set_reals(&[vr::RATE], &[4.0]).unwrap();

        slave.reset().unwrap();

        assert_eq!(slave.state(), LifecycleState::InitializationMode);
        assert_eq!(real(&slave, vr::RATE), 4.0);
    }

    #[test]
    fn optional_surface_is_refused() {
        let slave = ramp();
        for capability in Capability::ALL {
            assert_eq!(
                slave.capability(capability),
                Err(Error::Unsupported(capability))
            );
        }
        assert_eq!(
            slave.set_debug_logging(true, &["logAll"]),
            Err(Error::LoggingUnsupported)
        );
    }
}
