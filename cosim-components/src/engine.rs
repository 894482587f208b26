//! Second-order torque response.

use cosim_core::{Model, ModelDescription, Variable, VariableStore};

/// Real value references of [`Engine`].
pub mod vr {
    use cosim_core::ValueReference;

    pub const OMEGA: ValueReference = 0;
    pub const ALPHA: ValueReference = 1;
    pub const TAU: ValueReference = 2;
    pub const W_OMEGA: ValueReference = 3;
    pub const W_ALPHA: ValueReference = 4;
    pub const TIME: ValueReference = 5;
}

const DESCRIPTION: ModelDescription = ModelDescription {
    name: "Engine",
    identity: crate::IDENTITY,
    reals: &[
        Variable::input("omega", 0.0),
        Variable::input("alpha", 0.0),
        Variable::output("tau", 0.0),
        Variable::parameter("w_omega", 1.0),
        Variable::parameter("w_alpha", 1.0),
        Variable::time("time"),
    ],
    integers: &[],
    booleans: &[],
    strings: &[],
};

/// Produces a torque from angular velocity and acceleration:
///
/// ```text
/// tau = w_omega * omega + w_alpha * alpha
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct Engine;

impl Engine {
    pub const IDENTITY: &'static str = crate::IDENTITY;
}

impl Model for Engine {
    const DESCRIPTION: &'static ModelDescription = &DESCRIPTION;

    fn evaluate(&self, _time: f64, store: &mut VariableStore) {
        let tau = store.real(vr::W_OMEGA) * store.real(vr::OMEGA)
            + store.real(vr::W_ALPHA) * store.real(vr::ALPHA);
        store.assign_real(vr::TAU, tau);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use cosim_core::{Config, Error, Slave};

    fn stepping() -> Slave<Engine> {
        let mut slave =
            Slave::instantiate(Engine, "engine", Engine::IDENTITY, Config::default()).unwrap();
        slave.setup_experiment(None, 0.0, None).unwrap();
        slave.enter_initialization_mode().unwrap();
        slave.exit_initialization_mode().unwrap();
        slave
    }

    fn torque(slave: &Slave<Engine>) -> f64 {
        let mut tau = [f64::NAN];
        slave.get_reals(&[vr::TAU], &mut tau).unwrap();
        tau[0]
    }

    #[test]
    fn unit_weights_sum_inputs() {
        let mut slave = stepping();
        slave.set_reals(&[vr::OMEGA, vr::ALPHA], &[2.0, 3.0]).unwrap();
        slave.do_step(0.0, 0.1, true).unwrap();
        assert_relative_eq!(torque(&slave), 5.0);
    }

    #[test]
    fn weights_scale_each_term() {
        let mut slave = stepping();
        slave
            .set_reals(
                &[vr::W_OMEGA, vr::W_ALPHA, vr::OMEGA, vr::ALPHA],
                &[0.5, -2.0, 4.0, 1.5],
            )
            .unwrap();
        slave.do_step(0.0, 0.1, true).unwrap();
        assert_relative_eq!(torque(&slave), 2.0 - 3.0);

        slave.set_reals(&[vr::ALPHA], &[0.0]).unwrap();
        slave.do_step(0.1, 0.1, true).unwrap();
        assert_relative_eq!(torque(&slave), 2.0);
    }

    #[test]
    fn exposes_simulation_time() {
        let mut slave = stepping();
        slave.do_step(0.0, 0.25, true).unwrap();
        slave.do_step(0.25, 0.25, true).unwrap();

        let mut time = [0.0];
        slave.get_reals(&[vr::TIME], &mut time).unwrap();
        assert_relative_eq!(time[0], 0.5);
    }

    #[test]
    fn torque_and_time_are_read_only() {
        let mut slave = stepping();
        let result = slave.set_reals(&[vr::OMEGA, vr::TAU], &[1.0, 1.0]);
        assert!(matches!(result, Err(Error::ReadOnly { vr: vr::TAU, .. })));
        assert!(slave.set_reals(&[vr::TIME], &[1.0]).is_err());
    }
}
