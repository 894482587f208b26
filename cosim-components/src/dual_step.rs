//! Dual-threshold step generator.

use cosim_core::{Model, ModelDescription, Variable, VariableStore};

use crate::StepFunction;

/// Real value references of [`DualStep`].
pub mod vr {
    use cosim_core::ValueReference;

    pub const OUTPUT: ValueReference = 0;
    pub const STEP_FINAL_VALUE: ValueReference = 1;
    pub const STEP_START_VALUE: ValueReference = 2;
    pub const STEP_TIME: ValueReference = 3;
    pub const STEP_FINAL_VALUE_DOWN: ValueReference = 4;
    pub const STEP_START_VALUE_DOWN: ValueReference = 5;
    pub const STEP_TIME_DOWN: ValueReference = 6;
    pub const TIME: ValueReference = 7;
}

const DESCRIPTION: ModelDescription = ModelDescription {
    name: "Alpha",
    identity: crate::IDENTITY,
    reals: &[
        Variable::output("output", 0.0),
        Variable::parameter("stepFinalValue", 1.0),
        Variable::parameter("stepStartValue", 0.0),
        Variable::parameter("stepTime", 1.0),
        Variable::parameter("stepFinalValueDown", -1.0),
        Variable::parameter("stepStartValueDown", 0.0),
        Variable::parameter("stepTimeDown", 2.0),
        Variable::time("time"),
    ],
    integers: &[],
    booleans: &[],
    strings: &[],
};

/// Signal generator whose output is the sum of two step functions.
///
/// By default the first step rises from 0 to 1 at t = 1 s and the second
/// falls from 0 to -1 at t = 2 s, giving a unit pulse over `[1, 2)`.
/// The two steps are independent; their switch times may come in any order.
#[derive(Debug, Default, Clone, Copy)]
pub struct DualStep;

impl DualStep {
    pub const IDENTITY: &'static str = crate::IDENTITY;

    fn steps(store: &VariableStore) -> [StepFunction; 2] {
        [
            StepFunction::new(
                store.real(vr::STEP_START_VALUE),
                store.real(vr::STEP_FINAL_VALUE),
                store.real(vr::STEP_TIME),
            ),
            StepFunction::new(
                store.real(vr::STEP_START_VALUE_DOWN),
                store.real(vr::STEP_FINAL_VALUE_DOWN),
                store.real(vr::STEP_TIME_DOWN),
            ),
        ]
    }
}

impl Model for DualStep {
    const DESCRIPTION: &'static ModelDescription = &DESCRIPTION;

    fn evaluate(&self, time: f64, store: &mut VariableStore) {
        let output: f64 = Self::steps(store)
            .iter()
            .map(|step| step.value_at(time))
            .sum();
        store.assign_real(vr::OUTPUT, output);
    }
}
