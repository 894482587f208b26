//! Proportional gain.

use cosim_core::{Model, ModelDescription, Variable, VariableStore};

/// Real value references of [`Gain`].
pub mod vr {
    use cosim_core::ValueReference;

    pub const INPUT: ValueReference = 0;
    pub const OUTPUT: ValueReference = 1;
    pub const GAIN: ValueReference = 2;
}

const DESCRIPTION: ModelDescription = ModelDescription {
    name: "gain",
    identity: crate::IDENTITY,
    reals: &[
        Variable::input("input", 0.0),
        Variable::output("output", 0.0),
        Variable::parameter("gain", 2.0),
    ],
    integers: &[],
    booleans: &[],
    strings: &[],
};

/// Multiplies its input by a constant gain (2 by default).
#[derive(Debug, Default, Clone, Copy)]
pub struct Gain;

impl Gain {
    pub const IDENTITY: &'static str = crate::IDENTITY;
}

impl Model for Gain {
    const DESCRIPTION: &'static ModelDescription = &DESCRIPTION;

    fn evaluate(&self, _time: f64, store: &mut VariableStore) {
        let output = store.real(vr::GAIN) * store.real(vr::INPUT);
        store.assign_real(vr::OUTPUT, output);
    }
}
