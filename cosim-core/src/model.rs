use crate::{ModelDescription, VariableStore};

/// The equation strategy of a slave type.
///
/// A `Model` declares the fixed variable table of its slave type and the
/// equation that recomputes outputs once per accepted step. Everything else
/// (lifecycle, variable access, time continuity) is shared and lives in
/// [`Slave`](crate::Slave).
///
/// # Requirements
///
/// - `evaluate` must be deterministic: the same time, inputs, and parameters
///   always yield the same outputs.
/// - `evaluate` may only write variables with [`Output`] causality, through
///   [`VariableStore::assign_real`].
/// - `evaluate` must not fail; an equation that cannot produce a value for
///   some inputs is expected to saturate or propagate NaN instead.
///
/// [`Output`]: crate::Causality::Output
pub trait Model: Send + 'static {
    /// The variable table and identity token of this slave type.
    const DESCRIPTION: &'static ModelDescription;

    /// Recomputes outputs from the current inputs, parameters, and `time` (seconds).
    fn evaluate(&self, time: f64, store: &mut VariableStore);
}
