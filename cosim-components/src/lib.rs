//! Equation strategies for the co-simulation slaves.
//!
//! Each type here is a [`Model`](cosim_core::Model): a fixed variable table
//! plus the equation that recomputes its outputs after every accepted step.
//! The value references of each model are published in its `vr` module.

pub mod dual_step;
pub mod engine;
pub mod gain;
mod step;

pub use dual_step::DualStep;
pub use engine::Engine;
pub use gain::Gain;
pub use step::StepFunction;

/// Identity token shared by every unit in this family.
pub const IDENTITY: &str = "{481bd0fd-3a1a-4530-98e2-685fa567810c}";
