//! Shared engine for FMI2 co-simulation slaves.
//!
//! Every slave type shares the same lifecycle, value-reference indexed
//! variable storage, and time-continuity checked stepping. A slave type only
//! supplies its variable table and equation through the [`Model`] trait.
//!
//! - [`Slave`] is a single instance record.
//! - [`Slaves`] is a handle table that owns instances and resolves opaque
//!   [`SlaveHandle`]s.
//! - [`ffi`] exposes a [`Model`] through the FMI2 C function table via
//!   [`export_fmi2!`].

mod clock;
mod config;
mod error;
mod lifecycle;
mod model;
mod registry;
mod slave;
mod store;
mod variable;

pub mod ffi;

pub use clock::{Clock, StepSize};
pub use config::{Config, ConfigError, ResetPolicy};
pub use error::{Capability, Error, InstantiateError, Status};
pub use lifecycle::{LifecycleState, Operation};
pub use model::Model;
pub use registry::{SlaveHandle, Slaves};
pub use slave::Slave;
pub use store::VariableStore;
pub use variable::{Causality, ModelDescription, ValueKind, ValueReference, Variable};
