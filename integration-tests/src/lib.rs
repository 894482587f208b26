//! Test support for exercising several slaves together.
//!
//! [`Coupling`] is a minimal fixed-step orchestrator: it wires outputs of one
//! unit to inputs of another and advances all units with Jacobi or
//! Gauss-Seidel sequencing. It exists to drive the slaves the way a real
//! orchestrator would, not as a general-purpose master.

mod coupling;

pub use coupling::{Connection, Coupling, CouplingError, Port, Sequence, Trace, Unit};
