//! FMI2 co-simulation unit exporting the second-order torque response model.

cosim_core::export_fmi2!(cosim_components::Engine);
