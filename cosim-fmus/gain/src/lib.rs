//! FMI2 co-simulation unit exporting the proportional gain model.

cosim_core::export_fmi2!(cosim_components::Gain);
