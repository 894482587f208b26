//! FMI2 co-simulation unit exporting the dual-threshold step generator model.

cosim_core::export_fmi2!(cosim_components::DualStep);
