use thiserror::Error;

/// Behaviour of `Reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetPolicy {
    /// Restore default variable values, time zero, and `Instantiated`.
    #[default]
    RestoreDefaults,
    /// Report success without touching the instance.
    Keep,
}

/// Configuration shared by every instance in a [`Slaves`](crate::Slaves) table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Largest accepted distance between an instance's time and the
    /// communication point a step is requested from.
    pub time_tolerance: f64,
    pub reset: ResetPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_tolerance: 1e-9,
            reset: ResetPolicy::default(),
        }
    }
}

/// Error returned when a [`Config`] is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    #[error("time_tolerance must be finite and non-negative, got {0}")]
    TimeTolerance(f64),
}

impl Config {
    /// Validates that the tolerance is finite and non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TimeTolerance`] otherwise.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.time_tolerance.is_finite() || self.time_tolerance < 0.0 {
            return Err(ConfigError::TimeTolerance(self.time_tolerance));
        }
        Ok(())
    }
}
