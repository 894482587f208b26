use std::ops::AddAssign;

use uom::si::{f64::Time, time::second};

use crate::Error;

/// A strictly positive, finite communication step size.
///
/// Wraps a unit-safe [`Time`]; the boundary hands step sizes over as plain
/// seconds, which are validated here once.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct StepSize(Time);

impl StepSize {
    /// Creates a step size from a value in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStepSize`] if `seconds` is zero, negative, or not finite.
    pub fn from_seconds(seconds: f64) -> Result<Self, Error> {
        if seconds.is_finite() && seconds > 0.0 {
            Ok(Self(Time::new::<second>(seconds)))
        } else {
            Err(Error::InvalidStepSize(seconds))
        }
    }

    /// Consumes the step size and returns the underlying [`Time`].
    #[must_use]
    pub fn into_inner(self) -> Time {
        self.0
    }
}

impl TryFrom<f64> for StepSize {
    type Error = Error;

    fn try_from(seconds: f64) -> Result<Self, Self::Error> {
        Self::from_seconds(seconds)
    }
}

/// The simulation time cursor of one instance.
///
/// Only two things move it: setting a start time (setup or reset) and
/// advancing by an accepted step.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Clock {
    now: Time,
}

impl Default for Clock {
    fn default() -> Self {
        Self::starting_at(0.0)
    }
}

impl Clock {
    /// Creates a clock positioned at `seconds`.
    #[must_use]
    pub fn starting_at(seconds: f64) -> Self {
        Self {
            now: Time::new::<second>(seconds),
        }
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn now(&self) -> Time {
        self.now
    }

    /// Returns the current simulation time in seconds.
    #[must_use]
    pub fn seconds(&self) -> f64 {
        self.now.get::<second>()
    }

    /// Checks that a step requested from `point` continues from the current time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimeDesync`] if `|now - point|` exceeds `tolerance`
    /// or if `point` is not a number.
    pub fn check_continuity(&self, point: f64, tolerance: f64) -> Result<(), Error> {
        let expected = self.seconds();
        if (expected - point).abs() <= tolerance {
            Ok(())
        } else {
            Err(Error::TimeDesync {
                expected,
                requested: point,
            })
        }
    }

    /// Advances the clock by one accepted step.
    pub fn advance(&mut self, dt: StepSize) {
        self.now += dt.into_inner();
    }
}

impl AddAssign<StepSize> for Clock {
    fn add_assign(&mut self, dt: StepSize) {
        self.advance(dt);
    }
}
