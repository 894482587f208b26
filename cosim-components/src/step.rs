/// A single step between two levels.
///
/// Evaluates to `start_value` strictly before `switch_time` and to
/// `final_value` at and after it.
///
/// # Examples
///
/// ```
/// use cosim_components::StepFunction;
///
/// let step = StepFunction::new(0.0, 1.0, 1.0);
/// assert_eq!(step.value_at(0.5), 0.0);
/// assert_eq!(step.value_at(1.0), 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepFunction {
    pub start_value: f64,
    pub final_value: f64,
    pub switch_time: f64,
}

impl StepFunction {
    #[must_use]
    pub fn new(start_value: f64, final_value: f64, switch_time: f64) -> Self {
        Self {
            start_value,
            final_value,
            switch_time,
        }
    }

    /// Returns the level of the step at `time`.
    #[must_use]
    pub fn value_at(&self, time: f64) -> f64 {
        if time < self.switch_time {
            self.start_value
        } else {
            self.final_value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_time_belongs_to_final_level() {
        let step = StepFunction::new(-2.0, 3.0, 1.5);
        assert_eq!(step.value_at(f64::NEG_INFINITY), -2.0);
        assert_eq!(step.value_at(1.499), -2.0);
        assert_eq!(step.value_at(1.5), 3.0);
        assert_eq!(step.value_at(100.0), 3.0);
    }

    #[test]
    fn equal_levels_are_flat() {
        let step = StepFunction::new(4.0, 4.0, 0.0);
        assert_eq!(step.value_at(-1.0), step.value_at(1.0));
    }
}
