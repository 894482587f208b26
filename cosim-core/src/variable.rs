use std::{ffi::CStr, fmt};

/// Index of a declared variable within the table of its primitive type.
///
/// Value references are dense per type: the variable at position `i` of
/// [`ModelDescription::reals`] has real value reference `i`.
pub type ValueReference = u32;

/// Primitive type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Real,
    Integer,
    Boolean,
    String,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Real => "real",
            ValueKind::Integer => "integer",
            ValueKind::Boolean => "boolean",
            ValueKind::String => "string",
        };
        f.write_str(name)
    }
}

/// Role of a variable, which decides who may write it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Causality {
    /// Set by the orchestrator, typically during configuration.
    Parameter,
    /// Set by the orchestrator before each step.
    Input,
    /// Computed by the model's equation.
    Output,
    /// Mirrors the instance's simulation time.
    Independent,
}

impl Causality {
    /// Returns `true` if the orchestrator may write variables with this role.
    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(self, Causality::Parameter | Causality::Input)
    }
}

/// A declared variable: its name, role, and default value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Variable<T> {
    pub name: &'static str,
    pub causality: Causality,
    pub start: T,
}

impl<T> Variable<T> {
    #[must_use]
    pub const fn parameter(name: &'static str, start: T) -> Self {
        Self {
            name,
            causality: Causality::Parameter,
            start,
        }
    }

    #[must_use]
    pub const fn input(name: &'static str, start: T) -> Self {
        Self {
            name,
            causality: Causality::Input,
            start,
        }
    }

    #[must_use]
    pub const fn output(name: &'static str, start: T) -> Self {
        Self {
            name,
            causality: Causality::Output,
            start,
        }
    }
}

impl Variable<f64> {
    /// A read-only real that tracks simulation time, starting at zero.
    #[must_use]
    pub const fn time(name: &'static str) -> Self {
        Self {
            name,
            causality: Causality::Independent,
            start: 0.0,
        }
    }
}

/// The fixed variable table and identity of a slave type.
///
/// Tables are fixed at compile time: there is no registration or growth at
/// runtime, so the set of valid value references never changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelDescription {
    /// Model identifier, used in log output.
    pub name: &'static str,
    /// Token the orchestrator must present verbatim to instantiate this type.
    pub identity: &'static str,
    pub reals: &'static [Variable<f64>],
    pub integers: &'static [Variable<i32>],
    pub booleans: &'static [Variable<bool>],
    pub strings: &'static [Variable<&'static CStr>],
}

impl ModelDescription {
    /// Returns the number of declared variables of the given kind.
    #[must_use]
    pub fn count(&self, kind: ValueKind) -> usize {
        match kind {
            ValueKind::Real => self.reals.len(),
            ValueKind::Integer => self.integers.len(),
            ValueKind::Boolean => self.booleans.len(),
            ValueKind::String => self.strings.len(),
        }
    }

    /// Returns the value references of reals that mirror simulation time.
    pub fn time_references(&self) -> impl Iterator<Item = ValueReference> + '_ {
        self.reals
            .iter()
            .enumerate()
            .filter(|(_, variable)| variable.causality == Causality::Independent)
            .filter_map(|(index, _)| ValueReference::try_from(index).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTION: ModelDescription = ModelDescription {
        name: "Table",
        identity: "{table}",
        reals: &[
            Variable::input("u", 0.0),
            Variable::output("y", 0.0),
            Variable::time("time"),
        ],
        integers: &[Variable::parameter("n", 3)],
        booleans: &[],
        strings: &[Variable::parameter("label", c"none")],
    };

    #[test]
    fn counts_per_kind() {
        assert_eq!(DESCRIPTION.count(ValueKind::Real), 3);
        assert_eq!(DESCRIPTION.count(ValueKind::Integer), 1);
        assert_eq!(DESCRIPTION.count(ValueKind::Boolean), 0);
        assert_eq!(DESCRIPTION.count(ValueKind::String), 1);
    }

    #[test]
    fn finds_time_mirrors() {
        let refs: Vec<_> = DESCRIPTION.time_references().collect();
        assert_eq!(refs, vec![2]);
    }

    #[test]
    fn only_parameters_and_inputs_are_writable() {
        assert!(Causality::Parameter.is_writable());
        assert!(Causality::Input.is_writable());
        assert!(!Causality::Output.is_writable());
        assert!(!Causality::Independent.is_writable());
    }
}
