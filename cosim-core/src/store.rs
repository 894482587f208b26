use std::ffi::{CStr, CString};

use crate::{Error, ModelDescription, ValueKind, ValueReference, Variable};

/// Type-partitioned slot tables addressed by value reference.
///
/// Bulk accessors process references in the order given and stop at the
/// first invalid one. Effects already applied for earlier references in the
/// same call are kept: a failed `set_reals(&[0, 99, 1], ..)` still writes
/// reference `0` and leaves reference `1` untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableStore {
    description: &'static ModelDescription,
    reals: Vec<f64>,
    integers: Vec<i32>,
    booleans: Vec<bool>,
    strings: Vec<CString>,
}

impl VariableStore {
    /// Creates a store with every variable at its declared default.
    #[must_use]
    pub fn new(description: &'static ModelDescription) -> Self {
        Self {
            description,
            reals: starts(description.reals, |start| *start),
            integers: starts(description.integers, |start| *start),
            booleans: starts(description.booleans, |start| *start),
            strings: starts(description.strings, |start| CString::from(*start)),
        }
    }

    /// Returns the variable table this store was built from.
    #[must_use]
    pub fn description(&self) -> &'static ModelDescription {
        self.description
    }

    /// Restores every variable to its declared default.
    pub fn reset(&mut self) {
        *self = Self::new(self.description);
    }

    /// Returns the current value of a declared real.
    ///
    /// Intended for equations, which address their own variables by constant.
    ///
    /// # Panics
    ///
    /// Panics if `vr` is not a declared real.
    #[must_use]
    pub fn real(&self, vr: ValueReference) -> f64 {
        self.reals[vr as usize]
    }

    /// Stores a real regardless of its causality.
    ///
    /// Intended for equations writing their outputs and for the engine's time
    /// mirror; the orchestrator goes through [`set_reals`](Self::set_reals).
    ///
    /// # Panics
    ///
    /// Panics if `vr` is not a declared real.
    pub fn assign_real(&mut self, vr: ValueReference, value: f64) {
        self.reals[vr as usize] = value;
    }

    /// Reads reals into `values`.
    ///
    /// # Errors
    ///
    /// - [`Error::LengthMismatch`] if the slices differ in length (nothing is read).
    /// - [`Error::UnknownReference`] at the first undeclared reference.
    pub fn get_reals(&self, vrs: &[ValueReference], values: &mut [f64]) -> Result<(), Error> {
        read(ValueKind::Real, &self.reals, vrs, values, |slot| *slot)
    }

    /// Reads integers into `values`.
    ///
    /// # Errors
    ///
    /// See [`get_reals`](Self::get_reals).
    pub fn get_integers(&self, vrs: &[ValueReference], values: &mut [i32]) -> Result<(), Error> {
        read(ValueKind::Integer, &self.integers, vrs, values, |slot| *slot)
    }

    /// Reads booleans into `values`.
    ///
    /// # Errors
    ///
    /// See [`get_reals`](Self::get_reals).
    pub fn get_booleans(&self, vrs: &[ValueReference], values: &mut [bool]) -> Result<(), Error> {
        read(ValueKind::Boolean, &self.booleans, vrs, values, |slot| *slot)
    }

    /// Reads strings into `values`, borrowing from the store.
    ///
    /// # Errors
    ///
    /// See [`get_reals`](Self::get_reals).
    pub fn get_strings<'a>(
        &'a self,
        vrs: &[ValueReference],
        values: &mut [&'a CStr],
    ) -> Result<(), Error> {
        read(ValueKind::String, &self.strings, vrs, values, CString::as_c_str)
    }

    /// Writes reals from `values`.
    ///
    /// # Errors
    ///
    /// - [`Error::LengthMismatch`] if the slices differ in length (nothing is written).
    /// - [`Error::UnknownReference`] at the first undeclared reference.
    /// - [`Error::ReadOnly`] at the first output or time reference.
    pub fn set_reals(&mut self, vrs: &[ValueReference], values: &[f64]) -> Result<(), Error> {
        let variables = self.description.reals;
        write(ValueKind::Real, variables, &mut self.reals, vrs, values, |v| *v)
    }

    /// Writes integers from `values`.
    ///
    /// # Errors
    ///
    /// See [`set_reals`](Self::set_reals).
    pub fn set_integers(&mut self, vrs: &[ValueReference], values: &[i32]) -> Result<(), Error> {
        let variables = self.description.integers;
        write(ValueKind::Integer, variables, &mut self.integers, vrs, values, |v| *v)
    }

    /// Writes booleans from `values`.
    ///
    /// # Errors
    ///
    /// See [`set_reals`](Self::set_reals).
    pub fn set_booleans(&mut self, vrs: &[ValueReference], values: &[bool]) -> Result<(), Error> {
        let variables = self.description.booleans;
        write(ValueKind::Boolean, variables, &mut self.booleans, vrs, values, |v| *v)
    }

    /// Writes strings from `values`, copying them into the store.
    ///
    /// # Errors
    ///
    /// See [`set_reals`](Self::set_reals).
    pub fn set_strings(&mut self, vrs: &[ValueReference], values: &[&CStr]) -> Result<(), Error> {
        let variables = self.description.strings;
        write(ValueKind::String, variables, &mut self.strings, vrs, values, |v| {
            CString::from(*v)
        })
    }
}

fn starts<V, S>(variables: &[Variable<V>], f: impl Fn(&V) -> S) -> Vec<S> {
    variables.iter().map(|variable| f(&variable.start)).collect()
}

fn check_lengths(references: usize, values: usize) -> Result<(), Error> {
    if references == values {
        Ok(())
    } else {
        Err(Error::LengthMismatch { references, values })
    }
}

fn read<'a, S, T>(
    kind: ValueKind,
    slots: &'a [S],
    vrs: &[ValueReference],
    values: &mut [T],
    convert: impl Fn(&'a S) -> T,
) -> Result<(), Error> {
    check_lengths(vrs.len(), values.len())?;

    for (&vr, value) in vrs.iter().zip(values.iter_mut()) {
        let slot = slots
            .get(vr as usize)
            .ok_or(Error::UnknownReference { kind, vr })?;
        *value = convert(slot);
    }

    Ok(())
}

fn write<V, S, T>(
    kind: ValueKind,
    variables: &'static [Variable<V>],
    slots: &mut [S],
    vrs: &[ValueReference],
    values: &[T],
    convert: impl Fn(&T) -> S,
) -> Result<(), Error> {
    check_lengths(vrs.len(), values.len())?;

    for (&vr, value) in vrs.iter().zip(values) {
        let index = vr as usize;
        let (Some(variable), Some(slot)) = (variables.get(index), slots.get_mut(index)) else {
            return Err(Error::UnknownReference { kind, vr });
        };
        if !variable.causality.is_writable() {
            return Err(Error::ReadOnly {
                kind,
                vr,
                name: variable.name,
            });
        }
        *slot = convert(value);
    }

    Ok(())
}
