//! The FMI 2.0 co-simulation C function table.
//!
//! [`export_fmi2!`](crate::export_fmi2) emits every `fmi2*` function with C
//! linkage for one [`Model`]. The functions here do the actual work: they
//! decode the opaque component pointer into a raw instance id, resolve it in
//! a process-wide [`Registry`], translate raw arrays into slices, and turn the
//! `Result` of the Rust operation into an [`fmi2Status`].
//!
//! The C types and status codes come from the `fmi-sys` bindings to the
//! standard headers.
//!
//! A component pointer is never dereferenced. It carries a `u32` instance id,
//! so it fits in a pointer on every target, and a freed or forged pointer
//! resolves to `fmi2Error` instead of undefined behaviour.

#![allow(non_upper_case_globals)]

use std::{
    ffi::CStr,
    ptr, slice,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use fmi_sys::fmi2 as binding;
use tracing::warn;

use crate::{Capability, Error, Model, Slave, Slaves, Status};

pub use binding::{
    fmi2Boolean, fmi2Byte, fmi2CallbackFunctions, fmi2Component, fmi2FMUstate, fmi2Integer,
    fmi2Real, fmi2Status, fmi2StatusKind, fmi2String, fmi2Type, fmi2ValueReference,
};

pub const fmi2True: fmi2Boolean = binding::fmi2True as fmi2Boolean;
pub const fmi2False: fmi2Boolean = binding::fmi2False as fmi2Boolean;

pub const fmi2ModelExchange: fmi2Type = binding::fmi2Type_fmi2ModelExchange;
pub const fmi2CoSimulation: fmi2Type = binding::fmi2Type_fmi2CoSimulation;

pub const fmi2OK: fmi2Status = binding::fmi2Status_fmi2OK;
pub const fmi2Warning: fmi2Status = binding::fmi2Status_fmi2Warning;
pub const fmi2Discard: fmi2Status = binding::fmi2Status_fmi2Discard;
pub const fmi2Error: fmi2Status = binding::fmi2Status_fmi2Error;
pub const fmi2Fatal: fmi2Status = binding::fmi2Status_fmi2Fatal;

/// Platform tag returned by `fmi2GetTypesPlatform`.
pub const TYPES_PLATFORM: &CStr = c"default";

/// Standard version returned by `fmi2GetVersion`.
pub const VERSION: &CStr = c"2.0";

fn code(status: Status) -> fmi2Status {
    match status {
        Status::Ok => fmi2OK,
        Status::Warning => fmi2Warning,
        Status::Discard => fmi2Discard,
        Status::Error => fmi2Error,
        Status::Fatal => fmi2Fatal,
    }
}

fn report<T>(result: Result<T, Error>) -> fmi2Status {
    code(Status::from(&result))
}

/// Process-wide instance table behind the exported functions of one model.
///
/// Calls take the table lock shared and then lock only the instance they
/// address, so calls on different instances run concurrently. Creating and
/// freeing an instance take the table lock exclusively.
#[derive(Debug)]
pub struct Registry<M: Model> {
    slaves: RwLock<Slaves<M>>,
}

impl<M: Model> Default for Registry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Registry<M> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slaves: RwLock::new(Slaves::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Slaves<M>>, Error> {
        self.slaves.read().map_err(|_| Error::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Slaves<M>>, Error> {
        self.slaves.write().map_err(|_| Error::Poisoned)
    }

    /// Resolves `component` and runs `f` on the instance.
    fn with<T>(
        &self,
        component: fmi2Component,
        f: impl FnOnce(&mut Slave<M>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let raw = decode(component)?;
        let slaves = self.read()?;
        let mut slave = slaves.get(slaves.resolve(raw)?)?;
        f(&mut slave)
    }

    fn call(
        &self,
        component: fmi2Component,
        f: impl FnOnce(&mut Slave<M>) -> Result<(), Error>,
    ) -> fmi2Status {
        report(self.with(component, f))
    }
}

fn encode(raw: u32) -> Option<fmi2Component> {
    let address = usize::try_from(raw).ok()?;
    Some(ptr::without_provenance_mut(address))
}

fn decode(component: fmi2Component) -> Result<u32, Error> {
    if component.is_null() {
        warn!("null component");
        return Err(Error::InvalidHandle);
    }
    u32::try_from(component.addr()).map_err(|_| {
        warn!(address = component.addr(), "component was not issued here");
        Error::InvalidHandle
    })
}

fn is_true(value: fmi2Boolean) -> bool {
    value != fmi2False
}

/// Borrows a C array of `len` elements; empty arrays may be null.
unsafe fn array<'a, T>(data: *const T, len: usize) -> Result<&'a [T], Error> {
    if len == 0 {
        Ok(&[])
    } else if data.is_null() {
        Err(Error::NullArray(len))
    } else {
        // SAFETY: the caller guarantees `data` points to `len` readable elements.
        Ok(unsafe { slice::from_raw_parts(data, len) })
    }
}

/// Mutably borrows a C array of `len` elements; empty arrays may be null.
unsafe fn array_mut<'a, T>(data: *mut T, len: usize) -> Result<&'a mut [T], Error> {
    if len == 0 {
        Ok(&mut [])
    } else if data.is_null() {
        Err(Error::NullArray(len))
    } else {
        // SAFETY: the caller guarantees `data` points to `len` writable elements.
        Ok(unsafe { slice::from_raw_parts_mut(data, len) })
    }
}

/// Borrows a C string as UTF-8, if it is non-null and valid.
unsafe fn text<'a>(value: fmi2String) -> Option<&'a str> {
    if value.is_null() {
        return None;
    }
    // SAFETY: the caller guarantees `value` is a nul-terminated string.
    unsafe { CStr::from_ptr(value) }.to_str().ok()
}

#[must_use]
pub fn get_types_platform() -> fmi2String {
    TYPES_PLATFORM.as_ptr()
}

#[must_use]
pub fn get_version() -> fmi2String {
    VERSION.as_ptr()
}

/// Refuses to configure debug logging; reports `fmi2Warning` for live instances.
///
/// A null category array counts as no categories.
///
/// # Safety
///
/// `categories` must be null or point to `n_categories` C strings.
pub unsafe fn set_debug_logging<M: Model>(
    registry: &Registry<M>,
    component: fmi2Component,
    logging_on: fmi2Boolean,
    n_categories: usize,
    categories: *const fmi2String,
) -> fmi2Status {
    report(registry.with(component, |slave| {
        // SAFETY: forwarded from the caller.
        let categories = unsafe { array(categories, n_categories) }.unwrap_or_default();
        let categories: Vec<&str> = categories
            .iter()
            // SAFETY: each entry is a C string per the caller's contract.
            .filter_map(|&category| unsafe { text(category) })
            .collect();
        slave.set_debug_logging(is_true(logging_on), &categories)
    }))
}

/// Creates an instance and returns its encoded handle, or null on refusal.
///
/// Refuses a missing or empty instance name, a missing or foreign identity
/// token, and the model-exchange interface type.
///
/// # Safety
///
/// `instance_name` and `guid` must be null or nul-terminated C strings.
pub unsafe fn instantiate<M: Model + Default>(
    registry: &Registry<M>,
    instance_name: fmi2String,
    fmu_type: fmi2Type,
    guid: fmi2String,
) -> fmi2Component {
    // SAFETY: forwarded from the caller.
    let (name, identity) = unsafe { (text(instance_name), text(guid)) };
    let (Some(name), Some(identity)) = (name, identity) else {
        warn!(model = M::DESCRIPTION.name, "instantiate without a usable name or GUID");
        return ptr::null_mut();
    };
    if fmu_type != fmi2CoSimulation {
        warn!(model = M::DESCRIPTION.name, fmu_type, "only co-simulation is offered");
        return ptr::null_mut();
    }

    let Ok(mut slaves) = registry.write() else {
        return ptr::null_mut();
    };
    let Ok(handle) = slaves.instantiate(M::default(), name, identity) else {
        return ptr::null_mut();
    };
    match slaves.to_raw(handle).ok().and_then(encode) {
        Some(component) => component,
        None => {
            warn!(instance = name, "raw id does not fit in a pointer");
            slaves.free(handle);
            ptr::null_mut()
        }
    }
}

/// Destroys an instance. Null and already freed components are ignored.
pub fn free_instance<M: Model>(registry: &Registry<M>, component: fmi2Component) {
    let Ok(raw) = decode(component) else {
        return;
    };
    let Ok(mut slaves) = registry.write() else {
        return;
    };
    if let Ok(handle) = slaves.resolve(raw) {
        slaves.free(handle);
    }
}

pub fn setup_experiment<M: Model>(
    registry: &Registry<M>,
    component: fmi2Component,
    tolerance_defined: fmi2Boolean,
    tolerance: fmi2Real,
    start_time: fmi2Real,
    stop_time_defined: fmi2Boolean,
    stop_time: fmi2Real,
) -> fmi2Status {
    let tolerance = is_true(tolerance_defined).then_some(tolerance);
    let stop_time = is_true(stop_time_defined).then_some(stop_time);
    registry.call(component, |slave| {
        slave.setup_experiment(tolerance, start_time, stop_time)
    })
}

pub fn enter_initialization_mode<M: Model>(
    registry: &Registry<M>,
    component: fmi2Component,
) -> fmi2Status {
    registry.call(component, Slave::enter_initialization_mode)
}

pub fn exit_initialization_mode<M: Model>(
    registry: &Registry<M>,
    component: fmi2Component,
) -> fmi2Status {
    registry.call(component, Slave::exit_initialization_mode)
}

pub fn terminate<M: Model>(registry: &Registry<M>, component: fmi2Component) -> fmi2Status {
    registry.call(component, Slave::terminate)
}

pub fn reset<M: Model>(registry: &Registry<M>, component: fmi2Component) -> fmi2Status {
    registry.call(component, Slave::reset)
}

pub fn do_step<M: Model>(
    registry: &Registry<M>,
    component: fmi2Component,
    current_communication_point: fmi2Real,
    communication_step_size: fmi2Real,
    no_set_fmu_state_prior: fmi2Boolean,
) -> fmi2Status {
    registry.call(component, |slave| {
        slave.do_step(
            current_communication_point,
            communication_step_size,
            is_true(no_set_fmu_state_prior),
        )
    })
}

/// # Safety
///
/// `vr` must point to `nvr` value references and `value` to `nvr` writable
/// reals; either may be null when `nvr` is zero.
pub unsafe fn get_real<M: Model>(
    registry: &Registry<M>,
    component: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *mut fmi2Real,
) -> fmi2Status {
    registry.call(component, |slave| {
        // SAFETY: forwarded from the caller.
        let (vrs, values) = unsafe { (array(vr, nvr)?, array_mut(value, nvr)?) };
        slave.get_reals(vrs, values)
    })
}

/// # Safety
///
/// See [`get_real`].
pub unsafe fn get_integer<M: Model>(
    registry: &Registry<M>,
    component: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *mut fmi2Integer,
) -> fmi2Status {
    registry.call(component, |slave| {
        // SAFETY: forwarded from the caller.
        let (vrs, values) = unsafe { (array(vr, nvr)?, array_mut(value, nvr)?) };
        slave.get_integers(vrs, values)
    })
}

/// Reads booleans one reference at a time so a failure leaves later
/// entries of `value` untouched.
///
/// # Safety
///
/// See [`get_real`].
pub unsafe fn get_boolean<M: Model>(
    registry: &Registry<M>,
    component: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *mut fmi2Boolean,
) -> fmi2Status {
    registry.call(component, |slave| {
        // SAFETY: forwarded from the caller.
        let (vrs, values) = unsafe { (array(vr, nvr)?, array_mut(value, nvr)?) };
        for (&vr, value) in vrs.iter().zip(values) {
            let mut flag = [false];
            slave.get_booleans(&[vr], &mut flag)?;
            *value = fmi2Boolean::from(flag[0]);
        }
        Ok(())
    })
}

/// Reads strings one reference at a time. The returned pointers stay valid
/// until the variable is next written or the instance is freed.
///
/// # Safety
///
/// See [`get_real`].
pub unsafe fn get_string<M: Model>(
    registry: &Registry<M>,
    component: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *mut fmi2String,
) -> fmi2Status {
    registry.call(component, |slave| {
        // SAFETY: forwarded from the caller.
        let (vrs, values) = unsafe { (array(vr, nvr)?, array_mut(value, nvr)?) };
        for (&vr, value) in vrs.iter().zip(values) {
            let mut text = [c""];
            slave.get_strings(&[vr], &mut text)?;
            *value = text[0].as_ptr();
        }
        Ok(())
    })
}

/// # Safety
///
/// `vr` must point to `nvr` value references and `value` to `nvr` reals;
/// either may be null when `nvr` is zero.
pub unsafe fn set_real<M: Model>(
    registry: &Registry<M>,
    component: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *const fmi2Real,
) -> fmi2Status {
    registry.call(component, |slave| {
        // SAFETY: forwarded from the caller.
        let (vrs, values) = unsafe { (array(vr, nvr)?, array(value, nvr)?) };
        slave.set_reals(vrs, values)
    })
}

/// # Safety
///
/// See [`set_real`].
pub unsafe fn set_integer<M: Model>(
    registry: &Registry<M>,
    component: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *const fmi2Integer,
) -> fmi2Status {
    registry.call(component, |slave| {
        // SAFETY: forwarded from the caller.
        let (vrs, values) = unsafe { (array(vr, nvr)?, array(value, nvr)?) };
        slave.set_integers(vrs, values)
    })
}

/// # Safety
///
/// See [`set_real`].
pub unsafe fn set_boolean<M: Model>(
    registry: &Registry<M>,
    component: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *const fmi2Boolean,
) -> fmi2Status {
    registry.call(component, |slave| {
        // SAFETY: forwarded from the caller.
        let (vrs, values) = unsafe { (array(vr, nvr)?, array(value, nvr)?) };
        let flags: Vec<bool> = values.iter().copied().map(is_true).collect();
        slave.set_booleans(vrs, &flags)
    })
}

/// Writes strings one reference at a time; a null string aborts the call at
/// its index like an invalid reference would.
///
/// # Safety
///
/// See [`set_real`]; every non-null string must be nul-terminated.
pub unsafe fn set_string<M: Model>(
    registry: &Registry<M>,
    component: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *const fmi2String,
) -> fmi2Status {
    registry.call(component, |slave| {
        // SAFETY: forwarded from the caller.
        let (vrs, values) = unsafe { (array(vr, nvr)?, array(value, nvr)?) };
        for (&vr, &value) in vrs.iter().zip(values) {
            if value.is_null() {
                return Err(Error::NullArray(1));
            }
            // SAFETY: non-null and nul-terminated per the caller's contract.
            let text = unsafe { CStr::from_ptr(value) };
            slave.set_strings(&[vr], &[text])?;
        }
        Ok(())
    })
}

/// Reports an optional capability as unsupported, whatever the component.
#[must_use]
pub fn unsupported(capability: Capability) -> fmi2Status {
    let error = Error::Unsupported(capability);
    warn!(%error, "call rejected");
    code(error.status())
}

/// Exports a [`Model`](crate::Model) through the FMI 2.0 co-simulation C
/// function table.
///
/// Invoke once at the root of a `cdylib` crate:
///
/// ```ignore
/// cosim_core::export_fmi2!(cosim_components::Gain);
/// ```
///
/// The model type must implement [`Default`]; each `fmi2Instantiate` call
/// creates a fresh instance from it.
#[macro_export]
macro_rules! export_fmi2 {
    ($model:ty) => {
        static FMI2_REGISTRY: ::std::sync::LazyLock<$crate::ffi::Registry<$model>> =
            ::std::sync::LazyLock::new(|| $crate::ffi::Registry::new());

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2GetTypesPlatform() -> $crate::ffi::fmi2String {
            $crate::ffi::get_types_platform()
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2GetVersion() -> $crate::ffi::fmi2String {
            $crate::ffi::get_version()
        }

        /// # Safety
        ///
        /// `categories` must point to `nCategories` C strings.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn fmi2SetDebugLogging(
            c: $crate::ffi::fmi2Component,
            loggingOn: $crate::ffi::fmi2Boolean,
            nCategories: usize,
            categories: *const $crate::ffi::fmi2String,
        ) -> $crate::ffi::fmi2Status {
            unsafe {
                $crate::ffi::set_debug_logging(
                    &FMI2_REGISTRY,
                    c,
                    loggingOn,
                    nCategories,
                    categories,
                )
            }
        }

        /// # Safety
        ///
        /// String arguments must be null or nul-terminated.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn fmi2Instantiate(
            instanceName: $crate::ffi::fmi2String,
            fmuType: $crate::ffi::fmi2Type,
            fmuGUID: $crate::ffi::fmi2String,
            _fmuResourceLocation: $crate::ffi::fmi2String,
            _functions: *const $crate::ffi::fmi2CallbackFunctions,
            _visible: $crate::ffi::fmi2Boolean,
            _loggingOn: $crate::ffi::fmi2Boolean,
        ) -> $crate::ffi::fmi2Component {
            unsafe { $crate::ffi::instantiate(&FMI2_REGISTRY, instanceName, fmuType, fmuGUID) }
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2FreeInstance(c: $crate::ffi::fmi2Component) {
            $crate::ffi::free_instance(&FMI2_REGISTRY, c)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2SetupExperiment(
            c: $crate::ffi::fmi2Component,
            toleranceDefined: $crate::ffi::fmi2Boolean,
            tolerance: $crate::ffi::fmi2Real,
            startTime: $crate::ffi::fmi2Real,
            stopTimeDefined: $crate::ffi::fmi2Boolean,
            stopTime: $crate::ffi::fmi2Real,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::setup_experiment(
                &FMI2_REGISTRY,
                c,
                toleranceDefined,
                tolerance,
                startTime,
                stopTimeDefined,
                stopTime,
            )
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2EnterInitializationMode(
            c: $crate::ffi::fmi2Component,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::enter_initialization_mode(&FMI2_REGISTRY, c)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2ExitInitializationMode(
            c: $crate::ffi::fmi2Component,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::exit_initialization_mode(&FMI2_REGISTRY, c)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2Terminate(c: $crate::ffi::fmi2Component) -> $crate::ffi::fmi2Status {
            $crate::ffi::terminate(&FMI2_REGISTRY, c)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2Reset(c: $crate::ffi::fmi2Component) -> $crate::ffi::fmi2Status {
            $crate::ffi::reset(&FMI2_REGISTRY, c)
        }

        /// # Safety
        ///
        /// `vr` and `value` must each hold `nvr` elements.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn fmi2GetReal(
            c: $crate::ffi::fmi2Component,
            vr: *const $crate::ffi::fmi2ValueReference,
            nvr: usize,
            value: *mut $crate::ffi::fmi2Real,
        ) -> $crate::ffi::fmi2Status {
            unsafe { $crate::ffi::get_real(&FMI2_REGISTRY, c, vr, nvr, value) }
        }

        /// # Safety
        ///
        /// `vr` and `value` must each hold `nvr` elements.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn fmi2GetInteger(
            c: $crate::ffi::fmi2Component,
            vr: *const $crate::ffi::fmi2ValueReference,
            nvr: usize,
            value: *mut $crate::ffi::fmi2Integer,
        ) -> $crate::ffi::fmi2Status {
            unsafe { $crate::ffi::get_integer(&FMI2_REGISTRY, c, vr, nvr, value) }
        }

        /// # Safety
        ///
        /// `vr` and `value` must each hold `nvr` elements.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn fmi2GetBoolean(
            c: $crate::ffi::fmi2Component,
            vr: *const $crate::ffi::fmi2ValueReference,
            nvr: usize,
            value: *mut $crate::ffi::fmi2Boolean,
        ) -> $crate::ffi::fmi2Status {
            unsafe { $crate::ffi::get_boolean(&FMI2_REGISTRY, c, vr, nvr, value) }
        }

        /// # Safety
        ///
        /// `vr` and `value` must each hold `nvr` elements.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn fmi2GetString(
            c: $crate::ffi::fmi2Component,
            vr: *const $crate::ffi::fmi2ValueReference,
            nvr: usize,
            value: *mut $crate::ffi::fmi2String,
        ) -> $crate::ffi::fmi2Status {
            unsafe { $crate::ffi::get_string(&FMI2_REGISTRY, c, vr, nvr, value) }
        }

        /// # Safety
        ///
        /// `vr` and `value` must each hold `nvr` elements.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn fmi2SetReal(
            c: $crate::ffi::fmi2Component,
            vr: *const $crate::ffi::fmi2ValueReference,
            nvr: usize,
            value: *const $crate::ffi::fmi2Real,
        ) -> $crate::ffi::fmi2Status {
            unsafe { $crate::ffi::set_real(&FMI2_REGISTRY, c, vr, nvr, value) }
        }

        /// # Safety
        ///
        /// `vr` and `value` must each hold `nvr` elements.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn fmi2SetInteger(
            c: $crate::ffi::fmi2Component,
            vr: *const $crate::ffi::fmi2ValueReference,
            nvr: usize,
            value: *const $crate::ffi::fmi2Integer,
        ) -> $crate::ffi::fmi2Status {
            unsafe { $crate::ffi::set_integer(&FMI2_REGISTRY, c, vr, nvr, value) }
        }

        /// # Safety
        ///
        /// `vr` and `value` must each hold `nvr` elements.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn fmi2SetBoolean(
            c: $crate::ffi::fmi2Component,
            vr: *const $crate::ffi::fmi2ValueReference,
            nvr: usize,
            value: *const $crate::ffi::fmi2Boolean,
        ) -> $crate::ffi::fmi2Status {
            unsafe { $crate::ffi::set_boolean(&FMI2_REGISTRY, c, vr, nvr, value) }
        }

        /// # Safety
        ///
        /// `vr` and `value` must each hold `nvr` elements.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn fmi2SetString(
            c: $crate::ffi::fmi2Component,
            vr: *const $crate::ffi::fmi2ValueReference,
            nvr: usize,
            value: *const $crate::ffi::fmi2String,
        ) -> $crate::ffi::fmi2Status {
            unsafe { $crate::ffi::set_string(&FMI2_REGISTRY, c, vr, nvr, value) }
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2DoStep(
            c: $crate::ffi::fmi2Component,
            currentCommunicationPoint: $crate::ffi::fmi2Real,
            communicationStepSize: $crate::ffi::fmi2Real,
            noSetFMUStatePriorToCurrentPoint: $crate::ffi::fmi2Boolean,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::do_step(
                &FMI2_REGISTRY,
                c,
                currentCommunicationPoint,
                communicationStepSize,
                noSetFMUStatePriorToCurrentPoint,
            )
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2GetFMUstate(
            _c: $crate::ffi::fmi2Component,
            _state: *mut $crate::ffi::fmi2FMUstate,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::unsupported($crate::Capability::GetFmuState)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2SetFMUstate(
            _c: $crate::ffi::fmi2Component,
            _state: $crate::ffi::fmi2FMUstate,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::unsupported($crate::Capability::SetFmuState)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2FreeFMUstate(
            _c: $crate::ffi::fmi2Component,
            _state: *mut $crate::ffi::fmi2FMUstate,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::unsupported($crate::Capability::FreeFmuState)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2SerializedFMUstateSize(
            _c: $crate::ffi::fmi2Component,
            _state: $crate::ffi::fmi2FMUstate,
            _size: *mut usize,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::unsupported($crate::Capability::SerializedFmuStateSize)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2SerializeFMUstate(
            _c: $crate::ffi::fmi2Component,
            _state: $crate::ffi::fmi2FMUstate,
            _serialized: *mut $crate::ffi::fmi2Byte,
            _size: usize,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::unsupported($crate::Capability::SerializeFmuState)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2DeSerializeFMUstate(
            _c: $crate::ffi::fmi2Component,
            _serialized: *const $crate::ffi::fmi2Byte,
            _size: usize,
            _state: *mut $crate::ffi::fmi2FMUstate,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::unsupported($crate::Capability::DeserializeFmuState)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2GetDirectionalDerivative(
            _c: $crate::ffi::fmi2Component,
            _unknown: *const $crate::ffi::fmi2ValueReference,
            _n_unknown: usize,
            _known: *const $crate::ffi::fmi2ValueReference,
            _n_known: usize,
            _dv_known: *const $crate::ffi::fmi2Real,
            _dv_unknown: *mut $crate::ffi::fmi2Real,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::unsupported($crate::Capability::DirectionalDerivative)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2SetRealInputDerivatives(
            _c: $crate::ffi::fmi2Component,
            _vr: *const $crate::ffi::fmi2ValueReference,
            _nvr: usize,
            _order: *const $crate::ffi::fmi2Integer,
            _value: *const $crate::ffi::fmi2Real,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::unsupported($crate::Capability::SetRealInputDerivatives)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2GetRealOutputDerivatives(
            _c: $crate::ffi::fmi2Component,
            _vr: *const $crate::ffi::fmi2ValueReference,
            _nvr: usize,
            _order: *const $crate::ffi::fmi2Integer,
            _value: *mut $crate::ffi::fmi2Real,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::unsupported($crate::Capability::GetRealOutputDerivatives)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2CancelStep(
            _c: $crate::ffi::fmi2Component,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::unsupported($crate::Capability::CancelStep)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2GetStatus(
            _c: $crate::ffi::fmi2Component,
            _kind: $crate::ffi::fmi2StatusKind,
            _value: *mut $crate::ffi::fmi2Status,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::unsupported($crate::Capability::GetStatus)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2GetRealStatus(
            _c: $crate::ffi::fmi2Component,
            _kind: $crate::ffi::fmi2StatusKind,
            _value: *mut $crate::ffi::fmi2Real,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::unsupported($crate::Capability::GetRealStatus)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2GetIntegerStatus(
            _c: $crate::ffi::fmi2Component,
            _kind: $crate::ffi::fmi2StatusKind,
            _value: *mut $crate::ffi::fmi2Integer,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::unsupported($crate::Capability::GetIntegerStatus)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2GetBooleanStatus(
            _c: $crate::ffi::fmi2Component,
            _kind: $crate::ffi::fmi2StatusKind,
            _value: *mut $crate::ffi::fmi2Boolean,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::unsupported($crate::Capability::GetBooleanStatus)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn fmi2GetStringStatus(
            _c: $crate::ffi::fmi2Component,
            _kind: $crate::ffi::fmi2StatusKind,
            _value: *mut $crate::ffi::fmi2String,
        ) -> $crate::ffi::fmi2Status {
            $crate::ffi::unsupported($crate::Capability::GetStringStatus)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::ffi::CString;

    use crate::{ModelDescription, Variable, VariableStore};

    const GUID: &CStr = c"{switch}";

    /// Output follows the input while `enabled` is set.
    #[derive(Default)]
    struct Switch;

    impl Model for Switch {
        const DESCRIPTION: &'static ModelDescription = &ModelDescription {
            name: "Switch",
            identity: "{switch}",
            reals: &[Variable::input("u", 0.0), Variable::output("y", 0.0)],
            integers: &[Variable::parameter("mode", 1)],
            booleans: &[Variable::parameter("enabled", true)],
            strings: &[Variable::parameter("label", c"switch")],
        };

        fn evaluate(&self, _time: f64, store: &mut VariableStore) {
            let u = store.real(0);
            store.assign_real(1, u);
        }
    }

    fn instantiate(registry: &Registry<Switch>, name: &CStr) -> fmi2Component {
        unsafe { super::instantiate(registry, name.as_ptr(), fmi2CoSimulation, GUID.as_ptr()) }
    }

    fn stepping(registry: &Registry<Switch>) -> fmi2Component {
        let c = instantiate(registry, c"switch");
        assert!(!c.is_null());
        assert_eq!(
            setup_experiment(registry, c, fmi2False, 0.0, 0.0, fmi2False, 0.0),
            fmi2OK
        );
        assert_eq!(enter_initialization_mode(registry, c), fmi2OK);
        assert_eq!(exit_initialization_mode(registry, c), fmi2OK);
        c
    }

    #[test]
    fn version_and_platform() {
        let platform = unsafe { CStr::from_ptr(get_types_platform()) };
        let version = unsafe { CStr::from_ptr(get_version()) };
        assert_eq!(platform, c"default");
        assert_eq!(version, c"2.0");
    }

    #[test]
    fn instantiate_refusals_return_null() {
        let registry = Registry::<Switch>::new();

        let name = c"s".as_ptr();
        let refused = |name, fmu_type, guid| unsafe {
            super::instantiate(&registry, name, fmu_type, guid).is_null()
        };

        assert!(instantiate(&registry, c"").is_null());
        assert!(refused(ptr::null(), fmi2CoSimulation, GUID.as_ptr()));
        assert!(refused(name, fmi2CoSimulation, ptr::null()));
        assert!(refused(name, fmi2CoSimulation, c"{other}".as_ptr()));
        assert!(refused(name, fmi2ModelExchange, GUID.as_ptr()));
        assert!(registry.read().unwrap().is_empty());
    }

    #[test]
    fn components_carry_small_ids() {
        let registry = Registry::<Switch>::new();
        let first = instantiate(&registry, c"first");
        let second = instantiate(&registry, c"second");

        assert_eq!(first.addr(), 1);
        assert_eq!(second.addr(), 2);
        assert!(u32::try_from(second.addr()).is_ok());

        free_instance(&registry, first);
        let third = instantiate(&registry, c"third");
        assert_eq!(third.addr(), 3);
        assert_eq!(terminate(&registry, first), fmi2Error);
    }

    #[test]
    fn components_beyond_u32_are_refused() {
        let registry = Registry::<Switch>::new();
        instantiate(&registry, c"live");
        let forged: fmi2Component = ptr::without_provenance_mut(usize::MAX);
        assert_eq!(terminate(&registry, forged), fmi2Error);
        free_instance(&registry, forged);
        assert_eq!(registry.read().unwrap().len(), 1);
    }

    #[test]
    fn null_and_freed_components_are_errors() {
        let registry = Registry::<Switch>::new();
        assert_eq!(terminate(&registry, ptr::null_mut()), fmi2Error);

        let c = instantiate(&registry, c"gone");
        free_instance(&registry, c);
        free_instance(&registry, c);
        free_instance(&registry, ptr::null_mut());

        assert_eq!(enter_initialization_mode(&registry, c), fmi2Error);
        assert_eq!(do_step(&registry, c, 0.0, 1.0, fmi2True), fmi2Error);
    }

    #[test]
    fn step_and_read_through_raw_arrays() {
        let registry = Registry::<Switch>::new();
        let c = stepping(&registry);

        let vrs = [0];
        let status = unsafe { set_real(&registry, c, vrs.as_ptr(), 1, [4.5].as_ptr()) };
        assert_eq!(status, fmi2OK);
        assert_eq!(do_step(&registry, c, 0.0, 0.5, fmi2True), fmi2OK);

        let mut out = [0.0; 2];
        let status = unsafe { get_real(&registry, c, [0, 1].as_ptr(), 2, out.as_mut_ptr()) };
        assert_eq!(status, fmi2OK);
        assert_eq!(out, [4.5, 4.5]);

        assert_eq!(do_step(&registry, c, 0.0, 0.5, fmi2True), fmi2Error);
        free_instance(&registry, c);
    }

    #[test]
    fn null_arrays_only_allowed_when_empty() {
        let registry = Registry::<Switch>::new();
        let c = instantiate(&registry, c"arrays");

        let status = unsafe { get_real(&registry, c, ptr::null(), 0, ptr::null_mut()) };
        assert_eq!(status, fmi2OK);

        let status = unsafe { get_real(&registry, c, ptr::null(), 1, [0.0].as_mut_ptr()) };
        assert_eq!(status, fmi2Error);
    }

    #[test]
    fn booleans_convert_and_stop_at_first_bad_reference() {
        let registry = Registry::<Switch>::new();
        let c = instantiate(&registry, c"flags");

        let status = unsafe { set_boolean(&registry, c, [0].as_ptr(), 1, [fmi2False].as_ptr()) };
        assert_eq!(status, fmi2OK);

        let mut out = [7, 7, 7];
        let status = unsafe { get_boolean(&registry, c, [0, 5, 0].as_ptr(), 3, out.as_mut_ptr()) };
        assert_eq!(status, fmi2Error);
        assert_eq!(out, [fmi2False, 7, 7]);
    }

    #[test]
    fn strings_round_trip_through_c() {
        let registry = Registry::<Switch>::new();
        let c = instantiate(&registry, c"strings");

        let label = CString::new("renamed").unwrap();
        let labels = [label.as_ptr()];
        let status = unsafe { set_string(&registry, c, [0].as_ptr(), 1, labels.as_ptr()) };
        assert_eq!(status, fmi2OK);
        drop(label);

        let mut out = [ptr::null(); 1];
        let status = unsafe { get_string(&registry, c, [0].as_ptr(), 1, out.as_mut_ptr()) };
        assert_eq!(status, fmi2OK);
        assert_eq!(unsafe { CStr::from_ptr(out[0]) }, c"renamed");

        let status = unsafe { set_string(&registry, c, [0].as_ptr(), 1, [ptr::null()].as_ptr()) };
        assert_eq!(status, fmi2Error);
    }

    #[test]
    fn integers_pass_through() {
        let registry = Registry::<Switch>::new();
        let c = instantiate(&registry, c"ints");

        let status = unsafe { set_integer(&registry, c, [0].as_ptr(), 1, [3].as_ptr()) };
        assert_eq!(status, fmi2OK);

        let mut out = [0];
        let status = unsafe { get_integer(&registry, c, [0].as_ptr(), 1, out.as_mut_ptr()) };
        assert_eq!(status, fmi2OK);
        assert_eq!(out, [3]);
    }

    #[test]
    fn debug_logging_warns_for_live_instances_only() {
        let registry = Registry::<Switch>::new();
        let c = instantiate(&registry, c"logs");

        let categories = [c"logAll".as_ptr()];
        let status = unsafe { set_debug_logging(&registry, c, fmi2True, 1, categories.as_ptr()) };
        assert_eq!(status, fmi2Warning);

        let status = unsafe { set_debug_logging(&registry, c, fmi2True, 2, ptr::null()) };
        assert_eq!(status, fmi2Warning);

        let status =
            unsafe { set_debug_logging(&registry, ptr::null_mut(), fmi2True, 0, ptr::null()) };
        assert_eq!(status, fmi2Error);
    }

    #[test]
    fn a_held_instance_does_not_block_others() {
        let registry = Registry::<Switch>::new();
        let busy = stepping(&registry);
        let idle = stepping(&registry);

        let raw = decode(busy).unwrap();
        let slaves = registry.read().unwrap();
        let _held = slaves.get(slaves.resolve(raw).unwrap()).unwrap();

        let idle = idle.addr();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                let idle = ptr::without_provenance_mut(idle);
                assert_eq!(do_step(&registry, idle, 0.0, 1.0, fmi2True), fmi2OK);
            });
        });
    }

    #[test]
    fn initialization_calls_succeed_on_any_live_instance() {
        let registry = Registry::<Switch>::new();
        let c = instantiate(&registry, c"eager");

        assert_eq!(exit_initialization_mode(&registry, c), fmi2OK);
        assert_eq!(do_step(&registry, c, 0.0, 1.0, fmi2True), fmi2OK);
        assert_eq!(enter_initialization_mode(&registry, c), fmi2OK);
        assert_eq!(do_step(&registry, c, 1.0, 1.0, fmi2True), fmi2OK);

        assert_eq!(terminate(&registry, c), fmi2OK);
        assert_eq!(enter_initialization_mode(&registry, c), fmi2OK);
        assert_eq!(exit_initialization_mode(&registry, c), fmi2OK);
        assert_eq!(do_step(&registry, c, 2.0, 1.0, fmi2True), fmi2Error);
    }

    #[test]
    fn reset_returns_to_instantiated() {
        let registry = Registry::<Switch>::new();
        let c = stepping(&registry);

        assert_eq!(reset(&registry, c), fmi2OK);
        assert_eq!(do_step(&registry, c, 0.0, 1.0, fmi2True), fmi2Error);
        assert_eq!(enter_initialization_mode(&registry, c), fmi2OK);
    }

    #[test]
    fn unsupported_is_always_an_error() {
        for capability in Capability::ALL {
            assert_eq!(unsupported(capability), fmi2Error);
        }
    }
}
