use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use slotmap::{SecondaryMap, SlotMap, new_key_type};
use tracing::{debug, warn};

use crate::{Config, ConfigError, Error, InstantiateError, Model, Slave};

new_key_type! {
    /// Opaque handle to an instance owned by a [`Slaves`] table.
    ///
    /// Handles are generational: once an instance is freed its handle never
    /// resolves again, even if the slot is reused.
    pub struct SlaveHandle;
}

/// Owns slave instances and resolves handles to them.
///
/// Every lookup goes through a checked resolution step, so a stale or
/// foreign handle yields [`Error::InvalidHandle`] instead of touching freed
/// memory.
///
/// Each instance sits behind its own lock. A shared `&Slaves` can reach
/// several instances from different threads at once; only creating and
/// freeing instances needs `&mut Slaves`.
///
/// Every live instance also carries a raw id: a non-zero `u32` for the C
/// boundary. Raw ids come from a counter and are not handed out again until
/// it wraps around, so a freed id stops resolving just like its handle.
#[derive(Debug)]
pub struct Slaves<M: Model> {
    config: Config,
    instances: SlotMap<SlaveHandle, Mutex<Slave<M>>>,
    raw_ids: SecondaryMap<SlaveHandle, u32>,
    handles: HashMap<u32, SlaveHandle>,
    next_raw: u32,
}

impl<M: Model> Default for Slaves<M> {
    fn default() -> Self {
        Self::build(Config::default())
    }
}

impl<M: Model> Slaves<M> {
    /// Creates an empty table with the default [`Config`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table whose instances share `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` fails validation.
    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: Config) -> Self {
        Self {
            config,
            instances: SlotMap::with_key(),
            raw_ids: SecondaryMap::new(),
            handles: HashMap::new(),
            next_raw: 1,
        }
    }

    /// Returns the number of live instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns `true` if no instance is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Instantiates `model` and returns a handle to the new instance.
    ///
    /// # Errors
    ///
    /// See [`Slave::instantiate`]; no slot is consumed on failure.
    pub fn instantiate(
        &mut self,
        model: M,
        name: &str,
        identity: &str,
    ) -> Result<SlaveHandle, InstantiateError> {
        let slave = Slave::instantiate(model, name, identity, self.config)?;
        let handle = self.instances.insert(Mutex::new(slave));
        let raw = self.issue_raw();
        self.raw_ids.insert(handle, raw);
        self.handles.insert(raw, handle);
        Ok(handle)
    }

    /// Locks and returns a live instance.
    ///
    /// The lock covers this instance only.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidHandle`] if the handle is not live.
    /// - [`Error::Poisoned`] if an earlier call on the instance panicked.
    pub fn get(&self, handle: SlaveHandle) -> Result<MutexGuard<'_, Slave<M>>, Error> {
        let slave = self.instances.get(handle).ok_or_else(|| invalid(handle))?;
        slave.lock().map_err(|_| Error::Poisoned)
    }

    /// Resolves a handle for mutation without locking.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidHandle`] if the handle is not live.
    /// - [`Error::Poisoned`] if an earlier call on the instance panicked.
    pub fn get_mut(&mut self, handle: SlaveHandle) -> Result<&mut Slave<M>, Error> {
        let slave = self
            .instances
            .get_mut(handle)
            .ok_or_else(|| invalid(handle))?;
        slave.get_mut().map_err(|_| Error::Poisoned)
    }

    /// Returns the raw id of a live instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] if the handle is not live.
    pub fn to_raw(&self, handle: SlaveHandle) -> Result<u32, Error> {
        self.raw_ids
            .get(handle)
            .copied()
            .ok_or_else(|| invalid(handle))
    }

    /// Finds the handle behind a raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] if no live instance carries `raw`.
    pub fn resolve(&self, raw: u32) -> Result<SlaveHandle, Error> {
        self.handles.get(&raw).copied().ok_or_else(|| {
            warn!(raw, "raw id does not resolve");
            Error::InvalidHandle
        })
    }

    /// Destroys an instance and invalidates its handle and raw id.
    ///
    /// Returns the instance, or `None` if the handle was not live (freeing
    /// twice is reported and otherwise ignored).
    pub fn free(&mut self, handle: SlaveHandle) -> Option<Slave<M>> {
        let Some(slave) = self.instances.remove(handle) else {
            warn!(?handle, "free of a handle that is not live");
            return None;
        };
        if let Some(raw) = self.raw_ids.remove(handle) {
            self.handles.remove(&raw);
        }
        let slave = slave.into_inner().unwrap_or_else(PoisonError::into_inner);
        debug!(instance = slave.name(), "freed");
        Some(slave)
    }

    fn issue_raw(&mut self) -> u32 {
        loop {
            let raw = self.next_raw;
            self.next_raw = raw.checked_add(1).unwrap_or(1);
            if !self.handles.contains_key(&raw) {
                return raw;
            }
        }
    }
}

fn invalid(handle: SlaveHandle) -> Error {
    warn!(?handle, "handle does not resolve");
    Error::InvalidHandle
}
