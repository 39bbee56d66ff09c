// SPDX-License-Identifier: Apache-2.0

//! The [Registry]: a type-keyed map of initialization slots.
//!
//! A registry is an explicit value owned by its execution context. There is
//! no hidden process-global state, so two registries never share entries and
//! tearing one down takes every slot with it.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::RegistryConfig;
use crate::construct::Construct;
use crate::error::InitError;
use crate::registration::Registration;
use crate::slot::{InitOutcome, Slot};

pub struct Registry {
    config: RegistryConfig,
    slots: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Build a registry with settings resolved from the environment.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::from_settings())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Declare `T` init-only.
    ///
    /// Fails with [`InitError::Configuration`] when `T` declares a
    /// conventional constructor, when the registration carries no
    /// initializer, or when `T` is already registered.
    pub fn register<T: Construct>(&self, registration: Registration<T>) -> Result<(), InitError> {
        if T::conventional_constructor() {
            return Err(InitError::Configuration {
                construct: T::label(),
                reason: "declares a conventional constructor; a construct is init-only or \
                         conventional, never both"
                    .into(),
            });
        }
        let (initializer, policy, forwarding) = registration.resolve(&self.config)?;
        let mut slots = self.slots.write();
        if slots.contains_key(&TypeId::of::<T>()) {
            return Err(InitError::Configuration {
                construct: T::label(),
                reason: "already registered".into(),
            });
        }
        slots.insert(
            TypeId::of::<T>(),
            Arc::new(Slot::<T>::new(policy, forwarding, initializer)),
        );
        tracing::debug!(construct = T::label(), %policy, "registered init-only construct");
        Ok(())
    }

    /// Request initialization of `T`, coalescing onto any in-flight attempt.
    ///
    /// Returns [`InitOutcome::Ready`] without suspension when an instance is
    /// memoized (policy permitting) or when the registered initializer is
    /// synchronous; returns [`InitOutcome::Pending`] otherwise.
    pub fn request_init<T: Construct>(&self, args: T::Args) -> Result<InitOutcome<T>, InitError> {
        let slot = self.slot::<T>().ok_or_else(|| InitError::Usage {
            construct: T::label(),
            reason: "not registered as init-only; use plain construction instead".into(),
        })?;
        slot.request_init(args)
    }

    /// Convenience wrapper: request initialization and await settlement.
    pub async fn init<T: Construct>(&self, args: T::Args) -> Result<Arc<T>, InitError> {
        self.request_init::<T>(args)?.resolved().await
    }

    /// Start a new generation for `T`. Valid only under the `reinit` policy
    /// and only while no attempt is in flight.
    pub fn reset<T: Construct>(&self) -> Result<(), InitError> {
        let slot = self.slot::<T>().ok_or_else(|| InitError::Usage {
            construct: T::label(),
            reason: "not registered as init-only; use plain construction instead".into(),
        })?;
        slot.reset()
    }

    /// The memoized instance for the current generation.
    pub fn instance_of<T: Construct>(&self) -> Result<Arc<T>, InitError> {
        let slot = self.slot::<T>().ok_or_else(|| InitError::Usage {
            construct: T::label(),
            reason: "not registered as init-only; use plain construction instead".into(),
        })?;
        slot.instance()
    }

    /// Hook for construct systems that can intercept plain construction:
    /// fails when `T` is registered init-only, succeeds otherwise.
    pub fn guard_conventional_construction<T: Construct>(&self) -> Result<(), InitError> {
        if self.is_registered::<T>() {
            return Err(InitError::Usage {
                construct: T::label(),
                reason: "registered init-only; use the init pathway instead".into(),
            });
        }
        Ok(())
    }

    pub fn is_registered<T: Construct>(&self) -> bool {
        self.slots.read().contains_key(&TypeId::of::<T>())
    }

    fn slot<T: Construct>(&self) -> Option<Arc<Slot<T>>> {
        let slot = Arc::clone(self.slots.read().get(&TypeId::of::<T>())?);
        // Entries are keyed by `TypeId`, so the downcast cannot fail.
        slot.downcast::<Slot<T>>().ok()
    }
}
