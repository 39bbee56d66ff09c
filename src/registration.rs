// SPDX-License-Identifier: Apache-2.0

//! Registration-time metadata for an init-only construct.

use anyhow::Result;
use futures::future::BoxFuture;

use crate::config::RegistryConfig;
use crate::construct::Construct;
use crate::error::InitError;
use crate::policy::{ArgForwarding, Policy};

/// Synchronous initializer: configures the allocated instance in place.
pub type SyncInitFn<T> =
    Box<dyn Fn(&mut T, <T as Construct>::Args) -> Result<()> + Send + Sync>;

/// Deferred initializer: configures the allocated instance across await
/// points. Its return value (beyond success/failure) is discarded; the
/// allocated instance is what gets memoized.
pub type DeferredInitFn<T> = Box<
    dyn for<'a> Fn(&'a mut T, <T as Construct>::Args) -> BoxFuture<'a, Result<()>>
        + Send
        + Sync,
>;

pub(crate) enum Initializer<T: Construct> {
    Sync(SyncInitFn<T>),
    Deferred(DeferredInitFn<T>),
    /// Delegate to [`Construct::post_allocate`].
    PostAllocate,
}

/// Builder for declaring a construct init-only.
///
/// Exactly one initializer mode must be chosen: a sync closure, a deferred
/// closure, or the construct's own post-allocation hook. Policy and argument
/// forwarding fall back to the construct's hint and then the registry's
/// configured defaults.
pub struct Registration<T: Construct> {
    policy: Option<Policy>,
    forwarding: Option<ArgForwarding>,
    initializer: Option<Initializer<T>>,
}

impl<T: Construct> Default for Registration<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Construct> Registration<T> {
    pub fn new() -> Self {
        Self {
            policy: None,
            forwarding: None,
            initializer: None,
        }
    }

    /// Use a synchronous initializer. `request_init` completes without
    /// suspension when this mode is registered.
    ///
    /// The closure runs while the construct's slot lock is held: it must not
    /// call back into the registry for the same construct, or it will
    /// deadlock.
    pub fn initializer(
        mut self,
        init: impl Fn(&mut T, T::Args) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.initializer = Some(Initializer::Sync(Box::new(init)));
        self
    }

    /// Use a deferred (asynchronous) initializer. All callers arriving before
    /// settlement share one pending handle.
    pub fn deferred_initializer(
        mut self,
        init: impl for<'a> Fn(&'a mut T, T::Args) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.initializer = Some(Initializer::Deferred(Box::new(init)));
        self
    }

    /// Use [`Construct::post_allocate`] as the initializer.
    pub fn with_post_allocate(mut self) -> Self {
        self.initializer = Some(Initializer::PostAllocate);
        self
    }

    /// Override the construct's declared policy.
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Choose whether `request_init` arguments reach the post-allocation
    /// hook.
    pub fn forwarding(mut self, forwarding: ArgForwarding) -> Self {
        self.forwarding = Some(forwarding);
        self
    }

    pub(crate) fn resolve(
        self,
        config: &RegistryConfig,
    ) -> Result<(Initializer<T>, Policy, ArgForwarding), InitError> {
        let initializer = self.initializer.ok_or_else(|| InitError::Configuration {
            construct: T::label(),
            reason: "registration requires an initializer or the post-allocation hook".into(),
        })?;
        let policy = self
            .policy
            .or_else(T::init_policy)
            .unwrap_or(config.default_policy);
        let forwarding = self.forwarding.unwrap_or(config.default_forwarding);
        Ok((initializer, policy, forwarding))
    }
}
