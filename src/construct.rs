// SPDX-License-Identifier: Apache-2.0

//! The [Construct] trait: the interface a class-like type implements to
//! participate in the init pathway.
//!
//! A construct never exposes a conventional constructor to its callers;
//! allocation produces a bare instance with default field values and the
//! registered initializer configures it in place. Capability questions that
//! a dynamic host would answer by inspecting the object ("does it declare a
//! constructor?", "which policy does it want?") are answered here by
//! associated functions, read once at registration time.

use anyhow::Result;
use async_trait::async_trait;

use crate::policy::Policy;

/// A type whose sole initialization pathway is [`crate::Registry`].
#[async_trait]
pub trait Construct: Send + Sync + Sized + 'static {
    /// Arguments accepted by the initializer. Arguments from coalesced or
    /// post-first callers are discarded, so there is no `Clone` requirement.
    type Args: Send + Sync + 'static;

    /// Produce a bare instance. No user-visible construction logic belongs
    /// here; fields carry their default values until the initializer runs.
    fn allocate() -> Self;

    /// Human-readable name used in errors and logs.
    fn label() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Policy hint declared by the construct itself. A policy set on the
    /// [`crate::Registration`] wins; when both are absent the registry's
    /// configured default applies.
    fn init_policy() -> Option<Policy> {
        None
    }

    /// Whether the type also declares a conventional constructor. Init-only
    /// and conventional construction are mutually exclusive, so registration
    /// fails when this returns `true`.
    fn conventional_constructor() -> bool {
        false
    }

    /// Optional post-allocation hook, usable as an alternative to a closure
    /// initializer via [`crate::Registration::with_post_allocate`]. Receives
    /// the caller's arguments only when the registration forwards them.
    async fn post_allocate(&mut self, args: Option<&Self::Args>) -> Result<()> {
        let _ = args;
        Ok(())
    }
}
