// SPDX-License-Identifier: Apache-2.0

//! Exactly-once construct-and-initialize semantics for init-only constructs.
//!
//! An *init-only construct* is a type whose sole initialization pathway is a
//! [Registry]: callers never construct it conventionally. Instead they call
//! [`Registry::request_init`], which allocates a bare instance, runs the
//! registered initializer exactly once per generation, and memoizes the
//! completed instance. Concurrent callers arriving while an asynchronous
//! initializer is still running all receive the same pending handle
//! (single-flight), so the initializer body executes once no matter how many
//! callers race for it.
//!
//! What happens when initialization is requested *again* after an instance
//! already exists is governed by a [Policy]:
//!
//! - `return-first`: the memoized instance is returned, later arguments are
//!   ignored;
//! - `strict`: the call fails with [`InitError::Reinitialization`];
//! - `reinit`: a new generation can be started, but only through an explicit
//!   [`Registry::reset`].
//!
//! Failed initialization attempts never poison a construct: the failure is
//! propagated to every coalesced waiter and the next request starts fresh.

pub use anyhow::{Context as ErrorContext, Error, Result};
pub use async_trait::async_trait;
pub use futures::future::BoxFuture;

mod config;
pub use config::RegistryConfig;

pub mod construct;
pub mod error;
pub mod logging;
pub mod policy;
pub mod registration;
pub mod registry;
pub mod slot;

pub use construct::Construct;
pub use error::{InitError, InitFailure};
pub use policy::{ArgForwarding, Policy};
pub use registration::Registration;
pub use registry::Registry;
pub use slot::{InitOutcome, PendingInit};
