// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the init pathway.
//!
//! Every contract violation is raised synchronously at the offending call;
//! there is no silent fallback. Initializer failures are wrapped in
//! [InitFailure], which is cloneable so that a single failed attempt can be
//! delivered to every caller sharing the in-flight handle.

use std::sync::Arc;

use thiserror::Error;

/// Errors raised by [`crate::Registry`] operations.
#[derive(Debug, Error)]
pub enum InitError {
    /// The registration itself is invalid: the construct declares a
    /// conventional constructor alongside an initializer, no initializer was
    /// supplied, the construct is already registered, or `reset` was called
    /// under a policy other than `reinit`.
    #[error("invalid configuration for `{construct}`: {reason}")]
    Configuration {
        construct: &'static str,
        reason: String,
    },

    /// The wrong pathway was used: conventional construction on an init-only
    /// construct, or the init pathway on an unregistered construct.
    #[error("`{construct}`: {reason}")]
    Usage {
        construct: &'static str,
        reason: String,
    },

    /// A second initialization was requested within the current generation
    /// under the `strict` policy (or `reinit` without an intervening reset).
    #[error("`{construct}` is already initialized in this generation")]
    Reinitialization { construct: &'static str },

    /// The instance accessor was used before any successful initialization.
    #[error("`{construct}` has not been initialized")]
    Uninitialized { construct: &'static str },

    /// The initializer itself failed.
    #[error(transparent)]
    Failed(#[from] InitFailure),
}

/// A failed initialization attempt, shared verbatim with every waiter that
/// was coalesced onto the attempt.
#[derive(Debug, Clone, Error)]
#[error("initializer failed: {0:#}")]
pub struct InitFailure(Arc<anyhow::Error>);

impl InitFailure {
    pub(crate) fn new(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }

    /// The underlying initializer error.
    pub fn cause(&self) -> &anyhow::Error {
        &self.0
    }
}
