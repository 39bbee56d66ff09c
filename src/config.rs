// SPDX-License-Identifier: Apache-2.0

use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::policy::{ArgForwarding, Policy};

/// Environment variable prefix for registry settings, e.g.
/// `INIT_REGISTRY_DEFAULT_POLICY=strict`.
pub const ENV_PREFIX: &str = "INIT_REGISTRY_";

/// Ambient defaults applied to registrations that do not choose their own
/// policy or argument forwarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Policy used when neither the registration nor the construct declares
    /// one.
    pub default_policy: Policy,
    /// Whether `request_init` arguments reach the post-allocation hook by
    /// default.
    pub default_forwarding: ArgForwarding,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_policy: Policy::ReturnFirst,
            default_forwarding: ArgForwarding::Forward,
        }
    }
}

impl RegistryConfig {
    /// Read settings from the environment, falling back to the defaults
    /// above. Panics on invalid settings.
    pub fn from_settings() -> Self {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .unwrap() // safety: resolved at registry construction; bad settings should fail fast
    }
}
