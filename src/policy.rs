// SPDX-License-Identifier: Apache-2.0

//! Reinitialization policy and argument-forwarding knobs.

use serde::{Deserialize, Serialize};

/// What happens when initialization is requested after an instance already
/// exists for the current generation.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Policy {
    /// Return the memoized instance; later arguments are ignored.
    #[default]
    ReturnFirst,
    /// Exactly one initialization per generation; later requests fail.
    Strict,
    /// Like `strict`, except an explicit [`crate::Registry::reset`] may start
    /// a new generation.
    Reinit,
}

/// Whether `request_init` arguments are forwarded to the post-allocation
/// hook when the hook is the registered initializer.
///
/// Left configurable rather than hard-coded; the library default is
/// [`ArgForwarding::Forward`].
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ArgForwarding {
    /// The hook receives `Some(&args)`.
    #[default]
    Forward,
    /// The hook receives `None`; arguments are dropped at the registry
    /// boundary.
    Withhold,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn policy_string_round_trip() {
        for policy in [Policy::ReturnFirst, Policy::Strict, Policy::Reinit] {
            assert_eq!(Policy::from_str(&policy.to_string()).unwrap(), policy);
        }
        assert_eq!(Policy::from_str("return-first").unwrap(), Policy::ReturnFirst);
        assert!(Policy::from_str("return_first").is_err());
    }

    #[test]
    fn policy_serde_uses_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Policy::ReturnFirst).unwrap(),
            "\"return-first\""
        );
        let parsed: Policy = serde_json::from_str("\"reinit\"").unwrap();
        assert_eq!(parsed, Policy::Reinit);
    }

    #[test]
    fn forwarding_defaults_to_forward() {
        assert_eq!(ArgForwarding::default(), ArgForwarding::Forward);
    }
}
