//! Feature-flag evaluation, injected per service instance.

use std::collections::BTreeMap;

use crate::{config::FlagRule, Result};

#[async_trait::async_trait]
pub trait FeatureFlagClient: Send + Sync {
    async fn is_feature_enabled(&self, flag: &str, environment: &str) -> Result<bool>;
}

/// Flags resolved from the `[feature_flags]` configuration table.
///
/// Unknown flags are off.
#[derive(Debug, Clone, Default)]
pub struct StaticFeatureFlags {
    rules: BTreeMap<String, FlagRule>,
}

impl StaticFeatureFlags {
    pub const fn new(rules: BTreeMap<String, FlagRule>) -> Self {
        Self { rules }
    }
}

#[async_trait::async_trait]
impl FeatureFlagClient for StaticFeatureFlags {
    async fn is_feature_enabled(&self, flag: &str, environment: &str) -> Result<bool> {
        let enabled = self.rules.get(flag).is_some_and(|rule| {
            rule.enabled
                && (rule.environments.is_empty()
                    || rule.environments.iter().any(|env| env == environment))
        });
        tracing::debug!(flag, environment, enabled, "feature flag evaluated");
        Ok(enabled)
    }
}
