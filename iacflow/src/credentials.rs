//! Secret resolution for stage adapters.
//!
//! The orchestrator only forwards secret *names* declared on a stage.
//! Adapters resolve them through a [`CredentialProvider`] and inject the
//! values into the tool process environment.

use std::collections::HashMap;
use std::fmt;

/// A secret value that never prints its content.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    /// Wraps a secret.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Exposes the secret for injection into a child process.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Supplies secrets by name.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialProvider: Send + Sync {
    /// Resolves a declared secret name.
    fn resolve(&self, name: &str) -> Option<SecretValue>;
}

/// Reads secrets from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialProvider;

impl CredentialProvider for EnvCredentialProvider {
    fn resolve(&self, name: &str) -> Option<SecretValue> {
        std::env::var(name).ok().map(SecretValue::new)
    }
}

/// Serves secrets from a fixed map.
#[derive(Default)]
pub struct StaticCredentialProvider {
    secrets: HashMap<String, SecretValue>,
}

impl StaticCredentialProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a secret.
    #[must_use]
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), SecretValue::new(value));
        self
    }
}

impl fmt::Debug for StaticCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.secrets.keys().collect();
        names.sort();
        f.debug_struct("StaticCredentialProvider")
            .field("names", &names)
            .finish()
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn resolve(&self, name: &str) -> Option<SecretValue> {
        self.secrets.get(name).cloned()
    }
}

/// Resolves every name in `names`, returning `(name, value)` pairs and the
/// names that could not be resolved.
pub fn resolve_all<'a>(
    provider: &dyn CredentialProvider,
    names: impl IntoIterator<Item = &'a String>,
) -> (Vec<(String, SecretValue)>, Vec<String>) {
    let mut resolved = Vec::new();
    let mut missing = Vec::new();
    for name in names {
        match provider.resolve(name) {
            Some(value) => resolved.push((name.clone(), value)),
            None => missing.push(name.clone()),
        }
    }
    (resolved, missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_value_redacted() {
        let secret = SecretValue::new("hunter2");
        assert_eq!(format!("{secret:?}"), "SecretValue(***)");
        assert_eq!(secret.to_string(), "***");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_static_provider_debug_hides_values() {
        let provider = StaticCredentialProvider::new().with_secret("ARM_CLIENT_SECRET", "s3cr3t");
        let debug = format!("{provider:?}");
        assert!(debug.contains("ARM_CLIENT_SECRET"));
        assert!(!debug.contains("s3cr3t"));
    }

    #[test]
    fn test_resolve_all_with_mock() {
        let mut provider = MockCredentialProvider::new();
        provider
            .expect_resolve()
            .withf(|name| name == "INFRACOST_API_KEY")
            .times(1)
            .returning(|_| Some(SecretValue::new("ico-123")));
        provider
            .expect_resolve()
            .withf(|name| name == "MISSING")
            .times(1)
            .returning(|_| None);

        let names = vec!["INFRACOST_API_KEY".to_string(), "MISSING".to_string()];
        let (resolved, missing) = resolve_all(&provider, &names);

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].0, "INFRACOST_API_KEY");
        assert_eq!(resolved[0].1.expose(), "ico-123");
        assert_eq!(missing, vec!["MISSING".to_string()]);
    }
}
