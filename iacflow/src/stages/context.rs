//! Per-stage execution context.

use crate::core::{Artifact, ArtifactInput};
use crate::credentials::{resolve_all, CredentialProvider, SecretValue};
use std::collections::BTreeMap;
use std::time::Duration;

/// What an adapter sees while it runs.
///
/// The context only exposes the artifacts the stage declared it consumes,
/// in declaration order; any other stage's artifact reads as absent.
pub struct StageContext<'a> {
    stage: &'a str,
    environment: &'a str,
    inputs: &'a BTreeMap<String, String>,
    artifacts: Vec<(&'a str, Option<&'a Artifact>)>,
    secret_names: &'a [String],
    credentials: &'a dyn CredentialProvider,
    timeout: Option<Duration>,
}

impl<'a> StageContext<'a> {
    /// Creates a context with no artifacts, secrets or timeout.
    #[must_use]
    pub fn new(
        stage: &'a str,
        environment: &'a str,
        inputs: &'a BTreeMap<String, String>,
        credentials: &'a dyn CredentialProvider,
    ) -> Self {
        Self {
            stage,
            environment,
            inputs,
            artifacts: Vec::new(),
            secret_names: &[],
            credentials,
            timeout: None,
        }
    }

    /// Declares an upstream artifact slot. `None` means the producer did not
    /// record anything. Declaring the same producer again replaces its slot.
    #[must_use]
    pub fn with_artifact(mut self, producer: &'a str, artifact: Option<&'a Artifact>) -> Self {
        match self.artifacts.iter_mut().find(|(name, _)| *name == producer) {
            Some(slot) => slot.1 = artifact,
            None => self.artifacts.push((producer, artifact)),
        }
        self
    }

    /// Sets the declared secret names.
    #[must_use]
    pub fn with_secret_names(mut self, names: &'a [String]) -> Self {
        self.secret_names = names;
        self
    }

    /// Sets the stage timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage(&self) -> &str {
        self.stage
    }

    /// Returns the target environment.
    #[must_use]
    pub fn environment(&self) -> &str {
        self.environment
    }

    /// Returns all stage inputs.
    #[must_use]
    pub fn inputs(&self) -> &BTreeMap<String, String> {
        self.inputs
    }

    /// Returns one input value.
    #[must_use]
    pub fn input(&self, key: &str) -> Option<&str> {
        self.inputs.get(key).map(String::as_str)
    }

    /// Returns the artifact produced by `producer`.
    ///
    /// Undeclared producers and producers that recorded nothing both read as
    /// [`ArtifactInput::Absent`].
    #[must_use]
    pub fn artifact(&self, producer: &str) -> ArtifactInput<'a> {
        self.artifacts
            .iter()
            .find(|(name, _)| *name == producer)
            .and_then(|(_, artifact)| *artifact)
            .into()
    }

    /// Returns the first available artifact among the declared producers,
    /// in declaration order.
    #[must_use]
    pub fn first_artifact(&self) -> ArtifactInput<'a> {
        self.artifacts.iter().find_map(|(_, a)| *a).into()
    }

    /// Returns the declared producers, in declaration order.
    #[must_use]
    pub fn declared_producers(&self) -> Vec<&'a str> {
        self.artifacts.iter().map(|(name, _)| *name).collect()
    }

    /// Returns the stage timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the declared secret names.
    #[must_use]
    pub fn secret_names(&self) -> &[String] {
        self.secret_names
    }

    /// Resolves the declared secrets.
    ///
    /// # Errors
    ///
    /// Returns the list of names the provider could not resolve.
    pub fn resolve_secrets(&self) -> Result<Vec<(String, SecretValue)>, Vec<String>> {
        let (resolved, missing) = resolve_all(self.credentials, self.secret_names);
        if missing.is_empty() {
            Ok(resolved)
        } else {
            Err(missing)
        }
    }

    /// Returns template variables: every input plus `environment`.
    #[must_use]
    pub fn tool_vars(&self) -> BTreeMap<String, String> {
        let mut vars = self.inputs.clone();
        vars.entry("environment".to_string())
            .or_insert_with(|| self.environment.to_string());
        vars
    }
}

impl std::fmt::Debug for StageContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("stage", &self.stage)
            .field("environment", &self.environment)
            .field("inputs", &self.inputs)
            .field("artifacts", &self.declared_producers())
            .field("secret_names", &self.secret_names)
            .field("timeout", &self.timeout)
            .finish()
    }
}
