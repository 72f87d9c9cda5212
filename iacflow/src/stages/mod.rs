//! The stage adapter seam.
//!
//! A [`StageAdapter`] is the only thing the orchestrator calls. Concrete
//! tool adapters live in [`crate::adapters`]; tests use the mocks in
//! [`crate::testing`].

mod context;

pub use context::StageContext;

use crate::core::AdapterOutput;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for the external work behind a stage.
#[async_trait]
pub trait StageAdapter: Send + Sync + Debug {
    /// Returns the adapter kind (e.g., "terraform-plan").
    fn kind(&self) -> &str;

    /// Returns the pinned tool version, if any.
    fn version(&self) -> Option<&str> {
        None
    }

    /// Runs the stage.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Resolved inputs, declared upstream artifacts and secrets
    ///
    /// # Returns
    ///
    /// The adapter output. Failures are values, not errors: the orchestrator
    /// applies the stage's failure policy to them.
    async fn execute(&self, ctx: &StageContext<'_>) -> AdapterOutput;
}

/// A synchronous closure-backed adapter.
pub struct FnAdapter<F>
where
    F: Fn(&StageContext<'_>) -> AdapterOutput + Send + Sync,
{
    kind: String,
    func: F,
}

impl<F> FnAdapter<F>
where
    F: Fn(&StageContext<'_>) -> AdapterOutput + Send + Sync,
{
    /// Creates a new closure-backed adapter.
    pub fn new(kind: impl Into<String>, func: F) -> Self {
        Self {
            kind: kind.into(),
            func,
        }
    }
}

impl<F> Debug for FnAdapter<F>
where
    F: Fn(&StageContext<'_>) -> AdapterOutput + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAdapter").field("kind", &self.kind).finish()
    }
}

#[async_trait]
impl<F> StageAdapter for FnAdapter<F>
where
    F: Fn(&StageContext<'_>) -> AdapterOutput + Send + Sync,
{
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> AdapterOutput {
        (self.func)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentialProvider;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_fn_adapter() {
        let adapter = FnAdapter::new("echo", |ctx: &StageContext<'_>| {
            AdapterOutput::with_artifact_value(serde_json::json!({ "stage": ctx.stage() }))
        });
        assert_eq!(adapter.kind(), "echo");
        assert!(adapter.version().is_none());

        let inputs = BTreeMap::new();
        let credentials = StaticCredentialProvider::new();
        let ctx = StageContext::new("plan", "dev", &inputs, &credentials);
        let output = adapter.execute(&ctx).await;

        assert!(output.is_success());
        assert_eq!(output.artifact, Some(serde_json::json!({"stage": "plan"})));
    }
}
