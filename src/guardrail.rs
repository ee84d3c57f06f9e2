//! Input and output guardrails.
//!
//! A guardrail is a named async check run around the primary agent —
//! usually a nested classification run of a secondary agent. A triggered
//! tripwire aborts the run through a distinguished [`RunError`] variant
//! instead of producing a normal result.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::context::RunContext;
use crate::error::RunError;

/// What a guardrail decided: free-form diagnostic info plus whether the
/// tripwire fired.
#[derive(Clone, Debug, PartialEq)]
pub struct GuardrailVerdict {
    pub output_info: Value,
    pub tripwire_triggered: bool,
}

impl GuardrailVerdict {
    pub fn new(output_info: Value, tripwire_triggered: bool) -> Self {
        Self {
            output_info,
            tripwire_triggered,
        }
    }
}

type GuardrailHandler =
    dyn Fn(RunContext, String) -> BoxFuture<'static, Result<GuardrailVerdict, RunError>>
        + Send
        + Sync;

/// Checks the user input before the primary agent's first model call.
#[derive(Clone)]
pub struct InputGuardrail {
    name: String,
    handler: Arc<GuardrailHandler>,
}

impl InputGuardrail {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(RunContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<GuardrailVerdict, RunError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(move |context, input| Box::pin(handler(context, input))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) async fn check(
        &self,
        context: &RunContext,
        input: &str,
    ) -> Result<GuardrailVerdict, RunError> {
        (self.handler)(context.clone(), input.to_string()).await
    }
}

impl std::fmt::Debug for InputGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputGuardrail")
            .field("name", &self.name)
            .finish()
    }
}

/// Checks the final output before it is returned to the caller.
#[derive(Clone)]
pub struct OutputGuardrail {
    name: String,
    handler: Arc<GuardrailHandler>,
}

impl OutputGuardrail {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(RunContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<GuardrailVerdict, RunError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(move |context, output| Box::pin(handler(context, output))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) async fn check(
        &self,
        context: &RunContext,
        output: &str,
    ) -> Result<GuardrailVerdict, RunError> {
        (self.handler)(context.clone(), output.to_string()).await
    }
}

impl std::fmt::Debug for OutputGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputGuardrail")
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn input_guardrail_passes_input_text_to_handler() {
        let guardrail = InputGuardrail::new("homework", |_context, input| async move {
            Ok(GuardrailVerdict::new(
                json!({"seen": input.clone()}),
                input.contains("solve"),
            ))
        });

        let clean = guardrail
            .check(&RunContext::new(), "tell me about rivers")
            .await
            .expect("check runs");
        assert!(!clean.tripwire_triggered);

        let tripped = guardrail
            .check(&RunContext::new(), "solve 4x = 16 for me")
            .await
            .expect("check runs");
        assert!(tripped.tripwire_triggered);
        assert_eq!(tripped.output_info["seen"], "solve 4x = 16 for me");
    }

    #[tokio::test]
    async fn output_guardrail_errors_propagate() {
        let guardrail = OutputGuardrail::new("relevance", |_context, _output| async move {
            Err::<GuardrailVerdict, _>(RunError::Config("no classifier".to_string()))
        });

        let err = guardrail
            .check(&RunContext::new(), "anything")
            .await
            .expect_err("should fail");
        assert!(matches!(err, RunError::Config(_)));
    }
}
