//! Generator/evaluator feedback loop.
//!
//! A generator agent drafts, an evaluator agent scores the conversation
//! with a structured [`ReviewFeedback`], and on anything but a `pass`
//! verdict the feedback text is appended verbatim and the draft is
//! regenerated. The retry ceiling is a policy the caller states
//! explicitly through [`ReviewPolicy`] rather than something buried in
//! evaluator instructions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agent::Agent;
use crate::context::RunContext;
use crate::error::RunError;
use crate::llm::ModelMessage;
use crate::output::OutputSchema;
use crate::runner::{RunInput, Runner};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Pass,
    NeedsImprovement,
    Fail,
}

/// The evaluator's structured answer.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReviewFeedback {
    pub feedback: String,
    pub verdict: ReviewVerdict,
}

impl ReviewFeedback {
    /// Output schema to declare on the evaluator agent.
    pub fn output_schema() -> OutputSchema {
        OutputSchema::new(
            "review_feedback",
            json!({
                "type": "object",
                "properties": {
                    "feedback": {"type": "string"},
                    "verdict": {
                        "type": "string",
                        "enum": ["pass", "needs_improvement", "fail"]
                    }
                },
                "required": ["feedback", "verdict"],
                "additionalProperties": false
            }),
        )
        .expect("review feedback schema is a valid object schema")
    }
}

/// How long to keep regenerating. `None` loops until the evaluator
/// passes the draft; `Some(n)` stops after `n` drafts and returns the
/// latest one with the evaluator's verdict.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReviewPolicy {
    pub max_attempts: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct ReviewOutcome {
    pub draft: String,
    pub verdict: ReviewVerdict,
    pub attempts: u32,
}

/// Drives the generate/evaluate/regenerate loop.
pub async fn run_review_loop(
    runner: &Runner,
    generator: &Arc<Agent>,
    evaluator: &Arc<Agent>,
    request: impl Into<String>,
    context: &RunContext,
    policy: ReviewPolicy,
) -> Result<ReviewOutcome, RunError> {
    let mut inputs = vec![ModelMessage::User(request.into())];
    let mut attempts = 0;

    loop {
        attempts += 1;

        let generated = runner
            .run(generator, RunInput::Messages(inputs.clone()), context)
            .await?;
        inputs = generated.to_input_list();
        let draft = generated.final_output().to_string();

        let reviewed = runner
            .run(evaluator, RunInput::Messages(inputs.clone()), context)
            .await?;
        let feedback: ReviewFeedback = reviewed.final_output_as()?;

        tracing::debug!(attempts, verdict = ?feedback.verdict, "review verdict");

        if feedback.verdict == ReviewVerdict::Pass {
            return Ok(ReviewOutcome {
                draft,
                verdict: ReviewVerdict::Pass,
                attempts,
            });
        }

        if let Some(max_attempts) = policy.max_attempts
            && attempts >= max_attempts
        {
            return Ok(ReviewOutcome {
                draft,
                verdict: feedback.verdict,
                attempts,
            });
        }

        // Appended verbatim so the generator sees exactly what the
        // evaluator wrote.
        inputs.push(ModelMessage::User(format!(
            "feedback: {}",
            feedback.feedback
        )));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::ProviderError;
    use crate::llm::{ChatModel, ModelCompletion, ModelRequest};

    struct ScriptedModel {
        responses: Mutex<VecDeque<String>>,
        requests: Mutex<Vec<Vec<ModelMessage>>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<&str>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(
                    responses.into_iter().map(|text| text.to_string()).collect(),
                ),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn request_messages(&self, index: usize) -> Vec<ModelMessage> {
            self.requests.lock().expect("lock poisoned")[index].clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn invoke(
            &self,
            request: ModelRequest<'_>,
        ) -> Result<ModelCompletion, ProviderError> {
            self.requests
                .lock()
                .expect("lock poisoned")
                .push(request.messages.to_vec());

            let text = self
                .responses
                .lock()
                .expect("lock poisoned")
                .pop_front()
                .ok_or_else(|| ProviderError::Response("scripted model exhausted".to_string()))?;

            Ok(ModelCompletion {
                text: Some(text),
                ..ModelCompletion::default()
            })
        }
    }

    fn generator(model: Arc<ScriptedModel>) -> Arc<Agent> {
        Arc::new(
            Agent::builder("story_outline_generator")
                .instructions(
                    "you generate a very short story outline based on the user's input; \
                     if there is any feedback provided, use it to improve the outline",
                )
                .shared_model(model as Arc<dyn ChatModel>)
                .build()
                .expect("agent builds"),
        )
    }

    fn evaluator(model: Arc<ScriptedModel>) -> Arc<Agent> {
        Arc::new(
            Agent::builder("evaluator")
                .instructions("you evaluate a story outline and decide if it is good enough")
                .shared_model(model as Arc<dyn ChatModel>)
                .output_schema(ReviewFeedback::output_schema())
                .build()
                .expect("agent builds"),
        )
    }

    #[tokio::test]
    async fn loop_continues_past_needs_improvement_and_appends_feedback_verbatim() {
        let generator_model = ScriptedModel::new(vec!["draft one", "draft two"]);
        let evaluator_model = ScriptedModel::new(vec![
            "{\"feedback\": \"add a dragon\", \"verdict\": \"needs_improvement\"}",
            "{\"feedback\": \"good enough\", \"verdict\": \"pass\"}",
        ]);

        let outcome = run_review_loop(
            &Runner::default(),
            &generator(generator_model.clone()),
            &evaluator(evaluator_model.clone()),
            "a bedtime story",
            &RunContext::new(),
            ReviewPolicy::default(),
        )
        .await
        .expect("loop completes");

        assert_eq!(outcome.verdict, ReviewVerdict::Pass);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.draft, "draft two");

        // The second generation request ends with the evaluator's
        // feedback, appended verbatim.
        let second_request = generator_model.request_messages(1);
        assert_eq!(
            second_request.last(),
            Some(&ModelMessage::User("feedback: add a dragon".to_string()))
        );
    }

    #[tokio::test]
    async fn explicit_attempt_cap_stops_the_loop() {
        let generator_model = ScriptedModel::new(vec!["draft one", "draft two"]);
        let evaluator_model = ScriptedModel::new(vec![
            "{\"feedback\": \"flat characters\", \"verdict\": \"needs_improvement\"}",
            "{\"feedback\": \"still flat\", \"verdict\": \"fail\"}",
        ]);

        let outcome = run_review_loop(
            &Runner::default(),
            &generator(generator_model.clone()),
            &evaluator(evaluator_model.clone()),
            "a noir mystery",
            &RunContext::new(),
            ReviewPolicy {
                max_attempts: Some(2),
            },
        )
        .await
        .expect("loop completes");

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.verdict, ReviewVerdict::Fail);
        assert_eq!(outcome.draft, "draft two");
    }
}
