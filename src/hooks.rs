//! Lifecycle hooks observed by the run loop.

use async_trait::async_trait;

use crate::agent::Agent;
use crate::context::RunContext;

/// Callbacks fired at the run loop's lifecycle points. All methods
/// default to no-ops; implement the ones you care about.
#[async_trait]
pub trait AgentHooks: Send + Sync {
    /// Called when an agent becomes current: at run start and again
    /// after each handoff, before its first model call.
    async fn on_start(&self, _context: &RunContext, _agent: &Agent) {}

    /// Called with the agent's final output, after output guardrails
    /// have passed.
    async fn on_end(&self, _context: &RunContext, _agent: &Agent, _output: &str) {}

    async fn on_tool_start(&self, _context: &RunContext, _agent: &Agent, _tool: &str) {}

    async fn on_tool_end(&self, _context: &RunContext, _agent: &Agent, _tool: &str, _result: &str) {
    }

    /// Called when `from` hands the conversation off to `to`.
    async fn on_handoff(&self, _context: &RunContext, _from: &Agent, _to: &Agent) {}
}
