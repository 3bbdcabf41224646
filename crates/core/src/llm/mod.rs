pub mod error;
pub mod json;
pub mod openai;
pub mod schema;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::llm::schema::SchemaDef;

#[derive(Debug, Clone, Copy)]
pub enum Provider {
    OpenAi,
}

/// One schema-constrained generation: system prompt, the subject
/// identifier echoed to the model, and a context document serialized
/// into the user turn.
#[derive(Debug, Clone)]
pub struct AgentTask {
    pub schema: SchemaDef,
    pub system_prompt: &'static str,
    pub subject: String,
    pub context: Value,
}

#[async_trait::async_trait]
pub trait AgentClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Runs the task and returns the parsed JSON payload. Unparseable
    /// output fails immediately; there is no retry at this layer.
    async fn run_agent(&self, task: AgentTask) -> anyhow::Result<Value>;
}

/// Typed wrapper over [`AgentClient::run_agent`].
pub async fn run_structured<T: DeserializeOwned>(
    client: &dyn AgentClient,
    task: AgentTask,
) -> anyhow::Result<T> {
    let schema_name = task.schema.name;
    let payload = client.run_agent(task).await?;
    serde_json::from_value(payload)
        .with_context(|| format!("agent payload does not match {schema_name}"))
}
