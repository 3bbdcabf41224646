use crate::config::Settings;
use crate::llm::error::AgentError;
use crate::llm::{AgentClient, AgentTask, Provider};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const INPUT_TEXT_TYPE: &str = "input_text";
const OUTPUT_TEXT_TYPE: &str = "output_text";

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_openai_api_key()?.to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url: settings.openai_base_url.trim_end_matches('/').to_string(),
            model: settings.openai_model.clone(),
        })
    }

    async fn create_response(&self, req: CreateResponseRequest) -> anyhow::Result<Value> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );

        let url = format!("{}/v1/responses", self.base_url);
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .context("OpenAI request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read OpenAI response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<Value>(&text).ok();
            return Err(AgentError {
                provider: Provider::OpenAi,
                stage: "http",
                detail: format!("status={status}"),
                status: Some(status.as_u16()),
                raw_output: Some(text),
                raw_response_json,
            }
            .into());
        }

        serde_json::from_str::<Value>(&text)
            .with_context(|| format!("failed to parse OpenAI response JSON: {text}"))
    }

    fn build_request(&self, task: &AgentTask) -> CreateResponseRequest {
        CreateResponseRequest {
            model: self.model.clone(),
            input: vec![
                InputMessage {
                    role: "system",
                    content: vec![ContentPart {
                        kind: INPUT_TEXT_TYPE,
                        text: task.system_prompt.to_string(),
                    }],
                },
                InputMessage {
                    role: "user",
                    content: vec![ContentPart {
                        kind: INPUT_TEXT_TYPE,
                        text: Self::user_prompt(task),
                    }],
                },
            ],
            text: TextOptions {
                format: TextFormat {
                    kind: "json_schema",
                    name: task.schema.name,
                    schema: task.schema.schema.clone(),
                    strict: true,
                },
            },
        }
    }

    fn user_prompt(task: &AgentTask) -> String {
        let context =
            serde_json::to_string_pretty(&task.context).unwrap_or_else(|_| task.context.to_string());
        format!(
            "회사 식별자: {}\n\n아래는 참고용 데이터(JSON)입니다.\n\n{context}",
            task.subject
        )
    }

    /// Pulls the single text payload out of a Responses API envelope:
    /// the convenience `output_text` field when present, otherwise the
    /// first `output_text` content block.
    fn response_text(raw: &Value) -> Option<String> {
        if let Some(text) = raw.get("output_text").and_then(Value::as_str) {
            return Some(text.to_string());
        }

        let output = raw.get("output")?.as_array()?;
        for item in output {
            let content = match item.get("content").and_then(Value::as_array) {
                Some(content) => content,
                None => continue,
            };
            for block in content {
                if block.get("type").and_then(Value::as_str) == Some(OUTPUT_TEXT_TYPE) {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        return Some(text.to_string());
                    }
                }
            }
        }
        None
    }
}

#[async_trait::async_trait]
impl AgentClient for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn run_agent(&self, task: AgentTask) -> anyhow::Result<Value> {
        let schema_name = task.schema.name;
        let raw = self.create_response(self.build_request(&task)).await?;

        let text = match Self::response_text(&raw) {
            Some(text) => text,
            None => {
                return Err(AgentError {
                    provider: Provider::OpenAi,
                    stage: "extract",
                    detail: format!("no output_text block in {schema_name} response"),
                    status: None,
                    raw_output: None,
                    raw_response_json: Some(raw),
                }
                .into());
            }
        };

        match crate::llm::json::parse_payload::<Value>(&text) {
            Ok(payload) => Ok(payload),
            Err(err) => Err(AgentError {
                provider: Provider::OpenAi,
                stage: "parse",
                detail: format!("{schema_name}: {err:#}"),
                status: None,
                raw_output: Some(text),
                raw_response_json: Some(raw),
            }
            .into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateResponseRequest {
    model: String,
    input: Vec<InputMessage>,
    text: TextOptions,
}

#[derive(Debug, Clone, Serialize)]
struct InputMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

#[derive(Debug, Clone, Serialize)]
struct TextOptions {
    format: TextFormat,
}

#[derive(Debug, Clone, Serialize)]
struct TextFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'static str,
    schema: Value,
    strict: bool,
}
