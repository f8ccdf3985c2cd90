use crate::config::LlmConfig;
use crate::errors::MurmurError;
use crate::providers::base::{ChatRequest, LLMProvider, LLMResponse, ToolCallRequest};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// OpenAI-compatible chat-completions client with function tools.
pub struct OpenAiProvider {
    api_key: String,
    default_model: String,
    base_url: String,
    extra_fields: std::collections::HashMap<String, Value>,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(cfg: &LlmConfig) -> Self {
        let base_url = if cfg.base_url.is_empty() {
            "https://api.openai.com/v1".to_string()
        } else {
            cfg.base_url.trim_end_matches('/').to_string()
        };
        Self {
            api_key: cfg.api_key.clone(),
            default_model: cfg.model.clone(),
            base_url,
            extra_fields: cfg.extra_fields.clone(),
            client: Client::builder()
                .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn parse_response(json: &Value) -> Result<LLMResponse> {
        let choice = json["choices"]
            .as_array()
            .and_then(|arr| arr.first())
            .context("no choices in chat response")?;

        let message = &choice["message"];
        let content = message["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(std::string::ToString::to_string);

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for tc in calls {
                if let Some(function) = tc["function"].as_object() {
                    let arguments = function["arguments"]
                        .as_str()
                        .and_then(|s| serde_json::from_str(s).ok())
                        .unwrap_or_else(|| json!({}));
                    tool_calls.push(ToolCallRequest {
                        id: tc["id"].as_str().unwrap_or("").to_string(),
                        name: function["name"].as_str().unwrap_or("").to_string(),
                        arguments,
                    });
                }
            }
        }

        Ok(LLMResponse { content, tool_calls })
    }
}

#[async_trait]
impl LLMProvider for OpenAiProvider {
    async fn chat(&self, req: ChatRequest<'_>) -> Result<LLMResponse> {
        let messages: Vec<Value> = req
            .messages
            .into_iter()
            .map(|msg| {
                let mut m = json!({ "role": msg.role, "content": msg.content });
                if let Some(tool_calls) = msg.tool_calls {
                    m["tool_calls"] = json!(
                        tool_calls
                            .into_iter()
                            .map(|tc| {
                                let args = serde_json::to_string(&tc.arguments)
                                    .unwrap_or_else(|_| "{}".to_string());
                                json!({
                                    "id": tc.id,
                                    "type": "function",
                                    "function": { "name": tc.name, "arguments": args },
                                })
                            })
                            .collect::<Vec<_>>()
                    );
                }
                if let Some(tool_call_id) = msg.tool_call_id {
                    m["tool_call_id"] = json!(tool_call_id);
                }
                m
            })
            .collect();

        let mut payload = json!({
            "model": req.model.unwrap_or(&self.default_model),
            "messages": messages,
        });
        if let Some(tools) = req.tools {
            payload["tools"] = json!(
                tools
                    .into_iter()
                    .map(|t| json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        },
                    }))
                    .collect::<Vec<_>>()
            );
        }
        for (key, value) in &self.extra_fields {
            payload[key] = value.clone();
        }

        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .context("chat request failed to send")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            // 4xx other than 429 will not get better on retry
            let retryable = status.as_u16() == 429 || status.is_server_error();
            return Err(MurmurError::Provider {
                message: format!("chat API returned {}: {}", status, body),
                retryable,
            }
            .into());
        }

        let json: Value = resp.json().await.context("chat response decode failed")?;
        Self::parse_response(&json)
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_calls_and_content() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": "",
                    "tool_calls": [{
                        "id": "call_1",
                        "function": { "name": "speak", "arguments": "{\"content\":\"hi\"}" },
                    }],
                },
            }],
        });
        let resp = OpenAiProvider::parse_response(&body).unwrap();
        assert!(resp.content.is_none());
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "speak");
        assert_eq!(resp.tool_calls[0].arguments["content"], "hi");
    }

    #[test]
    fn malformed_arguments_degrade_to_empty_object() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_2",
                        "function": { "name": "stayQuiet", "arguments": "{oops" },
                    }],
                },
            }],
        });
        let resp = OpenAiProvider::parse_response(&body).unwrap();
        assert_eq!(resp.tool_calls[0].arguments, json!({}));
    }

    #[test]
    fn empty_choices_is_an_error() {
        assert!(OpenAiProvider::parse_response(&json!({ "choices": [] })).is_err());
    }
}
