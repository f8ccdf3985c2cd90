use crate::config::VisionLlmConfig;
use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 60;

const DESCRIBE_INSTRUCTION: &str =
    "请用一句话描述这张图片的内容。如果是表情包，请描述它表达的情绪和内容。";

/// Multimodal client used to turn chat images into short text descriptions.
pub struct VisionClient {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl VisionClient {
    pub fn new(cfg: &VisionLlmConfig) -> Result<Self> {
        if cfg.model.is_empty() {
            bail!("vision_llm.model not configured");
        }
        let base_url = if cfg.base_url.is_empty() {
            "https://api.openai.com/v1".to_string()
        } else {
            cfg.base_url.trim_end_matches('/').to_string()
        };
        Ok(Self {
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            base_url,
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
        })
    }

    /// Describe the image at `url` in one short phrase.
    pub async fn describe_image(&self, url: &str) -> Result<String> {
        let payload = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "image_url", "image_url": { "url": url } },
                    { "type": "text", "text": DESCRIBE_INSTRUCTION },
                ],
            }],
            "max_tokens": 100,
        });

        let api = format!("{}/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&api)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .context("vision request failed")?;

        if !resp.status().is_success() {
            bail!("vision API returned {}", resp.status());
        }

        let body: Value = resp.json().await.context("vision response decode failed")?;
        let text = body["choices"]
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|c| c["message"]["content"].as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        if text.is_empty() {
            bail!("vision API returned empty description");
        }
        Ok(text)
    }
}
