use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::event::EventFields;
use crate::extract::{EventExtractor, build_prompt, parse_model_output};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Talks to a local `ollama serve` over its HTTP API.
pub struct OllamaExtractor {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaExtractor {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let resp: GenerateResponse = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .with_context(|| format!("POST {url}"))?
            .error_for_status()?
            .json()?;
        Ok(resp.response)
    }
}

impl EventExtractor for OllamaExtractor {
    fn extract(&self, subject: &str, body: &str) -> Result<Option<EventFields>> {
        let output = self.generate(&build_prompt(subject, body))?;
        log::debug!("model reply: {output}");
        Ok(parse_model_output(&output))
    }
}
