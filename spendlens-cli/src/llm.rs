use anyhow::{bail, Context, Result};
use log::debug;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use spendlens_finance::{classification_prompt, Classifier, ClassifyError};
use std::time::Duration;

use crate::config::LlmSection;

/// Chat-completions classifier for any OpenAI-compatible endpoint (Groq by default).
#[derive(Debug, Clone)]
pub struct LlmClassifier {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MsgOut,
}

#[derive(Deserialize)]
struct MsgOut {
    content: Option<String>,
}

/// Read the API key from the variable named in config; fail fast when unset.
pub fn api_key_from_env(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        Ok(_) => bail!("{var} is set but empty; export your API key or use --classifier rules"),
        Err(_) => bail!("{var} is not set; export your API key or use --classifier rules"),
    }
}

impl LlmClassifier {
    pub fn from_config(cfg: &LlmSection) -> Result<Self> {
        let api_key = api_key_from_env(&cfg.api_key_env)?;
        Self::new(cfg, api_key)
    }

    pub fn new(cfg: &LlmSection, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            model: cfg.model.clone(),
            api_key,
            temperature: cfg.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// First choice's text, trimmed; `None` when the service sent nothing usable.
fn first_choice_text(body: &str) -> Result<Option<String>, ClassifyError> {
    let out: Resp = serde_json::from_str(body)
        .map_err(|e| ClassifyError::Other(format!("parse response: {e}")))?;
    Ok(out
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

impl Classifier for LlmClassifier {
    async fn classify(&self, description: &str) -> Result<String, ClassifyError> {
        let prompt = classification_prompt(description);
        let body = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: &prompt,
            }],
            temperature: self.temperature,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(ClassifyError::Status {
                status: status.as_u16(),
                body: text.chars().take(300).collect(),
            });
        }

        let label = first_choice_text(&text)?.ok_or(ClassifyError::EmptyResponse)?;
        debug!("{} answered {:?} for {:?}", self.model, label, description);
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_choice_text() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Groceries\n"}}]}"#;
        assert_eq!(first_choice_text(body).unwrap().as_deref(), Some("Groceries"));
    }

    #[test]
    fn test_empty_choices() {
        assert_eq!(first_choice_text(r#"{"choices":[]}"#).unwrap(), None);
        let blank = r#"{"choices":[{"message":{"content":"   "}}]}"#;
        assert_eq!(first_choice_text(blank).unwrap(), None);
        let null = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert_eq!(first_choice_text(null).unwrap(), None);
    }

    #[test]
    fn test_malformed_body() {
        assert!(matches!(first_choice_text("<html>"), Err(ClassifyError::Other(_))));
    }

    #[test]
    fn test_missing_key_fails_fast() {
        let err = api_key_from_env("SPENDLENS_TEST_KEY_THAT_IS_NEVER_SET").unwrap_err();
        assert!(err.to_string().contains("SPENDLENS_TEST_KEY_THAT_IS_NEVER_SET is not set"));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let cfg = LlmSection {
            base_url: "https://example.test/v1/".to_string(),
            ..Default::default()
        };
        let c = LlmClassifier::new(&cfg, "k".to_string()).unwrap();
        assert_eq!(c.endpoint, "https://example.test/v1/chat/completions");
        assert_eq!(c.model(), "gemma2-9b-it");
    }
}
