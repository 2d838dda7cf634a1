use std::time::Duration;

use anyhow::{Result, anyhow};
use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;

// ── Completion boundary ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLimit {
    Capped(u32),
    /// No `max_tokens` sent; the service decides.
    Unbounded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub max_tokens: TokenLimit,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
}

/// Anything that can turn a prompt into text. The dispatcher only ever sees
/// this trait, so tests can swap in an in-process fake.
pub trait Completer: Send + Sync {
    fn complete(&self, prompt: Prompt) -> BoxFuture<'_, Result<Completion>>;
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

// ── Client ────────────────────────────────────────────────────────────────────

/// OpenAI-compatible chat completions over HTTP.
pub struct Client {
    http: reqwest::Client,
    pub endpoint: String,
    pub model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl Client {
    pub fn new(endpoint: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            model,
            api_key: None,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn set_api_key(&mut self, key: String) {
        if !key.is_empty() {
            self.api_key = Some(key);
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    async fn chat(&self, prompt: Prompt) -> Result<Completion> {
        let body = build_body(&self.model, &prompt);

        let mut req = self
            .http
            .post(self.url())
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&body);

        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        tracing::debug!(model = %self.model, chars = prompt.user.len(), "sending completion request");
        let resp = req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("API error {}: {}", status, text));
        }

        let text = resp.text().await?;
        parse_response(&text, &self.model)
    }
}

impl Completer for Client {
    fn complete(&self, prompt: Prompt) -> BoxFuture<'_, Result<Completion>> {
        Box::pin(self.chat(prompt))
    }
}

// ── Request / response shaping ────────────────────────────────────────────────

fn build_body(model: &str, prompt: &Prompt) -> Value {
    let mut messages = Vec::new();
    if !prompt.system.is_empty() {
        messages.push(serde_json::json!({
            "role": "system",
            "content": prompt.system
        }));
    }
    messages.push(serde_json::json!({
        "role": "user",
        "content": prompt.user
    }));

    let mut body = serde_json::json!({
        "model": model,
        "temperature": prompt.temperature,
        "messages": messages,
    });
    if let TokenLimit::Capped(n) = prompt.max_tokens {
        body["max_tokens"] = serde_json::json!(n);
    }
    body
}

/// Pull the first choice's content out of a response body. The service's own
/// `model` field wins over the one we asked for.
fn parse_response(body: &str, requested_model: &str) -> Result<Completion> {
    let resp: ChatResponse =
        serde_json::from_str(body).map_err(|e| anyhow!("malformed response: {e}"))?;
    let text = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| anyhow!("response has no message content"))?;
    let model = resp
        .model
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| requested_model.to_string());
    Ok(Completion { text, model })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(limit: TokenLimit) -> Prompt {
        Prompt {
            system: "sys".into(),
            user: "hello".into(),
            max_tokens: limit,
            temperature: 0.5,
        }
    }

    #[test]
    fn test_body_includes_cap() {
        let body = build_body("m", &prompt(TokenLimit::Capped(256)));
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["model"], "m");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
    }

    #[test]
    fn test_body_omits_cap_when_unbounded() {
        let body = build_body("m", &prompt(TokenLimit::Unbounded));
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_body_skips_empty_system() {
        let mut p = prompt(TokenLimit::Unbounded);
        p.system.clear();
        let body = build_body("m", &p);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_prefers_reported_model() {
        let c = parse_response(
            r#"{"model":"served-1","choices":[{"message":{"content":"out"}}]}"#,
            "asked",
        )
        .unwrap();
        assert_eq!(c.text, "out");
        assert_eq!(c.model, "served-1");

        let c = parse_response(r#"{"choices":[{"message":{"content":"out"}}]}"#, "asked").unwrap();
        assert_eq!(c.model, "asked");
    }

    #[test]
    fn test_parse_rejects_missing_content() {
        assert!(parse_response(r#"{"choices":[]}"#, "m").is_err());
        assert!(parse_response(r#"{"choices":[{"message":{}}]}"#, "m").is_err());
        assert!(parse_response("<html>", "m").is_err());
    }

    #[test]
    fn test_url_trims_slash() {
        let c = Client::new("http://localhost:8080/v1/".into(), "m".into());
        assert_eq!(c.url(), "http://localhost:8080/v1/chat/completions");
    }
}
