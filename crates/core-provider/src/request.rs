//! Per-provider request construction and response normalization.
//!
//! Scope: turn a prepared prompt plus [`Settings`] into the HTTP calls one
//! generation needs, and turn each provider's response body into a list of
//! optional completion strings. No IO happens here.

use crate::error::{CompletionError, CompletionResult};
use crate::prompt::ProviderStyle;
use core_config::Settings;
use serde_json::{Value, json};
use std::str::FromStr;
use tracing::trace;

const OPENAI_BASE: &str = "https://api.openai.com/v1";
const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const COHERE_URL: &str = "https://api.cohere.ai/v1/generate";
const TEXTSYNTH_BASE: &str = "https://api.textsynth.com/v1/engines";
const AZURE_DEFAULT_API_VERSION: &str = "2023-05-15";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    OpenAiChat,
    Azure,
    AzureChat,
    OpenAiCompat,
    OpenRouter,
    Anthropic,
    Cohere,
    TextSynth,
}

impl FromStr for ProviderKind {
    type Err = CompletionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "openai" => ProviderKind::OpenAi,
            "openai-chat" => ProviderKind::OpenAiChat,
            "azure" => ProviderKind::Azure,
            "azure-chat" => ProviderKind::AzureChat,
            "openai-compat" => ProviderKind::OpenAiCompat,
            "openrouter" => ProviderKind::OpenRouter,
            "anthropic" => ProviderKind::Anthropic,
            "cohere" => ProviderKind::Cohere,
            "textsynth" => ProviderKind::TextSynth,
            other => return Err(CompletionError::UnknownProvider(other.to_string())),
        })
    }
}

impl ProviderKind {
    pub fn style(self) -> ProviderStyle {
        match self {
            ProviderKind::OpenAiChat
            | ProviderKind::AzureChat
            | ProviderKind::OpenRouter
            | ProviderKind::Anthropic => ProviderStyle::Chat,
            _ => ProviderStyle::Plain,
        }
    }

    /// The messages API has no `n`; one request per completion.
    fn supports_n(self) -> bool {
        !matches!(self, ProviderKind::Anthropic)
    }
}

/// One POST to issue.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl HttpRequest {
    fn new(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body,
        }
    }

    fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    fn bearer(self, key: &str) -> Self {
        self.header("Authorization", format!("Bearer {key}"))
    }
}

/// Configured key, else the provider's conventional environment variable.
fn api_key(configured: &str, env_var: &str) -> Option<String> {
    if !configured.is_empty() {
        return Some(configured.to_string());
    }
    std::env::var(env_var).ok().filter(|v| !v.is_empty())
}

fn require_key(configured: &str, env_var: &str, provider: &str) -> CompletionResult<String> {
    api_key(configured, env_var).ok_or_else(|| {
        CompletionError::provider(None, format!("no API key for {provider} (set it or {env_var})"))
    })
}

fn completion_body(settings: &Settings, prompt: &str) -> Value {
    let m = &settings.model;
    json!({
        "model": m.name,
        "prompt": prompt,
        "max_tokens": m.max_tokens,
        "temperature": m.temperature,
        "top_p": m.top_p,
        "frequency_penalty": m.frequency_penalty,
        "presence_penalty": m.presence_penalty,
        "n": m.n,
    })
}

fn chat_body(settings: &Settings, prompt: &str) -> Value {
    let m = &settings.model;
    json!({
        "model": m.name,
        "messages": [{ "role": "user", "content": prompt }],
        "max_tokens": m.max_tokens,
        "temperature": m.temperature,
        "top_p": m.top_p,
        "frequency_penalty": m.frequency_penalty,
        "presence_penalty": m.presence_penalty,
        "n": m.n,
    })
}

fn azure_url(settings: &Settings, path: &str) -> CompletionResult<String> {
    let p = &settings.providers;
    if p.azure_endpoint.is_empty() {
        return Err(CompletionError::provider(None, "providers.azure_endpoint is not set"));
    }
    let version = if p.azure_api_version.is_empty() {
        AZURE_DEFAULT_API_VERSION
    } else {
        p.azure_api_version.as_str()
    };
    Ok(format!(
        "{}/openai/deployments/{}/{path}?api-version={version}",
        p.azure_endpoint.trim_end_matches('/'),
        settings.model.name
    ))
}

/// Build every request one generation of `settings.model.n` completions needs.
pub fn build_requests(
    kind: ProviderKind,
    settings: &Settings,
    prompt: &str,
) -> CompletionResult<Vec<HttpRequest>> {
    let p = &settings.providers;
    let m = &settings.model;
    let request = match kind {
        ProviderKind::OpenAi | ProviderKind::OpenAiChat => {
            let key = require_key(&p.openai_api_key, "OPENAI_API_KEY", "openai")?;
            let req = if kind == ProviderKind::OpenAi {
                HttpRequest::new(format!("{OPENAI_BASE}/completions"), completion_body(settings, prompt))
            } else {
                HttpRequest::new(format!("{OPENAI_BASE}/chat/completions"), chat_body(settings, prompt))
            };
            let req = req.bearer(&key);
            if p.openai_organization.is_empty() {
                req
            } else {
                req.header("OpenAI-Organization", p.openai_organization.clone())
            }
        }
        ProviderKind::Azure => {
            let key = require_key(&p.azure_api_key, "AZURE_OPENAI_API_KEY", "azure")?;
            HttpRequest::new(azure_url(settings, "completions")?, completion_body(settings, prompt))
                .header("api-key", key)
        }
        ProviderKind::AzureChat => {
            let key = require_key(&p.azure_api_key, "AZURE_OPENAI_API_KEY", "azure")?;
            HttpRequest::new(azure_url(settings, "chat/completions")?, chat_body(settings, prompt))
                .header("api-key", key)
        }
        ProviderKind::OpenAiCompat => {
            if p.openai_compat_url.is_empty() {
                return Err(CompletionError::provider(None, "providers.openai_compat_url is not set"));
            }
            let url = format!("{}/completions", p.openai_compat_url.trim_end_matches('/'));
            let req = HttpRequest::new(url, completion_body(settings, prompt));
            match api_key(&p.openai_compat_api_key, "OPENAI_COMPAT_API_KEY") {
                Some(key) => req.bearer(&key),
                None => req,
            }
        }
        ProviderKind::OpenRouter => {
            let key = require_key(&p.openrouter_api_key, "OPENROUTER_API_KEY", "openrouter")?;
            HttpRequest::new(OPENROUTER_URL, chat_body(settings, prompt)).bearer(&key)
        }
        ProviderKind::Anthropic => {
            let key = require_key(&p.anthropic_api_key, "ANTHROPIC_API_KEY", "anthropic")?;
            let body = json!({
                "model": m.name,
                "max_tokens": m.max_tokens,
                "temperature": m.temperature,
                "top_p": m.top_p,
                "messages": [{ "role": "user", "content": prompt }],
            });
            HttpRequest::new(ANTHROPIC_URL, body)
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION)
        }
        ProviderKind::Cohere => {
            let key = require_key(&p.cohere_api_key, "COHERE_API_KEY", "cohere")?;
            let body = json!({
                "model": m.name,
                "prompt": prompt,
                "max_tokens": m.max_tokens,
                "temperature": m.temperature,
                "p": m.top_p,
                "frequency_penalty": m.frequency_penalty,
                "presence_penalty": m.presence_penalty,
                "num_generations": m.n,
            });
            HttpRequest::new(COHERE_URL, body).bearer(&key)
        }
        ProviderKind::TextSynth => {
            let key = require_key(&p.textsynth_api_key, "TEXTSYNTH_API_KEY", "textsynth")?;
            let body = json!({
                "prompt": prompt,
                "max_tokens": m.max_tokens,
                "temperature": m.temperature,
                "top_p": m.top_p,
                "n": m.n,
            });
            HttpRequest::new(format!("{TEXTSYNTH_BASE}/{}/completions", m.name), body).bearer(&key)
        }
    };
    let copies = if kind.supports_n() { 1 } else { m.n.max(1) };
    trace!(target: "provider.request", ?kind, url = request.url.as_str(), copies, "built");
    Ok(vec![request; copies])
}

/// Best-effort error text from a provider error body.
fn error_message(body: &Value, raw: &str) -> String {
    body.get("error")
        .and_then(|e| e.get("message").and_then(Value::as_str).or_else(|| e.as_str()))
        .or_else(|| body.get("message").and_then(Value::as_str))
        .map(str::to_owned)
        .unwrap_or_else(|| raw.chars().take(200).collect())
}

/// Normalize one response into completion slots. A slot is `None` when the
/// provider returned a choice without text.
pub fn parse_response(kind: ProviderKind, status: u16, raw: &str) -> CompletionResult<Vec<Option<String>>> {
    let body: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) if (200..300).contains(&status) => {
            return Err(CompletionError::provider(Some(status), format!("invalid response body: {e}")));
        }
        Err(_) => Value::Null,
    };
    if !(200..300).contains(&status) {
        return Err(CompletionError::provider(Some(status), error_message(&body, raw)));
    }

    let texts = |items: Option<&Value>, pick: &dyn Fn(&Value) -> Option<String>| -> CompletionResult<Vec<Option<String>>> {
        items
            .and_then(Value::as_array)
            .map(|arr| arr.iter().map(pick).collect())
            .ok_or_else(|| CompletionError::provider(Some(status), "response has no completions"))
    };

    match kind {
        ProviderKind::OpenAi | ProviderKind::Azure | ProviderKind::OpenAiCompat => {
            texts(body.get("choices"), &|c| c.get("text").and_then(Value::as_str).map(str::to_owned))
        }
        ProviderKind::OpenAiChat | ProviderKind::AzureChat | ProviderKind::OpenRouter => {
            texts(body.get("choices"), &|c| {
                c.pointer("/message/content")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            })
        }
        ProviderKind::Anthropic => {
            let blocks = body
                .get("content")
                .and_then(Value::as_array)
                .ok_or_else(|| CompletionError::provider(Some(status), "response has no content"))?;
            let text: String = blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect();
            Ok(vec![if blocks.is_empty() { None } else { Some(text) }])
        }
        ProviderKind::Cohere => texts(body.get("generations"), &|g| {
            g.get("text").and_then(Value::as_str).map(str::to_owned)
        }),
        ProviderKind::TextSynth => match body.get("text") {
            Some(Value::String(s)) => Ok(vec![Some(s.clone())]),
            Some(Value::Array(items)) => Ok(items
                .iter()
                .map(|v| v.as_str().map(str::to_owned))
                .collect()),
            _ => Err(CompletionError::provider(Some(status), "response has no text")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings_with(provider: &str) -> Settings {
        let mut s = Settings::default();
        s.model.provider = provider.to_string();
        s.model.n = 2;
        s.providers.openai_api_key = "sk-test".into();
        s.providers.anthropic_api_key = "ak-test".into();
        s.providers.cohere_api_key = "co-test".into();
        s.providers.azure_api_key = "az-test".into();
        s.providers.azure_endpoint = "https://example.openai.azure.com/".into();
        s
    }

    #[test]
    fn unknown_provider_name_is_rejected() {
        assert_eq!(
            "gpt-5-labs".parse::<ProviderKind>(),
            Err(CompletionError::UnknownProvider("gpt-5-labs".into()))
        );
        assert_eq!("openai-chat".parse::<ProviderKind>(), Ok(ProviderKind::OpenAiChat));
    }

    #[test]
    fn openai_completion_request_shape() {
        let s = settings_with("openai");
        let reqs = build_requests(ProviderKind::OpenAi, &s, "Once").unwrap();
        assert_eq!(reqs.len(), 1);
        let req = &reqs[0];
        assert_eq!(req.url, "https://api.openai.com/v1/completions");
        assert_eq!(req.body["prompt"], "Once");
        assert_eq!(req.body["n"], 2);
        assert!(req.headers.contains(&("Authorization".into(), "Bearer sk-test".into())));
    }

    #[test]
    fn anthropic_issues_one_request_per_completion() {
        let s = settings_with("anthropic");
        let reqs = build_requests(ProviderKind::Anthropic, &s, "Once").unwrap();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].body["messages"][0]["content"], "Once");
        assert!(reqs[0].body.get("n").is_none());
    }

    #[test]
    fn azure_url_uses_deployment_and_default_version() {
        let s = settings_with("azure-chat");
        let reqs = build_requests(ProviderKind::AzureChat, &s, "x").unwrap();
        assert_eq!(
            reqs[0].url,
            "https://example.openai.azure.com/openai/deployments/davinci-002/chat/completions?api-version=2023-05-15"
        );
    }

    #[test]
    fn compat_without_url_is_a_provider_error() {
        let s = settings_with("openai-compat");
        let err = build_requests(ProviderKind::OpenAiCompat, &s, "x").unwrap_err();
        assert!(matches!(err, CompletionError::Provider { status: None, .. }));
    }

    #[test]
    fn parses_each_provider_shape() {
        let openai = r#"{"choices":[{"text":"foo"},{"text":"bar"}]}"#;
        assert_eq!(
            parse_response(ProviderKind::OpenAi, 200, openai).unwrap(),
            vec![Some("foo".into()), Some("bar".into())]
        );
        let chat = r#"{"choices":[{"message":{"content":"hi"}},{"message":{}}]}"#;
        assert_eq!(
            parse_response(ProviderKind::OpenRouter, 200, chat).unwrap(),
            vec![Some("hi".into()), None]
        );
        let anthropic = r#"{"content":[{"type":"text","text":"a"},{"type":"text","text":"b"}]}"#;
        assert_eq!(
            parse_response(ProviderKind::Anthropic, 200, anthropic).unwrap(),
            vec![Some("ab".into())]
        );
        let cohere = r#"{"generations":[{"text":"c"}]}"#;
        assert_eq!(
            parse_response(ProviderKind::Cohere, 200, cohere).unwrap(),
            vec![Some("c".into())]
        );
        let textsynth = r#"{"text":["x","y"]}"#;
        assert_eq!(
            parse_response(ProviderKind::TextSynth, 200, textsynth).unwrap(),
            vec![Some("x".into()), Some("y".into())]
        );
    }

    #[test]
    fn error_status_surfaces_provider_message() {
        let body = r#"{"error":{"message":"Incorrect API key"}}"#;
        assert_eq!(
            parse_response(ProviderKind::OpenAi, 401, body),
            Err(CompletionError::provider(Some(401), "Incorrect API key"))
        );
        assert_eq!(
            parse_response(ProviderKind::OpenAi, 502, "Bad Gateway"),
            Err(CompletionError::provider(Some(502), "Bad Gateway"))
        );
    }

    #[test]
    fn malformed_success_body_is_an_error() {
        let err = parse_response(ProviderKind::OpenAi, 200, "not json").unwrap_err();
        assert!(matches!(err, CompletionError::Provider { status: Some(200), .. }));
    }
}
