//! AI collaborator seam.
//!
//! A context with `--ai` hands its templated text to a [`Collaborator`]. The
//! production gateway talks to an OpenAI-compatible chat completions
//! endpoint; without an API key the disabled stub answers instead.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::FoldError;
use crate::infra::config::{AiConfig, HttpConfig};

/// Fixed reply of [`DisabledCollaborator`]
pub const AI_DISABLED_REPLY: &str = "[ai disabled: no API key configured]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage
{
    pub role: String,
    pub content: String,
}

impl ChatMessage
{
    pub fn new(
        role: &str,
        content: impl Into<String>,
    ) -> Self
    {
        Self { role: role.to_string(), content: content.into() }
    }
}

/// One completion request built from a context.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest
{
    /// Context label, for error messages
    pub context: String,
    /// `--ai-model`, else the configured default
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    /// Few-shot messages placed before the user text
    pub seeds: Vec<ChatMessage>,
    pub text: String,
}

impl ChatRequest
{
    /// System prompt, seeds, then the text as the user turn
    pub fn messages(&self) -> Vec<ChatMessage>
    {
        let mut out = Vec::with_capacity(self.seeds.len() + 2);
        if let Some(sys) = &self.system_prompt
        {
            out.push(ChatMessage::new("system", sys.clone()));
        }
        out.extend(
            self.seeds
                .iter()
                .cloned(),
        );
        out.push(ChatMessage::new("user", self.text.clone()));
        out
    }
}

/// Something that turns a request into text.
pub trait Collaborator: Send + Sync
{
    /// # Errors
    ///
    /// Returns [`FoldError::Collaborator`] when no reply could be obtained.
    fn complete(
        &self,
        request: &ChatRequest,
    ) -> Result<String, FoldError>;
}

/// Answers every request with [`AI_DISABLED_REPLY`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCollaborator;

impl Collaborator for DisabledCollaborator
{
    fn complete(
        &self,
        _request: &ChatRequest,
    ) -> Result<String, FoldError>
    {
        Ok(AI_DISABLED_REPLY.to_string())
    }
}

/// Blocking client for `POST {endpoint}` in the chat completions format.
#[derive(Debug, Clone)]
pub struct OpenAiCollaborator
{
    client: Client,
    endpoint: String,
    default_model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a>
{
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse
{
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice
{
    message: ChatMessage,
}

impl OpenAiCollaborator
{
    /// `None` when the key variable named by `ai.api_key_env` is unset.
    pub fn from_config(
        ai: &AiConfig,
        http: &HttpConfig,
    ) -> Result<Option<Self>>
    {
        let Some(api_key) = std::env::var(&ai.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
        else
        {
            return Ok(None);
        };

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(http.timeout_secs.clamp(1, 30)))
            .timeout(Duration::from_secs(ai.timeout_secs))
            .user_agent(&http.user_agent)
            .build()
            .context("Failed to build AI HTTP client")?;

        Ok(Some(Self {
            client,
            endpoint: ai
                .endpoint
                .clone(),
            default_model: ai
                .model
                .clone(),
            api_key,
        }))
    }
}

impl Collaborator for OpenAiCollaborator
{
    #[instrument(level = "debug", skip_all, fields(context = %request.context))]
    fn complete(
        &self,
        request: &ChatRequest,
    ) -> Result<String, FoldError>
    {
        let fail = |reason: String| FoldError::Collaborator { context: request.context.clone(), reason };

        let model = request
            .model
            .as_deref()
            .unwrap_or(&self.default_model);
        let payload = CompletionRequest { model, messages: request.messages() };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .map_err(|e| fail(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success()
        {
            let body = response
                .text()
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(fail(format!("HTTP {status}: {}", body.trim())));
        }

        let parsed: CompletionResponse = response
            .json()
            .map_err(|e| fail(format!("malformed response: {e}")))?;

        let reply = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| fail("response has no choices".to_string()))?;

        debug!(bytes = reply.len(), "completion received");
        Ok(reply)
    }
}

/// Read seed messages: one `{"role", "content"}` object per line, blank
/// lines ignored.
pub fn load_seeds(path: &Path) -> Result<Vec<ChatMessage>>
{
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read AI seeds {}", path.display()))?;

    src.lines()
        .enumerate()
        .filter(|(_, l)| {
            !l.trim()
                .is_empty()
        })
        .map(|(i, l)| {
            serde_json::from_str::<ChatMessage>(l)
                .with_context(|| format!("{}:{}: invalid seed message", path.display(), i + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests
{
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn messages_are_ordered_system_seeds_user()
    {
        let req = ChatRequest {
            context: "root".into(),
            system_prompt: Some("be brief".into()),
            seeds: vec![ChatMessage::new("user", "hi"), ChatMessage::new("assistant", "hello")],
            text: "summarize".into(),
            ..Default::default()
        };

        let msgs = req.messages();
        let roles: Vec<&str> = msgs
            .iter()
            .map(|m| m.role.as_str())
            .collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(msgs[0], ChatMessage::new("system", "be brief"));
        assert_eq!(msgs[3], ChatMessage::new("user", "summarize"));
    }

    #[test]
    fn disabled_collaborator_returns_stub()
    {
        let reply = DisabledCollaborator
            .complete(&ChatRequest::default())
            .unwrap();
        assert_eq!(reply, AI_DISABLED_REPLY);
    }

    #[test]
    fn seeds_load_from_jsonl_and_report_bad_lines()
    {
        let mut good = NamedTempFile::new().unwrap();
        writeln!(good, r#"{{"role":"user","content":"q"}}"#).unwrap();
        writeln!(good).unwrap();
        writeln!(good, r#"{{"role":"assistant","content":"a"}}"#).unwrap();

        let seeds = load_seeds(good.path()).unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[1].role, "assistant");

        let mut bad = NamedTempFile::new().unwrap();
        writeln!(bad, r#"{{"role":"user"}}"#).unwrap();
        let err = load_seeds(bad.path()).unwrap_err();
        assert!(err.to_string().contains(":1: invalid seed message"));
    }

    #[test]
    fn missing_key_disables_gateway()
    {
        let ai = AiConfig { api_key_env: "FOLDUP_TEST_SURELY_UNSET_KEY".into(), ..Default::default() };
        let http = HttpConfig::default();
        assert!(OpenAiCollaborator::from_config(&ai, &http).unwrap().is_none());
    }
}
