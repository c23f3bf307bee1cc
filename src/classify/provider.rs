//! Chat-completion transport behind a small trait so the classifier can be driven by mocks.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::LlmSettings;

/// Sampling temperature for classification requests.
pub const CLASSIFY_TEMPERATURE: f64 = 0.2;

/// Longest slice of an error body carried into the error message.
const ERROR_EXCERPT_CHARS: usize = 200;

/// Sends one prompt and returns the raw text of the reply.
pub trait ChatProvider: Send + Sync {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

/// Body of a `/chat/completions` request.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub temperature: f64,
    pub stream: bool,
}

/// A single user turn carrying the whole prompt, non-streaming.
pub fn chat_request<'a>(model: &'a str, prompt: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
        temperature: CLASSIFY_TEMPERATURE,
        stream: false,
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Text of the first choice, or an error for non-2xx statuses and empty replies.
pub fn reply_content(status: StatusCode, body: &str) -> Result<String> {
    if !status.is_success() {
        let excerpt: String = body.chars().take(ERROR_EXCERPT_CHARS).collect();
        bail!("chat completion returned {status}: {excerpt}");
    }
    let parsed: ChatResponse =
        serde_json::from_str(body).context("decoding chat completion body")?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| anyhow!("chat completion carried no message content"))
}

/// OpenAI-compatible `/chat/completions` endpoint (DeepSeek, OpenAI, ...).
pub struct OpenAiCompatProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatProvider {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("alpha-feed/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("building chat http client")?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        })
    }
}

impl ChatProvider for OpenAiCompatProvider {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let resp = self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&chat_request(&self.model, prompt))
                .send()
                .await
                .context("chat completion request")?;

            let status = resp.status();
            let body = resp.text().await.context("reading chat completion body")?;
            reply_content(status, &body)
        })
    }

    fn name(&self) -> &'static str {
        "openai-compatible"
    }
}

/// Replays canned replies in call order and records every prompt it was given.
/// `Err` entries simulate transport failures. Running out of replies is also a failure.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = std::result::Result<String, String>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl ChatProvider for ScriptedProvider {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        let next = match (self.prompts.lock(), self.replies.lock()) {
            (Ok(mut prompts), Ok(mut replies)) => {
                prompts.push(prompt.to_string());
                replies.pop_front()
            }
            _ => None,
        };
        Box::pin(async move {
            match next {
                Some(Ok(text)) => Ok(text),
                Some(Err(e)) => Err(anyhow!(e)),
                None => Err(anyhow!("scripted provider has no reply left")),
            }
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
