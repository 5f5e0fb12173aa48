// DriveShare Assistant
// Folder-aware question answering through a text completion service

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::accumulator::FolderView;
use crate::config::AssistantConfig;

/// Shown in the transcript whenever the completion call fails
pub const APOLOGY: &str = "Sorry, I encountered an error connecting to the AI service.";

static KEY_PARAM_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"[?&]key=[^&\s\)]*").expect("valid key pattern"));

/// Strip `key=` query parameters so API keys never reach logs
pub fn sanitize_error_message(msg: &str) -> String {
    KEY_PARAM_RE.replace_all(msg, "").to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("Missing API key")]
    MissingApiKey,
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl ChatMessage {
    fn now(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Single-shot text completion
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AssistantError>;
}

mod gemini {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize)]
    pub struct GeminiRequest {
        pub contents: Vec<GeminiContent>,
    }

    #[derive(Serialize)]
    pub struct GeminiContent {
        pub role: String,
        pub parts: Vec<GeminiPart>,
    }

    #[derive(Serialize, Deserialize)]
    pub struct GeminiPart {
        #[serde(default)]
        pub text: Option<String>,
    }

    #[derive(Deserialize)]
    pub struct GeminiResponse {
        pub candidates: Option<Vec<GeminiCandidate>>,
        pub error: Option<GeminiError>,
    }

    #[derive(Deserialize)]
    pub struct GeminiCandidate {
        pub content: GeminiContentResponse,
    }

    #[derive(Deserialize)]
    pub struct GeminiContentResponse {
        #[serde(default)]
        pub parts: Vec<GeminiPart>,
    }

    #[derive(Deserialize)]
    pub struct GeminiError {
        pub message: String,
    }
}

/// Gemini `generateContent` client
pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl GeminiBackend {
    pub fn new(client: reqwest::Client, config: &AssistantConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone().map(SecretString::from),
        }
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    async fn complete(&self, prompt: &str) -> Result<String, AssistantError> {
        use gemini::*;

        let api_key = self.api_key.as_ref().ok_or(AssistantError::MissingApiKey)?;
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url,
            self.model,
            api_key.expose_secret()
        );

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AssistantError::Request(e.without_url()))?;

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Request(e.without_url()))?;

        if let Some(error) = body.error {
            return Err(AssistantError::Api(error.message));
        }

        let candidate = body
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| AssistantError::InvalidResponse("No candidates in response".to_string()))?;

        let text: String = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        if text.trim().is_empty() {
            return Err(AssistantError::InvalidResponse("Empty completion".to_string()));
        }
        Ok(text)
    }
}

/// Prompt describing the folder in view plus the user's question
pub fn build_prompt(question: &str, folder: Option<&FolderView>) -> String {
    let folder_name = folder.map(|f| f.name.as_str()).filter(|n| !n.is_empty()).unwrap_or("Unknown");
    let file_context = match folder {
        Some(view) if !view.entries.is_empty() => view
            .entries
            .iter()
            .map(|e| {
                let kind = if e.is_folder { "Folder" } else { e.mime_type.as_str() };
                format!("- {} ({})", e.name, kind)
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => "No files in current view.".to_string(),
    };

    format!(
        "You are an intelligent assistant for a file sharing system.\n\
         The user is currently viewing a folder named \"{folder_name}\".\n\
         \n\
         Here is the list of files in this folder:\n\
         {file_context}\n\
         \n\
         User Question: \"{question}\"\n\
         \n\
         Answer concisely. If the user asks for a file, check if it exists in the list above.\n\
         If the user asks to summarize, describe the types of files available.\n"
    )
}

/// Chat transcript bound to a completion backend
pub struct Assistant<C: CompletionBackend + ?Sized> {
    backend: Arc<C>,
    transcript: Vec<ChatMessage>,
}

impl<C: CompletionBackend + ?Sized> Assistant<C> {
    pub fn new(backend: Arc<C>) -> Self {
        Self {
            backend,
            transcript: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn clear(&mut self) {
        self.transcript.clear();
    }

    /// Ask about the folder in view; returns the reply appended to the transcript
    ///
    /// Blank questions are ignored and return `None`. Completion failures are
    /// logged and answered with [`APOLOGY`].
    pub async fn ask(&mut self, question: &str, folder: Option<&FolderView>) -> Option<&ChatMessage> {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }
        self.transcript.push(ChatMessage::now(ChatRole::User, question));

        let prompt = build_prompt(question, folder);
        let reply = match self.backend.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Assistant request failed: {}", sanitize_error_message(&e.to_string()));
                APOLOGY.to_string()
            }
        };
        self.transcript.push(ChatMessage::now(ChatRole::Model, reply));
        self.transcript.last()
    }
}
