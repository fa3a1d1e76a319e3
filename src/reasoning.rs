use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ReasoningConfig;

/// Failure kinds for one reasoning call. The decision engine converts every
/// variant into the safe-default decision at a single point.
#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("reasoning request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("reasoning service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("empty response from reasoning service")]
    EmptyResponse,
    #[error("invalid frame image: {0}")]
    BadFrame(String),
    #[error("client setup failed: {0}")]
    Setup(String),
}

/// One bounded decision request: framing text plus an optional camera frame.
#[derive(Debug, Clone)]
pub struct ReasoningPrompt {
    pub system: String,
    pub user: String,
    pub image: Option<DynamicImage>,
}

/// Seam to the external reasoning service, so tests can stub the call.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    async fn complete(&self, prompt: &ReasoningPrompt) -> Result<String, ReasoningError>;
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: usize,
    response_format: ResponseFormat,
    stream: bool,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: ChatMessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ChatMessageContent {
    Text(String),
    Mixed(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client with strict-JSON output and a
/// hard request timeout, so a stalled call degrades instead of blocking the
/// guidance loop.
pub struct RemoteReasoner {
    config: ReasoningConfig,
    client: reqwest::Client,
}

impl RemoteReasoner {
    pub fn new(config: ReasoningConfig) -> Result<Self, ReasoningError> {
        let timeout = Duration::from_secs(config.timeout_seconds);

        let mut default_headers = reqwest::header::HeaderMap::new();
        default_headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let auth_header = format!("Bearer {}", config.api_key);
        default_headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .map_err(|e| ReasoningError::Setup(format!("invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Seer/0.1")
            .default_headers(default_headers)
            .build()
            .map_err(|e| ReasoningError::Setup(e.to_string()))?;

        info!("Initialized reasoning client for model: {}", config.model_name);
        info!("Base URL: {}", config.base_url);
        info!("Vision support: {}", config.supports_vision);

        Ok(Self { config, client })
    }

    fn encode_image(&self, image: &DynamicImage) -> Result<String, ReasoningError> {
        use std::io::Cursor;

        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        image
            .resize(1024, 1024, image::imageops::FilterType::Lanczos3)
            .write_to(&mut cursor, image::ImageFormat::Jpeg)
            .map_err(|e| ReasoningError::BadFrame(format!("JPEG encode failed: {e}")))?;

        Ok(general_purpose::STANDARD.encode(&buffer))
    }
}

#[async_trait]
impl ReasoningBackend for RemoteReasoner {
    async fn complete(&self, prompt: &ReasoningPrompt) -> Result<String, ReasoningError> {
        let start_time = std::time::Instant::now();

        let user_content = match &prompt.image {
            Some(image) if self.config.supports_vision => {
                debug!("Attaching frame image to reasoning request");
                let image_data = self.encode_image(image)?;
                ChatMessageContent::Mixed(vec![
                    ContentPart::Text { text: prompt.user.clone() },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/jpeg;base64,{image_data}"),
                            detail: Some("high".to_string()),
                        },
                    },
                ])
            }
            Some(_) => {
                warn!("Frame provided but model does not support vision, sending text only");
                ChatMessageContent::Text(prompt.user.clone())
            }
            None => ChatMessageContent::Text(prompt.user.clone()),
        };

        let request = ChatCompletionRequest {
            model: self.config.model_name.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: ChatMessageContent::Text(prompt.system.clone()),
                },
                ChatMessage { role: "user".to_string(), content: user_content },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat { format_type: "json_object".to_string() },
            stream: false,
        };

        debug!("Sending decision request to {}/chat/completions", self.config.base_url);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ReasoningError::Timeout
                } else {
                    ReasoningError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(ReasoningError::Status { status, body });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ReasoningError::Transport(format!("response decode failed: {e}")))?;

        let text = completion
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .ok_or(ReasoningError::EmptyResponse)?
            .clone();

        debug!("Reasoning response received in {}ms", start_time.elapsed().as_millis());
        Ok(text)
    }
}
