use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TranscriptionConfig;

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Thin wrapper over the Whisper transcription API: audio bytes in, plain
/// text out. No decision logic lives here.
pub struct Transcriber {
    config: TranscriptionConfig,
    client: reqwest::Client,
}

impl Transcriber {
    pub fn new(config: TranscriptionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("Seer/0.1")
            .build()?;
        info!("Initialized transcription client for model: {}", config.model_name);
        Ok(Self { config, client })
    }

    pub async fn transcribe(
        &self,
        audio: Vec<u8>,
        filename: &str,
        language: Option<&str>,
    ) -> Result<String> {
        let language = language.unwrap_or(&self.config.language).to_string();
        debug!("Transcribing {} bytes of audio ({})", audio.len(), filename);

        let part = reqwest::multipart::Part::bytes(audio)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.config.model_name.clone())
            .text("language", language);

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(anyhow!("transcription API error ({status}): {body}"));
        }

        let parsed: TranscriptionResponse = response.json().await?;
        Ok(parsed.text.trim().to_string())
    }
}
