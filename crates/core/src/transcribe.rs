use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

const TRANSCRIPTIONS_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Speech-to-text oracle. Takes one complete audio payload and returns its
/// transcript; streaming is out of scope for this service.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String>;
}

pub struct OpenAiTranscriber {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiTranscriber {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String> {
        if audio.is_empty() {
            bail!("audio payload is empty");
        }

        // The endpoint infers the container from the file name; derive the
        // extension from the mime subtype ("audio/webm" -> "audio.webm").
        let extension = mime_type.rsplit('/').next().unwrap_or("webm");
        let part = Part::bytes(audio.to_vec())
            .file_name(format!("audio.{extension}"))
            .mime_str(mime_type)
            .map_err(|e| anyhow!("Unsupported audio mime type {mime_type:?}: {e}"))?;
        let form = Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        let resp = self
            .client
            .post(TRANSCRIPTIONS_URL)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?
            .json::<TranscriptionResponse>()
            .await?;

        Ok(resp.text)
    }
}
