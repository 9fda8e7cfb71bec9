//! Azure OpenAI chat completions with image input.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::debug;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use super::error::VisionError;
use super::prompt;
use super::{Deployment, VisionModel};
use crate::http::truncate_body;

// ─── Wire types ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

// ─── Client ─────────────────────────────────────────────────────────────────

/// Vision client for one Azure OpenAI chat deployment.
pub struct AzureVisionClient {
    client: Client,
    url: Url,
    api_key: SecretString,
}

impl AzureVisionClient {
    pub fn new(client: Client, deployment: Deployment) -> Result<Self, url::ParseError> {
        let url = deployment.operation_url("chat/completions")?;
        Ok(Self {
            client,
            url,
            api_key: deployment.api_key,
        })
    }
}

#[async_trait]
impl VisionModel for AzureVisionClient {
    async fn describe(&self, image: &[u8]) -> Result<String, VisionError> {
        let data_url = image_data_url(image);
        let request = build_request(&data_url);

        debug!(
            "Requesting description for {} byte image from {}",
            image.len(),
            self.url.path()
        );

        let response = self
            .client
            .post(self.url.clone())
            .header("api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(VisionError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        parse_completion(&body)
    }
}

/// Encodes image bytes as a `data:` URL, sniffing the MIME type from the
/// bytes themselves.
pub fn image_data_url(image: &[u8]) -> String {
    let media_type = image::guess_format(image)
        .map(|format| format.to_mime_type())
        .unwrap_or(prompt::FALLBACK_MEDIA_TYPE);
    format!("data:{};base64,{}", media_type, STANDARD.encode(image))
}

fn build_request(data_url: &str) -> ChatRequest<'_> {
    ChatRequest {
        messages: vec![
            ChatMessage {
                role: "system",
                content: vec![ContentPart::Text {
                    text: prompt::SYSTEM_PROMPT,
                }],
            },
            ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: prompt::USER_PROMPT,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: data_url.to_string(),
                        },
                    },
                ],
            },
        ],
        temperature: prompt::TEMPERATURE,
        top_p: prompt::TOP_P,
        max_tokens: prompt::MAX_TOKENS,
    }
}

/// Extracts the first choice's message content from a completion body.
pub fn parse_completion(body: &str) -> Result<String, VisionError> {
    let completion: ChatCompletion = serde_json::from_str(body)
        .map_err(|e| VisionError::MalformedResponse(format!("unexpected body shape: {}", e)))?;

    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| VisionError::MalformedResponse("response has no choices".to_string()))?;

    match choice.message.content {
        Some(content) if !content.trim().is_empty() => Ok(content),
        _ => Err(VisionError::MalformedResponse(
            "first choice has no message content".to_string(),
        )),
    }
}
