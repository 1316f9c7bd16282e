use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

use super::traits::{Translator, TranslatorInfo};
use crate::config::{Lang, TranslatorConfig};
use crate::error::{Error, Result};

/// Per-request HTTP timeout; the resolver applies its own overall deadline on top
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// OpenAI-compatible chat-completions translator.
/// Works with: llama.cpp server, Ollama, OpenAI, etc.
pub struct OpenAiTranslator {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    retry_count: u32,
    retry_delay_ms: u64,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OpenAiTranslator {
    pub fn new(config: &TranslatorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::TranslationUnavailable(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            retry_count: config.retry_count.max(1),
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    /// Build the prompt. Line-item descriptions are short trade phrases, so the model is
    /// asked for the phrase alone.
    fn create_prompt(text: &str, source: &Lang, target: &Lang) -> String {
        if is_transliteration(target) {
            return format!(
                "Rewrite the following {} invoice line item as Gujarati words spelled with \
                 English letters (Ginlish). Output only the result, no explanations.\n\nText: \"{}\"",
                language_name(source),
                text
            );
        }

        format!(
            "Translate the following invoice line item from {} into {}. Keep measurements, \
             numbers and brand names as they are. Output only the translation, no explanations.\
             \n\nText: \"{}\"",
            language_name(source),
            language_name(target),
            text
        )
    }

    /// Make API request with retry logic
    async fn request_with_retry(&self, text: &str, source: &Lang, target: &Lang) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: Self::create_prompt(text, source, target),
            }],
            temperature: 0.2,
        };

        let mut last_error = None;

        for attempt in 0..self.retry_count {
            debug!(
                "Translation request attempt {}/{} to {}",
                attempt + 1,
                self.retry_count,
                url
            );

            let mut req = self.client.post(&url).json(&request);
            if let Some(ref key) = self.api_key {
                req = req.bearer_auth(key);
            }

            match req.send().await {
                Ok(response) if response.status().is_success() => {
                    match response.json::<ChatResponse>().await {
                        Ok(chat) => match chat.choices.first() {
                            Some(choice) => return Ok(clean_completion(&choice.message.content)),
                            None => {
                                last_error = Some(Error::TranslationInvalidResponse(
                                    "No choices in response".to_string(),
                                ));
                            }
                        },
                        Err(e) => {
                            warn!("Failed to parse response: {}", e);
                            last_error = Some(Error::TranslationInvalidResponse(e.to_string()));
                        }
                    }
                }
                Ok(response) if response.status().as_u16() == 429 => {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse().ok());

                    warn!("Rate limited, retry after {:?}s", retry_after);
                    last_error = Some(Error::TranslationRateLimited { retry_after });

                    let wait_ms = retry_after.unwrap_or(5) * 1000;
                    tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                    continue;
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    warn!("API error: {} - {}", status, body);
                    last_error = Some(Error::TranslationRequest(format!("HTTP {status}: {body}")));
                }
                Err(e) => {
                    warn!("Request failed: {}", e);
                    last_error = Some(if e.is_timeout() {
                        Error::TranslationTimeout(REQUEST_TIMEOUT_SECS)
                    } else {
                        Error::TranslationRequest(e.to_string())
                    });
                }
            }

            if attempt + 1 < self.retry_count {
                tokio::time::sleep(Duration::from_millis(self.retry_delay_ms)).await;
            }
        }

        error!("Translation failed after {} attempts", self.retry_count);
        Err(last_error.unwrap_or_else(|| {
            Error::TranslationUnavailable("maximum retries exceeded".to_string())
        }))
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo {
            name: "OpenAI Compatible",
            requires_api_key: false,
            supports_transliteration: true,
        }
    }

    async fn translate(&self, text: &str, source: &Lang, target: &Lang) -> Result<String> {
        if text.trim().is_empty() || source == target {
            return Ok(text.to_string());
        }

        self.request_with_retry(text.trim(), source, target).await
    }
}

/// Strip whitespace and the quotes models like to wrap answers in
fn clean_completion(content: &str) -> String {
    content
        .trim()
        .trim_start_matches(['"', '“'])
        .trim_end_matches(['"', '”'])
        .trim()
        .to_string()
}

/// Whether `lang` asks for a Latin-letter rendering rather than a translation
fn is_transliteration(lang: &Lang) -> bool {
    lang.as_str().ends_with("-Latn")
}

/// Convert language code to human-readable name for prompts
fn language_name(lang: &Lang) -> &'static str {
    match lang.as_str() {
        "en" => "English",
        "gu" => "Gujarati",
        "gu-Latn" => "Gujarati in Latin letters",
        "hi" => "Hindi",
        "mr" => "Marathi",
        _ => "the specified language",
    }
}
