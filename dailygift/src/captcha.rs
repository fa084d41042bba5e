//! CAPTCHA solving through the Gemini vision API.
//!
//! The login flow only sees the [`CaptchaSolver`] trait: image bytes in,
//! code text out. Retry pacing lives here too so the flow and its tests
//! share one schedule.

use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::errors::BotError;

/// How many solve attempts the login flow makes before asking a human.
pub const MAX_SOLVE_ATTEMPTS: u32 = 3;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const PROMPT: &str = "Return ONLY the alphanumeric verification code you see in this image. \
                      Do not include spaces or other text.";

/// Exponential backoff before retry `attempt` (1-based): 1000, 2000,
/// 4000 ms.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(1000 * 2u64.pow(attempt.saturating_sub(1)))
}

/// Turns a CAPTCHA image into the code it shows.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn solve(&self, image_png: &[u8]) -> Result<String, BotError>;
}

/// Gemini-backed solver. One image part plus a fixed prompt, answer read
/// from the first candidate.
pub struct GeminiSolver {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiSolver {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CaptchaSolver for GeminiSolver {
    #[instrument(skip(self, image_png), fields(model = %self.model))]
    async fn solve(&self, image_png: &[u8]) -> Result<String, BotError> {
        let url = format!(
            "{GEMINI_ENDPOINT}/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": "image/png",
                            "data": BASE64_STANDARD.encode(image_png)
                        }
                    },
                    { "text": PROMPT }
                ]
            }],
            "generationConfig": {
                "maxOutputTokens": 32,
                "temperature": 0.0
            }
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            if status == StatusCode::NOT_FOUND {
                warn!("model '{}' rejected by the API, check the `model` env var", self.model);
            }
            return Err(BotError::Captcha(format!(
                "Gemini API returned {status}: {detail}"
            )));
        }

        let payload: Value = response.json().await?;
        let code = answer_text(&payload).map(clean_code).unwrap_or_default();
        debug!(code = %code, "gemini answer");
        Ok(code)
    }
}

/// The answer text lives at `candidates[0].content.parts[0].text`.
fn answer_text(payload: &Value) -> Option<&str> {
    payload
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
}

/// Models like to wrap the code in whitespace or newlines; the page wants
/// the bare characters.
fn clean_code(raw: &str) -> String {
    raw.split_whitespace().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_one_second() {
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(3), Duration::from_millis(4000));
    }

    #[test]
    fn clean_code_strips_all_whitespace() {
        assert_eq!(clean_code("  A B1\n2c\t"), "AB12c");
        assert_eq!(clean_code("XY9Z"), "XY9Z");
        assert_eq!(clean_code("   \n"), "");
    }

    #[test]
    fn answer_text_reads_the_first_candidate() {
        let payload = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [{ "text": " aB3d\n" }],
                    "role": "model"
                },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(answer_text(&payload), Some(" aB3d\n"));
        assert_eq!(answer_text(&payload).map(clean_code).as_deref(), Some("aB3d"));
    }

    #[test]
    fn missing_candidates_yield_nothing() {
        let payload = serde_json::json!({ "promptFeedback": {} });
        assert_eq!(answer_text(&payload), None);
    }
}
