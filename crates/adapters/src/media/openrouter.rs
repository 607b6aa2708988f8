//! OpenRouter chat-completions adapter for describing attached media

use async_trait::async_trait;
use askfeed_domain::{MediaDescriber, MediaError};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::MediaLimits;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

const IMAGE_PROMPT: &str = "Describe this image in detail. Focus on the main content, text, \
     and any important visual elements. Keep it concise but informative.";

/// Vision descriptions through OpenRouter
pub struct OpenRouterDescriber {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    limits: MediaLimits,
}

impl OpenRouterDescriber {
    pub fn new(
        api_key: SecretString,
        base_url: String,
        model: String,
        timeout: Duration,
        limits: MediaLimits,
    ) -> Result<Self, MediaError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MediaError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            limits,
        })
    }

    async fn describe_image(&self, image_url: &str) -> Result<String, MediaError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: IMAGE_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_url.to_string(),
                        },
                    },
                ],
            }],
        };

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("X-Title", "askfeed")
            .json(&request)
            .send()
            .await
            .map_err(|e| MediaError::Network(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Api(format!("API returned {}: {}", status, body)));
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| MediaError::Api(format!("Invalid response: {}", e)))?;

        if let Some(error) = api_response.error {
            return Err(MediaError::Api(error.message));
        }

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| MediaError::Api("Empty response".to_string()))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
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
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[async_trait]
impl MediaDescriber for OpenRouterDescriber {
    async fn describe_images(&self, urls: &[String]) -> Result<Vec<String>, MediaError> {
        let max = self.limits.max_images_per_post;
        if urls.len() > max {
            tracing::warn!(total = urls.len(), max, "Too many images, describing the first ones");
        }

        let mut descriptions = Vec::new();
        for (i, url) in urls.iter().take(max).enumerate() {
            match self.describe_image(url).await {
                Ok(text) => descriptions.push(text),
                Err(e) => {
                    tracing::warn!(image_index = i, error = %e, "Failed to describe image, skipping");
                }
            }
        }

        Ok(descriptions)
    }

    async fn transcribe_video(
        &self,
        url: &str,
        duration_secs: u64,
        size_bytes: u64,
    ) -> Result<String, MediaError> {
        self.limits.check_video(duration_secs, size_bytes)?;
        tracing::debug!(video_url = %url, "Video transcription not available");
        Err(MediaError::NotImplemented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn describer(server: &MockServer, limits: MediaLimits) -> OpenRouterDescriber {
        OpenRouterDescriber::new(
            SecretString::new("or-key".into()),
            server.uri(),
            DEFAULT_MODEL.to_string(),
            Duration::from_secs(5),
            limits,
        )
        .unwrap()
    }

    fn completion(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "gen-1",
            "choices": [{"message": {"role": "assistant", "content": text}, "finish_reason": "stop"}]
        })
    }

    #[tokio::test]
    async fn test_describe_images_sends_vision_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer or-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "openai/gpt-4o-mini",
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": IMAGE_PROMPT},
                        {"type": "image_url", "image_url": {"url": "https://img.example/1.jpg"}}
                    ]
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("A cat on a sofa")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let descriptions = describer(&mock_server, MediaLimits::default())
            .describe_images(&["https://img.example/1.jpg".to_string()])
            .await
            .unwrap();

        assert_eq!(descriptions, vec!["A cat on a sofa".to_string()]);
    }

    #[tokio::test]
    async fn test_describe_images_caps_count() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("image")))
            .expect(2)
            .mount(&mock_server)
            .await;

        let limits = MediaLimits {
            max_images_per_post: 2,
            ..MediaLimits::default()
        };
        let urls: Vec<String> = (0..5).map(|i| format!("https://img.example/{}.jpg", i)).collect();
        let descriptions = describer(&mock_server, limits)
            .describe_images(&urls)
            .await
            .unwrap();

        assert_eq!(descriptions.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_images_are_dropped() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": {"message": "model overloaded", "type": "server_error", "code": "503"}
            })))
            .mount(&mock_server)
            .await;

        let descriptions = describer(&mock_server, MediaLimits::default())
            .describe_images(&["https://img.example/1.jpg".to_string()])
            .await
            .unwrap();

        assert!(descriptions.is_empty());
    }

    #[tokio::test]
    async fn test_transcribe_video_checks_limits() {
        let mock_server = MockServer::start().await;
        let media = describer(&mock_server, MediaLimits::default());

        let too_long = media.transcribe_video("https://v.example/1.mp4", 120, 0).await;
        match too_long {
            Err(MediaError::ExceedsLimit(what)) => assert!(what.contains("duration")),
            other => panic!("expected ExceedsLimit, got {:?}", other),
        }

        let too_big = media
            .transcribe_video("https://v.example/1.mp4", 10, 30 * 1024 * 1024)
            .await;
        assert!(matches!(too_big, Err(MediaError::ExceedsLimit(_))));

        let ok_size = media.transcribe_video("https://v.example/1.mp4", 10, 1024).await;
        assert!(matches!(ok_size, Err(MediaError::NotImplemented)));
    }
}
