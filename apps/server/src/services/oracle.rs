// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Messages-style multimodal completion client.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use roofline_core::{Error, OracleImage, Result, VisionOracle};
use serde::{Deserialize, Serialize};

/// Vision oracle over HTTP.
pub struct HttpVisionOracle {
    url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ImageSource<'a> {
    Url { url: &'a str },
    Base64 { media_type: &'static str, data: String },
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl HttpVisionOracle {
    pub fn new(
        http: reqwest::Client,
        url: &str,
        api_key: Option<String>,
        model: &str,
        max_tokens: u32,
    ) -> Self {
        Self {
            url: url.to_string(),
            api_key,
            model: model.to_string(),
            max_tokens,
            http,
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            headers.insert(
                "x-api-key",
                HeaderValue::from_str(key)
                    .map_err(|e| Error::Oracle(format!("Invalid API key header: {e}")))?,
            );
        }
        Ok(headers)
    }
}

fn image_block(image: &OracleImage) -> ContentBlock<'_> {
    let source = match image {
        OracleImage::Url(url) => ImageSource::Url { url: url.as_str() },
        OracleImage::Png(_) => ImageSource::Base64 {
            media_type: image.media_type(),
            data: image.base64_data().unwrap_or_default(),
        },
    };
    ContentBlock::Image { source }
}

/// Joins every text block of the response.
fn response_text(response: MessagesResponse) -> String {
    response
        .content
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl VisionOracle for HttpVisionOracle {
    async fn complete(&self, image: &OracleImage, prompt: &str) -> Result<String> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: vec![image_block(image), ContentBlock::Text { text: prompt }],
            }],
        };

        let resp = self
            .http
            .post(&self.url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Oracle(format!("Request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(Error::Oracle(format!(
                "Oracle returned {status}: {}",
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| Error::Oracle(format!("Response decode failed: {e}")))?;

        let text = response_text(parsed);
        tracing::debug!(chars = text.len(), "Oracle completion received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let image = OracleImage::Png(b"png".to_vec());
        let body = MessagesRequest {
            model: "m",
            max_tokens: 10,
            messages: vec![Message {
                role: "user",
                content: vec![image_block(&image), ContentBlock::Text { text: "hi" }],
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value["messages"][0]["content"][0],
            json!({"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "cG5n"}})
        );
        assert_eq!(value["messages"][0]["content"][1], json!({"type": "text", "text": "hi"}));

        let url = OracleImage::Url("https://x/y.png".into());
        assert_eq!(
            serde_json::to_value(image_block(&url)).unwrap(),
            json!({"type": "image", "source": {"type": "url", "url": "https://x/y.png"}})
        );
    }

    #[test]
    fn test_text_blocks_joined() {
        let resp: MessagesResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "tool_use", "id": "t1"},
                {"type": "text", "text": "second"}
            ]
        }))
        .unwrap();
        assert_eq!(response_text(resp), "first\nsecond");
    }
}
