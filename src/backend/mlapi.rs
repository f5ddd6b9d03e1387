use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::backend::translate::{
    AudioHandle, OcrFragment, OcrService, ServiceError, TranslationService, TtsService,
};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const ML_URL_ENV: &str = "YOMIDEX_ML_URL";

/// HTTP client for the OCR/translation/TTS sidecar. One client implements
/// all three service traits; the reader core only ever sees the traits.
#[derive(Clone)]
pub struct MlServiceClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct OcrRequest<'a> {
    image_url: &'a str,
}

#[derive(Deserialize)]
struct OcrResponse {
    status: Option<String>,
    text: OcrPayload,
}

#[derive(Deserialize)]
struct OcrPayload {
    data: Vec<OcrItem>,
}

#[derive(Deserialize)]
struct OcrItem {
    text: String,
    bbox: [f32; 4],
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    target_lang: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    translated_text: String,
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
}

impl MlServiceClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("yomidex-tui/0.1.0")
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
        }
    }

    /// Reads the sidecar address from `YOMIDEX_ML_URL`, defaulting to the
    /// local development address.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var(ML_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        debug!("ML sidecar at {base_url}");
        Self::new(base_url)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl OcrService for MlServiceClient {
    fn recognize<'a>(
        &'a self,
        image_url: &'a str,
    ) -> BoxFuture<'a, Result<Vec<OcrFragment>, ServiceError>> {
        async move {
            let response: OcrResponse = self
                .client
                .post(self.endpoint("ocr"))
                .json(&OcrRequest { image_url })
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            if response.status.as_deref() == Some("error") {
                return Ok(Vec::new());
            }

            Ok(response
                .text
                .data
                .into_iter()
                .map(|item| OcrFragment {
                    text: item.text,
                    bbox: item.bbox,
                })
                .collect())
        }
        .boxed()
    }
}

impl TranslationService for MlServiceClient {
    fn translate<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String, ServiceError>> {
        async move {
            if text.trim().is_empty() {
                return Ok(text.to_string());
            }
            let response: TranslateResponse = self
                .client
                .post(self.endpoint("translate"))
                .json(&TranslateRequest {
                    text,
                    target_lang: "en",
                })
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(response.translated_text)
        }
        .boxed()
    }
}

impl TtsService for MlServiceClient {
    fn synthesize<'a>(
        &'a self,
        text: &'a str,
    ) -> BoxFuture<'a, Result<AudioHandle, ServiceError>> {
        async move {
            let response = self
                .client
                .post(self.endpoint("tts"))
                .json(&TtsRequest { text })
                .send()
                .await?
                .error_for_status()?;

            let media_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("audio/wav")
                .to_string();
            let bytes = response.bytes().await?;

            Ok(AudioHandle {
                media_type,
                bytes: Arc::new(bytes.to_vec()),
            })
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_duplicate_slashes() {
        let client = MlServiceClient::new("http://ml.example/".to_string());
        assert_eq!(client.endpoint("ocr"), "http://ml.example/api/v1/ocr");
    }

    #[test]
    fn test_ocr_response_parses_fragments() {
        let raw = r#"{
            "status": "ok",
            "text": { "data": [
                { "text": "こんにちは", "bbox": [10.0, 20.0, 120.0, 40.0] }
            ]}
        }"#;
        let response: OcrResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.text.data.len(), 1);
        assert_eq!(response.text.data[0].bbox[1], 20.0);
    }
}
