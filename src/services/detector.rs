use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::models::landmarks::Hand;

#[derive(Debug, Error)]
pub enum DetectError {
    /// The detector could not read the payload as an image.
    #[error("image could not be decoded: {0}")]
    Decode(String),
    #[error("landmark detector unavailable: {0}")]
    Unavailable(String),
}

/// Finds hands in an image. An empty result means no hand was found.
#[async_trait]
pub trait LandmarkDetector: Send + Sync {
    async fn detect(&self, image: &[u8]) -> Result<Vec<Hand>, DetectError>;
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    hands: Vec<Hand>,
}

/// Talks to an inference sidecar: the raw image bytes go in the request
/// body and `{"hands": [[{"x":..,"y":..,"z":..}, ...], ...]}` comes back.
#[derive(Clone)]
pub struct HttpLandmarkDetector {
    client: reqwest::Client,
    url: String,
}

impl HttpLandmarkDetector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl LandmarkDetector for HttpLandmarkDetector {
    #[instrument(skip(self, image), fields(bytes = image.len()))]
    async fn detect(&self, image: &[u8]) -> Result<Vec<Hand>, DetectError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Landmark detector request failed");
                DetectError::Unavailable(e.to_string())
            })?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                let reason = response.text().await.unwrap_or_default();
                return Err(DetectError::Decode(reason));
            }
            status if !status.is_success() => {
                error!(%status, "Landmark detector returned an error");
                return Err(DetectError::Unavailable(format!(
                    "detector returned {}",
                    status
                )));
            }
            _ => {}
        }

        let body: DetectResponse = response
            .json()
            .await
            .map_err(|e| {
                DetectError::Unavailable(format!("unreadable detector reply: {}", e))
            })?;

        debug!(hands = body.hands.len(), "Landmark detection finished");
        Ok(body.hands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::json;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn spawn_sidecar() -> SocketAddr {
        let app = Router::new()
            .route(
                "/detect",
                post(|| async {
                    Json(json!({ "hands": [[{ "x": 0.5, "y": 0.25, "z": -0.01 }]] }))
                }),
            )
            .route(
                "/unreadable",
                post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "bad img") }),
            )
            .route("/broken", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn detector(addr: SocketAddr, path: &str) -> HttpLandmarkDetector {
        HttpLandmarkDetector::new(format!("http://{}{}", addr, path))
    }

    #[tokio::test]
    async fn successful_reply_yields_hands() {
        let addr = spawn_sidecar().await;
        let hands = detector(addr, "/detect").detect(b"palm").await.unwrap();

        assert_eq!(hands.len(), 1);
        assert_eq!(hands[0].landmarks[0].y, 0.25);
    }

    #[tokio::test]
    async fn rejected_image_is_a_decode_error() {
        let addr = spawn_sidecar().await;
        let err = detector(addr, "/unreadable").detect(b"palm").await.unwrap_err();

        assert!(matches!(err, DetectError::Decode(reason) if reason == "bad img"));
    }

    #[tokio::test]
    async fn server_error_means_unavailable() {
        let addr = spawn_sidecar().await;
        let err = detector(addr, "/broken").detect(b"palm").await.unwrap_err();

        assert!(matches!(err, DetectError::Unavailable(reason) if reason.contains("500")));
    }

    #[tokio::test]
    async fn refused_connection_means_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = detector(addr, "/detect").detect(b"palm").await.unwrap_err();
        assert!(matches!(err, DetectError::Unavailable(_)));
    }

    #[test]
    fn detector_reply_parses_nested_landmarks() {
        let reply = r#"{"hands": [[
            {"x": 0.5, "y": 0.25, "z": -0.01},
            {"x": 0.1, "y": 0.2, "z": 0.3}
        ]]}"#;
        let parsed: DetectResponse = serde_json::from_str(reply).unwrap();

        assert_eq!(parsed.hands.len(), 1);
        assert_eq!(parsed.hands[0].landmarks.len(), 2);
        assert_eq!(parsed.hands[0].landmarks[0].x, 0.5);
    }

    #[test]
    fn missing_hands_field_means_no_detection() {
        let parsed: DetectResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.hands.is_empty());
    }
}
