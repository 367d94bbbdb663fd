//! HTTP client for uploading payment proofs to Cloudinary.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::ports::{ImageStore, UploadError};

/// Hard cap on decoded image size. Larger proofs are rejected before
/// any bytes leave the process.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Response from the Cloudinary upload endpoint
#[derive(Debug, Clone, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// HTTP client for the Cloudinary unsigned upload API
#[derive(Clone)]
pub struct CloudinaryClient {
    client: Client,
    upload_url: String,
    upload_preset: String,
}

impl CloudinaryClient {
    /// Creates a new CloudinaryClient for the given upload endpoint and preset
    pub fn new(upload_url: String, upload_preset: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        CloudinaryClient {
            client,
            upload_url,
            upload_preset,
        }
    }
}

/// Checks that a payment proof payload is an image the upload endpoint
/// will take: a base64 data URI under the size cap, or an http(s) URL
/// Cloudinary can fetch remotely.
fn validate_payload(data: &str) -> Result<(), UploadError> {
    if let Some((header, payload)) = data.split_once(',') {
        if header.starts_with("data:") {
            if !header.starts_with("data:image/") || !header.ends_with(";base64") {
                return Err(UploadError::Rejected(
                    "payment proof must be a base64-encoded image".to_string(),
                ));
            }
            let decoded = general_purpose::STANDARD
                .decode(payload)
                .map_err(|e| UploadError::Rejected(format!("invalid base64 payload: {}", e)))?;
            if decoded.len() > MAX_IMAGE_BYTES {
                return Err(UploadError::Rejected(format!(
                    "image exceeds {} byte limit",
                    MAX_IMAGE_BYTES
                )));
            }
            return Ok(());
        }
    }

    match Url::parse(data) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        _ => Err(UploadError::Rejected(
            "payment proof must be a data URI or http(s) URL".to_string(),
        )),
    }
}

#[async_trait]
impl ImageStore for CloudinaryClient {
    async fn upload(&self, data: &str) -> Result<String, UploadError> {
        validate_payload(data)?;

        let response = self
            .client
            .post(&self.upload_url)
            .form(&[
                ("file", data),
                ("upload_preset", self.upload_preset.as_str()),
            ])
            .send()
            .await
            .map_err(|e| UploadError::Failed(format!("upload request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(UploadError::Failed(format!(
                "upload endpoint returned {}",
                response.status()
            )));
        }

        let body = response
            .json::<UploadResponse>()
            .await
            .map_err(|e| UploadError::Failed(format!("invalid upload response: {}", e)))?;

        Ok(body.secure_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = CloudinaryClient::new(
            "https://api.cloudinary.com/v1_1/demo/image/upload".to_string(),
            "unsigned".to_string(),
        );
        assert_eq!(client.upload_preset, "unsigned");
    }

    #[test]
    fn test_accepts_image_data_uri() {
        let payload = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode([0u8; 64])
        );
        assert!(validate_payload(&payload).is_ok());
    }

    #[test]
    fn test_accepts_https_url() {
        assert!(validate_payload("https://cdn.example.com/proof.jpg").is_ok());
    }

    #[test]
    fn test_rejects_non_image_data_uri() {
        let payload = format!(
            "data:application/pdf;base64,{}",
            general_purpose::STANDARD.encode([0u8; 64])
        );
        assert!(matches!(
            validate_payload(&payload),
            Err(UploadError::Rejected(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_base64() {
        assert!(matches!(
            validate_payload("data:image/png;base64,not!!valid"),
            Err(UploadError::Rejected(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_image() {
        let payload = format!(
            "data:image/jpeg;base64,{}",
            general_purpose::STANDARD.encode(vec![0u8; MAX_IMAGE_BYTES + 1])
        );
        assert!(matches!(
            validate_payload(&payload),
            Err(UploadError::Rejected(_))
        ));
    }

    #[test]
    fn test_rejects_plain_text() {
        assert!(matches!(
            validate_payload("definitely not an image"),
            Err(UploadError::Rejected(_))
        ));
    }

    #[tokio::test]
    #[ignore]
    async fn test_upload_with_mock() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", "/image/upload")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"secure_url": "https://res.cloudinary.com/demo/proof.jpg"}"#)
            .create();

        let client = CloudinaryClient::new(
            format!("{}/image/upload", server.url()),
            "unsigned".to_string(),
        );
        let url = client
            .upload("https://cdn.example.com/proof.jpg")
            .await
            .unwrap();
        assert_eq!(url, "https://res.cloudinary.com/demo/proof.jpg");
    }

    #[tokio::test]
    #[ignore]
    async fn test_upload_server_error() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", "/image/upload")
            .with_status(500)
            .create();

        let client = CloudinaryClient::new(
            format!("{}/image/upload", server.url()),
            "unsigned".to_string(),
        );
        let result = client.upload("https://cdn.example.com/proof.jpg").await;
        assert!(matches!(result, Err(UploadError::Failed(_))));
    }
}
