//! Cloudinary image uploads.
//!
//! Product images are sent as signed uploads. The signature is the hex
//! SHA-256 of the sorted upload parameters followed by the API secret, so the
//! Cloudinary account must be set to SHA-256 signatures.

use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::config::CloudinaryConfig;

/// Cloudinary upload API base URL.
const BASE_URL: &str = "https://api.cloudinary.com/v1_1";

/// Largest accepted image (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Errors that can occur when uploading to Cloudinary.
#[derive(Debug, Error)]
pub enum CloudinaryError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The file is not something we upload.
    #[error("Invalid image: {0}")]
    InvalidImage(String),
}

/// An image received from the seller's form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Reject empty, oversized or non-image files.
    ///
    /// # Errors
    ///
    /// Returns `CloudinaryError::InvalidImage` describing the problem.
    pub fn validate(&self) -> Result<(), CloudinaryError> {
        if self.bytes.is_empty() {
            return Err(CloudinaryError::InvalidImage(format!(
                "{} is empty",
                self.file_name
            )));
        }
        if self.bytes.len() > MAX_IMAGE_BYTES {
            return Err(CloudinaryError::InvalidImage(format!(
                "{} is larger than 5 MB",
                self.file_name
            )));
        }
        if !self.content_type.starts_with("image/") {
            return Err(CloudinaryError::InvalidImage(format!(
                "{} is not an image",
                self.file_name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Cloudinary upload client.
#[derive(Clone)]
pub struct CloudinaryClient {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: SecretString,
    folder: String,
}

impl CloudinaryClient {
    /// Create a new Cloudinary client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CloudinaryConfig) -> Result<Self, CloudinaryError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            folder: config.folder.clone(),
        })
    }

    /// Timestamp and signature for an upload made at `now`.
    fn upload_signature(&self, now: DateTime<Utc>) -> (String, String) {
        let timestamp = now.timestamp().to_string();
        let signature = sign_params(
            &[("folder", &self.folder), ("timestamp", &timestamp)],
            self.api_secret.expose_secret(),
        );
        (timestamp, signature)
    }

    /// Upload one image and return its `secure_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the image is invalid, the request fails, or
    /// Cloudinary rejects the upload.
    pub async fn upload_image(&self, image: ImageUpload) -> Result<String, CloudinaryError> {
        image.validate()?;

        let (timestamp, signature) = self.upload_signature(Utc::now());

        let file_name = image.file_name.clone();
        let part = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.content_type)
            .map_err(|e| CloudinaryError::InvalidImage(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.folder.clone())
            .text("signature", signature);

        let url = format!("{BASE_URL}/{}/image/upload", self.cloud_name);
        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(CloudinaryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| CloudinaryError::Parse(e.to_string()))?;

        debug!(file = %file_name, url = %uploaded.secure_url, "Uploaded product image");
        Ok(uploaded.secure_url)
    }
}

/// Sign upload parameters: `sha256("k1=v1&k2=v2" + secret)` with keys sorted.
#[must_use]
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
