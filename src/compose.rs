use std::path::Path;
use std::sync::Arc;

use reqwest::multipart::{Form, Part};

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::geolocation::GeolocationGate;
use crate::models::CreatedPost;

pub const MAX_IMAGE_BYTES: u64 = 16 * 1024 * 1024;
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Publishes a photo tagged with a fresh position fix.
pub struct PostComposer {
    api: ApiClient,
    gate: Arc<GeolocationGate>,
}

impl PostComposer {
    pub fn new(api: ApiClient, gate: Arc<GeolocationGate>) -> Self {
        Self { api, gate }
    }

    pub async fn publish(&self, image: &Path, caption: &str) -> ClientResult<CreatedPost> {
        let file_name = validate_image(image).await?;

        let position = self.gate.acquire().await?;

        let bytes = tokio::fs::read(image).await?;
        let mime = mime_guess::from_path(image).first_or_octet_stream();
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime.essence_str())?;

        let form = Form::new()
            .part("image", part)
            .text("caption", caption.to_string())
            .text("latitude", position.latitude.to_string())
            .text("longitude", position.longitude.to_string());

        let created = self.api.create_post(form).await?;
        tracing::info!("Published post {} at {}", created.id, position);
        Ok(created)
    }
}

/// Check the file locally and return the name to upload it under.
pub async fn validate_image(image: &Path) -> ClientResult<String> {
    let extension = image
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ClientError::validation(format!(
            "Invalid file type. Allowed: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    let metadata = match tokio::fs::metadata(image).await {
        Ok(m) if m.is_file() => m,
        _ => return Err(ClientError::validation("Please select an image")),
    };
    if metadata.len() > MAX_IMAGE_BYTES {
        return Err(ClientError::validation("Image must be less than 16MB"));
    }

    image
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| ClientError::validation("Please select an image"))
}
