//! Multipart parsing shared by the image upload handlers

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use picshare_core::AppError;

use crate::state::UploadConfig;

/// Message returned when the declared content type is not an allowed image type.
pub const INVALID_IMAGE_FORMAT: &str = "Invalid image format";

/// The `file` part of an upload, fully read and checked against the limits.
#[derive(Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Parsed `multipart/form-data` body of an image upload.
#[derive(Debug, Default)]
pub struct ImageForm {
    pub file: Option<UploadedFile>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl ImageForm {
    pub fn require_file(&mut self) -> Result<UploadedFile, AppError> {
        self.file
            .take()
            .ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the upload limit".to_string())
    } else {
        AppError::InvalidInput(format!("Failed to read multipart: {}", e.body_text()))
    }
}

/// Normalize MIME type by stripping parameters (e.g. "image/jpeg; charset=utf-8" -> "image/jpeg").
fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_lowercase()
}

/// Validate content type against the allow-list. Compares the normalized MIME type only.
pub fn validate_content_type(content_type: &str, allowed_types: &[String]) -> Result<String, AppError> {
    let normalized = normalize_mime_type(content_type);
    if !allowed_types.iter().any(|ct| *ct == normalized) {
        return Err(AppError::InvalidInput(INVALID_IMAGE_FORMAT.to_string()));
    }
    Ok(normalized)
}

/// Keep only the last path segment of a client-supplied filename.
fn sanitize_filename(raw: Option<&str>) -> String {
    raw.and_then(|name| name.rsplit(['/', '\\']).next())
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or("upload")
        .to_string()
}

async fn read_file_field(
    mut field: Field<'_>,
    config: &UploadConfig,
) -> Result<UploadedFile, AppError> {
    let filename = sanitize_filename(field.file_name());
    let declared = field
        .content_type()
        .ok_or_else(|| AppError::InvalidInput(INVALID_IMAGE_FORMAT.to_string()))?
        .to_string();
    // Rejected before any bytes are read.
    let content_type = validate_content_type(&declared, &config.allowed_content_types)?;

    let mut data = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if data.len() + chunk.len() > config.max_file_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File size exceeds maximum allowed size of {} MB",
                config.max_file_size / 1024 / 1024
            )));
        }
        data.extend_from_slice(&chunk);
    }

    if data.is_empty() {
        return Err(AppError::InvalidInput("Uploaded file is empty".to_string()));
    }

    Ok(UploadedFile {
        filename,
        content_type,
        data,
    })
}

/// Read an image upload form: one `file` part plus optional `title` and
/// `description` text parts. Unknown parts are ignored.
pub async fn extract_image_form(
    mut multipart: Multipart,
    config: &UploadConfig,
) -> Result<ImageForm, AppError> {
    let mut form = ImageForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        match field_name.as_str() {
            "file" => {
                if form.file.is_some() {
                    return Err(AppError::InvalidInput(
                        "Multiple file fields are not allowed; send exactly one field named 'file'"
                            .to_string(),
                    ));
                }
                form.file = Some(read_file_field(field, config).await?);
            }
            "title" => form.title = Some(field.text().await.map_err(multipart_error)?),
            "description" => {
                let text = field.text().await.map_err(multipart_error)?;
                form.description = Some(text).filter(|d| !d.is_empty());
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    Ok(form)
}
