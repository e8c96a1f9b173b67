use crate::dtos::UploadResponse;
use crate::middleware::AuthUser;
use crate::startup::AppState;
use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use std::borrow::Cow;
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

const FILE_FIELD: &str = "file";

fn file_rejected(code: &'static str, message: String) -> AppError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Owned(message));
    let mut errors = ValidationErrors::new();
    errors.add(FILE_FIELD, error);
    AppError::ValidationFailure(errors)
}

const MAX_EXTENSION_LEN: usize = 16;

/// Storage key for an upload: `{user_id}/{uuid}.{ext}`. The extension is
/// omitted when the original name has none or it is not plain ASCII
/// alphanumerics, so keys stay safe inside object URLs.
pub fn storage_key(user_id: &str, original_name: &str) -> String {
    let extension = std::path::Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        });

    match extension {
        Some(ext) => format!("{}/{}.{}", user_id, Uuid::new_v4(), ext),
        None => format!("{}/{}", user_id, Uuid::new_v4()),
    }
}

pub async fn upload_file(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
    })? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or("unnamed").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e)))?
            .to_vec();

        upload = Some((original_name, content_type, data));
        break;
    }

    let (original_name, content_type, data) =
        upload.ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("No file uploaded")))?;

    if data.is_empty() {
        return Err(file_rejected("empty", "Uploaded file is empty".to_string()));
    }
    if data.len() > state.upload_max_bytes {
        return Err(file_rejected(
            "too_large",
            format!("File too large (max {} bytes)", state.upload_max_bytes),
        ));
    }

    let key = storage_key(&claims.user_id, &original_name);
    let size = data.len();

    state
        .storage
        .upload(&key, data, &content_type)
        .await
        .map_err(|e| {
            tracing::error!(key = %key, error = %e, "Failed to store upload");
            match e {
                AppError::UpstreamFailure(_) => e,
                other => AppError::UpstreamFailure(anyhow::anyhow!(other.to_string())),
            }
        })?;

    tracing::info!(key = %key, size = size, file_name = %original_name, "File uploaded");

    Ok(Json(UploadResponse {
        file_url: state.storage.public_url(&key),
        file_name: original_name,
        file_size: size,
    }))
}
