use crate::dtos::ReportDownloadRequest;
use crate::middleware::AuthUser;
use crate::services::reports::export_report;
use crate::startup::AppState;
use crate::utils::ValidatedJson;
use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::IntoResponse,
};
use service_core::error::AppError;

pub async fn download_report(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<ReportDownloadRequest>,
) -> Result<impl IntoResponse, AppError> {
    let rendered = export_report(
        state.store.as_ref(),
        &claims.user_id,
        &req.report_id,
        &req.format,
    )
    .await?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename={}",
        rendered.file_name
    ))
    .map_err(|e| AppError::InternalError(anyhow::anyhow!("Invalid file name header: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(rendered.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        rendered.bytes,
    ))
}
