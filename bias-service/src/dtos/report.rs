use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportDownloadRequest {
    #[validate(length(min = 1, message = "reportId is required"))]
    pub report_id: String,

    pub format: String,
}
