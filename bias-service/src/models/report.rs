//! Bias report models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The structured block the model appends to its reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFindings {
    pub bias_detected: bool,
    pub reasons: Vec<String>,
    pub fixes: Vec<String>,
}

/// A persisted report. Only written for turns where bias was detected and
/// never updated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasReport {
    #[serde(rename = "_id")]
    pub id: String,

    pub user_id: String,

    pub chat_id: String,

    pub bias_detected: bool,

    pub reasons: Vec<String>,

    pub fixes: Vec<String>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl BiasReport {
    pub fn new(
        user_id: String,
        chat_id: String,
        findings: ReportFindings,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            chat_id,
            bias_detected: findings.bias_detected,
            reasons: findings.reasons,
            fixes: findings.fixes,
            created_at,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}
