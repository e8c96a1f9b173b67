//! Separates the delimited bias-report block from a model reply.
//!
//! Extraction is total: a missing, misplaced or malformed block yields the
//! raw reply unchanged together with an empty report.

use crate::models::ReportFindings;

pub const REPORT_START_MARKER: &str = "---BIAS_REPORT_START---";
pub const REPORT_END_MARKER: &str = "---BIAS_REPORT_END---";

/// Visible reply text and the findings parsed out of a raw model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub reply: String,
    pub findings: ReportFindings,
}

impl Extraction {
    fn unparsed(raw: &str) -> Self {
        Self {
            reply: raw.to_string(),
            findings: ReportFindings::default(),
        }
    }
}

pub fn extract_report(raw: &str) -> Extraction {
    let Some(start) = raw.find(REPORT_START_MARKER) else {
        return Extraction::unparsed(raw);
    };
    let body_start = start + REPORT_START_MARKER.len();
    let Some(body_len) = raw[body_start..].find(REPORT_END_MARKER) else {
        return Extraction::unparsed(raw);
    };

    let body = raw[body_start..body_start + body_len].trim();

    match serde_json::from_str::<ReportFindings>(body) {
        Ok(findings) => Extraction {
            reply: raw[..start].trim().to_string(),
            findings,
        },
        Err(e) => {
            tracing::debug!(error = %e, "Bias report block did not parse; keeping raw reply");
            Extraction::unparsed(raw)
        }
    }
}
