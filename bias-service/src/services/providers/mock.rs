//! Mock provider for local development and tests.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use crate::services::extractor::{REPORT_END_MARKER, REPORT_START_MARKER};
use async_trait::async_trait;

/// Mock text provider. Replies with a fixed text if one was given,
/// otherwise echoes the prompt followed by an empty bias report block.
pub struct MockTextProvider {
    enabled: bool,
    reply: Option<String>,
}

impl MockTextProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            reply: None,
        }
    }

    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            enabled: true,
            reply: Some(reply.into()),
        }
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate(
        &self,
        _system_prompt: &str,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotConfigured(
                "Mock text provider not enabled".to_string(),
            ));
        }

        let text = self.reply.clone().unwrap_or_else(|| {
            format!(
                "Mock response for: {}\n\n{}\n{{\"bias_detected\": false, \"reasons\": [], \"fixes\": []}}\n{}",
                prompt, REPORT_START_MARKER, REPORT_END_MARKER
            )
        });

        Ok(ProviderResponse {
            input_tokens: (prompt.len() / 4) as u32,
            output_tokens: (text.len() / 4) as u32,
            text,
            finish_reason: FinishReason::Complete,
        })
    }

    fn model(&self) -> &str {
        "mock"
    }
}
