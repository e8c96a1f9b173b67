//! Sends one user message (plus optional document text) to the language
//! model under the BiasBuster system instruction.

use crate::services::extractor::{REPORT_END_MARKER, REPORT_START_MARKER};
use crate::services::providers::{GenerationParams, ProviderError, TextProvider};
use std::sync::Arc;
use std::time::Instant;

/// Document text beyond this many characters is not sent to the model.
pub const MAX_DOCUMENT_CHARS: usize = 5000;

/// Visible reply used when the model call fails.
pub const FALLBACK_REPLY: &str = "I encountered an error while processing your request.";

/// System instruction sent with every turn.
pub fn system_prompt() -> String {
    format!(
        r#"You are BiasBuster, an AI assistant that detects bias in datasets, AI models, and text.
Your task is to:
1. Respond naturally to the user's query
2. Analyze the content for potential bias
3. Return your analysis in the following JSON format at the end of your response:

{start}
{{
    "bias_detected": true/false,
    "reasons": ["reason1", "reason2"],
    "fixes": ["fix1", "fix2"]
}}
{end}

Types of bias to check for:
- Gender bias
- Racial/ethnic bias
- Age bias
- Socioeconomic bias
- Cultural bias
- Selection bias
- Confirmation bias
- Sampling bias
- Algorithmic bias
"#,
        start = REPORT_START_MARKER,
        end = REPORT_END_MARKER
    )
}

/// Build the user prompt. Document text is cut to [`MAX_DOCUMENT_CHARS`]
/// characters; an empty document is treated as absent.
pub fn compose_prompt(message: &str, document: Option<&str>) -> String {
    match document.filter(|text| !text.is_empty()) {
        Some(text) => {
            let excerpt: String = text.chars().take(MAX_DOCUMENT_CHARS).collect();
            format!("{}\n\nFile content:\n{}", message, excerpt)
        }
        None => message.to_string(),
    }
}

#[derive(Clone)]
pub struct ModelReplyService {
    provider: Arc<dyn TextProvider>,
    params: GenerationParams,
    system_prompt: Arc<str>,
}

impl ModelReplyService {
    pub fn new(provider: Arc<dyn TextProvider>, params: GenerationParams) -> Self {
        Self {
            provider,
            params,
            system_prompt: system_prompt().into(),
        }
    }

    /// Raw model reply for one turn.
    pub async fn reply(&self, message: &str, document: Option<&str>) -> Result<String, ProviderError> {
        let prompt = compose_prompt(message, document);
        let start = Instant::now();

        let response = self
            .provider
            .generate(&self.system_prompt, &prompt, &self.params)
            .await;

        match &response {
            Ok(r) => tracing::info!(
                model = %self.provider.model(),
                input_tokens = r.input_tokens,
                output_tokens = r.output_tokens,
                finish_reason = ?r.finish_reason,
                duration_ms = start.elapsed().as_millis() as u64,
                "Model reply received"
            ),
            Err(e) => tracing::warn!(
                model = %self.provider.model(),
                error = %e,
                duration_ms = start.elapsed().as_millis() as u64,
                "Model call failed"
            ),
        }

        response.map(|r| r.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_without_document_is_the_message() {
        assert_eq!(compose_prompt("hello", None), "hello");
        assert_eq!(compose_prompt("hello", Some("")), "hello");
    }

    #[test]
    fn document_is_appended_after_separator() {
        assert_eq!(
            compose_prompt("Check this", Some("name,gender\nbob,m")),
            "Check this\n\nFile content:\nname,gender\nbob,m"
        );
    }

    #[test]
    fn document_is_truncated_by_characters() {
        let document = "é".repeat(MAX_DOCUMENT_CHARS + 10);
        let prompt = compose_prompt("q", Some(&document));

        let excerpt = prompt.strip_prefix("q\n\nFile content:\n").unwrap();
        assert_eq!(excerpt.chars().count(), MAX_DOCUMENT_CHARS);
    }

    #[test]
    fn system_prompt_names_both_markers() {
        let prompt = system_prompt();
        assert!(prompt.contains(REPORT_START_MARKER));
        assert!(prompt.contains(REPORT_END_MARKER));
        assert!(prompt.contains("\"bias_detected\": true/false"));
    }
}
