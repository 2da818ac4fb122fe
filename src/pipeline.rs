use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{DecodingConfig, ModelRuntime},
    prompt::{StyleTag, build_prompt, build_rewrite_prompt},
};

/// Result of one summarization request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryArtifact {
    pub style: StyleTag,
    pub summary: String,
    pub formal: String,
    /// The source did not fit the encoder input and its tail was dropped.
    pub truncated: bool,
}

/// Two-stage pipeline: a style-conditioned summary, then a formal rewrite of
/// that summary with its own fixed decoding parameters.
#[derive(Clone)]
pub struct Summarizer {
    runtime: ModelRuntime,
    summary_config: DecodingConfig,
    formal_config: DecodingConfig,
}

impl Summarizer {
    pub fn new(runtime: ModelRuntime, config: &AppConfig) -> Self {
        Self {
            runtime,
            summary_config: config.default_decoding(),
            formal_config: config.formal_decoding(),
        }
    }

    pub async fn summarize_request(
        &self,
        text: &str,
        style: StyleTag,
    ) -> Result<SummaryArtifact, ServiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::missing_text());
        }

        let start = Instant::now();
        let prompt = build_prompt(text, style);
        let primary = self.runtime.generate(prompt, self.summary_config).await?;
        info!(
            %style,
            chars = text.len(),
            beams = self.summary_config.num_beams,
            tokens = primary.tokens_generated,
            truncated = primary.input_truncated,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "summary generated"
        );

        // A blank summary gives the rewrite nothing to work with.
        let formal = if primary.text.trim().is_empty() {
            info!(%style, "summary is blank; skipping formal rewrite");
            String::new()
        } else {
            let rewrite = self
                .runtime
                .generate(build_rewrite_prompt(&primary.text), self.formal_config)
                .await?;
            info!(
                beams = self.formal_config.num_beams,
                tokens = rewrite.tokens_generated,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "formal rewrite generated"
            );
            rewrite.text
        };

        Ok(SummaryArtifact {
            style,
            summary: primary.text,
            formal,
            truncated: primary.input_truncated,
        })
    }
}
