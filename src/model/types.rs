use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Beam-search parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodingConfig {
    /// Maximum decoder length, counting the decoder start token.
    pub max_length: usize,
    pub num_beams: usize,
    pub length_penalty: f32,
    pub repetition_penalty: f32,
    pub early_stopping: bool,
}

impl DecodingConfig {
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }
}

/// Fixed-length encoder input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedInput {
    pub ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    /// Set when the prompt did not fit and trailing tokens were dropped.
    pub truncated: bool,
}

impl EncodedInput {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of non-padding positions.
    pub fn attended(&self) -> usize {
        self.attention_mask.iter().filter(|&&m| m != 0).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutput {
    pub text: String,
    pub input_truncated: bool,
    pub tokens_generated: usize,
}

#[derive(Debug, Clone)]
pub struct ModelMetadata {
    pub name: String,
    pub device: String,
    pub max_input_len: usize,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub pad_token_id: u32,
    pub eos_token_id: u32,
    pub decoder_start_token_id: u32,
}

impl Default for SpecialTokens {
    // T5 conventions
    fn default() -> Self {
        Self {
            pad_token_id: 0,
            eos_token_id: 1,
            decoder_start_token_id: 0,
        }
    }
}

/// Cooperative stop signal checked between decoding steps.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
