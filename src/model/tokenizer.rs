use std::path::Path;

use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use crate::{error::ServiceError, model::EncodedInput};

/// Tokenizer configured to produce fixed-length encoder inputs.
#[derive(Clone)]
pub struct TextCodec {
    tokenizer: Tokenizer,
    max_input_len: usize,
    pad_token_id: u32,
}

impl TextCodec {
    pub fn from_file(
        path: &Path,
        max_input_len: usize,
        pad_token_id: u32,
    ) -> Result<Self, ServiceError> {
        let tokenizer =
            Tokenizer::from_file(path).map_err(|e| ServiceError::Tokenizer(e.to_string()))?;
        Self::new(tokenizer, max_input_len, pad_token_id)
    }

    pub fn new(
        mut tokenizer: Tokenizer,
        max_input_len: usize,
        pad_token_id: u32,
    ) -> Result<Self, ServiceError> {
        configure(&mut tokenizer, max_input_len, pad_token_id)?;
        Ok(Self {
            tokenizer,
            max_input_len,
            pad_token_id,
        })
    }

    pub fn max_input_len(&self) -> usize {
        self.max_input_len
    }

    /// Tokenizes `text`, truncating or padding to exactly `max_length` ids.
    pub fn encode(&self, text: &str, max_length: usize) -> Result<EncodedInput, ServiceError> {
        let encoded = if max_length == self.max_input_len {
            self.tokenizer.encode(text, true)
        } else {
            let mut tokenizer = self.tokenizer.clone();
            configure(&mut tokenizer, max_length, self.pad_token_id)?;
            tokenizer.encode(text, true)
        };
        let encoding = encoded.map_err(|e| ServiceError::Tokenizer(e.to_string()))?;

        Ok(EncodedInput {
            ids: encoding.get_ids().to_vec(),
            attention_mask: encoding.get_attention_mask().to_vec(),
            truncated: !encoding.get_overflowing().is_empty(),
        })
    }

    /// Detokenizes, dropping special tokens such as padding and end-of-sequence.
    pub fn decode(&self, ids: &[u32]) -> Result<String, ServiceError> {
        self.tokenizer
            .decode(ids, true)
            .map_err(|e| ServiceError::Tokenizer(e.to_string()))
    }
}

fn configure(
    tokenizer: &mut Tokenizer,
    max_length: usize,
    pad_token_id: u32,
) -> Result<(), ServiceError> {
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| ServiceError::Tokenizer(e.to_string()))?;

    let pad_token = tokenizer
        .id_to_token(pad_token_id)
        .unwrap_or_else(|| "<pad>".to_string());
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::Fixed(max_length),
        pad_id: pad_token_id,
        pad_token,
        ..Default::default()
    }));
    Ok(())
}
