use std::{sync::Arc, time::Duration, time::Instant};

use tokio::{task, time};

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{
        CancellationFlag, DecodingConfig, EncodedInput, GenerationOutput, ModelMetadata,
    },
};

/// A loaded tokenizer + encoder-decoder pair. Implementations must not mutate
/// weights after construction; calls may arrive from several blocking
/// threads at once.
pub trait Seq2SeqModel: Send + Sync + 'static {
    /// Tokenizes into exactly `max_length` positions.
    fn encode(&self, text: &str, max_length: usize) -> Result<EncodedInput, ServiceError>;

    /// Beam-search decodes, returning generated ids without control tokens.
    fn generate(
        &self,
        input: &EncodedInput,
        config: &DecodingConfig,
        cancel: &CancellationFlag,
    ) -> Result<Vec<u32>, ServiceError>;

    fn decode(&self, ids: &[u32]) -> Result<String, ServiceError>;

    fn metadata(&self) -> ModelMetadata;
}

/// Process-wide handle to the model, created once at startup and shared by
/// every request.
#[derive(Clone)]
pub struct ModelRuntime {
    model: Arc<dyn Seq2SeqModel>,
    max_input_len: usize,
    timeout: Option<Duration>,
}

impl ModelRuntime {
    pub fn new(model: Arc<dyn Seq2SeqModel>, config: &AppConfig) -> Self {
        Self {
            model,
            max_input_len: config.max_input_len,
            timeout: config.generation_timeout,
        }
    }

    /// Loads the TorchScript model from `config.model_dir`.
    #[cfg(feature = "tch-backend")]
    pub fn load(config: &AppConfig) -> Result<Self, ServiceError> {
        let model = crate::model::TorchSeq2Seq::load(config)?;
        Ok(Self::new(Arc::new(model), config))
    }

    pub fn metadata(&self) -> ModelMetadata {
        self.model.metadata()
    }

    /// Encode, beam-search decode and detokenize on the calling thread.
    pub fn generate_blocking(
        &self,
        prompt: &str,
        config: &DecodingConfig,
        cancel: &CancellationFlag,
    ) -> Result<GenerationOutput, ServiceError> {
        let start = Instant::now();
        let input = self.model.encode(prompt, self.max_input_len)?;
        if input.truncated {
            tracing::debug!(
                max_input_len = self.max_input_len,
                "prompt exceeded input length and was truncated"
            );
        }

        let ids = self.model.generate(&input, config, cancel)?;
        let text = self.model.decode(&ids)?;

        tracing::debug!(
            beams = config.num_beams,
            tokens = ids.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "generation finished"
        );

        Ok(GenerationOutput {
            text,
            input_truncated: input.truncated,
            tokens_generated: ids.len(),
        })
    }

    pub async fn generate(
        &self,
        prompt: String,
        config: DecodingConfig,
    ) -> Result<GenerationOutput, ServiceError> {
        self.generate_cancellable(prompt, config, CancellationFlag::new())
            .await
    }

    /// Runs one generation on the blocking pool. When the configured time
    /// limit passes, `cancel` is raised so the decoder stops at its next step
    /// and `Timeout` is returned.
    pub async fn generate_cancellable(
        &self,
        prompt: String,
        config: DecodingConfig,
        cancel: CancellationFlag,
    ) -> Result<GenerationOutput, ServiceError> {
        let runtime = self.clone();
        let worker_cancel = cancel.clone();
        let handle = task::spawn_blocking(move || {
            runtime.generate_blocking(&prompt, &config, &worker_cancel)
        });

        let joined = match self.timeout {
            Some(limit) => match time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    cancel.cancel();
                    tracing::warn!(limit_secs = limit.as_secs(), "generation timed out");
                    return Err(ServiceError::Timeout(limit.as_secs()));
                }
            },
            None => handle.await,
        };

        joined.map_err(|err| ServiceError::Inference(format!("inference task failed: {err}")))?
    }
}
