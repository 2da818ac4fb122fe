#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use t5_summarizer_service::{
    AppConfig, ModelRuntime, ServiceError, Summarizer,
    model::{CancellationFlag, DecodingConfig, EncodedInput, ModelMetadata, Seq2SeqModel},
};

/// Byte-level stand-in for the T5 model. Its "generation" echoes the prompt
/// body (everything after the instruction line) tagged with the beam count,
/// so tests can see which decoding parameters produced which output.
#[derive(Default)]
pub struct EchoModel {
    pub generate_calls: AtomicUsize,
    pub seen_configs: Mutex<Vec<DecodingConfig>>,
    pub seen_prompts: Mutex<Vec<String>>,
    /// Generate nothing at all.
    pub blank: bool,
    /// Keep decoding this long unless cancelled.
    pub delay: Option<Duration>,
    pub saw_cancel: AtomicBool,
}

impl EchoModel {
    pub fn calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

impl Seq2SeqModel for EchoModel {
    fn encode(&self, text: &str, max_length: usize) -> Result<EncodedInput, ServiceError> {
        self.seen_prompts.lock().push(text.to_string());
        let mut ids: Vec<u32> = text.bytes().map(u32::from).collect();
        let truncated = ids.len() > max_length;
        ids.truncate(max_length);
        let mut attention_mask = vec![1; ids.len()];
        ids.resize(max_length, 0);
        attention_mask.resize(max_length, 0);
        Ok(EncodedInput {
            ids,
            attention_mask,
            truncated,
        })
    }

    fn generate(
        &self,
        input: &EncodedInput,
        config: &DecodingConfig,
        cancel: &CancellationFlag,
    ) -> Result<Vec<u32>, ServiceError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_configs.lock().push(*config);

        if let Some(delay) = self.delay {
            let start = Instant::now();
            while start.elapsed() < delay {
                if cancel.is_cancelled() {
                    self.saw_cancel.store(true, Ordering::SeqCst);
                    return Err(ServiceError::Cancelled);
                }
                thread::sleep(Duration::from_millis(5));
            }
        }

        if self.blank {
            return Ok(Vec::new());
        }

        let attended = &input.ids[..input.attended()];
        let body = match attended.iter().position(|&b| b == u32::from(b'\n')) {
            Some(newline) => &attended[newline + 1..],
            None => attended,
        };
        let mut out: Vec<u32> = format!("[b{}] ", config.num_beams)
            .bytes()
            .map(u32::from)
            .collect();
        out.extend_from_slice(body);
        Ok(out)
    }

    fn decode(&self, ids: &[u32]) -> Result<String, ServiceError> {
        let bytes: Vec<u8> = ids
            .iter()
            .filter(|&&id| id != 0)
            .map(|&id| id as u8)
            .collect();
        String::from_utf8(bytes).map_err(|e| ServiceError::Tokenizer(e.to_string()))
    }

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            name: "echo".into(),
            device: "Cpu".into(),
            max_input_len: 0,
            size_bytes: 0,
        }
    }
}

pub fn summarizer_with(model: Arc<EchoModel>, config: &AppConfig) -> Summarizer {
    Summarizer::new(ModelRuntime::new(model, config), config)
}

pub fn summarizer(model: Arc<EchoModel>) -> Summarizer {
    summarizer_with(model, &AppConfig::default())
}
