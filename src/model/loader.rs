use std::{fs, path::Path};

use parking_lot::Mutex;
use serde::Deserialize;
use tch::{Device, IValue, Kind, Tensor, no_grad};

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{
        CancellationFlag, DecodingConfig, EncodedInput, ModelMetadata, Seq2SeqModel,
        SpecialTokens, TextCodec,
        beam::{StepScorer, beam_search},
    },
};

const TOKENIZER_FILE: &str = "tokenizer.json";
const ENCODER_FILE: &str = "encoder.pt";
const DECODER_FILE: &str = "decoder.pt";
const CONFIG_FILE: &str = "config.json";

/// Token ids from the exported `config.json`; absent keys keep T5 defaults.
#[derive(Debug, Default, Deserialize)]
struct ExportedConfig {
    pad_token_id: Option<u32>,
    eos_token_id: Option<u32>,
    decoder_start_token_id: Option<u32>,
}

/// Traced T5 encoder and decoder with their tokenizer.
pub struct TorchSeq2Seq {
    codec: TextCodec,
    encoder: Mutex<tch::CModule>,
    decoder: Mutex<tch::CModule>,
    special: SpecialTokens,
    device: Device,
    size_bytes: u64,
}

impl TorchSeq2Seq {
    pub fn load(config: &AppConfig) -> Result<Self, ServiceError> {
        let dir = config.model_dir.as_path();
        if !dir.is_dir() {
            return Err(ServiceError::Other(format!(
                "model directory missing: {}",
                dir.display()
            )));
        }

        let special = read_special_tokens(&dir.join(CONFIG_FILE))?;
        let codec = TextCodec::from_file(
            &require(dir, TOKENIZER_FILE)?,
            config.max_input_len,
            special.pad_token_id,
        )?;

        let encoder_path = require(dir, ENCODER_FILE)?;
        let decoder_path = require(dir, DECODER_FILE)?;
        let size_bytes = fs::metadata(&encoder_path)?.len() + fs::metadata(&decoder_path)?.len();

        Ok(Self {
            codec,
            encoder: Mutex::new(load_module(&encoder_path, config.device)?),
            decoder: Mutex::new(load_module(&decoder_path, config.device)?),
            special,
            device: config.device,
            size_bytes,
        })
    }
}

fn require(dir: &Path, file: &str) -> Result<std::path::PathBuf, ServiceError> {
    let path = dir.join(file);
    if !path.exists() {
        return Err(ServiceError::Other(format!(
            "model artifact missing: {}",
            path.display()
        )));
    }
    Ok(path)
}

fn read_special_tokens(path: &Path) -> Result<SpecialTokens, ServiceError> {
    let defaults = SpecialTokens::default();
    if !path.exists() {
        return Ok(defaults);
    }
    let raw = fs::read_to_string(path)?;
    let exported: ExportedConfig = serde_json::from_str(&raw)
        .map_err(|e| ServiceError::Other(format!("invalid {}: {e}", path.display())))?;
    Ok(SpecialTokens {
        pad_token_id: exported.pad_token_id.unwrap_or(defaults.pad_token_id),
        eos_token_id: exported.eos_token_id.unwrap_or(defaults.eos_token_id),
        decoder_start_token_id: exported
            .decoder_start_token_id
            .unwrap_or(defaults.decoder_start_token_id),
    })
}

fn load_module(path: &Path, device: Device) -> Result<tch::CModule, ServiceError> {
    let mut module = tch::CModule::load_on_device(path, device)
        .map_err(|e| ServiceError::Inference(e.to_string()))?;
    module.set_eval();
    Ok(module)
}

fn to_i64(values: &[u32]) -> Vec<i64> {
    values.iter().map(|&v| v as i64).collect()
}

impl Seq2SeqModel for TorchSeq2Seq {
    fn encode(&self, text: &str, max_length: usize) -> Result<EncodedInput, ServiceError> {
        self.codec.encode(text, max_length)
    }

    fn generate(
        &self,
        input: &EncodedInput,
        config: &DecodingConfig,
        cancel: &CancellationFlag,
    ) -> Result<Vec<u32>, ServiceError> {
        if input.is_empty() {
            return Err(ServiceError::Inference("empty encoder input".into()));
        }

        no_grad(|| {
            let len = input.len() as i64;
            let input_ids = Tensor::from_slice(&to_i64(&input.ids))
                .reshape([1, len])
                .to(self.device);
            let attention_mask = Tensor::from_slice(&to_i64(&input.attention_mask))
                .reshape([1, len])
                .to(self.device);

            let hidden = self
                .encoder
                .lock()
                .forward_ts(&[&input_ids, &attention_mask])
                .map_err(|e| ServiceError::Inference(e.to_string()))?;

            let mut scorer = DecoderStep {
                decoder: &self.decoder,
                encoder_hidden: &hidden,
                attention_mask: &attention_mask,
                device: self.device,
            };
            beam_search(&mut scorer, config, self.special, cancel)
        })
    }

    fn decode(&self, ids: &[u32]) -> Result<String, ServiceError> {
        self.codec.decode(ids)
    }

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            name: "t5-torchscript".to_string(),
            device: format!("{:?}", self.device),
            max_input_len: self.codec.max_input_len(),
            size_bytes: self.size_bytes,
        }
    }
}

/// Full-sequence decoder pass per step; the traced decoder keeps no cache.
struct DecoderStep<'a> {
    decoder: &'a Mutex<tch::CModule>,
    encoder_hidden: &'a Tensor,
    attention_mask: &'a Tensor,
    device: Device,
}

impl StepScorer for DecoderStep<'_> {
    fn next_token_logits(&mut self, beams: &[Vec<u32>]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let batch = beams.len() as i64;
        let seq_len = beams.first().map(|b| b.len()).unwrap_or(0) as i64;
        let flat: Vec<i64> = beams.iter().flat_map(|b| to_i64(b)).collect();

        let decoder_ids = Tensor::from_slice(&flat)
            .reshape([batch, seq_len])
            .to(self.device);
        let hidden = self.encoder_hidden.expand([batch, -1, -1], false);
        let mask = self.attention_mask.expand([batch, -1], false);

        let output = self
            .decoder
            .lock()
            .forward_is(&[
                IValue::Tensor(decoder_ids),
                IValue::Tensor(hidden),
                IValue::Tensor(mask),
            ])
            .map_err(|e| ServiceError::Inference(e.to_string()))?;

        // Either a bare logits tensor or a tuple with logits first.
        let logits = match output {
            IValue::Tensor(t) => t,
            IValue::Tuple(ref tuple) if !tuple.is_empty() => match &tuple[0] {
                IValue::Tensor(t) => t.shallow_clone(),
                _ => {
                    return Err(ServiceError::Inference(
                        "Expected tensor as first tuple element".into(),
                    ));
                }
            },
            _ => {
                return Err(ServiceError::Inference(
                    "Unexpected decoder output format".into(),
                ));
            }
        };

        // [batch, seq_len, vocab] -> [batch, vocab] at the last position
        let last = logits
            .select(1, -1)
            .to_kind(Kind::Float)
            .to_device(Device::Cpu);
        let vocab = last.size().last().copied().unwrap_or(0) as usize;
        if vocab == 0 {
            return Err(ServiceError::Inference("decoder returned empty logits".into()));
        }
        let values = Vec::<f32>::try_from(last.flatten(0, -1))
            .map_err(|e| ServiceError::Inference(e.to_string()))?;

        Ok(values.chunks(vocab).map(<[f32]>::to_vec).collect())
    }
}
