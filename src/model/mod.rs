pub mod beam;
mod runtime;
mod tokenizer;
mod types;

#[cfg(feature = "tch-backend")]
mod loader;

#[cfg(feature = "tch-backend")]
pub use loader::TorchSeq2Seq;
pub use runtime::{ModelRuntime, Seq2SeqModel};
pub use tokenizer::TextCodec;
pub use types::{
    CancellationFlag, DecodingConfig, EncodedInput, GenerationOutput, ModelMetadata,
    SpecialTokens,
};
