pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod page;
pub mod pipeline;
pub mod prompt;
pub mod server;

pub use config::AppConfig;
pub use error::ServiceError;
pub use model::{DecodingConfig, ModelRuntime, Seq2SeqModel};
pub use pipeline::{SummaryArtifact, Summarizer};
pub use prompt::{StyleTag, build_prompt};
pub use server::build_router;
