use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use t5_summarizer_service::{AppConfig, ModelRuntime, Summarizer, build_router, export};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(model_dir = %config.model_dir.display(), "loading model artifacts");

    let runtime = ModelRuntime::load(&config)?;
    let metadata = runtime.metadata();
    tracing::info!(
        device = %metadata.device,
        max_input_len = metadata.max_input_len,
        size_bytes = metadata.size_bytes,
        "model ready"
    );

    let summarizer = Summarizer::new(runtime, &config);
    let renderer = export::default_renderer();
    if renderer.is_none() {
        tracing::warn!("built without a document renderer; /export/pdf will refuse requests");
    }
    let router = build_router(summarizer, renderer)?;

    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "REST server ready");

    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,hyper=warn,axum::rejection=trace".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
