use anyhow::Context;
use scanline_core::Settings;
use scanline_ocr::{ExtractionPipeline, HttpRecognizer, TextRecognizer};
use scanline_server::{router, telemetry, AppState, SharedPipeline};
use std::sync::Arc;
use tracing::info;

fn main() -> anyhow::Result<()> {
    telemetry::init_subscriber("scanline-server", "info")?;

    let settings = Settings::load().context("Failed to load settings")?;

    // The recognizer wraps a blocking HTTP client, which must be created and
    // dropped outside the async runtime.
    let recognizer = HttpRecognizer::from_settings(&settings.recognizer)
        .context("Failed to create recognizer client")?;
    info!(endpoint = recognizer.endpoint(), "using HTTP recognizer");

    let recognizer: Box<dyn TextRecognizer> = Box::new(recognizer);
    let pipeline: SharedPipeline = Arc::new(ExtractionPipeline::from_settings(recognizer, &settings));
    std::fs::create_dir_all(pipeline.scratch_dir()).with_context(|| {
        format!("Failed to create scratch directory {}", pipeline.scratch_dir().display())
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;
    let result = runtime.block_on(serve(settings, pipeline.clone()));
    drop(runtime);
    drop(pipeline);
    result
}

async fn serve(settings: Settings, pipeline: SharedPipeline) -> anyhow::Result<()> {
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        %addr,
        y_threshold = settings.layout.y_threshold,
        strategy = ?settings.layout.strategy,
        "scanline server listening"
    );

    let app = router(AppState::new(pipeline), settings.server.max_upload_bytes);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
