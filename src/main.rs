use std::sync::Arc;

use labsimplify::api::{start_api_server, ApiContext};
use labsimplify::config::{self, AppConfig, OcrBackend};
use labsimplify::pipeline::llm::OpenRouterClient;
use labsimplify::pipeline::ocr::{OcrEngine, VisionOcr};
use labsimplify::pipeline::ReportPipeline;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    labsimplify::init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        version = config::APP_VERSION,
        model = %config.model,
        ocr_backend = config.ocr_backend.as_str(),
        ocr_policy = config.ocr_policy.as_str(),
        timeout_secs = config.timeout.as_secs(),
        "{} starting",
        config::APP_NAME
    );

    let client = Arc::new(OpenRouterClient::new(&config.llm)?);
    let ocr_engine = build_ocr_engine(&config, client.clone())?;

    let pipeline = ReportPipeline::build(client, ocr_engine, &config.pipeline_settings());
    let ctx = ApiContext::new(Arc::new(pipeline), config.max_upload_bytes);

    let server = start_api_server(ctx, config.bind).await?;
    tracing::info!(
        addr = %server.session.server_addr,
        session_id = %server.session.session_id,
        started_at = %server.session.started_at,
        "Listening"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received, shutting down");
    server.stop().await;

    Ok(())
}

fn build_ocr_engine(
    config: &AppConfig,
    client: Arc<OpenRouterClient>,
) -> Result<Arc<dyn OcrEngine>, Box<dyn std::error::Error>> {
    match config.ocr_backend {
        OcrBackend::Vision => Ok(Arc::new(VisionOcr::new(client, &config.vision_model))),
        #[cfg(feature = "ocr")]
        OcrBackend::Tesseract => {
            let engine = labsimplify::pipeline::ocr::BundledTesseract::new(
                &config.tessdata_dir,
                &config.ocr_lang,
            )?;
            Ok(Arc::new(engine))
        }
        #[cfg(not(feature = "ocr"))]
        OcrBackend::Tesseract => Err(config::ConfigError::BackendNotCompiled("tesseract").into()),
    }
}
