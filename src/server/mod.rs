//! Web server for scene analysis.
//!
//! Exposes conversation management, image upload, and the streaming
//! analysis endpoint. All state a handler needs lives in `AppState`;
//! the pipeline and its collaborators are wired up once at startup.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Settings;
use crate::llm::LlmClient;
use crate::ocr::TesseractClient;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::repository::{AsyncSqlitePool, ConversationRepository};
use crate::storage::LocalImageStore;
use crate::vision::DetectionClient;

/// Maximum accepted upload size.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub repo: ConversationRepository,
    pub images: Arc<LocalImageStore>,
    pub pipeline: Arc<Pipeline>,
    pub detection: Arc<DetectionClient>,
    pub extraction: Arc<TesseractClient>,
    pub llm: Arc<LlmClient>,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        settings.ensure_directories()?;

        let pool = AsyncSqlitePool::from_path(&settings.database_path());
        pool.init_schema().await?;
        let repo = ConversationRepository::new(pool);
        let images = Arc::new(LocalImageStore::new(
            repo.clone(),
            settings.images_dir.clone(),
        ));

        let detection = Arc::new(DetectionClient::new(settings.detection.clone())?);
        let extraction = Arc::new(TesseractClient::new(settings.extraction.clone()));
        let llm = Arc::new(LlmClient::new(settings.llm.clone())?);

        let pipeline = Arc::new(Pipeline::new(
            detection.clone(),
            extraction.clone(),
            llm.clone(),
            images.clone(),
            Arc::new(repo.clone()),
            PipelineConfig {
                detection_timeout: settings.timeouts.detection(),
                extraction_timeout: settings.timeouts.extraction(),
                token_timeout: settings.timeouts.token(),
            },
        ));

        Ok(Self {
            repo,
            images,
            pipeline,
            detection,
            extraction,
            llm,
        })
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings).await?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutting down");
}
