use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vocabot::bot::{spawn_session_sweeper, Collaborators, ControllerSettings, InteractionController};
use vocabot::config::{BotConfig, UploadTarget};
use vocabot::line::{LineClient, ReplyGateway};
use vocabot::server::{build_router, AppState};
use vocabot::services::{
    AppApiUploader, DryRunUploader, GeminiAnalyzer, JsonFileArchive, KeywordExtractor, OpenAiExtractor,
    VocabularyExtractor, VocabularyUploader, WordBridgeUploader,
};
use vocabot::session::SessionStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(false)).init();
    }
}

fn build_uploader(target: &UploadTarget) -> Result<Arc<dyn VocabularyUploader>> {
    Ok(match target {
        UploadTarget::WordBridge { url } => {
            info!(url = %url, "Uploading vocabulary to WordBridge");
            Arc::new(WordBridgeUploader::new(url.clone())?)
        }
        UploadTarget::AppApi { base_url, api_key } => {
            info!(base_url = %base_url, "Uploading vocabulary to app API");
            Arc::new(AppApiUploader::new(base_url.clone(), api_key.clone())?)
        }
        UploadTarget::DryRun => {
            warn!("No upload target configured, confirmed words will not be uploaded");
            Arc::new(DryRunUploader)
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    init_tracing();

    info!("Starting LINE Vocabulary Bot");

    let config = BotConfig::from_env().context("Invalid configuration")?;

    let gateway: Arc<dyn ReplyGateway> = Arc::new(LineClient::new(
        config.line.channel_access_token.clone(),
        config.recovery.operation_timeout(),
    )?);

    let extractor: Arc<dyn VocabularyExtractor> = match &config.openai {
        Some(openai) => {
            info!(model = %openai.model, "Using OpenAI vocabulary extraction");
            Arc::new(OpenAiExtractor::new(openai.clone(), config.recovery.clone())?)
        }
        None => {
            warn!("OPENAI_API_KEY not set, falling back to keyword extraction");
            Arc::new(KeywordExtractor)
        }
    };

    if config.gemini.api_key.is_none() {
        warn!("GEMINI_API_KEY not set, image analysis will fail");
    }
    let analyzer = Arc::new(GeminiAnalyzer::new(config.gemini.clone(), config.recovery.clone())?);

    let uploader = build_uploader(&config.upload)?;
    match uploader.check_connection().await {
        Ok(()) => info!("Upload target reachable"),
        Err(e) => warn!(error = %e, "Upload target not reachable, continuing"),
    }

    let archive = Arc::new(JsonFileArchive::new(&config.storage.archive_file));
    info!(path = %archive.path().display(), "Analysis results archive");

    let controller = Arc::new(InteractionController::new(
        Collaborators {
            gateway,
            extractor,
            analyzer,
            uploader,
            archive,
        },
        Arc::new(SessionStore::new(config.session.expiry)),
        ControllerSettings {
            reply_mode: config.reply_mode,
            language: config.language.clone(),
            image_dir: config.storage.image_dir.clone(),
        },
    ));

    let _sweeper = spawn_session_sweeper(Arc::clone(&controller), config.session.sweep_interval);

    let app = build_router(AppState::new(controller, config.line.channel_secret.as_str()));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, reply_mode = ?config.reply_mode, "Webhook server listening");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
