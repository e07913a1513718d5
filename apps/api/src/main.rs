mod ai;
mod auth;
mod billing;
mod config;
mod db;
mod editor;
mod errors;
mod llm_client;
mod models;
mod resume;
mod routes;
mod state;
mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::billing::subscription::{PgSubscriptionLookup, PriceIds};
use crate::config::Config;
use crate::db::create_pool;
use crate::editor::session::EditorSessions;
use crate::llm_client::LlmClient;
use crate::resume::gateway::ResumeGateway;
use crate::resume::store::PgResumeStore;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::S3BlobStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume API v{}", env!("CARGO_PKG_VERSION"));

    let db = create_pool(&config.database_url).await?;

    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let store = Arc::new(PgResumeStore::new(db.clone()));
    let blobs = Arc::new(S3BlobStore::new(
        s3,
        config.s3_bucket.clone(),
        config.s3_public_url.clone(),
    ));
    let subscriptions = Arc::new(PgSubscriptionLookup::new(
        db,
        PriceIds {
            pro_monthly: config.price_id_pro_monthly.clone(),
            pro_plus_monthly: config.price_id_pro_plus_monthly.clone(),
        },
    ));
    let gateway = Arc::new(ResumeGateway::new(
        store.clone(),
        blobs,
        subscriptions.clone(),
    ));
    let sessions = EditorSessions::new(gateway.clone(), config.autosave_quiet_period);
    info!(
        "Autosave quiet period {}ms, editor sessions expire after {}s idle",
        config.autosave_quiet_period.as_millis(),
        config.editor_session_idle.as_secs()
    );

    spawn_session_reaper(sessions.clone(), config.editor_session_idle);

    let state = AppState {
        store,
        gateway,
        subscriptions,
        sessions,
        llm: Arc::new(llm),
    };

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // TODO: restrict origins once the web client's domain is fixed
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drops editor sessions nobody has touched for `idle`.
fn spawn_session_reaper(sessions: EditorSessions, idle: std::time::Duration) {
    let every = (idle / 4).max(std::time::Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_idle(idle).await;
            if evicted > 0 {
                info!(
                    "Evicted {evicted} idle editor session(s), {} still open",
                    sessions.len().await
                );
            }
        }
    });
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "resume-api-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
