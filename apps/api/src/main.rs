mod auth;
mod config;
mod errors;
mod intake;
mod ledger;
mod routes;
mod scoring;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::{AuthProvider, SupabaseAuth};
use crate::config::Config;
use crate::ledger::{ContractHashRecorder, HashRecorder};
use crate::routes::build_router;
use crate::scoring::HttpScoringGateway;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting intake API v{}", env!("CARGO_PKG_VERSION"));

    let scoring = HttpScoringGateway::new(config.scoring_url.clone(), config.scoring_timeout)?;
    info!("Scoring gateway targets {}", config.scoring_url);

    let auth: Option<Arc<dyn AuthProvider>> = match &config.supabase {
        Some(supabase) => {
            info!("Auth provider initialized ({})", supabase.url);
            Some(Arc::new(SupabaseAuth::new(supabase)?))
        }
        None => {
            info!("SUPABASE_URL not set; auth routes disabled");
            None
        }
    };

    let hash_recorder: Option<Arc<dyn HashRecorder>> = match &config.chain {
        Some(chain) => {
            let recorder = ContractHashRecorder::new(chain.clone())?;
            info!(
                "Hash recorder initialized (contract {}, sender {})",
                chain.contract_address,
                recorder.sender()
            );
            Some(Arc::new(recorder))
        }
        None => {
            info!("CHAIN_RPC_URL not set; hash recording disabled");
            None
        }
    };

    info!("Staging uploads under {}", config.upload_dir.display());

    let state = AppState {
        config: config.clone(),
        scoring: Arc::new(scoring),
        auth,
        hash_recorder,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
