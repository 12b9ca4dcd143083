use std::error::Error;
use std::sync::Arc;

use dotenvy::dotenv;
use tracing::{error, info};

mod analysis;
mod config;
mod handlers;
mod llm;
mod state;
mod utils;

use analysis::RequestHandler;
use config::CONFIG;
use handlers::{build_router, RouterSettings};
use llm::OpenAiGateway;
use state::AppState;
use utils::http::build_http_client;
use utils::logging::init_logging;

type MainResult = Result<(), Box<dyn Error + Send + Sync>>;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => error!("Failed to listen for SIGTERM: {err}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> MainResult {
    dotenv().ok();
    let _guards = init_logging(&CONFIG.log_level, &CONFIG.log_dir);

    let settings = CONFIG.gateway_settings();
    let client = build_http_client(settings.timeout)?;
    let gateway = Arc::new(OpenAiGateway::new(client, settings));
    let handler = RequestHandler::new(gateway, CONFIG.schema_version);
    let state = AppState::new(handler);

    let router = build_router(
        state,
        RouterSettings {
            max_request_bytes: CONFIG.max_request_bytes,
            enable_cors: CONFIG.enable_cors,
        },
    );

    let listener = tokio::net::TcpListener::bind(CONFIG.bind_addr).await?;
    info!(
        "Starting chat insight service on {} (model={}, schema={})",
        CONFIG.bind_addr,
        CONFIG.openai_model,
        CONFIG.schema_version.as_str()
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
