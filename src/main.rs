// src/main.rs
use load_planner::api;
use load_planner::config::AppConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

fn enable_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    // Loaded before the subscriber so RUST_LOG may come from .env as well.
    let dotenv = dotenvy::dotenv();
    enable_tracing();
    if let Err(err) = dotenv {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            tracing::warn!("Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        allow_rotation = app_config.planner.packing_config().allow_rotation,
        plan_timeout_ms = app_config.planner.plan_timeout().as_millis() as u64,
        "Load planning service starting"
    );

    match api::start_api_server(app_config.api, app_config.planner).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("API server terminated with an error: {}", err);
            std::process::ExitCode::FAILURE
        }
    }
}
