mod config;
mod defaults;
mod http;
mod paths;
#[cfg(test)]
mod test_fixtures;

use crate::config::{Args, LogFormat, ServerConfig};
use certbridge_core::CertificateService;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let exe = std::env::current_exe().ok();
    let config = ServerConfig::from_args(args, exe.as_deref());

    tracing::info!("certbridge v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Listen address: {}", config.listen);
    tracing::info!("Machine stores: {}", config.machine_store_dir.display());
    match &config.user_store_dir {
        Some(dir) => tracing::info!("User stores: {}", dir.display()),
        None => tracing::warn!("No user store directory, CurrentUser requests will return 404"),
    }
    if !config.is_loopback() {
        tracing::warn!(
            "Listening on non-loopback address {}; private keys are served without authentication",
            config.listen
        );
    }
    if config.policy.enforce_signature_schemes {
        tracing::info!("Signature scheme enforcement enabled");
    }

    let service = CertificateService::new(Arc::new(config.store())).with_policy(config.policy);
    let app = http::router(service);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(config.listen).await?;
        tracing::info!("Serving certificates on http://{}", listener.local_addr()?);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    })?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
