use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use gigachat_proxy::{
    BackgroundRefresher, Env, ProxyConfig, ProxyState, TokenManager, observability, router,
    utils::http::build_http_client,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(name = "gigachat-proxy", version, about = "Credential-refreshing proxy for GigaChat")]
struct Cli {
    /// Read configuration from this dotenv file instead of `./.env`.
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Overrides `HOST`/`PORT`.
    #[arg(long, value_name = "HOST:PORT")]
    listen: Option<String>,

    #[arg(long)]
    json_logs: bool,

    /// Skip the token request at startup; the first chat request fetches it instead.
    #[arg(long)]
    no_prefetch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    observability::init_tracing(cli.json_logs)?;

    let env = match cli.env_file.as_deref() {
        Some(path) => Env::from_dotenv_file(path)?,
        None => Env::load_default()?,
    };
    let config = ProxyConfig::from_env(&env)?;
    let listen = cli.listen.clone().unwrap_or_else(|| config.listen_addr());

    let http = build_http_client(config.insecure_tls)?;
    let manager = Arc::new(TokenManager::from_config(&config, http.clone())?);

    if !cli.no_prefetch {
        if let Err(err) = manager.refresh().await {
            tracing::warn!(error = %err, "initial GigaChat token request failed; will retry on demand");
        }
    }

    let cancel = CancellationToken::new();
    let refresher = BackgroundRefresher::new(config.refresh_interval)
        .with_cancellation(cancel.child_token())
        .start(manager.clone());

    let state = ProxyState::from_config(&config, manager, http)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!(
        listen = %listen,
        completions_url = %config.completions_url,
        "gigachat-proxy listening"
    );

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown signal received");
                }
                _ = shutdown.cancelled() => {}
            }
        })
        .await?;

    cancel.cancel();
    if let Err(err) = refresher.await {
        tracing::warn!(error = %err, "token refresh task ended abnormally");
    }
    Ok(())
}
