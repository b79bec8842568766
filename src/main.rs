use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use talkai::api::{build_router, ApiState};
use talkai::config::AppConfig;
use talkai::hume::{HumeCredentials, HumeTokenIssuer, HumeTokenProvider};
use talkai::logging::init_logging;
use talkai::metrics::MetricsCollector;
use talkai::recaptcha::{GoogleSiteVerifier, RecaptchaVerifier};
use talkai::repository::{InMemoryRepository, TalkRepository};
use talkai::supabase::SupabaseRepository;
use talkai::{ChatService, TokenOutcome};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file layered over config/default and config/local
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Request a Hume access token and report the outcome
    CheckToken {
        /// Give up after this many seconds
        #[arg(short, long, default_value = "10")]
        timeout_secs: u64,
    },
    /// Load a stored session into the chat state and summarize it
    Resume {
        /// Session identifier
        #[arg(short, long)]
        session_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration
    let mut config = AppConfig::load_with_env(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
        config.validate()?;
    }

    let log_file = config.logging.file_path.as_ref().map(PathBuf::from);
    let _guard = init_logging(
        Some(config.logging.level.as_str()),
        log_file.as_deref(),
        config.logging.format == "json",
    )?;

    let metrics = Arc::new(MetricsCollector::new());

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(&config, metrics).await
        }
        Commands::CheckToken { timeout_secs } => check_token(&config, timeout_secs).await,
        Commands::Resume { session_id } => resume(&config, metrics, &session_id).await,
    }
}

fn build_repository(config: &AppConfig, metrics: Arc<MetricsCollector>) -> Result<Arc<dyn TalkRepository>> {
    match (&config.supabase.url, &config.supabase.anon_key) {
        (Some(url), Some(key)) => {
            info!(url = %url, "Using Supabase repository");
            Ok(Arc::new(SupabaseRepository::new(url, key, metrics)?))
        }
        _ => {
            warn!("Supabase is not configured; using in-memory repository");
            Ok(Arc::new(InMemoryRepository::new()))
        }
    }
}

fn build_hume(config: &AppConfig, http: reqwest::Client) -> HumeTokenProvider {
    let credentials = config
        .hume_credentials()
        .map(|(api_key, secret_key)| HumeCredentials { api_key, secret_key });
    HumeTokenProvider::new(Arc::new(HumeTokenIssuer::new(http, &config.hume.token_url)), credentials)
}

async fn serve(config: &AppConfig, metrics: Arc<MetricsCollector>) -> Result<()> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.client.request_timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    let recaptcha = RecaptchaVerifier::new(
        Arc::new(GoogleSiteVerifier::new(http.clone(), &config.recaptcha.verify_url)),
        config.recaptcha.secret_key.clone(),
    );
    if !recaptcha.is_configured() {
        warn!("RECAPTCHA_SECRET_KEY is not set; verification requests will fail");
    }

    let hume = build_hume(config, http);
    if !hume.is_configured() {
        warn!("HUME_API_KEY/HUME_SECRET_KEY are not set; access tokens are unavailable");
    }

    let state = ApiState {
        recaptcha: Arc::new(recaptcha),
        hume: Arc::new(hume),
        repository: build_repository(config, Arc::clone(&metrics))?,
        metrics,
    };
    let app = build_router(state, &config.server.cors_allowed_origins);

    let addr = config.bind_address();
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

async fn check_token(config: &AppConfig, timeout_secs: u64) -> Result<()> {
    let provider = build_hume(config, reqwest::Client::new());
    let outcome = tokio::time::timeout(Duration::from_secs(timeout_secs), provider.fetch_access_token())
        .await
        .with_context(|| format!("Timed out after {timeout_secs}s"))?;

    match outcome {
        TokenOutcome::Issued(token) => {
            println!("Access token issued ({} characters)", token.len());
            Ok(())
        }
        TokenOutcome::NotAttempted { reason } => Err(anyhow::anyhow!("Not attempted: {}", reason)),
        TokenOutcome::Failed { reason } => Err(anyhow::anyhow!("Failed: {}", reason)),
    }
}

async fn resume(config: &AppConfig, metrics: Arc<MetricsCollector>, session_id: &str) -> Result<()> {
    let service = ChatService::new(build_repository(config, metrics)?);
    let Some(session) = service.resume_session(session_id).await? else {
        return Err(anyhow::anyhow!("Session not found: {}", session_id));
    };

    println!("Session {} ({:?}) for user {}", session.id, session.status, session.user_id);
    println!("Messages: {}", service.chat().len());
    println!("Emotion records: {}", service.emotions().len());
    if let Some(latest) = service.emotions().latest() {
        let top: Vec<String> = latest
            .top_emotions(3)
            .into_iter()
            .map(|(label, score)| format!("{label} {score:.2}"))
            .collect();
        println!("Latest emotions: {}", top.join(", "));
    }
    for message in service.session_messages_context().messages() {
        println!("[{}] {}: {}", message.timestamp.format("%Y-%m-%d %H:%M:%S"), message.role, message.content);
    }
    Ok(())
}
