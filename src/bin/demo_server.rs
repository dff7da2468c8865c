//! Demo server: an axum app behind the Spyglasses gate.
//!
//! Uses an in-process SDK that flags user-agents containing one of the
//! configured substrings. Nothing is sent to the Spyglasses services; visit
//! reports are written to the log instead.

use async_trait::async_trait;
use axum::{Router, routing::get};
use clap::Parser;
use mimalloc::MiMalloc;
use spyglasses_gate::context::RequestContext;
use spyglasses_gate::{
    Deadline, DetectionResult, DetectionSdk, Gate, GateConfig, GateLayer, SdkError, SdkOptions,
    SourceType, SyncResult,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "demo_server")]
#[command(author, version, about = "Spyglasses gate demo server")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Path to gate configuration file (JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Spyglasses API key
    #[arg(long, env = "SPYGLASSES_API_KEY")]
    api_key: Option<String>,

    /// Enable gate debug output
    #[arg(long)]
    debug: bool,

    /// User-agent substrings to flag as bots (repeatable)
    #[arg(long = "bot", default_values_t = ["Googlebot".to_string(), "bingbot".to_string()])]
    bots: Vec<String>,

    /// User-agent substrings to block (repeatable)
    #[arg(long = "block", default_values_t = ["GPTBot".to_string(), "AITrainer".to_string()])]
    blocked: Vec<String>,

    /// How long a blocked response waits for its report (e.g. "2s", "250ms")
    #[arg(long, value_parser = humantime::parse_duration)]
    blocking_timeout: Option<Duration>,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,spyglasses_gate=debug"));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }
}

fn load_config(path: &Path) -> Result<GateConfig, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let config = if path.extension().is_some_and(|e| e == "yaml" || e == "yml") {
        serde_yml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(config)
}

/// Substring-matching SDK for local runs.
struct StaticSdk {
    api_key: Option<String>,
    bots: Vec<String>,
    blocked: Vec<String>,
}

impl StaticSdk {
    fn new(options: &SdkOptions, bots: Vec<String>, blocked: Vec<String>) -> Self {
        tracing::info!(
            platform = %options.platform_type,
            collect_endpoint = %options.collect_endpoint,
            "Using static detection SDK"
        );
        Self {
            api_key: options.api_key.clone(),
            bots,
            blocked,
        }
    }
}

#[async_trait]
impl DetectionSdk for StaticSdk {
    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn sync_patterns(&self) -> Result<SyncResult, SdkError> {
        Ok(SyncResult {
            version: "static".to_string(),
            ..SyncResult::default()
        })
    }

    fn detect(&self, user_agent: &str, _referrer: &str) -> DetectionResult {
        let matched = |patterns: &[String]| {
            patterns
                .iter()
                .find(|p| user_agent.contains(p.as_str()))
                .cloned()
        };

        if let Some(pattern) = matched(&self.blocked) {
            return DetectionResult {
                source_type: SourceType::Bot,
                is_bot: true,
                should_block: true,
                matched_pattern: Some(pattern),
                info: None,
            };
        }
        match matched(&self.bots) {
            Some(pattern) => DetectionResult {
                source_type: SourceType::Bot,
                is_bot: true,
                should_block: false,
                matched_pattern: Some(pattern),
                info: None,
            },
            None => DetectionResult::undetected(),
        }
    }

    async fn log_request(
        &self,
        result: &DetectionResult,
        context: &RequestContext,
    ) -> Result<(), SdkError> {
        tracing::info!(
            source_type = %result.source_type,
            matched_pattern = ?result.matched_pattern,
            path = %context.path,
            status = context.response_status,
            "Visit reported"
        );
        Ok(())
    }
}

/// Whole milliseconds in `timeout`, saturating at `u64::MAX`.
fn timeout_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

async fn index() -> &'static str {
    "Hello from behind the gate\n"
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.json_logs);

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };
    if args.api_key.is_some() {
        config.api_key = args.api_key.clone();
    }
    if args.debug {
        config.debug = Some(true);
    }
    if let Some(timeout) = args.blocking_timeout {
        config.logging.blocking_timeout = Some(Some(timeout_millis(timeout)));
    }

    let (bots, blocked) = (args.bots.clone(), args.blocked.clone());
    let gate = Gate::from_config(config, move |options| {
        Arc::new(StaticSdk::new(options, bots, blocked)) as Arc<dyn DetectionSdk>
    })?;

    let app = Router::new()
        .route("/", get(index))
        .route("/{*path}", get(index))
        .layer(GateLayer::new(gate.clone()));

    tracing::info!("Spyglasses demo listening on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(args.listen).await.map_err(|e| {
        tracing::error!("Failed to bind to {}: {}", args.listen, e);
        e
    })?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|e| {
            tracing::error!("Server error: {}", e);
            e
        })?;

    if gate
        .drain(Deadline::After(Duration::from_secs(5)))
        .await
        .is_err()
    {
        tracing::warn!(
            pending = gate.pending_reports(),
            "Shutting down with visit reports still pending"
        );
    }

    Ok(())
}
