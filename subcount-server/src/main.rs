//! Subcount Server (subcount-server) - Main entry point
//!
//! Signs in to YouTube once, polls the exact subscriber count on a timer and
//! broadcasts count/goal updates to every connected overlay.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use subcount_common::config::{
    load_toml_config, resolve_config_path, ConfigOverrides, ServiceConfig, TomlConfig,
    DEFAULT_LOG_LEVEL,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for subcount-server
#[derive(Parser, Debug)]
#[command(name = "subcount-server")]
#[command(about = "Exact subscriber count relay for stream overlays")]
#[command(version)]
struct Args {
    /// Config file (defaults to <config dir>/subcount/config.toml when present)
    #[arg(short, long, env = "SUBCOUNT_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "SUBCOUNT_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Milliseconds between automatic polls
    #[arg(long, env = "SUBCOUNT_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Increment between goals
    #[arg(long, env = "SUBCOUNT_GOAL_STEP")]
    goal_step: Option<u64>,

    /// Goal at startup
    #[arg(long, env = "SUBCOUNT_INITIAL_GOAL")]
    initial_goal: Option<u64>,

    /// Previous goal at startup
    #[arg(long, env = "SUBCOUNT_INITIAL_PREVIOUS_GOAL")]
    initial_previous_goal: Option<u64>,

    /// OAuth client id
    #[arg(long, env = "SUBCOUNT_CLIENT_ID")]
    client_id: Option<String>,

    /// OAuth client secret
    #[arg(long, env = "SUBCOUNT_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// OAuth redirect URI registered with the provider
    #[arg(long, env = "SUBCOUNT_REDIRECT_URI")]
    redirect_uri: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SUBCOUNT_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            poll_interval_ms: self.poll_interval_ms,
            goal_step: self.goal_step,
            initial_goal: self.initial_goal,
            initial_previous_goal: self.initial_previous_goal,
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

/// Default filter for the service crates at `level`
fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "subcount_server={level},subcount_common={level},tower_http={level}"
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing before anything else logs. RUST_LOG wins; otherwise
    // the level is refined once the config file has been read.
    let rust_log = EnvFilter::try_from_default_env().ok();
    let rust_log_set = rust_log.is_some();
    let (filter, filter_handle) = reload::Layer::new(rust_log.unwrap_or_else(|| {
        default_filter(args.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL))
    }));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = resolve_config_path(args.config.as_deref())?;
    let file = match &config_path {
        Some(path) => load_toml_config(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => TomlConfig::default(),
    };
    let config = ServiceConfig::resolve(args.overrides(), file).context("Invalid configuration")?;

    if !rust_log_set {
        if let Err(e) = filter_handle.reload(default_filter(&config.log_level)) {
            warn!("Failed to apply log level {}: {}", config.log_level, e);
        }
    }

    info!(
        "Starting Subcount Server (subcount-server) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file, using command line, environment and defaults"),
    }
    info!(
        "Goal step {}, starting goal {} (previous {})",
        config.goal.step(),
        config.goal.goal(),
        config.goal.previous_goal()
    );

    subcount_server::server::run(config)
        .await
        .context("Server error")?;

    Ok(())
}
