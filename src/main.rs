//! chat-relay: streaming chat-completion proxy
//!
//! A small HTTP service that:
//! - Trims conversation history to a token budget
//! - Forwards the assembled prompt to an OpenAI-compatible service
//! - Re-streams completion deltas to the caller as they arrive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use chat_relay::{run_server, AppConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Parser)]
#[command(name = "chat-relay")]
#[command(version = "0.1.0")]
#[command(about = "Streaming chat-completion proxy with token budgeting")]
#[command(long_about = "
chat-relay sits between a chat client and an OpenAI-compatible completion
service. It trims conversation history to a token budget, forwards the
assembled prompt with streaming enabled, and relays text deltas back to
the caller as they arrive.

Example usage:
  chat-relay run --config config.yaml
  chat-relay check-config --config config.yaml
")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Run {
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override upstream base URL (e.g., "https://api.openai.com/v1")
        #[arg(long)]
        upstream_url: Option<String>,
    },

    /// Validate configuration file
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level_filter = if let Some(level) = cli.log_level {
        level.to_string()
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            .to_string()
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&level_filter))
        .init();

    match cli.command {
        Commands::Run { port, upstream_url } => {
            run_relay(cli.config, port, upstream_url).await?;
        }
        Commands::CheckConfig => {
            check_config(cli.config);
        }
    }

    Ok(())
}

/// Run the relay server
async fn run_relay(
    config_path: PathBuf,
    port_override: Option<u16>,
    upstream_url_override: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config_or_exit(&config_path);

    // Apply CLI overrides
    if let Some(port) = port_override {
        config.server.port = port;
    }
    if let Some(url) = upstream_url_override {
        config.upstream.url = url;
    }

    tracing::info!("Loading configuration from {:?}", config_path);

    run_server(config).await?;

    Ok(())
}

/// Validate configuration file
fn check_config(config_path: PathBuf) {
    match AppConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid\n");
            println!("Server:");
            println!("  Listen: {}:{}", config.server.host, config.server.port);
            println!("\nUpstream:");
            println!("  URL: {}", config.upstream.completions_url());
            println!("  Model: {}", config.upstream.model);
            println!(
                "  API key: {}",
                if config.upstream.resolve_api_key().is_some() {
                    "configured"
                } else {
                    "MISSING (set upstream.api_key or OPENAI_API_KEY)"
                }
            );
            println!(
                "  Connect timeout: {}s",
                config.upstream.connect_timeout_seconds
            );
            println!("\nChat:");
            println!("  System prompt: {}", config.chat.system_prompt);
            println!("  Token budget: {}", config.chat.token_budget);
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Load configuration or exit with error
fn load_config_or_exit(config_path: &PathBuf) -> AppConfig {
    match AppConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            eprintln!("\nMake sure you have a config.yaml file.");
            eprintln!("You can copy config.yaml.default and modify it:");
            eprintln!("  cp config.yaml.default config.yaml");
            std::process::exit(1);
        }
    }
}
