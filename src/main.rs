use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diff_proxy::handlers::{admin_router, proxy_router, AppStateInner};
use diff_proxy::models::{shared, DifferenceMode, ProxyConfig};
use diff_proxy::services::ReqwestFetcher;
use diff_proxy::utils::validation::validate_config;

#[derive(Parser)]
#[command(name = "diff-proxy")]
#[command(version)]
#[command(about = "Differential-testing reverse proxy comparing a Candidate service against a Primary one", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy and admin servers
    Start(StartArgs),
}

#[derive(Args)]
struct StartArgs {
    /// Listening port of the proxy
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Listening port of the admin API
    #[arg(long, default_value_t = 8082)]
    admin_port: u16,

    /// Service name, defaults to the Candidate hostname
    #[arg(long, default_value = "")]
    service_name: String,

    /// Primary (known-good) service URL
    #[arg(short, long)]
    primary: String,

    /// Secondary service URL, required with noise detection
    #[arg(short, long)]
    secondary: Option<String>,

    /// Candidate service URL
    #[arg(short, long)]
    candidate: String,

    /// Difference mode: Strict, Subset or Schema
    #[arg(short, long, default_value = "Strict")]
    difference: DifferenceMode,

    /// Forward unsafe methods (POST, PUT, DELETE, ...)
    #[arg(short = 'u', long = "unsafe")]
    allow_unsafe_operations: bool,

    /// Cancel noise found between Primary and Secondary
    #[arg(short, long)]
    noise_detection: bool,

    /// Compare headers as well as bodies
    #[arg(long)]
    headers: bool,

    /// Headers whose values are not compared
    #[arg(long, value_delimiter = ',')]
    ignore_headers_values: Vec<String>,

    /// JSON Pointers always masked when noise detection is on
    #[arg(long, value_delimiter = ',')]
    ignore_values: Vec<String>,

    /// File with one JSON Pointer per line, masked when noise detection is on
    #[arg(long)]
    ignore_values_file: Option<String>,

    /// Write the interactions of every request to this file
    #[arg(long)]
    store_results: Option<String>,

    /// Answer with Primary's response instead of the verdict
    #[arg(long)]
    mirroring: bool,

    /// Answer with the comparison result as JSON
    #[arg(long)]
    return_result: bool,

    /// Compare every body as plain text
    #[arg(long)]
    force_plain_text: bool,

    /// Minimum plain text similarity (exclusive); 100 means exact match
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u8).range(0..=100))]
    levenshtein_percentage: u8,

    /// Skip TLS verification of backend certificates
    #[arg(long)]
    insecure_skip_verify: bool,

    /// CA certificate (PEM) for backend connections
    #[arg(long)]
    ca_cert: Option<String>,

    /// Client certificate (PEM) for backend connections
    #[arg(long)]
    client_cert: Option<String>,

    /// Client key (PEM) for backend connections
    #[arg(long)]
    client_key: Option<String>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, env = "DIFF_PROXY_LOG_LEVEL", default_value = "error")]
    log_level: String,
}

impl StartArgs {
    fn into_config(self) -> ProxyConfig {
        let mut config = ProxyConfig {
            port: self.port,
            admin_port: self.admin_port,
            primary: self.primary,
            secondary: self.secondary,
            candidate: self.candidate,
            difference_mode: self.difference,
            noise_detection: self.noise_detection,
            allow_unsafe_operations: self.allow_unsafe_operations,
            mirroring: self.mirroring,
            return_result: self.return_result,
            headers: self.headers,
            ignore_headers_values: self.ignore_headers_values,
            ignore_values: self.ignore_values,
            ignore_values_file: self.ignore_values_file,
            force_plain_text: self.force_plain_text,
            levenshtein_percentage: self.levenshtein_percentage,
            store_results: self.store_results,
            insecure_skip_verify: self.insecure_skip_verify,
            ca_cert: self.ca_cert,
            client_cert: self.client_cert,
            client_key: self.client_key,
            ..ProxyConfig::default()
        };
        config.set_service_name(&self.service_name);
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start(args) => start(args).await,
    }
}

async fn start(args: StartArgs) -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = args.into_config();
    validate_config(&config).context("Invalid configuration")?;
    let fetcher = Arc::new(ReqwestFetcher::from_config(&config).context("Cannot create backend client")?);

    info!(
        service = %config.service_name,
        primary = %config.primary,
        secondary = config.secondary.as_deref().unwrap_or_default(),
        candidate = %config.candidate,
        mode = %config.difference_mode,
        noise_detection = config.noise_detection,
        headers = config.headers,
        mirroring = config.mirroring,
        "Starting proxy"
    );

    let (port, admin_port) = (config.port, config.admin_port);
    let state = AppStateInner::new(shared(config), fetcher);

    let proxy_listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Cannot bind proxy port {}", port))?;
    let admin_listener = TcpListener::bind(("0.0.0.0", admin_port))
        .await
        .with_context(|| format!("Cannot bind admin port {}", admin_port))?;
    info!("Proxy running on http://0.0.0.0:{}", port);
    info!("Admin API running on http://0.0.0.0:{}", admin_port);

    let proxy = async {
        axum::serve(proxy_listener, proxy_router(state.clone()))
            .await
            .context("Proxy server failed")
    };
    let admin = async {
        axum::serve(admin_listener, admin_router(state.clone()))
            .await
            .context("Admin server failed")
    };
    tokio::try_join!(proxy, admin)?;

    Ok(())
}
