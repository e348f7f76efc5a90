//! appautomate CLI - run XCUITests on BrowserStack App Automate.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use appautomate::client::AppAutomateClient;
use appautomate::config::{self, Config, Credentials, TestType};
use appautomate::orchestrator::{Orchestrator, RunPlan};
use appautomate::report::ConsoleReporter;

/// Every input can also come from the environment variable named after it,
/// so the tool drops into CI steps that pass inputs as env vars.
#[derive(Parser)]
#[command(name = "appautomate")]
#[command(about = "Run XCUITests on BrowserStack App Automate devices", long_about = None)]
#[command(version)]
struct Cli {
    /// BrowserStack access key
    #[arg(long, env = "access_key", hide_env_values = true)]
    access_key: String,

    /// BrowserStack user name
    #[arg(long, env = "user_name")]
    user_name: String,

    /// Test framework
    #[arg(long, env = "test_type", value_enum, default_value_t = TestType::XcuiTests)]
    test_type: TestType,

    /// Path of the app to test (.ipa)
    #[arg(long, env = "xcuitests_ipa")]
    xcuitests_ipa: String,

    /// Path of the XCUITest runner package (.zip)
    #[arg(long, env = "xcuitests_runner")]
    xcuitests_runner: String,

    /// Collect device logs
    #[arg(long, env = "xcuitests_device_logs")]
    xcuitests_device_logs: bool,

    /// Devices to run on, separated by `|` (e.g. "iPhone 8-11|iPhone XS-12")
    #[arg(long, env = "xcuitests_devices")]
    xcuitests_devices: String,

    /// Verbose output
    #[arg(short, long, env = "verbose")]
    verbose: bool,

    /// Optional settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the service base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Give up after this many build status requests
    #[arg(long)]
    max_poll_attempts: Option<u32>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set up logging: {}", e);
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    // Apply overrides
    if let Some(base_url) = cli.base_url {
        config.client.base_url = base_url;
    }
    if let Some(max) = cli.max_poll_attempts {
        config.poll.max_attempts = Some(max);
    }

    let credentials = Credentials::new(cli.user_name, cli.access_key);
    let plan = RunPlan {
        app: expand_path(&cli.xcuitests_ipa),
        test_suite: expand_path(&cli.xcuitests_runner),
        devices: RunPlan::parse_devices(&cli.xcuitests_devices),
        device_logs: cli.xcuitests_device_logs,
    };

    print_settings(&credentials, cli.test_type, &plan, &config, cli.verbose);

    let client = AppAutomateClient::new(credentials, &config.client, cli.test_type)
        .context("Failed to create App Automate client")?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, no longer waiting for the build");
            ctrl_c.cancel();
        }
    });

    let orchestrator = Orchestrator::new(Arc::new(client), &config, ConsoleReporter::new(cli.verbose))
        .with_cancellation(cancel);
    let outcome = orchestrator.run(&plan).await?;

    if outcome.sessions.is_complete() {
        info!(
            "Collected {} session(s) for build {}",
            outcome.sessions.sessions.len(),
            outcome.build.build_id
        );
    } else {
        warn!(
            "Collected {} session(s) for build {}, {} could not be fetched",
            outcome.sessions.sessions.len(),
            outcome.build.build_id,
            outcome.sessions.failures.len()
        );
    }

    Ok(())
}

/// Expands `~` and environment variables; falls back to the raw string.
fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => PathBuf::from(raw),
    }
}

fn print_settings(
    credentials: &Credentials,
    test_type: TestType,
    plan: &RunPlan,
    config: &Config,
    verbose: bool,
) {
    println!("Settings:");
    println!("  Access key: {}", credentials.access_key);
    println!("  User name: {}", credentials.username);
    println!("  Test type: {}", test_type);
    println!("  App: {}", plan.app.display());
    println!("  Test runner: {}", plan.test_suite.display());
    println!("  Device logs: {}", plan.device_logs);
    println!("  Devices: {}", plan.devices.join(", "));
    println!("  Verbose: {}", verbose);
    println!("  Base URL: {}", config.client.base_url);
    println!("  Poll interval: {}s", config.poll.interval_secs);
    match config.poll.max_attempts {
        Some(max) => println!("  Max poll attempts: {}", max),
        None => println!("  Max poll attempts: unlimited"),
    }
    println!("  Session concurrency: {}", config.sessions.concurrency);
    println!();
}
