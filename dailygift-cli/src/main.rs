use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use dailygift::Config;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Daily check-in and lottery bot for the UMA gift event page"
)]
struct Args {
    /// Run with a visible browser window instead of headless.
    #[arg(long)]
    headed: bool,

    /// Where session cookies are persisted between runs.
    #[arg(long, default_value = "cookies.json")]
    cookie_file: PathBuf,

    /// Directory for activity logs, daily summaries and screenshots.
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(&args.log_dir)?;

    let mut config = Config::from_env().context("incomplete configuration")?;
    config.cookie_path = args.cookie_file;
    config.log_dir = args.log_dir;
    if args.headed {
        config.headless = false;
    }

    dailygift::run(config).await?;
    Ok(())
}

/// Console plus `activity.log` in the log directory, level from `LOG_LEVEL`.
fn init_logging(log_dir: &Path) -> Result<()> {
    use tracing_appender::rolling;

    let log_level = env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let file_appender = rolling::never(log_dir, "activity.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_filter(EnvFilter::from_default_env().add_directive(log_level.into())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_filter(EnvFilter::from_default_env().add_directive(log_level.into())),
        )
        .init();
    Ok(())
}
