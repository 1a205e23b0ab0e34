//! pulsed - logpulse daemon
//!
//! Reads log lines, learns templates, detects frequency anomalies, correlates
//! them into predicted incidents and dispatches alerts.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pulse_detect::DetectorConfig;
use pulsed::{format_report, Pipeline, PulseConfig, DEMO_LINES};
use tokio::io::{AsyncBufRead, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str =
    "pulsed=info,pulse_logs=info,pulse_detect=info,pulse_correlate=info,pulse_alerts=info";

#[derive(Parser)]
#[command(name = "pulsed")]
#[command(about = "Turns log streams into correlated incident alerts")]
#[command(version)]
struct Cli {
    /// Daemon log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline over a log stream
    Run {
        /// Path to config file
        #[arg(short, long, env = "PULSED_CONFIG")]
        config: Option<PathBuf>,

        /// Log file to read, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,
    },

    /// Replay the bundled sample lines and print the report
    Demo,

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "pulsed.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match cli.command {
        Commands::Run { config, input } => {
            run(config, &input).await?;
        }

        Commands::Demo => {
            demo()?;
        }

        Commands::InitConfig { output, force } => {
            init_config(&output, force)?;
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    Ok(())
}

async fn run(config_path: Option<PathBuf>, input: &str) -> anyhow::Result<()> {
    let config = match &config_path {
        Some(path) => {
            info!(config = %path.display(), "loading configuration");
            PulseConfig::from_file(path)?
        }
        None => {
            info!("no config file given, using defaults");
            PulseConfig::default()
        }
    };

    let pipeline = Pipeline::new(config)?;
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = if input == "-" {
        info!("reading log lines from stdin");
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        info!(input = %input, "reading log lines from file");
        Box::new(BufReader::new(tokio::fs::File::open(input).await?))
    };

    let summary = pipeline.run(reader).await?;
    println!("{}", format_report(&summary));

    Ok(())
}

fn demo() -> anyhow::Result<()> {
    let mut config = PulseConfig::default();
    config.detector = DetectorConfig::default()
        .with_window_size(5)
        .with_history_size(10);

    let pipeline = Pipeline::new(config)?;
    for line in DEMO_LINES {
        pipeline.ingest_line(line);
    }

    let now = Utc::now();
    pipeline.flush_window(now);
    for incident in pipeline.evaluate(now) {
        pipeline.dispatch(&incident);
    }

    println!("{}", format_report(&pipeline.summary()));
    Ok(())
}

fn init_config(output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite",
            output.display()
        );
    }

    let content = PulseConfig::sample().to_toml()?;
    std::fs::write(output, content)?;

    println!("Config written to: {}", output.display());
    println!("Edit the [alerts] section to enable chat and paging channels.");

    Ok(())
}
