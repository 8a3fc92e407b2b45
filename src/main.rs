use anyhow::Result;
use clap::{Parser, Subcommand};
use protokoll::{app, config::Config, global, maintenance, transcription::AsrClient};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "protokoll", about = "Meeting management backend with audio transcription")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the web backend (default)
    Serve,
    /// Delete audio files older than the given number of days
    Cleanup {
        #[arg(long, default_value_t = 7)]
        days: u64,
    },
    /// Check the transcription service's health endpoint
    Health,
    /// Print the version
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("protokoll {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(CliCommand::Cleanup { days }) => {
            let deleted = maintenance::cleanup_audio_files(&global::audio_dir()?, days)?;
            println!("Deleted {} audio files older than {} days", deleted, days);
            Ok(())
        }
        Some(CliCommand::Health) => {
            let config = Config::load()?;
            let client = AsrClient::new(
                &config.service.base_url,
                &config.service.language,
                global::audio_dir()?,
                global::transcripts_dir()?,
            );
            let report = client.health().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Some(CliCommand::Serve) | None => app::run_service().await,
    }
}
