//! Student portal offline cache CLI entrypoint.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod handlers;

use commands::{CacheCommands, Commands, ConfigCommands, LogFormat};
use config::CliConfig;

#[derive(Parser)]
#[command(name = "portal")]
#[command(author, version, about = "Student portal offline cache", long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = CliConfig::load().unwrap_or_default();

    match cli.command {
        Commands::Install => handlers::install(&config).await?,
        Commands::Activate => handlers::activate(&config).await?,
        Commands::Fetch {
            url,
            method,
            navigate,
            image,
            output,
        } => handlers::fetch(&config, &url, &method, navigate, image, output).await?,
        Commands::Status => handlers::status(&config).await?,
        Commands::Caches { command } => match command {
            CacheCommands::List { entries } => handlers::list_caches(&config, entries).await?,
            CacheCommands::Clear { generation, yes } => {
                handlers::clear_caches(&config, generation, yes).await?
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => handlers::show_config(&config)?,
            ConfigCommands::Set { key, value } => handlers::set_config(&key, &value)?,
        },
    }

    Ok(())
}
