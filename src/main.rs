use clap::{Parser, Subcommand};
use mapcomposer::{data::SourceTransport, server, AppConfig, MapComposer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every source and print the composed map as JSON
    Compose {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Compose the map and serve it with its layer controls
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

// Sources are resolved relative to the directory holding the config file.
fn composer_for(config_path: &Path, app_config: AppConfig) -> MapComposer {
    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    MapComposer::new(app_config, Arc::new(SourceTransport::new(base_dir)))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // stdout is reserved for `compose` output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Compose { config } => {
            let app_config = AppConfig::load_from_file(config)?;
            let composition = composer_for(config, app_config).compose().await;
            println!("{}", serde_json::to_string_pretty(&composition.snapshot())?);
        }
        Commands::Serve { config } => {
            let app_config = AppConfig::load_from_file(config)?;
            let composition = composer_for(config, app_config.clone()).compose().await;

            server::start_server(app_config, composition).await?;
        }
    }

    Ok(())
}
