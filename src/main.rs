use clap::{Parser, Subcommand};
use food_map::output::{self, BrowserLauncher, FileSink, NoBrowser, SystemBrowser};
use food_map::{config, server};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration; built-in defaults are used when omitted
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the HTML map and open it in the default browser
    Generate {
        /// Write the map without launching a browser
        #[arg(long)]
        no_open: bool,
    },
    /// Build the map, then serve it over HTTP on localhost
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .init();

    let cli = Cli::parse();
    let app_config = config::AppConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Generate { no_open: false }) {
        Commands::Generate { no_open } => {
            let launcher: &dyn BrowserLauncher = if no_open { &NoBrowser } else { &SystemBrowser };
            let report = output::run_generate(&app_config, &FileSink, launcher)?;
            info!(
                output = %report.output.display(),
                url = %report.url,
                foods = report.food_entries,
                stations = report.stations,
                overlays = report.overlays,
                markers = report.markers,
                "Done"
            );
        }
        Commands::Serve => {
            output::run_generate(&app_config, &FileSink, &NoBrowser)?;

            server::start_server(&app_config.output.html, app_config.server.port, |url| {
                if let Err(e) = SystemBrowser.open(url) {
                    warn!(error = %e, "Could not open browser");
                }
            })
            .await?;
        }
    }

    Ok(())
}
