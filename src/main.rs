use anyhow::bail;
use clap::{Parser, Subcommand};
use mining_risk_map::config::AppConfig;
use mining_risk_map::render::{FileRenderer, MapRenderer};
use mining_risk_map::{compose, server, Category, DatasetLoader, LayerId, LayerToggleSet};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose the selected layers and write the map and feature files
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Top-level category (environmental or aboriginal)
        #[arg(long, default_value = "environmental")]
        category: String,
        /// Sub-layers of the category to draw (comma separated)
        #[arg(short, long = "layer", value_delimiter = ',')]
        layers: Vec<String>,
    },
    /// Serve the interactive map
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            config,
            category,
            layers,
        } => {
            info!("Rendering map with config: {:?}", config);
            let app_config = AppConfig::load_from_file(&config)?;

            let category: Category = category.parse()?;
            let layers = layers
                .iter()
                .map(|key| key.parse::<LayerId>())
                .collect::<Result<Vec<_>, _>>()?;
            let toggles = LayerToggleSet::from_parts(category, layers)?;

            let loader = DatasetLoader::from_config(&app_config);
            let pass = compose(&toggles, &loader);

            let mut renderer = FileRenderer::new(&app_config);
            renderer.draw(&pass)?;

            if !pass.is_complete() {
                for failure in &pass.failures {
                    warn!("Layer '{}' was not rendered: {}", failure.layer, failure.error);
                }
                bail!("{} layer(s) failed to render", pass.failures.len());
            }
            info!("Render complete!");
        }
        Commands::Serve { config } => {
            info!("Serving map with config: {:?}", config);
            let app_config = AppConfig::load_from_file(&config)?;
            server::start_server(app_config).await?;
        }
    }

    Ok(())
}
