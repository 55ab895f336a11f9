//! Farm Advisor CLI
//!
//! A command-line tool for requesting yield predictions, crop and
//! fertilizer recommendations, and current weather from the farm advisor
//! service.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{info, predict, weather};

/// Farm Advisor CLI
#[derive(Parser)]
#[command(name = "fa")]
#[command(author, version, about = "CLI for the Farm Advisor prediction service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via FA_API_URL env var)
    #[arg(long, env = "FA_API_URL")]
    pub api_url: Option<String>,

    /// Output format (defaults to the config file setting, then table)
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict crop yield in tonnes per hectare
    Yield {
        #[arg(long)]
        state: String,

        #[arg(long)]
        district: String,

        /// Crop name as recorded in the yield dataset
        #[arg(long)]
        crop: String,

        /// Crop year
        #[arg(long)]
        year: i64,

        #[arg(long)]
        season: String,

        /// Cultivated area in hectares
        #[arg(long)]
        area: f64,

        /// Production in tonnes
        #[arg(long)]
        production: f64,
    },

    /// Recommend a crop for the given soil and climate
    Crop {
        /// Nitrogen content
        #[arg(long = "nitrogen", short = 'n')]
        nitrogen: f64,

        /// Phosphorous content
        #[arg(long = "phosphorous", short = 'p')]
        phosphorous: f64,

        /// Potassium content
        #[arg(long = "potassium", short = 'k')]
        potassium: f64,

        /// Temperature in °C
        #[arg(long)]
        temperature: f64,

        /// Relative humidity in %
        #[arg(long)]
        humidity: f64,

        /// Soil pH
        #[arg(long)]
        ph: f64,

        /// Rainfall in mm
        #[arg(long)]
        rainfall: f64,
    },

    /// Recommend a fertilizer, or list the accepted soil and crop types
    Fertilizer {
        /// List the soil and crop types instead of predicting
        #[arg(long, conflicts_with_all = ["temperature", "humidity", "moisture", "nitrogen", "potassium", "phosphorous", "soil", "crop"])]
        options: bool,

        #[arg(long, required_unless_present = "options")]
        temperature: Option<f64>,

        #[arg(long, required_unless_present = "options")]
        humidity: Option<f64>,

        #[arg(long, required_unless_present = "options")]
        moisture: Option<f64>,

        #[arg(long, short = 'n', required_unless_present = "options")]
        nitrogen: Option<f64>,

        #[arg(long, short = 'k', required_unless_present = "options")]
        potassium: Option<f64>,

        #[arg(long, short = 'p', required_unless_present = "options")]
        phosphorous: Option<f64>,

        /// Soil type, e.g. Sandy
        #[arg(long, required_unless_present = "options")]
        soil: Option<String>,

        /// Crop type, e.g. Maize
        #[arg(long, required_unless_present = "options")]
        crop: Option<String>,
    },

    /// Show current weather for a city
    Weather {
        /// City name
        city: String,
    },

    /// List the categorical encoding tables
    Tables,

    /// Show service version and loaded models
    Status,

    /// Show component health
    Health,

    /// Show or update the CLI configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the current configuration
    Show,

    /// Persist defaults to ~/.config/fa/config.json
    Set {
        /// Default API endpoint URL
        #[arg(long)]
        api_url: Option<String>,

        /// Default output format
        #[arg(long)]
        default_format: Option<output::OutputFormat>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;
    let format = config.resolve_format(cli.format);
    let api_url = config.resolve_api_url(cli.api_url.as_deref());
    let client = || client::ApiClient::new(&api_url);

    // Execute command
    match cli.command {
        Commands::Yield {
            state,
            district,
            crop,
            year,
            season,
            area,
            production,
        } => {
            let input = predict::YieldInput {
                state,
                district,
                crop,
                year,
                season,
                area,
                production,
            };
            predict::predict_yield(&client()?, &input, format).await?;
        }
        Commands::Crop {
            nitrogen,
            phosphorous,
            potassium,
            temperature,
            humidity,
            ph,
            rainfall,
        } => {
            let input = predict::CropInput {
                nitrogen,
                phosphorous,
                potassium,
                temperature,
                humidity,
                ph,
                rainfall,
            };
            predict::recommend_crop(&client()?, &input, format).await?;
        }
        Commands::Fertilizer { options: true, .. } => {
            info::show_fertilizer_options(&client()?, format).await?;
        }
        Commands::Fertilizer {
            temperature: Some(temperature),
            humidity: Some(humidity),
            moisture: Some(moisture),
            nitrogen: Some(nitrogen),
            potassium: Some(potassium),
            phosphorous: Some(phosphorous),
            soil: Some(soil),
            crop: Some(crop),
            ..
        } => {
            let input = predict::FertilizerInput {
                temperature,
                humidity,
                moisture,
                nitrogen,
                potassium,
                phosphorous,
                soil,
                crop,
            };
            predict::recommend_fertilizer(&client()?, &input, format).await?;
        }
        Commands::Fertilizer { .. } => {
            anyhow::bail!("All field conditions are required unless --options is given");
        }
        Commands::Weather { city } => {
            weather::show_weather(&client()?, &city, format).await?;
        }
        Commands::Tables => {
            info::show_tables(&client()?, format).await?;
        }
        Commands::Status => {
            info::show_status(&client()?, format).await?;
        }
        Commands::Health => {
            info::show_health(&client()?, format).await?;
        }
        Commands::Config(config_cmd) => {
            configure(config, config_cmd)?;
        }
    }

    Ok(())
}

fn configure(mut config: config::Config, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => output::print_json(&config)?,
        ConfigCommands::Set {
            api_url,
            default_format,
        } => {
            if api_url.is_some() {
                config.api_url = api_url;
            }
            if default_format.is_some() {
                config.default_format = default_format;
            }
            let path = config.save()?;
            output::print_success(&format!("Configuration saved to {}", path.display()));
        }
    }
    Ok(())
}
