//! Service information commands: status, health, tables

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, EncodingTables, FertilizerOptions, HealthResponse, ServiceInfo};
use crate::output::{
    color_status, format_timestamp, print_info, print_json, print_warning, OutputFormat,
};

/// Row for the task status table
#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Model")]
    status: String,
    #[tabled(rename = "Version")]
    version: String,
}

/// Row for the component health table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Checked")]
    checked: String,
}

/// Row for the encoding tables listing
#[derive(Tabled)]
struct LabelRow {
    #[tabled(rename = "Table")]
    table: String,
    #[tabled(rename = "Code")]
    code: usize,
    #[tabled(rename = "Label")]
    label: String,
}

fn render<T: Tabled>(rows: Vec<T>) {
    let table = tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string();
    println!("{}", table);
}

/// Show service version and which task models are loaded
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let info: ServiceInfo = client.get("").await?;

    match format {
        OutputFormat::Json => print_json(&info)?,
        OutputFormat::Table => {
            println!("{} {}", info.service.bold(), info.version);
            println!("Encoding tables: {}", info.tables_version);
            println!();

            let rows = info
                .tasks
                .iter()
                .map(|t| TaskRow {
                    task: t.task.clone(),
                    status: color_status(if t.loaded { "loaded" } else { "missing" }),
                    version: t.model_version.clone().unwrap_or_else(|| "-".to_string()),
                })
                .collect();
            render::<TaskRow>(rows);

            if info.tasks.iter().any(|t| !t.loaded) {
                print_warning("Tasks without a model answer with a \"not loaded\" message");
            }
        }
    }

    Ok(())
}

/// Show component health
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthResponse = client.get("healthz").await?;

    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Table => {
            println!("Overall: {}", color_status(&health.status));
            println!();

            let rows = health
                .components
                .iter()
                .map(|(name, c)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&c.status),
                    message: c.message.clone().unwrap_or_default(),
                    checked: format_timestamp(c.last_check_timestamp),
                })
                .collect();
            render::<ComponentRow>(rows);
        }
    }

    Ok(())
}

/// List the categorical encodings the models were trained with
pub async fn show_tables(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let tables: EncodingTables = client.get("tables").await?;

    match format {
        OutputFormat::Json => print_json(&tables)?,
        OutputFormat::Table => {
            print_info(&format!("Encoding tables version {}", tables.version));
            let rows = tables
                .all()
                .iter()
                .flat_map(|t| {
                    t.labels.iter().enumerate().map(|(code, label)| LabelRow {
                        table: t.name.clone(),
                        code,
                        label: label.clone(),
                    })
                })
                .collect();
            render::<LabelRow>(rows);
        }
    }

    Ok(())
}

/// Show the soil and crop choices accepted by the fertilizer form
pub async fn show_fertilizer_options(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let options: FertilizerOptions = client.get("fertilizer-recommend").await?;

    match format {
        OutputFormat::Json => print_json(&options)?,
        OutputFormat::Table => {
            println!("{}", "Soil types".bold());
            for soil in &options.soil_types {
                println!("  {}", soil);
            }
            println!("{}", "Crop types".bold());
            for crop in &options.crop_types {
                println!("  {}", crop);
            }
        }
    }

    Ok(())
}
