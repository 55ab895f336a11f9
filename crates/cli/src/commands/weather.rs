//! Current-weather lookup

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, WeatherReport, WeatherRequest};
use crate::output::{format_reading, format_unix_time, print_json, print_warning, OutputFormat};

/// Show current conditions for a city
pub async fn show_weather(client: &ApiClient, city: &str, format: OutputFormat) -> Result<()> {
    let request = WeatherRequest {
        city: city.to_string(),
    };
    let report: WeatherReport = client.post("weather-data", &request).await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let name = report.name.as_deref().unwrap_or(city);
            println!("{}", format!("Weather in {}", name).bold());
            println!("{}", "=".repeat(40));

            if let Some(description) = report.weather.get("description").and_then(|d| d.as_str()) {
                println!("Conditions:   {}", description.cyan());
            }
            println!("Temperature:  {}", format_reading(report.main.temp, "°C"));
            println!("Humidity:     {}", format_reading(report.main.humidity, "%"));
            println!("Pressure:     {}", format_reading(report.main.pressure, " hPa"));
            println!(
                "Wind:         {} from {}",
                format_reading(report.wind.speed, " m/s"),
                format_reading(report.wind.deg, "°")
            );
            println!("Sunrise:      {}", format_unix_time(report.sys.sunrise));
            println!("Sunset:       {}", format_unix_time(report.sys.sunset));

            match report.rain.as_ref().and_then(|r| r.get("1h")).and_then(|v| v.as_f64()) {
                Some(mm) => println!("Rain (1h):    {:.1} mm", mm),
                None => print_warning("No rain reported"),
            }
        }
    }

    Ok(())
}
