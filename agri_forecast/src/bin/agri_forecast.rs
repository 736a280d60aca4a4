use agri_forecast::{logging, ForecastConfig, ForecastService};
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about = "Commodity price ingest, training and forecasting")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Ingest a CSV export of daily prices
    Ingest {
        #[arg(value_name = "FILE")]
        csv: PathBuf,
    },
    /// Train the model of one (region, commodity)
    Train { region: String, commodity: String },
    /// Train every (region, commodity) in the store
    TrainAll,
    /// Forecast prices for one (region, commodity)
    Predict {
        region: String,
        commodity: String,
        #[arg(long)]
        subregion: Option<String>,
        /// First day to forecast (YYYY-MM-DD, DD/MM/YYYY, DD-MM-YYYY or MM/DD/YYYY)
        #[arg(long)]
        date: Option<String>,
    },
    /// Most observed commodities of a (region, subregion)
    Top { region: String, subregion: String },
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let service = ForecastService::new(ForecastConfig::from_env()?)?;

    let output = match cli.cmd {
        Cmd::Ingest { csv } => serde_json::to_value(service.ingest_csv(&csv)?)?,
        Cmd::Train { region, commodity } => {
            serde_json::to_value(service.train(&region, &commodity)?)?
        }
        Cmd::TrainAll => {
            let outcomes = service.train_all()?;
            outcomes
                .iter()
                .map(|outcome| match &outcome.result {
                    Ok(metrics) => json!({
                        "region": outcome.key.region,
                        "commodity": outcome.key.commodity,
                        "rmse": metrics.rmse,
                        "mape": metrics.mape,
                    }),
                    Err(err) => json!({
                        "region": outcome.key.region,
                        "commodity": outcome.key.commodity,
                        "error": err.to_string(),
                    }),
                })
                .collect()
        }
        Cmd::Predict {
            region,
            commodity,
            subregion,
            date,
        } => serde_json::to_value(service.predict(
            &region,
            subregion.as_deref(),
            &commodity,
            date.as_deref(),
        )?)?,
        Cmd::Top { region, subregion } => {
            json!(service.top_commodities(&region, Some(&subregion))?)
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
