use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use mobvis_api::ApiConfig;
use mobvis_core::{
    extract_dmos, ExtractionRequest, GaitEngine, PipelineVariant, ProcessEngine, Sentinel,
    ShapingOptions,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Digital mobility outcome extraction service", long_about = None)]
struct Cli {
    /// TOML file with server, CORS, engine and endpoint settings
    #[arg(long, env = "MOBVIS_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API
    Serve,
    /// Run one CSV through the pipeline and print the result as JSON
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    #[arg(long)]
    csv: PathBuf,
    /// Sensor height above ground, metres
    #[arg(long)]
    sensor_height: f64,
    /// Participant height, metres
    #[arg(long)]
    patient_height: f64,
    /// `laboratory` or `free_living`
    #[arg(long)]
    setting: String,
    #[arg(long)]
    sampling_rate: i64,
    /// Acceleration columns are in g and need converting to m/s²
    #[arg(long)]
    convert_to_ms: bool,
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    sentinel: Sentinel,
    #[arg(long)]
    no_total_duration: bool,
    /// Overrides the configured engine pipeline
    #[arg(long)]
    pipeline: Option<PipelineVariant>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let mut config = ApiConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Serve => {
            let engine: Arc<dyn GaitEngine> = Arc::new(ProcessEngine::new(config.engine.clone()));
            info!(
                program = %config.engine.program,
                pipeline = %config.engine.pipeline,
                "starting MobVis API"
            );
            mobvis_api::serve(config, engine).await
        }
        Command::Extract(args) => {
            if let Some(pipeline) = args.pipeline {
                config.engine.pipeline = pipeline;
            }
            run_extract(args, ProcessEngine::new(config.engine)).await
        }
    }
}

async fn run_extract(args: ExtractArgs, engine: ProcessEngine) -> Result<()> {
    let upload = File::open(&args.csv)
        .with_context(|| format!("failed to open {}", args.csv.display()))?;
    let request = ExtractionRequest {
        sampling_rate_hz: args.sampling_rate,
        sensor_height_m: args.sensor_height,
        height_m: args.patient_height,
        measurement_condition: args.setting,
        convert_to_ms: args.convert_to_ms,
    };
    let options = ShapingOptions {
        sentinel: args.sentinel,
        include_total_duration: !args.no_total_duration,
    };

    let outcome =
        tokio::task::spawn_blocking(move || extract_dmos(upload, &request, &engine, &options))
            .await
            .context("extraction task failed")?;

    match outcome {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(err) => bail!("{} ({})", err.user_message(), err.kind()),
    }
}
