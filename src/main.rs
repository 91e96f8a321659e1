use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use ppg_client::{
    AnalysisSession, AppError, Configuration, HttpTransport, ImageUpload, TaskStatus,
};
use tracing::{Level, error, warn};

#[derive(Debug, Parser)]
#[command(name = "ppg", about = "Check a photo of pet food for hazards")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload an image and wait for its analysis
    Analyze(AnalyzeArgs),
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    #[arg(value_name = "IMAGE")]
    image: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Give up on the first failed status query
    #[arg(long)]
    stop_on_error: bool,
    #[arg(long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => {
            init_logging(args.verbose);
            match analyze(args).await {
                Ok(true) => ExitCode::SUCCESS,
                Ok(false) => ExitCode::FAILURE,
                Err(e) => {
                    error!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn configuration(args: &AnalyzeArgs) -> Result<Configuration, AppError> {
    let mut configuration = Configuration::load(args.config.as_deref())?;
    if let Some(base_url) = &args.base_url {
        configuration = configuration.base_url(base_url.clone());
    }
    if let Some(interval_ms) = args.interval_ms {
        configuration = configuration.poll_interval(Duration::from_millis(interval_ms));
    }
    if args.stop_on_error {
        configuration = configuration.continue_on_error(false);
    }
    configuration.validate()?;
    Ok(configuration)
}

/// Runs one upload to its outcome. `Ok(false)` means the analysis ended in an error.
async fn analyze(args: AnalyzeArgs) -> Result<bool, AppError> {
    let configuration = configuration(&args)?;
    let transport = Arc::new(HttpTransport::new(&configuration)?);
    let mut session = AnalysisSession::new(transport, &configuration);

    let image = ImageUpload::from_path(&args.image).await?;
    session.upload(image).await;

    let mut shown = session.rendering();
    println!("{}", shown);

    let mut interrupted = false;
    while !session.is_settled() {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                interrupted = true;
            }
            update = session.next_update() => {
                let Some(rendering) = update else {
                    break;
                };
                if rendering != shown {
                    println!("{}", rendering);
                    shown = rendering;
                }
            }
        }
        if interrupted {
            warn!("Interrupted, abandoning the analysis");
            session.reset().await;
            return Ok(false);
        }
    }

    Ok(session.state().status == TaskStatus::Completed)
}
