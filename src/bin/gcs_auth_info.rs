use clap::Parser;
use gcs_credentials::{initialize, Config, Error, ResolutionOrder};
use std::path::PathBuf;
use tracing::{error, Level};

/// Resolves GCS credentials the way the library does at startup and reports which source won
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Raw bearer token file [default: /etc/apt/gcs_access_token]
    #[arg(long)]
    access_token_path: Option<PathBuf>,

    /// Service account key file [default: /etc/apt/gcs_sa_json]
    #[arg(long)]
    service_account_path: Option<PathBuf>,

    /// local-first or ambient-first
    #[arg(long)]
    order: Option<ResolutionOrder>,

    #[arg(long)]
    storage_endpoint: Option<String>,

    /// Also fetch an access token to check the credential is usable
    #[arg(long)]
    fetch_token: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn config_from_args(args: &Args) -> Result<Config, Error> {
    let mut config = Config::from_env()?;
    if let Some(p) = &args.access_token_path {
        config.access_token_path = p.clone();
    }
    if let Some(p) = &args.service_account_path {
        config.service_account_path = p.clone();
    }
    if let Some(order) = args.order {
        config.order = order;
    }
    if let Some(endpoint) = &args.storage_endpoint {
        config.storage_endpoint = endpoint.clone();
    }
    Ok(config)
}

async fn run(args: &Args) -> Result<(), Error> {
    let config = config_from_args(args)?;
    let context = initialize(&config).await?;
    println!("source: {}", context.selection);
    println!(
        "token source: {}",
        context.storage.client().token_source().kind()
    );
    println!("storage endpoint: {}", context.storage.base_url());
    if args.fetch_token {
        let token = context.storage.client().access_token().await?;
        println!("access token: {} bytes", token.len());
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    gcs_credentials::logging::init(if args.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    });

    if let Err(e) = run(&args).await {
        error!("Unable to get client: {}", e);
        std::process::exit(1);
    }
}
