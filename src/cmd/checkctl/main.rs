use clap::{Parser, Subcommand};
use std::fs;
use std::time::Duration;

use modelcheck::internal::config;

#[derive(Parser)]
#[command(name = "checkctl")]
#[command(about = "Model compliance check CLI", long_about = None)]
struct Cli {
    /// Gateway base url
    #[arg(long)]
    gateway: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a model for checking
    Submit {
        /// Path to the model payload (JSON)
        #[arg(short, long)]
        model_file: String,

        /// Project identifier
        #[arg(short, long)]
        project: String,
    },
    /// Fetch the current status of a job
    Status {
        /// Job ID returned by submit
        #[arg(long)]
        job_id: String,
    },
    /// Poll a job until it reaches a terminal status
    Watch {
        /// Job ID returned by submit
        #[arg(long)]
        job_id: String,

        /// Seconds between polls
        #[arg(long, default_value_t = 2)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let base_url = cli
        .gateway
        .clone()
        .unwrap_or_else(config::gateway_url);
    let client = reqwest::Client::new();

    match &cli.command {
        Commands::Submit {
            model_file,
            project,
        } => {
            submit(&client, &base_url, model_file, project).await?;
        }
        Commands::Status { job_id } => {
            let status = fetch_status(&client, &base_url, job_id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Watch { job_id, interval } => {
            watch(&client, &base_url, job_id, *interval).await?;
        }
    }

    Ok(())
}

async fn submit(
    client: &reqwest::Client,
    base_url: &str,
    model_file: &str,
    project: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let payload: serde_json::Value = serde_json::from_str(&fs::read_to_string(model_file)?)?;

    let response = client
        .post(format!("{}/v1/checks", base_url))
        .json(&serde_json::json!({
            "payload": payload,
            "project_id": project,
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(format!("submit failed: {} {}", status, body).into());
    }

    let body: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn fetch_status(
    client: &reqwest::Client,
    base_url: &str,
    job_id: &str,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let response = client
        .get(format!("{}/v1/checks/{}", base_url, job_id))
        .send()
        .await?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(format!("unknown job: {}", job_id).into());
    }
    if !response.status().is_success() {
        return Err(format!("status request failed: {}", response.status()).into());
    }

    Ok(response.json().await?)
}

async fn watch(
    client: &reqwest::Client,
    base_url: &str,
    job_id: &str,
    interval: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let view = fetch_status(client, base_url, job_id).await?;
        let status = view
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("unknown")
            .to_string();

        match status.as_str() {
            "done" | "error" | "lost" => {
                println!("{}", serde_json::to_string_pretty(&view)?);
                return Ok(());
            }
            other => {
                eprintln!("job {} is {}", job_id, other);
                tokio::time::sleep(Duration::from_secs(interval)).await;
            }
        }
    }
}
