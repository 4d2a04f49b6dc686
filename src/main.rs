use anyhow::Result;
use clap::{Parser, Subcommand};
use insights_upload::{upload_dataset, upload_traces, InsightsClient};
use moltbook_client::{MoltbookClient, RetryConfig};
use moltscrape_core::AppConfig;
use scraper::ScrapeOptions;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const USER_AGENT: &str = concat!("moltscrape/", env!("CARGO_PKG_VERSION"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Scrape top posts from Moltbook and feed them to the Insights service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape top posts into a JSON collection, resumably
    Scrape {
        /// Number of valid posts to fetch
        #[arg(long, short = 'n', default_value_t = 500)]
        count: usize,

        /// Output file
        #[arg(long, short = 'o', default_value = "moltbook_posts.json")]
        output: PathBuf,

        /// Checkpoint file (default: output path with _checkpoint suffix)
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Posts per API request
        #[arg(long, default_value_t = 25)]
        batch_size: u32,

        /// Max attempts per batch request
        #[arg(long, default_value_t = 5)]
        max_retries: u32,

        /// Base backoff delay in milliseconds
        #[arg(long, default_value_t = 3000)]
        retry_base_ms: u64,

        /// Backoff delay cap in milliseconds
        #[arg(long, default_value_t = 60000)]
        retry_cap_ms: u64,

        /// Pause between batches in milliseconds
        #[arg(long, default_value_t = 1000)]
        batch_pause_ms: u64,

        /// Don't resume from an existing checkpoint
        #[arg(long, default_value_t = false)]
        no_resume: bool,
    },

    /// Upload a scraped collection as a labeled dataset
    UploadDataset {
        /// Input JSON file
        #[arg(long, short = 'i', default_value = "moltbook_posts.json")]
        input: PathBuf,

        /// Dataset name
        #[arg(long, short = 'd', default_value = "moltbook_posts")]
        dataset: String,

        /// Limit number of posts
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Upload a scraped collection as conversation traces
    UploadTraces {
        /// Input JSON file
        #[arg(long, short = 'i', default_value = "moltbook_posts.json")]
        input: PathBuf,

        /// Tracing project name
        #[arg(long, short = 'p', default_value = "moltbook-analysis")]
        project: String,

        /// Limit number of posts
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    match cli.command {
        Command::Scrape {
            count,
            output,
            checkpoint,
            batch_size,
            max_retries,
            retry_base_ms,
            retry_cap_ms,
            batch_pause_ms,
            no_resume,
        } => {
            let client = MoltbookClient::new(USER_AGENT.to_string(), config.moltbook_api_key);

            let mut options = ScrapeOptions::new(count, output);
            if let Some(checkpoint) = checkpoint {
                options.checkpoint_path = checkpoint;
            }
            options.batch_size = batch_size;
            options.resume = !no_resume;
            options.batch_pause = Duration::from_millis(batch_pause_ms);
            options.retry = RetryConfig {
                max_attempts: max_retries,
                base_delay_ms: retry_base_ms,
                max_delay_ms: retry_cap_ms,
                ..RetryConfig::moltbook()
            };

            let written = scraper::run(&client, &options).await?;
            tracing::info!("Scrape finished with {} posts", written);
        }

        Command::UploadDataset {
            input,
            dataset,
            limit,
        } => {
            let api_key = config.require_langsmith_key()?.to_string();
            let client = InsightsClient::new(api_key);
            let uploaded = upload_dataset(&client, &input, &dataset, limit).await?;
            tracing::info!("Dataset upload finished with {} examples", uploaded);
        }

        Command::UploadTraces {
            input,
            project,
            limit,
        } => {
            let api_key = config.require_langsmith_key()?.to_string();
            let client = InsightsClient::new(api_key);
            let uploaded = upload_traces(&client, &input, &project, limit).await?;
            tracing::info!("Trace upload finished with {} runs", uploaded);
        }
    }

    Ok(())
}
