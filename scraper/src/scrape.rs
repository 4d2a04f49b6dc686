use crate::checkpoint::{write_json_atomic, CheckpointStore};
use moltbook_client::{FetchBatch, MoltbookClient, RetryConfig, RetryExecutor};
use moltscrape_core::{Checkpoint, CoreError, ScrapeOutput};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Anything that can serve pages of raw posts. The production
/// implementation is `MoltbookClient`; tests drive the run loop with
/// scripted in-memory sources.
pub trait PostSource {
    async fn fetch_batch(&self, cursor: u64, limit: u32) -> Result<FetchBatch, CoreError>;
}

impl PostSource for MoltbookClient {
    async fn fetch_batch(&self, cursor: u64, limit: u32) -> Result<FetchBatch, CoreError> {
        self.fetch_page(cursor, limit).await
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// Number of valid posts to collect
    pub target_count: usize,
    /// Destination for the final JSON collection
    pub output_path: PathBuf,
    /// Location of the resumable state
    pub checkpoint_path: PathBuf,
    /// Posts requested per listing call
    pub batch_size: u32,
    /// Load an existing checkpoint instead of starting from zero
    pub resume: bool,
    /// Pause between successive batch requests
    pub batch_pause: Duration,
    pub retry: RetryConfig,
}

impl ScrapeOptions {
    pub fn new(target_count: usize, output_path: impl Into<PathBuf>) -> Self {
        let output_path = output_path.into();
        let checkpoint_path = default_checkpoint_path(&output_path);
        Self {
            target_count,
            output_path,
            checkpoint_path,
            batch_size: 25,
            resume: true,
            batch_pause: Duration::from_secs(1),
            retry: RetryConfig::moltbook(),
        }
    }
}

/// Derive the checkpoint path from the output path:
/// `moltbook_posts.json` -> `moltbook_posts_checkpoint.json`.
pub fn default_checkpoint_path(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("scrape");
    let name = match output_path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_checkpoint.{ext}"),
        None => format!("{stem}_checkpoint"),
    };
    output_path.with_file_name(name)
}

/// Collect up to `target_count` valid posts from `source`, checkpointing
/// after every batch so an interrupted run loses at most one in-flight
/// batch. Returns the number of posts written to the output artifact.
pub async fn run<S: PostSource>(source: &S, options: &ScrapeOptions) -> Result<usize, CoreError> {
    let store = CheckpointStore::new(&options.checkpoint_path);

    let (mut posts, mut cursor) = if options.resume {
        match store.load()? {
            Some(checkpoint) => (checkpoint.posts, checkpoint.cursor),
            None => (Vec::new(), 0),
        }
    } else {
        store.remove()?;
        (Vec::new(), 0)
    };

    let mut seen: HashSet<String> = posts.iter().map(|p| p.id.clone()).collect();
    let retry = RetryExecutor::new(options.retry.clone());

    info!(
        "Scraping top {} posts (batch size {}, starting with {} collected, cursor {})",
        options.target_count,
        options.batch_size,
        posts.len(),
        cursor
    );

    let mut batch_num = 1;
    while posts.len() < options.target_count {
        debug!("Batch {}: fetching cursor {}", batch_num, cursor);

        let batch = retry
            .execute("fetch posts", || {
                source.fetch_batch(cursor, options.batch_size)
            })
            .await?;

        let before = posts.len();
        for payload in batch.posts {
            if let Some(post) = payload.into_post() {
                // Dedup on id, insertion order preserved
                if seen.insert(post.id.clone()) {
                    posts.push(post);
                }
            }
        }
        info!(
            "Batch {}: kept {} posts (total: {})",
            batch_num,
            posts.len() - before,
            posts.len()
        );

        cursor = batch.next_cursor;
        // Durable before the next request: bounds loss to one batch
        store.save(&Checkpoint::new(cursor, posts.clone()))?;

        if !batch.has_more {
            info!("No more posts available");
            break;
        }

        batch_num += 1;
        if posts.len() < options.target_count && !options.batch_pause.is_zero() {
            sleep(options.batch_pause).await;
        }
    }

    posts.truncate(options.target_count);
    let output = ScrapeOutput::new(posts);
    write_json_atomic(&options.output_path, &output)?;

    info!(
        "Done. Saved {} posts to {}",
        output.count,
        options.output_path.display()
    );
    Ok(output.count)
}
