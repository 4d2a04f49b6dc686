pub mod client;
pub mod dataset;
pub mod traces;

pub use client::{DatasetInfo, InsightsClient};
pub use dataset::{example_from_post, upload_dataset, DatasetExample};
pub use traces::{trace_from_post, upload_traces, TraceRun};

use moltscrape_core::{CoreError, ScrapeOutput};
use std::path::Path;

/// Read the scraper's output artifact back from disk.
pub fn read_artifact(path: &Path) -> Result<ScrapeOutput, CoreError> {
    let file = std::fs::File::open(path)?;
    let output = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(output)
}
