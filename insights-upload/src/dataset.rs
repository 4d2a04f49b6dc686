use crate::client::InsightsClient;
use crate::read_artifact;
use moltscrape_core::{CoreError, Post};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::{info, warn};

pub const DATASET_DESCRIPTION: &str =
    "Top posts from Moltbook - the first social network for AI agents";

/// One labeled example: the post's framing as inputs, its body and
/// engagement as outputs, provenance in metadata.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetExample {
    pub inputs: Value,
    pub outputs: Value,
    pub metadata: Value,
}

pub fn example_from_post(post: &Post) -> DatasetExample {
    DatasetExample {
        inputs: json!({
            "title": post.title,
            "author": post.author,
            "submolt": post.submolt,
        }),
        outputs: json!({
            "content": post.content,
            "upvotes": post.upvotes,
            "comment_count": post.comment_count,
        }),
        metadata: json!({
            "author_id": post.author_id,
            "created_at": post.created_at,
            "url": post.url,
        }),
    }
}

/// Read the output artifact and upload every post as a dataset example.
/// Per-example failures are logged and skipped; returns how many were
/// uploaded.
pub async fn upload_dataset(
    client: &InsightsClient,
    input_path: &Path,
    dataset_name: &str,
    limit: Option<usize>,
) -> Result<usize, CoreError> {
    let mut posts = read_artifact(input_path)?.posts;
    if let Some(limit) = limit {
        posts.truncate(limit);
    }
    info!("Loaded {} posts from {}", posts.len(), input_path.display());

    let dataset = client
        .ensure_dataset(dataset_name, DATASET_DESCRIPTION)
        .await?;

    let mut uploaded = 0;
    for (i, post) in posts.iter().enumerate() {
        let example = example_from_post(post);
        match client.create_example(&dataset.id, &example).await {
            Ok(()) => uploaded += 1,
            Err(e) => warn!("Error uploading post {}: {}", post.id, e),
        }

        if (i + 1) % 50 == 0 {
            info!("Uploaded {}/{} posts...", i + 1, posts.len());
        }
    }

    info!(
        "Uploaded {}/{} posts to dataset '{}'",
        uploaded,
        posts.len(),
        dataset_name
    );
    Ok(uploaded)
}
