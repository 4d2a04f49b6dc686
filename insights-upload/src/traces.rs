use crate::client::InsightsClient;
use crate::read_artifact;
use chrono::{DateTime, Utc};
use moltscrape_core::{CoreError, Post};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const TRACE_RUN_NAME: &str = "moltbook_post";

/// How many existing runs to inspect when looking for duplicates.
const EXISTING_RUNS_LIMIT: usize = 1000;

/// One conversation trace: the post framed as a user turn, its content
/// as the assistant turn.
#[derive(Debug, Clone, Serialize)]
pub struct TraceRun {
    pub id: Uuid,
    pub name: String,
    pub run_type: String,
    pub project_name: String,
    pub inputs: Value,
    pub outputs: Value,
    pub extra: Value,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

pub fn trace_from_post(post: &Post, project_name: &str) -> TraceRun {
    let prompt = format!(
        "Post by {} in m/{}: {}",
        post.author, post.submolt, post.title
    );

    // Pin the trace to the post's own timestamp where it parses
    let timestamp = DateTime::parse_from_rfc3339(&post.created_at)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    TraceRun {
        id: Uuid::new_v4(),
        name: TRACE_RUN_NAME.to_string(),
        run_type: "chain".to_string(),
        project_name: project_name.to_string(),
        inputs: json!({
            "messages": [{ "role": "user", "content": prompt }],
        }),
        outputs: json!({
            "messages": [{ "role": "assistant", "content": post.content }],
        }),
        extra: json!({
            "metadata": {
                "post_id": post.id,
                "author": post.author,
                "author_id": post.author_id,
                "submolt": post.submolt,
                "upvotes": post.upvotes,
                "comment_count": post.comment_count,
                "created_at": post.created_at,
                "url": post.url,
            },
        }),
        start_time: timestamp,
        end_time: timestamp,
    }
}

/// Read the output artifact and upload every post as a conversation
/// trace, skipping posts the project has already ingested. Returns how
/// many traces were uploaded.
pub async fn upload_traces(
    client: &InsightsClient,
    input_path: &Path,
    project_name: &str,
    limit: Option<usize>,
) -> Result<usize, CoreError> {
    let mut posts = read_artifact(input_path)?.posts;
    if let Some(limit) = limit {
        posts.truncate(limit);
    }
    info!("Loaded {} posts from {}", posts.len(), input_path.display());

    let existing = match client
        .list_run_post_ids(project_name, EXISTING_RUNS_LIMIT)
        .await
    {
        Ok(ids) => {
            if !ids.is_empty() {
                info!("Found {} existing traces, will skip duplicates", ids.len());
            }
            ids
        }
        Err(e) => {
            // Project may not exist yet
            debug!("Could not list existing traces ({}), assuming none", e);
            HashSet::new()
        }
    };

    let mut uploaded = 0;
    let mut skipped = 0;
    for (i, post) in posts.iter().enumerate() {
        if existing.contains(&post.id) {
            skipped += 1;
            continue;
        }

        let run = trace_from_post(post, project_name);
        match client.create_run(&run).await {
            Ok(()) => uploaded += 1,
            Err(e) => warn!("Error uploading trace for post {}: {}", post.id, e),
        }

        if (i + 1) % 50 == 0 {
            info!("Uploaded {}/{} posts...", i + 1, posts.len());
        }
    }

    info!(
        "Uploaded {} traces to project '{}' ({} skipped as duplicates)",
        uploaded, project_name, skipped
    );
    Ok(uploaded)
}
