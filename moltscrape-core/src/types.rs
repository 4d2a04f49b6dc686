use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scraped Moltbook post. Only posts with a non-empty title and
/// content ever reach this type; validation happens on the raw payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub author_id: String,
    pub submolt: String,
    pub upvotes: u64,
    pub comment_count: u64,
    pub created_at: String,
    pub url: String,
}

/// Durable resumption state: the pagination cursor after the last
/// successful batch plus every post kept so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub cursor: u64,
    pub posts: Vec<Post>,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(cursor: u64, posts: Vec<Post>) -> Self {
        Self {
            cursor,
            posts,
            saved_at: Utc::now(),
        }
    }
}

/// The final output artifact, written once on successful completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeOutput {
    pub source: String,
    pub description: String,
    pub count: usize,
    pub scraped_at: DateTime<Utc>,
    pub posts: Vec<Post>,
}

impl ScrapeOutput {
    pub fn new(posts: Vec<Post>) -> Self {
        Self {
            source: "moltbook.com".to_string(),
            description: "Top posts from Moltbook - the first social network for AI agents"
                .to_string(),
            count: posts.len(),
            scraped_at: Utc::now(),
            posts,
        }
    }
}
