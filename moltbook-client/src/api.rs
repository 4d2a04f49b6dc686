use moltscrape_core::{CoreError, MoltbookApiError, Post};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const MOLTBOOK_API_BASE: &str = "https://www.moltbook.com/api/v1";
const POST_URL_BASE: &str = "https://www.moltbook.com/post";

/// Response envelope of the listing endpoint. Every field is defaulted:
/// an envelope that decodes at all is handled, one that does not is a
/// fatal `InvalidResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub posts: Vec<PostPayload>,
    #[serde(default)]
    pub next_offset: Option<u64>,
    #[serde(default)]
    pub has_more: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PostPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<AuthorPayload>,
    #[serde(default)]
    pub submolt: Option<SubmoltPayload>,
    #[serde(default)]
    pub upvotes: Option<i64>,
    #[serde(default)]
    pub comment_count: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthorPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SubmoltPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl PostPayload {
    /// Validate a raw payload into a `Post`. Returns `None` when the
    /// payload is unusable: empty or missing id, title, or content, or
    /// a missing author/submolt object. Dropped payloads are not errors.
    pub fn into_post(self) -> Option<Post> {
        let id = self.id.filter(|v| !v.is_empty())?;
        let title = self.title.filter(|v| !v.is_empty())?;
        let content = self.content.filter(|v| !v.is_empty())?;
        let author = self.author?;
        let submolt = self.submolt?;
        let author_name = author.name.filter(|v| !v.is_empty())?;
        let submolt_name = submolt.name.filter(|v| !v.is_empty())?;

        Some(Post {
            url: format!("{}/{}", POST_URL_BASE, id),
            title,
            content,
            author: author_name,
            author_id: author.id.unwrap_or_default(),
            submolt: submolt_name,
            upvotes: self.upvotes.unwrap_or(0).max(0) as u64,
            comment_count: self.comment_count.unwrap_or(0).max(0) as u64,
            created_at: self.created_at.unwrap_or_default(),
            id,
        })
    }
}

/// One page of raw results: the payloads, the cursor for the next
/// request, and whether the feed has anything left.
#[derive(Debug, Clone)]
pub struct FetchBatch {
    pub posts: Vec<PostPayload>,
    pub next_cursor: u64,
    pub has_more: bool,
}

#[derive(Debug)]
pub struct MoltbookClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    user_agent: String,
}

impl MoltbookClient {
    pub fn new(user_agent: String, api_key: Option<String>) -> Self {
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            base_url: MOLTBOOK_API_BASE.to_string(),
            api_key,
            user_agent,
        }
    }

    /// Point the client at a different listing endpoint, e.g. a local
    /// stub server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    async fn make_request(
        &self,
        endpoint: &str,
        query_params: &[(&str, String)],
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let mut request_builder = self.http_client.get(&url).query(query_params);
        if let Some(key) = &self.api_key {
            request_builder = request_builder.bearer_auth(key);
        }

        debug!("Making Moltbook API request: GET {}", endpoint);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for GET {}: {}", endpoint, e);
                if e.is_timeout() {
                    return Err(CoreError::Api(MoltbookApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        match status.as_u16() {
            401 => Err(CoreError::Api(MoltbookApiError::AuthenticationFailed {
                reason: "API key rejected by the listing endpoint".to_string(),
            })),
            403 => Err(CoreError::Api(MoltbookApiError::Forbidden {
                resource: endpoint.to_string(),
            })),
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                warn!("Rate limited, retry after {} seconds", retry_after);
                Err(CoreError::Api(MoltbookApiError::RateLimitExceeded {
                    retry_after,
                }))
            }
            code if status.is_server_error() => {
                Err(CoreError::Api(MoltbookApiError::ServerError {
                    status_code: code,
                }))
            }
            code => Err(CoreError::Api(MoltbookApiError::InvalidResponse {
                details: format!("unexpected status {} for {}", code, endpoint),
            })),
        }
    }

    /// Fetch one page of the top-posts listing. `success: false` and an
    /// empty page both mean the feed is exhausted, not that the request
    /// failed.
    pub async fn fetch_page(&self, offset: u64, limit: u32) -> Result<FetchBatch, CoreError> {
        let params = [
            ("sort", "top".to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];

        let response = self.make_request("/posts", &params).await?;

        let listing: ListingResponse = response.json().await.map_err(|e| {
            error!("Failed to decode listing envelope: {}", e);
            CoreError::Api(MoltbookApiError::InvalidResponse {
                details: format!("undecodable listing envelope at offset {}", offset),
            })
        })?;

        let exhausted =
            !listing.success || listing.posts.is_empty() || !listing.has_more.unwrap_or(false);
        let next_cursor = listing.next_offset.unwrap_or(offset + u64::from(limit));

        info!(
            "Retrieved {} raw posts at offset {} (has_more: {})",
            listing.posts.len(),
            offset,
            !exhausted
        );

        Ok(FetchBatch {
            posts: listing.posts,
            next_cursor,
            has_more: !exhausted,
        })
    }
}
