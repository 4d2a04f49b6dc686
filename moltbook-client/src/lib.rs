pub mod api;
pub mod retry;

pub use api::{AuthorPayload, FetchBatch, ListingResponse, MoltbookClient, PostPayload, SubmoltPayload};
pub use retry::{calculate_delay, get_retry_strategy, RetryConfig, RetryExecutor, RetryStrategy};
