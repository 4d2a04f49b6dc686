use moltscrape_core::{CoreError, MoltbookApiError};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,  // 1 second
            max_delay_ms: 30000,  // 30 seconds
            backoff_multiplier: 2.0,
            jitter_factor: 0.1, // 10% jitter
        }
    }
}

impl RetryConfig {
    /// Create retry config tuned for the Moltbook listing endpoint
    pub fn moltbook() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 3000,  // Start with 3 seconds
            max_delay_ms: 60000,  // Max 1 minute delay
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Retry strategy based on error type
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff
    Retry,
    /// Retry after a server-specified delay (rate limits)
    RetryWithDelay(Duration),
    /// Don't retry (for permanent failures)
    NoRetry,
}

/// Determine retry strategy based on error type
pub fn get_retry_strategy(error: &CoreError) -> RetryStrategy {
    match error {
        CoreError::Api(api_error) => match api_error {
            // Rate limits should be retried with the server-given delay
            MoltbookApiError::RateLimitExceeded { retry_after } => {
                RetryStrategy::RetryWithDelay(Duration::from_secs(*retry_after))
            }
            // Server errors are usually transient
            MoltbookApiError::ServerError { .. } => RetryStrategy::Retry,
            // Request timeouts should be retried
            MoltbookApiError::RequestTimeout => RetryStrategy::Retry,
            // Auth rejection and an undecodable envelope are permanent
            MoltbookApiError::AuthenticationFailed { .. } => RetryStrategy::NoRetry,
            MoltbookApiError::Forbidden { .. } => RetryStrategy::NoRetry,
            MoltbookApiError::InvalidResponse { .. } => RetryStrategy::NoRetry,
        },
        // Network errors might be transient
        CoreError::Network(reqwest_error) => {
            if reqwest_error.is_timeout() || reqwest_error.is_connect() {
                RetryStrategy::Retry
            } else {
                RetryStrategy::NoRetry
            }
        }
        // Other errors are not worth retrying
        _ => RetryStrategy::NoRetry,
    }
}

/// Calculate delay with exponential backoff and jitter
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_delay = Duration::from_millis(config.base_delay_ms);
    let max_delay = Duration::from_millis(config.max_delay_ms);

    let exponential_delay = if attempt == 0 {
        base_delay
    } else {
        let multiplier = config.backoff_multiplier.powi(attempt as i32);
        let delay_ms = (config.base_delay_ms as f64 * multiplier) as u64;
        Duration::from_millis(delay_ms.min(config.max_delay_ms))
    };

    // Jitter prevents synchronized retries across processes
    let jitter_range = (exponential_delay.as_millis() as f64 * config.jitter_factor) as u64;
    let jitter = fastrand::u64(0..=jitter_range);
    let final_delay = exponential_delay + Duration::from_millis(jitter);

    final_delay.min(max_delay)
}

/// Retry executor that wraps one batch request with the bounded
/// attempt loop: Attempting -> Success | Retrying -> Exhausted.
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute an operation with retry logic. Permanent failures are
    /// returned as-is; exhausting the attempt limit surfaces
    /// `CoreError::RetriesExhausted` with the last error's message.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                debug!("Retry attempt {} for {}", attempt, operation_name);
            }

            let error = match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!(
                            "Operation {} succeeded after {} retries",
                            operation_name, attempt
                        );
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            let retries_left = attempt + 1 < self.config.max_attempts;
            match get_retry_strategy(&error) {
                RetryStrategy::NoRetry => {
                    debug!("Not retrying {} due to error type: {}", operation_name, error);
                    return Err(error);
                }
                RetryStrategy::Retry if retries_left => {
                    let delay = calculate_delay(attempt, &self.config);
                    warn!("Retrying {} in {:?} due to: {}", operation_name, delay, error);
                    sleep(delay).await;
                }
                RetryStrategy::RetryWithDelay(delay) if retries_left => {
                    warn!(
                        "Retrying {} after specified delay of {:?} due to: {}",
                        operation_name, delay, error
                    );
                    sleep(delay).await;
                }
                _ => {
                    error!(
                        "Operation {} failed after {} attempts: {}",
                        operation_name, self.config.max_attempts, error
                    );
                    return Err(CoreError::RetriesExhausted {
                        attempts: self.config.max_attempts,
                        message: error.to_string(),
                    });
                }
            }

            attempt += 1;
        }
    }
}
