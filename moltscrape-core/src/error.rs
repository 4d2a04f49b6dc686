use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Moltbook API error: {0}")]
    Api(#[from] MoltbookApiError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Gave up after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    #[error("Request failed: {message}")]
    RequestFailed {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum MoltbookApiError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },
}

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint at {path} is corrupted: {details}")]
    Corrupted { path: String, details: String },
}

#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}
