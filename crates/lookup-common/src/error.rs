/// Error types shared across the lookup relay crates.
///
/// These errors cover infrastructure concerns (configuration of the upstream client)
/// that any binary talking to the lookup API runs into. Application-specific errors
/// should be defined in each binary crate and wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("config error: {0}")]
    Config(String),

    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}
