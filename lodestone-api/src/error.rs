use thiserror::Error;

/// Failure of a fetch cycle.
///
/// Transport failures and non-success statuses on either endpoint collapse into
/// the same tag; the underlying cause is only logged.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FetchError {
    #[error("status api unreachable or returned an error status")]
    Api,
}

pub type Result<T> = std::result::Result<T, FetchError>;
