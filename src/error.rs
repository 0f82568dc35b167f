use thiserror::Error;

/// Errors raised while resolving a dashboard pass.
///
/// The enum is `Clone` because failures travel through shared futures: every
/// caller waiting on a deduplicated request or a memoized pipeline must
/// observe the same error. Source errors are flattened to strings at the
/// boundary where they occur.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GoDashError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Malformed GoCD document: {0}")]
    Parse(String),

    #[error("Dependency cycle through pipeline {name}/{counter}")]
    Cycle { name: String, counter: u32 },
}

pub type Result<T> = std::result::Result<T, GoDashError>;
