use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Usage(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("no user is logged in, run `register <name>` or `login <name>` first")]
    NotLoggedIn,
    #[error("user '{0}' does not exist")]
    UserNotFound(String),
    #[error("user '{0}' already exists")]
    UserExists(String),
    #[error("no feed found for URL: {0}")]
    FeedNotFound(String),
    #[error("a feed with URL {0} already exists")]
    FeedExists(String),
    #[error("'{user}' already follows {url}")]
    AlreadyFollowing { user: String, url: String },
    #[error("'{user}' does not follow {url}")]
    NotFollowing { user: String, url: String },
    #[error("invalid interval '{0}', expected something like 30s, 1m or 1h30m")]
    InvalidInterval(String),
    #[error("request to {url} failed with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("could not determine the home directory")]
    HomeDirNotFound,
    #[error("could not read config file {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode config file {}: {source}", .path.display())]
    ConfigDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("feed parsing error: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True when a database error is a UNIQUE constraint violation.
    pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}
