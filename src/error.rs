//! Error types for the auction server

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuctionError>;

#[derive(Error, Debug)]
pub enum AuctionError {
    #[error("auction not found: {0}")]
    AuctionNotFound(String),

    #[error("auction has no id")]
    MissingAuctionId,

    #[error("malformed node at {path}: {reason}")]
    MalformedNode { path: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("join attempt timed out")]
    JoinTimeout,
}
