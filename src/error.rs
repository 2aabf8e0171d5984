use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::model::{BundleRecord, Sku};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("The selector you are trying to scrape for is missing. Selector: {0}")]
    ParseMissingSelector(String),
    #[error("Page for sku {sku} has no `{field}`")]
    ParseMissingField { sku: Sku, field: &'static str },
    #[error("Inventory payload couldn't be decoded: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request for sku {sku} timed out after {millis} ms")]
    Timeout { sku: Sku, millis: u128 },
    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Csv Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Store {path} is malformed: {reason}")]
    StoreMalformed { path: PathBuf, reason: String },

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
    #[error("Couldn't send a record through a channel.")]
    RuntimeSendError,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Category the error is reported under in the run log.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ParseMissingSelector(_) | Error::ParseMissingField { .. } | Error::Json(_) => {
                "parse"
            }
            Error::Timeout { .. } | Error::Reqwest(_) => "transport",
            Error::Io(_) | Error::Csv(_) | Error::StoreMalformed { .. } => "persistence",
            Error::RuntimeJoin(_) | Error::RuntimeSendError => "runtime",
            Error::Config(_) => "config",
        }
    }
}

impl From<mpsc::error::SendError<BundleRecord>> for Error {
    fn from(_value: mpsc::error::SendError<BundleRecord>) -> Self {
        Error::RuntimeSendError
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(value: tempfile::PersistError) -> Self {
        Error::Io(value.error)
    }
}
