pub mod http;
pub mod local;
pub mod s3;

use async_trait::async_trait;
use thiserror::Error;

use crate::terraform::TfState;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unsupported state scheme: {0}")]
    UnsupportedScheme(String),
    #[error("invalid state URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("command failed: {0}")]
    Command(String),
    #[error("invalid tfstate: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Somewhere a tfstate document can be fetched from.
#[async_trait]
pub trait StateSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self) -> Result<Vec<u8>, SourceError>;
}

/// Picks the source for a state locator by its scheme.
pub fn get_source(url: &str) -> Result<Box<dyn StateSource>, SourceError> {
    match url.split_once("://") {
        Some(("s3", _)) => Ok(Box::new(s3::S3Source::parse(url)?)),
        Some(("http" | "https", _)) => Ok(Box::new(http::HttpSource::new(url.to_string()))),
        Some(("file", path)) => Ok(Box::new(local::LocalSource::new(path))),
        Some((scheme, _)) => Err(SourceError::UnsupportedScheme(scheme.to_string())),
        None => Ok(Box::new(local::LocalSource::new(url))),
    }
}

/// Fetches and decodes the state snapshot behind `url`.
pub async fn read_state(url: &str) -> Result<TfState, SourceError> {
    let source = get_source(url)?;
    tracing::info!(source = source.name(), url, "reading state");

    let data = source.fetch().await?;
    let state = TfState::from_slice(&data)?;

    tracing::info!(instances = state.len(), "state loaded");
    Ok(state)
}
