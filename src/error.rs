use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PruneError {
    #[error("error parsing HCL: {0}")]
    Parse(#[from] hcl::Error),

    #[error("file is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("unsupported expression in `{attribute}`: {found}")]
    UnsupportedExpression { attribute: String, found: String },

    #[error("malformed {kind} block: unexpected token `{token}` at byte {offset}")]
    MalformedDirectiveBlock {
        kind: String,
        token: String,
        offset: usize,
    },

    #[error("{kind} block is missing the `{attribute}` attribute")]
    MissingAttribute { kind: String, attribute: String },

    #[error("state lookup failed: {0}")]
    StateLookup(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: Box<PruneError>,
    },
}

impl PruneError {
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        PruneError::File {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

impl From<crate::sources::SourceError> for PruneError {
    fn from(err: crate::sources::SourceError) -> Self {
        PruneError::StateLookup(err.to_string())
    }
}

pub type Result<T, E = PruneError> = std::result::Result<T, E>;
