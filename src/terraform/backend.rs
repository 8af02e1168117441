//! Locates the remote state of a configuration directory from its
//! `terraform { backend "s3" { ... } }` block.

use std::path::Path;

use hcl::{Block, Body, Expression};

use super::config_files;
use crate::error::Result;

/// Returns `s3://<bucket>/<key>` for the first S3 backend found in `dir`.
///
/// `Ok(None)` means no usable backend; callers fall back to running without state.
pub fn detect_state_url(dir: &Path) -> Result<Option<String>> {
    for path in config_files(dir)? {
        let source = std::fs::read_to_string(&path)?;
        let body: Body = match hcl::parse(&source) {
            Ok(body) => body,
            Err(err) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %err,
                    "skipping unparsable file during backend detection"
                );
                continue;
            }
        };

        let Some(backend) = find_backend(&body) else {
            continue;
        };

        let url = s3_url(backend);
        match &url {
            Some(url) => {
                tracing::info!(path = %path.display(), url = %url, "detected S3 backend")
            }
            None => {
                tracing::warn!(path = %path.display(), "backend block is not a complete S3 backend")
            }
        }
        return Ok(url);
    }

    Ok(None)
}

fn find_backend(body: &Body) -> Option<&Block> {
    body.blocks()
        .filter(|block| block.identifier() == "terraform")
        .flat_map(|block| block.body().blocks())
        .find(|block| block.identifier() == "backend")
}

/// Builds the state URL from a `backend "s3"` block; `None` for other backends
/// or when `bucket`/`key` are missing or not literal strings.
pub fn s3_url(backend: &Block) -> Option<String> {
    let kind = backend.labels().first()?;
    if kind.as_str() != "s3" {
        return None;
    }

    let literal = |name: &str| {
        backend
            .body()
            .attributes()
            .find(|attr| attr.key() == name)
            .and_then(|attr| match attr.expr() {
                Expression::String(value) => Some(value.clone()),
                _ => None,
            })
    };

    let bucket = literal("bucket")?;
    let key = literal("key")?;
    Some(format!("s3://{}/{}", bucket, key))
}
