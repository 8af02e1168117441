use async_trait::async_trait;
use tokio::process::Command;

use super::{SourceError, StateSource};

/// State object in S3, fetched through the AWS CLI so the caller's usual
/// credential chain and profile apply.
#[derive(Debug, Clone, PartialEq)]
pub struct S3Source {
    pub bucket: String,
    pub key: String,
}

impl S3Source {
    pub fn parse(url: &str) -> Result<Self, SourceError> {
        let invalid = |message: &str| SourceError::InvalidUrl {
            url: url.to_string(),
            message: message.to_string(),
        };

        let rest = url
            .strip_prefix("s3://")
            .ok_or_else(|| invalid("expected s3:// scheme"))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| invalid("missing object key"))?;
        if bucket.is_empty() || key.is_empty() {
            return Err(invalid("bucket and key must not be empty"));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    pub fn url(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

#[async_trait]
impl StateSource for S3Source {
    fn name(&self) -> &str {
        "s3"
    }

    async fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        let url = self.url();
        let output = Command::new("aws")
            .args(["s3", "cp", url.as_str(), "-"])
            .output()
            .await
            .map_err(|e| SourceError::Command(format!("failed to run aws CLI: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Command(format!(
                "aws s3 cp {} exited with {}: {}",
                url,
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_url() {
        let source = S3Source::parse("s3://my-bucket/env/prod/terraform.tfstate").unwrap();
        assert_eq!(source.bucket, "my-bucket");
        assert_eq!(source.key, "env/prod/terraform.tfstate");
        assert_eq!(source.url(), "s3://my-bucket/env/prod/terraform.tfstate");
    }

    #[test]
    fn test_parse_s3_url_missing_key() {
        let err = S3Source::parse("s3://my-bucket").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid state URL 's3://my-bucket': missing object key"
        );
        assert!(S3Source::parse("s3://my-bucket/").is_err());
        assert!(S3Source::parse("s3:///key").is_err());
    }
}
