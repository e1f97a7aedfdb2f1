//! AWS SDK integration: STS role assumption and the S3-backed storage backend.

pub(crate) mod s3_backend;
pub(crate) mod sts;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("AWS configuration error: {0}")]
    ConfigError(String),
    #[error("STS client error: {0}")]
    StsError(String),
    #[error("S3 client error: {0}")]
    S3Error(String),
    #[error("Bucket location error: {0}")]
    LocationError(String),
    #[error("Policy serialization error: {0}")]
    PolicyError(String),
}

pub type AwsResult<T> = Result<T, AwsError>;
