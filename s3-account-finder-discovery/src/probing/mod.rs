//! Policy-scoped access probing.
//!
//! The remote S3/STS calls sit behind [`StorageBackend`] so the prober and the
//! engine can run against an in-memory fake.

pub mod location_cache;
pub mod prober;

use async_trait::async_trait;

use crate::aws::AwsResult;
use crate::types::{AssumeRoleDescriptor, BucketLocation, PolicyDocument, Target};

pub use location_cache::BucketLocationCache;
pub use prober::{classify, AccessProber};

/// A structured error response from the storage service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFailure {
    /// Provider error code, e.g. `AccessDenied` or `NotFound`.
    pub code: Option<String>,
    /// HTTP status of the response.
    pub status: Option<u16>,
    pub message: String,
}

/// What the existence check saw, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExistenceCheck {
    Found,
    Rejected(ServiceFailure),
}

/// Remote operations needed by the prober.
///
/// Implementations return `Err` only for failures that are not a service
/// response at all (credentials, dispatch, timeouts in the SDK); every
/// response the service actually sent back is an [`ExistenceCheck`].
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Find the region hosting `bucket`.
    async fn locate_bucket(
        &self,
        bucket: &str,
        identity: &AssumeRoleDescriptor,
    ) -> AwsResult<BucketLocation>;

    /// Assume `identity` under `policy` and HEAD the target in `location`.
    async fn check_exists(
        &self,
        target: &Target,
        location: &BucketLocation,
        identity: &AssumeRoleDescriptor,
        policy: Option<&PolicyDocument>,
    ) -> AwsResult<ExistenceCheck>;
}
