//! This crate provides the core logic for S3 Account Finder:
//! - Session policy synthesis scoped to account ID prefixes
//! - Policy-scoped access probing with a shared bucket region cache
//! - Digit-by-digit discovery of the account that owns a bucket
//!

mod aws;
pub mod commands;
pub mod discovery;
mod error;
pub mod probing;
mod synthesis;
mod types;

#[cfg(test)]
mod test_utils;

// Re-exports for a small, focused public API
pub use aws::s3_backend::{AwsStorageBackend, DEFAULT_BASE_REGION};
pub use aws::{AwsError, AwsResult};
pub use commands::{AccountFinderService, ServiceOptions};
pub use discovery::{DiscoveryConfig, DiscoveryEngine};
pub use error::{DiscoveryError, DiscoveryResult};
pub use probing::{
    classify, AccessProber, BucketLocationCache, ExistenceCheck, ServiceFailure, StorageBackend,
};
pub use synthesis::{build_prefix_policy, RESOURCE_ACCOUNT_KEY};
pub use types::{
    AccessOutcome, AccountId, AssumeRoleDescriptor, BucketLocation, ConditionBlock,
    PolicyDocument, PrefixSet, Statement, Target, ACCOUNT_ID_LENGTH, DEFAULT_SESSION_NAME,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_policy_sample() {
        let policy = build_prefix_policy(&PrefixSet::single("0123").expect("valid"));
        let json = serde_json::to_string(&policy).expect("serializable");
        assert!(json.contains("2012-10-17"));
        assert!(json.contains("\"s3:ResourceAccount\":[\"0123*\"]"));
    }
}
