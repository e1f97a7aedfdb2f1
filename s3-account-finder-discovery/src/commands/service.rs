//! S3 Account Finder Service Layer
//!
//! Wires the AWS-backed prober, the shared bucket location cache and the
//! discovery engine together behind one entry point that adapters such as the
//! CLI can call with raw user input.

use std::sync::Arc;

use crate::aws::s3_backend::{AwsStorageBackend, DEFAULT_BASE_REGION};
use crate::aws::AwsError;
use crate::discovery::{DiscoveryConfig, DiscoveryEngine};
use crate::error::DiscoveryResult;
use crate::probing::{AccessProber, BucketLocationCache};
use crate::types::{AccountId, AssumeRoleDescriptor, Target};

/// Settings for [`AccountFinderService::new`].
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Region used for the initial bucket region lookup.
    pub base_region: String,
    pub discovery: DiscoveryConfig,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            base_region: DEFAULT_BASE_REGION.to_string(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

/// Main service struct that owns the discovery engine.
#[derive(Debug)]
pub struct AccountFinderService {
    engine: DiscoveryEngine,
}

impl AccountFinderService {
    /// Create a new service instance backed by AWS.
    ///
    /// The base configuration is loaded using the default credential provider
    /// chain; those credentials are only used to call `sts:AssumeRole`.
    ///
    /// # Errors
    ///
    /// Returns an error if no credentials provider could be configured.
    pub async fn new(options: ServiceOptions) -> DiscoveryResult<Self> {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;

        if config.credentials_provider().is_none() {
            return Err(AwsError::ConfigError(
                "no AWS credentials provider is configured".to_string(),
            )
            .into());
        }

        let backend = AwsStorageBackend::new(config, options.base_region);
        let prober = AccessProber::new(Arc::new(backend), Arc::new(BucketLocationCache::new()));

        Ok(Self::from_engine(DiscoveryEngine::with_config(
            prober,
            options.discovery,
        )))
    }

    /// Wrap an already assembled engine, e.g. one over a non-AWS backend.
    pub fn from_engine(engine: DiscoveryEngine) -> Self {
        Self { engine }
    }

    /// Parse `path` and discover the account owning its bucket, reporting
    /// each confirmed prefix to `on_digit`.
    pub async fn find_owner<F>(
        &self,
        path: &str,
        identity: &AssumeRoleDescriptor,
        on_digit: F,
    ) -> DiscoveryResult<AccountId>
    where
        F: FnMut(&AccountId),
    {
        let target = Target::parse(path)?;
        self.engine
            .discover_with_progress(&target, identity, on_digit)
            .await
    }
}
