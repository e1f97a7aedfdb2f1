//! Process-wide bucket region cache.

use dashmap::DashMap;
use log::debug;
use std::future::Future;

use crate::types::BucketLocation;

/// Bucket name -> region, filled on first successful resolution.
///
/// Entries are never invalidated. Two probes missing the same bucket at once
/// may both resolve it; both arrive at the same region, so the later insert is
/// harmless.
#[derive(Debug, Default)]
pub struct BucketLocationCache {
    entries: DashMap<String, BucketLocation>,
}

impl BucketLocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bucket: &str) -> Option<BucketLocation> {
        self.entries.get(bucket).map(|entry| entry.value().clone())
    }

    /// Seed or overwrite the location for `bucket`.
    pub fn insert(&self, bucket: impl Into<String>, location: BucketLocation) {
        self.entries.insert(bucket.into(), location);
    }

    /// Return the cached location or run `resolve` and cache its success.
    ///
    /// No lock is held across `resolve`. A failed resolution is not cached.
    pub async fn get_or_resolve<F, Fut, E>(
        &self,
        bucket: &str,
        resolve: F,
    ) -> Result<BucketLocation, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BucketLocation, E>>,
    {
        if let Some(location) = self.get(bucket) {
            return Ok(location);
        }

        let location = resolve().await?;
        debug!("Resolved bucket {bucket} to region {}", location.region());
        self.insert(bucket, location.clone());
        Ok(location)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
