//! In-memory S3 stand-in for unit tests.
//!
//! The fake owns a bucket belonging to a fixed account and answers existence
//! checks by evaluating the session policy against that account, the same
//! decision IAM makes for the real service.

use async_trait::async_trait;
use std::future::pending;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::aws::{AwsError, AwsResult};
use crate::probing::{ExistenceCheck, ServiceFailure, StorageBackend};
use crate::synthesis::RESOURCE_ACCOUNT_KEY;
use crate::types::{AssumeRoleDescriptor, BucketLocation, PolicyDocument, Target};

pub(crate) fn identity() -> AssumeRoleDescriptor {
    AssumeRoleDescriptor::new("arn:aws:iam::111122223333:role/Prober")
}

pub(crate) struct FakeBackend {
    owners: Vec<String>,
    region: String,
    keys: Vec<String>,
    baseline_denied: bool,
    broken_credentials: bool,
    failing_prefix: Option<String>,
    stall_above_true_digit: bool,
    stall_misses: bool,
    locate_calls: AtomicUsize,
    check_calls: AtomicUsize,
    scoped_calls: AtomicUsize,
    regions_seen: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub(crate) fn new(owner: &str) -> Self {
        Self {
            owners: vec![owner.to_string()],
            region: "us-east-1".to_string(),
            keys: Vec::new(),
            baseline_denied: false,
            broken_credentials: false,
            failing_prefix: None,
            stall_above_true_digit: false,
            stall_misses: false,
            locate_calls: AtomicUsize::new(0),
            check_calls: AtomicUsize::new(0),
            scoped_calls: AtomicUsize::new(0),
            regions_seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    pub(crate) fn with_key(mut self, key: &str) -> Self {
        self.keys.push(key.to_string());
        self
    }

    /// Also grant access under policies matching `owner`, as if a second
    /// account's policy evaluation leaked into the same bucket.
    pub(crate) fn with_additional_owner(mut self, owner: &str) -> Self {
        self.owners.push(owner.to_string());
        self
    }

    pub(crate) fn with_baseline_denied(mut self) -> Self {
        self.baseline_denied = true;
        self
    }

    pub(crate) fn with_broken_credentials(mut self) -> Self {
        self.broken_credentials = true;
        self
    }

    /// Answer with a 500 whenever the policy scopes to exactly `prefix`.
    pub(crate) fn with_failing_prefix(mut self, prefix: &str) -> Self {
        self.failing_prefix = Some(prefix.to_string());
        self
    }

    /// Never answer scoped probes whose candidate digit exceeds the owner's
    /// digit at that position.
    pub(crate) fn with_stall_above_true_digit(mut self) -> Self {
        self.stall_above_true_digit = true;
        self
    }

    /// Never answer scoped probes that would be denied.
    pub(crate) fn with_stalled_misses(mut self) -> Self {
        self.stall_misses = true;
        self
    }

    pub(crate) fn locate_calls(&self) -> usize {
        self.locate_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn scoped_calls(&self) -> usize {
        self.scoped_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn regions_seen(&self) -> Vec<String> {
        self.regions_seen.lock().expect("lock").clone()
    }

    fn primary_owner(&self) -> &str {
        &self.owners[0]
    }
}

fn denied() -> ExistenceCheck {
    ExistenceCheck::Rejected(ServiceFailure {
        code: Some("AccessDenied".to_string()),
        status: Some(403),
        message: "Access Denied".to_string(),
    })
}

/// First `s3:ResourceAccount` prefix in the policy, without its wildcard.
fn scoped_prefix(policy: &PolicyDocument) -> Option<String> {
    policy
        .statement
        .iter()
        .flat_map(|s| s.condition.values())
        .filter_map(|keys| keys.get(RESOURCE_ACCOUNT_KEY))
        .flatten()
        .next()
        .map(|p| p.trim_end_matches('*').to_string())
}

#[async_trait]
impl StorageBackend for FakeBackend {
    async fn locate_bucket(
        &self,
        _bucket: &str,
        _identity: &AssumeRoleDescriptor,
    ) -> AwsResult<BucketLocation> {
        if self.broken_credentials {
            return Err(AwsError::StsError("InvalidClientTokenId".to_string()));
        }
        self.locate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(BucketLocation::new(self.region.clone()))
    }

    async fn check_exists(
        &self,
        target: &Target,
        location: &BucketLocation,
        _identity: &AssumeRoleDescriptor,
        policy: Option<&PolicyDocument>,
    ) -> AwsResult<ExistenceCheck> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        self.regions_seen
            .lock()
            .expect("lock")
            .push(location.region().to_string());

        match policy {
            None => {
                if self.baseline_denied {
                    return Ok(denied());
                }
            }
            Some(policy) => {
                self.scoped_calls.fetch_add(1, Ordering::SeqCst);
                let prefix = scoped_prefix(policy).unwrap_or_default();

                if self.failing_prefix.as_deref() == Some(prefix.as_str()) {
                    return Ok(ExistenceCheck::Rejected(ServiceFailure {
                        code: Some("InternalError".to_string()),
                        status: Some(500),
                        message: "We encountered an internal error".to_string(),
                    }));
                }

                if self.stall_above_true_digit {
                    let position = prefix.len() - 1;
                    let owner = self.primary_owner().as_bytes();
                    if prefix.as_bytes()[position] > owner[position] {
                        pending::<()>().await;
                    }
                }

                let allowed = self
                    .owners
                    .iter()
                    .any(|owner| policy.allows_resource_account(owner));
                if !allowed {
                    if self.stall_misses {
                        pending::<()>().await;
                    }
                    return Ok(denied());
                }
            }
        }

        if !target.is_bucket_level() && !self.keys.iter().any(|k| k == target.key()) {
            return Ok(ExistenceCheck::Rejected(ServiceFailure {
                code: Some("NotFound".to_string()),
                status: Some(404),
                message: "Not Found".to_string(),
            }));
        }
        Ok(ExistenceCheck::Found)
    }
}
