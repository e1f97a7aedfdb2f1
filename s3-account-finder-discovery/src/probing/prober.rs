//! Runs a single policy-scoped existence check and classifies the response.

use log::debug;
use std::sync::Arc;

use super::{BucketLocationCache, ExistenceCheck, ServiceFailure, StorageBackend};
use crate::error::DiscoveryResult;
use crate::types::{AccessOutcome, AssumeRoleDescriptor, PolicyDocument, Target};

const DENIED_CODES: &[&str] = &["403", "AccessDenied", "Forbidden"];
const NOT_FOUND_CODES: &[&str] = &["404", "NotFound", "NoSuchKey", "NoSuchBucket"];

/// Probes a target under an optional session policy.
///
/// Owns a handle to the shared [`BucketLocationCache`]; the location lookup
/// happens once per bucket, every later probe reuses it.
#[derive(Clone)]
pub struct AccessProber {
    backend: Arc<dyn StorageBackend>,
    locations: Arc<BucketLocationCache>,
}

impl std::fmt::Debug for AccessProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessProber")
            .field("cached_locations", &self.locations.len())
            .finish_non_exhaustive()
    }
}

impl AccessProber {
    pub fn new(backend: Arc<dyn StorageBackend>, locations: Arc<BucketLocationCache>) -> Self {
        Self { backend, locations }
    }

    /// Probe `target` as `identity`, restricted by `policy` when given.
    ///
    /// `Err` means the probe could not be performed at all (credentials,
    /// transport, region lookup) and the run must stop. Service responses
    /// that fit no known class come back as [`AccessOutcome::Indeterminate`].
    pub async fn probe(
        &self,
        target: &Target,
        identity: &AssumeRoleDescriptor,
        policy: Option<&PolicyDocument>,
    ) -> DiscoveryResult<AccessOutcome> {
        let location = self
            .locations
            .get_or_resolve(target.bucket(), || {
                self.backend.locate_bucket(target.bucket(), identity)
            })
            .await?;

        let check = self
            .backend
            .check_exists(target, &location, identity, policy)
            .await?;

        let outcome = classify(check);
        debug!(
            "Probe of {target} in {} ({}) -> {outcome}",
            location.region(),
            if policy.is_some() { "scoped" } else { "baseline" }
        );
        Ok(outcome)
    }
}

/// Map an existence check onto the tri-state outcome.
///
/// A not-found response still proves the request got past authorization, so
/// it counts as a match.
pub fn classify(check: ExistenceCheck) -> AccessOutcome {
    match check {
        ExistenceCheck::Found => AccessOutcome::Match,
        ExistenceCheck::Rejected(failure) => classify_failure(failure),
    }
}

fn classify_failure(failure: ServiceFailure) -> AccessOutcome {
    let code = failure.code.as_deref();
    if code.is_some_and(|c| DENIED_CODES.contains(&c)) || failure.status == Some(403) {
        return AccessOutcome::NoMatch;
    }
    if code.is_some_and(|c| NOT_FOUND_CODES.contains(&c)) || failure.status == Some(404) {
        return AccessOutcome::Match;
    }
    AccessOutcome::Indeterminate {
        code: failure.code,
        status: failure.status,
        message: failure.message,
    }
}
