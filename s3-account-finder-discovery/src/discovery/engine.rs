//! Discovery engine
//!
//! Recovers the owning account one digit at a time. Each round probes the ten
//! candidate digits concurrently, each under a session policy scoped to
//! `<confirmed prefix><digit>*`; the candidate that is not denied is the next
//! digit. Rounds run strictly in order since each depends on the prefix
//! confirmed by the previous one.

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::probing::AccessProber;
use crate::synthesis::build_prefix_policy;
use crate::types::{AccessOutcome, AccountId, AssumeRoleDescriptor, PrefixSet, Target};

const DIGITS: [char; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];

/// Tuning knobs for a discovery run.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryConfig {
    /// Extra attempts for a round in which no digit matched. Zero means a
    /// round without a match fails the run immediately.
    pub round_retries: u32,
    /// Deadline for a single probe. `None` waits indefinitely.
    pub probe_timeout: Option<Duration>,
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_round_retries(mut self, round_retries: u32) -> Self {
        self.round_retries = round_retries;
        self
    }

    #[must_use]
    pub fn with_probe_timeout(mut self, probe_timeout: Option<Duration>) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }
}

/// Drives the per-digit search over an [`AccessProber`].
#[derive(Debug, Clone)]
pub struct DiscoveryEngine {
    prober: Arc<AccessProber>,
    config: DiscoveryConfig,
}

/// What a probe task reports back: its candidate index and either the probe
/// result or the deadline it exceeded.
type ProbeReport = (usize, Result<DiscoveryResult<AccessOutcome>, Duration>);

impl DiscoveryEngine {
    pub fn new(prober: AccessProber) -> Self {
        Self::with_config(prober, DiscoveryConfig::default())
    }

    pub fn with_config(prober: AccessProber, config: DiscoveryConfig) -> Self {
        Self {
            prober: Arc::new(prober),
            config,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Discover the 12-digit account that owns `target`'s bucket.
    pub async fn discover(
        &self,
        target: &Target,
        identity: &AssumeRoleDescriptor,
    ) -> DiscoveryResult<AccountId> {
        self.discover_with_progress(target, identity, |_| {}).await
    }

    /// Like [`discover`](Self::discover), calling `on_digit` with the confirmed
    /// prefix after every round.
    ///
    /// A baseline probe without any session policy runs first. If the role
    /// cannot reach the target at all, scoped probes would all be denied, so
    /// the run stops with [`DiscoveryError::NoBaselineAccess`] before any
    /// digit round.
    pub async fn discover_with_progress<F>(
        &self,
        target: &Target,
        identity: &AssumeRoleDescriptor,
        mut on_digit: F,
    ) -> DiscoveryResult<AccountId>
    where
        F: FnMut(&AccountId),
    {
        let baseline = self.prober.probe(target, identity, None).await?;
        if !baseline.is_match() {
            return Err(DiscoveryError::NoBaselineAccess {
                role_arn: identity.role_arn.clone(),
                bucket: target.bucket().to_string(),
                outcome: baseline,
            });
        }
        info!("{} can access {target}; starting search", identity.role_arn);

        let target = Arc::new(target.clone());
        let identity = Arc::new(identity.clone());
        let mut account = AccountId::new();

        while !account.is_complete() {
            let digit = self.find_next_digit(&target, &identity, &account).await?;
            account.push_digit(digit);
            info!("Found digits so far: {account}");
            on_digit(&account);
        }

        Ok(account)
    }

    async fn find_next_digit(
        &self,
        target: &Arc<Target>,
        identity: &Arc<AssumeRoleDescriptor>,
        prefix: &AccountId,
    ) -> DiscoveryResult<char> {
        let attempts = self.config.round_retries + 1;
        for attempt in 1..=attempts {
            if let Some(digit) = self.probe_round(target, identity, prefix).await? {
                return Ok(digit);
            }
            if attempt < attempts {
                warn!(
                    "No digit matched at position {} (attempt {attempt}/{attempts}), retrying round",
                    prefix.len()
                );
            }
        }

        Err(DiscoveryError::DigitNotFound {
            position: prefix.len(),
            prefix: prefix.to_string(),
        })
    }

    /// Probe all ten candidates for the digit after `prefix`.
    ///
    /// Returns the lowest matching digit. A match is accepted as soon as every
    /// lower digit has reported a miss; outstanding probes are then aborted.
    async fn probe_round(
        &self,
        target: &Arc<Target>,
        identity: &Arc<AssumeRoleDescriptor>,
        prefix: &AccountId,
    ) -> DiscoveryResult<Option<char>> {
        let position = prefix.len();
        let mut probes: JoinSet<ProbeReport> = JoinSet::new();

        for (index, digit) in DIGITS.iter().enumerate() {
            let policy = build_prefix_policy(&PrefixSet::single(format!("{prefix}{digit}"))?);
            let prober = Arc::clone(&self.prober);
            let target = Arc::clone(target);
            let identity = Arc::clone(identity);
            let timeout = self.config.probe_timeout;

            probes.spawn(async move {
                let probe = prober.probe(&target, &identity, Some(&policy));
                let result = match timeout {
                    Some(limit) => tokio::time::timeout(limit, probe).await.map_err(|_| limit),
                    None => Ok(probe.await),
                };
                (index, result)
            });
        }

        let mut outcomes: [Option<bool>; 10] = [None; 10];
        while let Some(joined) = probes.join_next().await {
            let (index, result) = joined.map_err(|e| DiscoveryError::TaskFailed {
                position,
                prefix: prefix.to_string(),
                reason: e.to_string(),
            })?;

            let outcome = result.map_err(|timeout| DiscoveryError::ProbeTimeout {
                position,
                prefix: prefix.to_string(),
                timeout,
            })??;
            debug!("Position {position}, digit {}: {outcome}", DIGITS[index]);

            match outcome {
                AccessOutcome::Match => outcomes[index] = Some(true),
                AccessOutcome::NoMatch => outcomes[index] = Some(false),
                AccessOutcome::Indeterminate { .. } => {
                    return Err(DiscoveryError::Indeterminate {
                        position,
                        prefix: prefix.to_string(),
                        outcome,
                    });
                }
            }

            if let Some(winner) = settled_match(&outcomes) {
                probes.abort_all();
                return Ok(Some(DIGITS[winner]));
            }
        }

        Ok(None)
    }
}

/// Lowest matching candidate, once every candidate below it has missed.
fn settled_match(outcomes: &[Option<bool>]) -> Option<usize> {
    for (index, outcome) in outcomes.iter().enumerate() {
        match outcome {
            Some(true) => return Some(index),
            Some(false) => {}
            None => return None,
        }
    }
    None
}
