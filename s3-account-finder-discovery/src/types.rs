//! Core value types shared by the prober and the discovery engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{DiscoveryError, DiscoveryResult};

/// Number of decimal digits in an AWS account ID.
pub const ACCOUNT_ID_LENGTH: usize = 12;

/// Session name used when the caller does not supply one.
pub const DEFAULT_SESSION_NAME: &str = "s3-account-finder";

/// An S3 location to probe: a bucket and an optional object key.
///
/// An empty key means the probe is a bucket-level existence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    bucket: String,
    key: String,
}

impl Target {
    /// Build a target from an already split bucket and key.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> DiscoveryResult<Self> {
        let bucket = bucket.into();
        if bucket.is_empty() {
            return Err(DiscoveryError::invalid_target(
                bucket,
                "bucket name must not be empty",
            ));
        }
        Ok(Self {
            bucket,
            key: key.into(),
        })
    }

    /// Parse `bucket`, `bucket/key...`, `s3://bucket/key...` or an S3 ARN.
    ///
    /// The path is split on the first `/` after the bucket name; everything
    /// after it, including further slashes, is the object key.
    pub fn parse(input: &str) -> DiscoveryResult<Self> {
        let path = strip_location_prefix(input.trim())
            .ok_or_else(|| DiscoveryError::invalid_target(input, "not an S3 ARN"))?;
        let (bucket, key) = path.split_once('/').unwrap_or((path, ""));
        if bucket.is_empty() {
            return Err(DiscoveryError::invalid_target(
                input,
                "bucket name must not be empty",
            ));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_bucket_level(&self) -> bool {
        self.key.is_empty()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            write!(f, "s3://{}", self.bucket)
        } else {
            write!(f, "s3://{}/{}", self.bucket, self.key)
        }
    }
}

/// Strip `s3://` or `arn:<partition>:s3:::`; `None` for ARNs of other services.
fn strip_location_prefix(path: &str) -> Option<&str> {
    if let Some(rest) = path.strip_prefix("s3://") {
        return Some(rest);
    }
    if let Some(rest) = path.strip_prefix("arn:") {
        let mut parts = rest.splitn(5, ':');
        let _partition = parts.next()?;
        let service = parts.next()?;
        let region = parts.next()?;
        let account = parts.next()?;
        let resource = parts.next()?;
        if service == "s3" && region.is_empty() && account.is_empty() {
            return Some(resource);
        }
        return None;
    }
    Some(path)
}

/// The role to assume for each probe.
///
/// The restricting session policy is supplied per probe and is not part of
/// the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleDescriptor {
    pub role_arn: String,
    pub session_name: String,
    pub external_id: Option<String>,
}

impl AssumeRoleDescriptor {
    pub fn new(role_arn: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            session_name: DEFAULT_SESSION_NAME.to_string(),
            external_id: None,
        }
    }

    #[must_use]
    pub fn with_session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = session_name.into();
        self
    }

    #[must_use]
    pub fn with_external_id(mut self, external_id: Option<String>) -> Self {
        self.external_id = external_id;
        self
    }
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    /// The request passed authorization: the owning account matches the policy.
    Match,
    /// The request was denied: the owning account matches no prefix in the policy.
    NoMatch,
    /// Any other provider error. Never reinterpreted as a match or a miss.
    Indeterminate {
        code: Option<String>,
        status: Option<u16>,
        message: String,
    },
}

impl AccessOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

impl fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Match => write!(f, "Match"),
            Self::NoMatch => write!(f, "NoMatch"),
            Self::Indeterminate {
                code,
                status,
                message,
            } => {
                let code = code.as_deref().unwrap_or("<none>");
                match status {
                    Some(status) => write!(f, "Indeterminate({code}, HTTP {status}): {message}"),
                    None => write!(f, "Indeterminate({code}): {message}"),
                }
            }
        }
    }
}

/// Region a bucket is hosted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketLocation {
    region: String,
}

impl BucketLocation {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

/// The account ID confirmed so far, built one digit at a time from the left.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountId(String);

impl AccountId {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_digit(&mut self, digit: char) {
        debug_assert!(digit.is_ascii_digit());
        debug_assert!(self.0.len() < ACCOUNT_ID_LENGTH);
        self.0.push(digit);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.0.len() == ACCOUNT_ID_LENGTH
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, non-empty, de-duplicated set of account ID prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixSet(Vec<String>);

impl PrefixSet {
    pub fn new<I, S>(prefixes: I) -> DiscoveryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: Vec<String> = Vec::new();
        for prefix in prefixes {
            let prefix = prefix.into();
            if prefix.is_empty() || prefix.len() > ACCOUNT_ID_LENGTH {
                return Err(DiscoveryError::InvalidPrefix(format!(
                    "'{prefix}' must be 1 to {ACCOUNT_ID_LENGTH} digits long"
                )));
            }
            if !prefix.chars().all(|c| c.is_ascii_digit()) {
                return Err(DiscoveryError::InvalidPrefix(format!(
                    "'{prefix}' must contain only digits"
                )));
            }
            if !set.contains(&prefix) {
                set.push(prefix);
            }
        }
        if set.is_empty() {
            return Err(DiscoveryError::InvalidPrefix(
                "at least one prefix is required".to_string(),
            ));
        }
        Ok(Self(set))
    }

    pub fn single(prefix: impl Into<String>) -> DiscoveryResult<Self> {
        Self::new([prefix.into()])
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Never true for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Condition operator -> condition key -> values.
pub type ConditionBlock = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// IAM policy document, serialized with the PascalCase field names IAM expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub sid: String,
    pub effect: String,
    pub action: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub condition: ConditionBlock,
}
