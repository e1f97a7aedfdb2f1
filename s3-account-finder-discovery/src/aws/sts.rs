//! STS role assumption with an optional session policy.

use aws_sdk_s3::config::Credentials;
use aws_sdk_sts::error::DisplayErrorContext;
use aws_sdk_sts::Client as StsClient;
use std::time::SystemTime;

use crate::aws::{AwsError, AwsResult};
use crate::types::{AssumeRoleDescriptor, PolicyDocument};

const PROVIDER_NAME: &str = "s3-account-finder-assume-role";

/// Assume `identity`, narrowed by `policy` when given, and return the
/// temporary credentials in the form the S3 client expects.
pub(crate) async fn assume_role(
    client: &StsClient,
    identity: &AssumeRoleDescriptor,
    policy: Option<&PolicyDocument>,
) -> AwsResult<Credentials> {
    let policy_json = policy
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| AwsError::PolicyError(format!("Failed to serialize session policy: {e}")))?;

    let response = client
        .assume_role()
        .role_arn(&identity.role_arn)
        .role_session_name(&identity.session_name)
        .set_external_id(identity.external_id.clone())
        .set_policy(policy_json)
        .send()
        .await
        .map_err(|e| {
            AwsError::StsError(format!(
                "Failed to assume role '{}': {}",
                identity.role_arn,
                DisplayErrorContext(&e)
            ))
        })?;

    let credentials = response.credentials().ok_or_else(|| {
        AwsError::StsError(format!(
            "AssumeRole for '{}' returned no credentials",
            identity.role_arn
        ))
    })?;

    Ok(Credentials::new(
        credentials.access_key_id(),
        credentials.secret_access_key(),
        Some(credentials.session_token().to_string()),
        SystemTime::try_from(*credentials.expiration()).ok(),
        PROVIDER_NAME,
    ))
}
