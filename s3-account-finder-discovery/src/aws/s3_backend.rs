//! S3 implementation of the probing backend.
//!
//! Every existence check assumes the role afresh so that the session policy
//! for that probe is the only thing scoping the request.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::Client as S3Client;
use aws_sdk_sts::Client as StsClient;
use log::debug;

use crate::aws::sts::assume_role;
use crate::aws::{AwsError, AwsResult};
use crate::probing::{ExistenceCheck, ServiceFailure, StorageBackend};
use crate::types::{AssumeRoleDescriptor, BucketLocation, PolicyDocument, Target};

/// Header S3 uses to report a bucket's region, including on redirects and denials.
const BUCKET_REGION_HEADER: &str = "x-amz-bucket-region";

/// Default region for the initial bucket region lookup.
pub const DEFAULT_BASE_REGION: &str = "us-east-1";

pub struct AwsStorageBackend {
    sdk_config: SdkConfig,
    sts_client: StsClient,
    base_region: String,
}

impl AwsStorageBackend {
    pub fn new(sdk_config: SdkConfig, base_region: impl Into<String>) -> Self {
        Self {
            sts_client: StsClient::new(&sdk_config),
            sdk_config,
            base_region: base_region.into(),
        }
    }

    pub fn base_region(&self) -> &str {
        &self.base_region
    }

    async fn s3_client(
        &self,
        region: &str,
        identity: &AssumeRoleDescriptor,
        policy: Option<&PolicyDocument>,
    ) -> AwsResult<S3Client> {
        let credentials = assume_role(&self.sts_client, identity, policy).await?;
        let config = aws_sdk_s3::config::Builder::from(&self.sdk_config)
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .build();
        Ok(S3Client::from_conf(config))
    }
}

#[async_trait]
impl StorageBackend for AwsStorageBackend {
    async fn locate_bucket(
        &self,
        bucket: &str,
        identity: &AssumeRoleDescriptor,
    ) -> AwsResult<BucketLocation> {
        let client = self.s3_client(&self.base_region, identity, None).await?;

        match client.head_bucket().bucket(bucket).send().await {
            Ok(output) => {
                let region = output.bucket_region().unwrap_or(self.base_region.as_str());
                Ok(BucketLocation::new(region))
            }
            Err(err) => {
                // Wrong-region redirects and denials still carry the header.
                if let Some(region) = region_header(&err) {
                    debug!("Bucket {bucket} region from error response: {region}");
                    return Ok(BucketLocation::new(region));
                }
                Err(AwsError::LocationError(format!(
                    "Failed to get bucket region for '{bucket}': {}",
                    DisplayErrorContext(&err)
                )))
            }
        }
    }

    async fn check_exists(
        &self,
        target: &Target,
        location: &BucketLocation,
        identity: &AssumeRoleDescriptor,
        policy: Option<&PolicyDocument>,
    ) -> AwsResult<ExistenceCheck> {
        let client = self.s3_client(location.region(), identity, policy).await?;

        if target.is_bucket_level() {
            let result = client.head_bucket().bucket(target.bucket()).send().await;
            existence_check(result)
        } else {
            let result = client
                .head_object()
                .bucket(target.bucket())
                .key(target.key())
                .send()
                .await;
            existence_check(result)
        }
    }
}

fn region_header<E>(err: &SdkError<E, HttpResponse>) -> Option<String> {
    err.raw_response()
        .and_then(|response| response.headers().get(BUCKET_REGION_HEADER))
        .map(str::to_string)
}

/// Keep service responses for classification; anything else is a transport failure.
fn existence_check<T, E>(result: Result<T, SdkError<E, HttpResponse>>) -> AwsResult<ExistenceCheck>
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match result {
        Ok(_) => Ok(ExistenceCheck::Found),
        Err(SdkError::ServiceError(context)) => {
            let status = context.raw().status().as_u16();
            let err = context.err();
            Ok(ExistenceCheck::Rejected(ServiceFailure {
                code: err.code().map(str::to_string),
                status: Some(status),
                message: err
                    .message()
                    .map_or_else(|| err.to_string(), str::to_string),
            }))
        }
        Err(err) => Err(AwsError::S3Error(format!(
            "Request failed: {}",
            DisplayErrorContext(&err)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_config::BehaviorVersion;

    #[test]
    fn test_backend_keeps_base_region() {
        let config = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(DEFAULT_BASE_REGION))
            .build();
        let backend = AwsStorageBackend::new(config, "eu-west-1");
        assert_eq!(backend.base_region(), "eu-west-1");
    }
}
