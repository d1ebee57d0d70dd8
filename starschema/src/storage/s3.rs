use common::Result;
use common::config::AwsConfig;
use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use std::sync::Arc;
use tracing::debug;

/// Builds an S3 store for `bucket` from explicit settings. Nothing is read
/// from or written to the process environment.
pub fn build_s3_store(bucket: &str, aws: &AwsConfig) -> Result<Arc<dyn ObjectStore>> {
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_region(&aws.region)
        .with_allow_http(aws.allow_http);

    if aws.has_credentials() {
        builder = builder
            .with_access_key_id(&aws.access_key_id)
            .with_secret_access_key(&aws.secret_access_key);
    } else {
        debug!(bucket, "No static credentials configured, using the default S3 credential chain");
    }

    if let Some(endpoint) = &aws.endpoint {
        builder = builder.with_endpoint(endpoint);
    }

    let s3 = builder.build()?;
    Ok(Arc::new(s3))
}
