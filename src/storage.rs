use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::debug;

use crate::config::MediaConfig;

/// External object store that car images are pushed to.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Stores `body` under `key` and returns the URL clients should use to fetch it.
    async fn upload(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct S3Uploader {
    client: Client,
    bucket: String,
    public_url: String,
}

impl S3Uploader {
    pub async fn new(cfg: &MediaConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            public_url: cfg.public_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }
}

#[async_trait]
impl MediaUploader for S3Uploader {
    async fn upload(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("s3 put_object {}", key))?;
        debug!(%key, bucket = %self.bucket, "object uploaded");
        Ok(self.url_for(key))
    }
}
