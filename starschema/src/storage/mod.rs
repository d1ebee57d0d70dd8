pub mod s3;

use bytes::Bytes;
use common::config::AwsConfig;
use common::{Error, Result};
use datafusion::execution::context::SessionContext;
use futures::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// A root location (local directory or S3 bucket/prefix) together with the
/// object store that serves it.
#[derive(Debug, Clone)]
pub struct StorageRoot {
    base_url: Url,
    prefix: ObjectPath,
    store: Arc<dyn ObjectStore>,
}

impl StorageRoot {
    /// Resolves `root` as `s3://bucket[/prefix]`, `s3a://bucket[/prefix]` or
    /// a local filesystem path. Local roots are created when `create` is set.
    pub fn resolve(root: &str, aws: &AwsConfig, create: bool) -> Result<Self> {
        if let Some(rest) = root
            .strip_prefix("s3://")
            .or_else(|| root.strip_prefix("s3a://"))
        {
            let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
            if bucket.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "S3 root '{}' has no bucket name",
                    root
                )));
            }
            let store = s3::build_s3_store(bucket, aws)?;
            let base_url = Url::parse(&format!("s3://{}/", bucket))?;
            let prefix = ObjectPath::parse(key.trim_matches('/'))?;
            return Ok(Self::with_store(base_url, prefix, store));
        }

        if root.contains("://") {
            return Err(Error::InvalidInput(format!(
                "Unsupported storage root '{}': expected a local path or an s3:// location",
                root
            )));
        }

        Self::local(root, create)
    }

    pub fn local(root: &str, create: bool) -> Result<Self> {
        let path = std::path::Path::new(root);
        if create {
            std::fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(Error::InvalidInput(format!(
                "Local root '{}' is not a directory",
                root
            )));
        }

        let prefix = ObjectPath::from_filesystem_path(path)?;
        let base_url = Url::parse("file:///")?;
        Ok(Self::with_store(
            base_url,
            prefix,
            Arc::new(LocalFileSystem::new()),
        ))
    }

    /// Wraps an already built store. `base_url` must end with `/`.
    pub fn with_store(base_url: Url, prefix: ObjectPath, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            base_url,
            prefix,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn prefix(&self) -> &ObjectPath {
        &self.prefix
    }

    /// Makes the root's store reachable from DataFusion plans.
    pub fn register(&self, ctx: &SessionContext) {
        ctx.register_object_store(&self.base_url, self.store.clone());
    }

    /// Location of `relative` (a `/`-separated path) under the root.
    pub fn child(&self, relative: &str) -> ObjectPath {
        relative
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.prefix.clone(), |path, part| path.child(part))
    }

    /// Directory URL of `path`, in the form DataFusion writers expect.
    pub fn url_for(&self, path: &ObjectPath) -> String {
        format!("{}{}/", self.base_url, path)
    }

    /// Recursively lists the `.json` files under `prefix`, in lexicographic
    /// order.
    pub async fn list_json_files(&self, prefix: &str) -> Result<Vec<ObjectPath>> {
        let location = self.child(prefix);
        let mut files: Vec<ObjectPath> = self
            .list_objects(&location)
            .await?
            .into_iter()
            .map(|meta| meta.location)
            .filter(|path| path.as_ref().ends_with(".json"))
            .collect();
        files.sort();

        if files.is_empty() {
            info!(prefix = %location, "No .json files found");
        } else {
            debug!(prefix = %location, count = files.len(), "Listed .json files");
        }

        Ok(files)
    }

    pub async fn list_objects(&self, prefix: &ObjectPath) -> Result<Vec<ObjectMeta>> {
        let objects = self.store.list(Some(prefix)).try_collect::<Vec<_>>().await?;
        Ok(objects)
    }

    pub async fn read(&self, path: &ObjectPath) -> Result<Bytes> {
        let bytes = self.store.get(path).await?.bytes().await?;
        Ok(bytes)
    }

    pub async fn put(&self, path: &ObjectPath, data: Vec<u8>) -> Result<()> {
        self.store.put(path, PutPayload::from(data)).await?;
        Ok(())
    }

    /// Deletes every object under `prefix`, returning how many were removed.
    pub async fn delete_prefix(&self, prefix: &ObjectPath) -> Result<usize> {
        let objects = self.list_objects(prefix).await?;
        for object in &objects {
            self.store.delete(&object.location).await?;
        }
        Ok(objects.len())
    }

    /// Moves every object under `from` to the same relative location under
    /// `to`, returning how many were moved.
    pub async fn move_prefix(&self, from: &ObjectPath, to: &ObjectPath) -> Result<usize> {
        let objects = self.list_objects(from).await?;
        for object in &objects {
            let relative = object.location.prefix_match(from).ok_or_else(|| {
                Error::Storage(format!(
                    "Listed object {} is outside of {}",
                    object.location, from
                ))
            })?;
            let target = relative.fold(to.clone(), |path, part| path.child(part));
            self.store.rename(&object.location, &target).await?;
        }
        Ok(objects.len())
    }
}
