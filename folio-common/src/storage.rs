//! Bucket storage for uploaded media
//!
//! Named buckets are directories under the root folder; every stored object
//! gets a public URL `{public_base_url}/{bucket}/{object}` which is what the
//! content tables record.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

pub const TRACKS_BUCKET: &str = "tracks";
pub const COVERS_BUCKET: &str = "covers";
pub const FOOD_BUCKET: &str = "food";
pub const TABS_BUCKET: &str = "tabs";
pub const SOUNDFONTS_BUCKET: &str = "soundfonts";

/// Result of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    /// Object name inside the bucket
    pub object: String,
    pub public_url: String,
}

#[derive(Debug, Clone)]
pub struct BucketStore {
    root: PathBuf,
    public_base_url: String,
}

impl BucketStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `bytes` under a fresh unique object name derived from `file_name`
    pub async fn upload(&self, bucket: &str, file_name: &str, bytes: &[u8]) -> Result<StoredObject> {
        validate_bucket(bucket)?;
        let object = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(file_name));

        let dir = self.root.join(bucket);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&object), bytes).await?;

        let public_url = self.public_url(bucket, &object);
        info!(bucket, object = %object, size = bytes.len(), "Stored upload");

        Ok(StoredObject {
            bucket: bucket.to_string(),
            object,
            public_url,
        })
    }

    /// Upload a local file, keeping its file name as the object suffix
    pub async fn upload_file(&self, bucket: &str, path: &Path) -> Result<StoredObject> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        self.upload(bucket, &file_name, &bytes).await
    }

    pub fn public_url(&self, bucket: &str, object: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, object)
    }

    /// Map a public URL produced by this store back to `(bucket, object)`
    ///
    /// Returns None for foreign URLs (content may reference external media).
    pub fn locate(&self, public_url: &str) -> Option<(String, String)> {
        let rest = public_url.strip_prefix(&self.public_base_url)?.strip_prefix('/')?;
        let (bucket, object) = rest.split_once('/')?;
        if validate_bucket(bucket).is_err() || !is_valid_object(object) {
            return None;
        }
        Some((bucket.to_string(), object.to_string()))
    }

    pub async fn remove(&self, bucket: &str, object: &str) -> Result<()> {
        validate_bucket(bucket)?;
        if !is_valid_object(object) {
            return Err(Error::InvalidInput(format!("Invalid object name: {:?}", object)));
        }
        match tokio::fs::remove_file(self.root.join(bucket).join(object)).await {
            Ok(()) => {
                debug!(bucket, object, "Removed object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("{}/{}", bucket, object)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the object behind a public URL if this store owns it
    ///
    /// Returns whether anything was deleted; foreign or already-missing
    /// objects are not an error.
    pub async fn remove_by_url(&self, public_url: &str) -> Result<bool> {
        let Some((bucket, object)) = self.locate(public_url) else {
            return Ok(false);
        };
        match self.remove(&bucket, &object).await {
            Ok(()) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Object names in a bucket, sorted
    pub async fn list(&self, bucket: &str) -> Result<Vec<String>> {
        validate_bucket(bucket)?;
        let dir = self.root.join(bucket);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn validate_bucket(bucket: &str) -> Result<()> {
    let valid = !bucket.is_empty()
        && bucket.len() <= 63
        && bucket
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Invalid bucket name: {:?}", bucket)))
    }
}

fn is_valid_object(object: &str) -> bool {
    !object.is_empty()
        && !object.starts_with('.')
        && !object.contains('/')
        && !object.contains('\\')
}

/// Reduce a client-supplied file name to `[A-Za-z0-9._-]`
fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.chars().take(120).collect()
    }
}
