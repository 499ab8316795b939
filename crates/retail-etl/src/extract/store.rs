//! Object storage abstraction.
//!
//! Pipelines only ever list, read and write whole objects, so the trait is
//! three calls wide. Credentials and connections belong to whoever builds the
//! store; the crate ships a directory-backed store and an in-memory one.

use crate::error::{EtlError, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Render an object location for logs and path matching.
pub fn s3_path(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}

/// Whole-object storage keyed by bucket and key.
pub trait ObjectStore: Send + Sync {
    /// Keys in `bucket` starting with `prefix`, sorted.
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    /// Object contents; [`EtlError::NotFound`] when absent.
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Create or overwrite an object.
    fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<()>;
}

/// Buckets as directories under a root; keys are `/`-separated relative paths.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.join(bucket), |path, part| path.join(part))
    }
}

fn collect_keys(dir: &Path, base: &Path, keys: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_keys(&path, base, keys)?;
        } else if let Ok(relative) = path.strip_prefix(base) {
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            keys.push(key);
        }
    }
    Ok(())
}

impl ObjectStore for LocalObjectStore {
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let base = self.root.join(bucket);
        if !base.is_dir() {
            return Err(EtlError::NotFound(format!("bucket '{bucket}'")));
        }
        let mut keys = Vec::new();
        collect_keys(&base, &base, &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        debug!("Listed {} keys under {}", keys.len(), s3_path(bucket, prefix));
        Ok(keys)
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, key);
        if !path.is_file() {
            return Err(EtlError::NotFound(s3_path(bucket, key)));
        }
        Ok(fs::read(path)?)
    }

    fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)
            .map_err(|e| EtlError::write_failed(s3_path(bucket, key), e))
    }
}

/// Objects held in memory, shareable behind `Arc`.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<(String, String), Vec<u8>>>,
}

static_assertions::assert_impl_all!(MemoryObjectStore: Send, Sync);

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object, builder style.
    pub fn with_object(self, bucket: &str, key: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.objects
            .write()
            .insert((bucket.to_string(), key.to_string()), bytes.into());
        self
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .read()
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| EtlError::NotFound(s3_path(bucket, key)))
    }

    fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.objects
            .write()
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_memory_store_lists_by_prefix() {
        let store = MemoryObjectStore::new()
            .with_object("b", "raw/sales.csv", "a")
            .with_object("b", "raw/products.json", "b")
            .with_object("b", "cleaned/sales.csv", "c")
            .with_object("other", "raw/x.csv", "d");

        assert_eq!(
            store.list("b", "raw/").unwrap(),
            vec!["raw/products.json".to_string(), "raw/sales.csv".to_string()]
        );
        assert_eq!(store.get("b", "cleaned/sales.csv").unwrap(), b"c".to_vec());
        assert!(matches!(store.get("b", "nope"), Err(EtlError::NotFound(_))));
    }

    #[test]
    fn test_local_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());

        store.put("bucket", "out/nested/file.csv", b"x,y\n1,2\n".to_vec()).unwrap();
        store.put("bucket", "out/other.json", b"[]".to_vec()).unwrap();

        assert_eq!(
            store.list("bucket", "out/nested").unwrap(),
            vec!["out/nested/file.csv".to_string()]
        );
        assert_eq!(store.list("bucket", "").unwrap().len(), 2);
        assert_eq!(
            store.get("bucket", "out/nested/file.csv").unwrap(),
            b"x,y\n1,2\n".to_vec()
        );
        assert!(store.list("missing", "").is_err());
    }

    #[test]
    fn test_s3_path() {
        assert_eq!(s3_path("retail", "raw/sales.csv"), "s3://retail/raw/sales.csv");
    }
}
