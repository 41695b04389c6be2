//! Blob storage for uploaded images
//!
//! Images are written once under `images/<uuid>` and never modified. Any
//! `object_store` backend works; the server defaults to the local filesystem.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectStorePath;
use object_store::ObjectStoreExt;
use tracing::debug;
use uuid::Uuid;

use crate::utils::error::{PaddyError, Result};

/// Key prefix under which images are stored
const IMAGE_PREFIX: &str = "images";

/// Image blob store keyed by generated UUIDs
#[derive(Debug, Clone)]
pub struct BlobStore {
    store: Arc<dyn object_store::ObjectStore>,
    root: ObjectStorePath,
}

impl BlobStore {
    /// Wrap an existing object store
    pub fn new(store: Arc<dyn object_store::ObjectStore>) -> Self {
        Self {
            store,
            root: ObjectStorePath::default(),
        }
    }

    /// Open a store from a URL such as `file:///var/lib/paddy` or `memory:///`
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| PaddyError::Config(format!("invalid blob store URL '{}': {}", url, e)))?;
        let (store, root) = object_store::parse_url(&parsed)?;
        Ok(Self {
            store: Arc::from(store),
            root,
        })
    }

    /// Open a store rooted at a local directory, creating it if needed
    pub fn local(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let store = LocalFileSystem::new_with_prefix(dir)?;
        Ok(Self::new(Arc::new(store)))
    }

    /// Volatile store, for tests and throwaway runs
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    fn image_path(&self, id: Uuid) -> ObjectStorePath {
        self.root.clone().join(IMAGE_PREFIX).join(id.to_string())
    }

    /// Store image bytes under a freshly generated id
    pub async fn put(&self, data: Bytes) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let path = self.image_path(id);
        let size = data.len();

        self.store.put(&path, data.into()).await?;
        debug!("Stored {} bytes at {}", size, path);
        Ok(id)
    }

    /// Read back the bytes of a stored image
    pub async fn get(&self, id: Uuid) -> Result<Bytes> {
        let path = self.image_path(id);
        let bytes = self.store.get(&path).await?.bytes().await?;
        Ok(bytes)
    }

    /// Remove a stored image
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let path = self.image_path(id);
        self.store.delete(&path).await?;
        debug!("Deleted {}", path);
        Ok(())
    }
}
