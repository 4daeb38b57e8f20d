//! Persistent storage for the negotiated session cookie.
//!
//! The store holds a single serialized `Cookie` header under a fixed key. It is
//! read before a resolution run and written back afterwards when the run's jar
//! differs from what was loaded.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

/// Fixed key under which the session cookie is persisted.
pub const COOKIE_STORE_KEY: &str = "session-cookie";

/// Errors for persisted cookie storage operations.
#[derive(Debug, thiserror::Error)]
pub enum CookieStoreError {
    /// Filesystem I/O failed.
    #[error("cookie store I/O error at {path}: {source}")]
    Io {
        /// Path of the backing file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl CookieStoreError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Capability to load and save the persisted session cookie.
///
/// # Object Safety
///
/// This trait uses `async_trait` so stores can be shared as `Arc<dyn CookieStore>`.
#[async_trait]
pub trait CookieStore: Send + Sync {
    /// Loads the persisted cookie header, `None` when nothing was stored yet.
    async fn load(&self) -> Result<Option<String>, CookieStoreError>;

    /// Replaces the persisted cookie header.
    async fn save(&self, cookie: &str) -> Result<(), CookieStoreError>;
}

/// Process-local cookie store.
#[derive(Default)]
pub struct MemoryCookieStore {
    value: RwLock<Option<String>>,
}

impl std::fmt::Debug for MemoryCookieStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCookieStore")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl MemoryCookieStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with `cookie`.
    #[must_use]
    pub fn with_cookie(cookie: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(Some(cookie.into())),
        }
    }
}

#[async_trait]
impl CookieStore for MemoryCookieStore {
    async fn load(&self) -> Result<Option<String>, CookieStoreError> {
        Ok(self.value.read().await.clone())
    }

    async fn save(&self, cookie: &str) -> Result<(), CookieStoreError> {
        *self.value.write().await = Some(cookie.to_string());
        Ok(())
    }
}

/// File-backed cookie store: one file named [`COOKIE_STORE_KEY`] in a directory.
#[derive(Debug, Clone)]
pub struct FileCookieStore {
    path: PathBuf,
}

impl FileCookieStore {
    /// Creates a store persisting into `dir`.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(COOKIE_STORE_KEY),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CookieStore for FileCookieStore {
    async fn load(&self) -> Result<Option<String>, CookieStoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let trimmed = raw.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(CookieStoreError::io(&self.path, error)),
        }
    }

    async fn save(&self, cookie: &str) -> Result<(), CookieStoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CookieStoreError::io(parent, e))?;
        }
        // Write-then-rename so a crash never leaves a truncated cookie behind.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, cookie)
            .await
            .map_err(|e| CookieStoreError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| CookieStoreError::io(&self.path, e))?;
        debug!(path = %self.path.display(), "persisted session cookie");
        Ok(())
    }
}
