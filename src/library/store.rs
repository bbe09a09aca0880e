//! Digest-keyed JSON store.
//!
//! Writes are atomic: the entry is written to a hidden temp file in the
//! target directory and renamed into place, so concurrent writers to the
//! same digest resolve as last-write-wins and readers never see a
//! partial file.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{ContentRecord, Enrichment, RawArchive, UrlEvent};
use crate::error::CacheError;

/// One of the three store directories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Archives,
    Enrichments,
    Content,
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Namespace::Archives => write!(f, "archives"),
            Namespace::Enrichments => write!(f, "enrichments"),
            Namespace::Content => write!(f, "content"),
        }
    }
}

/// Store for archives, enrichments and content records
#[derive(Debug, Clone)]
pub struct ContentStore {
    archives: PathBuf,
    enrichments: PathBuf,
    content: PathBuf,
}

impl ContentStore {
    pub fn new(
        archives: impl Into<PathBuf>,
        enrichments: impl Into<PathBuf>,
        content: impl Into<PathBuf>,
    ) -> Self {
        Self {
            archives: archives.into(),
            enrichments: enrichments.into(),
            content: content.into(),
        }
    }

    /// All three namespaces under one root
    pub fn at(root: &Path) -> Self {
        Self::new(
            root.join("archives"),
            root.join("enrichments"),
            root.join("content"),
        )
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.archives, &config.enrichments, &config.content)
    }

    pub fn dir(&self, namespace: Namespace) -> &Path {
        match namespace {
            Namespace::Archives => &self.archives,
            Namespace::Enrichments => &self.enrichments,
            Namespace::Content => &self.content,
        }
    }

    /// Path of the entry for `digest`
    pub fn path(&self, namespace: Namespace, digest: &str) -> PathBuf {
        self.dir(namespace).join(format!("{}.json", digest))
    }

    // ========================================================================
    // Archives
    // ========================================================================

    /// Load a cached archive for `url`.
    ///
    /// A non-2xx entry is deleted and reported as `Stale`.
    pub async fn load_archive(&self, url: &UrlEvent) -> Result<RawArchive, CacheError> {
        let digest = url.digest();
        let archive: RawArchive = self.read(Namespace::Archives, &digest).await?;

        if !archive.is_success() {
            self.evict(Namespace::Archives, &digest).await?;
            return Err(CacheError::Stale {
                digest,
                reason: format!("HTTP {}", archive.status()),
            });
        }
        if archive.url.raw != url.raw {
            return Err(CacheError::Mismatch { digest });
        }

        Ok(archive)
    }

    /// Save an archive. Only 2xx archives are accepted.
    pub async fn save_archive(&self, archive: &RawArchive) -> Result<PathBuf, CacheError> {
        let digest = archive.digest();
        if !archive.is_success() {
            return Err(CacheError::NotCacheable {
                digest,
                status: archive.status(),
            });
        }
        self.write(Namespace::Archives, &digest, archive).await
    }

    // ========================================================================
    // Enrichments
    // ========================================================================

    /// Load a cached enrichment. An empty one is deleted and reported as
    /// `Stale`.
    pub async fn load_enrichment(&self, url: &UrlEvent) -> Result<Enrichment, CacheError> {
        let digest = url.digest();
        let enrichment: Enrichment = self.read(Namespace::Enrichments, &digest).await?;

        if enrichment.is_empty() {
            self.evict(Namespace::Enrichments, &digest).await?;
            return Err(CacheError::Stale {
                digest,
                reason: "no transcriptions".to_string(),
            });
        }
        if enrichment.url.raw != url.raw {
            return Err(CacheError::Mismatch { digest });
        }

        Ok(enrichment)
    }

    pub async fn save_enrichment(&self, enrichment: &Enrichment) -> Result<PathBuf, CacheError> {
        self.write(Namespace::Enrichments, &enrichment.digest(), enrichment)
            .await
    }

    // ========================================================================
    // Content records
    // ========================================================================

    pub async fn load_content(&self, digest: &str) -> Result<ContentRecord, CacheError> {
        self.read(Namespace::Content, digest).await
    }

    pub async fn save_content(&self, record: &ContentRecord) -> Result<PathBuf, CacheError> {
        self.write(Namespace::Content, &record.digest(), record).await
    }

    /// Delete an entry. Returns whether one existed.
    pub async fn evict(&self, namespace: Namespace, digest: &str) -> Result<bool, CacheError> {
        let path = self.path(namespace, digest);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(%namespace, digest, "Evicted cache entry");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    // ========================================================================
    // Raw I/O
    // ========================================================================

    async fn read<T: DeserializeOwned>(
        &self,
        namespace: Namespace,
        digest: &str,
    ) -> Result<T, CacheError> {
        let path = self.path(namespace, digest);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::Miss(digest.to_string()));
            }
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
            digest: digest.to_string(),
            source,
        })
    }

    async fn write<T: Serialize>(
        &self,
        namespace: Namespace,
        digest: &str,
        value: &T,
    ) -> Result<PathBuf, CacheError> {
        let dir = self.dir(namespace);
        fs::create_dir_all(dir)
            .await
            .map_err(|source| CacheError::Io {
                path: dir.to_path_buf(),
                source,
            })?;

        let json = serde_json::to_vec_pretty(value).map_err(|source| CacheError::Corrupt {
            digest: digest.to_string(),
            source,
        })?;

        let path = self.path(namespace, digest);
        let temp_path = dir.join(format!(".{}.{}.tmp", digest, Uuid::new_v4()));

        if let Err(source) = write_file(&temp_path, &json).await {
            if let Err(e) = fs::remove_file(&temp_path).await {
                warn!(path = %temp_path.display(), error = %e, "Failed to clean up temp file");
            }
            return Err(CacheError::Io {
                path: temp_path,
                source,
            });
        }

        fs::rename(&temp_path, &path)
            .await
            .map_err(|source| CacheError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(%namespace, digest, "Saved cache entry");
        Ok(path)
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}
