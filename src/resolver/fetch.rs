//! Obtaining package archives

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::ResolveError;

const ARCHIVE_SUFFIX: &str = ".zip";

/// Produces a local path to an archive for a package
#[async_trait(?Send)]
pub trait ArchiveFetcher {
    async fn fetch(&self, package: &str) -> Result<PathBuf, ResolveError>;
}

/// Package names become file names and URL segments; keep them plain
fn check_name(package: &str) -> Result<(), ResolveError> {
    let valid = !package.is_empty()
        && package
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && !package.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(ResolveError::Fetch {
            package: package.to_string(),
            reason: "not a valid package name".to_string(),
        })
    }
}

/* ===================== Local Archives ===================== */

/// A directory of `<name>.zip` or `<name>-<version>.zip` files
pub struct LocalArchives {
    dir: PathBuf,
}

impl LocalArchives {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The highest `<name>-<version>.zip` in the directory
    async fn newest_versioned(&self, package: &str) -> std::io::Result<Option<PathBuf>> {
        let prefix = format!("{}-", package);
        let mut best: Option<(Vec<u64>, PathBuf)> = None;

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(version) = file_name
                .to_str()
                .and_then(|n| n.strip_prefix(&prefix))
                .and_then(|n| n.strip_suffix(ARCHIVE_SUFFIX))
            else {
                continue;
            };
            let Some(key) = version_key(version) else {
                continue;
            };
            if best.as_ref().map_or(true, |(current, _)| key > *current) {
                best = Some((key, entry.path()));
            }
        }

        Ok(best.map(|(_, path)| path))
    }
}

/// `1.10.2` -> `[1, 10, 2]`; anything non-numeric is not a version
fn version_key(version: &str) -> Option<Vec<u64>> {
    version.split('.').map(|part| part.parse().ok()).collect()
}

#[async_trait(?Send)]
impl ArchiveFetcher for LocalArchives {
    async fn fetch(&self, package: &str) -> Result<PathBuf, ResolveError> {
        check_name(package)?;

        let exact = self.dir.join(format!("{}{}", package, ARCHIVE_SUFFIX));
        if tokio::fs::metadata(&exact).await.is_ok_and(|m| m.is_file()) {
            return Ok(exact);
        }

        let not_found = |reason: String| ResolveError::Fetch {
            package: package.to_string(),
            reason,
        };
        match self.newest_versioned(package).await {
            Ok(Some(path)) => Ok(path),
            Ok(None) => Err(not_found(format!("no archive in {}", self.dir.display()))),
            Err(e) => Err(not_found(format!("{}: {}", self.dir.display(), e))),
        }
    }
}

/* ===================== Package Index ===================== */

/// Downloads `<base_url>/<name>.zip` into a cache directory
pub struct IndexFetcher {
    base_url: String,
    cache_dir: PathBuf,
    client: reqwest::Client,
}

impl IndexFetcher {
    pub fn new(base_url: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache_dir: cache_dir.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url_for(&self, package: &str) -> String {
        format!("{}/{}{}", self.base_url, package, ARCHIVE_SUFFIX)
    }
}

#[async_trait(?Send)]
impl ArchiveFetcher for IndexFetcher {
    async fn fetch(&self, package: &str) -> Result<PathBuf, ResolveError> {
        check_name(package)?;
        let url = self.url_for(package);
        let failed = |reason: String| ResolveError::Fetch {
            package: package.to_string(),
            reason,
        };

        debug!(%url, "downloading archive");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| failed(e.to_string()))?;
        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let target = self.cache_dir.join(format!("{}{}", package, ARCHIVE_SUFFIX));
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|source| ResolveError::WriteFailed {
                path: target.clone(),
                source,
            })?;
        Ok(target)
    }
}

/* ===================== Chain ===================== */

/// Tries each fetcher in order; the first archive found wins
#[derive(Default)]
pub struct FetchChain {
    fetchers: Vec<Box<dyn ArchiveFetcher>>,
}

impl FetchChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, fetcher: impl ArchiveFetcher + 'static) -> Self {
        self.fetchers.push(Box::new(fetcher));
        self
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }
}

#[async_trait(?Send)]
impl ArchiveFetcher for FetchChain {
    async fn fetch(&self, package: &str) -> Result<PathBuf, ResolveError> {
        let mut reasons = Vec::new();
        for fetcher in &self.fetchers {
            match fetcher.fetch(package).await {
                Ok(path) => return Ok(path),
                Err(err) => {
                    debug!(package, error = %err, "fetcher missed");
                    reasons.push(match err {
                        ResolveError::Fetch { reason, .. } => reason,
                        other => other.to_string(),
                    });
                }
            }
        }

        Err(ResolveError::Fetch {
            package: package.to_string(),
            reason: if reasons.is_empty() {
                "no archive sources configured".to_string()
            } else {
                reasons.join("; ")
            },
        })
    }
}
