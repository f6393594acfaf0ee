//! Trap-resolve-resume: installing a missing module and replaying the
//! statement that needed it.
//!
//! The console hands a [`ResolutionRequest`] to [`Resolver::resolve`] when a
//! statement raises `MissingModule`. The resolver fetches an archive for the
//! module, extracts it into the install directory, refreshes the module
//! caches and then resumes the statement. Resolution failures are reported
//! and swallowed: the console always gets back to reading input.

pub mod archive;
pub mod destination;
pub mod fetch;
pub mod pack;


pub use archive::{ArchiveEntry, Manifest, PackageArchive, PackageSource};
pub use destination::{Destination, DirectoryDestination, RecordEntry};
pub use fetch::{ArchiveFetcher, FetchChain, IndexFetcher, LocalArchives};
pub use pack::pack_directory;

use std::path::PathBuf;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::compiler::{BoundUnit, Invocation};
use crate::executor::Failure;
use crate::io::Streams;
use crate::modules::{ModuleCache, SearchPath};
use crate::task::{Resume, Task};

/// Written to `<dist-info>/INSTALLER`
pub const INSTALLER: &str = "rhythm-console";

const STDIN: &str = "<stdin>";
/// Lines of a resume traceback kept in the log
const LOGGED_TRACE_LINES: usize = 3;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("could not fetch '{package}': {reason}")]
    Fetch { package: String, reason: String },

    #[error("unreadable archive {}: {reason}", path.display())]
    ArchiveUnreadable { path: PathBuf, reason: String },

    #[error("malformed package metadata: {0}")]
    ManifestMalformed(String),

    #[error("could not write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Copy every entry of `source` into `destination`, then let the destination
/// record what it wrote. Returns the manifest and the number of files written.
pub fn install(
    source: &mut impl PackageSource,
    destination: &mut impl Destination,
    additional_metadata: &[(&str, &[u8])],
) -> Result<(Manifest, usize), ResolveError> {
    let manifest = source.manifest().clone();
    let mut records = Vec::new();

    for entry in source.entries()? {
        records.push(destination.write_file(&entry.path, &entry.payload)?);
    }
    let files = records.len();

    destination.finalize_installation(&manifest, records, additional_metadata)?;
    Ok((manifest, files))
}

/// What a completed installation left on disk
#[derive(Debug, Clone)]
pub struct InstallReport {
    /// The name the install was requested under
    pub package: String,
    pub manifest: Manifest,
    pub archive: PathBuf,
    pub install_dir: PathBuf,
    /// Package files written, excluding generated metadata
    pub files: usize,
    /// Modules the install directory offers after the install
    pub modules: usize,
}

/// A trapped `MissingModule` and the statement to resume afterwards
pub struct ResolutionRequest {
    pub name: String,
    pub failure: Failure,
    pub continuation: Option<BoundUnit>,
}

impl ResolutionRequest {
    pub fn new(name: impl Into<String>, failure: Failure, continuation: Option<BoundUnit>) -> Self {
        Self {
            name: name.into(),
            failure,
            continuation,
        }
    }
}

pub struct Resolver {
    install_dir: PathBuf,
    search_path: SearchPath,
    fetcher: Box<dyn ArchiveFetcher>,
    cache: Rc<dyn ModuleCache>,
    streams: Streams,
}

impl Resolver {
    pub fn new(
        install_dir: impl Into<PathBuf>,
        search_path: SearchPath,
        fetcher: Box<dyn ArchiveFetcher>,
        cache: Rc<dyn ModuleCache>,
        streams: Streams,
    ) -> Self {
        Self {
            install_dir: install_dir.into(),
            search_path,
            fetcher,
            cache,
            streams,
        }
    }

    pub fn install_dir(&self) -> &std::path::Path {
        &self.install_dir
    }

    /// Fetch, extract and make importable one package, resuming nothing
    pub async fn install(&self, package: &str) -> Result<InstallReport, ResolveError> {
        tokio::fs::create_dir_all(&self.install_dir).await?;
        if self.search_path.register(&self.install_dir) {
            debug!(dir = %self.install_dir.display(), "registered install directory");
        }

        let archive = self.fetcher.fetch(package).await?;
        debug!(package, archive = %archive.display(), "fetched archive");

        let archive_path = archive.clone();
        let install_dir = self.install_dir.clone();
        let (manifest, files) = tokio::task::spawn_blocking(move || {
            let mut source = PackageArchive::open(&archive_path)?;
            let mut destination = DirectoryDestination::new(install_dir);
            install(
                &mut source,
                &mut destination,
                &[("INSTALLER", INSTALLER.as_bytes())],
            )
        })
        .await
        .map_err(|e| ResolveError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
        tokio::task::yield_now().await;

        self.cache.invalidate_caches();
        let modules = self.cache.explore(&self.install_dir)?;
        tokio::task::yield_now().await;

        info!(
            package,
            name = %manifest.name,
            version = %manifest.version,
            files,
            "installed package"
        );

        Ok(InstallReport {
            package: package.to_string(),
            manifest,
            archive,
            install_dir: self.install_dir.clone(),
            files,
            modules,
        })
    }

    /// Install the missing module, then resume the continuation.
    ///
    /// Awaitable continuations come back unresumed as [`Resume::Awaitable`];
    /// others are replayed here. Nothing raised while resuming escapes.
    pub async fn resolve(&self, request: ResolutionRequest) -> Resume {
        let ResolutionRequest {
            name,
            failure,
            continuation,
        } = request;
        let filename = continuation
            .as_ref()
            .map(|c| c.unit().filename.clone())
            .unwrap_or_else(|| STDIN.to_string());

        if let Err(err) = self.install(&name).await {
            warn!(module = %name, error = %err, "could not resolve missing module");
            self.streams.report(failure.traceback(&filename));
            self.streams
                .err
                .line(format!("Failed to install '{}': {}", name, err));
            return Resume::Noop;
        }

        let Some(continuation) = continuation else {
            return Resume::Noop;
        };

        if continuation.is_awaitable() {
            debug!(module = %name, "returning awaitable continuation");
            return Resume::Awaitable(continuation.into_task());
        }

        debug!(module = %name, "resuming continuation");
        match continuation.invoke_now() {
            Invocation::Complete(Ok(_)) => Resume::Noop,
            Invocation::Complete(Err(failure)) => {
                self.report_resume_failure(&continuation, failure);
                Resume::Noop
            }
            Invocation::Suspended(rest) => Resume::Awaitable(Box::pin(async move {
                rest.await?;
                Ok(Resume::Noop)
            })),
        }
    }

    /// [`Resolver::resolve`] as a pending task for the console
    pub fn resolve_task(self: &Rc<Self>, request: ResolutionRequest) -> Task {
        let resolver = Rc::clone(self);
        Box::pin(async move { Ok(resolver.resolve(request).await) })
    }

    fn report_resume_failure(&self, continuation: &BoundUnit, failure: Failure) {
        if let Failure::Exit(code) = failure {
            debug!(code, "exit requested while resuming");
            continuation.context().session.request_exit();
            return;
        }

        let trace = failure.traceback(&continuation.unit().filename);
        let truncated: Vec<&str> = trace.lines().take(LOGGED_TRACE_LINES).collect();
        warn!(trace = %truncated.join(" | "), "resumed statement failed");
        self.streams.report(trace);
    }
}
