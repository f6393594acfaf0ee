//! Writing installed files and installation metadata

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use super::archive::Manifest;
use super::ResolveError;

/// One line of the RECORD file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    /// Path relative to the install directory, `/`-separated
    pub path: String,
    /// `sha256=<urlsafe base64>`, empty for RECORD itself
    pub hash: String,
    pub size: Option<usize>,
}

impl RecordEntry {
    fn for_payload(path: &Path, payload: &[u8]) -> Self {
        let digest = Sha256::digest(payload);
        Self {
            path: record_path(path),
            hash: format!("sha256={}", URL_SAFE_NO_PAD.encode(digest)),
            size: Some(payload.len()),
        }
    }

    fn render(&self) -> String {
        match self.size {
            Some(size) => format!("{},{},{}", self.path, self.hash, size),
            None => format!("{},{},", self.path, self.hash),
        }
    }
}

/// Destination side of an installation
pub trait Destination {
    /// Write one entry at its installable path
    fn write_file(&mut self, path: &Path, payload: &[u8]) -> Result<RecordEntry, ResolveError>;

    /// Write the extra metadata files and the RECORD listing everything
    fn finalize_installation(
        &mut self,
        manifest: &Manifest,
        records: Vec<RecordEntry>,
        additional_metadata: &[(&str, &[u8])],
    ) -> Result<(), ResolveError>;
}

/// Installs into a directory tree on disk
pub struct DirectoryDestination {
    root: PathBuf,
}

impl DirectoryDestination {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write(&self, relative: &Path, payload: &[u8]) -> Result<(), ResolveError> {
        let target = self.root.join(relative);
        let write_failed = |source| ResolveError::WriteFailed {
            path: target.clone(),
            source,
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }
        fs::write(&target, payload).map_err(write_failed)
    }
}

impl Destination for DirectoryDestination {
    fn write_file(&mut self, path: &Path, payload: &[u8]) -> Result<RecordEntry, ResolveError> {
        self.write(path, payload)?;
        Ok(RecordEntry::for_payload(path, payload))
    }

    fn finalize_installation(
        &mut self,
        manifest: &Manifest,
        mut records: Vec<RecordEntry>,
        additional_metadata: &[(&str, &[u8])],
    ) -> Result<(), ResolveError> {
        let dist_info = Path::new(&manifest.dist_info);

        for (name, payload) in additional_metadata {
            let path = dist_info.join(name);
            records.push(self.write_file(&path, payload)?);
        }

        let record_path = dist_info.join("RECORD");
        records.push(RecordEntry {
            path: self::record_path(&record_path),
            hash: String::new(),
            size: None,
        });

        let mut record = String::new();
        for entry in &records {
            record.push_str(&entry.render());
            record.push('\n');
        }
        self.write(&record_path, record.as_bytes())
    }
}

fn record_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
