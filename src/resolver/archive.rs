//! Reading package archives
//!
//! A package archive is a zip holding the package files plus a
//! `<name>-<version>.dist-info/METADATA` file with `Name:` and `Version:`
//! headers.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use super::ResolveError;

const METADATA: &str = "METADATA";
const DIST_INFO_SUFFIX: &str = ".dist-info";
/// Written fresh by the destination, never copied from the archive
const GENERATED: &[&str] = &["RECORD", "INSTALLER"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    /// Name of the `.dist-info` directory inside the archive
    pub dist_info: String,
}

impl Manifest {
    /// Parse the `Key: value` header block of a METADATA file
    pub fn parse(dist_info: &str, text: &str) -> Result<Self, ResolveError> {
        let mut name = None;
        let mut version = None;

        for line in text.lines() {
            if line.trim().is_empty() {
                break;
            }
            let Some((key, value)) = line.split_once(':') else {
                return Err(ResolveError::ManifestMalformed(format!(
                    "{}: not a header line: {:?}",
                    dist_info, line
                )));
            };
            match key.trim() {
                "Name" => name = Some(value.trim().to_string()),
                "Version" => version = Some(value.trim().to_string()),
                _ => {}
            }
        }

        match (name, version) {
            (Some(name), Some(version)) if !name.is_empty() && !version.is_empty() => Ok(Self {
                name,
                version,
                dist_info: dist_info.to_string(),
            }),
            _ => Err(ResolveError::ManifestMalformed(format!(
                "{}: METADATA needs Name and Version",
                dist_info
            ))),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "Metadata-Version: 2.1\nName: {}\nVersion: {}\n",
            self.name, self.version
        )
    }
}

/// A file to install, relative to the install directory
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    pub payload: Vec<u8>,
}

/// Source side of an installation
pub trait PackageSource {
    fn manifest(&self) -> &Manifest;

    /// Every installable entry with its payload
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>, ResolveError>;
}

pub struct PackageArchive {
    path: PathBuf,
    archive: ZipArchive<File>,
    manifest: Manifest,
}

impl PackageArchive {
    pub fn open(path: &Path) -> Result<Self, ResolveError> {
        let unreadable = |reason: String| ResolveError::ArchiveUnreadable {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| unreadable(e.to_string()))?;
        let mut archive = ZipArchive::new(file).map_err(|e| unreadable(e.to_string()))?;

        let metadata_name = archive
            .file_names()
            .find(|name| is_metadata_file(name))
            .map(str::to_string)
            .ok_or_else(|| {
                ResolveError::ManifestMalformed(format!(
                    "{}: no *{}/{} entry",
                    path.display(),
                    DIST_INFO_SUFFIX,
                    METADATA
                ))
            })?;

        let mut text = String::new();
        archive
            .by_name(&metadata_name)
            .map_err(|e| unreadable(e.to_string()))?
            .read_to_string(&mut text)
            .map_err(|e| ResolveError::ManifestMalformed(format!("{}: {}", metadata_name, e)))?;

        let dist_info = metadata_name
            .split_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or_default();
        let manifest = Manifest::parse(dist_info, &text)?;

        Ok(Self {
            path: path.to_path_buf(),
            archive,
            manifest,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PackageSource for PackageArchive {
    fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn entries(&mut self) -> Result<Vec<ArchiveEntry>, ResolveError> {
        let mut entries = Vec::with_capacity(self.archive.len());

        for index in 0..self.archive.len() {
            let mut file = self
                .archive
                .by_index(index)
                .map_err(|e| ResolveError::ArchiveUnreadable {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })?;
            if file.is_dir() {
                continue;
            }

            let Some(path) = file.enclosed_name().map(Path::to_path_buf) else {
                return Err(ResolveError::ArchiveUnreadable {
                    path: self.path.clone(),
                    reason: format!("entry escapes the install directory: {}", file.name()),
                });
            };
            if is_generated(&path, &self.manifest.dist_info) {
                continue;
            }

            let mut payload = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut payload)
                .map_err(|e| ResolveError::ArchiveUnreadable {
                    path: self.path.clone(),
                    reason: format!("{}: {}", file.name(), e),
                })?;
            entries.push(ArchiveEntry { path, payload });
        }

        Ok(entries)
    }
}

fn is_metadata_file(name: &str) -> bool {
    match name.split_once('/') {
        Some((dir, file)) => dir.ends_with(DIST_INFO_SUFFIX) && file == METADATA,
        None => false,
    }
}

fn is_generated(path: &Path, dist_info: &str) -> bool {
    let mut components = path.components();
    let (Some(dir), Some(file), None) = (components.next(), components.next(), components.next())
    else {
        return false;
    };
    dir.as_os_str() == dist_info
        && GENERATED
            .iter()
            .any(|generated| file.as_os_str() == *generated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_parse() {
        let manifest = Manifest::parse(
            "greet-1.0.dist-info",
            "Metadata-Version: 2.1\nName: greet\nVersion: 1.0\n\nLong description: ignored",
        )
        .unwrap();
        assert_eq!(manifest.name, "greet");
        assert_eq!(manifest.version, "1.0");
        assert_eq!(manifest.dist_info, "greet-1.0.dist-info");
    }

    #[test]
    fn test_manifest_requires_name_and_version() {
        let err = Manifest::parse("x.dist-info", "Name: x\n").unwrap_err();
        assert!(matches!(err, ResolveError::ManifestMalformed(_)));

        let err = Manifest::parse("x.dist-info", "garbage line\n").unwrap_err();
        assert!(matches!(err, ResolveError::ManifestMalformed(_)));
    }

    #[test]
    fn test_metadata_file_detection() {
        assert!(is_metadata_file("greet-1.0.dist-info/METADATA"));
        assert!(!is_metadata_file("greet/METADATA"));
        assert!(!is_metadata_file("a/greet-1.0.dist-info/METADATA"));
    }

    #[test]
    fn test_open_rejects_non_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.zip");
        std::fs::write(&path, b"not a zip").unwrap();

        let Err(err) = PackageArchive::open(&path) else {
            unreachable!("garbage must not open");
        };
        assert!(matches!(err, ResolveError::ArchiveUnreadable { .. }));
    }
}
