//! Building package archives from a module directory or file

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::archive::Manifest;
use super::ResolveError;
use crate::modules::SOURCE_SUFFIX;

const PACKAGE_ENTRY: &str = "mod.flow";

/// Write `src` as an installable archive at `out`.
///
/// A directory must hold a `mod.flow` and is packed as `<name>/...`; a single
/// `.flow` file is packed as `<name>.flow`.
pub fn pack_directory(
    src: &Path,
    name: &str,
    version: &str,
    out: &Path,
) -> Result<Manifest, ResolveError> {
    let manifest = Manifest {
        name: name.to_string(),
        version: version.to_string(),
        dist_info: format!("{}-{}.dist-info", name, version),
    };

    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    if src.is_dir() {
        if !src.join(PACKAGE_ENTRY).is_file() {
            return Err(ResolveError::ManifestMalformed(format!(
                "{}: a package directory needs a {}",
                src.display(),
                PACKAGE_ENTRY
            )));
        }
        for entry in WalkDir::new(src).sort_by_file_name() {
            let entry = entry.map_err(|e| ResolveError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(src)
                .map_err(|e| ResolveError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
            let mut archived = name.to_string();
            for component in relative.components() {
                archived.push('/');
                archived.push_str(&component.as_os_str().to_string_lossy());
            }
            files.push((archived, std::fs::read(entry.path())?));
        }
    } else {
        files.push((format!("{}{}", name, SOURCE_SUFFIX), std::fs::read(src)?));
    }
    files.push((
        format!("{}/METADATA", manifest.dist_info),
        manifest.render().into_bytes(),
    ));

    let write_failed = |source: io::Error| ResolveError::WriteFailed {
        path: out.to_path_buf(),
        source,
    };
    let zip_failed = |e: zip::result::ZipError| write_failed(io::Error::new(io::ErrorKind::Other, e));

    let file = File::create(out).map_err(write_failed)?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (path, payload) in &files {
        writer.start_file(path.as_str(), options).map_err(zip_failed)?;
        writer.write_all(payload).map_err(write_failed)?;
    }
    writer.finish().map_err(zip_failed)?;

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::archive::{PackageArchive, PackageSource};
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn test_pack_directory_round_trips_through_archive() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("greet");
        fs::create_dir_all(src.join("util")).unwrap();
        fs::write(src.join("mod.flow"), "let hello = \"hi\"\n").unwrap();
        fs::write(src.join("util").join("more.flow"), "let more = 1\n").unwrap();

        let out = dir.path().join("greet-1.0.zip");
        let manifest = pack_directory(&src, "greet", "1.0", &out).unwrap();
        assert_eq!(manifest.dist_info, "greet-1.0.dist-info");

        let mut archive = PackageArchive::open(&out).unwrap();
        assert_eq!(archive.manifest(), &manifest);

        let paths: Vec<PathBuf> = archive
            .entries()
            .unwrap()
            .into_iter()
            .map(|entry| entry.path)
            .collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("greet/mod.flow"),
                PathBuf::from("greet/util/more.flow"),
                PathBuf::from("greet-1.0.dist-info/METADATA"),
            ]
        );
    }

    #[test]
    fn test_pack_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("tool.flow");
        fs::write(&src, "let t = 1\n").unwrap();

        let out = dir.path().join("tool.zip");
        pack_directory(&src, "tool", "0.1", &out).unwrap();

        let mut archive = PackageArchive::open(&out).unwrap();
        let entries = archive.entries().unwrap();
        assert_eq!(entries[0].path, PathBuf::from("tool.flow"));
        assert_eq!(entries[0].payload, b"let t = 1\n");
    }

    #[test]
    fn test_directory_without_entry_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("other.flow"), "").unwrap();

        let err = pack_directory(dir.path(), "x", "1", &dir.path().join("x.zip")).unwrap_err();
        assert!(matches!(err, ResolveError::ManifestMalformed(_)));
    }
}
