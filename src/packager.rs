//! Zip packaging of a session's downloads

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::error::{Error, Result};

/// A written archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipInfo {
    /// Archive location
    pub path: PathBuf,
    /// Archive size in bytes
    pub size: u64,
}

/// Zip the contents of `folder` into `output`
///
/// Entry names are relative to `folder` with `/` separators; the folder itself
/// is not an entry. Directories are stored with a trailing `/`, files are deflated.
pub fn zip_folder(output: &Path, folder: &Path) -> Result<ZipInfo> {
    let file = File::create(output)?;
    let mut zip = zip::ZipWriter::new(BufWriter::new(file));

    let dir_options = FileOptions::default().compression_method(CompressionMethod::Stored);
    let file_options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let walker = WalkDir::new(folder).min_depth(1).sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        let relative = entry
            .path()
            .strip_prefix(folder)
            .map_err(|e| Error::Other(format!("entry outside of {}: {e}", folder.display())))?;

        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{name}/"), dir_options)?;
        } else {
            zip.start_file(name, file_options)?;
            let mut source = File::open(entry.path())?;
            std::io::copy(&mut source, &mut zip)?;
        }
    }

    let mut writer = zip.finish()?;
    std::io::Write::flush(&mut writer)?;
    drop(writer);

    let size = std::fs::metadata(output)?.len();
    Ok(ZipInfo {
        path: output.to_path_buf(),
        size,
    })
}

/// [`zip_folder`] on the blocking pool
pub async fn package_folder(output: &Path, folder: &Path) -> Result<ZipInfo> {
    let (output, folder) = (output.to_path_buf(), folder.to_path_buf());
    let zipped = tokio::task::spawn_blocking(move || zip_folder(&output, &folder))
        .await
        .map_err(|e| Error::Other(format!("packaging task failed: {e}")))??;

    info!(path = %zipped.path.display(), size = zipped.size, "Created package");
    Ok(zipped)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_package_folder_layout() {
        let temp_dir = TempDir::new().unwrap();
        let downloads = temp_dir.path().join("downloads");
        std::fs::create_dir_all(downloads.join("config")).unwrap();
        std::fs::write(downloads.join("Vault.jar"), b"PK\x03\x04vault").unwrap();
        std::fs::write(downloads.join("config").join("settings.yml"), b"a: 1").unwrap();

        let output = temp_dir.path().join("pack.zip");
        let zipped = package_folder(&output, &downloads).await.unwrap();

        assert_eq!(zipped.path, output);
        assert_eq!(zipped.size, std::fs::metadata(&output).unwrap().len());

        let mut archive = zip::ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["Vault.jar", "config/", "config/settings.yml"]);

        {
            let dir = archive.by_name("config/").unwrap();
            assert!(dir.is_dir());
            assert_eq!(dir.compression(), CompressionMethod::Stored);
        }

        let mut jar = archive.by_name("Vault.jar").unwrap();
        assert_eq!(jar.compression(), CompressionMethod::Deflated);
        let mut contents = Vec::new();
        jar.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"PK\x03\x04vault");
    }

    #[test]
    fn test_empty_folder_gives_empty_archive() {
        let temp_dir = TempDir::new().unwrap();
        let downloads = temp_dir.path().join("downloads");
        std::fs::create_dir_all(&downloads).unwrap();

        let zipped = zip_folder(&temp_dir.path().join("pack.zip"), &downloads).unwrap();
        assert!(zipped.size > 0);
        let archive = zip::ZipArchive::new(File::open(&zipped.path).unwrap()).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn test_missing_folder_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = zip_folder(
            &temp_dir.path().join("pack.zip"),
            &temp_dir.path().join("missing"),
        );
        assert!(result.is_err());
    }
}
