//! Packaging of a job's working directory into `export.zip`.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::job::ARCHIVE_FILE_NAME;
use super::store::relative_name;

/// Errors raised while building an archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to walk export directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write zip entry: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Compress every regular file under `dir` (except a previous archive) into
/// `{dir}/export.zip`, using paths relative to `dir`.
pub async fn package_directory(dir: &Path) -> Result<PathBuf, ArchiveError> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || write_archive(&dir)).await?
}

fn write_archive(dir: &Path) -> Result<PathBuf, ArchiveError> {
    let archive_path = dir.join(ARCHIVE_FILE_NAME);

    // Collect before creating the archive so it never lists itself.
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        match relative_name(dir, entry.path()) {
            Some(name) if name != ARCHIVE_FILE_NAME => entries.push((name, entry.into_path())),
            _ => {}
        }
    }

    let file = File::create(&archive_path).map_err(|source| ArchiveError::Io {
        action: "create",
        path: archive_path.clone(),
        source,
    })?;
    let mut zip_writer = ZipWriter::new(file);
    let zip_options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, path) in &entries {
        let mut source = File::open(path).map_err(|source| ArchiveError::Io {
            action: "open",
            path: path.clone(),
            source,
        })?;
        zip_writer.start_file(name.as_str(), zip_options)?;
        io::copy(&mut source, &mut zip_writer).map_err(|source| ArchiveError::Io {
            action: "compress",
            path: path.clone(),
            source,
        })?;
    }

    zip_writer.finish()?;

    tracing::debug!(
        archive = %archive_path.display(),
        files = entries.len(),
        "Export archive written"
    );

    Ok(archive_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[tokio::test]
    async fn test_package_directory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("nested")).unwrap();
        std::fs::write(tmp.path().join("genesyscloud.tf.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("nested/terraform.tfstate"), "state").unwrap();

        let path = package_directory(tmp.path()).await.unwrap();
        assert_eq!(path, tmp.path().join(ARCHIVE_FILE_NAME));

        let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["genesyscloud.tf.json", "nested/terraform.tfstate"]);

        let mut content = String::new();
        archive
            .by_name("nested/terraform.tfstate")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "state");
    }

    #[tokio::test]
    async fn test_repackaging_skips_previous_archive() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("provider.tf"), "terraform {}").unwrap();

        package_directory(tmp.path()).await.unwrap();
        let path = package_directory(tmp.path()).await.unwrap();

        let archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_directory_yields_empty_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let path = package_directory(tmp.path()).await.unwrap();
        let archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[tokio::test]
    async fn test_missing_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("gone");
        assert!(package_directory(&missing).await.is_err());
    }
}
