//! Archive installer
//!
//! Downloads the archive asset of a release, extracts it into a game folder
//! and reports exactly which files it wrote. Fetching and extracting are
//! separate steps so a caller can confirm the download before touching the
//! game folder.

pub mod extract;
pub mod overrides;
pub mod removal;

pub use extract::{is_junk_entry, ExtractFailure, PartialExtraction};
pub use overrides::LoaderOverride;
pub use removal::{RemovalOutcome, RemovalReport};

use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{info, info_span, Instrument};

use crate::catalog::Release;
use crate::config::FixKeeperConfig;
use crate::error::{FixError, Result};
use crate::http::HttpClient;
use crate::progress::ProgressCallback;

/// Result of applying a release to a game folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Entry names written, relative to the destination
    pub written_files: Vec<String>,
    /// Launch option needed for a bundled loader to take effect
    pub override_hint: Option<LoaderOverride>,
}

/// A release archive downloaded to a temporary file
///
/// The file is deleted when this value is dropped.
#[derive(Debug)]
pub struct DownloadedArchive {
    pub tag: String,
    pub asset_name: String,
    pub size: u64,
    file: NamedTempFile,
}

impl DownloadedArchive {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Downloads and applies fix archives
#[derive(Clone)]
pub struct ArchiveInstaller {
    http: HttpClient,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for ArchiveInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveInstaller")
            .field("http", &self.http)
            .field("has_progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl ArchiveInstaller {
    pub fn new(config: &FixKeeperConfig) -> Result<Self> {
        Ok(Self::with_client(HttpClient::from_config(config)?))
    }

    pub fn with_client(http: HttpClient) -> Self {
        Self { http, progress_callback: None }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Download the first `.zip` asset of `release` to a temporary file
    pub async fn fetch(&self, project_id: &str, release: &Release) -> Result<DownloadedArchive> {
        let asset = release.archive_asset().ok_or_else(|| FixError::NoArchiveAsset {
            project: project_id.to_string(),
            tag: release.tag.clone(),
        })?;

        let file = tempfile::Builder::new()
            .prefix("fixkeeper-")
            .suffix(".zip")
            .tempfile()
            .map_err(|e| FixError::install_failed(project_id, Vec::new(), e))?;

        let size = self
            .http
            .download_to(&asset.download_url, &file, self.progress_callback.clone())
            .instrument(info_span!("fetch_archive", project = %project_id, asset = %asset.name))
            .await
            .map_err(|e| FixError::install_failed(project_id, Vec::new(), e))?;

        info!("Downloaded {} ({} bytes) for {}", asset.name, size, project_id);
        Ok(DownloadedArchive {
            tag: release.tag.clone(),
            asset_name: asset.name.clone(),
            size,
            file,
        })
    }

    /// Extract a downloaded archive into `destination`
    pub async fn extract(
        &self,
        project_id: &str,
        archive: DownloadedArchive,
        destination: &Path,
    ) -> Result<ApplyOutcome> {
        let destination_owned = destination.to_path_buf();
        let callback = self.progress_callback.clone();

        let extracted = tokio::task::spawn_blocking(move || {
            let result = extract::extract_archive(archive.path(), &destination_owned, callback);
            drop(archive);
            result
        })
        .await
        .map_err(|e| FixError::install_failed(project_id, Vec::new(), e))?;

        let written_files = extracted.map_err(|partial| {
            let PartialExtraction { written, cause } = partial;
            FixError::install_failed(project_id, written, cause)
        })?;

        let override_hint = LoaderOverride::detect(&written_files);
        info!(
            "Extracted {} files into {}",
            written_files.len(),
            destination.display()
        );
        Ok(ApplyOutcome { written_files, override_hint })
    }

    /// Download and extract in one step
    pub async fn apply(&self, project_id: &str, release: &Release, destination: &Path) -> Result<ApplyOutcome> {
        let archive = self.fetch(project_id, release).await?;
        self.extract(project_id, archive, destination).await
    }

    /// Delete previously installed files, best effort
    pub async fn remove_owned<S: AsRef<str>>(&self, install_path: &Path, owned_files: &[S]) -> RemovalReport {
        removal::remove_owned(install_path, owned_files).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ReleaseAsset;
    use std::io::{Cursor, Write};
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zip::write::SimpleFileOptions;

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn release_with(assets: Vec<(&str, String)>) -> Release {
        Release {
            tag: "v1.0".to_string(),
            assets: assets
                .into_iter()
                .map(|(name, download_url)| ReleaseAsset { name: name.to_string(), download_url })
                .collect(),
        }
    }

    fn installer() -> ArchiveInstaller {
        let config = FixKeeperConfig::builder().max_retries(0).build();
        ArchiveInstaller::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_apply_extracts_and_detects_override() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/GameFix.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes(&[
                ("EXTRACT_TO_GAME_FOLDER", b""),
                ("dinput8.dll", b"loader"),
                ("GameFix.asi", b"plugin"),
            ])))
            .mount(&server)
            .await;

        let release = release_with(vec![
            ("notes.txt", format!("{}/notes.txt", server.uri())),
            ("GameFix.zip", format!("{}/GameFix.zip", server.uri())),
        ]);
        let game_dir = tempdir().unwrap();

        let outcome = installer().apply("GameFix", &release, game_dir.path()).await.unwrap();

        assert_eq!(outcome.written_files, vec!["dinput8.dll", "GameFix.asi"]);
        assert_eq!(outcome.override_hint, Some(LoaderOverride::Dinput8));
        assert!(game_dir.path().join("GameFix.asi").exists());
    }

    #[tokio::test]
    async fn test_fetch_without_zip_asset() {
        let release = release_with(vec![("GameFix.7z", "http://127.0.0.1:9/GameFix.7z".to_string())]);

        match installer().fetch("GameFix", &release).await {
            Err(FixError::NoArchiveAsset { project, tag }) => {
                assert_eq!(project, "GameFix");
                assert_eq!(tag, "v1.0");
            }
            other => panic!("Expected NoArchiveAsset, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_describes_downloaded_archive() {
        let server = MockServer::start().await;
        let body = zip_bytes(&[("GameFix.asi", b"plugin")]);
        let expected_size = body.len() as u64;
        Mock::given(method("GET"))
            .and(path("/GameFix_v1.0.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let release = release_with(vec![("GameFix_v1.0.zip", format!("{}/GameFix_v1.0.zip", server.uri()))]);
        let archive = installer().fetch("GameFix", &release).await.unwrap();

        assert_eq!(archive.tag, "v1.0");
        assert_eq!(archive.asset_name, "GameFix_v1.0.zip");
        assert_eq!(archive.size, expected_size);
        assert_eq!(std::fs::metadata(archive.path()).unwrap().len(), expected_size);
    }

    #[tokio::test]
    async fn test_download_failure_is_install_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let release = release_with(vec![("GameFix.zip", format!("{}/GameFix.zip", server.uri()))]);
        let game_dir = tempdir().unwrap();

        let error = installer().apply("GameFix", &release, game_dir.path()).await.unwrap_err();

        assert_eq!(error.category(), "install_failed");
        assert_eq!(std::fs::read_dir(game_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_install_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK but not really".to_vec()))
            .mount(&server)
            .await;

        let release = release_with(vec![("GameFix.zip", format!("{}/GameFix.zip", server.uri()))]);
        let game_dir = tempdir().unwrap();

        match installer().apply("GameFix", &release, game_dir.path()).await {
            Err(FixError::InstallFailed { written, .. }) => assert!(written.is_empty()),
            other => panic!("Expected InstallFailed, got {other:?}"),
        }
    }
}
