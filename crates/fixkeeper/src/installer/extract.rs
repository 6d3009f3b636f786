//! Zip extraction into a game folder

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::progress::{ProgressCallback, ProgressEvent};

/// Path fragments that mark an entry as packaging noise
pub const JUNK_MARKERS: &[&str] = &["__MACOSX", "EXTRACT_TO_GAME_FOLDER"];

/// Whether an archive entry must never reach the game folder
pub fn is_junk_entry(name: &str) -> bool {
    JUNK_MARKERS.iter().any(|marker| name.contains(marker))
}

#[derive(Error, Debug)]
pub enum ExtractFailure {
    #[error("archive is unreadable: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("opening downloaded archive '{path}' failed: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("entry '{0}' would be written outside the game folder")]
    UnsafeEntry(String),

    #[error("writing '{path}' failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Extraction that stopped part way; `written` files are still on disk
#[derive(Error, Debug)]
#[error("{cause}")]
pub struct PartialExtraction {
    pub written: Vec<String>,
    #[source]
    pub cause: ExtractFailure,
}

/// Extract every non-junk entry of `archive_path` into `destination`
///
/// Returns the entry names of the files written, in archive order. Directory
/// entries are created but not returned since they are not owned.
pub fn extract_archive(
    archive_path: &Path,
    destination: &Path,
    progress_callback: Option<ProgressCallback>,
) -> Result<Vec<String>, PartialExtraction> {
    let mut written = Vec::new();
    match extract_into(archive_path, destination, progress_callback, &mut written) {
        Ok(()) => Ok(written),
        Err(cause) => Err(PartialExtraction { written, cause }),
    }
}

fn extract_into(
    archive_path: &Path,
    destination: &Path,
    progress_callback: Option<ProgressCallback>,
    written: &mut Vec<String>,
) -> Result<(), ExtractFailure> {
    let file = File::open(archive_path).map_err(|source| ExtractFailure::Open {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;
    debug!("Extracting {} entries into {}", archive.len(), destination.display());

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        if is_junk_entry(&name) {
            debug!("Skipping packaging entry {}", name);
            if let Some(ref callback) = progress_callback {
                callback(ProgressEvent::EntrySkipped { path: name });
            }
            continue;
        }

        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ExtractFailure::UnsafeEntry(name.clone()))?;
        let output_path = destination.join(relative);
        let write_error = |source| ExtractFailure::Write {
            path: output_path.clone(),
            source,
        };

        if entry.is_dir() {
            fs::create_dir_all(&output_path).map_err(write_error)?;
            continue;
        }

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let mut outfile = File::create(&output_path).map_err(write_error)?;
        // Recorded once the file exists so a failed copy is still reported
        written.push(name.clone());
        std::io::copy(&mut entry, &mut outfile).map_err(write_error)?;

        debug!("Extracted {}", name);
        if let Some(ref callback) = progress_callback {
            callback(ProgressEvent::EntryExtracted { path: name });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::{tempdir, NamedTempFile};
    use zip::write::SimpleFileOptions;

    fn write_zip(entries: &[(&str, Option<&[u8]>)]) -> NamedTempFile {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            match content {
                Some(bytes) => {
                    writer.start_file(*name, options).unwrap();
                    writer.write_all(bytes).unwrap();
                }
                None => writer.add_directory(*name, options).unwrap(),
            }
        }
        let bytes = writer.finish().unwrap().into_inner();

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file
    }

    #[test]
    fn test_is_junk_entry() {
        assert!(is_junk_entry("__MACOSX/._dinput8.dll"));
        assert!(is_junk_entry("EXTRACT_TO_GAME_FOLDER"));
        assert!(is_junk_entry("bin/EXTRACT_TO_GAME_FOLDER.txt"));
        assert!(!is_junk_entry("dinput8.dll"));
    }

    #[test]
    fn test_extract_skips_junk_and_records_files_only() {
        let archive = write_zip(&[
            ("EXTRACT_TO_GAME_FOLDER", Some(b"")),
            ("__MACOSX/", None),
            ("__MACOSX/._dinput8.dll", Some(b"resource fork")),
            ("scripts/", None),
            ("dinput8.dll", Some(b"loader")),
            ("scripts/GameFix.asi", Some(b"plugin")),
            ("scripts/GameFix.ini", Some(b"[Settings]")),
        ]);
        let game_dir = tempdir().unwrap();

        let written = extract_archive(archive.path(), game_dir.path(), None).unwrap();

        assert_eq!(written, vec!["dinput8.dll", "scripts/GameFix.asi", "scripts/GameFix.ini"]);
        assert_eq!(std::fs::read(game_dir.path().join("scripts/GameFix.ini")).unwrap(), b"[Settings]");
        assert!(!game_dir.path().join("__MACOSX").exists());
        assert!(!game_dir.path().join("EXTRACT_TO_GAME_FOLDER").exists());
    }

    #[test]
    fn test_extract_overwrites_existing_files() {
        let archive = write_zip(&[("GameFix.ini", Some(b"new"))]);
        let game_dir = tempdir().unwrap();
        std::fs::write(game_dir.path().join("GameFix.ini"), b"old contents").unwrap();

        extract_archive(archive.path(), game_dir.path(), None).unwrap();

        assert_eq!(std::fs::read(game_dir.path().join("GameFix.ini")).unwrap(), b"new");
    }

    #[test]
    fn test_extract_rejects_escaping_entries() {
        let archive = write_zip(&[("ok.dll", Some(b"x")), ("../evil.dll", Some(b"x"))]);
        let root = tempdir().unwrap();
        let game_dir = root.path().join("game");
        std::fs::create_dir(&game_dir).unwrap();

        let error = extract_archive(archive.path(), &game_dir, None).unwrap_err();

        assert!(matches!(error.cause, ExtractFailure::UnsafeEntry(ref name) if name == "../evil.dll"));
        assert_eq!(error.written, vec!["ok.dll"]);
        assert!(!root.path().join("evil.dll").exists());
    }

    #[test]
    fn test_extract_corrupt_archive() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"this is not a zip file").unwrap();
        let game_dir = tempdir().unwrap();

        let error = extract_archive(file.path(), game_dir.path(), None).unwrap_err();

        assert!(matches!(error.cause, ExtractFailure::Archive(_)));
        assert!(error.written.is_empty());
    }
}
