//! Best-effort removal of owned files

use std::path::{Component, Path};
use tokio::fs;
use tracing::{debug, warn};

/// Outcome of removing one owned file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    Removed,
    /// Already gone, or a directory (never removed)
    Skipped,
    Failed(String),
}

/// Per-file outcomes of an uninstall
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub entries: Vec<(String, RemovalOutcome)>,
}

impl RemovalReport {
    pub fn removed(&self) -> usize {
        self.count(|o| matches!(o, RemovalOutcome::Removed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, RemovalOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RemovalOutcome::Failed(_)))
    }

    /// Files that could not be deleted, with the reason
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(path, outcome)| match outcome {
            RemovalOutcome::Failed(reason) => Some((path.as_str(), reason.as_str())),
            _ => None,
        })
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, predicate: impl Fn(&RemovalOutcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, o)| predicate(o)).count()
    }
}

impl std::fmt::Display for RemovalReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} removed, {} skipped, {} failed",
            self.removed(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Whether `relative` stays inside the folder it is joined onto
///
/// State files written by older tools hold raw archive names, so absolute
/// and `..` entries are possible.
fn is_contained(relative: &str) -> bool {
    Path::new(relative)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Delete every owned file under `install_path`, never stopping early
pub async fn remove_owned<S: AsRef<str>>(install_path: &Path, owned_files: &[S]) -> RemovalReport {
    let mut report = RemovalReport::default();

    for relative in owned_files {
        let relative = relative.as_ref();
        let full_path = install_path.join(relative);

        let outcome = if !is_contained(relative) {
            RemovalOutcome::Failed("outside install path".to_string())
        } else {
            remove_one(&full_path).await
        };

        match &outcome {
            RemovalOutcome::Removed => debug!("Removed {}", full_path.display()),
            RemovalOutcome::Skipped => debug!("Nothing to remove at {}", full_path.display()),
            RemovalOutcome::Failed(reason) => warn!("Could not remove {}: {}", relative, reason),
        }
        report.entries.push((relative.to_string(), outcome));
    }

    report
}

async fn remove_one(full_path: &Path) -> RemovalOutcome {
    match fs::symlink_metadata(full_path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => RemovalOutcome::Skipped,
        Err(e) => RemovalOutcome::Failed(e.to_string()),
        Ok(metadata) if metadata.is_dir() => RemovalOutcome::Skipped,
        Ok(_) => match fs::remove_file(full_path).await {
            Ok(()) => RemovalOutcome::Removed,
            Err(e) => RemovalOutcome::Failed(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_remove_owned_reports_each_file() {
        let game_dir = tempdir().unwrap();
        std::fs::write(game_dir.path().join("dinput8.dll"), b"x").unwrap();
        std::fs::create_dir(game_dir.path().join("scripts")).unwrap();
        std::fs::write(game_dir.path().join("unrelated.txt"), b"keep").unwrap();

        let owned = ["dinput8.dll", "missing.ini", "scripts"];
        let report = remove_owned(game_dir.path(), &owned).await;

        assert_eq!(report.removed(), 1);
        assert_eq!(report.skipped(), 2);
        assert!(report.is_clean());
        assert_eq!(report.to_string(), "1 removed, 2 skipped, 0 failed");
        assert!(!game_dir.path().join("dinput8.dll").exists());
        assert!(game_dir.path().join("scripts").is_dir());
        assert!(game_dir.path().join("unrelated.txt").exists());
    }

    #[tokio::test]
    async fn test_remove_owned_never_leaves_install_path() {
        let root = tempdir().unwrap();
        let game_dir = root.path().join("game");
        std::fs::create_dir(&game_dir).unwrap();
        std::fs::write(game_dir.join("winmm.dll"), b"x").unwrap();
        let sibling = root.path().join("sibling.dll");
        let absolute = root.path().join("absolute.dll");
        std::fs::write(&sibling, b"keep").unwrap();
        std::fs::write(&absolute, b"keep").unwrap();

        let owned = vec![
            "../sibling.dll".to_string(),
            absolute.to_string_lossy().into_owned(),
            "./winmm.dll".to_string(),
        ];
        let report = remove_owned(&game_dir, &owned).await;

        assert_eq!(report.removed(), 1);
        assert_eq!(report.failed(), 2);
        assert!(report.failures().all(|(_, reason)| reason == "outside install path"));
        assert!(sibling.exists());
        assert!(absolute.exists());
        assert!(!game_dir.join("winmm.dll").exists());
    }

    #[tokio::test]
    async fn test_remove_owned_empty_list() {
        let game_dir = tempdir().unwrap();
        let owned: Vec<String> = Vec::new();

        let report = remove_owned(game_dir.path(), &owned).await;

        assert_eq!(report, RemovalReport::default());
    }
}
