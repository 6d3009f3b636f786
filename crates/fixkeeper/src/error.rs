//! Error types for the fix lifecycle with context and recovery information

use std::error::Error;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by catalog, installer, store and reconciler operations
///
/// A missing release is not represented here: it is a normal outcome
/// (see [`crate::reconciler::InstallOutcome::NothingToInstall`]).
#[derive(Error, Debug)]
pub enum FixError {
    /// Network or parse failure talking to the release catalog
    #[error("Catalog request to '{url}' failed: {reason}")]
    CatalogUnavailable {
        url: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Release exists but carries nothing installable
    #[error("Release '{tag}' of '{project}' has no .zip asset")]
    NoArchiveAsset { project: String, tag: String },

    /// Download or extraction failure; `written` lists files left on disk
    #[error("Installing '{project}' failed: {reason}")]
    InstallFailed {
        project: String,
        reason: String,
        written: Vec<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Target install directory no longer exists
    #[error("Game folder '{path}' does not exist")]
    PathMissing { path: PathBuf },

    /// State file exists but cannot be parsed
    #[error("State file '{path}' is corrupt")]
    StoreCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// State file could not be read, written or locked
    #[error("State file operation failed on '{path}' while {operation}")]
    StoreIo {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },
}

/// Types of file operations for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
    Move,
    Lock,
    CreateDir,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Move => write!(f, "moving"),
            FileOperation::Lock => write!(f, "locking"),
            FileOperation::CreateDir => write!(f, "creating directory"),
        }
    }
}

pub type Result<T> = std::result::Result<T, FixError>;

/// Error severity levels for prioritization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FixError {
    pub(crate) fn catalog<E>(url: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FixError::CatalogUnavailable {
            url: url.into(),
            reason: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn install_failed<E>(project: impl Into<String>, written: Vec<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FixError::InstallFailed {
            project: project.into(),
            reason: source.to_string(),
            written,
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn store_io(path: impl Into<PathBuf>, operation: FileOperation, source: std::io::Error) -> Self {
        FixError::StoreIo { path: path.into(), operation, source }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            FixError::CatalogUnavailable { .. } => "catalog_unavailable",
            FixError::NoArchiveAsset { .. } => "no_archive_asset",
            FixError::InstallFailed { .. } => "install_failed",
            FixError::PathMissing { .. } => "path_missing",
            FixError::StoreCorrupt { .. } => "store_corrupt",
            FixError::StoreIo { .. } => "store_io",
            FixError::Configuration { .. } => "configuration",
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            FixError::CatalogUnavailable { .. } => ErrorSeverity::Medium,
            FixError::NoArchiveAsset { .. } => ErrorSeverity::Low,
            FixError::InstallFailed { .. } => ErrorSeverity::High,
            FixError::PathMissing { .. } => ErrorSeverity::Low,
            FixError::StoreCorrupt { .. } => ErrorSeverity::Critical,
            FixError::StoreIo { .. } => ErrorSeverity::Critical,
            FixError::Configuration { .. } => ErrorSeverity::High,
        }
    }

    /// Whether the operation may succeed if simply retried later
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FixError::CatalogUnavailable { .. } | FixError::InstallFailed { .. }
        )
    }

    /// Get user-friendly suggestion for resolving the error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            FixError::CatalogUnavailable { .. } => {
                Some("Check your internet connection and try again later")
            }
            FixError::NoArchiveAsset { .. } => {
                Some("The author has not published a downloadable archive for this release yet")
            }
            FixError::InstallFailed { written, .. } if !written.is_empty() => {
                Some("Some files were already extracted and are not tracked; reinstall or remove them by hand")
            }
            FixError::PathMissing { .. } => {
                Some("The game was moved or uninstalled; install the fix again with the new location")
            }
            FixError::StoreCorrupt { .. } => {
                Some("Fix or move the state file by hand; it is never overwritten automatically")
            }
            FixError::StoreIo { .. } => Some("Check permissions on the state file directory"),
            _ => None,
        }
    }

    /// Create a detailed error report for debugging
    pub fn detailed_report(&self) -> String {
        let mut report = format!("Error: {}\n", self);
        report.push_str(&format!("Category: {}\n", self.category()));
        report.push_str(&format!("Severity: {:?}\n", self.severity()));
        report.push_str(&format!("Recoverable: {}\n", self.is_recoverable()));

        if let Some(suggestion) = self.suggestion() {
            report.push_str(&format!("Suggestion: {}\n", suggestion));
        }

        if let Some(source) = self.source() {
            report.push_str(&format!("Root cause: {}\n", source));
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity_ordering() {
        assert!(ErrorSeverity::Low < ErrorSeverity::Medium);
        assert!(ErrorSeverity::High < ErrorSeverity::Critical);
    }

    #[test]
    fn test_store_corrupt_is_critical_and_not_recoverable() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = FixError::StoreCorrupt { path: PathBuf::from("state.json"), source };

        assert_eq!(error.category(), "store_corrupt");
        assert_eq!(error.severity(), ErrorSeverity::Critical);
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_install_failed_with_leftovers_suggests_cleanup() {
        let error = FixError::install_failed(
            "GameFix",
            vec!["dinput8.dll".to_string()],
            std::io::Error::other("disk full"),
        );

        assert!(error.to_string().contains("disk full"));
        assert!(error.suggestion().unwrap().contains("not tracked"));
    }

    #[test]
    fn test_detailed_report_includes_root_cause() {
        let error = FixError::store_io(
            "state.json",
            FileOperation::Write,
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let report = error.detailed_report();

        assert!(report.contains("Category: store_io"));
        assert!(report.contains("Severity: Critical"));
        assert!(report.contains("Root cause: denied"));
        assert!(report.contains("while writing"));
    }
}
