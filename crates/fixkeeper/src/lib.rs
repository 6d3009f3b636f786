//! fixkeeper library
//!
//! Package manager for community game fixes published as tagged releases on a
//! Gitea-compatible forge. It lists the available fix projects, installs the
//! latest release archive into a game folder, tracks exactly which files each
//! install wrote, and later updates or removes them without touching anything
//! else in the folder.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use fixkeeper::{FixKeeperConfig, FixManager, InstallOutcome};
//! use std::path::Path;
//!
//! # async fn example() -> fixkeeper::Result<()> {
//! let config = FixKeeperConfig::from_env()?;
//! let manager = FixManager::new(&config)?;
//!
//! let outcome = manager
//!     .install("SuperGameFix", "Super Game", Path::new("/games/Super Game"))
//!     .await?;
//! println!("SuperGameFix: {}", outcome);
//!
//! if let Some(hint) = outcome.override_hint() {
//!     println!("Set the game's launch options to: {}", hint.launch_option());
//! }
//!
//! for report in manager.check_all_installed().await? {
//!     match report.result {
//!         Ok(InstallOutcome::UpToDate { .. }) => {}
//!         Ok(outcome) => println!("{}: {}", report.project_id, outcome),
//!         Err(e) => eprintln!("{}: {}", report.project_id, e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`catalog`]: project listing, title derivation and latest-release lookup
//! - [`installer`]: archive download, extraction, owned-file removal
//! - [`manifest`]: the locked JSON record of installed fixes
//! - [`reconciler`]: install, update, uninstall and check-all
//! - [`games`]: Steam library scanning for install targets

pub mod catalog;
pub mod config;
pub mod error;
pub mod games;
pub mod http;
pub mod installer;
pub mod manifest;
pub mod progress;
pub mod reconciler;

// Re-export commonly used types for convenience
pub use catalog::{FixProject, HttpCatalog, LatestRelease, Release, ReleaseAsset, ReleaseCatalog, SortOrder};
pub use config::{FixKeeperConfig, FixKeeperConfigBuilder};
pub use error::{ErrorSeverity, FileOperation, FixError, Result};
pub use games::{GameLibrary, GameTable, SteamLibrary};
pub use installer::{ApplyOutcome, ArchiveInstaller, LoaderOverride, RemovalOutcome, RemovalReport};
pub use manifest::{InstalledFix, Manifest, ManifestStore};
pub use progress::{
    ConsoleProgressReporter, IntoProgressCallback, NullProgressReporter, ProgressCallback, ProgressEvent,
    ProgressReporter,
};
pub use reconciler::{CheckReport, FixManager, InstallOutcome, UninstallOutcome};
