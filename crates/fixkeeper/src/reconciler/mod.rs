//! Lifecycle reconciler
//!
//! Moves each project between `NotInstalled` and `Installed(tag, path)`.
//! Every mutation runs as one critical section under the store lock:
//! load the manifest, talk to the catalog and installer, save the manifest.
//!
//! An update is an uninstall followed by an install. The new archive is
//! downloaded before the old files are removed, so a failed download leaves
//! the previous install untouched. If extraction then fails, the project
//! ends up `NotInstalled` and its entry is dropped from the manifest.

use std::fmt;
use std::path::Path;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::catalog::{sort_projects, FixProject, HttpCatalog, LatestRelease, ReleaseCatalog, SortOrder};
use crate::config::FixKeeperConfig;
use crate::error::{FixError, Result};
use crate::installer::{ApplyOutcome, ArchiveInstaller, LoaderOverride, RemovalReport};
use crate::manifest::{InstalledFix, ManifestStore};
use crate::progress::ProgressCallback;


/// Successful result of [`FixManager::install`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// First install of the project
    Installed { tag: String, applied: ApplyOutcome },
    /// A different tag or location replaced the previous install
    Updated {
        previous_tag: String,
        tag: String,
        applied: ApplyOutcome,
    },
    /// Same tag already installed at the same path; nothing was written
    UpToDate { tag: String },
    /// The project has no published release
    NothingToInstall,
}

impl InstallOutcome {
    pub fn override_hint(&self) -> Option<LoaderOverride> {
        match self {
            InstallOutcome::Installed { applied, .. } | InstallOutcome::Updated { applied, .. } => {
                applied.override_hint
            }
            InstallOutcome::UpToDate { .. } | InstallOutcome::NothingToInstall => None,
        }
    }

    /// Whether files in the game folder changed
    pub fn changed_files(&self) -> bool {
        matches!(self, InstallOutcome::Installed { .. } | InstallOutcome::Updated { .. })
    }
}

impl fmt::Display for InstallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallOutcome::Installed { tag, applied } => {
                write!(f, "installed {} ({} files)", tag, applied.written_files.len())
            }
            InstallOutcome::Updated { previous_tag, tag, applied } => write!(
                f,
                "updated {} -> {} ({} files)",
                previous_tag,
                tag,
                applied.written_files.len()
            ),
            InstallOutcome::UpToDate { tag } => write!(f, "up to date ({})", tag),
            InstallOutcome::NothingToInstall => write!(f, "no release published"),
        }
    }
}

/// Result of [`FixManager::uninstall`]
#[derive(Debug, Clone, PartialEq)]
pub enum UninstallOutcome {
    NotInstalled,
    Removed { entry: InstalledFix, report: RemovalReport },
}

/// Per-project result of [`FixManager::check_all_installed`]
#[derive(Debug)]
pub struct CheckReport {
    pub project_id: String,
    pub display_name: String,
    pub result: Result<InstallOutcome>,
}

/// Extend an install failure with a manifest save that also failed, so the
/// caller knows the state file still names the removed install
fn with_unrecorded_removal(error: FixError, save_error: &FixError) -> FixError {
    match error {
        FixError::InstallFailed {
            project,
            reason,
            written,
            source,
        } => FixError::InstallFailed {
            project,
            reason: format!(
                "{}; the previous install was removed but the state file could not be updated ({})",
                reason, save_error
            ),
            written,
            source,
        },
        other => other,
    }
}

/// Coordinates catalog, installer and manifest store
pub struct FixManager<C: ReleaseCatalog = HttpCatalog> {
    catalog: C,
    installer: ArchiveInstaller,
    store: ManifestStore,
}

impl FixManager<HttpCatalog> {
    /// Production wiring from configuration
    pub fn new(config: &FixKeeperConfig) -> Result<Self> {
        Ok(Self::with_parts(
            HttpCatalog::new(config)?,
            ArchiveInstaller::new(config)?,
            ManifestStore::new(&config.state_file),
        ))
    }
}

impl<C: ReleaseCatalog> FixManager<C> {
    pub fn with_parts(catalog: C, installer: ArchiveInstaller, store: ManifestStore) -> Self {
        Self { catalog, installer, store }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.installer = self.installer.with_progress_callback(callback);
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    /// Bring `project_id` to its latest release at `destination`
    ///
    /// A relative `destination` is resolved against the working directory
    /// before anything is compared or recorded.
    pub async fn install(&self, project_id: &str, display_name: &str, destination: &Path) -> Result<InstallOutcome> {
        let destination = std::path::absolute(destination).map_err(|_| FixError::PathMissing {
            path: destination.to_path_buf(),
        })?;
        if !destination.is_dir() {
            return Err(FixError::PathMissing { path: destination });
        }

        self.install_locked(project_id, display_name, &destination)
            .instrument(info_span!("install", project = %project_id))
            .await
    }

    async fn install_locked(&self, project_id: &str, display_name: &str, destination: &Path) -> Result<InstallOutcome> {
        let _lock = self.store.lock()?;
        let mut manifest = self.store.load()?;

        let release = match self.catalog.latest_release(project_id).await? {
            LatestRelease::Found(release) => release,
            LatestRelease::NotFound => {
                info!("No release published, nothing to install");
                return Ok(InstallOutcome::NothingToInstall);
            }
        };

        if manifest
            .get(project_id)
            .is_some_and(|entry| entry.is_current(&release.tag, destination))
        {
            info!("Already at {}", release.tag);
            return Ok(InstallOutcome::UpToDate { tag: release.tag });
        }

        let archive = self.installer.fetch(project_id, &release).await?;
        debug!("Staged {} of {} ({} bytes)", archive.asset_name, archive.tag, archive.size);

        let previous = manifest.remove(project_id);
        if let Some(previous) = &previous {
            let report = self
                .installer
                .remove_owned(&previous.install_path, &previous.owned_files)
                .await;
            debug!("Removed previous install {}: {}", previous.installed_tag, report);
        }

        let applied = match self.installer.extract(project_id, archive, destination).await {
            Ok(applied) => applied,
            Err(error) => {
                if previous.is_some() {
                    warn!("Previous install was removed and the new one failed; marking as not installed");
                    if let Err(save_error) = self.store.save(&manifest) {
                        warn!("Could not record the removal: {}", save_error);
                        return Err(with_unrecorded_removal(error, &save_error));
                    }
                }
                return Err(error);
            }
        };

        let mut entry = InstalledFix::new(
            project_id,
            display_name,
            destination,
            release.tag.as_str(),
            applied.written_files.clone(),
        );
        if let Some(previous) = &previous {
            entry.extra = previous.extra.clone();
        }
        manifest.insert(project_id.to_string(), entry);
        self.store.save(&manifest)?;

        if let Some(hint) = applied.override_hint {
            info!("Loader needs launch option: {}", hint);
        }

        Ok(match previous {
            Some(previous) => {
                info!("Updated {} -> {}", previous.installed_tag, release.tag);
                InstallOutcome::Updated {
                    previous_tag: previous.installed_tag,
                    tag: release.tag,
                    applied,
                }
            }
            None => {
                info!("Installed {} into {}", release.tag, destination.display());
                InstallOutcome::Installed { tag: release.tag, applied }
            }
        })
    }

    /// Remove every owned file and forget the project
    pub async fn uninstall(&self, project_id: &str) -> Result<UninstallOutcome> {
        let _lock = self.store.lock()?;
        let mut manifest = self.store.load()?;

        let Some(entry) = manifest.remove(project_id) else {
            debug!("{} is not installed", project_id);
            return Ok(UninstallOutcome::NotInstalled);
        };

        let report = self.installer.remove_owned(&entry.install_path, &entry.owned_files).await;
        self.store.save(&manifest)?;

        if report.is_clean() {
            info!("Uninstalled {}: {}", project_id, report);
        } else {
            warn!("Uninstalled {} with leftovers: {}", project_id, report);
        }
        Ok(UninstallOutcome::Removed { entry, report })
    }

    /// Update every installed project whose game folder still exists
    ///
    /// Works from a snapshot of the manifest; each project then goes through
    /// [`Self::install`] on its own so one failure never stops the sweep.
    pub async fn check_all_installed(&self) -> Result<Vec<CheckReport>> {
        let snapshot = {
            let _lock = self.store.lock()?;
            self.store.load()?
        };

        let mut reports = Vec::with_capacity(snapshot.len());
        for (project_id, entry) in snapshot {
            let result = if entry.install_path.is_dir() {
                self.install(&project_id, &entry.display_name, &entry.install_path).await
            } else {
                warn!("Skipping {}: {} no longer exists", project_id, entry.install_path.display());
                Err(FixError::PathMissing {
                    path: entry.install_path.clone(),
                })
            };

            if let Err(e) = &result {
                debug!("Check of {} failed: {}", project_id, e);
            }
            reports.push(CheckReport {
                project_id,
                display_name: entry.display_name,
                result,
            });
        }

        Ok(reports)
    }

    /// Installed fixes ordered by project id
    pub fn list_installed(&self) -> Result<Vec<InstalledFix>> {
        Ok(self.store.load()?.into_values().collect())
    }

    /// Catalog projects in the requested order
    pub async fn list_available(&self, order: SortOrder) -> Result<Vec<FixProject>> {
        let mut projects = self.catalog.list_projects().await?;
        sort_projects(&mut projects, order);
        Ok(projects)
    }

    /// Installed entry for one project, if any
    pub fn installed(&self, project_id: &str) -> Result<Option<InstalledFix>> {
        Ok(self.store.load()?.remove(project_id))
    }
}
