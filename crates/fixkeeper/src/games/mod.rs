//! Installed game discovery
//!
//! Produces the `game name -> install directory` table offered when a fix is
//! installed for the first time. Only Steam libraries are scanned: every
//! configured root plus the extra libraries listed in its
//! `steamapps/libraryfolders.vdf`, then every `appmanifest_*.acf` in each.

pub mod vdf;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::FixKeeperConfig;
use vdf::VdfValue;

/// Game display name to absolute install directory
pub type GameTable = BTreeMap<String, PathBuf>;

/// Source of installed games
pub trait GameLibrary {
    fn discover(&self) -> GameTable;
}

/// Scanner over Steam library folders
#[derive(Debug, Clone)]
pub struct SteamLibrary {
    roots: Vec<PathBuf>,
}

impl SteamLibrary {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn from_config(config: &FixKeeperConfig) -> Self {
        Self::new(config.steam_roots.clone())
    }

    /// Existing roots plus every library they reference
    pub fn library_folders(&self) -> BTreeSet<PathBuf> {
        let mut folders = BTreeSet::new();

        for root in self.roots.iter().filter(|r| r.is_dir()) {
            folders.insert(root.clone());

            let vdf_path = root.join("steamapps").join("libraryfolders.vdf");
            match read_vdf(&vdf_path) {
                Some(doc) => folders.extend(library_paths(&doc)),
                None => debug!("No readable library list at {}", vdf_path.display()),
            }
        }

        folders
    }

    fn scan_library(library: &Path, games: &mut GameTable) {
        let apps_path = library.join("steamapps");
        let Ok(entries) = std::fs::read_dir(&apps_path) else {
            debug!("Skipping library without steamapps: {}", library.display());
            return;
        };

        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if !(file_name.starts_with("appmanifest_") && file_name.ends_with(".acf")) {
                continue;
            }

            let Some(doc) = read_vdf(&entry.path()) else {
                continue;
            };
            let Some(app) = doc.get("AppState") else {
                continue;
            };
            let name = app.get("name").and_then(VdfValue::as_str);
            let install_dir = app.get("installdir").and_then(VdfValue::as_str);

            if let (Some(name), Some(install_dir)) = (name, install_dir) {
                let full_path = apps_path.join("common").join(install_dir);
                if full_path.is_dir() {
                    games.insert(name.to_string(), full_path);
                } else {
                    debug!("{} is registered but {} is missing", name, full_path.display());
                }
            }
        }
    }
}

impl GameLibrary for SteamLibrary {
    fn discover(&self) -> GameTable {
        let mut games = GameTable::new();
        for library in self.library_folders() {
            Self::scan_library(&library, &mut games);
        }

        info!("Discovered {} installed games", games.len());
        games
    }
}

fn read_vdf(path: &Path) -> Option<VdfValue> {
    let text = std::fs::read_to_string(path).ok()?;
    match vdf::parse(&text) {
        Ok(doc) => Some(doc),
        Err(e) => {
            debug!("Ignoring unparseable {}: {}", path.display(), e);
            None
        }
    }
}

/// Library paths from both the current (`"0" { "path" ... }`) and the
/// legacy (`"1" "path"`) layouts of libraryfolders.vdf
fn library_paths(doc: &VdfValue) -> Vec<PathBuf> {
    let Some(folders) = doc.get("libraryfolders") else {
        return Vec::new();
    };

    folders
        .entries()
        .iter()
        .filter_map(|(key, value)| match value {
            VdfValue::Block(_) => value.get("path").and_then(VdfValue::as_str),
            VdfValue::Str(path) if key.chars().all(|c| c.is_ascii_digit()) => Some(path.as_str()),
            VdfValue::Str(_) => None,
        })
        .map(PathBuf::from)
        .collect()
}
