//! Durable record of installed fixes
//!
//! The store is a single JSON object keyed by project id. Writers always load
//! the full mapping, mutate it in memory and save it back; saves go through a
//! temporary file in the same directory that is renamed over the target.
//!
//! ```json
//! {
//!   "GameFix": {
//!     "game_name": "Some Game",
//!     "path": "/home/me/.local/share/Steam/steamapps/common/Some Game",
//!     "tag": "v1.2",
//!     "files": ["dinput8.dll", "GameFix.ini"]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use fs4::fs_std::FileExt;

use crate::error::{FileOperation, FixError, Result};

/// All installed fixes keyed by project id
pub type Manifest = BTreeMap<String, InstalledFix>;

/// One installed fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledFix {
    /// Filled from the map key on load; the key is the only persisted copy
    #[serde(skip)]
    pub project_id: String,
    #[serde(rename = "game_name", alias = "display_name")]
    pub display_name: String,
    #[serde(rename = "path", alias = "install_path")]
    pub install_path: PathBuf,
    #[serde(rename = "tag", alias = "installed_tag")]
    pub installed_tag: String,
    /// Paths relative to `install_path`, in extraction order
    #[serde(rename = "files", alias = "owned_files", default)]
    pub owned_files: Vec<String>,
    /// Fields written by other tools or newer versions, kept verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl InstalledFix {
    pub fn new<S, P>(project_id: S, display_name: S, install_path: P, installed_tag: S, owned_files: Vec<String>) -> Self
    where
        S: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            project_id: project_id.into(),
            display_name: display_name.into(),
            install_path: install_path.into(),
            installed_tag: installed_tag.into(),
            owned_files,
            extra: serde_json::Map::new(),
        }
    }

    /// True when this entry already reflects `tag` applied at `path`
    pub fn is_current(&self, tag: &str, path: &Path) -> bool {
        self.installed_tag == tag && self.install_path == path
    }
}

/// File-backed manifest store
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

/// Exclusive lock over the store, released on drop
#[derive(Debug)]
pub struct StoreLock {
    _file: File,
}

impl ManifestStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "manifest".into());
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Take an exclusive lock for a load → mutate → save cycle
    ///
    /// The lock is advisory and process-wide: acquiring it twice from the
    /// same process without dropping the first guard blocks.
    pub fn lock(&self) -> Result<StoreLock> {
        let lock_path = self.lock_path();
        let dir = self.parent_dir();
        std::fs::create_dir_all(&dir).map_err(|e| FixError::store_io(&dir, FileOperation::CreateDir, e))?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| FixError::store_io(&lock_path, FileOperation::Lock, e))?;
        FileExt::lock_exclusive(&file).map_err(|e| FixError::store_io(&lock_path, FileOperation::Lock, e))?;

        debug!("Locked manifest store {}", self.path.display());
        Ok(StoreLock { _file: file })
    }

    /// Load the manifest; a missing file is an empty manifest
    pub fn load(&self) -> Result<Manifest> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting empty", self.path.display());
                return Ok(Manifest::new());
            }
            Err(e) => return Err(FixError::store_io(&self.path, FileOperation::Read, e)),
        };

        let mut manifest: Manifest = serde_json::from_slice(&bytes).map_err(|source| FixError::StoreCorrupt {
            path: self.path.clone(),
            source,
        })?;
        for (project_id, entry) in manifest.iter_mut() {
            entry.project_id = project_id.clone();
        }

        debug!("Loaded {} installed fixes from {}", manifest.len(), self.path.display());
        Ok(manifest)
    }

    /// Persist the full manifest through a temp file and rename
    pub fn save(&self, manifest: &Manifest) -> Result<()> {
        let dir = self.parent_dir();
        std::fs::create_dir_all(&dir).map_err(|e| FixError::store_io(&dir, FileOperation::CreateDir, e))?;

        let encoded = serde_json::to_vec_pretty(manifest).map_err(|e| {
            FixError::store_io(&self.path, FileOperation::Write, std::io::Error::other(e))
        })?;

        let mut temp = tempfile::Builder::new()
            .prefix(".fixkeeper-state")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| FixError::store_io(&dir, FileOperation::Write, e))?;
        temp.write_all(&encoded)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| FixError::store_io(temp.path(), FileOperation::Write, e))?;
        temp.persist(&self.path)
            .map_err(|e| FixError::store_io(&self.path, FileOperation::Move, e.error))?;

        debug!("Saved {} installed fixes to {}", manifest.len(), self.path.display());
        Ok(())
    }
}
