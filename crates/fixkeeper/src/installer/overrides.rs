//! Loader-override detection
//!
//! ASI loaders ship as a DLL named after a system library the game already
//! imports. Under Wine/Proton the built-in copy wins unless the user sets a
//! DLL override, so installs report the launch option they need.

use std::fmt;
use std::path::Path;

/// System libraries used as loader proxies, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderOverride {
    Winmm,
    Dinput8,
    Dsound,
    Version,
}

impl LoaderOverride {
    pub const PRIORITY: [LoaderOverride; 4] = [
        LoaderOverride::Winmm,
        LoaderOverride::Dinput8,
        LoaderOverride::Dsound,
        LoaderOverride::Version,
    ];

    /// Library name without extension, as used in `WINEDLLOVERRIDES`
    pub fn library(&self) -> &'static str {
        match self {
            LoaderOverride::Winmm => "winmm",
            LoaderOverride::Dinput8 => "dinput8",
            LoaderOverride::Dsound => "dsound",
            LoaderOverride::Version => "version",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.dll", self.library())
    }

    /// Launch option enabling the native library with built-in fallback
    pub fn launch_option(&self) -> String {
        format!("WINEDLLOVERRIDES=\"{}=n,b\" %command%", self.library())
    }

    fn matches(&self, relative_path: &str) -> bool {
        Path::new(relative_path)
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.eq_ignore_ascii_case(&self.file_name()))
    }

    /// First override, in priority order, present among `written_files`
    pub fn detect<S: AsRef<str>>(written_files: &[S]) -> Option<LoaderOverride> {
        Self::PRIORITY
            .into_iter()
            .find(|candidate| written_files.iter().any(|f| candidate.matches(f.as_ref())))
    }
}

impl fmt::Display for LoaderOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.launch_option())
    }
}
