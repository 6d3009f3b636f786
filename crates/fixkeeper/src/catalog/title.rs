//! Display titles for fix projects
//!
//! Project descriptions mostly read like "A fix for <Game> that ...", so the
//! game name is recovered by stripping a known lead-in and cutting at the
//! first clause boundary. Projects without such a description fall back to
//! their repository name.

/// Lead-ins stripped from descriptions, first match wins
const DESCRIPTION_PREFIXES: &[&str] = &[
    "Fix for ",
    "A fix for ",
    "Mod for ",
    "An ASI plugin for ",
    "Plugin for ",
];

/// Clause boundaries, applied in this order
const STOP_WORDS: &[&str] = &[" that ", " which ", " adding ", ".", ","];

/// Substrings marking a repository as a fix project (case-sensitive)
pub const PROJECT_MARKERS: &[&str] = &["Fix", "Patch", "Tweak"];

/// Whether a repository name follows the fix/patch/tweak naming convention
pub fn is_fix_project(name: &str) -> bool {
    PROJECT_MARKERS.iter().any(|marker| name.contains(marker))
}

/// Derive the human title for a project from its description and name
pub fn derive_display_title(project_name: &str, description: &str) -> String {
    let description = description.trim();

    let Some(mut title) = strip_known_prefix(description) else {
        return project_name.replace("Fix", "").replace("Tweak", "").trim().to_string();
    };

    for stop in STOP_WORDS {
        if let Some(index) = title.find(stop) {
            title = &title[..index];
        }
    }

    title.trim().to_string()
}

fn strip_known_prefix(description: &str) -> Option<&str> {
    DESCRIPTION_PREFIXES.iter().find_map(|prefix| {
        let head = description.get(..prefix.len())?;
        head.eq_ignore_ascii_case(prefix).then(|| &description[prefix.len()..])
    })
}
