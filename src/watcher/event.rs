use std::path::{Path, PathBuf};

use crate::language::LanguageKind;

/// Classified watch events.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A tracked source file was created or modified.
    Modified(PathBuf),
    /// A tracked source file was deleted.
    Deleted(PathBuf),
    /// A config file changed: the whole graph is rebuilt.
    ConfigChanged,
}

/// Files whose change invalidates resolution for the whole workspace.
const CONFIG_FILES: &[&str] = &["tsconfig.json", "jsconfig.json", "codegraph.toml"];

/// Directory names never watched (mirrors the walker's denylist core).
const SKIP_COMPONENTS: &[&str] = &["node_modules", ".git", ".codegraph", "__pycache__", ".terraform"];

/// Classify a filesystem event path, or `None` when it should be ignored.
pub fn classify_event(path: &Path) -> Option<WatchEvent> {
    if path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| SKIP_COMPONENTS.contains(&s))
            .unwrap_or(false)
    }) {
        return None;
    }

    if let Some(file_name) = path.file_name().and_then(|n| n.to_str())
        && CONFIG_FILES.contains(&file_name)
    {
        return Some(WatchEvent::ConfigChanged);
    }

    LanguageKind::for_path(path)?;

    if path.exists() {
        Some(WatchEvent::Modified(path.to_path_buf()))
    } else {
        Some(WatchEvent::Deleted(path.to_path_buf()))
    }
}
