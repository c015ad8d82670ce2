use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::Pattern;
use serde::Deserialize;

use crate::language::TRACKED_EXTENSIONS;

/// Directory names never descended into, regardless of ignore files:
/// vendored dependency caches, build outputs, version-control metadata,
/// virtual environments, and codegraph's own output directory.
const DENYLIST: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    "out",
    "coverage",
    ".git",
    "venv",
    ".venv",
    "__pycache__",
    ".terraform",
    ".codegraph",
];

#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    exclude: Vec<String>,
}

/// Exclusion rules beyond the built-in denylist, read from the `exclude`
/// list of `codegraph.toml` and compiled once per build.
///
/// A bare entry ("generated") excludes any path containing that component,
/// like the denylist does. An entry with glob metacharacters or a separator
/// ("*.min.js", "src/legacy/*") is compiled to a pattern and tested against
/// the workspace-relative path and the file name.
#[derive(Default)]
pub struct ExcludeRules {
    names: HashSet<String>,
    globs: Vec<Pattern>,
}

impl ExcludeRules {
    /// Read rules from `codegraph.toml` under `root`. A missing file yields
    /// the empty rule set; an unreadable or malformed file (or an invalid
    /// pattern in it) is an error, which the caller reports once before
    /// continuing without extra rules.
    pub fn load(root: &Path) -> Result<ExcludeRules> {
        let path = root.join("codegraph.toml");
        if !path.exists() {
            return Ok(ExcludeRules::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let mut rules = ExcludeRules::default();
        for entry in raw.exclude {
            let is_glob = entry
                .chars()
                .any(|c| matches!(c, '*' | '?' | '[' | '/'));
            if is_glob {
                let pattern = Pattern::new(&entry).with_context(|| {
                    format!("invalid exclude pattern {entry:?} in {}", path.display())
                })?;
                rules.globs.push(pattern);
            } else {
                rules.names.insert(entry);
            }
        }
        Ok(rules)
    }

    /// Whether the workspace-relative path `rel` is excluded.
    pub fn is_match(&self, rel: &str) -> bool {
        if !self.names.is_empty() && rel.split('/').any(|part| self.names.contains(part)) {
            return true;
        }
        if self.globs.is_empty() {
            return false;
        }
        let file_name = rel.rsplit('/').next().unwrap_or(rel);
        self.globs
            .iter()
            .any(|g| g.matches(rel) || g.matches(file_name))
    }
}

/// Walk a workspace root and collect tracked source files.
///
/// Respects `.gitignore` rules, skips denylisted and hidden directories, and
/// applies the caller's [`ExcludeRules`]. The result is sorted
/// lexicographically by path so node ids assigned in insertion order are
/// deterministic across builds.
///
/// When `verbose` is true, each discovered file path is printed to stderr.
pub fn walk_workspace(root: &Path, excludes: &ExcludeRules, verbose: bool) -> Vec<PathBuf> {
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(true)
        // Read .gitignore files even outside a git repository, so exclusions
        // work for standalone directories and test fixtures.
        .require_git(false)
        .sort_by_file_path(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            // The root itself is exempt: workspaces may live in hidden
            // directories.
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_str().unwrap_or("");
            let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
            if is_dir && (DENYLIST.contains(&name) || name.starts_with('.')) {
                return false;
            }
            true
        })
        .build();

    let mut files = Vec::new();

    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                eprintln!("warning: {err}");
                continue;
            }
        };

        let path = entry.path();

        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
            continue;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !TRACKED_EXTENSIONS.contains(&ext) {
            continue;
        }

        if excludes.is_match(&relative_key(root, path)) {
            continue;
        }

        if verbose {
            eprintln!("{}", path.display());
        }

        files.push(path.to_path_buf());
    }

    // The sorted walk already yields directory entries in order, but sort the
    // flat list as well: id determinism rides on this, not on walker details.
    files.sort();
    files
}

/// Convert an absolute path under `root` to the workspace-relative string form
/// stored in the graph (`/`-separated on every platform).
pub fn relative_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let s = rel.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn no_excludes() -> ExcludeRules {
        ExcludeRules::default()
    }

    #[test]
    fn test_walk_collects_tracked_extensions_only() {
        let dir = tmp();
        touch(dir.path(), "a.ts");
        touch(dir.path(), "b.py");
        touch(dir.path(), "main.tf");
        touch(dir.path(), "README.md");
        touch(dir.path(), "image.png");

        let files = walk_workspace(dir.path(), &no_excludes(), false);
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["a.ts", "b.py", "main.tf"]);
    }

    #[test]
    fn test_walk_skips_denylisted_directories() {
        let dir = tmp();
        touch(dir.path(), "src/a.ts");
        touch(dir.path(), "node_modules/pkg/index.js");
        touch(dir.path(), "dist/bundle.js");
        touch(dir.path(), "venv/lib/thing.py");
        touch(dir.path(), ".codegraph/stale.ts");

        let files = walk_workspace(dir.path(), &no_excludes(), false);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("src/a.ts"));
    }

    #[test]
    fn test_walk_skips_hidden_directories() {
        let dir = tmp();
        touch(dir.path(), "a.ts");
        touch(dir.path(), ".hidden/b.ts");

        let files = walk_workspace(dir.path(), &no_excludes(), false);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_walk_order_is_lexicographic() {
        let dir = tmp();
        touch(dir.path(), "z.ts");
        touch(dir.path(), "a/inner.ts");
        touch(dir.path(), "m.ts");

        let files = walk_workspace(dir.path(), &no_excludes(), false);
        let keys: Vec<_> = files.iter().map(|p| relative_key(dir.path(), p)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted, "walk order must be stable and lexicographic");
    }

    #[test]
    fn test_exclude_rules_bare_name_matches_component() {
        let dir = tmp();
        touch(dir.path(), "src/a.ts");
        touch(dir.path(), "generated/api.ts");
        fs::write(dir.path().join("codegraph.toml"), "exclude = [\"generated\"]\n").unwrap();

        let rules = ExcludeRules::load(dir.path()).unwrap();
        let files = walk_workspace(dir.path(), &rules, false);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("src/a.ts"));
    }

    #[test]
    fn test_exclude_rules_glob_matches_file_name() {
        let dir = tmp();
        touch(dir.path(), "src/app.ts");
        touch(dir.path(), "src/vendor.min.js");
        fs::write(dir.path().join("codegraph.toml"), "exclude = [\"*.min.js\"]\n").unwrap();

        let rules = ExcludeRules::load(dir.path()).unwrap();
        let files = walk_workspace(dir.path(), &rules, false);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("src/app.ts"));
    }

    #[test]
    fn test_exclude_rules_path_glob() {
        let rules = {
            let dir = tmp();
            fs::write(
                dir.path().join("codegraph.toml"),
                "exclude = [\"src/legacy/*\"]\n",
            )
            .unwrap();
            ExcludeRules::load(dir.path()).unwrap()
        };
        assert!(rules.is_match("src/legacy/old.ts"));
        assert!(!rules.is_match("src/current/new.ts"));
    }

    #[test]
    fn test_exclude_rules_missing_config_is_empty() {
        let dir = tmp();
        let rules = ExcludeRules::load(dir.path()).unwrap();
        assert!(!rules.is_match("src/a.ts"));
    }

    #[test]
    fn test_exclude_rules_malformed_config_is_error() {
        let dir = tmp();
        fs::write(dir.path().join("codegraph.toml"), "exclude = not-a-list\n").unwrap();
        assert!(ExcludeRules::load(dir.path()).is_err());
    }

    #[test]
    fn test_exclude_rules_invalid_pattern_is_error() {
        let dir = tmp();
        fs::write(dir.path().join("codegraph.toml"), "exclude = [\"src/[\"]\n").unwrap();
        assert!(ExcludeRules::load(dir.path()).is_err());
    }

    #[test]
    fn test_relative_key_is_slash_separated() {
        let root = Path::new("/proj");
        let key = relative_key(root, &root.join("src").join("a.ts"));
        assert_eq!(key, "src/a.ts");
    }
}
