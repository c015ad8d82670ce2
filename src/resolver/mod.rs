pub mod barrel;
pub mod project_config;

use std::collections::HashSet;
use std::path::Path;

use project_config::ProjectConfig;

/// Candidate suffixes probed in order when resolving a specifier to a file.
const PROBE_SUFFIXES: &[&str] = &[
    "",
    ".ts",
    ".tsx",
    ".js",
    ".jsx",
    ".mjs",
    ".py",
    "/index.ts",
    "/index.tsx",
    "/index.js",
    "/__init__.py",
];

/// The outcome of resolving an import specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A workspace-relative path that exists in the enumerated file set.
    Resolved(String),
    /// The specifier could not be mapped to a workspace file. Carries the
    /// unchanged specifier (external module) or the workspace-relative form
    /// of the miss; either way it matches no file node and no edge is
    /// created.
    Unresolved(String),
}

/// Maps import specifiers to canonical workspace-relative paths.
///
/// Holds the enumerated file set and the optional project config; both are
/// immutable for the duration of one build.
pub struct ImportResolver {
    files: HashSet<String>,
    config: Option<ProjectConfig>,
}

impl ImportResolver {
    /// Build a resolver over the enumerated file set, loading the project
    /// config (at most one file) from the workspace root.
    pub fn new(root: &Path, files: HashSet<String>) -> ImportResolver {
        ImportResolver {
            files,
            config: ProjectConfig::load(root),
        }
    }

    /// Resolver without a config file: used by tests and incremental
    /// updates that re-use an already-loaded config.
    pub fn with_config(files: HashSet<String>, config: Option<ProjectConfig>) -> ImportResolver {
        ImportResolver { files, config }
    }

    /// Resolve a specifier issued from `from_file` (workspace-relative).
    pub fn resolve(&self, specifier: &str, from_file: &str) -> Resolution {
        if !specifier.starts_with('.') {
            return self.resolve_bare(specifier);
        }

        // Relative: resolve against dirname(from_file).
        let dir = parent_dir(from_file);
        let joined = if dir.is_empty() {
            specifier.to_owned()
        } else {
            format!("{dir}/{specifier}")
        };
        let base = normalize(&joined);

        match self.probe_with_js_preference(&base) {
            Some(found) => Resolution::Resolved(found),
            None => Resolution::Unresolved(base),
        }
    }

    /// Resolve an HCL `module` source path. Terraform module sources name a
    /// directory; the conventional entry file inside it is probed as well.
    pub fn resolve_hcl(&self, specifier: &str, from_file: &str) -> Resolution {
        if !specifier.starts_with('.') {
            return Resolution::Unresolved(specifier.to_owned());
        }
        let dir = parent_dir(from_file);
        let joined = if dir.is_empty() {
            specifier.to_owned()
        } else {
            format!("{dir}/{specifier}")
        };
        let base = normalize(&joined);
        for suffix in ["", ".tf", "/main.tf"] {
            let candidate = format!("{base}{suffix}");
            if self.files.contains(&candidate) {
                return Resolution::Resolved(candidate);
            }
        }
        Resolution::Unresolved(base)
    }

    /// Resolve a Python dotted module path (`pkg.mod`, `.utils`, `..a.b`)
    /// issued from `from_file`. Leading dots are package-relative; absolute
    /// module paths follow the bare-specifier path and usually resolve to
    /// nothing inside the workspace.
    pub fn resolve_python(&self, module: &str, from_file: &str) -> Resolution {
        let leading_dots = module.len() - module.trim_start_matches('.').len();
        let rest = &module[leading_dots..];
        let rest_path = rest.replace('.', "/");

        if leading_dots == 0 {
            return self.resolve_bare(&rest_path);
        }

        // One dot is the current package, each further dot one level up.
        let mut prefix = String::from("./");
        for _ in 1..leading_dots {
            prefix.push_str("../");
        }
        let specifier = format!("{prefix}{rest_path}");
        self.resolve(&specifier, from_file)
    }

    /// Non-relative specifier: alias substitution, then baseUrl, then give
    /// it back unchanged as an external module.
    fn resolve_bare(&self, specifier: &str) -> Resolution {
        if let Some(config) = &self.config {
            for candidate in config.alias_candidates(specifier) {
                if let Some(found) = self.probe_with_js_preference(&normalize(&candidate)) {
                    return Resolution::Resolved(found);
                }
            }
            if let Some(base_url) = &config.base_url {
                let candidate = format!("{base_url}/{specifier}");
                if let Some(found) = self.probe_with_js_preference(&normalize(&candidate)) {
                    return Resolution::Resolved(found);
                }
            }
        }
        Resolution::Unresolved(specifier.to_owned())
    }

    /// The ESM convention: a specifier written with `.js` refers to the
    /// compiled output, so `.ts` then `.tsx` sources are probed first.
    fn probe_with_js_preference(&self, base: &str) -> Option<String> {
        if let Some(stem) = base.strip_suffix(".js") {
            for candidate in [format!("{stem}.ts"), format!("{stem}.tsx")] {
                if self.files.contains(&candidate) {
                    return Some(candidate);
                }
            }
        }
        self.probe(base)
    }

    fn probe(&self, base: &str) -> Option<String> {
        for suffix in PROBE_SUFFIXES {
            let candidate = format!("{base}{suffix}");
            if self.files.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

/// Directory part of a workspace-relative path, `""` for root-level files.
fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Lexically normalize a `/`-separated path: collapse `.`, apply `..`.
/// Components escaping the workspace root are dropped: such a path cannot
/// match a file node anyway.
fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::project_config::AliasRule;

    fn file_set(files: &[&str]) -> HashSet<String> {
        files.iter().map(|s| (*s).to_owned()).collect()
    }

    fn resolver(files: &[&str]) -> ImportResolver {
        ImportResolver::with_config(file_set(files), None)
    }

    #[test]
    fn test_relative_with_extension_probe() {
        let r = resolver(&["src/a.ts", "src/b.ts"]);
        assert_eq!(
            r.resolve("./b", "src/a.ts"),
            Resolution::Resolved("src/b.ts".to_owned())
        );
    }

    #[test]
    fn test_parent_relative() {
        let r = resolver(&["src/deep/a.ts", "src/util.ts"]);
        assert_eq!(
            r.resolve("../util", "src/deep/a.ts"),
            Resolution::Resolved("src/util.ts".to_owned())
        );
    }

    #[test]
    fn test_js_specifier_prefers_ts_then_tsx() {
        let r = resolver(&["src/b.ts", "src/b.js"]);
        assert_eq!(
            r.resolve("./b.js", "src/a.ts"),
            Resolution::Resolved("src/b.ts".to_owned())
        );

        let r = resolver(&["src/c.tsx", "src/c.js"]);
        assert_eq!(
            r.resolve("./c.js", "src/a.ts"),
            Resolution::Resolved("src/c.tsx".to_owned())
        );

        let r = resolver(&["src/d.js"]);
        assert_eq!(
            r.resolve("./d.js", "src/a.ts"),
            Resolution::Resolved("src/d.js".to_owned())
        );
    }

    #[test]
    fn test_directory_index_probe() {
        let r = resolver(&["src/components/index.ts"]);
        assert_eq!(
            r.resolve("./components", "src/app.ts"),
            Resolution::Resolved("src/components/index.ts".to_owned())
        );
    }

    #[test]
    fn test_bare_specifier_without_config_is_external() {
        let r = resolver(&["src/a.ts"]);
        assert_eq!(
            r.resolve("react", "src/a.ts"),
            Resolution::Unresolved("react".to_owned())
        );
    }

    #[test]
    fn test_relative_miss_returns_workspace_relative_form() {
        let r = resolver(&["src/a.ts"]);
        assert_eq!(
            r.resolve("./missing", "src/a.ts"),
            Resolution::Unresolved("src/missing".to_owned())
        );
    }

    #[test]
    fn test_alias_resolution() {
        let config = ProjectConfig {
            base_url: Some("src".to_owned()),
            aliases: vec![AliasRule {
                pattern: "@app/*".to_owned(),
                targets: vec!["src/app/*".to_owned()],
            }],
        };
        let r = ImportResolver::with_config(
            file_set(&["src/app/service.ts", "src/shared/util.ts"]),
            Some(config),
        );
        assert_eq!(
            r.resolve("@app/service", "src/main.ts"),
            Resolution::Resolved("src/app/service.ts".to_owned())
        );
        // Bare specifier falls back to baseUrl.
        assert_eq!(
            r.resolve("shared/util", "src/main.ts"),
            Resolution::Resolved("src/shared/util.ts".to_owned())
        );
    }

    #[test]
    fn test_alias_targets_strip_star() {
        let config = ProjectConfig {
            base_url: None,
            aliases: vec![AliasRule {
                pattern: "#lib/*".to_owned(),
                targets: vec!["lib/*".to_owned()],
            }],
        };
        let r = ImportResolver::with_config(file_set(&["lib/x.ts"]), Some(config));
        assert_eq!(
            r.resolve("#lib/x", "main.ts"),
            Resolution::Resolved("lib/x.ts".to_owned())
        );
    }

    #[test]
    fn test_python_relative_import() {
        let r = resolver(&["pkg/a.py", "pkg/utils.py", "shared/helpers.py"]);
        assert_eq!(
            r.resolve_python(".utils", "pkg/a.py"),
            Resolution::Resolved("pkg/utils.py".to_owned())
        );
        assert_eq!(
            r.resolve_python("..shared.helpers", "pkg/a.py"),
            Resolution::Resolved("shared/helpers.py".to_owned())
        );
    }

    #[test]
    fn test_python_package_init_probe() {
        let r = resolver(&["pkg/sub/__init__.py", "pkg/a.py"]);
        assert_eq!(
            r.resolve_python(".sub", "pkg/a.py"),
            Resolution::Resolved("pkg/sub/__init__.py".to_owned())
        );
    }

    #[test]
    fn test_python_absolute_import_is_external() {
        let r = resolver(&["pkg/a.py"]);
        assert_eq!(
            r.resolve_python("os.path", "pkg/a.py"),
            Resolution::Unresolved("os/path".to_owned())
        );
    }

    #[test]
    fn test_hcl_module_source_probes_entry_file() {
        let r = resolver(&["main.tf", "network/main.tf", "modules/dns.tf"]);
        assert_eq!(
            r.resolve_hcl("./network", "main.tf"),
            Resolution::Resolved("network/main.tf".to_owned())
        );
        assert_eq!(
            r.resolve_hcl("./modules/dns", "main.tf"),
            Resolution::Resolved("modules/dns.tf".to_owned())
        );
        assert_eq!(
            r.resolve_hcl("terraform-aws-modules/vpc/aws", "main.tf"),
            Resolution::Unresolved("terraform-aws-modules/vpc/aws".to_owned())
        );
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("src/./a/../b"), "src/b");
        assert_eq!(normalize("./x"), "x");
        assert_eq!(normalize("../escape"), "escape");
    }
}
