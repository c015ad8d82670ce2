use std::path::Path;

use serde_json::Value;

/// Path-alias configuration extracted from a project config file.
///
/// At most one config file is loaded per build: `tsconfig.json` is preferred,
/// `jsconfig.json` is the fallback. Only `compilerOptions.baseUrl` and
/// `compilerOptions.paths` are read.
#[derive(Debug, Default)]
pub struct ProjectConfig {
    /// Workspace-relative base directory for bare-specifier resolution.
    pub base_url: Option<String>,
    /// Alias rules, in declaration order.
    pub aliases: Vec<AliasRule>,
}

/// One `paths` entry: a pattern with an optional trailing `*` and one or more
/// workspace-relative target prefixes (their trailing `*` already stripped).
#[derive(Debug)]
pub struct AliasRule {
    pub pattern: String,
    pub targets: Vec<String>,
}

impl ProjectConfig {
    /// Load the project config from `root`, or `None` when neither file
    /// exists. A malformed config is a skippable error: warn once and resolve
    /// without aliases.
    pub fn load(root: &Path) -> Option<ProjectConfig> {
        let path = ["tsconfig.json", "jsconfig.json"]
            .iter()
            .map(|name| root.join(name))
            .find(|p| p.exists())?;

        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(err) => {
                eprintln!("warning: failed to read {}: {err}", path.display());
                return None;
            }
        };

        let value: Value = match serde_json::from_str(&strip_jsonc(&contents)) {
            Ok(v) => v,
            Err(err) => {
                eprintln!("warning: failed to parse {}: {err}", path.display());
                return None;
            }
        };

        Some(ProjectConfig::from_value(&value))
    }

    fn from_value(value: &Value) -> ProjectConfig {
        let options = &value["compilerOptions"];

        let base_url = options["baseUrl"]
            .as_str()
            .map(|s| normalize_prefix(s));

        let mut aliases = Vec::new();
        if let Some(paths) = options["paths"].as_object() {
            for (pattern, targets) in paths {
                let targets: Vec<String> = targets
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(|t| t.as_str())
                    .map(|t| {
                        let t = t.strip_suffix('*').unwrap_or(t);
                        join_prefix(base_url.as_deref(), t)
                    })
                    .collect();
                if !targets.is_empty() {
                    aliases.push(AliasRule {
                        pattern: pattern.clone(),
                        targets,
                    });
                }
            }
        }

        ProjectConfig { base_url, aliases }
    }

    /// Substitute `specifier` through each alias whose literal prefix
    /// matches, yielding workspace-relative candidate paths in rule order.
    pub fn alias_candidates(&self, specifier: &str) -> Vec<String> {
        let mut candidates = Vec::new();
        for rule in &self.aliases {
            match rule.pattern.strip_suffix('*') {
                Some(prefix) => {
                    if let Some(tail) = specifier.strip_prefix(prefix) {
                        for target in &rule.targets {
                            candidates.push(format!("{target}{tail}"));
                        }
                    }
                }
                None => {
                    if specifier == rule.pattern {
                        candidates.extend(rule.targets.iter().cloned());
                    }
                }
            }
        }
        candidates
    }
}

fn normalize_prefix(s: &str) -> String {
    s.trim_start_matches("./").trim_end_matches('/').to_owned()
}

fn join_prefix(base: Option<&str>, tail: &str) -> String {
    let tail = normalize_prefix(tail);
    match base {
        Some(base) if !base.is_empty() && base != "." => {
            if tail.is_empty() {
                base.to_owned()
            } else {
                format!("{base}/{tail}")
            }
        }
        _ => tail,
    }
}

/// Strip line comments, block comments, and trailing commas so the file can
/// be decoded as plain JSON. String contents are left untouched.
fn strip_jsonc(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    let mut in_string = false;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < bytes.len() {
                out.push(bytes[i + 1] as char);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            '/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            '/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    strip_trailing_commas(&out)
}

/// Remove commas directly preceding a closing `]` or `}` (ignoring
/// whitespace). Assumes comments were already removed.
fn strip_trailing_commas(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;

    for (i, &b) in bytes.iter().enumerate() {
        let c = b as char;
        if in_string {
            out.push(c);
            if c == '"' && bytes.get(i.wrapping_sub(1)) != Some(&b'\\') {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let mut j = i + 1;
                while j < bytes.len() && (bytes[j] as char).is_whitespace() {
                    j += 1;
                }
                if j < bytes.len() && (bytes[j] == b']' || bytes[j] == b'}') {
                    continue;
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    out
}
