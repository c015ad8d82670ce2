use std::collections::{BTreeMap, HashMap, HashSet};

use crate::parser::FileFacts;
use crate::resolver::{ImportResolver, Resolution};

/// One re-export statement with its resolved target file.
#[derive(Debug)]
struct ReExport {
    names: Vec<String>,
    wildcard: bool,
    target: String,
}

#[derive(Debug, Default)]
struct BarrelFile {
    reexports: Vec<ReExport>,
    /// The file's re-exports outnumber (or equal) its own definitions.
    is_barrel: bool,
    /// Names this file defines or re-declares in an export clause.
    defines: HashSet<String>,
}

/// Per-file re-export map used to chase barrel chains.
///
/// Built once after the extraction pass; chain resolution carries an explicit
/// visited set, so circular barrels terminate by returning no result.
#[derive(Debug, Default)]
pub struct BarrelMap {
    entries: HashMap<String, BarrelFile>,
}

impl BarrelMap {
    /// Compute the barrel map for all extracted files, resolving each
    /// re-export source through the import resolver.
    pub fn build(facts: &BTreeMap<String, FileFacts>, resolver: &ImportResolver) -> BarrelMap {
        let mut entries = HashMap::new();

        for (file, file_facts) in facts {
            let mut entry = BarrelFile {
                reexports: Vec::new(),
                is_barrel: file_facts.reexport_count() >= file_facts.definitions.len(),
                defines: file_facts
                    .definitions
                    .iter()
                    .map(|d| d.name.clone())
                    .chain(file_facts.exports.iter().cloned())
                    .collect(),
            };

            for import in &file_facts.imports {
                if !import.reexport {
                    continue;
                }
                if let Resolution::Resolved(target) = resolver.resolve(&import.source, file) {
                    entry.reexports.push(ReExport {
                        names: import.names.clone(),
                        wildcard: import.wildcard,
                        target,
                    });
                }
            }

            entries.insert(file.clone(), entry);
        }

        BarrelMap { entries }
    }

    /// Whether `file` is classified as a barrel.
    pub fn is_barrel(&self, file: &str) -> bool {
        self.entries.get(file).map(|e| e.is_barrel).unwrap_or(false)
    }

    /// Follow re-export chains from `barrel` to the file that ultimately
    /// defines `name`. Returns `None` when no chain leads to a definition,
    /// including on cycle re-entry.
    pub fn resolve_name(&self, barrel: &str, name: &str) -> Option<String> {
        let mut visited = HashSet::new();
        self.resolve_inner(barrel, name, &mut visited)
    }

    fn resolve_inner<'a>(
        &'a self,
        file: &str,
        name: &str,
        visited: &mut HashSet<&'a str>,
    ) -> Option<String> {
        let (key, entry) = self.entries.get_key_value(file)?;
        if !visited.insert(key.as_str()) {
            return None;
        }

        for reexport in &entry.reexports {
            if reexport.wildcard {
                if self.defines(&reexport.target, name) {
                    return Some(reexport.target.clone());
                }
                if let Some(found) = self.resolve_inner(&reexport.target, name, visited) {
                    return Some(found);
                }
            } else if reexport.names.iter().any(|n| n == name) {
                if self.defines(&reexport.target, name) {
                    return Some(reexport.target.clone());
                }
                if self.is_barrel(&reexport.target)
                    && let Some(found) = self.resolve_inner(&reexport.target, name, visited)
                {
                    return Some(found);
                }
            }
        }

        None
    }

    fn defines(&self, file: &str, name: &str) -> bool {
        self.entries
            .get(file)
            .map(|e| e.defines.contains(name))
            .unwrap_or(false)
    }
}
