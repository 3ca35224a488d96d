//! Symbol Resolver — maps a call site or inheritance relation to the file (and, where known,
//! entity) that defines the referenced symbol.
//!
//! Resolution never guesses among multiple equally-plausible targets: a name that appears in
//! more than one file anywhere in the repository is left unresolved rather than attributed to
//! an arbitrary one of them.

use rpg_parser::ast::ParseResult;
use rpg_parser::calls::CallSite;
use rpg_parser::inheritance::{InheritanceRelation, RelationKind};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Repository-wide index of what each file defines and what each file imports.
pub struct SymbolTable {
    /// file -> names of entities defined in it.
    exports: BTreeMap<PathBuf, BTreeSet<String>>,
    /// file -> imported name -> file it was resolved to.
    imports: BTreeMap<PathBuf, BTreeMap<String, PathBuf>>,
}

/// A call site resolved to its defining file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCall {
    pub source_file: PathBuf,
    pub source_entity: Option<String>,
    pub target_file: PathBuf,
    pub target_symbol: String,
    pub line: Option<u32>,
}

/// An inheritance/implementation relation resolved to its parent's defining file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInheritance {
    pub child_file: PathBuf,
    pub child_class: String,
    pub target_file: PathBuf,
    pub target_symbol: String,
    pub kind: RelationKind,
}

impl SymbolTable {
    /// Build the table from every file's parse result.
    pub fn build(parsed: &[(PathBuf, ParseResult)]) -> Self {
        let mut exports: BTreeMap<PathBuf, BTreeSet<String>> = BTreeMap::new();
        for (path, result) in parsed {
            let names = exports.entry(path.clone()).or_default();
            for entity in &result.entities {
                names.insert(entity.name.clone());
            }
        }

        let files_by_stem = index_files_by_stem(parsed);

        let mut imports: BTreeMap<PathBuf, BTreeMap<String, PathBuf>> = BTreeMap::new();
        for (path, result) in parsed {
            let mut resolved = BTreeMap::new();
            for import in &result.imports {
                let Some(target) = resolve_module_to_file(&import.module, &files_by_stem) else {
                    continue;
                };
                if import.symbols.is_empty() {
                    if let Some(last) = module_last_segment(&import.module) {
                        resolved.insert(last.to_string(), target.clone());
                    }
                } else {
                    for symbol in &import.symbols {
                        resolved.insert(symbol.clone(), target.clone());
                    }
                }
            }
            imports.insert(path.clone(), resolved);
        }

        Self { exports, imports }
    }

    /// The distinct files `file`'s imports were resolved to (unresolvable/external imports are
    /// simply absent). Used by the Dependency Injector for file-level import edges.
    pub fn resolved_imports(&self, file: &Path) -> Vec<PathBuf> {
        let Some(imports) = self.imports.get(file) else {
            return Vec::new();
        };
        let mut targets: Vec<PathBuf> = imports.values().cloned().collect();
        targets.sort();
        targets.dedup();
        targets
    }

    fn defines(&self, file: &Path, name: &str) -> bool {
        self.exports.get(file).is_some_and(|names| names.contains(name))
    }

    /// All files that define an entity named exactly `name`, excluding `except`.
    fn files_defining(&self, name: &str, except: &Path) -> Vec<&PathBuf> {
        self.exports
            .iter()
            .filter(|(file, names)| file.as_path() != except && names.contains(name))
            .map(|(file, _)| file)
            .collect()
    }

    /// Case-insensitive unique fallback: the single file (anywhere in the repo) whose exports
    /// contain a name matching `target` case-insensitively. Returns `None` if zero or more than
    /// one file matches.
    fn fuzzy_unique(&self, target: &str, except: &Path) -> Option<(PathBuf, String)> {
        let target_lower = target.to_lowercase();
        let mut found: Option<(PathBuf, String)> = None;
        for (file, names) in &self.exports {
            if file.as_path() == except {
                continue;
            }
            for name in names {
                if name.to_lowercase() == target_lower {
                    if found.is_some() {
                        return None;
                    }
                    found = Some((file.clone(), name.clone()));
                }
            }
        }
        found
    }
}

/// Resolve a call site to the file defining its callee, per the same-file -> imports -> fuzzy
/// unique case-insensitive fallback order.
pub fn resolve_call(table: &SymbolTable, call: &CallSite) -> Option<ResolvedCall> {
    let file = &call.caller_file;

    if table.defines(file, &call.callee_symbol) {
        return Some(ResolvedCall {
            source_file: file.clone(),
            source_entity: call.caller_entity.clone(),
            target_file: file.clone(),
            target_symbol: call.callee_symbol.clone(),
            line: call.line,
        });
    }

    if let Some(target_file) = table.imports.get(file).and_then(|m| m.get(&call.callee_symbol)) {
        return Some(ResolvedCall {
            source_file: file.clone(),
            source_entity: call.caller_entity.clone(),
            target_file: target_file.clone(),
            target_symbol: call.callee_symbol.clone(),
            line: call.line,
        });
    }

    let (target_file, target_symbol) = table.fuzzy_unique(&call.callee_symbol, file)?;
    Some(ResolvedCall {
        source_file: file.clone(),
        source_entity: call.caller_entity.clone(),
        target_file,
        target_symbol,
        line: call.line,
    })
}

/// Resolve an inheritance/implementation relation to the file defining the parent class.
pub fn resolve_inheritance(table: &SymbolTable, rel: &InheritanceRelation) -> Option<ResolvedInheritance> {
    let file = &rel.child_file;

    if table.defines(file, &rel.parent_class) {
        return Some(ResolvedInheritance {
            child_file: file.clone(),
            child_class: rel.child_class.clone(),
            target_file: file.clone(),
            target_symbol: rel.parent_class.clone(),
            kind: rel.kind,
        });
    }

    if let Some(target_file) = table.imports.get(file).and_then(|m| m.get(&rel.parent_class)) {
        return Some(ResolvedInheritance {
            child_file: file.clone(),
            child_class: rel.child_class.clone(),
            target_file: target_file.clone(),
            target_symbol: rel.parent_class.clone(),
            kind: rel.kind,
        });
    }

    let candidates = table.files_defining(&rel.parent_class, file);
    if candidates.len() == 1 {
        return Some(ResolvedInheritance {
            child_file: file.clone(),
            child_class: rel.child_class.clone(),
            target_file: candidates[0].clone(),
            target_symbol: rel.parent_class.clone(),
            kind: rel.kind,
        });
    }

    let (target_file, target_symbol) = table.fuzzy_unique(&rel.parent_class, file)?;
    Some(ResolvedInheritance {
        child_file: file.clone(),
        child_class: rel.child_class.clone(),
        target_file,
        target_symbol,
        kind: rel.kind,
    })
}

fn index_files_by_stem(parsed: &[(PathBuf, ParseResult)]) -> BTreeMap<String, Vec<PathBuf>> {
    let mut map: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for (path, _) in parsed {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            map.entry(stem.to_string()).or_default().push(path.clone());
        }
    }
    map
}

/// Best-effort mapping from an import's module path to a known file in the repository: strip
/// relative-import dots, split on `.`/`::`/`/`, and match the last segment against file stems.
/// Only resolves when exactly one known file has that stem.
fn resolve_module_to_file(module: &str, files_by_stem: &BTreeMap<String, Vec<PathBuf>>) -> Option<PathBuf> {
    let last = module_last_segment(module)?;
    let candidates = files_by_stem.get(last)?;
    if candidates.len() == 1 {
        Some(candidates[0].clone())
    } else {
        None
    }
}

fn module_last_segment(module: &str) -> Option<&str> {
    let trimmed = module.trim_start_matches('.').trim_start_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    trimmed.rsplit(['.', ':', '/']).find(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpg_core::graph::EntityType;
    use rpg_parser::ast::{RawEntity, RawImport};
    use rpg_parser::calls::ReceiverKind;

    fn entity(name: &str, file: &str) -> RawEntity {
        RawEntity {
            name: name.to_string(),
            entity_type: EntityType::Function,
            file: PathBuf::from(file),
            line_start: 1,
            line_end: 1,
            parent: None,
            source_code: String::new(),
        }
    }

    fn parsed_fixture() -> Vec<(PathBuf, ParseResult)> {
        vec![
            (
                PathBuf::from("animal.py"),
                ParseResult {
                    language: None,
                    entities: vec![entity("Animal", "animal.py"), entity("speak", "animal.py")],
                    imports: vec![],
                    errors: vec![],
                },
            ),
            (
                PathBuf::from("dog.py"),
                ParseResult {
                    language: None,
                    entities: vec![entity("Dog", "dog.py"), entity("fetch", "dog.py")],
                    imports: vec![RawImport {
                        module: "animal".to_string(),
                        symbols: vec!["Animal".to_string()],
                    }],
                    errors: vec![],
                },
            ),
        ]
    }

    fn call_site(file: &str, caller: &str, callee: &str) -> CallSite {
        CallSite {
            caller_file: PathBuf::from(file),
            caller_entity: Some(caller.to_string()),
            callee_symbol: callee.to_string(),
            line: Some(3),
            receiver: None,
            receiver_kind: ReceiverKind::None,
        }
    }

    #[test]
    fn same_file_call_resolves_without_imports() {
        let table = SymbolTable::build(&parsed_fixture());
        let resolved = resolve_call(&table, &call_site("dog.py", "fetch", "Dog")).unwrap();
        assert_eq!(resolved.target_file, PathBuf::from("dog.py"));
    }

    #[test]
    fn imported_call_resolves_to_import_target() {
        let table = SymbolTable::build(&parsed_fixture());
        let resolved = resolve_call(&table, &call_site("dog.py", "fetch", "Animal")).unwrap();
        assert_eq!(resolved.target_file, PathBuf::from("animal.py"));
    }

    #[test]
    fn ambiguous_fuzzy_fallback_is_unresolved() {
        let mut parsed = parsed_fixture();
        parsed.push((
            PathBuf::from("cat.py"),
            ParseResult {
                language: None,
                entities: vec![entity("speak", "cat.py")],
                imports: vec![],
                errors: vec![],
            },
        ));
        let table = SymbolTable::build(&parsed);
        // "speak" is defined in both animal.py and cat.py with no import link from dog.py.
        assert!(resolve_call(&table, &call_site("dog.py", "fetch", "speak")).is_none());
    }

    #[test]
    fn unique_fuzzy_fallback_resolves_case_insensitively() {
        let table = SymbolTable::build(&parsed_fixture());
        let resolved = resolve_call(&table, &call_site("dog.py", "fetch", "ANIMAL")).unwrap();
        assert_eq!(resolved.target_file, PathBuf::from("animal.py"));
    }

    #[test]
    fn inheritance_resolves_through_same_file_then_fuzzy() {
        let table = SymbolTable::build(&parsed_fixture());
        let rel = InheritanceRelation {
            child_file: PathBuf::from("dog.py"),
            child_class: "Dog".to_string(),
            parent_class: "Animal".to_string(),
            kind: RelationKind::Inherit,
        };
        let resolved = resolve_inheritance(&table, &rel).unwrap();
        assert_eq!(resolved.target_file, PathBuf::from("animal.py"));
        assert_eq!(resolved.target_symbol, "Animal");
    }
}
