//! Tree-sitter based AST parsing: entities, imports, and syntax errors.
//!
//! One entry point, [`parse`], dispatches on [`Language`] and never panics or propagates a
//! parse failure — malformed source yields entries in [`ParseResult::errors`] instead.

use crate::languages::Language;
use rayon::prelude::*;
use rpg_core::graph::EntityType;
use std::path::{Path, PathBuf};

/// A single entity extracted from source, before symbol resolution.
#[derive(Debug, Clone)]
pub struct RawEntity {
    pub name: String,
    pub entity_type: EntityType,
    pub file: PathBuf,
    pub line_start: usize,
    pub line_end: usize,
    pub parent: Option<String>,
    pub source_code: String,
}

impl RawEntity {
    /// Qualified name: `Parent.name` when nested inside a class, else bare `name`.
    pub fn qualified_name(&self) -> String {
        match &self.parent {
            Some(p) => format!("{p}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A raw import statement: the module path plus any explicitly named symbols.
#[derive(Debug, Clone)]
pub struct RawImport {
    pub module: String,
    pub symbols: Vec<String>,
}

/// A syntax error recorded during parsing without aborting extraction.
#[derive(Debug, Clone)]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

/// Result of parsing one source file.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub language: Option<Language>,
    pub entities: Vec<RawEntity>,
    pub imports: Vec<RawImport>,
    pub errors: Vec<SyntaxError>,
}

/// Parse `source` as `language`, returning entities/imports/errors for `path`.
///
/// An unsupported language yields an empty `ParseResult` with `language: None` — downstream
/// consumers must tolerate this per the "unknown language" edge case.
pub fn parse(path: &Path, source: &str, language: Option<Language>) -> ParseResult {
    let Some(language) = language else {
        return ParseResult::default();
    };
    if source.is_empty() {
        return ParseResult {
            language: Some(language),
            ..Default::default()
        };
    }

    let mut parser = tree_sitter::Parser::new();
    if parser.set_language(&language.ts_language()).is_err() {
        return ParseResult {
            language: Some(language),
            errors: vec![SyntaxError {
                line: 0,
                message: format!("failed to load {} grammar", language.name()),
            }],
            ..Default::default()
        };
    }
    let Some(tree) = parser.parse(source.as_bytes(), None) else {
        return ParseResult {
            language: Some(language),
            errors: vec![SyntaxError {
                line: 0,
                message: "tree-sitter failed to produce a parse tree".to_string(),
            }],
            ..Default::default()
        };
    };

    let errors = collect_syntax_errors(&tree.root_node(), source);
    let mut entities = Vec::new();
    let mut imports = Vec::new();

    match language {
        Language::Python => extract_python(&tree.root_node(), path, source, None, &mut entities, &mut imports),
        Language::Rust => extract_rust(&tree.root_node(), path, source, None, &mut entities, &mut imports),
        Language::TypeScript | Language::JavaScript => {
            extract_js_like(&tree.root_node(), path, source, None, &mut entities, &mut imports)
        }
        Language::Go => extract_go(&tree.root_node(), path, source, &mut entities, &mut imports),
        Language::Java => extract_java(&tree.root_node(), path, source, None, &mut entities, &mut imports),
        Language::C | Language::Cpp => {
            extract_c_like(&tree.root_node(), path, source, None, &mut entities, &mut imports, language)
        }
        Language::CSharp => extract_csharp(&tree.root_node(), path, source, None, &mut entities, &mut imports),
        Language::Ruby => extract_ruby(&tree.root_node(), path, source, None, &mut entities, &mut imports),
        Language::Kotlin => extract_kotlin(&tree.root_node(), path, source, None, &mut entities, &mut imports),
    }

    ParseResult {
        language: Some(language),
        entities,
        imports,
        errors,
    }
}

/// Parse every recognized source file under `root` in parallel, respecting `.gitignore` and
/// `.rpgignore`. Returns one `(path, ParseResult)` pair per file; read failures are skipped
/// rather than aborting the whole walk.
pub fn parse_repository(root: &Path) -> Vec<(PathBuf, ParseResult)> {
    let files: Vec<PathBuf> = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .add_custom_ignore_filename(".rpgignore")
        .build()
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .and_then(Language::from_extension)
                .is_some()
        })
        .collect();

    files
        .into_par_iter()
        .filter_map(|path| {
            let source = std::fs::read_to_string(&path).ok()?;
            let language = path.extension().and_then(|e| e.to_str()).and_then(Language::from_extension);
            let result = parse(&path, &source, language);
            Some((path, result))
        })
        .collect()
}

/// Walk the tree recording tree-sitter's own error-recovery nodes.
fn collect_syntax_errors(node: &tree_sitter::Node, source: &str) -> Vec<SyntaxError> {
    let mut errors = Vec::new();
    collect_syntax_errors_into(node, source, &mut errors);
    errors
}

fn collect_syntax_errors_into(node: &tree_sitter::Node, source: &str, out: &mut Vec<SyntaxError>) {
    if node.is_error() {
        out.push(SyntaxError {
            line: node.start_position().row + 1,
            message: format!("unexpected syntax: {:?}", &source[node.byte_range()]),
        });
    } else if node.is_missing() {
        out.push(SyntaxError {
            line: node.start_position().row + 1,
            message: format!("missing {}", node.kind()),
        });
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_syntax_errors_into(&child, source, out);
    }
}

fn push_entity(
    entities: &mut Vec<RawEntity>,
    name: &str,
    entity_type: EntityType,
    path: &Path,
    node: &tree_sitter::Node,
    parent: Option<&str>,
    source: &str,
) {
    entities.push(RawEntity {
        name: name.to_string(),
        entity_type,
        file: path.to_path_buf(),
        line_start: node.start_position().row + 1,
        line_end: node.end_position().row + 1,
        parent: parent.map(String::from),
        source_code: source[node.byte_range()].to_string(),
    });
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

fn extract_python(
    node: &tree_sitter::Node,
    path: &Path,
    source: &str,
    parent_class: Option<&str>,
    entities: &mut Vec<RawEntity>,
    imports: &mut Vec<RawImport>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_statement" | "import_from_statement" => {
                if let Some(import) = parse_python_import(&source[child.byte_range()]) {
                    imports.push(import);
                }
            }
            "function_definition" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let kind = if parent_class.is_some() {
                        EntityType::Method
                    } else {
                        EntityType::Function
                    };
                    push_entity(
                        entities,
                        &source[name_node.byte_range()],
                        kind,
                        path,
                        &child,
                        parent_class,
                        source,
                    );
                }
            }
            "decorated_definition" => {
                extract_python(&child, path, source, parent_class, entities, imports);
            }
            "class_definition" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let class_name = source[name_node.byte_range()].to_string();
                    push_entity(entities, &class_name, EntityType::Class, path, &child, None, source);
                    if let Some(body) = child.child_by_field_name("body") {
                        extract_python(&body, path, source, Some(&class_name), entities, imports);
                    }
                }
            }
            _ => {
                if parent_class.is_none() {
                    extract_python(&child, path, source, None, entities, imports);
                }
            }
        }
    }
}

fn parse_python_import(text: &str) -> Option<RawImport> {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix("from ") {
        let parts: Vec<&str> = rest.splitn(2, " import ").collect();
        if parts.len() == 2 {
            let module = parts[0].trim().to_string();
            let symbols: Vec<String> = parts[1]
                .split(',')
                .map(|s| s.trim().split(" as ").next().unwrap_or("").trim().to_string())
                .filter(|s| !s.is_empty() && s != "*")
                .collect();
            return Some(RawImport { module, symbols });
        }
    } else if let Some(rest) = text.strip_prefix("import ") {
        let module = rest.split(" as ").next().unwrap_or("").trim().to_string();
        return Some(RawImport { module, symbols: Vec::new() });
    }
    None
}

// ---------------------------------------------------------------------------
// Rust
// ---------------------------------------------------------------------------

fn extract_rust(
    node: &tree_sitter::Node,
    path: &Path,
    source: &str,
    parent_type: Option<&str>,
    entities: &mut Vec<RawEntity>,
    imports: &mut Vec<RawImport>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "use_declaration" => imports.push(parse_rust_use(&source[child.byte_range()])),
            "function_item" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let kind = if parent_type.is_some() {
                        EntityType::Method
                    } else {
                        EntityType::Function
                    };
                    push_entity(
                        entities,
                        &source[name_node.byte_range()],
                        kind,
                        path,
                        &child,
                        parent_type,
                        source,
                    );
                }
            }
            "struct_item" | "enum_item" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    push_entity(
                        entities,
                        &source[name_node.byte_range()],
                        EntityType::Class,
                        path,
                        &child,
                        None,
                        source,
                    );
                }
            }
            "impl_item" => {
                if let Some(type_node) = child.child_by_field_name("type")
                    && let Some(body) = child.child_by_field_name("body")
                {
                    let type_name = source[type_node.byte_range()].to_string();
                    extract_rust(&body, path, source, Some(&type_name), entities, imports);
                }
            }
            "trait_item" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = source[name_node.byte_range()].to_string();
                    push_entity(entities, &name, EntityType::Class, path, &child, None, source);
                    if let Some(body) = child.child_by_field_name("body") {
                        extract_rust(&body, path, source, Some(&name), entities, imports);
                    }
                }
            }
            "mod_item" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    push_entity(
                        entities,
                        &source[name_node.byte_range()],
                        EntityType::Module,
                        path,
                        &child,
                        None,
                        source,
                    );
                    if let Some(body) = child.child_by_field_name("body") {
                        extract_rust(&body, path, source, None, entities, imports);
                    }
                }
            }
            _ => {
                if parent_type.is_none() {
                    extract_rust(&child, path, source, None, entities, imports);
                }
            }
        }
    }
}

fn parse_rust_use(text: &str) -> RawImport {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("pub(") {
        if let Some(idx) = rest.find(')') {
            text = rest[idx + 1..].trim();
        }
    } else if let Some(rest) = text.strip_prefix("pub ") {
        text = rest;
    }
    let text = text.trim_start_matches("use ").trim_end_matches(';');
    let parts: Vec<&str> = text.rsplitn(2, "::").collect();
    if parts.len() == 2 {
        let module = parts[1].to_string();
        let symbol = parts[0].trim();
        if let Some(inner) = symbol.strip_prefix('{') {
            let symbols = inner
                .trim_end_matches('}')
                .split(',')
                .map(|s| s.trim().split(" as ").next().unwrap_or("").trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            RawImport { module, symbols }
        } else {
            RawImport {
                module,
                symbols: vec![symbol.to_string()],
            }
        }
    } else {
        RawImport {
            module: text.to_string(),
            symbols: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// TypeScript / JavaScript
// ---------------------------------------------------------------------------

fn extract_js_like(
    node: &tree_sitter::Node,
    path: &Path,
    source: &str,
    parent_class: Option<&str>,
    entities: &mut Vec<RawEntity>,
    imports: &mut Vec<RawImport>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_statement" => {
                if let Some(src_node) = child.child_by_field_name("source") {
                    let module = source[src_node.byte_range()]
                        .trim_matches(|c: char| c == '\'' || c == '"')
                        .to_string();
                    let mut symbols = Vec::new();
                    let mut ic = child.walk();
                    for import_child in child.children(&mut ic) {
                        if import_child.kind() == "import_clause" {
                            collect_js_import_names(&import_child, source, &mut symbols);
                        }
                    }
                    imports.push(RawImport { module, symbols });
                }
            }
            "function_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let kind = if parent_class.is_some() {
                        EntityType::Method
                    } else {
                        EntityType::Function
                    };
                    push_entity(
                        entities,
                        &source[name_node.byte_range()],
                        kind,
                        path,
                        &child,
                        parent_class,
                        source,
                    );
                }
            }
            "class_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let class_name = source[name_node.byte_range()].to_string();
                    push_entity(entities, &class_name, EntityType::Class, path, &child, None, source);
                    if let Some(body) = child.child_by_field_name("body") {
                        extract_js_like(&body, path, source, Some(&class_name), entities, imports);
                    }
                }
            }
            "interface_declaration" | "type_alias_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    push_entity(
                        entities,
                        &source[name_node.byte_range()],
                        EntityType::Class,
                        path,
                        &child,
                        None,
                        source,
                    );
                }
            }
            "method_definition" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    push_entity(
                        entities,
                        &source[name_node.byte_range()],
                        EntityType::Method,
                        path,
                        &child,
                        parent_class,
                        source,
                    );
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                let mut inner = child.walk();
                for decl in child.children(&mut inner) {
                    if decl.kind() == "variable_declarator"
                        && (has_child_kind(&decl, "arrow_function") || has_child_kind(&decl, "function"))
                        && let Some(name_node) = decl.child_by_field_name("name")
                    {
                        push_entity(
                            entities,
                            &source[name_node.byte_range()],
                            EntityType::Function,
                            path,
                            &child,
                            parent_class,
                            source,
                        );
                    }
                }
            }
            "export_statement" => {
                extract_js_like(&child, path, source, parent_class, entities, imports);
            }
            _ => {
                if parent_class.is_none() {
                    extract_js_like(&child, path, source, None, entities, imports);
                }
            }
        }
    }
}

fn has_child_kind(node: &tree_sitter::Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|c| c.kind() == kind)
}

fn collect_js_import_names(node: &tree_sitter::Node, source: &str, symbols: &mut Vec<String>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "identifier" => symbols.push(source[child.byte_range()].to_string()),
            "import_specifier" => {
                if let Some(name) = child.child_by_field_name("name") {
                    symbols.push(source[name.byte_range()].to_string());
                }
            }
            _ => collect_js_import_names(&child, source, symbols),
        }
    }
}

// ---------------------------------------------------------------------------
// Go
// ---------------------------------------------------------------------------

fn extract_go(
    node: &tree_sitter::Node,
    path: &Path,
    source: &str,
    entities: &mut Vec<RawEntity>,
    imports: &mut Vec<RawImport>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_declaration" => collect_go_imports(&child, source, imports),
            "function_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    push_entity(
                        entities,
                        &source[name_node.byte_range()],
                        EntityType::Function,
                        path,
                        &child,
                        None,
                        source,
                    );
                }
            }
            "method_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let receiver = child
                        .child_by_field_name("receiver")
                        .and_then(|r| {
                            let mut c = r.walk();
                            r.children(&mut c).find(|n| n.kind() == "parameter_declaration")
                        })
                        .and_then(|pd| pd.child_by_field_name("type"))
                        .map(|t| source[t.byte_range()].trim_start_matches('*').to_string());
                    push_entity(
                        entities,
                        &source[name_node.byte_range()],
                        EntityType::Method,
                        path,
                        &child,
                        receiver.as_deref(),
                        source,
                    );
                }
            }
            "type_declaration" => {
                let mut tc = child.walk();
                for spec in child.children(&mut tc) {
                    if spec.kind() == "type_spec"
                        && let Some(name_node) = spec.child_by_field_name("name")
                    {
                        push_entity(
                            entities,
                            &source[name_node.byte_range()],
                            EntityType::Class,
                            path,
                            &spec,
                            None,
                            source,
                        );
                    }
                }
            }
            _ => {}
        }
    }
}

fn collect_go_imports(node: &tree_sitter::Node, source: &str, imports: &mut Vec<RawImport>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_spec" => {
                if let Some(pn) = child.child_by_field_name("path") {
                    imports.push(RawImport {
                        module: source[pn.byte_range()].trim_matches('"').to_string(),
                        symbols: Vec::new(),
                    });
                }
            }
            "import_spec_list" => collect_go_imports(&child, source, imports),
            "interpreted_string_literal" => imports.push(RawImport {
                module: source[child.byte_range()].trim_matches('"').to_string(),
                symbols: Vec::new(),
            }),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Java
// ---------------------------------------------------------------------------

fn extract_java(
    node: &tree_sitter::Node,
    path: &Path,
    source: &str,
    parent_class: Option<&str>,
    entities: &mut Vec<RawEntity>,
    imports: &mut Vec<RawImport>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_declaration" => {
                let text = source[child.byte_range()].trim().to_string();
                let module = text
                    .trim_start_matches("import ")
                    .trim_start_matches("static ")
                    .trim_end_matches(';')
                    .trim()
                    .to_string();
                let parts: Vec<&str> = module.rsplitn(2, '.').collect();
                if parts.len() == 2 {
                    imports.push(RawImport {
                        module: parts[1].to_string(),
                        symbols: vec![parts[0].to_string()],
                    });
                } else {
                    imports.push(RawImport { module, symbols: Vec::new() });
                }
            }
            "class_declaration" | "interface_declaration" | "enum_declaration" | "record_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let class_name = source[name_node.byte_range()].to_string();
                    push_entity(entities, &class_name, EntityType::Class, path, &child, parent_class, source);
                    if let Some(body) = child.child_by_field_name("body") {
                        extract_java(&body, path, source, Some(&class_name), entities, imports);
                    }
                }
            }
            "method_declaration" | "constructor_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    push_entity(
                        entities,
                        &source[name_node.byte_range()],
                        EntityType::Method,
                        path,
                        &child,
                        parent_class,
                        source,
                    );
                }
            }
            _ => extract_java(&child, path, source, parent_class, entities, imports),
        }
    }
}

// ---------------------------------------------------------------------------
// C / C++
// ---------------------------------------------------------------------------

/// Extract function name from a C/C++ declarator (handles nested function_declarator).
pub fn extract_c_declarator_name(node: &tree_sitter::Node, source: &str) -> Option<String> {
    match node.kind() {
        "function_declarator" => node
            .child_by_field_name("declarator")
            .and_then(|d| extract_c_declarator_name(&d, source)),
        "pointer_declarator" => node
            .child_by_field_name("declarator")
            .and_then(|d| extract_c_declarator_name(&d, source)),
        "identifier" | "field_identifier" => Some(source[node.byte_range()].to_string()),
        "qualified_identifier" => {
            let mut cursor = node.walk();
            node.children(&mut cursor)
                .filter(|c| c.kind() == "identifier" || c.kind() == "destructor_name")
                .last()
                .map(|n| source[n.byte_range()].to_string())
        }
        _ => None,
    }
}

fn extract_c_like(
    node: &tree_sitter::Node,
    path: &Path,
    source: &str,
    parent_class: Option<&str>,
    entities: &mut Vec<RawEntity>,
    imports: &mut Vec<RawImport>,
    lang: Language,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "preproc_include" => {
                if let Some(path_node) = child.child_by_field_name("path") {
                    let include_path = source[path_node.byte_range()]
                        .trim_matches(|c: char| c == '"' || c == '<' || c == '>')
                        .to_string();
                    imports.push(RawImport {
                        module: include_path,
                        symbols: Vec::new(),
                    });
                }
            }
            "function_definition" => {
                if let Some(decl) = child.child_by_field_name("declarator")
                    && let Some(name) = extract_c_declarator_name(&decl, source)
                {
                    let kind = if parent_class.is_some() {
                        EntityType::Method
                    } else {
                        EntityType::Function
                    };
                    push_entity(entities, &name, kind, path, &child, parent_class, source);
                }
            }
            "struct_specifier" | "class_specifier" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = source[name_node.byte_range()].to_string();
                    push_entity(entities, &name, EntityType::Class, path, &child, None, source);
                    if lang == Language::Cpp
                        && let Some(body) = child.child_by_field_name("body")
                    {
                        extract_c_like(&body, path, source, Some(&name), entities, imports, lang);
                    }
                }
            }
            _ => {
                if parent_class.is_none() {
                    extract_c_like(&child, path, source, None, entities, imports, lang);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// C#
// ---------------------------------------------------------------------------

fn extract_csharp(
    node: &tree_sitter::Node,
    path: &Path,
    source: &str,
    parent_class: Option<&str>,
    entities: &mut Vec<RawEntity>,
    imports: &mut Vec<RawImport>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "using_directive" => {
                let text = source[child.byte_range()].trim().to_string();
                let module = text
                    .trim_start_matches("global ")
                    .trim_start_matches("using ")
                    .trim_start_matches("static ")
                    .trim_end_matches(';')
                    .trim()
                    .to_string();
                if !module.contains('=') {
                    imports.push(RawImport { module, symbols: Vec::new() });
                }
            }
            "class_declaration" | "interface_declaration" | "struct_declaration" | "enum_declaration" | "record_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let class_name = source[name_node.byte_range()].to_string();
                    push_entity(entities, &class_name, EntityType::Class, path, &child, parent_class, source);
                    if let Some(body) = child.child_by_field_name("body") {
                        extract_csharp(&body, path, source, Some(&class_name), entities, imports);
                    }
                }
            }
            "method_declaration" | "constructor_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    push_entity(
                        entities,
                        &source[name_node.byte_range()],
                        EntityType::Method,
                        path,
                        &child,
                        parent_class,
                        source,
                    );
                }
            }
            "namespace_declaration" | "file_scoped_namespace_declaration" => {
                extract_csharp(&child, path, source, parent_class, entities, imports);
            }
            _ => {
                if parent_class.is_none() {
                    extract_csharp(&child, path, source, None, entities, imports);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Ruby
// ---------------------------------------------------------------------------

fn extract_ruby(
    node: &tree_sitter::Node,
    path: &Path,
    source: &str,
    parent_class: Option<&str>,
    entities: &mut Vec<RawEntity>,
    imports: &mut Vec<RawImport>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "call" => {
                if let Some(method_node) = child.child_by_field_name("method") {
                    let method_name = &source[method_node.byte_range()];
                    if (method_name == "require" || method_name == "require_relative")
                        && let Some(args) = child.child_by_field_name("arguments")
                    {
                        let text = source[args.byte_range()]
                            .trim_matches(|c: char| c == '(' || c == ')' || c == '\'' || c == '"' || c == ' ')
                            .to_string();
                        if !text.is_empty() {
                            imports.push(RawImport { module: text, symbols: Vec::new() });
                        }
                    }
                }
            }
            "class" | "module" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let class_name = source[name_node.byte_range()].to_string();
                    push_entity(entities, &class_name, EntityType::Class, path, &child, None, source);
                    if let Some(body) = child.child_by_field_name("body") {
                        extract_ruby(&body, path, source, Some(&class_name), entities, imports);
                    }
                }
            }
            "method" | "singleton_method" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let kind = if parent_class.is_some() {
                        EntityType::Method
                    } else {
                        EntityType::Function
                    };
                    push_entity(
                        entities,
                        &source[name_node.byte_range()],
                        kind,
                        path,
                        &child,
                        parent_class,
                        source,
                    );
                }
            }
            _ => extract_ruby(&child, path, source, parent_class, entities, imports),
        }
    }
}

// ---------------------------------------------------------------------------
// Kotlin
// ---------------------------------------------------------------------------

fn extract_kotlin(
    node: &tree_sitter::Node,
    path: &Path,
    source: &str,
    parent_class: Option<&str>,
    entities: &mut Vec<RawEntity>,
    imports: &mut Vec<RawImport>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import" => {
                let text = source[child.byte_range()].trim().to_string();
                let module = text.trim_start_matches("import ").trim().to_string();
                if !module.is_empty() {
                    imports.push(RawImport { module, symbols: Vec::new() });
                }
            }
            "class_declaration" | "object_declaration" | "interface_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let class_name = source[name_node.byte_range()].to_string();
                    push_entity(entities, &class_name, EntityType::Class, path, &child, None, source);
                    let body = child.child_by_field_name("body").or_else(|| {
                        let mut c = child.walk();
                        child
                            .children(&mut c)
                            .find(|n| n.kind() == "class_body" || n.kind() == "enum_class_body")
                    });
                    if let Some(body) = body {
                        extract_kotlin(&body, path, source, Some(&class_name), entities, imports);
                    }
                }
            }
            "function_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let kind = if parent_class.is_some() {
                        EntityType::Method
                    } else {
                        EntityType::Function
                    };
                    push_entity(
                        entities,
                        &source[name_node.byte_range()],
                        kind,
                        path,
                        &child,
                        parent_class,
                        source,
                    );
                }
            }
            _ => extract_kotlin(&child, path, source, parent_class, entities, imports),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn python_function_and_class_are_extracted() {
        let src = "class Animal:\n    def speak(self):\n        pass\n\ndef main():\n    pass\n";
        let result = parse(&PathBuf::from("a.py"), src, Some(Language::Python));
        let names: Vec<_> = result.entities.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"Animal"));
        assert!(names.contains(&"speak"));
        assert!(names.contains(&"main"));
        let speak = result.entities.iter().find(|e| e.name == "speak").unwrap();
        assert_eq!(speak.entity_type, EntityType::Method);
        assert_eq!(speak.parent.as_deref(), Some("Animal"));
    }

    #[test]
    fn python_imports_are_captured() {
        let src = "from os import path, getenv\nimport sys\n";
        let result = parse(&PathBuf::from("a.py"), src, Some(Language::Python));
        assert_eq!(result.imports.len(), 2);
        assert_eq!(result.imports[0].module, "os");
        assert_eq!(result.imports[0].symbols, vec!["path", "getenv"]);
        assert_eq!(result.imports[1].module, "sys");
    }

    #[test]
    fn rust_impl_methods_are_scoped_to_type() {
        let src = "struct Dog;\nimpl Dog {\n    fn fetch(&self) {}\n}\n";
        let result = parse(&PathBuf::from("a.rs"), src, Some(Language::Rust));
        let fetch = result.entities.iter().find(|e| e.name == "fetch").unwrap();
        assert_eq!(fetch.parent.as_deref(), Some("Dog"));
        assert_eq!(fetch.qualified_name(), "Dog.fetch");
    }

    #[test]
    fn unknown_language_yields_empty_result() {
        let result = parse(&PathBuf::from("a.xyz"), "whatever", None);
        assert!(result.entities.is_empty());
        assert!(result.imports.is_empty());
        assert!(result.errors.is_empty());
        assert!(result.language.is_none());
    }

    #[test]
    fn empty_source_yields_empty_arrays() {
        let result = parse(&PathBuf::from("a.py"), "", Some(Language::Python));
        assert!(result.entities.is_empty());
        assert!(result.imports.is_empty());
    }

    #[test]
    fn malformed_source_does_not_panic_and_records_errors() {
        let src = "def broken(:\n    pass\n";
        let result = parse(&PathBuf::from("a.py"), src, Some(Language::Python));
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn go_method_receiver_becomes_parent() {
        let src = "package main\n\ntype Dog struct{}\n\nfunc (d *Dog) Bark() {}\n";
        let result = parse(&PathBuf::from("a.go"), src, Some(Language::Go));
        let bark = result.entities.iter().find(|e| e.name == "Bark").unwrap();
        assert_eq!(bark.parent.as_deref(), Some("Dog"));
    }
}
