//! Inheritance and interface-implementation extraction.

use crate::languages::Language;
use std::path::{Path, PathBuf};

/// Whether a relation is a true inheritance link or an interface/trait implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Inherit,
    Implement,
}

/// One child-to-parent relation.
#[derive(Debug, Clone)]
pub struct InheritanceRelation {
    pub child_file: PathBuf,
    pub child_class: String,
    pub parent_class: String,
    pub kind: RelationKind,
}

/// Extract inheritance/implementation relations from `source`.
pub fn extract_inheritance(path: &Path, source: &str, language: Option<Language>) -> Vec<InheritanceRelation> {
    let Some(language) = language else {
        return Vec::new();
    };
    if source.is_empty() {
        return Vec::new();
    }

    let mut parser = tree_sitter::Parser::new();
    if parser.set_language(&language.ts_language()).is_err() {
        return Vec::new();
    }
    let Some(tree) = parser.parse(source.as_bytes(), None) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    match language {
        Language::Python => walk_python(&tree.root_node(), path, source, &mut out),
        Language::Rust => walk_rust(&tree.root_node(), path, source, &mut out),
        Language::TypeScript | Language::JavaScript => walk_js_like(&tree.root_node(), path, source, &mut out),
        Language::Java => walk_java_like(&tree.root_node(), path, source, &mut out),
        Language::Kotlin | Language::CSharp => walk_heritage_heuristic(&tree.root_node(), path, source, &mut out),
        Language::Go => walk_go(&tree.root_node(), path, source, &mut out),
        Language::Ruby => walk_ruby(&tree.root_node(), path, source, &mut out),
        Language::C | Language::Cpp => walk_cpp(&tree.root_node(), path, source, &mut out),
    }
    out
}

fn push(
    out: &mut Vec<InheritanceRelation>,
    path: &Path,
    child: &str,
    parent: &str,
    kind: RelationKind,
) {
    out.push(InheritanceRelation {
        child_file: path.to_path_buf(),
        child_class: child.to_string(),
        parent_class: parent.to_string(),
        kind,
    });
}

fn walk_python(node: &tree_sitter::Node, path: &Path, source: &str, out: &mut Vec<InheritanceRelation>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "class_definition"
            && let Some(name_node) = child.child_by_field_name("name")
        {
            let class_name = &source[name_node.byte_range()];
            if let Some(superclasses) = child.child_by_field_name("superclasses") {
                let mut sc = superclasses.walk();
                for base in superclasses.children(&mut sc) {
                    if matches!(base.kind(), "identifier" | "attribute") {
                        push(out, path, class_name, &source[base.byte_range()], RelationKind::Inherit);
                    }
                }
            }
        }
        walk_python(&child, path, source, out);
    }
}

fn walk_rust(node: &tree_sitter::Node, path: &Path, source: &str, out: &mut Vec<InheritanceRelation>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "impl_item"
            && let Some(trait_node) = child.child_by_field_name("trait")
            && let Some(type_node) = child.child_by_field_name("type")
        {
            let trait_name = &source[trait_node.byte_range()];
            let struct_name = &source[type_node.byte_range()];
            push(out, path, struct_name, trait_name, RelationKind::Implement);
        }
        walk_rust(&child, path, source, out);
    }
}

fn walk_js_like(node: &tree_sitter::Node, path: &Path, source: &str, out: &mut Vec<InheritanceRelation>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "class_declaration"
            && let Some(name_node) = child.child_by_field_name("name")
        {
            let class_name = &source[name_node.byte_range()];
            let mut hc = child.walk();
            for heritage in child.children(&mut hc) {
                match heritage.kind() {
                    "class_heritage" => {
                        let mut inner = heritage.walk();
                        for part in heritage.children(&mut inner) {
                            match part.kind() {
                                "extends_clause" => {
                                    collect_js_heritage(&part, source, class_name, path, RelationKind::Inherit, out)
                                }
                                "implements_clause" => collect_js_heritage(
                                    &part,
                                    source,
                                    class_name,
                                    path,
                                    RelationKind::Implement,
                                    out,
                                ),
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        walk_js_like(&child, path, source, out);
    }
}

fn collect_js_heritage(
    node: &tree_sitter::Node,
    source: &str,
    class_name: &str,
    path: &Path,
    kind: RelationKind,
    out: &mut Vec<InheritanceRelation>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(child.kind(), "identifier" | "type_identifier" | "member_expression") {
            push(out, path, class_name, &source[child.byte_range()], kind);
        }
    }
}

fn walk_java_like(node: &tree_sitter::Node, path: &Path, source: &str, out: &mut Vec<InheritanceRelation>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(
            child.kind(),
            "class_declaration" | "interface_declaration" | "class_body"
        ) && let Some(name_node) = child.child_by_field_name("name")
        {
            let class_name = &source[name_node.byte_range()].to_string();
            if let Some(superclass) = child.child_by_field_name("superclass") {
                let name = extract_java_type_name(&superclass, source);
                push(out, path, class_name, &name, RelationKind::Inherit);
            }
            if let Some(interfaces) = child.child_by_field_name("interfaces") {
                let mut ic = interfaces.walk();
                for iface in interfaces.children(&mut ic) {
                    if iface.kind() == "type_list" {
                        let mut tc = iface.walk();
                        for t in iface.children(&mut tc) {
                            if t.kind().ends_with("type") || t.kind() == "type_identifier" {
                                push(out, path, class_name, &source[t.byte_range()], RelationKind::Implement);
                            }
                        }
                    }
                }
            }
        }
        walk_java_like(&child, path, source, out);
    }
}

/// Heuristic heritage scan for grammars (Kotlin, C#) whose exact field names vary by grammar
/// version: looks for a child whose kind names a base/heritage/delegation list and harvests
/// identifier-like tokens out of it. A node kind mentioning "interface" is tagged `Implement`,
/// everything else `Inherit`.
fn walk_heritage_heuristic(node: &tree_sitter::Node, path: &Path, source: &str, out: &mut Vec<InheritanceRelation>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let is_type_decl = matches!(
            child.kind(),
            "class_declaration" | "object_declaration" | "interface_declaration" | "struct_declaration" | "record_declaration"
        );
        if is_type_decl
            && let Some(name_node) = child.child_by_field_name("name")
        {
            let class_name = source[name_node.byte_range()].to_string();
            let mut hc = child.walk();
            for part in child.children(&mut hc) {
                let kind = part.kind();
                if kind.contains("base") || kind.contains("heritage") || kind.contains("delegation") || kind == "super_interfaces" {
                    let relation_kind = if kind.contains("interface") {
                        RelationKind::Implement
                    } else {
                        RelationKind::Inherit
                    };
                    collect_heritage_identifiers(&part, source, &class_name, path, relation_kind, out);
                }
            }
        }
        walk_heritage_heuristic(&child, path, source, out);
    }
}

fn collect_heritage_identifiers(
    node: &tree_sitter::Node,
    source: &str,
    class_name: &str,
    path: &Path,
    kind: RelationKind,
    out: &mut Vec<InheritanceRelation>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "identifier" | "type_identifier" | "generic_name" | "qualified_name" => {
                push(out, path, class_name, &source[child.byte_range()], kind);
            }
            "constructor_invocation" | "delegation_specifier" | "primary_constructor_base_type" | "base_type" => {
                // e.g. Kotlin `Animal()`: strip the trailing call parens.
                let text = source[child.byte_range()].to_string();
                let name = text.split('(').next().unwrap_or(&text).trim();
                if !name.is_empty() {
                    push(out, path, class_name, name, kind);
                }
            }
            _ => collect_heritage_identifiers(&child, source, class_name, path, kind, out),
        }
    }
}

fn extract_java_type_name(node: &tree_sitter::Node, source: &str) -> String {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .find(|c| c.kind() == "type_identifier" || c.kind() == "generic_type" || c.kind() == "scoped_type_identifier")
        .map(|c| source[c.byte_range()].to_string())
        .unwrap_or_else(|| source[node.byte_range()].to_string())
}

fn walk_go(node: &tree_sitter::Node, path: &Path, source: &str, out: &mut Vec<InheritanceRelation>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "type_declaration" {
            let mut tc = child.walk();
            for spec in child.children(&mut tc) {
                if spec.kind() == "type_spec"
                    && let Some(name_node) = spec.child_by_field_name("name")
                    && let Some(type_node) = spec.child_by_field_name("type")
                    && type_node.kind() == "struct_type"
                {
                    let struct_name = &source[name_node.byte_range()];
                    if let Some(field_list) = type_node.child_by_field_name("body") {
                        let mut fc = field_list.walk();
                        for field in field_list.children(&mut fc) {
                            if field.kind() == "field_declaration" && field.child_by_field_name("name").is_none() {
                                // embedded (anonymous) field: the type itself is the parent
                                if let Some(embedded_type) = field.child_by_field_name("type") {
                                    push(
                                        out,
                                        path,
                                        struct_name,
                                        source[embedded_type.byte_range()].trim_start_matches('*'),
                                        RelationKind::Inherit,
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }
        walk_go(&child, path, source, out);
    }
}

fn walk_ruby(node: &tree_sitter::Node, path: &Path, source: &str, out: &mut Vec<InheritanceRelation>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "class"
            && let Some(name_node) = child.child_by_field_name("name")
            && let Some(superclass_node) = child.child_by_field_name("superclass")
        {
            let class_name = &source[name_node.byte_range()];
            let parent = source[superclass_node.byte_range()].trim_start_matches('<').trim();
            push(out, path, class_name, parent, RelationKind::Inherit);
        }
        walk_ruby(&child, path, source, out);
    }
}

fn walk_cpp(node: &tree_sitter::Node, path: &Path, source: &str, out: &mut Vec<InheritanceRelation>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "class_specifier"
            && let Some(name_node) = child.child_by_field_name("name")
        {
            let class_name = &source[name_node.byte_range()];
            if let Some(base_clause) = find_child_kind(&child, "base_class_clause") {
                let mut bc = base_clause.walk();
                for base in base_clause.children(&mut bc) {
                    if matches!(base.kind(), "type_identifier" | "qualified_identifier") {
                        push(out, path, class_name, &source[base.byte_range()], RelationKind::Inherit);
                    }
                }
            }
        }
        walk_cpp(&child, path, source, out);
    }
}

fn find_child_kind<'a>(node: &tree_sitter::Node<'a>, kind: &str) -> Option<tree_sitter::Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}
