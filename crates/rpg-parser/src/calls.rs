//! Call-site extraction with receiver classification.

use crate::languages::Language;
use std::path::{Path, PathBuf};

/// How a call's receiver relates to the enclosing entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverKind {
    /// A bare call: `foo()`.
    None,
    /// `self.foo()` / `this.foo()`.
    SelfRef,
    /// `super.foo()` / `super().foo()`.
    Super,
    /// `obj.foo()` where `obj` is some other expression.
    Variable,
}

/// A single call site.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub caller_file: PathBuf,
    pub caller_entity: Option<String>,
    pub callee_symbol: String,
    pub line: Option<u32>,
    pub receiver: Option<String>,
    pub receiver_kind: ReceiverKind,
}

/// A lexical scope (function/method body) used to attribute calls to their caller.
pub struct ScopeSpan {
    pub name: String,
    pub start_row: usize,
    pub end_row: usize,
}

/// Extract all call sites in `source`, attributing each to the innermost scope in `scopes`.
///
/// Extraction is pure and stateless: it only reads `source`/`scopes` and returns a fresh vector.
pub fn extract_calls(
    path: &Path,
    source: &str,
    language: Option<Language>,
    scopes: &[ScopeSpan],
) -> Vec<CallSite> {
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

    let mut sites = Vec::new();
    walk_for_calls(&tree.root_node(), path, source, language, scopes, &mut sites);
    sites
}

fn enclosing_scope<'a>(scopes: &'a [ScopeSpan], row: usize) -> Option<&'a ScopeSpan> {
    scopes
        .iter()
        .filter(|s| s.start_row <= row && row <= s.end_row)
        .min_by_key(|s| s.end_row - s.start_row)
}

fn walk_for_calls(
    node: &tree_sitter::Node,
    path: &Path,
    source: &str,
    language: Language,
    scopes: &[ScopeSpan],
    out: &mut Vec<CallSite>,
) {
    let call_kinds: &[&str] = match language {
        Language::Python => &["call"],
        Language::Rust => &["call_expression"],
        Language::TypeScript | Language::JavaScript => &["call_expression"],
        Language::Go => &["call_expression"],
        Language::Java | Language::Kotlin => &["method_invocation", "call_expression"],
        Language::C | Language::Cpp => &["call_expression"],
        Language::CSharp => &["invocation_expression"],
        Language::Ruby => &["call", "method_call"],
    };

    if call_kinds.contains(&node.kind())
        && let Some(site) = classify_call(node, path, source, language, scopes)
    {
        out.push(site);
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_for_calls(&child, path, source, language, scopes, out);
    }
}

fn classify_call(
    node: &tree_sitter::Node,
    path: &Path,
    source: &str,
    language: Language,
    scopes: &[ScopeSpan],
) -> Option<CallSite> {
    let callee_node = node.child_by_field_name("function").or_else(|| {
        // Ruby/Rust grammars don't always expose a `function` field uniformly.
        let mut cursor = node.walk();
        node.children(&mut cursor).next()
    })?;

    let row = node.start_position().row;
    let caller_entity = enclosing_scope(scopes, row).map(|s| s.name.clone());
    let line = Some(node.start_position().row as u32 + 1);

    let (callee_symbol, receiver, receiver_kind) = match callee_node.kind() {
        "attribute" | "field_expression" | "member_expression" => {
            let object = callee_node.child_by_field_name("object").or_else(|| {
                callee_node.child_by_field_name("value")
            })?;
            let attr = callee_node
                .child_by_field_name("attribute")
                .or_else(|| callee_node.child_by_field_name("field"))
                .or_else(|| callee_node.child_by_field_name("property"))?;
            let callee = source[attr.byte_range()].to_string();
            let object_text = source[object.byte_range()].trim();
            classify_receiver(object_text, &object, callee)
        }
        "scoped_identifier" | "scoped_type_identifier" if language == Language::Rust => {
            let full = &source[callee_node.byte_range()];
            (full.to_string(), None, ReceiverKind::None)
        }
        "field_access" if language == Language::Kotlin || language == Language::Java => {
            let object = callee_node.child_by_field_name("object")?;
            let field = callee_node.child_by_field_name("field")?;
            let callee = source[field.byte_range()].to_string();
            let object_text = source[object.byte_range()].trim();
            classify_receiver(object_text, &object, callee)
        }
        _ => {
            let callee = source[callee_node.byte_range()].to_string();
            (callee, None, ReceiverKind::None)
        }
    };

    Some(CallSite {
        caller_file: path.to_path_buf(),
        caller_entity,
        callee_symbol,
        line,
        receiver,
        receiver_kind,
    })
}

fn classify_receiver(
    object_text: &str,
    object_node: &tree_sitter::Node,
    callee: String,
) -> (String, Option<String>, ReceiverKind) {
    match object_text {
        "self" | "this" => (callee, Some(object_text.to_string()), ReceiverKind::SelfRef),
        "super" => (callee, Some("super".to_string()), ReceiverKind::Super),
        _ if object_node.kind() == "call" || object_node.kind() == "call_expression" => {
            // Chained call `a().b()`: `b`'s receiver is the preceding call expression itself.
            (callee, Some(object_text.to_string()), ReceiverKind::Variable)
        }
        _ => (callee, Some(object_text.to_string()), ReceiverKind::Variable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scope(name: &str, start: usize, end: usize) -> ScopeSpan {
        ScopeSpan {
            name: name.to_string(),
            start_row: start,
            end_row: end,
        }
    }

    #[test]
    fn bare_call_has_no_receiver() {
        let src = "def main():\n    helper()\n";
        let sites = extract_calls(&PathBuf::from("a.py"), src, Some(Language::Python), &[scope("main", 0, 1)]);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].receiver_kind, ReceiverKind::None);
        assert_eq!(sites[0].callee_symbol, "helper");
        assert_eq!(sites[0].caller_entity.as_deref(), Some("main"));
    }

    #[test]
    fn self_call_is_classified_self() {
        let src = "class Dog:\n    def fetch(self):\n        self.move_to(1)\n";
        let sites = extract_calls(&PathBuf::from("a.py"), src, Some(Language::Python), &[scope("fetch", 1, 2)]);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].receiver_kind, ReceiverKind::SelfRef);
        assert_eq!(sites[0].callee_symbol, "move_to");
    }

    #[test]
    fn variable_call_is_classified_variable() {
        let src = "def main():\n    x = Dog()\n    x.fetch()\n";
        let sites = extract_calls(&PathBuf::from("a.py"), src, Some(Language::Python), &[scope("main", 0, 2)]);
        let fetch = sites.iter().find(|s| s.callee_symbol == "fetch").unwrap();
        assert_eq!(fetch.receiver_kind, ReceiverKind::Variable);
        assert_eq!(fetch.receiver.as_deref(), Some("x"));
    }

    #[test]
    fn chained_calls_emit_two_sites() {
        let src = "def main():\n    a().b()\n";
        let sites = extract_calls(&PathBuf::from("a.py"), src, Some(Language::Python), &[scope("main", 0, 1)]);
        let names: Vec<_> = sites.iter().map(|s| s.callee_symbol.as_str()).collect();
        assert!(names.contains(&"a"));
        assert!(names.contains(&"b"));
    }

    #[test]
    fn unknown_language_yields_no_calls() {
        assert!(extract_calls(&PathBuf::from("a.xyz"), "whatever()", None, &[]).is_empty());
    }
}
