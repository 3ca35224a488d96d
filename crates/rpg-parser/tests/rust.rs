use rpg_core::graph::EntityType;
use rpg_parser::ast::parse;
use rpg_parser::calls::{ReceiverKind, ScopeSpan, extract_calls};
use rpg_parser::inheritance::{RelationKind, extract_inheritance};
use rpg_parser::languages::Language;
use std::path::Path;

const SRC: &str = r#"
use std::fmt::Debug;

trait Animal {
    fn speak(&self) -> String;
}

struct Dog;

impl Animal for Dog {
    fn speak(&self) -> String {
        self.bark()
    }
}

impl Dog {
    fn bark(&self) -> String {
        "woof".to_string()
    }
}
"#;

#[test]
fn struct_trait_and_impl_methods_are_extracted() {
    let path = Path::new("dog.rs");
    let result = parse(path, SRC, Some(Language::Rust));
    assert!(result.errors.is_empty());

    assert!(result.entities.iter().any(|e| e.name == "Dog" && e.entity_type == EntityType::Class));
    assert!(result.entities.iter().any(|e| e.name == "Animal" && e.entity_type == EntityType::Class));

    let speak = result.entities.iter().find(|e| e.name == "speak").unwrap();
    assert_eq!(speak.entity_type, EntityType::Method);
    assert_eq!(speak.parent.as_deref(), Some("Dog"));

    let bark = result.entities.iter().find(|e| e.name == "bark").unwrap();
    assert_eq!(bark.parent.as_deref(), Some("Dog"));
}

#[test]
fn use_declaration_is_captured_as_import() {
    let path = Path::new("dog.rs");
    let result = parse(path, SRC, Some(Language::Rust));
    assert_eq!(result.imports.len(), 1);
    assert_eq!(result.imports[0].module, "std::fmt");
    assert_eq!(result.imports[0].symbols, vec!["Debug"]);
}

#[test]
fn impl_trait_for_struct_is_implement_relation() {
    let path = Path::new("dog.rs");
    let rels = extract_inheritance(path, SRC, Some(Language::Rust));
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].child_class, "Dog");
    assert_eq!(rels[0].parent_class, "Animal");
    assert_eq!(rels[0].kind, RelationKind::Implement);
}

#[test]
fn self_call_inside_trait_impl_is_tagged_self() {
    let path = Path::new("dog.rs");
    let scopes = vec![ScopeSpan {
        name: "Dog.speak".to_string(),
        start_row: 10,
        end_row: 12,
    }];
    let sites = extract_calls(path, SRC, Some(Language::Rust), &scopes);
    let site = sites.iter().find(|s| s.callee_symbol == "bark").unwrap();
    assert_eq!(site.receiver_kind, ReceiverKind::SelfRef);
}
