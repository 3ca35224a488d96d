use rpg_core::graph::EntityType;
use rpg_parser::ast::parse;
use rpg_parser::calls::{ReceiverKind, ScopeSpan, extract_calls};
use rpg_parser::inheritance::{RelationKind, extract_inheritance};
use rpg_parser::languages::Language;
use std::path::Path;

const SRC: &str = r#"
import { Animal } from "./animal";

class Dog extends Animal implements Fetchable {
  speak(): string {
    return this.bark();
  }

  bark(): string {
    return "woof";
  }
}

function main(): void {
  const d = new Dog();
  d.speak();
}
"#;

#[test]
fn class_methods_and_function_are_extracted() {
    let path = Path::new("dog.ts");
    let result = parse(path, SRC, Some(Language::TypeScript));
    assert!(result.errors.is_empty());

    let dog = result.entities.iter().find(|e| e.name == "Dog").unwrap();
    assert_eq!(dog.entity_type, EntityType::Class);

    let speak = result.entities.iter().find(|e| e.name == "speak").unwrap();
    assert_eq!(speak.entity_type, EntityType::Method);
    assert_eq!(speak.parent.as_deref(), Some("Dog"));

    let main = result.entities.iter().find(|e| e.name == "main").unwrap();
    assert_eq!(main.entity_type, EntityType::Function);
}

#[test]
fn named_import_captures_module_and_symbol() {
    let path = Path::new("dog.ts");
    let result = parse(path, SRC, Some(Language::TypeScript));
    assert_eq!(result.imports.len(), 1);
    assert_eq!(result.imports[0].module, "./animal");
    assert_eq!(result.imports[0].symbols, vec!["Animal"]);
}

#[test]
fn extends_and_implements_are_distinct_relation_kinds() {
    let path = Path::new("dog.ts");
    let rels = extract_inheritance(path, SRC, Some(Language::TypeScript));
    assert!(rels.iter().any(|r| r.parent_class == "Animal" && r.kind == RelationKind::Inherit));
    assert!(rels.iter().any(|r| r.parent_class == "Fetchable" && r.kind == RelationKind::Implement));
}

#[test]
fn this_call_is_tagged_self() {
    let path = Path::new("dog.ts");
    let scopes = vec![ScopeSpan {
        name: "Dog.speak".to_string(),
        start_row: 4,
        end_row: 6,
    }];
    let sites = extract_calls(path, SRC, Some(Language::TypeScript), &scopes);
    let site = sites.iter().find(|s| s.callee_symbol == "bark").unwrap();
    assert_eq!(site.receiver_kind, ReceiverKind::SelfRef);
}
