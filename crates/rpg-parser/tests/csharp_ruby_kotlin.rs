use rpg_core::graph::EntityType;
use rpg_parser::ast::parse;
use rpg_parser::inheritance::{RelationKind, extract_inheritance};
use rpg_parser::languages::Language;
use std::path::Path;

const CSHARP_SRC: &str = r#"
using System;

namespace Animals {
    class Dog : Animal, IFetchable {
        public string Speak() {
            return "woof";
        }
    }
}
"#;

#[test]
fn csharp_class_and_method_are_extracted() {
    let path = Path::new("Dog.cs");
    let result = parse(path, CSHARP_SRC, Some(Language::CSharp));
    assert!(result.entities.iter().any(|e| e.name == "Dog" && e.entity_type == EntityType::Class));
    let speak = result.entities.iter().find(|e| e.name == "Speak").unwrap();
    assert_eq!(speak.parent.as_deref(), Some("Dog"));
    assert!(result.imports.iter().any(|i| i.module == "System"));
}

const RUBY_SRC: &str = r#"
require "animal"

class Dog < Animal
  def speak
    bark
  end

  def bark
    "woof"
  end
end
"#;

#[test]
fn ruby_class_and_methods_are_extracted() {
    let path = Path::new("dog.rb");
    let result = parse(path, RUBY_SRC, Some(Language::Ruby));
    assert!(result.entities.iter().any(|e| e.name == "Dog" && e.entity_type == EntityType::Class));
    let speak = result.entities.iter().find(|e| e.name == "speak").unwrap();
    assert_eq!(speak.entity_type, EntityType::Method);
    assert_eq!(speak.parent.as_deref(), Some("Dog"));
}

#[test]
fn ruby_superclass_is_inherit_relation() {
    let path = Path::new("dog.rb");
    let rels = extract_inheritance(path, RUBY_SRC, Some(Language::Ruby));
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].parent_class, "Animal");
    assert_eq!(rels[0].kind, RelationKind::Inherit);
}

const KOTLIN_SRC: &str = r#"
import animals.Animal

class Dog : Animal() {
    fun speak(): String {
        return bark()
    }

    fun bark(): String = "woof"
}
"#;

#[test]
fn kotlin_class_and_methods_are_extracted() {
    let path = Path::new("Dog.kt");
    let result = parse(path, KOTLIN_SRC, Some(Language::Kotlin));
    assert!(result.entities.iter().any(|e| e.name == "Dog" && e.entity_type == EntityType::Class));
    let speak = result.entities.iter().find(|e| e.name == "speak").unwrap();
    assert_eq!(speak.parent.as_deref(), Some("Dog"));
    assert!(result.imports.iter().any(|i| i.module == "animals.Animal"));
}
