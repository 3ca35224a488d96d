use rpg_core::graph::EntityType;
use rpg_parser::ast::parse;
use rpg_parser::inheritance::{RelationKind, extract_inheritance};
use rpg_parser::languages::Language;
use std::path::Path;

const C_SRC: &str = r#"
#include <stdio.h>

int add(int a, int b) {
    return a + b;
}
"#;

#[test]
fn c_function_and_include_are_extracted() {
    let path = Path::new("math.c");
    let result = parse(path, C_SRC, Some(Language::C));
    assert!(result.errors.is_empty());
    let add = result.entities.iter().find(|e| e.name == "add").unwrap();
    assert_eq!(add.entity_type, EntityType::Function);
    assert!(result.imports.iter().any(|i| i.module == "stdio.h"));
}

const CPP_SRC: &str = r#"
class Animal {
public:
    virtual void speak();
};

class Dog : public Animal {
public:
    void speak() override {}
    void bark() {}
};
"#;

#[test]
fn cpp_class_methods_are_scoped() {
    let path = Path::new("dog.cpp");
    let result = parse(path, CPP_SRC, Some(Language::Cpp));
    let bark = result.entities.iter().find(|e| e.name == "bark").unwrap();
    assert_eq!(bark.entity_type, EntityType::Method);
    assert_eq!(bark.parent.as_deref(), Some("Dog"));
}

#[test]
fn cpp_base_class_is_inherit_relation() {
    let path = Path::new("dog.cpp");
    let rels = extract_inheritance(path, CPP_SRC, Some(Language::Cpp));
    assert!(rels.iter().any(|r| r.child_class == "Dog" && r.parent_class == "Animal" && r.kind == RelationKind::Inherit));
}
