//! Type Inferrer — resolves a qualified call's receiver to a concrete class so that
//! `self.move()`/`super().speak()`/`x.fetch()` can be attributed to the method that actually
//! runs, not just the bare method name.

use rpg_parser::ast::RawEntity;
use rpg_parser::calls::{CallSite, ReceiverKind};
use rpg_parser::inheritance::InheritanceRelation;
use rpg_parser::languages::Language;
use std::collections::{BTreeMap, BTreeSet};

/// Method names common enough across unrelated classes that a receiver-less or unqualified
/// match against them is more likely noise than signal.
const COMMON_METHOD_BLOCKLIST: &[&str] = &[
    "get", "set", "add", "remove", "update", "delete", "create", "find", "load", "save", "init",
    "run", "start", "stop", "close", "open", "read", "write", "process", "handle", "execute",
    "build", "parse", "format", "convert", "check", "validate", "reset", "clear", "flush",
];

/// Per-repository class hierarchy and method membership, used to resolve `self`/`super`/variable
/// calls to the class that actually defines the invoked method.
pub struct TypeInferrer {
    /// class -> direct parents, in declaration order (first base listed = primary base).
    parents: BTreeMap<String, Vec<String>>,
    /// class -> method names defined directly on it.
    methods: BTreeMap<String, BTreeSet<String>>,
}

impl TypeInferrer {
    pub fn build(entities: &[RawEntity], inheritance: &[InheritanceRelation]) -> Self {
        let mut methods: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for entity in entities {
            if let Some(class) = &entity.parent {
                methods.entry(class.clone()).or_default().insert(entity.name.clone());
            }
        }

        let mut parents: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for rel in inheritance {
            parents.entry(rel.child_class.clone()).or_default().push(rel.parent_class.clone());
        }

        Self { parents, methods }
    }

    /// Linearize `class`'s ancestry breadth-first, starting with `class` itself. Cycle-safe: a
    /// class already visited is never expanded again, so a cycle terminates and each member
    /// appears exactly once.
    pub fn mro_chain(&self, class: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut visited = BTreeSet::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(class.to_string());
        visited.insert(class.to_string());

        while let Some(current) = queue.pop_front() {
            chain.push(current.clone());
            if let Some(bases) = self.parents.get(&current) {
                for base in bases {
                    if visited.insert(base.clone()) {
                        queue.push_back(base.clone());
                    }
                }
            }
        }
        chain
    }

    fn class_defining(&self, chain: &[String], method: &str) -> Option<String> {
        chain
            .iter()
            .find(|class| self.methods.get(*class).is_some_and(|m| m.contains(method)))
            .cloned()
    }

    /// Resolve a call site to `"Class.method"`, given the class enclosing the call (`None` for
    /// free functions) and, for `Variable` receivers, the enclosing entity's source text and
    /// language so a local variable or attribute's declared type can be inferred.
    pub fn resolve_qualified_call(
        &self,
        call: &CallSite,
        enclosing_class: Option<&str>,
        enclosing_source: &str,
        language: Language,
    ) -> Option<String> {
        match call.receiver_kind {
            ReceiverKind::None => None,
            ReceiverKind::SelfRef => {
                let class = enclosing_class?;
                let chain = self.mro_chain(class);
                let owner = self.class_defining(&chain, &call.callee_symbol)?;
                Some(format!("{owner}.{}", call.callee_symbol))
            }
            ReceiverKind::Super => {
                let class = enclosing_class?;
                let chain = self.mro_chain(class);
                // Skip `class` itself: `super` only ever looks at ancestors.
                let owner = self.class_defining(&chain[1..], &call.callee_symbol)?;
                Some(format!("{owner}.{}", call.callee_symbol))
            }
            ReceiverKind::Variable => {
                let receiver = call.receiver.as_deref()?;
                let var_type = infer_local_var_type(enclosing_source, receiver, language)
                    .or_else(|| infer_attribute_type(enclosing_source, receiver, language));

                if let Some(var_type) = &var_type {
                    let chain = self.mro_chain(var_type);
                    if let Some(owner) = self.class_defining(&chain, &call.callee_symbol) {
                        return Some(format!("{owner}.{}", call.callee_symbol));
                    }
                }

                // No declared type, or the type's own MRO doesn't define the method: fall back to
                // a repo-wide search, but only trust it when exactly one class declares the method
                // and it isn't one of the common names too ambiguous to guess at blind.
                let owner = self.fuzzy_global_owner(&call.callee_symbol)?;
                Some(format!("{owner}.{}", call.callee_symbol))
            }
        }
    }

    /// Search every known class for one declaring `method`, ignoring the receiver's inferred
    /// type entirely. Returns `None` if the method is blocklisted or more than one class declares
    /// it — an ambiguous or noisy match is worse than no match.
    fn fuzzy_global_owner(&self, method: &str) -> Option<String> {
        if COMMON_METHOD_BLOCKLIST.contains(&method) {
            return None;
        }
        let mut found: Option<&String> = None;
        for (class, methods) in &self.methods {
            if methods.contains(method) {
                if found.is_some() {
                    return None;
                }
                found = Some(class);
            }
        }
        found.cloned()
    }
}

/// Best-effort scan for a local variable's constructed type from nearby assignment syntax.
/// Python and TypeScript/JavaScript/Java patterns are recognized; Rust and Go have no stable
/// textual convention for this (ownership/generics make a line-local guess unreliable) and
/// always return `None`.
fn infer_local_var_type(source: &str, var_name: &str, language: Language) -> Option<String> {
    for line in source.lines() {
        let line = line.trim();
        match language {
            Language::Python => {
                let prefix = format!("{var_name} = ");
                if let Some(rest) = line.strip_prefix(&prefix) {
                    return constructor_type_name(rest);
                }
            }
            Language::TypeScript | Language::JavaScript => {
                for keyword in ["const ", "let ", "var "] {
                    let prefix = format!("{keyword}{var_name} = new ");
                    if let Some(rest) = line.strip_prefix(&prefix) {
                        return constructor_type_name(rest);
                    }
                }
            }
            Language::Java | Language::CSharp | Language::Kotlin => {
                if let Some(idx) = line.find(&format!(" {var_name} = new ")) {
                    let rest = &line[idx + format!(" {var_name} = new ").len()..];
                    return constructor_type_name(rest);
                }
            }
            Language::Rust | Language::Go | Language::C | Language::Cpp | Language::Ruby => {
                return None;
            }
        }
    }
    None
}

/// Best-effort scan for an attribute's constructed type from `self.attr = Type(...)` /
/// `this.attr = new Type(...)` style assignment, typically found in a constructor.
fn infer_attribute_type(source: &str, attr_name: &str, language: Language) -> Option<String> {
    for line in source.lines() {
        let line = line.trim();
        match language {
            Language::Python => {
                let prefix = format!("self.{attr_name} = ");
                if let Some(rest) = line.strip_prefix(&prefix) {
                    return constructor_type_name(rest);
                }
            }
            Language::TypeScript | Language::JavaScript | Language::Java | Language::Kotlin => {
                let prefix = format!("this.{attr_name} = new ");
                if let Some(rest) = line.strip_prefix(&prefix) {
                    return constructor_type_name(rest);
                }
            }
            Language::Rust | Language::Go | Language::CSharp | Language::C | Language::Cpp | Language::Ruby => {
                return None;
            }
        }
    }
    None
}

/// Pull a bare type name off the start of a constructor-call expression: `Dog(...)` -> `Dog`.
fn constructor_type_name(rest: &str) -> Option<String> {
    let name: String = rest.chars().take_while(|c| c.is_alphanumeric() || *c == '_').collect();
    if name.is_empty() { None } else { Some(name) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpg_core::graph::EntityType;
    use std::path::PathBuf;

    fn method(name: &str, parent: &str) -> RawEntity {
        RawEntity {
            name: name.to_string(),
            entity_type: EntityType::Method,
            file: PathBuf::from("a.py"),
            line_start: 1,
            line_end: 1,
            parent: Some(parent.to_string()),
            source_code: String::new(),
        }
    }

    fn call(receiver: Option<&str>, kind: ReceiverKind, callee: &str) -> CallSite {
        CallSite {
            caller_file: PathBuf::from("a.py"),
            caller_entity: Some("fetch".to_string()),
            callee_symbol: callee.to_string(),
            line: Some(3),
            receiver: receiver.map(String::from),
            receiver_kind: kind,
        }
    }

    fn rel(child: &str, parent: &str) -> InheritanceRelation {
        InheritanceRelation {
            child_file: PathBuf::from("a.py"),
            child_class: child.to_string(),
            parent_class: parent.to_string(),
            kind: rpg_parser::inheritance::RelationKind::Inherit,
        }
    }

    #[test]
    fn mro_chain_is_cycle_safe() {
        let inferrer = TypeInferrer::build(&[], &[rel("A", "B"), rel("B", "A")]);
        let chain = inferrer.mro_chain("A");
        assert_eq!(chain.len(), 2);
        assert!(chain.contains(&"A".to_string()));
        assert!(chain.contains(&"B".to_string()));
    }

    #[test]
    fn self_call_resolves_up_the_mro() {
        let entities = vec![method("speak", "Animal"), method("fetch", "Dog")];
        let inferrer = TypeInferrer::build(&entities, &[rel("Dog", "Animal")]);
        let site = call(Some("self"), ReceiverKind::SelfRef, "speak");
        let resolved = inferrer.resolve_qualified_call(&site, Some("Dog"), "", Language::Python);
        assert_eq!(resolved.as_deref(), Some("Animal.speak"));
    }

    #[test]
    fn super_call_skips_the_enclosing_class() {
        let entities = vec![method("speak", "Animal"), method("speak", "Dog")];
        let inferrer = TypeInferrer::build(&entities, &[rel("Dog", "Animal")]);
        let site = call(Some("super"), ReceiverKind::Super, "speak");
        let resolved = inferrer.resolve_qualified_call(&site, Some("Dog"), "", Language::Python);
        assert_eq!(resolved.as_deref(), Some("Animal.speak"));
    }

    #[test]
    fn variable_call_infers_from_local_assignment() {
        let entities = vec![method("fetch", "Dog")];
        let inferrer = TypeInferrer::build(&entities, &[]);
        let site = call(Some("x"), ReceiverKind::Variable, "fetch");
        let source = "def main():\n    x = Dog()\n    x.fetch()\n";
        let resolved = inferrer.resolve_qualified_call(&site, None, source, Language::Python);
        assert_eq!(resolved.as_deref(), Some("Dog.fetch"));
    }

    #[test]
    fn blocklisted_method_on_unknown_receiver_does_not_resolve() {
        let inferrer = TypeInferrer::build(&[], &[]);
        let site = call(Some("x"), ReceiverKind::Variable, "get");
        let resolved = inferrer.resolve_qualified_call(&site, None, "x = Widget()\n", Language::Python);
        assert!(resolved.is_none());
    }

    #[test]
    fn rust_variable_inference_is_not_attempted() {
        let inferrer = TypeInferrer::build(&[], &[]);
        let site = call(Some("x"), ReceiverKind::Variable, "fetch");
        let resolved = inferrer.resolve_qualified_call(&site, None, "let x = Dog::new();\n", Language::Rust);
        assert!(resolved.is_none());
    }

    #[test]
    fn rust_variable_call_falls_back_to_global_fuzzy_when_no_type_is_inferred() {
        let entities = vec![method("fetch", "Dog")];
        let inferrer = TypeInferrer::build(&entities, &[]);
        let site = call(Some("x"), ReceiverKind::Variable, "fetch");
        let resolved = inferrer.resolve_qualified_call(&site, None, "let x = Dog::new();\n", Language::Rust);
        assert_eq!(resolved.as_deref(), Some("Dog.fetch"));
    }

    #[test]
    fn variable_call_resolves_blocklisted_method_through_its_types_mro() {
        let entities = vec![method("get", "Animal"), method("fetch", "Dog")];
        let inferrer = TypeInferrer::build(&entities, &[rel("Dog", "Animal")]);
        let site = call(Some("x"), ReceiverKind::Variable, "get");
        let source = "def main():\n    x = Dog()\n    x.get()\n";
        let resolved = inferrer.resolve_qualified_call(&site, None, source, Language::Python);
        assert_eq!(resolved.as_deref(), Some("Animal.get"));
    }

    #[test]
    fn variable_call_falls_back_to_global_fuzzy_when_method_is_outside_var_types_mro() {
        let entities = vec![method("fetch", "Dog"), method("quack", "Duck")];
        let inferrer = TypeInferrer::build(&entities, &[]);
        let site = call(Some("x"), ReceiverKind::Variable, "quack");
        let source = "def main():\n    x = Dog()\n    x.quack()\n";
        let resolved = inferrer.resolve_qualified_call(&site, None, source, Language::Python);
        assert_eq!(resolved.as_deref(), Some("Duck.quack"));
    }

    #[test]
    fn global_fuzzy_fallback_is_skipped_when_more_than_one_class_declares_the_method() {
        let entities = vec![method("fetch", "Dog"), method("fetch", "Cat")];
        let inferrer = TypeInferrer::build(&entities, &[]);
        let site = call(Some("x"), ReceiverKind::Variable, "fetch");
        let resolved = inferrer.resolve_qualified_call(&site, None, "let x = thing();\n", Language::Rust);
        assert!(resolved.is_none());
    }
}
