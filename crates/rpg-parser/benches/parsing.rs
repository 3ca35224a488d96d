use criterion::{Criterion, criterion_group, criterion_main};
use rpg_parser::ast;
use rpg_parser::calls::{self, ScopeSpan};
use rpg_parser::inheritance;
use rpg_parser::languages::Language;
use std::hint::black_box;
use std::path::Path;

const PYTHON_SAMPLE: &str = r#"
class Animal:
    def __init__(self, name):
        self.name = name

    def speak(self):
        raise NotImplementedError


class Dog(Animal):
    def speak(self):
        return self.bark()

    def bark(self):
        return "woof"


def main():
    d = Dog("Rex")
    print(d.speak())
"#;

fn bench_parse_python(c: &mut Criterion) {
    let path = Path::new("sample.py");
    c.bench_function("ast_parse_python", |b| {
        b.iter(|| ast::parse(path, black_box(PYTHON_SAMPLE), Some(Language::Python)))
    });
}

fn bench_extract_calls_python(c: &mut Criterion) {
    let path = Path::new("sample.py");
    let scopes = vec![
        ScopeSpan { name: "Animal.speak".into(), start_row: 5, end_row: 6 },
        ScopeSpan { name: "Dog.speak".into(), start_row: 10, end_row: 11 },
        ScopeSpan { name: "main".into(), start_row: 18, end_row: 20 },
    ];
    c.bench_function("extract_calls_python", |b| {
        b.iter(|| calls::extract_calls(path, black_box(PYTHON_SAMPLE), Some(Language::Python), &scopes))
    });
}

fn bench_extract_inheritance_python(c: &mut Criterion) {
    let path = Path::new("sample.py");
    c.bench_function("extract_inheritance_python", |b| {
        b.iter(|| inheritance::extract_inheritance(path, black_box(PYTHON_SAMPLE), Some(Language::Python)))
    });
}

criterion_group!(
    benches,
    bench_parse_python,
    bench_extract_calls_python,
    bench_extract_inheritance_python,
);
criterion_main!(benches);
