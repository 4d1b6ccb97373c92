use kgidx::indexer::SourceAnalyzer;
use kgidx::indexer::extract::CallScope;
use kgidx::indexer::python::PythonAnalyzer;

#[test]
fn extract_structural_facts() {
    let source = r#"
"""module doc"""
import os, sys as system
from pkg import mod, util as u

class Base:
    pass

class Foo(Base):
    """Foo doc"""
    def method(self, x):
        "method doc"
        return self.helper(x)

    def helper(self, x):
        return x

def func(a, b):
    return a + b

func(1, 2)
"#;
    let mut analyzer = PythonAnalyzer::new().unwrap();
    let facts = analyzer.analyze(source, "python").unwrap();

    let functions: Vec<_> = facts.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(functions, vec!["func"]);

    let classes: Vec<_> = facts.classes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(classes, vec!["Base", "Foo"]);

    let foo = &facts.classes[1];
    assert_eq!(foo.docstring.as_deref(), Some("Foo doc"));
    assert_eq!(foo.bases, vec!["Base".to_string()]);
    assert_eq!(foo.methods[0].name, "method");
    assert_eq!(foo.methods[0].docstring.as_deref(), Some("method doc"));
    assert_eq!(foo.methods[1].name, "helper");
    assert_eq!(facts.classes[0].docstring, None);

    let bound: Vec<_> = facts.imports.iter().map(|i| i.bound_name()).collect();
    assert_eq!(bound, vec!["os", "system", "mod", "u"]);

    assert!(facts.calls.iter().any(|call| {
        call.callee == "self.helper"
            && call.scope
                == CallScope::Method {
                    class_name: "Foo".into(),
                    name: "method".into(),
                }
    }));
    assert!(
        facts
            .calls
            .iter()
            .any(|call| call.callee == "func" && call.scope == CallScope::Module && call.line == 21)
    );
}

#[test]
fn async_and_decorated_methods_are_methods() {
    let source = r#"
class Service:
    @staticmethod
    def build():
        return Service()

    async def fetch(self):
        await self.build()
"#;
    let mut analyzer = PythonAnalyzer::new().unwrap();
    let facts = analyzer.analyze(source, "python").unwrap();
    let methods: Vec<_> = facts.classes[0]
        .methods
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    assert_eq!(methods, vec!["build", "fetch"]);
}

#[test]
fn analyzer_is_reusable_after_an_error() {
    let mut analyzer = PythonAnalyzer::new().unwrap();
    assert!(analyzer.analyze("def broken(:\n", "python").is_err());
    let facts = analyzer.analyze("def fine():\n    pass\n", "python").unwrap();
    assert_eq!(facts.functions.len(), 1);
}

#[test]
fn async_functions_are_plain_definitions() {
    let source = "async def fetch():\n    await other()\n\n\nasync def other():\n    pass\n";
    let mut analyzer = PythonAnalyzer::new().unwrap();
    let facts = analyzer.analyze(source, "python").unwrap();
    let functions: Vec<_> = facts.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(functions, vec!["fetch", "other"]);
    assert!(facts.calls.iter().any(|call| {
        call.callee == "other" && call.scope == CallScope::Function("fetch".into())
    }));
}
