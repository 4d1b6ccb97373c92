//! Turns analyzer facts for one file into a staged [`FileSubgraph`].

use crate::graph::FileSubgraph;
use crate::indexer::extract::{CallInput, CallScope, ExtractedFile};
use crate::indexer::ids;
use crate::model::{
    Edge, EdgeKind, FileAttrs, ImportAttrs, MethodAttrs, ModuleAttrs, Node, NodeAttrs,
    SymbolAttrs,
};
use crate::util;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Relationship linking beyond containment. All off by default, in which case
/// a file contributes exactly its File, Function, Class and Method nodes and
/// their `CONTAINS` edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub link_imports: bool,
    pub link_calls: bool,
    pub link_inheritance: bool,
}

impl IndexOptions {
    pub fn all() -> Self {
        Self {
            link_imports: true,
            link_calls: true,
            link_inheritance: true,
        }
    }
}

pub fn build_subgraph(
    path: &str,
    language: &str,
    source: &str,
    facts: &ExtractedFile,
    options: IndexOptions,
) -> FileSubgraph {
    let mut builder = SubgraphBuilder::new(path);
    builder.file(language, source);
    builder.definitions(facts);
    if options.link_imports {
        builder.imports(facts);
    }
    if options.link_calls {
        builder.calls(&facts.calls);
    }
    if options.link_inheritance {
        builder.inheritance(facts);
    }
    builder.finish()
}

struct SubgraphBuilder<'a> {
    path: &'a str,
    file_id: String,
    subgraph: FileSubgraph,
    functions: BTreeSet<String>,
    classes: BTreeSet<String>,
    methods: BTreeMap<String, BTreeSet<String>>,
}

impl<'a> SubgraphBuilder<'a> {
    fn new(path: &'a str) -> Self {
        Self {
            path,
            file_id: ids::file_id(path),
            subgraph: FileSubgraph::default(),
            functions: BTreeSet::new(),
            classes: BTreeSet::new(),
            methods: BTreeMap::new(),
        }
    }

    fn owned(&mut self, node: Node) {
        self.subgraph.nodes.push(node.owned_by(self.path));
    }

    fn edge(&mut self, edge: Edge) {
        self.subgraph.edges.push(edge);
    }

    fn file(&mut self, language: &str, source: &str) {
        let name = self.path.rsplit('/').next().unwrap_or(self.path).to_string();
        let attrs = FileAttrs {
            name,
            language: Some(language.to_string()),
            content_hash: Some(util::content_hash(source)),
            line_count: Some(util::line_count(source)),
        };
        let id = self.file_id.clone();
        self.owned(Node::new(id, NodeAttrs::File(attrs)));
    }

    fn definitions(&mut self, facts: &ExtractedFile) {
        for function in &facts.functions {
            let id = ids::function_id(self.path, &function.name);
            self.owned(Node::new(
                id.clone(),
                NodeAttrs::Function(SymbolAttrs {
                    name: function.name.clone(),
                    line: Some(function.line),
                    end_line: Some(function.end_line),
                    docstring: function.docstring.clone(),
                }),
            ));
            self.edge(Edge::new(self.file_id.clone(), id, EdgeKind::Contains));
            self.functions.insert(function.name.clone());
        }

        for class in &facts.classes {
            let class_id = ids::class_id(self.path, &class.name);
            let mut node = Node::new(
                class_id.clone(),
                NodeAttrs::Class(SymbolAttrs {
                    name: class.name.clone(),
                    line: Some(class.line),
                    end_line: Some(class.end_line),
                    docstring: class.docstring.clone(),
                }),
            );
            if !class.bases.is_empty() {
                node = node.with_extra("bases", json!(class.bases));
            }
            self.owned(node);
            self.edge(Edge::new(self.file_id.clone(), class_id.clone(), EdgeKind::Contains));
            self.classes.insert(class.name.clone());

            for method in &class.methods {
                let method_id = ids::method_id(self.path, &class.name, &method.name);
                self.owned(Node::new(
                    method_id.clone(),
                    NodeAttrs::Method(MethodAttrs {
                        name: method.name.clone(),
                        class_name: class.name.clone(),
                        line: Some(method.line),
                        end_line: Some(method.end_line),
                        docstring: method.docstring.clone(),
                    }),
                ));
                self.edge(Edge::new(class_id.clone(), method_id, EdgeKind::Contains));
                self.methods
                    .entry(class.name.clone())
                    .or_default()
                    .insert(method.name.clone());
            }
        }
    }

    /// One Import node per bound name; a later import of the same name
    /// rebinds it, so only the last one is linked.
    fn imports(&mut self, facts: &ExtractedFile) {
        let last: HashMap<String, usize> = facts
            .imports
            .iter()
            .enumerate()
            .map(|(position, import)| (import.bound_name(), position))
            .collect();
        for (position, import) in facts.imports.iter().enumerate() {
            let bound = import.bound_name();
            if last.get(&bound) != Some(&position) {
                continue;
            }
            let import_id = ids::import_id(self.path, &bound);
            self.owned(Node::new(
                import_id.clone(),
                NodeAttrs::Import(ImportAttrs {
                    name: bound,
                    module: import.module.clone(),
                    imported: import.name.clone(),
                    alias: import.alias.clone(),
                    line: Some(import.line),
                }),
            ));
            self.edge(Edge::new(self.file_id.clone(), import_id.clone(), EdgeKind::Contains));

            let module = absolute_module(self.path, &import.module);
            let module_id = ids::module_id(&module);
            self.subgraph.nodes.push(Node::new(
                module_id.clone(),
                NodeAttrs::Module(ModuleAttrs { name: module }),
            ));
            self.edge(
                Edge::new(import_id, module_id, EdgeKind::Imports)
                    .with_attr("line", json!(import.line)),
            );
        }
    }

    fn calls(&mut self, calls: &[CallInput]) {
        for call in calls {
            let Some(target) = self.resolve_callee(&call.scope, &call.callee) else {
                continue;
            };
            let source = self.scope_id(&call.scope);
            self.edge(Edge::new(source, target, EdgeKind::Calls).with_attr("line", json!(call.line)));
        }
    }

    fn inheritance(&mut self, facts: &ExtractedFile) {
        for class in &facts.classes {
            for base in &class.bases {
                if self.classes.contains(base) {
                    self.edge(Edge::new(
                        ids::class_id(self.path, &class.name),
                        ids::class_id(self.path, base),
                        EdgeKind::InheritsFrom,
                    ));
                }
            }
        }
    }

    /// Node a call is attributed to, falling back to the enclosing class and
    /// then the file when the scope has no node of its own.
    fn scope_id(&self, scope: &CallScope) -> String {
        match scope {
            CallScope::Module => self.file_id.clone(),
            CallScope::Function(name) if self.functions.contains(name) => {
                ids::function_id(self.path, name)
            }
            CallScope::Method { class_name, name } if self.has_method(class_name, name) => {
                ids::method_id(self.path, class_name, name)
            }
            CallScope::Class(class_name) | CallScope::Method { class_name, .. }
                if self.classes.contains(class_name) =>
            {
                ids::class_id(self.path, class_name)
            }
            _ => self.file_id.clone(),
        }
    }

    fn resolve_callee(&self, scope: &CallScope, callee: &str) -> Option<String> {
        if let Some((receiver, method)) = callee.split_once('.') {
            if !matches!(receiver, "self" | "cls") || method.contains('.') {
                return None;
            }
            let class_name = match scope {
                CallScope::Class(class_name) | CallScope::Method { class_name, .. } => class_name,
                _ => return None,
            };
            return self
                .has_method(class_name, method)
                .then(|| ids::method_id(self.path, class_name, method));
        }
        if self.functions.contains(callee) {
            return Some(ids::function_id(self.path, callee));
        }
        if self.classes.contains(callee) {
            return Some(ids::class_id(self.path, callee));
        }
        None
    }

    fn has_method(&self, class_name: &str, name: &str) -> bool {
        self.methods
            .get(class_name)
            .is_some_and(|methods| methods.contains(name))
    }

    fn finish(self) -> FileSubgraph {
        self.subgraph
    }
}

/// Resolves a relative module (`.mod`, `..pkg`) against the package that
/// contains `path`. Absolute names, and relative ones that climb above the
/// repository root, are returned unchanged.
fn absolute_module(path: &str, module: &str) -> String {
    let level = module.chars().take_while(|ch| *ch == '.').count();
    if level == 0 {
        return module.to_string();
    }
    let mut package: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    package.pop();
    if level - 1 > package.len() {
        return module.to_string();
    }
    package.truncate(package.len() - (level - 1));
    let rest = &module[level..];
    if !rest.is_empty() {
        package.extend(rest.split('.').filter(|part| !part.is_empty()));
    }
    if package.is_empty() {
        module.to_string()
    } else {
        package.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::extract::{ClassInput, FunctionInput, ImportInput};
    use crate::model::NodeKind;

    fn function(name: &str, line: u32) -> FunctionInput {
        FunctionInput {
            name: name.into(),
            line,
            end_line: line + 1,
            docstring: None,
        }
    }

    fn greeter_facts() -> ExtractedFile {
        ExtractedFile {
            functions: vec![function("greet", 1)],
            classes: vec![ClassInput {
                name: "Greeter".into(),
                line: 4,
                end_line: 6,
                docstring: None,
                bases: vec!["Base".into()],
                methods: vec![function("say", 5)],
            }],
            ..Default::default()
        }
    }

    fn ids_of(subgraph: &FileSubgraph) -> Vec<&str> {
        subgraph.nodes.iter().map(|node| node.id.as_str()).collect()
    }

    fn edges_of(subgraph: &FileSubgraph) -> Vec<(&str, &str, EdgeKind)> {
        subgraph
            .edges
            .iter()
            .map(|edge| (edge.source.as_str(), edge.target.as_str(), edge.kind))
            .collect()
    }

    #[test]
    fn default_options_build_containment_only() {
        let subgraph = build_subgraph(
            "a.py",
            "python",
            "def greet():\n    pass\n",
            &greeter_facts(),
            IndexOptions::default(),
        );
        assert_eq!(
            ids_of(&subgraph),
            vec![
                "file:a.py",
                "func:a.py:greet",
                "class:a.py:Greeter",
                "method:a.py:Greeter.say"
            ]
        );
        assert_eq!(
            edges_of(&subgraph),
            vec![
                ("file:a.py", "func:a.py:greet", EdgeKind::Contains),
                ("file:a.py", "class:a.py:Greeter", EdgeKind::Contains),
                ("class:a.py:Greeter", "method:a.py:Greeter.say", EdgeKind::Contains),
            ]
        );
        assert!(subgraph.nodes.iter().all(|node| node.owner_file.as_deref() == Some("a.py")));
        match &subgraph.nodes[0].attrs {
            NodeAttrs::File(attrs) => {
                assert_eq!(attrs.name, "a.py");
                assert_eq!(attrs.language.as_deref(), Some("python"));
                assert_eq!(attrs.line_count, Some(2));
            }
            other => panic!("unexpected attrs: {other:?}"),
        }
        assert_eq!(subgraph.nodes[2].extra["bases"], json!(["Base"]));
    }

    #[test]
    fn imports_link_to_unowned_modules() {
        let facts = ExtractedFile {
            imports: vec![
                ImportInput {
                    module: "numpy".into(),
                    name: None,
                    alias: Some("np".into()),
                    line: 1,
                },
                ImportInput {
                    module: ".util".into(),
                    name: Some("helper".into()),
                    alias: None,
                    line: 2,
                },
            ],
            ..Default::default()
        };
        let options = IndexOptions {
            link_imports: true,
            ..Default::default()
        };
        let subgraph = build_subgraph("pkg/a.py", "python", "", &facts, options);
        assert_eq!(
            ids_of(&subgraph),
            vec![
                "file:pkg/a.py",
                "import:pkg/a.py:np",
                "module:numpy",
                "import:pkg/a.py:helper",
                "module:pkg.util"
            ]
        );
        let module = &subgraph.nodes[2];
        assert_eq!(module.kind(), NodeKind::Module);
        assert!(module.owner_file.is_none());
        assert!(edges_of(&subgraph).contains(&(
            "import:pkg/a.py:np",
            "module:numpy",
            EdgeKind::Imports
        )));
    }

    #[test]
    fn calls_resolve_within_the_file() {
        let mut facts = greeter_facts();
        facts.calls = vec![
            CallInput {
                scope: CallScope::Module,
                callee: "greet".into(),
                line: 9,
            },
            CallInput {
                scope: CallScope::Method {
                    class_name: "Greeter".into(),
                    name: "say".into(),
                },
                callee: "self.say".into(),
                line: 6,
            },
            CallInput {
                scope: CallScope::Function("greet".into()),
                callee: "Greeter".into(),
                line: 2,
            },
            CallInput {
                scope: CallScope::Function("greet".into()),
                callee: "print".into(),
                line: 2,
            },
        ];
        let options = IndexOptions {
            link_calls: true,
            ..Default::default()
        };
        let subgraph = build_subgraph("a.py", "python", "", &facts, options);
        let calls: Vec<_> = edges_of(&subgraph)
            .into_iter()
            .filter(|(_, _, kind)| *kind == EdgeKind::Calls)
            .collect();
        assert_eq!(
            calls,
            vec![
                ("file:a.py", "func:a.py:greet", EdgeKind::Calls),
                ("method:a.py:Greeter.say", "method:a.py:Greeter.say", EdgeKind::Calls),
                ("func:a.py:greet", "class:a.py:Greeter", EdgeKind::Calls),
            ]
        );
        let first = subgraph
            .edges
            .iter()
            .find(|edge| edge.kind == EdgeKind::Calls)
            .unwrap();
        assert_eq!(first.attrs["line"], json!(9));
    }

    #[test]
    fn inheritance_links_local_bases_only() {
        let facts = ExtractedFile {
            classes: vec![
                ClassInput {
                    name: "Base".into(),
                    line: 1,
                    end_line: 2,
                    ..Default::default()
                },
                ClassInput {
                    name: "Child".into(),
                    line: 4,
                    end_line: 5,
                    bases: vec!["Base".into(), "abc.ABC".into()],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let options = IndexOptions {
            link_inheritance: true,
            ..Default::default()
        };
        let subgraph = build_subgraph("a.py", "python", "", &facts, options);
        let inherits: Vec<_> = edges_of(&subgraph)
            .into_iter()
            .filter(|(_, _, kind)| *kind == EdgeKind::InheritsFrom)
            .collect();
        assert_eq!(
            inherits,
            vec![("class:a.py:Child", "class:a.py:Base", EdgeKind::InheritsFrom)]
        );
    }

    #[test]
    fn relative_modules_resolve_against_the_package() {
        assert_eq!(absolute_module("pkg/sub/a.py", ".mod"), "pkg.sub.mod");
        assert_eq!(absolute_module("pkg/sub/a.py", "..other"), "pkg.other");
        assert_eq!(absolute_module("pkg/sub/a.py", "."), "pkg.sub");
        assert_eq!(absolute_module("a.py", "..up"), "..up");
        assert_eq!(absolute_module("a.py", "."), ".");
        assert_eq!(absolute_module("a.py", "os.path"), "os.path");
        assert_eq!(absolute_module("/srv/app/a.py", ".mod"), "srv.app.mod");
        assert_eq!(absolute_module("/a.py", "."), ".");
        assert_eq!(absolute_module("/a.py", ".util"), "util");
    }

    #[test]
    fn rebinding_an_import_keeps_only_the_last_one() {
        let import = |module: &str, line: u32| ImportInput {
            module: module.into(),
            name: None,
            alias: None,
            line,
        };
        let facts = ExtractedFile {
            imports: vec![import("os", 1), import("os.path", 2), import("sys", 3)],
            ..Default::default()
        };
        let options = IndexOptions {
            link_imports: true,
            ..Default::default()
        };
        let subgraph = build_subgraph("a.py", "python", "", &facts, options);
        assert_eq!(
            ids_of(&subgraph),
            vec!["file:a.py", "import:a.py:os", "module:os.path", "import:a.py:sys", "module:sys"]
        );
        let imports: Vec<_> = edges_of(&subgraph)
            .into_iter()
            .filter(|(_, _, kind)| *kind == EdgeKind::Imports)
            .collect();
        assert_eq!(
            imports,
            vec![
                ("import:a.py:os", "module:os.path", EdgeKind::Imports),
                ("import:a.py:sys", "module:sys", EdgeKind::Imports),
            ]
        );
        match &subgraph.nodes[1].attrs {
            NodeAttrs::Import(attrs) => {
                assert_eq!(attrs.module, "os.path");
                assert_eq!(attrs.line, Some(2));
            }
            other => panic!("unexpected attrs: {other:?}"),
        }
    }
}
