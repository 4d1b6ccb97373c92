use crate::error::{Error, Result};
use crate::indexer::extract::{
    CallInput, CallScope, ClassInput, ExtractedFile, FunctionInput, ImportInput, SourceAnalyzer,
};
use crate::indexer::ids::synthetic_name;
use tree_sitter::{Node, Parser};

/// Sources above this many bytes are refused before parsing.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

const LANGUAGES: &[&str] = &["python"];

pub struct PythonAnalyzer {
    parser: Parser,
    max_file_size: u64,
}

impl PythonAnalyzer {
    pub fn new() -> Result<Self> {
        Self::with_max_file_size(DEFAULT_MAX_FILE_SIZE)
    }

    pub fn with_max_file_size(max_file_size: u64) -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_python::LANGUAGE;
        parser
            .set_language(&language.into())
            .map_err(|err| Error::Analysis(format!("load python grammar: {err}")))?;
        Ok(Self {
            parser,
            max_file_size,
        })
    }
}

impl SourceAnalyzer for PythonAnalyzer {
    fn languages(&self) -> &[&'static str] {
        LANGUAGES
    }

    fn analyze(&mut self, source: &str, language: &str) -> Result<ExtractedFile> {
        if !self.supports(language) {
            return Err(Error::UnsupportedLanguage(language.to_string()));
        }
        let size = source.len() as u64;
        if size > self.max_file_size {
            return Err(Error::FileTooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| Error::Analysis("parser returned no tree".to_string()))?;
        let root = tree.root_node();
        if root.has_error() {
            let line = first_error_line(root).unwrap_or(1);
            return Err(Error::Analysis(format!("syntax error at line {line}")));
        }

        let mut output = ExtractedFile::default();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            collect_definition(child, source, &mut output);
        }
        collect_calls(root, &CallScope::Module, source, &mut output.calls);
        Ok(output)
    }
}

fn collect_definition(node: Node<'_>, source: &str, output: &mut ExtractedFile) {
    match node.kind() {
        "decorated_definition" => {
            if let Some(definition) = node.child_by_field_name("definition") {
                collect_definition(definition, source, output);
            }
        }
        "function_definition" => {
            output.functions.push(function_input(node, source));
        }
        "class_definition" => output.classes.push(class_input(node, source)),
        "import_statement" => output.imports.extend(plain_imports(node, source)),
        "import_from_statement" | "future_import_statement" => {
            output.imports.extend(from_imports(node, source));
        }
        _ => {}
    }
}

fn function_input(node: Node<'_>, source: &str) -> FunctionInput {
    let (line, end_line) = line_range(node);
    FunctionInput {
        name: definition_name(node, source),
        line,
        end_line,
        docstring: node
            .child_by_field_name("body")
            .and_then(|body| extract_docstring(body, source)),
    }
}

fn class_input(node: Node<'_>, source: &str) -> ClassInput {
    let (line, end_line) = line_range(node);
    let mut bases = Vec::new();
    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        let mut cursor = superclasses.walk();
        for child in superclasses.named_children(&mut cursor) {
            // `metaclass=...` and other keywords are not bases.
            if matches!(child.kind(), "keyword_argument" | "comment") {
                continue;
            }
            let base = node_text(child, source);
            if !base.is_empty() {
                bases.push(base);
            }
        }
    }

    let body = node.child_by_field_name("body");
    let mut methods = Vec::new();
    if let Some(body) = body {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            if let Some(function) = as_function(child) {
                methods.push(function_input(function, source));
            }
        }
    }

    ClassInput {
        name: definition_name(node, source),
        line,
        end_line,
        docstring: body.and_then(|body| extract_docstring(body, source)),
        bases,
        methods,
    }
}

/// The function a class-body statement defines, looking through decorators.
fn as_function(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "function_definition" => Some(node),
        "decorated_definition" => node
            .child_by_field_name("definition")
            .filter(|def| def.kind() == "function_definition"),
        _ => None,
    }
}

fn definition_name(node: Node<'_>, source: &str) -> String {
    let name = node
        .child_by_field_name("name")
        .map(|name| node_text(name, source))
        .unwrap_or_default();
    if !name.is_empty() {
        return name;
    }
    let kind = if node.kind() == "class_definition" {
        "class"
    } else {
        "function"
    };
    synthetic_name(kind, line_range(node).0)
}

fn plain_imports(node: Node<'_>, source: &str) -> Vec<ImportInput> {
    let line = line_range(node).0;
    let mut imports = Vec::new();
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        let (module, alias) = split_alias(name, source);
        if module.is_empty() {
            continue;
        }
        imports.push(ImportInput {
            module,
            name: None,
            alias,
            line,
        });
    }
    imports
}

fn from_imports(node: Node<'_>, source: &str) -> Vec<ImportInput> {
    let line = line_range(node).0;
    let module = node
        .child_by_field_name("module_name")
        .map(|module| node_text(module, source))
        .unwrap_or_else(|| "__future__".to_string());
    let mut imports = Vec::new();
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        let (imported, alias) = split_alias(name, source);
        if imported.is_empty() {
            continue;
        }
        imports.push(ImportInput {
            module: module.clone(),
            name: Some(imported),
            alias,
            line,
        });
    }
    let mut cursor = node.walk();
    if node
        .named_children(&mut cursor)
        .any(|child| child.kind() == "wildcard_import")
    {
        imports.push(ImportInput {
            module,
            name: Some("*".to_string()),
            alias: None,
            line,
        });
    }
    imports
}

/// `a.b as c` -> (`a.b`, Some(`c`)); `a.b` -> (`a.b`, None).
fn split_alias(node: Node<'_>, source: &str) -> (String, Option<String>) {
    if node.kind() == "aliased_import" {
        let name = node
            .child_by_field_name("name")
            .map(|name| node_text(name, source))
            .unwrap_or_default();
        let alias = node
            .child_by_field_name("alias")
            .map(|alias| node_text(alias, source))
            .filter(|alias| !alias.is_empty());
        (name, alias)
    } else {
        (node_text(node, source), None)
    }
}

fn collect_calls(node: Node<'_>, scope: &CallScope, source: &str, calls: &mut Vec<CallInput>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "call" {
            record_call(child, scope, source, calls);
        }
        match enter_scope(child, scope, source) {
            Some(inner) => collect_calls(child, &inner, source, calls),
            None => collect_calls(child, scope, source, calls),
        }
    }
}

/// Scope opened by `node`, if it is a definition that gets its own node.
/// Definitions nested inside functions stay attributed to the function.
fn enter_scope(node: Node<'_>, scope: &CallScope, source: &str) -> Option<CallScope> {
    match (node.kind(), scope) {
        ("function_definition", CallScope::Module) => {
            Some(CallScope::Function(definition_name(node, source)))
        }
        ("function_definition", CallScope::Class(class_name)) => {
            Some(CallScope::Method {
                class_name: class_name.clone(),
                name: definition_name(node, source),
            })
        }
        ("class_definition", CallScope::Module) => {
            Some(CallScope::Class(definition_name(node, source)))
        }
        _ => None,
    }
}

fn record_call(node: Node<'_>, scope: &CallScope, source: &str, calls: &mut Vec<CallInput>) {
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };
    if !matches!(function.kind(), "identifier" | "attribute") {
        return;
    }
    let callee = node_text(function, source);
    if callee.is_empty() || !is_simple_call_target(&callee) {
        return;
    }
    calls.push(CallInput {
        scope: scope.clone(),
        callee,
        line: line_range(node).0,
    });
}

fn is_simple_call_target(raw: &str) -> bool {
    raw.chars()
        .all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '.')
}

fn first_error_line(node: Node<'_>) -> Option<u32> {
    if node.is_error() || node.is_missing() {
        return Some(line_range(node).0);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(line) = first_error_line(child) {
            return Some(line);
        }
    }
    Some(line_range(node).0)
}

/// 1-based first and last line of `node`.
fn line_range(node: Node<'_>) -> (u32, u32) {
    let start = node.start_position().row + 1;
    let end = node.end_position().row + 1;
    (
        u32::try_from(start).unwrap_or(u32::MAX),
        u32::try_from(end).unwrap_or(u32::MAX),
    )
}

fn node_text(node: Node<'_>, source: &str) -> String {
    source
        .get(node.start_byte()..node.end_byte())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Leading string statement of a block, skipping comments and `pass`.
fn extract_docstring(body: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = body.walk();
    for child in body.named_children(&mut cursor) {
        match child.kind() {
            "comment" | "pass_statement" => continue,
            "expression_statement" => {
                let literal = child.named_child(0)?;
                if literal.kind() != "string" {
                    return None;
                }
                let text = unquote_string_literal(&node_text(literal, source))?;
                let text = text.trim();
                return (!text.is_empty()).then(|| text.to_string());
            }
            _ => return None,
        }
    }
    None
}

/// Strips string prefixes (`r`, `b`, `f`, `u` in any case) and the quotes.
fn unquote_string_literal(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let body = trimmed.trim_start_matches(|ch: char| ch.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if body.len() >= quote.len() * 2 && body.starts_with(quote) && body.ends_with(quote) {
            return Some(body[quote.len()..body.len() - quote.len()].to_string());
        }
    }
    None
}
