use crate::error::Result;

/// A top-level function or a method, with 1-based line numbers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionInput {
    pub name: String,
    pub line: u32,
    pub end_line: u32,
    pub docstring: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassInput {
    pub name: String,
    pub line: u32,
    pub end_line: u32,
    pub docstring: Option<String>,
    /// Base class expressions as written, e.g. `Base` or `abc.ABC`.
    pub bases: Vec<String>,
    pub methods: Vec<FunctionInput>,
}

/// One name bound by an import statement.
///
/// `import a.b` gives `module = "a.b"`, `name = None`;
/// `from .pkg import x as y` gives `module = ".pkg"`, `name = Some("x")`,
/// `alias = Some("y")`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportInput {
    pub module: String,
    pub name: Option<String>,
    pub alias: Option<String>,
    pub line: u32,
}

impl ImportInput {
    /// Name the import introduces into the importing file's namespace.
    pub fn bound_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.name {
            Some(name) => name.clone(),
            None => self.module.split('.').next().unwrap_or(&self.module).to_string(),
        }
    }
}

/// Definition enclosing a call site.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CallScope {
    #[default]
    Module,
    Function(String),
    /// Class body outside any method.
    Class(String),
    Method { class_name: String, name: String },
}

/// A call site whose callee is a plain name or a dotted attribute chain,
/// e.g. `helper`, `self.save` or `os.path.join`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallInput {
    pub scope: CallScope,
    pub callee: String,
    pub line: u32,
}

/// Structural facts about one source file, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedFile {
    pub functions: Vec<FunctionInput>,
    pub classes: Vec<ClassInput>,
    pub imports: Vec<ImportInput>,
    pub calls: Vec<CallInput>,
}

/// Turns source text into structural facts.
pub trait SourceAnalyzer: Send {
    /// Canonical names of the languages this analyzer accepts.
    fn languages(&self) -> &[&'static str];

    fn supports(&self, language: &str) -> bool {
        self.languages().contains(&language)
    }

    fn analyze(&mut self, source: &str, language: &str) -> Result<ExtractedFile>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_name_prefers_alias_then_name_then_top_package() {
        let plain = ImportInput {
            module: "os.path".into(),
            ..Default::default()
        };
        assert_eq!(plain.bound_name(), "os");

        let from = ImportInput {
            module: "os".into(),
            name: Some("path".into()),
            ..Default::default()
        };
        assert_eq!(from.bound_name(), "path");

        let aliased = ImportInput {
            module: "numpy".into(),
            alias: Some("np".into()),
            ..Default::default()
        };
        assert_eq!(aliased.bound_name(), "np");
    }
}
