//! Node id derivation.
//!
//! Ids are derived from `(kind, file path, qualified name)` only, never from
//! line numbers, so re-indexing an unchanged entity always lands on the same
//! id. Two definitions with the same name at the same scope of one file share
//! an id and the later one wins.
//!
//! # Format
//!
//! | entity | id |
//! |---|---|
//! | file | `file:{path}` |
//! | top-level function | `func:{path}:{name}` |
//! | class | `class:{path}:{name}` |
//! | method | `method:{path}:{class}.{method}` |
//! | import binding | `import:{path}:{bound name}` |
//! | external module | `module:{dotted name}` |

pub fn file_id(path: &str) -> String {
    format!("file:{path}")
}

pub fn function_id(path: &str, name: &str) -> String {
    format!("func:{path}:{name}")
}

pub fn class_id(path: &str, name: &str) -> String {
    format!("class:{path}:{name}")
}

pub fn method_id(path: &str, class_name: &str, method: &str) -> String {
    format!("method:{path}:{class_name}.{method}")
}

pub fn import_id(path: &str, bound_name: &str) -> String {
    format!("import:{path}:{bound_name}")
}

/// Module nodes are not owned by any file, so their id carries no path.
pub fn module_id(module: &str) -> String {
    format!("module:{module}")
}

/// Name for a definition the analyzer could not name, keyed by its
/// declaration line so it stays unique within the file. The line is 1-based,
/// the same numbering every `line` attribute in the graph uses.
pub fn synthetic_name(kind: &str, line: u32) -> String {
    format!("unnamed_{kind}_{line}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_the_documented_format() {
        assert_eq!(file_id("a.py"), "file:a.py");
        assert_eq!(function_id("a.py", "greet"), "func:a.py:greet");
        assert_eq!(class_id("a.py", "Greeter"), "class:a.py:Greeter");
        assert_eq!(method_id("a.py", "Greeter", "say"), "method:a.py:Greeter.say");
        assert_eq!(import_id("pkg/a.py", "np"), "import:pkg/a.py:np");
        assert_eq!(module_id("os.path"), "module:os.path");
    }

    #[test]
    fn ids_ignore_position() {
        assert_eq!(function_id("a.py", "f"), function_id("a.py", "f"));
        assert_ne!(function_id("a.py", "f"), class_id("a.py", "f"));
        assert_ne!(function_id("a.py", "f"), function_id("b.py", "f"));
    }

    #[test]
    fn synthetic_names_use_the_line() {
        assert_eq!(synthetic_name("function", 7), "unnamed_function_7");
        assert_eq!(synthetic_name("class", 12), "unnamed_class_12");
    }
}
