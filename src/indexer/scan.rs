use crate::error::Result;
use ignore::WalkBuilder;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub language: &'static str,
}

#[derive(Debug, Clone)]
pub struct LanguageSpec {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

#[derive(Debug, Clone)]
pub struct LanguageAlias {
    pub name: &'static str,
    pub language: &'static str,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    pub no_ignore: bool,
}

impl ScanOptions {
    pub fn new(no_ignore: bool) -> Self {
        Self { no_ignore }
    }
}

static LANGUAGE_SPECS: &[LanguageSpec] = &[LanguageSpec {
    name: "python",
    extensions: &["py", "pyi"],
}];

static LANGUAGE_ALIASES: &[LanguageAlias] = &[
    LanguageAlias {
        name: "python",
        language: "python",
    },
    LanguageAlias {
        name: "py",
        language: "python",
    },
    LanguageAlias {
        name: "python3",
        language: "python",
    },
];

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &[".kgidx", ".git"];

/// Resolves a client language hint (`Python`, `py`, `python3`) to its
/// canonical name.
pub fn normalize_language(raw: &str) -> Option<&'static str> {
    let key = raw.trim().to_ascii_lowercase();
    LANGUAGE_ALIASES
        .iter()
        .find(|alias| alias.name == key)
        .map(|alias| alias.language)
}

pub fn language_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension().and_then(|ext| ext.to_str())?;
    LANGUAGE_SPECS
        .iter()
        .find(|spec| spec.extensions.iter().any(|candidate| candidate.eq_ignore_ascii_case(ext)))
        .map(|spec| spec.name)
}

/// Lists every file under `repo_root` with a known language, sorted by
/// repository-relative path.
pub fn scan_repo(repo_root: &Path, options: ScanOptions) -> Result<Vec<ScannedFile>> {
    let mut files = Vec::new();
    let mut builder = WalkBuilder::new(repo_root);
    if options.no_ignore {
        builder
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false);
    } else {
        builder
            .ignore(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .parents(true)
            .require_git(false);
    }
    let walker = builder
        .hidden(false)
        .filter_entry(|entry| !is_skipped_entry(entry))
        .build();
    for entry in walker {
        let entry = match entry {
            Ok(value) => value,
            Err(err) => {
                warn!("walk error: {err}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let path = entry.path();
        let Some(language) = language_for_path(path) else {
            continue;
        };
        let rel_path = crate::util::normalize_rel_path(repo_root, path)?;
        files.push(ScannedFile {
            rel_path,
            abs_path: path.to_path_buf(),
            language,
        });
    }
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

fn is_skipped_entry(entry: &ignore::DirEntry) -> bool {
    let name = entry.file_name();
    entry.depth() > 0 && SKIPPED_DIRS.iter().any(|dir| name == OsStr::new(dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn resolves_language_hints_and_extensions() {
        assert_eq!(normalize_language("Python"), Some("python"));
        assert_eq!(normalize_language("py"), Some("python"));
        assert_eq!(normalize_language(" python3 "), Some("python"));
        assert_eq!(normalize_language("rust"), None);
        assert_eq!(language_for_path(Path::new("pkg/a.py")), Some("python"));
        assert_eq!(language_for_path(Path::new("stubs/a.pyi")), Some("python"));
        assert_eq!(language_for_path(Path::new("README.md")), None);
        assert_eq!(language_for_path(Path::new("Makefile")), None);
    }

    #[test]
    fn scan_skips_index_dir_and_unknown_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::create_dir_all(root.join(".kgidx")).unwrap();
        fs::write(root.join("pkg/b.py"), "def b():\n    pass\n").unwrap();
        fs::write(root.join("a.py"), "x = 1\n").unwrap();
        fs::write(root.join("notes.txt"), "hello").unwrap();
        fs::write(root.join(".kgidx/stale.py"), "y = 2\n").unwrap();

        let files = scan_repo(root, ScanOptions::default()).unwrap();
        let paths: Vec<&str> = files.iter().map(|file| file.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["a.py", "pkg/b.py"]);
        assert!(files.iter().all(|file| file.language == "python"));
    }

    #[test]
    fn scan_honours_ignore_files_unless_disabled() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(root.join(".ignore"), "build/\n").unwrap();
        fs::write(root.join("build/gen.py"), "x = 1\n").unwrap();
        fs::write(root.join("main.py"), "x = 1\n").unwrap();

        let files = scan_repo(root, ScanOptions::default()).unwrap();
        assert_eq!(files.len(), 1);
        let files = scan_repo(root, ScanOptions::new(true)).unwrap();
        assert_eq!(files.len(), 2);
    }
}
