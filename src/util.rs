use crate::error::{Error, Result};
use blake3::Hasher;
use std::fs;
use std::path::{Component, Path};
use std::time::Instant;

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| Error::Analysis(format!("read {}: {err}", path.display())))
}

pub fn normalize_rel_path(repo_root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(repo_root).map_err(|_| {
        Error::NotFound(format!(
            "{} is not under {}",
            path.display(),
            repo_root.display()
        ))
    })?;
    Ok(normalize_path(rel))
}

/// Joins the normal components of `path` with `/`, dropping `.` segments.
pub fn normalize_path(path: &Path) -> String {
    let mut parts = Vec::new();
    for comp in path.components() {
        match comp {
            Component::Normal(os) => parts.push(os.to_string_lossy().to_string()),
            Component::ParentDir => parts.push("..".to_string()),
            Component::CurDir => {}
            _ => {}
        }
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Normalises a client-supplied file path: backslashes become `/` and a
/// leading `./` is dropped. Absolute paths stay absolute.
pub fn normalize_file_path(raw: &str) -> String {
    let unified = raw.trim().replace('\\', "/");
    let mut rest = unified.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}

pub fn content_hash(source: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(source.as_bytes());
    hasher.finalize().to_hex().to_string()
}

pub fn line_count(source: &str) -> u32 {
    u32::try_from(source.lines().count()).unwrap_or(u32::MAX)
}

pub fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn normalizes_relative_paths() {
        let root = PathBuf::from("/repo");
        let path = PathBuf::from("/repo/pkg/./mod.py");
        assert_eq!(normalize_rel_path(&root, &path).unwrap(), "pkg/mod.py");
        assert!(normalize_rel_path(&root, Path::new("/elsewhere/a.py")).is_err());
    }

    #[test]
    fn normalizes_client_paths() {
        assert_eq!(normalize_file_path("./pkg\\a.py"), "pkg/a.py");
        assert_eq!(normalize_file_path("/abs/a.py"), "/abs/a.py");
        assert_eq!(normalize_file_path(" a.py "), "a.py");
    }

    #[test]
    fn hashes_are_stable() {
        assert_eq!(content_hash("x = 1\n"), content_hash("x = 1\n"));
        assert_ne!(content_hash("x = 1\n"), content_hash("x = 2\n"));
        assert_eq!(content_hash("").len(), 64);
    }

    #[test]
    fn counts_lines() {
        assert_eq!(line_count(""), 0);
        assert_eq!(line_count("a\nb\n"), 2);
        assert_eq!(line_count("a\nb"), 2);
    }
}
