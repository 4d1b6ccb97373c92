use crate::error::{Error, Result};
use crate::graph::{FileSubgraph, GraphStore, SharedGraph};
use crate::model::{GraphStats, IndexOutcome, ReindexStats};
use crate::util;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};

pub mod builder;
pub mod extract;
pub mod ids;
pub mod python;
pub mod scan;

pub use builder::IndexOptions;
pub use extract::SourceAnalyzer;

/// Applies analyzer output to the shared graph one file at a time.
///
/// Analysis runs outside the graph lock. The swap of a file's subgraph and the
/// snapshot write that follows it happen under one write lock, so readers
/// never observe a file half replaced.
pub struct Indexer {
    graph: SharedGraph,
    analyzer: Mutex<Box<dyn SourceAnalyzer>>,
    languages: Vec<&'static str>,
    options: IndexOptions,
}

impl Indexer {
    pub fn new(graph: SharedGraph, analyzer: Box<dyn SourceAnalyzer>) -> Self {
        Self::with_options(graph, analyzer, IndexOptions::default())
    }

    pub fn with_options(
        graph: SharedGraph,
        analyzer: Box<dyn SourceAnalyzer>,
        options: IndexOptions,
    ) -> Self {
        let languages = analyzer.languages().to_vec();
        Self {
            graph,
            analyzer: Mutex::new(analyzer),
            languages,
            options,
        }
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    /// Picks the language from `hint` when it names a supported language,
    /// otherwise from the file extension.
    pub fn resolve_language(&self, path: &str, hint: Option<&str>) -> Result<&'static str> {
        let supported = |language: &'static str| self.languages.contains(&language);
        if let Some(language) = hint.and_then(scan::normalize_language) {
            if supported(language) {
                return Ok(language);
            }
        }
        if let Some(language) = scan::language_for_path(Path::new(path)) {
            if supported(language) {
                return Ok(language);
            }
        }
        let shown = hint.map(str::to_string).unwrap_or_else(|| path.to_string());
        Err(Error::UnsupportedLanguage(shown))
    }

    /// Re-indexes one file from `source`, replacing everything it owned.
    ///
    /// On error the graph is exactly as it was before the call.
    pub fn index_file(
        &self,
        path: &str,
        source: &str,
        language_hint: Option<&str>,
    ) -> Result<IndexOutcome> {
        let started = Instant::now();
        let path = util::normalize_file_path(path);
        if path.is_empty() {
            return Err(Error::Analysis("empty file path".to_string()));
        }
        let language = self.resolve_language(&path, language_hint)?;
        let subgraph = self.stage(&path, language, source)?;

        let mut graph = self.graph.write().map_err(|_| Error::LockPoisoned)?;
        let outcome = graph.replace_file(&path, subgraph)?;
        let snapshot_saved = persist(&graph);
        drop(graph);

        let elapsed_ms = util::elapsed_ms(started);
        debug!(
            file = %path,
            nodes_added = outcome.nodes_added,
            edges_added = outcome.edges_added,
            nodes_removed = outcome.nodes_removed,
            elapsed_ms,
            "indexed file"
        );
        Ok(IndexOutcome {
            file_path: path,
            language: language.to_string(),
            nodes_added: outcome.nodes_added,
            edges_added: outcome.edges_added,
            nodes_removed: outcome.nodes_removed,
            elapsed_ms,
            snapshot_saved,
        })
    }

    /// Drops every node `path` owns. Returns 0 for files never indexed.
    pub fn remove_file(&self, path: &str) -> Result<usize> {
        let path = util::normalize_file_path(path);
        let mut graph = self.graph.write().map_err(|_| Error::LockPoisoned)?;
        let removed = graph.remove_file_nodes(&path);
        if removed > 0 {
            persist(&graph);
        }
        debug!(file = %path, removed, "removed file");
        Ok(removed)
    }

    /// Graph totals; per-node-kind counts only when `detailed`.
    pub fn stats(&self, detailed: bool) -> Result<GraphStats> {
        let graph = self.graph.read().map_err(|_| Error::LockPoisoned)?;
        let mut stats = graph.stats();
        if !detailed {
            stats.node_kind_counts = None;
        }
        Ok(stats)
    }

    /// Rebuilds the graph from every supported file under `root`.
    ///
    /// The write lock is held for the whole rebuild. Per-file failures are
    /// logged and counted; oversized files count as skipped.
    pub fn reindex(&self, root: &Path, scan_options: scan::ScanOptions) -> Result<ReindexStats> {
        let started = Instant::now();
        let files = scan::scan_repo(root, scan_options)?;
        let mut stats = ReindexStats {
            scanned: files.len(),
            ..Default::default()
        };

        let mut graph = self.graph.write().map_err(|_| Error::LockPoisoned)?;
        graph.clear();
        for file in &files {
            let source = match util::read_to_string(&file.abs_path) {
                Ok(source) => source,
                Err(err) => {
                    warn!(file = %file.rel_path, "{err}");
                    stats.errors += 1;
                    continue;
                }
            };
            let staged = self
                .stage(&file.rel_path, file.language, &source)
                .and_then(|subgraph| graph.replace_file(&file.rel_path, subgraph));
            match staged {
                Ok(_) => stats.indexed += 1,
                Err(err @ Error::FileTooLarge { .. }) => {
                    debug!(file = %file.rel_path, "skipped: {err}");
                    stats.skipped += 1;
                }
                Err(err) => {
                    warn!(file = %file.rel_path, "index error: {err}");
                    stats.errors += 1;
                }
            }
        }
        stats.nodes = graph.node_count();
        stats.edges = graph.edge_count();
        stats.snapshot_saved = persist(&graph);
        drop(graph);

        stats.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            root = %root.display(),
            scanned = stats.scanned,
            indexed = stats.indexed,
            skipped = stats.skipped,
            errors = stats.errors,
            duration_ms = stats.duration_ms,
            "reindex complete"
        );
        Ok(stats)
    }

    fn stage(&self, path: &str, language: &str, source: &str) -> Result<FileSubgraph> {
        let facts = {
            let mut analyzer = self.analyzer.lock().map_err(|_| Error::LockPoisoned)?;
            analyzer.analyze(source, language)?
        };
        Ok(builder::build_subgraph(
            path,
            language,
            source,
            &facts,
            self.options,
        ))
    }
}

/// Saves the snapshot if the store has a path. Failures are logged and
/// reported as `false`; the in-memory graph stays authoritative.
fn persist(graph: &GraphStore) -> bool {
    if graph.snapshot_path().is_none() {
        return false;
    }
    match graph.save_snapshot(None) {
        Ok(_) => true,
        Err(err) => {
            warn!("snapshot save failed: {err}");
            false
        }
    }
}
