//! In-memory code graph with per-file ownership.
//!
//! Nodes live in a `StableDiGraph` so removing a node drops every edge that
//! touches it while the indices of all other nodes stay valid. `index` maps
//! node ids to graph indices in id order. Every file-owned node appears in
//! exactly one `files` entry, which is the unit of deletion.

use crate::error::{Error, Result};
use crate::model::{
    Direction, Edge, EdgeKind, Extra, GraphStats, Node, NodeKind, ReplaceOutcome,
};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::{Incoming, Outgoing};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

pub mod snapshot;

/// Store handle shared between the indexer and request handlers.
pub type SharedGraph = Arc<RwLock<GraphStore>>;

/// Nodes and edges produced for one file, validated as a whole before they
/// replace that file's current subgraph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileSubgraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq)]
struct EdgeData {
    kind: EdgeKind,
    attrs: Extra,
}

#[derive(Debug, Default)]
pub struct GraphStore {
    graph: StableDiGraph<Node, EdgeData>,
    index: BTreeMap<String, NodeIndex>,
    files: BTreeMap<String, BTreeSet<String>>,
    snapshot_path: Option<PathBuf>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot_path(path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Opens a store bound to `path`, restoring the snapshot if one exists.
    /// A snapshot that cannot be loaded leaves the store empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::with_snapshot_path(path);
        let Some(path) = store.snapshot_path.clone() else {
            return store;
        };
        if path.exists() {
            if let Err(err) = store.load_snapshot(None) {
                warn!(path = %path.display(), "starting with an empty graph: {err}");
            }
        } else {
            info!(path = %path.display(), "no snapshot found, starting with an empty graph");
        }
        store
    }

    pub fn into_shared(self) -> SharedGraph {
        Arc::new(RwLock::new(self))
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    pub fn set_snapshot_path(&mut self, path: Option<PathBuf>) {
        self.snapshot_path = path;
    }

    /// Inserts `node` or overwrites the attributes of the node with the same id.
    ///
    /// Returns `true` when the id was new. The caller supplies the complete
    /// attribute set; nothing is merged. Ownership follows `node.owner_file`,
    /// moving the id out of a previous owner's set if it changed.
    pub fn add_node(&mut self, node: Node) -> bool {
        if let Some(owner) = &node.owner_file {
            self.files
                .entry(owner.clone())
                .or_default()
                .insert(node.id.clone());
        }
        match self.index.get(&node.id).copied() {
            Some(ix) => {
                if let Some(previous) = self.graph[ix].owner_file.clone() {
                    if node.owner_file.as_deref() != Some(previous.as_str()) {
                        self.disown(&previous, &node.id);
                    }
                }
                self.graph[ix] = node;
                false
            }
            None => {
                let id = node.id.clone();
                let ix = self.graph.add_node(node);
                self.index.insert(id, ix);
                true
            }
        }
    }

    /// Adds a directed edge between two existing nodes.
    ///
    /// Returns `Ok(false)` without touching the graph if an edge with the same
    /// `(source, target, kind)` already exists.
    pub fn add_edge(&mut self, edge: Edge) -> Result<bool> {
        let (Some(&from), Some(&to)) = (self.index.get(&edge.source), self.index.get(&edge.target))
        else {
            return Err(Error::DanglingReference {
                source_id: edge.source,
                target_id: edge.target,
            });
        };
        if self.find_edge(from, to, edge.kind).is_some() {
            return Ok(false);
        }
        self.graph.add_edge(
            from,
            to,
            EdgeData {
                kind: edge.kind,
                attrs: edge.attrs,
            },
        );
        Ok(true)
    }

    /// Removes every node owned by `file_path` together with all edges that
    /// touch them. Unknown files are a no-op returning 0.
    ///
    /// Unowned nodes left without any edge by the removal are dropped too;
    /// they are not part of the returned count.
    pub fn remove_file_nodes(&mut self, file_path: &str) -> usize {
        let (removed, orphans) = self.retract(file_path);
        self.collect_orphans(orphans);
        removed
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).and_then(|ix| self.graph.node_weight(*ix))
    }

    pub fn get_edge(&self, source: &str, target: &str, kind: EdgeKind) -> Option<Edge> {
        let from = *self.index.get(source)?;
        let to = *self.index.get(target)?;
        let data = self.find_edge(from, to, kind)?;
        Some(Edge {
            source: source.to_string(),
            target: target.to_string(),
            kind,
            attrs: data.attrs.clone(),
        })
    }

    /// Neighbours of `id`, outgoing first then incoming, each direction ordered
    /// by neighbour id. A neighbour is listed once per direction however many
    /// edge kinds connect it. Unknown ids yield an empty list.
    pub fn get_connected(
        &self,
        id: &str,
        kind: Option<EdgeKind>,
        direction: Direction,
    ) -> Vec<(&str, &Node)> {
        let mut connected = Vec::new();
        let Some(&ix) = self.index.get(id) else {
            return connected;
        };
        if direction.includes_outgoing() {
            connected.extend(self.neighbours(ix, kind, Outgoing));
        }
        if direction.includes_incoming() {
            connected.extend(self.neighbours(ix, kind, Incoming));
        }
        connected
    }

    fn neighbours(
        &self,
        ix: NodeIndex,
        kind: Option<EdgeKind>,
        side: petgraph::Direction,
    ) -> BTreeMap<&str, &Node> {
        self.graph
            .edges_directed(ix, side)
            .filter(|edge| kind.is_none_or(|wanted| wanted == edge.weight().kind))
            .map(|edge| {
                let other = if side == Outgoing { edge.target() } else { edge.source() };
                let node = &self.graph[other];
                (node.id.as_str(), node)
            })
            .collect()
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.index.values().map(|ix| &self.graph[*ix])
    }

    /// All edges ordered by source id, then target id and kind.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.index.iter().flat_map(move |(source, &ix)| {
            let mut out: Vec<Edge> = self
                .graph
                .edges_directed(ix, Outgoing)
                .map(|edge| Edge {
                    source: source.clone(),
                    target: self.graph[edge.target()].id.clone(),
                    kind: edge.weight().kind,
                    attrs: edge.weight().attrs.clone(),
                })
                .collect();
            out.sort_by(|a, b| (&a.target, a.kind).cmp(&(&b.target, b.kind)));
            out
        })
    }

    /// File paths with the ids each one owns.
    pub fn files(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.files.iter().map(|(path, ids)| (path.as_str(), ids))
    }

    pub fn file_nodes(&self, file_path: &str) -> Option<&BTreeSet<String>> {
        self.files.get(file_path)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn stats(&self) -> GraphStats {
        let mut edge_kind_counts = BTreeMap::new();
        for data in self.graph.edge_weights() {
            *edge_kind_counts.entry(data.kind).or_insert(0) += 1;
        }
        let mut node_kind_counts: BTreeMap<NodeKind, usize> = BTreeMap::new();
        for node in self.graph.node_weights() {
            *node_kind_counts.entry(node.kind()).or_insert(0) += 1;
        }
        GraphStats {
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            file_count: self.files.len(),
            edge_kind_counts,
            node_kind_counts: Some(node_kind_counts),
        }
    }

    /// Swaps `file_path`'s current subgraph for `subgraph` in one step.
    ///
    /// The staged nodes and edges are validated against the graph as it will
    /// look once the file's current nodes are retracted; on any violation the
    /// store is left untouched.
    pub fn replace_file(
        &mut self,
        file_path: &str,
        subgraph: FileSubgraph,
    ) -> Result<ReplaceOutcome> {
        self.validate_subgraph(file_path, &subgraph)?;

        let (nodes_removed, orphans) = self.retract(file_path);
        let nodes_added = subgraph
            .nodes
            .into_iter()
            .map(|node| self.add_node(node))
            .filter(|created| *created)
            .count();
        let mut edges_added = 0;
        for edge in subgraph.edges {
            if self.add_edge(edge)? {
                edges_added += 1;
            }
        }
        self.collect_orphans(orphans);
        Ok(ReplaceOutcome {
            nodes_removed,
            nodes_added,
            edges_added,
        })
    }

    fn validate_subgraph(&self, file_path: &str, subgraph: &FileSubgraph) -> Result<()> {
        let retracted: HashSet<&str> = self
            .files
            .get(file_path)
            .map(|ids| ids.iter().map(String::as_str).collect())
            .unwrap_or_default();
        let mut staged: HashSet<&str> = HashSet::with_capacity(subgraph.nodes.len());
        for node in &subgraph.nodes {
            if let Some(owner) = node.owner_file.as_deref() {
                if owner != file_path {
                    return Err(Error::InvalidSubgraph(format!(
                        "node {} is owned by {owner}, expected {file_path}",
                        node.id
                    )));
                }
            }
            staged.insert(node.id.as_str());
        }
        let resolves = |id: &str| {
            staged.contains(id) || (self.index.contains_key(id) && !retracted.contains(id))
        };
        for edge in &subgraph.edges {
            if !resolves(&edge.source) || !resolves(&edge.target) {
                return Err(Error::DanglingReference {
                    source_id: edge.source.clone(),
                    target_id: edge.target.clone(),
                });
            }
        }
        Ok(())
    }

    /// Drops all nodes, edges and file ownership. The snapshot path is kept.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.index.clear();
        self.files.clear();
        info!("graph cleared");
    }

    /// Writes the snapshot to `path` or to the configured snapshot path.
    pub fn save_snapshot(&self, path: Option<&Path>) -> Result<PathBuf> {
        let target = self.resolve_snapshot_path(path)?;
        snapshot::save(self, &target)?;
        info!(
            path = %target.display(),
            nodes = self.node_count(),
            edges = self.edge_count(),
            "graph snapshot saved"
        );
        Ok(target)
    }

    /// Replaces the whole store with the snapshot at `path` (or the configured
    /// path). On failure the current contents are kept as they were.
    pub fn load_snapshot(&mut self, path: Option<&Path>) -> Result<()> {
        let source = self.resolve_snapshot_path(path)?;
        let mut loaded = snapshot::load(&source)?;
        loaded.snapshot_path = self.snapshot_path.take();
        *self = loaded;
        info!(
            path = %source.display(),
            nodes = self.node_count(),
            edges = self.edge_count(),
            files = self.files.len(),
            "graph snapshot loaded"
        );
        Ok(())
    }

    fn resolve_snapshot_path(&self, path: Option<&Path>) -> Result<PathBuf> {
        path.map(Path::to_path_buf)
            .or_else(|| self.snapshot_path.clone())
            .ok_or_else(|| Error::SnapshotIo("no snapshot path configured".to_string()))
    }

    fn find_edge(&self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) -> Option<&EdgeData> {
        let id = self
            .graph
            .edges_directed(from, Outgoing)
            .find(|edge| edge.target() == to && edge.weight().kind == kind)
            .map(|edge| edge.id())?;
        self.graph.edge_weight(id)
    }

    fn disown(&mut self, file_path: &str, id: &str) {
        if let Some(ids) = self.files.get_mut(file_path) {
            ids.remove(id);
            if ids.is_empty() {
                self.files.remove(file_path);
            }
        }
    }

    /// Removes the nodes `file_path` owns. Returns how many were removed and
    /// the unowned neighbours that lost an edge in the process.
    fn retract(&mut self, file_path: &str) -> (usize, Vec<NodeIndex>) {
        let Some(owned) = self.files.remove(file_path) else {
            return (0, Vec::new());
        };
        let mut orphans = Vec::new();
        let mut removed = 0;
        for id in &owned {
            let Some(ix) = self.index.remove(id) else {
                continue;
            };
            orphans.extend(
                self.graph
                    .neighbors_undirected(ix)
                    .filter(|other| self.graph[*other].owner_file.is_none()),
            );
            if self.graph.remove_node(ix).is_some() {
                removed += 1;
            }
        }
        (removed, orphans)
    }

    fn collect_orphans(&mut self, candidates: Vec<NodeIndex>) {
        for ix in candidates {
            let Some(node) = self.graph.node_weight(ix) else {
                continue;
            };
            if node.owner_file.is_some() || self.graph.neighbors_undirected(ix).next().is_some() {
                continue;
            }
            if let Some(node) = self.graph.remove_node(ix) {
                debug!(id = %node.id, "dropped unreferenced node");
                self.index.remove(&node.id);
            }
        }
    }
}
