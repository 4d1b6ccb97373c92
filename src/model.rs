use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Open metadata carried next to the typed fields of nodes and edges.
pub type Extra = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Class,
    Function,
    Method,
    Property,
    Variable,
    Import,
    Module,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Class => "class",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::Property => "property",
            NodeKind::Variable => "variable",
            NodeKind::Import => "import",
            NodeKind::Module => "module",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    Contains,
    Calls,
    Imports,
    InheritsFrom,
    References,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 5] = [
        EdgeKind::Contains,
        EdgeKind::Calls,
        EdgeKind::Imports,
        EdgeKind::InheritsFrom,
        EdgeKind::References,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Contains => "CONTAINS",
            EdgeKind::Calls => "CALLS",
            EdgeKind::Imports => "IMPORTS",
            EdgeKind::InheritsFrom => "INHERITS_FROM",
            EdgeKind::References => "REFERENCES",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `CONTAINS`, `contains`, `Contains`, `inherits_from` and `InheritsFrom` alike.
impl FromStr for EdgeKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key: String = raw
            .chars()
            .filter(|ch| *ch != '_' && *ch != '-')
            .flat_map(char::to_lowercase)
            .collect();
        EdgeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().replace('_', "").to_lowercase() == key)
            .ok_or_else(|| format!("unknown edge kind: {raw}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Outgoing,
    Incoming,
    Both,
}

impl Direction {
    pub fn includes_outgoing(self) -> bool {
        matches!(self, Direction::Outgoing | Direction::Both)
    }

    pub fn includes_incoming(self) -> bool {
        matches!(self, Direction::Incoming | Direction::Both)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "outgoing" | "out" => Ok(Direction::Outgoing),
            "incoming" | "in" => Ok(Direction::Incoming),
            "both" => Ok(Direction::Both),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileAttrs {
    pub name: String,
    pub language: Option<String>,
    pub content_hash: Option<String>,
    pub line_count: Option<u32>,
}

/// Fields shared by classes, functions, properties and variables.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SymbolAttrs {
    pub name: String,
    pub line: Option<u32>,
    pub end_line: Option<u32>,
    pub docstring: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MethodAttrs {
    pub name: String,
    pub class_name: String,
    pub line: Option<u32>,
    pub end_line: Option<u32>,
    pub docstring: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportAttrs {
    /// Name the import binds in the importing file.
    pub name: String,
    pub module: String,
    pub imported: Option<String>,
    pub alias: Option<String>,
    pub line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleAttrs {
    pub name: String,
}

/// Typed attribute set of a node; the variant determines the node kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeAttrs {
    File(FileAttrs),
    Class(SymbolAttrs),
    Function(SymbolAttrs),
    Method(MethodAttrs),
    Property(SymbolAttrs),
    Variable(SymbolAttrs),
    Import(ImportAttrs),
    Module(ModuleAttrs),
}

impl NodeAttrs {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeAttrs::File(_) => NodeKind::File,
            NodeAttrs::Class(_) => NodeKind::Class,
            NodeAttrs::Function(_) => NodeKind::Function,
            NodeAttrs::Method(_) => NodeKind::Method,
            NodeAttrs::Property(_) => NodeKind::Property,
            NodeAttrs::Variable(_) => NodeKind::Variable,
            NodeAttrs::Import(_) => NodeKind::Import,
            NodeAttrs::Module(_) => NodeKind::Module,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NodeAttrs::File(attrs) => &attrs.name,
            NodeAttrs::Class(attrs)
            | NodeAttrs::Function(attrs)
            | NodeAttrs::Property(attrs)
            | NodeAttrs::Variable(attrs) => &attrs.name,
            NodeAttrs::Method(attrs) => &attrs.name,
            NodeAttrs::Import(attrs) => &attrs.name,
            NodeAttrs::Module(attrs) => &attrs.name,
        }
    }

    pub fn line(&self) -> Option<u32> {
        match self {
            NodeAttrs::Class(attrs)
            | NodeAttrs::Function(attrs)
            | NodeAttrs::Property(attrs)
            | NodeAttrs::Variable(attrs) => attrs.line,
            NodeAttrs::Method(attrs) => attrs.line,
            NodeAttrs::Import(attrs) => attrs.line,
            NodeAttrs::File(_) | NodeAttrs::Module(_) => None,
        }
    }

    pub fn docstring(&self) -> Option<&str> {
        match self {
            NodeAttrs::Class(attrs)
            | NodeAttrs::Function(attrs)
            | NodeAttrs::Property(attrs)
            | NodeAttrs::Variable(attrs) => attrs.docstring.as_deref(),
            NodeAttrs::Method(attrs) => attrs.docstring.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub attrs: NodeAttrs,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Extra,
    /// File whose indexing produced this node; `None` for synthetic nodes
    /// such as external modules.
    pub owner_file: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, attrs: NodeAttrs) -> Self {
        Self {
            id: id.into(),
            attrs,
            extra: Extra::new(),
            owner_file: None,
        }
    }

    pub fn owned_by(mut self, file_path: impl Into<String>) -> Self {
        self.owner_file = Some(file_path.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.attrs.kind()
    }

    pub fn name(&self) -> &str {
        self.attrs.name()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Extra,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            attrs: Extra::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub file_count: usize,
    pub edge_kind_counts: BTreeMap<EdgeKind, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_kind_counts: Option<BTreeMap<NodeKind, usize>>,
}

/// Result of swapping one file's subgraph into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReplaceOutcome {
    pub nodes_removed: usize,
    pub nodes_added: usize,
    pub edges_added: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexOutcome {
    pub file_path: String,
    pub language: String,
    pub nodes_added: usize,
    pub edges_added: usize,
    pub nodes_removed: usize,
    pub elapsed_ms: f64,
    pub snapshot_saved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReindexStats {
    pub scanned: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub nodes: usize,
    pub edges: usize,
    pub duration_ms: u64,
    pub snapshot_saved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn edge_kind_parses_loose_spellings() {
        assert_eq!("CONTAINS".parse::<EdgeKind>().unwrap(), EdgeKind::Contains);
        assert_eq!("contains".parse::<EdgeKind>().unwrap(), EdgeKind::Contains);
        assert_eq!(
            "InheritsFrom".parse::<EdgeKind>().unwrap(),
            EdgeKind::InheritsFrom
        );
        assert_eq!(
            "inherits_from".parse::<EdgeKind>().unwrap(),
            EdgeKind::InheritsFrom
        );
        assert!("owns".parse::<EdgeKind>().is_err());
    }

    #[test]
    fn node_attrs_serialize_with_kind_tag() {
        let node = Node::new(
            "method:a.py:Greeter.say",
            NodeAttrs::Method(MethodAttrs {
                name: "say".into(),
                class_name: "Greeter".into(),
                line: Some(3),
                end_line: Some(4),
                docstring: None,
            }),
        )
        .owned_by("a.py");
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["attrs"]["kind"], json!("method"));
        assert_eq!(value["attrs"]["class_name"], json!("Greeter"));
        assert_eq!(value["owner_file"], json!("a.py"));
        assert!(value.get("extra").is_none());
        let back: Node = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
        assert_eq!(back.kind(), NodeKind::Method);
        assert_eq!(back.name(), "say");
    }

    #[test]
    fn stats_serialize_edge_kinds_as_keys() {
        let mut stats = GraphStats::default();
        stats.edge_kind_counts.insert(EdgeKind::Contains, 3);
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["edge_kind_counts"]["CONTAINS"], json!(3));
        assert!(value.get("node_kind_counts").is_none());
    }
}
