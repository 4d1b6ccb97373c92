//! SQLite snapshot of a [`GraphStore`].
//!
//! A save writes the whole graph into a sibling temp file inside a single
//! transaction and then renames it over the target, so an interrupted save
//! never leaves a half-written snapshot in place.

use super::GraphStore;
use crate::error::{Error, Result};
use crate::model::{Edge, EdgeKind, Extra, Node, NodeAttrs};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
    CREATE TABLE meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE nodes (
        id TEXT PRIMARY KEY,
        owner_file TEXT,
        attrs TEXT NOT NULL,
        extra TEXT
    );

    CREATE TABLE edges (
        source TEXT NOT NULL,
        target TEXT NOT NULL,
        kind TEXT NOT NULL,
        attrs TEXT,
        PRIMARY KEY (source, target, kind)
    );

    CREATE TABLE file_nodes (
        path TEXT NOT NULL,
        node_id TEXT NOT NULL,
        PRIMARY KEY (path, node_id)
    );
";

pub fn save(store: &GraphStore, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| {
            Error::SnapshotIo(format!("create directory {}: {err}", parent.display()))
        })?;
    }
    let tmp = temp_path(path);
    if tmp.exists() {
        std::fs::remove_file(&tmp).map_err(|err| {
            Error::SnapshotIo(format!("remove stale {}: {err}", tmp.display()))
        })?;
    }

    if let Err(err) = write_database(store, &tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(err);
    }
    std::fs::rename(&tmp, path).map_err(|err| {
        let _ = std::fs::remove_file(&tmp);
        Error::SnapshotIo(format!("replace {}: {err}", path.display()))
    })
}

fn write_database(store: &GraphStore, path: &Path) -> Result<()> {
    let mut conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    let tx = conn.transaction()?;
    {
        let mut meta = tx.prepare("INSERT INTO meta (key, value) VALUES (?, ?)")?;
        let saved_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        meta.execute(params!["schema_version", SCHEMA_VERSION.to_string()])?;
        meta.execute(params!["saved_at", saved_at.to_string()])?;
        meta.execute(params!["node_count", store.node_count().to_string()])?;
        meta.execute(params!["edge_count", store.edge_count().to_string()])?;

        let mut insert_node = tx.prepare(
            "INSERT INTO nodes (id, owner_file, attrs, extra) VALUES (?, ?, ?, ?)",
        )?;
        for node in store.nodes() {
            insert_node.execute(params![
                &node.id,
                node.owner_file.as_deref(),
                serde_json::to_string(&node.attrs)?,
                encode_extra(&node.extra)?,
            ])?;
        }

        let mut insert_edge =
            tx.prepare("INSERT INTO edges (source, target, kind, attrs) VALUES (?, ?, ?, ?)")?;
        for edge in store.edges() {
            insert_edge.execute(params![
                &edge.source,
                &edge.target,
                edge.kind.as_str(),
                encode_extra(&edge.attrs)?,
            ])?;
        }

        let mut insert_owned =
            tx.prepare("INSERT INTO file_nodes (path, node_id) VALUES (?, ?)")?;
        for (file_path, ids) in store.files() {
            for id in ids {
                insert_owned.execute(params![file_path, id])?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

/// Reads the snapshot at `path` into a fresh store.
pub fn load(path: &Path) -> Result<GraphStore> {
    if !path.exists() {
        return Err(Error::NotFound(format!("snapshot {}", path.display())));
    }
    if !path.is_file() {
        return Err(Error::SnapshotIo(format!(
            "{} is not a snapshot file",
            path.display()
        )));
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    match version.as_deref().map(str::parse::<i64>) {
        Some(Ok(SCHEMA_VERSION)) => {}
        Some(Ok(other)) => {
            return Err(Error::SnapshotIo(format!(
                "unsupported snapshot schema version {other}"
            )));
        }
        _ => {
            return Err(Error::SnapshotIo(
                "snapshot has no valid schema version".to_string(),
            ));
        }
    }

    let mut store = GraphStore::new();

    let mut stmt = conn.prepare("SELECT id, owner_file, attrs, extra FROM nodes ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;
    for row in rows {
        let (id, owner_file, attrs, extra) = row?;
        let attrs: NodeAttrs = serde_json::from_str(&attrs)?;
        store.add_node(Node {
            id,
            attrs,
            extra: decode_extra(extra.as_deref())?,
            owner_file,
        });
    }

    let mut stmt = conn.prepare("SELECT source, target, kind, attrs FROM edges")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;
    for row in rows {
        let (source, target, kind, attrs) = row?;
        let kind: EdgeKind = kind.parse().map_err(Error::SnapshotIo)?;
        let edge = Edge {
            source,
            target,
            kind,
            attrs: decode_extra(attrs.as_deref())?,
        };
        store
            .add_edge(edge)
            .map_err(|err| Error::SnapshotIo(format!("inconsistent snapshot: {err}")))?;
    }

    let mut recorded: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut stmt = conn.prepare("SELECT path, node_id FROM file_nodes")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (file_path, id) = row?;
        recorded.entry(file_path).or_default().insert(id);
    }
    let rebuilt: BTreeMap<String, BTreeSet<String>> = store
        .files()
        .map(|(file_path, ids)| (file_path.to_string(), ids.clone()))
        .collect();
    if recorded != rebuilt {
        return Err(Error::SnapshotIo(
            "inconsistent snapshot: file ownership does not match node owners".to_string(),
        ));
    }

    Ok(store)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "graph".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn encode_extra(extra: &Extra) -> Result<Option<String>> {
    if extra.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(extra)?))
}

fn decode_extra(raw: Option<&str>) -> Result<Extra> {
    match raw {
        Some(raw) => Ok(serde_json::from_str(raw)?),
        None => Ok(Extra::new()),
    }
}
