//! One function per command. Each turns the indexer result into a response
//! body, mapping failures to an error body.

use super::{QueryType, ResponseBody};
use crate::indexer::Indexer;
use serde_json::Value;
use tracing::warn;

pub(super) fn handle_update_file(
    indexer: &Indexer,
    file_path: &str,
    content: &str,
    language: Option<&str>,
) -> ResponseBody {
    match indexer.index_file(file_path, content, language) {
        Ok(outcome) => ResponseBody::UpdateFile {
            nodes_added: outcome.nodes_added,
            edges_added: outcome.edges_added,
            parsing_time_ms: outcome.elapsed_ms,
        },
        Err(err) => {
            warn!(file = file_path, "update failed: {err}");
            ResponseBody::error(format!("failed to update {file_path}: {err}"), err.code())
        }
    }
}

pub(super) fn handle_remove_file(indexer: &Indexer, file_path: &str) -> ResponseBody {
    match indexer.remove_file(file_path) {
        Ok(nodes_removed) => ResponseBody::RemoveFile { nodes_removed },
        Err(err) => {
            ResponseBody::error(format!("failed to remove {file_path}: {err}"), err.code())
        }
    }
}

/// Queries need a query engine, which this server does not have yet.
pub(super) fn handle_query_graph(
    query_type: QueryType,
    _query_params: &Value,
    _limit: usize,
) -> ResponseBody {
    ResponseBody::error(
        format!("query engine not implemented: {}", query_type.as_str()),
        "not_implemented",
    )
}

pub(super) fn handle_get_stats(indexer: &Indexer, detailed: bool) -> ResponseBody {
    match indexer.stats(detailed) {
        Ok(stats) => ResponseBody::Stats { stats },
        Err(err) => ResponseBody::from(&err),
    }
}
