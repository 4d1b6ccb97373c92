pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod logging;
pub mod model;
pub mod rpc;
pub mod util;

pub use error::{Error, Result};
pub use graph::{FileSubgraph, GraphStore, SharedGraph};
pub use indexer::{IndexOptions, Indexer};
