use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use kgidx::config::Config;
use kgidx::graph::GraphStore;
use kgidx::indexer::python::PythonAnalyzer;
use kgidx::indexer::{IndexOptions, Indexer, scan::ScanOptions};
use kgidx::{cli, logging, rpc};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

fn default_snapshot_path() -> PathBuf {
    PathBuf::from(".kgidx").join("graph.sqlite")
}

fn link_options(config: &Config, link: cli::LinkArgs) -> IndexOptions {
    let configured = config.index_options();
    IndexOptions {
        link_imports: configured.link_imports || link.link_imports,
        link_calls: configured.link_calls || link.link_calls,
        link_inheritance: configured.link_inheritance || link.link_inheritance,
    }
}

fn build_router(config: &Config, snapshot: &Path, options: IndexOptions) -> Result<rpc::Router> {
    // Without an analyzer there is nothing to index.
    let analyzer = PythonAnalyzer::with_max_file_size(config.max_file_size)
        .context("initialize python analyzer")?;
    let graph = GraphStore::open(snapshot).into_shared();
    let indexer = Indexer::with_options(graph, Box::new(analyzer), options);
    Ok(rpc::Router::new(indexer).with_slow_request_ms(config.slow_request_ms))
}

fn save_on_exit(router: &rpc::Router) -> Result<()> {
    let graph = router
        .indexer()
        .graph()
        .read()
        .map_err(|_| anyhow!("graph lock poisoned"))?;
    match graph.save_snapshot(None) {
        Ok(path) => info!(path = %path.display(), "snapshot saved on exit"),
        Err(err) => warn!("snapshot save on exit failed: {err}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = cli::Args::parse();
    let config = Config::from_env();
    let level = logging::effective_level(&config.log_level, args.log_level.as_deref(), args.verbose);
    logging::init(&level);

    let snapshot = args
        .snapshot
        .or_else(|| config.snapshot_path.clone())
        .unwrap_or_else(default_snapshot_path);

    match args.command {
        cli::Command::Serve { link } => {
            let router = build_router(&config, &snapshot, link_options(&config, link))?;
            info!(snapshot = %snapshot.display(), "serving on stdin/stdout");
            rpc::serve_stdio(&router)?;
            save_on_exit(&router)
        }
        cli::Command::Reindex {
            repo,
            no_ignore,
            link,
        } => {
            let router = build_router(&config, &snapshot, link_options(&config, link))?;
            let stats = router
                .indexer()
                .reindex(&repo, ScanOptions::new(no_ignore))
                .with_context(|| format!("reindex {}", repo.display()))?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        cli::Command::Stats { detailed } => {
            let router = build_router(&config, &snapshot, IndexOptions::default())?;
            let stats = router.indexer().stats(detailed)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        cli::Command::Request { json, file, link } => {
            let raw = match (json, file) {
                (Some(raw), _) => raw,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("read {}", path.display()))?,
                (None, None) => bail!("request needs --json or --file"),
            };
            let router = build_router(&config, &snapshot, link_options(&config, link))?;
            let response = rpc::call(&router, &raw)?;
            println!("{response}");
            Ok(())
        }
    }
}
