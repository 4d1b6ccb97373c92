use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber, writing to stderr so stdout stays free
/// for protocol responses.
///
/// `RUST_LOG` wins when it is set; otherwise `level` is used as the filter.
/// Calling this more than once is harmless.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// `--verbose` raises the level to debug unless one was given explicitly.
pub fn effective_level(configured: &str, explicit: Option<&str>, verbose: bool) -> String {
    match (explicit, verbose) {
        (Some(level), _) => level.to_string(),
        (None, true) => "debug".to_string(),
        (None, false) => configured.to_string(),
    }
}
