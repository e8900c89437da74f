use tracing_subscriber::EnvFilter;

/// Level used when `RUST_LOG` is unset: `warn`, then one step per `-v`.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs the stderr subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(verbosity: u8, color: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(color)
        .with_target(false)
        .compact()
        .try_init();
}
