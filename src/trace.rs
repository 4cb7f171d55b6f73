use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Log to stderr, `info` and up unless `RUST_LOG` says otherwise.
///
/// stdout is left to the binaries' own output.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}
