use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Maps a `-v` count to a default filter level.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Logs go to stderr so recommendation output on stdout stays clean.
/// `RUST_LOG` overrides the level picked from `verbosity`.
pub fn init_tracing(verbosity: u8) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,cf_recommender={}", level_for(verbosity)))
    });

    let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    // Fails only when a global subscriber is already set, e.g. in tests.
    let _ = Registry::default().with(env_filter).with(stderr_layer).try_init();
}
