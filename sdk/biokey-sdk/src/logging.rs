use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info,biokey_sdk=debug`).
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,biokey_sdk=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .ok();
}
