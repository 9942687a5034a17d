use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Structured logging, filtered by `RUST_LOG` when set.
pub fn init() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,petclinic_choreography=debug")),
        )
        .init();
}
